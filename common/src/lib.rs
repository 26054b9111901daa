#![no_std]

pub mod at;
pub mod error;
pub mod gnss;
pub mod modem;
pub mod state;
pub mod time;
pub mod urc;
pub mod wait;

pub type Result<T> = core::result::Result<T, error::Error>;

#[cfg(all(target_abi = "eabihf", target_os = "none"))]
pub type RawMutex = embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
#[cfg(not(all(target_abi = "eabihf", target_os = "none")))]
pub type RawMutex = embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
