pub mod framer;
pub mod response;
pub mod uart;

#[cfg(feature = "std")]
pub mod fake_modem;
