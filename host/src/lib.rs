pub mod cli;
pub mod error;
pub mod serial;
pub mod workflow;

pub type Result<T> = std::result::Result<T, error::Error>;
