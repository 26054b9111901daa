use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("Common error: {0}")]
    CommonError(#[from] lpwa_common::error::Error),
    #[error("Connection error")]
    ConnectionError,
    #[error("Invalid value of --{0}")]
    ArgumentError(&'static str),
    #[error("Timed out: {0}")]
    WorkflowTimeout(&'static str),
}
