//! Top-level error type for generation requests.

use crate::opc::OpcError;
use thiserror::Error;

/// Fatal failures of a whole generation request.
///
/// Everything recoverable (a dropped image reference, a serial number no
/// range covers, residual validator findings) is logged instead; a caller
/// either gets the full list of generated file names or one of these.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// Invalid request inputs, reported before any output file exists.
    #[error("configuration error: {0}")]
    Config(String),

    /// An output builder was driven through its states out of order.
    #[error("invalid builder state: {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    Opc(#[from] OpcError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GenerateError>;
