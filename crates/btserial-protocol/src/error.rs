//! Error types for bridge message parsing and encoding

use thiserror::Error;

/// Errors that can occur while parsing bridge data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line did not decode as a known bridge message
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Line exceeded the maximum accepted length and was discarded
    #[error("line too long: {len} bytes")]
    LineTooLong { len: usize },
}

/// Higher-level bridge errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Parse error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Message could not be serialized
    #[error("encode error: {0}")]
    Encode(String),
}
