//! Error types for the bridge host

use thiserror::Error;

/// Errors that can occur while serving bridge clients
#[derive(Debug, Error)]
pub enum HostError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// Failed to open serial port
    #[error("failed to open port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// A write was requested with no device open
    #[error("no device connected")]
    NotConnected,

    /// Settings could not be read or written
    #[error("settings error: {0}")]
    Settings(String),

    /// Bridge protocol error
    #[error("protocol error: {0}")]
    Protocol(#[from] btserial_protocol::BridgeError),

    /// I/O error on the client or device stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
