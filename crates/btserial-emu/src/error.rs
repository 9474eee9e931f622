//! Error types for emulator operations

use btserial_protocol::BridgeError;
use thiserror::Error;

/// Errors returned through an operation's failure path
#[derive(Debug, Error)]
pub enum SerialError {
    /// Error reported by the bridge host, forwarded verbatim
    #[error("{0}")]
    Bridge(String),

    /// `is_connected` outcome when no connection is open
    #[error("not connected")]
    NotConnected,

    /// `is_enabled` outcome when the adapter is disabled
    #[error("bluetooth is not enabled")]
    NotEnabled,

    /// Operation declared for interface completeness only
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// A newer request of the same kind took over the acknowledgement slot
    #[error("{0} acknowledgement superseded by a newer request")]
    Superseded(&'static str),

    /// The transport task has stopped
    #[error("transport closed")]
    TransportClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bridge protocol error
    #[error("protocol error: {0}")]
    Protocol(#[from] BridgeError),
}
