//! Transport selection
//!
//! A transport is a task that owns all connection state and processes
//! [`SerialCommand`]s one at a time. Two variants exist:
//!
//! - [`LocalEmulatedTransport`](crate::LocalEmulatedTransport): byte channel
//!   plus a periodic processing hook
//! - [`BridgedTransport`](crate::BridgedTransport): forwards operations to a
//!   bridge host over a byte stream
//!
//! The variant is chosen once, when the [`BluetoothSerial`](crate::BluetoothSerial)
//! handle is created.

use std::future::Future;

use tokio::sync::mpsc;

use crate::command::SerialCommand;

/// Which transport variant backs a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportMode {
    /// In-process emulation
    Local,
    /// Forwarded to a bridge host
    Bridged,
}

impl TransportMode {
    /// Returns a human-readable name for the mode
    pub fn name(&self) -> &'static str {
        match self {
            TransportMode::Local => "local emulation",
            TransportMode::Bridged => "bridged",
        }
    }
}

/// A transport task
pub trait SerialTransport: Send + 'static {
    /// The variant this transport implements
    fn mode(&self) -> TransportMode;

    /// Process commands until shutdown, channel close, or transport failure
    fn run(self, cmd_rx: mpsc::Receiver<SerialCommand>) -> impl Future<Output = ()> + Send;
}
