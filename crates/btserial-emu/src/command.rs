//! Commands sent from [`BluetoothSerial`](crate::BluetoothSerial) handles to
//! the transport task
//!
//! Every operation carries a `oneshot` reply sender. The transport resolves it
//! immediately (local operations) or parks it until the matching bridge
//! acknowledgement arrives.

use btserial_protocol::DeviceDescriptor;
use tokio::sync::oneshot;

use crate::error::SerialError;
use crate::hook::ProcessingHook;
use crate::subscription::{DataCallback, RawDataCallback};

/// Reply channel for one operation
pub type Reply<T> = oneshot::Sender<Result<T, SerialError>>;

/// Operations processed by a transport task
pub enum SerialCommand {
    /// Open a connection to a device
    Connect {
        device: DeviceDescriptor,
        reply: Reply<()>,
    },
    /// Close the connection (and stop the hook timer locally)
    Disconnect { reply: Reply<()> },
    /// Install a processing hook and start its timer
    Register {
        hook: Box<dyn ProcessingHook>,
        reply: Reply<()>,
    },
    /// Send data to the device
    Write { data: String, reply: Reply<()> },
    /// Query the buffered output length
    Available { reply: Reply<usize> },
    /// Take all buffered output
    Read { reply: Reply<String> },
    /// Take buffered output through a delimiter
    ReadUntil {
        delimiter: String,
        reply: Reply<String>,
    },
    /// Install the delimiter subscription
    Subscribe {
        delimiter: String,
        callback: DataCallback,
        reply: Reply<()>,
    },
    /// Remove the delimiter subscription
    Unsubscribe { reply: Reply<()> },
    /// Install the raw subscription
    SubscribeRaw {
        callback: RawDataCallback,
        reply: Reply<()>,
    },
    /// Remove the raw subscription
    UnsubscribeRaw { reply: Reply<()> },
    /// Discard buffered output
    Clear { reply: Reply<()> },
    /// List paired devices
    List { reply: Reply<Vec<DeviceDescriptor>> },
    /// Succeeds if connected
    IsConnected { reply: Reply<()> },
    /// Succeeds if enabled
    IsEnabled { reply: Reply<()> },
    /// Enable the adapter
    Enable { reply: Reply<()> },
    /// Stop the transport task
    Shutdown,
}

impl SerialCommand {
    /// Operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SerialCommand::Connect { .. } => "connect",
            SerialCommand::Disconnect { .. } => "disconnect",
            SerialCommand::Register { .. } => "register",
            SerialCommand::Write { .. } => "write",
            SerialCommand::Available { .. } => "available",
            SerialCommand::Read { .. } => "read",
            SerialCommand::ReadUntil { .. } => "readUntil",
            SerialCommand::Subscribe { .. } => "subscribe",
            SerialCommand::Unsubscribe { .. } => "unsubscribe",
            SerialCommand::SubscribeRaw { .. } => "subscribeRawData",
            SerialCommand::UnsubscribeRaw { .. } => "unsubscribeRawData",
            SerialCommand::Clear { .. } => "clear",
            SerialCommand::List { .. } => "list",
            SerialCommand::IsConnected { .. } => "isConnected",
            SerialCommand::IsEnabled { .. } => "isEnabled",
            SerialCommand::Enable { .. } => "enable",
            SerialCommand::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Debug for SerialCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerialCommand::Connect { device, .. } => f
                .debug_struct("Connect")
                .field("device", device)
                .finish_non_exhaustive(),
            SerialCommand::Write { data, .. } => f
                .debug_struct("Write")
                .field("data", data)
                .finish_non_exhaustive(),
            SerialCommand::ReadUntil { delimiter, .. }
            | SerialCommand::Subscribe { delimiter, .. } => f
                .debug_struct(self.name())
                .field("delimiter", delimiter)
                .finish_non_exhaustive(),
            _ => f.write_str(self.name()),
        }
    }
}
