//! Client handle
//!
//! [`BluetoothSerial`] is a cloneable handle to a transport task. Each method
//! sends one [`SerialCommand`] and awaits its `oneshot` reply, so a call
//! resolves exactly once: success carries the operation's value, failure a
//! [`SerialError`].

use btserial_protocol::DeviceDescriptor;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::bridge::BridgedTransport;
use crate::command::{Reply, SerialCommand};
use crate::config::EmulatorConfig;
use crate::error::SerialError;
use crate::hook::ProcessingHook;
use crate::local::LocalEmulatedTransport;
use crate::transport::{SerialTransport, TransportMode};

/// Handle to a Bluetooth-serial connection
#[derive(Debug, Clone)]
pub struct BluetoothSerial {
    cmd_tx: mpsc::Sender<SerialCommand>,
    mode: TransportMode,
}

impl BluetoothSerial {
    /// Spawn `transport` on the current runtime and return a handle to it
    pub fn spawn<T: SerialTransport>(transport: T, buffer: usize) -> Self {
        let mode = transport.mode();
        let (cmd_tx, cmd_rx) = mpsc::channel(buffer.max(1));
        tokio::spawn(transport.run(cmd_rx));
        Self { cmd_tx, mode }
    }

    /// Start a local emulated connection
    pub fn local(config: &EmulatorConfig) -> Self {
        Self::spawn(LocalEmulatedTransport::new(config), config.command_buffer)
    }

    /// Start a bridged connection over an already connected stream
    pub fn bridged<S>(stream: S, config: &EmulatorConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Self::spawn(BridgedTransport::new(stream), config.command_buffer)
    }

    /// Select the transport from `config`
    ///
    /// Connects to the bridge host when a bridge address is configured,
    /// otherwise starts local emulation.
    pub async fn open(config: &EmulatorConfig) -> Result<Self, SerialError> {
        match &config.bridge_addr {
            Some(addr) => {
                info!("Connecting to bridge host at {}", addr);
                let stream = TcpStream::connect(addr.as_str()).await?;
                stream.set_nodelay(true)?;
                Ok(Self::bridged(stream, config))
            }
            None => {
                info!("No bridge configured, using local emulation");
                Ok(Self::local(config))
            }
        }
    }

    /// Which transport variant backs this handle
    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// Send one command and wait for its reply
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> SerialCommand,
    ) -> Result<T, SerialError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SerialError::TransportClosed)?;
        reply_rx.await.map_err(|_| SerialError::TransportClosed)?
    }

    /// Open a connection to `device`
    pub async fn connect(&self, device: DeviceDescriptor) -> Result<(), SerialError> {
        debug!("connect {}", device.address);
        self.request(|reply| SerialCommand::Connect { device, reply })
            .await
    }

    /// Close the connection
    pub async fn disconnect(&self) -> Result<(), SerialError> {
        debug!("disconnect");
        self.request(|reply| SerialCommand::Disconnect { reply }).await
    }

    /// Install the processing hook that emulates the device
    ///
    /// Replaces any previous hook. Ignored (with a warning) when bridged.
    pub async fn register(&self, hook: impl ProcessingHook) -> Result<(), SerialError> {
        debug!("register");
        let hook: Box<dyn ProcessingHook> = Box::new(hook);
        self.request(|reply| SerialCommand::Register { hook, reply })
            .await
    }

    /// Send `data` to the device
    pub async fn write(&self, data: impl Into<String>) -> Result<(), SerialError> {
        let data = data.into();
        debug!("write {:?}", data);
        self.request(|reply| SerialCommand::Write { data, reply })
            .await
    }

    /// Number of bytes ready to read
    pub async fn available(&self) -> Result<usize, SerialError> {
        self.request(|reply| SerialCommand::Available { reply })
            .await
    }

    /// Take all buffered device output
    pub async fn read(&self) -> Result<String, SerialError> {
        self.request(|reply| SerialCommand::Read { reply }).await
    }

    /// Take buffered output through the first `delimiter`, or `""`
    pub async fn read_until(&self, delimiter: impl Into<String>) -> Result<String, SerialError> {
        let delimiter = delimiter.into();
        self.request(|reply| SerialCommand::ReadUntil { delimiter, reply })
            .await
    }

    /// Deliver each `delimiter`-terminated frame of output to `callback`
    ///
    /// Replaces any previous subscription.
    pub async fn subscribe<F>(
        &self,
        delimiter: impl Into<String>,
        callback: F,
    ) -> Result<(), SerialError>
    where
        F: FnMut(String) + Send + 'static,
    {
        let delimiter = delimiter.into();
        debug!("subscribe {:?}", delimiter);
        let callback = Box::new(callback);
        self.request(|reply| SerialCommand::Subscribe {
            delimiter,
            callback,
            reply,
        })
        .await
    }

    /// Remove the delimiter subscription
    pub async fn unsubscribe(&self) -> Result<(), SerialError> {
        debug!("unsubscribe");
        self.request(|reply| SerialCommand::Unsubscribe { reply })
            .await
    }

    /// Deliver raw inbound bytes to `callback` (bridged mode only)
    pub async fn subscribe_raw_data<F>(&self, callback: F) -> Result<(), SerialError>
    where
        F: FnMut(Vec<u8>) + Send + 'static,
    {
        debug!("subscribeRawData");
        let callback = Box::new(callback);
        self.request(|reply| SerialCommand::SubscribeRaw { callback, reply })
            .await
    }

    /// Remove the raw subscription
    pub async fn unsubscribe_raw_data(&self) -> Result<(), SerialError> {
        debug!("unsubscribeRawData");
        self.request(|reply| SerialCommand::UnsubscribeRaw { reply })
            .await
    }

    /// Discard buffered output
    pub async fn clear(&self) -> Result<(), SerialError> {
        self.request(|reply| SerialCommand::Clear { reply }).await
    }

    /// List paired devices
    pub async fn list(&self) -> Result<Vec<DeviceDescriptor>, SerialError> {
        debug!("list");
        self.request(|reply| SerialCommand::List { reply }).await
    }

    /// Succeeds if a connection is open, otherwise [`SerialError::NotConnected`]
    pub async fn is_connected(&self) -> Result<(), SerialError> {
        self.request(|reply| SerialCommand::IsConnected { reply })
            .await
    }

    /// Succeeds if the adapter is enabled, otherwise [`SerialError::NotEnabled`]
    pub async fn is_enabled(&self) -> Result<(), SerialError> {
        self.request(|reply| SerialCommand::IsEnabled { reply })
            .await
    }

    /// Enable the adapter
    pub async fn enable(&self) -> Result<(), SerialError> {
        debug!("enable");
        self.request(|reply| SerialCommand::Enable { reply }).await
    }

    /// Signal strength of the connection (not implemented)
    pub async fn read_rssi(&self) -> Result<i32, SerialError> {
        Err(not_implemented("readRSSI"))
    }

    /// Open the platform Bluetooth settings (not implemented)
    pub async fn show_bluetooth_settings(&self) -> Result<(), SerialError> {
        Err(not_implemented("showBluetoothSettings"))
    }

    /// Scan for devices that are not paired yet (not implemented)
    pub async fn discover_unpaired(&self) -> Result<Vec<DeviceDescriptor>, SerialError> {
        Err(not_implemented("discoverUnpaired"))
    }

    /// Stop the transport task
    ///
    /// Later calls on any clone fail with [`SerialError::TransportClosed`].
    pub async fn shutdown(&self) -> Result<(), SerialError> {
        self.cmd_tx
            .send(SerialCommand::Shutdown)
            .await
            .map_err(|_| SerialError::TransportClosed)
    }
}

fn not_implemented(op: &'static str) -> SerialError {
    error!("{} is not implemented", op);
    SerialError::NotImplemented(op)
}
