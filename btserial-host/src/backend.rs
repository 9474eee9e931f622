//! Device backends
//!
//! A backend lists the devices a bridge client may connect to and opens a
//! byte stream to the chosen one. Serial ports are opened with `tokio_serial`;
//! the echo device runs as a task on the far end of a `tokio::io::duplex`
//! stream so both backends look the same to a session.

use std::time::Duration;

use btserial_protocol::{builtin_catalog, DeviceDescriptor};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::error::HostError;
use crate::scanner::PortScanner;
use crate::settings::{BackendKind, HostSettings};

/// Byte stream to an open device
pub trait DeviceStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> DeviceStream for T {}

/// Boxed device stream held by a session
pub type BoxedDevice = Box<dyn DeviceStream>;

/// Source of devices for bridge sessions
#[derive(Debug, Clone)]
pub enum Backend {
    /// Real serial ports
    Serial {
        baud_rate: u32,
        scanner: PortScanner,
    },
    /// Emulated device that echoes every write
    Echo { terminator: String },
}

impl Backend {
    /// Build the backend described by `settings`
    pub fn from_settings(settings: &HostSettings) -> Self {
        match settings.backend {
            BackendKind::Serial => Backend::Serial {
                baud_rate: settings.baud_rate,
                scanner: PortScanner::new(settings.skip_patterns.clone()),
            },
            BackendKind::Echo => Backend::Echo {
                terminator: settings.echo_terminator.clone(),
            },
        }
    }

    /// Human-readable name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Serial { .. } => "serial",
            Backend::Echo { .. } => "echo",
        }
    }

    /// Devices a client may connect to
    pub fn list(&self) -> Result<Vec<DeviceDescriptor>, HostError> {
        match self {
            Backend::Serial { scanner, .. } => scanner.enumerate(),
            Backend::Echo { .. } => Ok(builtin_catalog()),
        }
    }

    /// Open a stream to `device`
    pub fn open(&self, device: &DeviceDescriptor) -> Result<BoxedDevice, HostError> {
        match self {
            Backend::Serial { baud_rate, .. } => {
                info!("Opening {} at {} baud", device.address, baud_rate);
                let stream = tokio_serial::new(&device.address, *baud_rate)
                    .timeout(Duration::from_millis(100))
                    .open_native_async()
                    .map_err(|e| HostError::OpenFailed {
                        port: device.address.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(Box::new(stream))
            }
            Backend::Echo { terminator } => {
                info!("Arming echo device for {} ({})", device.address, device.name);
                let (near, far) = tokio::io::duplex(4096);
                tokio::spawn(run_echo_device(far, terminator.clone()));
                Ok(Box::new(near))
            }
        }
    }
}

/// Echo every chunk written to the device, followed by `terminator`
async fn run_echo_device(mut stream: DuplexStream, terminator: String) {
    let mut buf = [0u8; 1024];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };

        let mut reply = buf[..n].to_vec();
        reply.extend_from_slice(terminator.as_bytes());
        if stream.write_all(&reply).await.is_err() {
            break;
        }
    }
    debug!("Echo device closed");
}
