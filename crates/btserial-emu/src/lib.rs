//! Bluetooth-serial Emulation Library
//!
//! This crate lets application code exercise a Bluetooth-serial connection
//! without a physical device. It includes:
//!
//! - **BluetoothSerial**: Cloneable async handle exposing the serial operations
//! - **LocalEmulatedTransport**: In-process byte channel driven by a periodic
//!   processing hook that plays the device
//! - **BridgedTransport**: Forwards operations to a bridge host that owns a
//!   real serial port
//!
//! # Example
//!
//! ```rust
//! use btserial_emu::{BluetoothSerial, EchoHook, EmulatorConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), btserial_emu::SerialError> {
//! let config = EmulatorConfig {
//!     tick_interval_ms: 5,
//!     ..EmulatorConfig::default()
//! };
//! let serial = BluetoothSerial::local(&config);
//!
//! let device = serial.list().await?.remove(1);
//! serial.connect(device).await?;
//! serial.register(EchoHook::with_terminator("\r\n")).await?;
//!
//! serial.write("AT").await?;
//! tokio::time::sleep(std::time::Duration::from_millis(20)).await;
//! assert_eq!(serial.read_until("\r\n").await?, "AT\r\n");
//! # Ok(())
//! # }
//! ```

mod bridge;
mod channel;
mod command;
mod config;
mod emulator;
mod error;
mod hook;
mod local;
mod serial;
mod state;
mod subscription;
mod transport;

pub use bridge::BridgedTransport;
pub use channel::Channel;
pub use command::{Reply, SerialCommand};
pub use config::{EmulatorConfig, BRIDGE_ENV, DEFAULT_TICK_MS, TICK_ENV};
pub use emulator::Emulator;
pub use error::SerialError;
pub use hook::{EchoHook, ProcessingHook, ScriptedHook};
pub use local::LocalEmulatedTransport;
pub use serial::BluetoothSerial;
pub use state::{ConnectionState, TimerHandle};
pub use subscription::{DataCallback, RawDataCallback, Subscription, Subscriptions};
pub use transport::{SerialTransport, TransportMode};

pub use btserial_protocol::{builtin_catalog, DeviceDescriptor};
