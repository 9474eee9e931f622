//! Bluetooth-Serial Bridge Protocol Library
//!
//! This crate provides the wire-level pieces shared by the emulator and the
//! bridge host:
//!
//! - **Devices**: [`DeviceDescriptor`] and the built-in two-entry catalog
//! - **Messages**: [`BridgeRequest`] / [`BridgeEvent`] with `bl~` event names
//! - **Codec**: newline-delimited JSON framing for the bridge stream
//! - **Framing**: delimiter extraction from a FIFO text buffer and the
//!   one-byte-per-character raw payload conversion
//!
//! # Example
//!
//! ```rust
//! use btserial_protocol::{encode_message, BridgeEvent, EventCodec, MessageCodec};
//!
//! let line = encode_message(&BridgeEvent::Data("OK\r\n".into())).unwrap();
//!
//! let mut codec = EventCodec::new();
//! codec.push_bytes(&line);
//! assert_eq!(codec.next_message(), Some(BridgeEvent::Data("OK\r\n".into())));
//! ```

pub mod codec;
pub mod device;
pub mod error;
pub mod framing;
pub mod message;

pub use codec::{
    encode_message, BridgeCodec, EventCodec, MessageCodec, RequestCodec, MAX_LINE_LEN,
};
pub use device::{builtin_catalog, DeviceDescriptor};
pub use error::{BridgeError, ParseError};
pub use framing::{from_raw_bytes, take_frame, to_raw_bytes};
pub use message::{AckKind, BridgeEvent, BridgeRequest, EVENT_PREFIX};
