//! Bridge messages
//!
//! The bridge carries two message families over one stream:
//!
//! - [`BridgeRequest`]: client → host (`bl~connect`, `bl~write`, ...)
//! - [`BridgeEvent`]: host → client acknowledgements and inbound data
//!
//! Every message is encoded as `{"event": "<name>", "payload": <value>}`.
//! Unit messages omit `payload`.

use serde::{Deserialize, Serialize};

use crate::device::DeviceDescriptor;

/// Namespace prefix carried by every bridge event name
pub const EVENT_PREFIX: &str = "bl~";

/// Requests sent from the emulator client to the bridge host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum BridgeRequest {
    /// Open a connection to a device
    #[serde(rename = "bl~connect")]
    Connect(DeviceDescriptor),
    /// Close the current connection
    #[serde(rename = "bl~disconnect")]
    Disconnect,
    /// Transmit data to the device
    #[serde(rename = "bl~write")]
    Write(String),
    /// Request the device list
    #[serde(rename = "bl~list")]
    List,
    /// Start forwarding inbound data
    #[serde(rename = "bl~subscribe")]
    Subscribe,
    /// Stop forwarding inbound data
    #[serde(rename = "bl~unsubscribe")]
    Unsubscribe,
    /// Start forwarding raw inbound data
    #[serde(rename = "bl~subscribe_raw")]
    SubscribeRaw,
    /// Stop forwarding raw inbound data
    #[serde(rename = "bl~unsubscribe_raw")]
    UnsubscribeRaw,
}

/// Events sent from the bridge host back to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum BridgeEvent {
    /// Acknowledges `connect`; carries the remote error on failure
    #[serde(rename = "bl~connected")]
    Connected(Option<String>),
    /// Acknowledges `disconnect`
    #[serde(rename = "bl~disconnected")]
    Disconnected,
    /// Acknowledges `write`; carries the remote error on failure
    #[serde(rename = "bl~written")]
    Written(Option<String>),
    /// Response to `list`
    #[serde(rename = "bl~devices")]
    Devices(Vec<DeviceDescriptor>),
    /// Inbound data from the device
    #[serde(rename = "bl~data")]
    Data(String),
    /// Inbound data for raw subscribers (one character per byte)
    #[serde(rename = "bl~data_raw")]
    DataRaw(String),
}

/// Acknowledgement kinds that resolve a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckKind {
    /// `connected`
    Connected,
    /// `disconnected`
    Disconnected,
    /// `written`
    Written,
    /// `devices`
    Devices,
}

impl AckKind {
    /// Returns the event name without its namespace prefix
    pub fn name(&self) -> &'static str {
        match self {
            AckKind::Connected => "connected",
            AckKind::Disconnected => "disconnected",
            AckKind::Written => "written",
            AckKind::Devices => "devices",
        }
    }
}

impl BridgeRequest {
    /// The acknowledgement this request waits for, if any
    ///
    /// Subscription toggles are fire-and-forget.
    pub fn expected_ack(&self) -> Option<AckKind> {
        match self {
            BridgeRequest::Connect(_) => Some(AckKind::Connected),
            BridgeRequest::Disconnect => Some(AckKind::Disconnected),
            BridgeRequest::Write(_) => Some(AckKind::Written),
            BridgeRequest::List => Some(AckKind::Devices),
            BridgeRequest::Subscribe
            | BridgeRequest::Unsubscribe
            | BridgeRequest::SubscribeRaw
            | BridgeRequest::UnsubscribeRaw => None,
        }
    }
}

impl BridgeEvent {
    /// The acknowledgement kind this event resolves, if any
    pub fn ack_kind(&self) -> Option<AckKind> {
        match self {
            BridgeEvent::Connected(_) => Some(AckKind::Connected),
            BridgeEvent::Disconnected => Some(AckKind::Disconnected),
            BridgeEvent::Written(_) => Some(AckKind::Written),
            BridgeEvent::Devices(_) => Some(AckKind::Devices),
            BridgeEvent::Data(_) | BridgeEvent::DataRaw(_) => None,
        }
    }
}
