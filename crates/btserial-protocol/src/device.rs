//! Device descriptors
//!
//! A [`DeviceDescriptor`] identifies a paired Bluetooth-serial peripheral the
//! same way a platform driver reports it: a class-of-device integer, a
//! MAC-like id/address pair and a display name.

use serde::{Deserialize, Serialize};

/// A paired device as reported by `list` and accepted by `connect`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Bluetooth class-of-device
    pub class: u32,
    /// Platform identifier (MAC-like on most platforms)
    pub id: String,
    /// Device address (MAC-like)
    pub address: String,
    /// Human-readable name
    pub name: String,
}

impl DeviceDescriptor {
    /// Create a descriptor whose id and address are the same string
    pub fn new(class: u32, address: impl Into<String>, name: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            class,
            id: address.clone(),
            address,
            name: name.into(),
        }
    }
}

/// Class-of-device reported for the built-in tablet entry
pub const CLASS_TABLET: u32 = 276;

/// Class-of-device reported for the built-in serial module entry
pub const CLASS_UNCATEGORIZED: u32 = 7936;

/// The fixed device catalog reported by the local emulator
pub fn builtin_catalog() -> Vec<DeviceDescriptor> {
    vec![
        DeviceDescriptor::new(CLASS_TABLET, "10:BF:48:CB:00:00", "Nexus 7"),
        DeviceDescriptor::new(CLASS_UNCATEGORIZED, "00:06:66:4D:00:00", "RN42"),
    ]
}
