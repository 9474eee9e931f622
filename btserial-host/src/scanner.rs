//! Serial port scanner
//!
//! Enumerates serial ports and presents them as bridge device descriptors.

use btserial_protocol::DeviceDescriptor;
use serialport::{available_ports, SerialPortType};
use tracing::info;

use crate::error::HostError;

/// Device class reported for enumerated serial ports
pub const SERIAL_PORT_CLASS: u32 = 0;

/// Describe a port the way bridge clients list devices
///
/// The port path is both id and address; the name is the USB product string
/// when known.
pub fn port_descriptor(name: String, port_type: &SerialPortType) -> DeviceDescriptor {
    let label = match port_type {
        SerialPortType::UsbPort(usb) => usb.product.clone(),
        _ => None,
    }
    .unwrap_or_else(|| name.clone());

    DeviceDescriptor::new(SERIAL_PORT_CLASS, name, label)
}

/// Serial port scanner
#[derive(Debug, Clone, Default)]
pub struct PortScanner {
    skip_patterns: Vec<String>,
}

impl PortScanner {
    /// Create a scanner that skips ports containing any of `skip_patterns`
    pub fn new(skip_patterns: Vec<String>) -> Self {
        Self { skip_patterns }
    }

    /// Enumerate available serial ports as device descriptors
    pub fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, HostError> {
        info!("Enumerating serial ports...");
        let ports = available_ports().map_err(|e| HostError::EnumerationFailed(e.to_string()))?;

        let result: Vec<_> = ports
            .into_iter()
            .filter(|p| !self.should_skip_port(&p.port_name))
            .map(|p| port_descriptor(p.port_name, &p.port_type))
            .collect();

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for device in &result {
                info!("  {} - {}", device.address, device.name);
            }
        }

        Ok(result)
    }

    /// Check if a port should be skipped
    fn should_skip_port(&self, port: &str) -> bool {
        self.skip_patterns
            .iter()
            .any(|pattern| port.contains(pattern.as_str()))
    }
}
