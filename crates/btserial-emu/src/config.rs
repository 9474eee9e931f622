//! Emulator configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable naming the bridge host address (`host:port`)
pub const BRIDGE_ENV: &str = "BTSERIAL_BRIDGE";

/// Environment variable overriding the hook tick period in milliseconds
pub const TICK_ENV: &str = "BTSERIAL_TICK_MS";

/// Default hook tick period in milliseconds
pub const DEFAULT_TICK_MS: u64 = 100;

/// Configuration for opening a [`BluetoothSerial`](crate::BluetoothSerial)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmulatorConfig {
    /// Period between processing hook invocations
    #[serde(default = "default_tick_ms")]
    pub tick_interval_ms: u64,
    /// Capacity of the operation queue between handles and the transport task
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
    /// Bridge host address; when set, operations are forwarded there
    #[serde(default)]
    pub bridge_addr: Option<String>,
}

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}

fn default_command_buffer() -> usize {
    64
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_MS,
            command_buffer: default_command_buffer(),
            bridge_addr: None,
        }
    }
}

impl EmulatorConfig {
    /// Default configuration with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (usually the process environment)
    ///
    /// Empty or unparsable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup(BRIDGE_ENV).filter(|s| !s.trim().is_empty()) {
            self.bridge_addr = Some(addr.trim().to_string());
        }
        if let Some(ms) = lookup(TICK_ENV).and_then(|s| s.trim().parse().ok()) {
            self.tick_interval_ms = ms;
        }
        self
    }

    /// Tick period as a duration (never zero)
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Check if a bridge host is configured
    pub fn is_bridged(&self) -> bool {
        self.bridge_addr.is_some()
    }
}
