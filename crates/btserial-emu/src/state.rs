//! Connection state and timer handles

/// Connection/enabled flags backing the status queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    /// A device connection is open
    pub connected: bool,
    /// The (emulated) adapter is enabled
    pub enabled: bool,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            connected: false,
            enabled: true,
        }
    }
}

/// Identifies the live periodic hook invocation
///
/// Each registration mints a new handle; at most one is live at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

impl std::fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}
