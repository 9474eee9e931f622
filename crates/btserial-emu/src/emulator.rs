//! Emulator core
//!
//! [`Emulator`] is the context object for one emulated connection: the byte
//! channel, connection flags, subscription slots, the registered processing
//! hook and its timer handle. Everything here is synchronous; the local
//! transport task owns an `Emulator` and drives [`Emulator::tick`] from its
//! interval, so operations and ticks never interleave.

use btserial_protocol::{builtin_catalog, take_frame, DeviceDescriptor};
use tracing::debug;

use crate::channel::Channel;
use crate::error::SerialError;
use crate::hook::ProcessingHook;
use crate::state::{ConnectionState, TimerHandle};
use crate::subscription::{DataCallback, RawDataCallback, Subscriptions};

/// State of one emulated Bluetooth-serial connection
#[derive(Default)]
pub struct Emulator {
    channel: Channel,
    state: ConnectionState,
    subscriptions: Subscriptions,
    hook: Option<Box<dyn ProcessingHook>>,
    timer: Option<TimerHandle>,
    next_timer: u64,
}

impl std::fmt::Debug for Emulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("channel", &self.channel)
            .field("state", &self.state)
            .field("subscriptions", &self.subscriptions)
            .field("hook", &self.hook.as_ref().map(|_| "<hook>"))
            .field("timer", &self.timer)
            .finish()
    }
}

impl Emulator {
    /// Create an emulator with empty buffers, disconnected and enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// The byte channel
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Mutable access to the byte channel (for test setup and bridge input)
    pub fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    /// Current connection flags
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Handle of the live hook timer, if one is running
    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    /// Subscription slots
    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Mutable subscription slots (bridged delivery)
    pub fn subscriptions_mut(&mut self) -> &mut Subscriptions {
        &mut self.subscriptions
    }

    /// Open the emulated connection; always succeeds
    pub fn connect(&mut self, device: &DeviceDescriptor) {
        debug!("Emulated connect to {} ({})", device.address, device.name);
        self.state.connected = true;
    }

    /// Close the emulated connection and stop the hook timer
    ///
    /// The hook stays installed but does not run again until re-registered.
    pub fn disconnect(&mut self) {
        self.state.connected = false;
        if let Some(timer) = self.timer.take() {
            debug!("Stopped {}", timer);
        }
    }

    /// Set the connected flag directly (bridge acknowledgements)
    pub fn set_connected(&mut self, connected: bool) {
        self.state.connected = connected;
    }

    /// Install a processing hook and start a new timer
    ///
    /// Replaces any previous hook and timer. Channel contents are kept.
    pub fn register(&mut self, hook: impl ProcessingHook) -> TimerHandle {
        self.register_boxed(Box::new(hook))
    }

    /// Install an already boxed processing hook
    pub fn register_boxed(&mut self, hook: Box<dyn ProcessingHook>) -> TimerHandle {
        self.next_timer += 1;
        let timer = TimerHandle(self.next_timer);
        if let Some(previous) = self.timer.replace(timer) {
            debug!("Replacing {} with {}", previous, timer);
        }
        self.hook = Some(hook);
        timer
    }

    /// Append application data to the device input
    ///
    /// Succeeds whether or not a connection is open.
    pub fn write(&mut self, data: &str) {
        self.channel.push_input(data);
    }

    /// Number of bytes waiting in the output buffer
    pub fn available(&self) -> usize {
        self.channel.output.len()
    }

    /// Take everything in the output buffer
    pub fn read(&mut self) -> String {
        self.channel.take_output()
    }

    /// Take output up to and including the first `delimiter`
    ///
    /// Returns an empty string, leaving the buffer untouched, when the
    /// delimiter has not arrived yet.
    pub fn read_until(&mut self, delimiter: &str) -> String {
        take_frame(&mut self.channel.output, delimiter).unwrap_or_default()
    }

    /// Install the delimiter subscription
    pub fn subscribe(&mut self, delimiter: &str, callback: DataCallback) {
        self.subscriptions.subscribe(delimiter, callback);
    }

    /// Remove the delimiter subscription
    pub fn unsubscribe(&mut self) {
        self.subscriptions.unsubscribe();
    }

    /// Install the raw subscription
    pub fn subscribe_raw(&mut self, callback: RawDataCallback) {
        self.subscriptions.subscribe_raw(callback);
    }

    /// Remove the raw subscription
    pub fn unsubscribe_raw(&mut self) {
        self.subscriptions.unsubscribe_raw();
    }

    /// Discard the output buffer; input is untouched
    pub fn clear(&mut self) {
        self.channel.clear_output();
    }

    /// The built-in device catalog
    pub fn list(&self) -> Vec<DeviceDescriptor> {
        builtin_catalog()
    }

    /// Succeeds if a connection is open
    pub fn is_connected(&self) -> Result<(), SerialError> {
        if self.state.connected {
            Ok(())
        } else {
            Err(SerialError::NotConnected)
        }
    }

    /// Succeeds if the adapter is enabled
    pub fn is_enabled(&self) -> Result<(), SerialError> {
        if self.state.enabled {
            Ok(())
        } else {
            Err(SerialError::NotEnabled)
        }
    }

    /// Enable the adapter
    pub fn enable(&mut self) {
        self.state.enabled = true;
    }

    /// Run one tick: the hook, then at most one subscription frame
    pub fn tick(&mut self) {
        if let Some(hook) = self.hook.as_mut() {
            hook.process(&mut self.channel);
        }
        if self.channel.output.is_empty() {
            return;
        }
        self.subscriptions.deliver_next_frame(&mut self.channel.output);
    }
}
