//! Processing hooks
//!
//! A hook models the emulated device's firmware. It is invoked once per tick
//! with the live [`Channel`] and may drain `input` and append to `output`.
//!
//! Any `FnMut(&mut Channel)` closure is a hook:
//!
//! ```rust
//! use btserial_emu::{Channel, ProcessingHook};
//!
//! let mut upper = |channel: &mut Channel| {
//!     let data = channel.take_input();
//!     channel.push_output(&data.to_uppercase());
//! };
//!
//! let mut channel = Channel::new();
//! channel.push_input("ok\n");
//! upper.process(&mut channel);
//! assert_eq!(channel.output, "OK\n");
//! ```

use std::collections::HashMap;

use btserial_protocol::take_frame;
use tracing::{debug, warn};

use crate::channel::Channel;

/// Device behaviour invoked on every emulator tick
pub trait ProcessingHook: Send + 'static {
    /// Process the channel for one tick
    fn process(&mut self, channel: &mut Channel);
}

impl<F> ProcessingHook for F
where
    F: FnMut(&mut Channel) + Send + 'static,
{
    fn process(&mut self, channel: &mut Channel) {
        self(channel)
    }
}

/// A device that echoes everything it receives
///
/// All pending input is moved to the output, followed by the terminator.
#[derive(Debug, Clone, Default)]
pub struct EchoHook {
    terminator: String,
}

impl EchoHook {
    /// Echo input verbatim
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo input followed by `terminator` (e.g. `"\n"`)
    pub fn with_terminator(terminator: impl Into<String>) -> Self {
        Self {
            terminator: terminator.into(),
        }
    }
}

impl ProcessingHook for EchoHook {
    fn process(&mut self, channel: &mut Channel) {
        if channel.input.is_empty() {
            return;
        }

        let mut data = channel.take_input();
        debug!("Echo device received {:?}", data);
        data.push_str(&self.terminator);
        channel.push_output(&data);
    }
}

/// A device that answers delimited requests from a fixed script
///
/// Complete requests are consumed from the front of `input`; an incomplete
/// trailing request stays buffered until the rest arrives. Requests without a
/// scripted reply are dropped.
#[derive(Debug, Clone)]
pub struct ScriptedHook {
    delimiter: String,
    responses: HashMap<String, String>,
    unmatched: Vec<String>,
}

impl ScriptedHook {
    /// Create a script for requests terminated by `delimiter`
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            responses: HashMap::new(),
            unmatched: Vec::new(),
        }
    }

    /// Reply to `request` (without its delimiter) with `reply`
    pub fn respond(mut self, request: impl Into<String>, reply: impl Into<String>) -> Self {
        self.responses.insert(request.into(), reply.into());
        self
    }

    /// Requests received that had no scripted reply
    pub fn unmatched(&self) -> &[String] {
        &self.unmatched
    }
}

impl ProcessingHook for ScriptedHook {
    fn process(&mut self, channel: &mut Channel) {
        while let Some(frame) = take_frame(&mut channel.input, &self.delimiter) {
            let request = &frame[..frame.len() - self.delimiter.len()];
            match self.responses.get(request) {
                Some(reply) => {
                    debug!("Scripted device answering {:?} with {:?}", request, reply);
                    channel.push_output(reply);
                }
                None => {
                    warn!("Scripted device has no reply for {:?}", request);
                    self.unmatched.push(request.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_moves_input_to_output() {
        let mut hook = EchoHook::with_terminator("\n");
        let mut channel = Channel::new();
        channel.push_input("hello");

        hook.process(&mut channel);
        assert!(channel.input.is_empty());
        assert_eq!(channel.output, "hello\n");

        // Nothing pending, nothing echoed
        hook.process(&mut channel);
        assert_eq!(channel.output, "hello\n");
    }

    #[test]
    fn test_closure_hook() {
        let mut channel = Channel::new();
        let mut boxed: Box<dyn ProcessingHook> = Box::new(|c: &mut Channel| c.push_output("x"));

        boxed.process(&mut channel);
        boxed.process(&mut channel);
        assert_eq!(channel.output, "xx");
    }

    #[test]
    fn test_scripted_replies_in_order() {
        let mut hook = ScriptedHook::new("\r")
            .respond("AT", "OK\r\n")
            .respond("AT+VERSION", "v1.2\r\n");
        let mut channel = Channel::new();

        channel.push_input("AT\rAT+VERSION\rAT+NA");
        hook.process(&mut channel);

        assert_eq!(channel.output, "OK\r\nv1.2\r\n");
        // Incomplete request stays buffered
        assert_eq!(channel.input, "AT+NA");

        channel.push_input("ME\r");
        hook.process(&mut channel);
        assert!(channel.input.is_empty());
        assert_eq!(hook.unmatched(), ["AT+NAME".to_string()]);
    }
}
