//! Newline-delimited JSON codec for the bridge stream
//!
//! Bytes arrive from the stream in arbitrary chunks. [`BridgeCodec`] buffers
//! them and yields one decoded message per complete line, skipping (and
//! logging) lines that fail to decode.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{BridgeError, ParseError};
use crate::message::{BridgeEvent, BridgeRequest};

/// Maximum accepted line length in bytes
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Trait for codecs that can parse incoming message streams
pub trait MessageCodec {
    /// The message type produced by this codec
    type Message;

    /// Push raw bytes into the codec's buffer
    fn push_bytes(&mut self, data: &[u8]);

    /// Try to extract the next complete message from the buffer
    fn next_message(&mut self) -> Option<Self::Message>;

    /// Clear the internal buffer
    fn clear(&mut self);
}

/// Line-oriented JSON codec, generic over the decoded message type
#[derive(Debug)]
pub struct BridgeCodec<M> {
    buffer: Vec<u8>,
    /// Set after an overlong line was dropped; bytes are discarded until the
    /// next newline.
    skipping: bool,
    _message: PhantomData<M>,
}

/// Codec used by the client side (decodes host events)
pub type EventCodec = BridgeCodec<BridgeEvent>;

/// Codec used by the host side (decodes client requests)
pub type RequestCodec = BridgeCodec<BridgeRequest>;

impl<M> BridgeCodec<M> {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
            skipping: false,
            _message: PhantomData,
        }
    }

    /// Extract the next complete line (without its terminator)
    fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let pos = self.buffer.iter().position(|&b| b == b'\n')?;
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();

            if self.skipping {
                self.skipping = false;
                continue;
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(line);
        }
    }
}

impl<M> Default for BridgeCodec<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: DeserializeOwned> BridgeCodec<M> {
    /// Decode a single line
    pub fn decode_line(line: &[u8]) -> Result<M, ParseError> {
        serde_json::from_slice(line).map_err(|e| ParseError::InvalidMessage(e.to_string()))
    }
}

impl<M: DeserializeOwned> MessageCodec for BridgeCodec<M> {
    type Message = M;

    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent unbounded growth on a stream without newlines
        if self.buffer.len() > MAX_LINE_LEN && !self.buffer.contains(&b'\n') {
            warn!(
                "Dropping bridge input: {}",
                ParseError::LineTooLong {
                    len: self.buffer.len()
                }
            );
            self.buffer.clear();
            self.skipping = true;
        }
    }

    fn next_message(&mut self) -> Option<M> {
        loop {
            let line = self.next_line()?;
            match Self::decode_line(&line) {
                Ok(msg) => return Some(msg),
                Err(e) => {
                    warn!(
                        "Skipping undecodable bridge line {:?}: {}",
                        String::from_utf8_lossy(&line),
                        e
                    );
                }
            }
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.skipping = false;
    }
}

/// Encode a message as one newline-terminated JSON line
pub fn encode_message<M: Serialize>(msg: &M) -> Result<Vec<u8>, BridgeError> {
    let mut line = serde_json::to_vec(msg).map_err(|e| BridgeError::Encode(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}
