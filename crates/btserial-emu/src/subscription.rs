//! Subscription slots
//!
//! The emulator keeps at most one text subscription (delimiter + callback)
//! and, independently, at most one raw subscription. Installing a new one
//! replaces the previous.

use btserial_protocol::{take_frame, to_raw_bytes};

/// Callback receiving framed text messages
pub type DataCallback = Box<dyn FnMut(String) + Send>;

/// Callback receiving raw binary payloads
pub type RawDataCallback = Box<dyn FnMut(Vec<u8>) + Send>;

/// An active delimiter subscription
pub struct Subscription {
    /// Frame delimiter (included in delivered frames)
    pub delimiter: String,
    callback: DataCallback,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("delimiter", &self.delimiter)
            .field("callback", &"<callback>")
            .finish()
    }
}

/// Text and raw subscription slots
#[derive(Default)]
pub struct Subscriptions {
    text: Option<Subscription>,
    raw: Option<RawDataCallback>,
}

impl std::fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriptions")
            .field("text", &self.text)
            .field("raw", &self.raw.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Subscriptions {
    /// Install a text subscription, replacing any previous one
    pub fn subscribe(&mut self, delimiter: impl Into<String>, callback: DataCallback) {
        self.text = Some(Subscription {
            delimiter: delimiter.into(),
            callback,
        });
    }

    /// Remove the text subscription
    pub fn unsubscribe(&mut self) {
        self.text = None;
    }

    /// Install a raw subscription, replacing any previous one
    pub fn subscribe_raw(&mut self, callback: RawDataCallback) {
        self.raw = Some(callback);
    }

    /// Remove the raw subscription
    pub fn unsubscribe_raw(&mut self) {
        self.raw = None;
    }

    /// Extract at most one frame from `output` and deliver it
    ///
    /// Returns true if a frame was delivered.
    pub fn deliver_next_frame(&mut self, output: &mut String) -> bool {
        let Some(sub) = self.text.as_mut() else {
            return false;
        };
        match take_frame(output, &sub.delimiter) {
            Some(frame) => {
                (sub.callback)(frame);
                true
            }
            None => false,
        }
    }

    /// Deliver an already-framed message to the text subscriber
    pub fn deliver_text(&mut self, data: &str) -> bool {
        match self.text.as_mut() {
            Some(sub) => {
                (sub.callback)(data.to_string());
                true
            }
            None => false,
        }
    }

    /// Convert a text payload to bytes and deliver it to the raw subscriber
    pub fn deliver_raw(&mut self, payload: &str) -> bool {
        match self.raw.as_mut() {
            Some(callback) => {
                callback(to_raw_bytes(payload));
                true
            }
            None => false,
        }
    }
}
