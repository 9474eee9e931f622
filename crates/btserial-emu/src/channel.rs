//! Byte channel shared between the application and the emulated device
//!
//! `input` holds what the application wrote and the device has not consumed
//! yet. `output` holds what the device produced and the application has not
//! read yet. Reads only ever remove a prefix of `output`.

/// The emulated device's input/output buffers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    /// Data written by the application, waiting for the device
    pub input: String,
    /// Data produced by the device, waiting for the application
    pub output: String,
}

impl Channel {
    /// Create an empty channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Append application data to `input`
    pub fn push_input(&mut self, data: &str) {
        self.input.push_str(data);
    }

    /// Drain and return all of `input`
    pub fn take_input(&mut self) -> String {
        std::mem::take(&mut self.input)
    }

    /// Append device data to `output`
    pub fn push_output(&mut self, data: &str) {
        self.output.push_str(data);
    }

    /// Make `data` the whole of `output`
    pub fn replace_output(&mut self, data: &str) {
        self.output.clear();
        self.output.push_str(data);
    }

    /// Drain and return all of `output`
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Discard everything in `output`, leaving `input` alone
    pub fn clear_output(&mut self) {
        self.output.clear();
    }
}
