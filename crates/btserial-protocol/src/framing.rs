//! Delimiter framing and raw payload conversion
//!
//! The emulator's output buffer is a FIFO text stream. Frames are only ever
//! removed from its front, so the helpers here take `&mut String` and drain a
//! prefix rather than returning slices.

/// Remove and return the first delimiter-terminated frame in `buffer`
///
/// The returned frame includes the delimiter. Returns `None` (leaving the
/// buffer untouched) when the delimiter does not occur or is empty.
pub fn take_frame(buffer: &mut String, delimiter: &str) -> Option<String> {
    if delimiter.is_empty() {
        return None;
    }

    let end = buffer.find(delimiter)? + delimiter.len();
    let frame: String = buffer.drain(..end).collect();
    Some(frame)
}

/// Convert a text payload to bytes, one byte per character code
///
/// Characters above U+00FF keep only their low eight bits, matching an 8-bit
/// typed-array store.
pub fn to_raw_bytes(payload: &str) -> Vec<u8> {
    payload.chars().map(|c| (u32::from(c) & 0xFF) as u8).collect()
}

/// Convert raw bytes to a text payload, one character per byte (Latin-1)
pub fn from_raw_bytes(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}
