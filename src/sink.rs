// sink.rs
//
// Copyright (c) 2019-2023  Douglas Lau
//
//! Append-only byte buffer for the GIF stream

/// Growable, append-only byte buffer.
///
/// Every GIF record is written into one of these; the finished stream is
/// read back with [snapshot](#method.snapshot).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteSink {
    /// Bytes written so far
    data: Vec<u8>,
}

impl ByteSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty sink with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        ByteSink {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Append one byte
    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Append a whole slice
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append `len` bytes of a slice, starting at `offset`.
    ///
    /// The range is clamped to the slice.
    pub fn write_bytes_range(&mut self, bytes: &[u8], offset: usize, len: usize) {
        let start = offset.min(bytes.len());
        let end = start.saturating_add(len).min(bytes.len());
        self.data.extend_from_slice(&bytes[start..end]);
    }

    /// Append one byte per character (low 8 bits of the code point)
    pub fn write_ascii(&mut self, s: &str) {
        self.data.extend(s.chars().map(|c| c as u32 as u8));
    }

    /// Append a 16-bit little-endian value
    pub fn write_u16_le(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Get the number of bytes written
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a view of the current contents
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copy the current contents
    pub fn snapshot(&self) -> Box<[u8]> {
        self.data.clone().into_boxed_slice()
    }

    /// Take the written bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}
