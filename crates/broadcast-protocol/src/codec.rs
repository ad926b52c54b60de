//! Primitive wire codec for broadcasting frames.
//!
//! All integers are little-endian. Strings are encoded as a `u16` byte length
//! followed by that many UTF-8 bytes. Frames are never longer than
//! [`FRAME_CAPACITY`] bytes; the writer refuses to grow past it.

use crate::error::{ProtocolError, Result};

/// Maximum size of an encoded outbound frame.
pub const FRAME_CAPACITY: usize = 2048;

/// Encodes one outbound frame into a fixed-capacity buffer.
#[derive(Debug, Clone)]
pub struct FrameWriter {
    buffer: [u8; FRAME_CAPACITY],
    cursor: usize,
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameWriter {
    pub fn new() -> Self {
        Self {
            buffer: [0u8; FRAME_CAPACITY],
            cursor: 0,
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Bytes still available before the buffer is full.
    pub fn remaining(&self) -> usize {
        FRAME_CAPACITY.saturating_sub(self.cursor)
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        let remaining = self.remaining();
        if bytes.len() > remaining {
            return Err(ProtocolError::BufferOverrun {
                needed: bytes.len(),
                remaining,
            });
        }

        let end = self.cursor + bytes.len();
        let slot = self
            .buffer
            .get_mut(self.cursor..end)
            .ok_or(ProtocolError::BufferOverrun {
                needed: bytes.len(),
                remaining,
            })?;
        slot.copy_from_slice(bytes);
        self.cursor = end;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.put(&[value])
    }

    pub fn write_u16_le(&mut self, value: u16) -> Result<()> {
        self.put(&value.to_le_bytes())
    }

    pub fn write_i32_le(&mut self, value: i32) -> Result<()> {
        self.put(&value.to_le_bytes())
    }

    pub fn write_f32_le(&mut self, value: f32) -> Result<()> {
        self.put(&value.to_le_bytes())
    }

    /// Writes a length-prefixed UTF-8 string.
    ///
    /// The prefix counts bytes, not characters. Capacity is checked for the
    /// prefix and body together, so a failed write leaves no partial prefix.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        let length =
            u16::try_from(bytes.len()).map_err(|_| ProtocolError::StringTooLong { len: bytes.len() })?;

        let needed = bytes.len() + 2;
        let remaining = self.remaining();
        if needed > remaining {
            return Err(ProtocolError::BufferOverrun { needed, remaining });
        }

        self.write_u16_le(length)?;
        self.put(bytes)
    }

    /// Returns exactly the bytes written so far.
    pub fn finalize(&self) -> &[u8] {
        self.buffer.get(..self.cursor).unwrap_or_default()
    }

    /// Consumes the writer and returns the written bytes as one datagram.
    pub fn into_frame(self) -> Vec<u8> {
        self.finalize().to_vec()
    }
}

/// Decodes one inbound datagram.
///
/// Every read is bounds-checked against the datagram; a read that would run
/// past the end fails with [`ProtocolError::Truncated`] and leaves the cursor
/// where it was.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread tail of the datagram.
    pub fn rest(&self) -> &'a [u8] {
        self.data.get(self.offset..).unwrap_or_default()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let truncated = ProtocolError::Truncated {
            needed: len,
            offset: self.offset,
            len: self.data.len(),
        };
        let end = self.offset.checked_add(len).ok_or(truncated.clone())?;
        let slice = self.data.get(self.offset..end).ok_or(truncated)?;
        self.offset = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let [value] = self.read_array::<1>()?;
        Ok(value)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// On failure the cursor is restored to the start of the length prefix.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.offset;
        let result = self.read_string_inner();
        if result.is_err() {
            self.offset = start;
        }
        result
    }

    fn read_string_inner(&mut self) -> Result<String> {
        let length = usize::from(self.read_u16_le()?);
        let body_offset = self.offset;
        let raw = self.read_bytes(length)?;
        core::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8 {
                offset: body_offset,
            })
    }
}
