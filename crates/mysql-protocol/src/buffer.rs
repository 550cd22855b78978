//! Growable, cursor-based packet buffer.
//!
//! [`Buffer`] holds one classic-protocol payload and encodes or decodes its
//! primitives relative to a cursor:
//!
//! - fixed-width little-endian integers of 1, 2, 3, 4 and 8 bytes
//! - length-encoded integers
//! - null-terminated strings and fixed-length strings in a caller-chosen
//!   character encoding
//! - raw byte ranges bounded by an explicit length or a preceding
//!   length-encoded integer
//!
//! ## Length-encoded integers
//!
//! | First byte | Meaning |
//! |------------|---------|
//! | `0x00..=0xFA` | the value itself |
//! | `0xFB` | NULL ([`Buffer::read_field_length`]) or zero ([`Buffer::read_length`]) |
//! | `0xFC` | 2-byte little-endian value follows |
//! | `0xFD` | 3-byte little-endian value follows |
//! | `0xFE` | 8-byte little-endian value follows |
//!
//! A column value of NULL and a column value of length zero are different
//! things, so the two readers are kept apart.
//!
//! ## Storage
//!
//! The buffer tracks three quantities with `cursor <= len <= capacity`.
//! Writes first make sure `cursor + n` bytes are addressable. When that
//! still fits in the backing storage only the logical length moves;
//! otherwise the storage grows by a quarter (at least enough for the
//! request) and existing bytes are copied over. Buffers are meant to be
//! cleared and reused across exchanges so the first path is the common one.

use std::fmt;

use bytes::Bytes;

use crate::charset;
use crate::error::{ProtocolError, Result};

/// Default capacity for a new buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Length-encoded prefix meaning NULL in a field-length context.
pub const NULL_LENGTH_PREFIX: u8 = 0xFB;

/// Length-encoded prefix announcing a 2-byte value.
pub const U16_LENGTH_PREFIX: u8 = 0xFC;

/// Length-encoded prefix announcing a 3-byte value.
pub const U24_LENGTH_PREFIX: u8 = 0xFD;

/// Length-encoded prefix announcing an 8-byte value.
pub const U64_LENGTH_PREFIX: u8 = 0xFE;

/// Largest value a 3-byte integer can hold.
pub const MAX_U24: u32 = 0x00FF_FFFF;

/// Number of bytes [`Buffer::write_length_encoded`] uses for `value`.
#[must_use]
pub const fn length_encoded_size(value: u64) -> usize {
    if value < NULL_LENGTH_PREFIX as u64 {
        1
    } else if value <= u16::MAX as u64 {
        3
    } else if value <= MAX_U24 as u64 {
        4
    } else {
        9
    }
}

/// A growable byte buffer with a read/write cursor.
///
/// A `Buffer` is exclusively owned; it performs no internal locking and is
/// mutated only through its own cursor-relative methods.
#[derive(Clone)]
pub struct Buffer {
    /// Backing storage. Its length is the buffer capacity.
    data: Vec<u8>,
    /// Logical length: bytes that hold meaningful data.
    len: usize,
    /// Read/write cursor.
    pos: usize,
}

impl Buffer {
    /// Create an empty buffer with [`DEFAULT_BUFFER_SIZE`] bytes of storage.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create an empty buffer with the given storage capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            len: 0,
            pos: 0,
        }
    }

    /// Wrap received bytes for reading. The cursor starts at zero.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        Self { data, len, pos: 0 }
    }

    /// Capacity of the backing storage.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Logical length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the logical length is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current cursor position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes between the cursor and the logical length.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.len - self.pos
    }

    /// Move the cursor. The new position must not pass the logical length.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.len {
            return Err(ProtocolError::CursorOutOfRange {
                position,
                len: self.len,
            });
        }
        self.pos = position;
        Ok(())
    }

    /// Change the logical length without touching the bytes.
    ///
    /// The length must fit in the backing storage and must not fall behind
    /// the cursor.
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.data.len() {
            return Err(ProtocolError::CursorOutOfRange {
                position: len,
                len: self.data.len(),
            });
        }
        if len < self.pos {
            return Err(ProtocolError::CursorOutOfRange {
                position: self.pos,
                len,
            });
        }
        self.len = len;
        Ok(())
    }

    /// Rewind the cursor to the start, keeping the contents for re-reading.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Drop the contents but keep the backing storage for the next exchange.
    pub fn clear(&mut self) {
        self.pos = 0;
        self.len = 0;
    }

    /// Cut the logical length back to the cursor.
    pub fn truncate_to_cursor(&mut self) {
        self.len = self.pos;
    }

    /// Move the cursor forward by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// The logically meaningful bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Copy the logically meaningful bytes into a `Bytes`.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_slice())
    }

    /// Convert into a `Bytes` holding the logically meaningful bytes.
    #[must_use]
    pub fn freeze(mut self) -> Bytes {
        self.data.truncate(self.len);
        Bytes::from(self.data)
    }

    /// Make `cursor + additional` bytes addressable.
    ///
    /// Only the logical length changes when the backing storage is already
    /// large enough. Otherwise the storage is reallocated and copied.
    pub fn ensure_capacity(&mut self, additional: usize) {
        let required = self.pos.saturating_add(additional);
        if required <= self.len {
            return;
        }

        let capacity = self.data.len();
        if required <= capacity {
            self.len = required;
            return;
        }

        let mut new_capacity = capacity + capacity / 4;
        if new_capacity < capacity + additional {
            new_capacity = capacity + additional + additional / 4;
        }
        let new_capacity = new_capacity.max(required);

        let mut grown = vec![0; new_capacity];
        grown[..capacity].copy_from_slice(&self.data);
        self.data = grown;
        self.len = required;

        tracing::trace!(
            old_capacity = capacity,
            new_capacity = new_capacity,
            "grew packet buffer"
        );
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let available = self.remaining();
        if n > available {
            return Err(ProtocolError::UnexpectedEof {
                needed: n,
                available,
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..start + n])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Look at the byte under the cursor without consuming it.
    pub fn peek_u8(&self) -> Result<u8> {
        self.as_slice()
            .get(self.pos)
            .copied()
            .ok_or(ProtocolError::UnexpectedEof {
                needed: 1,
                available: 0,
            })
    }

    /// Read a 1-byte integer.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Read a 2-byte little-endian integer.
    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    /// Read a 3-byte little-endian integer.
    pub fn read_u24_le(&mut self) -> Result<u32> {
        let [a, b, c] = self.take_array()?;
        Ok(u32::from_le_bytes([a, b, c, 0]))
    }

    /// Read a 4-byte little-endian integer.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    /// Read an 8-byte little-endian integer.
    pub fn read_u64_le(&mut self) -> Result<u64> {
        self.take_array().map(u64::from_le_bytes)
    }

    /// Read the value following a length-encoded prefix byte.
    fn read_length_tail(&mut self, prefix: u8) -> Result<u64> {
        match prefix {
            U16_LENGTH_PREFIX => self.read_u16_le().map(u64::from),
            U24_LENGTH_PREFIX => self.read_u24_le().map(u64::from),
            U64_LENGTH_PREFIX => self.read_u64_le(),
            other => Err(ProtocolError::InvalidLengthPrefix(other)),
        }
    }

    /// Read a length-encoded integer in a column-value context.
    ///
    /// Returns `None` when the prefix is `0xFB`, which marks a NULL value.
    pub fn read_field_length(&mut self) -> Result<Option<u64>> {
        let prefix = self.read_u8()?;
        match prefix {
            0..NULL_LENGTH_PREFIX => Ok(Some(u64::from(prefix))),
            NULL_LENGTH_PREFIX => Ok(None),
            _ => self.read_length_tail(prefix).map(Some),
        }
    }

    /// Read a length-encoded integer where NULL cannot occur.
    ///
    /// A `0xFB` prefix reads as zero here.
    pub fn read_length(&mut self) -> Result<u64> {
        let prefix = self.read_u8()?;
        match prefix {
            0..NULL_LENGTH_PREFIX => Ok(u64::from(prefix)),
            NULL_LENGTH_PREFIX => Ok(0),
            _ => self.read_length_tail(prefix),
        }
    }

    fn length_to_usize(&self, length: u64) -> Result<usize> {
        usize::try_from(length).map_err(|_| ProtocolError::UnexpectedEof {
            needed: usize::MAX,
            available: self.remaining(),
        })
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        self.take(len)
    }

    /// Read raw bytes preceded by a length-encoded integer.
    ///
    /// Returns `None` for a NULL value.
    pub fn read_length_encoded_bytes(&mut self) -> Result<Option<&[u8]>> {
        match self.read_field_length()? {
            Some(length) => {
                let len = self.length_to_usize(length)?;
                self.take(len).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Skip over a length-encoded byte range, NULL included.
    pub fn skip_length_encoded_bytes(&mut self) -> Result<()> {
        self.read_length_encoded_bytes().map(|_| ())
    }

    /// Read everything from the cursor to the logical length.
    pub fn read_rest(&mut self) -> &[u8] {
        let start = self.pos;
        self.pos = self.len;
        &self.data[start..self.len]
    }

    /// Read bytes up to a zero byte and move past the terminator.
    pub fn read_null_terminated_bytes(&mut self) -> Result<&[u8]> {
        let start = self.pos;
        let Some(offset) = self.data[start..self.len].iter().position(|&b| b == 0) else {
            return Err(ProtocolError::UnexpectedEof {
                needed: self.remaining() + 1,
                available: self.remaining(),
            });
        };
        self.pos = start + offset + 1;
        Ok(&self.data[start..start + offset])
    }

    /// Read a null-terminated string in the named encoding.
    pub fn read_null_terminated_string(&mut self, encoding: &str) -> Result<String> {
        let encoding = charset::encoding_for_name(encoding)?;
        let bytes = self.read_null_terminated_bytes()?;
        charset::decode_with(bytes, encoding)
    }

    /// Read a string of exactly `len` bytes in the named encoding.
    pub fn read_string(&mut self, len: usize, encoding: &str) -> Result<String> {
        let encoding = charset::encoding_for_name(encoding)?;
        let bytes = self.take(len)?;
        charset::decode_with(bytes, encoding)
    }

    /// Read a string preceded by a length-encoded integer.
    ///
    /// Returns `None` for a NULL value.
    pub fn read_length_encoded_string(&mut self, encoding: &str) -> Result<Option<String>> {
        let encoding = charset::encoding_for_name(encoding)?;
        self.read_length_encoded_bytes()?
            .map(|bytes| charset::decode_with(bytes, encoding))
            .transpose()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    fn put(&mut self, src: &[u8]) {
        self.ensure_capacity(src.len());
        let start = self.pos;
        self.data[start..start + src.len()].copy_from_slice(src);
        self.pos += src.len();
    }

    /// Write a 1-byte integer.
    pub fn write_u8(&mut self, value: u8) {
        self.put(&[value]);
    }

    /// Write a 2-byte little-endian integer.
    pub fn write_u16_le(&mut self, value: u16) {
        self.put(&value.to_le_bytes());
    }

    /// Write the low three bytes of `value` little-endian.
    pub fn write_u24_le(&mut self, value: u32) {
        self.put(&value.to_le_bytes()[..3]);
    }

    /// Write a 4-byte little-endian integer.
    pub fn write_u32_le(&mut self, value: u32) {
        self.put(&value.to_le_bytes());
    }

    /// Write an 8-byte little-endian integer.
    pub fn write_u64_le(&mut self, value: u64) {
        self.put(&value.to_le_bytes());
    }

    /// Write a length-encoded integer using the shortest form.
    pub fn write_length_encoded(&mut self, value: u64) {
        match length_encoded_size(value) {
            1 => self.write_u8(value as u8),
            3 => {
                self.write_u8(U16_LENGTH_PREFIX);
                self.write_u16_le(value as u16);
            }
            4 => {
                self.write_u8(U24_LENGTH_PREFIX);
                self.write_u24_le(value as u32);
            }
            _ => {
                self.write_u8(U64_LENGTH_PREFIX);
                self.write_u64_le(value);
            }
        }
    }

    /// Write the NULL marker used in column-value contexts.
    pub fn write_null(&mut self) {
        self.write_u8(NULL_LENGTH_PREFIX);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, src: &[u8]) {
        self.put(src);
    }

    /// Write raw bytes preceded by their length-encoded size.
    pub fn write_length_encoded_bytes(&mut self, src: &[u8]) {
        self.ensure_capacity(length_encoded_size(src.len() as u64) + src.len());
        self.write_length_encoded(src.len() as u64);
        self.put(src);
    }

    /// Write raw bytes followed by a zero terminator.
    pub fn write_null_terminated_bytes(&mut self, src: &[u8]) {
        self.ensure_capacity(src.len() + 1);
        self.put(src);
        self.write_u8(0);
    }

    /// Write a string in the named encoding without any length information.
    ///
    /// Returns the number of bytes written.
    pub fn write_string(&mut self, s: &str, encoding: &str) -> Result<usize> {
        let bytes = charset::encode(s, encoding)?;
        self.put(&bytes);
        Ok(bytes.len())
    }

    /// Write a string in the named encoding followed by a zero terminator.
    pub fn write_null_terminated_string(&mut self, s: &str, encoding: &str) -> Result<()> {
        let bytes = charset::encode(s, encoding)?;
        self.write_null_terminated_bytes(&bytes);
        Ok(())
    }

    /// Write a string in the named encoding preceded by its encoded length.
    pub fn write_length_encoded_string(&mut self, s: &str, encoding: &str) -> Result<()> {
        let bytes = charset::encode(s, encoding)?;
        self.write_length_encoded_bytes(&bytes);
        Ok(())
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<Bytes> for Buffer {
    fn from(data: Bytes) -> Self {
        Self::from_vec(Vec::from(data))
    }
}

impl From<&[u8]> for Buffer {
    fn from(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("position", &self.pos)
            .field("len", &self.len)
            .field("capacity", &self.data.len())
            .finish()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn length_encoded_roundtrip(value in any::<u64>()) {
            let mut buf = Buffer::with_capacity(0);
            buf.write_length_encoded(value);
            let mut read = Buffer::from(buf.as_slice());
            prop_assert_eq!(read.read_length(), Ok(value));
        }

        #[test]
        fn bytes_survive_growth(chunks in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 0..300), 0..20)
        ) {
            let mut buf = Buffer::with_capacity(1);
            let mut expected = Vec::new();
            for chunk in &chunks {
                buf.write_length_encoded_bytes(chunk);
                expected.push(chunk.clone());
            }
            let mut read = Buffer::from(buf.as_slice());
            for chunk in expected {
                let got = read.read_length_encoded_bytes().map(|b| b.map(<[u8]>::to_vec));
                prop_assert_eq!(got, Ok(Some(chunk)));
            }
        }
    }
}
