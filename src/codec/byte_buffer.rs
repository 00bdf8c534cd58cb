//! Growable byte store with independent write (`top`) and read (`offset`)
//! cursors.
//!
//! Layout of a field is decided by the caller: this type only knows how to put
//! and take primitives, tagged lengths, strings, and length-prefixed blobs.
//! String and blob reads never fail outright; they log and fall back to an
//! empty value so that a handler can keep going on a malformed message.

use bytes::{Buf, BufMut, Bytes};
use std::hash::{Hash, Hasher};
use tracing::warn;

use super::error::CodecError;
use super::options::{ByteOrder, CodecOptions};
use super::utf8;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Exclusive upper bound for values accepted by `write_length`.
pub const LENGTH_LIMIT: usize = 0x2000_0000;

const ONE_BYTE_LIMIT: usize = 0x80;
const TWO_BYTE_LIMIT: usize = 0x4000;

const ONE_BYTE_TAG: u8 = 0x80;
const TWO_BYTE_TAG: u16 = 0x4000;
const FOUR_BYTE_TAG: u32 = 0x2000_0000;

// -----------------------------------------------------------------------------
// ----- ByteBuffer ------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct ByteBuffer {
    store: Vec<u8>,
    top: usize,
    offset: usize,
    options: CodecOptions,
}

// -----------------------------------------------------------------------------
// ----- ByteBuffer: Static ----------------------------------------------------

impl ByteBuffer {
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            store: vec![0; options.initial_capacity.max(1)],
            top: 0,
            offset: 0,
            options,
        }
    }

    pub fn with_capacity(capacity: usize, options: CodecOptions) -> Result<Self, CodecError> {
        if capacity < 1 {
            warn!(capacity, "buffer capacity must be at least 1");
            return Err(CodecError::InvalidCapacity {
                requested: capacity,
                minimum: 1,
            });
        }

        Ok(Self {
            store: vec![0; capacity],
            top: 0,
            offset: 0,
            options,
        })
    }

    /// Wrap received bytes for reading. Every byte counts as written.
    pub fn wrap(bytes: impl Into<Vec<u8>>) -> Self {
        Self::wrap_with(bytes, CodecOptions::default())
    }

    pub fn wrap_with(bytes: impl Into<Vec<u8>>, options: CodecOptions) -> Self {
        let store = bytes.into();
        Self {
            top: store.len(),
            offset: 0,
            store,
            options,
        }
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// ----- ByteBuffer: Cursors & Capacity ----------------------------------------

impl ByteBuffer {
    /// Grow the store to the first size of the form `(prev << 1) + 1`, starting
    /// from the current capacity, that is at least `capacity`. Shrinking is
    /// rejected.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), CodecError> {
        let current = self.store.len();
        if capacity < current {
            warn!(capacity, current, "buffer capacity cannot shrink");
            return Err(CodecError::InvalidCapacity {
                requested: capacity,
                minimum: current,
            });
        }

        self.grow_to(capacity);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.store.len()
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn set_top(&mut self, top: usize) -> Result<(), CodecError> {
        if top < self.offset {
            warn!(top, offset = self.offset, "top cannot move below the read offset");
            return Err(CodecError::InvalidTop {
                top,
                offset: self.offset,
            });
        }

        if top > self.store.len() {
            self.grow_to(top);
        }
        self.top = top;
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn set_offset(&mut self, offset: usize) -> Result<(), CodecError> {
        if offset > self.top {
            warn!(offset, top = self.top, "offset outside of the written region");
            return Err(CodecError::InvalidOffset {
                offset,
                top: self.top,
            });
        }

        self.offset = offset;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.top - self.offset
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    pub fn options(&self) -> CodecOptions {
        self.options
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.options.byte_order
    }

    /// Zero both cursors. The store is kept for reuse.
    pub fn clear(&mut self) {
        self.top = 0;
        self.offset = 0;
    }

    /// Zero both cursors and drop the store.
    pub fn release(&mut self) {
        self.clear();
        self.store = Vec::new();
    }
}

// -----------------------------------------------------------------------------
// ----- ByteBuffer: Views -----------------------------------------------------

impl ByteBuffer {
    /// The written region `[0, top)`.
    pub fn as_slice(&self) -> &[u8] {
        &self.store[..self.top]
    }

    /// The whole backing store, including bytes past `top`.
    pub fn store(&self) -> &[u8] {
        &self.store
    }

    /// Copy of the unread region `[offset, top)`.
    pub fn remaining_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.store[self.offset..self.top])
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_slice())
    }

    pub fn into_bytes(self) -> Bytes {
        let mut store = self.store;
        store.truncate(self.top);
        Bytes::from(store)
    }

    /// Rolling hash over the written region, walked from the end.
    pub fn checksum(&self) -> i64 {
        self.as_slice()
            .iter()
            .rev()
            .fold(17i64, |h, &b| h.wrapping_mul(65537).wrapping_add(i64::from(b)))
    }
}

// -----------------------------------------------------------------------------
// ----- ByteBuffer: Raw -------------------------------------------------------

impl ByteBuffer {
    /// Append `src[pos..pos + len]`.
    pub fn write(&mut self, src: &[u8], pos: usize, len: usize) -> Result<(), CodecError> {
        let chunk = pos
            .checked_add(len)
            .and_then(|end| src.get(pos..end))
            .ok_or(CodecError::OutOfBounds {
                pos,
                len,
                available: src.len(),
            })?;

        self.write_slice(chunk);
        Ok(())
    }

    pub fn write_slice(&mut self, src: &[u8]) {
        self.reserve(src.len());
        self.store[self.top..self.top + src.len()].copy_from_slice(src);
        self.top += src.len();
    }

    /// Copy `len` unread bytes into `dst[pos..pos + len]`.
    pub fn read(&mut self, dst: &mut [u8], pos: usize, len: usize) -> Result<(), CodecError> {
        let available = dst.len();
        let target = pos
            .checked_add(len)
            .and_then(|end| dst.get_mut(pos..end))
            .ok_or(CodecError::OutOfBounds {
                pos,
                len,
                available,
            })?;

        target.copy_from_slice(self.take(len)?);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- ByteBuffer: Primitives ------------------------------------------------

impl ByteBuffer {
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn write_u8(&mut self, value: u8) {
        self.reserve_primitive(1);
        self.store[self.top] = value;
        self.top += 1;
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn write_i16(&mut self, value: i16) {
        let order = self.options.byte_order;
        order.put_i16(self.claim(2), value);
    }

    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        let order = self.options.byte_order;
        Ok(order.get_i16(self.take(2)?))
    }

    pub fn write_i32(&mut self, value: i32) {
        let order = self.options.byte_order;
        order.put_i32(self.claim(4), value);
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        let order = self.options.byte_order;
        Ok(order.get_i32(self.take(4)?))
    }

    pub fn write_i64(&mut self, value: i64) {
        let order = self.options.byte_order;
        order.put_i64(self.claim(8), value);
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        let order = self.options.byte_order;
        Ok(order.get_i64(self.take(8)?))
    }

    pub fn write_f64(&mut self, value: f64) {
        let order = self.options.byte_order;
        order.put_f64(self.claim(8), value);
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        let order = self.options.byte_order;
        Ok(order.get_f64(self.take(8)?))
    }
}

// -----------------------------------------------------------------------------
// ----- ByteBuffer: Length ----------------------------------------------------

impl ByteBuffer {
    /// Tagged variable-width length:
    ///
    /// | value                     | bytes | stored as              |
    /// |---------------------------|-------|------------------------|
    /// | `[0, 0x80)`               | 1     | `value + 0x80`         |
    /// | `[0x80, 0x4000)`          | 2     | `value + 0x4000`       |
    /// | `[0x4000, 0x20000000)`    | 4     | `value + 0x20000000`   |
    ///
    /// Anything larger is rejected and the buffer is left untouched.
    pub fn write_length(&mut self, value: usize) -> Result<(), CodecError> {
        if value >= LENGTH_LIMIT {
            warn!(value, "length out of range");
            return Err(CodecError::LengthOutOfRange { value });
        }

        if value >= TWO_BYTE_LIMIT {
            self.claim(4).put_u32(value as u32 + FOUR_BYTE_TAG);
        } else if value >= ONE_BYTE_LIMIT {
            self.claim(2).put_u16(value as u16 + TWO_BYTE_TAG);
        } else {
            self.write_u8(value as u8 + ONE_BYTE_TAG);
        }

        Ok(())
    }

    pub fn read_length(&mut self) -> Result<usize, CodecError> {
        let offset = self.offset;
        let Some(&tag) = self.as_slice().get(offset) else {
            return Err(CodecError::Underflow {
                needed: 1,
                remaining: 0,
            });
        };

        if tag >= 0x80 {
            self.offset += 1;
            return Ok(usize::from(tag - ONE_BYTE_TAG));
        }

        if tag >= 0x40 {
            let mut src = self.take(2)?;
            return Ok(usize::from(src.get_u16() - TWO_BYTE_TAG));
        }

        if tag >= 0x20 {
            let mut src = self.take(4)?;
            return Ok((src.get_u32() - FOUR_BYTE_TAG) as usize);
        }

        warn!(tag, offset, "malformed length prefix");
        Err(CodecError::MalformedLength { tag, offset })
    }
}

// -----------------------------------------------------------------------------
// ----- ByteBuffer: Strings & Blobs -------------------------------------------

impl ByteBuffer {
    /// Write `Length(encoded + 1)` followed by the encoded bytes. The extra one
    /// keeps an empty string apart from a missing one.
    pub fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        let encoded = utf8::encoded_len(value);
        self.write_length(encoded + 1)?;

        self.reserve(encoded);
        let written = utf8::encode_into(value, &mut self.store[self.top..self.top + encoded]);
        debug_assert_eq!(written, encoded);
        self.top += encoded;

        Ok(())
    }

    /// Read a string field. Any failure yields `""`; a malformed sequence
    /// yields the part decoded before it. The cursor always moves past the
    /// declared field, clamped to `top`.
    pub fn read_string(&mut self) -> String {
        let Ok(declared) = self.read_length() else {
            return String::new();
        };

        let len = match declared.checked_sub(1) {
            Some(0) | None => return String::new(),
            Some(len) => len,
        };

        if len > self.options.max_payload {
            warn!(len, max = self.options.max_payload, "string field exceeds payload limit");
            return String::new();
        }

        let start = self.offset;
        let end = start + len.min(self.remaining());
        if end - start < len {
            warn!(declared = len, available = end - start, "string field runs past top");
        }

        let decoded = utf8::decode(&self.store[start..end]);
        self.offset = end;
        decoded
    }

    pub fn write_data(&mut self, data: &[u8]) -> Result<(), CodecError> {
        self.write_length(data.len() + 1)?;
        self.write_slice(data);
        Ok(())
    }

    /// Read a blob field. `None` stands for a missing or malformed blob.
    pub fn read_data(&mut self) -> Option<Bytes> {
        let declared = self.read_length().ok()?;

        let Some(len) = declared.checked_sub(1) else {
            warn!("blob length prefix is zero");
            return None;
        };

        if len > self.options.max_payload {
            warn!(len, max = self.options.max_payload, "blob field exceeds payload limit");
            return None;
        }

        match self.take(len) {
            Ok(src) => Some(Bytes::copy_from_slice(src)),
            Err(e) => {
                warn!("blob field truncated: {e}");
                None
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ByteBuffer: Private Methods -------------------------------------------

impl ByteBuffer {
    fn grow_to(&mut self, capacity: usize) {
        let mut next = self.store.len();
        while next < capacity {
            next = (next << 1) + 1;
        }

        if next == self.store.len() {
            return;
        }

        let mut store = vec![0u8; next];
        store[..self.top].copy_from_slice(&self.store[..self.top]);
        self.store = store;
    }

    /// Room for `additional` more bytes past `top`.
    fn reserve(&mut self, additional: usize) {
        let needed = self.top + additional;
        if self.store.len() < needed {
            self.grow_to(needed);
        }
    }

    /// Primitives grow by at least the configured initial capacity so that a
    /// run of small writes does not reallocate on every call.
    fn reserve_primitive(&mut self, width: usize) {
        if self.store.len() < self.top + width {
            self.grow_to(self.top + width.max(self.options.initial_capacity));
        }
    }

    /// Reserve and hand out the next `width` bytes, advancing `top`.
    fn claim(&mut self, width: usize) -> &mut [u8] {
        self.reserve_primitive(width);
        let start = self.top;
        self.top += width;
        &mut self.store[start..start + width]
    }

    /// Hand out the next `width` unread bytes, advancing `offset`.
    fn take(&mut self, width: usize) -> Result<&[u8], CodecError> {
        let remaining = self.remaining();
        if remaining < width {
            return Err(CodecError::Underflow {
                needed: width,
                remaining,
            });
        }

        let start = self.offset;
        self.offset += width;
        Ok(&self.store[start..start + width])
    }
}

// -----------------------------------------------------------------------------
// ----- ByteBuffer: Equality --------------------------------------------------

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.top == other.top && self.offset == other.offset && self.as_slice() == other.as_slice()
    }
}

impl Eq for ByteBuffer {}

impl Hash for ByteBuffer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.top.hash(state);
        self.offset.hash(state);
        self.as_slice().hash(state);
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
