use bytes::{Buf, BufMut};
use serde::Deserialize;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_CAPACITY: usize = 32;
pub const DEFAULT_MAX_PAYLOAD: usize = 400 * 1024;

// -----------------------------------------------------------------------------
// ----- ByteOrder -------------------------------------------------------------

/// Byte order applied to multi-byte primitives. Length prefixes are not
/// affected: their tag must lead, so they are always written big-endian.
#[derive(clap::ValueEnum, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ByteOrder {
    #[default]
    #[serde(rename = "big_endian", alias = "big")]
    #[value(name = "big_endian", alias = "big")]
    BigEndian,

    #[serde(rename = "little_endian", alias = "lit_endian", alias = "little")]
    #[value(name = "little_endian", alias = "lit_endian", alias = "little")]
    LittleEndian,
}

impl ByteOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            ByteOrder::BigEndian => "big_endian",
            ByteOrder::LittleEndian => "little_endian",
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ByteOrder: Primitive Access -------------------------------------------

impl ByteOrder {
    pub(crate) fn put_i16(self, mut dst: &mut [u8], value: i16) {
        match self {
            ByteOrder::BigEndian => dst.put_i16(value),
            ByteOrder::LittleEndian => dst.put_i16_le(value),
        }
    }

    pub(crate) fn put_i32(self, mut dst: &mut [u8], value: i32) {
        match self {
            ByteOrder::BigEndian => dst.put_i32(value),
            ByteOrder::LittleEndian => dst.put_i32_le(value),
        }
    }

    pub(crate) fn put_i64(self, mut dst: &mut [u8], value: i64) {
        match self {
            ByteOrder::BigEndian => dst.put_i64(value),
            ByteOrder::LittleEndian => dst.put_i64_le(value),
        }
    }

    pub(crate) fn put_f64(self, mut dst: &mut [u8], value: f64) {
        match self {
            ByteOrder::BigEndian => dst.put_f64(value),
            ByteOrder::LittleEndian => dst.put_f64_le(value),
        }
    }

    pub(crate) fn get_i16(self, mut src: &[u8]) -> i16 {
        match self {
            ByteOrder::BigEndian => src.get_i16(),
            ByteOrder::LittleEndian => src.get_i16_le(),
        }
    }

    pub(crate) fn get_i32(self, mut src: &[u8]) -> i32 {
        match self {
            ByteOrder::BigEndian => src.get_i32(),
            ByteOrder::LittleEndian => src.get_i32_le(),
        }
    }

    pub(crate) fn get_i64(self, mut src: &[u8]) -> i64 {
        match self {
            ByteOrder::BigEndian => src.get_i64(),
            ByteOrder::LittleEndian => src.get_i64_le(),
        }
    }

    pub(crate) fn get_f64(self, mut src: &[u8]) -> f64 {
        match self {
            ByteOrder::BigEndian => src.get_f64(),
            ByteOrder::LittleEndian => src.get_f64_le(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- CodecOptions ----------------------------------------------------------

/// Per-buffer codec settings. Sessions hand theirs to every buffer they
/// create, so two servers in one process can speak different byte orders.
#[derive(Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CodecOptions {
    pub byte_order: ByteOrder,
    pub initial_capacity: usize,
    pub max_payload: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::BigEndian,
            initial_capacity: DEFAULT_CAPACITY,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl CodecOptions {
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_follow_the_selected_order() {
        let mut big = [0u8; 4];
        let mut little = [0u8; 4];

        ByteOrder::BigEndian.put_i32(&mut big, 0x0102_0304);
        ByteOrder::LittleEndian.put_i32(&mut little, 0x0102_0304);

        assert_eq!(big, [1, 2, 3, 4]);
        assert_eq!(little, [4, 3, 2, 1]);
        assert_eq!(ByteOrder::LittleEndian.get_i32(&little), 0x0102_0304);
    }

    #[test]
    fn legacy_spellings_deserialize() {
        #[derive(Deserialize)]
        struct Doc {
            order: ByteOrder,
        }

        let doc: Doc = toml::from_str(r#"order = "lit_endian""#).unwrap();
        assert_eq!(doc.order, ByteOrder::LittleEndian);

        let doc: Doc = toml::from_str(r#"order = "big_endian""#).unwrap();
        assert_eq!(doc.order, ByteOrder::BigEndian);
    }

    #[test]
    fn partial_options_fall_back_to_defaults() {
        let opts: CodecOptions = toml::from_str("max_payload = 1024").unwrap();
        assert_eq!(opts.max_payload, 1024);
        assert_eq!(opts.initial_capacity, DEFAULT_CAPACITY);
        assert_eq!(opts.byte_order, ByteOrder::BigEndian);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
