// codec/mod.rs
//! Binary message codec: a cursor-based byte buffer plus the tagged length and
//! three-byte UTF-8 schemes it writes.

pub mod byte_buffer;
pub mod error;
pub mod options;
pub mod utf8;

pub use byte_buffer::{ByteBuffer, LENGTH_LIMIT};
pub use error::CodecError;
pub use options::{ByteOrder, CodecOptions};
