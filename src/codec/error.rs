use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- CodecError ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid capacity {requested}: must be at least {minimum}")]
    InvalidCapacity { requested: usize, minimum: usize },

    #[error("offset {offset} outside of [0, {top}]")]
    InvalidOffset { offset: usize, top: usize },

    #[error("top {top} is below the read offset {offset}")]
    InvalidTop { top: usize, offset: usize },

    #[error("length {value} outside of [0, 0x1FFFFFFF]")]
    LengthOutOfRange { value: usize },

    #[error("malformed length prefix 0x{tag:02x} at offset {offset}")]
    MalformedLength { tag: u8, offset: usize },

    #[error("need {needed} bytes but only {remaining} remain")]
    Underflow { needed: usize, remaining: usize },

    #[error("range {pos}..{pos}+{len} outside of a {available} byte slice")]
    OutOfBounds {
        pos: usize,
        len: usize,
        available: usize,
    },
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
