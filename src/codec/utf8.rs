//! Three-byte UTF-8 variant used for string fields.
//!
//! Only code points up to U+FFFF are representable. U+0000 is written as the
//! two-byte sequence `C0 80`, and decoding stops silently at the first byte
//! that does not fit the scheme.

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const CONTINUATION_MASK: u8 = 0xC0;
const CONTINUATION_BITS: u8 = 0x80;

// -----------------------------------------------------------------------------
// ----- Encoding --------------------------------------------------------------

/// Number of bytes `encode_into` will produce for `value`.
pub fn encoded_len(value: &str) -> usize {
    value.chars().map(|c| width_of(u32::from(c))).sum()
}

/// Encode `value` into the front of `dst`, returning the number of bytes
/// written. `dst` must hold at least `encoded_len(value)` bytes.
pub fn encode_into(value: &str, dst: &mut [u8]) -> usize {
    let mut pos = 0;

    for c in value.chars() {
        let cp = u32::from(c);
        match width_of(cp) {
            1 => {
                dst[pos] = cp as u8;
                pos += 1;
            }
            3 => {
                dst[pos] = 0xE0 | ((cp >> 12) & 0x0F) as u8;
                dst[pos + 1] = 0x80 | ((cp >> 6) & 0x3F) as u8;
                dst[pos + 2] = 0x80 | (cp & 0x3F) as u8;
                pos += 3;
            }
            _ => {
                dst[pos] = 0xC0 | ((cp >> 6) & 0x1F) as u8;
                dst[pos + 1] = 0x80 | (cp & 0x3F) as u8;
                pos += 2;
            }
        }
    }

    pos
}

// -----------------------------------------------------------------------------
// ----- Decoding --------------------------------------------------------------

/// Decode as many whole code points as the scheme allows. Whatever was
/// decoded before an invalid or truncated sequence is returned.
pub fn decode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut pos = 0;

    while let Some(&lead) = bytes.get(pos) {
        match lead >> 4 {
            // 0xxx xxxx
            0..=7 => {
                out.push(char::from(lead));
                pos += 1;
            }

            // 110x xxxx 10xx xxxx
            12 | 13 => {
                let Some(&b1) = bytes.get(pos + 1) else {
                    break;
                };
                if !is_continuation(b1) {
                    break;
                }

                let cp = (u32::from(lead & 0x1F) << 6) | u32::from(b1 & 0x3F);
                out.push(to_char(cp));
                pos += 2;
            }

            // 1110 xxxx 10xx xxxx 10xx xxxx
            14 => {
                let (Some(&b1), Some(&b2)) = (bytes.get(pos + 1), bytes.get(pos + 2)) else {
                    break;
                };
                if !is_continuation(b1) || !is_continuation(b2) {
                    break;
                }

                let cp = (u32::from(lead & 0x0F) << 12)
                    | (u32::from(b1 & 0x3F) << 6)
                    | u32::from(b2 & 0x3F);
                out.push(to_char(cp));
                pos += 3;
            }

            // stray continuation byte or 4-byte lead
            _ => break,
        }
    }

    out
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

#[inline]
fn width_of(cp: u32) -> usize {
    match cp {
        0x0001..=0x007F => 1,
        0x0800.. => 3,
        // 0x0080..=0x07FF, and U+0000
        _ => 2,
    }
}

#[inline]
fn is_continuation(byte: u8) -> bool {
    byte & CONTINUATION_MASK == CONTINUATION_BITS
}

// Lone surrogates decode to U+FFFD.
#[inline]
fn to_char(cp: u32) -> char {
    char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &str) -> Vec<u8> {
        let mut dst = vec![0u8; encoded_len(value)];
        let written = encode_into(value, &mut dst);
        assert_eq!(written, dst.len());
        dst
    }

    #[test]
    fn ascii_is_one_byte_each() {
        assert_eq!(encode("abc"), b"abc");
    }

    #[test]
    fn two_and_three_byte_sequences_match_standard_utf8() {
        assert_eq!(encode("é"), "é".as_bytes());
        assert_eq!(encode("中"), "中".as_bytes());
        assert_eq!(encode("\u{7FF}\u{800}"), "\u{7FF}\u{800}".as_bytes());
    }

    #[test]
    fn nul_takes_the_two_byte_branch() {
        assert_eq!(encoded_len("\0"), 2);
        assert_eq!(encode("\0"), [0xC0, 0x80]);
        assert_eq!(decode(&[0xC0, 0x80]), "\0");
    }

    #[test]
    fn round_trips_every_code_point_up_to_0x7ff() {
        let all: String = (1u32..=0x7FF).filter_map(char::from_u32).collect();
        assert_eq!(decode(&encode(&all)), all);
    }

    #[test]
    fn round_trips_bmp_text() {
        let text = "hello server!|ünïcödé|日本語|\u{FFFD}";
        assert_eq!(decode(&encode(text)), text);
    }

    #[test]
    fn truncated_sequence_yields_prefix() {
        let mut bytes = encode("ab中");
        bytes.pop();
        assert_eq!(decode(&bytes), "ab");
    }

    #[test]
    fn bad_continuation_stops_decoding() {
        // 'a', then a 2-byte lead followed by ASCII instead of 10xx xxxx
        assert_eq!(decode(&[b'a', 0xC3, b'b', b'c']), "a");
    }

    #[test]
    fn four_byte_lead_stops_decoding() {
        let bytes = [b'o', b'k', 0xF0, 0x9F, 0x98, 0x80];
        assert_eq!(decode(&bytes), "ok");
    }

    #[test]
    fn stray_continuation_stops_decoding() {
        assert_eq!(decode(&[b'x', 0x80, b'y']), "x");
    }

    #[test]
    fn encoded_surrogate_decodes_to_replacement() {
        assert_eq!(decode(&[0xED, 0xA0, 0x80]), "\u{FFFD}");
    }

    #[test]
    fn supplementary_plane_is_lossy() {
        let bytes = encode("😀");
        assert_eq!(bytes.len(), 3);
        assert_ne!(decode(&bytes), "😀");
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
