//! Legacy multi-byte (LMBCS) text codec.
//!
//! The engine stores text in a legacy multi-byte encoding, null-terminated.
//! The scheme implemented here:
//!
//! - `0x00`–`0x7F`: ASCII identity, except `0x14`, the escape lead;
//! - `0x80`–`0xFF`: Latin-1 supplement, one byte per character;
//! - `0x14 0x14`: a literal U+0014;
//! - `0x14` followed by one UTF-8 multi-byte sequence: any character at
//!   U+0100 or above. UTF-8 continuation bytes are never `0x00`, so escape
//!   sequences cannot collide with the terminator.
//!
//! Encoding is total: every host string has an encoding, and
//! `decode(encode(s)) == s` holds for all host-originated strings. The
//! reverse is *not* guaranteed for arbitrary external byte sequences:
//! malformed or truncated escapes decode to U+FFFD (the replacement
//! policy), so decode→encode is only the identity over previously decoded
//! values. Two legacy strings are therefore compared by raw bytes, never by
//! decoded form.

use std::fmt;

use crate::error::{GroveError, GroveResult};

/// Substituted for any byte sequence with no mapping.
pub const REPLACEMENT: char = '\u{FFFD}';

const ESCAPE_LEAD: u8 = 0x14;

/// An LMBCS byte string. Equality and hashing are over the raw bytes, not
/// the decoded form.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LmbcsString {
    bytes: Vec<u8>,
}

impl LmbcsString {
    /// Wraps raw LMBCS content bytes (no terminator).
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Encodes a host string (no terminator).
    pub fn from_str_encoded(s: &str) -> Self {
        Self {
            bytes: encode(s, false),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes, the unit of cache accounting.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Decodes this string's full content.
    pub fn decode(&self) -> String {
        decode(&self.bytes, self.bytes.len())
    }
}

impl fmt::Debug for LmbcsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LmbcsString({:?})", self.decode())
    }
}

/// Encodes a host string to LMBCS bytes, appending a single trailing zero
/// byte when `null_terminate` is set.
pub fn encode(s: &str, null_terminate: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + usize::from(null_terminate));
    for c in s.chars() {
        let cp = c as u32;
        if cp == u32::from(ESCAPE_LEAD) {
            out.push(ESCAPE_LEAD);
            out.push(ESCAPE_LEAD);
        } else if cp <= 0xFF {
            out.push(cp as u8);
        } else {
            out.push(ESCAPE_LEAD);
            let mut utf8 = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
        }
    }
    if null_terminate {
        out.push(0);
    }
    out
}

/// Encodes with a trailing terminator, enforcing a native length limit on
/// the encoded result (terminator included, as the native constants count
/// it).
pub fn encode_bounded(s: &str, max: usize, what: &'static str) -> GroveResult<Vec<u8>> {
    let encoded = encode(s, true);
    if encoded.len() > max {
        return Err(GroveError::LimitExceeded {
            what,
            max,
            actual: encoded.len(),
        });
    }
    Ok(encoded)
}

/// Total length of a UTF-8 sequence given its lead byte.
fn utf8_seq_len(lead: u8) -> Option<usize> {
    match lead {
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

/// Decodes at most `len` bytes of LMBCS content.
///
/// Stops at the first null byte, so `len` may safely exceed the actual
/// content length; it never reads past `bytes`. Malformed escapes decode to
/// [`REPLACEMENT`].
pub fn decode(bytes: &[u8], len: usize) -> String {
    let bound = len.min(bytes.len());
    let mut out = String::with_capacity(bound);
    let mut i = 0;
    while i < bound {
        let b = bytes[i];
        if b == 0 {
            break;
        }
        if b != ESCAPE_LEAD {
            // Single byte: ASCII or Latin-1 supplement.
            out.push(char::from(b));
            i += 1;
            continue;
        }
        if i + 1 >= bound {
            // Escape truncated by the bound or terminator.
            out.push(REPLACEMENT);
            i = bound;
            continue;
        }
        let next = bytes[i + 1];
        if next == ESCAPE_LEAD {
            out.push('\u{14}');
            i += 2;
            continue;
        }
        match utf8_seq_len(next) {
            Some(n) if i + 1 + n <= bound => {
                match std::str::from_utf8(&bytes[i + 1..i + 1 + n]) {
                    Ok(s) => {
                        out.push_str(s);
                        i += 1 + n;
                    }
                    Err(_) => {
                        out.push(REPLACEMENT);
                        i += 2;
                    }
                }
            }
            _ => {
                out.push(REPLACEMENT);
                i += 2;
            }
        }
    }
    out
}

/// Decodes a null-terminated out-buffer, scanning for the terminator the
/// way the native callers do.
pub fn decode_cstr(buf: &[u8]) -> String {
    decode(buf, buf.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ascii_roundtrip() {
        let s = "CN=Test User/O=Grove";
        let encoded = encode(s, false);
        assert_eq!(encoded, s.as_bytes());
        assert_eq!(decode(&encoded, encoded.len()), s);
    }

    #[test]
    fn test_latin1_single_byte() {
        let s = "Müller, René";
        let encoded = encode(s, false);
        // One byte per character.
        assert_eq!(encoded.len(), s.chars().count());
        assert_eq!(decode(&encoded, encoded.len()), s);
    }

    #[test]
    fn test_escaped_wide_characters_roundtrip() {
        for s in ["日本語", "Łódź", "data 🗄 store", "\u{14}escaped lead\u{14}"] {
            let encoded = encode(s, false);
            assert_eq!(decode(&encoded, encoded.len()), s, "roundtrip of {s:?}");
        }
    }

    #[test]
    fn test_null_terminate_appends_single_zero() {
        let encoded = encode("abc", true);
        assert_eq!(encoded, b"abc\0");
        assert_eq!(encode("", true), b"\0");
    }

    #[test]
    fn test_decode_stops_at_null() {
        let buf = b"abc\0garbage after terminator";
        assert_eq!(decode(buf, buf.len()), "abc");
    }

    #[test]
    fn test_decode_respects_length_bound() {
        let buf = b"abcdef";
        assert_eq!(decode(buf, 3), "abc");
        // Bound beyond the buffer is clamped, never read past.
        assert_eq!(decode(buf, 100), "abcdef");
    }

    #[test]
    fn test_truncated_escape_replaced() {
        // Escape lead with nothing after it.
        assert_eq!(decode(&[0x61, 0x14], 2), format!("a{REPLACEMENT}"));
        // Escape lead followed by a byte that is not a UTF-8 lead.
        assert_eq!(decode(&[0x14, 0x80, 0x62], 3), format!("{REPLACEMENT}b"));
        // Escape whose UTF-8 sequence is cut off by the bound.
        let cut = [0x14, 0xE6, 0x97];
        assert_eq!(decode(&cut, 3), REPLACEMENT.to_string());
    }

    #[test]
    fn test_byte_equality_not_decoded_equality() {
        // Both decode to the replacement character but differ in bytes.
        let a = LmbcsString::from_bytes(vec![0x14, 0x80]);
        let b = LmbcsString::from_bytes(vec![0x14, 0x81]);
        assert_eq!(a.decode(), b.decode());
        assert_ne!(a, b);
    }

    #[test]
    fn test_encode_bounded() {
        assert!(encode_bounded("short", 256, "path").is_ok());
        let err = encode_bounded(&"x".repeat(256), 256, "path").unwrap_err();
        match err {
            GroveError::LimitExceeded { what, max, actual } => {
                assert_eq!(what, "path");
                assert_eq!(max, 256);
                assert_eq!(actual, 257);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
