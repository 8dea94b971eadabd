//! The `\HH` escape codec.
//!
//! Escapes are exactly a backslash followed by two uppercase hex digits;
//! `\\` is not a valid escape, the backslash byte is `\5C`. Bytes at or
//! above 128 are never escaped.

use crate::classify::{is_ident_char, is_whitespace};
use crate::cursor::Cursor;
use crate::error::LexError;

/// Bytes that must be `\HH`-escaped in every context.
pub const CONTROL_CHARS: &[u8] = b"()[]{}~#'\"\\:";

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// `true` for bytes in the control-character set.
pub fn is_control_char(b: u8) -> bool {
    CONTROL_CHARS.contains(&b)
}

/// Where a byte is being emitted; contexts differ in their unsafe sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeContext {
    /// Identifier or symbol body.
    Ident,
    /// Inside a `"…"` literal.
    StringLit,
    /// Inside a `'…'` literal.
    CharLit,
    /// Inside a `#…#` comment.
    Comment,
    /// The filename field of line information.
    FileName,
}

/// Whether `b` must be escaped when emitted in `ctx`.
pub fn needs_escape(b: u8, ctx: EscapeContext) -> bool {
    if is_control_char(b) {
        return true;
    }
    match ctx {
        EscapeContext::Ident => !is_ident_char(b),
        EscapeContext::StringLit | EscapeContext::CharLit => b < 0x20,
        EscapeContext::Comment => b < 0x20 && b != b'\t',
        EscapeContext::FileName => b == b',' || is_whitespace(b) || b < 0x20,
    }
}

/// Append `b` to `out`, escaping it as `\HH` when `ctx` requires.
pub fn push_escaped(out: &mut Vec<u8>, b: u8, ctx: EscapeContext) {
    if needs_escape(b, ctx) {
        push_hex_escape(out, b);
    } else {
        out.push(b);
    }
}

/// Append the uppercase `\HH` form of `b`.
pub fn push_hex_escape(out: &mut Vec<u8>, b: u8) {
    out.push(b'\\');
    out.push(HEX_DIGITS[(b >> 4) as usize]);
    out.push(HEX_DIGITS[(b & 0xF) as usize]);
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode the two hex nibbles following an already-consumed `\`.
///
/// Lowercase hex digits are rejected; the grammar is uppercase-only.
pub fn decode_hex_escape(cursor: &mut Cursor<'_>) -> Result<u8, LexError> {
    let offset = cursor.offset().saturating_sub(1);
    let hi = cursor
        .bump()
        .and_then(hex_value)
        .ok_or(LexError::BadEscape { offset })?;
    let lo = cursor
        .bump()
        .and_then(hex_value)
        .ok_or(LexError::BadEscape { offset })?;
    Ok(hi << 4 | lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Result<u8, LexError> {
        let mut cursor = Cursor::new(input);
        cursor.bump();
        decode_hex_escape(&mut cursor)
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode(b"\\0A"), Ok(0x0A));
        assert_eq!(decode(b"\\5C"), Ok(b'\\'));
        assert_eq!(decode(b"\\FF"), Ok(0xFF));
    }

    #[test]
    fn test_decode_rejects_lowercase_and_short() {
        assert!(decode(b"\\0a").is_err());
        assert!(decode(b"\\5").is_err());
        assert!(decode(b"\\\\").is_err());
    }

    #[test]
    fn test_involution_over_control_set() {
        for &b in CONTROL_CHARS {
            let mut out = Vec::new();
            push_hex_escape(&mut out, b);
            assert_eq!(decode(&out), Ok(b));
        }
    }

    #[test]
    fn test_context_rules() {
        // control characters escape everywhere
        for ctx in [
            EscapeContext::Ident,
            EscapeContext::StringLit,
            EscapeContext::CharLit,
            EscapeContext::Comment,
            EscapeContext::FileName,
        ] {
            assert!(needs_escape(b'(', ctx));
            assert!(needs_escape(b'\\', ctx));
        }
        // space is fine in strings, not in identifiers or filenames
        assert!(!needs_escape(b' ', EscapeContext::StringLit));
        assert!(needs_escape(b' ', EscapeContext::Ident));
        assert!(needs_escape(b' ', EscapeContext::FileName));
        // commas only matter in filenames
        assert!(needs_escape(b',', EscapeContext::FileName));
        assert!(!needs_escape(b',', EscapeContext::StringLit));
        // bytes >= 128 are always literal
        assert!(!needs_escape(0xC3, EscapeContext::Ident));
        assert!(!needs_escape(0xC3, EscapeContext::StringLit));
    }

    #[test]
    fn test_push_escaped_uppercase() {
        let mut out = Vec::new();
        push_escaped(&mut out, 0x0A, EscapeContext::StringLit);
        assert_eq!(out, b"\\0A");
    }
}
