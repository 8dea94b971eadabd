//! Token scanners driven by the parser.
//!
//! Each scanner assumes the cursor sits on a byte whose [`classify`]
//! result selected it, and leaves the cursor on the first byte after the
//! token. Escapes are decoded into the returned payloads.

use crate::classify::{self, TokenClass};
use crate::cursor::Cursor;
use crate::error::LexError;
use crate::escape;

/// An identifier or symbol body with escapes decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Decoded bytes of the word.
    pub bytes: Vec<u8>,
    /// `true` when at least one unescaped dot was consumed, making this a
    /// symbol rather than an identifier.
    pub has_dot: bool,
}

impl Word {
    /// `true` when the word ends with the trailing-dot expansion marker.
    pub fn trailing_dot(&self) -> bool {
        self.bytes.ends_with(b".")
    }
}

/// Scan an identifier or symbol starting at the cursor.
///
/// After the initial identifier run, dots switch the token into symbol
/// mode and stay part of it, including a trailing dot.
pub fn scan_word(cursor: &mut Cursor<'_>) -> Result<Word, LexError> {
    let mut bytes = Vec::new();
    let mut has_dot = false;
    loop {
        match cursor.peek() {
            Some(b'\\') => {
                cursor.bump();
                bytes.push(escape::decode_hex_escape(cursor)?);
            }
            Some(b'.') if !bytes.is_empty() => {
                cursor.bump();
                bytes.push(b'.');
                has_dot = true;
            }
            Some(b) if classify::is_ident_char(b) => {
                cursor.bump();
                bytes.push(b);
            }
            _ => break,
        }
    }
    Ok(Word { bytes, has_dot })
}

/// Scan a string literal; the cursor sits on the opening `"`.
pub fn scan_string(cursor: &mut Cursor<'_>) -> Result<Vec<u8>, LexError> {
    let start = cursor.offset();
    cursor.bump();
    let mut bytes = Vec::new();
    loop {
        match cursor.bump() {
            None => return Err(LexError::UnterminatedString { offset: start }),
            Some(b'"') => return Ok(bytes),
            Some(b'\\') => bytes.push(escape::decode_hex_escape(cursor)?),
            Some(b) => bytes.push(b),
        }
    }
}

/// Scan a character literal; the cursor sits on the opening `'`.
pub fn scan_char(cursor: &mut Cursor<'_>) -> Result<u8, LexError> {
    let start = cursor.offset();
    cursor.bump();
    let value = match cursor.peek() {
        None | Some(b'\'') => return Err(LexError::UnterminatedChar { offset: start }),
        Some(b'\\') => {
            cursor.bump();
            escape::decode_hex_escape(cursor)?
        }
        Some(b) => {
            cursor.bump();
            b
        }
    };
    match cursor.bump() {
        Some(b'\'') => Ok(value),
        _ => Err(LexError::UnterminatedChar { offset: start }),
    }
}

/// Scan a comment; the cursor sits on the opening `#`. The closing `#` is
/// consumed and not part of the returned bytes.
pub fn scan_comment(cursor: &mut Cursor<'_>) -> Result<Vec<u8>, LexError> {
    let start = cursor.offset();
    cursor.bump();
    let mut bytes = Vec::new();
    loop {
        match cursor.bump() {
            None => return Err(LexError::UnterminatedComment { offset: start }),
            Some(b'#') => return Ok(bytes),
            Some(b'\\') => bytes.push(escape::decode_hex_escape(cursor)?),
            Some(b) => bytes.push(b),
        }
    }
}

/// A scanned numeric literal with its raw source form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannedNumber {
    /// Signed integer; raw bytes including the sign.
    Int(Vec<u8>),
    /// Unsigned integer; digit bytes (the `u` suffix is consumed).
    UInt(Vec<u8>),
    /// Float; raw bytes including sign, fraction and exponent.
    Float(Vec<u8>),
}

fn scan_digits(cursor: &mut Cursor<'_>, raw: &mut Vec<u8>) -> bool {
    let mut any = false;
    while let Some(b) = cursor.peek() {
        if b.is_ascii_digit() {
            cursor.bump();
            raw.push(b);
            any = true;
        } else {
            break;
        }
    }
    any
}

/// Scan a number; the cursor sits on the mandatory `+` or `-` sign.
pub fn scan_number(cursor: &mut Cursor<'_>) -> Result<ScannedNumber, LexError> {
    let start = cursor.offset();
    let sign = match cursor.bump() {
        Some(b @ (b'+' | b'-')) => b,
        _ => return Err(LexError::BadNumber { offset: start }),
    };
    let mut raw = vec![sign];
    if !scan_digits(cursor, &mut raw) {
        return Err(LexError::BadNumber { offset: start });
    }
    let mut is_float = false;
    if cursor.peek() == Some(b'.') {
        cursor.bump();
        raw.push(b'.');
        if !scan_digits(cursor, &mut raw) {
            return Err(LexError::BadNumber { offset: start });
        }
        is_float = true;
    }
    if cursor.peek() == Some(b'E') {
        cursor.bump();
        raw.push(b'E');
        if let Some(exp_sign @ (b'+' | b'-')) = cursor.peek() {
            cursor.bump();
            raw.push(exp_sign);
        }
        if !scan_digits(cursor, &mut raw) {
            return Err(LexError::BadNumber { offset: start });
        }
        is_float = true;
    }
    if !is_float && cursor.peek() == Some(b'u') {
        cursor.bump();
        if sign == b'-' {
            return Err(LexError::BadNumber { offset: start });
        }
        if cursor.peek().is_some_and(classify::is_ident_char) {
            return Err(LexError::BadNumber { offset: start });
        }
        return Ok(ScannedNumber::UInt(raw[1..].to_vec()));
    }
    // the next byte must not extend the token
    if cursor.peek().is_some_and(classify::is_ident_char) {
        return Err(LexError::BadNumber { offset: start });
    }
    Ok(if is_float {
        ScannedNumber::Float(raw)
    } else {
        ScannedNumber::Int(raw)
    })
}

/// Line-info fields as scanned, before delta interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLineInfo {
    pub col: i32,
    pub line: Option<i32>,
    pub file: Option<Vec<u8>>,
}

fn scan_line_info_num(cursor: &mut Cursor<'_>, start: usize) -> Result<i32, LexError> {
    let negative = cursor.peek() == Some(b'~');
    if negative {
        cursor.bump();
    }
    let mut value: i64 = 0;
    let mut any = false;
    while let Some(b) = cursor.peek() {
        if !b.is_ascii_digit() {
            break;
        }
        cursor.bump();
        value = value * 10 + i64::from(b - b'0');
        if value > i64::from(i32::MAX) {
            return Err(LexError::BadLineInfo { offset: start });
        }
        any = true;
    }
    if !any {
        return Err(LexError::BadLineInfo { offset: start });
    }
    Ok(if negative { -value as i32 } else { value as i32 })
}

/// Scan line information; the cursor sits on a digit, `~` or `,`.
///
/// The third field, when present, uses escaped-data semantics: commas,
/// whitespace and control bytes terminate it unless escaped.
pub fn scan_line_info(cursor: &mut Cursor<'_>) -> Result<RawLineInfo, LexError> {
    let start = cursor.offset();
    let col = match cursor.peek() {
        Some(b',') => 0,
        Some(b) if b == b'~' || b.is_ascii_digit() => scan_line_info_num(cursor, start)?,
        _ => return Err(LexError::BadLineInfo { offset: start }),
    };
    if cursor.peek() != Some(b',') {
        return Ok(RawLineInfo {
            col,
            line: None,
            file: None,
        });
    }
    cursor.bump();
    let line = scan_line_info_num(cursor, start)?;
    if cursor.peek() != Some(b',') {
        return Ok(RawLineInfo {
            col,
            line: Some(line),
            file: None,
        });
    }
    cursor.bump();
    let mut file = Vec::new();
    loop {
        match cursor.peek() {
            Some(b'\\') => {
                cursor.bump();
                file.push(escape::decode_hex_escape(cursor)?);
            }
            Some(b)
                if !classify::is_whitespace(b)
                    && !escape::is_control_char(b)
                    && b != b',' =>
            {
                cursor.bump();
                file.push(b);
            }
            _ => break,
        }
    }
    Ok(RawLineInfo {
        col,
        line: Some(line),
        file: Some(file),
    })
}

/// Convenience: classify the byte under the cursor.
pub fn classify_at(cursor: &Cursor<'_>) -> Option<TokenClass> {
    cursor.peek().map(classify::classify)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_word_ident() {
        let mut cursor = Cursor::new(b"stmts ");
        let word = scan_word(&mut cursor).unwrap();
        assert_eq!(word.bytes, b"stmts");
        assert!(!word.has_dot);
        assert_eq!(cursor.peek(), Some(b' '));
    }

    #[test]
    fn test_scan_word_symbol() {
        let mut cursor = Cursor::new(b"write.1.sys)");
        let word = scan_word(&mut cursor).unwrap();
        assert_eq!(word.bytes, b"write.1.sys");
        assert!(word.has_dot);
        assert!(!word.trailing_dot());
    }

    #[test]
    fn test_scan_word_trailing_dot() {
        let mut cursor = Cursor::new(b"foo.0.)");
        let word = scan_word(&mut cursor).unwrap();
        assert_eq!(word.bytes, b"foo.0.");
        assert!(word.trailing_dot());
    }

    #[test]
    fn test_scan_word_with_escape() {
        // an escaped dot is payload, not a symbol separator
        let mut cursor = Cursor::new(b"a\\2Eb ");
        let word = scan_word(&mut cursor).unwrap();
        assert_eq!(word.bytes, b"a.b");
        assert!(!word.has_dot);
    }

    #[test]
    fn test_scan_string() {
        let mut cursor = Cursor::new(b"\"Hello\\20World\\0A\"");
        let bytes = scan_string(&mut cursor).unwrap();
        assert_eq!(bytes, b"Hello World\n");
        assert!(cursor.is_eof());
    }

    #[test]
    fn test_scan_string_raw_newline_and_zero() {
        let mut cursor = Cursor::new(b"\"a\nb\\00c\"");
        let bytes = scan_string(&mut cursor).unwrap();
        assert_eq!(bytes, b"a\nb\0c");
    }

    #[test]
    fn test_scan_string_unterminated() {
        let mut cursor = Cursor::new(b"\"abc");
        assert_eq!(
            scan_string(&mut cursor),
            Err(LexError::UnterminatedString { offset: 0 })
        );
    }

    #[test]
    fn test_scan_char() {
        let mut cursor = Cursor::new(b"'x'");
        assert_eq!(scan_char(&mut cursor), Ok(b'x'));
        let mut cursor = Cursor::new(b"'\\27'");
        assert_eq!(scan_char(&mut cursor), Ok(b'\''));
        let mut cursor = Cursor::new(b"''");
        assert!(matches!(
            scan_char(&mut cursor),
            Err(LexError::UnterminatedChar { offset: 0 })
        ));
    }

    #[test]
    fn test_scan_comment() {
        let mut cursor = Cursor::new(b"#note\\23tag#x");
        let bytes = scan_comment(&mut cursor).unwrap();
        assert_eq!(bytes, b"note#tag");
        assert_eq!(cursor.peek(), Some(b'x'));
    }

    #[test]
    fn test_scan_number_forms() {
        let mut cursor = Cursor::new(b"+42 ");
        assert_eq!(
            scan_number(&mut cursor),
            Ok(ScannedNumber::Int(b"+42".to_vec()))
        );
        let mut cursor = Cursor::new(b"-7)");
        assert_eq!(
            scan_number(&mut cursor),
            Ok(ScannedNumber::Int(b"-7".to_vec()))
        );
        let mut cursor = Cursor::new(b"+3u ");
        assert_eq!(
            scan_number(&mut cursor),
            Ok(ScannedNumber::UInt(b"3".to_vec()))
        );
        let mut cursor = Cursor::new(b"+1.5E2 ");
        assert_eq!(
            scan_number(&mut cursor),
            Ok(ScannedNumber::Float(b"+1.5E2".to_vec()))
        );
        let mut cursor = Cursor::new(b"+2E-3 ");
        assert_eq!(
            scan_number(&mut cursor),
            Ok(ScannedNumber::Float(b"+2E-3".to_vec()))
        );
    }

    #[test]
    fn test_scan_number_rejects() {
        for bad in [&b"+x"[..], b"-3u", b"+1x", b"+1.", b"+1E"] {
            let mut cursor = Cursor::new(bad);
            assert!(
                matches!(scan_number(&mut cursor), Err(LexError::BadNumber { .. })),
                "expected BadNumber for {:?}",
                std::str::from_utf8(bad)
            );
        }
    }

    #[test]
    fn test_scan_line_info_forms() {
        let mut cursor = Cursor::new(b"4(");
        assert_eq!(
            scan_line_info(&mut cursor),
            Ok(RawLineInfo {
                col: 4,
                line: None,
                file: None
            })
        );
        let mut cursor = Cursor::new(b"~2,3(");
        assert_eq!(
            scan_line_info(&mut cursor),
            Ok(RawLineInfo {
                col: -2,
                line: Some(3),
                file: None
            })
        );
        let mut cursor = Cursor::new(b"1,1,f.nim(");
        let info = scan_line_info(&mut cursor).unwrap();
        assert_eq!(info.col, 1);
        assert_eq!(info.line, Some(1));
        assert_eq!(info.file.as_deref(), Some(&b"f.nim"[..]));
        assert_eq!(cursor.peek(), Some(b'('));
    }

    #[test]
    fn test_scan_line_info_escaped_filename() {
        let mut cursor = Cursor::new(b"1,1,a\\28b\\2Cc(");
        let info = scan_line_info(&mut cursor).unwrap();
        assert_eq!(info.file.as_deref(), Some(&b"a(b,c"[..]));
    }

    #[test]
    fn test_scan_line_info_rejects() {
        let mut cursor = Cursor::new(b"~(");
        assert!(matches!(
            scan_line_info(&mut cursor),
            Err(LexError::BadLineInfo { .. })
        ));
        let mut cursor = Cursor::new(b"1,(");
        assert!(matches!(
            scan_line_info(&mut cursor),
            Err(LexError::BadLineInfo { .. })
        ));
    }
}
