//! # NIF Lexer
//!
//! Byte-level lexical machinery for the NIF interchange format: the input
//! [`Cursor`], single-byte token [`classify`]-ication, the `\HH` escape
//! codec and the token scanners the parser drives.
//!
//! NIF is byte-oriented and context-sensitive at the token level — a bare
//! digit starts line information while `+`/`-` start a number, and dots
//! extend words into symbols — so the scanners here are hand-written.
//!
//! ## Example
//!
//! ```
//! use nif_lexer::{scan_word, Cursor};
//!
//! let mut cursor = Cursor::new(b"write.1.sys rest");
//! let word = scan_word(&mut cursor).unwrap();
//! assert_eq!(word.bytes, b"write.1.sys");
//! assert!(word.has_dot);
//! ```

mod classify;
mod cursor;
mod error;
mod escape;
mod scan;

pub use classify::{classify, is_ident_char, is_ident_start, is_whitespace, TokenClass};
pub use cursor::Cursor;
pub use error::LexError;
pub use escape::{
    decode_hex_escape, is_control_char, needs_escape, push_escaped, push_hex_escape,
    EscapeContext, CONTROL_CHARS,
};
pub use scan::{
    classify_at, scan_char, scan_comment, scan_line_info, scan_number, scan_string, scan_word,
    RawLineInfo, ScannedNumber, Word,
};
