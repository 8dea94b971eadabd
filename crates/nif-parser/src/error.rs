//! Parser error definitions.

use nif_lexer::LexError;
use thiserror::Error;

/// A parse error. Errors are fatal to the current parse; no partial tree
/// is returned.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing or unrecognized version directive at byte {offset}")]
    UnrecognizedVersion { offset: usize },

    #[error("unterminated compound node opened at byte {offset}")]
    UnterminatedCompound { offset: usize },

    #[error("unmatched closing parenthesis at byte {offset}")]
    UnexpectedClose { offset: usize },

    #[error("malformed symbol at byte {offset}")]
    MalformedSymbol { offset: usize },

    #[error("trailing-dot symbol at byte {offset} but no module suffix is available")]
    TrailingDotWithoutSuffix { offset: usize },

    #[error("index declared at byte {declared} but found at byte {actual}")]
    IndexOffsetMismatch { declared: u64, actual: u64 },

    #[error("unsupported directive at byte {offset}")]
    UnsupportedDirective { offset: usize },

    #[error("malformed index entry at byte {offset}")]
    BadIndex { offset: usize },

    #[error("unexpected byte 0x{byte:02X} at offset {offset}")]
    UnexpectedByte { byte: u8, offset: usize },

    #[error("unexpected end of input at byte {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("module has no body")]
    EmptyModule,

    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Byte offset at which the error was detected, when one applies.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::UnrecognizedVersion { offset }
            | ParseError::UnterminatedCompound { offset }
            | ParseError::UnexpectedClose { offset }
            | ParseError::MalformedSymbol { offset }
            | ParseError::TrailingDotWithoutSuffix { offset }
            | ParseError::UnsupportedDirective { offset }
            | ParseError::BadIndex { offset }
            | ParseError::UnexpectedByte { offset, .. }
            | ParseError::UnexpectedEnd { offset } => Some(*offset),
            ParseError::IndexOffsetMismatch { actual, .. } => Some(*actual as usize),
            ParseError::Lex(err) => Some(err.offset()),
            ParseError::EmptyModule | ParseError::Io(_) => None,
        }
    }
}
