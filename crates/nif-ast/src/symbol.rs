//! Dot discipline for NIF symbols.
//!
//! A symbol is a word with at least one interior dot. One dot with an
//! all-digit tail names a module-local entity; two or more dots name a
//! global one. Only global symbols may appear in the exported-symbol index.

use thiserror::Error;

/// How a symbol's dots classify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymbolKind {
    /// Exactly one dot with an all-digit tail, e.g. `foo.0`.
    Local,
    /// Two or more dots, e.g. `foo.0.mod`.
    Global,
}

/// Violations of the symbol grammar.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("symbol contains no dot")]
    NoDot,

    #[error("symbol begins with a dot")]
    LeadingDot,

    #[error("single-dot symbol has a non-digit tail")]
    LocalTailNotDigits,

    #[error("symbol still carries an unexpanded trailing dot")]
    TrailingDot,
}

/// Classify `bytes` as a local or global symbol.
pub fn classify_symbol(bytes: &[u8]) -> Result<SymbolKind, SymbolError> {
    if bytes.first() == Some(&b'.') {
        return Err(SymbolError::LeadingDot);
    }
    if bytes.last() == Some(&b'.') {
        return Err(SymbolError::TrailingDot);
    }
    let Some(dot) = bytes.iter().position(|&b| b == b'.') else {
        return Err(SymbolError::NoDot);
    };
    let tail = &bytes[dot + 1..];
    if tail.contains(&b'.') {
        return Ok(SymbolKind::Global);
    }
    if !tail.is_empty() && tail.iter().all(u8::is_ascii_digit) {
        Ok(SymbolKind::Local)
    } else {
        Err(SymbolError::LocalTailNotDigits)
    }
}

/// `true` for symbols that may appear in the exported-symbol index.
pub fn is_global(bytes: &[u8]) -> bool {
    matches!(classify_symbol(bytes), Ok(SymbolKind::Global))
}

/// `true` when the symbol still ends with its on-disk trailing dot.
pub fn is_pending(bytes: &[u8]) -> bool {
    bytes.ends_with(b".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local() {
        assert_eq!(classify_symbol(b"foo.0"), Ok(SymbolKind::Local));
        assert_eq!(classify_symbol(b"x.123"), Ok(SymbolKind::Local));
    }

    #[test]
    fn test_global() {
        assert_eq!(classify_symbol(b"foo.0.mod"), Ok(SymbolKind::Global));
        assert_eq!(classify_symbol(b"foo.0.inst.mod"), Ok(SymbolKind::Global));
        assert!(is_global(b"write.1.sys"));
        assert!(!is_global(b"write.1"));
    }

    #[test]
    fn test_rejects() {
        assert_eq!(classify_symbol(b"foo"), Err(SymbolError::NoDot));
        assert_eq!(classify_symbol(b".foo"), Err(SymbolError::LeadingDot));
        assert_eq!(classify_symbol(b"foo.0."), Err(SymbolError::TrailingDot));
        assert_eq!(
            classify_symbol(b"foo.bar"),
            Err(SymbolError::LocalTailNotDigits)
        );
        assert_eq!(
            classify_symbol(b"foo.1a"),
            Err(SymbolError::LocalTailNotDigits)
        );
    }

    #[test]
    fn test_pending() {
        assert!(is_pending(b"foo.0."));
        assert!(!is_pending(b"foo.0.mod"));
    }
}
