//! # NIF Parser
//!
//! Parses NIF interchange files into [`nif_ast::Module`] trees: the
//! version cookie, the directive block, prefixed body nodes, symbol
//! classification with trailing-dot expansion, and the optional trailing
//! exported-symbol index.
//!
//! Uses recursive descent over a byte cursor; the lexical machinery lives
//! in `nif-lexer`.
//!
//! ## Example
//!
//! ```
//! let source = b"(.nif26)\n(stmts (call write.1.sys \"hi\"))";
//! let module = nif_parser::parse(source).unwrap();
//! assert_eq!(module.body.len(), 1);
//! ```

mod error;
mod parser;

pub use error::ParseError;
pub use parser::{ParseOptions, Parser};

use std::path::Path;

use nif_ast::Module;
use smol_str::SmolStr;

/// Parse a module from bytes; no module suffix is available, so
/// trailing-dot symbols are an error unless deferred via
/// [`ParseOptions::defer_pending_symbols`].
pub fn parse(source: &[u8]) -> Result<Module, ParseError> {
    parse_with_options(source, ParseOptions::default())
}

/// Parse a module from bytes with explicit options.
pub fn parse_with_options(source: &[u8], options: ParseOptions) -> Result<Module, ParseError> {
    Parser::new(source, options).parse_module()
}

/// Parse a module from a file, deriving the module suffix from the
/// filename stem.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Module, ParseError> {
    let path = path.as_ref();
    let source = std::fs::read(path)?;
    let options = ParseOptions {
        module_suffix: module_suffix_of(path),
        ..ParseOptions::default()
    };
    parse_with_options(&source, options)
}

/// Module suffix of a path: the leading dot-separated component of the
/// filename (`foo.s.nif` → `foo`).
pub fn module_suffix_of(path: &Path) -> Option<SmolStr> {
    let name = path.file_name()?.to_str()?;
    let first = name.split('.').next()?;
    if first.is_empty() {
        None
    } else {
        Some(SmolStr::new(first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_module_suffix_of() {
        assert_eq!(
            module_suffix_of(&PathBuf::from("foo.s.nif")).as_deref(),
            Some("foo")
        );
        assert_eq!(
            module_suffix_of(&PathBuf::from("dir/mod.nif")).as_deref(),
            Some("mod")
        );
        assert_eq!(module_suffix_of(&PathBuf::from(".hidden")), None);
    }
}
