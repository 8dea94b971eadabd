//! # NIF Writer
//!
//! Serializes [`nif_ast::Module`] trees back to bytes: stable directive
//! ordering, diffed line information, minimal escaping, and the trailing
//! exported-symbol index with in-place `.indexat` patching.
//!
//! Because whitespace is a token separator, the writer can reserve a
//! fixed pad inside `(.indexat …)` and later overwrite it with the real
//! index offset without shifting a single byte of the file. The same
//! property powers [`patch_index`], which refreshes the index of an
//! existing file while leaving every preceding byte untouched.
//!
//! ## Example
//!
//! ```
//! let source = b"(.nif26)\n(stmts (call write.1.sys \"hi\"))\n";
//! let module = nif_parser::parse(source).unwrap();
//! let written = nif_writer::write_module(&module).unwrap();
//! assert_eq!(written, source);
//! ```

mod error;
mod index;
mod writer;

pub use error::WriteError;
pub use index::patch_index;
pub use writer::{
    write_module, write_module_to, write_module_with_options, WriteOptions, INDEX_AT_PAD,
};
