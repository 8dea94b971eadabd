//! # NIF AST
//!
//! In-memory representation of NIF modules: atoms, tagged compound nodes,
//! node prefixes (line information and comments), directives and the
//! exported-symbol index.
//!
//! Nodes live in a [`NodeArena`] and reference each other by [`NodeId`];
//! the arena owns all storage and nothing is freed until it drops. Trees
//! from different arenas compare with [`node_eq`] or
//! [`Module::structural_eq`].
//!
//! ## Example
//!
//! ```
//! use nif_ast::{Atom, Module, Node};
//!
//! let mut module = Module::new();
//! let arg = module.arena.alloc(Node::atom(Atom::StrLit(b"hi".to_vec())));
//! let call = module.arena.alloc(Node::compound(b"call".to_vec(), vec![arg]));
//! module.body.push(call);
//!
//! assert_eq!(module.version(), nif_ast::NIF_VERSION);
//! ```

mod arena;
mod ast;
mod span;
mod symbol;

pub use arena::{NodeArena, NodeId};
pub use ast::{
    node_eq, Atom, Directive, Index, IndexEntry, LineInfo, Module, Node, NodeKind, Prefix,
    ResolvedPos, Visibility,
};
pub use span::Span;
pub use symbol::{classify_symbol, is_global, is_pending, SymbolError, SymbolKind};

/// Current NIF format version.
pub const NIF_VERSION: u32 = 26;

/// Oldest format version readers still accept.
pub const NIF_COMPAT_VERSION: u32 = 24;

/// NIF file extension.
pub const NIF_EXTENSION: &str = "nif";
