//! Node, atom, directive and index definitions for NIF modules.

use smol_str::SmolStr;

use crate::arena::{NodeArena, NodeId};
use crate::span::Span;
use crate::symbol::{classify_symbol, is_global, is_pending, SymbolError};
use crate::NIF_VERSION;

/// A leaf value in the tree.
///
/// Numeric atoms keep their raw source bytes (sign included) so that
/// canonical byte round-trips never depend on float formatting; the value
/// accessors parse on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Atom {
    /// The missing/optional slot, written `.`.
    Empty,
    /// A plain word; carries no identity beyond its spelling.
    Ident(Vec<u8>),
    /// A dotted name, local (`foo.0`) or global (`foo.0.mod`).
    Symbol(Vec<u8>),
    /// A symbol at its definition site, written with a `:` prefix.
    SymbolDef(Vec<u8>),
    /// Signed decimal integer; raw bytes including the mandatory sign.
    IntLit(Vec<u8>),
    /// Unsigned decimal integer; digit bytes, the `u` suffix is implied.
    UIntLit(Vec<u8>),
    /// Float; raw bytes including sign, fraction and exponent parts.
    FloatLit(Vec<u8>),
    /// One byte between single quotes.
    CharLit(u8),
    /// Arbitrary decoded bytes between double quotes.
    StrLit(Vec<u8>),
}

impl Atom {
    /// Value of an integer literal, if it fits an `i64`.
    pub fn int_value(&self) -> Option<i64> {
        match self {
            Atom::IntLit(raw) => std::str::from_utf8(raw).ok()?.parse().ok(),
            _ => None,
        }
    }

    /// Value of an unsigned literal, if it fits a `u64`.
    pub fn uint_value(&self) -> Option<u64> {
        match self {
            Atom::UIntLit(digits) => std::str::from_utf8(digits).ok()?.parse().ok(),
            _ => None,
        }
    }

    /// Value of a float literal.
    pub fn float_value(&self) -> Option<f64> {
        match self {
            Atom::FloatLit(raw) => std::str::from_utf8(raw).ok()?.parse().ok(),
            _ => None,
        }
    }

    /// `true` for a symbol still awaiting trailing-dot expansion.
    pub fn is_pending_symbol(&self) -> bool {
        match self {
            Atom::Symbol(bytes) | Atom::SymbolDef(bytes) => is_pending(bytes),
            _ => false,
        }
    }
}

/// Source position annotation, stored relative to the parent node.
///
/// Negative deltas are written with `~` in source. The module root carries
/// the absolute [`LineInfo::ColLineFile`] form.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineInfo {
    /// Column delta only.
    Col { col: i32 },
    /// Column and line deltas.
    ColLine { col: i32, line: i32 },
    /// Absolute position and file.
    ColLineFile { col: i32, line: i32, file: Vec<u8> },
}

/// Optional decorations preceding a node in source: line information, then
/// a comment. Every node carries the field, whether or not its source form
/// can syntactically express it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Prefix {
    pub line_info: Option<LineInfo>,
    pub comment: Option<Vec<u8>>,
}

impl Prefix {
    /// `true` when neither component is present.
    pub fn is_empty(&self) -> bool {
        self.line_info.is_none() && self.comment.is_none()
    }
}

/// The shape of a node: a leaf atom or a tagged compound.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    Atom(Atom),
    Compound { tag: Vec<u8>, children: Vec<NodeId> },
}

/// A tree node: optional prefix plus an atom or compound.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Source span; for compounds `span.start` is the offset of `(`.
    pub span: Span,
    pub prefix: Prefix,
    pub kind: NodeKind,
}

impl Node {
    /// Build an atom node without source position, for programmatic trees.
    pub fn atom(atom: Atom) -> Self {
        Self {
            span: Span::default(),
            prefix: Prefix::default(),
            kind: NodeKind::Atom(atom),
        }
    }

    /// Build a compound node without source position.
    pub fn compound(tag: impl Into<Vec<u8>>, children: Vec<NodeId>) -> Self {
        Self {
            span: Span::default(),
            prefix: Prefix::default(),
            kind: NodeKind::Compound {
                tag: tag.into(),
                children,
            },
        }
    }

    /// The compound tag, if this node is a compound.
    pub fn tag(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::Compound { tag, .. } => Some(tag),
            NodeKind::Atom(_) => None,
        }
    }

    /// `true` for `.lang` scopes.
    ///
    /// The parser normalizes the deprecated `.dialect` spelling to
    /// `.lang`; the check still accepts it for trees built by hand.
    pub fn is_lang_scope(&self) -> bool {
        matches!(self.tag(), Some(b".lang") | Some(b".dialect"))
    }
}

/// A recognized or preserved top-of-file directive.
///
/// `.lang`/`.dialect` are structural and stay in the body as compound
/// nodes, because they wrap arbitrary body content.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Directive {
    /// `(.nifNN)` magic cookie.
    Version(u32),
    /// `(.indexat +N …)`. `span` covers the whole directive including its
    /// trailing padding; `pad` is the patchable digits region.
    IndexAt { offset: u64, span: Span, pad: Span },
    /// `(.unusedname sym)` — first free temporary name.
    UnusedName(Vec<u8>),
    /// `(.vendor "…")` — opaque producer string.
    Vendor(Vec<u8>),
    /// `(.platform "…")` — opaque platform string.
    Platform(Vec<u8>),
    /// `(.config "…")` — opaque configuration string.
    Config(Vec<u8>),
    /// An unrecognized directive, preserved opaquely.
    Unknown { node: NodeId },
}

/// Whether an index entry is visible to importers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Visibility {
    Exported,
    Hidden,
}

/// One index entry; `offset` is absolute after parsing (the on-disk form
/// is diff-encoded).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexEntry {
    pub visibility: Visibility,
    pub symbol: Vec<u8>,
    pub offset: u64,
}

/// The trailing exported-symbol index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Index {
    pub entries: Vec<IndexEntry>,
}

/// Absolute source position of a node after delta composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPos {
    pub col: i32,
    pub line: i32,
    pub file: Vec<u8>,
}

/// One parsed module: directives, body trees and the optional index.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Module {
    /// Storage for every node of the tree.
    pub arena: NodeArena,
    /// Directives in declaration order, the version first.
    pub directives: Vec<Directive>,
    /// Top-level body nodes.
    pub body: Vec<NodeId>,
    /// The trailing index, if one was parsed or is to be written.
    pub index: Option<Index>,
    /// Span of the on-disk `(.index …)` directive, if one was parsed.
    pub index_span: Option<Span>,
    /// Module suffix used for trailing-dot expansion.
    pub suffix: Option<SmolStr>,
}

impl Module {
    /// Create an empty module at the current format version.
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            directives: vec![Directive::Version(NIF_VERSION)],
            body: Vec::new(),
            index: None,
            index_span: None,
            suffix: None,
        }
    }

    /// The declared format version, defaulting to the current one.
    pub fn version(&self) -> u32 {
        self.directives
            .iter()
            .find_map(|d| match d {
                Directive::Version(v) => Some(*v),
                _ => None,
            })
            .unwrap_or(NIF_VERSION)
    }

    /// Structural equality: same version, directives, body trees and index
    /// symbols. Byte positions (spans, `.indexat` and index offsets) are
    /// formatting artifacts and are ignored.
    pub fn structural_eq(&self, other: &Module) -> bool {
        if self.version() != other.version() {
            return false;
        }
        // version and indexat carry positional data compared elsewhere
        let comparable = |d: &&Directive| {
            !matches!(d, Directive::Version(_) | Directive::IndexAt { .. })
        };
        let a: Vec<_> = self.directives.iter().filter(comparable).collect();
        let b: Vec<_> = other.directives.iter().filter(comparable).collect();
        if a.len() != b.len() {
            return false;
        }
        for (da, db) in a.iter().zip(&b) {
            let same = match (da, db) {
                (Directive::UnusedName(x), Directive::UnusedName(y)) => x == y,
                (Directive::Vendor(x), Directive::Vendor(y)) => x == y,
                (Directive::Platform(x), Directive::Platform(y)) => x == y,
                (Directive::Config(x), Directive::Config(y)) => x == y,
                (Directive::Unknown { node: x }, Directive::Unknown { node: y }) => {
                    node_eq(&self.arena, *x, &other.arena, *y)
                }
                _ => false,
            };
            if !same {
                return false;
            }
        }
        if self.body.len() != other.body.len() {
            return false;
        }
        for (&x, &y) in self.body.iter().zip(&other.body) {
            if !node_eq(&self.arena, x, &other.arena, y) {
                return false;
            }
        }
        match (&self.index, &other.index) {
            (None, None) => true,
            (Some(x), Some(y)) => {
                x.entries.len() == y.entries.len()
                    && x.entries.iter().zip(&y.entries).all(|(ea, eb)| {
                        ea.visibility == eb.visibility && ea.symbol == eb.symbol
                    })
            }
            _ => false,
        }
    }

    /// Collect `(symbol, offset-of-open-paren)` for every compound whose
    /// first child is a global symbol definition, in document order.
    ///
    /// This is what the exported-symbol index records, so recomputing it
    /// against a parsed file validates the on-disk index.
    pub fn exported_entries(&self) -> Vec<(Vec<u8>, u64)> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.body.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = self.arena.get(id);
            if let NodeKind::Compound { children, .. } = &node.kind {
                if let Some(&first) = children.first() {
                    if let NodeKind::Atom(Atom::SymbolDef(sym)) = &self.arena.get(first).kind {
                        if is_global(sym) {
                            out.push((sym.clone(), node.span.start as u64));
                        }
                    }
                }
                for &child in children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Absolute `(col, line, file)` of a node, composing line-info deltas
    /// down from the top-level root that contains it.
    ///
    /// Returns `None` if the node is not reachable from the body. A node
    /// above any absolute line information resolves against `(0, 0, "")`.
    pub fn absolute_line_info(&self, target: NodeId) -> Option<ResolvedPos> {
        fn walk(
            arena: &NodeArena,
            id: NodeId,
            target: NodeId,
            base: &ResolvedPos,
        ) -> Option<ResolvedPos> {
            let node = arena.get(id);
            let pos = match &node.prefix.line_info {
                None => base.clone(),
                Some(LineInfo::Col { col }) => ResolvedPos {
                    col: base.col + col,
                    line: base.line,
                    file: base.file.clone(),
                },
                Some(LineInfo::ColLine { col, line }) => ResolvedPos {
                    col: base.col + col,
                    line: base.line + line,
                    file: base.file.clone(),
                },
                Some(LineInfo::ColLineFile { col, line, file }) => ResolvedPos {
                    col: *col,
                    line: *line,
                    file: file.clone(),
                },
            };
            if id == target {
                return Some(pos);
            }
            if let NodeKind::Compound { children, .. } = &node.kind {
                for &child in children {
                    if let Some(found) = walk(arena, child, target, &pos) {
                        return Some(found);
                    }
                }
            }
            None
        }

        let base = ResolvedPos {
            col: 0,
            line: 0,
            file: Vec::new(),
        };
        for &root in &self.body {
            if let Some(found) = walk(&self.arena, root, target, &base) {
                return Some(found);
            }
        }
        None
    }

    /// Complete deferred trailing-dot expansion with `suffix`.
    pub fn expand_pending(&mut self, suffix: &str) -> Result<(), SymbolError> {
        for node in self.arena.iter_mut() {
            if let NodeKind::Atom(Atom::Symbol(bytes) | Atom::SymbolDef(bytes)) = &mut node.kind {
                if is_pending(bytes) {
                    bytes.extend_from_slice(suffix.as_bytes());
                    classify_symbol(bytes)?;
                }
            }
        }
        self.suffix = Some(SmolStr::new(suffix));
        Ok(())
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep equality of two trees that may live in different arenas. Spans are
/// ignored; prefixes and atom payloads are compared.
pub fn node_eq(arena_a: &NodeArena, a: NodeId, arena_b: &NodeArena, b: NodeId) -> bool {
    let (na, nb) = (arena_a.get(a), arena_b.get(b));
    if na.prefix != nb.prefix {
        return false;
    }
    match (&na.kind, &nb.kind) {
        (NodeKind::Atom(x), NodeKind::Atom(y)) => x == y,
        (
            NodeKind::Compound {
                tag: ta,
                children: ca,
            },
            NodeKind::Compound {
                tag: tb,
                children: cb,
            },
        ) => {
            ta == tb
                && ca.len() == cb.len()
                && ca
                    .iter()
                    .zip(cb)
                    .all(|(&x, &y)| node_eq(arena_a, x, arena_b, y))
        }
        _ => false,
    }
}
