//! # NIF Canonical Encoder
//!
//! Deterministic transformation of a tree into an identifier-safe byte
//! string with back-reference compression, for embedding whole trees in
//! symbol names.
//!
//! The encoding strips prefixes and unary `+` signs, serializes minimally
//! and rewrites structure: `(` → `A`, `)` → `Z`, the child separator →
//! `_`, the empty atom → `E`, the symbol-definition marker → `O`, string
//! delimiters → `U`, with the entire trailing run of `)` dropped. The
//! letters `A Z E _ O U X R K` are reserved: literal occurrences, and any
//! byte outside the identifier alphabet, are escaped as `X<HH>`. Repeated
//! identifiers compress to `R<idx>` and repeated compound tags to
//! `K<idx>` when that is strictly shorter.
//!
//! Dots inside symbols stay literal, so `foo.0` and the two-token
//! sequence `foo 0` belong to a documented collision class; the format
//! accepts this.
//!
//! ## Example
//!
//! ```
//! let source = b"(.nif26)\n(array (range +0 +9) (array (range +0 +4) (i +8)))";
//! let module = nif_parser::parse(source).unwrap();
//! let encoded = nif_encode::encode_node(&module.arena, module.body[0]);
//! assert_eq!(encoded, b"AarrayArange_0_9ZAK0AK1_0_4ZAi_8");
//! ```

use nif_ast::{Atom, Module, NodeArena, NodeId, NodeKind};
use nif_lexer::is_ident_char;
use rustc_hash::FxHashMap;

/// Reserved output letters that must be `X<HH>`-escaped when literal.
const RESERVED: &[u8] = b"AZE_OUXRK";

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Encode a single tree rooted at `id`.
///
/// The output contains only identifier bytes (bytes at or above 128 pass
/// through literally, as the identifier alphabet includes them).
pub fn encode_node(arena: &NodeArena, id: NodeId) -> Vec<u8> {
    let mut encoder = Encoder::new(arena);
    encoder.encode(id);
    encoder.finish()
}

/// Encode a module body as one identifier.
pub fn encode_module(module: &Module) -> Vec<u8> {
    let mut encoder = Encoder::new(&module.arena);
    for &id in &module.body {
        encoder.encode(id);
    }
    encoder.finish()
}

/// Ordered occurrence table for one namespace (identifiers or tags).
///
/// Every occurrence appends; a repeat reports the table position of its
/// first occurrence.
#[derive(Default)]
struct Table {
    first: FxHashMap<Vec<u8>, usize>,
    appended: usize,
}

impl Table {
    fn occur(&mut self, token: &[u8]) -> Option<usize> {
        let position = self.first.get(token).copied();
        if position.is_none() {
            self.first.insert(token.to_vec(), self.appended);
        }
        self.appended += 1;
        position
    }
}

struct Encoder<'a> {
    arena: &'a NodeArena,
    out: Vec<u8>,
    separator_due: bool,
    idents: Table,
    kinds: Table,
}

impl<'a> Encoder<'a> {
    fn new(arena: &'a NodeArena) -> Self {
        Self {
            arena,
            out: Vec::new(),
            separator_due: false,
            idents: Table::default(),
            kinds: Table::default(),
        }
    }

    fn finish(mut self) -> Vec<u8> {
        while self.out.last() == Some(&b'Z') {
            self.out.pop();
        }
        self.out
    }

    fn encode(&mut self, id: NodeId) {
        match &self.arena.get(id).kind {
            NodeKind::Compound { tag, children } => {
                // no separator before an opening parenthesis
                self.out.push(b'A');
                self.separator_due = false;
                self.name(tag, false, true);
                for &child in children {
                    self.encode(child);
                }
                // and none after a closing one
                self.out.push(b'Z');
                self.separator_due = false;
            }
            NodeKind::Atom(atom) => self.atom(atom),
        }
    }

    fn atom(&mut self, atom: &Atom) {
        match atom {
            Atom::Empty => {
                self.separator();
                self.out.push(b'E');
                self.separator_due = true;
            }
            Atom::Ident(bytes) => self.name(bytes, false, false),
            Atom::Symbol(sym) => self.name(sym, true, false),
            Atom::SymbolDef(sym) => {
                self.separator();
                self.out.push(b'O');
                let token = self.ref_token(sym, true, false);
                self.out.extend_from_slice(&token);
                self.separator_due = true;
            }
            Atom::IntLit(raw) | Atom::FloatLit(raw) => {
                self.separator();
                let stripped = raw.strip_prefix(b"+").unwrap_or(raw);
                for &b in stripped {
                    push_encoded(&mut self.out, b);
                }
                self.separator_due = true;
            }
            Atom::UIntLit(digits) => {
                self.separator();
                for &b in digits {
                    push_encoded(&mut self.out, b);
                }
                push_encoded(&mut self.out, b'u');
                self.separator_due = true;
            }
            Atom::CharLit(b) => {
                self.separator();
                push_encoded(&mut self.out, b'\'');
                push_encoded(&mut self.out, *b);
                push_encoded(&mut self.out, b'\'');
                self.separator_due = true;
            }
            Atom::StrLit(bytes) => {
                self.separator();
                self.out.push(b'U');
                for &b in bytes {
                    push_encoded(&mut self.out, b);
                }
                self.out.push(b'U');
                self.separator_due = true;
            }
        }
    }

    fn name(&mut self, bytes: &[u8], allow_dot: bool, kind: bool) {
        if !kind {
            self.separator();
        }
        let token = self.ref_token(bytes, allow_dot, kind);
        self.out.extend_from_slice(&token);
        self.separator_due = true;
    }

    /// The escaped token, or its back-reference when strictly shorter.
    fn ref_token(&mut self, bytes: &[u8], allow_dot: bool, kind: bool) -> Vec<u8> {
        let escaped = escape_token(bytes, allow_dot);
        let (table, letter) = if kind {
            (&mut self.kinds, b'K')
        } else {
            (&mut self.idents, b'R')
        };
        match table.occur(bytes) {
            Some(first) => {
                let mut backref = vec![letter];
                backref.extend_from_slice(first.to_string().as_bytes());
                if backref.len() < escaped.len() {
                    backref
                } else {
                    escaped
                }
            }
            None => escaped,
        }
    }

    fn separator(&mut self) {
        if self.separator_due {
            self.out.push(b'_');
            self.separator_due = false;
        }
    }
}

fn escape_token(bytes: &[u8], allow_dot: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        if allow_dot && b == b'.' {
            out.push(b'.');
        } else {
            push_encoded(&mut out, b);
        }
    }
    out
}

fn push_encoded(out: &mut Vec<u8>, b: u8) {
    if RESERVED.contains(&b) || !is_ident_char(b) {
        out.push(b'X');
        out.push(HEX_DIGITS[(b >> 4) as usize]);
        out.push(HEX_DIGITS[(b & 0xF) as usize]);
    } else {
        out.push(b);
    }
}
