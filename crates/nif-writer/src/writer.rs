//! Deterministic serialization of NIF modules.
//!
//! The writer emits the version cookie, declared directives in a stable
//! order, the body with diffed line information, and — when requested —
//! the trailing `.index` plus an `.indexat` directive whose padded offset
//! region is patched in place once the index position is known.

use nif_ast::{
    is_global, is_pending, Atom, Directive, IndexEntry, LineInfo, Module, Node, NodeId,
    NodeKind, Visibility,
};
use nif_lexer::{push_escaped, EscapeContext};
use rustc_hash::FxHashMap;

use crate::error::WriteError;

/// Pad bytes reserved for the `.indexat` offset; enough for any plausible
/// file size including the sign.
pub const INDEX_AT_PAD: usize = 12;

/// Options controlling serialization.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Emit an `.indexat` directive and a trailing `.index`.
    pub write_index: bool,
    /// Per-symbol visibility overrides; entries absent here fall back to
    /// the module's parsed index, then to [`Visibility::Exported`].
    pub visibility: FxHashMap<Vec<u8>, Visibility>,
}

/// Serialize a module with default options; an index is written iff the
/// module carries one.
pub fn write_module(module: &Module) -> Result<Vec<u8>, WriteError> {
    let options = WriteOptions {
        write_index: module.index.is_some(),
        ..WriteOptions::default()
    };
    write_module_with_options(module, options)
}

/// Serialize a module with explicit options.
pub fn write_module_with_options(
    module: &Module,
    options: WriteOptions,
) -> Result<Vec<u8>, WriteError> {
    Writer::new(module, options).write()
}

/// Serialize a module to an unseekable sink.
///
/// Refuses to write an index: `.indexat` patching must rewrite bytes that
/// were already emitted, which a streaming sink cannot do.
pub fn write_module_to(
    sink: &mut dyn std::io::Write,
    module: &Module,
) -> Result<(), WriteError> {
    if module.index.is_some() {
        return Err(WriteError::NonSeekableSinkWithIndex);
    }
    let bytes = write_module_with_options(module, WriteOptions::default())?;
    sink.write_all(&bytes)?;
    Ok(())
}

/// Append one symbol, escaping everything the identifier context requires
/// except the dots that structure the symbol itself.
pub(crate) fn push_symbol_bytes(out: &mut Vec<u8>, sym: &[u8]) {
    for &b in sym {
        if b == b'.' {
            out.push(b'.');
        } else {
            push_escaped(out, b, EscapeContext::Ident);
        }
    }
}

/// Append the `.index` directive with diff-encoded offsets.
pub(crate) fn push_index(out: &mut Vec<u8>, entries: &[IndexEntry]) {
    out.extend_from_slice(b"(.index");
    let mut previous = 0u64;
    for entry in entries {
        out.extend_from_slice(b"\n  (");
        out.push(match entry.visibility {
            Visibility::Exported => b'x',
            Visibility::Hidden => b'h',
        });
        out.push(b' ');
        push_symbol_bytes(out, &entry.symbol);
        out.extend_from_slice(b" +");
        out.extend_from_slice((entry.offset - previous).to_string().as_bytes());
        previous = entry.offset;
        out.push(b')');
    }
    out.extend_from_slice(b")\n");
}

struct Writer<'m> {
    module: &'m Module,
    out: Vec<u8>,
    pad: Option<std::ops::Range<usize>>,
    entries: Vec<IndexEntry>,
    visibility: FxHashMap<Vec<u8>, Visibility>,
    write_index: bool,
}

impl<'m> Writer<'m> {
    fn new(module: &'m Module, options: WriteOptions) -> Self {
        // parsed index visibilities survive a rewrite unless overridden
        let mut visibility = FxHashMap::default();
        if let Some(index) = &module.index {
            for entry in &index.entries {
                visibility.insert(entry.symbol.clone(), entry.visibility);
            }
        }
        visibility.extend(options.visibility);
        Self {
            module,
            out: Vec::new(),
            pad: None,
            entries: Vec::new(),
            visibility,
            write_index: options.write_index,
        }
    }

    fn write(mut self) -> Result<Vec<u8>, WriteError> {
        self.out.extend_from_slice(b"(.nif");
        self.out
            .extend_from_slice(self.module.version().to_string().as_bytes());
        self.out.extend_from_slice(b")\n");

        if self.write_index {
            self.out.extend_from_slice(b"(.indexat ");
            let pad_start = self.out.len();
            self.out.extend(std::iter::repeat(b' ').take(INDEX_AT_PAD));
            self.pad = Some(pad_start..self.out.len());
            self.out.extend_from_slice(b")\n");
        }

        self.write_directives()?;

        for &id in &self.module.body {
            self.write_node(id)?;
            self.out.push(b'\n');
        }

        if self.write_index {
            let index_start = self.out.len();
            let entries = std::mem::take(&mut self.entries);
            push_index(&mut self.out, &entries);
            self.patch_pad(index_start)?;
        }
        Ok(self.out)
    }

    /// Declared directives in stable order: unusedname, vendor, platform,
    /// config, then preserved unknowns. Version and indexat are handled by
    /// [`Writer::write`].
    fn write_directives(&mut self) -> Result<(), WriteError> {
        for directive in &self.module.directives {
            if let Directive::UnusedName(sym) = directive {
                self.out.extend_from_slice(b"(.unusedname ");
                if is_pending(sym) {
                    return Err(WriteError::PendingSymbol { offset: 0 });
                }
                push_symbol_bytes(&mut self.out, sym);
                self.out.extend_from_slice(b")\n");
            }
        }
        for directive in &self.module.directives {
            if let Directive::Vendor(value) = directive {
                self.write_string_directive(b"(.vendor \"", value);
            }
        }
        for directive in &self.module.directives {
            if let Directive::Platform(value) = directive {
                self.write_string_directive(b"(.platform \"", value);
            }
        }
        for directive in &self.module.directives {
            if let Directive::Config(value) = directive {
                self.write_string_directive(b"(.config \"", value);
            }
        }
        for directive in &self.module.directives {
            if let Directive::Unknown { node } = directive {
                self.write_node(*node)?;
                self.out.push(b'\n');
            }
        }
        Ok(())
    }

    fn write_string_directive(&mut self, opener: &[u8], value: &[u8]) {
        self.out.extend_from_slice(opener);
        for &b in value {
            push_escaped(&mut self.out, b, EscapeContext::StringLit);
        }
        self.out.extend_from_slice(b"\")\n");
    }

    fn write_node(&mut self, id: NodeId) -> Result<(), WriteError> {
        let node = self.module.arena.get(id);
        self.write_prefix(node);
        match &node.kind {
            NodeKind::Atom(atom) => self.write_atom(atom, node.span.start as usize)?,
            NodeKind::Compound { tag, children } => {
                let open_offset = self.out.len() as u64;
                self.register_export(children, open_offset);
                self.out.push(b'(');
                self.write_tag(tag);
                let mut previous_bare_empty = false;
                for &child in children {
                    let bare_empty = self.is_bare_empty(child);
                    // adjacent empty atoms concatenate; everything else is
                    // separated by a single space
                    if !(previous_bare_empty && bare_empty) {
                        self.out.push(b' ');
                    }
                    self.write_node(child)?;
                    previous_bare_empty = bare_empty;
                }
                self.out.push(b')');
            }
        }
        Ok(())
    }

    fn register_export(&mut self, children: &[NodeId], open_offset: u64) {
        if !self.write_index {
            return;
        }
        let Some(&first) = children.first() else {
            return;
        };
        if let NodeKind::Atom(Atom::SymbolDef(sym)) = &self.module.arena.get(first).kind {
            if is_global(sym) {
                let visibility = self
                    .visibility
                    .get(sym)
                    .copied()
                    .unwrap_or(Visibility::Exported);
                self.entries.push(IndexEntry {
                    visibility,
                    symbol: sym.clone(),
                    offset: open_offset,
                });
            }
        }
    }

    fn is_bare_empty(&self, id: NodeId) -> bool {
        let node = self.module.arena.get(id);
        node.prefix.is_empty() && matches!(node.kind, NodeKind::Atom(Atom::Empty))
    }

    fn write_prefix(&mut self, node: &Node) {
        if let Some(line_info) = &node.prefix.line_info {
            match line_info {
                LineInfo::Col { col } => self.push_delta(*col),
                LineInfo::ColLine { col, line } => {
                    self.push_delta(*col);
                    self.out.push(b',');
                    self.push_delta(*line);
                }
                LineInfo::ColLineFile { col, line, file } => {
                    self.push_delta(*col);
                    self.out.push(b',');
                    self.push_delta(*line);
                    self.out.push(b',');
                    for &b in file {
                        push_escaped(&mut self.out, b, EscapeContext::FileName);
                    }
                }
            }
        }
        if let Some(comment) = &node.prefix.comment {
            self.out.push(b'#');
            for &b in comment {
                push_escaped(&mut self.out, b, EscapeContext::Comment);
            }
            self.out.push(b'#');
        }
    }

    fn write_atom(&mut self, atom: &Atom, offset: usize) -> Result<(), WriteError> {
        match atom {
            Atom::Empty => self.out.push(b'.'),
            Atom::Ident(bytes) => {
                for &b in bytes {
                    push_escaped(&mut self.out, b, EscapeContext::Ident);
                }
            }
            Atom::Symbol(sym) => self.push_symbol(sym, offset)?,
            Atom::SymbolDef(sym) => {
                self.out.push(b':');
                self.push_symbol(sym, offset)?;
            }
            Atom::IntLit(raw) | Atom::FloatLit(raw) => self.out.extend_from_slice(raw),
            Atom::UIntLit(digits) => {
                self.out.push(b'+');
                self.out.extend_from_slice(digits);
                self.out.push(b'u');
            }
            Atom::CharLit(b) => {
                self.out.push(b'\'');
                push_escaped(&mut self.out, *b, EscapeContext::CharLit);
                self.out.push(b'\'');
            }
            Atom::StrLit(bytes) => {
                self.out.push(b'"');
                for &b in bytes {
                    push_escaped(&mut self.out, b, EscapeContext::StringLit);
                }
                self.out.push(b'"');
            }
        }
        Ok(())
    }

    fn push_symbol(&mut self, sym: &[u8], offset: usize) -> Result<(), WriteError> {
        if is_pending(sym) {
            return Err(WriteError::PendingSymbol { offset });
        }
        push_symbol_bytes(&mut self.out, sym);
        Ok(())
    }

    fn write_tag(&mut self, tag: &[u8]) {
        let rest = if tag.first() == Some(&b'.') {
            self.out.push(b'.');
            &tag[1..]
        } else {
            tag
        };
        for &b in rest {
            push_escaped(&mut self.out, b, EscapeContext::Ident);
        }
    }

    fn push_delta(&mut self, value: i32) {
        if value < 0 {
            self.out.push(b'~');
            self.out
                .extend_from_slice((-(value as i64)).to_string().as_bytes());
        } else {
            self.out.extend_from_slice(value.to_string().as_bytes());
        }
    }

    fn patch_pad(&mut self, index_start: usize) -> Result<(), WriteError> {
        let Some(range) = self.pad.clone() else {
            return Ok(());
        };
        let digits = format!("+{index_start}");
        if digits.len() > range.len() {
            return Err(WriteError::IndexPadInsufficient {
                needed: digits.len(),
                available: range.len(),
            });
        }
        self.out[range.start..range.start + digits.len()].copy_from_slice(digits.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nif_ast::{Directive, LineInfo, Node};
    use nif_parser::{parse, parse_with_options, ParseOptions};

    #[test]
    fn test_canonical_byte_round_trip() {
        let source = b"(.nif26)\n(stmts (call write.1.sys \"Hello World\\0A\"))\n";
        let module = parse(source).unwrap();
        let written = write_module(&module).unwrap();
        assert_eq!(written, source);
    }

    #[test]
    fn test_structural_round_trip() {
        let source = b"(.nif26)\n(.unusedname tmp.3)\n(.vendor \"nifler\")\n(stmts #setup# (asgn :v.0 +4) (call f.1 ... -2 +7u '\\0A' \"s\"))\n(.lang \"vm\" (op x.2))\n";
        let module = parse(source).unwrap();
        let written = write_module(&module).unwrap();
        let reparsed = parse(&written).unwrap();
        assert!(module.structural_eq(&reparsed));
        // the writer's output is canonical: writing again is byte-stable
        assert_eq!(write_module(&reparsed).unwrap(), written);
    }

    #[test]
    fn test_index_round_trip() {
        let source = b"(.nif26)\n(proc :a.0.m (stmts))\n(proc :b.0.m (stmts))\n";
        let module = parse(source).unwrap();
        let options = WriteOptions {
            write_index: true,
            ..WriteOptions::default()
        };
        let written = write_module_with_options(&module, options).unwrap();

        // re-reading yields absolute offsets that match the tree, and an
        // .indexat that points exactly at the index
        let strict = ParseOptions {
            strict: true,
            ..ParseOptions::default()
        };
        let reparsed = parse_with_options(&written, strict).unwrap();
        let index = reparsed.index.as_ref().unwrap();
        assert_eq!(index.entries.len(), 2);
        let recomputed = reparsed.exported_entries();
        for (entry, (symbol, offset)) in index.entries.iter().zip(&recomputed) {
            assert_eq!(&entry.symbol, symbol);
            assert_eq!(entry.offset, *offset);
        }
        // diff encoding: the second on-disk delta is relative to the first
        let first = index.entries[0].offset;
        let second = index.entries[1].offset;
        let expected = format!("+{}", second - first);
        assert!(written
            .windows(expected.len())
            .any(|w| w == expected.as_bytes()));
        // writing the reparsed module reproduces the bytes
        assert_eq!(write_module(&reparsed).unwrap(), written);
    }

    #[test]
    fn test_hidden_visibility_survives_rewrite() {
        let source = b"(.nif26)\n(proc :a.0.m (stmts))\n";
        let module = parse(source).unwrap();
        let mut options = WriteOptions {
            write_index: true,
            ..WriteOptions::default()
        };
        options
            .visibility
            .insert(b"a.0.m".to_vec(), nif_ast::Visibility::Hidden);
        let written = write_module_with_options(&module, options).unwrap();
        let reparsed = parse(&written).unwrap();
        assert_eq!(
            reparsed.index.as_ref().unwrap().entries[0].visibility,
            nif_ast::Visibility::Hidden
        );
        // rewriting keeps the parsed visibility without an explicit override
        let rewritten = write_module(&reparsed).unwrap();
        assert_eq!(rewritten, written);
    }

    #[test]
    fn test_empties_concatenate() {
        let source = b"(.nif26)\n(t ... x)\n";
        let module = parse(source).unwrap();
        let written = write_module(&module).unwrap();
        assert_eq!(written, source);
    }

    #[test]
    fn test_string_escapes() {
        let mut module = nif_ast::Module::new();
        let lit = module
            .arena
            .alloc(Node::atom(Atom::StrLit(vec![0x48, 0x0A, 0x28])));
        let root = module.arena.alloc(Node::compound(b"s".to_vec(), vec![lit]));
        module.body.push(root);
        let written = write_module(&module).unwrap();
        assert_eq!(written, b"(.nif26)\n(s \"H\\0A\\28\")\n");
    }

    #[test]
    fn test_line_info_deltas() {
        let mut module = nif_ast::Module::new();
        let mut x = Node::compound(b"x".to_vec(), vec![]);
        x.prefix.line_info = Some(LineInfo::Col { col: 4 });
        let x = module.arena.alloc(x);
        let mut root = Node::compound(b"stmts".to_vec(), vec![x]);
        root.prefix.line_info = Some(LineInfo::ColLineFile {
            col: 1,
            line: 1,
            file: b"f.nim".to_vec(),
        });
        let root = module.arena.alloc(root);
        module.body.push(root);

        let written = write_module(&module).unwrap();
        assert_eq!(written, b"(.nif26)\n1,1,f.nim(stmts 4(x))\n");
    }

    #[test]
    fn test_negative_delta_uses_tilde() {
        let mut module = nif_ast::Module::new();
        let mut x = Node::compound(b"x".to_vec(), vec![]);
        x.prefix.line_info = Some(LineInfo::ColLine { col: -3, line: 2 });
        let x = module.arena.alloc(x);
        let root = module.arena.alloc(Node::compound(b"t".to_vec(), vec![x]));
        module.body.push(root);
        let written = write_module(&module).unwrap();
        assert_eq!(written, b"(.nif26)\n(t ~3,2(x))\n");
    }

    #[test]
    fn test_pending_symbol_is_rejected() {
        let mut module = nif_ast::Module::new();
        let sym = module
            .arena
            .alloc(Node::atom(Atom::Symbol(b"foo.0.".to_vec())));
        let root = module.arena.alloc(Node::compound(b"use".to_vec(), vec![sym]));
        module.body.push(root);
        assert!(matches!(
            write_module(&module),
            Err(WriteError::PendingSymbol { .. })
        ));
    }

    #[test]
    fn test_unseekable_sink_refuses_index() {
        let source = b"(.nif26)\n(proc :a.0.m (stmts))\n(.index (x a.0.m +9))";
        let module = parse(source).unwrap();
        let mut sink = Vec::new();
        assert!(matches!(
            write_module_to(&mut sink, &module),
            Err(WriteError::NonSeekableSinkWithIndex)
        ));
    }

    #[test]
    fn test_unknown_directives_preserved() {
        let source = b"(.nif26)\n(.future a +1)\n(t x)\n";
        let module = parse(source).unwrap();
        let written = write_module(&module).unwrap();
        assert_eq!(written, source);
        assert!(matches!(module.directives[1], Directive::Unknown { .. }));
    }

    #[test]
    fn test_dialect_writes_back_as_lang() {
        let source = b"(.nif26)\n(.dialect \"old\" (.dialect \"older\" (op y.3)))\n";
        let module = parse(source).unwrap();
        let written = write_module(&module).unwrap();
        assert_eq!(
            written,
            &b"(.nif26)\n(.lang \"old\" (.lang \"older\" (op y.3)))\n"[..]
        );
        assert!(!written.windows(8).any(|w| w == b".dialect"));
    }

    #[test]
    fn test_escaped_ident_round_trip() {
        // an identifier containing a decoded '(' must re-escape it
        let source = b"(.nif26)\n(t a\\28b)\n";
        let module = parse(source).unwrap();
        let written = write_module(&module).unwrap();
        assert_eq!(written, source);
    }

    #[test]
    fn test_compound_span_matches_emitted_offset() {
        let source = b"(.nif26)\n(proc :a.0.m (stmts))\n";
        let module = parse(source).unwrap();
        let options = WriteOptions {
            write_index: true,
            ..WriteOptions::default()
        };
        let written = write_module_with_options(&module, options).unwrap();
        let reparsed = parse(&written).unwrap();
        let index = reparsed.index.as_ref().unwrap();
        assert_eq!(
            index.entries[0].offset,
            reparsed.arena.get(reparsed.body[0]).span.start as u64
        );
    }
}
