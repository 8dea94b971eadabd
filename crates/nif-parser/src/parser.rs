//! Recursive descent parser for NIF modules.

use nif_ast::{
    classify_symbol, Atom, Directive, Index, IndexEntry, Module, LineInfo, Node, NodeArena,
    NodeId, NodeKind, Prefix, Span, Visibility, NIF_COMPAT_VERSION, NIF_VERSION,
};
use nif_lexer::{
    classify, scan_char, scan_comment, scan_line_info, scan_number, scan_string, scan_word,
    Cursor, RawLineInfo, ScannedNumber, TokenClass, Word,
};
use smol_str::SmolStr;

use crate::error::ParseError;

/// Options controlling a parse.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Module suffix used to expand trailing-dot symbols, normally the
    /// leading dot-separated component of the filename stem.
    pub module_suffix: Option<SmolStr>,
    /// Escalate recoverable conditions (unknown directives, index offset
    /// mismatches) into fatal errors.
    pub strict: bool,
    /// Keep trailing-dot symbols pending instead of failing when no module
    /// suffix is available; [`Module::expand_pending`] completes them.
    pub defer_pending_symbols: bool,
}

/// Parser state for one module.
pub struct Parser<'a> {
    cursor: Cursor<'a>,
    arena: NodeArena,
    options: ParseOptions,
}

impl<'a> Parser<'a> {
    /// Create a parser over `source`.
    pub fn new(source: &'a [u8], options: ParseOptions) -> Self {
        Self {
            cursor: Cursor::new(source),
            arena: NodeArena::new(),
            options,
        }
    }

    // ========================================================================
    // Top-level parsing
    // ========================================================================

    /// Parse one complete module. Consumes the parser; errors are fatal
    /// and no partial tree is returned.
    pub fn parse_module(mut self) -> Result<Module, ParseError> {
        let version = self.parse_version()?;
        let mut directives = vec![Directive::Version(version)];
        let mut body: Vec<NodeId> = Vec::new();
        let mut index: Option<Index> = None;
        let mut index_span: Option<Span> = None;

        loop {
            self.cursor.skip_whitespace();
            if self.cursor.is_eof() {
                break;
            }
            // every top-level item is a (possibly prefixed) compound node
            let prefix = self.parse_prefix()?;
            match self.cursor.peek() {
                None => {
                    if prefix.is_empty() {
                        break;
                    }
                    return Err(ParseError::UnexpectedEnd {
                        offset: self.cursor.offset(),
                    });
                }
                Some(b'(') if self.cursor.peek_at(1) == Some(b'.') => {
                    let start = self.cursor.offset();
                    self.cursor.advance(2);
                    let byte = match self.cursor.peek() {
                        Some(b) => b,
                        None => {
                            return Err(ParseError::UnterminatedCompound { offset: start })
                        }
                    };
                    if classify(byte) != TokenClass::Word {
                        return Err(ParseError::UnexpectedByte {
                            byte,
                            offset: self.cursor.offset(),
                        });
                    }
                    let word = scan_word(&mut self.cursor)?;
                    let mut tag = Vec::with_capacity(word.bytes.len() + 1);
                    tag.push(b'.');
                    tag.extend_from_slice(&word.bytes);
                    match word.bytes.as_slice() {
                        // language scopes are structural: they wrap body
                        // content and stay in the tree; the deprecated
                        // .dialect spelling normalizes to .lang
                        b"lang" | b"dialect" => {
                            let id = self.parse_compound_children(
                                start,
                                prefix,
                                b".lang".to_vec(),
                            )?;
                            body.push(id);
                        }
                        b"index" => {
                            if index.is_some() {
                                return Err(ParseError::BadIndex { offset: start });
                            }
                            let parsed = self.parse_index(start)?;
                            index_span = Some(Span::new(
                                start as u32,
                                self.cursor.offset() as u32,
                            ));
                            index = Some(parsed);
                        }
                        _ if body.is_empty() && index.is_none() => {
                            let directive = self.parse_directive(start, &word.bytes, tag)?;
                            directives.push(directive);
                        }
                        _ => {
                            // a stray directive after the body started
                            if self.options.strict {
                                return Err(ParseError::UnsupportedDirective { offset: start });
                            }
                            let id = self.parse_compound_children(start, Prefix::default(), tag)?;
                            directives.push(Directive::Unknown { node: id });
                        }
                    }
                }
                Some(b'(') => {
                    let id = self.parse_compound(prefix)?;
                    body.push(id);
                }
                Some(b')') => {
                    return Err(ParseError::UnexpectedClose {
                        offset: self.cursor.offset(),
                    });
                }
                Some(byte) => {
                    return Err(ParseError::UnexpectedByte {
                        byte,
                        offset: self.cursor.offset(),
                    });
                }
            }
        }

        if body.is_empty() {
            return Err(ParseError::EmptyModule);
        }

        if let Some(span) = index_span {
            let declared = directives.iter().find_map(|d| match d {
                Directive::IndexAt { offset, .. } => Some(*offset),
                _ => None,
            });
            if let Some(declared) = declared {
                let actual = span.start as u64;
                if declared != actual {
                    if self.options.strict {
                        return Err(ParseError::IndexOffsetMismatch { declared, actual });
                    }
                    tracing::warn!(
                        declared,
                        actual,
                        "indexat offset does not match the .index location"
                    );
                }
            }
        }

        Ok(Module {
            arena: self.arena,
            directives,
            body,
            index,
            index_span,
            suffix: self.options.module_suffix.clone(),
        })
    }

    /// The magic cookie must be the very first bytes of the file, with no
    /// preceding whitespace.
    fn parse_version(&mut self) -> Result<u32, ParseError> {
        if self.cursor.peek() != Some(b'(') || self.cursor.peek_at(1) != Some(b'.') {
            return Err(ParseError::UnrecognizedVersion { offset: 0 });
        }
        self.cursor.advance(2);
        let word =
            scan_word(&mut self.cursor).map_err(|_| ParseError::UnrecognizedVersion { offset: 0 })?;
        let version = word
            .bytes
            .strip_prefix(b"nif")
            .and_then(|digits| std::str::from_utf8(digits).ok())
            .and_then(|digits| digits.parse::<u32>().ok())
            .ok_or(ParseError::UnrecognizedVersion { offset: 0 })?;
        if version != NIF_VERSION && version != NIF_COMPAT_VERSION {
            return Err(ParseError::UnrecognizedVersion { offset: 0 });
        }
        if self.cursor.bump() != Some(b')') {
            return Err(ParseError::UnrecognizedVersion {
                offset: self.cursor.offset(),
            });
        }
        Ok(version)
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Optional line information followed by an optional comment.
    fn parse_prefix(&mut self) -> Result<Prefix, ParseError> {
        let mut prefix = Prefix::default();
        if let Some(b) = self.cursor.peek() {
            if classify(b) == TokenClass::LineInfo {
                let raw = scan_line_info(&mut self.cursor)?;
                prefix.line_info = Some(line_info_from_raw(raw));
                self.cursor.skip_whitespace();
            }
        }
        if self.cursor.peek() == Some(b'#') {
            prefix.comment = Some(scan_comment(&mut self.cursor)?);
            self.cursor.skip_whitespace();
        }
        Ok(prefix)
    }

    fn parse_node(&mut self) -> Result<NodeId, ParseError> {
        let prefix = self.parse_prefix()?;
        let start = self.cursor.offset();
        let byte = match self.cursor.peek() {
            Some(b) => b,
            None => return Err(ParseError::UnexpectedEnd { offset: start }),
        };
        match classify(byte) {
            TokenClass::OpenParen => self.parse_compound(prefix),
            TokenClass::Dot => {
                self.cursor.advance(1);
                Ok(self.alloc_atom(start, prefix, Atom::Empty))
            }
            TokenClass::SymbolDef => {
                self.cursor.advance(1);
                let next = self.cursor.peek().map(classify);
                if next != Some(TokenClass::Word) {
                    return Err(ParseError::MalformedSymbol { offset: start });
                }
                let word = scan_word(&mut self.cursor)?;
                let sym = self.finish_symbol(word, start)?;
                Ok(self.alloc_atom(start, prefix, Atom::SymbolDef(sym)))
            }
            TokenClass::Number => {
                let atom = match scan_number(&mut self.cursor)? {
                    ScannedNumber::Int(raw) => Atom::IntLit(raw),
                    ScannedNumber::UInt(digits) => Atom::UIntLit(digits),
                    ScannedNumber::Float(raw) => Atom::FloatLit(raw),
                };
                Ok(self.alloc_atom(start, prefix, atom))
            }
            TokenClass::CharLit => {
                let value = scan_char(&mut self.cursor)?;
                Ok(self.alloc_atom(start, prefix, Atom::CharLit(value)))
            }
            TokenClass::StrLit => {
                let bytes = scan_string(&mut self.cursor)?;
                Ok(self.alloc_atom(start, prefix, Atom::StrLit(bytes)))
            }
            TokenClass::Word => {
                let word = scan_word(&mut self.cursor)?;
                let atom = if word.has_dot {
                    Atom::Symbol(self.finish_symbol(word, start)?)
                } else {
                    Atom::Ident(word.bytes)
                };
                Ok(self.alloc_atom(start, prefix, atom))
            }
            TokenClass::CloseParen => Err(ParseError::UnexpectedClose { offset: start }),
            _ => Err(ParseError::UnexpectedByte {
                byte,
                offset: start,
            }),
        }
    }

    fn parse_compound(&mut self, prefix: Prefix) -> Result<NodeId, ParseError> {
        let start = self.cursor.offset();
        self.cursor.advance(1);
        self.cursor.skip_whitespace();
        // the 2024 grammar allowed the prefix inside the parentheses; an
        // outer prefix wins when both are present
        let inner = self.parse_prefix()?;
        let prefix = if prefix.is_empty() { inner } else { prefix };
        let tag = self.parse_tag()?;
        self.parse_compound_children(start, prefix, tag)
    }

    fn parse_tag(&mut self) -> Result<Vec<u8>, ParseError> {
        let dotted = self.cursor.peek() == Some(b'.');
        if dotted {
            self.cursor.advance(1);
        }
        let byte = match self.cursor.peek() {
            Some(b) => b,
            None => {
                return Err(ParseError::UnexpectedEnd {
                    offset: self.cursor.offset(),
                })
            }
        };
        if classify(byte) != TokenClass::Word {
            return Err(ParseError::UnexpectedByte {
                byte,
                offset: self.cursor.offset(),
            });
        }
        let word = scan_word(&mut self.cursor)?;
        if dotted {
            // nested language scopes normalize the deprecated spelling too
            if word.bytes == b"dialect" {
                return Ok(b".lang".to_vec());
            }
            let mut tag = Vec::with_capacity(word.bytes.len() + 1);
            tag.push(b'.');
            tag.extend_from_slice(&word.bytes);
            Ok(tag)
        } else {
            Ok(word.bytes)
        }
    }

    fn parse_compound_children(
        &mut self,
        start: usize,
        prefix: Prefix,
        tag: Vec<u8>,
    ) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            match self.cursor.peek() {
                None => return Err(ParseError::UnterminatedCompound { offset: start }),
                Some(b')') => {
                    self.cursor.advance(1);
                    break;
                }
                Some(_) => children.push(self.parse_node()?),
            }
        }
        let span = Span::new(start as u32, self.cursor.offset() as u32);
        Ok(self.arena.alloc(Node {
            span,
            prefix,
            kind: NodeKind::Compound { tag, children },
        }))
    }

    /// Expand a trailing dot against the module suffix and validate the
    /// dot discipline.
    fn finish_symbol(&mut self, word: Word, offset: usize) -> Result<Vec<u8>, ParseError> {
        let mut bytes = word.bytes;
        if bytes.ends_with(b".") {
            match &self.options.module_suffix {
                Some(suffix) => bytes.extend_from_slice(suffix.as_bytes()),
                None if self.options.defer_pending_symbols => return Ok(bytes),
                None => return Err(ParseError::TrailingDotWithoutSuffix { offset }),
            }
        }
        classify_symbol(&bytes).map_err(|_| ParseError::MalformedSymbol { offset })?;
        Ok(bytes)
    }

    // ========================================================================
    // Directives and the index
    // ========================================================================

    /// One recognized directive from the top-of-file block. The cursor sits
    /// just past the tag word.
    fn parse_directive(
        &mut self,
        start: usize,
        name: &[u8],
        tag: Vec<u8>,
    ) -> Result<Directive, ParseError> {
        match name {
            b"indexat" => {
                self.cursor.skip_whitespace();
                let pad_start = self.cursor.offset();
                if self.cursor.peek().map(classify) != Some(TokenClass::Number) {
                    return Err(ParseError::BadIndex { offset: pad_start });
                }
                let offset = match scan_number(&mut self.cursor)? {
                    ScannedNumber::Int(raw) => parse_offset(&raw)
                        .ok_or(ParseError::BadIndex { offset: pad_start })?,
                    _ => return Err(ParseError::BadIndex { offset: pad_start }),
                };
                // trailing spaces are the in-place-patch pad
                self.cursor.skip_whitespace();
                let pad_end = self.cursor.offset();
                self.expect_close(start)?;
                let span = Span::new(start as u32, self.cursor.offset() as u32);
                let pad = Span::new(pad_start as u32, pad_end as u32);
                Ok(Directive::IndexAt { offset, span, pad })
            }
            b"unusedname" => {
                self.cursor.skip_whitespace();
                let sym_start = self.cursor.offset();
                if self.cursor.peek().map(classify) != Some(TokenClass::Word) {
                    return Err(ParseError::MalformedSymbol { offset: sym_start });
                }
                let word = scan_word(&mut self.cursor)?;
                let sym = self.finish_symbol(word, sym_start)?;
                self.expect_close(start)?;
                Ok(Directive::UnusedName(sym))
            }
            b"vendor" | b"platform" | b"config" => {
                self.cursor.skip_whitespace();
                if self.cursor.peek() != Some(b'"') {
                    return Err(ParseError::UnexpectedByte {
                        byte: self.cursor.peek().unwrap_or(b')'),
                        offset: self.cursor.offset(),
                    });
                }
                let value = scan_string(&mut self.cursor)?;
                self.expect_close(start)?;
                Ok(match name {
                    b"vendor" => Directive::Vendor(value),
                    b"platform" => Directive::Platform(value),
                    _ => Directive::Config(value),
                })
            }
            _ => {
                if self.options.strict {
                    return Err(ParseError::UnsupportedDirective { offset: start });
                }
                let id = self.parse_compound_children(start, Prefix::default(), tag)?;
                Ok(Directive::Unknown { node: id })
            }
        }
    }

    /// The trailing `.index`; the cursor sits just past the tag word.
    /// Absolute offsets are reconstructed by cumulative sum.
    fn parse_index(&mut self, start: usize) -> Result<Index, ParseError> {
        let mut entries = Vec::new();
        let mut absolute: i64 = 0;
        loop {
            self.cursor.skip_whitespace();
            match self.cursor.peek() {
                None => return Err(ParseError::UnterminatedCompound { offset: start }),
                Some(b')') => {
                    self.cursor.advance(1);
                    break;
                }
                Some(b'(') => {
                    let entry_start = self.cursor.offset();
                    self.cursor.advance(1);
                    self.cursor.skip_whitespace();
                    let visibility = match self.scan_index_word(entry_start)?.as_slice() {
                        b"x" => Visibility::Exported,
                        b"h" => Visibility::Hidden,
                        _ => return Err(ParseError::BadIndex { offset: entry_start }),
                    };
                    self.cursor.skip_whitespace();
                    let sym_start = self.cursor.offset();
                    let word = Word {
                        bytes: self.scan_index_word(entry_start)?,
                        has_dot: true,
                    };
                    let symbol = self.finish_symbol(word, sym_start)?;
                    if !nif_ast::is_global(&symbol) {
                        return Err(ParseError::BadIndex { offset: sym_start });
                    }
                    self.cursor.skip_whitespace();
                    if self.cursor.peek().map(classify) != Some(TokenClass::Number) {
                        return Err(ParseError::BadIndex {
                            offset: self.cursor.offset(),
                        });
                    }
                    let delta = match scan_number(&mut self.cursor)? {
                        ScannedNumber::Int(raw) => std::str::from_utf8(&raw)
                            .ok()
                            .and_then(|s| s.parse::<i64>().ok())
                            .ok_or(ParseError::BadIndex { offset: entry_start })?,
                        _ => return Err(ParseError::BadIndex { offset: entry_start }),
                    };
                    absolute += delta;
                    if absolute < 0 {
                        return Err(ParseError::BadIndex { offset: entry_start });
                    }
                    self.expect_close(entry_start)?;
                    entries.push(IndexEntry {
                        visibility,
                        symbol,
                        offset: absolute as u64,
                    });
                }
                Some(byte) => {
                    return Err(ParseError::UnexpectedByte {
                        byte,
                        offset: self.cursor.offset(),
                    });
                }
            }
        }
        Ok(Index { entries })
    }

    fn scan_index_word(&mut self, entry_start: usize) -> Result<Vec<u8>, ParseError> {
        if self.cursor.peek().map(classify) != Some(TokenClass::Word) {
            return Err(ParseError::BadIndex {
                offset: entry_start,
            });
        }
        Ok(scan_word(&mut self.cursor)?.bytes)
    }

    fn expect_close(&mut self, open: usize) -> Result<(), ParseError> {
        self.cursor.skip_whitespace();
        match self.cursor.bump() {
            Some(b')') => Ok(()),
            Some(byte) => Err(ParseError::UnexpectedByte {
                byte,
                offset: self.cursor.offset() - 1,
            }),
            None => Err(ParseError::UnterminatedCompound { offset: open }),
        }
    }

    fn alloc_atom(&mut self, start: usize, prefix: Prefix, atom: Atom) -> NodeId {
        let span = Span::new(start as u32, self.cursor.offset() as u32);
        self.arena.alloc(Node {
            span,
            prefix,
            kind: NodeKind::Atom(atom),
        })
    }
}

fn line_info_from_raw(raw: RawLineInfo) -> LineInfo {
    match (raw.line, raw.file) {
        (None, _) => LineInfo::Col { col: raw.col },
        (Some(line), None) => LineInfo::ColLine { col: raw.col, line },
        (Some(line), Some(file)) => LineInfo::ColLineFile {
            col: raw.col,
            line,
            file,
        },
    }
}

fn parse_offset(raw: &[u8]) -> Option<u64> {
    let value = std::str::from_utf8(raw).ok()?.parse::<i64>().ok()?;
    u64::try_from(value).ok()
}
