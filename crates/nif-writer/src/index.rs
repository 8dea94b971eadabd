//! Recompute and splice a fresh symbol index into existing module bytes.
//!
//! Unlike [`crate::write_module`], this path never reformats the module:
//! everything before the index keeps its exact bytes, so the recomputed
//! offsets (taken from the parsed node spans) stay valid, and `.indexat`
//! is patched inside its reserved pad without shifting the file.

use nif_ast::{Directive, IndexEntry, Module, Visibility};
use nif_lexer::is_whitespace;
use rustc_hash::FxHashMap;

use crate::error::WriteError;
use crate::writer::push_index;

/// Rebuild the trailing `.index` of `original` from `module` (which must
/// be the parse of those bytes) and patch `.indexat` in place.
///
/// Visibilities from the existing index are preserved; fresh symbols
/// default to exported. When the file carries no index yet, one is
/// appended; when it carries no `.indexat`, only the index is written.
pub fn patch_index(original: &[u8], module: &Module) -> Result<Vec<u8>, WriteError> {
    let mut visibility: FxHashMap<&[u8], Visibility> = FxHashMap::default();
    if let Some(index) = &module.index {
        for entry in &index.entries {
            visibility.insert(&entry.symbol, entry.visibility);
        }
    }
    let entries: Vec<IndexEntry> = module
        .exported_entries()
        .into_iter()
        .map(|(symbol, offset)| IndexEntry {
            visibility: visibility
                .get(symbol.as_slice())
                .copied()
                .unwrap_or(Visibility::Exported),
            symbol,
            offset,
        })
        .collect();

    let cut = module
        .index_span
        .map(|span| span.start as usize)
        .unwrap_or(original.len());
    let mut out = original[..cut].to_vec();
    while out.last().is_some_and(|&b| is_whitespace(b)) {
        out.pop();
    }
    out.push(b'\n');
    let index_start = out.len();
    push_index(&mut out, &entries);

    if let Some(pad) = module.directives.iter().find_map(|d| match d {
        Directive::IndexAt { pad, .. } => Some(*pad),
        _ => None,
    }) {
        let digits = format!("+{index_start}");
        if digits.len() > pad.len() as usize {
            return Err(WriteError::IndexPadInsufficient {
                needed: digits.len(),
                available: pad.len() as usize,
            });
        }
        let pad_start = pad.start as usize;
        out[pad_start..pad_start + digits.len()].copy_from_slice(digits.as_bytes());
        for b in &mut out[pad_start + digits.len()..pad.end as usize] {
            *b = b' ';
        }
    }
    Ok(out)
}
