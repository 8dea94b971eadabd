//! nifindex - validate and rewrite the exported-symbol index of NIF files.

use clap::Parser;
use std::path::{Path, PathBuf};

use nif_ast::Module;
use nif_parser::{ParseError, ParseOptions};

/// Validate the exported-symbol index of a NIF file.
///
/// Recomputes the byte offsets of every exported symbol definition and
/// compares them against the trailing `.index`. Exits zero when the
/// on-disk index is up to date.
#[derive(Parser)]
#[command(name = "nifindex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input .nif file
    file: PathBuf,

    /// Rewrite the file with a freshly computed index, patching
    /// `.indexat` in place
    #[arg(long)]
    write: bool,

    /// Treat recoverable conditions (index offset mismatches, unknown
    /// directives) as fatal
    #[arg(long)]
    strict: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    run(&cli)
}

fn run(cli: &Cli) -> miette::Result<()> {
    let source = std::fs::read(&cli.file)
        .map_err(|e| miette::miette!("Failed to read {}: {}", cli.file.display(), e))?;

    let options = ParseOptions {
        module_suffix: nif_parser::module_suffix_of(&cli.file),
        strict: cli.strict,
        defer_pending_symbols: false,
    };
    let module = match nif_parser::parse_with_options(&source, options) {
        Ok(module) => module,
        Err(err) => {
            report_parse_error(&cli.file, &source, &err);
            return Err(miette::miette!("{}: parse failed", cli.file.display()));
        }
    };

    if cli.write {
        let patched = nif_writer::patch_index(&source, &module)
            .map_err(|e| miette::miette!("{}: {}", cli.file.display(), e))?;
        std::fs::write(&cli.file, patched)
            .map_err(|e| miette::miette!("Failed to write {}: {}", cli.file.display(), e))?;
        println!(
            "{}: index rewritten ({} entries)",
            cli.file.display(),
            module.exported_entries().len()
        );
        return Ok(());
    }

    check(cli, &source, &module)
}

fn check(cli: &Cli, source: &[u8], module: &Module) -> miette::Result<()> {
    let expected = module.exported_entries();
    let index = match &module.index {
        Some(index) => index,
        None if expected.is_empty() => {
            println!("{}: ok (no exported symbols)", cli.file.display());
            return Ok(());
        }
        None => {
            return Err(miette::miette!(
                "{}: missing index ({} exported symbols)",
                cli.file.display(),
                expected.len()
            ));
        }
    };

    let mut mismatches = 0;
    if index.entries.len() != expected.len() {
        println!(
            "  error: index has {} entries, tree has {} exported symbols",
            index.entries.len(),
            expected.len()
        );
        mismatches += 1;
    }
    for (entry, (symbol, offset)) in index.entries.iter().zip(&expected) {
        if &entry.symbol != symbol || entry.offset != *offset {
            let (line, col) = offset_to_line_col(source, *offset as usize);
            println!(
                "  error: expected {} at offset {}, index records {} at offset {}",
                String::from_utf8_lossy(symbol),
                offset,
                String::from_utf8_lossy(&entry.symbol),
                entry.offset
            );
            println!("   --> {}:{}:{}", cli.file.display(), line, col);
            mismatches += 1;
        }
    }

    if mismatches == 0 {
        println!("{}: ok ({} entries)", cli.file.display(), expected.len());
        Ok(())
    } else {
        Err(miette::miette!(
            "{}: {} index mismatch(es); rerun with --write to fix",
            cli.file.display(),
            mismatches
        ))
    }
}

fn report_parse_error(file: &Path, source: &[u8], err: &ParseError) {
    println!("  error: {err}");
    if let Some(offset) = err.offset() {
        let (line, col) = offset_to_line_col(source, offset);
        println!("   --> {}:{}:{}", file.display(), line, col);
        print_source_line(source, line);
    }
}

fn offset_to_line_col(source: &[u8], offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for &b in source.iter().take(offset) {
        if b == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

fn print_source_line(source: &[u8], line_num: usize) {
    if let Some(line) = source.split(|&b| b == b'\n').nth(line_num - 1) {
        println!("{:4} | {}", line_num, String::from_utf8_lossy(line));
    }
}
