//! Query commands over a built index.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::index::print_json;
use crate::cli::OutputFormat;
use crate::config::Settings;
use crate::error::IndexResult;
use crate::indexing::{ProjectIndex, ProjectIndexer};
use crate::symbol::Symbol;
use crate::types::SymbolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Callers,
    Callees,
}

fn open(settings: Settings, root: &Path) -> IndexResult<ProjectIndex> {
    ProjectIndexer::new(Arc::new(settings))?.open(root)
}

fn print_symbols(symbols: &[&Symbol], format: OutputFormat) -> IndexResult<()> {
    match format {
        OutputFormat::Json => print_json(&symbols),
        OutputFormat::Text => {
            if symbols.is_empty() {
                println!("No symbols found");
            }
            for symbol in symbols {
                println!(
                    "{:<10} {:<32} {}:{}  [{}]",
                    symbol.kind(),
                    symbol.name,
                    symbol.file_path,
                    symbol.line_number,
                    symbol.id
                );
            }
            Ok(())
        }
    }
}

pub fn run_find(settings: Settings, root: &Path, name: &str, format: OutputFormat) -> IndexResult<()> {
    let index = open(settings, root)?;
    print_symbols(&index.find_by_name(name), format)
}

pub fn run_list(
    settings: Settings,
    root: &Path,
    kind: Option<SymbolKind>,
    limit: usize,
    format: OutputFormat,
) -> IndexResult<()> {
    let index = open(settings, root)?;
    let symbols = match kind {
        Some(kind) => index.list_by_kind(kind, limit),
        None => {
            let mut all: Vec<&Symbol> = SymbolKind::ALL
                .iter()
                .flat_map(|kind| index.list_by_kind(*kind, 0))
                .collect();
            all.sort_by(|a, b| (&a.file_path, a.line_number).cmp(&(&b.file_path, b.line_number)));
            if limit > 0 {
                all.truncate(limit);
            }
            all
        }
    };
    print_symbols(&symbols, format)
}

#[derive(Serialize)]
struct CallQueryResult<'a> {
    target: &'a Symbol,
    depth: usize,
    results: Vec<&'a Symbol>,
}

/// Callers or callees of `target`, which is a symbol id or a function
/// name. A name matching several functions reports each one.
pub fn run_calls(
    settings: Settings,
    root: &Path,
    target: &str,
    depth: usize,
    direction: Direction,
    format: OutputFormat,
) -> IndexResult<()> {
    let index = open(settings, root)?;
    let results: Vec<CallQueryResult> = index
        .resolve_target(target)
        .iter()
        .filter_map(|id| {
            let symbol = index.get(id)?;
            let results = match direction {
                Direction::Callers => index.callers(id, depth),
                Direction::Callees => index.callees(id, depth),
            };
            Some(CallQueryResult {
                target: symbol,
                depth,
                results,
            })
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&results),
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No symbol matching '{target}'");
            }
            let label = match direction {
                Direction::Callers => "Callers of",
                Direction::Callees => "Callees of",
            };
            for result in &results {
                println!(
                    "{label} {} ({}:{}, depth {depth}):",
                    result.target.name, result.target.file_path, result.target.line_number
                );
                print_symbols(&result.results, format)?;
            }
            Ok(())
        }
    }
}

pub fn run_stats(settings: Settings, root: &Path, format: OutputFormat) -> IndexResult<()> {
    let index = open(settings, root)?;
    let stats = index.statistics();
    match format {
        OutputFormat::Json => print_json(&stats),
        OutputFormat::Text => {
            println!("Project: {}", stats.project_id);
            println!("  files:       {}", stats.files);
            println!("  symbols:     {}", stats.symbols);
            for (kind, count) in &stats.by_kind {
                println!("    {kind:<10} {count}");
            }
            println!("  call edges:  {}", stats.call_edges);
            println!("  with includes: {}", stats.include_files);
            Ok(())
        }
    }
}

pub fn run_includes(settings: Settings, root: &Path, file: Option<&str>, format: OutputFormat) -> IndexResult<()> {
    let index = open(settings, root)?;
    let includes: BTreeMap<&String, &Vec<String>> = index
        .includes()
        .iter()
        .filter(|(including, _)| file.is_none_or(|f| f == including.as_str()))
        .collect();

    match format {
        OutputFormat::Json => print_json(&includes),
        OutputFormat::Text => {
            for (including, targets) in includes {
                println!("{including}");
                for target in targets {
                    println!("  -> {target}");
                }
            }
            Ok(())
        }
    }
}
