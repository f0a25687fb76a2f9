//! Supplementary extraction backends.
//!
//! Each backend runs an external tool and adapts its output into
//! the canonical [`Symbol`] shape. Backends run after the tree-sitter
//! extractor and only contribute symbols it did not already find.

pub mod clangd;
pub mod cscope;
pub mod ctags;

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::Settings;
use crate::error::IndexResult;
use crate::symbol::Symbol;
use crate::types::Backend;

pub use clangd::ClangdBackend;
pub use cscope::CscopeBackend;
pub use ctags::CtagsBackend;

pub trait SymbolBackend: Send + Sync {
    fn backend(&self) -> Backend;

    /// Cheap probe; an unavailable backend is skipped with a warning.
    fn is_available(&self) -> bool;

    /// Extract symbols for `files` (absolute paths under `root`). Symbol
    /// file paths must be project-relative.
    fn extract(&self, root: &Path, files: &[PathBuf]) -> IndexResult<Vec<Symbol>>;
}

/// Enabled backends in priority order: ctags, cscope, then clangd.
pub fn from_settings(settings: &Settings) -> Vec<Box<dyn SymbolBackend>> {
    let mut backends: Vec<Box<dyn SymbolBackend>> = Vec::new();
    if settings.backends.ctags.enabled {
        backends.push(Box::new(CtagsBackend::new(&settings.backends.ctags.command)));
    }
    if settings.backends.cscope.enabled {
        backends.push(Box::new(CscopeBackend::new(&settings.backends.cscope.command)));
    }
    if settings.backends.clangd.enabled {
        backends.push(Box::new(ClangdBackend::new(&settings.backends.clangd.command)));
    }
    backends
}

/// Whether `command` can be spawned and exits successfully with `arg`.
pub(crate) fn command_available(command: &str, arg: &str) -> bool {
    Command::new(command)
        .arg(arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Write `files` relative to `root`, one per line, into a temp file.
pub(crate) fn write_file_list(root: &Path, files: &[PathBuf]) -> std::io::Result<tempfile::NamedTempFile> {
    use std::io::Write;

    let mut list = tempfile::NamedTempFile::new()?;
    for file in files {
        writeln!(list, "{}", super::walker::relative_path(root, file))?;
    }
    list.flush()?;
    Ok(list)
}

/// Split a C-style parameter list `(int a, char *b)` into its parameters.
/// `(void)` and `()` yield an empty list.
pub(crate) fn split_parameters(signature: &str) -> Vec<String> {
    let inner = signature
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim();
    if inner.is_empty() || inner == "void" {
        return Vec::new();
    }

    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in inner.chars() {
        match ch {
            '(' | '<' | '[' => {
                depth += 1;
                current.push(ch);
            }
            ')' | '>' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                params.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        params.push(current.trim().to_string());
    }
    params
}
