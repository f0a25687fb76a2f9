//! cscope backend.
//!
//! Builds a throwaway cross-reference database from the file list, then
//! queries every global definition (`-L -1 .*`). Each result line is
//! `file name line context`; the symbol kind is guessed from the context
//! text since cscope does not report it.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;

use regex::Regex;

use super::{SymbolBackend, command_available, split_parameters, write_file_list};
use crate::error::{IndexError, IndexResult};
use crate::symbol::{Symbol, SymbolDetail};
use crate::types::{Backend, SymbolId, SymbolKind};

#[derive(Debug, Clone)]
pub struct CscopeBackend {
    command: String,
}

impl CscopeBackend {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> IndexError {
        IndexError::BackendUnavailable {
            backend: Backend::Cscope.to_string(),
            reason: reason.into(),
        }
    }

    fn run(&self, root: &Path, args: &[&OsStr]) -> IndexResult<Output> {
        let output = Command::new(&self.command)
            .current_dir(root)
            .args(args)
            .output()
            .map_err(|e| self.unavailable(e.to_string()))?;
        if !output.status.success() {
            return Err(self.unavailable(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}

impl SymbolBackend for CscopeBackend {
    fn backend(&self) -> Backend {
        Backend::Cscope
    }

    fn is_available(&self) -> bool {
        command_available(&self.command, "-V")
    }

    fn extract(&self, root: &Path, files: &[PathBuf]) -> IndexResult<Vec<Symbol>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let list = write_file_list(root, files).map_err(|e| self.unavailable(format!("file list: {e}")))?;
        let db_dir = tempfile::TempDir::new().map_err(|e| self.unavailable(format!("database dir: {e}")))?;
        let db = db_dir.path().join("cscope.out");

        // Build only, kernel mode so system headers stay out
        self.run(
            root,
            &[
                OsStr::new("-b"),
                OsStr::new("-k"),
                OsStr::new("-i"),
                list.path().as_os_str(),
                OsStr::new("-f"),
                db.as_os_str(),
            ],
        )?;
        let output = self.run(
            root,
            &[
                OsStr::new("-d"),
                OsStr::new("-L"),
                OsStr::new("-1"),
                OsStr::new(".*"),
                OsStr::new("-f"),
                db.as_os_str(),
            ],
        )?;

        Ok(parse_definitions(&String::from_utf8_lossy(&output.stdout)))
    }
}

struct ContextPatterns {
    macro_def: Regex,
    record: Regex,
    enumeration: Regex,
    typedef: Regex,
}

fn patterns() -> Option<&'static ContextPatterns> {
    static PATTERNS: OnceLock<Option<ContextPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(ContextPatterns {
                macro_def: Regex::new(r"^\s*#\s*define\s+\w+(\([^)]*\))?").ok()?,
                record: Regex::new(r"\b(struct|union|class)\s+\w+\s*(\{|:|$)").ok()?,
                enumeration: Regex::new(r"\benum\s+(class\s+)?\w+\s*(\{|:|$)").ok()?,
                typedef: Regex::new(r"^\s*typedef\b").ok()?,
            })
        })
        .as_ref()
}

fn classify(name: &str, context: &str) -> SymbolDetail {
    let call_open = format!("{name}(");
    let squeezed: String = context.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(p) = patterns() {
        if let Some(caps) = p.macro_def.captures(context) {
            return SymbolDetail::Macro {
                parameters: caps.get(1).map(|m| split_parameters(m.as_str())),
                value: String::new(),
            };
        }
        if p.typedef.is_match(context) {
            return SymbolDetail::Typedef {
                underlying: String::new(),
            };
        }
        if p.enumeration.is_match(context) {
            return SymbolDetail::Enum { values: Vec::new() };
        }
        if p.record.is_match(context) && !squeezed.contains(&call_open) {
            return SymbolDetail::Struct { members: Vec::new() };
        }
    }

    let compact = squeezed.replace(&format!("{name} ("), &call_open);
    if let Some(pos) = compact.find(&call_open) {
        let prefix = compact[..pos].trim();
        let return_type = prefix
            .split_whitespace()
            .filter(|w| !matches!(*w, "static" | "inline" | "extern"))
            .collect::<Vec<_>>()
            .join(" ");
        let after = &compact[pos + name.len()..];
        let params = match after.find(')') {
            Some(end) => split_parameters(&after[..=end]),
            None => Vec::new(),
        };
        return SymbolDetail::function(if return_type.is_empty() { "void".to_string() } else { return_type }, params);
    }

    SymbolDetail::Variable {
        data_type: String::new(),
        is_static: context.split_whitespace().any(|w| w == "static"),
        is_const: context.split_whitespace().any(|w| w == "const"),
    }
}

fn parse_definitions(output: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    for (ordinal, line) in output.lines().enumerate() {
        let mut parts = line.splitn(4, ' ');
        let (Some(file), Some(name), Some(line_no)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let Ok(line_number) = line_no.parse::<u32>() else {
            continue;
        };
        let context = parts.next().unwrap_or_default().trim();
        let file = file.trim_start_matches("./").replace('\\', "/");

        let detail = classify(name, context);
        let kind: SymbolKind = detail.kind();
        let ordinal = u32::try_from(ordinal).unwrap_or(u32::MAX);
        let id = SymbolId::derive(Backend::Cscope, kind, name, &file, line_number, ordinal);
        symbols.push(Symbol::new(id, name, file, line_number, Backend::Cscope, detail).with_declaration(context));
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_contexts() {
        assert_eq!(classify("MAX", "#define MAX(a, b) ((a) > (b) ? (a) : (b))").kind(), SymbolKind::Macro);
        assert_eq!(classify("point", "struct point {").kind(), SymbolKind::Structure);
        assert_eq!(classify("color", "enum color {").kind(), SymbolKind::Enum);
        assert_eq!(classify("u8", "typedef unsigned char u8;").kind(), SymbolKind::Typedef);
        assert_eq!(classify("counter", "static int counter = 0;").kind(), SymbolKind::Variable);

        match classify("parse", "static struct node *parse (const char *s, int n)") {
            SymbolDetail::Function {
                return_type,
                parameters,
                ..
            } => {
                assert_eq!(return_type, "struct node *");
                assert_eq!(parameters, vec!["const char *s".to_string(), "int n".to_string()]);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_macro_parameters() {
        match classify("MAX", "#define MAX(a,b) a") {
            SymbolDetail::Macro { parameters, .. } => {
                assert_eq!(parameters, Some(vec!["a".to_string(), "b".to_string()]))
            }
            other => panic!("expected macro, got {other:?}"),
        }
        match classify("LIMIT", "#define LIMIT 10") {
            SymbolDetail::Macro { parameters, .. } => assert!(parameters.is_none()),
            other => panic!("expected macro, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_definitions() {
        let output = "src/main.c main 12 int main(void)\n\
                      ./src/geo.h point 3 struct point {\n\
                      garbage line\n\
                      src/geo.h BAD notanumber x\n";
        let symbols = parse_definitions(output);
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "main");
        assert_eq!(symbols[0].line_number, 12);
        assert_eq!(symbols[0].source, Backend::Cscope);
        assert_eq!(symbols[0].declaration, "int main(void)");
        assert!(symbols[0].is_function());
        assert_eq!(symbols[1].file_path, "src/geo.h");
        assert_eq!(symbols[1].kind(), SymbolKind::Structure);
    }
}
