//! universal-ctags backend.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{SymbolBackend, command_available, split_parameters, write_file_list};
use crate::error::{IndexError, IndexResult};
use crate::symbol::{Symbol, SymbolDetail};
use crate::types::{Backend, SymbolId, SymbolKind};

#[derive(Debug, Clone)]
pub struct CtagsBackend {
    command: String,
}

impl CtagsBackend {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> IndexError {
        IndexError::BackendUnavailable {
            backend: Backend::Ctags.to_string(),
            reason: reason.into(),
        }
    }
}

impl SymbolBackend for CtagsBackend {
    fn backend(&self) -> Backend {
        Backend::Ctags
    }

    fn is_available(&self) -> bool {
        command_available(&self.command, "--version")
    }

    fn extract(&self, root: &Path, files: &[PathBuf]) -> IndexResult<Vec<Symbol>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let list = write_file_list(root, files).map_err(|e| self.unavailable(format!("file list: {e}")))?;

        let output = Command::new(&self.command)
            .current_dir(root)
            .args(["--languages=C,C++", "--fields=+n+k+S+t", "--sort=no", "-f", "-", "-L"])
            .arg(list.path())
            .output()
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(self.unavailable(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_tags(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// One parsed line of a tags file.
#[derive(Debug, Clone, PartialEq, Default)]
struct TagEntry<'a> {
    name: &'a str,
    file: &'a str,
    excmd: &'a str,
    kind: &'a str,
    line: Option<u32>,
    signature: Option<&'a str>,
    typeref: Option<&'a str>,
}

fn parse_tag_line(line: &str) -> Option<TagEntry<'_>> {
    if line.starts_with("!_") || line.trim().is_empty() {
        return None;
    }
    let mut head = line.splitn(3, '\t');
    let name = head.next()?;
    let file = head.next()?;
    let rest = head.next()?;

    let (excmd, fields) = match rest.find(";\"\t") {
        Some(pos) => (&rest[..pos], &rest[pos + 3..]),
        None => (rest.trim_end_matches(";\""), ""),
    };

    let mut entry = TagEntry {
        name,
        file,
        excmd,
        line: excmd.trim().parse().ok(),
        ..TagEntry::default()
    };

    for field in fields.split('\t').filter(|f| !f.is_empty()) {
        match field.split_once(':') {
            Some(("kind", value)) => entry.kind = value,
            Some(("line", value)) => entry.line = value.parse().ok().or(entry.line),
            Some(("signature", value)) => entry.signature = Some(value),
            Some(("typeref", value)) => entry.typeref = Some(value.strip_prefix("typename:").unwrap_or(value)),
            Some(_) => {}
            // Bare field is the kind in the default tag format
            None => entry.kind = field,
        }
    }

    Some(entry)
}

fn map_kind(kind: &str) -> Option<SymbolKind> {
    match kind {
        "f" | "function" | "method" => Some(SymbolKind::Function),
        "s" | "struct" | "c" | "class" | "u" | "union" => Some(SymbolKind::Structure),
        "d" | "macro" => Some(SymbolKind::Macro),
        "v" | "variable" | "m" | "member" | "x" | "externvar" => Some(SymbolKind::Variable),
        "t" | "typedef" => Some(SymbolKind::Typedef),
        "g" | "enum" => Some(SymbolKind::Enum),
        // Prototypes, locals, parameters, labels, headers, namespaces
        "p" | "prototype" | "l" | "local" | "z" | "parameter" | "L" | "label" | "h" | "header" | "n"
        | "namespace" | "N" | "name" | "U" | "using" => None,
        _ => Some(SymbolKind::Variable),
    }
}

/// Excerpt of the search pattern, e.g. `/^int main(void)$/` -> `int main(void)`.
fn pattern_text(excmd: &str) -> String {
    excmd
        .trim()
        .trim_start_matches('/')
        .trim_start_matches('?')
        .trim_start_matches('^')
        .trim_end_matches('/')
        .trim_end_matches('?')
        .trim_end_matches('$')
        .replace("\\/", "/")
        .trim()
        .to_string()
}

fn parse_tags(output: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    for (ordinal, entry) in output.lines().filter_map(parse_tag_line).enumerate() {
        let Some(kind) = map_kind(entry.kind) else {
            continue;
        };
        let file = entry.file.trim_start_matches("./").replace('\\', "/");
        let line = entry.line.unwrap_or(1);
        let typeref = entry.typeref.unwrap_or_default().to_string();

        let detail = match kind {
            SymbolKind::Function => SymbolDetail::function(
                if typeref.is_empty() { "void".to_string() } else { typeref },
                entry.signature.map(split_parameters).unwrap_or_default(),
            ),
            SymbolKind::Structure => SymbolDetail::Struct { members: Vec::new() },
            SymbolKind::Macro => SymbolDetail::Macro {
                parameters: entry.signature.map(split_parameters),
                value: String::new(),
            },
            SymbolKind::Variable => SymbolDetail::Variable {
                data_type: typeref,
                is_static: false,
                is_const: false,
            },
            SymbolKind::Typedef => SymbolDetail::Typedef { underlying: typeref },
            SymbolKind::Enum => SymbolDetail::Enum { values: Vec::new() },
        };

        let ordinal = u32::try_from(ordinal).unwrap_or(u32::MAX);
        let id = SymbolId::derive(Backend::Ctags, kind, entry.name, &file, line, ordinal);
        symbols.push(Symbol::new(id, entry.name, file, line, Backend::Ctags, detail).with_declaration(pattern_text(entry.excmd)));
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAGS: &str = "!_TAG_FILE_FORMAT\t2\t/extended format/\n\
main\tsrc/main.c\t/^int main(int argc, char **argv)$/;\"\tf\tline:12\ttyperef:typename:int\tsignature:(int argc,char ** argv)\n\
point\tsrc/geo.h\t/^struct point {$/;\"\tkind:struct\tline:3\n\
MAX\t./src/geo.h\t/^#define MAX(/;\"\td\tline:1\tsignature:(a,b)\n\
x\tsrc/geo.h\t/^  int x;$/;\"\tm\tline:4\ttyperef:typename:int\tstruct:point\n\
helper\tsrc/main.c\t/^static int helper(void);$/;\"\tp\tline:5\n\
u8\tsrc/geo.h\t9;\"\tt\ttyperef:typename:unsigned char\n";

    #[test]
    fn test_parse_tag_line_fields() {
        let entry = parse_tag_line(TAGS.lines().nth(1).unwrap()).unwrap();
        assert_eq!(entry.name, "main");
        assert_eq!(entry.file, "src/main.c");
        assert_eq!(entry.kind, "f");
        assert_eq!(entry.line, Some(12));
        assert_eq!(entry.typeref, Some("int"));
        assert_eq!(entry.signature, Some("(int argc,char ** argv)"));
        assert!(parse_tag_line("!_TAG_PROGRAM_NAME\tUniversal Ctags").is_none());
    }

    #[test]
    fn test_parse_tags_maps_kinds() {
        let symbols = parse_tags(TAGS);
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        // Prototype is skipped
        assert_eq!(names, vec!["main", "point", "MAX", "x", "u8"]);

        let main = &symbols[0];
        assert_eq!(main.source, Backend::Ctags);
        assert_eq!(main.line_number, 12);
        assert_eq!(main.declaration, "int main(int argc, char **argv)");
        match &main.detail {
            SymbolDetail::Function {
                return_type,
                parameters,
                ..
            } => {
                assert_eq!(return_type, "int");
                assert_eq!(parameters, &vec!["int argc".to_string(), "char ** argv".to_string()]);
            }
            other => panic!("expected function, got {other:?}"),
        }

        assert_eq!(symbols[1].kind(), SymbolKind::Structure);
        assert_eq!(symbols[2].kind(), SymbolKind::Macro);
        assert_eq!(symbols[2].file_path, "src/geo.h");
        assert_eq!(symbols[3].kind(), SymbolKind::Variable);

        // Numeric excmd gives the line
        assert_eq!(symbols[4].line_number, 9);
        match &symbols[4].detail {
            SymbolDetail::Typedef { underlying } => assert_eq!(underlying, "unsigned char"),
            other => panic!("expected typedef, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_binary_reports_unavailable() {
        let backend = CtagsBackend::new("symgraph-no-such-ctags");
        assert!(!backend.is_available());

        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("a.c");
        std::fs::write(&file, "int a;").unwrap();
        let err = backend.extract(temp.path(), &[file]).unwrap_err();
        assert!(matches!(err, IndexError::BackendUnavailable { .. }));
    }
}
