//! Multi-backend symbol merge.
//!
//! The tree-sitter extractor is primary: everything it emits is kept.
//! Supplementary backends then run in priority order and only contribute
//! symbols whose `(name, file)` key has not been seen yet. A backend that is
//! missing or fails is logged and skipped; the merge only fails when the
//! union across all backends is empty.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::backends::SymbolBackend;
use super::walker::relative_path;
use crate::error::{IndexError, IndexResult};
use crate::parsing::{CExtractor, CallReference, FileExtraction};
use crate::symbol::Symbol;
use crate::types::{Backend, IncludeEdge};

/// Combined output of every backend for one project.
#[derive(Debug, Default)]
pub struct MergedExtraction {
    pub symbols: Vec<Symbol>,
    pub calls: Vec<CallReference>,
    pub includes: Vec<IncludeEdge>,
    /// Project-relative paths of every discovered file.
    pub files: Vec<String>,
    pub backends_used: Vec<Backend>,
}

pub struct SymbolMerger {
    extractor: CExtractor,
    backends: Vec<Box<dyn SymbolBackend>>,
}

impl SymbolMerger {
    pub fn new(extractor: CExtractor, backends: Vec<Box<dyn SymbolBackend>>) -> Self {
        Self { extractor, backends }
    }

    pub fn extractor(&self) -> &CExtractor {
        &self.extractor
    }

    /// Read and extract one file with the primary extractor.
    pub fn extract_file(&self, root: &Path, path: &Path) -> IndexResult<(String, FileExtraction)> {
        let rel = relative_path(root, path);
        let source = std::fs::read(path).map_err(|source| IndexError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let extraction = self.extractor.extract(&rel, &source)?;
        Ok((rel, extraction))
    }

    /// Primary extraction of `files` on `pool`. Files that cannot be read
    /// or parsed contribute nothing. The second value reports whether any
    /// file was extracted successfully.
    fn extract_primary(
        &self,
        root: &Path,
        files: &[PathBuf],
        pool: &rayon::ThreadPool,
    ) -> (Vec<FileExtraction>, bool) {
        let results: Vec<IndexResult<(String, FileExtraction)>> =
            pool.install(|| files.par_iter().map(|path| self.extract_file(root, path)).collect());

        let mut any_ok = false;
        let extractions = results
            .into_iter()
            .filter_map(|result| match result {
                Ok((_, extraction)) => {
                    any_ok = true;
                    Some(extraction)
                }
                Err(e) => {
                    tracing::warn!("[merger] {e}");
                    None
                }
            })
            .collect();
        (extractions, any_ok)
    }

    /// Run every backend over `files` and merge their symbols.
    pub fn merge(
        &self,
        project_id: &str,
        root: &Path,
        files: &[PathBuf],
        pool: &rayon::ThreadPool,
    ) -> IndexResult<MergedExtraction> {
        let mut merged = MergedExtraction {
            files: files.iter().map(|f| relative_path(root, f)).collect(),
            ..MergedExtraction::default()
        };

        let (extractions, primary_ok) = self.extract_primary(root, files, pool);
        if primary_ok {
            merged.backends_used.push(Backend::TreeSitter);
        }
        for extraction in extractions {
            merged.symbols.extend(extraction.symbols);
            merged.calls.extend(extraction.calls);
            merged.includes.extend(extraction.includes);
        }
        crate::debug_event!("merger", "primary", "{} symbols from {} files", merged.symbols.len(), files.len());

        let mut seen: HashSet<(String, String)> = merged.symbols.iter().map(Symbol::merge_key).collect();

        for backend in &self.backends {
            let name = backend.backend();
            if !backend.is_available() {
                tracing::warn!(
                    "[merger] {}",
                    IndexError::BackendUnavailable {
                        backend: name.to_string(),
                        reason: "command not found".to_string(),
                    }
                );
                continue;
            }

            match backend.extract(root, files) {
                Ok(symbols) => {
                    let before = merged.symbols.len();
                    for symbol in symbols {
                        if seen.insert(symbol.merge_key()) {
                            merged.symbols.push(symbol);
                        }
                    }
                    merged.backends_used.push(name);
                    crate::debug_event!(
                        "merger",
                        "supplement",
                        "{name} added {} symbols",
                        merged.symbols.len() - before
                    );
                }
                Err(e) => tracing::warn!("[merger] {e}"),
            }
        }

        if merged.symbols.is_empty() {
            return Err(IndexError::AllBackendsFailed {
                project: project_id.to_string(),
            });
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::CyclomaticMeasurer;
    use crate::symbol::SymbolDetail;
    use crate::types::{SymbolId, SymbolKind};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FixedBackend {
        symbols: Vec<Symbol>,
    }

    impl SymbolBackend for FixedBackend {
        fn backend(&self) -> Backend {
            Backend::Ctags
        }

        fn is_available(&self) -> bool {
            true
        }

        fn extract(&self, _root: &Path, _files: &[PathBuf]) -> IndexResult<Vec<Symbol>> {
            Ok(self.symbols.clone())
        }
    }

    struct FailingBackend;

    impl SymbolBackend for FailingBackend {
        fn backend(&self) -> Backend {
            Backend::Cscope
        }

        fn is_available(&self) -> bool {
            true
        }

        fn extract(&self, _root: &Path, _files: &[PathBuf]) -> IndexResult<Vec<Symbol>> {
            Err(IndexError::BackendUnavailable {
                backend: "cscope".to_string(),
                reason: "database build failed".to_string(),
            })
        }
    }

    fn ctags_function(name: &str, file: &str, line: u32) -> Symbol {
        let id = SymbolId::derive(Backend::Ctags, SymbolKind::Function, name, file, line, 0);
        Symbol::new(id, name, file, line, Backend::Ctags, SymbolDetail::function("int", vec![]))
    }

    fn extractor() -> CExtractor {
        CExtractor::new(Arc::new(CyclomaticMeasurer))
    }

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    #[test]
    fn test_supplement_only_adds_unseen_keys() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("a.c"), "int foo(void) { return bar(); }\n").unwrap();
        let files = vec![root.join("a.c")];

        let backend = FixedBackend {
            symbols: vec![ctags_function("foo", "a.c", 1), ctags_function("bar", "b.c", 3)],
        };
        let merger = SymbolMerger::new(extractor(), vec![Box::new(backend), Box::new(FailingBackend)]);
        let merged = merger.merge("proj", root, &files, &pool()).unwrap();

        let foo: Vec<&Symbol> = merged.symbols.iter().filter(|s| s.name == "foo").collect();
        assert_eq!(foo.len(), 1);
        assert_eq!(foo[0].source, Backend::TreeSitter);

        let bar: Vec<&Symbol> = merged.symbols.iter().filter(|s| s.name == "bar").collect();
        assert_eq!(bar.len(), 1);
        assert_eq!(bar[0].source, Backend::Ctags);

        // Failing backend is skipped, not reported as used
        assert_eq!(merged.backends_used, vec![Backend::TreeSitter, Backend::Ctags]);
        assert_eq!(merged.files, vec!["a.c".to_string()]);
        assert_eq!(merged.calls.len(), 1);
    }

    #[test]
    fn test_empty_union_fails() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("notes.c"), "/* nothing here */\n").unwrap();

        let merger = SymbolMerger::new(extractor(), vec![Box::new(FailingBackend)]);
        let err = merger.merge("proj", root, &[root.join("notes.c")], &pool()).unwrap_err();
        assert!(matches!(err, IndexError::AllBackendsFailed { ref project } if project == "proj"));
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("ok.c"), "int ok;\n").unwrap();

        let merger = SymbolMerger::new(extractor(), Vec::new());
        let files = vec![root.join("missing.c"), root.join("ok.c")];
        let merged = merger.merge("proj", root, &files, &pool()).unwrap();
        assert_eq!(merged.symbols.len(), 1);
        assert_eq!(merged.symbols[0].name, "ok");
    }
}
