//! Grammar selection and tree-sitter parser wrapper.
//!
//! tree-sitter parsers are not `Send`, so each worker thread keeps its own
//! parsers in a thread-local cache keyed by language.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use tree_sitter::{Parser, Tree};

use crate::error::{IndexError, IndexResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    C,
    Cpp,
}

impl Language {
    /// `.c`/`.h` use the C grammar; the other C++ extensions use the C++ one.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "c" | "h" => Some(Language::C),
            "cpp" | "hpp" | "cc" | "cxx" | "hh" | "hxx" | "c++" | "h++" | "ipp" | "tpp" => {
                Some(Language::Cpp)
            }
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }

    fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::C => tree_sitter_c::LANGUAGE.into(),
            Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}

thread_local! {
    static PARSERS: RefCell<HashMap<Language, Parser>> = RefCell::new(HashMap::new());
}

fn create_parser(language: Language) -> IndexResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.grammar())
        .map_err(|e| IndexError::General(format!("Failed to set {} language: {e}", language.name())))?;
    Ok(parser)
}

/// Parse `source` with this thread's parser for `language`.
///
/// Syntax errors do not fail the parse; tree-sitter recovers and the tree
/// carries `ERROR` nodes. Only a missing tree is reported.
pub fn parse_source(language: Language, path: &Path, source: &[u8]) -> IndexResult<Tree> {
    PARSERS.with(|cache| {
        let mut parsers = cache.borrow_mut();
        let parser = match parsers.entry(language) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => entry.insert(create_parser(language)?),
        };

        parser.parse(source, None).ok_or_else(|| IndexError::ParseFailure {
            path: path.to_path_buf(),
            reason: "parser returned no tree".to_string(),
        })
    })
}
