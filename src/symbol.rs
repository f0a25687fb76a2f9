//! Canonical symbol record shared by every extraction backend.
//!
//! Kind-specific data lives in [`SymbolDetail`], one variant per symbol kind,
//! so consumers match on the variant instead of probing optional fields.

use serde::{Deserialize, Serialize};

use crate::types::{Backend, ComplexityBucket, SymbolId, SymbolKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    /// Project-relative, `/`-separated.
    pub file_path: String,
    /// 1-based.
    pub line_number: u32,
    pub declaration: String,
    pub source: Backend,
    #[serde(flatten)]
    pub detail: SymbolDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SymbolDetail {
    Function {
        return_type: String,
        parameters: Vec<String>,
        complexity: ComplexityBucket,
        #[serde(default)]
        complexity_score: u32,
    },
    #[serde(rename = "structure")]
    Struct { members: Vec<String> },
    Variable {
        data_type: String,
        #[serde(default)]
        is_static: bool,
        #[serde(default)]
        is_const: bool,
    },
    Macro {
        /// `None` for object-like macros.
        parameters: Option<Vec<String>>,
        value: String,
    },
    Enum { values: Vec<String> },
    Typedef { underlying: String },
}

impl SymbolDetail {
    pub fn kind(&self) -> SymbolKind {
        match self {
            SymbolDetail::Function { .. } => SymbolKind::Function,
            SymbolDetail::Struct { .. } => SymbolKind::Structure,
            SymbolDetail::Variable { .. } => SymbolKind::Variable,
            SymbolDetail::Macro { .. } => SymbolKind::Macro,
            SymbolDetail::Enum { .. } => SymbolKind::Enum,
            SymbolDetail::Typedef { .. } => SymbolKind::Typedef,
        }
    }

    /// Function detail with no complexity measurement yet.
    pub fn function(return_type: impl Into<String>, parameters: Vec<String>) -> Self {
        SymbolDetail::Function {
            return_type: return_type.into(),
            parameters,
            complexity: ComplexityBucket::Low,
            complexity_score: 0,
        }
    }
}

impl Symbol {
    pub fn new(
        id: SymbolId,
        name: impl Into<String>,
        file_path: impl Into<String>,
        line_number: u32,
        source: Backend,
        detail: SymbolDetail,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            file_path: file_path.into(),
            line_number,
            declaration: String::new(),
            source,
            detail,
        }
    }

    pub fn with_declaration(mut self, declaration: impl Into<String>) -> Self {
        self.declaration = declaration.into();
        self
    }

    pub fn kind(&self) -> SymbolKind {
        self.detail.kind()
    }

    pub fn is_function(&self) -> bool {
        matches!(self.detail, SymbolDetail::Function { .. })
    }

    /// Key used to deduplicate symbols across backends.
    pub fn merge_key(&self) -> (String, String) {
        (self.name.clone(), self.file_path.clone())
    }

    /// Apply a complexity score. No-op for non-function symbols.
    pub fn set_complexity(&mut self, score: u32) {
        if let SymbolDetail::Function {
            complexity,
            complexity_score,
            ..
        } = &mut self.detail
        {
            *complexity_score = score;
            *complexity = ComplexityBucket::from_score(score);
        }
    }

    pub fn complexity(&self) -> Option<ComplexityBucket> {
        match &self.detail {
            SymbolDetail::Function { complexity, .. } => Some(*complexity),
            _ => None,
        }
    }

    /// Text fed to the vector store for natural-language search.
    pub fn searchable_text(&self) -> String {
        let mut parts = vec![
            self.name.clone(),
            self.kind().to_string(),
            format!("in {}", self.file_path),
        ];
        if !self.declaration.is_empty() {
            parts.push(self.declaration.clone());
        }
        match &self.detail {
            SymbolDetail::Function {
                return_type,
                parameters,
                ..
            } => {
                parts.push(format!("returns {return_type}"));
                if !parameters.is_empty() {
                    parts.push(format!("parameters: {}", parameters.join(", ")));
                }
            }
            SymbolDetail::Struct { members } if !members.is_empty() => {
                parts.push(format!("members: {}", members.join(", ")));
            }
            SymbolDetail::Enum { values } if !values.is_empty() => {
                parts.push(format!("values: {}", values.join(", ")));
            }
            SymbolDetail::Typedef { underlying } => {
                parts.push(format!("alias of {underlying}"));
            }
            SymbolDetail::Variable { data_type, .. } => {
                parts.push(format!("type {data_type}"));
            }
            _ => {}
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str) -> Symbol {
        Symbol::new(
            SymbolId::from("0000000000000001"),
            name,
            "src/util.c",
            4,
            Backend::TreeSitter,
            SymbolDetail::function("int", vec!["int a".to_string(), "int b".to_string()]),
        )
        .with_declaration("int add(int a, int b)")
    }

    #[test]
    fn test_kind_follows_detail() {
        let sym = function("add");
        assert_eq!(sym.kind(), SymbolKind::Function);
        assert!(sym.is_function());
    }

    #[test]
    fn test_set_complexity_buckets_score() {
        let mut sym = function("add");
        sym.set_complexity(7);
        assert_eq!(sym.complexity(), Some(ComplexityBucket::Medium));

        let mut macro_sym = Symbol::new(
            SymbolId::from("0000000000000002"),
            "MAX",
            "src/util.h",
            1,
            Backend::TreeSitter,
            SymbolDetail::Macro {
                parameters: None,
                value: "10".to_string(),
            },
        );
        macro_sym.set_complexity(50);
        assert_eq!(macro_sym.complexity(), None);
    }

    #[test]
    fn test_json_shape_is_flat_and_tagged() {
        let sym = function("add");
        let json = serde_json::to_value(&sym).unwrap();
        assert_eq!(json["kind"], "function");
        assert_eq!(json["return_type"], "int");
        assert_eq!(json["source"], "tree-sitter");

        let back: Symbol = serde_json::from_value(json).unwrap();
        assert_eq!(back, sym);
    }

    #[test]
    fn test_searchable_text_mentions_signature_parts() {
        let text = function("add").searchable_text();
        assert!(text.contains("add"));
        assert!(text.contains("src/util.c"));
        assert!(text.contains("returns int"));
        assert!(text.contains("int a, int b"));
    }
}
