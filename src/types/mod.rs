use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Length of the hex prefix kept from the content hash.
pub const SYMBOL_ID_LEN: usize = 16;

/// Opaque fixed-length symbol identifier.
///
/// Derived from the symbol's content (backend, kind, name, file, line) plus a
/// per-file ordinal, so an unchanged file produces the same ids on every build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(String);

impl SymbolId {
    pub fn derive(
        backend: Backend,
        kind: SymbolKind,
        name: &str,
        file_path: &str,
        line: u32,
        ordinal: u32,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(backend.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(kind.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(name.as_bytes());
        hasher.update([0]);
        hasher.update(file_path.as_bytes());
        hasher.update([0]);
        hasher.update(line.to_le_bytes());
        hasher.update(ordinal.to_le_bytes());

        let digest = hasher.finalize();
        let mut hex = String::with_capacity(SYMBOL_ID_LEN);
        for byte in digest.iter().take(SYMBOL_ID_LEN / 2) {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SymbolId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SymbolId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Structure,
    Variable,
    Macro,
    Typedef,
    Enum,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 6] = [
        SymbolKind::Function,
        SymbolKind::Structure,
        SymbolKind::Variable,
        SymbolKind::Macro,
        SymbolKind::Typedef,
        SymbolKind::Enum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Structure => "structure",
            SymbolKind::Variable => "variable",
            SymbolKind::Macro => "macro",
            SymbolKind::Typedef => "typedef",
            SymbolKind::Enum => "enum",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "function" | "func" | "fn" => Ok(SymbolKind::Function),
            "structure" | "struct" | "class" | "union" => Ok(SymbolKind::Structure),
            "variable" | "var" => Ok(SymbolKind::Variable),
            "macro" | "define" => Ok(SymbolKind::Macro),
            "typedef" | "type" => Ok(SymbolKind::Typedef),
            "enum" => Ok(SymbolKind::Enum),
            other => Err(format!("unknown symbol kind '{other}'")),
        }
    }
}

/// Extraction source that produced a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    TreeSitter,
    Ctags,
    Cscope,
    Clangd,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::TreeSitter => "tree-sitter",
            Backend::Ctags => "ctags",
            Backend::Cscope => "cscope",
            Backend::Clangd => "clangd",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Complexity bucket for a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityBucket {
    #[default]
    Low,
    Medium,
    High,
}

impl ComplexityBucket {
    /// `<= 5` is low, `<= 10` medium, anything above high. A score of 0
    /// (no measurement) is low.
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=5 => ComplexityBucket::Low,
            6..=10 => ComplexityBucket::Medium,
            _ => ComplexityBucket::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityBucket::Low => "low",
            ComplexityBucket::Medium => "medium",
            ComplexityBucket::High => "high",
        }
    }
}

/// Include directive style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeStyle {
    /// `#include "path"`
    Quoted,
    /// `#include <path>`
    System,
}

/// Raw include relation, unresolved against the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeEdge {
    pub including_file: String,
    pub included_path: String,
    pub style: IncludeStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller_id: SymbolId,
    pub callee_id: SymbolId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_id_is_fixed_length_hex() {
        let id = SymbolId::derive(Backend::TreeSitter, SymbolKind::Function, "main", "src/main.c", 3, 0);
        assert_eq!(id.as_str().len(), SYMBOL_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_symbol_id_is_deterministic() {
        let a = SymbolId::derive(Backend::TreeSitter, SymbolKind::Function, "foo", "a.c", 10, 0);
        let b = SymbolId::derive(Backend::TreeSitter, SymbolKind::Function, "foo", "a.c", 10, 0);
        let c = SymbolId::derive(Backend::TreeSitter, SymbolKind::Function, "foo", "a.c", 10, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_complexity_buckets() {
        assert_eq!(ComplexityBucket::from_score(0), ComplexityBucket::Low);
        assert_eq!(ComplexityBucket::from_score(5), ComplexityBucket::Low);
        assert_eq!(ComplexityBucket::from_score(6), ComplexityBucket::Medium);
        assert_eq!(ComplexityBucket::from_score(10), ComplexityBucket::Medium);
        assert_eq!(ComplexityBucket::from_score(11), ComplexityBucket::High);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("struct".parse::<SymbolKind>(), Ok(SymbolKind::Structure));
        assert_eq!("Function".parse::<SymbolKind>(), Ok(SymbolKind::Function));
        assert!("trait".parse::<SymbolKind>().is_err());
    }
}
