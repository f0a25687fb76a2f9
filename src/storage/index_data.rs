//! Plain serializable symbol snapshot.

use serde::{Deserialize, Serialize};

use crate::parsing::CallReference;
use crate::symbol::Symbol;

/// Contents of `symbols.json`.
///
/// Raw call references are kept next to the symbols so incremental updates
/// after a reload can re-resolve edges into files that change later.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SymbolSnapshot {
    pub symbols: Vec<Symbol>,
    #[serde(default)]
    pub calls: Vec<CallReference>,
    /// Every indexed file, including ones that produced no symbols.
    #[serde(default)]
    pub files: Vec<String>,
}
