use serde::{Deserialize, Serialize};

use crate::domain::location::Location;

/// A named, range-bounded construct reported by the analysis server.
///
/// Immutable once built from a response. Hierarchy and per-symbol tokens are
/// kept outside of it (see [`SymbolNode`] and the document's token overlay).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    /// LSP `SymbolKind` number (1 = File .. 26 = TypeParameter).
    pub kind: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    pub location: Location,
}

/// A symbol with the symbols nested inside it, ordered by start position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SymbolNode {
    pub symbol: Symbol,
    pub children: Vec<SymbolNode>,
}

impl SymbolNode {
    pub fn leaf(symbol: Symbol) -> Self {
        Self {
            symbol,
            children: Vec::new(),
        }
    }
}
