use serde::{Deserialize, Serialize};

use crate::domain::location::Location;

/// A classified sub-span of source text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Token {
    pub location: Location,
    #[serde(rename = "type")]
    pub token_type: String,
    pub modifiers: Vec<String>,
    pub text: String,
}

/// Semantic token legend announced by the server during initialization.
///
/// Indices in the raw stream refer into these tables.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenLegend {
    pub token_types: Vec<String>,
    pub token_modifiers: Vec<String>,
}

impl TokenLegend {
    pub fn new<T, M>(token_types: T, token_modifiers: M) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            token_types: token_types.into_iter().map(Into::into).collect(),
            token_modifiers: token_modifiers.into_iter().map(Into::into).collect(),
        }
    }

    /// Name for a token type index.
    ///
    /// Indices past the table yield `unknown(N)` so that servers newer than
    /// the negotiated legend never break decoding.
    pub fn type_name(&self, index: u32) -> String {
        self.token_types
            .get(index as usize)
            .cloned()
            .unwrap_or_else(|| unknown_name(index))
    }

    /// Names of the set bits in a modifier bitmask, lowest bit first.
    pub fn modifier_names(&self, bitset: u32) -> Vec<String> {
        (0..u32::BITS)
            .filter(|bit| bitset & (1 << bit) != 0)
            .map(|bit| {
                self.token_modifiers
                    .get(bit as usize)
                    .cloned()
                    .unwrap_or_else(|| unknown_name(bit))
            })
            .collect()
    }
}

fn unknown_name(index: u32) -> String {
    format!("unknown({})", index)
}
