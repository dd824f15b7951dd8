//! The subset of server capabilities the cache depends on.

use serde_json::Value;

use crate::document::PositionEncoding;
use crate::domain::TokenLegend;

/// What the server announced in its `initialize` result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerCapabilities {
    pub legend: TokenLegend,
    pub semantic_tokens_full: bool,
    pub semantic_tokens_range: bool,
    pub position_encoding: PositionEncoding,
}

impl ServerCapabilities {
    /// Read capabilities from an `initialize` result.
    ///
    /// Missing or malformed members fall back to "unsupported"; a missing
    /// `positionEncoding` means UTF-16, the protocol default.
    pub fn from_initialize_result(result: &Value) -> Self {
        let capabilities = &result["capabilities"];
        let provider = &capabilities["semanticTokensProvider"];

        let legend = serde_json::from_value(provider["legend"].clone()).unwrap_or_default();
        let position_encoding = capabilities["positionEncoding"]
            .as_str()
            .and_then(PositionEncoding::from_protocol)
            .unwrap_or(PositionEncoding::Utf16);

        Self {
            legend,
            semantic_tokens_full: is_enabled(&provider["full"]),
            semantic_tokens_range: is_enabled(&provider["range"]),
            position_encoding,
        }
    }
}

/// `true` and option objects (`{}`, `{"delta": true}`) both enable a request.
fn is_enabled(value: &Value) -> bool {
    match value {
        Value::Bool(enabled) => *enabled,
        Value::Object(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn reads_legend_and_request_variants() {
        let result = json!({
            "capabilities": {
                "positionEncoding": "utf-8",
                "semanticTokensProvider": {
                    "legend": {
                        "tokenTypes": ["namespace", "type", "function"],
                        "tokenModifiers": ["declaration"]
                    },
                    "full": {"delta": true},
                    "range": true
                }
            }
        });
        let caps = ServerCapabilities::from_initialize_result(&result);

        assert_eq!(caps.legend.token_types, vec!["namespace", "type", "function"]);
        assert_eq!(caps.legend.token_modifiers, vec!["declaration"]);
        assert!(caps.semantic_tokens_full);
        assert!(caps.semantic_tokens_range);
        assert_eq!(caps.position_encoding, PositionEncoding::Utf8);
    }

    #[test]
    fn missing_provider_means_unsupported() {
        let caps = ServerCapabilities::from_initialize_result(&json!({"capabilities": {}}));
        assert!(caps.legend.token_types.is_empty());
        assert!(!caps.semantic_tokens_full);
        assert!(!caps.semantic_tokens_range);
        assert_eq!(caps.position_encoding, PositionEncoding::Utf16);
    }

    #[rstest]
    #[case::bool_true(json!(true), true)]
    #[case::bool_false(json!(false), false)]
    #[case::empty_options(json!({}), true)]
    #[case::delta_options(json!({"delta": true}), true)]
    #[case::null(Value::Null, false)]
    fn range_support_accepts_bool_or_options(#[case] range: Value, #[case] expected: bool) {
        let result = json!({
            "capabilities": {"semanticTokensProvider": {"full": true, "range": range}}
        });
        let caps = ServerCapabilities::from_initialize_result(&result);
        assert!(caps.semantic_tokens_full);
        assert_eq!(caps.semantic_tokens_range, expected);
    }
}
