//! Request parameter builders and response decoding.
//!
//! Parameters are built as `serde_json::Value`s; responses are decoded into
//! the crate's domain types. Both accepted shapes of `documentSymbol` and of
//! the goto family are handled here so the dispatcher only sees flat lists.

use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::domain::{Location, Position, Range, Symbol};
use crate::error::{ClientError, ClientResult};

/// Method names understood by language servers.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "initialized";
    pub const SHUTDOWN: &str = "shutdown";
    pub const EXIT: &str = "exit";
    pub const CANCEL_REQUEST: &str = "$/cancelRequest";
    pub const DID_OPEN: &str = "textDocument/didOpen";
    pub const DOCUMENT_SYMBOL: &str = "textDocument/documentSymbol";
    pub const REFERENCES: &str = "textDocument/references";
    pub const DEFINITION: &str = "textDocument/definition";
    pub const TYPE_DEFINITION: &str = "textDocument/typeDefinition";
    pub const SEMANTIC_TOKENS_FULL: &str = "textDocument/semanticTokens/full";
    pub const SEMANTIC_TOKENS_RANGE: &str = "textDocument/semanticTokens/range";
}

/// Version sent with didOpen; documents never change afterwards.
pub const INITIAL_VERSION: i32 = 1;

/// Standard semantic token types (LSP 3.17), advertised so servers do not
/// narrow their legend.
const TOKEN_TYPES: &[&str] = &[
    "namespace", "type", "class", "enum", "interface", "struct", "typeParameter",
    "parameter", "variable", "property", "enumMember", "event", "function",
    "method", "macro", "keyword", "modifier", "comment", "string", "number",
    "regexp", "operator", "decorator",
];

const TOKEN_MODIFIERS: &[&str] = &[
    "declaration", "definition", "readonly", "static", "deprecated", "abstract",
    "async", "modification", "documentation", "defaultLibrary",
];

/// Parameters of the `initialize` request.
pub fn initialize_params(root_uri: Option<&Url>) -> Value {
    json!({
        "processId": std::process::id(),
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        },
        "rootUri": root_uri.map(Url::as_str),
        "capabilities": {
            "general": { "positionEncodings": ["utf-8", "utf-16"] },
            "textDocument": {
                "documentSymbol": { "hierarchicalDocumentSymbolSupport": true },
                "definition": { "linkSupport": true },
                "typeDefinition": { "linkSupport": true },
                "semanticTokens": {
                    "requests": { "range": true, "full": true },
                    "tokenTypes": TOKEN_TYPES,
                    "tokenModifiers": TOKEN_MODIFIERS,
                    "formats": ["relative"],
                    "multilineTokenSupport": false,
                    "overlappingTokenSupport": false
                }
            }
        }
    })
}

pub fn did_open_params(uri: &Url, language_id: &str, text: &str) -> Value {
    json!({
        "textDocument": {
            "uri": uri.as_str(),
            "languageId": language_id,
            "version": INITIAL_VERSION,
            "text": text
        }
    })
}

/// Parameters naming only a document (documentSymbol, semanticTokens/full).
pub fn text_document_params(uri: &Url) -> Value {
    json!({
        "textDocument": { "uri": uri.as_str() }
    })
}

pub fn position_params(uri: &Url, position: Position) -> Value {
    json!({
        "textDocument": { "uri": uri.as_str() },
        "position": position
    })
}

pub fn reference_params(uri: &Url, position: Position, include_declaration: bool) -> Value {
    let mut params = position_params(uri, position);
    params["context"] = json!({ "includeDeclaration": include_declaration });
    params
}

pub fn range_params(uri: &Url, range: &Range) -> Value {
    json!({
        "textDocument": { "uri": uri.as_str() },
        "range": range
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentSymbolResponse {
    Flat(Vec<SymbolInformation>),
    Nested(Vec<DocumentSymbolItem>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInformation {
    name: String,
    kind: u32,
    location: Location,
    #[serde(default)]
    container_name: Option<String>,
}

#[derive(Deserialize)]
struct DocumentSymbolItem {
    name: String,
    kind: u32,
    range: Range,
    #[serde(default)]
    children: Vec<DocumentSymbolItem>,
}

/// Decode a documentSymbol result into a flat symbol list.
///
/// Nested `DocumentSymbol` trees are flattened depth-first; their locations
/// use the queried `uri` and each entry's full `range`. `null` is empty.
pub fn parse_document_symbols(uri: &Url, result: Value) -> ClientResult<Vec<Symbol>> {
    let response: Option<DocumentSymbolResponse> = serde_json::from_value(result)
        .map_err(|e| ClientError::malformed_response(methods::DOCUMENT_SYMBOL, e))?;

    let symbols = match response {
        None => Vec::new(),
        Some(DocumentSymbolResponse::Flat(items)) => items
            .into_iter()
            .map(|item| Symbol {
                name: item.name,
                kind: item.kind,
                container_name: item.container_name,
                location: item.location,
            })
            .collect(),
        Some(DocumentSymbolResponse::Nested(items)) => {
            let mut symbols = Vec::new();
            flatten_document_symbols(uri, items, None, &mut symbols);
            symbols
        }
    };
    Ok(symbols)
}

fn flatten_document_symbols(
    uri: &Url,
    items: Vec<DocumentSymbolItem>,
    container: Option<&str>,
    out: &mut Vec<Symbol>,
) {
    for item in items {
        out.push(Symbol {
            name: item.name.clone(),
            kind: item.kind,
            container_name: container.map(str::to_string),
            location: Location::new(uri.clone(), item.range),
        });
        flatten_document_symbols(uri, item.children, Some(&item.name), out);
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GotoResponse {
    Single(Location),
    Many(Vec<LocationOrLink>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocationOrLink {
    Location(Location),
    Link(LocationLink),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationLink {
    target_uri: Url,
    target_range: Range,
}

/// Decode a definition/typeDefinition/references result.
///
/// Accepts a single `Location`, a `Location[]`, a `LocationLink[]` (mapped
/// to target URI and range) or `null`.
pub fn parse_locations(method: &'static str, result: Value) -> ClientResult<Vec<Location>> {
    let response: Option<GotoResponse> =
        serde_json::from_value(result).map_err(|e| ClientError::malformed_response(method, e))?;

    Ok(match response {
        None => Vec::new(),
        Some(GotoResponse::Single(location)) => vec![location],
        Some(GotoResponse::Many(items)) => items
            .into_iter()
            .map(|item| match item {
                LocationOrLink::Location(location) => location,
                LocationOrLink::Link(link) => Location::new(link.target_uri, link.target_range),
            })
            .collect(),
    })
}

#[derive(Deserialize)]
struct SemanticTokensPayload {
    data: Vec<u32>,
}

/// Extract the raw integer stream of a semanticTokens result.
pub fn parse_semantic_tokens(method: &'static str, result: Value) -> ClientResult<Vec<u32>> {
    let payload: Option<SemanticTokensPayload> =
        serde_json::from_value(result).map_err(|e| ClientError::malformed_response(method, e))?;
    Ok(payload.map(|p| p.data).unwrap_or_default())
}
