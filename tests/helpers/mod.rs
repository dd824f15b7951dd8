//! Shared fixtures for client integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use lsp_semcache::lsp::protocol::methods;
use lsp_semcache::lsp::{ClientOptions, ErrorCodes, ResponseError, TransportError};
use lsp_semcache::{LspClient, RequestContext, Transport};
use serde_json::{Value, json};
use url::Url;

/// Transport that answers from canned responses and records traffic.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<HashMap<&'static str, Value>>,
    hanging: Mutex<HashSet<&'static str>>,
    calls: Mutex<Vec<(&'static str, Value)>>,
    notifications: Mutex<Vec<(&'static str, Value)>>,
}

impl FakeTransport {
    pub fn respond(&self, method: &'static str, result: Value) {
        self.responses.lock().unwrap().insert(method, result);
    }

    /// Calls to `method` never complete until [`release`](Self::release).
    pub fn hang(&self, method: &'static str) {
        self.hanging.lock().unwrap().insert(method);
    }

    pub fn release(&self, method: &'static str) {
        self.hanging.lock().unwrap().remove(method);
    }

    pub fn calls(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| *m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls(method).len()
    }

    pub fn notifications(&self, method: &str) -> Vec<Value> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| *m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

impl Transport for FakeTransport {
    async fn call(
        &self,
        _ctx: &RequestContext,
        method: &'static str,
        params: Value,
    ) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push((method, params));
        let hang = self.hanging.lock().unwrap().contains(method);
        if hang {
            std::future::pending::<()>().await;
        }
        let response = self.responses.lock().unwrap().get(method).cloned();
        response.ok_or_else(|| {
            TransportError::Response(ResponseError {
                code: ErrorCodes::METHOD_NOT_FOUND,
                message: format!("Unhandled method {method}"),
                data: None,
            })
        })
    }

    async fn notify(
        &self,
        _ctx: &RequestContext,
        method: &'static str,
        params: Value,
    ) -> Result<(), TransportError> {
        self.notifications.lock().unwrap().push((method, params));
        Ok(())
    }
}

/// ```text
/// 0 package main
/// 1
/// 2 func add(a int) int {
/// 3     return a
/// 4 }
/// 5
/// 6 func main() {
/// 7     add(1)
/// 8 }
/// ```
pub const SOURCE: &str =
    "package main\n\nfunc add(a int) int {\n    return a\n}\n\nfunc main() {\n    add(1)\n}";

pub const TOKEN_TYPES: [&str; 4] = ["namespace", "function", "parameter", "keyword"];
pub const TOKEN_MODIFIERS: [&str; 2] = ["declaration", "readonly"];

/// Every token of [`SOURCE`], relative encoding.
pub const FULL_TOKENS: [u32; 50] = [
    0, 0, 7, 3, 0, // package
    0, 8, 4, 0, 0, // main
    2, 0, 4, 3, 0, // func
    0, 5, 3, 1, 1, // add
    0, 4, 1, 2, 1, // a
    1, 4, 6, 3, 0, // return
    0, 7, 1, 2, 0, // a
    3, 0, 4, 3, 0, // func
    0, 5, 4, 1, 1, // main
    1, 4, 3, 1, 0, // add
];

/// The tokens of `add`, as a range request would return them.
pub const ADD_TOKENS: [u32; 25] = [
    2, 0, 4, 3, 0, // func
    0, 5, 3, 1, 1, // add
    0, 4, 1, 2, 1, // a
    1, 4, 6, 3, 0, // return
    0, 7, 1, 2, 0, // a
];

pub fn options() -> ClientOptions {
    ClientOptions {
        language_id: "go".to_string(),
        legend: lsp_semcache::TokenLegend::new(TOKEN_TYPES, TOKEN_MODIFIERS),
        ..Default::default()
    }
}

pub fn write_source(dir: &Path) -> Url {
    let path = dir.join("main.go");
    std::fs::write(&path, SOURCE).unwrap();
    Url::from_file_path(path).unwrap()
}

pub fn lsp_range(sl: u32, sc: u32, el: u32, ec: u32) -> Value {
    json!({
        "start": {"line": sl, "character": sc},
        "end": {"line": el, "character": ec}
    })
}

pub fn range(sl: u32, sc: u32, el: u32, ec: u32) -> lsp_semcache::Range {
    use lsp_semcache::Position;
    lsp_semcache::Range::new(Position::new(sl, sc), Position::new(el, ec))
}

/// `add`, its parameter `a`, and `main`, as flat SymbolInformation.
pub fn symbol_response(uri: &Url) -> Value {
    json!([
        {"name": "add", "kind": 12, "location": {"uri": uri.as_str(), "range": lsp_range(2, 0, 4, 1)}},
        {"name": "a", "kind": 13, "containerName": "add",
         "location": {"uri": uri.as_str(), "range": lsp_range(2, 9, 2, 14)}},
        {"name": "main", "kind": 12, "location": {"uri": uri.as_str(), "range": lsp_range(6, 0, 8, 1)}}
    ])
}

/// A client over a fresh copy of [`SOURCE`] with symbols and full tokens
/// answered.
pub fn client_with_source(dir: &Path) -> (LspClient<FakeTransport>, Url) {
    let uri = write_source(dir);
    let client = LspClient::new(FakeTransport::default(), options());
    client
        .transport()
        .respond(methods::DOCUMENT_SYMBOL, symbol_response(&uri));
    client
        .transport()
        .respond(methods::SEMANTIC_TOKENS_FULL, json!({ "data": &FULL_TOKENS[..] }));
    (client, uri)
}
