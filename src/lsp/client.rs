//! Query dispatcher: cache-first semantic queries against one server.
//!
//! Every operation that reaches the transport takes a [`RequestContext`].
//! Cache entries are committed only after a successful response, so an
//! aborted exchange leaves the document exactly as it was.

use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;
use url::Url;

use super::capabilities::ServerCapabilities;
use super::protocol::{self, methods};
use super::transport::{RequestContext, Transport};
use crate::analysis::{
    build_symbol_hierarchy, decode_tokens, filter_tokens_by_range, find_enclosing_symbol,
};
use crate::document::{Document, DocumentStore, PositionEncoding, SymbolTable, build_symbol_table};
use crate::domain::{Location, Position, Symbol, SymbolNode, Token, TokenLegend, TokenWindow};
use crate::error::ClientResult;

/// Session settings negotiated or configured outside of this client.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// `languageId` sent with didOpen
    pub language_id: String,
    pub legend: TokenLegend,
    /// Query `semanticTokens/range` instead of decoding the full stream
    pub semantic_tokens_range: bool,
    pub position_encoding: PositionEncoding,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            language_id: "plaintext".to_string(),
            legend: TokenLegend::default(),
            semantic_tokens_range: false,
            position_encoding: PositionEncoding::Utf8,
        }
    }
}

impl ClientOptions {
    /// Options from a server's `initialize` result.
    pub fn from_capabilities(
        language_id: impl Into<String>,
        capabilities: ServerCapabilities,
    ) -> Self {
        if !capabilities.semantic_tokens_full && !capabilities.semantic_tokens_range {
            warn!(
                target: "lsp_semcache::client",
                "Server advertises no semantic token requests; token queries will fail"
            );
        }
        Self {
            language_id: language_id.into(),
            legend: capabilities.legend,
            semantic_tokens_range: capabilities.semantic_tokens_range,
            position_encoding: capabilities.position_encoding,
        }
    }
}

/// Caching client for one analysis server.
pub struct LspClient<T> {
    transport: T,
    documents: DocumentStore,
    options: ClientOptions,
}

impl<T: Transport> LspClient<T> {
    pub fn new(transport: T, options: ClientOptions) -> Self {
        Self {
            transport,
            documents: DocumentStore::new(),
            options,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Cached document for `uri`, without any I/O.
    pub fn document(&self, uri: &Url) -> Option<Arc<Document>> {
        self.documents.get(uri)
    }

    /// Load `uri` and announce it to the server.
    ///
    /// Idempotent: a document already loaded and announced is returned as is
    /// without I/O or notification. A document loaded earlier by
    /// [`locate`](Self::locate) is announced on its first `open`.
    pub async fn open(&self, ctx: &RequestContext, uri: &Url) -> ClientResult<Arc<Document>> {
        let document = self.documents.get_or_load(uri).await?;
        let text = document.text();
        let announce = document.announce_with(|| async move {
            let params = protocol::did_open_params(uri, &self.options.language_id, text);
            self.notify(ctx, methods::DID_OPEN, params).await
        });
        let announced = ctx.guard(methods::DID_OPEN, announce).await?;
        if announced {
            debug!(target: "lsp_semcache::client", "Opened {}", uri);
        }
        Ok(document)
    }

    /// Symbols of `uri` keyed by their range, fetched once per document.
    pub async fn document_symbols(
        &self,
        ctx: &RequestContext,
        uri: &Url,
    ) -> ClientResult<Arc<SymbolTable>> {
        let document = self.open(ctx, uri).await?;
        if let Some(symbols) = document.cached_symbols() {
            return Ok(symbols);
        }
        let fetch = document.symbols_or_try_init(|| async move {
            let result = self
                .call(ctx, methods::DOCUMENT_SYMBOL, protocol::text_document_params(uri))
                .await?;
            let symbols = protocol::parse_document_symbols(uri, result)?;
            debug!(
                target: "lsp_semcache::client",
                "{} symbols in {}",
                symbols.len(),
                uri
            );
            Ok(build_symbol_table(symbols))
        });
        ctx.guard(methods::DOCUMENT_SYMBOL, fetch).await
    }

    /// References to the symbol starting at `location`, declaration included.
    ///
    /// The query position is one character into the range so that it lands
    /// on the identifier rather than just before it. Not cached.
    pub async fn references(
        &self,
        ctx: &RequestContext,
        location: &Location,
    ) -> ClientResult<Vec<Location>> {
        self.open(ctx, &location.uri).await?;
        let start = location.range.start;
        let position = Position::new(start.line, start.character.saturating_add(1));
        let result = self
            .call(
                ctx,
                methods::REFERENCES,
                protocol::reference_params(&location.uri, position, true),
            )
            .await?;
        protocol::parse_locations(methods::REFERENCES, result)
    }

    /// Definitions of whatever is at `position`, cached per exact position.
    pub async fn definition(
        &self,
        ctx: &RequestContext,
        uri: &Url,
        position: Position,
    ) -> ClientResult<Arc<[Location]>> {
        let document = self.open(ctx, uri).await?;
        if let Some(locations) = document.cached_definitions(&position) {
            debug!(target: "lsp_semcache::client", "Definition cache hit at {:?}", position);
            return Ok(locations);
        }
        let result = self
            .call(ctx, methods::DEFINITION, protocol::position_params(uri, position))
            .await?;
        let locations = protocol::parse_locations(methods::DEFINITION, result)?;
        Ok(document.cache_definitions(position, locations))
    }

    /// Type definitions of whatever is at `position`. Not cached.
    pub async fn type_definition(
        &self,
        ctx: &RequestContext,
        uri: &Url,
        position: Position,
    ) -> ClientResult<Vec<Location>> {
        self.open(ctx, uri).await?;
        let result = self
            .call(
                ctx,
                methods::TYPE_DEFINITION,
                protocol::position_params(uri, position),
            )
            .await?;
        protocol::parse_locations(methods::TYPE_DEFINITION, result)
    }

    /// Semantic tokens inside `location.range`.
    ///
    /// When a symbol spans exactly that range, its token slice is cached and
    /// reused. Otherwise the server's range query is used if supported, or
    /// the full-file stream is decoded once and filtered.
    pub async fn semantic_tokens(
        &self,
        ctx: &RequestContext,
        location: &Location,
    ) -> ClientResult<Arc<[Token]>> {
        let symbols = self.document_symbols(ctx, &location.uri).await?;
        let document = self.open(ctx, &location.uri).await?;
        let owned_by_symbol = symbols.contains_key(&location.range);

        if owned_by_symbol && let Some(tokens) = document.cached_symbol_tokens(&location.range) {
            return Ok(tokens);
        }

        let tokens: Arc<[Token]> = if self.options.semantic_tokens_range {
            let result = self
                .call(
                    ctx,
                    methods::SEMANTIC_TOKENS_RANGE,
                    protocol::range_params(&location.uri, &location.range),
                )
                .await?;
            let data = protocol::parse_semantic_tokens(methods::SEMANTIC_TOKENS_RANGE, result)?;
            self.decode(&document, &data, TokenWindow::unbounded())?.into()
        } else {
            let all = self.full_tokens(ctx, &document).await?;
            Arc::from(filter_tokens_by_range(&all, &location.range))
        };

        if owned_by_symbol {
            return Ok(document.cache_symbol_tokens(location.range, tokens));
        }
        Ok(tokens)
    }

    /// The tightest other symbol in the same file enclosing `symbol`.
    pub async fn enclosing_symbol(
        &self,
        ctx: &RequestContext,
        symbol: &Symbol,
    ) -> ClientResult<Option<Symbol>> {
        let symbols = self.document_symbols(ctx, &symbol.location.uri).await?;
        Ok(find_enclosing_symbol(symbols.values(), symbol).cloned())
    }

    /// Symbols of `uri` arranged by containment.
    pub async fn file_structure(
        &self,
        ctx: &RequestContext,
        uri: &Url,
    ) -> ClientResult<Vec<SymbolNode>> {
        let symbols = self.document_symbols(ctx, uri).await?;
        Ok(build_symbol_hierarchy(symbols.values().cloned().collect()))
    }

    /// Text covered by `location`.
    ///
    /// Loads the file on demand without announcing it to the server.
    pub async fn locate(&self, location: &Location) -> ClientResult<String> {
        let document = self.documents.get_or_load(&location.uri).await?;
        document
            .locate(&location.range, self.options.position_encoding)
            .map(str::to_string)
    }

    /// Text of line `line` of `uri`, terminator included; `None` past the end.
    pub async fn line_text(&self, uri: &Url, line: usize) -> ClientResult<Option<String>> {
        let document = self.documents.get_or_load(uri).await?;
        Ok(document.line_text(line).map(str::to_string))
    }

    /// Byte offset of each line start of `uri`.
    pub async fn line_offsets(&self, uri: &Url) -> ClientResult<Vec<usize>> {
        let document = self.documents.get_or_load(uri).await?;
        Ok(document.line_index().line_starts().to_vec())
    }

    async fn full_tokens(
        &self,
        ctx: &RequestContext,
        document: &Document,
    ) -> ClientResult<Arc<[Token]>> {
        let fetch = document.tokens_or_try_init(|| async move {
            let result = self
                .call(
                    ctx,
                    methods::SEMANTIC_TOKENS_FULL,
                    protocol::text_document_params(document.uri()),
                )
                .await?;
            let data = protocol::parse_semantic_tokens(methods::SEMANTIC_TOKENS_FULL, result)?;
            self.decode(document, &data, TokenWindow::unbounded())
        });
        ctx.guard(methods::SEMANTIC_TOKENS_FULL, fetch).await
    }

    fn decode(
        &self,
        document: &Document,
        data: &[u32],
        window: TokenWindow,
    ) -> ClientResult<Vec<Token>> {
        decode_tokens(
            data,
            &self.options.legend,
            document,
            window,
            self.options.position_encoding,
        )
    }

    async fn call(
        &self,
        ctx: &RequestContext,
        method: &'static str,
        params: Value,
    ) -> ClientResult<Value> {
        debug!(target: "lsp_semcache::client", "-> {}", method);
        ctx.run(method, self.transport.call(ctx, method, params)).await
    }

    async fn notify(
        &self,
        ctx: &RequestContext,
        method: &'static str,
        params: Value,
    ) -> ClientResult<()> {
        debug!(target: "lsp_semcache::client", "-> {} (notification)", method);
        ctx.run(method, self.transport.notify(ctx, method, params)).await
    }
}
