use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use tokio::sync::OnceCell;
use url::Url;

use super::coordinates::{LineIndex, PositionEncoding};
use crate::domain::{Location, Position, Range, Symbol, Token};
use crate::error::{ClientError, ClientResult, LockResultExt};

/// Symbols of one file keyed by their own range.
pub type SymbolTable = HashMap<Range, Symbol>;

/// Cached state for one source file.
///
/// The text never changes for the lifetime of the document. Each sub-cache is
/// filled at most once from a successful server response and then kept: a
/// failed or cancelled fetch leaves the slot empty for the next caller.
#[derive(Debug)]
pub struct Document {
    uri: Url,
    text: String,
    lines: LineIndex,
    /// Set once didOpen has been delivered
    announced: OnceCell<()>,
    symbols: OnceCell<Arc<SymbolTable>>,
    /// Decoded full-file token stream, sorted by start
    tokens: OnceCell<Arc<[Token]>>,
    definitions: RwLock<HashMap<Position, Arc<[Location]>>>,
    /// Token slices per symbol range, built on first query for that symbol
    symbol_tokens: RwLock<HashMap<Range, Arc<[Token]>>>,
}

impl Document {
    pub fn new(uri: Url, text: String) -> Self {
        let lines = LineIndex::new(&text);
        Self {
            uri,
            text,
            lines,
            announced: OnceCell::new(),
            symbols: OnceCell::new(),
            tokens: OnceCell::new(),
            definitions: RwLock::new(HashMap::new()),
            symbol_tokens: RwLock::new(HashMap::new()),
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.lines
    }

    /// Text of one line, terminator included. `None` past the last line.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let (start, end) = self.lines.line_span(line)?;
        self.text.get(start..end)
    }

    /// Text covered by `range`.
    pub fn locate(&self, range: &Range, encoding: PositionEncoding) -> ClientResult<&str> {
        self.lines
            .slice(&self.text, range, encoding)
            .ok_or_else(|| ClientError::RangeOutOfBounds {
                uri: self.uri.clone(),
                range: *range,
            })
    }

    pub fn is_announced(&self) -> bool {
        self.announced.initialized()
    }

    /// Run `announce` unless a previous announcement succeeded.
    ///
    /// Concurrent callers wait for the one in flight. Returns true when this
    /// call performed the announcement.
    pub async fn announce_with<F, Fut>(&self, announce: F) -> ClientResult<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<()>>,
    {
        let mut performed = false;
        self.announced
            .get_or_try_init(|| {
                performed = true;
                announce()
            })
            .await?;
        Ok(performed)
    }

    pub fn cached_symbols(&self) -> Option<Arc<SymbolTable>> {
        self.symbols.get().cloned()
    }

    pub async fn symbols_or_try_init<F, Fut>(&self, fetch: F) -> ClientResult<Arc<SymbolTable>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<SymbolTable>>,
    {
        self.symbols
            .get_or_try_init(move || async move { fetch().await.map(Arc::new) })
            .await
            .cloned()
    }

    pub fn cached_tokens(&self) -> Option<Arc<[Token]>> {
        self.tokens.get().cloned()
    }

    pub async fn tokens_or_try_init<F, Fut>(&self, fetch: F) -> ClientResult<Arc<[Token]>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<Vec<Token>>>,
    {
        self.tokens
            .get_or_try_init(move || async move { fetch().await.map(Arc::from) })
            .await
            .cloned()
    }

    pub fn cached_definitions(&self, position: &Position) -> Option<Arc<[Location]>> {
        self.definitions
            .read()
            .recover_poison("Document::cached_definitions")
            .get(position)
            .cloned()
    }

    /// Store definitions for `position`; an earlier entry wins.
    pub fn cache_definitions(&self, position: Position, locations: Vec<Location>) -> Arc<[Location]> {
        self.definitions
            .write()
            .recover_poison("Document::cache_definitions")
            .entry(position)
            .or_insert_with(|| Arc::from(locations))
            .clone()
    }

    pub fn cached_symbol_tokens(&self, range: &Range) -> Option<Arc<[Token]>> {
        self.symbol_tokens
            .read()
            .recover_poison("Document::cached_symbol_tokens")
            .get(range)
            .cloned()
    }

    /// Store the token slice of the symbol at `range`; an earlier entry wins.
    pub fn cache_symbol_tokens(&self, range: Range, tokens: Arc<[Token]>) -> Arc<[Token]> {
        self.symbol_tokens
            .write()
            .recover_poison("Document::cache_symbol_tokens")
            .entry(range)
            .or_insert(tokens)
            .clone()
    }
}

/// Key symbols by their own range.
///
/// Two symbols at an identical range collide and the later one wins.
pub fn build_symbol_table(symbols: Vec<Symbol>) -> SymbolTable {
    let mut table = SymbolTable::with_capacity(symbols.len());
    for symbol in symbols {
        let range = symbol.location.range;
        if let Some(previous) = table.insert(range, symbol) {
            log::warn!(
                target: "lsp_semcache::document",
                "Symbol {} shares range {:?} with a later symbol; keeping the later one",
                previous.name,
                range
            );
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("file:///project/main.go").unwrap()
    }

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    fn symbol(name: &str, r: Range) -> Symbol {
        Symbol {
            name: name.to_string(),
            kind: 12,
            container_name: None,
            location: Location::new(uri(), r),
        }
    }

    #[test]
    fn locate_returns_covered_text() {
        let doc = Document::new(uri(), "a\nbb\nccc".to_string());
        assert_eq!(doc.line_index().line_starts(), &[0, 2, 5]);
        assert_eq!(doc.locate(&range(1, 0, 1, 2), PositionEncoding::Utf8).unwrap(), "bb");
    }

    #[test]
    fn locate_out_of_bounds_is_an_error() {
        let doc = Document::new(uri(), "a\nbb".to_string());
        let err = doc.locate(&range(4, 0, 4, 1), PositionEncoding::Utf8).unwrap_err();
        assert!(matches!(err, ClientError::RangeOutOfBounds { .. }));
    }

    #[test]
    fn line_text_bounds() {
        let doc = Document::new(uri(), "a\nbb\nccc".to_string());
        assert_eq!(doc.line_text(0), Some("a\n"));
        assert_eq!(doc.line_text(2), Some("ccc"));
        assert_eq!(doc.line_text(3), None);
    }

    #[test]
    fn symbol_table_collision_keeps_later_symbol() {
        let r = range(0, 0, 3, 0);
        let table = build_symbol_table(vec![symbol("first", r), symbol("second", r)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table[&r].name, "second");
    }

    #[tokio::test]
    async fn failed_fetch_leaves_symbols_unpopulated() {
        let doc = Document::new(uri(), String::new());
        let result = doc
            .symbols_or_try_init(|| async {
                Err::<SymbolTable, _>(ClientError::Cancelled { method: "m" })
            })
            .await;
        assert!(result.is_err());
        assert!(doc.cached_symbols().is_none());

        let table = doc
            .symbols_or_try_init(|| async { Ok::<_, ClientError>(SymbolTable::new()) })
            .await
            .unwrap();
        assert!(table.is_empty());
        assert!(doc.cached_symbols().is_some());
    }

    #[tokio::test]
    async fn populated_symbols_are_never_refetched() {
        let doc = Document::new(uri(), String::new());
        let r = range(0, 0, 1, 0);
        let fetches = std::sync::atomic::AtomicUsize::new(0);
        for _ in 0..2 {
            let table = doc
                .symbols_or_try_init(|| async {
                    fetches.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok::<_, ClientError>(build_symbol_table(vec![symbol("a", r)]))
                })
                .await
                .unwrap();
            assert_eq!(table[&r].name, "a");
        }
        assert_eq!(fetches.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn announcement_happens_once() {
        let doc = Document::new(uri(), String::new());
        assert!(!doc.is_announced());
        assert!(doc.announce_with(|| async { Ok::<_, ClientError>(()) }).await.unwrap());
        assert!(!doc.announce_with(|| async { Ok::<_, ClientError>(()) }).await.unwrap());
        assert!(doc.is_announced());
    }

    #[test]
    fn definitions_are_keyed_by_exact_position() {
        let doc = Document::new(uri(), String::new());
        let here = Position::new(1, 2);
        let target = Location::new(uri(), range(5, 0, 5, 3));
        doc.cache_definitions(here, vec![target.clone()]);

        assert_eq!(doc.cached_definitions(&here).unwrap().as_ref(), &[target]);
        assert!(doc.cached_definitions(&Position::new(1, 3)).is_none());
    }
}
