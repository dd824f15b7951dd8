use std::sync::Arc;

use dashmap::DashMap;
use url::Url;

use crate::document::Document;
use crate::error::{ClientError, ClientResult};

// The central store for all opened documents.
//
// The top-level map is concurrent; each document guards its own caches.
pub struct DocumentStore {
    documents: DashMap<Url, Arc<Document>>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<Document>> {
        self.documents.get(uri).map(|entry| Arc::clone(entry.value()))
    }

    /// Register `document` unless one is already cached for its URI.
    ///
    /// Returns whichever document ends up registered.
    pub fn insert(&self, document: Document) -> Arc<Document> {
        Arc::clone(
            self.documents
                .entry(document.uri().clone())
                .or_insert_with(|| Arc::new(document))
                .value(),
        )
    }

    /// Return the cached document, reading it from disk on a miss.
    ///
    /// Nothing is registered when the read fails.
    pub async fn get_or_load(&self, uri: &Url) -> ClientResult<Arc<Document>> {
        if let Some(document) = self.get(uri) {
            return Ok(document);
        }
        let text = read_source(uri).await?;
        log::debug!(
            target: "lsp_semcache::document",
            "Loaded {} ({} bytes)",
            uri,
            text.len()
        );
        Ok(self.insert(Document::new(uri.clone(), text)))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Read the full contents of the file a `file://` URI points at.
pub async fn read_source(uri: &Url) -> ClientResult<String> {
    let path = uri
        .to_file_path()
        .map_err(|_| ClientError::InvalidUri { uri: uri.clone() })?;
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ClientError::io(path, e))
}
