//! Error handling types for lsp-semcache
//!
//! I/O and transport failures propagate to the caller of the operation that
//! hit them. Decoding problems are reported explicitly instead of panicking.

use std::path::PathBuf;
use std::sync::PoisonError;

use thiserror::Error;
use url::Url;

use crate::domain::Range;
use crate::lsp::transport::TransportError;

/// Error type for client operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// A source file could not be read
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The URI does not name a local file
    #[error("Not a local file URI: {uri}")]
    InvalidUri { uri: Url },

    /// The transport failed a call or notification
    #[error("{method} failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: TransportError,
    },

    /// The request context was cancelled while the exchange was in flight
    #[error("{method} cancelled")]
    Cancelled { method: &'static str },

    /// The request context's deadline passed while the exchange was in flight
    #[error("{method} exceeded its deadline")]
    DeadlineExceeded { method: &'static str },

    /// The response did not have the expected shape
    #[error("Malformed {method} response: {source}")]
    MalformedResponse {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Semantic token data is not a whole number of 5-integer records, or a
    /// delta runs past the coordinate space
    #[error("Malformed semantic token stream of length {len}")]
    MalformedTokenStream { len: usize },

    /// A range does not address text inside the document
    #[error("Range {range:?} is outside of {uri}")]
    RangeOutOfBounds { uri: Url, range: Range },
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClientError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn transport(method: &'static str, source: TransportError) -> Self {
        ClientError::Transport { method, source }
    }

    pub fn malformed_response(method: &'static str, source: serde_json::Error) -> Self {
        ClientError::MalformedResponse { method, source }
    }

    /// True for failures caused by the request context rather than the server.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ClientError::Cancelled { .. } | ClientError::DeadlineExceeded { .. }
        )
    }
}

/// Helper trait to recover the guard from a poisoned std lock.
pub trait LockResultExt<T> {
    /// The context parameter names the operation that hit the poisoned lock.
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "lsp_semcache::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}
