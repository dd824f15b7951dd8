//! The seam between the cache and the process that answers queries.
//!
//! The cache needs exactly two primitives: a request/response `call` and a
//! fire-and-forget `notify`. Framing, id correlation and process lifecycle
//! live behind this trait.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error_types::ResponseError;
use crate::error::{ClientError, ClientResult};

/// Failure reported by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport IO error: {0}")]
    Io(#[from] io::Error),

    /// The server answered with a JSON-RPC error object
    #[error("server error {}: {}", .0.code, .0.message)]
    Response(ResponseError),

    /// The connection went away before a response arrived
    #[error("connection closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Request/response channel to the analysis server.
pub trait Transport: Send + Sync {
    /// Send a request and wait for its result.
    fn call(
        &self,
        ctx: &RequestContext,
        method: &'static str,
        params: Value,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;

    /// Send a notification; no response is expected.
    fn notify(
        &self,
        ctx: &RequestContext,
        method: &'static str,
        params: Value,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn call(
        &self,
        ctx: &RequestContext,
        method: &'static str,
        params: Value,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send {
        (**self).call(ctx, method, params)
    }

    fn notify(
        &self,
        ctx: &RequestContext,
        method: &'static str,
        params: Value,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).notify(ctx, method, params)
    }
}

/// Cancellation and deadline carried by every operation that reaches the
/// transport.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive a transport exchange, aborting it on cancellation or deadline.
    ///
    /// The exchange future is dropped on abort, so nothing downstream of it
    /// observes a result.
    pub async fn run<T, F>(&self, method: &'static str, exchange: F) -> ClientResult<T>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        self.guard(method, async move {
            exchange
                .await
                .map_err(|e| ClientError::transport(method, e))
        })
        .await
    }

    /// Drive any client-side wait under this context.
    ///
    /// Waiting on a cache slot another caller is filling goes through here,
    /// so every caller is bounded by its own deadline and token.
    pub async fn guard<T, F>(&self, method: &'static str, wait: F) -> ClientResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        if self.is_cancelled() {
            return Err(ClientError::Cancelled { method });
        }
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled { method }),
            _ = deadline => Err(ClientError::DeadlineExceeded { method }),
            result = wait => result,
        }
    }
}
