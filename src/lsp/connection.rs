//! Stdio connection to an analysis server process.
//!
//! Messages use LSP Base Protocol framing (`Content-Length: N\r\n\r\n{json}`).
//! A background reader task routes responses to waiting callers through the
//! [`ResponseRouter`], answers server-to-client requests, and logs
//! notifications.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use log::{debug, warn};
use serde_json::{Value, json};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::capabilities::ServerCapabilities;
use super::error_types::ResponseError;
use super::protocol::{self, methods};
use super::response_router::ResponseRouter;
use super::transport::{RequestContext, Transport, TransportError};
use crate::error::ClientResult;

type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Write one framed JSON-RPC message and flush.
pub async fn write_message<W>(writer: &mut W, message: &Value) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(message)
        .map_err(|e| TransportError::Protocol(format!("failed to serialize message: {e}")))?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed JSON-RPC message.
///
/// Header names are matched case-insensitively and headers other than
/// `Content-Length` are skipped. Returns `Ok(None)` on a clean EOF between
/// messages.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Value>, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length = None;
    let mut in_header = false;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            if in_header {
                return Err(TransportError::Protocol(
                    "connection closed inside a message header".to_string(),
                ));
            }
            return Ok(None);
        }
        in_header = true;

        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            let length = value.trim().parse::<usize>().map_err(|e| {
                TransportError::Protocol(format!("invalid Content-Length {value:?}: {e}"))
            })?;
            content_length = Some(length);
        }
    }

    let length = content_length
        .ok_or_else(|| TransportError::Protocol("missing Content-Length header".to_string()))?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| TransportError::Protocol(format!("invalid JSON body: {e}")))
}

/// Handle to the running reader task; cancels it when dropped.
struct ReaderTaskHandle {
    _join_handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Drop for ReaderTaskHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn spawn_reader_task<R>(
    reader: R,
    router: Arc<ResponseRouter>,
    writer: SharedWriter,
) -> ReaderTaskHandle
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    let cancel = CancellationToken::new();
    let join_handle = tokio::spawn(reader_loop(reader, router, writer, cancel.clone()));
    ReaderTaskHandle {
        _join_handle: join_handle,
        cancel,
    }
}

async fn reader_loop<R>(
    mut reader: R,
    router: Arc<ResponseRouter>,
    writer: SharedWriter,
    cancel: CancellationToken,
) where
    R: AsyncBufRead + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(target: "lsp_semcache::transport", "Reader task cancelled, shutting down");
                break;
            }
            result = read_message(&mut reader) => {
                match result {
                    Ok(Some(message)) => handle_message(message, &router, &writer).await,
                    Ok(None) => {
                        debug!(target: "lsp_semcache::transport", "Server closed its output");
                        break;
                    }
                    Err(e) => {
                        warn!(target: "lsp_semcache::transport", "Reader error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    let failed = router.fail_all();
    if failed > 0 {
        warn!(
            target: "lsp_semcache::transport",
            "Connection ended with {} pending requests",
            failed
        );
    }
}

async fn handle_message(message: Value, router: &ResponseRouter, writer: &SharedWriter) {
    let id = message.get("id").cloned();
    let method = message
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_string);

    match (id, method) {
        (Some(id), Some(method)) => {
            debug!(target: "lsp_semcache::transport", "Answering server request {}", method);
            let reply = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": server_request_result(&method, &message["params"])
            });
            let mut writer = writer.lock().await;
            if let Err(e) = write_message(&mut *writer, &reply).await {
                warn!(
                    target: "lsp_semcache::transport",
                    "Failed to answer {}: {}",
                    method,
                    e
                );
            }
        }
        (Some(_), None) => {
            if !router.route(message) {
                debug!(
                    target: "lsp_semcache::transport",
                    "Response for unknown request id, dropping"
                );
            }
        }
        (None, Some(method)) => {
            debug!(target: "lsp_semcache::transport", "Received notification {}, skipping", method);
        }
        (None, None) => {
            warn!(target: "lsp_semcache::transport", "Dropping message without id or method");
        }
    }
}

/// Result sent back for a server-to-client request.
///
/// `workspace/configuration` gets one `null` per requested item; everything
/// else gets `null`.
fn server_request_result(method: &str, params: &Value) -> Value {
    match method {
        "workspace/configuration" => {
            let items = params["items"].as_array().map_or(0, Vec::len);
            Value::Array(vec![Value::Null; items])
        }
        _ => Value::Null,
    }
}

fn request_message(id: i64, method: &str, params: Value) -> Value {
    let mut message = json!({ "jsonrpc": "2.0", "id": id, "method": method });
    if !params.is_null() {
        message["params"] = params;
    }
    message
}

fn notification_message(method: &str, params: Value) -> Value {
    let mut message = json!({ "jsonrpc": "2.0", "method": method });
    if !params.is_null() {
        message["params"] = params;
    }
    message
}

/// An in-flight request; removes itself from the router if abandoned and
/// forwards `$/cancelRequest` when the server has already seen it.
struct PendingRequest<'a> {
    id: i64,
    router: &'a ResponseRouter,
    writer: &'a SharedWriter,
    sent: bool,
    settled: bool,
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if self.settled || !self.router.remove(self.id) || !self.sent {
            return;
        }
        debug!(
            target: "lsp_semcache::transport",
            "Request {} abandoned, forwarding cancellation",
            self.id
        );
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let writer = Arc::clone(self.writer);
        let cancel = notification_message(methods::CANCEL_REQUEST, json!({ "id": self.id }));
        runtime.spawn(async move {
            let mut writer = writer.lock().await;
            if let Err(e) = write_message(&mut *writer, &cancel).await {
                debug!(target: "lsp_semcache::transport", "Failed to forward cancellation: {}", e);
            }
        });
    }
}

/// JSON-RPC transport over a child process's stdin and stdout.
pub struct StdioTransport {
    writer: SharedWriter,
    router: Arc<ResponseRouter>,
    next_id: AtomicI64,
    child: Option<Mutex<Child>>,
    _reader: ReaderTaskHandle,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("pending", &self.router.pending_count())
            .finish()
    }
}

impl StdioTransport {
    /// Spawn `command` (program followed by its arguments) and connect to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(command: &[String]) -> Result<Self, TransportError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| TransportError::Protocol("empty server command".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::Protocol(format!("failed to obtain stdin for {program}"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::Protocol(format!("failed to obtain stdout for {program}"))
        })?;
        debug!(
            target: "lsp_semcache::transport",
            "Spawned {} (pid {:?})",
            program,
            child.id()
        );

        let mut transport = Self::from_streams(stdout, stdin);
        transport.child = Some(Mutex::new(child));
        Ok(transport)
    }

    /// Connect over an arbitrary byte stream pair.
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: SharedWriter = Arc::new(Mutex::new(Box::new(writer)));
        let router = Arc::new(ResponseRouter::new());
        let reader = spawn_reader_task(
            BufReader::new(reader),
            Arc::clone(&router),
            Arc::clone(&writer),
        );
        Self {
            writer,
            router,
            next_id: AtomicI64::new(1),
            child: None,
            _reader: reader,
        }
    }

    /// Perform the `initialize`/`initialized` handshake.
    pub async fn initialize(
        &self,
        ctx: &RequestContext,
        root_uri: Option<&Url>,
    ) -> ClientResult<ServerCapabilities> {
        let params = protocol::initialize_params(root_uri);
        let result = ctx
            .run(methods::INITIALIZE, self.call(ctx, methods::INITIALIZE, params))
            .await?;
        ctx.run(
            methods::INITIALIZED,
            self.notify(ctx, methods::INITIALIZED, json!({})),
        )
        .await?;

        let capabilities = ServerCapabilities::from_initialize_result(&result);
        debug!(
            target: "lsp_semcache::transport",
            "Server initialized: {} token types, range requests {}, encoding {:?}",
            capabilities.legend.token_types.len(),
            capabilities.semantic_tokens_range,
            capabilities.position_encoding
        );
        Ok(capabilities)
    }

    /// Ask the server to shut down, then exit and reap the process.
    pub async fn shutdown(&self, ctx: &RequestContext) -> ClientResult<()> {
        ctx.run(
            methods::SHUTDOWN,
            self.call(ctx, methods::SHUTDOWN, Value::Null),
        )
        .await?;
        ctx.run(methods::EXIT, self.notify(ctx, methods::EXIT, Value::Null))
            .await?;

        if let Some(child) = &self.child {
            let status = ctx
                .run(methods::EXIT, async {
                    child.lock().await.wait().await.map_err(TransportError::from)
                })
                .await?;
            debug!(target: "lsp_semcache::transport", "Server exited with {}", status);
        }
        Ok(())
    }

    async fn send(&self, message: &Value) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        write_message(&mut *writer, message).await
    }
}

impl Transport for StdioTransport {
    async fn call(
        &self,
        _ctx: &RequestContext,
        method: &'static str,
        params: Value,
    ) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let rx = self
            .router
            .register(id)
            .ok_or_else(|| TransportError::Protocol(format!("request id {id} already pending")))?;
        let mut pending = PendingRequest {
            id,
            router: &self.router,
            writer: &self.writer,
            sent: false,
            settled: false,
        };

        self.send(&request_message(id, method, params)).await?;
        pending.sent = true;

        let response = rx.await.map_err(|_| TransportError::Closed)?;
        pending.settled = true;

        if let Some(error) = ResponseError::from_response(&response) {
            return Err(TransportError::Response(error));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn notify(
        &self,
        _ctx: &RequestContext,
        method: &'static str,
        params: Value,
    ) -> Result<(), TransportError> {
        self.send(&notification_message(method, params)).await
    }
}
