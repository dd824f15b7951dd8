//! Response routing for pending requests.
//!
//! Before a request is written, its id is registered to obtain a oneshot
//! receiver. The reader task calls [`ResponseRouter::route`] for every
//! response it sees; the requester awaits the receiver without holding any
//! lock.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::LockResultExt;

/// Routes responses to pending requests via oneshot channels.
pub(crate) struct ResponseRouter {
    pending: Mutex<HashMap<i64, oneshot::Sender<Value>>>,
}

impl ResponseRouter {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a pending request and return a receiver for its response.
    ///
    /// Returns `None` if the id is already pending.
    pub(crate) fn register(&self, id: i64) -> Option<oneshot::Receiver<Value>> {
        let mut pending = self.pending.lock().recover_poison("ResponseRouter::register");
        if pending.contains_key(&id) {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(id, tx);
        Some(rx)
    }

    /// Deliver `response` to the waiter registered under its id.
    ///
    /// Returns `true` if a waiter received it.
    pub(crate) fn route(&self, response: Value) -> bool {
        let Some(id) = response.get("id").and_then(Value::as_i64) else {
            return false;
        };
        let sender = self
            .pending
            .lock()
            .recover_poison("ResponseRouter::route")
            .remove(&id);
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Forget a pending request without answering it.
    ///
    /// Returns `true` if the request was still pending.
    pub(crate) fn remove(&self, id: i64) -> bool {
        self.pending
            .lock()
            .recover_poison("ResponseRouter::remove")
            .remove(&id)
            .is_some()
    }

    /// Drop every pending waiter; their receivers observe a closed channel.
    pub(crate) fn fail_all(&self) -> usize {
        let drained: Vec<_> = self
            .pending
            .lock()
            .recover_poison("ResponseRouter::fail_all")
            .drain()
            .collect();
        drained.len()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .recover_poison("ResponseRouter::pending_count")
            .len()
    }
}
