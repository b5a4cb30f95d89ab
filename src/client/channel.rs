//! Correlated request/response calls from the page to the worker.

use crate::error::Error;
use crate::types::protocol::{Reply, ReplyEnvelope, WorkerRequest};
use crate::worker::host::WorkerHandle;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// A page's connection to one worker instance.
///
/// Every call gets a fresh token; a reader task routes replies back to the
/// waiting caller by token. Replies that arrive after their caller gave up are
/// discarded.
pub struct WorkerLink {
    worker: WorkerHandle,
    reply_to: mpsc::UnboundedSender<ReplyEnvelope>,
    pending: Pending,
    next_token: AtomicU64,
    reader: JoinHandle<()>,
}

impl WorkerLink {
    pub fn connect(worker: WorkerHandle) -> Self {
        let (reply_to, mut replies) = mpsc::unbounded_channel::<ReplyEnvelope>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader = {
            let pending = Arc::clone(&pending);
            tokio::spawn(async move {
                while let Some(envelope) = replies.recv().await {
                    let waiter = pending
                        .lock()
                        .expect("pending lock")
                        .remove(&envelope.token);
                    match waiter {
                        Some(waiter) => {
                            let _ = waiter.send(envelope.reply);
                        }
                        None => debug!(token = envelope.token, "discarding late reply"),
                    }
                }
            })
        };
        Self {
            worker,
            reply_to,
            pending,
            next_token: AtomicU64::new(1),
            reader,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.worker.is_closed()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("pending lock").len()
    }

    /// Sends `request` and waits up to `timeout` for the matching reply.
    pub async fn call(&self, request: &WorkerRequest, timeout: Duration) -> Result<Value, Error> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let envelope = request
            .to_envelope(token)
            .map_err(|err| Error::Protocol(err.to_string()))?;
        let (waiter, reply) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending lock")
            .insert(token, waiter);

        if let Err(err) = self.worker.post_message(envelope, self.reply_to.clone()) {
            self.forget(token);
            return Err(err);
        }
        debug!(token, tag = request.tag(), "posted worker request");

        match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(Reply::Ok(value))) => Ok(value),
            Ok(Ok(Reply::Error(message))) => Err(Error::Worker(message)),
            Ok(Err(_)) => Err(Error::Disconnected),
            Err(_) => {
                self.forget(token);
                Err(Error::Timeout {
                    operation: request.tag(),
                    attempts: 1,
                })
            }
        }
    }

    fn forget(&self, token: u64) {
        self.pending.lock().expect("pending lock").remove(&token);
    }
}

impl Drop for WorkerLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
