use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use super::{ActivityRecord, ActivityStore, SessionRecord, SessionSummaryRecord, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    SessionStarted(SessionRecord),
    Activity(ActivityRecord),
    SessionEnded(SessionSummaryRecord),
}

impl PendingWrite {
    pub fn kind(&self) -> &'static str {
        match self {
            PendingWrite::SessionStarted(_) => "session_started",
            PendingWrite::Activity(_) => "activity",
            PendingWrite::SessionEnded(_) => "session_ended",
        }
    }

    async fn apply(&self, store: &dyn ActivityStore) -> Result<(), StoreError> {
        match self {
            PendingWrite::SessionStarted(record) => store.create_session(record).await,
            PendingWrite::Activity(record) => store.record_activity(record).await,
            PendingWrite::SessionEnded(summary) => store.end_session(summary).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushOutcome {
    pub session_id: String,
    pub written: usize,
    pub remaining: usize,
    pub error: Option<String>,
    /// Another flush of the same session was already running
    pub skipped: bool,
}

impl FlushOutcome {
    pub fn is_complete(&self) -> bool {
        !self.skipped && self.error.is_none() && self.remaining == 0
    }
}

#[derive(Default)]
struct SessionQueue {
    entries: VecDeque<PendingWrite>,
    flushing: bool,
}

/// Write-ahead buffer of store writes, keyed by session id.
///
/// Entries leave the queue only after the store accepts them, so a failed
/// flush can be retried without losing or reordering anything.
#[derive(Default)]
pub struct PendingActivityBuffer {
    queues: Mutex<HashMap<String, SessionQueue>>,
}

struct FlushGuard<'a> {
    buffer: &'a PendingActivityBuffer,
    session_id: &'a str,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let mut queues = self.buffer.queues.lock();
        let drained = match queues.get_mut(self.session_id) {
            Some(queue) => {
                queue.flushing = false;
                queue.entries.is_empty()
            }
            None => false,
        };
        if drained {
            queues.remove(self.session_id);
        }
    }
}

impl PendingActivityBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, session_id: &str, write: PendingWrite) {
        self.queues
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .entries
            .push_back(write);
    }

    pub fn pending_count(&self, session_id: &str) -> usize {
        self.queues
            .lock()
            .get(session_id)
            .map(|queue| queue.entries.len())
            .unwrap_or(0)
    }

    pub fn total_pending(&self) -> usize {
        self.queues.lock().values().map(|q| q.entries.len()).sum()
    }

    /// Sessions that still hold unwritten entries
    pub fn session_ids(&self) -> Vec<String> {
        self.queues
            .lock()
            .iter()
            .filter(|(_, queue)| !queue.entries.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Whether the queue still holds the session's end summary
    pub fn has_pending_end(&self, session_id: &str) -> bool {
        self.queues
            .lock()
            .get(session_id)
            .map(|queue| {
                queue
                    .entries
                    .iter()
                    .any(|w| matches!(w, PendingWrite::SessionEnded(_)))
            })
            .unwrap_or(false)
    }

    /// Write the session's queue to `store` in order, stopping at the first
    /// failure. Concurrent calls for the same session return `skipped`.
    pub async fn flush(&self, session_id: &str, store: &dyn ActivityStore) -> FlushOutcome {
        {
            let mut queues = self.queues.lock();
            let Some(queue) = queues.get_mut(session_id) else {
                return FlushOutcome {
                    session_id: session_id.to_string(),
                    written: 0,
                    remaining: 0,
                    error: None,
                    skipped: false,
                };
            };
            if queue.flushing {
                debug!(session_id = %session_id, "flush already in progress");
                return FlushOutcome {
                    session_id: session_id.to_string(),
                    written: 0,
                    remaining: queue.entries.len(),
                    error: None,
                    skipped: true,
                };
            }
            queue.flushing = true;
        }
        let _guard = FlushGuard {
            buffer: self,
            session_id,
        };

        let mut written = 0;
        let mut error = None;
        // Only the flushing task pops, so the front is stable across the await
        while let Some(next) = self.front(session_id) {
            match next.apply(store).await {
                Ok(()) => {
                    self.pop_front(session_id);
                    written += 1;
                }
                Err(err) => {
                    warn!(
                        session_id = %session_id,
                        store = store.name(),
                        kind = next.kind(),
                        error = %err,
                        "pending write failed; keeping it for retry"
                    );
                    error = Some(err.to_string());
                    break;
                }
            }
        }

        FlushOutcome {
            session_id: session_id.to_string(),
            written,
            remaining: self.pending_count(session_id),
            error,
            skipped: false,
        }
    }

    fn front(&self, session_id: &str) -> Option<PendingWrite> {
        self.queues
            .lock()
            .get(session_id)
            .and_then(|queue| queue.entries.front().cloned())
    }

    fn pop_front(&self, session_id: &str) {
        if let Some(queue) = self.queues.lock().get_mut(session_id) {
            queue.entries.pop_front();
        }
    }
}
