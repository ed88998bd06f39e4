use std::collections::HashMap;

use futures::future::BoxFuture;
use parking_lot::RwLock;

use super::{ActivityRecord, ActivityStore, SessionRecord, SessionSummaryRecord, StoreError};

#[derive(Debug, Clone)]
pub struct StoredSession {
    pub record: SessionRecord,
    pub summary: Option<SessionSummaryRecord>,
}

/// Process-local store; the default when no database is configured
#[derive(Default)]
pub struct MemoryActivityStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    activities: RwLock<HashMap<String, Vec<ActivityRecord>>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, session_id: &str) -> Option<StoredSession> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Activities of a session in write order
    pub fn activities(&self, session_id: &str) -> Vec<ActivityRecord> {
        self.activities
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl ActivityStore for MemoryActivityStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn create_session<'a>(
        &'a self,
        session: &'a SessionRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.sessions.write().insert(
                session.id.clone(),
                StoredSession {
                    record: session.clone(),
                    summary: None,
                },
            );
            Ok(())
        })
    }

    fn record_activity<'a>(
        &'a self,
        activity: &'a ActivityRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut activities = self.activities.write();
            let records = activities.entry(activity.session_id.clone()).or_default();
            match records.iter_mut().find(|r| r.id == activity.id) {
                Some(existing) => *existing = activity.clone(),
                None => records.push(activity.clone()),
            }
            Ok(())
        })
    }

    fn end_session<'a>(
        &'a self,
        summary: &'a SessionSummaryRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut sessions = self.sessions.write();
            match sessions.get_mut(&summary.session_id) {
                Some(stored) => {
                    stored.summary = Some(summary.clone());
                    Ok(())
                }
                None => Err(StoreError::Unavailable(format!(
                    "session {} was never created in this store",
                    summary.session_id
                ))),
            }
        })
    }
}
