//! Persistence collaborators for adaptive sessions.
//!
//! The engine never waits on these. Writes go through the per-session
//! [`pending_writes::PendingActivityBuffer`] and reach an [`ActivityStore`]
//! when the session ends or a retry runs.

pub mod memory;
pub mod pending_writes;
pub mod sqlite;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use pecs_algo::{AdaptiveSettings, Difficulty, SessionReport, Trend};
use serde::{Deserialize, Serialize};

pub use memory::MemoryActivityStore;
pub use pending_writes::{FlushOutcome, PendingActivityBuffer, PendingWrite};
pub use sqlite::SqliteActivityStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid stored row: {0}")]
    InvalidRow(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub learner_id: String,
    pub initial_difficulty: Difficulty,
    pub settings: AdaptiveSettings,
    pub started_at: DateTime<Utc>,
}

/// One trial as persisted. `id` is fixed at creation so a retried write
/// replaces rather than duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    pub session_id: String,
    /// 1-based position within the session since its last reset
    pub sequence: u64,
    pub success: bool,
    pub response_time_ms: u64,
    pub difficulty: Difficulty,
    pub difficulty_after: Difficulty,
    pub difficulty_changed: bool,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummaryRecord {
    pub session_id: String,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub total_trials: u64,
    pub final_difficulty: Difficulty,
    pub success_rate: f64,
    pub trend: Trend,
    pub mean_response_time_ms: Option<f64>,
    pub recommendation: String,
}

impl SessionSummaryRecord {
    pub fn from_report(
        session_id: &str,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        report: &SessionReport,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            ended_at,
            duration_seconds: (ended_at - started_at).num_seconds().max(0),
            total_trials: report.total_trials,
            final_difficulty: report.final_difficulty,
            success_rate: report.success_rate,
            trend: report.trend,
            mean_response_time_ms: report.mean_response_time_ms,
            recommendation: report.recommendation.clone(),
        }
    }
}

/// Remote store reachable through calls that may fail independently of the
/// live session state.
pub trait ActivityStore: Send + Sync {
    fn name(&self) -> &'static str;

    fn create_session<'a>(
        &'a self,
        session: &'a SessionRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn record_activity<'a>(
        &'a self,
        activity: &'a ActivityRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn end_session<'a>(
        &'a self,
        summary: &'a SessionSummaryRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// SQLite when `database_url` is set, in-memory otherwise
pub async fn store_from_url(
    database_url: Option<&str>,
) -> Result<Arc<dyn ActivityStore>, StoreError> {
    match database_url {
        Some(url) => {
            let store = SqliteActivityStore::connect(url).await?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryActivityStore::new())),
    }
}
