//! Live adaptive sessions.
//!
//! Each session's engine sits behind its own lock so trials for one session
//! are applied strictly one at a time. Store writes are queued in the
//! [`PendingActivityBuffer`] while the lock is held, which keeps the queue in
//! trial order, and are flushed when the session ends. A failed flush is
//! logged and reported but never touches the engine state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use pecs_algo::{
    AdaptiveSession, AdaptiveSettings, AdaptiveSettingsOverrides, Difficulty, PerformanceSummary,
    SessionReport, SettingsError, TrialOutcome,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{
    DifficultyChangedPayload, DifficultyOverriddenPayload, EventBus, SessionEndedPayload,
    SessionEvent, SessionResetPayload, SessionStartedPayload, TrialRecordedPayload,
};
use crate::db::{
    ActivityRecord, ActivityStore, FlushOutcome, PendingActivityBuffer, PendingWrite,
    SessionRecord, SessionSummaryRecord,
};

const GUEST_LEARNER: &str = "guest";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub learner_id: Option<String>,
    pub initial_difficulty: Option<Difficulty>,
    pub settings: Option<AdaptiveSettingsOverrides>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub learner_id: String,
    pub started_at: DateTime<Utc>,
    pub current_difficulty: Difficulty,
    pub total_trials: u64,
    pub window_trials: usize,
    pub performance: PerformanceSummary,
    pub settings: AdaptiveSettings,
    pub pending_writes: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecordResult {
    #[serde(flatten)]
    pub outcome: TrialOutcome,
    pub sequence: u64,
    pub total_trials: u64,
    pub performance: PerformanceSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionOutcome {
    pub session_id: String,
    pub report: SessionReport,
    /// Every queued write reached the store
    pub persisted: bool,
    pub flush: FlushOutcome,
}

struct LiveSession {
    learner_id: String,
    started_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    engine: AdaptiveSession,
    /// Trials since the last reset
    sequence: u64,
    /// Set under the lock by `end_session`; a caller that cloned the handle
    /// before removal must not write after the summary was queued
    ended: bool,
}

impl LiveSession {
    fn ensure_open(&self, session_id: &str) -> Result<(), SessionError> {
        if self.ended {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }
}

pub struct AdaptiveSessionService {
    settings: AdaptiveSettings,
    sessions: RwLock<HashMap<String, Arc<Mutex<LiveSession>>>>,
    pending: Arc<PendingActivityBuffer>,
    store: Arc<dyn ActivityStore>,
    events: Arc<EventBus>,
}

impl AdaptiveSessionService {
    pub fn new(
        settings: AdaptiveSettings,
        store: Arc<dyn ActivityStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            settings,
            sessions: RwLock::new(HashMap::new()),
            pending: Arc::new(PendingActivityBuffer::new()),
            store,
            events,
        }
    }

    pub fn settings(&self) -> &AdaptiveSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn ActivityStore> {
        &self.store
    }

    pub fn pending(&self) -> &Arc<PendingActivityBuffer> {
        &self.pending
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn start_session(
        &self,
        request: StartSessionRequest,
    ) -> Result<SessionSnapshot, SessionError> {
        let settings = match request.settings {
            Some(overrides) if !overrides.is_empty() => self.settings.with_overrides(overrides)?,
            _ => self.settings.clone(),
        };

        let session_id = uuid::Uuid::new_v4().to_string();
        let learner_id = request
            .learner_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| GUEST_LEARNER.to_string());
        let started_at = Utc::now();

        let engine = AdaptiveSession::new(settings.clone(), request.initial_difficulty)?
            .with_listener(self.difficulty_listener(&session_id));
        let difficulty = engine.current_difficulty();

        self.pending.push(
            &session_id,
            PendingWrite::SessionStarted(SessionRecord {
                id: session_id.clone(),
                learner_id: learner_id.clone(),
                initial_difficulty: difficulty,
                settings,
                started_at,
            }),
        );

        let live = LiveSession {
            learner_id: learner_id.clone(),
            started_at,
            last_activity_at: started_at,
            engine,
            sequence: 0,
            ended: false,
        };
        let snapshot = self.snapshot_of(&session_id, &live);
        self.sessions
            .write()
            .insert(session_id.clone(), Arc::new(Mutex::new(live)));

        self.events
            .publish(SessionEvent::SessionStarted(SessionStartedPayload {
                session_id: session_id.clone(),
                learner_id,
                difficulty,
            }));
        info!(session_id = %session_id, difficulty, "adaptive session started");

        Ok(snapshot)
    }

    pub fn record_trial(
        &self,
        session_id: &str,
        success: bool,
        response_time_ms: u64,
    ) -> Result<TrialRecordResult, SessionError> {
        let session = self.live(session_id)?;
        self.record_trial_on(session_id, &session, success, response_time_ms)
    }

    fn record_trial_on(
        &self,
        session_id: &str,
        session: &Mutex<LiveSession>,
        success: bool,
        response_time_ms: u64,
    ) -> Result<TrialRecordResult, SessionError> {
        let mut live = session.lock();
        live.ensure_open(session_id)?;
        live.touch();

        let difficulty = live.engine.current_difficulty();
        let outcome = live.engine.record_trial(success, response_time_ms);
        live.sequence += 1;
        let sequence = live.sequence;

        self.pending.push(
            session_id,
            PendingWrite::Activity(ActivityRecord {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: session_id.to_string(),
                sequence,
                success,
                response_time_ms,
                difficulty,
                difficulty_after: outcome.new_difficulty,
                difficulty_changed: outcome.difficulty_changed,
                recorded_at: Utc::now(),
            }),
        );

        self.events
            .publish(SessionEvent::TrialRecorded(TrialRecordedPayload {
                session_id: session_id.to_string(),
                sequence,
                success,
                response_time_ms,
                difficulty,
            }));

        Ok(TrialRecordResult {
            outcome,
            sequence,
            total_trials: live.engine.total_trials(),
            performance: live.engine.get_performance(),
        })
    }

    pub fn reset(
        &self,
        session_id: &str,
        initial_difficulty: Option<Difficulty>,
    ) -> Result<SessionSnapshot, SessionError> {
        let session = self.live(session_id)?;
        let mut live = session.lock();
        live.ensure_open(session_id)?;
        live.touch();

        let difficulty = live.engine.reset(initial_difficulty);
        live.sequence = 0;

        self.events
            .publish(SessionEvent::SessionReset(SessionResetPayload {
                session_id: session_id.to_string(),
                difficulty,
            }));
        info!(session_id = %session_id, difficulty, "adaptive session reset");

        Ok(self.snapshot_of(session_id, &live))
    }

    /// Manual override; the value is clamped into the session's bounds
    pub fn set_difficulty(
        &self,
        session_id: &str,
        difficulty: Difficulty,
    ) -> Result<SessionSnapshot, SessionError> {
        let session = self.live(session_id)?;
        let mut live = session.lock();
        live.ensure_open(session_id)?;
        live.touch();

        let applied = live.engine.set_difficulty(difficulty);
        self.events
            .publish(SessionEvent::DifficultyOverridden(DifficultyOverriddenPayload {
                session_id: session_id.to_string(),
                requested: difficulty,
                applied,
            }));

        Ok(self.snapshot_of(session_id, &live))
    }

    pub fn performance(&self, session_id: &str) -> Result<PerformanceSummary, SessionError> {
        let session = self.live(session_id)?;
        let live = session.lock();
        Ok(live.engine.get_performance())
    }

    pub fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        let session = self.live(session_id)?;
        let live = session.lock();
        Ok(self.snapshot_of(session_id, &live))
    }

    pub fn active_sessions(&self) -> Vec<SessionSnapshot> {
        let sessions: Vec<(String, Arc<Mutex<LiveSession>>)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, session)| (id.clone(), Arc::clone(session)))
            .collect();

        let mut snapshots: Vec<SessionSnapshot> = sessions
            .iter()
            .map(|(id, session)| self.snapshot_of(id, &session.lock()))
            .collect();
        snapshots.sort_by_key(|s| s.started_at);
        snapshots
    }

    /// Close the session, queue its summary and flush everything it wrote.
    /// The session leaves memory even when the flush fails; the rest of its
    /// queue stays for [`Self::flush_ended_sessions`].
    pub async fn end_session(&self, session_id: &str) -> Result<EndSessionOutcome, SessionError> {
        let report = {
            let session = self
                .sessions
                .write()
                .remove(session_id)
                .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
            let mut live = session.lock();
            live.ensure_open(session_id)?;
            live.ended = true;

            let report = live.engine.report();
            self.pending.push(
                session_id,
                PendingWrite::SessionEnded(SessionSummaryRecord::from_report(
                    session_id,
                    live.started_at,
                    Utc::now(),
                    &report,
                )),
            );
            report
        };

        self.events
            .publish(SessionEvent::SessionEnded(SessionEndedPayload {
                session_id: session_id.to_string(),
                report: report.clone(),
            }));

        let flush = self.pending.flush(session_id, self.store.as_ref()).await;
        let persisted = flush.is_complete();
        if persisted {
            info!(
                session_id = %session_id,
                total_trials = report.total_trials,
                final_difficulty = report.final_difficulty,
                "adaptive session ended"
            );
        } else {
            warn!(
                session_id = %session_id,
                remaining = flush.remaining,
                error = flush.error.as_deref().unwrap_or("flush in progress"),
                "adaptive session ended with unflushed writes"
            );
        }

        Ok(EndSessionOutcome {
            session_id: session_id.to_string(),
            report,
            persisted,
            flush,
        })
    }

    /// End every session with no activity for at least `idle_timeout`, which
    /// also flushes its queued writes
    pub async fn end_idle_sessions(&self, idle_timeout: Duration) -> Vec<EndSessionOutcome> {
        let cutoff = chrono::Duration::from_std(idle_timeout)
            .ok()
            .and_then(|timeout| Utc::now().checked_sub_signed(timeout));
        let Some(cutoff) = cutoff else {
            return Vec::new();
        };

        let sessions: Vec<(String, Arc<Mutex<LiveSession>>)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, session)| (id.clone(), Arc::clone(session)))
            .collect();
        let idle: Vec<String> = sessions
            .into_iter()
            .filter(|(_, session)| session.lock().last_activity_at <= cutoff)
            .map(|(id, _)| id)
            .collect();

        let mut outcomes = Vec::with_capacity(idle.len());
        for session_id in idle {
            // A concurrent end_session may have won the race; skip it
            if let Ok(outcome) = self.end_session(&session_id).await {
                info!(session_id = %session_id, "idle adaptive session closed");
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Retry the queue of a live or ended session
    pub async fn flush_pending(&self, session_id: &str) -> Result<FlushOutcome, SessionError> {
        let known = self.sessions.read().contains_key(session_id)
            || self.pending.pending_count(session_id) > 0;
        if !known {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        Ok(self.pending.flush(session_id, self.store.as_ref()).await)
    }

    /// Retry queues left behind by sessions that already ended
    pub async fn flush_ended_sessions(&self) -> Vec<FlushOutcome> {
        let ended: Vec<String> = {
            let sessions = self.sessions.read();
            self.pending
                .session_ids()
                .into_iter()
                .filter(|id| !sessions.contains_key(id))
                .collect()
        };

        let mut outcomes = Vec::with_capacity(ended.len());
        for session_id in ended {
            let outcome = self.pending.flush(&session_id, self.store.as_ref()).await;
            if outcome.error.is_some() {
                warn!(
                    session_id = %session_id,
                    remaining = outcome.remaining,
                    "retry of ended session writes failed"
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    fn live(&self, session_id: &str) -> Result<Arc<Mutex<LiveSession>>, SessionError> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    fn difficulty_listener(&self, session_id: &str) -> pecs_algo::DifficultyListener {
        let events = Arc::clone(&self.events);
        let session_id = session_id.to_string();
        Box::new(move |new_difficulty, message| {
            info!(session_id = %session_id, new_difficulty, "difficulty adjusted");
            events.publish(SessionEvent::DifficultyChanged(DifficultyChangedPayload {
                session_id: session_id.clone(),
                new_difficulty,
                message: message.to_string(),
            }));
        })
    }

    fn snapshot_of(&self, session_id: &str, live: &LiveSession) -> SessionSnapshot {
        SessionSnapshot {
            session_id: session_id.to_string(),
            learner_id: live.learner_id.clone(),
            started_at: live.started_at,
            current_difficulty: live.engine.current_difficulty(),
            total_trials: live.engine.total_trials(),
            window_trials: live.engine.state().window_len(),
            performance: live.engine.get_performance(),
            settings: live.engine.settings().clone(),
            pending_writes: self.pending.pending_count(session_id),
        }
    }
}
