use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pecs_algo::{Difficulty, SessionReport};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SessionEvent {
    #[serde(rename = "SESSION_STARTED")]
    SessionStarted(SessionStartedPayload),

    #[serde(rename = "TRIAL_RECORDED")]
    TrialRecorded(TrialRecordedPayload),

    #[serde(rename = "DIFFICULTY_CHANGED")]
    DifficultyChanged(DifficultyChangedPayload),

    #[serde(rename = "DIFFICULTY_OVERRIDDEN")]
    DifficultyOverridden(DifficultyOverriddenPayload),

    #[serde(rename = "SESSION_RESET")]
    SessionReset(SessionResetPayload),

    #[serde(rename = "SESSION_ENDED")]
    SessionEnded(SessionEndedPayload),
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted(_) => "SESSION_STARTED",
            SessionEvent::TrialRecorded(_) => "TRIAL_RECORDED",
            SessionEvent::DifficultyChanged(_) => "DIFFICULTY_CHANGED",
            SessionEvent::DifficultyOverridden(_) => "DIFFICULTY_OVERRIDDEN",
            SessionEvent::SessionReset(_) => "SESSION_RESET",
            SessionEvent::SessionEnded(_) => "SESSION_ENDED",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::SessionStarted(p) => &p.session_id,
            SessionEvent::TrialRecorded(p) => &p.session_id,
            SessionEvent::DifficultyChanged(p) => &p.session_id,
            SessionEvent::DifficultyOverridden(p) => &p.session_id,
            SessionEvent::SessionReset(p) => &p.session_id,
            SessionEvent::SessionEnded(p) => &p.session_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartedPayload {
    pub session_id: String,
    pub learner_id: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecordedPayload {
    pub session_id: String,
    pub sequence: u64,
    pub success: bool,
    pub response_time_ms: u64,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyChangedPayload {
    pub session_id: String,
    pub new_difficulty: Difficulty,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyOverriddenPayload {
    pub session_id: String,
    pub requested: Difficulty,
    pub applied: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResetPayload {
    pub session_id: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndedPayload {
    pub session_id: String,
    pub report: SessionReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub id: String,
    pub event: SessionEvent,
    pub created_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: SessionEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            created_at: Utc::now(),
        }
    }
}

pub type SubscriberId = String;

struct Subscriber {
    session_id: Option<String>,
    event_types: Option<Vec<String>>,
    sender: broadcast::Sender<EventEnvelope>,
}

impl Subscriber {
    fn matches(&self, envelope: &EventEnvelope) -> bool {
        if let Some(ref session_id) = self.session_id {
            if envelope.event.session_id() != session_id {
                return false;
            }
        }

        if let Some(ref event_types) = self.event_types {
            if !event_types
                .iter()
                .any(|t| t == envelope.event.event_type())
            {
                return false;
            }
        }

        true
    }
}

/// Fan-out of session events. Publishing is synchronous so it can run
/// inside a session's difficulty listener while the session lock is held.
pub struct EventBus {
    global_sender: broadcast::Sender<EventEnvelope>,
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    event_count: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        let (global_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            global_sender,
            subscribers: RwLock::new(HashMap::new()),
            event_count: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: SessionEvent) {
        let envelope = EventEnvelope::new(event);
        self.event_count.fetch_add(1, Ordering::Relaxed);

        let mut sent_count = 0usize;
        for subscriber in self.subscribers.read().values() {
            if subscriber.matches(&envelope) && subscriber.sender.send(envelope.clone()).is_ok() {
                sent_count += 1;
            }
        }

        if self.global_sender.send(envelope.clone()).is_err() {
            debug!("No global subscribers for event");
        }

        debug!(
            event_type = envelope.event.event_type(),
            session_id = envelope.event.session_id(),
            sent_to = sent_count,
            "Event published"
        );
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.global_sender.subscribe()
    }

    pub fn subscribe_filtered(
        &self,
        session_id: Option<String>,
        event_types: Option<Vec<String>>,
    ) -> (SubscriberId, broadcast::Receiver<EventEnvelope>) {
        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        let subscriber_id = uuid::Uuid::new_v4().to_string();

        self.subscribers.write().insert(
            subscriber_id.clone(),
            Subscriber {
                session_id,
                event_types,
                sender,
            },
        );

        debug!(subscriber_id = %subscriber_id, "New filtered subscription created");
        (subscriber_id, receiver)
    }

    pub fn unsubscribe(&self, subscriber_id: &str) {
        if self.subscribers.write().remove(subscriber_id).is_some() {
            debug!(subscriber_id = %subscriber_id, "Subscription removed");
        }
    }

    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> EventBusStats {
        let filtered_subscribers = self.subscribers.read().len();
        let global_subscribers = self.global_sender.receiver_count();
        EventBusStats {
            total_events: self.event_count(),
            subscriber_count: filtered_subscribers + global_subscribers,
            global_subscribers,
            filtered_subscribers,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBusStats {
    pub total_events: u64,
    pub subscriber_count: usize,
    pub global_subscribers: usize,
    pub filtered_subscribers: usize,
}
