use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};

use crate::core::{EventBus, EventEnvelope, SubscriberId};
use crate::response::AppError;
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

const EVENT_TYPES: [&str; 6] = [
    "SESSION_STARTED",
    "TRIAL_RECORDED",
    "DIFFICULTY_CHANGED",
    "DIFFICULTY_OVERRIDDEN",
    "SESSION_RESET",
    "SESSION_ENDED",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamQuery {
    /// Comma separated, e.g. `DIFFICULTY_CHANGED,SESSION_ENDED`
    event_types: Option<String>,
}

/// Drops the bus subscription when the client disconnects
struct SubscriptionGuard {
    bus: Arc<EventBus>,
    subscriber_id: SubscriberId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.subscriber_id);
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/:sessionId/events", get(session_stream))
}

fn parse_event_types(raw: Option<&str>) -> Option<Vec<String>> {
    let requested: HashSet<&str> = raw?
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    let known: Vec<String> = EVENT_TYPES
        .iter()
        .filter(|t| requested.contains(**t))
        .map(|t| t.to_string())
        .collect();
    if known.is_empty() {
        None
    } else {
        Some(known)
    }
}

fn to_sse(envelope: &EventEnvelope) -> Event {
    let data = serde_json::to_string(&envelope.event).unwrap_or_else(|_| "{}".to_string());
    Event::default()
        .id(envelope.id.clone())
        .event(envelope.event.event_type())
        .data(data)
}

fn ping_event() -> Event {
    let payload = serde_json::json!({
        "type": "PING",
        "payload": { "timestamp": chrono::Utc::now().to_rfc3339() },
    });
    Event::default()
        .id(uuid::Uuid::new_v4().to_string())
        .event("PING")
        .data(payload.to_string())
}

async fn session_stream(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<impl IntoResponse, AppError> {
    // 404 before opening a stream for a session that does not exist
    state.sessions().snapshot(&session_id)?;

    let bus = state.events();
    let (subscriber_id, receiver) =
        bus.subscribe_filtered(Some(session_id), parse_event_types(query.event_types.as_deref()));
    let guard = SubscriptionGuard {
        bus,
        subscriber_id,
    };

    let events = BroadcastStream::new(receiver).filter_map(move |msg| {
        let _guard = &guard;
        let event = msg.ok().map(|envelope| Ok::<Event, Infallible>(to_sse(&envelope)));
        async move { event }
    });

    let initial = stream::once(async { Ok::<Event, Infallible>(ping_event()) });
    let pings = IntervalStream::new(tokio::time::interval(PING_INTERVAL))
        .map(|_| Ok::<Event, Infallible>(ping_event()));

    Ok(Sse::new(initial.chain(stream::select(events, pings))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_types_keeps_known_names() {
        let parsed = parse_event_types(Some("DIFFICULTY_CHANGED, bogus ,SESSION_ENDED"));
        assert_eq!(
            parsed,
            Some(vec![
                "DIFFICULTY_CHANGED".to_string(),
                "SESSION_ENDED".to_string()
            ])
        );
        assert_eq!(parse_event_types(Some("bogus")), None);
        assert_eq!(parse_event_types(None), None);
    }
}
