use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use pecs_algo::Difficulty;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::response::{created, ok, AppError};
use crate::services::StartSessionRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordTrialRequest {
    success: bool,
    response_time_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetRequest {
    initial_difficulty: Option<Difficulty>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetDifficultyRequest {
    difficulty: Difficulty,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sessions).post(start_session))
        .route("/:sessionId", get(get_session))
        .route("/:sessionId/trials", post(record_trial))
        .route("/:sessionId/performance", get(get_performance))
        .route("/:sessionId/reset", post(reset_session))
        .route("/:sessionId/difficulty", put(set_difficulty))
        .route("/:sessionId/end", post(end_session))
        .route("/:sessionId/flush", post(flush_session))
}

/// Empty bodies fall back to the type's default
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::bad_request(format!("invalid JSON body: {e}")))
}

fn required_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

async fn list_sessions(State(state): State<AppState>) -> Response {
    ok(state.sessions().active_sessions()).into_response()
}

async fn start_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: StartSessionRequest = optional_body(&body)?;
    let snapshot = state.sessions().start_session(request)?;
    Ok(created(snapshot))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.sessions().snapshot(&session_id)?))
}

async fn record_trial(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Result<Json<RecordTrialRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = required_body(payload)?;
    let result =
        state
            .sessions()
            .record_trial(&session_id, request.success, request.response_time_ms)?;
    Ok(ok(result))
}

async fn get_performance(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.sessions().performance(&session_id)?))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: ResetRequest = optional_body(&body)?;
    let snapshot = state
        .sessions()
        .reset(&session_id, request.initial_difficulty)?;
    Ok(ok(snapshot))
}

async fn set_difficulty(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Result<Json<SetDifficultyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = required_body(payload)?;
    let snapshot = state
        .sessions()
        .set_difficulty(&session_id, request.difficulty)?;
    Ok(ok(snapshot))
}

async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.sessions().end_session(&session_id).await?;
    Ok(ok(outcome))
}

async fn flush_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.sessions().flush_pending(&session_id).await?;
    Ok(ok(outcome))
}
