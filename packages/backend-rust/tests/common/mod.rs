#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use futures::future::BoxFuture;
use pecs_algo::AdaptiveSettings;
use pecs_backend::core::EventBus;
use pecs_backend::db::{
    ActivityRecord, ActivityStore, MemoryActivityStore, SessionRecord, SessionSummaryRecord,
    StoreError,
};
use pecs_backend::services::AdaptiveSessionService;
use pecs_backend::state::AppState;
use serde_json::Value;

pub fn create_test_app() -> Router {
    pecs_backend::create_app()
}

pub fn app_with_service(service: Arc<AdaptiveSessionService>) -> Router {
    pecs_backend::build_app(AppState::from_service(service))
}

pub fn service_with_store(store: Arc<dyn ActivityStore>) -> Arc<AdaptiveSessionService> {
    Arc::new(AdaptiveSessionService::new(
        AdaptiveSettings::default(),
        store,
        Arc::new(EventBus::new()),
    ))
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Memory store that can be switched offline; counts rejected calls
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryActivityStore,
    offline: AtomicBool,
    pub rejected: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

impl ActivityStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn create_session<'a>(
        &'a self,
        session: &'a SessionRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.check()?;
            self.inner.create_session(session).await
        })
    }

    fn record_activity<'a>(
        &'a self,
        activity: &'a ActivityRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.check()?;
            self.inner.record_activity(activity).await
        })
    }

    fn end_session<'a>(
        &'a self,
        summary: &'a SessionSummaryRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.check()?;
            self.inner.end_session(summary).await
        })
    }
}
