pub mod config;
pub mod core;
pub mod db;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod workers;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// App backed by an in-memory store and default settings
pub fn create_app() -> axum::Router {
    let state = AppState::new(
        pecs_algo::AdaptiveSettings::default(),
        std::sync::Arc::new(db::MemoryActivityStore::new()),
    );
    build_app(state)
}

pub fn build_app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
