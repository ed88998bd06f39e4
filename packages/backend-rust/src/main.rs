use std::sync::Arc;

use pecs_backend::config::Config;
use pecs_backend::core::EventBus;
use pecs_backend::db;
use pecs_backend::logging::init_tracing;
use pecs_backend::services::AdaptiveSessionService;
use pecs_backend::state::AppState;
use pecs_backend::workers::WorkerManager;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config);

    let settings = match config.adaptive_settings() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!(error = %err, "invalid adaptive settings");
            std::process::exit(1);
        }
    };

    let store = match db::store_from_url(config.database_url.as_deref()).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, "activity store not initialized");
            std::process::exit(1);
        }
    };
    tracing::info!(store = store.name(), "activity store ready");

    let sessions = Arc::new(AdaptiveSessionService::new(
        settings,
        store,
        Arc::new(EventBus::new()),
    ));

    let worker_manager = match WorkerManager::new(Arc::clone(&sessions)).await {
        Ok(manager) => {
            if let Err(e) = manager.start(&config).await {
                tracing::error!(error = %e, "failed to start workers");
            }
            Some(manager)
        }
        Err(e) => {
            tracing::warn!(error = %e, "worker manager not initialized");
            None
        }
    };

    let app = pecs_backend::build_app(AppState::from_service(Arc::clone(&sessions)));

    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "bind listener failed");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "pecs-backend listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped, initiating graceful shutdown sequence");

    if let Some(ref manager) = worker_manager {
        manager.stop().await;
    }

    let outcomes = sessions.flush_ended_sessions().await;
    let unflushed: usize = outcomes.iter().map(|o| o.remaining).sum();
    if unflushed > 0 {
        tracing::warn!(unflushed, "shutting down with unflushed session writes");
    }

    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
