mod pending_flush;
mod session_cleanup;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::config::Config;
use crate::services::AdaptiveSessionService;

pub use pending_flush::{flush_ended_sessions, FlushStats};
pub use session_cleanup::{cleanup_idle_sessions, CleanupStats};

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    sessions: Arc<AdaptiveSessionService>,
    running: AtomicBool,
}

impl WorkerManager {
    pub async fn new(sessions: Arc<AdaptiveSessionService>) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            sessions,
            running: AtomicBool::new(false),
        })
    }

    pub async fn start(&self, config: &Config) -> Result<(), WorkerError> {
        if !config.pending_flush_enabled {
            info!("ENABLE_PENDING_FLUSH_WORKER is off, skipping worker startup");
            return Ok(());
        }

        let scheduler = self.scheduler.lock().await;

        let schedule = config.pending_flush_schedule.clone();
        let sessions = Arc::clone(&self.sessions);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
            let sessions = Arc::clone(&sessions);
            let mut rx = shutdown_rx.resubscribe();
            Box::pin(async move {
                tokio::select! {
                    _ = rx.recv() => {},
                    _ = pending_flush::flush_ended_sessions(sessions) => {}
                }
            })
        })?;
        scheduler.add(job).await?;
        info!(schedule = %schedule, "Pending write flush worker scheduled");

        let cleanup_schedule = config.session_cleanup_schedule.clone();
        let idle_timeout = config.session_idle_timeout;
        let sessions = Arc::clone(&self.sessions);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let job = Job::new_async(cleanup_schedule.as_str(), move |_uuid, _lock| {
            let sessions = Arc::clone(&sessions);
            let mut rx = shutdown_rx.resubscribe();
            Box::pin(async move {
                tokio::select! {
                    _ = rx.recv() => {},
                    _ = session_cleanup::cleanup_idle_sessions(sessions, idle_timeout) => {}
                }
            })
        })?;
        scheduler.add(job).await?;
        info!(
            schedule = %cleanup_schedule,
            idle_timeout_secs = idle_timeout.as_secs(),
            "Idle session cleanup worker scheduled"
        );

        scheduler.start().await?;
        self.running.store(true, Ordering::Relaxed);
        info!("All workers started");

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn stop(&self) {
        if !self.is_running() {
            return;
        }

        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }

        self.running.store(false, Ordering::Relaxed);
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}
