use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::services::AdaptiveSessionService;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub sessions: usize,
    pub written: usize,
    pub still_pending: usize,
    pub failed_sessions: usize,
}

/// Retry the store writes of sessions that ended while the store was failing
pub async fn flush_ended_sessions(service: Arc<AdaptiveSessionService>) -> FlushStats {
    let start = Instant::now();
    debug!("Starting pending write flush cycle");

    let outcomes = service.flush_ended_sessions().await;
    let stats = outcomes.iter().fold(FlushStats::default(), |mut acc, o| {
        acc.sessions += 1;
        acc.written += o.written;
        acc.still_pending += o.remaining;
        if o.error.is_some() {
            acc.failed_sessions += 1;
        }
        acc
    });

    if stats.sessions == 0 {
        return stats;
    }

    if stats.failed_sessions > 0 {
        warn!(
            sessions = stats.sessions,
            written = stats.written,
            still_pending = stats.still_pending,
            failed_sessions = stats.failed_sessions,
            "Pending write flush incomplete"
        );
    } else {
        info!(
            sessions = stats.sessions,
            written = stats.written,
            duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
            "Pending write flush completed"
        );
    }

    stats
}
