use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::services::AdaptiveSessionService;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub ended: usize,
    pub unpersisted: usize,
}

/// End live sessions that nobody has touched for `idle_timeout`
pub async fn cleanup_idle_sessions(
    service: Arc<AdaptiveSessionService>,
    idle_timeout: Duration,
) -> CleanupStats {
    let start = Instant::now();
    debug!("Starting idle session cleanup");

    let outcomes = service.end_idle_sessions(idle_timeout).await;
    let stats = CleanupStats {
        ended: outcomes.len(),
        unpersisted: outcomes.iter().filter(|o| !o.persisted).count(),
    };

    if stats.ended == 0 {
        return stats;
    }

    if stats.unpersisted > 0 {
        warn!(
            ended = stats.ended,
            unpersisted = stats.unpersisted,
            "Idle sessions ended with unflushed writes"
        );
    } else {
        info!(
            ended = stats.ended,
            duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
            "Idle session cleanup completed"
        );
    }

    stats
}
