use std::sync::Arc;
use std::time::{Instant, SystemTime};

use pecs_algo::AdaptiveSettings;

use crate::core::EventBus;
use crate::db::ActivityStore;
use crate::services::AdaptiveSessionService;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    sessions: Arc<AdaptiveSessionService>,
}

impl AppState {
    pub fn new(settings: AdaptiveSettings, store: Arc<dyn ActivityStore>) -> Self {
        let events = Arc::new(EventBus::new());
        Self::from_service(Arc::new(AdaptiveSessionService::new(settings, store, events)))
    }

    pub fn from_service(sessions: Arc<AdaptiveSessionService>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            sessions,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn sessions(&self) -> Arc<AdaptiveSessionService> {
        Arc::clone(&self.sessions)
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(self.sessions.events())
    }

    pub fn store(&self) -> Arc<dyn ActivityStore> {
        Arc::clone(self.sessions.store())
    }
}
