//! Session Adapter
//!
//! Single owner of one live session's settings and state. Wraps the pure
//! controller so the presentation layer only deals with `record_trial`,
//! `reset`, `set_difficulty`, and `get_performance`.
//!
//! The session is `Send` but not `Sync`. Hosts with real parallelism keep it
//! behind one lock so updates never interleave.

use serde::{Deserialize, Serialize};

use crate::controller::update_adaptive_state;
use crate::settings::{AdaptiveSettings, SettingsError};
use crate::state::{create_adaptive_state, AdaptiveState};
use crate::summary::{build_session_report, get_performance_summary_with_margin, SessionReport};
use crate::types::{Difficulty, PerformanceSummary, TrialInput};

/// Invoked with `(new_difficulty, message)` after an automatic change
pub type DifficultyListener = Box<dyn FnMut(Difficulty, &str) + Send>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialOutcome {
    pub difficulty_changed: bool,
    pub new_difficulty: Difficulty,
    pub message: String,
}

pub struct AdaptiveSession {
    settings: AdaptiveSettings,
    state: AdaptiveState,
    listener: Option<DifficultyListener>,
}

impl std::fmt::Debug for AdaptiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveSession")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl AdaptiveSession {
    /// Fails when `settings` was assembled by hand and never validated
    pub fn new(
        settings: AdaptiveSettings,
        initial_difficulty: Option<Difficulty>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let state = create_adaptive_state(settings.initial_difficulty(initial_difficulty));
        Ok(Self {
            settings,
            state,
            listener: None,
        })
    }

    pub fn with_listener(mut self, listener: DifficultyListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn set_listener(&mut self, listener: Option<DifficultyListener>) {
        self.listener = listener;
    }

    pub fn settings(&self) -> &AdaptiveSettings {
        &self.settings
    }

    pub fn state(&self) -> &AdaptiveState {
        &self.state
    }

    pub fn current_difficulty(&self) -> Difficulty {
        self.state.current_difficulty()
    }

    pub fn total_trials(&self) -> u64 {
        self.state.total_trials()
    }

    pub fn record_trial(&mut self, success: bool, response_time_ms: u64) -> TrialOutcome {
        let update = update_adaptive_state(
            &self.state,
            TrialInput::new(success, response_time_ms),
            &self.settings,
        );
        self.state = update.state;

        let result = update.result;
        if result.changed {
            if let Some(listener) = self.listener.as_mut() {
                listener(result.new_difficulty, &result.message);
            }
        }

        TrialOutcome {
            difficulty_changed: result.changed,
            new_difficulty: result.new_difficulty,
            message: result.message,
        }
    }

    /// Discard all history; `None` restarts at the configured default
    pub fn reset(&mut self, initial_difficulty: Option<Difficulty>) -> Difficulty {
        self.state = create_adaptive_state(self.settings.initial_difficulty(initial_difficulty));
        self.state.current_difficulty()
    }

    /// Manual override, clamped into bounds. Keeps history and skips the
    /// windowed decision and the listener.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> Difficulty {
        let clamped = self.settings.clamp(difficulty);
        self.state = self.state.clone().with_difficulty(clamped);
        clamped
    }

    pub fn get_performance(&self) -> PerformanceSummary {
        get_performance_summary_with_margin(
            &self.state,
            self.settings.window_size,
            self.settings.trend_margin,
        )
    }

    pub fn report(&self) -> SessionReport {
        build_session_report(&self.state, &self.settings)
    }
}
