//! Adaptive State
//!
//! Session-scoped controller state. The decision window and the lifetime
//! trial counter are kept apart: the window is a bounded deque trimmed to the
//! configured size, the counter only ever grows until the state is replaced.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::sanitize::success_rate;
use crate::types::{Difficulty, Trial};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveState {
    pub(crate) current_difficulty: Difficulty,
    /// Most recent trials, oldest first, never longer than the window
    pub(crate) trial_history: VecDeque<Trial>,
    pub(crate) total_trials: u64,
}

/// Fresh state at `initial_difficulty`.
///
/// The caller clamps `initial_difficulty` against its settings first; see
/// [`crate::AdaptiveSettings::initial_difficulty`].
pub fn create_adaptive_state(initial_difficulty: Difficulty) -> AdaptiveState {
    AdaptiveState::new(initial_difficulty)
}

impl AdaptiveState {
    pub fn new(initial_difficulty: Difficulty) -> Self {
        Self {
            current_difficulty: initial_difficulty,
            trial_history: VecDeque::new(),
            total_trials: 0,
        }
    }

    pub fn current_difficulty(&self) -> Difficulty {
        self.current_difficulty
    }

    pub fn total_trials(&self) -> u64 {
        self.total_trials
    }

    pub fn trial_history(&self) -> &VecDeque<Trial> {
        &self.trial_history
    }

    pub fn window_len(&self) -> usize {
        self.trial_history.len()
    }

    /// The last `window_size` retained trials, oldest first
    pub fn recent(&self, window_size: usize) -> impl Iterator<Item = &Trial> + '_ {
        let skip = self.trial_history.len().saturating_sub(window_size);
        self.trial_history.iter().skip(skip)
    }

    pub fn window_success_rate(&self) -> f64 {
        success_rate(&self.trial_history)
    }

    pub(crate) fn push_trial(&mut self, trial: Trial, window_size: usize) {
        self.trial_history.push_back(trial);
        while self.trial_history.len() > window_size {
            self.trial_history.pop_front();
        }
        self.total_trials += 1;
    }

    pub(crate) fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.current_difficulty = difficulty;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(success: bool) -> Trial {
        Trial {
            success,
            response_time_ms: 800,
            difficulty: 3,
        }
    }

    #[test]
    fn test_create_is_empty() {
        let state = create_adaptive_state(3);
        assert_eq!(state.current_difficulty(), 3);
        assert_eq!(state.total_trials(), 0);
        assert!(state.trial_history().is_empty());
        assert_eq!(state.window_success_rate(), 0.0);
    }

    #[test]
    fn test_window_is_bounded_but_counter_is_not() {
        let mut state = create_adaptive_state(3);
        for i in 0..25 {
            state.push_trial(trial(i % 2 == 0), 10);
        }
        assert_eq!(state.window_len(), 10);
        assert_eq!(state.total_trials(), 25);
    }

    #[test]
    fn test_recent_takes_newest() {
        let mut state = create_adaptive_state(3);
        for success in [false, false, true, true] {
            state.push_trial(trial(success), 10);
        }
        let recent: Vec<bool> = state.recent(2).map(|t| t.success).collect();
        assert_eq!(recent, vec![true, true]);
        assert_eq!(state.recent(100).count(), 4);
    }
}
