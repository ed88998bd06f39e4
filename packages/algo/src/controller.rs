//! Adaptive Difficulty Controller
//!
//! Sliding-window hysteresis controller over the number of choices shown to
//! the learner.
//!
//! Per update:
//! - append the trial to a copy of the state, tagged with the current difficulty
//! - hold while the window has fewer than `min_trials_before_adjust` trials
//! - rate >= `increase_threshold` and below max -> one step up
//! - rate <= `decrease_threshold` and above min -> one step down
//! - otherwise hold (stable band, or saturated at a bound)

use serde::{Deserialize, Serialize};

use crate::sanitize::{at_most, reaches};
use crate::settings::AdaptiveSettings;
use crate::state::AdaptiveState;
use crate::types::{Difficulty, DifficultyChangeResult, Trial, TrialInput};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjustment {
    Increase,
    Decrease,
    Hold,
}

/// New state plus the decision that produced it
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptiveUpdate {
    pub state: AdaptiveState,
    pub result: DifficultyChangeResult,
}

/// Threshold rule on an already-windowed success rate.
///
/// Thresholds are inclusive on the side that triggers action. Both branches
/// can never match because validated settings keep the thresholds apart.
pub fn decide(success_rate: f64, current: Difficulty, settings: &AdaptiveSettings) -> Adjustment {
    if reaches(success_rate, settings.increase_threshold) && current < settings.max_array_size {
        Adjustment::Increase
    } else if at_most(success_rate, settings.decrease_threshold)
        && current > settings.min_array_size
    {
        Adjustment::Decrease
    } else {
        Adjustment::Hold
    }
}

pub fn update_adaptive_state(
    state: &AdaptiveState,
    input: TrialInput,
    settings: &AdaptiveSettings,
) -> AdaptiveUpdate {
    let current = state.current_difficulty();

    let mut next = state.clone();
    next.push_trial(
        Trial {
            success: input.success,
            response_time_ms: input.response_time_ms,
            difficulty: current,
        },
        settings.window_size,
    );

    if next.window_len() < settings.min_trials_before_adjust {
        return AdaptiveUpdate {
            state: next,
            result: DifficultyChangeResult::unchanged(current),
        };
    }

    match decide(next.window_success_rate(), current, settings) {
        Adjustment::Increase => {
            let difficulty = current + 1;
            AdaptiveUpdate {
                state: next.with_difficulty(difficulty),
                result: DifficultyChangeResult::changed(difficulty, increase_message(difficulty)),
            }
        }
        Adjustment::Decrease => {
            let difficulty = current - 1;
            AdaptiveUpdate {
                state: next.with_difficulty(difficulty),
                result: DifficultyChangeResult::changed(difficulty, decrease_message(difficulty)),
            }
        }
        Adjustment::Hold => AdaptiveUpdate {
            state: next,
            result: DifficultyChangeResult::unchanged(current),
        },
    }
}

fn increase_message(difficulty: Difficulty) -> String {
    format!("Great work! Increasing the challenge to {difficulty} choices.")
}

fn decrease_message(difficulty: Difficulty) -> String {
    format!("Let's make it a little easier: {difficulty} choices.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AdaptiveSettingsOverrides;
    use crate::state::create_adaptive_state;

    fn settings() -> AdaptiveSettings {
        AdaptiveSettings::new(AdaptiveSettingsOverrides {
            min_array_size: Some(2),
            max_array_size: Some(6),
            current_array_size: Some(4),
            window_size: Some(10),
            min_trials_before_adjust: Some(5),
            increase_threshold: Some(0.85),
            decrease_threshold: Some(0.65),
            target_success_rate: Some(0.75),
            ..Default::default()
        })
        .unwrap()
    }

    fn feed(
        mut state: AdaptiveState,
        outcomes: &[bool],
        settings: &AdaptiveSettings,
    ) -> (AdaptiveState, Vec<DifficultyChangeResult>) {
        let mut results = Vec::new();
        for &success in outcomes {
            let update = update_adaptive_state(&state, TrialInput::new(success, 1200), settings);
            state = update.state;
            results.push(update.result);
        }
        (state, results)
    }

    #[test]
    fn test_no_adjustment_before_min_trials() {
        let settings = settings();
        let (state, results) = feed(create_adaptive_state(4), &[true; 4], &settings);
        assert!(results.iter().all(|r| !r.changed));
        assert_eq!(state.current_difficulty(), 4);

        let (state, results) = feed(create_adaptive_state(4), &[false; 4], &settings);
        assert!(results.iter().all(|r| !r.changed && r.message.is_empty()));
        assert_eq!(state.current_difficulty(), 4);
    }

    #[test]
    fn test_five_successes_increase_once() {
        let settings = settings();
        let (state, results) = feed(create_adaptive_state(4), &[true; 5], &settings);
        assert_eq!(results.iter().filter(|r| r.changed).count(), 1);
        let last = results.last().unwrap();
        assert!(last.changed);
        assert_eq!(last.new_difficulty, 5);
        assert!(!last.message.is_empty());
        assert_eq!(state.current_difficulty(), 5);
    }

    #[test]
    fn test_five_failures_decrease_once() {
        let settings = settings();
        let (state, results) = feed(create_adaptive_state(4), &[false; 5], &settings);
        assert_eq!(results.iter().filter(|r| r.changed).count(), 1);
        assert_eq!(results.last().unwrap().new_difficulty, 3);
        assert_eq!(state.current_difficulty(), 3);
    }

    #[test]
    fn test_saturates_at_max() {
        let settings = settings();
        let (state, results) = feed(create_adaptive_state(4), &[true; 30], &settings);
        assert_eq!(state.current_difficulty(), 6);
        assert_eq!(results.iter().filter(|r| r.changed).count(), 2);
        let tail = &results[results.len() - 5..];
        assert!(tail.iter().all(|r| !r.changed && r.new_difficulty == 6));
    }

    #[test]
    fn test_saturates_at_min() {
        let settings = settings();
        let (state, _) = feed(create_adaptive_state(2), &[false; 12], &settings);
        assert_eq!(state.current_difficulty(), 2);
    }

    #[test]
    fn test_stable_band_holds() {
        let settings = settings();
        // Windowed rate stays between 0.66 and 0.8
        let outcomes = [true, true, false, true, true, false, true, true, false, true];
        let (state, results) = feed(create_adaptive_state(4), &outcomes, &settings);
        assert!(results.iter().all(|r| !r.changed));
        assert_eq!(state.current_difficulty(), 4);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let settings = AdaptiveSettings::new(AdaptiveSettingsOverrides {
            current_array_size: Some(4),
            increase_threshold: Some(0.8),
            decrease_threshold: Some(0.4),
            target_success_rate: Some(0.6),
            ..Default::default()
        })
        .unwrap();
        // 4 of 5 = 0.8 exactly
        let (state, results) =
            feed(create_adaptive_state(4), &[true, true, false, true, true], &settings);
        assert!(results.last().unwrap().changed);
        assert_eq!(state.current_difficulty(), 5);

        // 2 of 5 = 0.4 exactly
        let (state, results) =
            feed(create_adaptive_state(4), &[true, false, false, true, false], &settings);
        assert!(results.last().unwrap().changed);
        assert_eq!(state.current_difficulty(), 3);
    }

    #[test]
    fn test_trial_records_difficulty_in_effect() {
        let settings = settings();
        let (state, _) = feed(create_adaptive_state(4), &[true; 6], &settings);
        let difficulties: Vec<Difficulty> =
            state.trial_history().iter().map(|t| t.difficulty).collect();
        assert_eq!(difficulties, vec![4, 4, 4, 4, 4, 5]);
    }

    #[test]
    fn test_input_state_is_not_mutated() {
        let settings = settings();
        let state = create_adaptive_state(4);
        let before = state.clone();
        let update = update_adaptive_state(&state, TrialInput::new(true, 500), &settings);
        assert_eq!(state, before);
        assert_eq!(update.state.total_trials(), 1);
    }

    #[test]
    fn test_decide_rules() {
        let settings = settings();
        assert_eq!(decide(0.9, 4, &settings), Adjustment::Increase);
        assert_eq!(decide(0.9, 6, &settings), Adjustment::Hold);
        assert_eq!(decide(0.5, 4, &settings), Adjustment::Decrease);
        assert_eq!(decide(0.5, 2, &settings), Adjustment::Hold);
        assert_eq!(decide(0.75, 4, &settings), Adjustment::Hold);
    }
}
