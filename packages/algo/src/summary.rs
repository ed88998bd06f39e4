//! Performance Summary and Trend Detection
//!
//! Pure, recomputable views over an [`AdaptiveState`]. Nothing here mutates
//! state, so two calls without an intervening update agree exactly.

use serde::{Deserialize, Serialize};

use crate::sanitize::{reaches, success_rate};
use crate::settings::AdaptiveSettings;
use crate::state::AdaptiveState;
use crate::types::{Difficulty, PerformanceSummary, Trend, Trial, DEFAULT_TREND_MARGIN};

/// Summary over the most recent `window_size` trials.
///
/// The state only retains the settings' `windowSize` trials, so a larger
/// `window_size` here sees at most that many even when `totalTrials` is
/// higher.
pub fn get_performance_summary(state: &AdaptiveState, window_size: usize) -> PerformanceSummary {
    get_performance_summary_with_margin(state, window_size, DEFAULT_TREND_MARGIN)
}

pub fn get_performance_summary_with_margin(
    state: &AdaptiveState,
    window_size: usize,
    margin: f64,
) -> PerformanceSummary {
    let window: Vec<&Trial> = state.recent(window_size).collect();
    if window.is_empty() {
        return PerformanceSummary::default();
    }

    PerformanceSummary {
        success_rate: success_rate(window.iter().copied()),
        trend: classify_trend(&window, margin),
    }
}

/// Compare the older half of the window with the newer half.
///
/// With an odd count the extra trial goes to the older half.
pub fn classify_trend(window: &[&Trial], margin: f64) -> Trend {
    if window.len() < 2 {
        return Trend::Stable;
    }

    let split = window.len().div_ceil(2);
    let (older, newer) = window.split_at(split);
    let older_rate = success_rate(older.iter().copied());
    let newer_rate = success_rate(newer.iter().copied());

    if reaches(newer_rate - older_rate, margin) {
        Trend::Improving
    } else if reaches(older_rate - newer_rate, margin) {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// End-of-session digest handed to persistence and the presentation layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub total_trials: u64,
    pub final_difficulty: Difficulty,
    pub success_rate: f64,
    pub trend: Trend,
    /// Mean over the retained window; `None` when no trials were recorded
    pub mean_response_time_ms: Option<f64>,
    pub recommendation: String,
}

pub fn build_session_report(state: &AdaptiveState, settings: &AdaptiveSettings) -> SessionReport {
    let summary =
        get_performance_summary_with_margin(state, settings.window_size, settings.trend_margin);

    let window: Vec<&Trial> = state.recent(settings.window_size).collect();
    let mean_response_time_ms = if window.is_empty() {
        None
    } else {
        let total: u64 = window.iter().map(|t| t.response_time_ms).sum();
        Some(total as f64 / window.len() as f64)
    };

    SessionReport {
        total_trials: state.total_trials(),
        final_difficulty: state.current_difficulty(),
        success_rate: summary.success_rate,
        trend: summary.trend,
        mean_response_time_ms,
        recommendation: recommendation(&summary, state, settings),
    }
}

/// Short guidance text for the therapist view
pub fn recommendation(
    summary: &PerformanceSummary,
    state: &AdaptiveState,
    settings: &AdaptiveSettings,
) -> String {
    if state.total_trials() == 0 {
        return "No trials recorded yet.".to_string();
    }

    let difficulty = state.current_difficulty();
    let at_max = difficulty >= settings.max_array_size;
    let at_min = difficulty <= settings.min_array_size;

    match summary.trend {
        Trend::Improving if at_max => {
            "Mastering the largest array; consider introducing new pictures.".to_string()
        }
        Trend::Improving => format!("Improving at {difficulty} choices; keep going."),
        Trend::Declining if at_min => {
            "Struggling at the smallest array; consider a break or extra prompting.".to_string()
        }
        Trend::Declining => {
            format!("Success is dropping at {difficulty} choices; watch for fatigue.")
        }
        Trend::Stable if summary.success_rate >= settings.target_success_rate => {
            format!("Steady at {difficulty} choices and on target.")
        }
        Trend::Stable => format!("Steady at {difficulty} choices, below the target rate."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::update_adaptive_state;
    use crate::state::create_adaptive_state;
    use crate::types::TrialInput;

    /// Settings that never adjust within 10 trials, so the summary sees raw history
    fn frozen_settings() -> AdaptiveSettings {
        AdaptiveSettings {
            min_array_size: 3,
            max_array_size: 3,
            current_array_size: 3,
            ..AdaptiveSettings::default()
        }
    }

    fn state_from(outcomes: &[bool]) -> AdaptiveState {
        let settings = frozen_settings();
        outcomes.iter().fold(create_adaptive_state(3), |state, &success| {
            update_adaptive_state(&state, TrialInput::new(success, 1000), &settings).state
        })
    }

    #[test]
    fn test_empty_state_summary() {
        let summary = get_performance_summary(&create_adaptive_state(2), 10);
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.trend, Trend::Stable);
    }

    #[test]
    fn test_single_trial_is_stable() {
        let summary = get_performance_summary(&state_from(&[true]), 10);
        assert_eq!(summary.success_rate, 1.0);
        assert_eq!(summary.trend, Trend::Stable);
    }

    #[test]
    fn test_improving_trend() {
        let mut outcomes = vec![false; 5];
        outcomes.extend([true; 5]);
        let summary = get_performance_summary(&state_from(&outcomes), 10);
        assert_eq!(summary.trend, Trend::Improving);
        assert!((summary.success_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_declining_trend() {
        let mut outcomes = vec![true; 5];
        outcomes.extend([false; 5]);
        let summary = get_performance_summary(&state_from(&outcomes), 10);
        assert_eq!(summary.trend, Trend::Declining);
    }

    #[test]
    fn test_alternating_is_stable() {
        let outcomes: Vec<bool> = (0..10).map(|i| i % 2 == 0).collect();
        let summary = get_performance_summary(&state_from(&outcomes), 10);
        assert_eq!(summary.trend, Trend::Stable);
    }

    #[test]
    fn test_wider_window_sees_only_retained_trials() {
        // 5 failures scroll out of the 10-trial window before the summary runs
        let mut outcomes = vec![false; 5];
        outcomes.extend([true; 10]);
        let state = state_from(&outcomes);
        assert_eq!(state.total_trials(), 15);

        let summary = get_performance_summary(&state, 50);
        assert_eq!(summary.success_rate, 1.0);
        assert_eq!(summary.trend, Trend::Stable);
    }

    #[test]
    fn test_odd_window_extra_trial_is_older() {
        // older = [F, F, T], newer = [T, T]: 0.33 -> 1.0
        let window = get_performance_summary(&state_from(&[false, false, true, true, true]), 5);
        assert_eq!(window.trend, Trend::Improving);

        // older = [T, T, F], newer = [T, F]: 0.67 -> 0.5
        let window = get_performance_summary(&state_from(&[true, true, false, true, false]), 5);
        assert_eq!(window.trend, Trend::Declining);
    }

    #[test]
    fn test_margin_boundary_counts_as_significant() {
        // Ten trials: older half 3/5 = 0.6, newer half 2/5 = 0.4 -> 0.2 gap
        let outcomes = [true, true, true, false, false, true, true, false, false, false];
        let summary = get_performance_summary_with_margin(&state_from(&outcomes), 10, 0.2);
        assert_eq!(summary.trend, Trend::Declining);

        let summary = get_performance_summary_with_margin(&state_from(&outcomes), 10, 0.25);
        assert_eq!(summary.trend, Trend::Stable);
    }

    #[test]
    fn test_summary_window_uses_most_recent() {
        let mut outcomes = vec![false; 6];
        outcomes.extend([true; 4]);
        let summary = get_performance_summary(&state_from(&outcomes), 4);
        assert_eq!(summary.success_rate, 1.0);
        assert_eq!(summary.trend, Trend::Stable);
    }

    #[test]
    fn test_summary_is_idempotent() {
        let state = state_from(&[true, false, true, true, false, true]);
        let first = get_performance_summary(&state, 10);
        let second = get_performance_summary(&state, 10);
        assert_eq!(first, second);
    }

    #[test]
    fn test_session_report() {
        let settings = frozen_settings();
        let state = state_from(&[true, true, false, true]);
        let report = build_session_report(&state, &settings);
        assert_eq!(report.total_trials, 4);
        assert_eq!(report.final_difficulty, 3);
        assert_eq!(report.mean_response_time_ms, Some(1000.0));
        assert!(!report.recommendation.is_empty());

        let empty = build_session_report(&create_adaptive_state(3), &settings);
        assert_eq!(empty.mean_response_time_ms, None);
        assert_eq!(empty.recommendation, "No trials recorded yet.");
    }
}
