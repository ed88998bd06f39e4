//! Common Types and Constants
//!
//! Shared data structures used across the engine modules.

use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Tolerance for threshold and margin comparisons
pub const EPSILON: f64 = 1e-9;

/// Rate difference between window halves treated as a real trend
pub const DEFAULT_TREND_MARGIN: f64 = 0.1;

pub const DEFAULT_MIN_ARRAY_SIZE: Difficulty = 2;
pub const DEFAULT_MAX_ARRAY_SIZE: Difficulty = 6;
pub const DEFAULT_CURRENT_ARRAY_SIZE: Difficulty = 2;
pub const DEFAULT_TARGET_SUCCESS_RATE: f64 = 0.75;
pub const DEFAULT_WINDOW_SIZE: usize = 10;
pub const DEFAULT_INCREASE_THRESHOLD: f64 = 0.85;
pub const DEFAULT_DECREASE_THRESHOLD: f64 = 0.65;
pub const DEFAULT_MIN_TRIALS_BEFORE_ADJUST: usize = 5;

/// Number of simultaneous choices shown to the learner
pub type Difficulty = u32;

// ==================== Trial Types ====================

/// Outcome reported by the presentation layer for one trial
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialInput {
    pub success: bool,
    pub response_time_ms: u64,
}

impl TrialInput {
    pub fn new(success: bool, response_time_ms: u64) -> Self {
        Self {
            success,
            response_time_ms,
        }
    }
}

/// Recorded trial, immutable once appended to a state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trial {
    pub success: bool,
    pub response_time_ms: u64,
    /// Difficulty in effect when the trial occurred
    pub difficulty: Difficulty,
}

// ==================== Decision Types ====================

/// Result of one controller update
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyChangeResult {
    pub changed: bool,
    pub new_difficulty: Difficulty,
    /// Empty when nothing changed
    pub message: String,
}

impl DifficultyChangeResult {
    pub fn unchanged(difficulty: Difficulty) -> Self {
        Self {
            changed: false,
            new_difficulty: difficulty,
            message: String::new(),
        }
    }

    pub fn changed(difficulty: Difficulty, message: impl Into<String>) -> Self {
        Self {
            changed: true,
            new_difficulty: difficulty,
            message: message.into(),
        }
    }
}

// ==================== Summary Types ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "improving" => Trend::Improving,
            "declining" => Trend::Declining,
            _ => Trend::Stable,
        }
    }
}

/// Windowed success rate and trend, recomputed on demand
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub success_rate: f64,
    pub trend: Trend,
}

impl Default for PerformanceSummary {
    fn default() -> Self {
        Self {
            success_rate: 0.0,
            trend: Trend::Stable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_round_trip_through_str() {
        for trend in [Trend::Improving, Trend::Declining, Trend::Stable] {
            assert_eq!(Trend::parse(trend.as_str()), trend);
        }
        assert_eq!(Trend::parse("sideways"), Trend::Stable);
    }

    #[test]
    fn test_change_result_serializes_camel_case() {
        let result = DifficultyChangeResult::changed(4, "harder");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["newDifficulty"], 4);
        assert_eq!(json["changed"], true);
    }
}
