//! Adaptive Settings
//!
//! Immutable controller configuration. The constructors and deserialization
//! both run [`AdaptiveSettings::validate`], and [`crate::AdaptiveSession::new`]
//! validates again, so a session never runs on an invalid profile.

use serde::{Deserialize, Serialize};

use crate::sanitize::{clamp_difficulty, is_probability};
use crate::types::*;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("minArraySize must be at least 1")]
    ZeroMinArraySize,
    #[error("maxArraySize ({max}) must be >= minArraySize ({min})")]
    InvertedBounds { min: Difficulty, max: Difficulty },
    #[error("currentArraySize ({current}) must be within [{min}, {max}]")]
    InitialOutOfBounds {
        current: Difficulty,
        min: Difficulty,
        max: Difficulty,
    },
    #[error("{field} must be a probability in [0, 1], got {value}")]
    NotAProbability { field: &'static str, value: f64 },
    #[error(
        "thresholds must satisfy decreaseThreshold ({decrease}) < targetSuccessRate ({target}) < increaseThreshold ({increase})"
    )]
    ThresholdOrder {
        decrease: f64,
        target: f64,
        increase: f64,
    },
    #[error("windowSize must be at least 1")]
    ZeroWindow,
    #[error("minTrialsBeforeAdjust must be at least 1")]
    ZeroMinTrials,
    #[error("minTrialsBeforeAdjust ({min_trials}) exceeds windowSize ({window}); the controller could never adjust")]
    MinTrialsExceedsWindow { min_trials: usize, window: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawAdaptiveSettings")]
pub struct AdaptiveSettings {
    pub min_array_size: Difficulty,
    pub max_array_size: Difficulty,
    /// Starting difficulty when a session does not name one
    pub current_array_size: Difficulty,
    pub target_success_rate: f64,
    pub window_size: usize,
    pub increase_threshold: f64,
    pub decrease_threshold: f64,
    pub min_trials_before_adjust: usize,
    pub trend_margin: f64,
}

/// Wire shape before validation
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAdaptiveSettings {
    min_array_size: Difficulty,
    max_array_size: Difficulty,
    current_array_size: Difficulty,
    target_success_rate: f64,
    window_size: usize,
    increase_threshold: f64,
    decrease_threshold: f64,
    min_trials_before_adjust: usize,
    trend_margin: f64,
}

impl TryFrom<RawAdaptiveSettings> for AdaptiveSettings {
    type Error = SettingsError;

    fn try_from(raw: RawAdaptiveSettings) -> Result<Self, Self::Error> {
        let settings = Self {
            min_array_size: raw.min_array_size,
            max_array_size: raw.max_array_size,
            current_array_size: raw.current_array_size,
            target_success_rate: raw.target_success_rate,
            window_size: raw.window_size,
            increase_threshold: raw.increase_threshold,
            decrease_threshold: raw.decrease_threshold,
            min_trials_before_adjust: raw.min_trials_before_adjust,
            trend_margin: raw.trend_margin,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            min_array_size: DEFAULT_MIN_ARRAY_SIZE,
            max_array_size: DEFAULT_MAX_ARRAY_SIZE,
            current_array_size: DEFAULT_CURRENT_ARRAY_SIZE,
            target_success_rate: DEFAULT_TARGET_SUCCESS_RATE,
            window_size: DEFAULT_WINDOW_SIZE,
            increase_threshold: DEFAULT_INCREASE_THRESHOLD,
            decrease_threshold: DEFAULT_DECREASE_THRESHOLD,
            min_trials_before_adjust: DEFAULT_MIN_TRIALS_BEFORE_ADJUST,
            trend_margin: DEFAULT_TREND_MARGIN,
        }
    }
}

/// Partial settings; unset fields keep the base value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdaptiveSettingsOverrides {
    pub min_array_size: Option<Difficulty>,
    pub max_array_size: Option<Difficulty>,
    pub current_array_size: Option<Difficulty>,
    pub target_success_rate: Option<f64>,
    pub window_size: Option<usize>,
    pub increase_threshold: Option<f64>,
    pub decrease_threshold: Option<f64>,
    pub min_trials_before_adjust: Option<usize>,
    pub trend_margin: Option<f64>,
}

impl AdaptiveSettingsOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl AdaptiveSettings {
    /// Validated defaults with `overrides` applied
    pub fn new(overrides: AdaptiveSettingsOverrides) -> Result<Self, SettingsError> {
        Self::default().with_overrides(overrides)
    }

    pub fn with_overrides(&self, overrides: AdaptiveSettingsOverrides) -> Result<Self, SettingsError> {
        let merged = Self {
            min_array_size: overrides.min_array_size.unwrap_or(self.min_array_size),
            max_array_size: overrides.max_array_size.unwrap_or(self.max_array_size),
            current_array_size: overrides
                .current_array_size
                .unwrap_or(self.current_array_size),
            target_success_rate: overrides
                .target_success_rate
                .unwrap_or(self.target_success_rate),
            window_size: overrides.window_size.unwrap_or(self.window_size),
            increase_threshold: overrides
                .increase_threshold
                .unwrap_or(self.increase_threshold),
            decrease_threshold: overrides
                .decrease_threshold
                .unwrap_or(self.decrease_threshold),
            min_trials_before_adjust: overrides
                .min_trials_before_adjust
                .unwrap_or(self.min_trials_before_adjust),
            trend_margin: overrides.trend_margin.unwrap_or(self.trend_margin),
        };
        merged.validate()?;
        Ok(merged)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.min_array_size == 0 {
            return Err(SettingsError::ZeroMinArraySize);
        }
        if self.max_array_size < self.min_array_size {
            return Err(SettingsError::InvertedBounds {
                min: self.min_array_size,
                max: self.max_array_size,
            });
        }
        if !(self.min_array_size..=self.max_array_size).contains(&self.current_array_size) {
            return Err(SettingsError::InitialOutOfBounds {
                current: self.current_array_size,
                min: self.min_array_size,
                max: self.max_array_size,
            });
        }

        for (field, value) in [
            ("targetSuccessRate", self.target_success_rate),
            ("increaseThreshold", self.increase_threshold),
            ("decreaseThreshold", self.decrease_threshold),
            ("trendMargin", self.trend_margin),
        ] {
            if !is_probability(value) {
                return Err(SettingsError::NotAProbability { field, value });
            }
        }

        if !(self.decrease_threshold < self.target_success_rate
            && self.target_success_rate < self.increase_threshold)
        {
            return Err(SettingsError::ThresholdOrder {
                decrease: self.decrease_threshold,
                target: self.target_success_rate,
                increase: self.increase_threshold,
            });
        }

        if self.window_size == 0 {
            return Err(SettingsError::ZeroWindow);
        }
        if self.min_trials_before_adjust == 0 {
            return Err(SettingsError::ZeroMinTrials);
        }
        if self.min_trials_before_adjust > self.window_size {
            return Err(SettingsError::MinTrialsExceedsWindow {
                min_trials: self.min_trials_before_adjust,
                window: self.window_size,
            });
        }

        Ok(())
    }

    /// Clamp an administrative or caller-supplied difficulty into bounds
    pub fn clamp(&self, difficulty: Difficulty) -> Difficulty {
        clamp_difficulty(difficulty, self.min_array_size, self.max_array_size)
    }

    /// Requested initial difficulty, or the configured default, clamped
    pub fn initial_difficulty(&self, requested: Option<Difficulty>) -> Difficulty {
        self.clamp(requested.unwrap_or(self.current_array_size))
    }
}
