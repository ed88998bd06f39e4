//! Data Sanitization
//!
//! Numerical helpers shared by the settings validator and the controller.
//!
//! Functions:
//! - Probability validation
//! - Difficulty clamping
//! - Tolerant threshold comparisons
//! - Success-rate computation

use crate::types::{Difficulty, Trial, EPSILON};

/// Finite and inside [0, 1]
pub fn is_probability(x: f64) -> bool {
    x.is_finite() && (0.0..=1.0).contains(&x)
}

/// Clamp a requested difficulty into `[min, max]`
pub fn clamp_difficulty(value: Difficulty, min: Difficulty, max: Difficulty) -> Difficulty {
    value.max(min).min(max)
}

/// `value >= threshold`, treating float noise as equality
pub fn reaches(value: f64, threshold: f64) -> bool {
    value >= threshold - EPSILON
}

/// `value <= threshold`, treating float noise as equality
pub fn at_most(value: f64, threshold: f64) -> bool {
    value <= threshold + EPSILON
}

/// Successes divided by count; 0 for an empty slice of trials
pub fn success_rate<'a, I>(trials: I) -> f64
where
    I: IntoIterator<Item = &'a Trial>,
{
    let (successes, total) = trials
        .into_iter()
        .fold((0usize, 0usize), |(ok, n), trial| {
            (ok + usize::from(trial.success), n + 1)
        });

    if total == 0 {
        return 0.0;
    }
    successes as f64 / total as f64
}
