//! Learner Simulation
//!
//! Replays a settings profile against synthetic learners before it is used
//! with real ones. Each learner's success probability drops by a fixed step
//! per extra choice on screen; response times jitter around a mean.
//!
//! Runs are deterministic for a given seed (ChaCha8). Cohorts run in parallel
//! with learner `i` seeded as `base_seed + i`.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::controller::update_adaptive_state;
use crate::settings::AdaptiveSettings;
use crate::state::create_adaptive_state;
use crate::types::{Difficulty, TrialInput};

/// Lower bound on any simulated success probability
const MIN_SUCCESS_PROBABILITY: f64 = 0.02;

/// Response times jitter within +/- this fraction of the mean
const RESPONSE_JITTER: f64 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedLearner {
    /// Success probability at `min_array_size`
    pub base_success: f64,
    /// Probability lost per choice above `min_array_size`
    pub drop_per_choice: f64,
    pub mean_response_time_ms: u64,
}

impl SimulatedLearner {
    pub fn new(base_success: f64, drop_per_choice: f64, mean_response_time_ms: u64) -> Self {
        Self {
            base_success,
            drop_per_choice,
            mean_response_time_ms,
        }
    }

    pub fn success_probability(&self, difficulty: Difficulty, settings: &AdaptiveSettings) -> f64 {
        let extra = difficulty.saturating_sub(settings.min_array_size) as f64;
        (self.base_success - self.drop_per_choice * extra).clamp(MIN_SUCCESS_PROBABILITY, 1.0)
    }

    fn response_time(&self, rng: &mut ChaCha8Rng) -> u64 {
        let mean = self.mean_response_time_ms as f64;
        if mean <= 0.0 {
            return 0;
        }
        let jitter = rng.gen_range(-RESPONSE_JITTER..=RESPONSE_JITTER);
        (mean * (1.0 + jitter)).round().max(0.0) as u64
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub final_difficulty: Difficulty,
    /// Difficulty in effect for each trial, in order
    pub difficulty_trace: Vec<Difficulty>,
    pub adjustments: u32,
    pub overall_success_rate: f64,
}

impl SimulationReport {
    /// Mean difficulty over the last `tail` trials
    pub fn settled_difficulty(&self, tail: usize) -> f64 {
        let skip = self.difficulty_trace.len().saturating_sub(tail);
        let settled: Vec<Difficulty> = self.difficulty_trace.iter().skip(skip).copied().collect();
        if settled.is_empty() {
            return self.final_difficulty as f64;
        }
        settled.iter().map(|&d| d as f64).sum::<f64>() / settled.len() as f64
    }
}

pub fn simulate_session(
    settings: &AdaptiveSettings,
    learner: &SimulatedLearner,
    trials: usize,
    seed: u64,
) -> SimulationReport {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut state = create_adaptive_state(settings.initial_difficulty(None));
    let mut trace = Vec::with_capacity(trials);
    let mut adjustments = 0u32;
    let mut successes = 0usize;

    for _ in 0..trials {
        let difficulty = state.current_difficulty();
        trace.push(difficulty);

        let success = rng.gen::<f64>() < learner.success_probability(difficulty, settings);
        let response_time_ms = learner.response_time(&mut rng);
        if success {
            successes += 1;
        }

        let update = update_adaptive_state(
            &state,
            TrialInput::new(success, response_time_ms),
            settings,
        );
        if update.result.changed {
            adjustments += 1;
        }
        state = update.state;
    }

    SimulationReport {
        final_difficulty: state.current_difficulty(),
        difficulty_trace: trace,
        adjustments,
        overall_success_rate: if trials == 0 {
            0.0
        } else {
            successes as f64 / trials as f64
        },
    }
}

pub fn simulate_cohort(
    settings: &AdaptiveSettings,
    learners: &[SimulatedLearner],
    trials: usize,
    base_seed: u64,
) -> Vec<SimulationReport> {
    learners
        .par_iter()
        .enumerate()
        .map(|(i, learner)| {
            simulate_session(settings, learner, trials, base_seed.wrapping_add(i as u64))
        })
        .collect()
}
