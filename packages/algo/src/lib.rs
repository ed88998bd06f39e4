//! # pecs-algo - Adaptive difficulty engine for PECS sessions
//!
//! Pure Rust, no I/O. Everything here runs synchronously on the caller's
//! thread and completes before returning.
//!
//! - **Controller** - sliding-window hysteresis over the number of choices
//! - **Summary** - windowed success rate and half-window trend
//! - **Session** - single-owner adapter with a difficulty-change listener
//! - **Simulation** - seeded synthetic learners for checking a settings profile
//!
//! ## Module layout
//!
//! - [`settings`] - validated configuration and partial overrides
//! - [`state`] - bounded trial window plus lifetime trial counter
//! - [`controller`] - `update_adaptive_state` and the threshold rule
//! - [`summary`] - performance summary, trend, end-of-session report
//! - [`session`] - `AdaptiveSession` adapter
//! - [`simulation`] - learner simulation (rayon for cohorts)
//! - [`sanitize`] - clamping and tolerant comparisons
//! - [`types`] - shared types and constants
//!
//! ## Example
//!
//! ```rust
//! use pecs_algo::{AdaptiveSession, AdaptiveSettings};
//!
//! let mut session = AdaptiveSession::new(AdaptiveSettings::default(), Some(3))?;
//! for _ in 0..5 {
//!     session.record_trial(true, 1200);
//! }
//! assert_eq!(session.current_difficulty(), 4);
//! # Ok::<(), pecs_algo::SettingsError>(())
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod controller;
pub mod sanitize;
pub mod session;
pub mod settings;
pub mod simulation;
pub mod state;
pub mod summary;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use controller::{decide, update_adaptive_state, AdaptiveUpdate, Adjustment};

pub use session::{AdaptiveSession, DifficultyListener, TrialOutcome};

pub use settings::{AdaptiveSettings, AdaptiveSettingsOverrides, SettingsError};

pub use simulation::{simulate_cohort, simulate_session, SimulatedLearner, SimulationReport};

pub use state::{create_adaptive_state, AdaptiveState};

pub use summary::{
    build_session_report, classify_trend, get_performance_summary,
    get_performance_summary_with_margin, SessionReport,
};
