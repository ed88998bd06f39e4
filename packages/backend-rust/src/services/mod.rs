pub mod adaptive_session;

pub use adaptive_session::{
    AdaptiveSessionService, EndSessionOutcome, SessionError, SessionSnapshot, StartSessionRequest,
    TrialRecordResult,
};
