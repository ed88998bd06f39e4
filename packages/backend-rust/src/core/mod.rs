mod event_bus;

pub use event_bus::{
    DifficultyChangedPayload, DifficultyOverriddenPayload, EventBus, EventBusStats,
    EventEnvelope, SessionEndedPayload, SessionEvent, SessionResetPayload,
    SessionStartedPayload, SubscriberId, TrialRecordedPayload,
};
