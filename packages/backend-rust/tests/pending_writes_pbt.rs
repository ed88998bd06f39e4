use std::sync::Arc;

use chrono::Utc;
use pecs_algo::AdaptiveSettings;
use pecs_backend::db::{ActivityRecord, PendingActivityBuffer, PendingWrite, SessionRecord};
use proptest::prelude::*;

mod common;

use common::FlakyStore;

fn activity(session_id: &str, sequence: u64) -> ActivityRecord {
    ActivityRecord {
        id: format!("{session_id}-{sequence}"),
        session_id: session_id.to_string(),
        sequence,
        success: sequence % 2 == 0,
        response_time_ms: 1000,
        difficulty: 2,
        difficulty_after: 2,
        difficulty_changed: false,
        recorded_at: Utc::now(),
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// However flushes interleave with outages, every activity lands exactly
    /// once and in the order it was queued.
    #[test]
    fn prop_flush_preserves_order_across_outages(
        batches in prop::collection::vec((1usize..6, any::<bool>()), 1..8)
    ) {
        let rt = runtime();
        let store = Arc::new(FlakyStore::new());
        let buffer = PendingActivityBuffer::new();

        buffer.push("s", PendingWrite::SessionStarted(SessionRecord {
            id: "s".to_string(),
            learner_id: "learner".to_string(),
            initial_difficulty: 2,
            settings: AdaptiveSettings::default(),
            started_at: Utc::now(),
        }));

        let mut sequence = 0u64;
        for (count, offline) in &batches {
            for _ in 0..*count {
                sequence += 1;
                buffer.push("s", PendingWrite::Activity(activity("s", sequence)));
            }
            store.set_offline(*offline);
            let outcome = rt.block_on(buffer.flush("s", store.as_ref()));
            if *offline {
                prop_assert_eq!(outcome.written, 0);
                prop_assert!(outcome.error.is_some());
            } else {
                prop_assert!(outcome.is_complete());
            }
        }

        store.set_offline(false);
        let outcome = rt.block_on(buffer.flush("s", store.as_ref()));
        prop_assert!(outcome.is_complete());
        prop_assert_eq!(buffer.pending_count("s"), 0);

        let written: Vec<u64> = store.inner.activities("s").iter().map(|a| a.sequence).collect();
        let expected: Vec<u64> = (1..=sequence).collect();
        prop_assert_eq!(written, expected);
    }
}
