// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `context.rs`

#[cfg(test)]
mod tests {
    use crate::context::{Context, RequeueIntervals};
    use crate::engine::DatabaseEngine;
    use crate::events::RecordingEventPublisher;
    use crate::store::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_default_requeue_intervals() {
        let intervals = RequeueIntervals::default();
        assert_eq!(intervals.resync, Duration::from_secs(30));
        assert_eq!(intervals.not_ready, Duration::from_secs(5));
        assert_eq!(intervals.error, Duration::from_secs(30));
    }

    #[test]
    fn test_with_requeue_overrides_defaults() {
        let custom = RequeueIntervals {
            resync: Duration::from_secs(60),
            not_ready: Duration::from_secs(2),
            error: Duration::from_secs(10),
        };
        let ctx = Context::new(
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingEventPublisher::new()),
            DatabaseEngine::MySql,
        )
        .with_requeue(custom);
        assert_eq!(ctx.requeue, custom);
        assert_eq!(ctx.engine, DatabaseEngine::MySql);
    }
}
