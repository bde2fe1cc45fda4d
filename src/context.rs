// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the `MusicService` controller.
//!
//! Every reconcile pass receives an `Arc<Context>` that contains:
//! - the state store used for all reads and writes of live objects
//! - the event publisher
//! - the database engine strategy picked at start-up
//! - requeue intervals

use crate::constants::{
    ERROR_REQUEUE_DURATION_SECS, NOT_READY_RESYNC_INTERVAL_SECS, RESYNC_INTERVAL_SECS,
};
use crate::engine::DatabaseEngine;
use crate::events::EventPublisher;
use crate::store::StateStore;
use std::sync::Arc;
use std::time::Duration;

/// Requeue intervals handed back to the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequeueIntervals {
    /// Baseline resync once the application tier is ready
    pub resync: Duration,
    /// Resync while the application tier is still converging
    pub not_ready: Duration,
    /// Retry after a transient failure
    pub error: Duration,
}

impl Default for RequeueIntervals {
    fn default() -> Self {
        Self {
            resync: Duration::from_secs(RESYNC_INTERVAL_SECS),
            not_ready: Duration::from_secs(NOT_READY_RESYNC_INTERVAL_SECS),
            error: Duration::from_secs(ERROR_REQUEUE_DURATION_SECS),
        }
    }
}

/// Shared context passed to every reconcile pass.
#[derive(Clone)]
pub struct Context {
    /// Live object access
    pub store: Arc<dyn StateStore>,

    /// Kubernetes Events sink
    pub events: Arc<dyn EventPublisher>,

    /// Database engine strategy
    pub engine: DatabaseEngine,

    pub requeue: RequeueIntervals,
}

impl Context {
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        events: Arc<dyn EventPublisher>,
        engine: DatabaseEngine,
    ) -> Self {
        Self {
            store,
            events,
            engine,
            requeue: RequeueIntervals::default(),
        }
    }

    #[must_use]
    pub fn with_requeue(mut self, requeue: RequeueIntervals) -> Self {
        self.requeue = requeue;
        self
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
