// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator command line.
//!
//! Every flag can also be set through the environment variable named in its help text.

use crate::constants::{
    DEFAULT_DEBOUNCE_MILLIS, DEFAULT_WORKER_COUNT, ERROR_REQUEUE_DURATION_SECS,
    METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PORT, NOT_READY_RESYNC_INTERVAL_SECS,
    RESYNC_INTERVAL_SECS,
};
use crate::context::RequeueIntervals;
use crate::engine::DatabaseEngine;
use clap::Parser;
use std::time::Duration;

/// Kubernetes operator for `MusicService` resources.
#[derive(Clone, Debug, Parser)]
#[command(name = "music-operator", version, about)]
pub struct Args {
    /// Namespace to watch; all namespaces when unset
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Concurrent reconcile workers
    #[arg(long, env = "WORKER_COUNT", default_value_t = DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    /// Resync interval once the application tier is ready, in seconds
    #[arg(long, env = "RESYNC_INTERVAL_SECS", default_value_t = RESYNC_INTERVAL_SECS)]
    pub resync_secs: u64,

    /// Resync interval while the application tier is not ready, in seconds
    #[arg(
        long,
        env = "NOT_READY_RESYNC_INTERVAL_SECS",
        default_value_t = NOT_READY_RESYNC_INTERVAL_SECS
    )]
    pub not_ready_resync_secs: u64,

    /// Retry delay after a transient failure, in seconds
    #[arg(long, env = "ERROR_REQUEUE_SECS", default_value_t = ERROR_REQUEUE_DURATION_SECS)]
    pub error_requeue_secs: u64,

    /// Window in which watch events for one parent are coalesced, in milliseconds
    #[arg(long, env = "DEBOUNCE_MILLIS", default_value_t = DEFAULT_DEBOUNCE_MILLIS)]
    pub debounce_millis: u64,

    /// Address the metrics server binds to
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    pub metrics_bind_address: String,

    /// Port the metrics server listens on
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,

    /// Database engine used for every database tier
    #[arg(long, env = "DATABASE_ENGINE", value_enum, default_value_t = DatabaseEngine::MariaDb)]
    pub database_engine: DatabaseEngine,
}

impl Args {
    #[must_use]
    pub fn requeue_intervals(&self) -> RequeueIntervals {
        RequeueIntervals {
            resync: Duration::from_secs(self.resync_secs),
            not_ready: Duration::from_secs(self.not_ready_resync_secs),
            error: Duration::from_secs(self.error_requeue_secs),
        }
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_millis)
    }

    #[must_use]
    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.metrics_bind_address, self.metrics_port)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
