// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Music Operator - Multi-tier streaming services for Kubernetes
//!
//! The operator manages `MusicService` resources: a stateful streaming application tier
//! plus an optional `MariaDB`/`MySQL` tier, deployed either as one primary with
//! asynchronous replicas or as a multi-primary Galera cluster.
//!
//! ## Modules
//!
//! - [`crd`] - The `MusicService` resource and its status document
//! - [`builder`] - Pure mapping from a spec to every desired child object
//! - [`reconcilers`] - Convergence of live objects, storage policy, credentials, status
//! - [`store`] - Live object access (Kubernetes API or in-memory)
//! - [`scheduler`] - Per-key work queue and worker pool
//! - [`engine`] / [`topology`] - Database engine strategy and topology selection
//! - [`metrics`] / [`events`] / [`health`] - Observability
//!
//! ## Example
//!
//! ```rust,no_run
//! use music_operator::builder::build_desired_state;
//! use music_operator::crd::{
//!     MusicService, MusicServiceSpec, StorageSpec, StorageUpdatePolicy, StreamingSpec,
//! };
//! use music_operator::engine::DatabaseEngine;
//!
//! let spec = MusicServiceSpec {
//!     replicas: 3,
//!     image: "mixcorp/streamer:1.0".to_string(),
//!     port: 8080,
//!     storage: StorageSpec {
//!         size: "1Gi".to_string(),
//!         update_policy: StorageUpdatePolicy::Resize,
//!     },
//!     streaming: StreamingSpec {
//!         bitrate: "320k".to_string(),
//!         max_connections: 500,
//!     },
//!     resources: None,
//!     autoscaling: None,
//!     database: None,
//! };
//! let mut ms = MusicService::new("radio", spec);
//! ms.metadata.namespace = Some("media".to_string());
//! let desired = build_desired_state(&ms, DatabaseEngine::MariaDb).unwrap();
//! assert_eq!(desired.app.workload.name(), "radio");
//! ```

pub mod builder;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod engine;
pub mod errors;
pub mod events;
pub mod health;
pub mod labels;
pub mod metrics;
pub mod quantity;
pub mod reconcilers;
pub mod scheduler;
pub mod status_reasons;
pub mod store;
pub mod topology;

#[cfg(test)]
mod test_fixtures;
