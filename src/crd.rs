// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for multi-tier music services.
//!
//! A [`MusicService`] declares an application tier (a `StatefulSet` of streaming
//! servers behind a Service, optionally autoscaled) and an optional relational
//! database tier realised either as one primary plus asynchronous replicas or as a
//! multi-primary HA cluster.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: music.mixcorp.org/v1
//! kind: MusicService
//! metadata:
//!   name: radio
//!   namespace: media
//! spec:
//!   replicas: 3
//!   image: mixcorp/streamer:2.4
//!   port: 8080
//!   storage:
//!     size: 5Gi
//!   streaming:
//!     bitrate: 320k
//!     maxConnections: 500
//!   database:
//!     enabled: true
//!     replicas: 2
//!     replication:
//!       gtid: true
//! ```

use crate::constants::MAX_DB_REPLICAS;
use crate::errors::ReconcileError;
use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a tier reacts when its declared volume size changes.
///
/// `Recreate` deletes the tier's `StatefulSet` **and its volume claims**; the data on
/// those volumes is lost. Only pick it for tiers whose data can be rebuilt.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum StorageUpdatePolicy {
    /// Expand bound claims in place. Shrinking is refused.
    #[default]
    Resize,
    /// Delete the workload and its claims, then rebuild at the new size.
    Recreate,
}

/// Volume settings for a tier.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Requested size as a Kubernetes quantity (e.g. "10Gi").
    pub size: String,

    /// What to do when `size` changes after the claims exist.
    #[serde(default)]
    pub update_policy: StorageUpdatePolicy,
}

/// Streaming parameters passed to the application container.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamingSpec {
    /// Target bitrate (e.g. "320k").
    pub bitrate: String,

    /// Maximum concurrent listener connections per pod.
    #[schemars(range(min = 1))]
    pub max_connections: i32,
}

/// Horizontal autoscaling bounds and targets.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalingSpec {
    #[schemars(range(min = 1))]
    pub min_replicas: i32,

    #[schemars(range(min = 1))]
    pub max_replicas: i32,

    /// Average CPU utilization target in percent.
    #[serde(rename = "targetCPUUtilizationPercentage")]
    #[schemars(range(min = 1, max = 100))]
    pub target_cpu_utilization_percentage: i32,

    /// Optional average memory utilization target in percent.
    #[serde(
        rename = "targetMemoryUtilizationPercentage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(range(min = 1, max = 100))]
    pub target_memory_utilization_percentage: Option<i32>,
}

/// Primary/replica replication settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseReplicationSpec {
    /// Attach replicas to the primary. Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Use GTID coordinates instead of binary log positions. Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gtid: Option<bool>,
}

/// Multi-primary cluster settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct HighAvailabilitySpec {
    /// Replace the primary/replica topology with a symmetric cluster of `replicas + 1` nodes.
    #[serde(default)]
    pub enabled: bool,
}

/// Optional relational database tier.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Replica count (primary/replica) or extra nodes beyond the first (HA).
    #[serde(default)]
    #[schemars(range(min = 0, max = 10))]
    pub replicas: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,

    /// Root password. A well-known default is used when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication: Option<DatabaseReplicationSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_availability: Option<HighAvailabilitySpec>,

    /// Autoscaling for the replica tier (primary/replica topology only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<AutoscalingSpec>,
}

/// `MusicService` declares a streaming application and its optional database.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "music.mixcorp.org",
    version = "v1",
    kind = "MusicService",
    namespaced,
    shortname = "ms",
    doc = "MusicService runs a streaming application as a StatefulSet with an optional \
           MariaDB tier (primary/replica or HA cluster).",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Ready","type":"integer","jsonPath":".status.readyReplicas"}"#,
    printcolumn = r#"{"name":"Desired","type":"integer","jsonPath":".status.desiredReplicas"}"#
)]
#[kube(status = "MusicServiceStatus")]
#[serde(rename_all = "camelCase")]
pub struct MusicServiceSpec {
    #[schemars(range(min = 0, max = 10000))]
    pub replicas: i32,

    #[schemars(length(min = 1))]
    pub image: String,

    /// Service port; traffic is forwarded to container port 80.
    #[schemars(range(min = 1, max = 65535))]
    pub port: i32,

    pub storage: StorageSpec,

    pub streaming: StreamingSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<AutoscalingSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseSpec>,
}

impl MusicServiceSpec {
    /// The database block, when present and enabled.
    #[must_use]
    pub fn enabled_database(&self) -> Option<&DatabaseSpec> {
        self.database.as_ref().filter(|db| db.enabled)
    }

    /// Whether the HA cluster topology is requested for an enabled database.
    #[must_use]
    pub fn high_availability_enabled(&self) -> bool {
        self.enabled_database()
            .and_then(|db| db.high_availability.as_ref())
            .is_some_and(|ha| ha.enabled)
    }

    /// Check invariants the schema cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] describing the first violation.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.image.trim().is_empty() {
            return Err(ReconcileError::Validation("spec.image must not be empty".into()));
        }
        if !(1..=65535).contains(&self.port) {
            return Err(ReconcileError::Validation(format!(
                "spec.port {} is outside 1-65535",
                self.port
            )));
        }
        if self.replicas < 0 {
            return Err(ReconcileError::Validation(format!(
                "spec.replicas {} must not be negative",
                self.replicas
            )));
        }
        if self.streaming.max_connections < 1 {
            return Err(ReconcileError::Validation(
                "spec.streaming.maxConnections must be at least 1".into(),
            ));
        }
        if let Some(autoscaling) = &self.autoscaling {
            autoscaling.validate("spec.autoscaling")?;
        }
        if let Some(db) = self.enabled_database() {
            if !(0..=MAX_DB_REPLICAS).contains(&db.replicas) {
                return Err(ReconcileError::Validation(format!(
                    "spec.database.replicas {} is outside 0-{MAX_DB_REPLICAS}",
                    db.replicas
                )));
            }
            if let Some(autoscaling) = &db.autoscaling {
                autoscaling.validate("spec.database.autoscaling")?;
            }
        }
        Ok(())
    }
}

impl AutoscalingSpec {
    fn validate(&self, path: &str) -> Result<(), ReconcileError> {
        if self.min_replicas < 1 {
            return Err(ReconcileError::Validation(format!(
                "{path}.minReplicas must be at least 1"
            )));
        }
        if self.min_replicas > self.max_replicas {
            return Err(ReconcileError::Validation(format!(
                "{path}.minReplicas ({}) must not exceed maxReplicas ({})",
                self.min_replicas, self.max_replicas
            )));
        }
        let in_range = |v: i32| (1..=100).contains(&v);
        if !in_range(self.target_cpu_utilization_percentage)
            || !self.target_memory_utilization_percentage.is_none_or(in_range)
        {
            return Err(ReconcileError::Validation(format!(
                "{path} utilization targets must be within 1-100"
            )));
        }
        Ok(())
    }
}

impl DatabaseSpec {
    /// Whether replicas attach to the primary (defaults to true).
    #[must_use]
    pub fn replication_enabled(&self) -> bool {
        self.replication
            .as_ref()
            .and_then(|r| r.enabled)
            .unwrap_or(true)
    }

    /// Whether replicas attach with GTID coordinates (defaults to true).
    #[must_use]
    pub fn gtid_enabled(&self) -> bool {
        self.replication.as_ref().and_then(|r| r.gtid).unwrap_or(true)
    }
}

/// Coarse lifecycle label of a `MusicService`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Progressing,
    Available,
    Degraded,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Progressing => "Progressing",
            Self::Available => "Available",
            Self::Degraded => "Degraded",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Standard Kubernetes condition.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, unique within a status.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Generation of the spec this condition was computed from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Observed state of the database tier.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default)]
    pub master_ready: bool,

    #[serde(default)]
    pub replicas_ready: i32,

    /// Set once the tracked workload has been observed. Cleared when no replica tier is
    /// declared or the tracked workload changes with the topology.
    #[serde(default)]
    pub replica_ever_created: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_last_seen: Option<String>,

    /// The replica tier was observed once and is now absent.
    #[serde(default)]
    pub replica_deletion_detected: bool,

    #[serde(default)]
    pub replication_ready: bool,

    /// `StatefulSet` whose history the flags above describe: the replica tier for
    /// primary/replica, the cluster for high availability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_workload: Option<String>,
}

/// `MusicService` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MusicServiceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default)]
    pub desired_replicas: i32,

    #[serde(default)]
    pub ready_replicas: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseStatus>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
