// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status aggregation for `MusicService` resources.
//!
//! The status is recomputed from observed state on every pass and collected in a
//! [`MusicServiceStatusUpdater`], which writes it back in a single call and only when
//! something other than a timestamp changed. Timestamps (`lastReconcileTime`,
//! `replicaLastSeen`) are stamped at write time, so a converged pass performs no write.
//!
//! # Condition Format
//!
//! - `type`: the aspect being reported (e.g. "Available", "Reconciled")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: a programmatic identifier (CamelCase)
//! - `message`: a human-readable explanation
//! - `observedGeneration`: the spec generation the condition was computed from
//! - `lastTransitionTime`: RFC3339 timestamp, changed only when `status` changes

use super::storage::StorageHealth;
use crate::builder::StorageTier;
use crate::crd::{Condition, DatabaseStatus, MusicService, MusicServiceStatus, Phase};
use crate::errors::StoreError;
use crate::status_reasons::{
    CONDITION_FALSE, CONDITION_TRUE, CONDITION_TYPE_APP_STORAGE, CONDITION_TYPE_AVAILABLE,
    CONDITION_TYPE_DATABASE_STORAGE, CONDITION_TYPE_RECONCILED, CONDITION_TYPE_REPLICA_HISTORY,
    DB_PHASE_PENDING, DB_PHASE_PROGRESSING, DB_PHASE_READY, REASON_CLAIMS_NOT_BOUND,
    REASON_PODS_NOT_READY, REASON_PODS_PROGRESSING, REASON_PODS_READY, REASON_REPLICA_DELETED,
    REASON_REPLICA_OBSERVED, REASON_SHRINK_NOT_SUPPORTED, REASON_STORAGE_HEALTHY,
};
use crate::store::StateStore;
use chrono::Utc;
use kube::ResourceExt;
use tracing::debug;

/// Create a new condition with the current timestamp.
///
/// # Example
///
/// ```rust,no_run
/// # use music_operator::reconcilers::status::create_condition;
/// let condition =
///     create_condition("Available", "True", "PodsReady", "All replicas are ready", Some(3));
/// assert_eq!(condition.r#type, "Available");
/// assert_eq!(condition.status, "True");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        observed_generation,
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in place (no API call).
///
/// The `lastTransitionTime` of an existing condition is kept unless `status` changes;
/// reason or message changes alone never move it. New conditions are appended, so the
/// list keeps first-insert order.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        if existing.status != status || existing.last_transition_time.is_none() {
            existing.last_transition_time = Some(Utc::now().to_rfc3339());
        }
        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.observed_generation = observed_generation;
    } else {
        conditions.push(create_condition(
            condition_type,
            status,
            reason,
            message,
            observed_generation,
        ));
    }
}

/// Compare two condition lists ignoring `lastTransitionTime`.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    current.len() == new.len()
        && new.iter().all(|new_cond| {
            find_condition(current, &new_cond.r#type).is_some_and(|curr| {
                curr.status == new_cond.status
                    && curr.reason == new_cond.reason
                    && curr.message == new_cond.message
                    && curr.observed_generation == new_cond.observed_generation
            })
        })
}

/// Phase and `Available` condition for the application tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Availability {
    pub phase: Phase,
    pub status: &'static str,
    pub reason: &'static str,
    pub message: String,
}

/// Map replica counts to a phase.
///
/// No ready pod means `Pending`, including a tier scaled to zero.
#[must_use]
pub fn app_availability(desired: i32, ready: i32) -> Availability {
    if ready == 0 {
        Availability {
            phase: Phase::Pending,
            status: CONDITION_FALSE,
            reason: REASON_PODS_NOT_READY,
            message: "Waiting for pods to be ready".to_string(),
        }
    } else if ready < desired {
        Availability {
            phase: Phase::Progressing,
            status: CONDITION_FALSE,
            reason: REASON_PODS_PROGRESSING,
            message: format!("Waiting for pods: {ready}/{desired} ready"),
        }
    } else {
        Availability {
            phase: Phase::Available,
            status: CONDITION_TRUE,
            reason: REASON_PODS_READY,
            message: "All replicas are ready".to_string(),
        }
    }
}

/// `(status, reason, message)` of a tier's storage condition.
#[must_use]
pub fn storage_condition(health: &StorageHealth) -> (&'static str, &'static str, String) {
    match health {
        StorageHealth::Healthy => (
            CONDITION_TRUE,
            REASON_STORAGE_HEALTHY,
            "Storage requests are within expected bounds".to_string(),
        ),
        StorageHealth::ClaimsNotBound { claims } => (
            CONDITION_FALSE,
            REASON_CLAIMS_NOT_BOUND,
            format!("Volume claims not bound: {}", claims.join(", ")),
        ),
        StorageHealth::ShrinkRefused { desired, current } => (
            CONDITION_FALSE,
            REASON_SHRINK_NOT_SUPPORTED,
            format!("Requested storage size {desired} is smaller than current PVC size {current}"),
        ),
    }
}

/// Whether `status` already reports a refused shrink for `tier`.
#[must_use]
pub fn shrink_reported(status: Option<&MusicServiceStatus>, tier: StorageTier) -> bool {
    status
        .and_then(|s| find_condition(&s.conditions, tier.condition_type()))
        .is_some_and(|c| c.reason.as_deref() == Some(REASON_SHRINK_NOT_SUPPORTED))
}

/// Observed readiness of the database tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatabaseObservation {
    PrimaryReplica {
        master_ready: i32,
        /// `None` when the replica `StatefulSet` does not exist.
        replicas_ready: Option<i32>,
    },
    HighAvailability {
        nodes: i32,
        /// `None` when the cluster `StatefulSet` does not exist.
        ready: Option<i32>,
    },
}

impl DatabaseObservation {
    /// Whether the tier whose history is tracked is present.
    #[must_use]
    pub fn tracked_tier_present(self) -> bool {
        match self {
            Self::PrimaryReplica { replicas_ready, .. } => replicas_ready.is_some(),
            Self::HighAvailability { ready, .. } => ready.is_some(),
        }
    }
}

/// Database sub-status, keeping history fields from `previous`.
///
/// `tracked_workload` names the `StatefulSet` whose presence is recorded. `None` means
/// no replica tier is declared (primary/replica with zero replicas) and the history is
/// cleared; a different name than last time starts a fresh history.
#[must_use]
pub fn database_status(
    previous: Option<&DatabaseStatus>,
    observation: DatabaseObservation,
    tracked_workload: Option<&str>,
) -> DatabaseStatus {
    let mut status = previous.cloned().unwrap_or_default();
    if status.tracked_workload.as_deref() != tracked_workload {
        status.replica_ever_created = false;
        status.replica_deletion_detected = false;
        status.replica_last_seen = None;
        status.tracked_workload = tracked_workload.map(str::to_string);
    }

    match observation {
        DatabaseObservation::PrimaryReplica {
            master_ready,
            replicas_ready,
        } => {
            let replicas_ready = replicas_ready.unwrap_or(0);
            status.master_ready = master_ready > 0;
            status.replicas_ready = replicas_ready;
            status.replication_ready = replicas_ready > 0;
            status.phase = Some(
                if master_ready > 0 {
                    DB_PHASE_READY
                } else {
                    DB_PHASE_PENDING
                }
                .to_string(),
            );
        }
        DatabaseObservation::HighAvailability { nodes, ready } => {
            let ready = ready.unwrap_or(0);
            let quorum = nodes / 2 + 1;
            status.master_ready = ready > 0;
            status.replicas_ready = ready;
            status.replication_ready = ready >= quorum;
            let phase = if nodes > 0 && ready >= nodes {
                DB_PHASE_READY
            } else if ready > 0 {
                DB_PHASE_PROGRESSING
            } else {
                DB_PHASE_PENDING
            };
            status.phase = Some(phase.to_string());
        }
    }

    if tracked_workload.is_some() {
        if observation.tracked_tier_present() {
            status.replica_ever_created = true;
            status.replica_deletion_detected = false;
        } else if status.replica_ever_created {
            status.replica_deletion_detected = true;
        }
    }
    status
}

/// `(status, reason, message)` of the replica history condition, if it applies.
#[must_use]
pub fn replica_history_condition(
    database: &DatabaseStatus,
) -> Option<(&'static str, &'static str, &'static str)> {
    if database.replica_deletion_detected {
        Some((
            CONDITION_FALSE,
            REASON_REPLICA_DELETED,
            "Replica StatefulSet was deleted after previously existing",
        ))
    } else if database.replica_ever_created {
        Some((
            CONDITION_TRUE,
            REASON_REPLICA_OBSERVED,
            "Replica StatefulSet is present",
        ))
    } else {
        None
    }
}

/// Condition types whose `False` status degrades an otherwise available parent.
const WARNING_CONDITIONS: [&str; 3] = [
    CONDITION_TYPE_APP_STORAGE,
    CONDITION_TYPE_DATABASE_STORAGE,
    CONDITION_TYPE_REPLICA_HISTORY,
];

/// Collects status changes during a pass and persists them in one write.
pub struct MusicServiceStatusUpdater {
    namespace: String,
    name: String,
    generation: Option<i64>,
    current_status: Option<MusicServiceStatus>,
    new_status: MusicServiceStatus,
}

impl MusicServiceStatusUpdater {
    #[must_use]
    pub fn new(ms: &MusicService) -> Self {
        let current_status = ms.status.clone();
        let new_status = current_status.clone().unwrap_or_default();
        Self {
            namespace: ms.namespace().unwrap_or_default(),
            name: ms.name_any(),
            generation: ms.metadata.generation,
            current_status,
            new_status,
        }
    }

    /// Status as it was when the pass started.
    #[must_use]
    pub fn previous(&self) -> Option<&MusicServiceStatus> {
        self.current_status.as_ref()
    }

    /// Update or add a condition stamped with the parent's generation.
    pub fn set_condition(
        &mut self,
        condition_type: &str,
        status: &str,
        reason: &str,
        message: &str,
    ) {
        update_condition_in_memory(
            &mut self.new_status.conditions,
            condition_type,
            status,
            reason,
            message,
            self.generation,
        );
    }

    pub fn remove_condition(&mut self, condition_type: &str) {
        self.new_status.conditions.retain(|c| c.r#type != condition_type);
    }

    pub fn set_observed_generation(&mut self) {
        self.new_status.observed_generation = self.generation;
    }

    /// Record the application tier's replica counts and derive phase and `Available`.
    pub fn set_app_replicas(&mut self, desired: i32, ready: i32) {
        let availability = app_availability(desired, ready);
        self.new_status.desired_replicas = desired;
        self.new_status.ready_replicas = ready;
        self.new_status.phase = Some(availability.phase);
        self.set_condition(
            CONDITION_TYPE_AVAILABLE,
            availability.status,
            availability.reason,
            &availability.message,
        );
    }

    pub fn set_storage_health(&mut self, tier: StorageTier, health: &StorageHealth) {
        let (status, reason, message) = storage_condition(health);
        self.set_condition(tier.condition_type(), status, reason, &message);
    }

    /// Set the database sub-status and its history condition; `None` clears both.
    pub fn set_database(&mut self, database: Option<DatabaseStatus>) {
        match &database {
            Some(db) => {
                match replica_history_condition(db) {
                    Some((status, reason, message)) => {
                        self.set_condition(CONDITION_TYPE_REPLICA_HISTORY, status, reason, message);
                    }
                    None => self.remove_condition(CONDITION_TYPE_REPLICA_HISTORY),
                }
            }
            None => {
                self.remove_condition(CONDITION_TYPE_REPLICA_HISTORY);
                self.remove_condition(CONDITION_TYPE_DATABASE_STORAGE);
            }
        }
        self.new_status.database = database;
    }

    /// Mark the pass as successful: `Reconciled=True`, `lastError` cleared, and an
    /// available parent with a failing warning condition demoted to `Degraded`.
    pub fn set_reconciled(&mut self, reason: &str, message: &str) {
        self.set_condition(
            CONDITION_TYPE_RECONCILED,
            CONDITION_TRUE,
            reason,
            message,
        );
        self.new_status.last_error = None;
        let warning = self.new_status.conditions.iter().any(|c| {
            WARNING_CONDITIONS.contains(&c.r#type.as_str()) && c.status == CONDITION_FALSE
        });
        if warning && self.new_status.phase == Some(Phase::Available) {
            self.new_status.phase = Some(Phase::Degraded);
        }
    }

    /// Mark the pass as failed with the failing step's reason.
    pub fn set_failed(&mut self, reason: &str, message: &str) {
        self.new_status.phase = Some(Phase::Failed);
        self.new_status.last_error = Some(message.to_string());
        self.set_condition(
            CONDITION_TYPE_RECONCILED,
            CONDITION_FALSE,
            reason,
            message,
        );
    }

    /// Phase computed so far.
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        self.new_status.phase
    }

    /// Whether anything besides timestamps differs from the status at pass start.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        let Some(current) = &self.current_status else {
            return true;
        };
        let new = &self.new_status;
        let database_equal = match (&current.database, &new.database) {
            (Some(a), Some(b)) => {
                a.phase == b.phase
                    && a.master_ready == b.master_ready
                    && a.replicas_ready == b.replicas_ready
                    && a.replica_ever_created == b.replica_ever_created
                    && a.replica_deletion_detected == b.replica_deletion_detected
                    && a.replication_ready == b.replication_ready
            }
            (None, None) => true,
            _ => false,
        };
        current.observed_generation != new.observed_generation
            || current.desired_replicas != new.desired_replicas
            || current.ready_replicas != new.ready_replicas
            || current.phase != new.phase
            || current.last_error != new.last_error
            || !conditions_equal(&current.conditions, &new.conditions)
            || !database_equal
    }

    /// Status as it would be written.
    #[must_use]
    pub fn status(&self) -> &MusicServiceStatus {
        &self.new_status
    }

    /// Persist the status if it changed. Returns whether a write happened.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn apply(
        &mut self,
        store: &dyn StateStore,
        ms: &MusicService,
    ) -> Result<bool, StoreError> {
        if !self.has_changes() {
            debug!(
                "MusicService {}/{} status unchanged, skipping update",
                self.namespace, self.name
            );
            return Ok(false);
        }

        let now = Utc::now().to_rfc3339();
        self.new_status.last_reconcile_time = Some(now.clone());
        if let Some(db) = self.new_status.database.as_mut() {
            let replica_present = db.replica_ever_created && !db.replica_deletion_detected;
            if replica_present {
                db.replica_last_seen = Some(now);
            }
        }

        store.update_status(ms, &self.new_status).await?;
        debug!(
            "Updated MusicService {}/{} status: phase {:?}, {} condition(s)",
            self.namespace,
            self.name,
            self.new_status.phase,
            self.new_status.conditions.len()
        );
        self.current_status = Some(self.new_status.clone());
        Ok(true)
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
