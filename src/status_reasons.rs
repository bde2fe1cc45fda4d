// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition types and reasons for `MusicService` resources.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a condition has
//! a particular status.
//!
//! # Condition Types
//!
//! - `Available` - application pods are serving
//! - `Reconciled` - the last pass completed every step
//! - `AppStorageReady` / `DatabaseStorageReady` - per-tier volume health
//! - `DatabaseReplicaHistory` - whether a replica tier that once existed has vanished
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   phase: Progressing
//!   readyReplicas: 2
//!   desiredReplicas: 3
//!   conditions:
//!     - type: Available
//!       status: "False"
//!       reason: PodsProgressing
//!       message: "Waiting for pods: 2/3 ready"
//!     - type: Reconciled
//!       status: "True"
//!       reason: ReconcileSuccess
//!       message: "Successfully reconciled"
//! ```

// ============================================================================
// Condition Status Values
// ============================================================================

pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";
pub const CONDITION_UNKNOWN: &str = "Unknown";

// ============================================================================
// Condition Types
// ============================================================================

/// Application pods are ready to serve traffic.
pub const CONDITION_TYPE_AVAILABLE: &str = "Available";

/// The last reconcile pass completed without error.
pub const CONDITION_TYPE_RECONCILED: &str = "Reconciled";

/// Volume health of the application tier.
pub const CONDITION_TYPE_APP_STORAGE: &str = "AppStorageReady";

/// Volume health of the database tier.
pub const CONDITION_TYPE_DATABASE_STORAGE: &str = "DatabaseStorageReady";

/// Replica tier history (observed, or observed and later deleted).
pub const CONDITION_TYPE_REPLICA_HISTORY: &str = "DatabaseReplicaHistory";

// ============================================================================
// Availability Reasons
// ============================================================================

/// No application pod is ready.
pub const REASON_PODS_NOT_READY: &str = "PodsNotReady";

/// Some but not all application pods are ready.
pub const REASON_PODS_PROGRESSING: &str = "PodsProgressing";

/// Every desired application pod is ready.
pub const REASON_PODS_READY: &str = "PodsReady";

// ============================================================================
// Reconcile Reasons
// ============================================================================

/// Every step of the pass succeeded.
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";

/// The spec was rejected before any write.
pub const REASON_VALIDATION_FAILED: &str = "ValidationFailed";

/// A storage size could not be parsed.
pub const REASON_INVALID_QUANTITY: &str = "InvalidQuantity";

/// Finalizer bookkeeping failed.
pub const REASON_FINALIZER_FAILED: &str = "FinalizerFailed";

/// Replication credential could not be issued or backfilled.
pub const REASON_CREDENTIAL_FAILED: &str = "CredentialFailed";

/// Application Service step failed.
pub const REASON_SERVICE_FAILED: &str = "ServiceFailed";

/// Application `StatefulSet` step failed.
pub const REASON_STATEFULSET_FAILED: &str = "StatefulSetFailed";

/// Application autoscaler step failed.
pub const REASON_AUTOSCALER_FAILED: &str = "AutoscalerFailed";

/// Database primary step failed.
pub const REASON_DB_MASTER_FAILED: &str = "DBMasterFailed";

/// Database replica step failed.
pub const REASON_DB_REPLICAS_FAILED: &str = "DBReplicasFailed";

/// Database Services step failed.
pub const REASON_DB_SERVICES_FAILED: &str = "DBServicesFailed";

/// HA cluster workload step failed.
pub const REASON_DB_GALERA_FAILED: &str = "DBGaleraFailed";

/// HA cluster Services step failed.
pub const REASON_DB_GALERA_SERVICES_FAILED: &str = "DBGaleraServicesFailed";

/// Database autoscaler step failed.
pub const REASON_DB_AUTOSCALER_FAILED: &str = "DBAutoscalerFailed";

/// Storage expansion or recreation failed.
pub const REASON_STORAGE_FAILED: &str = "StorageFailed";

/// Status aggregation failed to read observed state.
pub const REASON_STATUS_FAILED: &str = "StatusFailed";

// ============================================================================
// Storage Reasons
// ============================================================================

/// Claims are bound and no declared shrink is pending.
pub const REASON_STORAGE_HEALTHY: &str = "StorageHealthy";

/// Declared size is below the bound size under the Resize policy.
pub const REASON_SHRINK_NOT_SUPPORTED: &str = "ShrinkNotSupported";

/// At least one claim of the tier is not bound yet.
pub const REASON_CLAIMS_NOT_BOUND: &str = "ClaimsNotBound";

// ============================================================================
// Replica History Reasons
// ============================================================================

/// The replica tier is present.
pub const REASON_REPLICA_OBSERVED: &str = "ReplicaObserved";

/// The replica tier existed once and is now absent.
pub const REASON_REPLICA_DELETED: &str = "ReplicaDeleted";

// ============================================================================
// Database Phases
// ============================================================================

pub const DB_PHASE_READY: &str = "Ready";
pub const DB_PHASE_PROGRESSING: &str = "Progressing";
pub const DB_PHASE_PENDING: &str = "Pending";

#[cfg(test)]
#[path = "status_reasons_tests.rs"]
mod status_reasons_tests;
