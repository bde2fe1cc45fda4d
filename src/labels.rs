// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and the short selector labels
//! carried by every pod the operator manages.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture (e.g., "db-master")
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

// ============================================================================
// Selector Labels
// ============================================================================

/// Short label holding the parent `MusicService` name; part of every selector
pub const APP_LABEL: &str = "app";

/// Short label holding the tier component; part of every selector
pub const COMPONENT_LABEL: &str = "component";

// ============================================================================
// Label Values
// ============================================================================

/// Value for `app.kubernetes.io/name`
pub const APP_NAME_MUSIC_SERVICE: &str = "music-service";

/// Value for `app.kubernetes.io/managed-by`
pub const MANAGED_BY_MUSIC_OPERATOR: &str = "music-operator";

/// Component value for application pods
pub const COMPONENT_MUSIC_SERVICE: &str = "music-service";

/// Component value for the database primary
pub const COMPONENT_DB_MASTER: &str = "db-master";

/// Component value for database replicas
pub const COMPONENT_DB_REPLICA: &str = "db-replica";

/// Component value for HA cluster nodes
pub const COMPONENT_DB_CLUSTER: &str = "db-cluster";

/// Component value for the replication credential
pub const COMPONENT_DB_CREDENTIAL: &str = "db-credential";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer for `MusicService` resources
pub const FINALIZER_MUSIC_SERVICE: &str = "music.mixcorp.org/finalizer";
