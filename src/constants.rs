// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the music operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `MusicService` CRD
pub const API_GROUP: &str = "music.mixcorp.org";

/// API version for the `MusicService` CRD
pub const API_VERSION: &str = "v1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "music.mixcorp.org/v1";

/// Kind name for `MusicService` resource
pub const KIND_MUSIC_SERVICE: &str = "MusicService";

/// Name reported on Kubernetes Events and used as the field manager
pub const CONTROLLER_NAME: &str = "music-operator";

// ============================================================================
// Application Tier Constants
// ============================================================================

/// Name of the application container
pub const APP_CONTAINER_NAME: &str = "music-service";

/// Port the application container listens on
pub const APP_CONTAINER_PORT: i32 = 80;

/// Name of the application port (container and Service)
pub const APP_PORT_NAME: &str = "http";

/// Name of the application volume claim template
pub const APP_DATA_VOLUME: &str = "music-data";

/// Mount path of the application data volume
pub const APP_DATA_MOUNT_PATH: &str = "/data";

/// Suffix appended to the parent name for the application autoscaler
pub const APP_AUTOSCALER_SUFFIX: &str = "-autoscaler";

/// Environment variable carrying the streaming bitrate
pub const ENV_STREAMING_BITRATE: &str = "STREAMING_BITRATE";

/// Environment variable carrying the connection limit
pub const ENV_MAX_CONNECTIONS: &str = "MAX_CONNECTIONS";

// ============================================================================
// Database Tier Constants
// ============================================================================

/// Suffix of the primary `StatefulSet` and its direct Service
pub const DB_MASTER_SUFFIX: &str = "-db-master";

/// Suffix of the replica `StatefulSet` and its governing Service
pub const DB_REPLICA_SUFFIX: &str = "-db-replica";

/// Suffix of the load-balanced read Service over replicas
pub const DB_READ_SUFFIX: &str = "-db-read";

/// Suffix of the replica tier autoscaler
pub const DB_REPLICA_AUTOSCALER_SUFFIX: &str = "-db-replica-autoscaler";

/// Suffix of the HA cluster `StatefulSet`
pub const DB_CLUSTER_SUFFIX: &str = "-db-cluster";

/// Suffix of the HA discovery (headless) Service
pub const DB_CLUSTER_DISCOVERY_SUFFIX: &str = "-db-cluster-discovery";

/// Suffix of the HA client Service
pub const DB_CLIENT_SUFFIX: &str = "-db";

/// Suffix of the replication credential Secret
pub const DB_REPLICATION_SECRET_SUFFIX: &str = "-db-replication";

/// Name of the database volume claim template
pub const DB_DATA_VOLUME: &str = "db-data";

/// Name of the generated configuration volume
pub const DB_CONFIG_VOLUME: &str = "db-config";

/// Mount path of the generated configuration inside the init container
pub const DB_CONFIG_INIT_MOUNT_PATH: &str = "/db-config";

/// Mount path of the generated configuration inside the database container
pub const DB_CONFIG_MOUNT_PATH: &str = "/etc/mysql/conf.d";

/// Scratch volume holding SQL run once on first start of a cluster node
pub const DB_INIT_SQL_VOLUME: &str = "db-init";

/// Mount path of the init SQL volume inside the init container
pub const DB_INIT_SQL_MOUNT_PATH: &str = "/db-init";

/// Directory the database image scans for first-start SQL
pub const DB_INITDB_MOUNT_PATH: &str = "/docker-entrypoint-initdb.d";

/// Name of the configuration init container
pub const DB_INIT_CONTAINER_NAME: &str = "init-db-config";

/// Name of the replica attach sidecar
pub const DB_REPLICATION_SIDECAR_NAME: &str = "replication-setup";

/// Port name for database traffic
pub const DB_PORT_NAME: &str = "mysql";

/// Galera replication port
pub const GALERA_REPLICATION_PORT: i32 = 4567;

/// Galera incremental state transfer port
pub const GALERA_IST_PORT: i32 = 4568;

/// Galera state snapshot transfer port
pub const GALERA_SST_PORT: i32 = 4444;

/// Default database storage request when the spec omits one
pub const DEFAULT_DB_STORAGE_SIZE: &str = "10Gi";

/// Default root password when the spec omits one
pub const DEFAULT_DB_ROOT_PASSWORD: &str = "rootpass";

/// Database created on first start
pub const DEFAULT_DB_NAME: &str = "musicdb";

/// Base for replica server ids (`server-id = base + ordinal`)
pub const REPLICA_SERVER_ID_BASE: i32 = 200;

/// Maximum number of database replicas accepted
pub const MAX_DB_REPLICAS: i32 = 10;

// ============================================================================
// Replication Credential Constants
// ============================================================================

/// Secret key holding the replication username
pub const SECRET_KEY_USERNAME: &str = "username";

/// Secret key holding the replication password
pub const SECRET_KEY_PASSWORD: &str = "password";

/// Username issued for the replication principal
pub const REPLICATION_USERNAME: &str = "repl";

/// Random bytes in a generated replication password (hex encoded, so twice as many chars)
pub const REPLICATION_PASSWORD_BYTES: usize = 16;

// ============================================================================
// Kubernetes Health Check Constants
// ============================================================================

/// Liveness probe initial delay (database needs time to initialise its data dir)
pub const LIVENESS_INITIAL_DELAY_SECS: i32 = 30;

/// Liveness probe period
pub const LIVENESS_PERIOD_SECS: i32 = 20;

/// Liveness probe timeout
pub const LIVENESS_TIMEOUT_SECS: i32 = 5;

/// Liveness probe failure threshold
pub const LIVENESS_FAILURE_THRESHOLD: i32 = 3;

/// Readiness probe initial delay
pub const READINESS_INITIAL_DELAY_SECS: i32 = 10;

/// Readiness probe period
pub const READINESS_PERIOD_SECS: i32 = 10;

/// Readiness probe timeout
pub const READINESS_TIMEOUT_SECS: i32 = 5;

/// Readiness probe failure threshold
pub const READINESS_FAILURE_THRESHOLD: i32 = 3;

/// Probe success threshold (Kubernetes only accepts 1 for liveness)
pub const PROBE_SUCCESS_THRESHOLD: i32 = 1;

// ============================================================================
// Controller Requeue Constants
// ============================================================================

/// Baseline resync interval once the application tier is ready (30 seconds)
pub const RESYNC_INTERVAL_SECS: u64 = 30;

/// Shortened resync interval while the application tier is not fully ready (5 seconds)
pub const NOT_READY_RESYNC_INTERVAL_SECS: u64 = 5;

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Window in which repeated events for the same key are coalesced
pub const DEFAULT_DEBOUNCE_MILLIS: u64 = 500;

/// Number of concurrent reconcile workers
pub const DEFAULT_WORKER_COUNT: usize = 4;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
