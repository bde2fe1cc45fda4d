// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired state builder.
//!
//! [`build_desired_state`] maps a validated `MusicService` to every child object the
//! operator manages. It is a pure function: the same spec, generation and engine
//! always produce structurally identical output. The only failures are malformed
//! quantities and engine/topology combinations that cannot be realised.
//!
//! Workloads that have an autoscaler are flagged with
//! [`Workload::replicas_externally_managed`]; the reconciler then leaves their replica
//! count to the autoscaler instead of forcing it back to the spec.

pub mod app;
pub mod database;
pub mod galera;
pub mod scripts;

use crate::constants::{
    API_GROUP_VERSION, KIND_MUSIC_SERVICE, LIVENESS_FAILURE_THRESHOLD,
    LIVENESS_INITIAL_DELAY_SECS, LIVENESS_PERIOD_SECS, LIVENESS_TIMEOUT_SECS,
    PROBE_SUCCESS_THRESHOLD, READINESS_FAILURE_THRESHOLD, READINESS_INITIAL_DELAY_SECS,
    READINESS_PERIOD_SECS, READINESS_TIMEOUT_SECS,
};
use crate::crd::{AutoscalingSpec, MusicService, StorageUpdatePolicy};
use crate::engine::DatabaseEngine;
use crate::errors::ReconcileError;
use crate::labels::{
    APP_LABEL, APP_NAME_MUSIC_SERVICE, COMPONENT_LABEL, K8S_COMPONENT, K8S_INSTANCE,
    K8S_MANAGED_BY, K8S_NAME, MANAGED_BY_MUSIC_OPERATOR,
};
use crate::quantity::{parse_quantity, ParsedQuantity};
use crate::status_reasons::{CONDITION_TYPE_APP_STORAGE, CONDITION_TYPE_DATABASE_STORAGE};
use crate::topology::{select_topology, DatabaseTopology};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec, MetricSpec,
    MetricTarget, ResourceMetricSource,
};
use k8s_openapi::api::core::v1::{
    ExecAction, PersistentVolumeClaim, PersistentVolumeClaimSpec, Probe, ResourceRequirements,
    Service, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Child object names, all derived from the parent's name.
pub mod names {
    use crate::constants::{
        APP_AUTOSCALER_SUFFIX, DB_CLIENT_SUFFIX, DB_CLUSTER_DISCOVERY_SUFFIX, DB_CLUSTER_SUFFIX,
        DB_MASTER_SUFFIX, DB_READ_SUFFIX, DB_REPLICATION_SECRET_SUFFIX,
        DB_REPLICA_AUTOSCALER_SUFFIX, DB_REPLICA_SUFFIX,
    };

    #[must_use]
    pub fn app(name: &str) -> String {
        name.to_string()
    }

    #[must_use]
    pub fn app_autoscaler(name: &str) -> String {
        format!("{name}{APP_AUTOSCALER_SUFFIX}")
    }

    #[must_use]
    pub fn db_master(name: &str) -> String {
        format!("{name}{DB_MASTER_SUFFIX}")
    }

    #[must_use]
    pub fn db_replica(name: &str) -> String {
        format!("{name}{DB_REPLICA_SUFFIX}")
    }

    #[must_use]
    pub fn db_read(name: &str) -> String {
        format!("{name}{DB_READ_SUFFIX}")
    }

    #[must_use]
    pub fn db_replica_autoscaler(name: &str) -> String {
        format!("{name}{DB_REPLICA_AUTOSCALER_SUFFIX}")
    }

    #[must_use]
    pub fn db_cluster(name: &str) -> String {
        format!("{name}{DB_CLUSTER_SUFFIX}")
    }

    #[must_use]
    pub fn db_cluster_discovery(name: &str) -> String {
        format!("{name}{DB_CLUSTER_DISCOVERY_SUFFIX}")
    }

    #[must_use]
    pub fn db_client(name: &str) -> String {
        format!("{name}{DB_CLIENT_SUFFIX}")
    }

    #[must_use]
    pub fn replication_secret(name: &str) -> String {
        format!("{name}{DB_REPLICATION_SECRET_SUFFIX}")
    }
}

/// Which tier a volume belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageTier {
    App,
    Database,
}

impl StorageTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Database => "database",
        }
    }

    /// Condition type carrying this tier's storage health.
    #[must_use]
    pub fn condition_type(self) -> &'static str {
        match self {
            Self::App => CONDITION_TYPE_APP_STORAGE,
            Self::Database => CONDITION_TYPE_DATABASE_STORAGE,
        }
    }
}

/// Declared volume size of one workload.
#[derive(Clone, Debug, PartialEq)]
pub struct StorageTarget {
    pub tier: StorageTier,
    /// Name of the volume claim template; claims are `{template}-{statefulset}-{ordinal}`.
    pub claim_template: &'static str,
    /// Size as written in the spec.
    pub size: String,
    pub desired: ParsedQuantity,
    pub policy: StorageUpdatePolicy,
}

/// A `StatefulSet` together with the facts the reconciler needs about it.
#[derive(Clone, Debug, PartialEq)]
pub struct Workload {
    pub statefulset: StatefulSet,
    /// An autoscaler owns `spec.replicas`; never overwrite it on update.
    pub replicas_externally_managed: bool,
    pub storage: StorageTarget,
}

impl Workload {
    #[must_use]
    pub fn name(&self) -> String {
        self.statefulset.name_any()
    }
}

/// The replication credential record the database pods reference.
#[derive(Clone, Debug, PartialEq)]
pub struct CredentialTarget {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerReference>,
}

/// Application tier.
#[derive(Clone, Debug, PartialEq)]
pub struct AppTier {
    pub service: Service,
    pub workload: Workload,
    /// `None` means any existing autoscaler must be removed.
    pub autoscaler: Option<HorizontalPodAutoscaler>,
}

/// One primary plus asynchronous replicas.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimaryReplicaTier {
    pub master_service: Service,
    pub master: Workload,
    /// Replica objects are `None` when the declared replica count is zero.
    pub replica_service: Option<Service>,
    pub read_service: Option<Service>,
    pub replicas: Option<Workload>,
}

/// Symmetric multi-primary cluster.
#[derive(Clone, Debug, PartialEq)]
pub struct HighAvailabilityTier {
    pub discovery_service: Service,
    pub client_service: Service,
    pub cluster: Workload,
}

/// Database tier, exactly one shape per parent.
#[derive(Clone, Debug, PartialEq)]
pub enum DatabaseTier {
    None,
    PrimaryReplica(PrimaryReplicaTier),
    HighAvailability(HighAvailabilityTier),
}

/// Everything the reconciler should converge a parent to.
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredState {
    pub namespace: String,
    pub name: String,
    pub topology: DatabaseTopology,
    pub credential: Option<CredentialTarget>,
    pub app: AppTier,
    pub database: DatabaseTier,
    /// `None` means any existing replica autoscaler must be removed.
    pub database_autoscaler: Option<HorizontalPodAutoscaler>,
}

/// Build the desired state of a parent.
///
/// # Errors
///
/// Returns `InvalidQuantity` for malformed sizes or resource quantities and
/// `Validation` when the topology cannot be realised with `engine`.
pub fn build_desired_state(
    ms: &MusicService,
    engine: DatabaseEngine,
) -> Result<DesiredState, ReconcileError> {
    let topology = select_topology(&ms.spec);
    if topology.is_high_availability() && !engine.supports_high_availability() {
        return Err(ReconcileError::Validation(format!(
            "spec.database.highAvailability requires an engine with cluster support; \
             {engine} has none"
        )));
    }

    let app = app::build_app_tier(ms)?;
    let (database, database_autoscaler) = match (topology, ms.spec.enabled_database()) {
        (DatabaseTopology::PrimaryReplica { replicas }, Some(db)) => {
            let settings = database::DatabaseSettings::resolve(ms, db, engine)?;
            let tier = database::build_primary_replica_tier(ms, &settings, replicas);
            let autoscaler = match (&tier.replicas, &db.autoscaling) {
                (Some(_), Some(autoscaling)) => Some(database::build_replica_autoscaler(
                    ms,
                    autoscaling,
                )),
                _ => None,
            };
            (DatabaseTier::PrimaryReplica(tier), autoscaler)
        }
        (DatabaseTopology::HighAvailability { nodes }, Some(db)) => {
            let settings = database::DatabaseSettings::resolve(ms, db, engine)?;
            let tier = galera::build_high_availability_tier(ms, &settings, nodes);
            (DatabaseTier::HighAvailability(tier), None)
        }
        _ => (DatabaseTier::None, None),
    };

    let needs_credential = match (topology, ms.spec.enabled_database()) {
        (DatabaseTopology::PrimaryReplica { replicas }, Some(db)) => {
            db.replication_enabled() && replicas > 0
        }
        (DatabaseTopology::HighAvailability { .. }, Some(_)) => true,
        _ => false,
    };
    let credential = needs_credential.then(|| CredentialTarget {
        name: names::replication_secret(&ms.name_any()),
        labels: build_labels(ms, crate::labels::COMPONENT_DB_CREDENTIAL),
        owner_references: build_owner_references(ms),
    });

    Ok(DesiredState {
        namespace: ms.namespace().unwrap_or_default(),
        name: ms.name_any(),
        topology,
        credential,
        app,
        database,
        database_autoscaler,
    })
}

/// Labels for every child object of `ms` in `component`.
#[must_use]
pub fn build_labels(ms: &MusicService, component: &str) -> BTreeMap<String, String> {
    let name = ms.name_any();
    let mut labels = selector_labels(ms, component);
    labels.insert(K8S_NAME.into(), APP_NAME_MUSIC_SERVICE.into());
    labels.insert(K8S_INSTANCE.into(), name);
    labels.insert(K8S_COMPONENT.into(), component.into());
    labels.insert(K8S_MANAGED_BY.into(), MANAGED_BY_MUSIC_OPERATOR.into());
    labels
}

/// Pod selector for `component`; only `app` and `component`.
#[must_use]
pub fn selector_labels(ms: &MusicService, component: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(APP_LABEL.into(), ms.name_any());
    labels.insert(COMPONENT_LABEL.into(), component.into());
    labels
}

/// Controller owner reference to `ms`, so children cascade with it.
#[must_use]
pub fn build_owner_references(ms: &MusicService) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_MUSIC_SERVICE.to_string(),
        name: ms.name_any(),
        uid: ms.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

pub(crate) fn object_meta(ms: &MusicService, name: String, component: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: ms.namespace(),
        labels: Some(build_labels(ms, component)),
        owner_references: Some(build_owner_references(ms)),
        ..Default::default()
    }
}

/// Parse a size from the spec, tagging failures with the field path.
pub(crate) fn parse_size(field: &str, value: &str) -> Result<ParsedQuantity, ReconcileError> {
    parse_quantity(value).map_err(|source| ReconcileError::InvalidQuantity {
        field: field.to_string(),
        source,
    })
}

/// Reject malformed quantities in user-supplied resource requirements.
pub(crate) fn check_resources(
    field: &str,
    resources: Option<&ResourceRequirements>,
) -> Result<(), ReconcileError> {
    let Some(resources) = resources else {
        return Ok(());
    };
    for (section, list) in [("limits", &resources.limits), ("requests", &resources.requests)] {
        for (resource, quantity) in list.iter().flatten() {
            parse_size(&format!("{field}.{section}.{resource}"), &quantity.0)?;
        }
    }
    Ok(())
}

pub(crate) fn claim_template(name: &str, size: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(size.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Exec probe with every timing field set, so the live object never differs from
/// the desired one by a server-filled default.
pub(crate) fn exec_probe(command: String, liveness: bool) -> Probe {
    let (initial_delay, period, timeout, failure) = if liveness {
        (
            LIVENESS_INITIAL_DELAY_SECS,
            LIVENESS_PERIOD_SECS,
            LIVENESS_TIMEOUT_SECS,
            LIVENESS_FAILURE_THRESHOLD,
        )
    } else {
        (
            READINESS_INITIAL_DELAY_SECS,
            READINESS_PERIOD_SECS,
            READINESS_TIMEOUT_SECS,
            READINESS_FAILURE_THRESHOLD,
        )
    };
    Probe {
        exec: Some(ExecAction {
            command: Some(vec!["/bin/sh".to_string(), "-c".to_string(), command]),
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(period),
        timeout_seconds: Some(timeout),
        success_threshold: Some(PROBE_SUCCESS_THRESHOLD),
        failure_threshold: Some(failure),
        ..Default::default()
    }
}

fn resource_metric(resource: &str, utilization: i32) -> MetricSpec {
    MetricSpec {
        type_: "Resource".to_string(),
        resource: Some(ResourceMetricSource {
            name: resource.to_string(),
            target: MetricTarget {
                type_: "Utilization".to_string(),
                average_utilization: Some(utilization),
                ..Default::default()
            },
        }),
        ..Default::default()
    }
}

/// autoscaling/v2 HPA targeting the `StatefulSet` `target`.
pub(crate) fn build_autoscaler(
    ms: &MusicService,
    name: String,
    target: String,
    component: &str,
    autoscaling: &AutoscalingSpec,
) -> HorizontalPodAutoscaler {
    let mut metrics = vec![resource_metric(
        "cpu",
        autoscaling.target_cpu_utilization_percentage,
    )];
    if let Some(memory) = autoscaling.target_memory_utilization_percentage {
        metrics.push(resource_metric("memory", memory));
    }

    HorizontalPodAutoscaler {
        metadata: object_meta(ms, name, component),
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "StatefulSet".to_string(),
                name: target,
            },
            min_replicas: Some(autoscaling.min_replicas),
            max_replicas: autoscaling.max_replicas,
            metrics: Some(metrics),
            ..Default::default()
        }),
        ..Default::default()
    }
}
