// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Database tier reconciliation.
//!
//! Endpoints are applied before workloads, so pods resolve their peers as soon as they
//! start. Objects of an optional part of the tier (replica Services, replica
//! `StatefulSet`, replica autoscaler) are deleted by name when the desired state no
//! longer contains them. Switching topology retires every object of the other shape
//! the same way, so primary/replica and cluster workloads never run side by side.
//!
//! Presence of the tracked workload (the replica `StatefulSet`, or the cluster
//! `StatefulSet` in high-availability mode) is read before anything is applied. An
//! external deletion is therefore visible for one pass even though the same pass
//! recreates the object.

use super::app::{apply_workload, WorkloadObservation};
use super::apply;
use super::status::DatabaseObservation;
use super::storage::StorageHealth;
use crate::builder::{names, DatabaseTier, HighAvailabilityTier, PrimaryReplicaTier};
use crate::context::Context;
use crate::crd::MusicService;
use crate::errors::{ReconcileError, StepContext};
use crate::status_reasons::{
    REASON_DB_AUTOSCALER_FAILED, REASON_DB_GALERA_FAILED, REASON_DB_GALERA_SERVICES_FAILED,
    REASON_DB_MASTER_FAILED, REASON_DB_REPLICAS_FAILED, REASON_DB_SERVICES_FAILED,
};
use crate::store::{self, ObjectKey, ResourceKind};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::ResourceExt;

/// Observed state of the database tier after a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseReport {
    pub observation: DatabaseObservation,
    /// `StatefulSet` whose presence feeds the replica history; `None` when no replica
    /// tier is declared.
    pub tracked_workload: Option<String>,
    /// Worst storage health across the tier's workloads.
    pub storage: StorageHealth,
}

async fn exists(
    ctx: &Context,
    namespace: &str,
    name: &str,
    reason: &'static str,
) -> Result<bool, ReconcileError> {
    Ok(store::get::<StatefulSet>(ctx.store.as_ref(), namespace, name)
        .await
        .step(reason)?
        .is_some())
}

async fn delete_named(
    ctx: &Context,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    reason: &'static str,
) -> Result<(), ReconcileError> {
    apply::delete_if_exists(ctx.store.as_ref(), &ObjectKey::new(kind, namespace, name))
        .await
        .step(reason)?;
    Ok(())
}

/// Remove `(kind, name, reason)` objects left over from the other topology.
async fn retire(
    ctx: &Context,
    namespace: &str,
    objects: &[(ResourceKind, String, &'static str)],
) -> Result<(), ReconcileError> {
    for (kind, name, reason) in objects {
        delete_named(ctx, *kind, namespace, name, *reason).await?;
    }
    Ok(())
}

/// A recreated workload still counts as present; only an absence the operator did not
/// cause is history.
fn present_ready(observed_before: bool, workload: &WorkloadObservation) -> Option<i32> {
    (observed_before || workload.recreated).then_some(workload.ready)
}

async fn reconcile_primary_replica(
    ctx: &Context,
    ms: &MusicService,
    tier: &PrimaryReplicaTier,
) -> Result<DatabaseReport, ReconcileError> {
    let namespace = ms.namespace().unwrap_or_default();
    let name = ms.name_any();
    let replica_name = names::db_replica(&name);

    retire(
        ctx,
        &namespace,
        &[
            (
                ResourceKind::StatefulSet,
                names::db_cluster(&name),
                REASON_DB_GALERA_FAILED,
            ),
            (
                ResourceKind::Service,
                names::db_cluster_discovery(&name),
                REASON_DB_GALERA_SERVICES_FAILED,
            ),
            (
                ResourceKind::Service,
                names::db_client(&name),
                REASON_DB_GALERA_SERVICES_FAILED,
            ),
        ],
    )
    .await?;

    apply::ensure(ctx.store.as_ref(), &tier.master_service, false)
        .await
        .step(REASON_DB_SERVICES_FAILED)?;
    for (service, service_name) in [
        (&tier.replica_service, names::db_replica(&name)),
        (&tier.read_service, names::db_read(&name)),
    ] {
        match service {
            Some(service) => {
                apply::ensure(ctx.store.as_ref(), service, false)
                    .await
                    .step(REASON_DB_SERVICES_FAILED)?;
            }
            None => {
                delete_named(
                    ctx,
                    ResourceKind::Service,
                    &namespace,
                    &service_name,
                    REASON_DB_SERVICES_FAILED,
                )
                .await?;
            }
        }
    }

    let replica_seen = exists(ctx, &namespace, &replica_name, REASON_DB_REPLICAS_FAILED).await?;

    let master = apply_workload(ctx, ms, &tier.master, REASON_DB_MASTER_FAILED).await?;
    let mut storage = master.storage.clone();

    let replicas_ready = match &tier.replicas {
        Some(workload) => {
            let replicas = apply_workload(ctx, ms, workload, REASON_DB_REPLICAS_FAILED).await?;
            storage = storage.max(replicas.storage.clone());
            present_ready(replica_seen, &replicas)
        }
        None => {
            delete_named(
                ctx,
                ResourceKind::StatefulSet,
                &namespace,
                &replica_name,
                REASON_DB_REPLICAS_FAILED,
            )
            .await?;
            None
        }
    };

    Ok(DatabaseReport {
        observation: DatabaseObservation::PrimaryReplica {
            master_ready: master.ready,
            replicas_ready,
        },
        tracked_workload: tier.replicas.is_some().then_some(replica_name),
        storage,
    })
}

async fn reconcile_high_availability(
    ctx: &Context,
    ms: &MusicService,
    tier: &HighAvailabilityTier,
) -> Result<DatabaseReport, ReconcileError> {
    let namespace = ms.namespace().unwrap_or_default();
    let name = ms.name_any();

    retire(
        ctx,
        &namespace,
        &[
            (
                ResourceKind::StatefulSet,
                names::db_master(&name),
                REASON_DB_MASTER_FAILED,
            ),
            (
                ResourceKind::StatefulSet,
                names::db_replica(&name),
                REASON_DB_REPLICAS_FAILED,
            ),
            (
                ResourceKind::Service,
                names::db_master(&name),
                REASON_DB_SERVICES_FAILED,
            ),
            (
                ResourceKind::Service,
                names::db_replica(&name),
                REASON_DB_SERVICES_FAILED,
            ),
            (
                ResourceKind::Service,
                names::db_read(&name),
                REASON_DB_SERVICES_FAILED,
            ),
        ],
    )
    .await?;

    for service in [&tier.discovery_service, &tier.client_service] {
        apply::ensure(ctx.store.as_ref(), service, false)
            .await
            .step(REASON_DB_GALERA_SERVICES_FAILED)?;
    }

    let cluster_name = tier.cluster.name();
    let cluster_seen = exists(ctx, &namespace, &cluster_name, REASON_DB_GALERA_FAILED).await?;
    let cluster = apply_workload(ctx, ms, &tier.cluster, REASON_DB_GALERA_FAILED).await?;

    Ok(DatabaseReport {
        observation: DatabaseObservation::HighAvailability {
            nodes: cluster.desired,
            ready: present_ready(cluster_seen, &cluster),
        },
        tracked_workload: Some(cluster_name),
        storage: cluster.storage,
    })
}

/// Converge the database tier and its replica autoscaler.
///
/// Returns `None` when the parent has no database tier.
///
/// # Errors
///
/// Returns the first failing step, tagged with its status reason.
pub async fn reconcile_database_tier(
    ctx: &Context,
    ms: &MusicService,
    tier: &DatabaseTier,
    autoscaler: Option<&HorizontalPodAutoscaler>,
) -> Result<Option<DatabaseReport>, ReconcileError> {
    let report = match tier {
        DatabaseTier::None => None,
        DatabaseTier::PrimaryReplica(tier) => Some(reconcile_primary_replica(ctx, ms, tier).await?),
        DatabaseTier::HighAvailability(tier) => {
            Some(reconcile_high_availability(ctx, ms, tier).await?)
        }
    };

    match autoscaler {
        Some(autoscaler) => {
            apply::ensure(ctx.store.as_ref(), autoscaler, false)
                .await
                .step(REASON_DB_AUTOSCALER_FAILED)?;
        }
        None => {
            delete_named(
                ctx,
                ResourceKind::HorizontalPodAutoscaler,
                &ms.namespace().unwrap_or_default(),
                &names::db_replica_autoscaler(&ms.name_any()),
                REASON_DB_AUTOSCALER_FAILED,
            )
            .await?;
        }
    }

    Ok(report)
}

#[cfg(test)]
#[path = "database_tests.rs"]
mod database_tests;
