// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Application tier reconciliation.
//!
//! Order within the tier: Service, storage policy, `StatefulSet`, autoscaler. The
//! storage policy runs before the workload is applied so that a recreate deletes the
//! old `StatefulSet` instead of racing an update against it.

use super::apply::{self, Applied};
use super::status::shrink_reported;
use super::storage::{apply_storage_policy, StorageHealth};
use crate::builder::{names, AppTier, Workload};
use crate::context::Context;
use crate::crd::MusicService;
use crate::errors::{ReconcileError, StepContext};
use crate::status_reasons::{
    REASON_AUTOSCALER_FAILED, REASON_SERVICE_FAILED, REASON_STATEFULSET_FAILED,
    REASON_STORAGE_FAILED,
};
use crate::store::{ObjectKey, ResourceKind};
use kube::ResourceExt;
use tracing::debug;

/// What a workload looked like after it was applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadObservation {
    /// Replica count on the live object (the autoscaler's choice when it owns it).
    pub desired: i32,
    pub ready: i32,
    pub storage: StorageHealth,
    /// The workload was deleted by the storage policy this pass.
    pub recreated: bool,
}

/// Run the storage policy for `workload`, then apply it unless it was just deleted.
///
/// # Errors
///
/// Storage failures are tagged `StorageFailed`, workload failures with `workload_reason`.
pub(crate) async fn apply_workload(
    ctx: &Context,
    ms: &MusicService,
    workload: &Workload,
    workload_reason: &'static str,
) -> Result<WorkloadObservation, ReconcileError> {
    let already_reported = shrink_reported(ms.status.as_ref(), workload.storage.tier);
    let storage = apply_storage_policy(ctx, ms, workload, already_reported)
        .await
        .step(REASON_STORAGE_FAILED)?;

    let declared = workload
        .statefulset
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(0);
    if storage.recreated() {
        debug!(
            statefulset = %workload.name(),
            "Skipping apply of recreated workload until next pass"
        );
        return Ok(WorkloadObservation {
            desired: declared,
            ready: 0,
            storage: storage.health,
            recreated: true,
        });
    }

    let (applied, live) = apply::ensure(
        ctx.store.as_ref(),
        &workload.statefulset,
        workload.replicas_externally_managed,
    )
    .await
    .step(workload_reason)?;

    let ready = if applied == Applied::Created {
        0
    } else {
        live.status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0)
    };
    let desired = live
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(declared);

    Ok(WorkloadObservation {
        desired,
        ready,
        storage: storage.health,
        recreated: false,
    })
}

/// Converge the application tier.
///
/// # Errors
///
/// Returns the first failing step, tagged with its status reason.
pub async fn reconcile_app_tier(
    ctx: &Context,
    ms: &MusicService,
    tier: &AppTier,
) -> Result<WorkloadObservation, ReconcileError> {
    apply::ensure(ctx.store.as_ref(), &tier.service, false)
        .await
        .step(REASON_SERVICE_FAILED)?;

    let observation = apply_workload(ctx, ms, &tier.workload, REASON_STATEFULSET_FAILED).await?;

    match &tier.autoscaler {
        Some(autoscaler) => {
            apply::ensure(ctx.store.as_ref(), autoscaler, false)
                .await
                .step(REASON_AUTOSCALER_FAILED)?;
        }
        None => {
            let key = ObjectKey::new(
                ResourceKind::HorizontalPodAutoscaler,
                &ms.namespace().unwrap_or_default(),
                &names::app_autoscaler(&ms.name_any()),
            );
            apply::delete_if_exists(ctx.store.as_ref(), &key)
                .await
                .step(REASON_AUTOSCALER_FAILED)?;
        }
    }

    Ok(observation)
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod app_tests;
