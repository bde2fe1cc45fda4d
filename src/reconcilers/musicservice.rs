// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `MusicService` reconciliation.
//!
//! One pass converges every child of a parent in dependency order:
//!
//! 1. Finalizer
//! 2. Spec validation and desired state
//! 3. Replication credential
//! 4. Application tier (Service, storage, `StatefulSet`, autoscaler)
//! 5. Database tier (endpoints, storage, workloads, autoscaler)
//! 6. Status, written only when its content changed
//!
//! Each step is idempotent, so a pass that fails half way is simply repeated. A parent
//! marked for deletion skips all of the above and only runs the finalizer cleanup.

use super::app::reconcile_app_tier;
use super::credentials::ensure_credential;
use super::database::reconcile_database_tier;
use super::finalizers::{ensure_finalizer, handle_deletion, has_finalizer};
use super::publish_event;
use super::status::{database_status, MusicServiceStatusUpdater};
use crate::builder::{build_desired_state, StorageTier};
use crate::constants::KIND_MUSIC_SERVICE;
use crate::context::Context;
use crate::crd::{MusicService, Phase};
use crate::errors::{ReconcileError, StepContext};
use crate::events::{actions, reasons};
use crate::labels::FINALIZER_MUSIC_SERVICE;
use crate::metrics;
use crate::status_reasons::{
    REASON_CREDENTIAL_FAILED, REASON_FINALIZER_FAILED, REASON_RECONCILE_SUCCESS,
    REASON_STATUS_FAILED,
};
use kube::runtime::events::EventType;
use kube::ResourceExt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// When the scheduler should run the next pass for a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requeue {
    After(Duration),
    /// Wait for the next watch event.
    Never,
}

/// Summary of a successful pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassReport {
    pub phase: Option<Phase>,
    pub desired_replicas: i32,
    pub ready_replicas: i32,
    pub status_written: bool,
}

/// Run one normal (non-deletion) pass over `ms`.
///
/// # Errors
///
/// Returns the first failing step. The caller records the failure on the status.
pub async fn reconcile_music_service(
    ctx: &Context,
    ms: &MusicService,
) -> Result<PassReport, ReconcileError> {
    let namespace = ms.namespace().unwrap_or_default();
    let name = ms.name_any();

    ensure_finalizer(ctx.store.as_ref(), ms, FINALIZER_MUSIC_SERVICE)
        .await
        .step(REASON_FINALIZER_FAILED)?;

    let observed = ms.status.as_ref().and_then(|s| s.observed_generation);
    if observed != ms.metadata.generation {
        info!(
            "Reconciling MusicService {}/{} (generation {:?}, observed {:?})",
            namespace, name, ms.metadata.generation, observed
        );
        publish_event(
            ctx,
            ms,
            EventType::Normal,
            reasons::RECONCILING,
            actions::RECONCILE,
            format!("Reconciling generation {}", ms.metadata.generation.unwrap_or(0)),
        )
        .await;
    }

    ms.spec.validate()?;
    let desired = build_desired_state(ms, ctx.engine)?;
    debug!(topology = ?desired.topology, "Built desired state for {}/{}", namespace, name);

    if let Some(credential) = &desired.credential {
        ensure_credential(ctx, ms, credential)
            .await
            .step(REASON_CREDENTIAL_FAILED)?;
    }

    let app = reconcile_app_tier(ctx, ms, &desired.app).await?;
    let database = reconcile_database_tier(
        ctx,
        ms,
        &desired.database,
        desired.database_autoscaler.as_ref(),
    )
    .await?;

    let mut updater = MusicServiceStatusUpdater::new(ms);
    updater.set_observed_generation();
    updater.set_app_replicas(app.desired, app.ready);
    updater.set_storage_health(StorageTier::App, &app.storage);
    match database {
        Some(report) => {
            updater.set_storage_health(StorageTier::Database, &report.storage);
            let previous = ms.status.as_ref().and_then(|s| s.database.as_ref());
            updater.set_database(Some(database_status(
                previous,
                report.observation,
                report.tracked_workload.as_deref(),
            )));
        }
        None => updater.set_database(None),
    }
    updater.set_reconciled(REASON_RECONCILE_SUCCESS, "Successfully reconciled");

    let previous_phase = ms.status.as_ref().and_then(|s| s.phase);
    let phase = updater.phase();
    let status_written = updater
        .apply(ctx.store.as_ref(), ms)
        .await
        .step(REASON_STATUS_FAILED)?;
    metrics::set_ready_replicas(&namespace, &name, app.ready);

    if phase == Some(Phase::Available) && previous_phase != Some(Phase::Available) {
        publish_event(
            ctx,
            ms,
            EventType::Normal,
            reasons::READY,
            actions::RECONCILE,
            format!("All {} replicas are ready", app.desired),
        )
        .await;
    }

    Ok(PassReport {
        phase,
        desired_replicas: app.desired,
        ready_replicas: app.ready,
        status_written,
    })
}

/// Record a failed pass: phase `Failed`, `lastError`, `Reconciled=False` with the
/// failing step's reason, and a Warning event when the failure is new.
async fn record_failure(ctx: &Context, ms: &MusicService, err: &ReconcileError) {
    let message = err.to_string();
    let mut updater = MusicServiceStatusUpdater::new(ms);
    updater.set_observed_generation();
    updater.set_failed(err.status_reason(), &message);
    if !updater.has_changes() {
        return;
    }

    publish_event(
        ctx,
        ms,
        EventType::Warning,
        reasons::RECONCILE_FAILED,
        actions::RECONCILE,
        message,
    )
    .await;
    if let Err(e) = updater.apply(ctx.store.as_ref(), ms).await {
        warn!(
            "Failed to record failure status on MusicService {}/{}: {}",
            ms.namespace().unwrap_or_default(),
            ms.name_any(),
            e
        );
    }
}

async fn finalize(ctx: &Context, ms: &MusicService) -> Result<(), ReconcileError> {
    if has_finalizer(ms, FINALIZER_MUSIC_SERVICE) {
        publish_event(
            ctx,
            ms,
            EventType::Normal,
            reasons::DELETING,
            actions::DELETE,
            "Releasing replication credential".to_string(),
        )
        .await;
    }
    handle_deletion(ctx, ms, FINALIZER_MUSIC_SERVICE).await
}

/// Reconcile the parent `namespace/name` as it currently is in the store.
///
/// A missing parent is a no-op; a parent pending deletion only runs cleanup.
///
/// # Errors
///
/// Returns the pass failure after recording it on the status; pass it to
/// [`error_policy`] for the retry decision.
pub async fn reconcile(
    ctx: &Context,
    namespace: &str,
    name: &str,
) -> Result<Requeue, ReconcileError> {
    let start = Instant::now();
    let Some(ms) = ctx.store.get_music_service(namespace, name).await? else {
        debug!("MusicService {}/{} no longer exists", namespace, name);
        return Ok(Requeue::Never);
    };

    let result = if ms.metadata.deletion_timestamp.is_some() {
        finalize(ctx, &ms).await.map(|()| None)
    } else {
        reconcile_music_service(ctx, &ms).await.map(Some)
    };

    match result {
        Ok(None) => {
            metrics::record_reconciliation_success(KIND_MUSIC_SERVICE, start.elapsed());
            Ok(Requeue::Never)
        }
        Ok(Some(report)) => {
            metrics::record_reconciliation_success(KIND_MUSIC_SERVICE, start.elapsed());
            let (interval, reason) = if report.ready_replicas < report.desired_replicas {
                (ctx.requeue.not_ready, "not_ready")
            } else {
                (ctx.requeue.resync, "resync")
            };
            metrics::record_reconciliation_requeue(KIND_MUSIC_SERVICE, reason);
            info!(
                phase = ?report.phase,
                ready = report.ready_replicas,
                desired = report.desired_replicas,
                "Successfully reconciled MusicService {}/{}", namespace, name
            );
            Ok(Requeue::After(interval))
        }
        Err(err) => {
            metrics::record_reconciliation_error(KIND_MUSIC_SERVICE, start.elapsed());
            metrics::record_error(KIND_MUSIC_SERVICE, err.category());
            error!(
                reason = err.status_reason(),
                "Failed to reconcile MusicService {}/{}: {}", namespace, name, err
            );
            record_failure(ctx, &ms, &err).await;
            Err(err)
        }
    }
}

/// Retry decision for a failed pass: transient failures retry after the error
/// interval, spec errors wait for the next change.
#[must_use]
pub fn error_policy(ctx: &Context, err: &ReconcileError) -> Requeue {
    if err.is_retryable() {
        metrics::record_reconciliation_requeue(KIND_MUSIC_SERVICE, "error");
        Requeue::After(ctx.requeue.error)
    } else {
        Requeue::Never
    }
}

#[cfg(test)]
#[path = "musicservice_tests.rs"]
mod musicservice_tests;
