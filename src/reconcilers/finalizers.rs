// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for `MusicService` resources.
//!
//! The finalizer guards the cleanup step: while it is present the parent cannot
//! disappear, so [`handle_deletion`] gets to release the replication credential first.
//! Child workloads and Services are not deleted here; they carry owner references and
//! are removed by cascade once the parent is gone.
//!
//! # Example
//!
//! ```rust,ignore
//! use music_operator::reconcilers::finalizers::{ensure_finalizer, handle_deletion};
//! use music_operator::labels::FINALIZER_MUSIC_SERVICE;
//!
//! async fn reconcile(ctx: &Context, ms: &MusicService) -> Result<(), ReconcileError> {
//!     if ms.metadata.deletion_timestamp.is_some() {
//!         return handle_deletion(ctx, ms, FINALIZER_MUSIC_SERVICE).await;
//!     }
//!     ensure_finalizer(ctx.store.as_ref(), ms, FINALIZER_MUSIC_SERVICE).await?;
//!     // Normal reconciliation...
//!     Ok(())
//! }
//! ```

use super::apply;
use crate::builder::names;
use crate::context::Context;
use crate::crd::MusicService;
use crate::errors::{ReconcileError, StoreError};
use crate::status_reasons::REASON_FINALIZER_FAILED;
use crate::store::{ObjectKey, ResourceKind, StateStore};
use async_trait::async_trait;
use kube::ResourceExt;
use tracing::info;

/// Cleanup that must finish before the finalizer is released.
#[async_trait]
pub trait FinalizerCleanup {
    /// If this returns an error the finalizer stays and deletion is retried on the
    /// next pass.
    ///
    /// # Errors
    ///
    /// Returns an error if any owned material could not be released.
    async fn cleanup(&self, ctx: &Context) -> Result<(), ReconcileError>;
}

#[async_trait]
impl FinalizerCleanup for MusicService {
    async fn cleanup(&self, ctx: &Context) -> Result<(), ReconcileError> {
        let namespace = self.namespace().unwrap_or_default();
        let key = ObjectKey::new(
            ResourceKind::Secret,
            &namespace,
            &names::replication_secret(&self.name_any()),
        );
        if apply::delete_if_exists(ctx.store.as_ref(), &key).await? {
            info!("Released replication credential {}", key);
        }
        Ok(())
    }
}

/// Whether `ms` carries `finalizer`.
#[must_use]
pub fn has_finalizer(ms: &MusicService, finalizer: &str) -> bool {
    ms.finalizers().iter().any(|f| f == finalizer)
}

/// Add `finalizer` if missing. Returns whether a write happened.
///
/// # Errors
///
/// Propagates store failures.
pub async fn ensure_finalizer(
    store: &dyn StateStore,
    ms: &MusicService,
    finalizer: &str,
) -> Result<bool, StoreError> {
    if has_finalizer(ms, finalizer) {
        return Ok(false);
    }
    let mut finalizers = ms.finalizers().to_vec();
    finalizers.push(finalizer.to_string());
    store.set_finalizers(ms, &finalizers).await?;
    info!(
        "Added finalizer {} to {}/{} MusicService",
        finalizer,
        ms.namespace().unwrap_or_default(),
        ms.name_any()
    );
    Ok(true)
}

/// Remove `finalizer` if present. Returns whether a write happened.
///
/// # Errors
///
/// Propagates store failures.
pub async fn remove_finalizer(
    store: &dyn StateStore,
    ms: &MusicService,
    finalizer: &str,
) -> Result<bool, StoreError> {
    if !has_finalizer(ms, finalizer) {
        return Ok(false);
    }
    let finalizers: Vec<String> = ms
        .finalizers()
        .iter()
        .filter(|f| *f != finalizer)
        .cloned()
        .collect();
    store.set_finalizers(ms, &finalizers).await?;
    info!(
        "Removed finalizer {} from {}/{} MusicService",
        finalizer,
        ms.namespace().unwrap_or_default(),
        ms.name_any()
    );
    Ok(true)
}

/// Run cleanup, then release the finalizer.
///
/// Does nothing when the finalizer is already gone.
///
/// # Errors
///
/// Returns a `FinalizerFailed` step error when cleanup or the finalizer write fails;
/// the finalizer then stays in place.
pub async fn handle_deletion(
    ctx: &Context,
    ms: &MusicService,
    finalizer: &str,
) -> Result<(), ReconcileError> {
    info!(
        "MusicService {}/{} is being deleted",
        ms.namespace().unwrap_or_default(),
        ms.name_any()
    );
    if !has_finalizer(ms, finalizer) {
        return Ok(());
    }

    let step = |source: ReconcileError| ReconcileError::Step {
        reason: REASON_FINALIZER_FAILED,
        source: Box::new(source),
    };
    ms.cleanup(ctx).await.map_err(step)?;
    remove_finalizer(ctx.store.as_ref(), ms, finalizer)
        .await
        .map_err(|e| step(e.into()))?;
    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
