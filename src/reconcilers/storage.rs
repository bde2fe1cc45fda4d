// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Storage policy for volume-backed tiers.
//!
//! A `StatefulSet`'s claim templates cannot change after creation, so a new declared
//! size has to be pushed to the claims themselves. The tier's policy decides how:
//!
//! - **Resize** expands every claim that is below the declared size. Shrinking is
//!   refused and reported through the tier's storage condition; nothing is mutated.
//! - **Recreate** deletes the tier's `StatefulSet` and every claim named
//!   `{template}-{statefulset}-{ordinal}`. The next pass rebuilds both at the new size.
//!   **All data on those volumes is lost.**
//!
//! The current size is the largest request among the tier's claims, or the live claim
//! template when no claim exists yet.

use super::{apply, publish_event};
use crate::builder::{StorageTarget, Workload};
use crate::context::Context;
use crate::crd::{MusicService, StorageUpdatePolicy};
use crate::errors::ReconcileError;
use crate::events::{actions, reasons};
use crate::metrics;
use crate::quantity::{parse_quantity, storage_request, ParsedQuantity};
use crate::store::{self, ObjectKey, ResourceKind};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{debug, info, warn};

/// Decision for one workload's volumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoragePlan {
    NoChange,
    /// Claims to grow to the declared size.
    Expand { claims: Vec<String> },
    /// Declared size is below `current`; nothing is changed.
    RefuseShrink { current: String },
    /// Claims to delete together with the workload.
    Recreate { claims: Vec<String> },
}

/// Storage health of one workload, worst-wins when aggregated.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageHealth {
    Healthy,
    ClaimsNotBound { claims: Vec<String> },
    ShrinkRefused { desired: String, current: String },
}

/// Outcome of running the policy for one workload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageOutcome {
    pub plan: StoragePlan,
    pub health: StorageHealth,
}

impl StorageOutcome {
    /// The workload was deleted this pass and must not be re-applied until the next one.
    #[must_use]
    pub fn recreated(&self) -> bool {
        matches!(self.plan, StoragePlan::Recreate { .. })
    }
}

/// Whether `claim` is `{template}-{statefulset}-{ordinal}`.
#[must_use]
pub fn claim_belongs_to(claim: &str, template: &str, statefulset: &str) -> bool {
    claim
        .strip_prefix(template)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_prefix(statefulset))
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|ordinal| !ordinal.is_empty() && ordinal.chars().all(|c| c.is_ascii_digit()))
}

fn claim_size(claim: &PersistentVolumeClaim) -> Option<ParsedQuantity> {
    let request = storage_request(claim)?;
    match parse_quantity(&request.0) {
        Ok(size) => Some(size),
        Err(e) => {
            warn!(
                claim = %claim.name_any(),
                error = %e,
                "Ignoring claim with unparseable storage request"
            );
            None
        }
    }
}

/// Size of the live claim template named `template`, if any.
#[must_use]
pub fn template_size(statefulset: &StatefulSet, template: &str) -> Option<ParsedQuantity> {
    statefulset
        .spec
        .as_ref()?
        .volume_claim_templates
        .iter()
        .flatten()
        .find(|t| t.metadata.name.as_deref() == Some(template))
        .and_then(claim_size)
}

/// Decide what to do with a workload's volumes.
///
/// `claims` must already be restricted to the workload's own, non-terminating claims.
#[must_use]
pub fn plan_storage(
    target: &StorageTarget,
    live_template: Option<ParsedQuantity>,
    claims: &[PersistentVolumeClaim],
) -> StoragePlan {
    let sized: Vec<(String, ParsedQuantity, &Quantity)> = claims
        .iter()
        .filter_map(|claim| {
            let size = claim_size(claim)?;
            let raw = storage_request(claim)?;
            Some((claim.name_any(), size, raw))
        })
        .collect();

    match target.policy {
        StorageUpdatePolicy::Resize => {
            if let Some((_, _, raw)) = sized
                .iter()
                .filter(|(_, size, _)| *size > target.desired)
                .max_by_key(|(_, size, _)| *size)
            {
                return StoragePlan::RefuseShrink {
                    current: raw.0.clone(),
                };
            }
            let claims: Vec<String> = sized
                .iter()
                .filter(|(_, size, _)| *size < target.desired)
                .map(|(name, _, _)| name.clone())
                .collect();
            if claims.is_empty() {
                StoragePlan::NoChange
            } else {
                StoragePlan::Expand { claims }
            }
        }
        StorageUpdatePolicy::Recreate => {
            let current = sized.iter().map(|(_, size, _)| *size).max().or(live_template);
            let claim_mismatch = sized.iter().any(|(_, size, _)| *size != target.desired);
            match current {
                Some(current) if current != target.desired || claim_mismatch => {
                    StoragePlan::Recreate {
                        claims: claims.iter().map(ResourceExt::name_any).collect(),
                    }
                }
                _ => StoragePlan::NoChange,
            }
        }
    }
}

fn unbound_claims(claims: &[PersistentVolumeClaim]) -> Vec<String> {
    claims
        .iter()
        .filter(|claim| {
            claim
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                != Some("Bound")
        })
        .map(ResourceExt::name_any)
        .collect()
}

/// Run the storage policy for `workload`, before its `StatefulSet` is applied.
///
/// `shrink_already_reported` suppresses a repeat Warning event for a refusal the status
/// already carries.
///
/// # Errors
///
/// Propagates store failures while listing, expanding or deleting.
pub async fn apply_storage_policy(
    ctx: &Context,
    ms: &MusicService,
    workload: &Workload,
    shrink_already_reported: bool,
) -> Result<StorageOutcome, ReconcileError> {
    let namespace = ms.namespace().unwrap_or_default();
    let sts_name = workload.name();
    let target = &workload.storage;

    let live_sts = store::get::<StatefulSet>(ctx.store.as_ref(), &namespace, &sts_name).await?;
    let claims: Vec<PersistentVolumeClaim> =
        store::list::<PersistentVolumeClaim>(ctx.store.as_ref(), &namespace)
            .await?
            .into_iter()
            .filter(|c| c.metadata.deletion_timestamp.is_none())
            .filter(|c| claim_belongs_to(&c.name_any(), target.claim_template, &sts_name))
            .collect();

    let live_template = live_sts
        .as_ref()
        .and_then(|sts| template_size(sts, target.claim_template));
    let plan = plan_storage(target, live_template, &claims);
    let tier = target.tier.as_str();

    let health = match &plan {
        StoragePlan::NoChange => {
            debug!(tier, statefulset = %sts_name, "Storage unchanged");
            health_from_claims(&claims)
        }
        StoragePlan::Expand { claims: names } => {
            for claim in claims.iter().filter(|c| names.contains(&c.name_any())) {
                let mut claim = claim.clone();
                if let Some(resources) = claim.spec.as_mut().and_then(|s| s.resources.as_mut()) {
                    resources
                        .requests
                        .get_or_insert_with(Default::default)
                        .insert("storage".to_string(), Quantity(target.size.clone()));
                }
                store::update(ctx.store.as_ref(), claim).await?;
                metrics::record_resource_updated(ResourceKind::PersistentVolumeClaim.as_str());
            }
            metrics::record_storage_action(tier, "expand");
            info!(
                tier,
                statefulset = %sts_name,
                claims = ?names,
                size = %target.size,
                "Expanded volume claims"
            );
            publish_event(
                ctx,
                ms,
                EventType::Normal,
                reasons::STORAGE_EXPANDED,
                actions::RESIZE,
                format!("Expanded {} claim(s) of {sts_name} to {}", names.len(), target.size),
            )
            .await;
            health_from_claims(&claims)
        }
        StoragePlan::RefuseShrink { current } => {
            warn!(
                tier,
                statefulset = %sts_name,
                desired = %target.size,
                current = %current,
                "Refusing to shrink volume claims"
            );
            if !shrink_already_reported {
                metrics::record_storage_action(tier, "refuse_shrink");
                publish_event(
                    ctx,
                    ms,
                    EventType::Warning,
                    reasons::STORAGE_SHRINK_REFUSED,
                    actions::RESIZE,
                    format!(
                        "Requested storage size {} is smaller than current PVC size {current}",
                        target.size
                    ),
                )
                .await;
            }
            StorageHealth::ShrinkRefused {
                desired: target.size.clone(),
                current: current.clone(),
            }
        }
        StoragePlan::Recreate { claims: names } => {
            warn!(
                tier,
                statefulset = %sts_name,
                claims = ?names,
                size = %target.size,
                "Recreating workload and volume claims; existing data is discarded"
            );
            apply::delete_if_exists(
                ctx.store.as_ref(),
                &ObjectKey::new(ResourceKind::StatefulSet, &namespace, &sts_name),
            )
            .await?;
            for name in names {
                apply::delete_if_exists(
                    ctx.store.as_ref(),
                    &ObjectKey::new(ResourceKind::PersistentVolumeClaim, &namespace, name),
                )
                .await?;
            }
            metrics::record_storage_action(tier, "recreate");
            publish_event(
                ctx,
                ms,
                EventType::Warning,
                reasons::STORAGE_RECREATED,
                actions::RECREATE,
                format!(
                    "Deleted {sts_name} and {} volume claim(s) to rebuild at {}; \
                     data on those volumes is lost",
                    names.len(),
                    target.size
                ),
            )
            .await;
            StorageHealth::Healthy
        }
    };

    Ok(StorageOutcome { plan, health })
}

fn health_from_claims(claims: &[PersistentVolumeClaim]) -> StorageHealth {
    let unbound = unbound_claims(claims);
    if unbound.is_empty() {
        StorageHealth::Healthy
    } else {
        StorageHealth::ClaimsNotBound { claims: unbound }
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod storage_tests;
