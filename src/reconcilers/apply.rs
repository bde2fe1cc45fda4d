// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Get-or-create/update helpers for child objects.
//!
//! Every managed object goes through [`ensure`]: fetch by key, create when absent,
//! otherwise merge the mutable fields onto the live copy and write it back only when
//! something differed. The live `resourceVersion` travels with the update, so a
//! concurrent writer surfaces as a `Conflict` and is resolved on the next pass.

use super::diff::MutableFields;
use crate::errors::StoreError;
use crate::metrics;
use crate::store::{self, ObjectKey, StateStore};
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

/// What [`ensure`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
    Unchanged,
}

/// Converge one object to `desired`, returning the live copy after the write.
///
/// # Errors
///
/// Propagates store failures, including `Conflict` when the object changed between the
/// read and the update.
pub async fn ensure<T>(
    store: &dyn StateStore,
    desired: &T,
    replicas_externally_managed: bool,
) -> Result<(Applied, T), StoreError>
where
    T: MutableFields + Resource,
{
    let namespace = desired.namespace().unwrap_or_default();
    let name = desired.name_any();
    let kind = T::KIND.as_str();

    let Some(mut live) = store::get::<T>(store, &namespace, &name).await? else {
        debug!(kind, namespace = %namespace, name = %name, "Creating resource");
        let created = store::create(store, desired.clone()).await?;
        metrics::record_resource_created(kind);
        info!("Created {} {}/{}", kind, namespace, name);
        return Ok((Applied::Created, created));
    };

    let changed = T::merge_mutable(&mut live, desired, replicas_externally_managed);
    if changed.is_empty() {
        debug!("{} {}/{} is up to date", kind, namespace, name);
        return Ok((Applied::Unchanged, live));
    }

    let updated = store::update(store, live).await?;
    metrics::record_resource_updated(kind);
    info!(
        fields = ?changed,
        "Updated {} {}/{}", kind, namespace, name
    );
    Ok((Applied::Updated, updated))
}

/// Delete an object if it exists. Returns whether a delete happened.
///
/// # Errors
///
/// Propagates store failures.
pub async fn delete_if_exists(store: &dyn StateStore, key: &ObjectKey) -> Result<bool, StoreError> {
    if store.get(key).await?.is_none() {
        return Ok(false);
    }
    let deleted = store.delete(key).await?;
    if deleted {
        metrics::record_resource_deleted(key.kind.as_str());
        info!("Deleted {}", key);
    }
    Ok(deleted)
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod apply_tests;
