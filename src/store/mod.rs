// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! State store abstraction over live cluster objects.
//!
//! Reconcilers never talk to the Kubernetes API directly; they go through a
//! [`StateStore`], keyed by `(kind, namespace, name)`. Two implementations exist:
//!
//! - [`KubeStore`] - backed by `kube::Api`, used by the operator binary
//! - [`MemoryStore`] - in-process, with an explicit ownership table and a write
//!   journal, used by tests and dry runs
//!
//! Updates carry the object's `resourceVersion` as an optimistic-concurrency token;
//! a stale token fails with [`StoreError::Conflict`] and is resolved on the next pass.

use crate::crd::{MusicService, MusicServiceStatus};
use crate::errors::StoreError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::fmt;

pub mod cluster;
pub mod memory;

pub use self::cluster::KubeStore;
pub use self::memory::{MemoryStore, WriteOp, WriteRecord};

/// Kinds of child objects the operator manages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    StatefulSet,
    Service,
    HorizontalPodAutoscaler,
    Secret,
    PersistentVolumeClaim,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatefulSet => "StatefulSet",
            Self::Service => "Service",
            Self::HorizontalPodAutoscaler => "HorizontalPodAutoscaler",
            Self::Secret => "Secret",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identity of a child object.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    #[must_use]
    pub fn new(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn not_found(&self) -> StoreError {
        StoreError::NotFound {
            kind: self.kind.to_string(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    pub(crate) fn conflict(&self) -> StoreError {
        StoreError::Conflict {
            kind: self.kind.to_string(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    pub(crate) fn already_exists(&self) -> StoreError {
        StoreError::AlreadyExists {
            kind: self.kind.to_string(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A child object of any managed kind.
#[derive(Clone, Debug, PartialEq)]
pub enum ManagedResource {
    StatefulSet(StatefulSet),
    Service(Service),
    HorizontalPodAutoscaler(HorizontalPodAutoscaler),
    Secret(Secret),
    PersistentVolumeClaim(PersistentVolumeClaim),
}

impl ManagedResource {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::StatefulSet(_) => ResourceKind::StatefulSet,
            Self::Service(_) => ResourceKind::Service,
            Self::HorizontalPodAutoscaler(_) => ResourceKind::HorizontalPodAutoscaler,
            Self::Secret(_) => ResourceKind::Secret,
            Self::PersistentVolumeClaim(_) => ResourceKind::PersistentVolumeClaim,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::StatefulSet(o) => &o.metadata,
            Self::Service(o) => &o.metadata,
            Self::HorizontalPodAutoscaler(o) => &o.metadata,
            Self::Secret(o) => &o.metadata,
            Self::PersistentVolumeClaim(o) => &o.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::StatefulSet(o) => &mut o.metadata,
            Self::Service(o) => &mut o.metadata,
            Self::HorizontalPodAutoscaler(o) => &mut o.metadata,
            Self::Secret(o) => &mut o.metadata,
            Self::PersistentVolumeClaim(o) => &mut o.metadata,
        }
    }

    /// Key built from the object's own metadata.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        let meta = self.metadata();
        ObjectKey {
            kind: self.kind(),
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}

/// Typed view over [`ManagedResource`].
pub trait Managed: Clone + Send + Sync + Sized + 'static {
    const KIND: ResourceKind;

    fn into_managed(self) -> ManagedResource;

    /// Unwrap the typed object, handing back the original on a kind mismatch.
    ///
    /// # Errors
    ///
    /// Returns the resource unchanged if it is of another kind.
    fn from_managed(resource: ManagedResource) -> Result<Self, ManagedResource>;
}

macro_rules! impl_managed {
    ($ty:ty, $variant:ident) => {
        impl Managed for $ty {
            const KIND: ResourceKind = ResourceKind::$variant;

            fn into_managed(self) -> ManagedResource {
                ManagedResource::$variant(self)
            }

            fn from_managed(resource: ManagedResource) -> Result<Self, ManagedResource> {
                match resource {
                    ManagedResource::$variant(obj) => Ok(obj),
                    other => Err(other),
                }
            }
        }
    };
}

impl_managed!(StatefulSet, StatefulSet);
impl_managed!(Service, Service);
impl_managed!(HorizontalPodAutoscaler, HorizontalPodAutoscaler);
impl_managed!(Secret, Secret);
impl_managed!(PersistentVolumeClaim, PersistentVolumeClaim);

/// Get/Create/Update/Delete/List over live objects plus the parent's status and
/// finalizers.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch an object; `Ok(None)` when it does not exist.
    async fn get(&self, key: &ObjectKey) -> Result<Option<ManagedResource>, StoreError>;

    /// Create an object; fails with `AlreadyExists` if the name is taken.
    async fn create(&self, resource: ManagedResource) -> Result<ManagedResource, StoreError>;

    /// Replace an object; its `resourceVersion` must match the live one.
    async fn update(&self, resource: ManagedResource) -> Result<ManagedResource, StoreError>;

    /// Delete an object; `Ok(false)` when it was already gone.
    async fn delete(&self, key: &ObjectKey) -> Result<bool, StoreError>;

    /// List all objects of a kind in a namespace, ordered by name.
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
    ) -> Result<Vec<ManagedResource>, StoreError>;

    /// Fetch the parent resource; `Ok(None)` when it does not exist.
    async fn get_music_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<MusicService>, StoreError>;

    /// Overwrite the parent's finalizer list.
    async fn set_finalizers(
        &self,
        music_service: &MusicService,
        finalizers: &[String],
    ) -> Result<(), StoreError>;

    /// Persist the parent's status document.
    async fn update_status(
        &self,
        music_service: &MusicService,
        status: &MusicServiceStatus,
    ) -> Result<(), StoreError>;
}

fn unexpected_kind<T: Managed>(resource: &ManagedResource) -> StoreError {
    StoreError::UnexpectedKind {
        expected: T::KIND.as_str(),
        found: resource.kind().as_str(),
    }
}

/// Typed [`StateStore::get`].
///
/// # Errors
///
/// Propagates store failures.
pub async fn get<T: Managed>(
    store: &dyn StateStore,
    namespace: &str,
    name: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(&ObjectKey::new(T::KIND, namespace, name)).await? {
        Some(resource) => T::from_managed(resource)
            .map(Some)
            .map_err(|other| unexpected_kind::<T>(&other)),
        None => Ok(None),
    }
}

/// Typed [`StateStore::create`].
///
/// # Errors
///
/// Propagates store failures.
pub async fn create<T: Managed>(store: &dyn StateStore, object: T) -> Result<T, StoreError> {
    let created = store.create(object.into_managed()).await?;
    T::from_managed(created).map_err(|other| unexpected_kind::<T>(&other))
}

/// Typed [`StateStore::update`].
///
/// # Errors
///
/// Propagates store failures, including `Conflict` on a stale `resourceVersion`.
pub async fn update<T: Managed>(store: &dyn StateStore, object: T) -> Result<T, StoreError> {
    let updated = store.update(object.into_managed()).await?;
    T::from_managed(updated).map_err(|other| unexpected_kind::<T>(&other))
}

/// Typed [`StateStore::list`].
///
/// # Errors
///
/// Propagates store failures.
pub async fn list<T: Managed>(
    store: &dyn StateStore,
    namespace: &str,
) -> Result<Vec<T>, StoreError> {
    store
        .list(T::KIND, namespace)
        .await?
        .into_iter()
        .map(|resource| T::from_managed(resource).map_err(|other| unexpected_kind::<T>(&other)))
        .collect()
}
