// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`StateStore`] with an explicit ownership table.
//!
//! Owner references recorded on child objects are mirrored into a child-to-owner
//! table. Deleting an owner cascades deterministically (in key order) to every
//! object that names it, and a write that would make the graph cyclic is refused.
//! Every write the operator performs is appended to a journal so tests can assert
//! on exactly what a pass changed.
//!
//! Methods outside the trait (`seed`, `set_statefulset_ready`, `provision_claims`,
//! `remove_external`, ...) play the part of other cluster actors and are not
//! journaled.

use super::{Managed, ManagedResource, ObjectKey, ResourceKind, StateStore};
use crate::crd::{MusicService, MusicServiceSpec, MusicServiceStatus};
use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetStatus};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PersistentVolumeClaimStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

const PARENT_KIND: &str = "MusicService";

/// Kind of write recorded in the journal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WriteOp {
    Create,
    Update,
    Delete,
    UpdateStatus,
    SetFinalizers,
}

/// One journaled write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRecord {
    pub op: WriteOp,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<ObjectKey, ManagedResource>,
    parents: BTreeMap<(String, String), MusicService>,
    /// child uid -> owner uids
    owners: BTreeMap<String, BTreeSet<String>>,
    next_id: u64,
    journal: Vec<WriteRecord>,
    injected_failures: Vec<(WriteOp, Option<ResourceKind>)>,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, op: WriteOp, kind: &str, namespace: &str, name: &str) {
        self.journal.push(WriteRecord {
            op,
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
    }

    fn take_failure(&mut self, op: WriteOp, kind: Option<ResourceKind>) -> Option<StoreError> {
        let position = self
            .injected_failures
            .iter()
            .position(|(o, k)| *o == op && *k == kind)?;
        self.injected_failures.remove(position);
        Some(StoreError::Api(kube::Error::Api(
            kube::core::Status::failure(&format!("injected {op:?} failure"), "ServiceUnavailable")
                .with_code(503)
                .boxed(),
        )))
    }

    fn owner_uids(meta: &ObjectMeta) -> BTreeSet<String> {
        meta.owner_references
            .iter()
            .flatten()
            .map(|reference| reference.uid.clone())
            .collect()
    }

    /// Refuse owner edges that would reach `child` again.
    fn check_acyclic(&self, child: &str, owners: &BTreeSet<String>) -> Result<(), StoreError> {
        let mut pending: Vec<&str> = owners.iter().map(String::as_str).collect();
        let mut visited = BTreeSet::new();
        while let Some(uid) = pending.pop() {
            if uid == child {
                return Err(StoreError::CyclicOwnership {
                    child: child.to_string(),
                    owner: owners.iter().cloned().collect::<Vec<_>>().join(","),
                });
            }
            if visited.insert(uid) {
                if let Some(next) = self.owners.get(uid) {
                    pending.extend(next.iter().map(String::as_str));
                }
            }
        }
        Ok(())
    }

    /// Delete every object owned (transitively) by `owner_uid`.
    fn cascade(&mut self, owner_uid: &str) {
        let mut pending = vec![owner_uid.to_string()];
        let mut visited = BTreeSet::new();
        while let Some(uid) = pending.pop() {
            if !visited.insert(uid.clone()) {
                continue;
            }
            let children: Vec<ObjectKey> = self
                .objects
                .iter()
                .filter(|(_, obj)| {
                    obj.metadata()
                        .uid
                        .as_ref()
                        .and_then(|child| self.owners.get(child))
                        .is_some_and(|owners| owners.contains(&uid))
                })
                .map(|(key, _)| key.clone())
                .collect();
            for key in children {
                if let Some(obj) = self.objects.remove(&key) {
                    if let Some(child_uid) = obj.metadata().uid.clone() {
                        self.owners.remove(&child_uid);
                        pending.push(child_uid);
                    }
                }
            }
        }
    }

    fn remove_object(&mut self, key: &ObjectKey) -> bool {
        match self.objects.remove(key) {
            Some(obj) => {
                if let Some(uid) = obj.metadata().uid.clone() {
                    self.owners.remove(&uid);
                    self.cascade(&uid);
                }
                true
            }
            None => false,
        }
    }

    fn remove_parent(&mut self, namespace: &str, name: &str) {
        if let Some(parent) = self
            .parents
            .remove(&(namespace.to_string(), name.to_string()))
        {
            if let Some(uid) = parent.metadata.uid {
                self.cascade(&uid);
            }
        }
    }
}

/// In-process store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add (or replace) a parent as the API server would on `kubectl apply`.
    ///
    /// Assigns a uid and sets `generation` to 1 when missing.
    pub fn insert_music_service(&self, mut music_service: MusicService) -> MusicService {
        let mut inner = self.lock();
        let id = inner.next_id();
        let meta = &mut music_service.metadata;
        meta.uid.get_or_insert_with(|| format!("uid-{id}"));
        meta.generation.get_or_insert(1);
        meta.namespace.get_or_insert_with(|| "default".to_string());
        meta.resource_version = Some(id.to_string());
        let key = (
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        );
        inner.parents.insert(key, music_service.clone());
        music_service
    }

    /// Edit a parent's spec, bumping its generation.
    pub fn update_music_service_spec(
        &self,
        namespace: &str,
        name: &str,
        edit: impl FnOnce(&mut MusicServiceSpec),
    ) -> Option<MusicService> {
        let mut inner = self.lock();
        let id = inner.next_id();
        let parent = inner
            .parents
            .get_mut(&(namespace.to_string(), name.to_string()))?;
        edit(&mut parent.spec);
        parent.metadata.generation = Some(parent.metadata.generation.unwrap_or(0) + 1);
        parent.metadata.resource_version = Some(id.to_string());
        Some(parent.clone())
    }

    /// Current copy of a parent.
    #[must_use]
    pub fn music_service(&self, namespace: &str, name: &str) -> Option<MusicService> {
        self.lock()
            .parents
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Delete a parent as a user would. With finalizers present the parent only
    /// gains a deletion timestamp; otherwise it is removed and its children cascade.
    pub fn request_deletion(&self, namespace: &str, name: &str) {
        let mut inner = self.lock();
        let key = (namespace.to_string(), name.to_string());
        let has_finalizers = match inner.parents.get_mut(&key) {
            Some(parent) => {
                parent.metadata.deletion_timestamp = deletion_timestamp();
                parent
                    .metadata
                    .finalizers
                    .as_ref()
                    .is_some_and(|f| !f.is_empty())
            }
            None => return,
        };
        if !has_finalizers {
            inner.remove_parent(namespace, name);
        }
    }

    /// Insert an object as another actor would (not journaled).
    pub fn seed(&self, mut resource: ManagedResource) -> ManagedResource {
        let mut inner = self.lock();
        let id = inner.next_id();
        let meta = resource.metadata_mut();
        meta.uid.get_or_insert_with(|| format!("uid-{id}"));
        meta.resource_version = Some(id.to_string());
        let uid = meta.uid.clone().unwrap_or_default();
        let owners = Inner::owner_uids(resource.metadata());
        inner.owners.insert(uid, owners);
        inner.objects.insert(resource.key(), resource.clone());
        resource
    }

    /// Current copy of an object.
    #[must_use]
    pub fn object(&self, key: &ObjectKey) -> Option<ManagedResource> {
        self.lock().objects.get(key).cloned()
    }

    /// Typed current copy of an object.
    #[must_use]
    pub fn peek<T: Managed>(&self, namespace: &str, name: &str) -> Option<T> {
        self.object(&ObjectKey::new(T::KIND, namespace, name))
            .and_then(|obj| T::from_managed(obj).ok())
    }

    /// Delete an object as another actor would (not journaled); children cascade.
    pub fn remove_external(&self, key: &ObjectKey) -> bool {
        self.lock().remove_object(key)
    }

    /// Report `ready` pods for a `StatefulSet`, as its controller would.
    pub fn set_statefulset_ready(&self, namespace: &str, name: &str, ready: i32) -> bool {
        let mut inner = self.lock();
        let key = ObjectKey::new(ResourceKind::StatefulSet, namespace, name);
        let Some(ManagedResource::StatefulSet(sts)) = inner.objects.get_mut(&key) else {
            return false;
        };
        let replicas = sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        sts.status = Some(StatefulSetStatus {
            replicas,
            ready_replicas: Some(ready),
            ..Default::default()
        });
        true
    }

    /// Create the bound claims a `StatefulSet` controller would create for each
    /// claim template and ordinal. Existing claims are left untouched.
    pub fn provision_claims(&self, namespace: &str, statefulset: &str) -> Vec<String> {
        let mut inner = self.lock();
        let key = ObjectKey::new(ResourceKind::StatefulSet, namespace, statefulset);
        let Some(ManagedResource::StatefulSet(sts)) = inner.objects.get(&key).cloned() else {
            return Vec::new();
        };
        let Some(spec) = sts.spec else {
            return Vec::new();
        };
        let replicas = spec.replicas.unwrap_or(1);
        let mut created = Vec::new();
        for template in spec.volume_claim_templates.iter().flatten() {
            let template_name = template.metadata.name.clone().unwrap_or_default();
            for ordinal in 0..replicas {
                let name = format!("{template_name}-{statefulset}-{ordinal}");
                let claim_key =
                    ObjectKey::new(ResourceKind::PersistentVolumeClaim, namespace, &name);
                if inner.objects.contains_key(&claim_key) {
                    continue;
                }
                let id = inner.next_id();
                let claim = PersistentVolumeClaim {
                    metadata: ObjectMeta {
                        name: Some(name.clone()),
                        namespace: Some(namespace.to_string()),
                        uid: Some(format!("uid-{id}")),
                        resource_version: Some(id.to_string()),
                        labels: spec
                            .selector
                            .match_labels
                            .clone(),
                        ..Default::default()
                    },
                    spec: template.spec.clone(),
                    status: Some(PersistentVolumeClaimStatus {
                        phase: Some("Bound".to_string()),
                        ..Default::default()
                    }),
                };
                inner
                    .objects
                    .insert(claim_key, ManagedResource::PersistentVolumeClaim(claim));
                created.push(name);
            }
        }
        created
    }

    /// Override a claim's binding phase.
    pub fn set_claim_phase(&self, namespace: &str, name: &str, phase: &str) -> bool {
        let mut inner = self.lock();
        let key = ObjectKey::new(ResourceKind::PersistentVolumeClaim, namespace, name);
        let Some(ManagedResource::PersistentVolumeClaim(claim)) = inner.objects.get_mut(&key)
        else {
            return false;
        };
        claim.status.get_or_insert_with(Default::default).phase = Some(phase.to_string());
        true
    }

    /// Make the next matching write fail with a transient API error.
    ///
    /// `kind` is `None` for writes to the parent (status and finalizers).
    pub fn fail_next(&self, op: WriteOp, kind: Option<ResourceKind>) {
        self.lock().injected_failures.push((op, kind));
    }

    /// Writes performed through the trait since the last [`Self::clear_journal`].
    #[must_use]
    pub fn journal(&self) -> Vec<WriteRecord> {
        self.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    /// Number of stored child objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Keys of every stored child object, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.lock().objects.keys().cloned().collect()
    }
}

fn deletion_timestamp() -> Option<Time> {
    serde_json::from_value(serde_json::Value::String(
        Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    ))
    .ok()
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ManagedResource>, StoreError> {
        Ok(self.lock().objects.get(key).cloned())
    }

    async fn create(&self, mut resource: ManagedResource) -> Result<ManagedResource, StoreError> {
        let mut inner = self.lock();
        let key = resource.key();
        if let Some(err) = inner.take_failure(WriteOp::Create, Some(key.kind)) {
            return Err(err);
        }
        if inner.objects.contains_key(&key) {
            return Err(key.already_exists());
        }
        let id = inner.next_id();
        let uid = format!("uid-{id}");
        let owners = Inner::owner_uids(resource.metadata());
        inner.check_acyclic(&uid, &owners)?;

        let meta = resource.metadata_mut();
        meta.uid = Some(uid.clone());
        meta.resource_version = Some(id.to_string());
        inner.owners.insert(uid, owners);
        inner.objects.insert(key.clone(), resource.clone());
        inner.record(WriteOp::Create, key.kind.as_str(), &key.namespace, &key.name);
        Ok(resource)
    }

    async fn update(&self, mut resource: ManagedResource) -> Result<ManagedResource, StoreError> {
        let mut inner = self.lock();
        let key = resource.key();
        if let Some(err) = inner.take_failure(WriteOp::Update, Some(key.kind)) {
            return Err(err);
        }
        let Some(current) = inner.objects.get(&key) else {
            return Err(key.not_found());
        };
        let current_meta = current.metadata().clone();
        if resource.metadata().resource_version != current_meta.resource_version {
            return Err(key.conflict());
        }
        let uid = current_meta.uid.unwrap_or_default();
        let owners = Inner::owner_uids(resource.metadata());
        inner.check_acyclic(&uid, &owners)?;

        let id = inner.next_id();
        let meta = resource.metadata_mut();
        meta.uid = Some(uid.clone());
        meta.resource_version = Some(id.to_string());
        inner.owners.insert(uid, owners);
        inner.objects.insert(key.clone(), resource.clone());
        inner.record(WriteOp::Update, key.kind.as_str(), &key.namespace, &key.name);
        Ok(resource)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if let Some(err) = inner.take_failure(WriteOp::Delete, Some(key.kind)) {
            return Err(err);
        }
        let removed = inner.remove_object(key);
        if removed {
            inner.record(WriteOp::Delete, key.kind.as_str(), &key.namespace, &key.name);
        }
        Ok(removed)
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
    ) -> Result<Vec<ManagedResource>, StoreError> {
        Ok(self
            .lock()
            .objects
            .iter()
            .filter(|(key, _)| key.kind == kind && key.namespace == namespace)
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn get_music_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<MusicService>, StoreError> {
        Ok(self.music_service(namespace, name))
    }

    async fn set_finalizers(
        &self,
        music_service: &MusicService,
        finalizers: &[String],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(err) = inner.take_failure(WriteOp::SetFinalizers, None) {
            return Err(err);
        }
        let namespace = music_service.metadata.namespace.clone().unwrap_or_default();
        let name = music_service.metadata.name.clone().unwrap_or_default();
        let id = inner.next_id();
        let Some(parent) = inner.parents.get_mut(&(namespace.clone(), name.clone())) else {
            return Err(StoreError::NotFound {
                kind: PARENT_KIND.to_string(),
                namespace,
                name,
            });
        };
        parent.metadata.finalizers = Some(finalizers.to_vec());
        parent.metadata.resource_version = Some(id.to_string());
        let release = parent.metadata.deletion_timestamp.is_some() && finalizers.is_empty();
        inner.record(WriteOp::SetFinalizers, PARENT_KIND, &namespace, &name);
        if release {
            inner.remove_parent(&namespace, &name);
        }
        Ok(())
    }

    async fn update_status(
        &self,
        music_service: &MusicService,
        status: &MusicServiceStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(err) = inner.take_failure(WriteOp::UpdateStatus, None) {
            return Err(err);
        }
        let namespace = music_service.metadata.namespace.clone().unwrap_or_default();
        let name = music_service.metadata.name.clone().unwrap_or_default();
        let id = inner.next_id();
        let Some(parent) = inner.parents.get_mut(&(namespace.clone(), name.clone())) else {
            return Err(StoreError::NotFound {
                kind: PARENT_KIND.to_string(),
                namespace,
                name,
            });
        };
        parent.status = Some(status.clone());
        parent.metadata.resource_version = Some(id.to_string());
        inner.record(WriteOp::UpdateStatus, PARENT_KIND, &namespace, &name);
        Ok(())
    }
}

impl MemoryStore {
    /// Typed convenience around [`Self::seed`].
    pub fn seed_typed<T: Managed>(&self, object: T) -> Option<T> {
        T::from_managed(self.seed(object.into_managed())).ok()
    }

    /// Typed `StatefulSet` lookup, mostly for assertions.
    #[must_use]
    pub fn statefulset(&self, namespace: &str, name: &str) -> Option<StatefulSet> {
        self.peek::<StatefulSet>(namespace, name)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
