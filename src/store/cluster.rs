// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`StateStore`] backed by the Kubernetes API.

use super::{ManagedResource, ObjectKey, ResourceKind, StateStore};
use crate::crd::{MusicService, MusicServiceStatus};
use crate::errors::StoreError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Debug;
use tracing::debug;

/// Optional status fields that must be sent as explicit `null` to be cleared by a
/// merge patch.
const CLEARABLE_STATUS_FIELDS: &[&str] = &["phase", "lastError", "database"];

/// Live cluster store.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get_typed<K>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        Ok(self.api::<K>(&key.namespace).get_opt(&key.name).await?)
    }

    async fn create_typed<K>(&self, key: &ObjectKey, object: &K) -> Result<K, StoreError>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + Serialize
            + DeserializeOwned,
    {
        self.api::<K>(&key.namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|err| match api_code(&err) {
                Some(409) => key.already_exists(),
                _ => err.into(),
            })
    }

    async fn replace_typed<K>(&self, key: &ObjectKey, object: &K) -> Result<K, StoreError>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + Serialize
            + DeserializeOwned,
    {
        self.api::<K>(&key.namespace)
            .replace(&key.name, &PostParams::default(), object)
            .await
            .map_err(|err| match api_code(&err) {
                Some(404) => key.not_found(),
                Some(409) => key.conflict(),
                _ => err.into(),
            })
    }

    async fn delete_typed<K>(&self, key: &ObjectKey) -> Result<bool, StoreError>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        match self
            .api::<K>(&key.namespace)
            .delete(&key.name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if api_code(&err) == Some(404) => {
                debug!(
                    kind = %key.kind,
                    namespace = %key.namespace,
                    name = %key.name,
                    "already deleted"
                );
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list_typed<K>(&self, namespace: &str) -> Result<Vec<K>, StoreError>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        let mut items = self
            .api::<K>(namespace)
            .list(&ListParams::default())
            .await?
            .items;
        items.sort_by_key(|item| item.name_any());
        Ok(items)
    }
}

fn api_code(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(api_err) => Some(api_err.code),
        _ => None,
    }
}

/// Dispatch a typed call on every [`ManagedResource`] variant.
macro_rules! dispatch {
    ($resource:expr, $obj:ident => $call:expr) => {
        match $resource {
            ManagedResource::StatefulSet($obj) => $call.map(ManagedResource::StatefulSet),
            ManagedResource::Service($obj) => $call.map(ManagedResource::Service),
            ManagedResource::HorizontalPodAutoscaler($obj) => {
                $call.map(ManagedResource::HorizontalPodAutoscaler)
            }
            ManagedResource::Secret($obj) => $call.map(ManagedResource::Secret),
            ManagedResource::PersistentVolumeClaim($obj) => {
                $call.map(ManagedResource::PersistentVolumeClaim)
            }
        }
    };
}

#[async_trait]
impl StateStore for KubeStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ManagedResource>, StoreError> {
        Ok(match key.kind {
            ResourceKind::StatefulSet => self
                .get_typed::<StatefulSet>(key)
                .await?
                .map(ManagedResource::StatefulSet),
            ResourceKind::Service => self
                .get_typed::<Service>(key)
                .await?
                .map(ManagedResource::Service),
            ResourceKind::HorizontalPodAutoscaler => self
                .get_typed::<HorizontalPodAutoscaler>(key)
                .await?
                .map(ManagedResource::HorizontalPodAutoscaler),
            ResourceKind::Secret => self
                .get_typed::<Secret>(key)
                .await?
                .map(ManagedResource::Secret),
            ResourceKind::PersistentVolumeClaim => self
                .get_typed::<PersistentVolumeClaim>(key)
                .await?
                .map(ManagedResource::PersistentVolumeClaim),
        })
    }

    async fn create(&self, resource: ManagedResource) -> Result<ManagedResource, StoreError> {
        let key = resource.key();
        dispatch!(resource, obj => self.create_typed(&key, &obj).await)
    }

    async fn update(&self, resource: ManagedResource) -> Result<ManagedResource, StoreError> {
        let key = resource.key();
        dispatch!(resource, obj => self.replace_typed(&key, &obj).await)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        match key.kind {
            ResourceKind::StatefulSet => self.delete_typed::<StatefulSet>(key).await,
            ResourceKind::Service => self.delete_typed::<Service>(key).await,
            ResourceKind::HorizontalPodAutoscaler => {
                self.delete_typed::<HorizontalPodAutoscaler>(key).await
            }
            ResourceKind::Secret => self.delete_typed::<Secret>(key).await,
            ResourceKind::PersistentVolumeClaim => {
                self.delete_typed::<PersistentVolumeClaim>(key).await
            }
        }
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
    ) -> Result<Vec<ManagedResource>, StoreError> {
        Ok(match kind {
            ResourceKind::StatefulSet => self
                .list_typed::<StatefulSet>(namespace)
                .await?
                .into_iter()
                .map(ManagedResource::StatefulSet)
                .collect(),
            ResourceKind::Service => self
                .list_typed::<Service>(namespace)
                .await?
                .into_iter()
                .map(ManagedResource::Service)
                .collect(),
            ResourceKind::HorizontalPodAutoscaler => self
                .list_typed::<HorizontalPodAutoscaler>(namespace)
                .await?
                .into_iter()
                .map(ManagedResource::HorizontalPodAutoscaler)
                .collect(),
            ResourceKind::Secret => self
                .list_typed::<Secret>(namespace)
                .await?
                .into_iter()
                .map(ManagedResource::Secret)
                .collect(),
            ResourceKind::PersistentVolumeClaim => self
                .list_typed::<PersistentVolumeClaim>(namespace)
                .await?
                .into_iter()
                .map(ManagedResource::PersistentVolumeClaim)
                .collect(),
        })
    }

    async fn get_music_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<MusicService>, StoreError> {
        Ok(self.api::<MusicService>(namespace).get_opt(name).await?)
    }

    async fn set_finalizers(
        &self,
        music_service: &MusicService,
        finalizers: &[String],
    ) -> Result<(), StoreError> {
        let namespace = music_service.namespace().unwrap_or_default();
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        self.api::<MusicService>(&namespace)
            .patch(
                &music_service.name_any(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await?;
        Ok(())
    }

    async fn update_status(
        &self,
        music_service: &MusicService,
        status: &MusicServiceStatus,
    ) -> Result<(), StoreError> {
        let namespace = music_service.namespace().unwrap_or_default();
        let mut body = serde_json::to_value(status)?;
        if let Value::Object(fields) = &mut body {
            for field in CLEARABLE_STATUS_FIELDS {
                fields.entry(*field).or_insert(Value::Null);
            }
        }
        let patch = json!({ "status": body });
        self.api::<MusicService>(&namespace)
            .patch_status(
                &music_service.name_any(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await?;
        Ok(())
    }
}
