// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `apply.rs`

#[cfg(test)]
mod tests {
    use crate::builder::app::{build_app_service, build_app_statefulset};
    use crate::reconcilers::apply::{delete_if_exists, ensure, Applied};
    use crate::store::{MemoryStore, ObjectKey, ResourceKind, WriteOp};
    use crate::test_fixtures::{music_service_with, sample_music_service, sample_spec, NAMESPACE};

    #[tokio::test]
    async fn test_ensure_creates_then_is_idempotent() {
        let store = MemoryStore::new();
        let svc = build_app_service(&sample_music_service("radio"));

        let (applied, created) = ensure(&store, &svc, false).await.unwrap();
        assert_eq!(applied, Applied::Created);
        assert!(created.metadata.resource_version.is_some());

        store.clear_journal();
        let (applied, _) = ensure(&store, &svc, false).await.unwrap();
        assert_eq!(applied, Applied::Unchanged);
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_updates_changed_image() {
        let store = MemoryStore::new();
        let sts = build_app_statefulset(&sample_music_service("radio"));
        ensure(&store, &sts, false).await.unwrap();

        let mut spec = sample_spec();
        spec.image = "mixcorp/streamer:2.0".to_string();
        let desired = build_app_statefulset(&music_service_with("radio", spec));

        store.clear_journal();
        let (applied, live) = ensure(&store, &desired, false).await.unwrap();
        assert_eq!(applied, Applied::Updated);
        let journal = store.journal();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].op, WriteOp::Update);

        let container = &live.spec.unwrap().template.spec.unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("mixcorp/streamer:2.0"));
    }

    #[tokio::test]
    async fn test_delete_if_exists_skips_missing_object() {
        let store = MemoryStore::new();
        let key = ObjectKey::new(ResourceKind::Service, NAMESPACE, "radio");
        assert!(!delete_if_exists(&store, &key).await.unwrap());
        assert!(store.journal().is_empty());

        ensure(&store, &build_app_service(&sample_music_service("radio")), false)
            .await
            .unwrap();
        assert!(delete_if_exists(&store, &key).await.unwrap());
        assert!(store.object(&key).is_none());
    }
}
