// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `finalizers.rs`

#[cfg(test)]
mod tests {
    use crate::engine::DatabaseEngine;
    use crate::labels::FINALIZER_MUSIC_SERVICE;
    use crate::reconcilers::finalizers::{ensure_finalizer, handle_deletion, remove_finalizer};
    use crate::store::{MemoryStore, ObjectKey, ResourceKind, WriteOp};
    use crate::test_fixtures::{sample_music_service, test_context, NAMESPACE};
    use k8s_openapi::api::core::v1::Secret;
    use kube::api::ObjectMeta;

    #[tokio::test]
    async fn test_ensure_finalizer_is_idempotent() {
        let store = MemoryStore::new();
        let ms = store.insert_music_service(sample_music_service("radio"));

        assert!(ensure_finalizer(&store, &ms, FINALIZER_MUSIC_SERVICE).await.unwrap());
        let ms = store.music_service(NAMESPACE, "radio").unwrap();
        assert_eq!(ms.metadata.finalizers, Some(vec![FINALIZER_MUSIC_SERVICE.to_string()]));

        store.clear_journal();
        assert!(!ensure_finalizer(&store, &ms, FINALIZER_MUSIC_SERVICE).await.unwrap());
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn test_remove_finalizer_keeps_foreign_entries() {
        let store = MemoryStore::new();
        let mut parent = sample_music_service("radio");
        parent.metadata.finalizers = Some(vec![
            "other.example.com/guard".to_string(),
            FINALIZER_MUSIC_SERVICE.to_string(),
        ]);
        let ms = store.insert_music_service(parent);

        assert!(remove_finalizer(&store, &ms, FINALIZER_MUSIC_SERVICE).await.unwrap());
        let ms = store.music_service(NAMESPACE, "radio").unwrap();
        assert_eq!(
            ms.metadata.finalizers,
            Some(vec!["other.example.com/guard".to_string()])
        );
    }

    #[tokio::test]
    async fn test_handle_deletion_releases_credential_then_parent() {
        let (ctx, store, _events) = test_context(DatabaseEngine::MariaDb);
        let ms = store.insert_music_service(sample_music_service("radio"));
        ensure_finalizer(store.as_ref(), &ms, FINALIZER_MUSIC_SERVICE).await.unwrap();
        store.seed_typed(Secret {
            metadata: ObjectMeta {
                name: Some("radio-db-replication".to_string()),
                namespace: Some(NAMESPACE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        });

        store.request_deletion(NAMESPACE, "radio");
        let ms = store.music_service(NAMESPACE, "radio").unwrap();
        assert!(ms.metadata.deletion_timestamp.is_some());

        store.clear_journal();
        handle_deletion(&ctx, &ms, FINALIZER_MUSIC_SERVICE).await.unwrap();

        let ops: Vec<WriteOp> = store.journal().iter().map(|w| w.op).collect();
        assert_eq!(ops, vec![WriteOp::Delete, WriteOp::SetFinalizers]);
        let secret = ObjectKey::new(ResourceKind::Secret, NAMESPACE, "radio-db-replication");
        assert!(store.object(&secret).is_none());
        assert!(store.music_service(NAMESPACE, "radio").is_none());
    }

    #[tokio::test]
    async fn test_failed_cleanup_keeps_finalizer() {
        let (ctx, store, _events) = test_context(DatabaseEngine::MariaDb);
        let ms = store.insert_music_service(sample_music_service("radio"));
        ensure_finalizer(store.as_ref(), &ms, FINALIZER_MUSIC_SERVICE).await.unwrap();
        store.request_deletion(NAMESPACE, "radio");
        let ms = store.music_service(NAMESPACE, "radio").unwrap();

        store.fail_next(WriteOp::SetFinalizers, None);
        let err = handle_deletion(&ctx, &ms, FINALIZER_MUSIC_SERVICE)
            .await
            .unwrap_err();
        assert_eq!(err.status_reason(), "FinalizerFailed");
        assert!(err.is_retryable());
        assert!(store.music_service(NAMESPACE, "radio").is_some());
    }
}
