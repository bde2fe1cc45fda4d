// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `app.rs`

#[cfg(test)]
mod tests {
    use crate::builder::{build_desired_state, names};
    use crate::engine::DatabaseEngine;
    use crate::reconcilers::app::reconcile_app_tier;
    use crate::reconcilers::storage::StorageHealth;
    use crate::status_reasons::{REASON_SERVICE_FAILED, REASON_STATEFULSET_FAILED};
    use crate::store::{ResourceKind, WriteOp};
    use crate::test_fixtures::{
        autoscaling, music_service_with, sample_music_service, sample_spec, test_context,
        NAMESPACE,
    };
    use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
    use k8s_openapi::api::core::v1::Service;

    #[tokio::test]
    async fn test_creates_service_and_statefulset() {
        let (ctx, store, _) = test_context(DatabaseEngine::MariaDb);
        let ms = store.insert_music_service(sample_music_service("radio"));
        let desired = build_desired_state(&ms, ctx.engine).unwrap();

        let observation = reconcile_app_tier(&ctx, &ms, &desired.app).await.unwrap();
        assert_eq!(observation.desired, 3);
        assert_eq!(observation.ready, 0);
        assert_eq!(observation.storage, StorageHealth::Healthy);
        assert!(!observation.recreated);

        assert!(store.statefulset(NAMESPACE, "radio").is_some());
        assert!(store.peek::<Service>(NAMESPACE, "radio").is_some());
    }

    #[tokio::test]
    async fn test_reports_ready_replicas_from_live_object() {
        let (ctx, store, _) = test_context(DatabaseEngine::MariaDb);
        let ms = store.insert_music_service(sample_music_service("radio"));
        let desired = build_desired_state(&ms, ctx.engine).unwrap();
        reconcile_app_tier(&ctx, &ms, &desired.app).await.unwrap();

        store.set_statefulset_ready(NAMESPACE, "radio", 2);
        let observation = reconcile_app_tier(&ctx, &ms, &desired.app).await.unwrap();
        assert_eq!(observation.ready, 2);
        assert_eq!(observation.desired, 3);
    }

    #[tokio::test]
    async fn test_autoscaler_removed_when_autoscaling_disabled() {
        let (ctx, store, _) = test_context(DatabaseEngine::MariaDb);
        let mut spec = sample_spec();
        spec.autoscaling = Some(autoscaling(2, 6));
        let ms = store.insert_music_service(music_service_with("radio", spec));
        let desired = build_desired_state(&ms, ctx.engine).unwrap();
        reconcile_app_tier(&ctx, &ms, &desired.app).await.unwrap();
        let hpa_name = names::app_autoscaler("radio");
        assert!(store
            .peek::<HorizontalPodAutoscaler>(NAMESPACE, &hpa_name)
            .is_some());

        let ms = store
            .update_music_service_spec(NAMESPACE, "radio", |spec| spec.autoscaling = None)
            .unwrap();
        let desired = build_desired_state(&ms, ctx.engine).unwrap();
        reconcile_app_tier(&ctx, &ms, &desired.app).await.unwrap();
        assert!(store
            .peek::<HorizontalPodAutoscaler>(NAMESPACE, &hpa_name)
            .is_none());
    }

    #[tokio::test]
    async fn test_failures_carry_step_reason() {
        let (ctx, store, _) = test_context(DatabaseEngine::MariaDb);
        let ms = store.insert_music_service(sample_music_service("radio"));
        let desired = build_desired_state(&ms, ctx.engine).unwrap();

        store.fail_next(WriteOp::Create, Some(ResourceKind::Service));
        let err = reconcile_app_tier(&ctx, &ms, &desired.app)
            .await
            .unwrap_err();
        assert_eq!(err.status_reason(), REASON_SERVICE_FAILED);
        assert!(err.is_retryable());

        store.fail_next(WriteOp::Create, Some(ResourceKind::StatefulSet));
        let err = reconcile_app_tier(&ctx, &ms, &desired.app)
            .await
            .unwrap_err();
        assert_eq!(err.status_reason(), REASON_STATEFULSET_FAILED);
    }
}
