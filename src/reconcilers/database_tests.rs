// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `database.rs`

#[cfg(test)]
mod tests {
    use crate::builder::{build_desired_state, names};
    use crate::engine::DatabaseEngine;
    use crate::reconcilers::database::reconcile_database_tier;
    use crate::reconcilers::status::DatabaseObservation;
    use crate::store::{ObjectKey, ResourceKind};
    use crate::test_fixtures::{
        autoscaling, ha_database, music_service_with, primary_replica_database,
        sample_music_service, sample_spec, test_context, NAMESPACE,
    };
    use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
    use k8s_openapi::api::core::v1::Service;

    #[tokio::test]
    async fn test_no_database_tier_reports_none() {
        let (ctx, store, _) = test_context(DatabaseEngine::MariaDb);
        let ms = store.insert_music_service(sample_music_service("radio"));
        let desired = build_desired_state(&ms, ctx.engine).unwrap();

        let report = reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap();
        assert!(report.is_none());
        assert!(store.statefulset(NAMESPACE, &names::db_master("radio")).is_none());
    }

    #[tokio::test]
    async fn test_primary_replica_creates_master_and_replicas() {
        let (ctx, store, _) = test_context(DatabaseEngine::MariaDb);
        let mut spec = sample_spec();
        spec.database = Some(primary_replica_database(2));
        let ms = store.insert_music_service(music_service_with("radio", spec));
        let desired = build_desired_state(&ms, ctx.engine).unwrap();

        let report = reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.tracked_workload, Some(names::db_replica("radio")));
        // The replica workload did not exist when the pass started.
        assert_eq!(
            report.observation,
            DatabaseObservation::PrimaryReplica {
                master_ready: 0,
                replicas_ready: None,
            }
        );
        assert!(store.statefulset(NAMESPACE, &names::db_master("radio")).is_some());
        assert!(store.statefulset(NAMESPACE, &names::db_replica("radio")).is_some());
        assert!(store.peek::<Service>(NAMESPACE, &names::db_read("radio")).is_some());

        store.set_statefulset_ready(NAMESPACE, &names::db_master("radio"), 1);
        store.set_statefulset_ready(NAMESPACE, &names::db_replica("radio"), 2);
        let report = reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            report.observation,
            DatabaseObservation::PrimaryReplica {
                master_ready: 1,
                replicas_ready: Some(2),
            }
        );
    }

    #[tokio::test]
    async fn test_zero_replicas_removes_replica_objects() {
        let (ctx, store, _) = test_context(DatabaseEngine::MariaDb);
        let mut spec = sample_spec();
        spec.database = Some(primary_replica_database(2));
        let ms = store.insert_music_service(music_service_with("radio", spec));
        let desired = build_desired_state(&ms, ctx.engine).unwrap();
        reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap();

        let ms = store
            .update_music_service_spec(NAMESPACE, "radio", |spec| {
                if let Some(db) = spec.database.as_mut() {
                    db.replicas = 0;
                }
            })
            .unwrap();
        let desired = build_desired_state(&ms, ctx.engine).unwrap();
        let report = reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap()
            .unwrap();
        assert!(report.tracked_workload.is_none());
        assert!(store.statefulset(NAMESPACE, &names::db_replica("radio")).is_none());
        assert!(store.peek::<Service>(NAMESPACE, &names::db_read("radio")).is_none());
        assert!(store.statefulset(NAMESPACE, &names::db_master("radio")).is_some());
    }

    #[tokio::test]
    async fn test_external_replica_deletion_is_observed_then_repaired() {
        let (ctx, store, _) = test_context(DatabaseEngine::MariaDb);
        let mut spec = sample_spec();
        spec.database = Some(primary_replica_database(1));
        let ms = store.insert_music_service(music_service_with("radio", spec));
        let desired = build_desired_state(&ms, ctx.engine).unwrap();
        reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap();

        let replica = names::db_replica("radio");
        assert!(store.remove_external(&ObjectKey::new(
            ResourceKind::StatefulSet,
            NAMESPACE,
            &replica
        )));
        let report = reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!report.observation.tracked_tier_present());
        assert!(store.statefulset(NAMESPACE, &replica).is_some());
    }

    #[tokio::test]
    async fn test_high_availability_creates_cluster_only() {
        let (ctx, store, _) = test_context(DatabaseEngine::MariaDb);
        let mut spec = sample_spec();
        spec.database = Some(ha_database(2));
        let ms = store.insert_music_service(music_service_with("radio", spec));
        let desired = build_desired_state(&ms, ctx.engine).unwrap();

        let report = reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            report.observation,
            DatabaseObservation::HighAvailability { nodes: 3, .. }
        ));
        assert!(store.statefulset(NAMESPACE, &names::db_cluster("radio")).is_some());
        assert!(store.statefulset(NAMESPACE, &names::db_master("radio")).is_none());
        assert!(store.statefulset(NAMESPACE, &names::db_replica("radio")).is_none());
    }

    #[tokio::test]
    async fn test_topology_switch_retires_previous_shape() {
        let (ctx, store, _) = test_context(DatabaseEngine::MariaDb);
        let mut spec = sample_spec();
        spec.database = Some(primary_replica_database(2));
        let ms = store.insert_music_service(music_service_with("radio", spec));
        let desired = build_desired_state(&ms, ctx.engine).unwrap();
        reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap();

        let ms = store
            .update_music_service_spec(NAMESPACE, "radio", |spec| {
                spec.database = Some(ha_database(2));
            })
            .unwrap();
        let desired = build_desired_state(&ms, ctx.engine).unwrap();
        let report = reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.tracked_workload, Some(names::db_cluster("radio")));
        assert!(store.statefulset(NAMESPACE, &names::db_cluster("radio")).is_some());
        assert!(store.statefulset(NAMESPACE, &names::db_master("radio")).is_none());
        assert!(store.statefulset(NAMESPACE, &names::db_replica("radio")).is_none());
        for service in [
            names::db_master("radio"),
            names::db_replica("radio"),
            names::db_read("radio"),
        ] {
            assert!(store.peek::<Service>(NAMESPACE, &service).is_none(), "{service}");
        }

        let ms = store
            .update_music_service_spec(NAMESPACE, "radio", |spec| {
                spec.database = Some(primary_replica_database(1));
            })
            .unwrap();
        let desired = build_desired_state(&ms, ctx.engine).unwrap();
        reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap();
        assert!(store.statefulset(NAMESPACE, &names::db_cluster("radio")).is_none());
        assert!(store
            .peek::<Service>(NAMESPACE, &names::db_cluster_discovery("radio"))
            .is_none());
        assert!(store.peek::<Service>(NAMESPACE, &names::db_client("radio")).is_none());
        assert!(store.statefulset(NAMESPACE, &names::db_master("radio")).is_some());
    }

    #[tokio::test]
    async fn test_replica_autoscaler_applied_and_removed() {
        let (ctx, store, _) = test_context(DatabaseEngine::MariaDb);
        let mut spec = sample_spec();
        let mut db = primary_replica_database(2);
        db.autoscaling = Some(autoscaling(1, 4));
        spec.database = Some(db);
        let ms = store.insert_music_service(music_service_with("radio", spec));
        let desired = build_desired_state(&ms, ctx.engine).unwrap();
        reconcile_database_tier(
            &ctx,
            &ms,
            &desired.database,
            desired.database_autoscaler.as_ref(),
        )
        .await
        .unwrap();
        let hpa = names::db_replica_autoscaler("radio");
        assert!(store.peek::<HorizontalPodAutoscaler>(NAMESPACE, &hpa).is_some());

        reconcile_database_tier(&ctx, &ms, &desired.database, None)
            .await
            .unwrap();
        assert!(store.peek::<HorizontalPodAutoscaler>(NAMESPACE, &hpa).is_none());
    }
}
