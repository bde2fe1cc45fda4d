// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::builder::StorageTier;
    use crate::crd::{DatabaseStatus, Phase};
    use crate::reconcilers::status::{
        app_availability, conditions_equal, create_condition, database_status, find_condition,
        replica_history_condition, storage_condition, update_condition_in_memory,
        DatabaseObservation, MusicServiceStatusUpdater,
    };
    use crate::reconcilers::storage::StorageHealth;
    use crate::status_reasons::{
        CONDITION_FALSE, CONDITION_TRUE, CONDITION_TYPE_APP_STORAGE, CONDITION_TYPE_AVAILABLE,
        CONDITION_TYPE_DATABASE_STORAGE, CONDITION_TYPE_RECONCILED,
        CONDITION_TYPE_REPLICA_HISTORY, REASON_PODS_NOT_READY, REASON_PODS_PROGRESSING,
        REASON_RECONCILE_SUCCESS, REASON_REPLICA_DELETED, REASON_SHRINK_NOT_SUPPORTED,
        REASON_STATEFULSET_FAILED,
    };
    use crate::store::MemoryStore;
    use crate::test_fixtures::{sample_music_service, NAMESPACE};

    const REPLICA: &str = "radio-db-replica";
    const CLUSTER: &str = "radio-db-cluster";

    #[test]
    fn test_transition_time_kept_when_status_unchanged() {
        let mut conditions = vec![create_condition(
            CONDITION_TYPE_AVAILABLE,
            CONDITION_FALSE,
            "PodsNotReady",
            "Waiting for pods to be ready",
            Some(1),
        )];
        conditions[0].last_transition_time = Some("2025-01-01T00:00:00+00:00".to_string());

        update_condition_in_memory(
            &mut conditions,
            CONDITION_TYPE_AVAILABLE,
            CONDITION_FALSE,
            REASON_PODS_PROGRESSING,
            "Waiting for pods: 1/3 ready",
            Some(1),
        );
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );
        assert_eq!(conditions[0].reason.as_deref(), Some(REASON_PODS_PROGRESSING));

        update_condition_in_memory(
            &mut conditions,
            CONDITION_TYPE_AVAILABLE,
            CONDITION_TRUE,
            "PodsReady",
            "All replicas are ready",
            Some(1),
        );
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_conditions_equal_ignores_timestamps() {
        let mut a = create_condition("Available", "True", "PodsReady", "ok", Some(2));
        let b = create_condition("Available", "True", "PodsReady", "ok", Some(2));
        a.last_transition_time = Some("earlier".to_string());
        assert!(conditions_equal(&[a.clone()], &[b.clone()]));

        let c = create_condition("Available", "True", "PodsReady", "ok", Some(3));
        assert!(!conditions_equal(&[a.clone()], &[c]));
        assert!(!conditions_equal(&[a], &[]));
    }

    #[test]
    fn test_phase_follows_ready_replicas() {
        let pending = app_availability(3, 0);
        assert_eq!(pending.phase, Phase::Pending);
        assert_eq!(pending.status, CONDITION_FALSE);
        assert_eq!(pending.message, "Waiting for pods to be ready");

        let progressing = app_availability(3, 2);
        assert_eq!(progressing.phase, Phase::Progressing);
        assert_eq!(progressing.message, "Waiting for pods: 2/3 ready");

        let available = app_availability(3, 3);
        assert_eq!(available.phase, Phase::Available);
        assert_eq!(available.status, CONDITION_TRUE);
        assert_eq!(available.message, "All replicas are ready");

    }

    #[test]
    fn test_zero_ready_is_pending_even_when_scaled_to_zero() {
        let idle = app_availability(0, 0);
        assert_eq!(idle.phase, Phase::Pending);
        assert_eq!(idle.status, CONDITION_FALSE);
        assert_eq!(idle.reason, REASON_PODS_NOT_READY);
    }

    #[test]
    fn test_storage_condition_messages() {
        let (status, _, message) = storage_condition(&StorageHealth::Healthy);
        assert_eq!(status, CONDITION_TRUE);
        assert_eq!(message, "Storage requests are within expected bounds");

        let (status, reason, message) = storage_condition(&StorageHealth::ShrinkRefused {
            desired: "1Gi".to_string(),
            current: "5Gi".to_string(),
        });
        assert_eq!(status, CONDITION_FALSE);
        assert_eq!(reason, REASON_SHRINK_NOT_SUPPORTED);
        assert_eq!(
            message,
            "Requested storage size 1Gi is smaller than current PVC size 5Gi"
        );

        let (_, _, message) = storage_condition(&StorageHealth::ClaimsNotBound {
            claims: vec!["a".to_string(), "b".to_string()],
        });
        assert_eq!(message, "Volume claims not bound: a, b");
    }

    #[test]
    fn test_primary_replica_database_status() {
        let status = database_status(
            None,
            DatabaseObservation::PrimaryReplica {
                master_ready: 1,
                replicas_ready: Some(2),
            },
            Some(REPLICA),
        );
        assert_eq!(status.phase.as_deref(), Some("Ready"));
        assert!(status.master_ready);
        assert_eq!(status.replicas_ready, 2);
        assert!(status.replication_ready);
        assert!(status.replica_ever_created);
        assert!(!status.replica_deletion_detected);

        let pending = database_status(
            None,
            DatabaseObservation::PrimaryReplica {
                master_ready: 0,
                replicas_ready: None,
            },
            None,
        );
        assert_eq!(pending.phase.as_deref(), Some("Pending"));
        assert!(!pending.master_ready);
        assert!(!pending.replica_ever_created);
    }

    #[test]
    fn test_high_availability_quorum() {
        let partial = database_status(
            None,
            DatabaseObservation::HighAvailability {
                nodes: 3,
                ready: Some(2),
            },
            Some(CLUSTER),
        );
        assert_eq!(partial.phase.as_deref(), Some("Progressing"));
        assert!(partial.replication_ready);

        let single = database_status(
            None,
            DatabaseObservation::HighAvailability {
                nodes: 3,
                ready: Some(1),
            },
            Some(CLUSTER),
        );
        assert!(!single.replication_ready);
        assert!(single.master_ready);

        let full = database_status(
            None,
            DatabaseObservation::HighAvailability {
                nodes: 3,
                ready: Some(3),
            },
            Some(CLUSTER),
        );
        assert_eq!(full.phase.as_deref(), Some("Ready"));
    }

    #[test]
    fn test_replica_deletion_detected_after_existing() {
        let previous = DatabaseStatus {
            replica_ever_created: true,
            replica_last_seen: Some("2025-01-01T00:00:00+00:00".to_string()),
            tracked_workload: Some(REPLICA.to_string()),
            ..Default::default()
        };
        let status = database_status(
            Some(&previous),
            DatabaseObservation::PrimaryReplica {
                master_ready: 1,
                replicas_ready: None,
            },
            Some(REPLICA),
        );
        assert!(status.replica_ever_created);
        assert!(status.replica_deletion_detected);
        assert_eq!(
            status.replica_last_seen.as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );
        let (condition_status, reason, _) = replica_history_condition(&status).unwrap();
        assert_eq!(condition_status, CONDITION_FALSE);
        assert_eq!(reason, REASON_REPLICA_DELETED);
    }

    #[test]
    fn test_never_created_replica_has_no_history_condition() {
        let status = database_status(
            None,
            DatabaseObservation::PrimaryReplica {
                master_ready: 1,
                replicas_ready: None,
            },
            Some(REPLICA),
        );
        assert!(!status.replica_deletion_detected);
        assert!(replica_history_condition(&status).is_none());
    }

    #[test]
    fn test_scaling_replicas_to_zero_clears_history() {
        let previous = DatabaseStatus {
            replica_ever_created: true,
            replica_last_seen: Some("2025-01-01T00:00:00+00:00".to_string()),
            tracked_workload: Some(REPLICA.to_string()),
            ..Default::default()
        };
        let scaled_down = database_status(
            Some(&previous),
            DatabaseObservation::PrimaryReplica {
                master_ready: 1,
                replicas_ready: None,
            },
            None,
        );
        assert!(!scaled_down.replica_ever_created);
        assert!(!scaled_down.replica_deletion_detected);
        assert!(scaled_down.replica_last_seen.is_none());
        assert!(replica_history_condition(&scaled_down).is_none());

        // Scaling back up: the replica is absent before its first apply, which is not
        // a deletion.
        let scaled_up = database_status(
            Some(&scaled_down),
            DatabaseObservation::PrimaryReplica {
                master_ready: 1,
                replicas_ready: None,
            },
            Some(REPLICA),
        );
        assert!(!scaled_up.replica_deletion_detected);
        assert!(replica_history_condition(&scaled_up).is_none());
    }

    #[test]
    fn test_topology_switch_starts_fresh_history() {
        let previous = DatabaseStatus {
            replica_ever_created: true,
            tracked_workload: Some(REPLICA.to_string()),
            ..Default::default()
        };
        let status = database_status(
            Some(&previous),
            DatabaseObservation::HighAvailability {
                nodes: 3,
                ready: None,
            },
            Some(CLUSTER),
        );
        assert_eq!(status.tracked_workload.as_deref(), Some(CLUSTER));
        assert!(!status.replica_ever_created);
        assert!(!status.replica_deletion_detected);
    }

    #[test]
    fn test_history_condition_removed_when_history_clears() {
        let ms = sample_music_service("radio");
        let mut updater = MusicServiceStatusUpdater::new(&ms);
        updater.set_database(Some(DatabaseStatus {
            replica_ever_created: true,
            replica_deletion_detected: true,
            tracked_workload: Some(REPLICA.to_string()),
            ..Default::default()
        }));
        assert!(
            find_condition(&updater.status().conditions, CONDITION_TYPE_REPLICA_HISTORY).is_some()
        );

        updater.set_database(Some(DatabaseStatus::default()));
        assert!(
            find_condition(&updater.status().conditions, CONDITION_TYPE_REPLICA_HISTORY).is_none()
        );
    }

    #[test]
    fn test_warning_condition_degrades_available_parent() {
        let ms = sample_music_service("radio");
        let mut updater = MusicServiceStatusUpdater::new(&ms);
        updater.set_app_replicas(3, 3);
        updater.set_storage_health(
            StorageTier::App,
            &StorageHealth::ShrinkRefused {
                desired: "1Gi".to_string(),
                current: "5Gi".to_string(),
            },
        );
        updater.set_reconciled(REASON_RECONCILE_SUCCESS, "Successfully reconciled");
        assert_eq!(updater.phase(), Some(Phase::Degraded));
        assert!(find_condition(&updater.status().conditions, CONDITION_TYPE_APP_STORAGE).is_some());
    }

    #[test]
    fn test_set_database_none_removes_database_conditions() {
        let ms = sample_music_service("radio");
        let mut updater = MusicServiceStatusUpdater::new(&ms);
        updater.set_storage_health(StorageTier::Database, &StorageHealth::Healthy);
        updater.set_database(Some(DatabaseStatus {
            replica_ever_created: true,
            ..Default::default()
        }));
        assert!(
            find_condition(&updater.status().conditions, CONDITION_TYPE_REPLICA_HISTORY).is_some()
        );

        updater.set_database(None);
        let conditions = &updater.status().conditions;
        assert!(find_condition(conditions, CONDITION_TYPE_REPLICA_HISTORY).is_none());
        assert!(find_condition(conditions, CONDITION_TYPE_DATABASE_STORAGE).is_none());
        assert!(updater.status().database.is_none());
    }

    #[test]
    fn test_failure_sets_reason_and_last_error() {
        let ms = sample_music_service("radio");
        let mut updater = MusicServiceStatusUpdater::new(&ms);
        updater.set_failed(REASON_STATEFULSET_FAILED, "injected failure");
        assert_eq!(updater.phase(), Some(Phase::Failed));
        assert_eq!(
            updater.status().last_error.as_deref(),
            Some("injected failure")
        );
        let reconciled =
            find_condition(&updater.status().conditions, CONDITION_TYPE_RECONCILED).unwrap();
        assert_eq!(reconciled.status, CONDITION_FALSE);
        assert_eq!(reconciled.reason.as_deref(), Some(REASON_STATEFULSET_FAILED));
    }

    #[tokio::test]
    async fn test_identical_recompute_skips_write() {
        let store = MemoryStore::new();
        let ms = store.insert_music_service(sample_music_service("radio"));

        let mut first = MusicServiceStatusUpdater::new(&ms);
        first.set_observed_generation();
        first.set_app_replicas(3, 3);
        first.set_reconciled(REASON_RECONCILE_SUCCESS, "Successfully reconciled");
        assert!(first.apply(&store, &ms).await.unwrap());

        let ms = store.music_service(NAMESPACE, "radio").unwrap();
        assert!(ms.status.as_ref().unwrap().last_reconcile_time.is_some());

        let mut second = MusicServiceStatusUpdater::new(&ms);
        second.set_observed_generation();
        second.set_app_replicas(3, 3);
        second.set_reconciled(REASON_RECONCILE_SUCCESS, "Successfully reconciled");
        assert!(!second.has_changes());
        assert!(!second.apply(&store, &ms).await.unwrap());
    }
}
