// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `database.rs`

#[cfg(test)]
mod tests {
    use crate::builder::database::{
        build_master_service, build_master_statefulset, build_primary_replica_tier,
        build_read_service, build_replica_statefulset, DatabaseSettings,
    };
    use crate::crd::{DatabaseReplicationSpec, DatabaseSpec, MusicService, StorageSpec};
    use crate::engine::DatabaseEngine;
    use crate::test_fixtures::{music_service_with, primary_replica_database, sample_spec};
    use k8s_openapi::api::apps::v1::StatefulSet;
    use k8s_openapi::api::core::v1::EnvVar;

    fn parent(db: DatabaseSpec) -> MusicService {
        let mut spec = sample_spec();
        spec.database = Some(db);
        music_service_with("radio", spec)
    }

    fn settings(ms: &MusicService) -> DatabaseSettings {
        let db = ms.spec.database.as_ref().unwrap();
        DatabaseSettings::resolve(ms, db, DatabaseEngine::MariaDb).unwrap()
    }

    fn container_env(sts: &StatefulSet, container: &str) -> Vec<EnvVar> {
        let pod = sts.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
        pod.containers
            .iter()
            .chain(pod.init_containers.iter().flatten())
            .find(|c| c.name == container)
            .and_then(|c| c.env.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_resolve_applies_engine_defaults() {
        let ms = parent(primary_replica_database(2));
        let settings = settings(&ms);
        assert_eq!(settings.image, "mariadb:10.11");
        assert_eq!(settings.storage_size, "10Gi");
        assert_eq!(settings.root_password, "rootpass");
        assert_eq!(settings.secret_name, "radio-db-replication");
        assert!(settings.replication);
        assert!(settings.gtid);
    }

    #[test]
    fn test_resolve_rejects_malformed_storage() {
        let mut db = primary_replica_database(1);
        db.storage = Some(StorageSpec {
            size: "ten".to_string(),
            update_policy: Default::default(),
        });
        let ms = parent(db);
        let err = DatabaseSettings::resolve(
            &ms,
            ms.spec.database.as_ref().unwrap(),
            DatabaseEngine::MariaDb,
        )
        .unwrap_err();
        assert_eq!(err.status_reason(), "InvalidQuantity");
    }

    #[test]
    fn test_master_is_single_pod_with_config_init() {
        let ms = parent(primary_replica_database(2));
        let sts = build_master_statefulset(&ms, &settings(&ms));
        assert_eq!(sts.metadata.name.as_deref(), Some("radio-db-master"));
        let spec = sts.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(1));

        let pod = spec.template.spec.as_ref().unwrap();
        let init = &pod.init_containers.as_ref().unwrap()[0];
        assert_eq!(init.name, "init-db-config");
        assert!(init.command.as_ref().unwrap()[2].contains("server-id=1"));

        let main = &pod.containers[0];
        assert_eq!(main.name, "mariadb");
        assert_eq!(main.ports.as_ref().unwrap()[0].container_port, 3306);
        assert!(main.readiness_probe.is_some());
        let names: Vec<_> = main
            .volume_mounts
            .iter()
            .flatten()
            .map(|m| m.mount_path.as_str())
            .collect();
        assert_eq!(names, vec!["/var/lib/mysql", "/etc/mysql/conf.d"]);
    }

    #[test]
    fn test_replica_references_credential_without_inlining_it() {
        let ms = parent(primary_replica_database(2));
        let sts = build_replica_statefulset(&ms, &settings(&ms), 2);
        assert_eq!(sts.spec.as_ref().unwrap().replicas, Some(2));

        let sidecar = container_env(&sts, "replication-setup");
        let user = sidecar.iter().find(|e| e.name == "REPLICATION_USER").unwrap();
        assert!(user.value.is_none());
        let secret = user
            .value_from
            .as_ref()
            .and_then(|v| v.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(secret.name, "radio-db-replication");
        assert_eq!(secret.key, "username");

        let init = container_env(&sts, "init-db-config");
        let pod_name = init.iter().find(|e| e.name == "POD_NAME").unwrap();
        let field = pod_name
            .value_from
            .as_ref()
            .and_then(|v| v.field_ref.as_ref())
            .unwrap();
        assert_eq!(field.field_path, "metadata.name");
    }

    #[test]
    fn test_replication_disabled_drops_sidecar() {
        let mut db = primary_replica_database(2);
        db.replication = Some(DatabaseReplicationSpec {
            enabled: Some(false),
            gtid: None,
        });
        let ms = parent(db);
        let sts = build_replica_statefulset(&ms, &settings(&ms), 2);
        let pod = sts.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.containers.len(), 1);
        assert!(!pod.containers[0]
            .env
            .iter()
            .flatten()
            .any(|e| e.name.starts_with("REPLICATION_")));
    }

    #[test]
    fn test_master_service_is_headless_and_read_service_is_not() {
        let ms = parent(primary_replica_database(1));
        let master = build_master_service(&ms).spec.unwrap();
        assert_eq!(master.cluster_ip.as_deref(), Some("None"));
        assert_eq!(
            master.selector.unwrap().get("component").map(String::as_str),
            Some("db-master")
        );

        let read = build_read_service(&ms).spec.unwrap();
        assert!(read.cluster_ip.is_none());
        assert_eq!(
            read.selector.unwrap().get("component").map(String::as_str),
            Some("db-replica")
        );
    }

    #[test]
    fn test_zero_replicas_omits_replica_objects() {
        let ms = parent(primary_replica_database(0));
        let tier = build_primary_replica_tier(&ms, &settings(&ms), 0);
        assert!(tier.replicas.is_none());
        assert!(tier.replica_service.is_none());
        assert!(tier.read_service.is_none());
        assert_eq!(tier.master.name(), "radio-db-master");
    }
}
