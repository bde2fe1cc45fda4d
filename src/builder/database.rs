// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Primary/replica database tier.
//!
//! The primary is a one-pod `StatefulSet` addressed through a headless Service. Replicas
//! run in their own `StatefulSet` (with a headless governing Service) and are reached
//! for reads through the load-balanced `-db-read` Service. Each replica pod carries a
//! `replication-setup` sidecar that attaches it to the primary.

use super::{
    build_autoscaler, claim_template, exec_probe, names, object_meta, parse_size, scripts,
    selector_labels, PrimaryReplicaTier, StorageTarget, StorageTier, Workload,
};
use crate::constants::{
    DB_CONFIG_INIT_MOUNT_PATH, DB_CONFIG_MOUNT_PATH, DB_CONFIG_VOLUME, DB_DATA_VOLUME,
    DB_INIT_CONTAINER_NAME, DB_PORT_NAME, DB_REPLICATION_SIDECAR_NAME, DEFAULT_DB_NAME,
    SECRET_KEY_PASSWORD, SECRET_KEY_USERNAME,
};
use crate::crd::{AutoscalingSpec, DatabaseSpec, MusicService, StorageUpdatePolicy};
use crate::engine::{DatabaseEngine, DATABASE_PORT, DATA_MOUNT_PATH};
use crate::errors::ReconcileError;
use crate::labels::{COMPONENT_DB_MASTER, COMPONENT_DB_REPLICA};
use crate::quantity::ParsedQuantity;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, EnvVarSource, ObjectFieldSelector,
    PodSpec, PodTemplateSpec, SecretKeySelector, Service, ServicePort, ServiceSpec, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

/// Database settings with engine defaults applied.
#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub engine: DatabaseEngine,
    pub image: String,
    pub storage_size: String,
    pub storage: ParsedQuantity,
    pub update_policy: StorageUpdatePolicy,
    pub root_password: String,
    pub replication: bool,
    pub gtid: bool,
    pub secret_name: String,
}

impl DatabaseSettings {
    /// Resolve the database block against `engine` defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` when the declared storage size is malformed.
    pub fn resolve(
        ms: &MusicService,
        db: &DatabaseSpec,
        engine: DatabaseEngine,
    ) -> Result<Self, ReconcileError> {
        let image = db
            .image
            .clone()
            .filter(|image| !image.trim().is_empty())
            .unwrap_or_else(|| engine.default_image().to_string());
        let storage_size = db
            .storage
            .as_ref()
            .map_or_else(|| engine.default_storage_size().to_string(), |s| s.size.clone());
        let storage = parse_size("spec.database.storage.size", &storage_size)?;
        let root_password = db
            .root_password
            .clone()
            .filter(|password| !password.is_empty())
            .unwrap_or_else(|| engine.default_root_password().to_string());

        Ok(Self {
            engine,
            image,
            storage_size,
            storage,
            update_policy: db
                .storage
                .as_ref()
                .map(|s| s.update_policy)
                .unwrap_or_default(),
            root_password,
            replication: db.replication_enabled(),
            gtid: db.gtid_enabled(),
            secret_name: names::replication_secret(&ms.name_any()),
        })
    }

    pub(crate) fn storage_target(&self) -> StorageTarget {
        StorageTarget {
            tier: StorageTier::Database,
            claim_template: DB_DATA_VOLUME,
            size: self.storage_size.clone(),
            desired: self.storage,
            policy: self.update_policy,
        }
    }

    pub(crate) fn base_env(&self) -> Vec<EnvVar> {
        vec![
            EnvVar {
                name: "MYSQL_ROOT_PASSWORD".to_string(),
                value: Some(self.root_password.clone()),
                ..Default::default()
            },
            EnvVar {
                name: "MYSQL_DATABASE".to_string(),
                value: Some(DEFAULT_DB_NAME.to_string()),
                ..Default::default()
            },
        ]
    }

    /// Environment variable read from the replication credential.
    pub(crate) fn secret_env(&self, name: &str, key: &str) -> EnvVar {
        EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: self.secret_name.clone(),
                    key: key.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

pub(crate) fn pod_name_env() -> EnvVar {
    EnvVar {
        name: "POD_NAME".to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                api_version: Some("v1".to_string()),
                field_path: "metadata.name".to_string(),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn mysql_port() -> ContainerPort {
    ContainerPort {
        name: Some(DB_PORT_NAME.to_string()),
        container_port: DATABASE_PORT,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

pub(crate) fn service_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(port)),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

pub(crate) fn empty_dir(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

pub(crate) fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn config_init_container(
    settings: &DatabaseSettings,
    script: String,
    env: Vec<EnvVar>,
) -> Container {
    Container {
        name: DB_INIT_CONTAINER_NAME.to_string(),
        image: Some(settings.image.clone()),
        command: Some(vec!["/bin/sh".to_string(), "-c".to_string(), script]),
        env: (!env.is_empty()).then_some(env),
        volume_mounts: Some(vec![mount(DB_CONFIG_VOLUME, DB_CONFIG_INIT_MOUNT_PATH)]),
        ..Default::default()
    }
}

fn database_container(settings: &DatabaseSettings, env: Vec<EnvVar>) -> Container {
    Container {
        name: settings.engine.name().to_string(),
        image: Some(settings.image.clone()),
        env: Some(env),
        ports: Some(vec![mysql_port()]),
        readiness_probe: Some(exec_probe(scripts::ping_command(), false)),
        liveness_probe: Some(exec_probe(scripts::ping_command(), true)),
        volume_mounts: Some(vec![
            mount(DB_DATA_VOLUME, DATA_MOUNT_PATH),
            mount(DB_CONFIG_VOLUME, DB_CONFIG_MOUNT_PATH),
        ]),
        ..Default::default()
    }
}

fn database_statefulset(
    ms: &MusicService,
    settings: &DatabaseSettings,
    name: String,
    component: &str,
    replicas: i32,
    pod_spec: PodSpec,
) -> StatefulSet {
    let pod_labels = selector_labels(ms, component);
    StatefulSet {
        metadata: object_meta(ms, name.clone(), component),
        spec: Some(StatefulSetSpec {
            replicas: Some(replicas),
            service_name: Some(name),
            selector: LabelSelector {
                match_labels: Some(pod_labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            volume_claim_templates: Some(vec![claim_template(
                DB_DATA_VOLUME,
                &settings.storage_size,
            )]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Primary `StatefulSet`, always exactly one pod.
#[must_use]
pub fn build_master_statefulset(ms: &MusicService, settings: &DatabaseSettings) -> StatefulSet {
    let pod_spec = PodSpec {
        init_containers: Some(vec![config_init_container(
            settings,
            scripts::primary_config_script(settings.engine, settings.gtid),
            Vec::new(),
        )]),
        containers: vec![database_container(settings, settings.base_env())],
        volumes: Some(vec![empty_dir(DB_CONFIG_VOLUME)]),
        ..Default::default()
    };
    database_statefulset(
        ms,
        settings,
        names::db_master(&ms.name_any()),
        COMPONENT_DB_MASTER,
        1,
        pod_spec,
    )
}

/// Replica `StatefulSet`; the attach sidecar is present only with replication on.
#[must_use]
pub fn build_replica_statefulset(
    ms: &MusicService,
    settings: &DatabaseSettings,
    replicas: i32,
) -> StatefulSet {
    let primary_host = names::db_master(&ms.name_any());
    let mut env = settings.base_env();
    let mut containers = Vec::new();
    if settings.replication {
        env.push(settings.secret_env("REPLICATION_USER", SECRET_KEY_USERNAME));
        env.push(settings.secret_env("REPLICATION_PASSWORD", SECRET_KEY_PASSWORD));
    }
    containers.push(database_container(settings, env));
    if settings.replication {
        containers.push(Container {
            name: DB_REPLICATION_SIDECAR_NAME.to_string(),
            image: Some(settings.image.clone()),
            command: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                scripts::replica_setup_script(settings.engine, &primary_host, settings.gtid),
            ]),
            env: Some(vec![
                EnvVar {
                    name: "MYSQL_ROOT_PASSWORD".to_string(),
                    value: Some(settings.root_password.clone()),
                    ..Default::default()
                },
                settings.secret_env("REPLICATION_USER", SECRET_KEY_USERNAME),
                settings.secret_env("REPLICATION_PASSWORD", SECRET_KEY_PASSWORD),
            ]),
            ..Default::default()
        });
    }

    let pod_spec = PodSpec {
        init_containers: Some(vec![config_init_container(
            settings,
            scripts::replica_config_script(settings.engine, settings.gtid),
            vec![pod_name_env()],
        )]),
        containers,
        volumes: Some(vec![empty_dir(DB_CONFIG_VOLUME)]),
        ..Default::default()
    };
    database_statefulset(
        ms,
        settings,
        names::db_replica(&ms.name_any()),
        COMPONENT_DB_REPLICA,
        replicas,
        pod_spec,
    )
}

fn database_service(
    ms: &MusicService,
    name: String,
    component: &str,
    headless: bool,
) -> Service {
    Service {
        metadata: object_meta(ms, name, component),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(ms, component)),
            ports: Some(vec![service_port(DB_PORT_NAME, DATABASE_PORT)]),
            type_: Some("ClusterIP".to_string()),
            cluster_ip: headless.then(|| "None".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Headless Service addressing the primary directly.
#[must_use]
pub fn build_master_service(ms: &MusicService) -> Service {
    database_service(ms, names::db_master(&ms.name_any()), COMPONENT_DB_MASTER, true)
}

/// Headless governing Service of the replica `StatefulSet`.
#[must_use]
pub fn build_replica_service(ms: &MusicService) -> Service {
    database_service(ms, names::db_replica(&ms.name_any()), COMPONENT_DB_REPLICA, true)
}

/// Load-balanced read endpoint over replica pods.
#[must_use]
pub fn build_read_service(ms: &MusicService) -> Service {
    database_service(ms, names::db_read(&ms.name_any()), COMPONENT_DB_REPLICA, false)
}

#[must_use]
pub fn build_replica_autoscaler(
    ms: &MusicService,
    autoscaling: &AutoscalingSpec,
) -> HorizontalPodAutoscaler {
    build_autoscaler(
        ms,
        names::db_replica_autoscaler(&ms.name_any()),
        names::db_replica(&ms.name_any()),
        COMPONENT_DB_REPLICA,
        autoscaling,
    )
}

pub(crate) fn build_primary_replica_tier(
    ms: &MusicService,
    settings: &DatabaseSettings,
    replicas: i32,
) -> PrimaryReplicaTier {
    let autoscaled = ms
        .spec
        .enabled_database()
        .is_some_and(|db| db.autoscaling.is_some());
    let replica_workload = (replicas > 0).then(|| Workload {
        statefulset: build_replica_statefulset(ms, settings, replicas),
        replicas_externally_managed: autoscaled,
        storage: settings.storage_target(),
    });

    PrimaryReplicaTier {
        master_service: build_master_service(ms),
        master: Workload {
            statefulset: build_master_statefulset(ms, settings),
            replicas_externally_managed: false,
            storage: settings.storage_target(),
        },
        replica_service: (replicas > 0).then(|| build_replica_service(ms)),
        read_service: (replicas > 0).then(|| build_read_service(ms)),
        replicas: replica_workload,
    }
}

#[cfg(test)]
#[path = "database_tests.rs"]
mod database_tests;
