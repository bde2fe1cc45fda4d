// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! High-availability database tier (Galera multi-primary cluster).

use super::database::{empty_dir, mount, mysql_port, pod_name_env, service_port, DatabaseSettings};
use super::{
    claim_template, exec_probe, names, object_meta, scripts, selector_labels,
    HighAvailabilityTier, Workload,
};
use crate::constants::{
    DB_CONFIG_INIT_MOUNT_PATH, DB_CONFIG_MOUNT_PATH, DB_CONFIG_VOLUME, DB_DATA_VOLUME,
    DB_INITDB_MOUNT_PATH, DB_INIT_CONTAINER_NAME, DB_INIT_SQL_MOUNT_PATH, DB_INIT_SQL_VOLUME,
    DB_PORT_NAME, GALERA_IST_PORT, GALERA_REPLICATION_PORT, GALERA_SST_PORT, SECRET_KEY_PASSWORD,
    SECRET_KEY_USERNAME,
};
use crate::crd::MusicService;
use crate::engine::{DATABASE_PORT, DATA_MOUNT_PATH};
use crate::labels::COMPONENT_DB_CLUSTER;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;

/// Galera ports exposed by each node besides the client port.
const CLUSTER_PORTS: [(&str, i32); 3] = [
    ("galera-repl", GALERA_REPLICATION_PORT),
    ("galera-ist", GALERA_IST_PORT),
    ("galera-sst", GALERA_SST_PORT),
];

/// Headless Service for peer discovery. Not-ready addresses are published so
/// joining nodes can find each other before they pass readiness.
#[must_use]
pub fn build_discovery_service(ms: &MusicService) -> Service {
    let mut ports = vec![service_port(DB_PORT_NAME, DATABASE_PORT)];
    ports.extend(CLUSTER_PORTS.iter().map(|(name, port)| service_port(name, *port)));

    Service {
        metadata: object_meta(
            ms,
            names::db_cluster_discovery(&ms.name_any()),
            COMPONENT_DB_CLUSTER,
        ),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(ms, COMPONENT_DB_CLUSTER)),
            ports: Some(ports),
            type_: Some("ClusterIP".to_string()),
            cluster_ip: Some("None".to_string()),
            publish_not_ready_addresses: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Client endpoint load-balancing across ready nodes.
#[must_use]
pub fn build_client_service(ms: &MusicService) -> Service {
    Service {
        metadata: object_meta(ms, names::db_client(&ms.name_any()), COMPONENT_DB_CLUSTER),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(ms, COMPONENT_DB_CLUSTER)),
            ports: Some(vec![service_port(DB_PORT_NAME, DATABASE_PORT)]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Cluster `StatefulSet` with `nodes` symmetric members.
///
/// Only called for engines with a Galera provider; `build_desired_state` rejects the rest.
#[must_use]
pub fn build_cluster_statefulset(
    ms: &MusicService,
    settings: &DatabaseSettings,
    nodes: i32,
) -> StatefulSet {
    let name = names::db_cluster(&ms.name_any());
    let discovery = names::db_cluster_discovery(&ms.name_any());
    let peers = scripts::galera_peers(&name, &discovery, nodes);
    let provider = settings.engine.galera_provider().unwrap_or_default();
    let pod_labels = selector_labels(ms, COMPONENT_DB_CLUSTER);

    let sst_env = || {
        vec![
            pod_name_env(),
            settings.secret_env("SST_USER", SECRET_KEY_USERNAME),
            settings.secret_env("SST_PASSWORD", SECRET_KEY_PASSWORD),
        ]
    };

    let init = Container {
        name: DB_INIT_CONTAINER_NAME.to_string(),
        image: Some(settings.image.clone()),
        command: Some(vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            scripts::galera_config_script(
                provider,
                &name,
                &peers,
                &discovery,
                DB_INIT_SQL_MOUNT_PATH,
            ),
        ]),
        env: Some(sst_env()),
        volume_mounts: Some(vec![
            mount(DB_CONFIG_VOLUME, DB_CONFIG_INIT_MOUNT_PATH),
            mount(DB_INIT_SQL_VOLUME, DB_INIT_SQL_MOUNT_PATH),
        ]),
        ..Default::default()
    };

    let mut env = settings.base_env();
    env.extend(sst_env());
    let mut ports = vec![mysql_port()];
    ports.extend(CLUSTER_PORTS.iter().map(|(name, port)| ContainerPort {
        name: Some((*name).to_string()),
        container_port: *port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }));

    let node = Container {
        name: settings.engine.name().to_string(),
        image: Some(settings.image.clone()),
        command: Some(vec![
            "/bin/bash".to_string(),
            "-c".to_string(),
            scripts::galera_start_script(&peers),
        ]),
        env: Some(env),
        ports: Some(ports),
        readiness_probe: Some(exec_probe(scripts::galera_readiness_command(), false)),
        liveness_probe: Some(exec_probe(scripts::ping_command(), true)),
        volume_mounts: Some(vec![
            mount(DB_DATA_VOLUME, DATA_MOUNT_PATH),
            mount(DB_CONFIG_VOLUME, DB_CONFIG_MOUNT_PATH),
            mount(DB_INIT_SQL_VOLUME, DB_INITDB_MOUNT_PATH),
        ]),
        ..Default::default()
    };

    StatefulSet {
        metadata: object_meta(ms, name, COMPONENT_DB_CLUSTER),
        spec: Some(StatefulSetSpec {
            replicas: Some(nodes),
            service_name: Some(discovery),
            selector: LabelSelector {
                match_labels: Some(pod_labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    init_containers: Some(vec![init]),
                    containers: vec![node],
                    volumes: Some(vec![
                        empty_dir(DB_CONFIG_VOLUME),
                        empty_dir(DB_INIT_SQL_VOLUME),
                    ]),
                    ..Default::default()
                }),
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

pub(crate) fn build_high_availability_tier(
    ms: &MusicService,
    settings: &DatabaseSettings,
    nodes: i32,
) -> HighAvailabilityTier {
    HighAvailabilityTier {
        discovery_service: build_discovery_service(ms),
        client_service: build_client_service(ms),
        cluster: Workload {
            statefulset: build_cluster_statefulset(ms, settings, nodes),
            replicas_externally_managed: false,
            storage: settings.storage_target(),
        },
    }
}

#[cfg(test)]
#[path = "galera_tests.rs"]
mod galera_tests;
