// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Application tier: Service, `StatefulSet` and optional autoscaler.

use super::{
    build_autoscaler, check_resources, claim_template, names, object_meta, parse_size,
    selector_labels, AppTier, StorageTarget, StorageTier, Workload,
};
use crate::constants::{
    APP_CONTAINER_NAME, APP_CONTAINER_PORT, APP_DATA_MOUNT_PATH, APP_DATA_VOLUME, APP_PORT_NAME,
    ENV_MAX_CONNECTIONS, ENV_STREAMING_BITRATE,
};
use crate::crd::MusicService;
use crate::errors::ReconcileError;
use crate::labels::COMPONENT_MUSIC_SERVICE;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

pub(crate) fn build_app_tier(ms: &MusicService) -> Result<AppTier, ReconcileError> {
    let desired = parse_size("spec.storage.size", &ms.spec.storage.size)?;
    check_resources("spec.resources", ms.spec.resources.as_ref())?;

    let autoscaler = ms.spec.autoscaling.as_ref().map(|autoscaling| {
        build_autoscaler(
            ms,
            names::app_autoscaler(&ms.name_any()),
            names::app(&ms.name_any()),
            COMPONENT_MUSIC_SERVICE,
            autoscaling,
        )
    });

    Ok(AppTier {
        service: build_app_service(ms),
        workload: Workload {
            statefulset: build_app_statefulset(ms),
            replicas_externally_managed: autoscaler.is_some(),
            storage: StorageTarget {
                tier: StorageTier::App,
                claim_template: APP_DATA_VOLUME,
                size: ms.spec.storage.size.clone(),
                desired,
                policy: ms.spec.storage.update_policy,
            },
        },
        autoscaler,
    })
}

/// `spec.port` on the Service forwards to container port 80.
#[must_use]
pub fn build_app_service(ms: &MusicService) -> Service {
    Service {
        metadata: object_meta(ms, names::app(&ms.name_any()), COMPONENT_MUSIC_SERVICE),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(ms, COMPONENT_MUSIC_SERVICE)),
            ports: Some(vec![ServicePort {
                name: Some(APP_PORT_NAME.to_string()),
                port: ms.spec.port,
                target_port: Some(IntOrString::Int(APP_CONTAINER_PORT)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[must_use]
pub fn build_app_statefulset(ms: &MusicService) -> StatefulSet {
    let name = names::app(&ms.name_any());
    let pod_labels = selector_labels(ms, COMPONENT_MUSIC_SERVICE);

    let container = Container {
        name: APP_CONTAINER_NAME.to_string(),
        image: Some(ms.spec.image.clone()),
        resources: ms.spec.resources.clone(),
        ports: Some(vec![ContainerPort {
            name: Some(APP_PORT_NAME.to_string()),
            container_port: APP_CONTAINER_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(vec![
            EnvVar {
                name: ENV_STREAMING_BITRATE.to_string(),
                value: Some(ms.spec.streaming.bitrate.clone()),
                ..Default::default()
            },
            EnvVar {
                name: ENV_MAX_CONNECTIONS.to_string(),
                value: Some(ms.spec.streaming.max_connections.to_string()),
                ..Default::default()
            },
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: APP_DATA_VOLUME.to_string(),
            mount_path: APP_DATA_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    StatefulSet {
        metadata: object_meta(ms, name.clone(), COMPONENT_MUSIC_SERVICE),
        spec: Some(StatefulSetSpec {
            replicas: Some(ms.spec.replicas),
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
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            volume_claim_templates: Some(vec![claim_template(
                APP_DATA_VOLUME,
                &ms.spec.storage.size,
            )]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod app_tests;
