// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `diff.rs`

#[cfg(test)]
mod tests {
    use crate::builder::app::{build_app_service, build_app_statefulset};
    use crate::builder::galera::build_discovery_service;
    use crate::builder::build_autoscaler;
    use crate::reconcilers::diff::MutableFields;
    use crate::test_fixtures::{autoscaling, music_service_with, sample_music_service, sample_spec};
    use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetStatus};
    use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
    use k8s_openapi::api::core::v1::{ResourceRequirements, Service};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::collections::BTreeMap;

    fn with_server_fields(mut sts: StatefulSet) -> StatefulSet {
        sts.metadata.resource_version = Some("42".to_string());
        sts.metadata.uid = Some("live-uid".to_string());
        sts.status = Some(StatefulSetStatus {
            replicas: 3,
            ready_replicas: Some(2),
            ..Default::default()
        });
        if let Some(pod) = sts.spec.as_mut().and_then(|s| s.template.spec.as_mut()) {
            pod.containers[0].image_pull_policy = Some("IfNotPresent".to_string());
            pod.dns_policy = Some("ClusterFirst".to_string());
        }
        sts
    }

    #[test]
    fn test_identical_statefulset_has_no_diff() {
        let desired = build_app_statefulset(&sample_music_service("radio"));
        let mut live = with_server_fields(desired.clone());
        let before = live.clone();
        let changed = StatefulSet::merge_mutable(&mut live, &desired, false);
        assert!(changed.is_empty());
        assert_eq!(live, before);
    }

    #[test]
    fn test_image_change_keeps_server_fields() {
        let ms = sample_music_service("radio");
        let mut live = with_server_fields(build_app_statefulset(&ms));

        let mut spec = sample_spec();
        spec.image = "mixcorp/streamer:2.0".to_string();
        let desired = build_app_statefulset(&music_service_with("radio", spec));

        let changed = StatefulSet::merge_mutable(&mut live, &desired, false);
        assert_eq!(changed, vec!["image"]);
        assert_eq!(live.metadata.resource_version.as_deref(), Some("42"));
        let pod = live.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
        assert_eq!(pod.containers[0].image.as_deref(), Some("mixcorp/streamer:2.0"));
        assert_eq!(pod.containers[0].image_pull_policy.as_deref(), Some("IfNotPresent"));
        assert_eq!(pod.dns_policy.as_deref(), Some("ClusterFirst"));
        assert!(live.status.is_some());
    }

    #[test]
    fn test_externally_managed_replicas_are_left_alone() {
        let ms = sample_music_service("radio");
        let desired = build_app_statefulset(&ms);
        let mut live = desired.clone();
        live.spec.as_mut().unwrap().replicas = Some(7);

        let changed = StatefulSet::merge_mutable(&mut live.clone(), &desired, true);
        assert!(changed.is_empty());

        let changed = StatefulSet::merge_mutable(&mut live, &desired, false);
        assert_eq!(changed, vec!["replicas"]);
        assert_eq!(live.spec.unwrap().replicas, Some(3));
    }

    #[test]
    fn test_equivalent_resource_quantities_do_not_diff() {
        let resources = |memory: &str| {
            Some(ResourceRequirements {
                limits: Some(BTreeMap::from([(
                    "memory".to_string(),
                    Quantity(memory.to_string()),
                )])),
                ..Default::default()
            })
        };
        let mut spec = sample_spec();
        spec.resources = resources("1Gi");
        let desired = build_app_statefulset(&music_service_with("radio", spec.clone()));

        spec.resources = resources("1024Mi");
        let mut live = build_app_statefulset(&music_service_with("radio", spec));

        assert!(StatefulSet::merge_mutable(&mut live, &desired, false).is_empty());
    }

    #[test]
    fn test_service_port_change_preserves_cluster_ip() {
        let mut live: Service = build_app_service(&sample_music_service("radio"));
        live.spec.as_mut().unwrap().cluster_ip = Some("10.0.0.12".to_string());

        let mut spec = sample_spec();
        spec.port = 9090;
        let desired = build_app_service(&music_service_with("radio", spec));

        let changed = Service::merge_mutable(&mut live, &desired, false);
        assert_eq!(changed, vec!["ports"]);
        let live_spec = live.spec.unwrap();
        assert_eq!(live_spec.cluster_ip.as_deref(), Some("10.0.0.12"));
        assert_eq!(live_spec.ports.unwrap()[0].port, 9090);
    }

    #[test]
    fn test_discovery_service_restores_publish_not_ready() {
        let desired = build_discovery_service(&sample_music_service("radio"));
        let mut live = desired.clone();
        live.spec.as_mut().unwrap().publish_not_ready_addresses = None;
        let changed = Service::merge_mutable(&mut live, &desired, false);
        assert_eq!(changed, vec!["publishNotReadyAddresses"]);
    }

    #[test]
    fn test_autoscaler_bounds_diff() {
        let ms = sample_music_service("radio");
        let build = |min, max| {
            build_autoscaler(
                &ms,
                "radio-autoscaler".to_string(),
                "radio".to_string(),
                "music-service",
                &autoscaling(min, max),
            )
        };
        let mut live: HorizontalPodAutoscaler = build(2, 5);
        let changed = HorizontalPodAutoscaler::merge_mutable(&mut live, &build(2, 8), false);
        assert_eq!(changed, vec!["maxReplicas"]);
        assert_eq!(live.spec.unwrap().max_replicas, 8);
    }
}
