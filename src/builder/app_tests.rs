// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `app.rs`

#[cfg(test)]
mod tests {
    use crate::builder::app::{build_app_service, build_app_statefulset, build_app_tier};
    use crate::errors::ReconcileError;
    use crate::test_fixtures::{autoscaling, music_service_with, sample_music_service, sample_spec};
    use k8s_openapi::api::core::v1::ResourceRequirements;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use std::collections::BTreeMap;

    #[test]
    fn test_service_forwards_spec_port_to_container_port() {
        let svc = build_app_service(&sample_music_service("radio"));
        let spec = svc.spec.unwrap();
        let port = &spec.ports.unwrap()[0];
        assert_eq!(port.port, 8080);
        assert_eq!(port.target_port, Some(IntOrString::Int(80)));
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));

        let selector = spec.selector.unwrap();
        assert_eq!(selector.get("app").map(String::as_str), Some("radio"));
        assert_eq!(selector.get("component").map(String::as_str), Some("music-service"));
        assert_eq!(selector.len(), 2);
    }

    #[test]
    fn test_statefulset_carries_streaming_env_and_data_volume() {
        let sts = build_app_statefulset(&sample_music_service("radio"));
        let spec = sts.spec.unwrap();
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(spec.service_name.as_deref(), Some("radio"));

        let pod = spec.template.spec.unwrap();
        let container = &pod.containers[0];
        assert_eq!(container.name, "music-service");
        assert_eq!(container.image.as_deref(), Some("mixcorp/streamer:1.0"));

        let env: BTreeMap<_, _> = container
            .env
            .clone()
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.value.unwrap_or_default()))
            .collect();
        assert_eq!(env.get("STREAMING_BITRATE").map(String::as_str), Some("320k"));
        assert_eq!(env.get("MAX_CONNECTIONS").map(String::as_str), Some("500"));

        let mounts = container.volume_mounts.clone().unwrap();
        assert_eq!(mounts[0].name, "music-data");
        assert_eq!(mounts[0].mount_path, "/data");

        let claims = spec.volume_claim_templates.unwrap();
        assert_eq!(claims[0].metadata.name.as_deref(), Some("music-data"));
        let requests = claims[0]
            .spec
            .as_ref()
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.clone())
            .unwrap();
        assert_eq!(requests.get("storage"), Some(&Quantity("1Gi".to_string())));
    }

    #[test]
    fn test_autoscaler_marks_replicas_externally_managed() {
        let plain = build_app_tier(&sample_music_service("radio")).unwrap();
        assert!(plain.autoscaler.is_none());
        assert!(!plain.workload.replicas_externally_managed);

        let mut spec = sample_spec();
        spec.autoscaling = Some(autoscaling(2, 6));
        let tier = build_app_tier(&music_service_with("radio", spec)).unwrap();
        assert!(tier.workload.replicas_externally_managed);

        let hpa = tier.autoscaler.unwrap();
        assert_eq!(hpa.metadata.name.as_deref(), Some("radio-autoscaler"));
        let hpa_spec = hpa.spec.unwrap();
        assert_eq!(hpa_spec.scale_target_ref.name, "radio");
        assert_eq!(hpa_spec.scale_target_ref.kind, "StatefulSet");
        assert_eq!(hpa_spec.min_replicas, Some(2));
        assert_eq!(hpa_spec.max_replicas, 6);
    }

    #[test]
    fn test_invalid_storage_size_is_reported_with_field() {
        let mut spec = sample_spec();
        spec.storage.size = "lots".to_string();
        let err = build_app_tier(&music_service_with("radio", spec)).unwrap_err();
        match err {
            ReconcileError::InvalidQuantity { field, .. } => {
                assert_eq!(field, "spec.storage.size");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_resource_quantity_is_rejected() {
        let mut spec = sample_spec();
        spec.resources = Some(ResourceRequirements {
            limits: Some(BTreeMap::from([(
                "memory".to_string(),
                Quantity("1Gx".to_string()),
            )])),
            ..Default::default()
        });
        let err = build_app_tier(&music_service_with("radio", spec)).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::InvalidQuantity { ref field, .. }
                if field == "spec.resources.limits.memory"
        ));
    }
}
