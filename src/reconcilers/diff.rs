// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Field-level diff restricted to the fields the operator owns.
//!
//! Only the mutable set is compared and written back: replica count (unless an
//! autoscaler owns it), container images, commands, resources, environment, volume
//! mounts, ports and probes, pod volumes, Service ports and selector, and autoscaler
//! bounds and metrics. Everything else on the live object (status, `clusterIP`,
//! server-filled defaults, `resourceVersion`) is left exactly as the server returned it.
//! Volume claim templates are immutable and handled by the storage policy instead.

use crate::quantity::resource_lists_equal;
use crate::store::Managed;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Container, PodSpec, ResourceRequirements, Service};

/// Objects whose mutable fields can be merged from a desired copy.
pub trait MutableFields: Managed {
    /// Copy the mutable fields of `desired` onto `live`.
    ///
    /// Returns the names of the fields that differed; empty means `live` is untouched.
    fn merge_mutable(live: &mut Self, desired: &Self, replicas_externally_managed: bool)
        -> Vec<&'static str>;
}

/// Assign `desired` to `live` when they differ, recording `field`.
fn sync<T: PartialEq + Clone>(
    changed: &mut Vec<&'static str>,
    field: &'static str,
    live: &mut T,
    desired: &T,
) {
    if live != desired {
        *live = desired.clone();
        changed.push(field);
    }
}

fn resources_equal(a: Option<&ResourceRequirements>, b: Option<&ResourceRequirements>) -> bool {
    resource_lists_equal(
        a.and_then(|r| r.limits.as_ref()),
        b.and_then(|r| r.limits.as_ref()),
    ) && resource_lists_equal(
        a.and_then(|r| r.requests.as_ref()),
        b.and_then(|r| r.requests.as_ref()),
    )
}

fn merge_container(changed: &mut Vec<&'static str>, live: &mut Container, desired: &Container) {
    sync(changed, "image", &mut live.image, &desired.image);
    sync(changed, "command", &mut live.command, &desired.command);
    sync(changed, "args", &mut live.args, &desired.args);
    sync(changed, "env", &mut live.env, &desired.env);
    sync(changed, "volumeMounts", &mut live.volume_mounts, &desired.volume_mounts);
    sync(changed, "ports", &mut live.ports, &desired.ports);
    sync(changed, "readinessProbe", &mut live.readiness_probe, &desired.readiness_probe);
    sync(changed, "livenessProbe", &mut live.liveness_probe, &desired.liveness_probe);
    if !resources_equal(live.resources.as_ref(), desired.resources.as_ref()) {
        live.resources.clone_from(&desired.resources);
        changed.push("resources");
    }
}

/// Merge containers matched by name. A different set of names replaces the list.
fn merge_containers(
    changed: &mut Vec<&'static str>,
    field: &'static str,
    live: &mut Vec<Container>,
    desired: &[Container],
) {
    let same_names = live.len() == desired.len()
        && live.iter().zip(desired).all(|(l, d)| l.name == d.name);
    if !same_names {
        *live = desired.to_vec();
        changed.push(field);
        return;
    }
    for (live_container, desired_container) in live.iter_mut().zip(desired) {
        merge_container(changed, live_container, desired_container);
    }
}

fn merge_pod_spec(changed: &mut Vec<&'static str>, live: &mut PodSpec, desired: &PodSpec) {
    merge_containers(changed, "containers", &mut live.containers, &desired.containers);

    let mut live_init = live.init_containers.take().unwrap_or_default();
    let desired_init = desired.init_containers.clone().unwrap_or_default();
    merge_containers(changed, "initContainers", &mut live_init, &desired_init);
    live.init_containers = (!live_init.is_empty()).then_some(live_init);

    sync(changed, "volumes", &mut live.volumes, &desired.volumes);
}

impl MutableFields for StatefulSet {
    fn merge_mutable(
        live: &mut Self,
        desired: &Self,
        replicas_externally_managed: bool,
    ) -> Vec<&'static str> {
        let mut changed = Vec::new();
        let Some(desired_spec) = desired.spec.as_ref() else {
            return changed;
        };
        let live_spec = live.spec.get_or_insert_with(Default::default);

        if !replicas_externally_managed {
            sync(&mut changed, "replicas", &mut live_spec.replicas, &desired_spec.replicas);
        }
        if let Some(desired_pod) = desired_spec.template.spec.as_ref() {
            let live_pod = live_spec.template.spec.get_or_insert_with(Default::default);
            merge_pod_spec(&mut changed, live_pod, desired_pod);
        }
        changed
    }
}

impl MutableFields for Service {
    fn merge_mutable(live: &mut Self, desired: &Self, _: bool) -> Vec<&'static str> {
        let mut changed = Vec::new();
        let Some(desired_spec) = desired.spec.as_ref() else {
            return changed;
        };
        let live_spec = live.spec.get_or_insert_with(Default::default);
        sync(&mut changed, "ports", &mut live_spec.ports, &desired_spec.ports);
        sync(&mut changed, "selector", &mut live_spec.selector, &desired_spec.selector);
        sync(
            &mut changed,
            "publishNotReadyAddresses",
            &mut live_spec.publish_not_ready_addresses,
            &desired_spec.publish_not_ready_addresses,
        );
        changed
    }
}

impl MutableFields for HorizontalPodAutoscaler {
    fn merge_mutable(live: &mut Self, desired: &Self, _: bool) -> Vec<&'static str> {
        let mut changed = Vec::new();
        let Some(desired_spec) = desired.spec.as_ref() else {
            return changed;
        };
        let live_spec = live.spec.get_or_insert_with(Default::default);
        sync(
            &mut changed,
            "scaleTargetRef",
            &mut live_spec.scale_target_ref,
            &desired_spec.scale_target_ref,
        );
        sync(&mut changed, "minReplicas", &mut live_spec.min_replicas, &desired_spec.min_replicas);
        sync(&mut changed, "maxReplicas", &mut live_spec.max_replicas, &desired_spec.max_replicas);
        sync(&mut changed, "metrics", &mut live_spec.metrics, &desired_spec.metrics);
        changed
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
