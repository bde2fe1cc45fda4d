// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes Event recording.
//!
//! Events are fire-and-forget: a failed publish is logged and never fails a
//! reconcile pass.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Publishes Events about a `MusicService`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event on `resource_ref`.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The object the event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason (see [`reasons`])
    /// * `action` - What the operator was doing (see [`actions`])
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publisher backed by `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// One captured event.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedEvent {
    pub object: String,
    pub type_: EventType,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

/// Keeps published events in memory; used by tests and dry runs.
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reasons of all captured events, in publish order.
    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let object = format!(
            "{}/{}",
            resource_ref.namespace.as_deref().unwrap_or_default(),
            resource_ref.name.as_deref().unwrap_or_default()
        );
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                object,
                type_,
                reason: reason.to_string(),
                action: action.to_string(),
                note,
            });
    }
}

/// Event reasons, shown under REASON in `kubectl get events`.
pub mod reasons {
    /// A reconcile pass started for a new generation
    pub const RECONCILING: &str = "Reconciling";
    /// The parent is being deleted and cleanup runs
    pub const DELETING: &str = "Deleting";
    /// All application pods became ready
    pub const READY: &str = "Ready";
    /// A reconcile pass aborted
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
    /// A declared volume shrink was refused
    pub const STORAGE_SHRINK_REFUSED: &str = "StorageShrinkRefused";
    /// A tier's workload and claims were deleted to rebuild at a new size
    pub const STORAGE_RECREATED: &str = "StorageRecreated";
    /// Claims were expanded in place
    pub const STORAGE_EXPANDED: &str = "StorageExpanded";
    /// The replication credential was issued or backfilled
    pub const CREDENTIAL_ISSUED: &str = "CredentialIssued";
}

/// Event actions, shown under ACTION in `kubectl get events`.
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const DELETE: &str = "Delete";
    pub const RESIZE: &str = "Resize";
    pub const RECREATE: &str = "Recreate";
    pub const ISSUE_CREDENTIAL: &str = "IssueCredential";
}
