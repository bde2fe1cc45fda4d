// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

#![allow(dead_code)]

use kube::api::ObjectMeta;
use music_operator::context::Context;
use music_operator::crd::{
    DatabaseReplicationSpec, DatabaseSpec, HighAvailabilitySpec, MusicService, MusicServiceSpec,
    MusicServiceStatus, StorageSpec, StorageUpdatePolicy, StreamingSpec,
};
use music_operator::engine::DatabaseEngine;
use music_operator::events::RecordingEventPublisher;
use music_operator::reconcilers::{error_policy, reconcile, Requeue};
use music_operator::store::MemoryStore;
use std::sync::Arc;

pub const NAMESPACE: &str = "media";
pub const NAME: &str = "radio";

pub fn spec(size: &str, policy: StorageUpdatePolicy) -> MusicServiceSpec {
    MusicServiceSpec {
        replicas: 3,
        image: "mixcorp/streamer:1.0".to_string(),
        port: 8080,
        storage: StorageSpec {
            size: size.to_string(),
            update_policy: policy,
        },
        streaming: StreamingSpec {
            bitrate: "320k".to_string(),
            max_connections: 500,
        },
        resources: None,
        autoscaling: None,
        database: None,
    }
}

pub fn primary_replica(replicas: i32) -> DatabaseSpec {
    DatabaseSpec {
        enabled: true,
        replicas,
        replication: Some(DatabaseReplicationSpec {
            enabled: Some(true),
            gtid: Some(true),
        }),
        ..Default::default()
    }
}

pub fn high_availability(replicas: i32) -> DatabaseSpec {
    DatabaseSpec {
        enabled: true,
        replicas,
        high_availability: Some(HighAvailabilitySpec { enabled: true }),
        ..Default::default()
    }
}

/// An in-memory control plane around one parent.
pub struct Harness {
    pub ctx: Context,
    pub store: Arc<MemoryStore>,
    pub events: Arc<RecordingEventPublisher>,
}

impl Harness {
    pub fn new(engine: DatabaseEngine, spec: MusicServiceSpec) -> Self {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(RecordingEventPublisher::new());
        let ctx = Context::new(store.clone(), events.clone(), engine);

        let mut ms = MusicService::new(NAME, spec);
        ms.metadata = ObjectMeta {
            name: Some(NAME.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        };
        store.insert_music_service(ms);
        Self { ctx, store, events }
    }

    /// Run one pass, mapping failures through the retry policy.
    pub async fn pass(&self) -> Requeue {
        match reconcile(&self.ctx, NAMESPACE, NAME).await {
            Ok(requeue) => requeue,
            Err(err) => error_policy(&self.ctx, &err),
        }
    }

    pub fn edit(&self, edit: impl FnOnce(&mut MusicServiceSpec)) {
        self.store
            .update_music_service_spec(NAMESPACE, NAME, edit)
            .expect("parent exists");
    }

    pub fn status(&self) -> MusicServiceStatus {
        self.store
            .music_service(NAMESPACE, NAME)
            .and_then(|ms| ms.status)
            .expect("status written")
    }

    /// Mark every pod of `statefulset` ready and provision its claims.
    pub fn roll_out(&self, statefulset: &str) {
        self.store.provision_claims(NAMESPACE, statefulset);
        let replicas = self
            .store
            .statefulset(NAMESPACE, statefulset)
            .and_then(|sts| sts.spec)
            .and_then(|spec| spec.replicas)
            .unwrap_or(0);
        self.store.set_statefulset_ready(NAMESPACE, statefulset, replicas);
    }

    pub fn condition(&self, condition_type: &str) -> Option<(String, Option<String>)> {
        self.status()
            .conditions
            .into_iter()
            .find(|c| c.r#type == condition_type)
            .map(|c| (c.status, c.reason))
    }
}
