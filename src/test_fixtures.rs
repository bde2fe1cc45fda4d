// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for unit tests.

use crate::crd::{
    AutoscalingSpec, DatabaseReplicationSpec, DatabaseSpec, HighAvailabilitySpec, MusicService,
    MusicServiceSpec, StorageSpec, StorageUpdatePolicy, StreamingSpec,
};
use crate::context::Context;
use crate::engine::DatabaseEngine;
use crate::events::RecordingEventPublisher;
use crate::store::MemoryStore;
use kube::api::ObjectMeta;
use std::sync::Arc;

pub const NAMESPACE: &str = "media";

pub fn sample_spec() -> MusicServiceSpec {
    MusicServiceSpec {
        replicas: 3,
        image: "mixcorp/streamer:1.0".to_string(),
        port: 8080,
        storage: StorageSpec {
            size: "1Gi".to_string(),
            update_policy: StorageUpdatePolicy::Resize,
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

pub fn sample_music_service(name: &str) -> MusicService {
    music_service_with(name, sample_spec())
}

pub fn music_service_with(name: &str, spec: MusicServiceSpec) -> MusicService {
    let mut ms = MusicService::new(name, spec);
    ms.metadata = ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        uid: Some(format!("{name}-uid")),
        generation: Some(1),
        ..Default::default()
    };
    ms
}

pub fn autoscaling(min: i32, max: i32) -> AutoscalingSpec {
    AutoscalingSpec {
        min_replicas: min,
        max_replicas: max,
        target_cpu_utilization_percentage: 75,
        target_memory_utilization_percentage: None,
    }
}

pub fn primary_replica_database(replicas: i32) -> DatabaseSpec {
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

pub fn ha_database(replicas: i32) -> DatabaseSpec {
    DatabaseSpec {
        enabled: true,
        replicas,
        high_availability: Some(HighAvailabilitySpec { enabled: true }),
        ..Default::default()
    }
}

/// Context over an in-memory store and a recording publisher, both handed back for
/// assertions.
pub fn test_context(
    engine: DatabaseEngine,
) -> (Context, Arc<MemoryStore>, Arc<RecordingEventPublisher>) {
    let store = Arc::new(MemoryStore::new());
    let events = Arc::new(RecordingEventPublisher::new());
    let ctx = Context::new(store.clone(), events.clone(), engine);
    (ctx, store, events)
}
