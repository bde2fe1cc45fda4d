// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher::{self, watcher};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, Resource, ResourceExt};
use music_operator::config::Args;
use music_operator::constants::{CONTROLLER_NAME, KIND_MUSIC_SERVICE, TOKIO_WORKER_THREADS};
use music_operator::context::Context;
use music_operator::crd::MusicService;
use music_operator::events::KubeEventPublisher;
use music_operator::health::{run_health_server, HealthState};
use music_operator::labels::{K8S_MANAGED_BY, MANAGED_BY_MUSIC_OPERATOR};
use music_operator::scheduler::{owner_key, run_workers, ParentKey, WorkQueue};
use music_operator::store::KubeStore;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("music-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

/// Initialize logging.
///
/// Format: timestamp file:line LEVEL message. `RUST_LOG` sets the filter (default
/// `info`) and `RUST_LOG_FORMAT=json` switches to JSON output.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

async fn drain<K, S>(
    kind: &str,
    stream: S,
    queue: &WorkQueue<ParentKey>,
    key: fn(&K) -> Option<ParentKey>,
) where
    S: Stream<Item = Result<K, watcher::Error>>,
{
    let mut stream = pin!(stream);
    while let Some(event) = stream.next().await {
        match event {
            Ok(object) => {
                if let Some(parent) = key(&object) {
                    debug!(kind, parent = %parent, "Watch event");
                    queue.enqueue(parent);
                }
            }
            Err(e) => warn!(kind, error = %e, "Watch stream error; retrying with backoff"),
        }
    }
}

/// Enqueue a parent whenever it changes.
async fn watch_music_services(api: Api<MusicService>, queue: Arc<WorkQueue<ParentKey>>) {
    info!("Starting MusicService watcher");
    let stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .touched_objects();
    drain(KIND_MUSIC_SERVICE, stream, &queue, |ms: &MusicService| {
        Some(ParentKey::new(&ms.namespace().unwrap_or_default(), &ms.name_any()))
    })
    .await;
}

/// Enqueue the owning parent whenever a managed child changes or disappears.
async fn watch_children<K>(kind: &'static str, api: Api<K>, queue: Arc<WorkQueue<ParentKey>>)
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    info!("Starting {} watcher", kind);
    let config =
        watcher::Config::default().labels(&format!("{K8S_MANAGED_BY}={MANAGED_BY_MUSIC_OPERATOR}"));
    let stream = watcher(api, config).default_backoff().touched_objects();
    drain(kind, stream, &queue, |child: &K| owner_key(child.meta())).await;
}

async fn async_main(args: Args) -> Result<()> {
    init_tracing();
    info!("Starting MusicService operator");
    debug!(?args, "Parsed configuration");

    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let ctx = Arc::new(
        Context::new(
            Arc::new(KubeStore::new(client.clone())),
            Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME)),
            args.database_engine,
        )
        .with_requeue(args.requeue_intervals()),
    );
    let queue = Arc::new(WorkQueue::new(args.debounce()));
    let health = Arc::new(HealthState::new());

    let metrics_address = args.metrics_address();
    let health_handle = {
        let health = health.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health, &metrics_address).await {
                error!("Metrics server error: {}", e);
            }
        })
    };

    let namespace = args.namespace.as_deref();
    let watchers = futures::future::join3(
        watch_music_services(scoped_api(client.clone(), namespace), queue.clone()),
        watch_children::<StatefulSet>(
            "StatefulSet",
            scoped_api(client.clone(), namespace),
            queue.clone(),
        ),
        watch_children::<Service>("Service", scoped_api(client.clone(), namespace), queue.clone()),
    );

    let mut workers = run_workers(queue.clone(), ctx, args.workers);
    health.set_ready(true);
    info!(workers = args.workers, engine = %args.database_engine, "Operator ready");

    tokio::select! {
        _ = watchers => {
            error!("CRITICAL: watchers exited unexpectedly");
        }
        result = health_handle => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received shutdown signal");
        }
    }

    health.set_ready(false);
    queue.shutdown();
    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            error!("Worker task failed: {}", e);
        }
    }
    info!("MusicService operator stopped");
    Ok(())
}
