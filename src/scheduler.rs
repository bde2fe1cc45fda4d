// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-key work queue and worker pool.
//!
//! The queue gives three guarantees the reconcile pass relies on:
//!
//! - **Single flight**: a key handed to a worker is not handed out again until that
//!   worker calls [`WorkQueue::done`]. Enqueues that arrive meanwhile are kept and
//!   become eligible after `done`.
//! - **Coalescing**: a key is queued at most once. When it is enqueued again, the
//!   earlier deadline wins, so a burst of watch events inside the debounce window
//!   yields one pass.
//! - **Delayed re-enqueue**: [`WorkQueue::enqueue_after`] schedules periodic resyncs.
//!
//! Passes for different keys run concurrently, bounded by the number of workers.

use crate::constants::KIND_MUSIC_SERVICE;
use crate::context::Context;
use crate::reconcilers::{error_policy, reconcile, Requeue};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info};

/// Identifies one `MusicService`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParentKey {
    pub namespace: String,
    pub name: String,
}

impl ParentKey {
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ParentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Parent of a child object, from its controller owner reference.
#[must_use]
pub fn owner_key(meta: &ObjectMeta) -> Option<ParentKey> {
    let namespace = meta.namespace.as_deref()?;
    meta.owner_references
        .iter()
        .flatten()
        .find(|owner| owner.kind == KIND_MUSIC_SERVICE && owner.controller == Some(true))
        .map(|owner| ParentKey::new(namespace, &owner.name))
}

struct QueueState<K> {
    /// Key -> earliest time it may be handed out
    pending: HashMap<K, Instant>,
    processing: HashSet<K>,
    shutdown: bool,
}

/// Debouncing, single-flight work queue.
pub struct WorkQueue<K> {
    state: Mutex<QueueState<K>>,
    notify: Notify,
    debounce: Duration,
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash,
{
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: HashMap::new(),
                processing: HashSet::new(),
                shutdown: false,
            }),
            notify: Notify::new(),
            debounce,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `key` after the debounce window.
    pub fn enqueue(&self, key: K) {
        self.enqueue_after(key, self.debounce);
    }

    /// Queue `key` after `delay`, keeping an earlier deadline if one is already set.
    pub fn enqueue_after(&self, key: K, delay: Duration) {
        let deadline = Instant::now() + delay;
        {
            let mut state = self.lock();
            if state.shutdown {
                return;
            }
            state
                .pending
                .entry(key)
                .and_modify(|existing| *existing = (*existing).min(deadline))
                .or_insert(deadline);
        }
        self.notify.notify_waiters();
    }

    /// Release `key` after its pass. A key re-enqueued during the pass becomes eligible.
    pub fn done(&self, key: &K) {
        let requeued = {
            let mut state = self.lock();
            state.processing.remove(key);
            state.pending.contains_key(key)
        };
        if requeued {
            self.notify.notify_waiters();
        }
    }

    /// Stop handing out keys; waiting and future [`Self::next`] calls return `None`.
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.notify.notify_waiters();
    }

    /// Number of queued keys, including those deferred behind an in-flight pass.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is currently handed out to a worker.
    #[must_use]
    pub fn is_processing(&self, key: &K) -> bool {
        self.lock().processing.contains(key)
    }

    /// Wait for the next due key that is not already being processed.
    pub async fn next(&self) -> Option<K> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wake_at = {
                let mut state = self.lock();
                if state.shutdown {
                    return None;
                }
                let now = Instant::now();
                let mut due: Option<(K, Instant)> = None;
                let mut earliest: Option<Instant> = None;
                for (key, deadline) in &state.pending {
                    if state.processing.contains(key) {
                        continue;
                    }
                    if *deadline <= now {
                        if due.as_ref().is_none_or(|(_, d)| deadline < d) {
                            due = Some((key.clone(), *deadline));
                        }
                    } else if earliest.is_none_or(|e| *deadline < e) {
                        earliest = Some(*deadline);
                    }
                }
                if let Some((key, _)) = due {
                    state.pending.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                earliest
            };

            match wake_at {
                Some(deadline) => {
                    tokio::select! {
                        () = &mut notified => {}
                        () = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }
}

/// Spawn `workers` tasks that drain `queue` through the reconcile entry point.
///
/// Each finished pass re-enqueues its key after the interval the pass asked for.
pub fn run_workers(
    queue: Arc<WorkQueue<ParentKey>>,
    ctx: Arc<Context>,
    workers: usize,
) -> JoinSet<()> {
    let mut set = JoinSet::new();
    for worker in 0..workers.max(1) {
        let queue = queue.clone();
        let ctx = ctx.clone();
        set.spawn(async move {
            debug!(worker, "Worker started");
            while let Some(key) = queue.next().await {
                let requeue = match reconcile(&ctx, &key.namespace, &key.name).await {
                    Ok(requeue) => requeue,
                    Err(err) => error_policy(&ctx, &err),
                };
                queue.done(&key);
                if let Requeue::After(delay) = requeue {
                    queue.enqueue_after(key, delay);
                }
            }
            info!(worker, "Worker stopped");
        });
    }
    set
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod scheduler_tests;
