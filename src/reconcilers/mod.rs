// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for `MusicService` resources.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - The scheduler turns watch events into per-parent work items
//! 2. **Build** - The desired state is derived purely from the spec
//! 3. **Converge** - Every child is created or updated over its mutable fields only
//! 4. **Status** - Results are written back on the parent
//!
//! # Modules
//!
//! - [`musicservice`] - Pass entry point, failure and deletion handling
//! - [`app`] / [`database`] - Per-tier convergence
//! - [`storage`] - Volume resize and recreate policy
//! - [`credentials`] - Replication credential lifecycle
//! - [`finalizers`] - Cleanup before the parent disappears
//! - [`status`] - Phase and condition aggregation
//! - [`apply`] / [`diff`] - Get-or-create/update over the mutable field set
//!
//! # Example
//!
//! ```rust,no_run
//! use music_operator::reconcilers::{error_policy, reconcile};
//! use music_operator::context::Context;
//!
//! async fn run_once(ctx: &Context) {
//!     let next = match reconcile(ctx, "media", "radio").await {
//!         Ok(requeue) => requeue,
//!         Err(err) => error_policy(ctx, &err),
//!     };
//!     println!("next pass: {next:?}");
//! }
//! ```

pub mod app;
pub mod apply;
pub mod credentials;
pub mod database;
pub mod diff;
pub mod finalizers;
pub mod musicservice;
pub mod status;
pub mod storage;

pub use musicservice::{error_policy, reconcile, reconcile_music_service, PassReport, Requeue};

use crate::context::Context;
use crate::crd::MusicService;
use kube::runtime::events::EventType;
use kube::Resource;

/// Publish an Event about `ms`.
pub(crate) async fn publish_event(
    ctx: &Context,
    ms: &MusicService,
    type_: EventType,
    reason: &str,
    action: &str,
    note: String,
) {
    ctx.events
        .publish(&ms.object_ref(&()), type_, reason, action, Some(note))
        .await;
}
