// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP endpoints for probes and Prometheus scraping.
//!
//! - `/healthz` - liveness, always 200 while the process serves requests
//! - `/readyz` - readiness, 200 once the watchers are running
//! - `/metrics` - Prometheus text format

use crate::constants::METRICS_SERVER_PATH;
use crate::metrics::gather_metrics;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Readiness flag shared between the controller and the probe handlers.
#[derive(Debug, Default)]
pub struct HealthState {
    ready: AtomicBool,
}

impl HealthState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready() {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

async fn metrics() -> Response {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Router serving the probe and metrics endpoints.
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(METRICS_SERVER_PATH, get(metrics))
        .with_state(state)
}

/// Serve [`create_router`] on `address` until the process exits.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn run_health_server(state: Arc<HealthState>, address: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(address).await?;
    info!("Metrics server listening on {}", address);
    axum::serve(listener, create_router(state)).await
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod health_tests;
