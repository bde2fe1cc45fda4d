// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Replication credential management.
//!
//! The credential Secret is created once with a fixed username and a random password.
//! After that it is read-only except for backfilling a missing or empty key; an
//! existing value is never regenerated, since changing it would break replicas that
//! already authenticated with it.

use super::publish_event;
use crate::builder::CredentialTarget;
use crate::constants::{
    REPLICATION_PASSWORD_BYTES, REPLICATION_USERNAME, SECRET_KEY_PASSWORD, SECRET_KEY_USERNAME,
};
use crate::context::Context;
use crate::crd::MusicService;
use crate::errors::StoreError;
use crate::events::{actions, reasons};
use crate::metrics;
use crate::store;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{debug, info};

/// What [`ensure_credential`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialOutcome {
    Created,
    /// Keys that were missing and got filled in.
    Backfilled(Vec<String>),
    Unchanged,
}

/// Hex encoding of `REPLICATION_PASSWORD_BYTES` random bytes.
#[must_use]
pub fn generate_password() -> String {
    let bytes: [u8; REPLICATION_PASSWORD_BYTES] = rand::random();
    bytes.iter().fold(
        String::with_capacity(REPLICATION_PASSWORD_BYTES * 2),
        |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        },
    )
}

fn generated_value(key: &str) -> String {
    if key == SECRET_KEY_USERNAME {
        REPLICATION_USERNAME.to_string()
    } else {
        generate_password()
    }
}

/// Fill `data` with any credential key that is missing or empty. Returns the filled keys.
pub fn backfill(data: &mut BTreeMap<String, ByteString>) -> Vec<String> {
    let mut filled = Vec::new();
    for key in [SECRET_KEY_USERNAME, SECRET_KEY_PASSWORD] {
        if data.get(key).is_none_or(|v| v.0.is_empty()) {
            data.insert(key.to_string(), ByteString(generated_value(key).into_bytes()));
            filled.push(key.to_string());
        }
    }
    filled
}

/// Create the credential Secret if absent, otherwise backfill missing keys only.
///
/// # Errors
///
/// Propagates store failures.
pub async fn ensure_credential(
    ctx: &Context,
    ms: &MusicService,
    target: &CredentialTarget,
) -> Result<CredentialOutcome, StoreError> {
    let namespace = ms.namespace().unwrap_or_default();

    let Some(mut live) = store::get::<Secret>(ctx.store.as_ref(), &namespace, &target.name).await?
    else {
        let mut data = BTreeMap::new();
        backfill(&mut data);
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(target.name.clone()),
                namespace: Some(namespace.clone()),
                labels: Some(target.labels.clone()),
                owner_references: Some(target.owner_references.clone()),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(data),
            ..Default::default()
        };
        store::create(ctx.store.as_ref(), secret).await?;
        metrics::record_resource_created("Secret");
        info!("Created replication credential {}/{}", namespace, target.name);
        publish_event(
            ctx,
            ms,
            EventType::Normal,
            reasons::CREDENTIAL_ISSUED,
            actions::ISSUE_CREDENTIAL,
            format!("Issued replication credential {}", target.name),
        )
        .await;
        return Ok(CredentialOutcome::Created);
    };

    let filled = backfill(live.data.get_or_insert_with(BTreeMap::new));
    if filled.is_empty() {
        debug!("Replication credential {}/{} is complete", namespace, target.name);
        return Ok(CredentialOutcome::Unchanged);
    }

    store::update(ctx.store.as_ref(), live).await?;
    metrics::record_resource_updated("Secret");
    info!(
        keys = ?filled,
        "Backfilled replication credential {}/{}", namespace, target.name
    );
    Ok(CredentialOutcome::Backfilled(filled))
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod credentials_tests;
