// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the music operator.
//!
//! This module provides specialized error types for:
//! - Kubernetes quantity parsing (storage sizes, resource requests)
//! - State store operations (get/create/update/delete of child resources)
//! - Reconcile passes, tagged with the step that failed
//!
//! The reconcile error carries enough structure to fill the `Reconciled` condition
//! and to decide whether the scheduler should requeue.

use thiserror::Error;

/// Errors raised while parsing a Kubernetes quantity string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The quantity string is empty or whitespace.
    #[error("Quantity string cannot be empty")]
    Empty,

    /// The quantity is negative; sizes must be non-negative.
    #[error("Quantity '{value}' must not be negative")]
    Negative {
        /// The rejected input
        value: String,
    },

    /// No digits precede the suffix.
    #[error("Quantity '{value}' has no numeric part")]
    MissingNumber {
        /// The rejected input
        value: String,
    },

    /// The suffix is neither a binary/decimal SI suffix nor an exponent.
    #[error("Quantity '{value}' has unsupported suffix '{suffix}'")]
    UnknownSuffix {
        /// The rejected input
        value: String,
        /// The suffix that could not be interpreted
        suffix: String,
    },

    /// The value does not fit the internal representation.
    #[error("Quantity '{value}' is too large")]
    Overflow {
        /// The rejected input
        value: String,
    },
}

/// Errors returned by a [`crate::store::StateStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// The object does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// The write carried a stale `resourceVersion`; re-fetch on the next pass.
    #[error("{kind} {namespace}/{name} was modified concurrently")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
    },

    /// A create targeted a name that is already taken.
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },

    /// Recording the owner reference would make the ownership graph cyclic.
    #[error("owner reference from {child} to {owner} would create an ownership cycle")]
    CyclicOwnership {
        /// UID of the object being written
        child: String,
        /// UID of the owner it points at
        owner: String,
    },

    /// The store returned an object of another kind than requested.
    #[error("expected a {expected}, store returned a {found}")]
    UnexpectedKind {
        expected: &'static str,
        found: &'static str,
    },

    /// Kubernetes API failure.
    #[error(transparent)]
    Api(#[from] kube::Error),

    /// Payload could not be (de)serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if the failure may succeed on a later pass without a spec change.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::Conflict { .. } | Self::AlreadyExists { .. } => true,
            Self::Api(kube::Error::Api(api_err)) => {
                api_err.code == 409 || api_err.code == 429 || api_err.code >= 500
            }
            Self::Api(_) => true,
            Self::CyclicOwnership { .. } | Self::UnexpectedKind { .. } | Self::Serialization(_) => {
                false
            }
        }
    }

    /// Short label for metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::AlreadyExists { .. } => "already_exists",
            Self::CyclicOwnership { .. } => "cyclic_ownership",
            Self::UnexpectedKind { .. } => "unexpected_kind",
            Self::Api(_) => "api",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Failure of a reconcile pass.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The spec violates an invariant; terminal until the spec changes.
    #[error("invalid MusicService spec: {0}")]
    Validation(String),

    /// A quantity in the spec could not be parsed; terminal until the spec changes.
    #[error("invalid quantity in {field}: {source}")]
    InvalidQuantity {
        /// Spec path of the offending value
        field: String,
        #[source]
        source: QuantityError,
    },

    /// A named step of the pass failed.
    #[error("{reason}: {source}")]
    Step {
        /// Status reason identifying the step (e.g. `StatefulSetFailed`)
        reason: &'static str,
        #[source]
        source: Box<ReconcileError>,
    },

    /// State store failure outside a named step.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Reason written to the `Reconciled` condition.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => crate::status_reasons::REASON_VALIDATION_FAILED,
            Self::InvalidQuantity { .. } => crate::status_reasons::REASON_INVALID_QUANTITY,
            Self::Step { reason, .. } => *reason,
            Self::Store(_) => crate::status_reasons::REASON_STATUS_FAILED,
        }
    }

    /// Returns true if the scheduler should retry without waiting for a spec change.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::InvalidQuantity { .. } => false,
            Self::Step { source, .. } => source.is_retryable(),
            Self::Store(err) => err.is_transient(),
        }
    }

    /// Short label for the errors metric.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::Step { source, .. } => source.category(),
            Self::Store(err) => err.category(),
        }
    }
}

/// Tags a failure with the reconcile step it happened in.
pub trait StepContext<T> {
    /// Wrap the error as [`ReconcileError::Step`] unless it already names a step
    /// or is terminal for the generation.
    ///
    /// # Errors
    ///
    /// Returns the wrapped error when `self` is `Err`.
    fn step(self, reason: &'static str) -> Result<T, ReconcileError>;
}

impl<T, E> StepContext<T> for Result<T, E>
where
    E: Into<ReconcileError>,
{
    fn step(self, reason: &'static str) -> Result<T, ReconcileError> {
        self.map_err(|err| match err.into() {
            err @ (ReconcileError::Step { .. }
            | ReconcileError::Validation(_)
            | ReconcileError::InvalidQuantity { .. }) => err,
            other => ReconcileError::Step {
                reason,
                source: Box::new(other),
            },
        })
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
