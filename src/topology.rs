// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Database topology selection.
//!
//! A parent realises at most one database shape. The selection is a pure function of
//! the spec, so the primary/replica and HA builders can never both run for the same
//! parent.

use crate::crd::MusicServiceSpec;

/// The database shape realised for a parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatabaseTopology {
    /// No database tier.
    None,
    /// One primary plus `replicas` asynchronous replicas.
    PrimaryReplica { replicas: i32 },
    /// A symmetric multi-primary cluster of `nodes` members.
    HighAvailability { nodes: i32 },
}

impl DatabaseTopology {
    #[must_use]
    pub fn is_high_availability(self) -> bool {
        matches!(self, Self::HighAvailability { .. })
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PrimaryReplica { .. } => "primary-replica",
            Self::HighAvailability { .. } => "high-availability",
        }
    }
}

/// Pick the database topology for a spec.
///
/// HA takes precedence: with `highAvailability.enabled` the replica count becomes the
/// number of extra cluster members and no primary/replica shape is produced.
#[must_use]
pub fn select_topology(spec: &MusicServiceSpec) -> DatabaseTopology {
    let Some(db) = spec.enabled_database() else {
        return DatabaseTopology::None;
    };
    let replicas = db.replicas.max(0);
    if spec.high_availability_enabled() {
        DatabaseTopology::HighAvailability { nodes: replicas + 1 }
    } else {
        DatabaseTopology::PrimaryReplica { replicas }
    }
}

#[cfg(test)]
#[path = "topology_tests.rs"]
mod topology_tests;
