// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Database engine strategy.
//!
//! The engine is picked once at start-up (`--database-engine`) and handed to the
//! desired-state builder. It owns everything that differs between MySQL-protocol
//! servers: default image, server configuration and the SQL used to attach a replica.

use crate::constants::{DEFAULT_DB_ROOT_PASSWORD, DEFAULT_DB_STORAGE_SIZE};
use clap::ValueEnum;
use std::fmt;

/// Port shared by every supported engine.
pub const DATABASE_PORT: i32 = 3306;

/// Data directory inside the database container.
pub const DATA_MOUNT_PATH: &str = "/var/lib/mysql";

/// Supported database engines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DatabaseEngine {
    /// `MariaDB`: GTID via `MASTER_USE_GTID`, HA via Galera.
    #[default]
    #[value(name = "mariadb")]
    MariaDb,
    /// `MySQL` 8: GTID via `SOURCE_AUTO_POSITION`; no HA cluster support.
    #[value(name = "mysql")]
    MySql,
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl DatabaseEngine {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MariaDb => "mariadb",
            Self::MySql => "mysql",
        }
    }

    /// Image used when the spec does not pin one.
    #[must_use]
    pub fn default_image(self) -> &'static str {
        match self {
            Self::MariaDb => "mariadb:10.11",
            Self::MySql => "mysql:8.0",
        }
    }

    #[must_use]
    pub fn default_storage_size(self) -> &'static str {
        DEFAULT_DB_STORAGE_SIZE
    }

    #[must_use]
    pub fn default_root_password(self) -> &'static str {
        DEFAULT_DB_ROOT_PASSWORD
    }

    /// Whether a multi-primary cluster can be built with this engine.
    #[must_use]
    pub fn supports_high_availability(self) -> bool {
        matches!(self, Self::MariaDb)
    }

    /// Galera provider library, for engines that ship one.
    #[must_use]
    pub fn galera_provider(self) -> Option<&'static str> {
        match self {
            Self::MariaDb => Some("/usr/lib/galera/libgalera_smm.so"),
            Self::MySql => None,
        }
    }

    /// Server configuration for the primary (`server-id=1`).
    #[must_use]
    pub fn primary_config(self, gtid: bool) -> String {
        let mut lines = vec![
            "[mysqld]".to_string(),
            "server-id=1".to_string(),
            "log_bin=mysql-bin".to_string(),
            "binlog_format=ROW".to_string(),
        ];
        lines.extend(self.gtid_settings(gtid));
        lines.join("\n")
    }

    /// Server configuration for a replica.
    ///
    /// The returned text references the shell variable `${server_id}` and must be
    /// written through an unquoted heredoc.
    #[must_use]
    pub fn replica_config(self, gtid: bool) -> String {
        let mut lines = vec![
            "[mysqld]".to_string(),
            "server-id=${server_id}".to_string(),
            "log_bin=mysql-bin".to_string(),
            "binlog_format=ROW".to_string(),
        ];
        lines.extend(self.gtid_settings(gtid));
        lines.push("read_only=ON".to_string());
        lines.push(match self {
            Self::MariaDb => "skip_slave_start=1".to_string(),
            Self::MySql => "skip_replica_start=ON".to_string(),
        });
        lines.join("\n")
    }

    fn gtid_settings(self, gtid: bool) -> Vec<String> {
        match (self, gtid) {
            (Self::MariaDb, true) => vec![
                "gtid_strict_mode=ON".to_string(),
                "log_slave_updates=ON".to_string(),
            ],
            (Self::MariaDb, false) => vec!["log_slave_updates=ON".to_string()],
            (Self::MySql, true) => vec![
                "gtid_mode=ON".to_string(),
                "enforce_gtid_consistency=ON".to_string(),
                "log_replica_updates=ON".to_string(),
            ],
            (Self::MySql, false) => vec!["log_replica_updates=ON".to_string()],
        }
    }

    /// SQL run on a replica to point it at the primary and start replicating.
    ///
    /// Credentials are referenced as `${REPLICATION_USER}` / `${REPLICATION_PASSWORD}`;
    /// without GTID the log coordinates come from `${LOG_FILE}` / `${LOG_POS}`.
    #[must_use]
    pub fn attach_replica_sql(self, primary_host: &str, gtid: bool) -> String {
        match self {
            Self::MariaDb => {
                let coordinates = if gtid {
                    "MASTER_USE_GTID=slave_pos".to_string()
                } else {
                    "MASTER_LOG_FILE='${LOG_FILE}', MASTER_LOG_POS=${LOG_POS}".to_string()
                };
                format!(
                    "STOP SLAVE; RESET SLAVE ALL; CHANGE MASTER TO MASTER_HOST='{primary_host}', \
                     MASTER_USER='${{REPLICATION_USER}}', \
                     MASTER_PASSWORD='${{REPLICATION_PASSWORD}}', \
                     MASTER_PORT={DATABASE_PORT}, {coordinates}; START SLAVE;"
                )
            }
            Self::MySql => {
                let coordinates = if gtid {
                    "SOURCE_AUTO_POSITION=1".to_string()
                } else {
                    "SOURCE_LOG_FILE='${LOG_FILE}', SOURCE_LOG_POS=${LOG_POS}".to_string()
                };
                format!(
                    "STOP REPLICA; RESET REPLICA ALL; CHANGE REPLICATION SOURCE TO \
                     SOURCE_HOST='{primary_host}', SOURCE_USER='${{REPLICATION_USER}}', \
                     SOURCE_PASSWORD='${{REPLICATION_PASSWORD}}', SOURCE_PORT={DATABASE_PORT}, \
                     GET_SOURCE_PUBLIC_KEY=1, {coordinates}; START REPLICA;"
                )
            }
        }
    }

    /// Statement printing the binary log coordinates of the primary.
    #[must_use]
    pub fn primary_status_sql(self) -> &'static str {
        match self {
            Self::MariaDb => "SHOW MASTER STATUS",
            Self::MySql => "SHOW BINARY LOG STATUS",
        }
    }

    /// Statement and pattern used to log whether the replica threads are running.
    #[must_use]
    pub fn replica_status_check(self) -> (&'static str, &'static str) {
        match self {
            Self::MariaDb => (
                "SHOW SLAVE STATUS\\G",
                "Slave_IO_Running: Yes|Slave_SQL_Running: Yes",
            ),
            Self::MySql => (
                "SHOW REPLICA STATUS\\G",
                "Replica_IO_Running: Yes|Replica_SQL_Running: Yes",
            ),
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
