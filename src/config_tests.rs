// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use crate::config::Args;
    use crate::context::RequeueIntervals;
    use crate::engine::DatabaseEngine;
    use clap::Parser;
    use std::time::Duration;

    #[test]
    fn test_defaults_match_requeue_constants() {
        let args = Args::try_parse_from(["music-operator"]).unwrap();
        assert_eq!(args.requeue_intervals(), RequeueIntervals::default());
        assert_eq!(args.database_engine, DatabaseEngine::MariaDb);
        assert!(args.workers > 0);
        assert_eq!(args.metrics_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "music-operator",
            "--namespace",
            "media",
            "--database-engine",
            "mysql",
            "--not-ready-resync-secs",
            "2",
            "--debounce-millis",
            "50",
        ])
        .unwrap();
        assert_eq!(args.namespace.as_deref(), Some("media"));
        assert_eq!(args.database_engine, DatabaseEngine::MySql);
        assert_eq!(args.requeue_intervals().not_ready, Duration::from_secs(2));
        assert_eq!(args.debounce(), Duration::from_millis(50));
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        assert!(Args::try_parse_from(["music-operator", "--database-engine", "postgres"]).is_err());
    }
}
