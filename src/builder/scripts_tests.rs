// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `scripts.rs`

#[cfg(test)]
mod tests {
    use crate::builder::scripts::{
        galera_config_script, galera_peers, galera_start_script, primary_config_script,
        replica_config_script, replica_setup_script,
    };
    use crate::engine::DatabaseEngine;

    #[test]
    fn test_primary_config_uses_quoted_heredoc() {
        let script = primary_config_script(DatabaseEngine::MariaDb, true);
        assert!(script.contains("cat <<'EOF' > /db-config/server-id.cnf"));
        assert!(script.contains("server-id=1"));
        assert!(script.contains("gtid_strict_mode=ON"));
    }

    #[test]
    fn test_replica_config_derives_server_id_from_ordinal() {
        let script = replica_config_script(DatabaseEngine::MariaDb, true);
        assert!(script.contains("ordinal=${POD_NAME##*-}"));
        assert!(script.contains("server_id=$((200 + ordinal))"));
        assert!(script.contains("server-id=${server_id}"));
        assert!(script.contains("read_only=ON"));
    }

    #[test]
    fn test_replica_setup_orders_waits_before_attach() {
        let script = replica_setup_script(DatabaseEngine::MariaDb, "radio-db-master", true);
        let local_wait = script.find("Waiting for local database").unwrap();
        let primary_wait = script.find("Waiting for primary").unwrap();
        let grant = script.find("GRANT REPLICATION SLAVE").unwrap();
        let attach = script.find("CHANGE MASTER TO MASTER_HOST='radio-db-master'").unwrap();
        assert!(local_wait < primary_wait && primary_wait < grant && grant < attach);
        assert!(script.contains("MASTER_USE_GTID=slave_pos"));
        assert!(script.trim_end().ends_with("sleep infinity"));
        assert!(!script.contains("LOG_FILE=$("));
    }

    #[test]
    fn test_replica_setup_without_gtid_reads_coordinates() {
        let script = replica_setup_script(DatabaseEngine::MariaDb, "radio-db-master", false);
        assert!(script.contains("SHOW MASTER STATUS"));
        assert!(script.contains("LOG_FILE=$(echo \"$status\" | awk '{print $1}')"));
        assert!(script.contains("MASTER_LOG_POS=${LOG_POS}"));
    }

    #[test]
    fn test_replica_setup_never_embeds_secret_values() {
        let script = replica_setup_script(DatabaseEngine::MySql, "radio-db-master", true);
        assert!(script.contains("${REPLICATION_PASSWORD}"));
        assert!(script.contains("SOURCE_AUTO_POSITION=1"));
    }

    #[test]
    fn test_galera_peers_cover_every_node() {
        let peers = galera_peers("radio-db-cluster", "radio-db-cluster-discovery", 3);
        assert_eq!(
            peers,
            vec![
                "radio-db-cluster-0.radio-db-cluster-discovery".to_string(),
                "radio-db-cluster-1.radio-db-cluster-discovery".to_string(),
                "radio-db-cluster-2.radio-db-cluster-discovery".to_string(),
            ]
        );
    }

    #[test]
    fn test_galera_config_lists_peers_and_sst_auth() {
        let peers = galera_peers("radio-db-cluster", "radio-db-cluster-discovery", 2);
        let script = galera_config_script(
            "/usr/lib/galera/libgalera_smm.so",
            "radio",
            &peers,
            "radio-db-cluster-discovery",
            "/db-init",
        );
        assert!(script.contains(concat!(
            "wsrep_cluster_address=gcomm://radio-db-cluster-0.radio-db-cluster-discovery,",
            "radio-db-cluster-1.radio-db-cluster-discovery"
        )));
        assert!(script.contains("wsrep_sst_auth=${SST_USER}:${SST_PASSWORD}"));
        assert!(script.contains("/db-init/sst-user.sql"));
    }

    #[test]
    fn test_galera_start_bootstraps_only_when_no_peer_answers() {
        let peers = galera_peers("radio-db-cluster", "radio-db-cluster-discovery", 3);
        let script = galera_start_script(&peers);
        assert!(script.contains(concat!(
            "for peer in radio-db-cluster-1.radio-db-cluster-discovery ",
            "radio-db-cluster-2.radio-db-cluster-discovery; do"
        )));
        assert!(script.contains("/dev/tcp/$peer/4567"));
        let join = script.find("exec docker-entrypoint.sh mariadbd\n").unwrap();
        let bootstrap = script.find("--wsrep-new-cluster").unwrap();
        assert!(join < bootstrap);
    }
}
