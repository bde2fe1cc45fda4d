// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shell scripts run by database init containers and sidecars.
//!
//! Secrets never appear in these scripts; they are read from environment variables
//! populated through `secretKeyRef`.

use crate::constants::{
    DB_CONFIG_INIT_MOUNT_PATH, GALERA_REPLICATION_PORT, REPLICA_SERVER_ID_BASE,
};
use crate::engine::{DatabaseEngine, DATABASE_PORT};

/// Name of the generated server configuration file.
const SERVER_CONFIG_FILE: &str = "server-id.cnf";

/// Name of the generated Galera configuration file.
const GALERA_CONFIG_FILE: &str = "galera.cnf";

/// Name of the generated SST bootstrap SQL file.
const GALERA_INIT_SQL_FILE: &str = "sst-user.sql";

/// Writes the primary's server configuration into the shared config volume.
#[must_use]
pub fn primary_config_script(engine: DatabaseEngine, gtid: bool) -> String {
    format!(
        "set -e\ncat <<'EOF' > {DB_CONFIG_INIT_MOUNT_PATH}/{SERVER_CONFIG_FILE}\n{}\nEOF\n",
        engine.primary_config(gtid)
    )
}

/// Writes a replica's server configuration; `server-id` is derived from the pod ordinal.
#[must_use]
pub fn replica_config_script(engine: DatabaseEngine, gtid: bool) -> String {
    format!(
        "set -e\nordinal=${{POD_NAME##*-}}\nserver_id=$(({REPLICA_SERVER_ID_BASE} + ordinal))\n\
         cat <<EOF > {DB_CONFIG_INIT_MOUNT_PATH}/{SERVER_CONFIG_FILE}\n{}\nEOF\n",
        engine.replica_config(gtid)
    )
}

/// Sidecar that attaches a replica to the primary, then idles.
///
/// Steps: wait for the local server, wait for the primary, ensure the replication
/// principal exists on the primary, point the replica at the primary.
#[must_use]
pub fn replica_setup_script(engine: DatabaseEngine, primary_host: &str, gtid: bool) -> String {
    let root = "-uroot -p${MYSQL_ROOT_PASSWORD}";
    let local = format!("mysql -h 127.0.0.1 -P {DATABASE_PORT} {root}");
    let primary = format!("mysql -h {primary_host} -P {DATABASE_PORT} {root}");
    let grant = match engine {
        DatabaseEngine::MariaDb => "REPLICATION SLAVE",
        DatabaseEngine::MySql => "REPLICATION SLAVE, REPLICATION CLIENT",
    };
    let coordinates = if gtid {
        String::new()
    } else {
        format!(
            "echo \"Reading binary log coordinates from primary...\"\n\
             status=$({primary} -N -e \"{}\")\n\
             LOG_FILE=$(echo \"$status\" | awk '{{print $1}}')\n\
             LOG_POS=$(echo \"$status\" | awk '{{print $2}}')\n",
            engine.primary_status_sql()
        )
    };
    let (status_sql, status_pattern) = engine.replica_status_check();

    format!(
        "set -e\n\
         echo \"Waiting for local database to be ready...\"\n\
         until {local} -e \"SELECT 1\" > /dev/null 2>&1; do\n  sleep 2\ndone\n\
         echo \"Waiting for primary to be ready...\"\n\
         until {primary} -e \"SELECT 1\" > /dev/null 2>&1; do\n  sleep 2\ndone\n\
         echo \"Primary is ready, ensuring replication user...\"\n\
         {primary} -e \"CREATE USER IF NOT EXISTS '${{REPLICATION_USER}}'@'%' \
         IDENTIFIED BY '${{REPLICATION_PASSWORD}}'; \
         GRANT {grant} ON *.* TO '${{REPLICATION_USER}}'@'%'; FLUSH PRIVILEGES;\"\n\
         {coordinates}\
         echo \"Configuring replica...\"\n\
         {local} -e \"{attach}\"\n\
         {local} -e \"{status_sql}\" | grep -E \"{status_pattern}\" || true\n\
         echo \"Replication setup complete. Sleeping...\"\n\
         sleep infinity\n",
        attach = engine.attach_replica_sql(primary_host, gtid),
    )
}

/// Peer list for `wsrep_cluster_address`.
#[must_use]
pub fn galera_peers(statefulset: &str, discovery_service: &str, nodes: i32) -> Vec<String> {
    (0..nodes.max(1))
        .map(|ordinal| format!("{statefulset}-{ordinal}.{discovery_service}"))
        .collect()
}

/// Writes the Galera configuration and the SST user bootstrap SQL.
///
/// The heredoc is unquoted so `${POD_NAME}` and the SST credentials expand at pod
/// start; they never land in the pod spec.
#[must_use]
pub fn galera_config_script(
    provider: &str,
    cluster_name: &str,
    peers: &[String],
    discovery_service: &str,
    init_sql_dir: &str,
) -> String {
    format!(
        "set -e\n\
         cat <<EOF > {DB_CONFIG_INIT_MOUNT_PATH}/{GALERA_CONFIG_FILE}\n\
         [mysqld]\n\
         binlog_format=ROW\n\
         default_storage_engine=InnoDB\n\
         innodb_autoinc_lock_mode=2\n\
         bind-address=0.0.0.0\n\
         [galera]\n\
         wsrep_on=ON\n\
         wsrep_provider={provider}\n\
         wsrep_cluster_name={cluster_name}\n\
         wsrep_cluster_address=gcomm://{peers}\n\
         wsrep_node_name=${{POD_NAME}}\n\
         wsrep_node_address=${{POD_NAME}}.{discovery_service}\n\
         wsrep_sst_method=mariabackup\n\
         wsrep_sst_auth=${{SST_USER}}:${{SST_PASSWORD}}\n\
         EOF\n\
         cat <<EOF > {init_sql_dir}/{GALERA_INIT_SQL_FILE}\n\
         CREATE USER IF NOT EXISTS '${{SST_USER}}'@'localhost' IDENTIFIED BY '${{SST_PASSWORD}}';\n\
         GRANT RELOAD, PROCESS, LOCK TABLES, BINLOG MONITOR \
         ON *.* TO '${{SST_USER}}'@'localhost';\n\
         EOF\n",
        peers = peers.join(","),
    )
}

/// Entrypoint for a cluster node.
///
/// Ordinal 0 bootstraps a new cluster only when no other peer answers on the
/// replication port; every other node (and ordinal 0 rejoining a live cluster)
/// starts normally and joins through `wsrep_cluster_address`.
#[must_use]
pub fn galera_start_script(peers: &[String]) -> String {
    let others = peers.iter().skip(1).cloned().collect::<Vec<_>>().join(" ");
    format!(
        "set -e\n\
         ordinal=${{POD_NAME##*-}}\n\
         if [ \"$ordinal\" = \"0\" ]; then\n\
         \x20 for peer in {others}; do\n\
         \x20   if (echo > /dev/tcp/$peer/{GALERA_REPLICATION_PORT}) > /dev/null 2>&1; then\n\
         \x20     echo \"Peer $peer is up, joining existing cluster\"\n\
         \x20     exec docker-entrypoint.sh mariadbd\n\
         \x20   fi\n\
         \x20 done\n\
         \x20 echo \"No peer answered, bootstrapping a new cluster\"\n\
         \x20 exec docker-entrypoint.sh mariadbd --wsrep-new-cluster\n\
         fi\n\
         exec docker-entrypoint.sh mariadbd\n"
    )
}

/// Readiness check for a cluster node: the node must be synced and accepting queries.
#[must_use]
pub fn galera_readiness_command() -> String {
    "mysql -uroot -p${MYSQL_ROOT_PASSWORD} -N -e \"SHOW STATUS LIKE 'wsrep_ready'\" | grep -q ON"
        .to_string()
}

/// Liveness and readiness check for primary/replica nodes.
#[must_use]
pub fn ping_command() -> String {
    "mysqladmin ping -uroot -p${MYSQL_ROOT_PASSWORD}".to_string()
}

#[cfg(test)]
#[path = "scripts_tests.rs"]
mod scripts_tests;
