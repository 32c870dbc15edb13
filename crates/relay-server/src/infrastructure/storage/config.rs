//! TOML-based configuration for the relay server.
//!
//! The server reads `relay.toml` from its working directory (or the path
//! given on the command line). Every field carries a serde default drawn
//! from the classic deployment, so a missing file (the common case on a
//! lab box) yields a fully working server:
//!
//! ```toml
//! [server]
//! identity = "Islamabad"
//! files_dir = "received"
//! log_level = "info"
//!
//! [network]
//! stream_port = 5000
//! datagram_port = 6000
//! bind_address = "0.0.0.0"
//!
//! [limits]
//! max_sessions = 10
//! max_files = 200
//! monitor_interval_secs = 10
//!
//! [[credentials]]
//! campus = "Lahore"
//! secret = "NU-LHR-123"
//! ```
//!
//! When no `[[credentials]]` blocks are present the built-in campus roster
//! applies. Credentials are fixed after startup; there is no reload.

use std::path::{Path, PathBuf};

use relay_core::{CredentialEntry, CredentialTable, DEFAULT_SERVER_IDENTITY};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Campus credential entries; empty means "use the built-in roster".
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
}

/// Identity and local-storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// The server's reserved identity. Addressable as a SEND/FILE target;
    /// never acceptable as a client name.
    #[serde(default = "default_identity")]
    pub identity: String,
    /// Directory where server-addressed files are persisted.
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Transport ports and bind address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// TCP port for the authenticated command channel.
    #[serde(default = "default_stream_port")]
    pub stream_port: u16,
    /// UDP port for heartbeat datagrams.
    #[serde(default = "default_datagram_port")]
    pub datagram_port: u16,
    /// IP address to bind both sockets to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Table capacities and timer periods.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    /// Session registry capacity. Registration beyond this fails; nothing
    /// is evicted.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// File reception index capacity.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Liveness monitor reporting period in seconds.
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_identity() -> String {
    DEFAULT_SERVER_IDENTITY.to_string()
}
fn default_files_dir() -> PathBuf {
    PathBuf::from("received")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_stream_port() -> u16 {
    5000
}
fn default_datagram_port() -> u16 {
    6000
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_max_sessions() -> usize {
    10
}
fn default_max_files() -> usize {
    200
}
fn default_monitor_interval() -> u64 {
    10
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            network: NetworkConfig::default(),
            limits: LimitsConfig::default(),
            credentials: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            identity: default_identity(),
            files_dir: default_files_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            stream_port: default_stream_port(),
            datagram_port: default_datagram_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            max_files: default_max_files(),
            monitor_interval_secs: default_monitor_interval(),
        }
    }
}

impl RelayConfig {
    /// Builds the runtime credential table: configured entries, or the
    /// built-in roster when none are configured.
    pub fn credential_table(&self) -> CredentialTable {
        if self.credentials.is_empty() {
            CredentialTable::default_table()
        } else {
            CredentialTable::new(self.credentials.iter().cloned())
        }
    }
}

/// Loads `RelayConfig` from `path`, returning `RelayConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not
/// found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: RelayConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RelayConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_default_config_matches_classic_deployment() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.server.identity, "Islamabad");
        assert_eq!(cfg.network.stream_port, 5000);
        assert_eq!(cfg.network.datagram_port, 6000);
        assert_eq!(cfg.limits.max_sessions, 10);
        assert_eq!(cfg.limits.max_files, 200);
        assert_eq!(cfg.limits.monitor_interval_secs, 10);
    }

    #[test]
    fn test_default_config_uses_builtin_credential_roster() {
        let cfg = RelayConfig::default();
        let table = cfg.credential_table();
        assert!(table.verify("Lahore", "NU-LHR-123"));
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_configured_credentials_replace_builtin_roster() {
        let toml_str = r#"
[[credentials]]
campus = "Quetta"
secret = "NU-QTA-999"
"#;
        let cfg: RelayConfig = toml::from_str(toml_str).expect("deserialize");
        let table = cfg.credential_table();
        assert!(table.verify("Quetta", "NU-QTA-999"));
        assert!(!table.verify("Lahore", "NU-LHR-123"));
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: RelayConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_deserialize_partial_network_overrides_defaults() {
        let toml_str = r#"
[network]
stream_port = 9000
"#;
        let cfg: RelayConfig = toml::from_str(toml_str).expect("deserialize partial");
        assert_eq!(cfg.network.stream_port, 9000);
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.network.datagram_port, 6000);
        assert_eq!(cfg.server.identity, "Islamabad");
    }

    #[test]
    fn test_deserialize_invalid_toml_is_parse_error() {
        let result: Result<RelayConfig, toml::de::Error> = toml::from_str("[[[ nope");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from(format!("/nonexistent/{}/relay.toml", Uuid::new_v4()));
        let cfg = load_config(&path).expect("absent file must yield defaults");
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_load_config_reads_file_from_disk() {
        let dir = std::env::temp_dir().join(format!("relay_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relay.toml");
        std::fs::write(
            &path,
            "[limits]\nmax_sessions = 3\n[server]\nlog_level = \"debug\"\n",
        )
        .unwrap();

        let cfg = load_config(&path).expect("load must succeed");
        assert_eq!(cfg.limits.max_sessions, 3);
        assert_eq!(cfg.server.log_level, "debug");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut cfg = RelayConfig::default();
        cfg.network.stream_port = 15000;
        cfg.credentials.push(CredentialEntry {
            campus: "Sialkot".to_string(),
            secret: "pw".to_string(),
        });

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: RelayConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(cfg, restored);
    }
}
