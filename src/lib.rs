//! mydb-driver
//!
//! A document collection layer that turns every successful write into an op
//! notification:
//! - `update` / `findAndModify` calls are normalized into `(id, filter, operation)`
//! - the store executes the write; failures are returned and never broadcast
//! - acknowledged writes are delivered to local `op` listeners, then
//!   published on a remote channel named after the document id (NATS)

pub mod collection;
pub mod db;
pub mod document;
pub mod error;
pub mod events;
pub mod executor;
pub mod request;
pub mod selector;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use collection::Collection;
pub use db::Database;
pub use document::{Document, DocumentId, Filter, OperationSpec};
pub use error::{Error, ErrorKind, Result};
pub use events::{ListenerId, OpEvent, RemoteOp};
pub use request::{FindAndModify, OpRequest};
pub use selector::Selector;
pub use store::{DocumentStore, FindAndModifyOptions, MemoryStore, UpdateOutcome};

use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub nats: NatsYamlConfig,
    pub database: DatabaseYamlConfig,
    pub listeners: ListenersYamlConfig,
}

/// NATS section. No `url` means local-only mode.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NatsYamlConfig {
    pub url: Option<String>,
}

/// Database section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseYamlConfig {
    pub name: String,
}

impl Default for DatabaseYamlConfig {
    fn default() -> Self {
        Self {
            name: "mydb".into(),
        }
    }
}

/// Local listener section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenersYamlConfig {
    pub watch_capacity: usize,
}

impl Default for ListenersYamlConfig {
    fn default() -> Self {
        Self {
            watch_capacity: events::DEFAULT_WATCH_CAPACITY,
        }
    }
}

// ============================================================================
// Runtime config (what the driver actually uses)
// ============================================================================

/// Driver configuration
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// NATS server; `None` disables remote publishing
    pub nats_url: Option<String>,
    /// Session name
    pub database: String,
    /// Capacity of each collection's `watch()` channel
    pub watch_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> anyhow::Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        Ok(Self {
            nats_url: std::env::var("NATS_URL")
                .ok()
                .filter(|url| !url.is_empty())
                .or(yaml.nats.url),
            database: std::env::var("MYDB_DATABASE").unwrap_or(yaml.database.name),
            watch_capacity: std::env::var("MYDB_WATCH_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.listeners.watch_capacity),
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
nats:
  url: nats://broker:4222

database:
  name: app

listeners:
  watch_capacity: 16
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.nats.url, Some("nats://broker:4222".into()));
        assert_eq!(config.database.name, "app");
        assert_eq!(config.listeners.watch_capacity, 16);
    }

    #[test]
    fn test_nats_section_absent() {
        let yaml = r#"
database:
  name: app
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.nats.url.is_none());
        assert_eq!(
            config.listeners.watch_capacity,
            events::DEFAULT_WATCH_CAPACITY
        );
    }

    #[test]
    fn test_yaml_defaults() {
        let config = YamlConfig::default();
        assert!(config.nats.url.is_none());
        assert_eq!(config.database.name, "mydb");
        assert_eq!(config.listeners.watch_capacity, 1024);
    }

    /// Combined test for YAML file loading and env var overrides.
    /// Runs as a single test to avoid parallel env var race conditions.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &["NATS_URL", "MYDB_DATABASE", "MYDB_WATCH_CAPACITY"] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
nats:
  url: nats://yaml-host:4222
database:
  name: yaml-db
listeners:
  watch_capacity: 32
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.nats_url.as_deref(), Some("nats://yaml-host:4222"));
        assert_eq!(config.database, "yaml-db");
        assert_eq!(config.watch_capacity, 32);

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("NATS_URL", "nats://env-host:4222");
        std::env::set_var("MYDB_WATCH_CAPACITY", "64");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.nats_url.as_deref(), Some("nats://env-host:4222"));
        assert_eq!(config.watch_capacity, 64);
        // YAML value still used where no env override
        assert_eq!(config.database, "yaml-db");

        clear_env();

        // --- Phase 3: No YAML file → defaults, local-only ---
        let nonexistent = Path::new("/tmp/nonexistent-mydb-config-12345.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert!(config.nats_url.is_none());
        assert_eq!(config.database, "mydb");
        assert_eq!(config.watch_capacity, 1024);

        // --- Phase 4: Broken YAML → defaults ---
        let broken = dir.path().join("broken.yaml");
        std::fs::write(&broken, "nats: [not, a, mapping").unwrap();
        let config = Config::from_yaml_and_env(Some(&broken)).unwrap();
        assert!(config.nats_url.is_none());
    }
}
