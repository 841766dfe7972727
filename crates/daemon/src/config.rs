// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: a TOML file plus environment-variable overrides
//! for secrets, covering exactly the inputs a deployment needs to wire the
//! queue, docstore, schema registry, and bulk-mode thresholds.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    Mongo,
    OpenSearch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub dir: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_true")]
    pub optimize_list: bool,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocstoreConfig {
    pub backend: Backend,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_artifacts_collection")]
    pub artifacts_collection: String,
    #[serde(default = "default_invalid_collection")]
    pub invalid_collection: String,
    #[serde(default = "default_unknown_topic_collection")]
    pub unknown_topic_collection: String,
    /// Overridden by `CIVAULT_DOCSTORE_USERNAME` if set.
    #[serde(default)]
    pub username: Option<String>,
    /// Overridden by `CIVAULT_DOCSTORE_PASSWORD` if set; never read from
    /// the config file in a real deployment.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_artifacts_collection() -> String {
    "artifacts".to_string()
}

fn default_invalid_collection() -> String {
    "invalid".to_string()
}

fn default_unknown_topic_collection() -> String {
    "unknown_topic".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub dir: PathBuf,
    #[serde(default = "default_schema_refresh_secs")]
    pub refresh_interval_secs: u64,
}

fn default_schema_refresh_secs() -> u64 {
    60
}

impl SchemaConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkModeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bulk_max_ops")]
    pub max_ops: usize,
    #[serde(default = "default_bulk_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_bulk_idle_gap_secs")]
    pub idle_gap_secs: u64,
}

fn default_bulk_max_ops() -> usize {
    100
}

fn default_bulk_max_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_bulk_idle_gap_secs() -> u64 {
    3
}

impl Default for BulkModeConfig {
    fn default() -> Self {
        Self { enabled: false, max_ops: default_bulk_max_ops(), max_bytes: default_bulk_max_bytes(), idle_gap_secs: default_bulk_idle_gap_secs() }
    }
}

impl BulkModeConfig {
    pub fn idle_gap(&self) -> Duration {
        Duration::from_secs(self.idle_gap_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub queue: QueueConfig,
    pub docstore: DocstoreConfig,
    pub schema: SchemaConfig,
    #[serde(default)]
    pub bulk: BulkModeConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(username) = std::env::var("CIVAULT_DOCSTORE_USERNAME") {
            self.docstore.username = Some(username);
        }
        if let Ok(password) = std::env::var("CIVAULT_DOCSTORE_PASSWORD") {
            self.docstore.password = Some(password);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("civaultd.toml");
        std::fs::write(
            &path,
            r#"
            [queue]
            dir = "/var/lib/civault/queue"

            [docstore]
            backend = "memory"

            [schema]
            dir = "/etc/civault/schemas"
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.docstore.backend, Backend::Memory);
        assert_eq!(config.docstore.artifacts_collection, "artifacts");
        assert_eq!(config.queue.poll_interval_ms, 500);
        assert!(!config.bulk.enabled);
    }

    #[test]
    fn password_env_override_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("civaultd.toml");
        std::fs::write(
            &path,
            r#"
            [queue]
            dir = "/var/lib/civault/queue"

            [docstore]
            backend = "mongo"
            uri = "mongodb://localhost:27017"
            password = "from-file"

            [schema]
            dir = "/etc/civault/schemas"
            "#,
        )
        .unwrap();

        std::env::set_var("CIVAULT_DOCSTORE_PASSWORD", "from-env");
        let config = Config::load(&path).unwrap();
        std::env::remove_var("CIVAULT_DOCSTORE_PASSWORD");
        assert_eq!(config.docstore.password.as_deref(), Some("from-env"));
    }
}
