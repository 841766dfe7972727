// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide JSON schemas, held as an atomically-swappable snapshot.
//!
//! Fetching schema files from their upstream distribution point is out of
//! scope here; [`SchemaSource`] is the narrow seam a real deployment wires
//! to that collaborator. [`DirectorySchemaSource`] is the local-disk
//! implementation used for development and tests.

use arc_swap::ArcSwap;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// A source of compiled-schema JSON, keyed by schema name.
pub trait SchemaSource: Send + Sync {
    fn load_all(&self) -> Result<HashMap<String, Value>, SchemaLoadError>;
}

#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("failed to read schema directory {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse schema {name}: {source}")]
    Parse { name: String, #[source] source: serde_json::Error },
}

/// Reads every `*.json` file in a directory, naming each schema after its
/// file stem.
pub struct DirectorySchemaSource {
    dir: PathBuf,
}

impl DirectorySchemaSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SchemaSource for DirectorySchemaSource {
    fn load_all(&self) -> Result<HashMap<String, Value>, SchemaLoadError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|source| SchemaLoadError::Io { path: self.dir.clone(), source })?;

        let mut schemas = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| SchemaLoadError::Io { path: self.dir.clone(), source })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
            let raw = std::fs::read_to_string(&path)
                .map_err(|source| SchemaLoadError::Io { path: path.clone(), source })?;
            let value: Value =
                serde_json::from_str(&raw).map_err(|source| SchemaLoadError::Parse { name: name.clone(), source })?;
            schemas.insert(name, value);
        }
        Ok(schemas)
    }
}

/// The compiled schema set, held behind an atomic pointer so a refresh
/// task can hot-swap it without readers ever observing a torn snapshot.
pub struct SchemaRegistry {
    snapshot: ArcSwap<HashMap<String, Value>>,
}

impl SchemaRegistry {
    pub fn new(initial: HashMap<String, Value>) -> Self {
        Self { snapshot: ArcSwap::from_pointee(initial) }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    pub fn load_from(source: &dyn SchemaSource) -> Result<Self, SchemaLoadError> {
        Ok(Self::new(source.load_all()?))
    }

    /// Re-reads `source` and atomically swaps it in. Called on whatever
    /// refresh cadence the deployment configures; readers never block on
    /// this and never see a half-updated set.
    pub fn refresh(&self, source: &dyn SchemaSource) -> Result<(), SchemaLoadError> {
        let next = source.load_all()?;
        self.snapshot.store(Arc::new(next));
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<HashMap<String, Value>> {
        self.snapshot.load_full()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.snapshot.load().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_source_loads_json_files_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("widget.json"), r#"{"type":"object"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = DirectorySchemaSource::new(dir.path());
        let loaded = source.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("widget"));
    }

    #[test]
    fn registry_refresh_replaces_the_snapshot() {
        let registry = SchemaRegistry::empty();
        assert!(registry.get("widget").is_none());

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("widget.json"), r#"{"type":"object"}"#).unwrap();
        let source = DirectorySchemaSource::new(dir.path());

        registry.refresh(&source).unwrap();
        assert!(registry.get("widget").is_some());
    }

    #[test]
    fn parse_error_names_the_offending_schema() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let source = DirectorySchemaSource::new(dir.path());
        let err = source.load_all().unwrap_err();
        assert!(matches!(err, SchemaLoadError::Parse { name, .. } if name == "broken"));
    }
}
