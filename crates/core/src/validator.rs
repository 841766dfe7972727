// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Validator` collaborator contract: schema-validate a broker message
//! body against the named schema. Schema *content* comes from a
//! [`crate::schema::SchemaRegistry`] snapshot; this module only owns
//! compiling and applying it.

use crate::schema::SchemaRegistry;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Validates a JSON instance against a named schema.
pub trait Validator: Send + Sync {
    fn validate(&self, schema_name: &str, instance: &Value) -> Result<(), ValidationError>;
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no schema registered for {0}")]
    UnknownSchema(String),
    #[error("schema {schema} failed to compile: {message}")]
    SchemaCompile { schema: String, message: String },
    #[error("instance failed validation against {schema}: {paths:?}")]
    Invalid { schema: String, paths: Vec<String> },
}

/// A [`Validator`] backed by a live [`SchemaRegistry`] snapshot. Each call
/// compiles the schema named, so a `refresh()` on the registry is visible
/// to the very next validation with no additional coordination.
pub struct SchemaRegistryValidator {
    registry: Arc<SchemaRegistry>,
}

impl SchemaRegistryValidator {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }
}

impl Validator for SchemaRegistryValidator {
    fn validate(&self, schema_name: &str, instance: &Value) -> Result<(), ValidationError> {
        let schema_value = self
            .registry
            .get(schema_name)
            .ok_or_else(|| ValidationError::UnknownSchema(schema_name.to_string()))?;

        let compiled = JSONSchema::compile(&schema_value).map_err(|err| ValidationError::SchemaCompile {
            schema: schema_name.to_string(),
            message: err.to_string(),
        })?;

        if let Err(errors) = compiled.validate(instance) {
            let paths: Vec<String> = errors.map(|err| err.instance_path.to_string()).collect();
            return Err(ValidationError::Invalid { schema: schema_name.to_string(), paths });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DirectorySchemaSource;
    use serde_json::json;

    fn registry_with(name: &str, schema: Value) -> Arc<SchemaRegistry> {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(format!("{name}.json")), schema.to_string()).unwrap();
        let source = DirectorySchemaSource::new(dir.path());
        Arc::new(SchemaRegistry::load_from(&source).unwrap())
    }

    #[test]
    fn unknown_schema_is_reported() {
        let registry = Arc::new(SchemaRegistry::empty());
        let validator = SchemaRegistryValidator::new(registry);
        let err = validator.validate("missing", &json!({})).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownSchema(name) if name == "missing"));
    }

    #[test]
    fn valid_instance_passes() {
        let registry = registry_with(
            "widget",
            json!({"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}}),
        );
        let validator = SchemaRegistryValidator::new(registry);
        assert!(validator.validate("widget", &json!({"name": "gear"})).is_ok());
    }

    #[test]
    fn invalid_instance_reports_failing_paths() {
        let registry = registry_with(
            "widget",
            json!({"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}}),
        );
        let validator = SchemaRegistryValidator::new(registry);
        let err = validator.validate("widget", &json!({})).unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { .. }));
    }
}
