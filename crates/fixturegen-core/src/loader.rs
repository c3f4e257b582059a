use std::path::Path;

use jsonschema::JSONSchema;
use schemars::schema_for;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::schema::SchemaDescriptor;
use crate::validation::validate_schema;

/// JSON Schema describing schema-description documents.
pub fn schema_json_schema() -> Result<Value> {
    Ok(serde_json::to_value(schema_for!(SchemaDescriptor))?)
}

/// Load a schema description from a `.json` or `.toml` file.
pub fn load_schema_path(path: &Path) -> Result<SchemaDescriptor> {
    let content = std::fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    if is_toml {
        load_schema_toml(&content)
    } else {
        load_schema_json(&content)
    }
}

pub fn load_schema_json(content: &str) -> Result<SchemaDescriptor> {
    let document: Value = serde_json::from_str(content)?;
    load_schema_value(document)
}

pub fn load_schema_toml(content: &str) -> Result<SchemaDescriptor> {
    let document: toml::Value = toml::from_str(content)?;
    load_schema_value(serde_json::to_value(document)?)
}

/// Check a document against the JSON Schema, decode it, then validate references.
pub fn load_schema_value(document: Value) -> Result<SchemaDescriptor> {
    let violations = check_document(&document)?;
    if !violations.is_empty() {
        return Err(Error::SchemaViolation(violations));
    }

    let schema: SchemaDescriptor = serde_json::from_value(document)?;
    validate_schema(&schema)?;
    Ok(schema)
}

fn check_document(document: &Value) -> Result<Vec<String>> {
    let json_schema = schema_json_schema()?;
    let compiled = JSONSchema::compile(&json_schema)
        .map_err(|err| Error::InvalidSchema(format!("json schema did not compile: {err}")))?;

    let violations = match compiled.validate(document) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|error| {
                let path = error.instance_path.to_string();
                let path = if path.is_empty() { "/".to_string() } else { path };
                format!("{path}: {error}")
            })
            .collect(),
    };

    Ok(violations)
}
