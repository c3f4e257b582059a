//! Core contracts and helpers for fixturegen.
//!
//! This crate defines the schema descriptors consumed by the generator,
//! schema validation, the foreign-key dependency graph, and schema
//! document loading shared by the sources, the generator and the CLI.

pub mod error;
pub mod graph;
pub mod loader;
pub mod redaction;
pub mod schema;
pub mod types;
pub mod validation;

pub use error::{Error, Result};
pub use graph::{DependencyReport, DependencySummary, build_dependency_report};
pub use loader::{
    load_schema_json, load_schema_path, load_schema_toml, load_schema_value, schema_json_schema,
};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use schema::{ColumnDescriptor, ColumnReference, SchemaDescriptor, TableDescriptor};
pub use types::LogicalType;
pub use validation::validate_schema;
