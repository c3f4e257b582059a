use async_trait::async_trait;

use fixturegen_core::{Result, SchemaDescriptor};

use crate::options::SourceOptions;

/// Trait implemented by database adapters that can describe their tables.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Read the catalog and return table descriptors for the selected tables.
    async fn load_schema(&self, opts: &SourceOptions) -> Result<SchemaDescriptor>;
}
