use sqlx::PgPool;
use tracing::{debug, info};

use fixturegen_core::{Result, SchemaDescriptor};

use crate::adapter::SchemaSource;
use crate::options::SourceOptions;

pub mod ddl;
mod mapper;
mod queries;
pub mod sink;

pub use mapper::map_logical_type;

/// Schema source backed by the PostgreSQL catalog.
#[derive(Debug, Clone)]
pub struct PgSchemaSource {
    pool: PgPool,
}

impl PgSchemaSource {
    /// Create a new source using a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SchemaSource for PgSchemaSource {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn load_schema(&self, opts: &SourceOptions) -> Result<SchemaDescriptor> {
        introspect_postgres(&self.pool, opts).await
    }
}

/// Describe the base tables of one namespace.
pub async fn introspect_postgres(pool: &PgPool, opts: &SourceOptions) -> Result<SchemaDescriptor> {
    let database = queries::fetch_database_name(pool).await?;
    let names = queries::list_tables_in_schema(pool, &opts.schema).await?;

    let mut tables = Vec::new();
    for name in names.into_iter().filter(|name| opts.includes(name)) {
        let raw_columns = queries::list_columns(pool, &opts.schema, &name).await?;
        let primary_key = queries::get_primary_key(pool, &opts.schema, &name).await?;
        let raw_fks = queries::list_foreign_keys(pool, &opts.schema, &name).await?;
        debug!(table = %name, columns = raw_columns.len(), "table described");
        tables.push(mapper::map_table(name, raw_columns, &primary_key, raw_fks));
    }

    info!(
        database = %database,
        schema = %opts.schema,
        tables = tables.len(),
        "postgres schema loaded"
    );

    Ok(SchemaDescriptor {
        name: Some(database),
        tables,
    })
}

/// Double-quote an identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn qualified_name(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(table)),
        None => quote_ident(table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualified_name(Some("app"), "users"), "\"app\".\"users\"");
    }
}
