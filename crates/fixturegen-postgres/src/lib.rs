//! PostgreSQL collaborators: catalog introspection into schema descriptors,
//! a transactional persistence sink and DDL for the described tables.

pub mod adapter;
pub mod options;
pub mod postgres;

pub use adapter::SchemaSource;
pub use options::SourceOptions;
pub use postgres::ddl::{create_table_sql, create_tables, drop_table_sql, drop_tables};
pub use postgres::sink::PgSink;
pub use postgres::{PgSchemaSource, introspect_postgres};
