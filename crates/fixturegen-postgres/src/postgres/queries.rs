use sqlx::PgPool;

use fixturegen_core::Result;

fn db_error(err: sqlx::Error) -> fixturegen_core::Error {
    fixturegen_core::Error::Db(err.to_string())
}

pub async fn fetch_database_name(pool: &PgPool) -> Result<String> {
    sqlx::query_scalar::<_, String>("select current_database()::text")
        .fetch_one(pool)
        .await
        .map_err(db_error)
}

pub async fn list_tables_in_schema(pool: &PgPool, schema: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select c.relname::text
        from pg_class c
        join pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1
          and c.relkind in ('r','p')
          and not c.relispartition
        order by c.relname
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(db_error)
}

pub struct RawColumn {
    pub name: String,
    pub udt_name: String,
    pub character_max_length: Option<i32>,
    pub is_nullable: bool,
    pub is_identity: bool,
}

pub async fn list_columns(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<RawColumn>> {
    let rows = sqlx::query_as::<_, (String, String, Option<i32>, bool, bool)>(
        r#"
        select
          c.column_name::text,
          c.udt_name::text,
          c.character_maximum_length::int4,
          c.is_nullable = 'YES',
          c.is_identity = 'YES' or coalesce(c.column_default, '') like 'nextval(%'
        from information_schema.columns c
        where c.table_schema = $1
          and c.table_name = $2
        order by c.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(
            |(name, udt_name, character_max_length, is_nullable, is_identity)| RawColumn {
                name,
                udt_name,
                character_max_length,
                is_nullable,
                is_identity,
            },
        )
        .collect())
}

pub async fn get_primary_key(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select att.attname::text
        from pg_constraint con
        join pg_class rel on rel.oid = con.conrelid
        join pg_namespace nsp on nsp.oid = rel.relnamespace
        join unnest(con.conkey) with ordinality as ord(attnum, ordinality) on true
        join pg_attribute att on att.attrelid = rel.oid and att.attnum = ord.attnum
        where nsp.nspname = $1
          and rel.relname = $2
          and con.contype = 'p'
        order by ord.ordinality
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(db_error)
}

/// One column pair of a foreign-key constraint.
pub struct RawForeignKeyColumn {
    pub constraint: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

pub async fn list_foreign_keys(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<RawForeignKeyColumn>> {
    let rows = sqlx::query_as::<_, (String, String, String, String)>(
        r#"
        select
          con.conname::text,
          src_att.attname::text,
          ref_rel.relname::text,
          ref_att.attname::text
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        join pg_class ref_rel on ref_rel.oid = con.confrelid
        join unnest(con.conkey, con.confkey) with ordinality as k(src_attnum, ref_attnum, ordinality) on true
        join pg_attribute src_att on src_att.attrelid = src_rel.oid and src_att.attnum = k.src_attnum
        join pg_attribute ref_att on ref_att.attrelid = ref_rel.oid and ref_att.attnum = k.ref_attnum
        where src_nsp.nspname = $1
          and src_rel.relname = $2
          and con.contype = 'f'
        order by con.conname, k.ordinality
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(
            |(constraint, column, referenced_table, referenced_column)| RawForeignKeyColumn {
                constraint,
                column,
                referenced_table,
                referenced_column,
            },
        )
        .collect())
}
