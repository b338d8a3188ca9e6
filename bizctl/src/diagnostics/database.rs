//! Read-only inspection of the public schema.

use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub rows: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// Quote an identifier for interpolation into SQL
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

async fn table_names(pool: &PgPool) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
        ORDER BY table_name
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Every table in the public schema with its row count
pub async fn list_tables(pool: &PgPool) -> sqlx::Result<Vec<TableSummary>> {
    let mut tables = Vec::new();
    for name in table_names(pool).await? {
        let rows = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", quote_ident(&name)))
            .fetch_one(pool)
            .await?;
        tables.push(TableSummary { name, rows });
    }
    Ok(tables)
}

/// Every table as `{ "<table>": [rows...] }`
pub async fn export_tables(pool: &PgPool) -> sqlx::Result<Map<String, Value>> {
    let mut export = Map::new();
    for name in table_names(pool).await? {
        let sql = format!(
            "SELECT COALESCE(json_agg(row_to_json(t)), '[]'::json) FROM {} t",
            quote_ident(&name)
        );
        let rows = sqlx::query_scalar::<_, Value>(&sql).fetch_one(pool).await?;
        export.insert(name, rows);
    }
    Ok(export)
}

/// Columns of one table, in declaration order. Empty if the table does not exist.
pub async fn describe_table(pool: &PgPool, table: &str) -> sqlx::Result<Vec<ColumnInfo>> {
    sqlx::query_as::<_, ColumnInfo>(
        r#"
        SELECT
            column_name::text AS name,
            data_type::text AS data_type,
            (is_nullable = 'YES') AS nullable,
            column_default::text AS "default"
        FROM information_schema.columns
        WHERE table_schema = 'public' AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
}
