//! Read-only catalog introspection.
//!
//! Two shapes come out of here: the schema model the pipeline compiles
//! against, and the observed RLS state the drift detector compares with.
//! Nothing in this module mutates the database, and no transactional
//! isolation is assumed across queries.

use crate::compiler::CompiledState;
use crate::drift::{ObservedPolicy, ObservedState, ObservedTableState};
use crate::schema::{ColumnInfo, SchemaMetadata, TableMetadata};
use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

/// List ordinary tables and their columns, excluding system schemas, in
/// (schema, table, column position) order.
pub async fn introspect_schema(pool: &PgPool) -> Result<SchemaMetadata> {
    info!("introspecting schema");
    let rows = sqlx::query(
        r#"
        SELECT
            n.nspname AS schema_name,
            c.relname AS table_name,
            a.attname AS column_name,
            format_type(a.atttypid, a.atttypmod) AS column_type
        FROM pg_attribute a
        JOIN pg_class c ON a.attrelid = c.oid
        JOIN pg_namespace n ON c.relnamespace = n.oid
        WHERE c.relkind = 'r'
          AND a.attnum > 0
          AND NOT a.attisdropped
          AND n.nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
        ORDER BY n.nspname, c.relname, a.attnum
        "#,
    )
    .fetch_all(pool)
    .await
    .context("failed to introspect tables")?;

    let mut tables: Vec<TableMetadata> = Vec::new();
    for row in rows {
        let schema_name: String = row.get("schema_name");
        let table_name: String = row.get("table_name");
        let column = ColumnInfo {
            name: row.get("column_name"),
            column_type: row.get("column_type"),
        };
        match tables.last_mut() {
            Some(table) if table.schema == schema_name && table.name == table_name => {
                table.columns.push(column);
            }
            _ => tables.push(TableMetadata {
                schema: schema_name,
                name: table_name,
                columns: vec![column],
            }),
        }
    }

    debug!(tables = tables.len(), "schema introspection finished");
    Ok(SchemaMetadata { tables })
}

/// Observe the RLS state of every table the compiled state expects: two
/// read-only queries per table (flags, then policies). Tables missing from
/// the database are simply absent from the result.
pub async fn introspect_observed(
    pool: &PgPool,
    expected: &CompiledState,
) -> Result<ObservedState> {
    let mut tables = Vec::new();
    for artifacts in &expected.tables {
        let Some((rls_enabled, rls_forced)) =
            fetch_rls_flags(pool, &artifacts.schema, &artifacts.table).await?
        else {
            debug!(table = %artifacts.table, "table not present in database");
            continue;
        };
        let policies = fetch_policies(pool, &artifacts.schema, &artifacts.table).await?;
        tables.push(ObservedTableState {
            table: artifacts.table.clone(),
            rls_enabled,
            rls_forced,
            policies,
        });
    }
    Ok(ObservedState { tables })
}

async fn fetch_rls_flags(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Option<(bool, bool)>> {
    let row = sqlx::query(
        r#"
        SELECT c.relrowsecurity AS rls_enabled, c.relforcerowsecurity AS rls_forced
        FROM pg_class c
        JOIN pg_namespace n ON c.relnamespace = n.oid
        WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind = 'r'
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to read RLS flags for {}.{}", schema, table))?;

    Ok(row.map(|row| (row.get("rls_enabled"), row.get("rls_forced"))))
}

async fn fetch_policies(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<ObservedPolicy>> {
    let rows = sqlx::query(
        r#"
        SELECT
            p.polname AS policy_name,
            p.polcmd::text AS command,
            p.polpermissive AS permissive,
            pg_get_expr(p.polqual, p.polrelid) AS using_expr,
            pg_get_expr(p.polwithcheck, p.polrelid) AS check_expr
        FROM pg_policy p
        JOIN pg_class c ON p.polrelid = c.oid
        JOIN pg_namespace n ON c.relnamespace = n.oid
        WHERE n.nspname = $1 AND c.relname = $2
        ORDER BY p.polname
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to read policies for {}.{}", schema, table))?;

    let policies = rows
        .into_iter()
        .map(|row| {
            let command: Option<String> = row.get("command");
            let permissive: bool = row.get("permissive");
            ObservedPolicy {
                name: row.get("policy_name"),
                table: table.to_string(),
                mode: if permissive {
                    "PERMISSIVE".to_string()
                } else {
                    "RESTRICTIVE".to_string()
                },
                command: decode_command(command.as_deref()),
                using_expr: row.get("using_expr"),
                check_expr: row.get("check_expr"),
            }
        })
        .collect();
    Ok(policies)
}

/// Catalog `polcmd` characters. Anything unexpected coerces to "UNKNOWN"
/// instead of failing the scan.
fn decode_command(polcmd: Option<&str>) -> String {
    match polcmd {
        Some("*") => "ALL",
        Some("r") => "SELECT",
        Some("a") => "INSERT",
        Some("w") => "UPDATE",
        Some("d") => "DELETE",
        other => {
            debug!(polcmd = ?other, "unrecognized policy command");
            "UNKNOWN"
        }
    }
    .to_string()
}
