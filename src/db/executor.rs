//! DDL execution for `apply`.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{debug, info};

/// Execute statements one at a time so a failure points at the exact
/// statement that caused it.
pub async fn execute_ddl(pool: &PgPool, statements: &[String]) -> Result<()> {
    for (index, statement) in statements.iter().enumerate() {
        debug!(statement = %first_line(statement), "executing");
        sqlx::raw_sql(statement)
            .execute(pool)
            .await
            .with_context(|| {
                format!(
                    "failed to execute statement {} of {}: {}",
                    index + 1,
                    statements.len(),
                    first_line(statement)
                )
            })?;
    }
    info!(statements = statements.len(), "DDL applied");
    Ok(())
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or(statement)
}
