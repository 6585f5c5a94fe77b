//! `pgrls apply` - compile and install the policies.

use crate::compiler::compile;
use crate::config::DatabaseArgs;
use crate::db::{connect_with_retry, executor};
use anyhow::Result;
use std::path::Path;

pub async fn cmd_apply(file: &Path, schema_file: &Path, database: &DatabaseArgs) -> Result<i32> {
    let Some(set) = super::load_policy_set(file)? else {
        return Ok(1);
    };
    let (schema, tags) = super::load_schema(schema_file)?;

    let compiled = compile(&set, &schema, &tags)?;
    let error_count = super::report_compile_errors(&compiled.errors);

    let statements = compiled.state.statements();
    if statements.is_empty() {
        println!("Nothing to apply: no policy governs any table.");
        return Ok(if error_count == 0 { 0 } else { 1 });
    }

    let url = database.resolve()?;
    let pool = connect_with_retry(&url).await?;
    executor::execute_ddl(&pool, &statements).await?;
    println!(
        "✅ Applied {} statements across {} tables",
        statements.len(),
        compiled.state.tables.len()
    );

    Ok(if error_count == 0 { 0 } else { 1 })
}
