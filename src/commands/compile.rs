//! `pgrls compile` - emit the DDL artifact.

use crate::compiler::compile;
use anyhow::{Context, Result};
use std::path::Path;

pub async fn cmd_compile(file: &Path, schema_file: &Path, output: Option<&Path>) -> Result<i32> {
    let Some(set) = super::load_policy_set(file)? else {
        return Ok(1);
    };
    let (schema, tags) = super::load_schema(schema_file)?;

    let compiled = compile(&set, &schema, &tags)?;
    let error_count = super::report_compile_errors(&compiled.errors);

    let sql = compiled.state.render();
    match output {
        Some(path) => {
            std::fs::write(path, &sql)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("✅ Wrote compiled DDL to {}", path.display());
        }
        None => print!("{}", sql),
    }

    Ok(if error_count == 0 { 0 } else { 1 })
}
