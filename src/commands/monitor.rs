//! `pgrls monitor` - compare installed state with the compiled artifact.

use crate::compiler::compile;
use crate::config::DatabaseArgs;
use crate::db::{connect_with_retry, introspect};
use crate::drift::{detect_drift, reconcile::reconcile};
use crate::report::{ReportFormat, render_drift_report};
use anyhow::Result;
use std::path::Path;

pub struct MonitorArgs {
    pub format: ReportFormat,
}

pub async fn cmd_monitor(
    file: &Path,
    schema_file: Option<&Path>,
    database: &DatabaseArgs,
    args: MonitorArgs,
) -> Result<i32> {
    let Some(set) = super::load_policy_set(file)? else {
        return Ok(1);
    };

    let url = database.resolve()?;
    let pool = connect_with_retry(&url).await?;

    // With no introspection file, the live catalog is the schema source.
    let (schema, tags) = match schema_file {
        Some(path) => super::load_schema(path)?,
        None => (introspect::introspect_schema(&pool).await?, Default::default()),
    };

    let compiled = compile(&set, &schema, &tags)?;
    super::report_compile_errors(&compiled.errors);

    let observed = introspect::introspect_observed(&pool, &compiled.state).await?;
    let report = detect_drift(&compiled.state, &observed);
    let ddl = reconcile(&report.items, &compiled.state);

    print!("{}", render_drift_report(&report, &ddl, args.format)?);
    Ok(if report.is_empty() { 0 } else { 1 })
}
