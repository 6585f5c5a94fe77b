//! `pgrls analyze` - discharge the cross-tenant soundness proof for every
//! (policy, governed table) pair.

use crate::proof::{Prover, SolverConfig, all_proven};
use crate::report::{ReportFormat, render_proof_report};
use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub struct AnalyzeArgs {
    pub solver: String,
    pub timeout_secs: u64,
    pub format: ReportFormat,
}

pub async fn cmd_analyze(file: &Path, schema_file: &Path, args: AnalyzeArgs) -> Result<i32> {
    let Some(set) = super::load_policy_set(file)? else {
        return Ok(1);
    };
    let (schema, tags) = super::load_schema(schema_file)?;

    info!(
        policies = set.policies.len(),
        tables = schema.tables.len(),
        "running proofs"
    );
    let prover = Prover::new(SolverConfig {
        command: args.solver,
        timeout: Duration::from_secs(args.timeout_secs),
    });
    let results = prover.prove_all(&set, &schema, &tags).await;

    print!("{}", render_proof_report(&results, args.format)?);
    Ok(if all_proven(&results) { 0 } else { 1 })
}
