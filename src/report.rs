//! Human and JSON rendering of proof results and drift reports.

use crate::drift::{DriftItem, DriftReport, Severity};
use crate::proof::{ProofResult, ProofStatus, all_proven};
use anyhow::Result;
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// Aligned text for terminals
    Human,
    /// Stable JSON for CI integration
    Json,
}

#[derive(Serialize)]
struct ProofJsonOutput<'a> {
    results: &'a [ProofResult],
    all_proven: bool,
}

pub fn render_proof_report(results: &[ProofResult], format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => {
            let output = ProofJsonOutput {
                results,
                all_proven: all_proven(results),
            };
            Ok(serde_json::to_string_pretty(&output)?)
        }
        ReportFormat::Human => {
            let mut out = String::new();
            if results.is_empty() {
                writeln!(out, "No (policy, table) pairs to prove.")?;
                return Ok(out);
            }
            writeln!(out, "Proof results:")?;
            for result in results {
                write!(
                    out,
                    "  {:<15} {:<28} {}",
                    result.status.to_string(),
                    result.policy,
                    result.table
                )?;
                if let Some(detail) = &result.detail {
                    write!(out, "  ({})", detail)?;
                }
                writeln!(out)?;
            }
            let proven = count(results, ProofStatus::Proven);
            let counterexamples = count(results, ProofStatus::Counterexample);
            let unknown = count(results, ProofStatus::Unknown);
            writeln!(
                out,
                "\n{} proven, {} counterexamples, {} unknown",
                proven, counterexamples, unknown
            )?;
            Ok(out)
        }
    }
}

fn count(results: &[ProofResult], status: ProofStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

#[derive(Serialize)]
struct DriftJsonItem<'a> {
    kind: &'static str,
    severity: Severity,
    table: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    observed: Option<&'a str>,
}

#[derive(Serialize)]
struct DriftJsonSummary {
    critical: usize,
    high: usize,
    warning: usize,
}

#[derive(Serialize)]
struct DriftJsonOutput<'a> {
    drift: Vec<DriftJsonItem<'a>>,
    summary: DriftJsonSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reconcile: Vec<String>,
}

pub fn render_drift_report(
    report: &DriftReport,
    reconcile_ddl: &[String],
    format: ReportFormat,
) -> Result<String> {
    match format {
        ReportFormat::Json => {
            let output = DriftJsonOutput {
                drift: report.items.iter().map(drift_json_item).collect(),
                summary: DriftJsonSummary {
                    critical: report.count(Severity::Critical),
                    high: report.count(Severity::High),
                    warning: report.count(Severity::Warning),
                },
                reconcile: reconcile_ddl.to_vec(),
            };
            Ok(serde_json::to_string_pretty(&output)?)
        }
        ReportFormat::Human => {
            let mut out = String::new();
            if report.is_empty() {
                writeln!(out, "No drift detected.")?;
                return Ok(out);
            }
            writeln!(out, "Drift detected:")?;
            for item in &report.items {
                writeln!(
                    out,
                    "  {:<9} {:<16} {}",
                    item.severity().to_string(),
                    item.kind(),
                    item
                )?;
                if let DriftItem::ModifiedPolicy {
                    expected, observed, ..
                } = item
                {
                    writeln!(out, "            expected: {}", expected)?;
                    writeln!(out, "            observed: {}", observed)?;
                }
            }
            writeln!(
                out,
                "\n{} critical, {} high, {} warning",
                report.count(Severity::Critical),
                report.count(Severity::High),
                report.count(Severity::Warning)
            )?;
            if !reconcile_ddl.is_empty() {
                writeln!(out, "\nReconciliation DDL:")?;
                for statement in reconcile_ddl {
                    writeln!(out, "{}", statement)?;
                }
            }
            Ok(out)
        }
    }
}

fn drift_json_item(item: &DriftItem) -> DriftJsonItem<'_> {
    let (expected, observed) = match item {
        DriftItem::ModifiedPolicy {
            expected, observed, ..
        } => (Some(expected.as_str()), Some(observed.as_str())),
        _ => (None, None),
    };
    DriftJsonItem {
        kind: item.kind(),
        severity: item.severity(),
        table: item.table(),
        policy: item.policy(),
        expected,
        observed,
    }
}
