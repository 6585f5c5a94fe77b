//! Soundness proofs for policy predicates.
//!
//! For every (policy, governed table) pair the prover asks the solver
//! whether a row can leak across tenants despite the predicate. Results
//! come back in (policy declaration order x schema table order), matching
//! compiled DDL order.

pub mod encoder;
pub mod solver;

use crate::ast::PolicySet;
use crate::normalize::normalize;
use crate::schema::{SchemaMetadata, TagMap};
use crate::selector::evaluate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

pub use solver::{SolverConfig, SolverVerdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProofStatus {
    /// The solver proved the predicate sufficient (unsat).
    Proven,
    /// The solver found a satisfying cross-tenant assignment.
    Counterexample,
    /// Timeout, encoding gap, or solver incapacity.
    Unknown,
}

impl fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProofStatus::Proven => "PROVEN",
            ProofStatus::Counterexample => "COUNTEREXAMPLE",
            ProofStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofResult {
    pub policy: String,
    pub table: String,
    pub status: ProofStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub fn all_proven(results: &[ProofResult]) -> bool {
    results.iter().all(|r| r.status == ProofStatus::Proven)
}

pub struct Prover {
    config: SolverConfig,
}

impl Prover {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Prove every (policy, governed table) pair of the set.
    pub async fn prove_all(
        &self,
        set: &PolicySet,
        schema: &SchemaMetadata,
        tags: &TagMap,
    ) -> Vec<ProofResult> {
        let set = normalize(set);
        let mut results = Vec::new();
        for policy in &set.policies {
            let governed: BTreeSet<String> = evaluate(&policy.selector, schema, tags)
                .iter()
                .map(|t| t.qualified_name())
                .collect();
            for table in &schema.tables {
                if !governed.contains(&table.qualified_name()) {
                    continue;
                }
                let result = match encoder::encode(policy, table, schema) {
                    Ok(script) => {
                        debug!(policy = %policy.name, table = %table.name, "running solver");
                        match solver::check(&self.config, &script).await {
                            SolverVerdict::Unsat => ProofResult {
                                policy: policy.name.clone(),
                                table: table.qualified_name(),
                                status: ProofStatus::Proven,
                                detail: None,
                            },
                            SolverVerdict::Sat => ProofResult {
                                policy: policy.name.clone(),
                                table: table.qualified_name(),
                                status: ProofStatus::Counterexample,
                                detail: Some(
                                    "a cross-tenant row satisfies the predicate".to_string(),
                                ),
                            },
                            SolverVerdict::Unknown(detail) => ProofResult {
                                policy: policy.name.clone(),
                                table: table.qualified_name(),
                                status: ProofStatus::Unknown,
                                detail: Some(detail),
                            },
                        }
                    }
                    Err(e) => ProofResult {
                        policy: policy.name.clone(),
                        table: table.qualified_name(),
                        status: ProofStatus::Unknown,
                        detail: Some(format!("could not encode predicate: {}", e)),
                    },
                };
                results.push(result);
            }
        }
        info!(
            results = results.len(),
            proven = results
                .iter()
                .filter(|r| r.status == ProofStatus::Proven)
                .count(),
            "proof run finished"
        );
        results
    }
}
