//! Drift detection: installed database state vs expected compiled state.

pub mod expr;
pub mod reconcile;

use crate::compiler::CompiledState;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// What the catalog reports for one table. Plain data; the bridge in `db`
/// fills it in, tests construct it by value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObservedState {
    pub tables: Vec<ObservedTableState>,
}

impl ObservedState {
    pub fn table(&self, name: &str) -> Option<&ObservedTableState> {
        self.tables.iter().find(|t| t.table == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTableState {
    pub table: String,
    pub rls_enabled: bool,
    pub rls_forced: bool,
    pub policies: Vec<ObservedPolicy>,
}

/// `mode` and `command` are catalog strings; values the bridge does not
/// recognize arrive as "UNKNOWN" rather than failing the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedPolicy {
    pub name: String,
    pub table: String,
    pub mode: String,
    pub command: String,
    pub using_expr: Option<String>,
    pub check_expr: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warning,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Warning => "WARNING",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

/// A single deviation between expected and observed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftItem {
    RlsDisabled {
        table: String,
    },
    RlsNotForced {
        table: String,
    },
    MissingPolicy {
        table: String,
        policy: String,
    },
    ModifiedPolicy {
        table: String,
        policy: String,
        expected: String,
        observed: String,
    },
    ExtraPolicy {
        table: String,
        policy: String,
    },
}

impl DriftItem {
    pub fn severity(&self) -> Severity {
        match self {
            DriftItem::RlsDisabled { .. } => Severity::Critical,
            DriftItem::RlsNotForced { .. } => Severity::High,
            DriftItem::MissingPolicy { .. } => Severity::Critical,
            DriftItem::ModifiedPolicy { .. } => Severity::Critical,
            DriftItem::ExtraPolicy { .. } => Severity::Warning,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DriftItem::RlsDisabled { .. } => "rls_disabled",
            DriftItem::RlsNotForced { .. } => "rls_not_forced",
            DriftItem::MissingPolicy { .. } => "missing_policy",
            DriftItem::ModifiedPolicy { .. } => "modified_policy",
            DriftItem::ExtraPolicy { .. } => "extra_policy",
        }
    }

    pub fn table(&self) -> &str {
        match self {
            DriftItem::RlsDisabled { table }
            | DriftItem::RlsNotForced { table }
            | DriftItem::MissingPolicy { table, .. }
            | DriftItem::ModifiedPolicy { table, .. }
            | DriftItem::ExtraPolicy { table, .. } => table,
        }
    }

    pub fn policy(&self) -> Option<&str> {
        match self {
            DriftItem::RlsDisabled { .. } | DriftItem::RlsNotForced { .. } => None,
            DriftItem::MissingPolicy { policy, .. }
            | DriftItem::ModifiedPolicy { policy, .. }
            | DriftItem::ExtraPolicy { policy, .. } => Some(policy),
        }
    }
}

impl fmt::Display for DriftItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftItem::RlsDisabled { table } => {
                write!(f, "row level security is not enabled on {}", table)
            }
            DriftItem::RlsNotForced { table } => {
                write!(f, "row level security is not forced on {}", table)
            }
            DriftItem::MissingPolicy { table, policy } => {
                write!(f, "policy {} is missing from {}", policy, table)
            }
            DriftItem::ModifiedPolicy { table, policy, .. } => {
                write!(f, "policy {} on {} has a modified expression", policy, table)
            }
            DriftItem::ExtraPolicy { table, policy } => {
                write!(f, "policy {} on {} is not managed", policy, table)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriftReport {
    pub items: Vec<DriftItem>,
}

impl DriftReport {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.items
            .iter()
            .filter(|item| item.severity() == severity)
            .count()
    }
}

/// Compare expected compiled state with observed catalog state. Expression
/// comparison is modulo [`expr::normalize_expression`] so catalog
/// re-rendering does not produce false positives.
pub fn detect_drift(expected: &CompiledState, observed: &ObservedState) -> DriftReport {
    let mut items = Vec::new();

    for artifacts in &expected.tables {
        let Some(observed_table) = observed.table(&artifacts.table) else {
            debug!(table = %artifacts.table, "expected table not observed");
            items.push(DriftItem::RlsDisabled {
                table: artifacts.table.clone(),
            });
            for policy in &artifacts.policies {
                items.push(DriftItem::MissingPolicy {
                    table: artifacts.table.clone(),
                    policy: policy.name.clone(),
                });
            }
            continue;
        };

        if !observed_table.rls_enabled {
            items.push(DriftItem::RlsDisabled {
                table: artifacts.table.clone(),
            });
        }
        if !observed_table.rls_forced {
            items.push(DriftItem::RlsNotForced {
                table: artifacts.table.clone(),
            });
        }

        for policy in &artifacts.policies {
            let Some(observed_policy) = observed_table
                .policies
                .iter()
                .find(|p| p.name == policy.name)
            else {
                items.push(DriftItem::MissingPolicy {
                    table: artifacts.table.clone(),
                    policy: policy.name.clone(),
                });
                continue;
            };

            let expected_expr =
                expr::normalize_expression(&policy.using_expr, &artifacts.schema);
            let observed_expr = expr::normalize_expression(
                observed_policy.using_expr.as_deref().unwrap_or(""),
                &artifacts.schema,
            );
            if expected_expr != observed_expr {
                items.push(DriftItem::ModifiedPolicy {
                    table: artifacts.table.clone(),
                    policy: policy.name.clone(),
                    expected: expected_expr,
                    observed: observed_expr,
                });
            }
        }

        for observed_policy in &observed_table.policies {
            if !artifacts
                .policies
                .iter()
                .any(|p| p.name == observed_policy.name)
            {
                items.push(DriftItem::ExtraPolicy {
                    table: artifacts.table.clone(),
                    policy: observed_policy.name.clone(),
                });
            }
        }
    }

    info!(items = items.len(), "drift detection finished");
    DriftReport { items }
}
