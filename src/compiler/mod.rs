//! Compilation of a policy set into deterministic DDL artifacts.

pub mod render;

use crate::ast::{Atom, Clause, Policy, PolicySet, Selector};
use crate::normalize::normalize;
use crate::schema::{SchemaMetadata, TagMap};
use crate::selector::evaluate;
use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

/// One installed policy: its compiled name, the table it lives on, the
/// USING expression (kept for drift comparison) and the full statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledPolicy {
    pub name: String,
    pub table: String,
    pub using_expr: String,
    pub sql: String,
}

/// Everything the engine installs on a single table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableArtifacts {
    pub schema: String,
    pub table: String,
    pub enable_rls: String,
    pub force_rls: String,
    pub policies: Vec<CompiledPolicy>,
}

/// Ordered compilation output; table order follows schema order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CompiledState {
    pub tables: Vec<TableArtifacts>,
}

impl CompiledState {
    pub fn table(&self, name: &str) -> Option<&TableArtifacts> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// All statements in install order.
    pub fn statements(&self) -> Vec<String> {
        let mut out = Vec::new();
        for artifacts in &self.tables {
            out.push(artifacts.enable_rls.clone());
            out.push(artifacts.force_rls.clone());
            for policy in &artifacts.policies {
                out.push(policy.sql.clone());
            }
        }
        out
    }

    /// The full DDL text, tables separated by a blank line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, artifacts) in self.tables.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&artifacts.enable_rls);
            out.push('\n');
            out.push_str(&artifacts.force_rls);
            out.push('\n');
            for policy in &artifacts.policies {
                out.push_str(&policy.sql);
                out.push('\n');
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileErrorKind {
    UnknownColumn,
    UnknownTable,
}

/// A semantic problem that aborts one policy without failing the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub policy: String,
    pub context: String,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CompileErrorKind::UnknownColumn => "unknown column",
            CompileErrorKind::UnknownTable => "unknown table",
        };
        write!(f, "policy '{}': {}: {}", self.policy, kind, self.context)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    pub state: CompiledState,
    pub errors: Vec<CompileError>,
}

/// Compile a policy set against schema metadata. Pure: identical inputs
/// produce byte-identical rendered output. Policies with semantic errors
/// are skipped and reported; a duplicate compiled policy name on one table
/// means two source policies collide and is refused outright.
pub fn compile(
    set: &PolicySet,
    schema: &SchemaMetadata,
    tags: &TagMap,
) -> Result<CompileOutput> {
    let set = normalize(set);

    let mut errors = Vec::new();
    let mut valid = Vec::with_capacity(set.policies.len());
    for policy in &set.policies {
        match validate_policy(policy, schema) {
            Some(error) => {
                debug!(policy = %policy.name, %error, "skipping policy");
                errors.push(error);
            }
            None => valid.push(policy),
        }
    }

    // Membership sets up front so the table loop stays schema-ordered.
    let governed: Vec<BTreeSet<String>> = valid
        .iter()
        .map(|policy| {
            evaluate(&policy.selector, schema, tags)
                .iter()
                .map(|t| t.qualified_name())
                .collect()
        })
        .collect();

    let mut tables = Vec::new();
    for table in &schema.tables {
        let mut policies = Vec::new();
        let mut names = BTreeSet::new();
        for (policy, governed) in valid.iter().copied().zip(&governed) {
            if !governed.contains(&table.qualified_name()) {
                continue;
            }
            let name = format!("{}_{}", policy.name, table.name);
            if !names.insert(name.clone()) {
                bail!(
                    "duplicate compiled policy name '{}' on table {}",
                    name,
                    table.qualified_name()
                );
            }
            let using_expr =
                render::render_predicate(&policy.clauses, &table.schema, &table.name);
            let sql =
                render::render_create_policy(policy, &table.schema, &table.name, &using_expr);
            policies.push(CompiledPolicy {
                name,
                table: table.name.clone(),
                using_expr,
                sql,
            });
        }
        if policies.is_empty() {
            continue;
        }
        tables.push(TableArtifacts {
            schema: table.schema.clone(),
            table: table.name.clone(),
            enable_rls: render::render_enable_rls(&table.schema, &table.name),
            force_rls: render::render_force_rls(&table.schema, &table.name),
            policies,
        });
    }

    info!(
        tables = tables.len(),
        skipped = errors.len(),
        "compiled policy set"
    );
    Ok(CompileOutput {
        state: CompiledState { tables },
        errors,
    })
}

/// Semantic validation: selector columns must exist somewhere in the
/// schema, traversal targets must be known tables.
fn validate_policy(policy: &Policy, schema: &SchemaMetadata) -> Option<CompileError> {
    for column in selector_columns(&policy.selector) {
        if !schema.column_exists_anywhere(column) {
            return Some(CompileError {
                kind: CompileErrorKind::UnknownColumn,
                policy: policy.name.clone(),
                context: format!("selector references column '{}' that exists in no table", column),
            });
        }
    }
    for clause in &policy.clauses {
        if let Some(error) = validate_clause(clause, policy, schema) {
            return Some(error);
        }
    }
    None
}

fn validate_clause(
    clause: &Clause,
    policy: &Policy,
    schema: &SchemaMetadata,
) -> Option<CompileError> {
    for atom in &clause.atoms {
        if let Atom::Traversal { rel, clause } = atom {
            if schema.table(&rel.target_table).is_none() {
                return Some(CompileError {
                    kind: CompileErrorKind::UnknownTable,
                    policy: policy.name.clone(),
                    context: format!("traversal references unknown table '{}'", rel.target_table),
                });
            }
            if let Some(error) = validate_clause(clause, policy, schema) {
                return Some(error);
            }
        }
    }
    None
}

fn selector_columns(selector: &Selector) -> Vec<&str> {
    match selector {
        Selector::HasColumn { column, .. } => vec![column.as_str()],
        Selector::And(left, right) | Selector::Or(left, right) => {
            let mut columns = selector_columns(left);
            columns.extend(selector_columns(right));
            columns
        }
        _ => Vec::new(),
    }
}
