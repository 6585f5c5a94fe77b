//! SQL text rendering for compiled policies.
//!
//! Rendering is a pure function of the AST and must stay byte-stable: the
//! emitted text is both the install artifact and the baseline that drift
//! detection compares against.

use crate::ast::{Atom, Clause, Command, Literal, Policy, ValueSource};
use itertools::Itertools;

pub fn escape_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub fn render_enable_rls(schema: &str, table: &str) -> String {
    format!("ALTER TABLE {}.{} ENABLE ROW LEVEL SECURITY;", schema, table)
}

pub fn render_force_rls(schema: &str, table: &str) -> String {
    format!("ALTER TABLE {}.{} FORCE ROW LEVEL SECURITY;", schema, table)
}

/// `ALL` when every command is covered, otherwise the canonical
/// comma-joined order SELECT, INSERT, UPDATE, DELETE.
pub fn render_commands(commands: &[Command]) -> String {
    let mut sorted = commands.to_vec();
    sorted.sort();
    sorted.dedup();
    if sorted.len() == Command::ALL.len() {
        "ALL".to_string()
    } else {
        sorted.iter().map(Command::as_sql).join(", ")
    }
}

pub fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::String(s) => escape_string(s),
        Literal::Int(n) => n.to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Null => "NULL".to_string(),
        Literal::List(items) => {
            format!("({})", items.iter().map(render_literal).join(", "))
        }
    }
}

/// Render a value source. Columns are qualified with `qualifier` when one
/// is in scope (inside a traversal subquery), and bare otherwise.
pub fn render_value_source(source: &ValueSource, qualifier: Option<&str>) -> String {
    match source {
        ValueSource::Column(name) => match qualifier {
            Some(q) => format!("{}.{}", q, name),
            None => name.clone(),
        },
        ValueSource::Session(key) => {
            format!("current_setting({})", escape_string(key))
        }
        ValueSource::Literal(literal) => render_literal(literal),
        ValueSource::Function { name, args } => {
            format!(
                "{}({})",
                name,
                args.iter()
                    .map(|arg| render_value_source(arg, qualifier))
                    .join(", ")
            )
        }
    }
}

/// Render one atom in the scope of `schema.table`. `qualifier` carries the
/// qualified name of the traversal target when rendering inside one.
pub fn render_atom(atom: &Atom, schema: &str, table: &str, qualifier: Option<&str>) -> String {
    match atom {
        Atom::Binary { left, op, right } => format!(
            "{} {} {}",
            render_value_source(left, qualifier),
            op.as_sql(),
            render_value_source(right, qualifier)
        ),
        Atom::Unary { source, op } => format!(
            "{} {}",
            render_value_source(source, qualifier),
            op.as_sql()
        ),
        Atom::Traversal { rel, clause } => {
            let source_table = rel.source_table.as_deref().unwrap_or(table);
            let target = format!("{}.{}", schema, rel.target_table);
            let join = format!(
                "{}.{} = {}.{}.{}",
                target, rel.target_column, schema, source_table, rel.source_column
            );
            let inner = render_clause(clause, schema, rel.target_table.as_str(), Some(&target));
            if inner.is_empty() {
                format!("EXISTS (SELECT 1 FROM {} WHERE {})", target, join)
            } else {
                format!(
                    "EXISTS (SELECT 1 FROM {} WHERE {} AND {})",
                    target, join, inner
                )
            }
        }
    }
}

pub fn render_clause(clause: &Clause, schema: &str, table: &str, qualifier: Option<&str>) -> String {
    clause
        .atoms
        .iter()
        .map(|atom| render_atom(atom, schema, table, qualifier))
        .join(" AND ")
}

/// The policy's USING expression: clause disjunction, or `false` for a
/// policy whose clauses all collapsed away during normalization.
pub fn render_predicate(clauses: &[Clause], schema: &str, table: &str) -> String {
    if clauses.is_empty() {
        return "false".to_string();
    }
    clauses
        .iter()
        .map(|clause| render_clause(clause, schema, table, None))
        .join(" OR ")
}

/// The full CREATE POLICY statement in the stable multi-line layout.
pub fn render_create_policy(
    policy: &Policy,
    schema: &str,
    table: &str,
    using_expr: &str,
) -> String {
    format!(
        "CREATE POLICY {}_{}\n  ON {}.{}\n  AS {}\n  FOR {}\n  USING ({});",
        policy.name,
        table,
        schema,
        table,
        policy.mode.as_sql(),
        render_commands(&policy.commands),
        using_expr
    )
}
