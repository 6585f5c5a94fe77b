//! Encoding of a policy predicate into an SMT-LIB 2 satisfiability query.
//!
//! The query models one row of the governed table and two tenants: the
//! requesting session and the row's true owner. Column references become
//! free constants, session keys become a `session`/`owner` constant pair,
//! and every `col = session(key)` equation marks an ownership axis that
//! ties the row to its owner. The script asserts the policy predicate
//! together with "the requester differs from the owner on at least one
//! axis"; `unsat` therefore means the predicate cannot admit a
//! cross-tenant row.

use crate::ast::{Atom, BinaryOp, Clause, Literal, Policy, UnaryOp, ValueSource};
use crate::schema::{SchemaMetadata, TableMetadata};
use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Sort {
    Int,
    Bool,
    Str,
}

impl Sort {
    fn smt(&self) -> &'static str {
        match self {
            Sort::Int => "Int",
            Sort::Bool => "Bool",
            Sort::Str => "String",
        }
    }
}

/// Map a declared column type onto a background-theory sort. Anything that
/// is not clearly numeric or boolean is modeled as a string.
pub fn column_sort(column_type: &str) -> Sort {
    let t = column_type.to_ascii_lowercase();
    let base = t.split('(').next().unwrap_or(&t).trim();
    match base {
        "smallint" | "integer" | "bigint" | "int" | "int2" | "int4" | "int8" | "serial"
        | "smallserial" | "bigserial" | "numeric" | "decimal" => Sort::Int,
        "bool" | "boolean" => Sort::Bool,
        _ => Sort::Str,
    }
}

/// Build the full SMT-LIB 2 script for one (policy, table) pair.
pub fn encode(policy: &Policy, table: &TableMetadata, schema: &SchemaMetadata) -> Result<String> {
    let mut encoder = Encoder {
        schema,
        consts: BTreeMap::new(),
        funs: BTreeMap::new(),
        session_sorts: BTreeMap::new(),
        axes: BTreeSet::new(),
        scopes: 0,
    };

    let top = Scope {
        table,
        prefix: "row".to_string(),
    };
    let predicate = encoder.encode_predicate(&policy.clauses, &top)?;

    let mut script = String::new();
    writeln!(
        script,
        "; cross-tenant leakage check: policy {} on {}",
        policy.name,
        table.qualified_name()
    )?;
    writeln!(script, "(set-logic ALL)")?;

    // Owner constants exist for every ownership axis; with no axis at all
    // the policy never consults a session key, so a synthetic tenant axis
    // keeps the adversary expressible.
    let mut axis_keys: BTreeSet<String> =
        encoder.axes.iter().map(|(_, key)| key.clone()).collect();
    if axis_keys.is_empty() {
        encoder
            .consts
            .insert("|session:#adversary|".to_string(), Sort::Str);
        encoder
            .consts
            .insert("|owner:#adversary|".to_string(), Sort::Str);
        axis_keys.insert("#adversary".to_string());
    } else {
        for key in &axis_keys {
            let sort = encoder.session_sorts.get(key).copied().unwrap_or(Sort::Str);
            encoder.consts.insert(owner_symbol(key), sort);
        }
    }

    for (symbol, sort) in &encoder.consts {
        writeln!(script, "(declare-const {} {})", symbol, sort.smt())?;
    }
    for (symbol, (args, ret)) in &encoder.funs {
        let args = args.iter().map(|s| s.smt()).collect::<Vec<_>>().join(" ");
        writeln!(script, "(declare-fun {} ({}) {})", symbol, args, ret.smt())?;
    }

    writeln!(script, "(assert {})", predicate)?;

    for (column_symbol, key) in &encoder.axes {
        writeln!(script, "(assert (= {} {}))", column_symbol, owner_symbol(key))?;
    }

    let distinct: Vec<String> = axis_keys
        .iter()
        .map(|key| format!("(distinct {} {})", session_symbol(key), owner_symbol(key)))
        .collect();
    writeln!(script, "(assert {})", combine("or", distinct))?;
    writeln!(script, "(check-sat)")?;
    Ok(script)
}

struct Scope<'a> {
    table: &'a TableMetadata,
    prefix: String,
}

impl Scope<'_> {
    fn symbol(&self, column: &str) -> String {
        format!("|{}:{}|", self.prefix, sanitize(column))
    }
}

fn sanitize(s: &str) -> String {
    s.replace(['|', '\\'], "_")
}

fn session_symbol(key: &str) -> String {
    format!("|session:{}|", sanitize(key))
}

fn owner_symbol(key: &str) -> String {
    format!("|owner:{}|", sanitize(key))
}

struct Encoder<'a> {
    schema: &'a SchemaMetadata,
    consts: BTreeMap<String, Sort>,
    funs: BTreeMap<String, (Vec<Sort>, Sort)>,
    session_sorts: BTreeMap<String, Sort>,
    /// (column symbol, session key) pairs from `col = session(key)` atoms.
    axes: BTreeSet<(String, String)>,
    scopes: usize,
}

impl<'a> Encoder<'a> {
    fn encode_predicate(&mut self, clauses: &[Clause], scope: &Scope<'_>) -> Result<String> {
        if clauses.is_empty() {
            return Ok("false".to_string());
        }
        let encoded: Vec<String> = clauses
            .iter()
            .map(|clause| self.encode_clause(clause, scope))
            .collect::<Result<_>>()?;
        Ok(combine("or", encoded))
    }

    fn encode_clause(&mut self, clause: &Clause, scope: &Scope<'_>) -> Result<String> {
        if clause.atoms.is_empty() {
            return Ok("true".to_string());
        }
        let encoded: Vec<String> = clause
            .atoms
            .iter()
            .map(|atom| self.encode_atom(atom, scope))
            .collect::<Result<_>>()?;
        Ok(combine("and", encoded))
    }

    fn encode_atom(&mut self, atom: &Atom, scope: &Scope<'_>) -> Result<String> {
        match atom {
            Atom::Binary { left, op, right } => self.encode_binary(left, *op, right, scope),
            Atom::Unary { source, op } => {
                let sort = self.natural_sort(source, scope).unwrap_or(Sort::Str);
                let term = self.encode_term(source, scope, sort)?;
                let sentinel = self.null_sentinel(sort);
                Ok(match op {
                    UnaryOp::IsNull => format!("(= {} {})", term, sentinel),
                    UnaryOp::IsNotNull => format!("(distinct {} {})", term, sentinel),
                })
            }
            Atom::Traversal { rel, clause } => {
                let schema = self.schema;
                let Some(target) = schema.table(&rel.target_table) else {
                    bail!(
                        "traversal references unknown table '{}'",
                        rel.target_table
                    );
                };
                self.scopes += 1;
                let inner_scope = Scope {
                    table: target,
                    prefix: format!("row{}", self.scopes + 1),
                };

                let target_col = ValueSource::Column(rel.target_column.clone());
                let source_col = ValueSource::Column(rel.source_column.clone());
                let sort = match (
                    self.natural_sort(&target_col, &inner_scope),
                    self.natural_sort(&source_col, scope),
                ) {
                    (Some(a), Some(b)) if a != b => bail!(
                        "traversal joins columns of different sorts: {}.{} vs {}.{}",
                        target.name,
                        rel.target_column,
                        scope.table.name,
                        rel.source_column
                    ),
                    (Some(a), _) | (_, Some(a)) => a,
                    (None, None) => Sort::Str,
                };
                let target_term = self.encode_term(&target_col, &inner_scope, sort)?;
                let source_term = self.encode_term(&source_col, scope, sort)?;
                let join = format!("(= {} {})", target_term, source_term);

                let inner = self.encode_clause(clause, &inner_scope)?;
                if inner == "true" {
                    Ok(join)
                } else {
                    Ok(format!("(and {} {})", join, inner))
                }
            }
        }
    }

    fn encode_binary(
        &mut self,
        left: &ValueSource,
        op: BinaryOp,
        right: &ValueSource,
        scope: &Scope<'_>,
    ) -> Result<String> {
        let sort = self.unify(left, right, scope)?;

        match op {
            BinaryOp::Eq | BinaryOp::Neq => {
                let l = self.encode_term(left, scope, sort)?;
                let r = self.encode_term(right, scope, sort)?;
                if op == BinaryOp::Eq {
                    self.record_axis(left, right, scope);
                    Ok(format!("(= {} {})", l, r))
                } else {
                    Ok(format!("(distinct {} {})", l, r))
                }
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Lte | BinaryOp::Gte => {
                let l = self.encode_term(left, scope, sort)?;
                let r = self.encode_term(right, scope, sort)?;
                let (op_int, op_str, flipped) = match op {
                    BinaryOp::Lt => ("<", "str.<", false),
                    BinaryOp::Gt => ("<", "str.<", true),
                    BinaryOp::Lte => ("<=", "str.<=", false),
                    BinaryOp::Gte => ("<=", "str.<=", true),
                    _ => unreachable!(),
                };
                let (a, b) = if flipped { (r, l) } else { (l, r) };
                match sort {
                    Sort::Int => Ok(format!("({} {} {})", op_int, a, b)),
                    Sort::Str => Ok(format!("({} {} {})", op_str, a, b)),
                    Sort::Bool => bail!("ordering comparison on boolean values"),
                }
            }
            BinaryOp::In | BinaryOp::NotIn => {
                let ValueSource::Literal(Literal::List(items)) = right else {
                    bail!("IN requires a list literal on the right-hand side");
                };
                let l = self.encode_term(left, scope, sort)?;
                let members: Vec<String> = items
                    .iter()
                    .map(|item| self.encode_literal(item, sort))
                    .collect::<Result<_>>()?;
                if op == BinaryOp::In {
                    let parts: Vec<String> =
                        members.iter().map(|m| format!("(= {} {})", l, m)).collect();
                    Ok(if parts.is_empty() {
                        "false".to_string()
                    } else {
                        combine("or", parts)
                    })
                } else {
                    let parts: Vec<String> = members
                        .iter()
                        .map(|m| format!("(distinct {} {})", l, m))
                        .collect();
                    Ok(if parts.is_empty() {
                        "true".to_string()
                    } else {
                        combine("and", parts)
                    })
                }
            }
            BinaryOp::Like | BinaryOp::NotLike => {
                let ValueSource::Literal(Literal::String(pattern)) = right else {
                    bail!("LIKE requires a string literal pattern");
                };
                if sort != Sort::Str {
                    bail!("LIKE on a non-string value");
                }
                let l = self.encode_term(left, scope, Sort::Str)?;
                let formula = encode_like(&l, pattern);
                if op == BinaryOp::Like {
                    Ok(formula)
                } else {
                    Ok(format!("(not {})", formula))
                }
            }
        }
    }

    /// Remember `col = session(key)` as an ownership axis for the
    /// adversarial conjunct.
    fn record_axis(&mut self, left: &ValueSource, right: &ValueSource, scope: &Scope<'_>) {
        let pair = match (left, right) {
            (ValueSource::Column(c), ValueSource::Session(k))
            | (ValueSource::Session(k), ValueSource::Column(c)) => Some((c, k)),
            _ => None,
        };
        if let Some((column, key)) = pair {
            self.axes.insert((scope.symbol(column), key.clone()));
        }
    }

    fn unify(
        &mut self,
        left: &ValueSource,
        right: &ValueSource,
        scope: &Scope<'_>,
    ) -> Result<Sort> {
        match (
            self.natural_sort(left, scope),
            self.natural_sort(right, scope),
        ) {
            (Some(a), Some(b)) if a != b => {
                bail!(
                    "cannot compare {} value with {} value",
                    a.smt(),
                    b.smt()
                )
            }
            (Some(a), _) | (_, Some(a)) => Ok(a),
            (None, None) => Ok(Sort::Str),
        }
    }

    fn natural_sort(&self, source: &ValueSource, scope: &Scope<'_>) -> Option<Sort> {
        match source {
            ValueSource::Column(name) => {
                scope.table.column(name).map(|c| column_sort(&c.column_type))
            }
            ValueSource::Session(key) => self.session_sorts.get(key).copied(),
            ValueSource::Literal(literal) => literal_sort(literal),
            ValueSource::Function { name, .. } => {
                self.funs.get(&fun_symbol(name)).map(|(_, ret)| *ret)
            }
        }
    }

    fn encode_term(
        &mut self,
        source: &ValueSource,
        scope: &Scope<'_>,
        sort: Sort,
    ) -> Result<String> {
        match source {
            ValueSource::Column(name) => {
                let symbol = scope.symbol(name);
                self.declare_const(&symbol, sort)?;
                Ok(symbol)
            }
            ValueSource::Session(key) => {
                match self.session_sorts.get(key) {
                    Some(existing) if *existing != sort => bail!(
                        "session key '{}' used with both {} and {} values",
                        key,
                        existing.smt(),
                        sort.smt()
                    ),
                    _ => {
                        self.session_sorts.insert(key.clone(), sort);
                    }
                }
                let symbol = session_symbol(key);
                self.declare_const(&symbol, sort)?;
                Ok(symbol)
            }
            ValueSource::Literal(literal) => self.encode_literal(literal, sort),
            ValueSource::Function { name, args } => {
                let mut arg_sorts = Vec::with_capacity(args.len());
                let mut rendered = Vec::with_capacity(args.len());
                for arg in args {
                    let arg_sort = self.natural_sort(arg, scope).unwrap_or(Sort::Str);
                    rendered.push(self.encode_term(arg, scope, arg_sort)?);
                    arg_sorts.push(arg_sort);
                }
                let symbol = fun_symbol(name);
                if args.is_empty() {
                    self.declare_const(&symbol, sort)?;
                    return Ok(symbol);
                }
                match self.funs.get(&symbol) {
                    Some((existing_args, existing_ret))
                        if *existing_args != arg_sorts || *existing_ret != sort =>
                    {
                        bail!("function '{}' used with inconsistent signatures", name)
                    }
                    _ => {
                        self.funs.insert(symbol.clone(), (arg_sorts, sort));
                    }
                }
                Ok(format!("({} {})", symbol, rendered.join(" ")))
            }
        }
    }

    fn encode_literal(&mut self, literal: &Literal, sort: Sort) -> Result<String> {
        match literal {
            Literal::String(s) => {
                if sort != Sort::Str {
                    bail!("string literal where {} was expected", sort.smt());
                }
                Ok(format!("\"{}\"", s.replace('"', "\"\"")))
            }
            Literal::Int(n) => {
                if sort != Sort::Int {
                    bail!("integer literal where {} was expected", sort.smt());
                }
                if *n < 0 {
                    Ok(format!("(- {})", -n))
                } else {
                    Ok(n.to_string())
                }
            }
            Literal::Bool(b) => {
                if sort != Sort::Bool {
                    bail!("boolean literal where {} was expected", sort.smt());
                }
                Ok(b.to_string())
            }
            Literal::Null => Ok(self.null_sentinel(sort)),
            Literal::List(_) => bail!("list literal outside an IN comparison"),
        }
    }

    /// NULL is modeled as a reserved unconstrained constant per sort.
    fn null_sentinel(&mut self, sort: Sort) -> String {
        let symbol = format!("|null:{}|", sort.smt());
        self.consts.entry(symbol.clone()).or_insert(sort);
        symbol
    }

    fn declare_const(&mut self, symbol: &str, sort: Sort) -> Result<()> {
        match self.consts.get(symbol) {
            Some(existing) if *existing != sort => bail!(
                "'{}' used with both {} and {} values",
                symbol,
                existing.smt(),
                sort.smt()
            ),
            _ => {
                self.consts.insert(symbol.to_string(), sort);
                Ok(())
            }
        }
    }
}

fn literal_sort(literal: &Literal) -> Option<Sort> {
    match literal {
        Literal::String(_) => Some(Sort::Str),
        Literal::Int(_) => Some(Sort::Int),
        Literal::Bool(_) => Some(Sort::Bool),
        Literal::Null => None,
        Literal::List(items) => items.iter().find_map(literal_sort),
    }
}

fn fun_symbol(name: &str) -> String {
    format!("|fn:{}|", sanitize(name))
}

fn combine(op: &str, parts: Vec<String>) -> String {
    if parts.len() == 1 {
        parts.into_iter().next().expect("non-empty")
    } else {
        format!("({} {})", op, parts.join(" "))
    }
}

/// LIKE is approximated with string prefix/suffix/containment from the
/// `%` placement; `_` wildcards are out of the model's reach.
fn encode_like(term: &str, pattern: &str) -> String {
    let escaped = |s: &str| format!("\"{}\"", s.replace('"', "\"\""));
    let starts = pattern.starts_with('%');
    let ends = pattern.ends_with('%');
    let trimmed = pattern.trim_matches('%');
    if trimmed.is_empty() {
        return "true".to_string();
    }
    if !pattern.contains('%') {
        format!("(= {} {})", term, escaped(pattern))
    } else if starts && ends {
        format!("(str.contains {} {})", term, escaped(trimmed))
    } else if ends {
        format!("(str.prefixof {} {})", escaped(trimmed), term)
    } else if starts {
        format!("(str.suffixof {} {})", escaped(trimmed), term)
    } else {
        // A `%` in the middle: fall back to requiring the longest segment.
        let segment = pattern
            .split('%')
            .max_by_key(|s| s.len())
            .unwrap_or_default();
        format!("(str.contains {} {})", term, escaped(segment))
    }
}
