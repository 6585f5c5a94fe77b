//! Canonicalization of parsed policy sets.
//!
//! Normalization is idempotent and runs upstream of selector evaluation,
//! proof and compilation, so every downstream stage sees one canonical form
//! and compiled output stays byte-reproducible. Policy count, names, modes,
//! command sets and selector semantics are preserved.

use crate::ast::{Atom, BinaryOp, Clause, Literal, Policy, PolicySet, Selector, ValueSource};
use std::collections::BTreeMap;
use tracing::debug;

pub fn normalize(set: &PolicySet) -> PolicySet {
    PolicySet {
        policies: set.policies.iter().map(normalize_policy).collect(),
    }
}

fn normalize_policy(policy: &Policy) -> Policy {
    let mut commands = policy.commands.clone();
    commands.sort();
    commands.dedup();

    let clauses: Vec<Clause> = policy
        .clauses
        .iter()
        .filter_map(|clause| match normalize_clause(clause) {
            ClauseOutcome::Normalized(c) => Some(c),
            ClauseOutcome::Empty | ClauseOutcome::Contradictory => None,
        })
        .collect();
    if clauses.len() < policy.clauses.len() {
        debug!(
            policy = %policy.name,
            dropped = policy.clauses.len() - clauses.len(),
            "dropped contradictory or empty clauses"
        );
    }

    Policy {
        name: policy.name.clone(),
        mode: policy.mode,
        commands,
        selector: normalize_selector(&policy.selector),
        clauses,
    }
}

enum AtomOutcome {
    Keep(Atom),
    /// `EQ(x, x)` carries no information; the atom is discarded.
    Tautology,
    /// The atom can never hold, so the clause containing it is dropped.
    Contradiction,
}

enum ClauseOutcome {
    Normalized(Clause),
    /// Every atom was a tautology; the clause asserts nothing.
    Empty,
    /// The conjunction can never hold.
    Contradictory,
}

fn normalize_clause(clause: &Clause) -> ClauseOutcome {
    let mut atoms = Vec::with_capacity(clause.atoms.len());
    for atom in &clause.atoms {
        match normalize_atom(atom) {
            AtomOutcome::Keep(atom) => atoms.push(atom),
            AtomOutcome::Tautology => {}
            AtomOutcome::Contradiction => return ClauseOutcome::Contradictory,
        }
    }

    if has_conflicting_bindings(&atoms) {
        return ClauseOutcome::Contradictory;
    }

    atoms.sort();
    atoms.dedup();

    if atoms.is_empty() {
        ClauseOutcome::Empty
    } else {
        ClauseOutcome::Normalized(Clause::new(atoms))
    }
}

fn normalize_atom(atom: &Atom) -> AtomOutcome {
    match atom {
        Atom::Binary { left, op, right } if *op == BinaryOp::Eq && left == right => {
            AtomOutcome::Tautology
        }
        Atom::Traversal { rel, clause } => match normalize_clause(clause) {
            ClauseOutcome::Normalized(inner) => AtomOutcome::Keep(Atom::Traversal {
                rel: rel.clone(),
                clause: inner,
            }),
            // An inner clause that collapsed to empty still asserts the
            // join itself.
            ClauseOutcome::Empty => AtomOutcome::Keep(Atom::Traversal {
                rel: rel.clone(),
                clause: Clause::default(),
            }),
            // No related row can ever satisfy a contradictory inner clause,
            // so the enclosing conjunction can never hold either.
            ClauseOutcome::Contradictory => AtomOutcome::Contradiction,
        },
        other => AtomOutcome::Keep(other.clone()),
    }
}

/// Two EQ atoms binding one column to two distinct literals can never hold
/// together.
fn has_conflicting_bindings(atoms: &[Atom]) -> bool {
    let mut bindings: BTreeMap<&str, Vec<&Literal>> = BTreeMap::new();
    for atom in atoms {
        if let Atom::Binary { left, op, right } = atom {
            if *op != BinaryOp::Eq {
                continue;
            }
            let pair = match (left, right) {
                (ValueSource::Column(c), ValueSource::Literal(l)) => Some((c.as_str(), l)),
                (ValueSource::Literal(l), ValueSource::Column(c)) => Some((c.as_str(), l)),
                _ => None,
            };
            if let Some((column, literal)) = pair {
                bindings.entry(column).or_default().push(literal);
            }
        }
    }
    bindings
        .values()
        .any(|literals| literals.iter().any(|l| **l != *literals[0]))
}

/// Re-associate `And`/`Or` chains to the right with operands sorted by the
/// structural order; `And(x, x)` and `Or(x, x)` fold to `x`.
fn normalize_selector(selector: &Selector) -> Selector {
    match selector {
        Selector::And(_, _) => rebuild_chain(flatten_chain(selector, true), true),
        Selector::Or(_, _) => rebuild_chain(flatten_chain(selector, false), false),
        leaf => leaf.clone(),
    }
}

fn flatten_chain(selector: &Selector, conjunction: bool) -> Vec<Selector> {
    match (selector, conjunction) {
        (Selector::And(left, right), true) => {
            let mut operands = flatten_chain(left, true);
            operands.extend(flatten_chain(right, true));
            operands
        }
        (Selector::Or(left, right), false) => {
            let mut operands = flatten_chain(left, false);
            operands.extend(flatten_chain(right, false));
            operands
        }
        _ => vec![normalize_selector(selector)],
    }
}

fn rebuild_chain(mut operands: Vec<Selector>, conjunction: bool) -> Selector {
    operands.sort();
    operands.dedup();
    let mut iter = operands.into_iter().rev();
    let last = iter.next().expect("selector chain has at least one operand");
    iter.fold(last, |acc, operand| {
        if conjunction {
            Selector::And(Box::new(operand), Box::new(acc))
        } else {
            Selector::Or(Box::new(operand), Box::new(acc))
        }
    })
}
