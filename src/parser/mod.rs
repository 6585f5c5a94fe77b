//! DSL text to AST.

mod grammar;
mod lexer;
pub mod token;

use crate::ast::PolicySet;
use std::fmt;
use tracing::debug;

/// A syntax problem at a 1-based source position. Collected, never thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Outcome of a parse. The tree is present only when `errors` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub policy_set: Option<PolicySet>,
    pub errors: Vec<SyntaxError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse a UTF-8 policy source, collecting every syntax error.
pub fn parse(source: &str) -> ParseResult {
    let (tokens, mut errors) = lexer::tokenize(source);
    let (policy_set, parse_errors) = grammar::Parser::new(tokens).parse();
    errors.extend(parse_errors);
    errors.sort_by_key(|e| (e.line, e.column));

    if errors.is_empty() {
        debug!(policies = policy_set.len(), "parsed policy source");
        ParseResult {
            policy_set: Some(policy_set),
            errors,
        }
    } else {
        debug!(errors = errors.len(), "policy source has syntax errors");
        ParseResult {
            policy_set: None,
            errors,
        }
    }
}
