//! Recursive-descent parser for the policy DSL.
//!
//! The parser never aborts on the first error: it records what it found,
//! resynchronizes on the next `POLICY` keyword, and keeps going so a single
//! run reports every syntax problem in the file.

use super::SyntaxError;
use super::token::{Token, TokenKind};
use crate::ast::{
    Atom, BinaryOp, Clause, Command, Literal, Policy, PolicyMode, PolicySet, Relationship,
    Selector, UnaryOp, ValueSource,
};

pub(super) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl Parser {
    pub(super) fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub(super) fn parse(mut self) -> (PolicySet, Vec<SyntaxError>) {
        let mut policies = Vec::new();
        while !self.at_eof() {
            if self.check_keyword("POLICY") {
                match self.parse_policy() {
                    Some(policy) => policies.push(policy),
                    None => self.synchronize(),
                }
            } else {
                self.error_at_current(format!(
                    "expected 'POLICY', found {}",
                    self.current().kind.describe()
                ));
                self.advance();
                self.synchronize();
            }
        }
        (PolicySet { policies }, self.errors)
    }

    fn parse_policy(&mut self) -> Option<Policy> {
        self.advance(); // POLICY
        let name = self.expect_ident("policy name")?;

        let mode_word = self.expect_ident("'PERMISSIVE' or 'RESTRICTIVE'")?;
        let mode = match mode_word.as_str() {
            "PERMISSIVE" => PolicyMode::Permissive,
            "RESTRICTIVE" => PolicyMode::Restrictive,
            other => {
                self.error_at_previous(format!(
                    "expected 'PERMISSIVE' or 'RESTRICTIVE', found '{}'",
                    other
                ));
                return None;
            }
        };

        self.expect_keyword("FOR")?;
        let commands = self.parse_commands()?;

        self.expect_keyword("SELECTOR")?;
        let selector = self.parse_selector()?;

        self.expect_keyword("CLAUSE")?;
        let mut clauses = vec![self.parse_clause()?];
        while self.check_keyword("OR") {
            self.advance();
            self.expect_keyword("CLAUSE")?;
            clauses.push(self.parse_clause()?);
        }

        Some(Policy {
            name,
            mode,
            commands,
            selector,
            clauses,
        })
    }

    fn parse_commands(&mut self) -> Option<Vec<Command>> {
        let mut commands = Vec::new();
        loop {
            let word = self.expect_ident("command (SELECT, INSERT, UPDATE or DELETE)")?;
            match Command::from_keyword(&word) {
                Some(command) => commands.push(command),
                None => {
                    self.error_at_previous(format!(
                        "expected SELECT, INSERT, UPDATE or DELETE, found '{}'",
                        word
                    ));
                    return None;
                }
            }
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Some(commands)
    }

    /// Selector grammar: `AND` binds tighter than `OR`. An `OR` followed by
    /// `CLAUSE` belongs to the clause block, not the selector.
    fn parse_selector(&mut self) -> Option<Selector> {
        let mut left = self.parse_selector_and()?;
        while self.check_keyword("OR") && !self.keyword_at(1, "CLAUSE") {
            self.advance();
            let right = self.parse_selector_and()?;
            left = Selector::Or(Box::new(left), Box::new(right));
        }
        Some(left)
    }

    fn parse_selector_and(&mut self) -> Option<Selector> {
        let mut left = self.parse_selector_primary()?;
        while self.check_keyword("AND") {
            self.advance();
            let right = self.parse_selector_primary()?;
            left = Selector::And(Box::new(left), Box::new(right));
        }
        Some(left)
    }

    fn parse_selector_primary(&mut self) -> Option<Selector> {
        if self.check(&TokenKind::LParen) {
            self.advance();
            let inner = self.parse_selector()?;
            self.expect(&TokenKind::RParen, "to close selector group")?;
            return Some(inner);
        }
        let word = self.expect_ident("selector")?;
        match word.as_str() {
            "ALL" => Some(Selector::All),
            "has_column" => {
                self.expect(&TokenKind::LParen, "after 'has_column'")?;
                let column = self.expect_ident("column name")?;
                let column_type = if self.check(&TokenKind::Comma) {
                    self.advance();
                    Some(self.expect_ident("column type")?)
                } else {
                    None
                };
                self.expect(&TokenKind::RParen, "to close 'has_column'")?;
                Some(Selector::HasColumn {
                    column,
                    column_type,
                })
            }
            "in_schema" => {
                self.expect(&TokenKind::LParen, "after 'in_schema'")?;
                let name = self.expect_ident("schema name")?;
                self.expect(&TokenKind::RParen, "to close 'in_schema'")?;
                Some(Selector::InSchema(name))
            }
            "named" => {
                self.expect(&TokenKind::LParen, "after 'named'")?;
                let name = self.expect_string("table name")?;
                self.expect(&TokenKind::RParen, "to close 'named'")?;
                Some(Selector::Named(name))
            }
            "tagged" => {
                self.expect(&TokenKind::LParen, "after 'tagged'")?;
                let tag = self.expect_string("tag name")?;
                self.expect(&TokenKind::RParen, "to close 'tagged'")?;
                Some(Selector::Tagged(tag))
            }
            other => {
                self.error_at_previous(format!("expected selector, found '{}'", other));
                None
            }
        }
    }

    fn parse_clause(&mut self) -> Option<Clause> {
        let mut atoms = vec![self.parse_atom()?];
        while self.check_keyword("AND") {
            self.advance();
            atoms.push(self.parse_atom()?);
        }
        Some(Clause::new(atoms))
    }

    fn parse_atom(&mut self) -> Option<Atom> {
        if self.check_keyword("exists") {
            self.advance();
            self.expect(&TokenKind::LParen, "after 'exists'")?;
            let rel = self.parse_relationship()?;
            self.expect(&TokenKind::Comma, "after relationship")?;
            self.expect(&TokenKind::LBrace, "to open the traversal clause")?;
            let clause = self.parse_clause()?;
            self.expect(&TokenKind::RBrace, "to close the traversal clause")?;
            self.expect(&TokenKind::RParen, "to close 'exists'")?;
            return Some(Atom::Traversal { rel, clause });
        }

        let left = self.parse_value_source()?;
        let op = match &self.current().kind {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::Neq => BinaryOp::Neq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Lte => BinaryOp::Lte,
            TokenKind::Gte => BinaryOp::Gte,
            TokenKind::In => BinaryOp::In,
            TokenKind::NotIn => BinaryOp::NotIn,
            TokenKind::Like => BinaryOp::Like,
            TokenKind::NotLike => BinaryOp::NotLike,
            TokenKind::IsNull => {
                self.advance();
                return Some(Atom::Unary {
                    source: left,
                    op: UnaryOp::IsNull,
                });
            }
            TokenKind::IsNotNull => {
                self.advance();
                return Some(Atom::Unary {
                    source: left,
                    op: UnaryOp::IsNotNull,
                });
            }
            other => {
                self.error_at_current(format!(
                    "expected comparison operator, found {}",
                    other.describe()
                ));
                return None;
            }
        };
        self.advance();
        let right = self.parse_value_source()?;
        Some(Atom::Binary { left, op, right })
    }

    fn parse_relationship(&mut self) -> Option<Relationship> {
        let word = self.expect_ident("'rel'")?;
        if word != "rel" {
            self.error_at_previous(format!("expected 'rel', found '{}'", word));
            return None;
        }
        self.expect(&TokenKind::LParen, "after 'rel'")?;
        let source_table = if self.check(&TokenKind::Underscore) {
            self.advance();
            None
        } else {
            Some(self.expect_ident("source table or '_'")?)
        };
        self.expect(&TokenKind::Comma, "after source table")?;
        let source_column = self.expect_ident("source column")?;
        self.expect(&TokenKind::Comma, "after source column")?;
        let target_table = self.expect_ident("target table")?;
        self.expect(&TokenKind::Comma, "after target table")?;
        let target_column = self.expect_ident("target column")?;
        self.expect(&TokenKind::RParen, "to close 'rel'")?;
        Some(Relationship {
            source_table,
            source_column,
            target_table,
            target_column,
        })
    }

    fn parse_value_source(&mut self) -> Option<ValueSource> {
        let word = self.expect_ident("value source (col, session, lit or fn)")?;
        match word.as_str() {
            "col" => {
                self.expect(&TokenKind::LParen, "after 'col'")?;
                let name = self.expect_ident("column name")?;
                self.expect(&TokenKind::RParen, "to close 'col'")?;
                Some(ValueSource::Column(name))
            }
            "session" => {
                self.expect(&TokenKind::LParen, "after 'session'")?;
                let key = self.expect_string("session key")?;
                self.expect(&TokenKind::RParen, "to close 'session'")?;
                Some(ValueSource::Session(key))
            }
            "lit" => {
                self.expect(&TokenKind::LParen, "after 'lit'")?;
                let literal = self.parse_literal()?;
                self.expect(&TokenKind::RParen, "to close 'lit'")?;
                Some(ValueSource::Literal(literal))
            }
            "fn" => {
                self.expect(&TokenKind::LParen, "after 'fn'")?;
                let name = self.expect_ident("function name")?;
                self.expect(&TokenKind::Comma, "after function name")?;
                self.expect(&TokenKind::LBracket, "to open the argument list")?;
                let mut args = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    args.push(self.parse_value_source()?);
                    while self.check(&TokenKind::Comma) {
                        self.advance();
                        args.push(self.parse_value_source()?);
                    }
                }
                self.expect(&TokenKind::RBracket, "to close the argument list")?;
                self.expect(&TokenKind::RParen, "to close 'fn'")?;
                Some(ValueSource::Function { name, args })
            }
            other => {
                self.error_at_previous(format!(
                    "expected value source (col, session, lit or fn), found '{}'",
                    other
                ));
                None
            }
        }
    }

    fn parse_literal(&mut self) -> Option<Literal> {
        match self.current().kind.clone() {
            TokenKind::Str(s) => {
                self.advance();
                Some(Literal::String(s))
            }
            TokenKind::Int(n) => {
                self.advance();
                Some(Literal::Int(n))
            }
            TokenKind::Ident(word) if word == "true" => {
                self.advance();
                Some(Literal::Bool(true))
            }
            TokenKind::Ident(word) if word == "false" => {
                self.advance();
                Some(Literal::Bool(false))
            }
            TokenKind::Ident(word) if word == "NULL" => {
                self.advance();
                Some(Literal::Null)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    items.push(self.parse_literal()?);
                    while self.check(&TokenKind::Comma) {
                        self.advance();
                        items.push(self.parse_literal()?);
                    }
                }
                self.expect(&TokenKind::RBracket, "to close the list literal")?;
                Some(Literal::List(items))
            }
            other => {
                self.error_at_current(format!("expected literal, found {}", other.describe()));
                None
            }
        }
    }

    // Token plumbing.

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn check_keyword(&self, word: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Ident(w) if w == word)
    }

    fn keyword_at(&self, offset: usize, word: &str) -> bool {
        match self.tokens.get(self.pos + offset) {
            Some(token) => matches!(&token.kind, TokenKind::Ident(w) if w == word),
            None => false,
        }
    }

    fn expect(&mut self, kind: &TokenKind, context: &str) -> Option<()> {
        if self.check(kind) {
            self.advance();
            Some(())
        } else {
            self.error_at_current(format!(
                "expected {} {}, found {}",
                kind.describe(),
                context,
                self.current().kind.describe()
            ));
            None
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Option<()> {
        if self.check_keyword(word) {
            self.advance();
            Some(())
        } else {
            self.error_at_current(format!(
                "expected '{}', found {}",
                word,
                self.current().kind.describe()
            ));
            None
        }
    }

    fn expect_ident(&mut self, context: &str) -> Option<String> {
        match self.current().kind.clone() {
            TokenKind::Ident(word) => {
                self.advance();
                Some(word)
            }
            other => {
                self.error_at_current(format!(
                    "expected {}, found {}",
                    context,
                    other.describe()
                ));
                None
            }
        }
    }

    fn expect_string(&mut self, context: &str) -> Option<String> {
        match self.current().kind.clone() {
            TokenKind::Str(s) => {
                self.advance();
                Some(s)
            }
            other => {
                self.error_at_current(format!(
                    "expected {} string, found {}",
                    context,
                    other.describe()
                ));
                None
            }
        }
    }

    fn error_at_current(&mut self, message: String) {
        let token = self.current();
        self.errors.push(SyntaxError {
            line: token.line,
            column: token.column,
            message,
        });
    }

    fn error_at_previous(&mut self, message: String) {
        let token = self.previous();
        self.errors.push(SyntaxError {
            line: token.line,
            column: token.column,
            message,
        });
    }

    /// Skip forward to the next `POLICY` keyword so the rest of the file
    /// still gets parsed after an error.
    fn synchronize(&mut self) {
        while !self.at_eof() && !self.check_keyword("POLICY") {
            self.advance();
        }
    }
}
