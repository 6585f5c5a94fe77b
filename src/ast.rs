//! Policy abstract syntax tree.
//!
//! Everything here is plain immutable data with structural equality. The
//! derived `Ord` implementations double as the canonical structural order
//! (variant tag first, then components) used by the normalizer to sort
//! atoms and selector operands.

use std::fmt;

/// Ordered collection of policies, in source-text order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicySet {
    pub policies: Vec<Policy>,
}

impl PolicySet {
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// A named row-visibility rule. The semantic predicate is the disjunction
/// of `clauses`; each clause is a conjunction of atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub mode: PolicyMode,
    pub commands: Vec<Command>,
    pub selector: Selector,
    pub clauses: Vec<Clause>,
}

/// PERMISSIVE policies OR together; RESTRICTIVE policies AND together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PolicyMode {
    Permissive,
    Restrictive,
}

impl PolicyMode {
    pub fn as_sql(&self) -> &'static str {
        match self {
            PolicyMode::Permissive => "PERMISSIVE",
            PolicyMode::Restrictive => "RESTRICTIVE",
        }
    }
}

/// SQL command a policy applies to. The discriminant order is the
/// canonical command order used everywhere commands are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Command {
    Select,
    Insert,
    Update,
    Delete,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::Select,
        Command::Insert,
        Command::Update,
        Command::Delete,
    ];

    pub fn as_sql(&self) -> &'static str {
        match self {
            Command::Select => "SELECT",
            Command::Insert => "INSERT",
            Command::Update => "UPDATE",
            Command::Delete => "DELETE",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Command> {
        match word {
            "SELECT" => Some(Command::Select),
            "INSERT" => Some(Command::Insert),
            "UPDATE" => Some(Command::Update),
            "DELETE" => Some(Command::Delete),
            _ => None,
        }
    }
}

/// Conjunction of atoms. Normalized clauses keep their atoms sorted and
/// deduplicated, so `PartialEq` on normalized values is set equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Clause {
    pub atoms: Vec<Atom>,
}

impl Clause {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }
}

/// An indivisible predicate term.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Atom {
    Binary {
        left: ValueSource,
        op: BinaryOp,
        right: ValueSource,
    },
    Unary {
        source: ValueSource,
        op: UnaryOp,
    },
    /// EXISTS-style hop into a related table, with a clause evaluated in
    /// the related row's scope.
    Traversal { rel: Relationship, clause: Clause },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinaryOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    In,
    NotIn,
    Like,
    NotLike,
}

impl BinaryOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Lte => "<=",
            BinaryOp::Gte => ">=",
            BinaryOp::In => "IN",
            BinaryOp::NotIn => "NOT IN",
            BinaryOp::Like => "LIKE",
            BinaryOp::NotLike => "NOT LIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnaryOp {
    IsNull,
    IsNotNull,
}

impl UnaryOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            UnaryOp::IsNull => "IS NULL",
            UnaryOp::IsNotNull => "IS NOT NULL",
        }
    }
}

/// Foreign-key-shaped join description for traversal atoms. An absent
/// `source_table` means the table currently being governed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Relationship {
    pub source_table: Option<String>,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
}

/// Where a comparison operand gets its value from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueSource {
    /// A column of the row in scope.
    Column(String),
    /// A session setting, read via `current_setting()` at query time.
    Session(String),
    Literal(Literal),
    Function { name: String, args: Vec<ValueSource> },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Literal {
    String(String),
    Int(i64),
    Bool(bool),
    Null,
    List(Vec<Literal>),
}

/// Predicate over the schema choosing which tables a policy governs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Selector {
    All,
    HasColumn {
        column: String,
        column_type: Option<String>,
    },
    InSchema(String),
    Named(String),
    Tagged(String),
    And(Box<Selector>, Box<Selector>),
    Or(Box<Selector>, Box<Selector>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "NULL"),
            Literal::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Column(name) => write!(f, "col({})", name),
            ValueSource::Session(key) => write!(f, "session('{}')", key),
            ValueSource::Literal(lit) => write!(f, "lit({})", lit),
            ValueSource::Function { name, args } => {
                write!(f, "fn({}, [", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, "])")
            }
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Binary { left, op, right } => {
                write!(f, "{} {} {}", left, op.as_sql(), right)
            }
            Atom::Unary { source, op } => write!(f, "{} {}", source, op.as_sql()),
            Atom::Traversal { rel, clause } => {
                write!(
                    f,
                    "exists(rel({}, {}, {}, {}), {{ {} }})",
                    rel.source_table.as_deref().unwrap_or("_"),
                    rel.source_column,
                    rel.target_table,
                    rel.target_column,
                    clause
                )
            }
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{}", atom)?;
        }
        Ok(())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => write!(f, "ALL"),
            Selector::HasColumn {
                column,
                column_type: Some(t),
            } => write!(f, "has_column({}, {})", column, t),
            Selector::HasColumn {
                column,
                column_type: None,
            } => write!(f, "has_column({})", column),
            Selector::InSchema(name) => write!(f, "in_schema({})", name),
            Selector::Named(name) => write!(f, "named('{}')", name),
            Selector::Tagged(tag) => write!(f, "tagged('{}')", tag),
            Selector::And(left, right) => write!(f, "({} AND {})", left, right),
            Selector::Or(left, right) => write!(f, "({} OR {})", left, right),
        }
    }
}
