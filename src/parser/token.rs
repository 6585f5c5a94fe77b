//! Lexical tokens for the policy DSL.

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword; the parser decides which by position.
    Ident(String),
    /// Single-quoted string literal, unescaped.
    Str(String),
    Int(i64),

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Underscore,

    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,

    // Multi-word operators, folded into single tokens by the lexer.
    In,
    NotIn,
    Like,
    NotLike,
    IsNull,
    IsNotNull,

    Eof,
}

impl TokenKind {
    /// Short rendering for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("'{}'", name),
            TokenKind::Str(s) => format!("string '{}'", s),
            TokenKind::Int(n) => format!("integer {}", n),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Underscore => "'_'".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::Neq => "'<>'".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::Lte => "'<='".to_string(),
            TokenKind::Gte => "'>='".to_string(),
            TokenKind::In => "'IN'".to_string(),
            TokenKind::NotIn => "'NOT IN'".to_string(),
            TokenKind::Like => "'LIKE'".to_string(),
            TokenKind::NotLike => "'NOT LIKE'".to_string(),
            TokenKind::IsNull => "'IS NULL'".to_string(),
            TokenKind::IsNotNull => "'IS NOT NULL'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}
