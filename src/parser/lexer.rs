//! Hand-written lexer for the policy DSL.
//!
//! Comments (`// ...` and `/* ... */`) are whitespace. String literals are
//! single-quoted with backslash escapes. The multi-word operator sequences
//! `IS NULL`, `IS NOT NULL`, `NOT IN` and `NOT LIKE` fold into single
//! tokens when their words are separated by inline whitespace only.

use super::SyntaxError;
use super::token::{Token, TokenKind};

pub fn tokenize(source: &str) -> (Vec<Token>, Vec<SyntaxError>) {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    errors: Vec<SyntaxError>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<SyntaxError>) {
        while let Some(c) = self.peek() {
            let (line, column) = (self.line, self.column);
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => self.skip_line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.skip_block_comment(),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                ',' => self.single(TokenKind::Comma),
                '_' => self.single(TokenKind::Underscore),
                '=' => self.single(TokenKind::Eq),
                '<' => {
                    self.bump();
                    match self.peek() {
                        Some('>') => {
                            self.bump();
                            self.push(TokenKind::Neq, line, column);
                        }
                        Some('=') => {
                            self.bump();
                            self.push(TokenKind::Lte, line, column);
                        }
                        _ => self.push(TokenKind::Lt, line, column),
                    }
                }
                '>' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        self.push(TokenKind::Gte, line, column);
                    } else {
                        self.push(TokenKind::Gt, line, column);
                    }
                }
                '!' if self.peek_at(1) == Some('=') => {
                    self.bump();
                    self.bump();
                    self.push(TokenKind::Neq, line, column);
                }
                '\'' => self.lex_string(),
                '-' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.lex_int(),
                c if c.is_ascii_digit() => self.lex_int(),
                c if c.is_ascii_alphabetic() => self.lex_word(),
                other => {
                    self.error(format!("unexpected character '{}'", other));
                    self.bump();
                }
            }
        }
        let (line, column) = (self.line, self.column);
        self.push(TokenKind::Eof, line, column);
        (self.tokens, self.errors)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn single(&mut self, kind: TokenKind) {
        let (line, column) = (self.line, self.column);
        self.bump();
        self.push(kind, line, column);
    }

    fn push(&mut self, kind: TokenKind, line: usize, column: usize) {
        self.tokens.push(Token { kind, line, column });
    }

    fn error(&mut self, message: String) {
        self.errors.push(SyntaxError {
            line: self.line,
            column: self.column,
            message,
        });
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) {
        let (line, column) = (self.line, self.column);
        self.bump();
        self.bump();
        loop {
            match self.peek() {
                None => {
                    self.errors.push(SyntaxError {
                        line,
                        column,
                        message: "unterminated block comment".to_string(),
                    });
                    return;
                }
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn lex_string(&mut self) {
        let (line, column) = (self.line, self.column);
        self.bump();
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.errors.push(SyntaxError {
                        line,
                        column,
                        message: "unterminated string literal".to_string(),
                    });
                    self.push(TokenKind::Str(value), line, column);
                    return;
                }
                Some('\\') => {
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        value.push(escaped);
                    }
                }
                Some('\'') => {
                    self.bump();
                    self.push(TokenKind::Str(value), line, column);
                    return;
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
    }

    fn lex_int(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.bump();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match text.parse::<i64>() {
            Ok(n) => self.push(TokenKind::Int(n), line, column),
            Err(_) => {
                self.errors.push(SyntaxError {
                    line,
                    column,
                    message: format!("integer literal '{}' out of range", text),
                });
            }
        }
    }

    fn lex_word(&mut self) {
        let (line, column) = (self.line, self.column);
        let word = self.read_word();
        let kind = match word.as_str() {
            "IN" => TokenKind::In,
            "LIKE" => TokenKind::Like,
            "IS" => self.fold_is(),
            "NOT" => self.fold_not(),
            _ => TokenKind::Ident(word),
        };
        self.push(kind, line, column);
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    /// `IS NULL` / `IS NOT NULL`, words separated by inline whitespace only.
    fn fold_is(&mut self) -> TokenKind {
        let checkpoint = self.checkpoint();
        self.skip_inline_whitespace();
        match self.read_word().as_str() {
            "NULL" => TokenKind::IsNull,
            "NOT" => {
                self.skip_inline_whitespace();
                if self.read_word() == "NULL" {
                    TokenKind::IsNotNull
                } else {
                    self.restore(checkpoint);
                    TokenKind::Ident("IS".to_string())
                }
            }
            _ => {
                self.restore(checkpoint);
                TokenKind::Ident("IS".to_string())
            }
        }
    }

    /// `NOT IN` / `NOT LIKE`, words separated by inline whitespace only.
    fn fold_not(&mut self) -> TokenKind {
        let checkpoint = self.checkpoint();
        self.skip_inline_whitespace();
        match self.read_word().as_str() {
            "IN" => TokenKind::NotIn,
            "LIKE" => TokenKind::NotLike,
            _ => {
                self.restore(checkpoint);
                TokenKind::Ident("NOT".to_string())
            }
        }
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.bump();
        }
    }

    fn checkpoint(&self) -> (usize, usize, usize) {
        (self.pos, self.line, self.column)
    }

    fn restore(&mut self, checkpoint: (usize, usize, usize)) {
        self.pos = checkpoint.0;
        self.line = checkpoint.1;
        self.column = checkpoint.2;
    }
}
