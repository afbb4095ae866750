//! # Lexer
//!
//! Turns Vague source text into a positioned token stream. Whitespace and
//! `//` line comments are skipped. Every token records the line, column and
//! byte range it came from so later stages can point at the offending code.

use crate::error::{CompileResult, Span, VagueError};
use std::fmt;

/// Token variants
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Decimal(f64),
    Str(String),

    // Keywords
    Schema,
    Dataset,
    Let,
    Import,
    From,
    Of,
    In,
    Any,
    Where,
    Assume,
    If,
    And,
    Or,
    Not,
    Validate,
    Refine,
    Then,
    Unique,
    Private,
    When,
    Violating,
    True,
    False,
    Null,

    // Punctuation
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    DotDot,
    Question,
    Caret,
    Pipe,
    Assign,
    PlusAssign,
    EqEq,
    NotEq,
    Le,
    Ge,
    Lt,
    Gt,
    Plus,
    Minus,
    Star,
    Slash,

    Eof,
}

impl TokenKind {
    /// Keyword lookup for an identifier-shaped word.
    fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "schema" => TokenKind::Schema,
            "dataset" => TokenKind::Dataset,
            "let" => TokenKind::Let,
            "import" => TokenKind::Import,
            "from" => TokenKind::From,
            "of" => TokenKind::Of,
            "in" => TokenKind::In,
            "any" => TokenKind::Any,
            "where" => TokenKind::Where,
            "assume" => TokenKind::Assume,
            "if" => TokenKind::If,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "validate" => TokenKind::Validate,
            "refine" => TokenKind::Refine,
            "then" => TokenKind::Then,
            "unique" => TokenKind::Unique,
            "private" => TokenKind::Private,
            "when" => TokenKind::When,
            "violating" => TokenKind::Violating,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => return None,
        };
        Some(kind)
    }

    /// Short human-readable form for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Int(v) => format!("number '{v}'"),
            TokenKind::Decimal(v) => format!("number '{v}'"),
            TokenKind::Str(s) => format!("string \"{s}\""),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{other}'"),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Ident(name) => return write!(f, "{name}"),
            TokenKind::Int(v) => return write!(f, "{v}"),
            TokenKind::Decimal(v) => return write!(f, "{v}"),
            TokenKind::Str(s) => return write!(f, "\"{s}\""),
            TokenKind::Schema => "schema",
            TokenKind::Dataset => "dataset",
            TokenKind::Let => "let",
            TokenKind::Import => "import",
            TokenKind::From => "from",
            TokenKind::Of => "of",
            TokenKind::In => "in",
            TokenKind::Any => "any",
            TokenKind::Where => "where",
            TokenKind::Assume => "assume",
            TokenKind::If => "if",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::Validate => "validate",
            TokenKind::Refine => "refine",
            TokenKind::Then => "then",
            TokenKind::Unique => "unique",
            TokenKind::Private => "private",
            TokenKind::When => "when",
            TokenKind::Violating => "violating",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::Question => "?",
            TokenKind::Caret => "^",
            TokenKind::Pipe => "|",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Eof => "<eof>",
        };
        write!(f, "{text}")
    }
}

/// A token with its source position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

struct Lexer<'a> {
    chars: Vec<char>,
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    offset: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            source,
            pos: 0,
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn here(&self) -> (usize, usize, usize) {
        (self.line, self.column, self.offset)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_ahead(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_string(&mut self) -> CompileResult<TokenKind> {
        let (line, column, start) = self.here();
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(TokenKind::Str(text)),
                Some('\\') => match self.bump() {
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(other) => {
                        return Err(VagueError::lex(
                            format!("unknown escape sequence '\\{other}'"),
                            Span::new(line, column, start, self.offset),
                        ));
                    }
                    None => {
                        return Err(VagueError::lex(
                            "unterminated string literal",
                            Span::new(line, column, start, self.offset),
                        ));
                    }
                },
                Some('\n') | None => {
                    return Err(VagueError::lex(
                        "unterminated string literal",
                        Span::new(line, column, start, self.offset),
                    ));
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn lex_number(&mut self) -> CompileResult<TokenKind> {
        let (line, column, start) = self.here();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        // A '.' begins the fractional part only when a digit follows;
        // '..' is the range operator and stays untouched.
        if self.peek() == Some('.') && self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            let value: f64 = text.parse().map_err(|_| {
                VagueError::lex(
                    format!("invalid number literal '{text}'"),
                    Span::new(line, column, start, self.offset),
                )
            })?;
            Ok(TokenKind::Decimal(value))
        } else {
            let value: i64 = text.parse().map_err(|_| {
                VagueError::lex(
                    format!("integer literal '{text}' out of range"),
                    Span::new(line, column, start, self.offset),
                )
            })?;
            Ok(TokenKind::Int(value))
        }
    }

    fn lex_word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::keyword(&word).unwrap_or(TokenKind::Ident(word))
    }

    fn next_token(&mut self) -> CompileResult<Token> {
        self.skip_trivia();
        let (line, column, start) = self.here();
        let span_to_here = |lexer: &Lexer<'_>| Span::new(line, column, start, lexer.offset);

        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(line, column, start, start),
            });
        };

        let kind = match c {
            '"' => self.lex_string()?,
            c if c.is_ascii_digit() => self.lex_number()?,
            c if c.is_alphabetic() || c == '_' => self.lex_word(),
            '{' => {
                self.bump();
                TokenKind::LBrace
            }
            '}' => {
                self.bump();
                TokenKind::RBrace
            }
            '(' => {
                self.bump();
                TokenKind::LParen
            }
            ')' => {
                self.bump();
                TokenKind::RParen
            }
            '[' => {
                self.bump();
                TokenKind::LBracket
            }
            ']' => {
                self.bump();
                TokenKind::RBracket
            }
            ',' => {
                self.bump();
                TokenKind::Comma
            }
            ':' => {
                self.bump();
                TokenKind::Colon
            }
            '?' => {
                self.bump();
                TokenKind::Question
            }
            '^' => {
                self.bump();
                TokenKind::Caret
            }
            '|' => {
                self.bump();
                TokenKind::Pipe
            }
            '*' => {
                self.bump();
                TokenKind::Star
            }
            '/' => {
                self.bump();
                TokenKind::Slash
            }
            '.' => {
                self.bump();
                if self.peek() == Some('.') {
                    self.bump();
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            '=' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::NotEq
                } else {
                    return Err(VagueError::lex(
                        "unexpected character '!' (did you mean '!='?)",
                        span_to_here(self),
                    ));
                }
            }
            '<' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '+' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                self.bump();
                TokenKind::Minus
            }
            other => {
                self.bump();
                return Err(VagueError::lex(
                    format!("unexpected character '{other}'"),
                    span_to_here(self),
                ));
            }
        };

        Ok(Token {
            kind,
            span: Span::new(line, column, start, self.offset),
        })
    }

    fn run(mut self) -> CompileResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                debug_assert!(self.offset <= self.source.len());
                return Ok(tokens);
            }
        }
    }
}

/// Tokenize a full source text. The returned stream always ends with an
/// `Eof` token.
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
    Lexer::new(source).run()
}
