//! Compile Error Types
//!
//! Four fatal taxonomies: lexing, parsing, name binding, and runtime
//! evaluation. Each carries a source position so the facade can render a
//! caret snippet. Parse errors are additionally collected with recovery and
//! aggregated into a single fatal error at the compile boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A position in the source text. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Span {
    pub fn new(line: usize, column: usize, start: usize, end: usize) -> Self {
        Span {
            line,
            column,
            start,
            end,
        }
    }

    /// A span pointing at a single position.
    pub fn point(line: usize, column: usize, offset: usize) -> Self {
        Span::new(line, column, offset, offset + 1)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Compile errors
#[derive(Error, Debug, Clone)]
pub enum VagueError {
    /// Unrecognized or malformed input at the character level
    #[error("lex error at {span}: {message}")]
    Lex { message: String, span: Span },

    /// Token stream does not match the grammar
    #[error("parse error at {span}: {message}")]
    Parse { message: String, span: Span },

    /// One or more parse errors collected with statement-level recovery
    #[error("{} parse error(s):\n{}", .0.len(), render_list(.0))]
    ParseCollection(Vec<VagueError>),

    /// Name resolution failure (unknown schema, forward field reference, ...)
    #[error("bind error at {span}: {message}")]
    Bind { message: String, span: Span },

    /// Evaluation failure (type mismatch, unknown generator, bad range, ...)
    #[error("runtime error: {message}")]
    Runtime { message: String },
}

fn render_list(errors: &[VagueError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl VagueError {
    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        VagueError::Lex {
            message: message.into(),
            span,
        }
    }

    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        VagueError::Parse {
            message: message.into(),
            span,
        }
    }

    pub fn bind(message: impl Into<String>, span: Span) -> Self {
        VagueError::Bind {
            message: message.into(),
            span,
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        VagueError::Runtime {
            message: message.into(),
        }
    }

    /// The source position, when the error carries one.
    pub fn span(&self) -> Option<Span> {
        match self {
            VagueError::Lex { span, .. }
            | VagueError::Parse { span, .. }
            | VagueError::Bind { span, .. } => Some(*span),
            VagueError::ParseCollection(errors) => errors.first().and_then(VagueError::span),
            VagueError::Runtime { .. } => None,
        }
    }

    /// Render the error with the offending source line and a caret marker:
    ///
    /// ```text
    /// parse error at line 2, column 11: expected ':' after field name
    ///   |   id unique int in 1..3
    ///   |           ^
    /// ```
    pub fn render(&self, source: &str) -> String {
        if let VagueError::ParseCollection(errors) = self {
            return errors
                .iter()
                .map(|e| e.render(source))
                .collect::<Vec<_>>()
                .join("\n");
        }

        let mut out = self.to_string();
        if let Some(span) = self.span() {
            if let Some(line_text) = source.lines().nth(span.line.saturating_sub(1)) {
                out.push_str(&format!("\n  | {line_text}\n  | "));
                for _ in 1..span.column {
                    out.push(' ');
                }
                out.push('^');
            }
        }
        out
    }
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, VagueError>;
