// diag.rs - Diagnostics for binding expressions
//
// One `Diagnostic` type shared by the parser, the binder and the model.
// Spans are byte offsets into the binding expression the diagnostic was
// raised for.
//
// Preconditions: spans handed to `render` index the source passed with them.
// Postconditions: `render` output is newline-terminated.
// Failure modes: none; out-of-range spans are clamped when rendering.
// Side effects: none.

use std::error::Error as _;
use std::fmt;

use chumsky::error::Rich;

use crate::ast::Span;
use crate::lexer::Token;
use crate::model::ModelError;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`).
///
/// Once assigned, a code keeps its meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    /// Malformed expression.
    pub const SYNTAX: DiagCode = DiagCode("E0001");
    /// Character outside the expression alphabet.
    pub const LEX: DiagCode = DiagCode("E0002");
    /// Name is neither a variable, an import nor a known class.
    pub const UNKNOWN_IDENTIFIER: DiagCode = DiagCode("E0101");
    /// Field, getter or method cannot be found on the receiver type.
    pub const UNRESOLVED_MEMBER: DiagCode = DiagCode("E0102");
    /// Model lifecycle or graph invariant broken.
    pub const INTERNAL: DiagCode = DiagCode("E0201");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Cause record ─────────────────────────────────────────────────────────

/// One link in the chain of underlying errors.
#[derive(Debug, Clone)]
pub struct CauseRecord {
    pub message: String,
    pub span: Option<Span>,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
    pub cause_chain: Vec<CauseRecord>,
}

impl Diagnostic {
    pub fn new(level: DiagLevel, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
            cause_chain: Vec::new(),
        }
    }

    pub fn error(code: DiagCode, span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, span, message).with_code(code)
    }

    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_cause(mut self, message: impl Into<String>, span: Option<Span>) -> Self {
        self.cause_chain.push(CauseRecord {
            message: message.into(),
            span,
        });
        self
    }

    /// Syntax or lex error reported by the parser.
    pub fn from_parse_error(err: &Rich<'static, Token, Span>) -> Self {
        let span = *err.span();
        let message = err.to_string();
        let code = if message.starts_with("unexpected character")
            || message.starts_with("integer literal out of range")
        {
            codes::LEX
        } else {
            codes::SYNTAX
        };
        Self::error(code, span, message)
    }

    /// Model error raised while binding. `fallback` is used when the error
    /// carries no span of its own.
    pub fn from_model_error(err: &ModelError, fallback: Span) -> Self {
        match err {
            ModelError::Resolution { key, span, source } => {
                let span = span.unwrap_or(fallback);
                let mut diag = Self::error(
                    codes::UNRESOLVED_MEMBER,
                    span,
                    format!("cannot resolve `{key}`"),
                )
                .with_cause(source.to_string(), Some(span));
                let mut next = source.source();
                while let Some(cause) = next {
                    diag = diag.with_cause(cause.to_string(), None);
                    next = cause.source();
                }
                diag
            }
            _ => Self::error(codes::INTERNAL, fallback, err.to_string()),
        }
    }

    /// Render with a source excerpt and a caret line under the span.
    pub fn render(&self, origin: &str, source: &str) -> String {
        let start = self.span.start.min(source.len());
        let end = self.span.end.clamp(start, source.len());
        let width = source[start..end].chars().count().max(1);
        let column = source[..start].chars().count();
        let mut out = format!("{self}\n  --> {origin}:{}\n", column + 1);
        out.push_str(&format!("   | {source}\n"));
        out.push_str(&format!("   | {}{}\n", " ".repeat(column), "^".repeat(width)));
        for cause in &self.cause_chain {
            out.push_str(&format!("   = caused by: {}\n", cause.message));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}
