//! Ошибки парсера.

use thiserror::Error;

use crate::error::{Diagnostic, Phase};
use crate::lexer::token::{Span, TokenKind};

/// Синтаксическая ошибка.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    /// Неожиданный токен.
    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken {
        span: Span,
        expected: String,
        found: String,
    },

    /// Пропущен завершающий `;`.
    #[error("expected ';' after {context}, found '{found}'")]
    MissingTerminator {
        span: Span,
        context: String,
        found: String,
    },

    /// Вход закончился при незакрытой скобке.
    #[error("unbalanced delimiter: '{delimiter}' opened at line {open_line}, column {open_column} is never closed")]
    UnclosedDelimiter {
        span: Span,
        delimiter: String,
        open_line: usize,
        open_column: usize,
    },

    /// Закрывающая скобка без открывающей.
    #[error("unbalanced delimiter: unmatched '{delimiter}'")]
    UnmatchedDelimiter { span: Span, delimiter: String },

    /// Слева от `=` не переменная.
    #[error("invalid assignment target: only variables can be assigned")]
    InvalidAssignmentTarget { span: Span },
}

impl SyntaxError {
    /// Создать ошибку "неожиданный токен".
    pub fn unexpected_token(span: Span, expected: impl Into<String>, found: &TokenKind) -> Self {
        Self::UnexpectedToken {
            span,
            expected: expected.into(),
            found: found.to_string(),
        }
    }

    /// Создать ошибку "пропущен `;`".
    pub fn missing_terminator(span: Span, context: impl Into<String>, found: &TokenKind) -> Self {
        Self::MissingTerminator {
            span,
            context: context.into(),
            found: found.to_string(),
        }
    }

    /// Получить позицию ошибки.
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::MissingTerminator { span, .. } => *span,
            Self::UnclosedDelimiter { span, .. } => *span,
            Self::UnmatchedDelimiter { span, .. } => *span,
            Self::InvalidAssignmentTarget { span } => *span,
        }
    }
}

impl From<SyntaxError> for Diagnostic {
    fn from(err: SyntaxError) -> Self {
        Diagnostic::error(Phase::Syntax, "SyntaxError", err.span(), err.to_string())
    }
}
