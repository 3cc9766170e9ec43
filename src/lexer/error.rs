//! Ошибки лексера.

use thiserror::Error;

use super::token::Span;
use crate::error::{Diagnostic, Phase};

/// Лексическая ошибка.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    /// Символ, не подходящий ни под одно правило.
    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, span: Span },

    /// Цифры, сразу за которыми идут буквы: `2x`.
    #[error("invalid identifier '{text}': identifiers cannot start with a digit")]
    InvalidIdentifier { text: String, span: Span },

    /// Строка без закрывающей кавычки до конца строки.
    #[error("unterminated string literal")]
    UnterminatedString { span: Span },

    /// Блочный комментарий без `*/` до конца файла.
    #[error("unterminated block comment")]
    UnterminatedComment { span: Span },

    /// Число, которое не удалось разобрать (например, переполнение).
    #[error("invalid numeric literal '{text}'")]
    InvalidNumber { text: String, span: Span },

    /// Неверный символьный литерал.
    #[error("invalid character literal {text}")]
    InvalidChar { text: String, span: Span },
}

impl LexError {
    /// Получить позицию ошибки.
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar { span, .. } => *span,
            Self::InvalidIdentifier { span, .. } => *span,
            Self::UnterminatedString { span } => *span,
            Self::UnterminatedComment { span } => *span,
            Self::InvalidNumber { span, .. } => *span,
            Self::InvalidChar { span, .. } => *span,
        }
    }
}

impl From<LexError> for Diagnostic {
    fn from(err: LexError) -> Self {
        Diagnostic::error(Phase::Lexical, "LexicalError", err.span(), err.to_string())
    }
}
