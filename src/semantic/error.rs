//! Ошибки и предупреждения семантического анализа.

use thiserror::Error;

use crate::error::{Diagnostic, Phase};
use crate::lexer::token::Span;
use crate::types::Type;

/// Семантическая ошибка.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("redeclaration of '{name}' (previously declared at line {previous_line})")]
    Redeclaration {
        name: String,
        previous_line: usize,
        span: Span,
    },

    #[error("undeclared identifier '{name}'")]
    Undeclared { name: String, span: Span },

    #[error("incompatible types: cannot assign {found} to '{name}' of type {expected}")]
    IncompatibleAssignment {
        name: String,
        expected: Type,
        found: Type,
        span: Span,
    },

    #[error("invalid operands to '{op}': {lhs} and {rhs}")]
    InvalidOperands {
        op: &'static str,
        lhs: Type,
        rhs: Type,
        span: Span,
    },

    #[error("invalid operand to unary '{op}': {operand}")]
    InvalidUnaryOperand {
        op: &'static str,
        operand: Type,
        span: Span,
    },

    #[error("condition of '{context}' must be bool or numeric, found {found}")]
    InvalidCondition {
        context: &'static str,
        found: Type,
        span: Span,
    },

    #[error("function '{name}' expects {expected} argument(s), found {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("argument {position} of '{name}': expected {expected}, found {found}")]
    ArgumentType {
        name: String,
        position: usize,
        expected: Type,
        found: Type,
        span: Span,
    },

    #[error("return type mismatch in '{function}': expected {expected}, found {found}")]
    ReturnMismatch {
        function: String,
        expected: Type,
        found: Type,
        span: Span,
    },

    #[error("'{name}' is not a function")]
    NotCallable { name: String, span: Span },

    #[error("function '{name}' cannot be used as a value")]
    FunctionAsValue { name: String, span: Span },

    #[error("'{keyword}' outside of a loop")]
    LoopControl { keyword: &'static str, span: Span },

    #[error("variable '{name}' declared void")]
    VoidVariable { name: String, span: Span },

    #[error("void value used where a value is required")]
    VoidValue { span: Span },

    #[error("invalid cast from {from} to {to}")]
    InvalidCast { from: Type, to: Type, span: Span },

    #[error("conflicting types for '{name}': {previous} vs {found}")]
    ConflictingSignature {
        name: String,
        previous: String,
        found: String,
        span: Span,
    },

    #[error("redefinition of function '{name}'")]
    FunctionRedefinition { name: String, span: Span },

    #[error("function '{name}' is declared but never defined")]
    UndefinedFunction { name: String, span: Span },
}

impl SemanticError {
    /// Получить позицию ошибки.
    pub fn span(&self) -> Span {
        match self {
            Self::Redeclaration { span, .. }
            | Self::Undeclared { span, .. }
            | Self::IncompatibleAssignment { span, .. }
            | Self::InvalidOperands { span, .. }
            | Self::InvalidUnaryOperand { span, .. }
            | Self::InvalidCondition { span, .. }
            | Self::ArgumentCount { span, .. }
            | Self::ArgumentType { span, .. }
            | Self::ReturnMismatch { span, .. }
            | Self::NotCallable { span, .. }
            | Self::FunctionAsValue { span, .. }
            | Self::LoopControl { span, .. }
            | Self::VoidVariable { span, .. }
            | Self::VoidValue { span }
            | Self::InvalidCast { span, .. }
            | Self::ConflictingSignature { span, .. }
            | Self::FunctionRedefinition { span, .. }
            | Self::UndefinedFunction { span, .. } => *span,
        }
    }
}

impl From<SemanticError> for Diagnostic {
    fn from(err: SemanticError) -> Self {
        Diagnostic::error(Phase::Semantic, "SemanticError", err.span(), err.to_string())
    }
}

/// Предупреждение: объявленный, но не использованный символ.
pub fn unused_warning(kind: &str, name: &str, span: Span) -> Diagnostic {
    Diagnostic::warning(
        Phase::Semantic,
        "SemanticWarning",
        span,
        format!("unused {} '{}'", kind, name),
    )
}
