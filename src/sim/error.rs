//! Ошибки выполнения.

use thiserror::Error;

use crate::error::{Diagnostic, Phase};
use crate::lexer::token::Span;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    #[error("execution limit exceeded: program did not finish within {limit} steps")]
    StepLimit { limit: u64 },

    #[error("division by zero in '{function}'")]
    DivisionByZero { function: String },

    #[error("stack overflow in '{function}': call depth {depth} exceeds the {size}-byte stack")]
    StackOverflow {
        function: String,
        depth: usize,
        size: usize,
    },

    #[error("call to undefined function '{name}'")]
    UndefinedFunction { name: String },

    #[error("jump to undefined label '{label}'")]
    UndefinedLabel { label: String },

    #[error("read of undefined value '{name}' in '{function}'")]
    UndefinedValue { name: String, function: String },

    #[error("invalid operation in '{function}': {message}")]
    InvalidOperation { function: String, message: String },

    #[error("printf: {message}")]
    Format { message: String },
}

impl ExecError {
    /// Категория для диагностики.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecError::StepLimit { .. } => "ExecutionLimitExceeded",
            _ => "RuntimeError",
        }
    }
}

impl From<ExecError> for Diagnostic {
    fn from(err: ExecError) -> Self {
        Diagnostic::error(Phase::Execution, err.kind(), Span::default(), err.to_string())
    }
}
