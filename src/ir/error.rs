//! Ошибки генерации промежуточного кода.

use thiserror::Error;

use crate::error::{Diagnostic, Phase};
use crate::lexer::token::Span;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrError {
    /// Делитель — константное выражение, равное нулю.
    #[error("division by zero: divisor is a constant expression equal to zero")]
    DivisionByZero { span: Span },

    #[error("semantic analysis did not produce an annotated program")]
    MissingProgram,
}

impl IrError {
    pub fn span(&self) -> Span {
        match self {
            IrError::DivisionByZero { span } => *span,
            IrError::MissingProgram => Span::default(),
        }
    }
}

impl From<IrError> for Diagnostic {
    fn from(err: IrError) -> Self {
        Diagnostic::error(Phase::Intermediate, "IRError", err.span(), err.to_string())
    }
}
