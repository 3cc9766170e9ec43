//! Ошибки генерации кода.

use thiserror::Error;

use crate::error::{Diagnostic, Phase};
use crate::lexer::token::Span;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodegenError {
    #[error("cannot allocate stack frame for '{function}': {size} bytes exceeds the limit of {limit} bytes")]
    FrameTooLarge {
        function: String,
        size: u32,
        limit: u32,
    },

    #[error("unknown register '{name}' in register pool")]
    UnknownRegister { name: String },

    #[error("register '{name}' is reserved for scratch use and cannot be allocated")]
    ReservedRegister { name: String },
}

impl From<CodegenError> for Diagnostic {
    fn from(err: CodegenError) -> Self {
        Diagnostic::error(Phase::Codegen, "CodeGenError", Span::default(), err.to_string())
    }
}
