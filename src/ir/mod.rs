//! Промежуточное представление: трёхадресный код и граф потока управления.
//!
//! # Пример
//!
//! ```text
//! function main():
//!     t0 = b + c
//!     t1 = a * t0
//!     result = t1
//!     return result
//! ```

pub mod cfg;
pub mod error;
pub mod eval;
pub mod instr;
pub mod lower;

pub use cfg::{entry_label, BasicBlock, Cfg};
pub use error::IrError;
pub use instr::{format_code, split_functions, BinOp, Const, Instr, Operand, Place, UnOp};
pub use lower::{GlobalVar, IrFunction, IrProgram, Lowerer};

use log::debug;
use serde::Serialize;

use crate::error::Diagnostic;
use crate::parser::ast::Program;

/// Имя синтетической функции, с которой начинается выполнение.
pub const START_FUNCTION: &str = "_start";

/// Результат генерации промежуточного кода.
#[derive(Debug, Clone, Serialize)]
pub struct IrResult {
    pub success: bool,
    pub ir_code: Vec<Instr>,
    pub cfg: Option<Cfg>,
    pub errors: Vec<Diagnostic>,
    #[serde(skip)]
    pub program: Option<IrProgram>,
}

/// Сгенерировать трёхадресный код по аннотированному AST.
pub fn generate(program: &Program) -> IrResult {
    let (ir, errors) = Lowerer::new().lower(program);
    let cfg = Cfg::build(&ir.code);

    debug!(
        "ir: {} instructions, {} temporaries, {} blocks, {} edges",
        ir.code.len(),
        ir.temp_count,
        cfg.blocks.len(),
        cfg.edge_count()
    );

    let errors: Vec<Diagnostic> = errors.into_iter().map(Diagnostic::from).collect();
    IrResult {
        success: errors.is_empty(),
        ir_code: ir.code.clone(),
        cfg: Some(cfg),
        errors,
        program: Some(ir),
    }
}
