//! Семантический анализ: области видимости, типы, аннотированный AST.

pub mod analyzer;
pub mod error;
pub mod symbols;

pub use analyzer::{Analyzer, PRINT, PRINTF};
pub use error::SemanticError;
pub use symbols::{Symbol, SymbolKind, SymbolTable};

use log::debug;
use serde::Serialize;

use crate::error::{has_errors, Diagnostic};
use crate::parser::ast::Program;

/// Результат семантического анализа.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticResult {
    /// `true`, если среди диагностик нет ошибок (предупреждения допустимы).
    pub success: bool,
    pub symbol_table: Vec<Symbol>,
    pub errors: Vec<Diagnostic>,
    /// Аннотированное дерево для генерации IR.
    #[serde(skip)]
    pub program: Option<Program>,
}

/// Проанализировать программу. Исходное дерево не меняется.
pub fn analyze(program: &Program) -> SemanticResult {
    let mut annotated = program.clone();
    let (symbol_table, errors) = Analyzer::new().analyze(&mut annotated);
    let success = !has_errors(&errors);

    debug!(
        "semantic: {} symbols, {} diagnostics",
        symbol_table.len(),
        errors.len()
    );

    SemanticResult {
        success,
        symbol_table,
        errors,
        program: Some(annotated),
    }
}
