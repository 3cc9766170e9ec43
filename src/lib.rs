//! # phasec
//!
//! Учебный компилятор подмножества C, в котором видна каждая фаза:
//! токены, AST, таблица символов, трёхадресный код и граф потока
//! управления, проходы оптимизации, ассемблер x86-64 и результат
//! выполнения на симуляторе.
//!
//! ## Основные модули
//!
//! - [`lexer`] - лексический анализ
//! - [`parser`] - синтаксический анализ, AST
//! - [`semantic`] - области видимости и типы
//! - [`ir`] - трёхадресный код и CFG
//! - [`opt`] - проходы оптимизации
//! - [`codegen`] - ассемблер, распределение регистров, кадр стека
//! - [`sim`] - выполнение без нативного тулчейна
//! - [`pipeline`] - всё вместе
//!
//! ## Пример
//!
//! ```rust,ignore
//! use phasec::compile;
//!
//! let result = compile("int main() { printf(\"%d\\n\", 6 * 7); return 0; }");
//! assert_eq!(result.output(), Some("42\n"));
//! ```

// === Фазы ===
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod ir;
pub mod opt;
pub mod codegen;
pub mod sim;

// === Общее ===
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

// === Re-exports для удобства ===
pub use config::CompilerConfig;
pub use error::{Diagnostic, Phase, PhasecError, PhasecResult, Severity};
pub use pipeline::{compile, compile_file, compile_with, CompilationResult};
pub use types::Type;
