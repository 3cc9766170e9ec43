//! Конвейер компиляции: фазы по порядку, до первой неудачной.
//!
//! Каждая фаза получает только результат предыдущей. Никакого состояния
//! между вызовами нет, поэтому [`compile`] можно звать из разных потоков.

use std::path::Path;

use log::{debug, info};
use serde::Serialize;

use crate::codegen::{self, CodegenResult};
use crate::config::CompilerConfig;
use crate::error::{Diagnostic, PhasecError, PhasecResult};
use crate::ir::{self, IrResult};
use crate::lexer::{self, LexicalResult};
use crate::opt::{self, OptimizationResult};
use crate::parser::{self, SyntaxResult};
use crate::semantic::{self, SemanticResult};
use crate::sim::{self, ExecutionResult};

/// Результаты всех фаз. Фазы после первой неудачной остаются `None`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationResult {
    pub lexical: Option<LexicalResult>,
    pub syntax: Option<SyntaxResult>,
    pub semantic: Option<SemanticResult>,
    pub intermediate: Option<IrResult>,
    pub optimization: Option<OptimizationResult>,
    pub codegen: Option<CodegenResult>,
    pub execution: Option<ExecutionResult>,
}

impl CompilationResult {
    /// Все фазы выполнились без ошибок.
    pub fn success(&self) -> bool {
        self.execution.as_ref().is_some_and(|e| e.success)
    }

    /// Все диагностики всех выполненных фаз по порядку.
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        let mut all = Vec::new();
        if let Some(r) = &self.lexical {
            all.extend(&r.errors);
        }
        if let Some(r) = &self.syntax {
            all.extend(&r.errors);
        }
        if let Some(r) = &self.semantic {
            all.extend(&r.errors);
        }
        if let Some(r) = &self.intermediate {
            all.extend(&r.errors);
        }
        if let Some(r) = &self.codegen {
            all.extend(&r.errors);
        }
        if let Some(r) = &self.execution {
            all.extend(&r.errors);
        }
        all
    }

    /// Вывод программы, если она выполнялась.
    pub fn output(&self) -> Option<&str> {
        self.execution.as_ref().map(|e| e.output.as_str())
    }

    pub fn to_json(&self) -> PhasecResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PhasecError::SerializationError(e.to_string()))
    }
}

/// Скомпилировать и выполнить с настройками по умолчанию.
pub fn compile(source: &str) -> CompilationResult {
    compile_with(source, &CompilerConfig::default())
}

/// Скомпилировать и выполнить.
pub fn compile_with(source: &str, config: &CompilerConfig) -> CompilationResult {
    let mut result = CompilationResult::default();

    let lexical = result.lexical.insert(lexer::tokenize(source));
    if !lexical.success {
        debug!("pipeline: stopped after lexical analysis");
        return result;
    }
    let (tokens, eof) = (&lexical.tokens, lexical.eof);

    let syntax = parser::parse(tokens, eof);
    let syntax = result.syntax.insert(syntax);
    let Some(ast) = syntax.ast.as_ref().filter(|_| syntax.success) else {
        debug!("pipeline: stopped after syntax analysis");
        return result;
    };

    let semantic = result.semantic.insert(semantic::analyze(ast));
    let Some(annotated) = semantic.program.as_ref().filter(|_| semantic.success) else {
        debug!("pipeline: stopped after semantic analysis");
        return result;
    };

    let intermediate = result.intermediate.insert(ir::generate(annotated));
    let Some(program) = intermediate.program.as_ref().filter(|_| intermediate.success) else {
        debug!("pipeline: stopped after IR generation");
        return result;
    };

    let optimization = result.optimization.insert(opt::optimize(program));
    if !optimization.success {
        debug!("pipeline: stopped after optimization");
        return result;
    }

    let codegen = codegen::generate(&optimization.program, config);
    let generated = codegen.success;
    result.codegen = Some(codegen);
    if !generated {
        debug!("pipeline: stopped after code generation");
        return result;
    }

    let execution = sim::run(&optimization.program, &optimization.cfg, config);
    info!(
        "pipeline: finished, {} steps, success = {}",
        execution.steps, execution.success
    );
    result.execution = Some(execution);
    result
}

/// Прочитать исходник из файла и скомпилировать.
pub fn compile_file(path: impl AsRef<Path>, config: &CompilerConfig) -> PhasecResult<CompilationResult> {
    let source = std::fs::read_to_string(path)?;
    Ok(compile_with(&source, config))
}
