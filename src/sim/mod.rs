//! Симулятор: выполнение оптимизированного промежуточного кода.
//!
//! Настоящий ассемблер и компоновщик не нужны: программа исполняется
//! прямо по графу потока управления, а вывод `printf` и `print`
//! собирается в строку.

pub mod error;
pub mod format;
pub mod machine;

pub use error::ExecError;
pub use machine::Machine;

use log::debug;
use serde::Serialize;

use crate::config::CompilerConfig;
use crate::error::Diagnostic;
use crate::ir::{Cfg, IrProgram};

/// Результат выполнения.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// Вывод программы, в том числе частичный при ошибке.
    pub output: String,
    pub steps: u64,
    /// Значение, которое вернула `main`.
    pub exit_code: Option<i64>,
    pub errors: Vec<Diagnostic>,
}

/// Выполнить программу.
pub fn run(program: &IrProgram, cfg: &Cfg, config: &CompilerConfig) -> ExecutionResult {
    let mut machine = Machine::new(program, cfg, config);
    let outcome = machine.run();

    debug!(
        "execution: {} steps, {} bytes of output, exit code {:?}",
        machine.steps(),
        machine.output().len(),
        machine.exit_code()
    );

    let errors: Vec<Diagnostic> = outcome.err().into_iter().map(Diagnostic::from).collect();
    ExecutionResult {
        success: errors.is_empty(),
        output: machine.output().to_string(),
        steps: machine.steps(),
        exit_code: machine.exit_code(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opt::optimize;
    use crate::opt::test_support::ir_of;

    fn execute(source: &str, config: &CompilerConfig) -> ExecutionResult {
        let optimized = optimize(&ir_of(source));
        run(&optimized.program, &optimized.cfg, config)
    }

    #[test]
    fn test_partial_output_is_kept_on_error() {
        let result = execute(
            "int main() { print(1); int z = 0; print(10 / z); return 0; }",
            &CompilerConfig::default(),
        );
        assert!(!result.success);
        assert_eq!(result.output, "1\n");
        assert_eq!(result.errors[0].kind, "RuntimeError");
        assert!(result.errors[0].message.contains("division by zero"));
    }

    #[test]
    fn test_step_limit_has_own_kind() {
        let config = CompilerConfig {
            max_steps: 100,
            ..CompilerConfig::default()
        };
        let result = execute("int main() { while (1) { } return 0; }", &config);
        assert!(!result.success);
        assert_eq!(result.steps, 100);
        assert_eq!(result.errors[0].kind, "ExecutionLimitExceeded");
    }

    #[test]
    fn test_serializes_for_json_output() {
        let result = execute("int main() { printf(\"hi\\n\"); return 3; }", &CompilerConfig::default());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["output"], "hi\n");
        assert_eq!(json["exit_code"], 3);
    }
}
