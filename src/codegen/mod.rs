//! Генерация ассемблера x86-64 (синтаксис Intel).
//!
//! Вход — оптимизированный трёхадресный код. Выход — листинг, карта
//! регистров и карта кадра; ключи карт имеют вид `функция.место`.

pub mod asm;
pub mod emit;
pub mod error;
pub mod regalloc;

pub use asm::{AsmLine, AsmOperand, Reg, Width};
pub use emit::Emitter;
pub use error::CodegenError;

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::config::CompilerConfig;
use crate::error::Diagnostic;
use crate::ir::IrProgram;

/// Результат генерации кода.
#[derive(Debug, Clone, Serialize)]
pub struct CodegenResult {
    pub success: bool,
    pub assembly_code: Vec<AsmLine>,
    /// `функция.место` → регистр.
    pub register_allocation: BTreeMap<String, String>,
    /// `функция.место` → смещение слота вниз от `rbp` в байтах.
    pub stack_frame: BTreeMap<String, u32>,
    pub errors: Vec<Diagnostic>,
}

impl CodegenResult {
    /// Листинг одной строкой.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for line in &self.assembly_code {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }
}

/// Разобрать пул регистров из настроек.
pub fn register_pool(names: &[String]) -> (Vec<Reg>, Vec<CodegenError>) {
    let mut pool = Vec::new();
    let mut errors = Vec::new();
    for name in names {
        match name.parse::<Reg>() {
            Ok(reg) if !reg.allocatable() => {
                errors.push(CodegenError::ReservedRegister { name: name.clone() })
            }
            Ok(reg) => {
                if !pool.contains(&reg) {
                    pool.push(reg);
                }
            }
            Err(()) => errors.push(CodegenError::UnknownRegister { name: name.clone() }),
        }
    }
    (pool, errors)
}

/// Сгенерировать ассемблер для программы.
pub fn generate(program: &IrProgram, config: &CompilerConfig) -> CodegenResult {
    let (pool, mut errors) = register_pool(&config.register_pool);
    let emitted = Emitter::new(program, pool, config.max_frame_bytes).run();
    errors.extend(emitted.errors);

    debug!(
        "codegen: {} lines, {} registers assigned, {} stack slots",
        emitted.lines.len(),
        emitted.register_allocation.len(),
        emitted.stack_frame.len()
    );

    let errors: Vec<Diagnostic> = errors.into_iter().map(Diagnostic::from).collect();
    CodegenResult {
        success: errors.is_empty(),
        assembly_code: emitted.lines,
        register_allocation: emitted.register_allocation,
        stack_frame: emitted.stack_frame,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opt::test_support::ir_of;

    fn codegen(source: &str, config: &CompilerConfig) -> CodegenResult {
        generate(&ir_of(source), config)
    }

    fn lines(result: &CodegenResult) -> Vec<String> {
        result.assembly_code.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_prologue_epilogue_and_sections() {
        let result = codegen("int main() { return 0; }", &CompilerConfig::default());
        assert!(result.success);
        let code = lines(&result);
        assert_eq!(code[0], ".intel_syntax noprefix");
        assert!(code.contains(&".text".to_string()));
        assert!(code.contains(&".globl _start".to_string()));
        assert!(code.contains(&"main:".to_string()));
        assert!(code.contains(&"    push rbp".to_string()));
        assert!(code.contains(&"    mov rbp, rsp".to_string()));
        assert!(code.contains(&"    ret".to_string()));
        assert!(code.contains(&"    call main".to_string()));
    }

    #[test]
    fn test_register_allocation_keys() {
        let result = codegen(
            "int main() { int x = 1; int y = x + 2; return y; }",
            &CompilerConfig::default(),
        );
        assert_eq!(result.register_allocation.get("main.x").map(String::as_str), Some("ebx"));
        assert_eq!(result.register_allocation.get("main.t0").map(String::as_str), Some("ecx"));
        assert!(result.stack_frame.is_empty());
    }

    #[test]
    fn test_pool_exhaustion_spills_in_four_byte_steps() {
        let config = CompilerConfig {
            register_pool: vec!["ebx".to_string()],
            ..CompilerConfig::default()
        };
        let result = codegen("int main() { int a = 1; int b = 2; int c = 3; return a + b + c; }", &config);
        assert!(result.success);
        assert_eq!(result.register_allocation.len(), 1);
        let offsets: Vec<u32> = result.stack_frame.values().copied().collect();
        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        assert_eq!(sorted[..3], [4, 8, 12]);
        assert!(lines(&result).iter().any(|l| l.contains("DWORD PTR [rbp - 4]")));
    }

    #[test]
    fn test_frame_limit_is_codegen_error() {
        let config = CompilerConfig {
            register_pool: Vec::new(),
            max_frame_bytes: 8,
            ..CompilerConfig::default()
        };
        let result = codegen("int main() { int a = 1; int b = 2; int c = 3; return a; }", &config);
        assert!(!result.success);
        assert_eq!(result.errors[0].kind, "CodeGenError");
        assert!(result.errors[0].message.contains("cannot allocate"));
    }

    #[test]
    fn test_bad_register_pool() {
        let (pool, errors) =
            register_pool(&["ebx".to_string(), "eax".to_string(), "foo".to_string(), "ebx".to_string()]);
        assert_eq!(pool, vec![Reg::Ebx]);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_division_and_comparison_selection() {
        let result = codegen(
            "int f(int a, int b) { int q = a / b; int r = a % b; return q < r; }",
            &CompilerConfig::default(),
        );
        let code = lines(&result);
        assert!(code.contains(&"    cdq".to_string()));
        assert!(code.contains(&"    idiv r11d".to_string()));
        assert!(code.contains(&"    mov eax, edx".to_string()));
        assert!(code.contains(&"    setl al".to_string()));
        assert!(code.contains(&"    movzx eax, al".to_string()));
    }

    #[test]
    fn test_data_and_rodata() {
        let result = codegen(
            "int counter = 5;\nint main() { printf(\"n=%d\\n\", counter); return 0; }",
            &CompilerConfig::default(),
        );
        let code = lines(&result);
        assert!(code.contains(&".section .rodata".to_string()));
        assert!(code.contains(&".LC0: .string \"n=%d\\n\"".to_string()), "{:?}", code);
        assert!(code.contains(&".data".to_string()));
        assert!(code.contains(&"counter: .long 5".to_string()));
        assert!(code.contains(&"    mov rax, OFFSET .LC0".to_string()));
        assert!(code.contains(&"    mov eax, DWORD PTR [counter]".to_string()));
        assert!(code.contains(&"    add rsp, 16".to_string()));
    }

    #[test]
    fn test_float_arithmetic_uses_sse() {
        let result = codegen(
            "float half(float x) { return x / 2.0; }",
            &CompilerConfig::default(),
        );
        let code = lines(&result);
        assert!(code.contains(&"    divss xmm0, xmm1".to_string()), "{:?}", code);
        assert!(code.contains(&"    movd xmm0, eax".to_string()));
    }

    #[test]
    fn test_parameters_are_read_from_caller_frame() {
        let result = codegen("int add(int a, int b) { return a + b; }", &CompilerConfig::default());
        let code = lines(&result);
        assert!(code.contains(&"    mov ebx, DWORD PTR [rbp + 24]".to_string()), "{:?}", code);
        assert!(code.contains(&"    mov ecx, DWORD PTR [rbp + 16]".to_string()));
    }
}
