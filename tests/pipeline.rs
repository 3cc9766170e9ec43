//! Сквозные тесты конвейера: исходник на C → вывод программы.

use std::io::Write;
use std::thread;

use phasec::{compile, compile_file, compile_with, sim, CompilerConfig, Phase};

const FACTORIAL: &str = r#"
#include <stdio.h>

int factorial(int n) {
    if (n <= 1) {
        return 1;
    }
    return n * factorial(n - 1);
}

int main() {
    int n = 5;
    printf("Factorial of %d is %d\n", n, factorial(n));
    return 0;
}
"#;

#[test]
fn test_factorial() {
    let result = compile(FACTORIAL);
    assert!(result.success(), "{:?}", result.diagnostics());
    assert_eq!(result.output(), Some("Factorial of 5 is 120\n"));
    assert_eq!(result.execution.as_ref().unwrap().exit_code, Some(0));
}

#[test]
fn test_fibonacci_recursive_and_iterative() {
    let source = r#"
        int fib(int n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }

        int fib_loop(int n) {
            int a = 0;
            int b = 1;
            int i = 0;
            while (i < n) {
                int next = a + b;
                a = b;
                b = next;
                i++;
            }
            return a;
        }

        int main() {
            printf("%d %d\n", fib(10), fib_loop(10));
            return 0;
        }
    "#;
    let result = compile(source);
    assert!(result.success(), "{:?}", result.diagnostics());
    assert_eq!(result.output(), Some("55 55\n"));
}

#[test]
fn test_break_continue_and_compound_assignment() {
    let source = r#"
        int main() {
            int sum = 0;
            for (int i = 0; i < 100; i++) {
                if (i >= 10) break;
                if (i % 2 == 0) continue;
                sum += i;
            }
            print(sum);
            return 0;
        }
    "#;
    let result = compile(source);
    assert!(result.success(), "{:?}", result.diagnostics());
    assert_eq!(result.output(), Some("25\n"));
}

#[test]
fn test_short_circuit_skips_side_effects() {
    let source = r#"
        int hits = 0;

        bool touch() {
            hits = hits + 1;
            return true;
        }

        int main() {
            if (1 > 2 && touch()) {
                print(100);
            }
            if (1 < 2 || touch()) {
                print(200);
            }
            bool b = 1 > 2 && touch();
            print(b);
            print(hits);
            bool c = 1 < 2 && touch();
            print(c);
            print(hits);
            return 0;
        }
    "#;
    let result = compile(source);
    assert!(result.success(), "{:?}", result.diagnostics());
    assert_eq!(result.output(), Some("200\n0\n0\n1\n1\n"));
}

#[test]
fn test_mixed_int_float_promotion() {
    let source = r#"
        int main() {
            int a = 7;
            float b = a / 2;
            float c = a / 2.0;
            printf("%.1f %.1f\n", b, c);
            return 0;
        }
    "#;
    let result = compile(source);
    assert!(result.success(), "{:?}", result.diagnostics());
    assert_eq!(result.output(), Some("3.0 3.5\n"));
}

#[test]
fn test_semantic_error_stops_later_phases() {
    let result = compile("int main() { int x = \"hola\"; return x; }");
    let semantic = result.semantic.as_ref().unwrap();
    assert!(!semantic.success);
    assert_eq!(semantic.errors[0].kind, "SemanticError");
    assert_eq!(semantic.errors[0].phase, Phase::Semantic);
    assert!(semantic.errors[0].message.contains("incompatible types"));
    assert!(result.intermediate.is_none());
    assert!(result.optimization.is_none());
    assert!(result.codegen.is_none());
    assert!(result.execution.is_none());
}

#[test]
fn test_warnings_do_not_stop_the_pipeline() {
    let result = compile("int main() { int spare = 1; return 0; }");
    assert!(result.success());
    let diagnostics = result.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, "SemanticWarning");
}

#[test]
fn test_top_level_statements_run_before_main() {
    let result = compile("int base = 40;\nprintf(\"%d\\n\", base + 2);");
    assert!(result.success(), "{:?}", result.diagnostics());
    assert_eq!(result.output(), Some("42\n"));
}

#[test]
fn test_every_phase_is_populated() {
    let result = compile("int main() { int x = 2 + 3 * 4; printf(\"%d\\n\", x); return 0; }");
    assert!(result.success());
    assert!(!result.lexical.as_ref().unwrap().tokens.is_empty());
    assert!(result.syntax.as_ref().unwrap().ast.is_some());
    assert!(!result.semantic.as_ref().unwrap().symbol_table.is_empty());
    assert!(result.intermediate.as_ref().unwrap().cfg.is_some());

    let optimization = result.optimization.as_ref().unwrap();
    assert!(!optimization.optimization_details.get("constant_folding").is_empty());
    assert!(optimization.optimized_code.len() <= optimization.original_code.len());

    let codegen = result.codegen.as_ref().unwrap();
    assert!(codegen.listing().contains("main:"));
    assert_eq!(result.output(), Some("14\n"));
}

#[test]
fn test_runtime_division_by_zero() {
    let result = compile("int main() { int z = 0; print(1); print(5 / z); return 0; }");
    let execution = result.execution.as_ref().unwrap();
    assert!(!execution.success);
    assert_eq!(execution.output, "1\n");
    assert_eq!(execution.errors[0].kind, "RuntimeError");
    assert_eq!(execution.errors[0].phase, Phase::Execution);
}

#[test]
fn test_step_limit_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "max_steps": 50 }}"#).unwrap();
    let config = CompilerConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.max_steps, 50);

    let result = compile_with("int main() { while (1) { } return 0; }", &config);
    let execution = result.execution.as_ref().unwrap();
    assert!(!execution.success);
    assert_eq!(execution.steps, 50);
    assert_eq!(execution.errors[0].kind, "ExecutionLimitExceeded");
    assert!(execution.errors[0].message.contains("execution limit exceeded"));
}

#[test]
fn test_compile_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("factorial.c");
    std::fs::write(&path, FACTORIAL).unwrap();

    let result = compile_file(&path, &CompilerConfig::default()).unwrap();
    assert_eq!(result.output(), Some("Factorial of 5 is 120\n"));
    assert!(compile_file(dir.path().join("missing.c"), &CompilerConfig::default()).is_err());
}

#[test]
fn test_compilation_is_deterministic() {
    let first = compile(FACTORIAL).to_json().unwrap();
    let second = compile(FACTORIAL).to_json().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_concurrent_compiles_agree() {
    let expected = compile(FACTORIAL).to_json().unwrap();
    let handles: Vec<_> = (0..8)
        .map(|_| thread::spawn(|| compile(FACTORIAL).to_json().unwrap()))
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_json_result_shape() {
    let json: serde_json::Value = serde_json::from_str(&compile(FACTORIAL).to_json().unwrap()).unwrap();
    for phase in ["lexical", "syntax", "semantic", "intermediate", "optimization", "codegen", "execution"] {
        assert_eq!(json[phase]["success"], true, "{} failed", phase);
    }
    assert!(json["intermediate"]["ir_code"][0].is_string());
    assert!(json["codegen"]["assembly_code"].as_array().unwrap().len() > 10);
    assert!(json["optimization"]["optimization_details"].is_object());
    assert_eq!(json["execution"]["output"], "Factorial of 5 is 120\n");
}

/// Выполнить программу до и после оптимизации и сравнить результаты.
fn assert_optimizer_preserves_behavior(source: &str) -> String {
    let config = CompilerConfig::default();
    let result = compile_with(source, &config);
    assert!(result.success(), "{:?}", result.diagnostics());

    let intermediate = result.intermediate.as_ref().unwrap();
    let original = sim::run(
        intermediate.program.as_ref().unwrap(),
        intermediate.cfg.as_ref().unwrap(),
        &config,
    );
    let optimization = result.optimization.as_ref().unwrap();
    let optimized = sim::run(&optimization.program, &optimization.cfg, &config);

    assert!(original.success, "{:?}", original.errors);
    assert_eq!(original.output, optimized.output, "optimized code changed the output");
    assert_eq!(original.exit_code, optimized.exit_code);
    optimized.output
}

#[test]
fn test_optimizer_preserves_large_constants() {
    let source = r#"
        int scale(int x) {
            return x * 4294967296;
        }

        int shifted(int x) {
            return x * 4294967304;
        }

        int main() {
            int x = 3;
            int y = x * 4294967296;
            printf("%d %d %d\n", scale(3), y, shifted(x));
            printf("%d\n", x + 4294967296);
            return 0;
        }
    "#;
    assert_eq!(assert_optimizer_preserves_behavior(source), "0 0 24\n3\n");
}

#[test]
fn test_optimizer_preserves_wrapping_and_identities() {
    let source = r#"
        int g = 7;

        int identities(int x) {
            int a = x * 1;
            int b = x * 0;
            int c = x / 1;
            int d = x - x;
            int e = 0 + x;
            int f = x - 0;
            return a + b + c + d + e + f;
        }

        int main() {
            int big = 2147483647;
            int wrapped = big + 1;
            int doubled = big * 2;
            int neg = -5;
            printf("%d %d %d\n", wrapped, doubled, neg * 8);
            printf("%d %d\n", identities(g), identities(-3));
            int sum = 0;
            for (int i = 0; i < 5; i++) {
                sum += i * 16 + g * 0;
            }
            print(sum);
            return sum % 7;
        }
    "#;
    assert_eq!(
        assert_optimizer_preserves_behavior(source),
        "-2147483648 -2 -40\n28 -12\n160\n"
    );
}
