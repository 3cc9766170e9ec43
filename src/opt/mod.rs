//! Оптимизатор трёхадресного кода.
//!
//! Пять проходов в фиксированном порядке, каждый запускается один раз:
//! свёртка констант, распространение констант, удаление мёртвого кода,
//! устранение общих подвыражений, снижение стоимости операций.
//! Каждый проход записывает пары (было, стало).

pub mod cse;
pub mod dce;
pub mod fold;
pub mod propagate;
pub mod strength;

pub use cse::CommonSubexpressionElimination;
pub use dce::DeadCodeElimination;
pub use fold::ConstantFolding;
pub use propagate::ConstantPropagation;
pub use strength::StrengthReduction;

use std::collections::HashSet;

use log::debug;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::ir::{Cfg, Instr, IrProgram};

/// Одна перезапись, выполненная проходом.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptRecord {
    pub original: String,
    pub optimized: String,
}

impl OptRecord {
    pub fn rewrite(original: impl ToString, optimized: impl ToString) -> Self {
        Self {
            original: original.to_string(),
            optimized: optimized.to_string(),
        }
    }

    pub fn removed(original: impl ToString, reason: &str) -> Self {
        Self {
            original: original.to_string(),
            optimized: format!("eliminated ({})", reason),
        }
    }
}

/// Записи всех проходов в порядке их запуска.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizationDetails {
    passes: Vec<(&'static str, Vec<OptRecord>)>,
}

impl OptimizationDetails {
    pub fn get(&self, pass: &str) -> &[OptRecord] {
        self.passes
            .iter()
            .find(|(name, _)| *name == pass)
            .map(|(_, records)| records.as_slice())
            .unwrap_or(&[])
    }

    pub fn total(&self) -> usize {
        self.passes.iter().map(|(_, r)| r.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[OptRecord])> {
        self.passes.iter().map(|(name, r)| (*name, r.as_slice()))
    }
}

impl Serialize for OptimizationDetails {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.passes.len()))?;
        for (name, records) in &self.passes {
            map.serialize_entry(name, records)?;
        }
        map.end()
    }
}

/// Что проходам известно о программе помимо кода.
pub struct PassContext {
    /// Имена глобальных переменных: их меняют вызовы, и запись в них
    /// наблюдаема.
    pub globals: HashSet<String>,
}

impl PassContext {
    pub fn new(program: &IrProgram) -> Self {
        Self {
            globals: program.globals.iter().map(|g| g.name.clone()).collect(),
        }
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }
}

/// Проход оптимизатора.
///
/// Проход детерминирован: одинаковый вход даёт одинаковый выход.
pub trait Pass {
    /// Ключ в `optimization_details`.
    fn name(&self) -> &'static str;

    fn run(&mut self, code: &mut Vec<Instr>, ctx: &PassContext) -> Vec<OptRecord>;
}

/// Результат оптимизации.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub success: bool,
    pub original_code: Vec<Instr>,
    pub optimized_code: Vec<Instr>,
    pub optimization_details: OptimizationDetails,
    /// Граф оптимизированного кода.
    pub cfg: Cfg,
    #[serde(skip)]
    pub program: IrProgram,
}

/// Последовательность проходов.
pub struct Optimizer {
    passes: Vec<Box<dyn Pass>>,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    /// Стандартный порядок проходов.
    pub fn new() -> Self {
        Self {
            passes: vec![
                Box::new(ConstantFolding),
                Box::new(ConstantPropagation),
                Box::new(DeadCodeElimination),
                Box::new(CommonSubexpressionElimination),
                Box::new(StrengthReduction),
            ],
        }
    }

    pub fn run(&mut self, program: &IrProgram) -> OptimizationResult {
        let ctx = PassContext::new(program);
        let mut code = program.code.clone();
        let mut details = OptimizationDetails::default();

        for pass in self.passes.iter_mut() {
            let records = pass.run(&mut code, &ctx);
            debug!("opt: {} made {} rewrites", pass.name(), records.len());
            details.passes.push((pass.name(), records));
        }

        let cfg = Cfg::build(&code);
        let mut optimized = program.clone();
        optimized.code = code.clone();

        OptimizationResult {
            success: true,
            original_code: program.code.clone(),
            optimized_code: code,
            optimization_details: details,
            cfg,
            program: optimized,
        }
    }
}

/// Оптимизировать программу стандартным набором проходов.
pub fn optimize(program: &IrProgram) -> OptimizationResult {
    Optimizer::new().run(program)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::ir::{generate, IrProgram};
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use crate::semantic::analyze;

    /// Исходник → IR без оптимизаций.
    pub fn ir_of(source: &str) -> IrProgram {
        let lexed = tokenize(source);
        let parsed = parse(&lexed.tokens, lexed.eof);
        assert!(parsed.success, "syntax errors: {:?}", parsed.errors);
        let semantic = analyze(parsed.ast.as_ref().unwrap());
        assert!(semantic.success, "semantic errors: {:?}", semantic.errors);
        let ir = generate(semantic.program.as_ref().unwrap());
        assert!(ir.success, "ir errors: {:?}", ir.errors);
        ir.program.unwrap()
    }

    pub fn text(code: &[crate::ir::Instr]) -> Vec<String> {
        code.iter().map(|i| i.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{ir_of, text};
    use super::*;

    #[test]
    fn test_constant_expression_ends_as_literal() {
        let program = ir_of("int main() { int x = 2 + 3 * 4; print(x); return 0; }");
        let result = optimize(&program);
        let code = text(&result.optimized_code);
        assert!(code.contains(&"param 14".to_string()), "{:?}", code);
        assert!(!code.iter().any(|l| l.contains('*')));
    }

    #[test]
    fn test_details_keys_in_pass_order() {
        let program = ir_of("int main() { return 0; }");
        let result = optimize(&program);
        let json = serde_json::to_value(&result).unwrap();
        let keys: Vec<&String> = json["optimization_details"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(keys.len(), 5);
        let names: Vec<&str> = result.optimization_details.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "constant_folding",
                "constant_propagation",
                "dead_code_elimination",
                "common_subexpression_elimination",
                "strength_reduction"
            ]
        );
        assert!(json.get("program").is_none());
    }

    #[test]
    fn test_split_functions() {
        let program = ir_of("int f() { return 1; }\nint main() { return f(); }");
        let parts = crate::ir::split_functions(&program.code);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| matches!(p[0], Instr::Func { .. })));
    }
}
