//! Распространение констант по графу потока управления.
//!
//! Прямой анализ потока данных внутри каждой функции. Факт — «место
//! содержит константу». Слияние на входе блока оставляет только факты,
//! одинаковые у всех обработанных предшественников. Вызов функции
//! уничтожает факты о глобальных переменных.

use std::collections::HashMap;

use super::{OptRecord, Pass, PassContext};
use crate::ir::{split_functions, Cfg, Const, Instr, Operand, Place};

type Facts = HashMap<Place, Const>;

pub struct ConstantPropagation;

impl Pass for ConstantPropagation {
    fn name(&self) -> &'static str {
        "constant_propagation"
    }

    fn run(&mut self, code: &mut Vec<Instr>, ctx: &PassContext) -> Vec<OptRecord> {
        let mut records = Vec::new();
        let mut out = Vec::with_capacity(code.len());
        for part in split_functions(code) {
            out.extend(propagate_function(&part, ctx, &mut records));
        }
        *code = out;
        records
    }
}

fn propagate_function(part: &[Instr], ctx: &PassContext, records: &mut Vec<OptRecord>) -> Vec<Instr> {
    let mut cfg = Cfg::build(part);
    let preds: Vec<Vec<usize>> = cfg
        .blocks
        .iter()
        .map(|b| {
            b.predecessors
                .iter()
                .filter_map(|label| cfg.block_index(label))
                .collect()
        })
        .collect();

    let mut outs: Vec<Option<Facts>> = vec![None; cfg.blocks.len()];
    loop {
        let mut changed = false;
        for (i, block) in cfg.blocks.iter().enumerate() {
            let Some(mut facts) = block_input(i, &preds, &outs) else {
                continue;
            };
            for instr in &block.instructions {
                transfer(instr, &mut facts, ctx);
            }
            if outs[i].as_ref() != Some(&facts) {
                outs[i] = Some(facts);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for i in 0..cfg.blocks.len() {
        let Some(mut facts) = block_input(i, &preds, &outs) else {
            continue;
        };
        for instr in cfg.blocks[i].instructions.iter_mut() {
            let original = instr.to_string();
            let mut touched = false;
            for operand in instr.uses_mut() {
                if let Operand::Place(place) = operand {
                    if let Some(value) = facts.get(place) {
                        *operand = Operand::Const(value.clone());
                        touched = true;
                    }
                }
            }
            if touched {
                records.push(OptRecord::rewrite(original, &*instr));
            }
            transfer(instr, &mut facts, ctx);
        }
    }

    cfg.to_code()
}

/// Факты на входе блока; `None` — блок ещё не достигнут анализом.
fn block_input(i: usize, preds: &[Vec<usize>], outs: &[Option<Facts>]) -> Option<Facts> {
    if i == 0 {
        return Some(Facts::new());
    }
    let mut known = preds[i].iter().filter_map(|&p| outs[p].as_ref());
    let mut facts = known.next()?.clone();
    for other in known {
        facts.retain(|place, value| other.get(place) == Some(value));
    }
    Some(facts)
}

fn transfer(instr: &Instr, facts: &mut Facts, ctx: &PassContext) {
    match instr {
        Instr::Assign { dest, src } => {
            let value = match src {
                Operand::Const(c) => Some(c.clone()),
                Operand::Place(p) => facts.get(p).cloned(),
            };
            match value.filter(trackable) {
                Some(value) => {
                    facts.insert(dest.clone(), value);
                }
                None => {
                    facts.remove(dest);
                }
            }
        }
        Instr::Call { dest, .. } => {
            facts.retain(|place, _| !matches!(place, Place::Var(name) if ctx.is_global(name)));
            if let Some(dest) = dest {
                facts.remove(dest);
            }
        }
        other => {
            if let Some(dest) = other.dest() {
                facts.remove(dest);
            }
        }
    }
}

// NaN не равен сам себе: такой факт не даст анализу сойтись
fn trackable(value: &Const) -> bool {
    !matches!(value, Const::Float(x) if x.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrProgram;
    use crate::opt::test_support::{ir_of, text};

    fn run(program: &IrProgram) -> (Vec<String>, Vec<OptRecord>) {
        let mut code = program.code.clone();
        let records = ConstantPropagation.run(&mut code, &PassContext::new(program));
        (text(&code), records)
    }

    #[test]
    fn test_straight_line_propagation() {
        let program = ir_of("int main() { int a = 5; int b = a + 1; return b; }");
        let (code, records) = run(&program);
        assert!(code.contains(&"t0 = 5 + 1".to_string()), "{:?}", code);
        assert!(records
            .iter()
            .any(|r| r.original == "t0 = a + 1" && r.optimized == "t0 = 5 + 1"));
    }

    #[test]
    fn test_loop_variable_is_not_constant() {
        let program = ir_of("int main() { int i = 0; while (i < 10) { i = i + 1; } return i; }");
        let (code, _) = run(&program);
        assert!(code.contains(&"t0 = i < 10".to_string()), "{:?}", code);
        assert!(code.contains(&"return i".to_string()));
    }

    #[test]
    fn test_merge_keeps_agreeing_facts() {
        let program = ir_of(
            "int f(int c) { int x = 0; if (c > 0) { x = 1; } else { x = 1; } return x; }\n\
             int g(int c) { int x = 0; if (c > 0) { x = 1; } else { x = 2; } return x; }",
        );
        let (code, _) = run(&program);
        let g = code.iter().position(|l| l == "function g(c):").unwrap();
        assert!(code[..g].contains(&"return 1".to_string()), "{:?}", code);
        assert!(code[g..].contains(&"return x".to_string()), "{:?}", code);
    }

    #[test]
    fn test_call_kills_globals() {
        let program = ir_of(
            "int g = 1;\nvoid bump() { g = g + 1; }\nint main() { g = 5; bump(); return g; }",
        );
        let (code, _) = run(&program);
        assert!(code.contains(&"return g".to_string()), "{:?}", code);
    }
}
