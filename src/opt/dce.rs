//! Удаление мёртвого кода.
//!
//! Три вида мусора в пределах функции:
//! - блоки, недостижимые от входа функции (в том числе код после `return`
//!   и `goto`);
//! - переходы на метку, стоящую сразу за ними;
//! - определения локальных мест, которые нигде не читаются.
//!
//! Вызовы и деления остаются всегда: у них есть побочный эффект (вывод,
//! ошибка деления на ноль). У вызова с неиспользуемым результатом
//! отбрасывается только приёмник. Запись в глобальную переменную
//! наблюдаема и не удаляется.

use std::collections::HashSet;

use super::{OptRecord, Pass, PassContext};
use crate::ir::{split_functions, Cfg, Instr, Operand, Place};

pub struct DeadCodeElimination;

impl Pass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead_code_elimination"
    }

    fn run(&mut self, code: &mut Vec<Instr>, ctx: &PassContext) -> Vec<OptRecord> {
        let mut records = Vec::new();
        let mut out = Vec::with_capacity(code.len());
        for part in split_functions(code) {
            let part = remove_unreachable(&part, &mut records);
            let part = remove_redundant_jumps(part, &mut records);
            out.extend(remove_unused(part, ctx, &mut records));
        }
        *code = out;
        records
    }
}

fn remove_unreachable(part: &[Instr], records: &mut Vec<OptRecord>) -> Vec<Instr> {
    let cfg = Cfg::build(part);
    let mut kept = Vec::with_capacity(part.len());
    for (i, block) in cfg.blocks.iter().enumerate() {
        if i == 0 || block.reachable {
            kept.extend(block.instructions.iter().cloned());
            continue;
        }
        for instr in &block.instructions {
            if !matches!(instr, Instr::Label(_)) {
                records.push(OptRecord::removed(instr, "unreachable"));
            }
        }
    }
    kept
}

fn remove_redundant_jumps(part: Vec<Instr>, records: &mut Vec<OptRecord>) -> Vec<Instr> {
    let mut kept = Vec::with_capacity(part.len());
    let mut iter = part.into_iter().peekable();
    while let Some(instr) = iter.next() {
        if let (Instr::Jump(target), Some(Instr::Label(next))) = (&instr, iter.peek()) {
            if target == next {
                records.push(OptRecord::removed(&instr, "jump to next instruction"));
                continue;
            }
        }
        kept.push(instr);
    }
    kept
}

fn remove_unused(mut part: Vec<Instr>, ctx: &PassContext, records: &mut Vec<OptRecord>) -> Vec<Instr> {
    let local = |place: &Place| match place {
        Place::Temp(_) => true,
        Place::Var(name) => !ctx.is_global(name),
    };

    loop {
        let used: HashSet<Place> = part
            .iter()
            .flat_map(|instr| instr.uses())
            .filter_map(Operand::as_place)
            .cloned()
            .collect();

        let mut changed = false;
        let mut kept = Vec::with_capacity(part.len());
        for mut instr in part {
            let dead = instr.dest().is_some_and(|d| local(d) && !used.contains(d));
            if !dead {
                kept.push(instr);
                continue;
            }
            let original = instr.to_string();
            if let Instr::Call { dest, .. } = &mut instr {
                *dest = None;
                records.push(OptRecord::rewrite(original, &instr));
                kept.push(instr);
                changed = true;
            } else if instr.has_side_effects() {
                kept.push(instr);
            } else {
                records.push(OptRecord::removed(original, "unused"));
                changed = true;
            }
        }
        part = kept;
        if !changed {
            return part;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrProgram;
    use crate::opt::test_support::{ir_of, text};

    fn run(program: &IrProgram) -> (Vec<String>, Vec<OptRecord>) {
        let mut code = program.code.clone();
        let records = DeadCodeElimination.run(&mut code, &PassContext::new(program));
        (text(&code), records)
    }

    #[test]
    fn test_unused_chain_is_removed() {
        let program = ir_of("int main() { int a = 1; int b = a + 2; int c = b * 3; return a; }");
        let (code, _) = run(&program);
        assert!(!code.iter().any(|l| l.starts_with("c =") || l.starts_with("b =")), "{:?}", code);
        assert!(!code.iter().any(|l| l.contains('+') || l.contains('*')), "{:?}", code);
        assert!(code.contains(&"a = 1".to_string()));
    }

    #[test]
    fn test_call_kept_without_destination() {
        let program = ir_of("int f() { return 1; }\nint main() { f(); return 0; }");
        let (code, records) = run(&program);
        assert!(code.contains(&"call f, 0".to_string()), "{:?}", code);
        assert!(records.iter().any(|r| r.optimized == "call f, 0"));
    }

    #[test]
    fn test_code_after_return_is_removed() {
        let program = ir_of("int main() { return 1; print(2); }");
        let (code, records) = run(&program);
        assert!(!code.contains(&"param 2".to_string()), "{:?}", code);
        assert!(records.iter().any(|r| r.original == "call print, 1"));
    }

    #[test]
    fn test_division_and_globals_survive() {
        let program =
            ir_of("int g;\nint main() { int a = 1; int b = 0; int c = a / b; g = 3; return 0; }");
        let (code, _) = run(&program);
        assert!(code.contains(&"t0 = a / b".to_string()), "{:?}", code);
        assert!(code.contains(&"g = 3".to_string()));
        assert!(!code.contains(&"c = t0".to_string()));
    }

    #[test]
    fn test_jump_to_next_label_is_removed() {
        let code = vec![
            Instr::Func {
                name: "main".into(),
                params: Vec::new(),
            },
            Instr::Jump("L0".into()),
            Instr::Label("L0".into()),
            Instr::Return(None),
        ];
        let mut records = Vec::new();
        let code = remove_redundant_jumps(code, &mut records);
        assert_eq!(text(&code), vec!["function main():", "L0:", "return"]);
        assert_eq!(records.len(), 1);
    }
}
