//! Свёртка констант.
//!
//! Операции над константами вычисляются заранее. Временная переменная,
//! получившая константу, подставляется во все последующие использования:
//! временные определяются ровно один раз, и определение предшествует
//! любому чтению. Поэтому `2 + 3 * 4` сворачивается до `14` за один проход.
//!
//! Условные переходы по константе превращаются в `goto` или исчезают.
//! Деление на ноль не сворачивается: ошибка остаётся до выполнения.

use std::collections::HashMap;

use super::{OptRecord, Pass, PassContext};
use crate::ir::eval::{eval_binary, eval_unary};
use crate::ir::{Const, Instr, Operand, Place};

pub struct ConstantFolding;

impl Pass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant_folding"
    }

    fn run(&mut self, code: &mut Vec<Instr>, _ctx: &PassContext) -> Vec<OptRecord> {
        let mut records = Vec::new();
        let mut known: HashMap<u32, Const> = HashMap::new();
        let mut folded = Vec::with_capacity(code.len());

        for instr in code.drain(..) {
            let original = instr.to_string();
            let mut instr = instr;

            for operand in instr.uses_mut() {
                if let Operand::Place(Place::Temp(t)) = operand {
                    if let Some(value) = known.get(t) {
                        *operand = Operand::Const(value.clone());
                    }
                }
            }

            let replacement = match fold(&instr) {
                Folded::Keep => Some(instr),
                Folded::Replace(new) => Some(new),
                Folded::Remove => None,
            };

            match replacement {
                Some(instr) => {
                    if let Instr::Assign {
                        dest: Place::Temp(t),
                        src: Operand::Const(value),
                    } = &instr
                    {
                        known.insert(*t, value.clone());
                    }
                    let text = instr.to_string();
                    if text != original {
                        records.push(OptRecord::rewrite(&original, &text));
                    }
                    folded.push(instr);
                }
                None => records.push(OptRecord::removed(&original, "condition is always true")),
            }
        }

        *code = folded;
        records
    }
}

enum Folded {
    Keep,
    Replace(Instr),
    Remove,
}

fn fold(instr: &Instr) -> Folded {
    match instr {
        Instr::Binary {
            dest,
            op,
            lhs: Operand::Const(a),
            rhs: Operand::Const(b),
            ..
        } => match eval_binary(*op, a, b) {
            Ok(value) => Folded::Replace(Instr::Assign {
                dest: dest.clone(),
                src: Operand::Const(value),
            }),
            Err(_) => Folded::Keep,
        },
        Instr::Unary {
            dest,
            op,
            src: Operand::Const(value),
        } => match eval_unary(*op, value) {
            Ok(value) => Folded::Replace(Instr::Assign {
                dest: dest.clone(),
                src: Operand::Const(value),
            }),
            Err(_) => Folded::Keep,
        },
        Instr::JumpIfFalse {
            cond: Operand::Const(c),
            target,
        } => {
            if c.is_truthy() {
                Folded::Remove
            } else {
                Folded::Replace(Instr::Jump(target.clone()))
            }
        }
        Instr::JumpIfTrue {
            cond: Operand::Const(c),
            target,
        } => {
            if c.is_truthy() {
                Folded::Replace(Instr::Jump(target.clone()))
            } else {
                Folded::Remove
            }
        }
        _ => Folded::Keep,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BinOp;
    use crate::opt::test_support::{ir_of, text};
    use crate::types::Type;

    fn run(code: &mut Vec<Instr>) -> Vec<OptRecord> {
        let ctx = PassContext {
            globals: Default::default(),
        };
        ConstantFolding.run(code, &ctx)
    }

    #[test]
    fn test_nested_constants_fold_in_one_pass() {
        let mut code = ir_of("int main() { int x = 2 + 3 * 4; return x; }").code;
        let records = run(&mut code);
        let lines = text(&code);
        assert!(lines.contains(&"t0 = 12".to_string()), "{:?}", lines);
        assert!(lines.contains(&"t1 = 14".to_string()), "{:?}", lines);
        assert!(lines.contains(&"x = 14".to_string()), "{:?}", lines);
        assert!(records
            .iter()
            .any(|r| r.original == "t1 = 2 + t0" && r.optimized == "t1 = 14"));
    }

    #[test]
    fn test_division_by_zero_is_not_folded() {
        let mut code = vec![Instr::Binary {
            dest: Place::Temp(0),
            op: BinOp::Div,
            lhs: Operand::int(1),
            rhs: Operand::int(0),
            ty: Type::Int,
        }];
        let records = run(&mut code);
        assert!(records.is_empty());
        assert_eq!(code[0].to_string(), "t0 = 1 / 0");
    }

    #[test]
    fn test_constant_branches() {
        let mut code = vec![
            Instr::JumpIfFalse {
                cond: Operand::int(1),
                target: "L0".into(),
            },
            Instr::JumpIfFalse {
                cond: Operand::int(0),
                target: "L1".into(),
            },
        ];
        let records = run(&mut code);
        assert_eq!(text(&code), vec!["goto L1"]);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_variables_are_left_alone() {
        let mut code = ir_of("int main() { int a = 3; int b = a * 2; return b; }").code;
        run(&mut code);
        assert!(text(&code).contains(&"t0 = a * 2".to_string()));
    }
}
