//! Устранение общих подвыражений внутри базового блока.
//!
//! Повторное вычисление `a op b` заменяется копией места, где результат
//! уже лежит. Запись в место делает недействительными все выражения,
//! которые его читают или в нём хранятся; вызов функции делает
//! недействительными выражения над глобальными переменными.

use std::collections::HashMap;

use super::{OptRecord, Pass, PassContext};
use crate::ir::{BinOp, Cfg, Instr, Operand, Place, UnOp};
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ExprKey {
    Binary(BinOp, String, String, Type),
    Unary(UnOp, String),
}

impl ExprKey {
    fn of(instr: &Instr) -> Option<ExprKey> {
        match instr {
            Instr::Binary {
                op, lhs, rhs, ty, ..
            } => {
                let (mut a, mut b) = (lhs.to_string(), rhs.to_string());
                if op.is_commutative() && b < a {
                    std::mem::swap(&mut a, &mut b);
                }
                Some(ExprKey::Binary(*op, a, b, *ty))
            }
            Instr::Unary { op, src, .. } => Some(ExprKey::Unary(*op, src.to_string())),
            _ => None,
        }
    }

    fn reads(&self, place: &str) -> bool {
        match self {
            ExprKey::Binary(_, a, b, _) => a == place || b == place,
            ExprKey::Unary(_, a) => a == place,
        }
    }
}

pub struct CommonSubexpressionElimination;

impl Pass for CommonSubexpressionElimination {
    fn name(&self) -> &'static str {
        "common_subexpression_elimination"
    }

    fn run(&mut self, code: &mut Vec<Instr>, ctx: &PassContext) -> Vec<OptRecord> {
        let mut records = Vec::new();
        let mut cfg = Cfg::build(code);
        for block in cfg.blocks.iter_mut() {
            eliminate_in_block(&mut block.instructions, ctx, &mut records);
        }
        *code = cfg.to_code();
        records
    }
}

fn eliminate_in_block(block: &mut [Instr], ctx: &PassContext, records: &mut Vec<OptRecord>) {
    let mut available: HashMap<ExprKey, Place> = HashMap::new();

    for instr in block.iter_mut() {
        let key = ExprKey::of(instr);

        if let (Some(key), Some(dest)) = (&key, instr.dest().cloned()) {
            if let Some(previous) = available.get(key) {
                let replacement = Instr::Assign {
                    dest,
                    src: Operand::Place(previous.clone()),
                };
                records.push(OptRecord::rewrite(&*instr, &replacement));
                *instr = replacement;
            }
        }

        if let Instr::Call { .. } = instr {
            available.retain(|key, _| !ctx.globals.iter().any(|g| key.reads(g)));
        }

        if let Some(dest) = instr.dest().cloned() {
            let name = dest.to_string();
            available.retain(|key, held| !key.reads(&name) && *held != dest);

            if let Some(key) = ExprKey::of(instr) {
                if !key.reads(&name) {
                    available.insert(key, dest);
                }
            }
        }
    }
}
