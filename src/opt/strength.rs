//! Снижение стоимости целочисленных операций.
//!
//! - `x * 2^k` → `x << k`
//! - `x * 1`, `x + 0`, `x - 0` → `x`
//! - `x * 0`, `x - x` → `0`
//!
//! Для `float` ничего не меняется: `x * 0` там не обязательно ноль.
//! Константы сначала приводятся к 32-битному `int`, как при вычислении:
//! `x * 4294967296` это `x * 0`, а не `x << 32`.

use super::{OptRecord, Pass, PassContext};
use crate::ir::{BinOp, Const, Instr, Operand, Place};
use crate::types::Type;

pub struct StrengthReduction;

impl Pass for StrengthReduction {
    fn name(&self) -> &'static str {
        "strength_reduction"
    }

    fn run(&mut self, code: &mut Vec<Instr>, _ctx: &PassContext) -> Vec<OptRecord> {
        let mut records = Vec::new();
        for instr in code.iter_mut() {
            if let Some(reduced) = reduce(instr) {
                records.push(OptRecord::rewrite(&*instr, &reduced));
                *instr = reduced;
            }
        }
        records
    }
}

fn is_power_of_two(n: i64) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

fn log2_exact(n: i64) -> i64 {
    debug_assert!(is_power_of_two(n));
    i64::from(n.trailing_zeros())
}

/// Целая константа в том виде, в каком её увидит 32-битная арифметика.
fn int_const(operand: &Operand) -> Option<i64> {
    match operand {
        Operand::Const(Const::Int(n)) => Some(i64::from(*n as i32)),
        _ => None,
    }
}

fn copy(dest: &Place, src: Operand) -> Instr {
    Instr::Assign {
        dest: dest.clone(),
        src,
    }
}

fn reduce(instr: &Instr) -> Option<Instr> {
    let Instr::Binary {
        dest,
        op,
        lhs,
        rhs,
        ty: Type::Int,
    } = instr
    else {
        return None;
    };
    // Две константы уже свёрнуты или это деление на ноль
    if lhs.is_const() && rhs.is_const() {
        return None;
    }

    match op {
        BinOp::Mul => {
            let (value, factor) = match (int_const(lhs), int_const(rhs)) {
                (Some(c), None) => (rhs, c),
                (None, Some(c)) => (lhs, c),
                _ => return None,
            };
            match factor {
                0 => Some(copy(dest, Operand::int(0))),
                1 => Some(copy(dest, value.clone())),
                // После приведения к i32 показатель не больше 30
                c if is_power_of_two(c) => Some(Instr::Binary {
                    dest: dest.clone(),
                    op: BinOp::Shl,
                    lhs: value.clone(),
                    rhs: Operand::int(log2_exact(c)),
                    ty: Type::Int,
                }),
                _ => None,
            }
        }
        BinOp::Add => match (int_const(lhs), int_const(rhs)) {
            (Some(0), _) => Some(copy(dest, rhs.clone())),
            (_, Some(0)) => Some(copy(dest, lhs.clone())),
            _ => None,
        },
        BinOp::Sub => {
            if int_const(rhs) == Some(0) {
                Some(copy(dest, lhs.clone()))
            } else if lhs.as_place().is_some() && lhs == rhs {
                Some(copy(dest, Operand::int(0)))
            } else {
                None
            }
        }
        _ => None,
    }
}
