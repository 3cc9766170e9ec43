//! Вычисление операций над константами.
//!
//! Одни и те же функции использует свёртка констант и симулятор, поэтому
//! оптимизированная программа ведёт себя так же, как исходная.
//! Целые имеют семантику 32-битного `int` с переполнением по модулю.

use thiserror::Error;

use super::instr::{BinOp, Const, UnOp};

/// Ошибка вычисления.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("operation '{op}' is not defined for {operands}")]
    TypeMismatch { op: &'static str, operands: String },
}

fn bool_const(b: bool) -> Const {
    Const::Int(i64::from(b))
}

/// Вычислить бинарную операцию.
pub fn eval_binary(op: BinOp, lhs: &Const, rhs: &Const) -> Result<Const, EvalError> {
    match (lhs, rhs) {
        (Const::Int(a), Const::Int(b)) => eval_int(op, *a as i32, *b as i32),
        (Const::Float(a), Const::Float(b)) => eval_float(op, *a, *b),
        (Const::Int(a), Const::Float(b)) => eval_float(op, *a as f64, *b),
        (Const::Float(a), Const::Int(b)) => eval_float(op, *a, *b as f64),
        (Const::Str(a), Const::Str(b)) => {
            let result = match op {
                BinOp::Eq => a == b,
                BinOp::Ne => a != b,
                BinOp::Lt => a < b,
                BinOp::Gt => a > b,
                BinOp::Le => a <= b,
                BinOp::Ge => a >= b,
                _ => return Err(mismatch(op, lhs, rhs)),
            };
            Ok(bool_const(result))
        }
        _ => Err(mismatch(op, lhs, rhs)),
    }
}

fn mismatch(op: BinOp, lhs: &Const, rhs: &Const) -> EvalError {
    EvalError::TypeMismatch {
        op: op.symbol(),
        operands: format!("{} and {}", lhs, rhs),
    }
}

fn eval_int(op: BinOp, a: i32, b: i32) -> Result<Const, EvalError> {
    let value = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div if b == 0 => return Err(EvalError::DivisionByZero),
        BinOp::Div => a.wrapping_div(b),
        BinOp::Mod if b == 0 => return Err(EvalError::DivisionByZero),
        BinOp::Mod => a.wrapping_rem(b),
        BinOp::Shl => a.wrapping_shl(b as u32),
        BinOp::Shr => a.wrapping_shr(b as u32),
        BinOp::Eq => return Ok(bool_const(a == b)),
        BinOp::Ne => return Ok(bool_const(a != b)),
        BinOp::Lt => return Ok(bool_const(a < b)),
        BinOp::Gt => return Ok(bool_const(a > b)),
        BinOp::Le => return Ok(bool_const(a <= b)),
        BinOp::Ge => return Ok(bool_const(a >= b)),
    };
    Ok(Const::Int(i64::from(value)))
}

fn eval_float(op: BinOp, a: f64, b: f64) -> Result<Const, EvalError> {
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div if b == 0.0 => return Err(EvalError::DivisionByZero),
        BinOp::Div => a / b,
        BinOp::Eq => return Ok(bool_const(a == b)),
        BinOp::Ne => return Ok(bool_const(a != b)),
        BinOp::Lt => return Ok(bool_const(a < b)),
        BinOp::Gt => return Ok(bool_const(a > b)),
        BinOp::Le => return Ok(bool_const(a <= b)),
        BinOp::Ge => return Ok(bool_const(a >= b)),
        BinOp::Mod | BinOp::Shl | BinOp::Shr => {
            return Err(EvalError::TypeMismatch {
                op: op.symbol(),
                operands: "float operands".to_string(),
            })
        }
    };
    Ok(Const::Float(value))
}

/// Вычислить унарную операцию.
pub fn eval_unary(op: UnOp, value: &Const) -> Result<Const, EvalError> {
    match (op, value) {
        (UnOp::Neg, Const::Int(n)) => Ok(Const::Int(i64::from((*n as i32).wrapping_neg()))),
        (UnOp::Neg, Const::Float(x)) => Ok(Const::Float(-x)),
        (UnOp::Not, value @ (Const::Int(_) | Const::Float(_))) => Ok(bool_const(!value.is_truthy())),
        (UnOp::IntToFloat, Const::Int(n)) => Ok(Const::Float(*n as f64)),
        (UnOp::IntToFloat, Const::Float(x)) => Ok(Const::Float(*x)),
        (UnOp::FloatToInt, Const::Float(x)) => Ok(Const::Int(i64::from(*x as i32))),
        (UnOp::FloatToInt, Const::Int(n)) => Ok(Const::Int(*n)),
        _ => Err(EvalError::TypeMismatch {
            op: op.symbol().trim(),
            operands: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_arithmetic_wraps_like_c_int() {
        assert_eq!(
            eval_binary(BinOp::Add, &Const::Int(i32::MAX as i64), &Const::Int(1)),
            Ok(Const::Int(i32::MIN as i64))
        );
        assert_eq!(eval_binary(BinOp::Div, &Const::Int(-7), &Const::Int(2)), Ok(Const::Int(-3)));
        assert_eq!(eval_binary(BinOp::Mod, &Const::Int(-7), &Const::Int(2)), Ok(Const::Int(-1)));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            eval_binary(BinOp::Div, &Const::Int(1), &Const::Int(0)),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(
            eval_binary(BinOp::Mod, &Const::Int(1), &Const::Int(0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn test_comparisons_produce_int_bools() {
        assert_eq!(eval_binary(BinOp::Lt, &Const::Int(1), &Const::Int(2)), Ok(Const::Int(1)));
        assert_eq!(
            eval_binary(BinOp::Ge, &Const::Float(1.5), &Const::Float(2.0)),
            Ok(Const::Int(0))
        );
        assert_eq!(
            eval_binary(BinOp::Eq, &Const::Str("a".into()), &Const::Str("a".into())),
            Ok(Const::Int(1))
        );
    }

    #[test]
    fn test_unary_conversions() {
        assert_eq!(eval_unary(UnOp::IntToFloat, &Const::Int(3)), Ok(Const::Float(3.0)));
        assert_eq!(eval_unary(UnOp::FloatToInt, &Const::Float(-2.7)), Ok(Const::Int(-2)));
        assert_eq!(eval_unary(UnOp::Not, &Const::Int(5)), Ok(Const::Int(0)));
        assert!(eval_unary(UnOp::Neg, &Const::Str("s".into())).is_err());
    }
}
