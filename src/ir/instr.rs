//! Трёхадресный код: операнды и инструкции.
//!
//! Текстовая форма инструкций (`t0 = a + b`, `if_false t0 goto L1`) и
//! есть их сериализованное представление.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::types::Type;

/// Константа. Значения `bool` представлены как `Int(0 | 1)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Const {
    /// Истинность в смысле C.
    pub fn is_truthy(&self) -> bool {
        match self {
            Const::Int(n) => *n != 0,
            Const::Float(x) => *x != 0.0,
            Const::Str(_) => true,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Const::Int(n) => *n == 0,
            Const::Float(x) => *x == 0.0,
            Const::Str(_) => false,
        }
    }

    /// Нулевое значение типа (инициализация по умолчанию).
    pub fn zero(ty: Type) -> Const {
        match ty {
            Type::Float => Const::Float(0.0),
            Type::String => Const::Str(String::new()),
            _ => Const::Int(0),
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Int(n) => write!(f, "{}", n),
            Const::Float(x) => write!(f, "{:?}", x),
            Const::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Место, куда можно записать значение: переменная или временная.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Place {
    Var(String),
    Temp(u32),
}

impl Place {
    pub fn is_temp(&self) -> bool {
        matches!(self, Place::Temp(_))
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Var(name) => write!(f, "{}", name),
            Place::Temp(n) => write!(f, "t{}", n),
        }
    }
}

/// Операнд инструкции.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Const(Const),
    Place(Place),
}

impl Operand {
    pub fn int(n: i64) -> Self {
        Operand::Const(Const::Int(n))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Operand::Place(Place::Var(name.into()))
    }

    pub fn temp(n: u32) -> Self {
        Operand::Place(Place::Temp(n))
    }

    pub fn as_const(&self) -> Option<&Const> {
        match self {
            Operand::Const(c) => Some(c),
            Operand::Place(_) => None,
        }
    }

    pub fn as_place(&self) -> Option<&Place> {
        match self {
            Operand::Place(p) => Some(p),
            Operand::Const(_) => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Operand::Const(_))
    }
}

impl From<Place> for Operand {
    fn from(place: Place) -> Self {
        Operand::Place(place)
    }
}

impl From<Const> for Operand {
    fn from(value: Const) -> Self {
        Operand::Const(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(c) => write!(f, "{}", c),
            Operand::Place(p) => write!(f, "{}", p),
        }
    }
}

/// Бинарные операции IR. `&&`/`||` сюда не попадают: они вычисляются
/// переходами.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
        }
    }

    pub fn is_commutative(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Mul | BinOp::Eq | BinOp::Ne)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    /// Может ли операция завершиться аварийно (деление на ноль).
    pub fn may_trap(self) -> bool {
        matches!(self, BinOp::Div | BinOp::Mod)
    }
}

/// Унарные операции IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
    /// int → float
    IntToFloat,
    /// float → int (усечение)
    FloatToInt,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::IntToFloat => "itof ",
            UnOp::FloatToInt => "ftoi ",
        }
    }
}

/// Инструкция трёхадресного кода.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Начало функции.
    Func { name: String, params: Vec<String> },
    Assign { dest: Place, src: Operand },
    /// `ty` — тип операндов (после неявных преобразований они совпадают).
    Binary {
        dest: Place,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
        ty: Type,
    },
    Unary { dest: Place, op: UnOp, src: Operand },
    Label(String),
    Jump(String),
    JumpIfFalse { cond: Operand, target: String },
    JumpIfTrue { cond: Operand, target: String },
    Param(Operand),
    Call {
        dest: Option<Place>,
        func: String,
        argc: usize,
    },
    Return(Option<Operand>),
}

impl Instr {
    /// Записываемое место, если есть.
    pub fn dest(&self) -> Option<&Place> {
        match self {
            Instr::Assign { dest, .. } | Instr::Binary { dest, .. } | Instr::Unary { dest, .. } => {
                Some(dest)
            }
            Instr::Call { dest, .. } => dest.as_ref(),
            _ => None,
        }
    }

    /// Читаемые операнды.
    pub fn uses(&self) -> Vec<&Operand> {
        match self {
            Instr::Assign { src, .. } | Instr::Unary { src, .. } => vec![src],
            Instr::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Instr::JumpIfFalse { cond, .. } | Instr::JumpIfTrue { cond, .. } => vec![cond],
            Instr::Param(value) => vec![value],
            Instr::Return(Some(value)) => vec![value],
            _ => Vec::new(),
        }
    }

    /// Изменяемые ссылки на читаемые операнды.
    pub fn uses_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Instr::Assign { src, .. } | Instr::Unary { src, .. } => vec![src],
            Instr::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Instr::JumpIfFalse { cond, .. } | Instr::JumpIfTrue { cond, .. } => vec![cond],
            Instr::Param(value) => vec![value],
            Instr::Return(Some(value)) => vec![value],
            _ => Vec::new(),
        }
    }

    /// Цель перехода.
    pub fn jump_target(&self) -> Option<&str> {
        match self {
            Instr::Jump(target)
            | Instr::JumpIfFalse { target, .. }
            | Instr::JumpIfTrue { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Безусловная передача управления: после неё поток не продолжается.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Instr::Jump(_) | Instr::Return(_))
    }

    /// Завершает ли инструкция базовый блок.
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            Instr::Jump(_) | Instr::JumpIfFalse { .. } | Instr::JumpIfTrue { .. } | Instr::Return(_)
        )
    }

    pub fn has_side_effects(&self) -> bool {
        match self {
            Instr::Assign { .. } | Instr::Unary { .. } => false,
            Instr::Binary { op, .. } => op.may_trap(),
            _ => true,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Func { name, params } => write!(f, "function {}({}):", name, params.join(", ")),
            Instr::Assign { dest, src } => write!(f, "{} = {}", dest, src),
            Instr::Binary {
                dest, op, lhs, rhs, ..
            } => write!(f, "{} = {} {} {}", dest, lhs, op.symbol(), rhs),
            Instr::Unary { dest, op, src } => write!(f, "{} = {}{}", dest, op.symbol(), src),
            Instr::Label(label) => write!(f, "{}:", label),
            Instr::Jump(target) => write!(f, "goto {}", target),
            Instr::JumpIfFalse { cond, target } => write!(f, "if_false {} goto {}", cond, target),
            Instr::JumpIfTrue { cond, target } => write!(f, "if_true {} goto {}", cond, target),
            Instr::Param(value) => write!(f, "param {}", value),
            Instr::Call {
                dest: Some(dest),
                func,
                argc,
            } => write!(f, "{} = call {}, {}", dest, func, argc),
            Instr::Call {
                dest: None,
                func,
                argc,
            } => write!(f, "call {}, {}", func, argc),
            Instr::Return(Some(value)) => write!(f, "return {}", value),
            Instr::Return(None) => write!(f, "return"),
        }
    }
}

impl Serialize for Instr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Отформатировать код построчно.
pub fn format_code(code: &[Instr]) -> String {
    let mut out = String::new();
    for instr in code {
        match instr {
            Instr::Func { .. } | Instr::Label(_) => out.push_str(&instr.to_string()),
            _ => {
                out.push_str("    ");
                out.push_str(&instr.to_string());
            }
        }
        out.push('\n');
    }
    out
}

/// Разрезать код на функции: каждая часть начинается с `Func`.
pub fn split_functions(code: &[Instr]) -> Vec<Vec<Instr>> {
    let mut parts: Vec<Vec<Instr>> = Vec::new();
    for instr in code {
        if matches!(instr, Instr::Func { .. }) || parts.is_empty() {
            parts.push(Vec::new());
        }
        if let Some(part) = parts.last_mut() {
            part.push(instr.clone());
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_text() {
        let add = Instr::Binary {
            dest: Place::Temp(0),
            op: BinOp::Add,
            lhs: Operand::var("a"),
            rhs: Operand::int(1),
            ty: Type::Int,
        };
        assert_eq!(add.to_string(), "t0 = a + 1");

        let conv = Instr::Unary {
            dest: Place::Temp(1),
            op: UnOp::IntToFloat,
            src: Operand::var("n"),
        };
        assert_eq!(conv.to_string(), "t1 = itof n");

        let jump = Instr::JumpIfFalse {
            cond: Operand::temp(0),
            target: "L2".to_string(),
        };
        assert_eq!(jump.to_string(), "if_false t0 goto L2");

        let call = Instr::Call {
            dest: None,
            func: "printf".to_string(),
            argc: 2,
        };
        assert_eq!(call.to_string(), "call printf, 2");
        assert_eq!(Operand::Const(Const::Float(14.0)).to_string(), "14.0");
        assert_eq!(Operand::Const(Const::Str("a\n".into())).to_string(), "\"a\\n\"");
    }

    #[test]
    fn test_uses_and_dest() {
        let instr = Instr::Binary {
            dest: Place::Var("x".into()),
            op: BinOp::Mul,
            lhs: Operand::temp(3),
            rhs: Operand::var("y"),
            ty: Type::Int,
        };
        assert_eq!(instr.dest(), Some(&Place::Var("x".into())));
        assert_eq!(instr.uses().len(), 2);
        assert!(!instr.has_side_effects());

        let div = Instr::Binary {
            dest: Place::Temp(0),
            op: BinOp::Div,
            lhs: Operand::var("a"),
            rhs: Operand::var("b"),
            ty: Type::Int,
        };
        assert!(div.has_side_effects());
    }

    #[test]
    fn test_serializes_as_text() {
        let json = serde_json::to_value(Instr::Return(Some(Operand::int(0)))).unwrap();
        assert_eq!(json, "return 0");
    }
}
