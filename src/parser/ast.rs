//! Абстрактное синтаксическое дерево (AST) подмножества C.
//!
//! Каждый узел владеет своими детьми; общих и циклических узлов нет.
//! Порядок детей значим (условие, then-ветка, else-ветка).
//! Слот `ty` у выражений заполняет семантический анализ.

use serde::Serialize;

use crate::lexer::token::Span;
use crate::types::Type;

/// Корень дерева.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub items: Vec<Item>,
}

/// Элемент верхнего уровня.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "item")]
pub enum Item {
    FunctionDecl(FunctionDecl),
    /// Глобальная переменная
    VarDecl(VarDecl),
    /// Оператор вне функции (режим «скрипта»)
    Statement(Stmt),
}

/// Объявление или определение функции.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Param>,
    /// `None` для прототипа `int f(int);`
    pub body: Option<Block>,
    pub span: Span,
}

/// Параметр функции.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

/// Объявление переменной с необязательным инициализатором.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
    pub init: Option<Expr>,
    pub span: Span,
}

/// Блок `{ ... }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Оператор.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stmt")]
pub enum Stmt {
    VarDecl(VarDecl),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    Block(Block),
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    /// Выражение как оператор: `f(x);`, `x = 1;`
    Expr(Expr),
}

impl Stmt {
    /// Получить Span оператора.
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl(decl) => decl.span,
            Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span } => *span,
            Stmt::Block(block) => block.span,
            Stmt::Expr(expr) => expr.span,
        }
    }
}

/// Выражение с позицией и (после семантики) типом.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            ty: None,
        }
    }

    /// Тип после семантического анализа (`int`, если анализ не дошёл).
    pub fn ty(&self) -> Type {
        self.ty.unwrap_or(Type::Int)
    }
}

/// Виды выражений.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "expr")]
pub enum ExprKind {
    Literal {
        value: Literal,
    },
    Identifier {
        name: String,
    },
    BinaryExpr {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    UnaryExpr {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Явное приведение `(int) x`
    Cast {
        target: Type,
        operand: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    Assignment {
        target: String,
        value: Box<Expr>,
    },
    /// `x++`, `--x`: `delta` = ±1, `postfix` — вернуть старое значение
    Update {
        target: String,
        delta: i64,
        postfix: bool,
    },
}

/// Литерал.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Int(_) => Type::Int,
            Literal::Float(_) => Type::Float,
            Literal::Bool(_) => Type::Bool,
            Literal::Str(_) => Type::String,
        }
    }
}

/// Бинарные операторы.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Mod,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Унарные операторы.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnaryOp {
    #[serde(rename = "-")]
    Neg,
    #[serde(rename = "!")]
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}
