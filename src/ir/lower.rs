//! Понижение аннотированного AST в трёхадресный код.
//!
//! Каждая арифметическая операция получает ровно одну свежую временную;
//! присваивания копируют значение в переменную. `&&` и `||` вычисляются
//! сокращённо, переходами.

use std::collections::HashMap;

use log::trace;

use super::error::IrError;
use super::eval::{eval_binary, eval_unary};
use super::instr::{BinOp, Const, Instr, Operand, Place, UnOp};
use super::START_FUNCTION;
use crate::parser::ast::{BinaryOp, Expr, ExprKind, Item, Literal, Program, Stmt, UnaryOp, VarDecl};
use crate::types::{FunctionSig, Type};

const RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 2 * 1024 * 1024;

/// Глобальная переменная.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    pub name: String,
    pub ty: Type,
    /// Значение инициализатора, если он константный.
    pub init: Option<Const>,
}

/// Сведения о функции, нужные генератору кода и симулятору.
#[derive(Debug, Clone, PartialEq)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<String>,
    pub return_type: Type,
    /// Параметры и локальные переменные с типами.
    pub vars: HashMap<String, Type>,
}

impl IrFunction {
    fn new(name: impl Into<String>, return_type: Type) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type,
            vars: HashMap::new(),
        }
    }
}

/// Программа в трёхадресном коде.
#[derive(Debug, Clone, PartialEq)]
pub struct IrProgram {
    pub code: Vec<Instr>,
    pub globals: Vec<GlobalVar>,
    pub functions: Vec<IrFunction>,
    pub temp_count: u32,
}

impl IrProgram {
    pub fn function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalVar> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Тип переменной в контексте функции (локальные, затем глобальные).
    pub fn var_type(&self, function: &str, name: &str) -> Option<Type> {
        self.function(function)
            .and_then(|f| f.vars.get(name).copied())
            .or_else(|| self.global(name).map(|g| g.ty))
    }
}

struct LoopLabels {
    continue_label: String,
    break_label: String,
}

/// Генератор трёхадресного кода.
pub struct Lowerer {
    code: Vec<Instr>,
    next_temp: u32,
    next_label: u32,
    next_flag: u32,
    errors: Vec<IrError>,
    loops: Vec<LoopLabels>,
    globals: HashMap<String, Type>,
    signatures: HashMap<String, FunctionSig>,
    function: IrFunction,
    functions: Vec<IrFunction>,
}

impl Default for Lowerer {
    fn default() -> Self {
        Self::new()
    }
}

fn binary_op(op: BinaryOp) -> Option<BinOp> {
    let op = match op {
        BinaryOp::Add => BinOp::Add,
        BinaryOp::Sub => BinOp::Sub,
        BinaryOp::Mul => BinOp::Mul,
        BinaryOp::Div => BinOp::Div,
        BinaryOp::Mod => BinOp::Mod,
        BinaryOp::Eq => BinOp::Eq,
        BinaryOp::Ne => BinOp::Ne,
        BinaryOp::Lt => BinOp::Lt,
        BinaryOp::Gt => BinOp::Gt,
        BinaryOp::Le => BinOp::Le,
        BinaryOp::Ge => BinOp::Ge,
        BinaryOp::And | BinaryOp::Or => return None,
    };
    Some(op)
}

fn unary_op(op: UnaryOp) -> UnOp {
    match op {
        UnaryOp::Neg => UnOp::Neg,
        UnaryOp::Not => UnOp::Not,
    }
}

fn literal(value: &Literal) -> Const {
    match value {
        Literal::Int(n) => Const::Int(*n),
        Literal::Float(x) => Const::Float(*x),
        Literal::Bool(b) => Const::Int(i64::from(*b)),
        Literal::Str(s) => Const::Str(s.clone()),
    }
}

/// Значение выражения, если оно вычислимо без выполнения программы.
pub fn const_value(expr: &Expr) -> Option<Const> {
    match &expr.kind {
        ExprKind::Literal { value } => Some(literal(value)),
        ExprKind::UnaryExpr { op, operand } => {
            eval_unary(unary_op(*op), &const_value(operand)?).ok()
        }
        ExprKind::BinaryExpr { op, lhs, rhs } => {
            let lhs = const_value(lhs)?;
            let rhs = const_value(rhs)?;
            match binary_op(*op) {
                Some(op) => eval_binary(op, &lhs, &rhs).ok(),
                None if *op == BinaryOp::And => {
                    Some(Const::Int(i64::from(lhs.is_truthy() && rhs.is_truthy())))
                }
                None => Some(Const::Int(i64::from(lhs.is_truthy() || rhs.is_truthy()))),
            }
        }
        ExprKind::Cast { target, operand } => {
            let value = const_value(operand)?;
            match target {
                Type::Float => eval_unary(UnOp::IntToFloat, &value).ok(),
                Type::Int => eval_unary(UnOp::FloatToInt, &value).ok(),
                Type::Bool => Some(Const::Int(i64::from(value.is_truthy()))),
                _ => Some(value),
            }
        }
        _ => None,
    }
}

impl Lowerer {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            next_temp: 0,
            next_label: 0,
            next_flag: 0,
            errors: Vec::new(),
            loops: Vec::new(),
            globals: HashMap::new(),
            signatures: HashMap::new(),
            function: IrFunction::new(START_FUNCTION, Type::Void),
            functions: Vec::new(),
        }
    }

    /// Понизить программу. `_start` идёт первым: инициализаторы глобальных,
    /// операторы верхнего уровня и вызов `main`.
    pub fn lower(mut self, program: &Program) -> (IrProgram, Vec<IrError>) {
        let mut globals = Vec::new();
        let mut has_main = false;

        for item in &program.items {
            match item {
                Item::FunctionDecl(func) => {
                    has_main |= func.name == "main" && func.body.is_some();
                    self.signatures.insert(
                        func.name.clone(),
                        FunctionSig {
                            params: func.params.iter().map(|p| p.ty).collect(),
                            return_type: func.return_type,
                            variadic: false,
                        },
                    );
                }
                Item::VarDecl(decl) => {
                    self.globals.insert(decl.name.clone(), decl.ty);
                    globals.push(GlobalVar {
                        name: decl.name.clone(),
                        ty: decl.ty,
                        init: decl.init.as_ref().and_then(const_value),
                    });
                }
                Item::Statement(_) => {}
            }
        }

        self.begin_function(START_FUNCTION, Vec::new(), Type::Void);
        for item in &program.items {
            match item {
                Item::VarDecl(decl) => {
                    if let Some(init) = &decl.init {
                        let value = self.expr(init);
                        let value = self.convert(value, init.ty(), decl.ty);
                        self.emit(Instr::Assign {
                            dest: Place::Var(decl.name.clone()),
                            src: value,
                        });
                    }
                }
                Item::Statement(stmt) => self.stmt(stmt),
                Item::FunctionDecl(_) => {}
            }
        }
        if has_main {
            self.emit(Instr::Call {
                dest: None,
                func: "main".to_string(),
                argc: 0,
            });
        }
        self.end_function();

        for item in &program.items {
            let Item::FunctionDecl(func) = item else {
                continue;
            };
            let Some(body) = &func.body else {
                continue;
            };

            trace!("ir: lowering function '{}'", func.name);
            let params: Vec<(String, Type)> =
                func.params.iter().map(|p| (p.name.clone(), p.ty)).collect();
            self.begin_function(&func.name, params, func.return_type);
            for stmt in &body.stmts {
                self.stmt(stmt);
            }
            self.end_function();
        }

        let program = IrProgram {
            code: self.code,
            globals,
            functions: self.functions,
            temp_count: self.next_temp,
        };
        (program, self.errors)
    }

    // === Вспомогательное ===

    fn emit(&mut self, instr: Instr) {
        self.code.push(instr);
    }

    fn temp(&mut self) -> Place {
        let temp = Place::Temp(self.next_temp);
        self.next_temp += 1;
        temp
    }

    fn label(&mut self) -> String {
        let label = format!("L{}", self.next_label);
        self.next_label += 1;
        label
    }

    /// Скрытая переменная для значения `&&`/`||`. Символ `$` не встречается
    /// в идентификаторах C, поэтому конфликт с пользовательскими именами
    /// невозможен.
    fn flag(&mut self) -> Place {
        let name = format!("$b{}", self.next_flag);
        self.next_flag += 1;
        self.function.vars.insert(name.clone(), Type::Int);
        Place::Var(name)
    }

    fn var_type(&self, name: &str) -> Type {
        self.function
            .vars
            .get(name)
            .or_else(|| self.globals.get(name))
            .copied()
            .unwrap_or(Type::Int)
    }

    fn begin_function(&mut self, name: &str, params: Vec<(String, Type)>, return_type: Type) {
        let mut function = IrFunction::new(name, return_type);
        for (param, ty) in &params {
            function.params.push(param.clone());
            function.vars.insert(param.clone(), *ty);
        }
        self.emit(Instr::Func {
            name: name.to_string(),
            params: function.params.clone(),
        });
        self.function = function;
    }

    fn end_function(&mut self) {
        if !matches!(self.code.last(), Some(Instr::Return(_))) {
            let value = match self.function.return_type {
                Type::Void => None,
                ty => Some(Operand::Const(Const::zero(ty))),
            };
            self.emit(Instr::Return(value));
        }
        let done = std::mem::replace(&mut self.function, IrFunction::new("", Type::Void));
        self.functions.push(done);
    }

    /// Неявное или явное преобразование значения между типами.
    fn convert(&mut self, value: Operand, from: Type, to: Type) -> Operand {
        let op = match (from, to) {
            (Type::Int | Type::Bool, Type::Float) => UnOp::IntToFloat,
            (Type::Float, Type::Int) => UnOp::FloatToInt,
            (Type::Int | Type::Float, Type::Bool) => {
                if let Operand::Const(c) = &value {
                    return Operand::int(i64::from(c.is_truthy()));
                }
                let dest = self.temp();
                self.emit(Instr::Binary {
                    dest: dest.clone(),
                    op: BinOp::Ne,
                    lhs: value,
                    rhs: Operand::Const(Const::zero(from)),
                    ty: from,
                });
                return dest.into();
            }
            _ => return value,
        };

        if let Operand::Const(c) = &value {
            if let Ok(converted) = eval_unary(op, c) {
                return converted.into();
            }
        }
        let dest = self.temp();
        self.emit(Instr::Unary {
            dest: dest.clone(),
            op,
            src: value,
        });
        dest.into()
    }

    // === Операторы ===

    fn stmt(&mut self, stmt: &Stmt) {
        stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.stmt_inner(stmt))
    }

    fn stmt_inner(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl(decl) => self.local_decl(decl),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let else_label = self.label();
                self.branch_false(cond, &else_label);
                self.stmt(then_branch);
                match else_branch {
                    Some(else_branch) => {
                        let end = self.label();
                        self.emit(Instr::Jump(end.clone()));
                        self.emit(Instr::Label(else_label));
                        self.stmt(else_branch);
                        self.emit(Instr::Label(end));
                    }
                    None => self.emit(Instr::Label(else_label)),
                }
            }
            Stmt::While { cond, body, .. } => {
                let start = self.label();
                let end = self.label();
                self.emit(Instr::Label(start.clone()));
                self.branch_false(cond, &end);
                self.loop_body(body, start.clone(), end.clone());
                self.emit(Instr::Jump(start));
                self.emit(Instr::Label(end));
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
                ..
            } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                let start = self.label();
                let next = self.label();
                let end = self.label();
                self.emit(Instr::Label(start.clone()));
                if let Some(cond) = cond {
                    self.branch_false(cond, &end);
                }
                self.loop_body(body, next.clone(), end.clone());
                self.emit(Instr::Label(next));
                if let Some(update) = update {
                    self.expr(update);
                }
                self.emit(Instr::Jump(start));
                self.emit(Instr::Label(end));
            }
            Stmt::Block(block) => {
                for stmt in &block.stmts {
                    self.stmt(stmt);
                }
            }
            Stmt::Return { value, .. } => {
                let return_type = self.function.return_type;
                let value = value.as_ref().map(|expr| {
                    let value = self.expr(expr);
                    self.convert(value, expr.ty(), return_type)
                });
                self.emit(Instr::Return(value));
            }
            Stmt::Break { .. } => {
                if let Some(target) = self.loops.last().map(|l| l.break_label.clone()) {
                    self.emit(Instr::Jump(target));
                }
            }
            Stmt::Continue { .. } => {
                if let Some(target) = self.loops.last().map(|l| l.continue_label.clone()) {
                    self.emit(Instr::Jump(target));
                }
            }
            Stmt::Expr(expr) => {
                self.expr(expr);
            }
        }
    }

    fn loop_body(&mut self, body: &Stmt, continue_label: String, break_label: String) {
        self.loops.push(LoopLabels {
            continue_label,
            break_label,
        });
        self.stmt(body);
        self.loops.pop();
    }

    fn local_decl(&mut self, decl: &VarDecl) {
        self.function.vars.insert(decl.name.clone(), decl.ty);
        let value = match &decl.init {
            Some(init) => {
                let value = self.expr(init);
                self.convert(value, init.ty(), decl.ty)
            }
            None => Operand::Const(Const::zero(decl.ty)),
        };
        self.emit(Instr::Assign {
            dest: Place::Var(decl.name.clone()),
            src: value,
        });
    }

    /// Перейти на `target`, если условие ложно.
    fn branch_false(&mut self, cond: &Expr, target: &str) {
        match &cond.kind {
            ExprKind::BinaryExpr {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => {
                self.branch_false(lhs, target);
                self.branch_false(rhs, target);
            }
            ExprKind::BinaryExpr {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => {
                let taken = self.label();
                self.branch_true(lhs, &taken);
                self.branch_false(rhs, target);
                self.emit(Instr::Label(taken));
            }
            ExprKind::UnaryExpr {
                op: UnaryOp::Not,
                operand,
            } => self.branch_true(operand, target),
            _ => {
                let value = self.expr(cond);
                self.emit(Instr::JumpIfFalse {
                    cond: value,
                    target: target.to_string(),
                });
            }
        }
    }

    /// Перейти на `target`, если условие истинно.
    fn branch_true(&mut self, cond: &Expr, target: &str) {
        match &cond.kind {
            ExprKind::BinaryExpr {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => {
                self.branch_true(lhs, target);
                self.branch_true(rhs, target);
            }
            ExprKind::BinaryExpr {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => {
                let skip = self.label();
                self.branch_false(lhs, &skip);
                self.branch_true(rhs, target);
                self.emit(Instr::Label(skip));
            }
            ExprKind::UnaryExpr {
                op: UnaryOp::Not,
                operand,
            } => self.branch_false(operand, target),
            _ => {
                let value = self.expr(cond);
                self.emit(Instr::JumpIfTrue {
                    cond: value,
                    target: target.to_string(),
                });
            }
        }
    }

    // === Выражения ===

    fn expr(&mut self, expr: &Expr) -> Operand {
        stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.expr_inner(expr))
    }

    fn expr_inner(&mut self, expr: &Expr) -> Operand {
        match &expr.kind {
            ExprKind::Literal { value } => Operand::Const(literal(value)),
            ExprKind::Identifier { name } => Operand::var(name.clone()),
            ExprKind::BinaryExpr { op, lhs, rhs } => match binary_op(*op) {
                Some(op) => self.binary(op, lhs, rhs),
                None => self.logical_value(expr),
            },
            ExprKind::UnaryExpr { op, operand } => {
                let value = self.expr(operand);
                let dest = self.temp();
                self.emit(Instr::Unary {
                    dest: dest.clone(),
                    op: unary_op(*op),
                    src: value,
                });
                dest.into()
            }
            ExprKind::Cast { target, operand } => {
                let value = self.expr(operand);
                self.convert(value, operand.ty(), *target)
            }
            ExprKind::Call { callee, args } => self.call(callee, args, expr.ty()),
            ExprKind::Assignment { target, value } => {
                let src = self.expr(value);
                let src = self.convert(src, value.ty(), self.var_type(target));
                self.emit(Instr::Assign {
                    dest: Place::Var(target.clone()),
                    src,
                });
                Operand::var(target.clone())
            }
            ExprKind::Update {
                target,
                delta,
                postfix,
            } => self.update(target, *delta, *postfix),
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Operand {
        let left = self.expr(lhs);
        let right = self.expr(rhs);

        let (lhs_ty, rhs_ty) = (lhs.ty(), rhs.ty());
        let ty = if lhs_ty == Type::Float || rhs_ty == Type::Float {
            Type::Float
        } else {
            lhs_ty
        };
        let left = self.convert(left, lhs_ty, ty);
        let right = self.convert(right, rhs_ty, ty);

        if op.may_trap() && const_value(rhs).is_some_and(|c| c.is_zero()) {
            self.errors.push(IrError::DivisionByZero { span: rhs.span });
        }

        let dest = self.temp();
        self.emit(Instr::Binary {
            dest: dest.clone(),
            op,
            lhs: left,
            rhs: right,
            ty,
        });
        dest.into()
    }

    /// Значение `a && b` / `a || b` как 0 или 1.
    fn logical_value(&mut self, expr: &Expr) -> Operand {
        let flag = self.flag();
        let end = self.label();
        self.emit(Instr::Assign {
            dest: flag.clone(),
            src: Operand::int(0),
        });
        self.branch_false(expr, &end);
        self.emit(Instr::Assign {
            dest: flag.clone(),
            src: Operand::int(1),
        });
        self.emit(Instr::Label(end));
        flag.into()
    }

    fn call(&mut self, callee: &str, args: &[Expr], return_type: Type) -> Operand {
        let params = self
            .signatures
            .get(callee)
            .map(|sig| sig.params.clone())
            .unwrap_or_default();

        // Сначала все аргументы, потом param: вложенные вызовы не
        // перемешивают свои параметры с нашими
        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let value = self.expr(arg);
            let value = match params.get(i) {
                Some(&param) => self.convert(value, arg.ty(), param),
                None => value,
            };
            values.push(value);
        }
        for value in values {
            self.emit(Instr::Param(value));
        }

        let dest = if return_type == Type::Void {
            None
        } else {
            Some(self.temp())
        };
        self.emit(Instr::Call {
            dest: dest.clone(),
            func: callee.to_string(),
            argc: args.len(),
        });
        dest.map(Operand::from).unwrap_or(Operand::int(0))
    }

    fn update(&mut self, target: &str, delta: i64, postfix: bool) -> Operand {
        let ty = self.var_type(target);
        let place = Place::Var(target.to_string());
        let one = match ty {
            Type::Float => Const::Float(1.0),
            _ => Const::Int(1),
        };

        let old = if postfix {
            let old = self.temp();
            self.emit(Instr::Assign {
                dest: old.clone(),
                src: place.clone().into(),
            });
            Some(old)
        } else {
            None
        };

        let next = self.temp();
        self.emit(Instr::Binary {
            dest: next.clone(),
            op: if delta > 0 { BinOp::Add } else { BinOp::Sub },
            lhs: place.clone().into(),
            rhs: one.into(),
            ty,
        });
        self.emit(Instr::Assign {
            dest: place.clone(),
            src: next.into(),
        });

        old.unwrap_or(place).into()
    }
}
