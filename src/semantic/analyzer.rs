//! Обход AST: разрешение имён, проверка типов и аннотация выражений.
//!
//! Анализатор работает в три шага:
//! 1. сбор имён глобальных сущностей (нужен для переименования затеняющих
//!    локальных);
//! 2. подъём сигнатур функций, чтобы вызов мог стоять раньше определения;
//! 3. обход элементов программы по порядку.
//!
//! Найденные ошибки накапливаются; анализ не останавливается на первой.

use std::collections::{HashMap, HashSet};

use log::trace;

use super::error::{unused_warning, SemanticError};
use super::symbols::{Symbol, SymbolId, SymbolKind, SymbolTable};
use crate::error::Diagnostic;
use crate::ir::START_FUNCTION;
use crate::lexer::token::Span;
use crate::parser::ast::{
    BinaryOp, Block, Expr, ExprKind, FunctionDecl, Item, Program, Stmt, UnaryOp, VarDecl,
};
use crate::types::{FunctionSig, Type};

const RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 2 * 1024 * 1024;

/// Встроенная функция форматированного вывода.
pub const PRINTF: &str = "printf";
/// Встроенная функция вывода одного значения.
pub const PRINT: &str = "print";

/// Контекст функции, тело которой сейчас обходится.
#[derive(Debug)]
struct FunctionContext {
    name: String,
    return_type: Type,
    /// Сколько раз имя уже объявлялось локально в этой функции.
    local_names: HashMap<String, usize>,
}

impl FunctionContext {
    fn new(name: impl Into<String>, return_type: Type) -> Self {
        Self {
            name: name.into(),
            return_type,
            local_names: HashMap::new(),
        }
    }
}

/// Семантический анализатор.
pub struct Analyzer {
    table: SymbolTable,
    errors: Vec<SemanticError>,
    globals: HashSet<String>,
    function: FunctionContext,
    loop_depth: usize,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            table: SymbolTable::new(),
            errors: Vec::new(),
            globals: HashSet::new(),
            function: FunctionContext::new(START_FUNCTION, Type::Void),
            loop_depth: 0,
        }
    }

    /// Проанализировать программу, переписав в ней типы выражений и имена
    /// затеняющих локальных. Возвращает таблицу символов и диагностики.
    pub fn analyze(mut self, program: &mut Program) -> (Vec<Symbol>, Vec<Diagnostic>) {
        self.declare_builtins();
        self.collect_globals(program);
        self.hoist_functions(program);

        for item in program.items.iter_mut() {
            match item {
                Item::FunctionDecl(func) => self.function_decl(func),
                Item::VarDecl(decl) => self.var_decl(decl),
                Item::Statement(stmt) => self.stmt(stmt),
            }
        }

        self.check_undefined_functions();

        let mut diagnostics: Vec<Diagnostic> =
            self.errors.into_iter().map(Diagnostic::from).collect();
        diagnostics.extend(
            self.table
                .symbols()
                .iter()
                .filter(|s| !s.used)
                .filter_map(|s| match s.kind {
                    SymbolKind::Variable => Some(unused_warning("variable", &s.name, s.span)),
                    SymbolKind::Parameter => Some(unused_warning("parameter", &s.name, s.span)),
                    _ => None,
                }),
        );

        (self.table.into_symbols(), diagnostics)
    }

    fn declare_builtins(&mut self) {
        let printf = FunctionSig {
            params: vec![Type::String],
            return_type: Type::Int,
            variadic: true,
        };
        let print = FunctionSig {
            params: Vec::new(),
            return_type: Type::Void,
            variadic: true,
        };
        // Глобальная область пуста, вставка не может конфликтовать
        let _ = self.table.insert(Symbol::builtin(PRINTF, printf));
        let _ = self.table.insert(Symbol::builtin(PRINT, print));
    }

    fn collect_globals(&mut self, program: &Program) {
        for item in &program.items {
            match item {
                Item::FunctionDecl(func) => {
                    self.globals.insert(func.name.clone());
                }
                Item::VarDecl(decl) => {
                    self.globals.insert(decl.name.clone());
                }
                Item::Statement(_) => {}
            }
        }
    }

    fn hoist_functions(&mut self, program: &Program) {
        for item in &program.items {
            let Item::FunctionDecl(func) = item else {
                continue;
            };
            let sig = FunctionSig {
                params: func.params.iter().map(|p| p.ty).collect(),
                return_type: func.return_type,
                variadic: false,
            };
            let defined = func.body.is_some();

            let Some(id) = self.table.lookup_global(&func.name) else {
                let _ = self
                    .table
                    .insert(Symbol::function(&func.name, sig, defined, func.span));
                continue;
            };

            let existing = self.table.get(id);
            if existing.kind == SymbolKind::Builtin || (existing.defined && defined) {
                self.errors.push(SemanticError::FunctionRedefinition {
                    name: func.name.clone(),
                    span: func.span,
                });
            } else if existing.signature.as_ref() != Some(&sig) {
                let previous = existing
                    .signature
                    .as_ref()
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                self.errors.push(SemanticError::ConflictingSignature {
                    name: func.name.clone(),
                    previous,
                    found: sig.to_string(),
                    span: func.span,
                });
            } else if defined {
                self.table.get_mut(id).defined = true;
            }
        }
    }

    fn check_undefined_functions(&mut self) {
        let missing: Vec<SemanticError> = self
            .table
            .symbols()
            .iter()
            .filter(|s| s.kind == SymbolKind::Function && s.used && !s.defined)
            .map(|s| SemanticError::UndefinedFunction {
                name: s.name.clone(),
                span: s.span,
            })
            .collect();
        self.errors.extend(missing);
    }

    // === Объявления ===

    /// Вставить символ; повторное объявление в той же области — ошибка.
    fn declare(&mut self, symbol: Symbol) -> Option<SymbolId> {
        let name = symbol.name.clone();
        let span = symbol.span;
        match self.table.insert(symbol) {
            Ok(id) => Some(id),
            Err(existing) => {
                self.errors.push(SemanticError::Redeclaration {
                    name,
                    previous_line: self.table.get(existing).line,
                    span,
                });
                None
            }
        }
    }

    /// Уникальное в пределах функции имя для локальной переменной.
    fn local_name(&mut self, name: &str) -> String {
        let count = self
            .function
            .local_names
            .entry(name.to_string())
            .or_insert(0);
        let suffix = *count + usize::from(self.globals.contains(name));
        *count += 1;
        if suffix == 0 {
            name.to_string()
        } else {
            format!("{}.{}", name, suffix)
        }
    }

    fn function_decl(&mut self, func: &mut FunctionDecl) {
        for param in &func.params {
            if param.ty == Type::Void {
                self.errors.push(SemanticError::VoidVariable {
                    name: param.name.clone(),
                    span: param.span,
                });
            }
        }

        let Some(body) = func.body.as_mut() else {
            return;
        };

        trace!("semantic: entering function '{}'", func.name);
        let outer = std::mem::replace(
            &mut self.function,
            FunctionContext::new(func.name.clone(), func.return_type),
        );
        self.table.enter_scope(func.name.clone());

        for param in func.params.iter_mut() {
            let ir_name = self.local_name(&param.name);
            let mut symbol = Symbol::parameter(param.name.clone(), param.ty, param.span);
            symbol.ir_name = ir_name.clone();
            self.declare(symbol);
            param.name = ir_name;
        }

        // Параметры и верхний уровень тела делят одну область, как в C
        for stmt in body.stmts.iter_mut() {
            self.stmt(stmt);
        }

        self.table.exit_scope();
        self.function = outer;
    }

    fn var_decl(&mut self, decl: &mut VarDecl) {
        if decl.ty == Type::Void {
            self.errors.push(SemanticError::VoidVariable {
                name: decl.name.clone(),
                span: decl.span,
            });
        }

        if let Some(init) = decl.init.as_mut() {
            if let Some(found) = self.expr(init) {
                if decl.ty != Type::Void && !decl.ty.accepts(found) {
                    self.errors.push(SemanticError::IncompatibleAssignment {
                        name: decl.name.clone(),
                        expected: decl.ty,
                        found,
                        span: init.span,
                    });
                }
            }
        }

        let ir_name = if self.table.is_global() {
            decl.name.clone()
        } else {
            self.local_name(&decl.name)
        };
        let mut symbol = Symbol::variable(decl.name.clone(), decl.ty, decl.span);
        symbol.ir_name = ir_name.clone();
        self.declare(symbol);
        decl.name = ir_name;
    }

    // === Операторы ===

    fn stmt(&mut self, stmt: &mut Stmt) {
        stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.stmt_inner(stmt))
    }

    fn stmt_inner(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::VarDecl(decl) => self.var_decl(decl),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.condition(cond, "if");
                self.stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.condition(cond, "while");
                self.loop_body(body);
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
                ..
            } => {
                self.table.enter_scope("for");
                match init.as_deref_mut() {
                    // `for (int i = 0, j = 1; ...)`: деклараторы видны в заголовке
                    Some(Stmt::Block(block)) => {
                        for stmt in block.stmts.iter_mut() {
                            self.stmt(stmt);
                        }
                    }
                    Some(init) => self.stmt(init),
                    None => {}
                }
                if let Some(cond) = cond {
                    self.condition(cond, "for");
                }
                if let Some(update) = update {
                    self.expr(update);
                }
                self.loop_body(body);
                self.table.exit_scope();
            }
            Stmt::Block(block) => self.block(block),
            Stmt::Return { value, span } => self.return_stmt(value.as_mut(), *span),
            Stmt::Break { span } => self.loop_control("break", *span),
            Stmt::Continue { span } => self.loop_control("continue", *span),
            Stmt::Expr(expr) => {
                self.expr(expr);
            }
        }
    }

    fn block(&mut self, block: &mut Block) {
        self.table.enter_scope("block");
        for stmt in block.stmts.iter_mut() {
            self.stmt(stmt);
        }
        self.table.exit_scope();
    }

    fn loop_body(&mut self, body: &mut Stmt) {
        self.loop_depth += 1;
        self.stmt(body);
        self.loop_depth -= 1;
    }

    fn loop_control(&mut self, keyword: &'static str, span: Span) {
        if self.loop_depth == 0 {
            self.errors.push(SemanticError::LoopControl { keyword, span });
        }
    }

    fn condition(&mut self, cond: &mut Expr, context: &'static str) {
        if let Some(found) = self.expr(cond) {
            if !found.is_condition() {
                self.errors.push(SemanticError::InvalidCondition {
                    context,
                    found,
                    span: cond.span,
                });
            }
        }
    }

    fn return_stmt(&mut self, value: Option<&mut Expr>, span: Span) {
        let expected = self.function.return_type;
        match value {
            Some(value) => {
                if let Some(found) = self.expr(value) {
                    if expected == Type::Void || !expected.accepts(found) {
                        self.errors.push(SemanticError::ReturnMismatch {
                            function: self.function.name.clone(),
                            expected,
                            found,
                            span: value.span,
                        });
                    }
                }
            }
            None if expected != Type::Void => {
                self.errors.push(SemanticError::ReturnMismatch {
                    function: self.function.name.clone(),
                    expected,
                    found: Type::Void,
                    span,
                });
            }
            None => {}
        }
    }

    // === Выражения ===

    /// Вывести тип выражения и записать его в `expr.ty`.
    /// `None` — ошибка уже записана, родитель не проверяет этот операнд.
    fn expr(&mut self, expr: &mut Expr) -> Option<Type> {
        let span = expr.span;
        let ty = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || {
            self.expr_kind(&mut expr.kind, span)
        });
        expr.ty = ty;
        ty
    }

    fn expr_kind(&mut self, kind: &mut ExprKind, span: Span) -> Option<Type> {
        match kind {
            ExprKind::Literal { value } => Some(value.ty()),
            ExprKind::Identifier { name } => {
                let id = self.resolve_variable(name, span, true)?;
                let symbol = self.table.get(id);
                *name = symbol.ir_name.clone();
                Some(symbol.ty)
            }
            ExprKind::BinaryExpr { op, lhs, rhs } => {
                let lhs = self.expr(lhs);
                let rhs = self.expr(rhs);
                self.binary_type(*op, lhs?, rhs?, span)
            }
            ExprKind::UnaryExpr { op, operand } => {
                let found = self.expr(operand)?;
                let result = match op {
                    UnaryOp::Neg => found.is_numeric().then_some(found),
                    UnaryOp::Not => (found == Type::Bool).then_some(Type::Bool),
                };
                if result.is_none() {
                    self.errors.push(SemanticError::InvalidUnaryOperand {
                        op: op.symbol(),
                        operand: found,
                        span,
                    });
                }
                result
            }
            ExprKind::Cast { target, operand } => {
                let from = self.expr(operand)?;
                let valid = from != Type::Void
                    && *target != Type::Void
                    && (from == *target || (from.is_condition() && target.is_condition()));
                if !valid {
                    self.errors.push(SemanticError::InvalidCast {
                        from,
                        to: *target,
                        span,
                    });
                    return None;
                }
                Some(*target)
            }
            ExprKind::Call { callee, args } => self.call(callee, args, span),
            ExprKind::Assignment { target, value } => {
                let found = self.expr(value);
                let id = self.resolve_variable(target, span, false)?;
                let symbol = self.table.get(id);
                let expected = symbol.ty;
                let name = symbol.name.clone();
                *target = symbol.ir_name.clone();

                if let Some(found) = found {
                    if !expected.accepts(found) {
                        self.errors.push(SemanticError::IncompatibleAssignment {
                            name,
                            expected,
                            found,
                            span: value.span,
                        });
                    }
                }
                Some(expected)
            }
            ExprKind::Update { target, delta, .. } => {
                let id = self.resolve_variable(target, span, true)?;
                let symbol = self.table.get(id);
                let ty = symbol.ty;
                *target = symbol.ir_name.clone();

                if !ty.is_numeric() {
                    self.errors.push(SemanticError::InvalidUnaryOperand {
                        op: if *delta > 0 { "++" } else { "--" },
                        operand: ty,
                        span,
                    });
                    return None;
                }
                Some(ty)
            }
        }
    }

    /// Найти переменную по имени. Функция в роли значения — ошибка.
    fn resolve_variable(&mut self, name: &str, span: Span, mark_used: bool) -> Option<SymbolId> {
        let Some(id) = self.table.lookup(name) else {
            self.errors.push(SemanticError::Undeclared {
                name: name.to_string(),
                span,
            });
            return None;
        };

        if self.table.get(id).is_function {
            self.errors.push(SemanticError::FunctionAsValue {
                name: name.to_string(),
                span,
            });
            return None;
        }

        if mark_used {
            self.table.mark_used(id);
        }
        Some(id)
    }

    fn binary_type(&mut self, op: BinaryOp, lhs: Type, rhs: Type, span: Span) -> Option<Type> {
        let result = if op == BinaryOp::Mod {
            (lhs == Type::Int && rhs == Type::Int).then_some(Type::Int)
        } else if op.is_arithmetic() {
            Type::arithmetic_result(lhs, rhs)
        } else if op.is_relational() {
            Type::comparable(lhs, rhs).then_some(Type::Bool)
        } else {
            (lhs == Type::Bool && rhs == Type::Bool).then_some(Type::Bool)
        };

        if result.is_none() {
            self.errors.push(SemanticError::InvalidOperands {
                op: op.symbol(),
                lhs,
                rhs,
                span,
            });
        }
        result
    }

    fn call(&mut self, callee: &str, args: &mut [Expr], span: Span) -> Option<Type> {
        let arg_types: Vec<Option<Type>> = args.iter_mut().map(|arg| self.expr(arg)).collect();

        let Some(id) = self.table.lookup(callee) else {
            self.errors.push(SemanticError::Undeclared {
                name: callee.to_string(),
                span,
            });
            return None;
        };
        self.table.mark_used(id);

        let symbol = self.table.get(id);
        let kind = symbol.kind;
        let Some(sig) = symbol.signature.clone() else {
            self.errors.push(SemanticError::NotCallable {
                name: callee.to_string(),
                span,
            });
            return None;
        };

        if kind == SymbolKind::Builtin && callee == PRINT && args.len() != 1 {
            self.errors.push(SemanticError::ArgumentCount {
                name: callee.to_string(),
                expected: 1,
                found: args.len(),
                span,
            });
        } else if args.len() < sig.params.len() || (!sig.variadic && args.len() > sig.params.len()) {
            self.errors.push(SemanticError::ArgumentCount {
                name: callee.to_string(),
                expected: sig.params.len(),
                found: args.len(),
                span,
            });
        }

        for (position, (arg, found)) in args.iter().zip(&arg_types).enumerate() {
            let Some(found) = *found else {
                continue;
            };
            match sig.params.get(position) {
                Some(&expected) if !expected.accepts(found) => {
                    self.errors.push(SemanticError::ArgumentType {
                        name: callee.to_string(),
                        position: position + 1,
                        expected,
                        found,
                        span: arg.span,
                    });
                }
                None if found == Type::Void => {
                    self.errors.push(SemanticError::VoidValue { span: arg.span });
                }
                _ => {}
            }
        }

        Some(sig.return_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn analyze(source: &str) -> (Program, Vec<Symbol>, Vec<Diagnostic>) {
        let lexed = tokenize(source);
        let parsed = parse(&lexed.tokens, lexed.eof);
        assert!(parsed.success, "syntax errors: {:?}", parsed.errors);
        let mut program = parsed.ast.unwrap();
        let (symbols, diagnostics) = Analyzer::new().analyze(&mut program);
        (program, symbols, diagnostics)
    }

    fn errors(source: &str) -> Vec<String> {
        let (_, _, diagnostics) = analyze(source);
        diagnostics
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn test_valid_program_has_no_errors() {
        let source = "int add(int a, int b) { return a + b; }\n\
                      int main() { int r = add(1, 2); printf(\"%d\\n\", r); return 0; }";
        assert!(errors(source).is_empty());
    }

    #[test]
    fn test_string_to_int_is_incompatible() {
        let errs = errors("int main() { int x = \"hola\"; return x; }");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("incompatible types"));
    }

    #[test]
    fn test_narrowing_is_error_widening_is_not() {
        assert!(errors("int main() { float f = 1; return 0; }").is_empty());
        let errs = errors("int main() { float f = 1.5; int i = f; return i; }");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("cannot assign float"));
    }

    #[test]
    fn test_undeclared_identifier() {
        let errs = errors("int main() { return y; }");
        assert_eq!(errs, vec!["undeclared identifier 'y'".to_string()]);
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let errs = errors("int main() {\n int a = 1;\n int a = 2;\n return a; }");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("previously declared at line 2"));
    }

    #[test]
    fn test_shadowing_in_inner_block_is_allowed_and_renamed() {
        let source = "int x = 1;\nint main() { int x = 2; { int x = 3; print(x); } return x; }";
        let (program, symbols, diagnostics) = analyze(source);
        assert!(!crate::error::has_errors(&diagnostics));

        let ir_names: Vec<&str> = symbols
            .iter()
            .filter(|s| s.name == "x")
            .map(|s| s.ir_name.as_str())
            .collect();
        assert_eq!(ir_names, vec!["x", "x.1", "x.2"]);

        let Item::FunctionDecl(main) = &program.items[1] else {
            panic!("Expected main");
        };
        let body = main.body.as_ref().unwrap();
        assert!(matches!(&body.stmts[0], Stmt::VarDecl(d) if d.name == "x.1"));
    }

    #[test]
    fn test_argument_count_and_position() {
        let source = "int f(int a, float b) { return a; }\n\
                      int main() { f(1); f(1, \"s\"); return 0; }";
        let errs = errors(source);
        assert_eq!(errs.len(), 2);
        assert!(errs[0].contains("expects 2 argument(s), found 1"));
        assert!(errs[1].contains("argument 2 of 'f'"));
    }

    #[test]
    fn test_return_type_rules() {
        let errs = errors("void f() { return 1; }\nint g() { return; }\nint main() { return 0; }");
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|e| e.contains("return type mismatch")));
    }

    #[test]
    fn test_break_outside_loop() {
        let errs = errors("int main() { break; while (1) { break; } return 0; }");
        assert_eq!(errs, vec!["'break' outside of a loop".to_string()]);
    }

    #[test]
    fn test_calling_a_variable() {
        let errs = errors("int main() { int v = 1; return v(); }");
        assert_eq!(errs, vec!["'v' is not a function".to_string()]);
    }

    #[test]
    fn test_mixed_arithmetic_annotated_as_float() {
        let (program, _, diagnostics) = analyze("float r = 1 + 2.5;");
        assert!(!crate::error::has_errors(&diagnostics));
        let Item::VarDecl(decl) = &program.items[0] else {
            panic!("Expected global");
        };
        assert_eq!(decl.init.as_ref().and_then(|e| e.ty), Some(Type::Float));
    }

    #[test]
    fn test_modulo_requires_ints_and_logic_requires_bool() {
        let errs = errors("float a = 5.0 % 2; int b = 1 && 2;");
        assert_eq!(errs.len(), 2);
        assert!(errs[0].contains("invalid operands to '%'"));
        assert!(errs[1].contains("invalid operands to '&&'"));
    }

    #[test]
    fn test_unused_variable_warning() {
        let (_, _, diagnostics) = analyze("int main() { int unused = 1; return 0; }");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, "SemanticWarning");
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert!(diagnostics[0].message.contains("unused variable 'unused'"));
    }

    #[test]
    fn test_function_used_before_definition() {
        let source = "int main() { return twice(2); }\nint twice(int n) { return n * 2; }";
        assert!(errors(source).is_empty());
    }

    #[test]
    fn test_prototype_without_definition() {
        let errs = errors("int g(int n);\nint main() { return g(1); }");
        assert_eq!(errs, vec!["function 'g' is declared but never defined".to_string()]);
    }
}
