//! Рекурсивный спуск с precedence climbing для подмножества C.
//!
//! Парсер не останавливается на первой ошибке: он записывает её и
//! синхронизируется на ближайшей границе оператора (`;` или парная `}`),
//! так что возвращаемое дерево может быть частичным.

use super::ast::{
    BinaryOp, Block, Expr, ExprKind, FunctionDecl, Item, Literal, Param, Program, Stmt, UnaryOp,
    VarDecl,
};
use super::error::SyntaxError;
use crate::lexer::token::{Span, Token, TokenKind};
use crate::types::Type;

/// Запас стека, после которого stacker выделяет новый сегмент.
const RED_ZONE: usize = 64 * 1024;
/// Размер нового сегмента стека.
const STACK_GROWTH: usize = 2 * 1024 * 1024;

type PResult<T> = Result<T, SyntaxError>;

/// Приоритет и оператор для бинарного токена.
fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    let entry = match kind {
        TokenKind::OrOr => (BinaryOp::Or, 1),
        TokenKind::AndAnd => (BinaryOp::And, 2),
        TokenKind::EqEq => (BinaryOp::Eq, 3),
        TokenKind::NotEq => (BinaryOp::Ne, 3),
        TokenKind::Lt => (BinaryOp::Lt, 4),
        TokenKind::Gt => (BinaryOp::Gt, 4),
        TokenKind::Le => (BinaryOp::Le, 4),
        TokenKind::Ge => (BinaryOp::Ge, 4),
        TokenKind::Plus => (BinaryOp::Add, 5),
        TokenKind::Minus => (BinaryOp::Sub, 5),
        TokenKind::Star => (BinaryOp::Mul, 6),
        TokenKind::Slash => (BinaryOp::Div, 6),
        TokenKind::Percent => (BinaryOp::Mod, 6),
        _ => return None,
    };
    Some(entry)
}

/// Оператор составного присваивания (`None` для простого `=`).
fn assignment_op(kind: &TokenKind) -> Option<Option<BinaryOp>> {
    match kind {
        TokenKind::Assign => Some(None),
        TokenKind::PlusAssign => Some(Some(BinaryOp::Add)),
        TokenKind::MinusAssign => Some(Some(BinaryOp::Sub)),
        TokenKind::StarAssign => Some(Some(BinaryOp::Mul)),
        TokenKind::SlashAssign => Some(Some(BinaryOp::Div)),
        TokenKind::PercentAssign => Some(Some(BinaryOp::Mod)),
        _ => None,
    }
}

/// Парсер C.
pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    eof: Token,
    prev_span: Span,
    /// Открытые `(` и `{` — счётчик вложенности с позициями.
    open: Vec<(TokenKind, Span)>,
    errors: Vec<SyntaxError>,
}

impl<'t> Parser<'t> {
    /// Создать новый парсер над потоком токенов.
    pub fn new(tokens: &'t [Token], eof: Span) -> Self {
        Self {
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, "", eof),
            prev_span: Span::default(),
            open: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Распарсить всю программу. Возвращает (возможно частичное) дерево
    /// и все синтаксические ошибки.
    pub fn parse_program(mut self) -> (Program, Vec<SyntaxError>) {
        let mut items = Vec::new();

        while !self.at_eof() {
            let start = self.pos;

            if matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::RParen) {
                // Лишняя закрывающая скобка на верхнем уровне
                self.advance();
                continue;
            }

            match self.parse_item() {
                Ok(mut parsed) => items.append(&mut parsed),
                Err(err) => {
                    self.record(err);
                    self.synchronize();
                }
            }

            if self.pos == start {
                self.advance();
            }
        }

        self.finish();
        (Program { items }, self.errors)
    }

    // === Токены ===

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_nth(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// Забрать текущий токен, обновив стек скобок.
    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.at_eof() {
            return token;
        }
        self.pos += 1;
        self.prev_span = token.span;

        match token.kind {
            TokenKind::LParen | TokenKind::LBrace => self.open.push((token.kind.clone(), token.span)),
            TokenKind::RParen | TokenKind::RBrace => {
                let opener = if token.kind == TokenKind::RParen {
                    TokenKind::LParen
                } else {
                    TokenKind::LBrace
                };
                match self.open.iter().rposition(|(k, _)| *k == opener) {
                    Some(index) => self.open.truncate(index),
                    None => self.record(SyntaxError::UnmatchedDelimiter {
                        span: token.span,
                        delimiter: token.kind.to_string(),
                    }),
                }
            }
            _ => {}
        }

        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.check(&kind) {
            return Ok(self.advance());
        }
        Err(self.error_here(format!("'{}'", kind)))
    }

    fn expect_ident(&mut self, what: &str) -> PResult<(String, Span)> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                let token = self.advance();
                Ok((name, token.span))
            }
            _ => Err(self.error_here(what)),
        }
    }

    /// `;` после оператора. Отсутствие записывается, но не прерывает разбор.
    fn expect_semicolon(&mut self, context: &str) {
        if self.eat(&TokenKind::Semicolon) {
            return;
        }
        let err = if self.at_eof() && !self.open.is_empty() {
            self.unclosed_error()
        } else {
            SyntaxError::missing_terminator(self.peek().span, context, self.peek_kind())
        };
        self.record(err);
    }

    fn error_here(&self, expected: impl Into<String>) -> SyntaxError {
        if self.at_eof() && !self.open.is_empty() {
            return self.unclosed_error();
        }
        SyntaxError::unexpected_token(self.peek().span, expected, self.peek_kind())
    }

    fn unclosed_error(&self) -> SyntaxError {
        let (kind, span) = self
            .open
            .last()
            .cloned()
            .unwrap_or((TokenKind::LBrace, self.eof.span));
        SyntaxError::UnclosedDelimiter {
            span: self.eof.span,
            delimiter: kind.to_string(),
            open_line: span.line,
            open_column: span.column,
        }
    }

    fn record(&mut self, err: SyntaxError) {
        if !self.errors.contains(&err) {
            self.errors.push(err);
        }
    }

    fn finish(&mut self) {
        if !self.open.is_empty() {
            let err = self.unclosed_error();
            self.record(err);
        }
    }

    /// Пропустить токены до границы оператора: `;` (съедается) или `}`.
    fn synchronize(&mut self) {
        // Круглые скобки не переживают оператор
        while matches!(self.open.last(), Some((TokenKind::LParen, _))) {
            self.open.pop();
        }
        let base = self.open.len();

        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Semicolon if self.open.len() == base => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace if self.open.len() <= base => return,
                TokenKind::RBrace if self.open.len() == base + 1 => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn span_from(&self, start: Span) -> Span {
        start.merge(self.prev_span)
    }

    // === Верхний уровень ===

    fn parse_item(&mut self) -> PResult<Vec<Item>> {
        if self.peek_kind().is_type_keyword() {
            let is_function = matches!(self.peek_nth(1), TokenKind::Ident(_))
                && *self.peek_nth(2) == TokenKind::LParen;
            if is_function {
                return Ok(vec![Item::FunctionDecl(self.parse_function()?)]);
            }
            let decls = self.parse_declaration()?;
            return Ok(decls.into_iter().map(Item::VarDecl).collect());
        }

        let stmts = self.parse_block_item()?;
        Ok(stmts.into_iter().map(Item::Statement).collect())
    }

    fn parse_type(&mut self) -> PResult<Type> {
        let ty = match self.peek_kind() {
            TokenKind::Int | TokenKind::Char => Type::Int,
            TokenKind::Float => Type::Float,
            TokenKind::Bool => Type::Bool,
            TokenKind::StringKw => Type::String,
            TokenKind::Void => Type::Void,
            _ => return Err(self.error_here("type name")),
        };
        self.advance();
        Ok(ty)
    }

    fn parse_function(&mut self) -> PResult<FunctionDecl> {
        let start = self.peek().span;
        let return_type = self.parse_type()?;
        let (name, _) = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        let void_list = self.check(&TokenKind::Void) && *self.peek_nth(1) == TokenKind::RParen;
        if void_list {
            self.advance();
        } else if !self.check(&TokenKind::RParen) {
            loop {
                let param_start = self.peek().span;
                let ty = self.parse_type()?;
                let (param_name, _) = self.expect_ident("parameter name")?;
                params.push(Param {
                    name: param_name,
                    ty,
                    span: self.span_from(param_start),
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        let body = if self.eat(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_block()?)
        };

        Ok(FunctionDecl {
            name,
            return_type,
            params,
            body,
            span: self.span_from(start),
        })
    }

    /// `type a = 1, b;` — одно объявление может вводить несколько переменных.
    fn parse_declaration(&mut self) -> PResult<Vec<VarDecl>> {
        let ty = self.parse_type()?;
        let mut decls = Vec::new();

        loop {
            let (name, start) = self.expect_ident("variable name")?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            decls.push(VarDecl {
                name,
                ty,
                init,
                span: self.span_from(start),
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        self.expect_semicolon("declaration");
        Ok(decls)
    }

    // === Операторы ===

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.expect(TokenKind::LBrace)?.span;
        let mut stmts = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let before = self.pos;
            match self.parse_block_item() {
                Ok(mut parsed) => stmts.append(&mut parsed),
                Err(err) => {
                    self.record(err);
                    self.synchronize();
                }
            }
            if self.pos == before && !self.check(&TokenKind::RBrace) {
                self.advance();
            }
        }

        if !self.eat(&TokenKind::RBrace) {
            let err = self.error_here("'}'");
            self.record(err);
        }

        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    /// Элемент блока: объявление (возможно несколько переменных) или оператор.
    fn parse_block_item(&mut self) -> PResult<Vec<Stmt>> {
        if self.peek_kind().is_type_keyword() {
            let decls = self.parse_declaration()?;
            return Ok(decls.into_iter().map(Stmt::VarDecl).collect());
        }
        if self.eat(&TokenKind::Semicolon) {
            return Ok(Vec::new());
        }
        Ok(vec![self.parse_statement()?])
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.parse_statement_inner())
    }

    fn parse_statement_inner(&mut self) -> PResult<Stmt> {
        let start = self.peek().span;

        match self.peek_kind() {
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::If => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.eat(&TokenKind::Else) {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                    span: self.span_from(start),
                })
            }
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While {
                    cond,
                    body,
                    span: self.span_from(start),
                })
            }
            TokenKind::For => self.parse_for(start),
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect_semicolon("return statement");
                Ok(Stmt::Return {
                    value,
                    span: self.span_from(start),
                })
            }
            TokenKind::Break => {
                self.advance();
                self.expect_semicolon("'break'");
                Ok(Stmt::Break { span: start })
            }
            TokenKind::Continue => {
                self.advance();
                self.expect_semicolon("'continue'");
                Ok(Stmt::Continue { span: start })
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::Block(Block {
                    stmts: Vec::new(),
                    span: start,
                }))
            }
            kind if kind.is_type_keyword() => {
                // Объявление как тело if/while без фигурных скобок
                let decls = self.parse_declaration()?;
                let mut stmts: Vec<Stmt> = decls.into_iter().map(Stmt::VarDecl).collect();
                if stmts.len() == 1 {
                    Ok(stmts.remove(0))
                } else {
                    Ok(Stmt::Block(Block {
                        stmts,
                        span: self.span_from(start),
                    }))
                }
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect_semicolon("expression");
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_for(&mut self, start: Span) -> PResult<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen)?;

        let init = if self.eat(&TokenKind::Semicolon) {
            None
        } else if self.peek_kind().is_type_keyword() {
            let mut decls = self.parse_declaration()?;
            if decls.len() == 1 {
                Some(Box::new(Stmt::VarDecl(decls.remove(0))))
            } else {
                let span = self.span_from(start);
                Some(Box::new(Stmt::Block(Block {
                    stmts: decls.into_iter().map(Stmt::VarDecl).collect(),
                    span,
                })))
            }
        } else {
            let expr = self.parse_expression()?;
            self.expect(TokenKind::Semicolon)?;
            Some(Box::new(Stmt::Expr(expr)))
        };

        let cond = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::RParen)?;

        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            cond,
            update,
            body,
            span: self.span_from(start),
        })
    }

    // === Выражения ===

    /// Распарсить выражение (включая присваивание).
    pub fn parse_expression(&mut self) -> PResult<Expr> {
        stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.parse_assignment())
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        let lhs = self.parse_binary(0)?;

        let Some(compound) = assignment_op(self.peek_kind()) else {
            return Ok(lhs);
        };
        self.advance();
        let value = self.parse_assignment()?;
        let span = lhs.span.merge(value.span);

        match lhs.kind {
            ExprKind::Identifier { name } => {
                let value = match compound {
                    None => value,
                    Some(op) => {
                        let target = Expr::new(ExprKind::Identifier { name: name.clone() }, lhs.span);
                        Expr::new(
                            ExprKind::BinaryExpr {
                                op,
                                lhs: Box::new(target),
                                rhs: Box::new(value),
                            },
                            span,
                        )
                    }
                };
                Ok(Expr::new(
                    ExprKind::Assignment {
                        target: name,
                        value: Box::new(value),
                    },
                    span,
                ))
            }
            _ => Err(SyntaxError::InvalidAssignmentTarget { span: lhs.span }),
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;

        while let Some((op, prec)) = binary_op(self.peek_kind()) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::BinaryExpr {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.parse_unary_inner())
    }

    fn parse_unary_inner(&mut self) -> PResult<Expr> {
        let start = self.peek().span;

        match self.peek_kind() {
            TokenKind::Minus | TokenKind::Bang => {
                let op = if self.check(&TokenKind::Minus) {
                    UnaryOp::Neg
                } else {
                    UnaryOp::Not
                };
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::UnaryExpr {
                        op,
                        operand: Box::new(operand),
                    },
                    self.span_from(start),
                ))
            }
            TokenKind::Plus => {
                self.advance();
                self.parse_unary()
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let delta = if self.check(&TokenKind::PlusPlus) { 1 } else { -1 };
                self.advance();
                let (target, _) = self.expect_ident("variable after increment/decrement")?;
                Ok(Expr::new(
                    ExprKind::Update {
                        target,
                        delta,
                        postfix: false,
                    },
                    self.span_from(start),
                ))
            }
            TokenKind::LParen if self.peek_nth(1).is_type_keyword() => {
                self.advance();
                let target = self.parse_type()?;
                self.expect(TokenKind::RParen)?;
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::Cast {
                        target,
                        operand: Box::new(operand),
                    },
                    self.span_from(start),
                ))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let expr = self.parse_primary()?;

        if let ExprKind::Identifier { name } = &expr.kind {
            let delta = match self.peek_kind() {
                TokenKind::PlusPlus => 1,
                TokenKind::MinusMinus => -1,
                _ => return Ok(expr),
            };
            let target = name.clone();
            self.advance();
            return Ok(Expr::new(
                ExprKind::Update {
                    target,
                    delta,
                    postfix: true,
                },
                self.span_from(expr.span),
            ));
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.peek().span;

        let literal = match self.peek_kind().clone() {
            TokenKind::IntLit(n) | TokenKind::CharLit(n) => Literal::Int(n),
            TokenKind::FloatLit(x) => Literal::Float(x),
            TokenKind::True => Literal::Bool(true),
            TokenKind::False => Literal::Bool(false),
            TokenKind::StrLit(s) => {
                self.advance();
                // Соседние строковые литералы склеиваются, как в C
                let mut text = s;
                while let TokenKind::StrLit(next) = self.peek_kind().clone() {
                    self.advance();
                    text.push_str(&next);
                }
                return Ok(Expr::new(
                    ExprKind::Literal {
                        value: Literal::Str(text),
                    },
                    self.span_from(start),
                ));
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    return self.parse_call(name, start);
                }
                return Ok(Expr::new(ExprKind::Identifier { name }, start));
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            _ => return Err(self.error_here("expression")),
        };

        self.advance();
        Ok(Expr::new(ExprKind::Literal { value: literal }, start))
    }

    fn parse_call(&mut self, callee: String, start: Span) -> PResult<Expr> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();

        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(Expr::new(
            ExprKind::Call { callee, args },
            self.span_from(start),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(source: &str) -> (Program, Vec<SyntaxError>) {
        let lexed = tokenize(source);
        assert!(lexed.success, "lexical errors: {:?}", lexed.errors);
        Parser::new(&lexed.tokens, lexed.eof).parse_program()
    }

    fn parse_ok(source: &str) -> Program {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "syntax errors: {:?}", errors);
        program
    }

    fn first_expr(program: &Program) -> &Expr {
        match &program.items[0] {
            Item::Statement(Stmt::Expr(expr)) => expr,
            other => panic!("Expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_with_params() {
        let program = parse_ok("int add(int a, float b) { return a; }");
        match &program.items[0] {
            Item::FunctionDecl(func) => {
                assert_eq!(func.name, "add");
                assert_eq!(func.return_type, Type::Int);
                assert_eq!(func.params.len(), 2);
                assert_eq!(func.params[1].ty, Type::Float);
                assert_eq!(func.body.as_ref().map(|b| b.stmts.len()), Some(1));
            }
            other => panic!("Expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_precedence() {
        let program = parse_ok("x = 2 + 3 * 4;");
        let ExprKind::Assignment { value, .. } = &first_expr(&program).kind else {
            panic!("Expected assignment");
        };
        match &value.kind {
            ExprKind::BinaryExpr { op, rhs, .. } => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(
                    rhs.kind,
                    ExprKind::BinaryExpr {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("Expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_logical_precedence() {
        let program = parse_ok("a || b && c < d;");
        match &first_expr(&program).kind {
            ExprKind::BinaryExpr { op, rhs, .. } => {
                assert_eq!(*op, BinaryOp::Or);
                assert!(matches!(
                    rhs.kind,
                    ExprKind::BinaryExpr {
                        op: BinaryOp::And,
                        ..
                    }
                ));
            }
            other => panic!("Expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_compound_assignment_desugars() {
        let program = parse_ok("x += 5;");
        match &first_expr(&program).kind {
            ExprKind::Assignment { target, value } => {
                assert_eq!(target, "x");
                assert!(matches!(
                    value.kind,
                    ExprKind::BinaryExpr {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
            }
            other => panic!("Expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_for_loop_with_increment() {
        let program = parse_ok("int main() { for (int i = 0; i < 10; i++) { } return 0; }");
        let Item::FunctionDecl(func) = &program.items[0] else {
            panic!("Expected function");
        };
        let body = func.body.as_ref().map(|b| &b.stmts[0]);
        match body {
            Some(Stmt::For {
                init: Some(init),
                cond: Some(_),
                update: Some(update),
                ..
            }) => {
                assert!(matches!(**init, Stmt::VarDecl(_)));
                assert!(matches!(
                    update.kind,
                    ExprKind::Update {
                        delta: 1,
                        postfix: true,
                        ..
                    }
                ));
            }
            other => panic!("Expected for loop, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_if_else_chain() {
        let program = parse_ok("if (x > 0) { y = 1; } else if (x < 0) { y = 2; } else y = 3;");
        match &program.items[0] {
            Item::Statement(Stmt::If {
                else_branch: Some(else_branch),
                ..
            }) => assert!(matches!(**else_branch, Stmt::If { .. })),
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_semicolon_is_reported_and_statement_kept() {
        let (program, errors) = parse("if (x > 0) { print(x) }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SyntaxError::MissingTerminator { .. }));
        assert!(errors[0].to_string().contains("expected ';'"));
        match &program.items[0] {
            Item::Statement(Stmt::If { then_branch, .. }) => match &**then_branch {
                Stmt::Block(block) => assert_eq!(block.stmts.len(), 1),
                other => panic!("Expected block, got {:?}", other),
            },
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_recovery_reports_multiple_errors() {
        let (program, errors) = parse("int main() { int a = ; a = 1; b = * 2; return a; }");
        assert_eq!(errors.len(), 2);
        let Item::FunctionDecl(func) = &program.items[0] else {
            panic!("Expected function");
        };
        // `a = 1;` и `return a;` пережили восстановление
        assert_eq!(func.body.as_ref().map(|b| b.stmts.len()), Some(2));
    }

    #[test]
    fn test_unbalanced_delimiter_at_eof() {
        let (_, errors) = parse("int main() { if (x) { y = 1; }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SyntaxError::UnclosedDelimiter { .. }));
        assert!(errors[0].to_string().contains("unbalanced delimiter"));
    }

    #[test]
    fn test_unmatched_closing_brace() {
        let (_, errors) = parse("int x = 1; }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SyntaxError::UnmatchedDelimiter { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let (_, errors) = parse("1 = x;");
        assert!(matches!(
            errors[0],
            SyntaxError::InvalidAssignmentTarget { .. }
        ));
    }

    #[test]
    fn test_parse_cast_and_prototype() {
        let program = parse_ok("int f(int n); float g() { return (float) 1; }");
        assert!(matches!(
            &program.items[0],
            Item::FunctionDecl(FunctionDecl { body: None, .. })
        ));
    }
}
