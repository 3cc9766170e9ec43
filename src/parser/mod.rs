//! Синтаксический анализ: токены → AST.
//!
//! Грамматика — подмножество C: функции (и прототипы), глобальные
//! переменные, блоки, `if`/`else`, `while`, `for`, `return`, `break`,
//! `continue`, выражения с приоритетами C, приведения `(int)`/`(float)`,
//! `++`/`--` и составные присваивания.
//!
//! # Пример
//!
//! ```rust,ignore
//! use phasec::lexer::tokenize;
//! use phasec::parser::parse;
//!
//! let lexed = tokenize("int main() { return 0; }");
//! let result = parse(&lexed.tokens, lexed.eof);
//! assert!(result.success);
//! ```

pub mod ast;
pub mod error;
pub mod parser;

pub use ast::{BinaryOp, Block, Expr, ExprKind, FunctionDecl, Item, Literal, Param, Program, Stmt, UnaryOp, VarDecl};
pub use error::SyntaxError;
pub use parser::Parser;

use log::debug;
use serde::Serialize;

use crate::error::Diagnostic;
use crate::lexer::token::{Span, Token};

/// Результат синтаксического анализа.
#[derive(Debug, Clone, Serialize)]
pub struct SyntaxResult {
    pub success: bool,
    /// Дерево (частичное, если были ошибки).
    pub ast: Option<Program>,
    /// Сообщение первой ошибки.
    pub error: Option<String>,
    pub errors: Vec<Diagnostic>,
}

/// Построить AST по потоку токенов.
pub fn parse(tokens: &[Token], eof: Span) -> SyntaxResult {
    let (program, errors) = Parser::new(tokens, eof).parse_program();

    debug!(
        "parser: {} top-level items, {} errors",
        program.items.len(),
        errors.len()
    );

    let error = errors.first().map(|e| e.to_string());
    let errors: Vec<Diagnostic> = errors.into_iter().map(Diagnostic::from).collect();
    SyntaxResult {
        success: errors.is_empty(),
        ast: Some(program),
        error,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn test_parse_reports_first_error() {
        let lexed = tokenize("int main() { return 0 }");
        let result = parse(&lexed.tokens, lexed.eof);
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("expected ';' after return statement, found '}'")
        );
        assert_eq!(result.errors[0].kind, "SyntaxError");
        assert!(result.ast.is_some());
    }

    #[test]
    fn test_parse_empty_program() {
        let lexed = tokenize("");
        let result = parse(&lexed.tokens, lexed.eof);
        assert!(result.success);
        assert_eq!(result.ast.map(|p| p.items.len()), Some(0));
    }

    #[test]
    fn test_ast_serializes_with_node_tags() {
        let lexed = tokenize("x = 1 + 2;");
        let result = parse(&lexed.tokens, lexed.eof);
        let json = serde_json::to_value(&result.ast).unwrap();
        let item = &json["items"][0];
        assert_eq!(item["item"], "Statement");
        assert_eq!(item["stmt"], "Expr");
        assert_eq!(item["expr"], "Assignment");
        assert_eq!(item["value"]["op"], "+");
    }
}
