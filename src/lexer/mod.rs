//! Лексический анализ: исходный текст → последовательность токенов.
//!
//! Пробелы, комментарии и строки препроцессора в поток не попадают.
//! Ошибки не фатальны: сканер сообщает о каждой и продолжает работу,
//! поэтому за один проход видно сразу несколько лексических ошибок.
//!
//! # Пример
//!
//! ```rust,ignore
//! use phasec::lexer::tokenize;
//!
//! let result = tokenize("int x = 10;");
//! assert!(result.success);
//! assert_eq!(result.tokens.len(), 5);
//! ```

pub mod error;
pub mod scanner;
pub mod token;

pub use error::LexError;
pub use scanner::Scanner;
pub use token::{Span, Token, TokenCategory, TokenKind};

use log::debug;
use serde::Serialize;

use crate::error::Diagnostic;

/// Результат лексического анализа.
#[derive(Debug, Clone, Serialize)]
pub struct LexicalResult {
    /// `true` тогда и только тогда, когда `errors` пуст.
    pub success: bool,
    pub tokens: Vec<Token>,
    pub errors: Vec<Diagnostic>,
    /// Позиция конца исходника, нужна парсеру для токена EOF.
    #[serde(skip)]
    pub eof: Span,
}

/// Разбить исходный код на токены.
pub fn tokenize(source: &str) -> LexicalResult {
    let scanner = Scanner::new(source);
    let (tokens, errors) = scanner.scan();

    debug!(
        "lexer: {} tokens, {} errors",
        tokens.len(),
        errors.len()
    );

    let errors: Vec<Diagnostic> = errors.into_iter().map(Diagnostic::from).collect();
    LexicalResult {
        success: errors.is_empty(),
        tokens,
        errors,
        eof: scanner.eof_span(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_declaration() {
        let result = tokenize("int x = 10;");
        assert!(result.success);
        let names: Vec<&str> = result.tokens.iter().map(|t| t.kind.name()).collect();
        assert_eq!(names, vec!["INT", "IDENTIFIER", "EQUALS", "INT_CONST", "SEMI"]);
        assert_eq!(result.tokens[0].kind.category(), TokenCategory::Keyword);
        assert_eq!(result.tokens[3].kind.category(), TokenCategory::Literal);
        assert_eq!(result.tokens[4].kind.category(), TokenCategory::Punctuation);
    }

    #[test]
    fn test_invalid_identifier_reported_at_digit() {
        let result = tokenize("int 2x = 10;");
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        let err = &result.errors[0];
        assert_eq!(err.kind, "LexicalError");
        assert_eq!((err.line, err.column), (1, 5));
        assert!(err.message.contains("invalid identifier"));
    }

    #[test]
    fn test_unknown_characters_skip_one_each() {
        let result = tokenize("int a = 1 @ $ 2;");
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].message.contains('@'));
        assert_eq!(result.errors[0].column, 11);
        assert!(result.errors[1].message.contains('$'));
        assert_eq!(result.errors[1].column, 13);
        // Сканирование продолжилось после ошибок
        assert_eq!(result.tokens.last().map(|t| t.text.as_str()), Some(";"));
    }

    #[test]
    fn test_unterminated_string_resumes_next_line() {
        let result = tokenize("string s = \"abc;\nint y = 2;");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("unterminated string"));
        let second_line: Vec<&str> = result
            .tokens
            .iter()
            .filter(|t| t.span.line == 2)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(second_line, vec!["int", "y", "=", "2", ";"]);
    }

    #[test]
    fn test_tokens_strictly_ordered_by_position() {
        let source = "int main() {\n  int a = 1; // note\n  /* x */ return a + 2;\n}\n";
        let result = tokenize(source);
        assert!(result.success);
        for pair in result.tokens.windows(2) {
            let a = (pair[0].span.line, pair[0].span.column);
            let b = (pair[1].span.line, pair[1].span.column);
            assert!(a < b, "{:?} !< {:?}", a, b);
        }
    }

    #[test]
    fn test_token_texts_reconstruct_normalized_source() {
        let source = "int  main ( )\n{\n\treturn   a+b ; // done\n}";
        let result = tokenize(source);
        let joined: Vec<&str> = result.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(joined.join(" "), "int main ( ) { return a + b ; }");
    }

    #[test]
    fn test_token_serialization() {
        let result = tokenize("x");
        let json = serde_json::to_value(&result.tokens[0]).unwrap();
        assert_eq!(json["category"], "identifier");
        assert_eq!(json["type"], "IDENTIFIER");
        assert_eq!(json["text"], "x");
        assert_eq!(json["line"], 1);
        assert_eq!(json["column"], 1);
    }
}
