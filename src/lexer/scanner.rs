//! Сканер исходного текста C на базе logos.
//!
//! logos даёт maximal munch; восстановление после ошибок делаем сами:
//! на нераспознанном символе пропускаем ровно один символ и перезапускаем
//! автомат с этой позиции.

use logos::Logos;

use super::error::LexError;
use super::token::{Span, Token, TokenKind};

/// Внутренние токены для logos.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")] // Пропускаем пробелы
#[logos(skip r"//[^\n]*")] // Однострочные комментарии
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")] // Блочные комментарии
#[logos(skip r"#[^\n]*")] // Директивы препроцессора (#include ...)
enum RawToken {
    // Ключевые слова (до идентификаторов!)
    #[token("int")]
    Int,
    #[token("float")]
    #[token("double")]
    Float,
    #[token("char")]
    Char,
    #[token("bool")]
    Bool,
    #[token("string")]
    StringKw,
    #[token("void")]
    Void,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("return")]
    Return,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    // Float (приоритет выше, чем у BadIdent: `1e5` — число)
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", priority = 10)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", priority = 10)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", priority = 10)]
    FloatLit,

    #[regex(r"[0-9]+")]
    IntLit,

    #[regex(r"0[xX][0-9a-fA-F]+", priority = 10)]
    HexLit,

    // Цифры, сразу за которыми буквы: `2x`
    #[regex(r"[0-9]+[A-Za-z_][A-Za-z0-9_]*", priority = 2)]
    BadIdent,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StrLit,

    // Незакрытая строка: останавливается перед переводом строки
    #[regex(r#""([^"\\\n]|\\.)*"#)]
    UnterminatedStr,

    #[regex(r"'([^'\\\n]|\\.)*'")]
    CharLit,

    // Блочный комментарий без `*/`: тянется до конца файла
    #[regex(r"/\*([^*]|\*+[^*/])*\**")]
    UnterminatedComment,

    // Многосимвольные операторы
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("%=")]
    PercentAssign,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,

    // Односимвольные операторы
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Assign,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Bang,

    // Пунктуация
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
}

/// Таблица начал строк для перевода байтового смещения в (строка, колонка).
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            source,
            line_starts,
        }
    }

    /// Строка и колонка (обе с 1) для байтового смещения.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .source
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(0);
        (line + 1, column + 1)
    }

    pub fn span(&self, start: usize, end: usize) -> Span {
        let (line, column) = self.position(start);
        Span::new(start, end, line, column)
    }
}

/// Сканер: исходник → токены и лексические ошибки.
pub struct Scanner<'a> {
    source: &'a str,
    lines: LineIndex<'a>,
}

impl<'a> Scanner<'a> {
    /// Создать новый сканер.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            lines: LineIndex::new(source),
        }
    }

    /// Просканировать весь исходник.
    pub fn scan(&self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        let mut offset = 0;

        'restart: while offset < self.source.len() {
            let mut logos = RawToken::lexer(&self.source[offset..]);

            while let Some(result) = logos.next() {
                let start = offset + logos.span().start;
                let end = offset + logos.span().end;
                let span = self.lines.span(start, end);
                let text = &self.source[start..end];

                match result {
                    Ok(raw) => match convert(raw, text, span) {
                        Ok(kind) => tokens.push(Token::new(kind, text, span)),
                        Err(err) => errors.push(err),
                    },
                    Err(()) => {
                        // Пропускаем ровно один символ и начинаем заново.
                        let ch = self.source[start..].chars().next().unwrap_or('\u{FFFD}');
                        let span = self.lines.span(start, start + ch.len_utf8());
                        errors.push(LexError::UnexpectedChar { ch, span });
                        offset = start + ch.len_utf8();
                        continue 'restart;
                    }
                }
            }

            break;
        }

        (tokens, errors)
    }

    /// Позиция конца исходника (для токена EOF).
    pub fn eof_span(&self) -> Span {
        let end = self.source.len();
        self.lines.span(end, end)
    }
}

/// Конвертировать внутренний токен logos в публичный TokenKind.
fn convert(raw: RawToken, text: &str, span: Span) -> Result<TokenKind, LexError> {
    let kind = match raw {
        RawToken::Int => TokenKind::Int,
        RawToken::Float => TokenKind::Float,
        RawToken::Char => TokenKind::Char,
        RawToken::Bool => TokenKind::Bool,
        RawToken::StringKw => TokenKind::StringKw,
        RawToken::Void => TokenKind::Void,
        RawToken::If => TokenKind::If,
        RawToken::Else => TokenKind::Else,
        RawToken::While => TokenKind::While,
        RawToken::For => TokenKind::For,
        RawToken::Return => TokenKind::Return,
        RawToken::Break => TokenKind::Break,
        RawToken::Continue => TokenKind::Continue,
        RawToken::True => TokenKind::True,
        RawToken::False => TokenKind::False,
        RawToken::Ident => TokenKind::Ident(text.to_string()),
        RawToken::FloatLit => match text.parse::<f64>() {
            Ok(value) if value.is_finite() => TokenKind::FloatLit(value),
            _ => return Err(invalid_number(text, span)),
        },
        RawToken::IntLit => match text.parse::<i64>() {
            Ok(value) => TokenKind::IntLit(value),
            Err(_) => return Err(invalid_number(text, span)),
        },
        RawToken::HexLit => match i64::from_str_radix(&text[2..], 16) {
            Ok(value) => TokenKind::IntLit(value),
            Err(_) => return Err(invalid_number(text, span)),
        },
        RawToken::BadIdent => {
            return Err(LexError::InvalidIdentifier {
                text: text.to_string(),
                span,
            })
        }
        RawToken::StrLit => TokenKind::StrLit(unescape_string(&text[1..text.len() - 1])),
        RawToken::UnterminatedStr => return Err(LexError::UnterminatedString { span }),
        RawToken::UnterminatedComment => return Err(LexError::UnterminatedComment { span }),
        RawToken::CharLit => {
            let body = unescape_string(&text[1..text.len() - 1]);
            let mut chars = body.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => TokenKind::CharLit(c as i64),
                _ => {
                    return Err(LexError::InvalidChar {
                        text: text.to_string(),
                        span,
                    })
                }
            }
        }
        RawToken::PlusPlus => TokenKind::PlusPlus,
        RawToken::MinusMinus => TokenKind::MinusMinus,
        RawToken::PlusAssign => TokenKind::PlusAssign,
        RawToken::MinusAssign => TokenKind::MinusAssign,
        RawToken::StarAssign => TokenKind::StarAssign,
        RawToken::SlashAssign => TokenKind::SlashAssign,
        RawToken::PercentAssign => TokenKind::PercentAssign,
        RawToken::EqEq => TokenKind::EqEq,
        RawToken::NotEq => TokenKind::NotEq,
        RawToken::Le => TokenKind::Le,
        RawToken::Ge => TokenKind::Ge,
        RawToken::AndAnd => TokenKind::AndAnd,
        RawToken::OrOr => TokenKind::OrOr,
        RawToken::Plus => TokenKind::Plus,
        RawToken::Minus => TokenKind::Minus,
        RawToken::Star => TokenKind::Star,
        RawToken::Slash => TokenKind::Slash,
        RawToken::Percent => TokenKind::Percent,
        RawToken::Assign => TokenKind::Assign,
        RawToken::Lt => TokenKind::Lt,
        RawToken::Gt => TokenKind::Gt,
        RawToken::Bang => TokenKind::Bang,
        RawToken::LParen => TokenKind::LParen,
        RawToken::RParen => TokenKind::RParen,
        RawToken::LBrace => TokenKind::LBrace,
        RawToken::RBrace => TokenKind::RBrace,
        RawToken::LBracket => TokenKind::LBracket,
        RawToken::RBracket => TokenKind::RBracket,
        RawToken::Comma => TokenKind::Comma,
        RawToken::Semicolon => TokenKind::Semicolon,
    };
    Ok(kind)
}

fn invalid_number(text: &str, span: Span) -> LexError {
    LexError::InvalidNumber {
        text: text.to_string(),
        span,
    }
}

/// Обработка escape-последовательностей в строке.
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('0') => result.push('\0'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Scanner::new(source).scan();
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_scanner_keywords_and_idents() {
        assert_eq!(
            kinds("int main while_x"),
            vec![
                TokenKind::Int,
                TokenKind::Ident("main".to_string()),
                TokenKind::Ident("while_x".to_string()),
            ]
        );
    }

    #[test]
    fn test_scanner_maximal_munch() {
        assert_eq!(
            kinds("a<=b++ +=c"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Le,
                TokenKind::Ident("b".to_string()),
                TokenKind::PlusPlus,
                TokenKind::PlusAssign,
                TokenKind::Ident("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_scanner_numbers() {
        assert_eq!(
            kinds("42 3.5 1e3 0x1F .5"),
            vec![
                TokenKind::IntLit(42),
                TokenKind::FloatLit(3.5),
                TokenKind::FloatLit(1000.0),
                TokenKind::IntLit(31),
                TokenKind::FloatLit(0.5),
            ]
        );
    }

    #[test]
    fn test_scanner_string_escapes() {
        match &kinds(r#""a\tb\n""#)[0] {
            TokenKind::StrLit(s) => assert_eq!(s, "a\tb\n"),
            other => panic!("Expected string, got {:?}", other),
        }
    }

    #[test]
    fn test_scanner_char_literal() {
        assert_eq!(kinds("'A'"), vec![TokenKind::CharLit(65)]);
    }

    #[test]
    fn test_scanner_skips_comments_and_directives() {
        let source = "#include <stdio.h>\n// line\n/* block\n * comment */ x";
        assert_eq!(kinds(source), vec![TokenKind::Ident("x".to_string())]);
    }

    #[test]
    fn test_scanner_unterminated_comment() {
        let (tokens, errors) = Scanner::new("x = 1;\n/* never closed\nint y;").scan();
        assert_eq!(tokens.len(), 4);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LexError::UnterminatedComment { .. }));
        assert_eq!(errors[0].span().line, 2);
        assert_eq!(errors[0].span().column, 1);

        // Закрытый комментарий со звёздочками внутри по-прежнему пропускается
        assert_eq!(kinds("/** a * b **/ y"), vec![TokenKind::Ident("y".to_string())]);
    }

    #[test]
    fn test_line_index_positions() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.position(0), (1, 1));
        assert_eq!(index.position(4), (2, 2));
        assert_eq!(index.position(7), (4, 1));
    }
}
