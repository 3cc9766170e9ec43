//! Токены и позиции для лексера C.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Позиция в исходном коде.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    /// Начальная позиция (байт).
    pub start: usize,
    /// Конечная позиция (байт).
    pub end: usize,
    /// Строка (с 1).
    pub line: usize,
    /// Колонка в символах (с 1).
    pub column: usize,
}

impl Span {
    /// Создать новый Span.
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Объединить два Span. Строка и колонка берутся у более раннего.
    pub fn merge(self, other: Span) -> Span {
        let (first, _) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: first.line,
            column: first.column,
        }
    }
}

/// Крупная категория токена (то, что видит пользователь в таблице токенов).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenCategory {
    Keyword,
    Identifier,
    Literal,
    Operator,
    Punctuation,
}

/// Вид токена.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // === Ключевые слова ===
    Int,
    Float,
    Char,
    Bool,
    StringKw,
    Void,
    If,
    Else,
    While,
    For,
    Return,
    Break,
    Continue,
    True,
    False,

    /// Идентификатор
    Ident(String),

    // === Литералы ===
    IntLit(i64),
    FloatLit(f64),
    /// Строка (уже без кавычек, escape-последовательности раскрыты)
    StrLit(String),
    /// Символьный литерал, хранится как код символа
    CharLit(i64),

    // === Операторы ===
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Bang,

    // === Пунктуация ===
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,

    /// Конец файла (только внутри парсера, в результат лексера не попадает)
    Eof,
}

impl TokenKind {
    /// Категория токена.
    pub fn category(&self) -> TokenCategory {
        use TokenKind::*;
        match self {
            Int | Float | Char | Bool | StringKw | Void | If | Else | While | For | Return
            | Break | Continue | True | False => TokenCategory::Keyword,
            Ident(_) => TokenCategory::Identifier,
            IntLit(_) | FloatLit(_) | StrLit(_) | CharLit(_) => TokenCategory::Literal,
            Plus | Minus | Star | Slash | Percent | PlusPlus | MinusMinus | Assign
            | PlusAssign | MinusAssign | StarAssign | SlashAssign | PercentAssign | EqEq
            | NotEq | Lt | Gt | Le | Ge | AndAnd | OrOr | Bang => TokenCategory::Operator,
            LParen | RParen | LBrace | RBrace | LBracket | RBracket | Comma | Semicolon | Eof => {
                TokenCategory::Punctuation
            }
        }
    }

    /// Имя вида токена в верхнем регистре (`INT`, `IDENTIFIER`, `PLUS`, ...).
    pub fn name(&self) -> &'static str {
        use TokenKind::*;
        match self {
            Int => "INT",
            Float => "FLOAT",
            Char => "CHAR",
            Bool => "BOOL",
            StringKw => "STRING",
            Void => "VOID",
            If => "IF",
            Else => "ELSE",
            While => "WHILE",
            For => "FOR",
            Return => "RETURN",
            Break => "BREAK",
            Continue => "CONTINUE",
            True => "TRUE",
            False => "FALSE",
            Ident(_) => "IDENTIFIER",
            IntLit(_) => "INT_CONST",
            FloatLit(_) => "FLOAT_CONST",
            StrLit(_) => "STRING_LITERAL",
            CharLit(_) => "CHAR_CONST",
            Plus => "PLUS",
            Minus => "MINUS",
            Star => "TIMES",
            Slash => "DIVIDE",
            Percent => "MODULO",
            PlusPlus => "PLUSPLUS",
            MinusMinus => "MINUSMINUS",
            Assign => "EQUALS",
            PlusAssign => "PLUSEQUAL",
            MinusAssign => "MINUSEQUAL",
            StarAssign => "TIMESEQUAL",
            SlashAssign => "DIVEQUAL",
            PercentAssign => "MODEQUAL",
            EqEq => "EQ",
            NotEq => "NE",
            Lt => "LT",
            Gt => "GT",
            Le => "LE",
            Ge => "GE",
            AndAnd => "LAND",
            OrOr => "LOR",
            Bang => "LNOT",
            LParen => "LPAREN",
            RParen => "RPAREN",
            LBrace => "LBRACE",
            RBrace => "RBRACE",
            LBracket => "LBRACKET",
            RBracket => "RBRACKET",
            Comma => "COMMA",
            Semicolon => "SEMI",
            Eof => "EOF",
        }
    }

    /// Является ли токен именем типа.
    pub fn is_type_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Int
                | TokenKind::Float
                | TokenKind::Char
                | TokenKind::Bool
                | TokenKind::StringKw
                | TokenKind::Void
        )
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use TokenKind::*;
        let text = match self {
            Int => "int",
            Float => "float",
            Char => "char",
            Bool => "bool",
            StringKw => "string",
            Void => "void",
            If => "if",
            Else => "else",
            While => "while",
            For => "for",
            Return => "return",
            Break => "break",
            Continue => "continue",
            True => "true",
            False => "false",
            Ident(name) => return write!(f, "{}", name),
            IntLit(n) => return write!(f, "{}", n),
            FloatLit(x) => return write!(f, "{}", x),
            StrLit(s) => return write!(f, "\"{}\"", s),
            CharLit(c) => return write!(f, "'{}'", char::from_u32(*c as u32).unwrap_or('?')),
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            PlusPlus => "++",
            MinusMinus => "--",
            Assign => "=",
            PlusAssign => "+=",
            MinusAssign => "-=",
            StarAssign => "*=",
            SlashAssign => "/=",
            PercentAssign => "%=",
            EqEq => "==",
            NotEq => "!=",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            AndAnd => "&&",
            OrOr => "||",
            Bang => "!",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            Comma => ",",
            Semicolon => ";",
            Eof => "end of input",
        };
        write!(f, "{}", text)
    }
}

/// Токен с текстом и позицией.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Исходный текст токена как он записан в программе.
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Token", 5)?;
        state.serialize_field("category", &self.kind.category())?;
        state.serialize_field("type", self.kind.name())?;
        state.serialize_field("text", &self.text)?;
        state.serialize_field("line", &self.span.line)?;
        state.serialize_field("column", &self.span.column)?;
        state.end()
    }
}
