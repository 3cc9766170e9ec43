//! Определения ошибок для phasec.
//!
//! Ошибки фаз компиляции никогда не прерывают выполнение: каждая фаза
//! накапливает их и возвращает как данные ([`Diagnostic`]).
//! [`PhasecError`] используется только для внешней обвязки (файлы, конфиг).

use serde::Serialize;
use thiserror::Error;

use crate::lexer::token::Span;

/// Основной тип `Result` для библиотеки.
pub type PhasecResult<T> = Result<T, PhasecError>;

/// Ошибки, не относящиеся к самой программе на C.
#[derive(Error, Debug)]
pub enum PhasecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Фаза компилятора, породившая диагностику.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lexical,
    Syntax,
    Semantic,
    Intermediate,
    Optimization,
    Codegen,
    Execution,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Lexical => "lexical",
            Phase::Syntax => "syntax",
            Phase::Semantic => "semantic",
            Phase::Intermediate => "intermediate",
            Phase::Optimization => "optimization",
            Phase::Codegen => "codegen",
            Phase::Execution => "execution",
        };
        write!(f, "{}", name)
    }
}

/// Серьёзность диагностики.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Запись об ошибке или предупреждении с позицией в исходнике.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub phase: Phase,
    pub severity: Severity,
    /// Категория: `LexicalError`, `SyntaxError`, `SemanticWarning`, ...
    pub kind: &'static str,
    /// Строка (с 1). 0 — позиция неизвестна.
    pub line: usize,
    /// Колонка (с 1). 0 — позиция неизвестна.
    pub column: usize,
    pub message: String,
}

impl Diagnostic {
    /// Создать ошибку.
    pub fn error(phase: Phase, kind: &'static str, span: Span, message: impl Into<String>) -> Self {
        Self {
            phase,
            severity: Severity::Error,
            kind,
            line: span.line,
            column: span.column,
            message: message.into(),
        }
    }

    /// Создать предупреждение.
    pub fn warning(
        phase: Phase,
        kind: &'static str,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            severity: Severity::Warning,
            kind,
            line: span.line,
            column: span.column,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if self.line > 0 {
            write!(
                f,
                "{}:{}: {} [{}]: {}",
                self.line, self.column, severity, self.kind, self.message
            )
        } else {
            write!(f, "{} [{}]: {}", severity, self.kind, self.message)
        }
    }
}

/// Есть ли среди диагностик хотя бы одна ошибка.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
