//! Настройки компилятора.
//!
//! Все поля имеют значения по умолчанию, поэтому JSON может задавать
//! только часть из них:
//!
//! ```json
//! { "register_pool": ["ebx", "ecx"], "max_steps": 5000 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PhasecError, PhasecResult};

/// Переменная окружения, переопределяющая `max_steps`.
pub const MAX_STEPS_ENV: &str = "PHASEC_MAX_STEPS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Регистры для распределения, в порядке выдачи.
    pub register_pool: Vec<String>,
    /// Предел числа выполненных инструкций в симуляторе.
    pub max_steps: u64,
    /// Размер стека симулятора в байтах.
    pub stack_size: usize,
    /// Предел размера кадра одной функции в байтах.
    pub max_frame_bytes: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            register_pool: ["ebx", "ecx", "esi", "edi", "r8d", "r9d"]
                .iter()
                .map(|r| r.to_string())
                .collect(),
            max_steps: 1_000_000,
            stack_size: 64 * 1024,
            max_frame_bytes: 4096,
        }
    }
}

impl CompilerConfig {
    pub fn from_json_str(json: &str) -> PhasecResult<Self> {
        let config: CompilerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> PhasecResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Настройки по умолчанию с учётом `PHASEC_MAX_STEPS`.
    pub fn from_env() -> PhasecResult<Self> {
        Self::default().with_env()
    }

    /// Применить переопределения из окружения.
    pub fn with_env(mut self) -> PhasecResult<Self> {
        if let Ok(value) = std::env::var(MAX_STEPS_ENV) {
            self.max_steps = parse_steps(&value)?;
        }
        Ok(self)
    }

    fn validate(&self) -> PhasecResult<()> {
        if self.max_steps == 0 {
            return Err(PhasecError::InvalidConfig {
                key: "max_steps".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.stack_size < 64 {
            return Err(PhasecError::InvalidConfig {
                key: "stack_size".to_string(),
                message: format!("{} bytes is too small", self.stack_size),
            });
        }
        Ok(())
    }
}

fn parse_steps(value: &str) -> PhasecResult<u64> {
    match value.trim().parse::<u64>() {
        Ok(steps) if steps > 0 => Ok(steps),
        _ => Err(PhasecError::InvalidConfig {
            key: MAX_STEPS_ENV.to_string(),
            message: format!("expected a positive integer, found '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.register_pool, vec!["ebx", "ecx", "esi", "edi", "r8d", "r9d"]);
        assert_eq!(config.max_steps, 1_000_000);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CompilerConfig::from_json_str(r#"{ "max_steps": 500 }"#).unwrap();
        assert_eq!(config.max_steps, 500);
        assert_eq!(config.register_pool.len(), 6);
        assert_eq!(config.max_frame_bytes, 4096);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            CompilerConfig::from_json_str(r#"{ "max_steps": 0 }"#),
            Err(PhasecError::InvalidConfig { .. })
        ));
        assert!(matches!(
            CompilerConfig::from_json_str("{ not json"),
            Err(PhasecError::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "register_pool": ["ebx"] }}"#).unwrap();
        let config = CompilerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.register_pool, vec!["ebx"]);
    }

    #[test]
    fn test_parse_steps() {
        assert_eq!(parse_steps(" 42 ").unwrap(), 42);
        assert!(parse_steps("-1").is_err());
        assert!(parse_steps("lots").is_err());
    }
}
