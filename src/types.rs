//! Система типов подмножества C.

use serde::Serialize;

/// Тип значения.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    Void,
}

impl Type {
    /// `int` или `float`.
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Может ли значение типа быть условием `if`/`while`/`for`.
    pub fn is_condition(self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Bool)
    }

    /// Можно ли присвоить значение типа `source` переменной типа `self`.
    ///
    /// Разрешены: совпадение типов, `int → float`, `bool → int/float`,
    /// `int → bool`. Сужение `float → int` и любые смешения со `string`
    /// запрещены.
    pub fn accepts(self, source: Type) -> bool {
        match (self, source) {
            (Type::Void, _) | (_, Type::Void) => false,
            (target, source) if target == source => true,
            (Type::Float, Type::Int) => true,
            (Type::Int, Type::Bool) | (Type::Float, Type::Bool) => true,
            (Type::Bool, Type::Int) => true,
            _ => false,
        }
    }

    /// Тип результата арифметики над двумя числовыми операндами.
    /// Смешанные `int`/`float` продвигаются до `float`.
    pub fn arithmetic_result(lhs: Type, rhs: Type) -> Option<Type> {
        match (lhs, rhs) {
            (Type::Int, Type::Int) => Some(Type::Int),
            (Type::Float, Type::Float) | (Type::Int, Type::Float) | (Type::Float, Type::Int) => {
                Some(Type::Float)
            }
            _ => None,
        }
    }

    /// Сравнимы ли значения двух типов операторами `==`, `<`, ...
    pub fn comparable(lhs: Type, rhs: Type) -> bool {
        (lhs.is_numeric() && rhs.is_numeric()) || (lhs == rhs && lhs != Type::Void)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Bool => "bool",
            Type::String => "string",
            Type::Void => "void",
        };
        write!(f, "{}", name)
    }
}

/// Сигнатура функции.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSig {
    pub params: Vec<Type>,
    pub return_type: Type,
    /// Принимает произвольное число аргументов после `params` (printf).
    pub variadic: bool,
}

impl std::fmt::Display for FunctionSig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        if self.variadic {
            params.push("...".to_string());
        }
        write!(f, "{}({})", self.return_type, params.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_compatibility() {
        assert!(Type::Float.accepts(Type::Int));
        assert!(!Type::Int.accepts(Type::Float));
        assert!(!Type::Int.accepts(Type::String));
        assert!(!Type::String.accepts(Type::Int));
        assert!(!Type::Bool.accepts(Type::String));
        assert!(Type::Int.accepts(Type::Bool));
        assert!(!Type::Void.accepts(Type::Void));
    }

    #[test]
    fn test_mixed_arithmetic_promotes_to_float() {
        assert_eq!(Type::arithmetic_result(Type::Int, Type::Int), Some(Type::Int));
        assert_eq!(Type::arithmetic_result(Type::Int, Type::Float), Some(Type::Float));
        assert_eq!(Type::arithmetic_result(Type::Bool, Type::Int), None);
    }

    #[test]
    fn test_comparable() {
        assert!(Type::comparable(Type::Int, Type::Float));
        assert!(Type::comparable(Type::String, Type::String));
        assert!(!Type::comparable(Type::String, Type::Int));
        assert!(Type::comparable(Type::Bool, Type::Bool));
    }

    #[test]
    fn test_signature_display() {
        let sig = FunctionSig {
            params: vec![Type::String],
            return_type: Type::Int,
            variadic: true,
        };
        assert_eq!(sig.to_string(), "int(string, ...)");
    }
}
