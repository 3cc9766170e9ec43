//! Таблица символов со стеком областей видимости.

use std::collections::HashMap;

use serde::Serialize;

use crate::lexer::token::Span;
use crate::types::{FunctionSig, Type};

/// Индекс символа в таблице.
pub type SymbolId = usize;

/// Вид символа.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    Builtin,
}

/// Запись таблицы символов.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    pub name: String,
    /// Имя в IR. Отличается от `name` только у затеняющих локальных (`x.1`).
    pub ir_name: String,
    pub kind: SymbolKind,
    /// Тип переменной или тип возврата функции.
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<FunctionSig>,
    pub scope: usize,
    pub scope_name: String,
    pub line: usize,
    pub is_function: bool,
    pub used: bool,
    /// У функции есть тело (не только прототип).
    #[serde(skip)]
    pub defined: bool,
    #[serde(skip)]
    pub span: Span,
}

impl Symbol {
    pub fn variable(name: impl Into<String>, ty: Type, span: Span) -> Self {
        let name = name.into();
        Self {
            ir_name: name.clone(),
            name,
            kind: SymbolKind::Variable,
            ty,
            signature: None,
            scope: 0,
            scope_name: String::new(),
            line: span.line,
            is_function: false,
            used: false,
            defined: true,
            span,
        }
    }

    pub fn parameter(name: impl Into<String>, ty: Type, span: Span) -> Self {
        Self {
            kind: SymbolKind::Parameter,
            ..Self::variable(name, ty, span)
        }
    }

    pub fn function(name: impl Into<String>, sig: FunctionSig, defined: bool, span: Span) -> Self {
        Self {
            kind: SymbolKind::Function,
            ty: sig.return_type,
            signature: Some(sig),
            is_function: true,
            defined,
            ..Self::variable(name, Type::Void, span)
        }
    }

    pub fn builtin(name: impl Into<String>, sig: FunctionSig) -> Self {
        Self {
            kind: SymbolKind::Builtin,
            ..Self::function(name, sig, true, Span::default())
        }
    }
}

#[derive(Debug, Clone)]
struct Scope {
    id: usize,
    name: String,
    names: HashMap<String, SymbolId>,
}

/// Таблица символов: все когда-либо объявленные символы плюс стек
/// открытых областей. Глобальная область (id 0) не снимается никогда.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    stack: Vec<Scope>,
    next_scope: usize,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            stack: vec![Scope {
                id: 0,
                name: "global".to_string(),
                names: HashMap::new(),
            }],
            next_scope: 1,
        }
    }

    /// Открыть новую область. Возвращает её id.
    pub fn enter_scope(&mut self, name: impl Into<String>) -> usize {
        let id = self.next_scope;
        self.next_scope += 1;
        self.stack.push(Scope {
            id,
            name: name.into(),
            names: HashMap::new(),
        });
        id
    }

    pub fn exit_scope(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_global(&self) -> bool {
        self.stack.len() == 1
    }

    /// Добавить символ в текущую область.
    /// `Err` с id уже существующего символа при повторном объявлении.
    pub fn insert(&mut self, mut symbol: Symbol) -> Result<SymbolId, SymbolId> {
        let id = self.symbols.len();
        let Some(scope) = self.stack.last_mut() else {
            return Err(id);
        };
        if let Some(&existing) = scope.names.get(&symbol.name) {
            return Err(existing);
        }
        symbol.scope = scope.id;
        symbol.scope_name = scope.name.clone();
        scope.names.insert(symbol.name.clone(), id);
        self.symbols.push(symbol);
        Ok(id)
    }

    /// Найти символ, начиная с самой внутренней области.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.stack
            .iter()
            .rev()
            .find_map(|scope| scope.names.get(name).copied())
    }

    /// Найти символ только в глобальной области.
    pub fn lookup_global(&self, name: &str) -> Option<SymbolId> {
        self.stack.first().and_then(|scope| scope.names.get(name).copied())
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id]
    }

    pub fn mark_used(&mut self, id: SymbolId) {
        if let Some(symbol) = self.symbols.get_mut(id) {
            symbol.used = true;
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn into_symbols(self) -> Vec<Symbol> {
        self.symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_outward() {
        let mut table = SymbolTable::new();
        let global = table
            .insert(Symbol::variable("x", Type::Int, Span::default()))
            .unwrap();
        table.enter_scope("main");
        assert_eq!(table.lookup("x"), Some(global));

        let inner = table
            .insert(Symbol::variable("x", Type::Float, Span::default()))
            .unwrap();
        assert_eq!(table.lookup("x"), Some(inner));
        assert_eq!(table.lookup_global("x"), Some(global));

        table.exit_scope();
        assert_eq!(table.lookup("x"), Some(global));
        assert_eq!(table.get(inner).scope_name, "main");
    }

    #[test]
    fn test_same_scope_redeclaration_rejected() {
        let mut table = SymbolTable::new();
        let first = table
            .insert(Symbol::variable("a", Type::Int, Span::default()))
            .unwrap();
        let second = table.insert(Symbol::variable("a", Type::Int, Span::default()));
        assert_eq!(second, Err(first));
    }

    #[test]
    fn test_global_scope_never_popped() {
        let mut table = SymbolTable::new();
        table.exit_scope();
        table.exit_scope();
        assert!(table.is_global());
        assert_eq!(table.depth(), 1);
    }
}
