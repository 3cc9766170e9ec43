//! Граф потока управления над трёхадресным кодом.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use super::instr::Instr;

/// Базовый блок: вход только через первую инструкцию, выход только
/// через последнюю.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicBlock {
    pub label: String,
    /// Функция, которой принадлежит блок.
    pub function: String,
    pub instructions: Vec<Instr>,
    pub successors: Vec<String>,
    pub predecessors: Vec<String>,
    /// Достижим из входного блока (по переходам и вызовам).
    pub reachable: bool,
}

/// Граф потока управления. Первый блок — единственный вход.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cfg {
    pub entry: String,
    pub blocks: Vec<BasicBlock>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// Метка входного блока функции.
pub fn entry_label(function: &str) -> String {
    format!("func_{}", function)
}

impl Cfg {
    /// Построить граф: лидеры — начало кода, маркеры функций, метки и
    /// инструкции сразу после переходов и `return`.
    pub fn build(code: &[Instr]) -> Cfg {
        let mut leaders = vec![false; code.len()];
        if let Some(first) = leaders.first_mut() {
            *first = true;
        }
        for (i, instr) in code.iter().enumerate() {
            if matches!(instr, Instr::Func { .. } | Instr::Label(_)) {
                leaders[i] = true;
            }
            if instr.ends_block() && i + 1 < code.len() {
                leaders[i + 1] = true;
            }
        }

        let mut blocks: Vec<BasicBlock> = Vec::new();
        let mut function = String::new();
        let mut anonymous = 0;

        for (i, instr) in code.iter().enumerate() {
            if leaders[i] {
                let label = match instr {
                    Instr::Func { name, .. } => {
                        function = name.clone();
                        entry_label(name)
                    }
                    Instr::Label(label) => label.clone(),
                    _ => {
                        anonymous += 1;
                        format!("B{}", anonymous)
                    }
                };
                blocks.push(BasicBlock {
                    label,
                    function: function.clone(),
                    instructions: Vec::new(),
                    successors: Vec::new(),
                    predecessors: Vec::new(),
                    reachable: false,
                });
            }
            if let Some(block) = blocks.last_mut() {
                block.instructions.push(instr.clone());
            }
        }

        let index: HashMap<String, usize> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.label.clone(), i))
            .collect();

        for i in 0..blocks.len() {
            let fallthrough = blocks
                .get(i + 1)
                .filter(|next| !matches!(next.instructions.first(), Some(Instr::Func { .. })))
                .map(|next| next.label.clone());

            let successors = match blocks[i].instructions.last() {
                Some(Instr::Jump(target)) => vec![target.clone()],
                Some(Instr::JumpIfFalse { target, .. } | Instr::JumpIfTrue { target, .. }) => {
                    let mut succ = vec![target.clone()];
                    if let Some(next) = fallthrough.filter(|next| next != target) {
                        succ.push(next);
                    }
                    succ
                }
                Some(Instr::Return(_)) => Vec::new(),
                _ => fallthrough.into_iter().collect(),
            };
            blocks[i].successors = successors;
        }

        for i in 0..blocks.len() {
            let label = blocks[i].label.clone();
            let successors = blocks[i].successors.clone();
            for succ in successors {
                if let Some(&j) = index.get(&succ) {
                    blocks[j].predecessors.push(label.clone());
                }
            }
        }

        let mut cfg = Cfg {
            entry: blocks.first().map(|b| b.label.clone()).unwrap_or_default(),
            blocks,
            index,
        };
        cfg.mark_reachable();
        cfg
    }

    fn mark_reachable(&mut self) {
        let mut queue = VecDeque::new();
        if !self.blocks.is_empty() {
            queue.push_back(0);
        }

        while let Some(i) = queue.pop_front() {
            if self.blocks[i].reachable {
                continue;
            }
            self.blocks[i].reachable = true;

            let block = &self.blocks[i];
            let calls = block.instructions.iter().filter_map(|instr| match instr {
                Instr::Call { func, .. } => Some(entry_label(func)),
                _ => None,
            });
            let next: Vec<usize> = block
                .successors
                .iter()
                .cloned()
                .chain(calls)
                .filter_map(|label| self.index.get(&label).copied())
                .collect();
            queue.extend(next);
        }
    }

    pub fn block(&self, label: &str) -> Option<&BasicBlock> {
        self.index.get(label).map(|&i| &self.blocks[i])
    }

    pub fn block_index(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn edge_count(&self) -> usize {
        self.blocks.iter().map(|b| b.successors.len()).sum()
    }

    /// Снова развернуть блоки в линейный код.
    pub fn to_code(&self) -> Vec<Instr> {
        self.blocks
            .iter()
            .flat_map(|b| b.instructions.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instr::{Operand, Place};

    fn label(l: &str) -> Instr {
        Instr::Label(l.to_string())
    }

    fn func(name: &str) -> Instr {
        Instr::Func {
            name: name.to_string(),
            params: Vec::new(),
        }
    }

    #[test]
    fn test_leaders_and_successors() {
        let code = vec![
            func("main"),
            Instr::Assign {
                dest: Place::Var("x".into()),
                src: Operand::int(1),
            },
            label("L0"),
            Instr::JumpIfFalse {
                cond: Operand::var("x"),
                target: "L1".into(),
            },
            Instr::Jump("L0".into()),
            label("L1"),
            Instr::Return(None),
        ];
        let cfg = Cfg::build(&code);
        let labels: Vec<&str> = cfg.blocks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["func_main", "L0", "B1", "L1"]);

        assert_eq!(cfg.entry, "func_main");
        assert_eq!(cfg.block("func_main").unwrap().successors, vec!["L0"]);
        assert_eq!(cfg.block("L0").unwrap().successors, vec!["L1", "B1"]);
        assert_eq!(cfg.block("B1").unwrap().successors, vec!["L0"]);
        assert!(cfg.block("L1").unwrap().successors.is_empty());
        assert_eq!(cfg.block("L0").unwrap().predecessors, vec!["func_main", "B1"]);
        assert!(cfg.blocks.iter().all(|b| b.reachable));
        assert_eq!(cfg.to_code(), code);
    }

    #[test]
    fn test_no_fallthrough_across_functions_and_call_edges() {
        let code = vec![
            func("_start"),
            Instr::Call {
                dest: None,
                func: "main".into(),
                argc: 0,
            },
            Instr::Return(None),
            func("unused"),
            Instr::Return(None),
            func("main"),
            Instr::Return(Some(Operand::int(0))),
        ];
        let cfg = Cfg::build(&code);
        assert!(cfg.block("func__start").unwrap().successors.is_empty());
        assert!(cfg.block("func_main").unwrap().reachable);
        assert!(!cfg.block("func_unused").unwrap().reachable);
    }

    #[test]
    fn test_code_after_return_is_unreachable_block() {
        let code = vec![
            func("main"),
            Instr::Return(Some(Operand::int(0))),
            Instr::Assign {
                dest: Place::Var("x".into()),
                src: Operand::int(1),
            },
        ];
        let cfg = Cfg::build(&code);
        assert_eq!(cfg.blocks.len(), 2);
        assert!(!cfg.blocks[1].reachable);
    }
}
