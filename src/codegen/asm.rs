//! Структурное представление ассемблера x86-64 (синтаксис Intel).

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Аппаратные регистры, которые использует генератор.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    Eax,
    Ebx,
    Ecx,
    Edx,
    Esi,
    Edi,
    R8d,
    R9d,
    R10d,
    R11d,
    R12d,
    R13d,
    R14d,
    R15d,
    Rbp,
    Rsp,
    Xmm0,
    Xmm1,
}

impl Reg {
    /// 32-битное имя (для `xmm` и `rbp`/`rsp` — единственное).
    pub fn name32(self) -> &'static str {
        match self {
            Reg::Eax => "eax",
            Reg::Ebx => "ebx",
            Reg::Ecx => "ecx",
            Reg::Edx => "edx",
            Reg::Esi => "esi",
            Reg::Edi => "edi",
            Reg::R8d => "r8d",
            Reg::R9d => "r9d",
            Reg::R10d => "r10d",
            Reg::R11d => "r11d",
            Reg::R12d => "r12d",
            Reg::R13d => "r13d",
            Reg::R14d => "r14d",
            Reg::R15d => "r15d",
            Reg::Rbp => "rbp",
            Reg::Rsp => "rsp",
            Reg::Xmm0 => "xmm0",
            Reg::Xmm1 => "xmm1",
        }
    }

    pub fn name64(self) -> &'static str {
        match self {
            Reg::Eax => "rax",
            Reg::Ebx => "rbx",
            Reg::Ecx => "rcx",
            Reg::Edx => "rdx",
            Reg::Esi => "rsi",
            Reg::Edi => "rdi",
            Reg::R8d => "r8",
            Reg::R9d => "r9",
            Reg::R10d => "r10",
            Reg::R11d => "r11",
            Reg::R12d => "r12",
            Reg::R13d => "r13",
            Reg::R14d => "r14",
            Reg::R15d => "r15",
            other => other.name32(),
        }
    }

    /// Может ли регистр входить в пул распределения.
    /// `eax`, `edx`, `r11d` и `xmm*` зарезервированы под временные значения.
    pub fn allocatable(self) -> bool {
        !matches!(
            self,
            Reg::Eax | Reg::Edx | Reg::R11d | Reg::Rbp | Reg::Rsp | Reg::Xmm0 | Reg::Xmm1
        )
    }
}

impl FromStr for Reg {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = [
            Reg::Eax,
            Reg::Ebx,
            Reg::Ecx,
            Reg::Edx,
            Reg::Esi,
            Reg::Edi,
            Reg::R8d,
            Reg::R9d,
            Reg::R10d,
            Reg::R11d,
            Reg::R12d,
            Reg::R13d,
            Reg::R14d,
            Reg::R15d,
            Reg::Rbp,
            Reg::Rsp,
            Reg::Xmm0,
            Reg::Xmm1,
        ];
        let s = s.trim().to_ascii_lowercase();
        all.into_iter()
            .find(|r| r.name32() == s || r.name64() == s)
            .ok_or(())
    }
}

/// Ширина операнда.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    /// 4 байта: `int`, `bool`, `float` (биты IEEE-754 single).
    Dword,
    /// 8 байт: указатели на строки.
    Qword,
}

impl Width {
    pub fn bytes(self) -> u32 {
        match self {
            Width::Dword => 4,
            Width::Qword => 8,
        }
    }

    fn ptr(self) -> &'static str {
        match self {
            Width::Dword => "DWORD PTR",
            Width::Qword => "QWORD PTR",
        }
    }
}

/// Операнд инструкции.
#[derive(Debug, Clone, PartialEq)]
pub enum AsmOperand {
    Reg(Reg, Width),
    Imm(i64),
    /// `[rbp + offset]`
    Stack(i32, Width),
    /// Глобальная переменная в `.data`.
    Global(String, Width),
    /// Адрес метки (`OFFSET .LC0`).
    Address(String),
    /// Цель перехода или вызова.
    Label(String),
    /// Младший байт регистра: `al` для `set<cc>`, `cl` для сдвигов.
    Low8(Reg),
}

impl AsmOperand {
    pub fn reg(reg: Reg) -> Self {
        AsmOperand::Reg(reg, Width::Dword)
    }

    pub fn reg64(reg: Reg) -> Self {
        AsmOperand::Reg(reg, Width::Qword)
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, AsmOperand::Stack(..) | AsmOperand::Global(..))
    }
}

impl fmt::Display for AsmOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmOperand::Reg(reg, Width::Dword) => write!(f, "{}", reg.name32()),
            AsmOperand::Reg(reg, Width::Qword) => write!(f, "{}", reg.name64()),
            AsmOperand::Imm(n) => write!(f, "{}", n),
            AsmOperand::Stack(offset, width) if *offset < 0 => {
                write!(f, "{} [rbp - {}]", width.ptr(), -offset)
            }
            AsmOperand::Stack(offset, width) => write!(f, "{} [rbp + {}]", width.ptr(), offset),
            AsmOperand::Global(name, width) => write!(f, "{} [{}]", width.ptr(), name),
            AsmOperand::Address(label) => write!(f, "OFFSET {}", label),
            AsmOperand::Label(label) => write!(f, "{}", label),
            AsmOperand::Low8(reg) => match reg {
                Reg::Eax => write!(f, "al"),
                Reg::Ebx => write!(f, "bl"),
                Reg::Ecx => write!(f, "cl"),
                Reg::Edx => write!(f, "dl"),
                Reg::Esi => write!(f, "sil"),
                Reg::Edi => write!(f, "dil"),
                other => write!(f, "{}b", other.name64()),
            },
        }
    }
}

/// Строка ассемблерного листинга.
#[derive(Debug, Clone, PartialEq)]
pub enum AsmLine {
    /// Директива ассемблера (`.data`, `.globl main`).
    Directive(String),
    /// Данные с меткой: `g: .long 5`.
    Data {
        label: String,
        directive: &'static str,
        value: String,
    },
    Label(String),
    Instr {
        mnemonic: &'static str,
        operands: Vec<AsmOperand>,
    },
    Comment(String),
    Blank,
}

impl AsmLine {
    pub fn instr(mnemonic: &'static str, operands: Vec<AsmOperand>) -> Self {
        AsmLine::Instr { mnemonic, operands }
    }

    pub fn mnemonic(&self) -> Option<&'static str> {
        match self {
            AsmLine::Instr { mnemonic, .. } => Some(*mnemonic),
            _ => None,
        }
    }
}

impl fmt::Display for AsmLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmLine::Directive(text) => write!(f, "{}", text),
            AsmLine::Data {
                label,
                directive,
                value,
            } => write!(f, "{}: {} {}", label, directive, value),
            AsmLine::Label(label) => write!(f, "{}:", label),
            AsmLine::Instr { mnemonic, operands } if operands.is_empty() => {
                write!(f, "    {}", mnemonic)
            }
            AsmLine::Instr { mnemonic, operands } => {
                let operands: Vec<String> = operands.iter().map(|o| o.to_string()).collect();
                write!(f, "    {} {}", mnemonic, operands.join(", "))
            }
            AsmLine::Comment(text) => write!(f, "    ; {}", text),
            AsmLine::Blank => Ok(()),
        }
    }
}

impl Serialize for AsmLine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_names() {
        assert_eq!("ebx".parse::<Reg>(), Ok(Reg::Ebx));
        assert_eq!("R8D".parse::<Reg>(), Ok(Reg::R8d));
        assert_eq!("rsi".parse::<Reg>(), Ok(Reg::Esi));
        assert!("bogus".parse::<Reg>().is_err());
        assert!(!Reg::Eax.allocatable());
        assert!(Reg::R9d.allocatable());
    }

    #[test]
    fn test_line_text() {
        let mov = AsmLine::instr(
            "mov",
            vec![AsmOperand::Stack(-8, Width::Dword), AsmOperand::reg(Reg::Ebx)],
        );
        assert_eq!(mov.to_string(), "    mov DWORD PTR [rbp - 8], ebx");

        let push = AsmLine::instr("push", vec![AsmOperand::reg64(Reg::Eax)]);
        assert_eq!(push.to_string(), "    push rax");

        let param = AsmOperand::Stack(16, Width::Dword);
        assert_eq!(param.to_string(), "DWORD PTR [rbp + 16]");

        let data = AsmLine::Data {
            label: "counter".into(),
            directive: ".long",
            value: "5".into(),
        };
        assert_eq!(data.to_string(), "counter: .long 5");
        assert_eq!(AsmLine::instr("ret", vec![]).to_string(), "    ret");
    }
}
