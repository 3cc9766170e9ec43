//! Выбор инструкций x86-64 по оптимизированному трёхадресному коду.
//!
//! Соглашение о вызовах (собственное, не System V):
//! - аргументы кладутся в стек `push` слева направо, стек чистит вызывающий;
//! - в функции `i`-й из `n` параметров лежит по адресу
//!   `[rbp + 16 + 8 * (n - 1 - i)]`;
//! - результат возвращается в `eax` (`rax` для строк);
//! - вызываемая функция сохраняет используемые регистры пула.
//!
//! `float` хранится как биты IEEE-754 single в 4-байтовых ячейках и
//! обрабатывается через `xmm0`/`xmm1`.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::asm::{AsmLine, AsmOperand, Reg, Width};
use super::error::CodegenError;
use super::regalloc::{allocate, infer_types, width_of, FrameLayout, Location};
use crate::ir::{split_functions, BinOp, Const, Instr, IrProgram, Operand, Place, UnOp};
use crate::types::Type;

/// Результат работы генератора.
pub struct Emitted {
    pub lines: Vec<AsmLine>,
    pub register_allocation: BTreeMap<String, String>,
    pub stack_frame: BTreeMap<String, u32>,
    pub errors: Vec<CodegenError>,
}

struct FunctionCtx {
    exit_label: String,
    layout: FrameLayout,
    types: HashMap<Place, Type>,
}

pub struct Emitter<'p> {
    program: &'p IrProgram,
    pool: Vec<Reg>,
    max_frame_bytes: u32,
    globals: HashSet<String>,
    strings: Vec<String>,
    text: Vec<AsmLine>,
    register_allocation: BTreeMap<String, String>,
    stack_frame: BTreeMap<String, u32>,
    errors: Vec<CodegenError>,
}

fn label(name: &str) -> String {
    format!(".{}", name)
}

fn eax() -> AsmOperand {
    AsmOperand::reg(Reg::Eax)
}

fn set_cc(op: BinOp, float: bool) -> &'static str {
    match (op, float) {
        (BinOp::Eq, _) => "sete",
        (BinOp::Ne, _) => "setne",
        (BinOp::Lt, false) => "setl",
        (BinOp::Gt, false) => "setg",
        (BinOp::Le, false) => "setle",
        (BinOp::Ge, false) => "setge",
        (BinOp::Lt, true) => "setb",
        (BinOp::Gt, true) => "seta",
        (BinOp::Le, true) => "setbe",
        (BinOp::Ge, true) => "setae",
        _ => "sete",
    }
}

impl<'p> Emitter<'p> {
    pub fn new(program: &'p IrProgram, pool: Vec<Reg>, max_frame_bytes: u32) -> Self {
        Self {
            program,
            pool,
            max_frame_bytes,
            globals: program.globals.iter().map(|g| g.name.clone()).collect(),
            strings: Vec::new(),
            text: Vec::new(),
            register_allocation: BTreeMap::new(),
            stack_frame: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn run(mut self) -> Emitted {
        for part in split_functions(&self.program.code) {
            self.function(&part);
        }

        let mut lines = vec![AsmLine::Directive(".intel_syntax noprefix".to_string())];

        let data = self.data_section();
        if !self.strings.is_empty() {
            lines.push(AsmLine::Blank);
            lines.push(AsmLine::Directive(".section .rodata".to_string()));
            for (i, s) in self.strings.iter().enumerate() {
                lines.push(AsmLine::Data {
                    label: format!(".LC{}", i),
                    directive: ".string",
                    value: format!("{:?}", s),
                });
            }
        }
        if !data.is_empty() {
            lines.push(AsmLine::Blank);
            lines.push(AsmLine::Directive(".data".to_string()));
            lines.extend(data);
        }
        lines.push(AsmLine::Blank);
        lines.push(AsmLine::Directive(".text".to_string()));
        lines.push(AsmLine::Directive(format!(".globl {}", crate::ir::START_FUNCTION)));
        lines.append(&mut self.text);

        Emitted {
            lines,
            register_allocation: self.register_allocation,
            stack_frame: self.stack_frame,
            errors: self.errors,
        }
    }

    fn data_section(&mut self) -> Vec<AsmLine> {
        let program = self.program;
        let mut data = Vec::new();
        for global in &program.globals {
            let (directive, value) = match (global.ty, &global.init) {
                (Type::Float, Some(Const::Float(x))) => (".float", format!("{:?}", x)),
                (Type::Float, Some(Const::Int(n))) => (".float", format!("{:?}", *n as f64)),
                (Type::Float, _) => (".float", "0.0".to_string()),
                (Type::String, Some(Const::Str(s))) => (".quad", self.intern(s)),
                (Type::String, _) => (".quad", "0".to_string()),
                (_, Some(Const::Int(n))) => (".long", n.to_string()),
                (_, _) => (".long", "0".to_string()),
            };
            data.push(AsmLine::Data {
                label: global.name.clone(),
                directive,
                value,
            });
        }
        data
    }

    fn intern(&mut self, s: &str) -> String {
        let index = match self.strings.iter().position(|known| known == s) {
            Some(i) => i,
            None => {
                self.strings.push(s.to_string());
                self.strings.len() - 1
            }
        };
        format!(".LC{}", index)
    }

    // === Функции ===

    fn function(&mut self, part: &[Instr]) {
        let Some(Instr::Func { name, params }) = part.first() else {
            return;
        };

        let types = infer_types(name, part, self.program);
        let layout = allocate(part, &self.pool, &types, &self.globals);

        let frame = layout.frame_size();
        if frame > self.max_frame_bytes {
            self.errors.push(CodegenError::FrameTooLarge {
                function: name.clone(),
                size: frame,
                limit: self.max_frame_bytes,
            });
        }

        for place in &layout.order {
            let key = format!("{}.{}", name, place);
            match layout.location(place) {
                Some(Location::Reg(reg)) => {
                    let reg = AsmOperand::Reg(reg, layout.width(place));
                    self.register_allocation.insert(key, reg.to_string());
                }
                Some(Location::Stack(offset)) => {
                    self.stack_frame.insert(key, offset);
                }
                None => {}
            }
        }

        let f = FunctionCtx {
            exit_label: format!(".Lret_{}", name),
            layout,
            types,
        };

        self.text.push(AsmLine::Blank);
        self.text.push(AsmLine::Label(name.clone()));
        self.emit("push", vec![AsmOperand::reg64(Reg::Rbp)]);
        self.emit("mov", vec![AsmOperand::reg64(Reg::Rbp), AsmOperand::reg64(Reg::Rsp)]);
        if frame > 0 {
            self.emit("sub", vec![AsmOperand::reg64(Reg::Rsp), AsmOperand::Imm(i64::from(frame))]);
        }
        for reg in &f.layout.saved {
            self.emit("push", vec![AsmOperand::reg64(*reg)]);
        }

        let count = params.len();
        for (i, param) in params.iter().enumerate() {
            let place = Place::Var(param.clone());
            let width = f.layout.width(&place);
            let offset = 16 + 8 * (count - 1 - i) as i32;
            let dst = self.place(&f, &place);
            self.mov(dst, AsmOperand::Stack(offset, width), width);
        }

        for instr in &part[1..] {
            self.text.push(AsmLine::Comment(instr.to_string()));
            self.instr(&f, instr);
        }

        self.text.push(AsmLine::Label(f.exit_label.clone()));
        for reg in f.layout.saved.iter().rev() {
            self.emit("pop", vec![AsmOperand::reg64(*reg)]);
        }
        self.emit("mov", vec![AsmOperand::reg64(Reg::Rsp), AsmOperand::reg64(Reg::Rbp)]);
        self.emit("pop", vec![AsmOperand::reg64(Reg::Rbp)]);
        self.emit("ret", vec![]);
    }

    // === Операнды ===

    fn emit(&mut self, mnemonic: &'static str, operands: Vec<AsmOperand>) {
        self.text.push(AsmLine::instr(mnemonic, operands));
    }

    fn type_of(&self, f: &FunctionCtx, operand: &Operand) -> Type {
        match operand {
            Operand::Const(Const::Int(_)) => Type::Int,
            Operand::Const(Const::Float(_)) => Type::Float,
            Operand::Const(Const::Str(_)) => Type::String,
            Operand::Place(Place::Var(name)) if self.globals.contains(name) => self
                .program
                .global(name)
                .map(|g| g.ty)
                .unwrap_or(Type::Int),
            Operand::Place(place) => f.types.get(place).copied().unwrap_or(Type::Int),
        }
    }

    fn width(&self, f: &FunctionCtx, operand: &Operand) -> Width {
        width_of(self.type_of(f, operand))
    }

    fn place(&self, f: &FunctionCtx, place: &Place) -> AsmOperand {
        if let Place::Var(name) = place {
            if self.globals.contains(name) {
                let ty = self.program.global(name).map(|g| g.ty).unwrap_or(Type::Int);
                return AsmOperand::Global(name.clone(), width_of(ty));
            }
        }
        let width = f.layout.width(place);
        match f.layout.location(place) {
            Some(Location::Reg(reg)) => AsmOperand::Reg(reg, width),
            Some(Location::Stack(offset)) => AsmOperand::Stack(-(offset as i32), width),
            // Каждое место функции распределено; сюда попадает только пустой код
            None => AsmOperand::Reg(Reg::Eax, width),
        }
    }

    fn operand(&mut self, f: &FunctionCtx, operand: &Operand) -> AsmOperand {
        match operand {
            Operand::Const(Const::Int(n)) => AsmOperand::Imm(*n),
            Operand::Const(Const::Float(x)) => {
                AsmOperand::Imm(i64::from((*x as f32).to_bits() as i32))
            }
            Operand::Const(Const::Str(s)) => AsmOperand::Address(self.intern(s)),
            Operand::Place(place) => self.place(f, place),
        }
    }

    /// `mov` с обходом запрещённых форм (память ← память, память ← imm64).
    fn mov(&mut self, dst: AsmOperand, src: AsmOperand, width: Width) {
        if dst == src {
            return;
        }
        let via_scratch = dst.is_memory()
            && (src.is_memory()
                || matches!(src, AsmOperand::Address(_))
                || (width == Width::Qword && matches!(src, AsmOperand::Imm(_))));
        if via_scratch {
            let scratch = AsmOperand::Reg(Reg::Eax, width);
            self.emit("mov", vec![scratch.clone(), src]);
            self.emit("mov", vec![dst, scratch]);
        } else {
            self.emit("mov", vec![dst, src]);
        }
    }

    fn load(&mut self, reg: Reg, src: AsmOperand, width: Width) {
        self.mov(AsmOperand::Reg(reg, width), src, width);
    }

    fn store_eax(&mut self, f: &FunctionCtx, dest: &Place) {
        let dst = self.place(f, dest);
        let width = match &dst {
            AsmOperand::Reg(_, w) | AsmOperand::Stack(_, w) | AsmOperand::Global(_, w) => *w,
            _ => Width::Dword,
        };
        self.mov(dst, AsmOperand::Reg(Reg::Eax, width), width);
    }

    // === Инструкции ===

    fn instr(&mut self, f: &FunctionCtx, instr: &Instr) {
        match instr {
            Instr::Func { .. } => {}
            Instr::Assign { dest, src } => {
                let dst = self.place(f, dest);
                let width = f
                    .layout
                    .widths
                    .get(dest)
                    .copied()
                    .unwrap_or_else(|| self.width(f, src));
                let width = if let AsmOperand::Global(_, w) = &dst { *w } else { width };
                let src = self.operand(f, src);
                self.mov(dst, src, width);
            }
            Instr::Binary {
                dest,
                op,
                lhs,
                rhs,
                ty,
            } => match ty {
                Type::Float => self.float_binary(f, dest, *op, lhs, rhs),
                Type::String => self.string_compare(f, dest, *op, lhs, rhs),
                _ => self.int_binary(f, dest, *op, lhs, rhs),
            },
            Instr::Unary { dest, op, src } => self.unary(f, dest, *op, src),
            Instr::Label(name) => self.text.push(AsmLine::Label(label(name))),
            Instr::Jump(target) => self.emit("jmp", vec![AsmOperand::Label(label(target))]),
            Instr::JumpIfFalse { cond, target } => self.branch(f, cond, target, "je"),
            Instr::JumpIfTrue { cond, target } => self.branch(f, cond, target, "jne"),
            Instr::Param(value) => {
                let width = self.width(f, value);
                let src = self.operand(f, value);
                self.load(Reg::Eax, src, width);
                self.emit("push", vec![AsmOperand::reg64(Reg::Eax)]);
            }
            Instr::Call { dest, func, argc } => {
                self.emit("call", vec![AsmOperand::Label(func.clone())]);
                if *argc > 0 {
                    self.emit(
                        "add",
                        vec![AsmOperand::reg64(Reg::Rsp), AsmOperand::Imm(8 * *argc as i64)],
                    );
                }
                if let Some(dest) = dest {
                    self.store_eax(f, dest);
                }
            }
            Instr::Return(value) => {
                if let Some(value) = value {
                    let width = self.width(f, value);
                    let src = self.operand(f, value);
                    self.load(Reg::Eax, src, width);
                }
                self.emit("jmp", vec![AsmOperand::Label(f.exit_label.clone())]);
            }
        }
    }

    fn branch(&mut self, f: &FunctionCtx, cond: &Operand, target: &str, jump: &'static str) {
        let float = self.type_of(f, cond) == Type::Float;
        let src = self.operand(f, cond);
        self.load(Reg::Eax, src, Width::Dword);
        if float {
            // -0.0 тоже ложь
            self.emit("and", vec![eax(), AsmOperand::Imm(0x7fff_ffff)]);
        }
        self.emit("cmp", vec![eax(), AsmOperand::Imm(0)]);
        self.emit(jump, vec![AsmOperand::Label(label(target))]);
    }

    fn int_binary(&mut self, f: &FunctionCtx, dest: &Place, op: BinOp, lhs: &Operand, rhs: &Operand) {
        let l = self.operand(f, lhs);
        let r = self.operand(f, rhs);
        self.load(Reg::Eax, l, Width::Dword);

        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul => {
                let mnemonic = match op {
                    BinOp::Add => "add",
                    BinOp::Sub => "sub",
                    _ => "imul",
                };
                self.emit(mnemonic, vec![eax(), r]);
                self.store_eax(f, dest);
            }
            BinOp::Shl | BinOp::Shr => {
                let mnemonic = if op == BinOp::Shl { "sal" } else { "sar" };
                if let AsmOperand::Imm(_) = r {
                    self.emit(mnemonic, vec![eax(), r]);
                } else {
                    self.emit("push", vec![AsmOperand::reg64(Reg::Ecx)]);
                    self.load(Reg::Ecx, r, Width::Dword);
                    self.emit(mnemonic, vec![eax(), AsmOperand::Low8(Reg::Ecx)]);
                    self.emit("pop", vec![AsmOperand::reg64(Reg::Ecx)]);
                }
                self.store_eax(f, dest);
            }
            BinOp::Div | BinOp::Mod => {
                self.emit("cdq", vec![]);
                self.load(Reg::R11d, r, Width::Dword);
                self.emit("idiv", vec![AsmOperand::reg(Reg::R11d)]);
                if op == BinOp::Mod {
                    self.emit("mov", vec![eax(), AsmOperand::reg(Reg::Edx)]);
                }
                self.store_eax(f, dest);
            }
            _ => {
                self.emit("cmp", vec![eax(), r]);
                self.set_flag(f, dest, op, false);
            }
        }
    }

    fn float_binary(&mut self, f: &FunctionCtx, dest: &Place, op: BinOp, lhs: &Operand, rhs: &Operand) {
        let l = self.operand(f, lhs);
        let r = self.operand(f, rhs);
        self.load(Reg::Eax, l, Width::Dword);
        self.emit("movd", vec![AsmOperand::reg(Reg::Xmm0), eax()]);
        self.load(Reg::Eax, r, Width::Dword);
        self.emit("movd", vec![AsmOperand::reg(Reg::Xmm1), eax()]);

        let arith = match op {
            BinOp::Add => Some("addss"),
            BinOp::Sub => Some("subss"),
            BinOp::Mul => Some("mulss"),
            BinOp::Div => Some("divss"),
            _ => None,
        };
        match arith {
            Some(mnemonic) => {
                self.emit(
                    mnemonic,
                    vec![AsmOperand::reg(Reg::Xmm0), AsmOperand::reg(Reg::Xmm1)],
                );
                self.emit("movd", vec![eax(), AsmOperand::reg(Reg::Xmm0)]);
                self.store_eax(f, dest);
            }
            None => {
                self.emit(
                    "comiss",
                    vec![AsmOperand::reg(Reg::Xmm0), AsmOperand::reg(Reg::Xmm1)],
                );
                self.set_flag(f, dest, op, true);
            }
        }
    }

    fn string_compare(&mut self, f: &FunctionCtx, dest: &Place, op: BinOp, lhs: &Operand, rhs: &Operand) {
        for operand in [lhs, rhs] {
            let src = self.operand(f, operand);
            self.load(Reg::Eax, src, Width::Qword);
            self.emit("push", vec![AsmOperand::reg64(Reg::Eax)]);
        }
        self.emit("call", vec![AsmOperand::Label("strcmp".to_string())]);
        self.emit("add", vec![AsmOperand::reg64(Reg::Rsp), AsmOperand::Imm(16)]);
        self.emit("cmp", vec![eax(), AsmOperand::Imm(0)]);
        self.set_flag(f, dest, op, false);
    }

    fn set_flag(&mut self, f: &FunctionCtx, dest: &Place, op: BinOp, float: bool) {
        self.emit(set_cc(op, float), vec![AsmOperand::Low8(Reg::Eax)]);
        self.emit("movzx", vec![eax(), AsmOperand::Low8(Reg::Eax)]);
        self.store_eax(f, dest);
    }

    fn unary(&mut self, f: &FunctionCtx, dest: &Place, op: UnOp, src: &Operand) {
        let float = self.type_of(f, src) == Type::Float;
        let value = self.operand(f, src);
        self.load(Reg::Eax, value, Width::Dword);

        match op {
            UnOp::Neg if float => {
                self.emit("xor", vec![eax(), AsmOperand::Imm(i64::from(i32::MIN))]);
            }
            UnOp::Neg => self.emit("neg", vec![eax()]),
            UnOp::Not => {
                if float {
                    self.emit("and", vec![eax(), AsmOperand::Imm(0x7fff_ffff)]);
                }
                self.emit("cmp", vec![eax(), AsmOperand::Imm(0)]);
                self.emit("sete", vec![AsmOperand::Low8(Reg::Eax)]);
                self.emit("movzx", vec![eax(), AsmOperand::Low8(Reg::Eax)]);
            }
            UnOp::IntToFloat => {
                self.emit("cvtsi2ss", vec![AsmOperand::reg(Reg::Xmm0), eax()]);
                self.emit("movd", vec![eax(), AsmOperand::reg(Reg::Xmm0)]);
            }
            UnOp::FloatToInt => {
                self.emit("movd", vec![AsmOperand::reg(Reg::Xmm0), eax()]);
                self.emit("cvttss2si", vec![eax(), AsmOperand::reg(Reg::Xmm0)]);
            }
        }
        self.store_eax(f, dest);
    }
}
