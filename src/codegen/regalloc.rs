//! Распределение регистров и раскладка кадра.
//!
//! Линейное распределение внутри функции: места (переменные и временные)
//! получают регистры пула в порядке первого упоминания. Когда пул
//! исчерпан, место уходит в слот стека; слоты растут вниз от `rbp`
//! шагом 4 байта (8 для строк). Глобальные переменные не распределяются:
//! они живут в `.data`.

use std::collections::{HashMap, HashSet};

use super::asm::{Reg, Width};
use crate::ir::{Const, Instr, IrProgram, Operand, Place, UnOp};
use crate::types::Type;

/// Где место хранится во время работы функции.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Reg(Reg),
    /// Смещение вниз от `rbp`: место лежит по адресу `[rbp - offset]`.
    Stack(u32),
}

/// Результат распределения для одной функции.
#[derive(Debug, Clone, Default)]
pub struct FrameLayout {
    /// Места в порядке первого упоминания.
    pub order: Vec<Place>,
    pub locations: HashMap<Place, Location>,
    pub widths: HashMap<Place, Width>,
    /// Байт под слоты (без выравнивания).
    pub spill_bytes: u32,
    /// Использованные регистры пула: их сохраняет пролог.
    pub saved: Vec<Reg>,
}

impl FrameLayout {
    /// Размер кадра, выровненный на 16 байт.
    pub fn frame_size(&self) -> u32 {
        self.spill_bytes.div_ceil(16) * 16
    }

    pub fn location(&self, place: &Place) -> Option<Location> {
        self.locations.get(place).copied()
    }

    pub fn width(&self, place: &Place) -> Width {
        self.widths.get(place).copied().unwrap_or(Width::Dword)
    }
}

/// Распределить места функции `part` (код начинается с `Func`).
pub fn allocate(
    part: &[Instr],
    pool: &[Reg],
    types: &HashMap<Place, Type>,
    globals: &HashSet<String>,
) -> FrameLayout {
    let mut layout = FrameLayout::default();
    let mut free = pool.iter().copied();

    for place in places_in_order(part) {
        if matches!(&place, Place::Var(name) if globals.contains(name)) {
            continue;
        }
        if layout.locations.contains_key(&place) {
            continue;
        }

        let width = width_of(types.get(&place).copied().unwrap_or(Type::Int));
        let location = match free.next() {
            Some(reg) => {
                layout.saved.push(reg);
                Location::Reg(reg)
            }
            None => {
                if width == Width::Qword {
                    layout.spill_bytes = layout.spill_bytes.next_multiple_of(8);
                }
                layout.spill_bytes += width.bytes();
                Location::Stack(layout.spill_bytes)
            }
        };
        layout.order.push(place.clone());
        layout.widths.insert(place.clone(), width);
        layout.locations.insert(place, location);
    }

    layout
}

pub fn width_of(ty: Type) -> Width {
    match ty {
        Type::String => Width::Qword,
        _ => Width::Dword,
    }
}

fn places_in_order(part: &[Instr]) -> Vec<Place> {
    let mut places = Vec::new();
    for instr in part {
        if let Instr::Func { params, .. } = instr {
            places.extend(params.iter().cloned().map(Place::Var));
        }
        places.extend(instr.uses().into_iter().filter_map(Operand::as_place).cloned());
        if let Some(dest) = instr.dest() {
            places.push(dest.clone());
        }
    }
    places
}

fn const_type(value: &Const) -> Type {
    match value {
        Const::Int(_) => Type::Int,
        Const::Float(_) => Type::Float,
        Const::Str(_) => Type::String,
    }
}

/// Типы всех мест функции: переменные из таблицы функции, временные
/// выводятся по определяющей инструкции.
pub fn infer_types(function: &str, part: &[Instr], program: &IrProgram) -> HashMap<Place, Type> {
    let mut types: HashMap<Place, Type> = HashMap::new();
    let lookup = |types: &HashMap<Place, Type>, operand: &Operand| match operand {
        Operand::Const(c) => const_type(c),
        Operand::Place(Place::Var(name)) => program.var_type(function, name).unwrap_or(Type::Int),
        Operand::Place(place) => types.get(place).copied().unwrap_or(Type::Int),
    };

    for instr in part {
        if let Instr::Func { params, .. } = instr {
            for param in params {
                let ty = program.var_type(function, param).unwrap_or(Type::Int);
                types.insert(Place::Var(param.clone()), ty);
            }
        }
        for operand in instr.uses() {
            if let Operand::Place(place @ Place::Var(_)) = operand {
                let ty = lookup(&types, operand);
                types.insert(place.clone(), ty);
            }
        }

        let ty = match instr {
            Instr::Assign {
                dest: Place::Var(name),
                src,
            } => program
                .var_type(function, name)
                .unwrap_or_else(|| lookup(&types, src)),
            Instr::Assign { src, .. } => lookup(&types, src),
            Instr::Binary { op, .. } if op.is_comparison() => Type::Int,
            Instr::Binary { ty, .. } => *ty,
            Instr::Unary { op, src, .. } => match op {
                UnOp::IntToFloat => Type::Float,
                UnOp::FloatToInt | UnOp::Not => Type::Int,
                UnOp::Neg => lookup(&types, src),
            },
            Instr::Call { func, .. } => program
                .function(func)
                .map(|f| f.return_type)
                .unwrap_or(Type::Int),
            _ => continue,
        };
        if let Some(dest) = instr.dest() {
            types.insert(dest.clone(), ty);
        }
    }
    types
}
