//! Интерпретатор оптимизированного трёхадресного кода.
//!
//! Выполнение идёт по базовым блокам графа потока управления, начиная с
//! `_start`. Локальные значения живут в кадрах, а адрес возврата и ссылка
//! на кадр вызывающего кладутся на байтовый стек фиксированного размера:
//! его переполнение даёт ошибку выполнения, а не падение процесса.

use std::collections::HashMap;

use crate::config::CompilerConfig;
use crate::ir::eval::{eval_binary, eval_unary, EvalError};
use crate::ir::{entry_label, Cfg, Const, Instr, IrProgram, Operand, Place, START_FUNCTION};

use super::error::ExecError;
use super::format;

/// Байт на вызов: блок и инструкция возврата (по 4) и ссылка на кадр (8).
pub const CALL_RECORD_BYTES: usize = 16;

/// Кадр вызова.
#[derive(Debug)]
struct Frame {
    function: String,
    locals: HashMap<Place, Const>,
    /// Куда вызывающий ждёт результат.
    dest: Option<Place>,
}

impl Frame {
    fn new(function: impl Into<String>, dest: Option<Place>) -> Self {
        Self {
            function: function.into(),
            locals: HashMap::new(),
            dest,
        }
    }
}

/// Позиция в программе: индекс блока и инструкции в нём.
type Pc = (usize, usize);

enum Flow {
    Next,
    Jump(usize),
    Call { entry: usize, dest: Option<Place>, args: Vec<Const> },
    Return(Option<Const>),
}

/// Виртуальная машина.
pub struct Machine<'a> {
    cfg: &'a Cfg,
    program: &'a IrProgram,
    max_steps: u64,
    globals: HashMap<String, Const>,
    frames: Vec<Frame>,
    stack: Vec<u8>,
    sp: usize,
    args: Vec<Const>,
    output: String,
    steps: u64,
    exit_code: Option<i64>,
}

impl<'a> Machine<'a> {
    pub fn new(program: &'a IrProgram, cfg: &'a Cfg, config: &CompilerConfig) -> Self {
        let globals = program
            .globals
            .iter()
            .map(|g| (g.name.clone(), Const::zero(g.ty)))
            .collect();
        Self {
            cfg,
            program,
            max_steps: config.max_steps,
            globals,
            frames: Vec::new(),
            stack: vec![0; config.stack_size],
            sp: 0,
            args: Vec::new(),
            output: String::new(),
            steps: 0,
            exit_code: None,
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Значение, которое вернула `main`.
    pub fn exit_code(&self) -> Option<i64> {
        self.exit_code
    }

    /// Выполнить программу до возврата из `_start`.
    pub fn run(&mut self) -> Result<(), ExecError> {
        let cfg = self.cfg;
        let entry = cfg
            .block_index(&entry_label(START_FUNCTION))
            .ok_or_else(|| ExecError::UndefinedFunction {
                name: START_FUNCTION.to_string(),
            })?;
        self.frames.push(Frame::new(START_FUNCTION, None));
        let mut pc: Pc = (entry, 0);

        loop {
            let block = &cfg.blocks[pc.0];
            let Some(instr) = block.instructions.get(pc.1) else {
                // Конец блока без перехода: дальше по единственному преемнику
                match block.successors.first() {
                    Some(next) => {
                        pc = (self.label_index(next)?, 0);
                        continue;
                    }
                    None => match self.return_from(None)? {
                        Some(next) => {
                            pc = next;
                            continue;
                        }
                        None => return Ok(()),
                    },
                }
            };

            if self.steps >= self.max_steps {
                return Err(ExecError::StepLimit { limit: self.max_steps });
            }
            self.steps += 1;

            match self.execute(instr)? {
                Flow::Next => pc.1 += 1,
                Flow::Jump(index) => pc = (index, 0),
                Flow::Call { entry, dest, args } => {
                    self.call(entry, dest, args, (pc.0, pc.1 + 1))?;
                    pc = (entry, 0);
                }
                Flow::Return(value) => match self.return_from(value)? {
                    Some(next) => pc = next,
                    None => return Ok(()),
                },
            }
        }
    }

    fn function(&self) -> &str {
        self.frames.last().map(|f| f.function.as_str()).unwrap_or(START_FUNCTION)
    }

    fn label_index(&self, label: &str) -> Result<usize, ExecError> {
        self.cfg.block_index(label).ok_or_else(|| ExecError::UndefinedLabel {
            label: label.to_string(),
        })
    }

    fn read(&self, operand: &Operand) -> Result<Const, ExecError> {
        let place = match operand {
            Operand::Const(value) => return Ok(value.clone()),
            Operand::Place(place) => place,
        };
        if let Some(value) = self.frames.last().and_then(|f| f.locals.get(place)) {
            return Ok(value.clone());
        }
        if let Place::Var(name) = place {
            if let Some(value) = self.globals.get(name) {
                return Ok(value.clone());
            }
            if let Some(ty) = self.program.var_type(self.function(), name) {
                return Ok(Const::zero(ty));
            }
        }
        Err(ExecError::UndefinedValue {
            name: place.to_string(),
            function: self.function().to_string(),
        })
    }

    fn write(&mut self, place: &Place, value: Const) {
        if let Place::Var(name) = place {
            if let Some(slot) = self.globals.get_mut(name) {
                *slot = value;
                return;
            }
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.locals.insert(place.clone(), value);
        }
    }

    fn eval_error(&self, err: EvalError) -> ExecError {
        match err {
            EvalError::DivisionByZero => ExecError::DivisionByZero {
                function: self.function().to_string(),
            },
            other => ExecError::InvalidOperation {
                function: self.function().to_string(),
                message: other.to_string(),
            },
        }
    }

    fn execute(&mut self, instr: &Instr) -> Result<Flow, ExecError> {
        match instr {
            Instr::Func { .. } | Instr::Label(_) => {}
            Instr::Assign { dest, src } => {
                let value = self.read(src)?;
                self.write(dest, value);
            }
            Instr::Binary { dest, op, lhs, rhs, .. } => {
                let lhs = self.read(lhs)?;
                let rhs = self.read(rhs)?;
                let value = eval_binary(*op, &lhs, &rhs).map_err(|e| self.eval_error(e))?;
                self.write(dest, value);
            }
            Instr::Unary { dest, op, src } => {
                let src = self.read(src)?;
                let value = eval_unary(*op, &src).map_err(|e| self.eval_error(e))?;
                self.write(dest, value);
            }
            Instr::Jump(target) => return Ok(Flow::Jump(self.label_index(target)?)),
            Instr::JumpIfFalse { cond, target } => {
                if !self.read(cond)?.is_truthy() {
                    return Ok(Flow::Jump(self.label_index(target)?));
                }
            }
            Instr::JumpIfTrue { cond, target } => {
                if self.read(cond)?.is_truthy() {
                    return Ok(Flow::Jump(self.label_index(target)?));
                }
            }
            Instr::Param(value) => {
                let value = self.read(value)?;
                self.args.push(value);
            }
            Instr::Call { dest, func, argc } => {
                let split = self.args.len().saturating_sub(*argc);
                let args = self.args.split_off(split);
                if let Some(value) = self.builtin(func, &args)? {
                    if let Some(dest) = dest {
                        self.write(dest, value);
                    }
                    return Ok(Flow::Next);
                }
                let entry = self
                    .cfg
                    .block_index(&entry_label(func))
                    .ok_or_else(|| ExecError::UndefinedFunction { name: func.clone() })?;
                return Ok(Flow::Call {
                    entry,
                    dest: dest.clone(),
                    args,
                });
            }
            Instr::Return(value) => {
                let value = match value {
                    Some(value) => Some(self.read(value)?),
                    None => None,
                };
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    /// Встроенные функции. `None` — функция не встроенная.
    fn builtin(&mut self, func: &str, args: &[Const]) -> Result<Option<Const>, ExecError> {
        match func {
            "printf" => {
                let text = match args.first() {
                    Some(Const::Str(fmt)) => format::printf(fmt, &args[1..])?,
                    _ => {
                        return Err(ExecError::Format {
                            message: "first argument must be a format string".to_string(),
                        })
                    }
                };
                self.output.push_str(&text);
                Ok(Some(Const::Int(text.len() as i64)))
            }
            "print" => {
                if let Some(value) = args.first() {
                    self.output.push_str(&format::print(value));
                }
                Ok(Some(Const::Int(0)))
            }
            _ => Ok(None),
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), ExecError> {
        let end = self.sp + bytes.len();
        if end > self.stack.len() {
            return Err(ExecError::StackOverflow {
                function: self.function().to_string(),
                depth: self.frames.len(),
                size: self.stack.len(),
            });
        }
        self.stack[self.sp..end].copy_from_slice(bytes);
        self.sp = end;
        Ok(())
    }

    fn pop_bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0u8; N];
        let start = self.sp.saturating_sub(N);
        bytes.copy_from_slice(&self.stack[start..start + N]);
        self.sp = start;
        bytes
    }

    fn call(
        &mut self,
        entry: usize,
        dest: Option<Place>,
        args: Vec<Const>,
        ret: Pc,
    ) -> Result<(), ExecError> {
        let (name, params) = match self.cfg.blocks[entry].instructions.first() {
            Some(Instr::Func { name, params }) => (name.clone(), params.clone()),
            _ => (self.cfg.blocks[entry].function.clone(), Vec::new()),
        };

        self.push_bytes(&(ret.0 as u32).to_le_bytes())?;
        self.push_bytes(&(ret.1 as u32).to_le_bytes())?;
        self.push_bytes(&(self.frames.len() as u64).to_le_bytes())?;

        let mut frame = Frame::new(name, dest);
        for (param, value) in params.into_iter().zip(args) {
            frame.locals.insert(Place::Var(param), value);
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Вернуться из текущего кадра. `None` — завершился `_start`.
    fn return_from(&mut self, value: Option<Const>) -> Result<Option<Pc>, ExecError> {
        let Some(frame) = self.frames.pop() else {
            return Ok(None);
        };
        if self.frames.is_empty() {
            return Ok(None);
        }

        let link = u64::from_le_bytes(self.pop_bytes::<8>()) as usize;
        let index = u32::from_le_bytes(self.pop_bytes::<4>()) as usize;
        let block = u32::from_le_bytes(self.pop_bytes::<4>()) as usize;
        debug_assert_eq!(link, self.frames.len());

        if frame.function == "main" && self.frames.len() == 1 {
            self.exit_code = value.as_ref().map(|v| match v {
                Const::Int(n) => *n,
                Const::Float(x) => *x as i64,
                Const::Str(_) => 0,
            });
        }
        if let (Some(dest), Some(value)) = (frame.dest, value) {
            self.write(&dest, value);
        }
        Ok(Some((block, index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opt::optimize;
    use crate::opt::test_support::ir_of;

    fn run_with(source: &str, config: &CompilerConfig) -> (Result<(), ExecError>, String, Option<i64>) {
        let ir = ir_of(source);
        let optimized = optimize(&ir);
        let mut machine = Machine::new(&optimized.program, &optimized.cfg, config);
        let result = machine.run();
        (result, machine.output().to_string(), machine.exit_code())
    }

    fn run(source: &str) -> (Result<(), ExecError>, String, Option<i64>) {
        run_with(source, &CompilerConfig::default())
    }

    #[test]
    fn test_recursion_and_printf() {
        let (result, output, exit) = run(
            "int fact(int n) { if (n <= 1) return 1; return n * fact(n - 1); }\n\
             int main() { printf(\"Factorial of %d is %d\\n\", 5, fact(5)); return 0; }",
        );
        assert_eq!(result, Ok(()));
        assert_eq!(output, "Factorial of 5 is 120\n");
        assert_eq!(exit, Some(0));
    }

    #[test]
    fn test_loops_and_globals() {
        let (result, output, _) = run(
            "int total = 0;\n\
             void add(int k) { total = total + k; }\n\
             int main() { for (int i = 1; i <= 4; i++) { add(i); } print(total); return total; }",
        );
        assert_eq!(result, Ok(()));
        assert_eq!(output, "10\n");
    }

    #[test]
    fn test_exit_code_from_main() {
        let (_, _, exit) = run("int main() { int x = 6; return x * 7; }");
        assert_eq!(exit, Some(42));
    }

    #[test]
    fn test_division_by_zero_at_runtime() {
        let (result, _, _) = run("int div(int a, int b) { return a / b; } int main() { return div(1, 0); }");
        assert!(matches!(result, Err(ExecError::DivisionByZero { ref function }) if function == "div"));
    }

    #[test]
    fn test_step_limit() {
        let config = CompilerConfig {
            max_steps: 500,
            ..CompilerConfig::default()
        };
        let (result, _, _) = run_with("int main() { int x = 0; while (1) { x = x + 1; } return 0; }", &config);
        assert_eq!(result, Err(ExecError::StepLimit { limit: 500 }));
    }

    #[test]
    fn test_unbounded_recursion_overflows_stack() {
        let config = CompilerConfig {
            stack_size: 64 * CALL_RECORD_BYTES,
            ..CompilerConfig::default()
        };
        let (result, _, _) = run_with("int f(int n) { return f(n + 1); } int main() { return f(0); }", &config);
        assert!(matches!(result, Err(ExecError::StackOverflow { ref function, .. }) if function == "f"));
    }

    #[test]
    fn test_float_output() {
        let (result, output, _) = run("int main() { float x = 7; printf(\"%.2f\\n\", x / 2); return 0; }");
        assert_eq!(result, Ok(()));
        assert_eq!(output, "3.50\n");
    }
}
