//! Single-issue toy machine: one cycle per arithmetic or memory instruction.
//!
//! Instructions are JSON objects tagged by `op`; registers index a small
//! scratch file. `pause` and `debug_check` are free and only matter while the
//! corresponding instrumentation is enabled, which it is by default.
use anyhow::{anyhow, bail, Context};
use cascade_core::{Instruction, Machine, Word};
use serde::{Deserialize, Serialize};

pub const SCRATCH_WORDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Const { dst: usize, imm: Word },
    /// `dst = mem[reg[addr]]`
    Load { dst: usize, addr: usize },
    /// `mem[reg[addr]] = reg[src]`
    Store { addr: usize, src: usize },
    Add { dst: usize, a: usize, b: usize },
    Mul { dst: usize, a: usize, b: usize },
    Xor { dst: usize, a: usize, b: usize },
    And { dst: usize, a: usize, b: usize },
    Shr { dst: usize, a: usize, b: usize },
    Lt { dst: usize, a: usize, b: usize },
    Select { dst: usize, cond: usize, a: usize, b: usize },
    Pause,
    DebugCheck,
}

impl Op {
    pub fn to_instruction(self) -> Instruction {
        Instruction(serde_json::to_value(self).unwrap_or_default())
    }

    pub fn costs_cycle(&self) -> bool {
        !matches!(self, Op::Pause | Op::DebugCheck)
    }
}

pub struct ToyMachine {
    mem: Vec<Word>,
    program: Vec<Op>,
    scratch: [Word; SCRATCH_WORDS],
    cycle: u64,
    enable_pause: bool,
    enable_debug: bool,
}

impl ToyMachine {
    pub fn new(mem: Vec<Word>, instrs: &[Instruction], n_cores: usize) -> anyhow::Result<Self> {
        if n_cores != 1 {
            bail!("toy machine has exactly one core, got {}", n_cores);
        }
        let program = instrs
            .iter()
            .enumerate()
            .map(|(i, instr)| {
                serde_json::from_value::<Op>(instr.0.clone())
                    .with_context(|| format!("invalid instruction #{}", i))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            mem,
            program,
            scratch: [0; SCRATCH_WORDS],
            cycle: 0,
            enable_pause: true,
            enable_debug: true,
        })
    }

    fn reg(&self, r: usize) -> anyhow::Result<Word> {
        self.scratch
            .get(r)
            .copied()
            .ok_or_else(|| anyhow!("scratch register {} out of range", r))
    }

    fn set(&mut self, r: usize, v: Word) -> anyhow::Result<()> {
        let slot = self
            .scratch
            .get_mut(r)
            .ok_or_else(|| anyhow!("scratch register {} out of range", r))?;
        *slot = v;
        Ok(())
    }

    fn address(&self, r: usize) -> anyhow::Result<usize> {
        let addr = self.reg(r)? as usize;
        if addr >= self.mem.len() {
            bail!("memory address {} out of range ({} words)", addr, self.mem.len());
        }
        Ok(addr)
    }

    fn binary(&mut self, dst: usize, a: usize, b: usize, f: fn(Word, Word) -> Word) -> anyhow::Result<()> {
        let v = f(self.reg(a)?, self.reg(b)?);
        self.set(dst, v)
    }
}

impl Machine for ToyMachine {
    fn set_enable_pause(&mut self, enabled: bool) {
        self.enable_pause = enabled;
    }

    fn set_enable_debug(&mut self, enabled: bool) {
        self.enable_debug = enabled;
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let program = std::mem::take(&mut self.program);
        let result = self.execute(&program);
        self.program = program;
        result
    }

    fn cycle(&self) -> u64 {
        self.cycle
    }

    fn mem(&self) -> &[Word] {
        &self.mem
    }
}

impl ToyMachine {
    fn execute(&mut self, program: &[Op]) -> anyhow::Result<()> {
        for (pc, op) in program.iter().enumerate() {
            match *op {
                Op::Pause => {
                    if self.enable_pause {
                        break;
                    }
                }
                Op::DebugCheck => {
                    if self.enable_debug {
                        bail!("debug check at pc {} requires a debug session", pc);
                    }
                }
                Op::Const { dst, imm } => self.set(dst, imm)?,
                Op::Load { dst, addr } => {
                    let a = self.address(addr)?;
                    self.set(dst, self.mem[a])?;
                }
                Op::Store { addr, src } => {
                    let a = self.address(addr)?;
                    self.mem[a] = self.reg(src)?;
                }
                Op::Add { dst, a, b } => self.binary(dst, a, b, Word::wrapping_add)?,
                Op::Mul { dst, a, b } => self.binary(dst, a, b, Word::wrapping_mul)?,
                Op::Xor { dst, a, b } => self.binary(dst, a, b, |x, y| x ^ y)?,
                Op::And { dst, a, b } => self.binary(dst, a, b, |x, y| x & y)?,
                Op::Shr { dst, a, b } => self.binary(dst, a, b, |x, y| x.wrapping_shr(y))?,
                Op::Lt { dst, a, b } => self.binary(dst, a, b, |x, y| Word::from(x < y))?,
                Op::Select { dst, cond, a, b } => {
                    let v = if self.reg(cond)? != 0 { self.reg(a)? } else { self.reg(b)? };
                    self.set(dst, v)?;
                }
            }
            if op.costs_cycle() {
                self.cycle += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(ops: &[Op]) -> Vec<Instruction> {
        ops.iter().map(|op| op.to_instruction()).collect()
    }

    #[test]
    fn test_arithmetic_and_store() {
        let instrs = program(&[
            Op::Const { dst: 0, imm: 2 },
            Op::Const { dst: 1, imm: 40 },
            Op::Add { dst: 2, a: 0, b: 1 },
            Op::Store { addr: 0, src: 2 },
        ]);
        let mut m = ToyMachine::new(vec![0; 4], &instrs, 1).unwrap();
        m.run().unwrap();
        assert_eq!(m.mem()[2], 42);
        assert_eq!(m.cycle(), 4);
    }

    #[test]
    fn test_pause_stops_only_when_enabled() {
        let instrs = program(&[
            Op::Pause,
            Op::Const { dst: 0, imm: 0 },
            Op::Const { dst: 1, imm: 9 },
            Op::Store { addr: 0, src: 1 },
        ]);
        let mut paused = ToyMachine::new(vec![0; 1], &instrs, 1).unwrap();
        paused.run().unwrap();
        assert_eq!(paused.mem()[0], 0);

        let mut free = ToyMachine::new(vec![0; 1], &instrs, 1).unwrap();
        free.set_enable_pause(false);
        free.run().unwrap();
        assert_eq!(free.mem()[0], 9);
        assert_eq!(free.cycle(), 3);
    }

    #[test]
    fn test_debug_check_fails_when_enabled() {
        let instrs = program(&[Op::DebugCheck]);
        let mut m = ToyMachine::new(vec![], &instrs, 1).unwrap();
        assert!(m.run().is_err());
        m.set_enable_debug(false);
        assert!(m.run().is_ok());
    }

    #[test]
    fn test_rejects_unknown_op() {
        let instrs = vec![Instruction(serde_json::json!({"op": "valu", "dst": 0}))];
        let err = ToyMachine::new(vec![], &instrs, 1).err().unwrap();
        assert!(err.to_string().contains("invalid instruction #0"));
    }

    #[test]
    fn test_out_of_range_address() {
        let instrs = program(&[Op::Const { dst: 0, imm: 99 }, Op::Load { dst: 1, addr: 0 }]);
        let mut m = ToyMachine::new(vec![0; 4], &instrs, 1).unwrap();
        assert!(m.run().is_err());
    }
}
