//! Reference interpreter for the ILOC subset.
//!
//! Executes a block over an unbounded register file and a flat memory
//! (reads of untouched cells yield 0) and collects the values printed by
//! `output`. The same engine runs at two naming levels: over source
//! registers for freshly parsed input, and over physical registers for
//! allocated output. Comparing the two output sequences is how the tests
//! check that allocation preserved the program's behavior.
//!
//! Arithmetic wraps on overflow; shift amounts outside `0..64` produce 0.
//! Both choices only matter for degenerate programs and apply identically
//! at either naming level.

use crate::ir::{Block, Opcode, Operand, INVALID};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("instruction {index} ({op}) names a register with no {level} assignment")]
    UnassignedRegister {
        index: usize,
        op: Opcode,
        level: &'static str,
    },
}

/// Which register-name field of each operand to execute over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Naming {
    Source,
    Physical,
}

impl Naming {
    fn slot(self, op: &Operand) -> i64 {
        match self {
            Naming::Source => op.sr,
            Naming::Physical => op.pr,
        }
    }

    fn level(self) -> &'static str {
        match self {
            Naming::Source => "source",
            Naming::Physical => "physical",
        }
    }
}

/// Run a freshly parsed block over its source registers.
pub fn run_source(block: &Block) -> Result<Vec<i64>, EvalError> {
    run(block, Naming::Source)
}

/// Run an allocated block over its physical registers.
pub fn run_allocated(block: &Block) -> Result<Vec<i64>, EvalError> {
    run(block, Naming::Physical)
}

fn run(block: &Block, naming: Naming) -> Result<Vec<i64>, EvalError> {
    let mut regs: HashMap<i64, i64> = HashMap::new();
    let mut mem: HashMap<i64, i64> = HashMap::new();
    let mut outputs = Vec::new();

    for (index, inst) in block.iter().enumerate() {
        let slot = |op: &Operand| -> Result<i64, EvalError> {
            let r = naming.slot(op);
            if r == INVALID {
                Err(EvalError::UnassignedRegister {
                    index,
                    op: inst.op,
                    level: naming.level(),
                })
            } else {
                Ok(r)
            }
        };
        let read = |regs: &HashMap<i64, i64>, r: i64| regs.get(&r).copied().unwrap_or(0);

        match inst.op {
            Opcode::LoadI => {
                let dest = slot(&inst.dest)?;
                regs.insert(dest, inst.src1.sr);
            }
            Opcode::Load => {
                let addr = read(&regs, slot(&inst.src1)?);
                let dest = slot(&inst.dest)?;
                let value = mem.get(&addr).copied().unwrap_or(0);
                regs.insert(dest, value);
            }
            Opcode::Store => {
                let value = read(&regs, slot(&inst.src1)?);
                let addr = read(&regs, slot(&inst.src2)?);
                mem.insert(addr, value);
            }
            Opcode::Output => {
                outputs.push(mem.get(&inst.src1.sr).copied().unwrap_or(0));
            }
            Opcode::Nop => {}
            _ => {
                let a = read(&regs, slot(&inst.src1)?);
                let b = read(&regs, slot(&inst.src2)?);
                let dest = slot(&inst.dest)?;
                regs.insert(dest, apply(inst.op, a, b));
            }
        }
    }

    Ok(outputs)
}

fn apply(op: Opcode, a: i64, b: i64) -> i64 {
    match op {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mult => a.wrapping_mul(b),
        Opcode::Lshift => shift(a, b, |v, s| v.wrapping_shl(s)),
        Opcode::Rshift => shift(a, b, |v, s| v.wrapping_shr(s)),
        _ => unreachable!("not an arithmetic opcode: {op}"),
    }
}

fn shift(value: i64, amount: i64, f: impl Fn(i64, u32) -> i64) -> i64 {
    if (0..64).contains(&amount) {
        f(value, amount as u32)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Instruction;

    fn block(insts: impl IntoIterator<Item = Instruction>) -> Block {
        insts.into_iter().collect()
    }

    #[test]
    fn test_store_then_output() {
        let b = block([
            Instruction::load_i(42, 0),
            Instruction::load_i(1024, 1),
            Instruction::store(0, 1),
            Instruction::output(1024),
        ]);
        assert_eq!(run_source(&b).unwrap(), vec![42]);
    }

    #[test]
    fn test_arithmetic_semantics() {
        let b = block([
            Instruction::load_i(6, 0),
            Instruction::load_i(3, 1),
            Instruction::add(0, 1, 2),    // 9
            Instruction::sub(0, 1, 3),    // 3
            Instruction::mult(0, 1, 4),   // 18
            Instruction::arith(Opcode::Lshift, 0, 1, 5), // 48
            Instruction::arith(Opcode::Rshift, 0, 1, 6), // 0
            Instruction::load_i(100, 7),
            Instruction::store(2, 7),
            Instruction::output(100),
            Instruction::load_i(104, 7),
            Instruction::store(5, 7),
            Instruction::output(104),
        ]);
        assert_eq!(run_source(&b).unwrap(), vec![9, 48]);
    }

    #[test]
    fn test_load_reads_what_store_wrote() {
        let b = block([
            Instruction::load_i(7, 0),
            Instruction::load_i(2048, 1),
            Instruction::store(0, 1),
            Instruction::load(1, 2),
            Instruction::add(2, 2, 3),
            Instruction::store(3, 1),
            Instruction::output(2048),
        ]);
        assert_eq!(run_source(&b).unwrap(), vec![14]);
    }

    #[test]
    fn test_untouched_memory_reads_zero() {
        let b = block([Instruction::output(512)]);
        assert_eq!(run_source(&b).unwrap(), vec![0]);
    }

    #[test]
    fn test_output_order_is_program_order() {
        let b = block([
            Instruction::load_i(1, 0),
            Instruction::load_i(256, 1),
            Instruction::store(0, 1),
            Instruction::output(256),
            Instruction::load_i(2, 0),
            Instruction::store(0, 1),
            Instruction::output(256),
            Instruction::output(256),
        ]);
        assert_eq!(run_source(&b).unwrap(), vec![1, 2, 2]);
    }

    #[test]
    fn test_physical_naming_requires_allocation() {
        let b = block([Instruction::load_i(1, 0)]);
        assert!(matches!(
            run_allocated(&b),
            Err(EvalError::UnassignedRegister { .. })
        ));
    }

    #[test]
    fn test_source_and_allocated_agree_after_allocation() {
        let source = "loadI 21 => r1\n\
                      add r1, r1 => r2\n\
                      loadI 4096 => r3\n\
                      store r2 => r3\n\
                      output 4096\n";
        let pristine = crate::parser::parse(source).unwrap();
        let mut allocated = pristine.clone();
        crate::regalloc::allocate(&mut allocated, 3).unwrap();

        assert_eq!(
            run_source(&pristine).unwrap(),
            run_allocated(&allocated).unwrap()
        );
        assert_eq!(run_source(&pristine).unwrap(), vec![42]);
    }
}
