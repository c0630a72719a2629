//! Instructions and operands for the ILOC subset.
//!
//! Every instruction carries three operand slots (`src1`, `src2`, `dest`)
//! whether or not the opcode uses them; unused slots keep their fields at
//! [`INVALID`]. A register operand is threaded through three naming layers
//! over the life of a block:
//!
//! - `sr` — the source register written in the input (or the immediate, for
//!   constant-bearing slots),
//! - `vr` — the virtual register / live range, filled by the analyzer,
//! - `pr` — the physical register, filled by the allocator.
//!
//! `nu` is the forward index of the next instruction that reads the operand's
//! virtual register, or [`NO_USE`] when the value is dead past this point.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel for operand fields that do not hold a value.
pub const INVALID: i64 = -1;

/// Next-use distance meaning "never read again".
pub const NO_USE: i64 = i64::MAX;

/// The closed opcode set of the accepted ILOC subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// `load rA => rB` — rB = MEM\[rA\]
    Load,
    /// `loadI C => rB` — rB = C
    LoadI,
    /// `store rA => rB` — MEM\[rB\] = rA
    Store,
    /// `add rA, rB => rC`
    Add,
    /// `sub rA, rB => rC`
    Sub,
    /// `mult rA, rB => rC`
    Mult,
    /// `lshift rA, rB => rC`
    Lshift,
    /// `rshift rA, rB => rC`
    Rshift,
    /// `output C` — print MEM\[C\]
    Output,
    /// `nop`
    Nop,
}

impl Opcode {
    /// The mnemonic as written in ILOC source.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Load => "load",
            Opcode::LoadI => "loadI",
            Opcode::Store => "store",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mult => "mult",
            Opcode::Lshift => "lshift",
            Opcode::Rshift => "rshift",
            Opcode::Output => "output",
            Opcode::Nop => "nop",
        }
    }

    /// Look an opcode up by its source mnemonic.
    pub fn from_mnemonic(word: &str) -> Option<Opcode> {
        Some(match word {
            "load" => Opcode::Load,
            "loadI" => Opcode::LoadI,
            "store" => Opcode::Store,
            "add" => Opcode::Add,
            "sub" => Opcode::Sub,
            "mult" => Opcode::Mult,
            "lshift" => Opcode::Lshift,
            "rshift" => Opcode::Rshift,
            "output" => Opcode::Output,
            "nop" => Opcode::Nop,
            _ => return None,
        })
    }

    /// Is this a three-register arithmetic operation?
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Opcode::Add | Opcode::Sub | Opcode::Mult | Opcode::Lshift | Opcode::Rshift
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// One operand slot of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    /// Does this slot name a register? False for immediates and unused slots.
    pub is_reg: bool,
    /// Source register number, or the immediate for constant-bearing slots.
    pub sr: i64,
    /// Virtual register, assigned by the live-range analyzer.
    pub vr: i64,
    /// Physical register, assigned by the allocator.
    pub pr: i64,
    /// Forward index of the next read of this operand's VR, or [`NO_USE`].
    pub nu: i64,
}

impl Default for Operand {
    fn default() -> Self {
        Self {
            is_reg: false,
            sr: INVALID,
            vr: INVALID,
            pr: INVALID,
            nu: INVALID,
        }
    }
}

impl Operand {
    /// An unused slot.
    pub fn none() -> Self {
        Self::default()
    }

    /// A register operand naming source register `sr`.
    pub fn reg(sr: i64) -> Self {
        Self {
            is_reg: true,
            sr,
            ..Self::default()
        }
    }

    /// An immediate operand. The constant rides in the `sr` field.
    pub fn imm(value: i64) -> Self {
        Self {
            is_reg: false,
            sr: value,
            ..Self::default()
        }
    }

    /// A register operand that exists only at the physical level, as spliced
    /// by the allocator (no source or virtual name).
    pub fn phys(pr: i64) -> Self {
        Self {
            is_reg: true,
            sr: INVALID,
            vr: INVALID,
            pr,
            nu: INVALID,
        }
    }
}

/// A single three-address instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub src1: Operand,
    pub src2: Operand,
    pub dest: Operand,
}

impl Instruction {
    /// An instruction with all operand slots unused.
    pub fn new(op: Opcode) -> Self {
        Self {
            op,
            src1: Operand::none(),
            src2: Operand::none(),
            dest: Operand::none(),
        }
    }

    /// `load rA => rB`
    pub fn load(addr: i64, dest: i64) -> Self {
        Self {
            src1: Operand::reg(addr),
            dest: Operand::reg(dest),
            ..Self::new(Opcode::Load)
        }
    }

    /// `loadI C => rB`
    pub fn load_i(value: i64, dest: i64) -> Self {
        Self {
            src1: Operand::imm(value),
            dest: Operand::reg(dest),
            ..Self::new(Opcode::LoadI)
        }
    }

    /// `store rA => rB` (value rA, address rB)
    pub fn store(value: i64, addr: i64) -> Self {
        Self {
            src1: Operand::reg(value),
            src2: Operand::reg(addr),
            ..Self::new(Opcode::Store)
        }
    }

    /// A three-register arithmetic instruction.
    pub fn arith(op: Opcode, a: i64, b: i64, dest: i64) -> Self {
        debug_assert!(op.is_arithmetic());
        Self {
            src1: Operand::reg(a),
            src2: Operand::reg(b),
            dest: Operand::reg(dest),
            ..Self::new(op)
        }
    }

    /// `add rA, rB => rC`
    pub fn add(a: i64, b: i64, dest: i64) -> Self {
        Self::arith(Opcode::Add, a, b, dest)
    }

    /// `sub rA, rB => rC`
    pub fn sub(a: i64, b: i64, dest: i64) -> Self {
        Self::arith(Opcode::Sub, a, b, dest)
    }

    /// `mult rA, rB => rC`
    pub fn mult(a: i64, b: i64, dest: i64) -> Self {
        Self::arith(Opcode::Mult, a, b, dest)
    }

    /// `output C`
    pub fn output(addr: i64) -> Self {
        Self {
            src1: Operand::imm(addr),
            ..Self::new(Opcode::Output)
        }
    }

    /// `nop`
    pub fn nop() -> Self {
        Self::new(Opcode::Nop)
    }
}
