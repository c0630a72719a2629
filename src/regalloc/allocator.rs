//! The forward allocation sweep.
//!
//! Walks the annotated block once, keeping a map from live virtual
//! registers to the `k` physical registers. Each instruction is handled in
//! four steps: make sure the source values sit in registers (splicing
//! restore code ahead of the instruction when one was evicted), return the
//! registers of sources past their last use, refresh the next-use of the
//! sources that survive, and finally place the destination.
//!
//! Victim selection is cost-aware: rematerializable occupants go first
//! (recovered by reissuing their `loadI`), then occupants with a current
//! memory image, and only when everything is dirty does an eviction pay for
//! a `store`. Spill slots are handed out sequentially from
//! [`SPILL_BASE`](super::SPILL_BASE).

use super::liveness::LiveRanges;
use super::{AllocError, Clean, SPILL_BASE};
use crate::ir::{Block, Instruction, Opcode, Operand, INVALID, NO_USE};

/// Bookkeeping for the k allocatable physical registers.
#[derive(Debug)]
pub struct RegisterClass {
    size: usize,
    free: Vec<bool>,
    name: Vec<i64>,
    next: Vec<i64>,
    cclean: Vec<Clean>,
    free_stack: Vec<usize>,
}

impl RegisterClass {
    /// All registers free. The stack is seeded in reverse so allocation
    /// yields r0, r1, r2, … first.
    pub fn new(k: usize) -> Self {
        Self {
            size: k,
            free: vec![true; k],
            name: vec![INVALID; k],
            next: vec![NO_USE; k],
            cclean: vec![Clean::Dirty; k],
            free_stack: (0..k).rev().collect(),
        }
    }

    /// The register currently holding `vr`, if any.
    pub fn find(&self, vr: i64) -> Option<usize> {
        self.name.iter().position(|&n| n == vr)
    }

    /// Pop a free register.
    pub fn take_free(&mut self) -> Option<usize> {
        self.free_stack.pop()
    }

    /// Hand `pr` to `vr`. Next-use starts unset; the sweep fills it in.
    pub fn occupy(&mut self, pr: usize, vr: i64, class: Clean) {
        self.name[pr] = vr;
        self.next[pr] = INVALID;
        self.free[pr] = false;
        self.cclean[pr] = class;
    }

    /// Return `pr` to the free pool.
    pub fn release(&mut self, pr: usize) {
        self.name[pr] = INVALID;
        self.next[pr] = NO_USE;
        self.free[pr] = true;
        self.cclean[pr] = Clean::Dirty;
        self.free_stack.push(pr);
    }

    /// Record the next use of the value in `pr`.
    pub fn set_next(&mut self, pr: usize, nu: i64) {
        self.next[pr] = nu;
    }

    pub fn is_free(&self, pr: usize) -> bool {
        self.free[pr]
    }

    /// The occupant whose eviction costs least: a rematerializable value
    /// with the farthest next use, else a non-dirty one, else whichever
    /// dirty value is needed furthest in the future.
    fn best_victim(&self) -> usize {
        if let Some(pr) = self.best_of(|c| c == Clean::Remat) {
            return pr;
        }
        if let Some(pr) = self.best_of(|c| c.is_clean()) {
            return pr;
        }
        let mut pr = 0;
        let mut best = INVALID;
        for i in 0..self.size {
            if self.next[i] > best {
                best = self.next[i];
                pr = i;
            }
        }
        pr
    }

    /// Max-next-use register among those whose class satisfies `wanted`.
    /// Ties go to the highest register number.
    fn best_of(&self, wanted: impl Fn(Clean) -> bool) -> Option<usize> {
        let mut pr = None;
        let mut best = INVALID;
        for i in 0..self.size {
            if wanted(self.cclean[i]) && self.next[i] >= best {
                best = self.next[i];
                pr = Some(i);
            }
        }
        pr
    }
}

/// Counters reported back from a completed sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepOutcome {
    pub dirty_spills: usize,
    pub restores: usize,
    pub scratch_used: bool,
}

/// The forward sweep over one block.
pub struct Allocator<'a> {
    block: &'a mut Block,
    ranges: &'a mut LiveRanges,
    regs: RegisterClass,
    /// Register number used to materialize spill addresses. Equal to the
    /// effective k; it only ever appears on spliced instructions.
    scratch: i64,
    next_mem_addr: i64,
    pos: usize,
    outcome: SweepOutcome,
}

impl<'a> Allocator<'a> {
    pub fn new(block: &'a mut Block, ranges: &'a mut LiveRanges, k: usize) -> Self {
        Self {
            block,
            ranges,
            regs: RegisterClass::new(k),
            scratch: k as i64,
            next_mem_addr: SPILL_BASE,
            pos: 0,
            outcome: SweepOutcome::default(),
        }
    }

    /// Run the sweep, rewriting the block in place.
    pub fn run(mut self) -> Result<SweepOutcome, AllocError> {
        while self.pos < self.block.insts.len() {
            let mut inst = self.block.insts[self.pos];

            // Sources first: both must hold their values before the
            // instruction executes.
            if inst.src1.is_reg {
                inst.src1.pr = self.ensure(inst.src1.vr)?;
            }
            if inst.src2.is_reg {
                inst.src2.pr = self.ensure(inst.src2.vr)?;
            }

            // Sources past their last use release their registers now, so
            // the destination may reuse one.
            if inst.src1.nu == NO_USE {
                self.regs.release(inst.src1.pr as usize);
            }
            if inst.src2.is_reg && inst.src2.nu == NO_USE {
                self.regs.release(inst.src2.pr as usize);
            }

            // Surviving sources advertise their next use. This must follow
            // the releases above so a register just returned to the pool is
            // not re-marked as holding a live value.
            if inst.src1.pr != INVALID {
                self.regs.set_next(inst.src1.pr as usize, inst.src1.nu);
            }
            if inst.src2.pr != INVALID {
                self.regs.set_next(inst.src2.pr as usize, inst.src2.nu);
            }

            if inst.dest.is_reg {
                inst.dest.pr = self.allocate(inst.dest.vr)?;
                self.regs.set_next(inst.dest.pr as usize, inst.dest.nu);
            }

            self.block.insts[self.pos] = inst;
            self.pos += 1;
        }
        Ok(self.outcome)
    }

    /// Guarantee `vr` sits in a physical register, splicing restore code
    /// ahead of the current instruction if it was evicted.
    fn ensure(&mut self, vr: i64) -> Result<i64, AllocError> {
        if let Some(pr) = self.regs.find(vr) {
            return Ok(pr as i64);
        }

        let pr = self.allocate(vr)?;
        let slot = vr as usize;
        if self.ranges.clean[slot] == Clean::Remat {
            // The defining loadI is cheaper to reissue than any memory
            // traffic.
            self.splice(loadi_into(self.ranges.vr2mem[slot], pr));
        } else if self.ranges.vr2mem[slot] != INVALID {
            // Spilled or clean load: materialize the address, then reload.
            self.splice(loadi_into(self.ranges.vr2mem[slot], self.scratch));
            self.splice(load_through(self.scratch, pr));
            self.outcome.scratch_used = true;
        } else {
            return Err(AllocError::UseBeforeDef(vr));
        }
        self.outcome.restores += 1;

        Ok(pr)
    }

    /// Hand out a register for `vr`, evicting an occupant when none is
    /// free. A dirty victim is stored to a fresh spill slot first.
    fn allocate(&mut self, vr: i64) -> Result<i64, AllocError> {
        let pr = match self.regs.take_free() {
            Some(pr) => pr,
            None => {
                let pr = self.regs.best_victim();
                let victim = self.regs.name[pr] as usize;
                if self.ranges.clean[victim] == Clean::Dirty {
                    let addr = self.next_mem_addr;
                    self.next_mem_addr = self
                        .next_mem_addr
                        .checked_add(4)
                        .ok_or(AllocError::SpillAddressOverflow)?;
                    log::debug!("spilling vr{} to {}", victim, addr);
                    self.splice(loadi_into(addr, self.scratch));
                    self.splice(store_through(pr as i64, self.scratch));
                    self.ranges.vr2mem[victim] = addr;
                    self.ranges.clean[victim] = Clean::Spilled;
                    self.outcome.dirty_spills += 1;
                    self.outcome.scratch_used = true;
                }
                pr
            }
        };

        self.regs.occupy(pr, vr, self.ranges.clean[vr as usize]);
        Ok(pr as i64)
    }

    /// Insert an instruction immediately before the one under the cursor.
    fn splice(&mut self, inst: Instruction) {
        self.block.insert(self.pos, inst);
        self.pos += 1;
    }
}

/// `loadI value => r(pr)`
fn loadi_into(value: i64, pr: i64) -> Instruction {
    Instruction {
        src1: Operand::imm(value),
        dest: Operand::phys(pr),
        ..Instruction::new(Opcode::LoadI)
    }
}

/// `load r(addr) => r(dest)`
fn load_through(addr: i64, dest: i64) -> Instruction {
    Instruction {
        src1: Operand::phys(addr),
        dest: Operand::phys(dest),
        ..Instruction::new(Opcode::Load)
    }
}

/// `store r(value) => r(addr)`
fn store_through(value: i64, addr: i64) -> Instruction {
    Instruction {
        src1: Operand::phys(value),
        src2: Operand::phys(addr),
        ..Instruction::new(Opcode::Store)
    }
}
