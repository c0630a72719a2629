//! Local register allocation.
//!
//! Rewrites a block that names arbitrarily many source registers into one
//! that runs on `k` physical registers, spilling to memory when pressure
//! exceeds capacity. Two passes over the block:
//!
//! 1. [`liveness`] — a reverse sweep that maps source registers to virtual
//!    registers, records next-use distances on every register operand, and
//!    classifies each virtual register by how cheaply it can be recovered
//!    after eviction.
//! 2. [`allocator`] — a forward sweep that assigns physical registers and
//!    splices `loadI`/`load`/`store` recovery code into the block.

pub mod allocator;
pub mod liveness;

pub use allocator::Allocator;
pub use liveness::{compute_live_ranges, LiveRanges};

use crate::ir::Block;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// First memory address used for spilled values; slots grow upward in
/// 4-byte steps.
pub const SPILL_BASE: i64 = 32_768;

/// How cheaply a virtual register's value can be recovered after eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clean {
    /// Produced by a `loadI`; reissuing it recreates the value for free.
    Remat,
    /// Loaded from an address no store in the block modifies; reissuing the
    /// load recreates the value.
    CleanLoad,
    /// Already spilled once; the memory copy is current.
    Spilled,
    /// No usable memory copy; eviction requires a store.
    Dirty,
}

impl Clean {
    /// Can the value be evicted without a store?
    pub fn is_clean(self) -> bool {
        !matches!(self, Clean::Dirty)
    }
}

#[derive(Debug, Error)]
pub enum AllocError {
    /// A virtual register was read before any instruction defined it.
    #[error("virtual register {0} is used before it is defined")]
    UseBeforeDef(i64),

    /// The spill area ran past the representable address range.
    #[error("spill address space exhausted")]
    SpillAddressOverflow,
}

/// Summary of a completed allocation.
#[derive(Debug)]
pub struct Allocation {
    /// Live-range tables produced by the analyzer (cleanliness classes as of
    /// the end of the sweep, spill addresses, peak pressure).
    pub ranges: LiveRanges,
    /// Register budget actually allocated from, after any reservation.
    pub k_effective: usize,
    /// Was one register reserved as the spill-address scratch?
    pub scratch_reserved: bool,
    /// Did any spliced instruction use the scratch register?
    pub scratch_used: bool,
    /// Number of dirty spills (spliced `loadI`/`store` pairs).
    pub dirty_spills: usize,
    /// Number of restores spliced ahead of uses of evicted values.
    pub restores: usize,
}

/// Allocate `k_requested` physical registers to the block, rewriting it in
/// place.
///
/// The caller is responsible for rejecting budgets below 3; the passes
/// themselves assume the budget is workable.
pub fn allocate(block: &mut Block, k_requested: usize) -> Result<Allocation, AllocError> {
    let mut ranges = compute_live_ranges(block);

    // Not enough registers for peak pressure: reserve the last one to hold
    // spill addresses. It is addressed by number at splice sites only and
    // never enters the free list.
    let mut k = k_requested;
    let scratch_reserved = k < ranges.max_live;
    if scratch_reserved {
        k -= 1;
        log::debug!(
            "pressure {} exceeds budget {}; reserving r{} for spill addresses",
            ranges.max_live,
            k_requested,
            k
        );
    }

    let outcome = Allocator::new(block, &mut ranges, k).run()?;

    Ok(Allocation {
        ranges,
        k_effective: k,
        scratch_reserved,
        scratch_used: outcome.scratch_used,
        dirty_spills: outcome.dirty_spills,
        restores: outcome.restores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Opcode};

    #[test]
    fn test_no_pressure_no_rewrite() {
        let mut block: Block = vec![
            Instruction::load_i(1024, 0),
            Instruction::load_i(4, 1),
            Instruction::add(0, 1, 2),
            Instruction::output(1024),
        ]
        .into_iter()
        .collect();

        let allocation = allocate(&mut block, 5).unwrap();

        assert_eq!(block.len(), 4);
        assert!(!allocation.scratch_reserved);
        assert_eq!(allocation.dirty_spills, 0);
        assert_eq!(allocation.restores, 0);
        for inst in block.iter() {
            for op in [&inst.src1, &inst.src2, &inst.dest] {
                if op.is_reg {
                    assert!((0..3).contains(&op.pr));
                }
            }
        }
    }

    #[test]
    fn test_reservation_boundary() {
        // Three simultaneously live values.
        let source = [
            Instruction::load_i(1, 0),
            Instruction::load_i(2, 1),
            Instruction::load_i(3, 2),
            Instruction::add(0, 1, 3),
            Instruction::add(3, 2, 4),
            Instruction::store(4, 0),
        ];

        let mut block: Block = source.into_iter().collect();
        let allocation = allocate(&mut block, 3).unwrap();
        assert_eq!(allocation.ranges.max_live, 3);
        assert!(!allocation.scratch_reserved);
        assert_eq!(allocation.k_effective, 3);
    }

    #[test]
    fn test_reservation_reduces_k() {
        // Four simultaneously live values against a budget of three.
        let source = [
            Instruction::load_i(1, 0),
            Instruction::load_i(2, 1),
            Instruction::load_i(3, 2),
            Instruction::load_i(4, 3),
            Instruction::add(0, 1, 4),
            Instruction::add(4, 2, 5),
            Instruction::add(5, 3, 6),
            Instruction::store(6, 0),
        ];

        let mut block: Block = source.into_iter().collect();
        let allocation = allocate(&mut block, 3).unwrap();
        assert_eq!(allocation.ranges.max_live, 4);
        assert!(allocation.scratch_reserved);
        assert_eq!(allocation.k_effective, 2);
    }

    #[test]
    fn test_use_before_def_is_fatal() {
        // r9 is read without ever being written: it is not in any register
        // and has no memory image to restore from.
        let source = [
            Instruction::load_i(1, 0),
            Instruction::add(9, 0, 1),
        ];
        let mut block: Block = source.into_iter().collect();
        let err = allocate(&mut block, 3).unwrap_err();
        assert!(matches!(err, AllocError::UseBeforeDef(_)));
    }

    #[test]
    fn test_output_only_block_untouched() {
        let mut block: Block = vec![
            Instruction::output(1024),
            Instruction::nop(),
            Instruction::output(2048),
        ]
        .into_iter()
        .collect();

        let before = block.clone();
        let allocation = allocate(&mut block, 3).unwrap();
        assert_eq!(block.len(), before.len());
        assert_eq!(allocation.ranges.max_live, 0);
        for (a, b) in block.iter().zip(before.iter()) {
            assert_eq!(a.op, b.op);
            assert_eq!(a.src1.sr, b.src1.sr);
        }
    }

    #[test]
    fn test_spilled_code_contains_recovery_sequences() {
        // Five dirty values live at once against a budget of three.
        let mut block: Block = vec![
            Instruction::load_i(1, 0),
            Instruction::load_i(2, 1),
            Instruction::add(0, 1, 2),
            Instruction::sub(0, 1, 3),
            Instruction::mult(0, 1, 4),
            Instruction::add(2, 3, 5),
            Instruction::add(5, 4, 6),
            Instruction::store(6, 0),
        ]
        .into_iter()
        .collect();

        let allocation = allocate(&mut block, 3).unwrap();
        assert!(allocation.scratch_reserved);
        assert!(allocation.dirty_spills > 0);
        assert!(allocation.scratch_used);
        assert!(block.iter().filter(|i| i.op == Opcode::Store).count() > 1);
    }
}
