//! Local register allocator for a subset of ILOC.
//!
//! Takes a single basic block of ILOC code naming arbitrarily many source
//! registers and rewrites it to run on `k` physical registers, inserting
//! `loadI`/`load`/`store` recovery code where pressure forces values out.
//!
//! # Architecture
//!
//! ```text
//! ILOC source (.i)
//!        │
//!        ▼ (parser)
//! ┌──────────────┐
//! │  Block (IR)  │  op / sr fields set
//! └──────┬───────┘
//!        │ (regalloc::liveness — reverse sweep)
//!        ▼
//! ┌──────────────┐
//! │  Annotated   │  vr / next-use on every operand,
//! └──────┬───────┘  per-range recovery classes
//!        │ (regalloc::allocator — forward sweep)
//!        ▼
//! ┌──────────────┐
//! │  Allocated   │  pr everywhere, recovery code spliced
//! └──────┬───────┘
//!        │ (emit)
//!        ▼
//! Legal k-register ILOC
//! ```
//!
//! # Example
//!
//! ```
//! let source = "loadI 21 => r1\n\
//!               add r1, r1 => r2\n\
//!               loadI 2048 => r3\n\
//!               store r2 => r3\n\
//!               output 2048\n";
//! let rewritten = iloc_alloc::allocate_source(source, 3).unwrap();
//! assert!(rewritten.lines().count() >= 5);
//! ```

pub mod emit;
pub mod interp;
pub mod ir;
pub mod parser;
pub mod regalloc;
pub mod stats;

pub use ir::{Block, Instruction, Opcode, Operand};
pub use regalloc::{AllocError, Allocation, Clean, LiveRanges};
pub use stats::AllocStats;

use anyhow::{bail, Context, Result};
use stats::Timer;
use std::path::Path;

/// Fewest physical registers the rewritten code can target: two operands
/// plus a distinct destination.
pub const MIN_REGISTERS: usize = 3;

/// Read a file of ILOC code and return it rewritten over `k` registers.
pub fn allocate_file<P: AsRef<Path>>(input: P, k: usize) -> Result<String> {
    let source = std::fs::read_to_string(input.as_ref())
        .with_context(|| format!("failed to read {}", input.as_ref().display()))?;
    allocate_source(&source, k)
}

/// Rewrite a block of ILOC source over `k` registers.
pub fn allocate_source(source: &str, k: usize) -> Result<String> {
    let (output, _stats) = allocate_source_with_stats(source, k)?;
    Ok(output)
}

/// Like [`allocate_source`], but also returns pipeline statistics.
pub fn allocate_source_with_stats(source: &str, k: usize) -> Result<(String, AllocStats)> {
    if k < MIN_REGISTERS {
        bail!("at least {} registers are required, got {}", MIN_REGISTERS, k);
    }

    let mut stats = AllocStats::new();
    stats.k_requested = k;
    let total_timer = Timer::start();

    let parse_timer = Timer::start();
    let mut block = parser::parse(source)?;
    stats.parse_time = parse_timer.stop();
    stats.num_insts_before = block.len();

    let alloc_timer = Timer::start();
    let allocation = regalloc::allocate(&mut block, k)?;
    stats.alloc_time = alloc_timer.stop();
    stats.num_insts_after = block.len();
    stats.num_vrs = allocation.ranges.num_vrs;
    stats.max_live = allocation.ranges.max_live;
    stats.k_effective = allocation.k_effective;
    stats.scratch_reserved = allocation.scratch_reserved;
    stats.dirty_spills = allocation.dirty_spills;
    stats.restores = allocation.restores;

    let emit_timer = Timer::start();
    let output = emit::format_iloc(&block);
    stats.emit_time = emit_timer.stop();

    stats.output_size = output.len();
    stats.total_time = total_timer.stop();

    Ok((output, stats))
}
