//! Text output for allocated and annotated blocks.
//!
//! [`format_iloc`] prints a block as legal ILOC over physical registers,
//! ready to run. [`format_table`] renders the fully annotated IR (source,
//! virtual, and physical registers plus next-use for every operand) as a
//! commented table for debugging.

use crate::ir::{Block, Instruction, Opcode, Operand, INVALID, NO_USE};
use crate::regalloc::{Clean, LiveRanges};
use std::fmt::Write;

/// Print the block as legal ILOC code.
///
/// Register operands use their physical names once allocated, falling back
/// to the raw source field for unallocated input (useful when dumping the
/// IR mid-pipeline).
pub fn format_iloc(block: &Block) -> String {
    let mut out = String::new();
    for inst in block.iter() {
        writeln!(out, "{}", format_instruction(inst)).unwrap();
    }
    out
}

/// One instruction in the fixed-column layout of the classic printer.
pub fn format_instruction(inst: &Instruction) -> String {
    if inst.op == Opcode::Nop {
        return "nop".to_string();
    }

    let mut out = String::new();
    write!(out, "{:<10}", inst.op.mnemonic()).unwrap();

    // First operand: a register once allocated, else the raw field (which
    // holds the immediate for loadI and output).
    if inst.src1.is_reg && inst.src1.pr != INVALID {
        write!(out, "r{:<9}", inst.src1.pr).unwrap();
    } else if inst.src1.sr != INVALID {
        write!(out, "{:<10}", inst.src1.sr).unwrap();
        if inst.op == Opcode::Output {
            return out.trim_end().to_string();
        }
    }

    // Second operand column. A store's address register prints on the
    // right-hand side of the arrow instead.
    if inst.op != Opcode::Store && inst.src2.pr != INVALID {
        write!(out, ",  r{:<6}", inst.src2.pr).unwrap();
    } else {
        write!(out, "{:<10}", "").unwrap();
    }

    write!(out, "=>   ").unwrap();

    if inst.dest.pr != INVALID {
        write!(out, "r{}", inst.dest.pr).unwrap();
    }
    if inst.op == Opcode::Store {
        write!(out, "r{}", inst.src2.pr).unwrap();
    }

    out
}

/// Render the annotated IR as a commented table: one row per instruction,
/// `sr/vr/pr/nu` for each operand, and the cleanliness class of the value
/// each instruction defines.
pub fn format_table(block: &Block, ranges: &LiveRanges) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "// |index| opcode ||{:^27}||{:^27}||{:^27}|| clean |",
        "src1", "src2", "dest"
    )
    .unwrap();
    writeln!(
        out,
        "// |     |        ||{0}||{0}||{0}||       |",
        "  sr  |  vr  |  pr  |  nu  "
    )
    .unwrap();

    for (index, inst) in block.iter().enumerate() {
        write!(out, "// |{:<5}| {:<7}|", index, inst.op.mnemonic()).unwrap();
        for op in [&inst.src1, &inst.src2, &inst.dest] {
            write!(out, "|{}|", operand_cells(op)).unwrap();
        }
        writeln!(out, "| {:<5} |", class_of(inst, ranges)).unwrap();
    }
    out
}

fn operand_cells(op: &Operand) -> String {
    format!(
        "{:>6}|{:>6}|{:>6}|{:>6}",
        field(op.sr),
        field(op.vr),
        field(op.pr),
        field(op.nu)
    )
}

fn field(value: i64) -> String {
    if value == INVALID {
        "-".to_string()
    } else if value == NO_USE {
        "inf".to_string()
    } else {
        value.to_string()
    }
}

fn class_of(inst: &Instruction, ranges: &LiveRanges) -> &'static str {
    if !inst.dest.is_reg || inst.dest.vr == INVALID {
        return "-";
    }
    match ranges.clean[inst.dest.vr as usize] {
        Clean::Remat => "remat",
        Clean::CleanLoad => "cload",
        Clean::Spilled => "spill",
        Clean::Dirty => "dirty",
    }
}
