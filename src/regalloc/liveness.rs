//! Live-range analysis: one reverse sweep over the block.
//!
//! Walking backward, the first time a source register is seen it opens a new
//! live range (a fresh virtual register); the last-seen position table then
//! holds, at every visit, exactly the forward index of the operand's next
//! use. The destination of each instruction closes its range ("kill"), so a
//! source register that is redefined later gets a separate virtual register
//! per definition.
//!
//! The same sweep classifies every virtual register by recovery cost:
//! `loadI` results are rematerializable, and a `load` whose address is a
//! known constant that no logged store clobbers is marked as a clean load.

use super::Clean;
use crate::ir::{Block, Opcode, Operand, INVALID, NO_USE};

/// Per-virtual-register tables produced by the analysis.
#[derive(Debug, Clone)]
pub struct LiveRanges {
    /// Recovery class, indexed by VR. The allocator downgrades `Dirty` to
    /// `Spilled` as values hit memory.
    pub clean: Vec<Clean>,
    /// Memory image of each VR: a spill slot, the `loadI` immediate for
    /// rematerializable values, the load address for clean loads, or
    /// [`INVALID`].
    pub vr2mem: Vec<i64>,
    /// Number of virtual registers discovered.
    pub num_vrs: usize,
    /// Peak number of simultaneously live virtual registers.
    pub max_live: usize,
}

/// Mutable state threaded through the reverse sweep.
struct Sweep {
    sr2vr: Vec<i64>,
    last_use: Vec<i64>,
    vr_name: i64,
    num_live: usize,
    max_live: usize,
    clean: Vec<Clean>,
    vr2mem: Vec<i64>,
}

impl Sweep {
    fn new(num_sr: usize) -> Self {
        Self {
            sr2vr: vec![INVALID; num_sr],
            last_use: vec![NO_USE; num_sr],
            vr_name: 0,
            num_live: 0,
            max_live: 0,
            clean: Vec::new(),
            vr2mem: Vec::new(),
        }
    }

    /// Annotate one register operand at forward index `index`: assign its
    /// VR (opening a fresh live range if this is the first visit), record
    /// its next use, and move the last-use marker to here.
    fn update(&mut self, op: &mut Operand, index: usize) {
        let sr = op.sr as usize;
        if self.sr2vr[sr] == INVALID {
            self.sr2vr[sr] = self.vr_name;
            self.vr_name += 1;
            self.num_live += 1;
            self.max_live = self.max_live.max(self.num_live);
            self.vr2mem.push(INVALID);
            self.clean.push(Clean::Dirty);
        }
        op.vr = self.sr2vr[sr];
        op.nu = self.last_use[sr];
        self.last_use[sr] = index as i64;
    }

    /// Close the live range a definition opens (walking backward, the
    /// definition is the range's start).
    fn kill(&mut self, op: &Operand) {
        let sr = op.sr as usize;
        self.sr2vr[sr] = INVALID;
        self.last_use[sr] = NO_USE;
        self.num_live -= 1;
    }
}

/// Annotate every register operand in the block with its virtual register
/// and next-use index, and build the per-VR recovery tables.
pub fn compute_live_ranges(block: &mut Block) -> LiveRanges {
    let num_sr = count_source_registers(block);
    let mut sweep = Sweep::new(num_sr);

    // Log of stores seen so far (walking backward): (address VR, address)
    // with the address filled in once the VR's defining instruction reveals
    // it. An address defined by anything but a loadI can never be known, so
    // such entries are dropped when their VR is killed.
    let mut stores: Vec<(i64, i64)> = Vec::new();
    // Loads awaiting a cleanliness verdict: (address VR, loaded VR).
    let mut loads: Vec<(i64, i64)> = Vec::new();

    for i in (0..block.insts.len()).rev() {
        let inst = &mut block.insts[i];

        if inst.dest.is_reg {
            sweep.update(&mut inst.dest, i);
            sweep.kill(&inst.dest);

            let dest_vr = inst.dest.vr;
            if let Some(pos) = stores.iter().position(|&(vr, _)| vr == dest_vr) {
                if stores[pos].1 == INVALID {
                    if inst.op == Opcode::LoadI {
                        stores[pos].1 = inst.src1.sr;
                    } else {
                        stores.remove(pos);
                    }
                }
            }
        }
        if inst.src1.is_reg {
            sweep.update(&mut inst.src1, i);
        }
        if inst.src2.is_reg {
            sweep.update(&mut inst.src2, i);
        }

        match inst.op {
            Opcode::LoadI => {
                let vr = inst.dest.vr as usize;
                sweep.clean[vr] = Clean::Remat;
                sweep.vr2mem[vr] = inst.src1.sr;

                // This loadI names the address some pending load went
                // through. If no logged store hits that address, the loaded
                // value can be recovered by reissuing the load.
                let addr = inst.src1.sr;
                if !stores.iter().any(|&(_, a)| a == addr) {
                    let dest_vr = inst.dest.vr;
                    if let Some(pos) = loads.iter().position(|&(src, _)| src == dest_vr) {
                        let loaded = loads[pos].1 as usize;
                        sweep.clean[loaded] = Clean::CleanLoad;
                        sweep.vr2mem[loaded] = addr;
                        loads.remove(pos);
                    }
                }
            }
            Opcode::Store => stores.push((inst.src2.vr, INVALID)),
            Opcode::Load => loads.push((inst.src1.vr, inst.dest.vr)),
            _ => {}
        }
    }

    LiveRanges {
        clean: sweep.clean,
        vr2mem: sweep.vr2mem,
        num_vrs: sweep.vr_name as usize,
        max_live: sweep.max_live,
    }
}

/// One forward scan for the table sizes: largest source register plus one.
fn count_source_registers(block: &Block) -> usize {
    let mut high = INVALID;
    for inst in block.iter() {
        for op in [&inst.dest, &inst.src2, &inst.src1] {
            if op.is_reg && op.sr > high {
                high = op.sr;
            }
        }
    }
    (high + 1) as usize
}
