//! SH-4 front end.
//!
//! Grounded on `sh4_frontend_analyze_code`: decode, accumulate cycles/size,
//! decode the delay slot too when the instruction has one, then classify
//! any branch via the same if/else chain the original uses (BF/BFS/BT/BTS
//! static-conditional, BRA/BSR static-unconditional, BRAF/BSRF/JMP/JSR/
//! RTS/RTE/TRAPA dynamic, LDC to SR/FPSCR forces a fall-through block
//! boundary since it can change how subsequent instructions should be
//! interpreted).
//!
//! The decoder below only recognizes the block-terminating opcodes and the
//! SR/FPSCR loads the original singles out; every other 16-bit word is
//! treated as an ordinary one-cycle, non-branching instruction. Modeling
//! SH-4's full ~140-opcode ALU/load/store table isn't needed to exercise
//! the analysis/translation/pass pipeline this crate is about.

use super::{alloc_tree_blocks, emit_terminator, Frontend, MAX_BLOCK_INSTRS};
use crate::cache::{BlockMeta, BranchType, CompileUnit, CompileUnitId, Translation};
use crate::dispatch::GuestMemory;
use crate::error::AnalyzeError;
use crate::ir::Ir;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Normal,
    /// BF/BT (no delay slot) or BFS/BTS (delay slot), 8-bit signed
    /// displacement, taken when T == `taken_on_true`.
    StaticCond { taken_on_true: bool, delayed: bool },
    /// BRA/BSR, 12-bit signed displacement, always taken, delay slot.
    StaticUncond,
    /// BRAF/BSRF/JMP/JSR/RTS/RTE: target only known at run time.
    Dynamic { delayed: bool },
    /// TRAPA: dynamic, but no delay slot.
    Trap,
    /// LDC Rm,SR / LDC Rm,FPSCR: not a branch, but forces a block boundary.
    SetSrOrFpscr,
}

struct Decoded {
    kind: Kind,
    cycles: u32,
    disp: i32,
}

fn decode(raw: u16) -> Option<Decoded> {
    let op = raw;
    let simple = |kind: Kind| {
        Some(Decoded {
            kind,
            cycles: 1,
            disp: 0,
        })
    };
    match () {
        _ if op & 0xFF00 == 0x8B00 => Some(Decoded {
            kind: Kind::StaticCond {
                taken_on_true: false,
                delayed: false,
            },
            cycles: 1,
            disp: (op & 0x00FF) as i8 as i32,
        }),
        _ if op & 0xFF00 == 0x8F00 => Some(Decoded {
            kind: Kind::StaticCond {
                taken_on_true: false,
                delayed: true,
            },
            cycles: 1,
            disp: (op & 0x00FF) as i8 as i32,
        }),
        _ if op & 0xFF00 == 0x8900 => Some(Decoded {
            kind: Kind::StaticCond {
                taken_on_true: true,
                delayed: false,
            },
            cycles: 1,
            disp: (op & 0x00FF) as i8 as i32,
        }),
        _ if op & 0xFF00 == 0x8D00 => Some(Decoded {
            kind: Kind::StaticCond {
                taken_on_true: true,
                delayed: true,
            },
            cycles: 1,
            disp: (op & 0x00FF) as i8 as i32,
        }),
        _ if op & 0xF000 == 0xA000 => Some(Decoded {
            kind: Kind::StaticUncond,
            cycles: 1,
            disp: sign_extend_12(op & 0x0FFF),
        }),
        _ if op & 0xF000 == 0xB000 => Some(Decoded {
            kind: Kind::StaticUncond,
            cycles: 1,
            disp: sign_extend_12(op & 0x0FFF),
        }),
        _ if op & 0xF0FF == 0x0023 => simple(Kind::Dynamic { delayed: true }), // BRAF
        _ if op & 0xF0FF == 0x0003 => simple(Kind::Dynamic { delayed: true }), // BSRF
        _ if op & 0xF0FF == 0x402B => simple(Kind::Dynamic { delayed: true }), // JMP
        _ if op & 0xF0FF == 0x400B => simple(Kind::Dynamic { delayed: true }), // JSR
        _ if op == 0x000B => simple(Kind::Dynamic { delayed: true }),         // RTS
        _ if op == 0x002B => simple(Kind::Dynamic { delayed: true }),         // RTE
        _ if op & 0xFF00 == 0xC300 => simple(Kind::Trap),                     // TRAPA
        _ if op & 0xF0FF == 0x406A => simple(Kind::SetSrOrFpscr),             // LDC Rm,FPSCR
        _ if op & 0xF0FF == 0x400E => simple(Kind::SetSrOrFpscr),             // LDC Rm,SR
        _ => simple(Kind::Normal),
    }
}

fn sign_extend_12(v: u16) -> i32 {
    ((v << 4) as i16 >> 4) as i32
}

#[derive(Debug, Default)]
pub struct Sh4Frontend;

impl Frontend for Sh4Frontend {
    fn analyze_code(
        &self,
        guest: &dyn GuestMemory,
        guest_addr: u32,
    ) -> Result<BlockMeta, AnalyzeError> {
        let mut pc = guest_addr;
        let mut num_instrs = 0u32;
        let mut num_cycles = 0u32;
        let mut size = 0u32;
        let mut branch_type = BranchType::FallThrough;
        let mut branch_addr = None;
        let mut next_addr = None;

        loop {
            if pc % 2 != 0 {
                return Err(AnalyzeError::Misaligned { addr: pc, align: 2 });
            }
            let raw = guest.r16(pc);
            let decoded = decode(raw).ok_or(AnalyzeError::InvalidOpcode {
                addr: pc,
                raw: raw as u32,
            })?;
            num_instrs += 1;
            num_cycles += decoded.cycles;
            size += 2;

            let delayed = matches!(
                decoded.kind,
                Kind::StaticCond { delayed: true, .. } | Kind::StaticUncond | Kind::Dynamic { delayed: true }
            );
            if delayed {
                let delay_addr = pc + 2;
                let delay_raw = guest.r16(delay_addr);
                let delay = decode(delay_raw).ok_or(AnalyzeError::InvalidOpcode {
                    addr: delay_addr,
                    raw: delay_raw as u32,
                })?;
                debug_assert!(
                    !matches!(
                        delay.kind,
                        Kind::StaticCond { delayed: true, .. }
                            | Kind::StaticUncond
                            | Kind::Dynamic { delayed: true }
                    ),
                    "a delay-slot instruction cannot itself have a delay slot"
                );
                num_instrs += 1;
                num_cycles += delay.cycles;
                size += 2;
            }

            match decoded.kind {
                Kind::StaticCond {
                    taken_on_true,
                    delayed,
                } => {
                    let target = pc.wrapping_add(4).wrapping_add((decoded.disp * 2) as u32);
                    branch_addr = Some(target);
                    branch_type = if taken_on_true {
                        BranchType::StaticTrue
                    } else {
                        BranchType::StaticFalse
                    };
                    next_addr = Some(pc + if delayed { 4 } else { 2 });
                    break;
                }
                Kind::StaticUncond => {
                    let target = pc.wrapping_add(4).wrapping_add((decoded.disp * 2) as u32);
                    branch_addr = Some(target);
                    branch_type = BranchType::Static;
                    break;
                }
                Kind::Dynamic { .. } | Kind::Trap => {
                    branch_type = BranchType::Dynamic;
                    break;
                }
                Kind::SetSrOrFpscr => {
                    branch_type = BranchType::FallThrough;
                    next_addr = Some(pc + 2);
                    break;
                }
                Kind::Normal => {
                    if num_instrs >= MAX_BLOCK_INSTRS {
                        tracing::warn!(
                            guest_addr = format_args!("0x{guest_addr:08x}"),
                            "sh4 block exceeded max instruction count"
                        );
                        return Err(AnalyzeError::BlockTooLong { addr: guest_addr });
                    }
                    pc = pc.wrapping_add(2);
                }
            }
        }

        Ok(BlockMeta::from_analysis(
            guest_addr,
            size,
            num_instrs,
            num_cycles,
            branch_type,
            branch_addr,
            next_addr,
        ))
    }

    fn translate_code(
        &self,
        guest: &dyn GuestMemory,
        units: &mut [CompileUnit],
        root: CompileUnitId,
    ) -> Result<Translation, AnalyzeError> {
        let mut ir = Ir::new();
        alloc_tree_blocks(&mut ir, units, root);
        let (entry, _) = ir.blocks().next().expect("Ir::new always has an entry block");
        let fallback_target = ir.alloc_ptr(0);
        let mut exits = Vec::new();

        for i in 0..units.len() {
            let block = units[i].block;
            ir.set_insert_point_end(block);

            // Each guest instruction becomes a debug marker plus a
            // call.fallback to the interpreter: this crate's scope is the
            // JIT pipeline around the IR, not an SH-4 ALU/load/store
            // lowering.
            let mut pc = units[i].guest_addr;
            let end = units[i].guest_addr + units[i].guest_size;
            while pc < end {
                let raw = guest.r16(pc) as u32;
                ir.debug_info(format!("sh4 @ 0x{pc:08x}"), pc, raw);
                ir.call_fallback(fallback_target, raw, pc);
                pc += 2;
            }

            emit_terminator(&mut ir, units, i, &mut exits);
        }

        Ok(Translation { ir, entry, exits })
    }

    fn dump_code(&self, guest: &dyn GuestMemory, start_addr: u32, end_addr: u32) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        let mut pc = start_addr;
        while pc < end_addr {
            let raw = guest.r16(pc);
            match decode(raw) {
                Some(d) => {
                    let delayed = matches!(
                        d.kind,
                        Kind::StaticCond { delayed: true, .. }
                            | Kind::StaticUncond
                            | Kind::Dynamic { delayed: true }
                    );
                    let _ = writeln!(out, "0x{pc:08x}: {raw:04x}");
                    pc += 2;
                    if delayed && pc < end_addr {
                        let delay_raw = guest.r16(pc);
                        let _ = writeln!(out, "0x{pc:08x}: {delay_raw:04x}  (delay slot)");
                        pc += 2;
                    }
                }
                None => {
                    let _ = writeln!(out, "0x{pc:08x}: {raw:04x}  (unrecognized)");
                    pc += 2;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeMemory(HashMap<u32, u16>);

    impl GuestMemory for FakeMemory {
        fn r8(&self, _addr: u32) -> u8 {
            0
        }
        fn r16(&self, addr: u32) -> u16 {
            *self.0.get(&addr).unwrap_or(&0)
        }
        fn r32(&self, _addr: u32) -> u32 {
            0
        }
        fn r64(&self, _addr: u32) -> u64 {
            0
        }
        fn w8(&mut self, _addr: u32, _v: u8) {}
        fn w16(&mut self, _addr: u32, _v: u16) {}
        fn w32(&mut self, _addr: u32, _v: u32) {}
        fn w64(&mut self, _addr: u32, _v: u64) {}
    }

    #[test]
    fn stops_at_unconditional_branch() {
        let mut mem = HashMap::new();
        mem.insert(0x1000, 0x0009); // nop-ish normal word (not actually SH4 NOP, just not a branch)
        mem.insert(0x1002, 0xA002); // bra +disp
        let guest = FakeMemory(mem);

        let meta = Sh4Frontend.analyze_code(&guest, 0x1000).unwrap();
        assert_eq!(meta.num_instrs, 2);
        assert_eq!(meta.branch_type, BranchType::Static);
        assert!(meta.branch_addr.is_some());
    }

    #[test]
    fn conditional_branch_without_delay_slot_has_fallthrough_at_pc_plus_2() {
        let mut mem = HashMap::new();
        mem.insert(0x2000, 0x8B05); // bf +5
        let guest = FakeMemory(mem);

        let meta = Sh4Frontend.analyze_code(&guest, 0x2000).unwrap();
        assert_eq!(meta.branch_type, BranchType::StaticFalse);
        assert_eq!(meta.next_addr, Some(0x2002));
    }

    #[test]
    fn sh4_conditional_forward_branch() {
        let mut mem = HashMap::new();
        mem.insert(0x8c000100, 0x8902); // bt +4; NOP/NOP/RTS after it are never reached by analysis
        let guest = FakeMemory(mem);

        let meta = Sh4Frontend.analyze_code(&guest, 0x8c000100).unwrap();
        assert_eq!(meta.branch_type, BranchType::StaticTrue);
        assert_eq!(meta.branch_addr, Some(0x8c000108));
        assert_eq!(meta.next_addr, Some(0x8c000102));
        assert_eq!(meta.guest_size, 2);
        assert_eq!(meta.num_instrs, 1);
    }

    #[test]
    fn sh4_delay_slot_is_counted_with_its_branch() {
        let mut mem = HashMap::new();
        mem.insert(0x8c000100, 0x8F03); // bfs +6
        mem.insert(0x8c000102, 0x6013); // mov r1,r0 (delay slot)
        let guest = FakeMemory(mem);

        let meta = Sh4Frontend.analyze_code(&guest, 0x8c000100).unwrap();
        assert_eq!(meta.num_instrs, 2);
        assert_eq!(meta.guest_size, 4);
        assert_eq!(meta.next_addr, Some(0x8c000104));
    }
}
