//! ARMv3 front end.
//!
//! Grounded on `armv3_frontend.c`'s analyzer: unlike SH-4, ARM has no delay
//! slots, so a block simply ends the moment an instruction could redirect
//! control flow. That includes not just branches but any data-processing or
//! transfer instruction that happens to write r15 (the PC), a PSR transfer,
//! a block data-transfer that loads r15, or a software interrupt. Every
//! instruction costs a flat 12 cycles, 1 guest instruction, 4 bytes, matching
//! the original's fixed per-instruction accounting.

use super::{alloc_tree_blocks, emit_terminator, Frontend, MAX_BLOCK_INSTRS};
use crate::cache::{BlockMeta, BranchType, CompileUnit, CompileUnitId, Translation};
use crate::dispatch::GuestMemory;
use crate::error::AnalyzeError;
use crate::ir::Ir;

const CYCLES_PER_INSTR: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    None,
    Branch,
    DataToPc,
    Psr,
    XferToPc,
    BlockXferToPc,
    Swi,
}

fn condition_passes_unconditionally(raw: u32) -> bool {
    // Condition field doesn't affect whether a block *can* end here; a
    // conditional branch still terminates the block at analysis time since
    // the original treats the worst case (taken) as authoritative.
    raw >> 28 != 0xF
}

fn classify(raw: u32) -> Terminator {
    let op_class = (raw >> 25) & 0x7;
    match op_class {
        // Branch / branch-with-link: bits 27:25 == 101
        0b101 => Terminator::Branch,
        // Data processing / PSR transfer: bits 27:26 == 00
        _ if (raw >> 26) & 0x3 == 0b00 => {
            let is_psr_xfer = (raw & 0x0FBF_0000) == 0x010F_0000 || (raw & 0x0FBF_F000) == 0x0129_F000;
            if is_psr_xfer {
                Terminator::Psr
            } else {
                let rd = (raw >> 12) & 0xF;
                if rd == 15 {
                    Terminator::DataToPc
                } else {
                    Terminator::None
                }
            }
        }
        // Single data transfer (LDR/STR): bits 27:26 == 01
        0b010 | 0b011 => {
            let is_load = (raw >> 20) & 1 == 1;
            let rd = (raw >> 12) & 0xF;
            if is_load && rd == 15 {
                Terminator::XferToPc
            } else {
                Terminator::None
            }
        }
        // Block data transfer (LDM/STM): bits 27:25 == 100
        0b100 => {
            let is_load = (raw >> 20) & 1 == 1;
            let reg_list = raw & 0xFFFF;
            if is_load && (reg_list & (1 << 15)) != 0 {
                Terminator::BlockXferToPc
            } else {
                Terminator::None
            }
        }
        // Software interrupt: bits 27:24 == 1111
        0b111 if (raw >> 24) & 0xF == 0xF => Terminator::Swi,
        _ => Terminator::None,
    }
}

#[derive(Debug, Default)]
pub struct ArmV3Frontend;

impl Frontend for ArmV3Frontend {
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
            if pc % 4 != 0 {
                return Err(AnalyzeError::Misaligned { addr: pc, align: 4 });
            }
            let raw = guest.r32(pc);
            let _ = condition_passes_unconditionally(raw);

            num_instrs += 1;
            num_cycles += CYCLES_PER_INSTR;
            size += 4;

            match classify(raw) {
                Terminator::Branch => {
                    let link = (raw >> 24) & 1 == 1;
                    let disp = sign_extend_24(raw & 0x00FF_FFFF) * 4;
                    let target = pc.wrapping_add(8).wrapping_add(disp as u32);
                    branch_addr = Some(target);
                    branch_type = if link {
                        BranchType::Dynamic
                    } else {
                        BranchType::Static
                    };
                    break;
                }
                Terminator::DataToPc | Terminator::XferToPc | Terminator::BlockXferToPc => {
                    branch_type = BranchType::Dynamic;
                    break;
                }
                Terminator::Psr => {
                    branch_type = BranchType::FallThrough;
                    next_addr = Some(pc + 4);
                    break;
                }
                Terminator::Swi => {
                    branch_type = BranchType::Dynamic;
                    break;
                }
                Terminator::None => {
                    if num_instrs >= MAX_BLOCK_INSTRS {
                        tracing::warn!(
                            guest_addr = format_args!("0x{guest_addr:08x}"),
                            "arm block exceeded max instruction count"
                        );
                        return Err(AnalyzeError::BlockTooLong { addr: guest_addr });
                    }
                    pc = pc.wrapping_add(4);
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

            let mut pc = units[i].guest_addr;
            let end = units[i].guest_addr + units[i].guest_size;
            while pc < end {
                let raw = guest.r32(pc);
                ir.debug_info(format!("arm @ 0x{pc:08x}"), pc, raw);
                ir.call_fallback(fallback_target, raw, pc);
                pc += 4;
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
            let raw = guest.r32(pc);
            let _ = writeln!(out, "0x{pc:08x}: {raw:08x}");
            pc += 4;
        }
        out
    }
}

fn sign_extend_24(v: u32) -> i32 {
    ((v << 8) as i32) >> 8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeMemory(HashMap<u32, u32>);

    impl GuestMemory for FakeMemory {
        fn r8(&self, _addr: u32) -> u8 {
            0
        }
        fn r16(&self, _addr: u32) -> u16 {
            0
        }
        fn r32(&self, addr: u32) -> u32 {
            *self.0.get(&addr).unwrap_or(&0)
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
    fn unconditional_branch_terminates_block() {
        let mut mem = HashMap::new();
        mem.insert(0x8000, 0xE320_F000); // MOV r0,r0 (nop-equivalent, data-proc, rd=0)
        mem.insert(0x8004, 0xEA00_0002); // B pc+8+8
        let guest = FakeMemory(mem);

        let meta = ArmV3Frontend.analyze_code(&guest, 0x8000).unwrap();
        assert_eq!(meta.num_instrs, 2);
        assert_eq!(meta.branch_type, BranchType::Static);
        assert!(meta.branch_addr.is_some());
    }

    #[test]
    fn data_processing_writing_pc_is_dynamic_branch() {
        let mut mem = HashMap::new();
        mem.insert(0x9000, 0xE1A0_F00E); // MOV pc, lr
        let guest = FakeMemory(mem);

        let meta = ArmV3Frontend.analyze_code(&guest, 0x9000).unwrap();
        assert_eq!(meta.branch_type, BranchType::Dynamic);
        assert_eq!(meta.num_instrs, 1);
    }
}
