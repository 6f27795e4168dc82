//! Linear-scan register allocation.
//!
//! No analogue in the original backend's IR layer (register assignment
//! happened entirely inside its x64 backend) — authored fresh against the
//! classic Poletto & Sarkar algorithm, generalized to two register files
//! (integer and float/vector) instead of one, and applied as a metadata
//! pass: it only ever writes [`crate::ir::RegSlot`] onto values, never
//! rewrites instructions. Inserting the spill loads/stores themselves is
//! the host backend's job when it lowers an IR whose spilled values it
//! finds through `Value::reg`.

use rustc_hash::FxHashMap;

use super::Pass;
use crate::ir::{Ir, RegSlot, ValueId, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    Int,
    Float,
}

fn class_of(ty: ValueType) -> RegisterClass {
    if ty.is_float() {
        RegisterClass::Float
    } else {
        RegisterClass::Int
    }
}

/// Physical registers available per class. Matches a plausible x86-64
/// SysV-ish budget with a few registers reserved for the backend's own
/// scratch use, rather than any specific real ABI.
const INT_REGS: u32 = 12;
const FLOAT_REGS: u32 = 14;

fn reg_count(class: RegisterClass) -> u32 {
    match class {
        RegisterClass::Int => INT_REGS,
        RegisterClass::Float => FLOAT_REGS,
    }
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    value: ValueId,
    start: u32,
    end: u32,
}

#[derive(Debug, Default)]
pub struct RegisterAllocation;

impl Pass for RegisterAllocation {
    fn name(&self) -> &'static str {
        "ra"
    }

    fn run(&mut self, ir: &mut Ir) {
        // Global linear position: block label * a stride large enough to
        // separate blocks, plus in-block instruction label. Blocks and
        // instructions are kept densely renumbered by the builder, so this
        // is a legitimate total order even across the whole module, not
        // just within one block — good enough for this pass since guest
        // basic blocks here are straight-line with no loop-carried
        // intervals spanning a back edge.
        const STRIDE: u32 = 1 << 16;

        let mut positions: FxHashMap<ValueId, (u32, u32)> = FxHashMap::default();
        for (_, block) in ir.blocks() {
            for &instr_id in block.instrs() {
                let instr = ir.instr(instr_id);
                let pos = instr.block.index() as u32 * STRIDE + instr.label;
                if let Some(result) = instr.result {
                    positions.entry(result).or_insert((pos, pos));
                }
                for (_, arg) in instr.args_iter() {
                    let entry = positions.entry(arg).or_insert((pos, pos));
                    entry.1 = entry.1.max(pos);
                }
            }
        }

        let mut by_class: FxHashMap<RegisterClass, Vec<Interval>> = FxHashMap::default();
        for (&value, &(start, end)) in &positions {
            if ir.value(value).is_constant() {
                continue;
            }
            let class = class_of(ir.value(value).ty);
            by_class.entry(class).or_default().push(Interval {
                value,
                start,
                end,
            });
        }

        for (class, mut intervals) in by_class {
            intervals.sort_by_key(|iv| (iv.start, iv.value.index()));
            allocate_class(ir, class, &intervals);
        }
    }
}

fn allocate_class(ir: &mut Ir, class: RegisterClass, intervals: &[Interval]) {
    let limit = reg_count(class);
    // (end position, register, value) of each currently live interval.
    let mut active: Vec<(u32, u32, ValueId)> = Vec::new();
    let mut free_regs: Vec<u32> = (0..limit).rev().collect();
    let mut next_spill_slot: u32 = 0;

    for iv in intervals {
        active.retain(|&(end, reg, _)| {
            if end < iv.start {
                free_regs.push(reg);
                false
            } else {
                true
            }
        });

        if let Some(reg) = free_regs.pop() {
            ir.value_mut(iv.value).reg = Some(RegSlot::Physical(reg));
            active.push((iv.end, reg, iv.value));
            continue;
        }

        // No free register: spill whichever active interval (including
        // this one) extends furthest, tie-broken by the lower `ValueId` so
        // the choice is deterministic.
        active.sort_by_key(|&(end, _, v)| (end, v.index()));
        match active.last().copied() {
            Some((end, reg, candidate)) if end > iv.end || (end == iv.end && candidate.index() > iv.value.index()) => {
                active.pop();
                ir.value_mut(candidate).reg = Some(RegSlot::Spill(next_spill_slot));
                next_spill_slot += ir_spill_stride(ir, candidate);
                ir.value_mut(iv.value).reg = Some(RegSlot::Physical(reg));
                active.push((iv.end, reg, iv.value));
            }
            _ => {
                ir.value_mut(iv.value).reg = Some(RegSlot::Spill(next_spill_slot));
                next_spill_slot += ir_spill_stride(ir, iv.value);
            }
        }
    }
}

fn ir_spill_stride(ir: &Ir, value: ValueId) -> u32 {
    ir.value(value).ty.size_bytes().max(8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ValueType;

    #[test]
    fn assigns_distinct_registers_to_disjoint_intervals() {
        let mut ir = Ir::new();
        let a = ir.load_local(ValueType::I32, 0);
        ir.store(a, a);
        let b = ir.load_local(ValueType::I32, 8);
        ir.store(b, b);

        RegisterAllocation.run(&mut ir);

        assert!(matches!(ir.value(a).reg, Some(RegSlot::Physical(_))));
        assert!(matches!(ir.value(b).reg, Some(RegSlot::Physical(_))));
    }

    #[test]
    fn spills_when_register_pressure_exceeds_the_class_budget() {
        let mut ir = Ir::new();
        let mut live = Vec::new();
        for i in 0..(INT_REGS + 4) {
            live.push(ir.load_local(ValueType::I32, i * 8));
        }
        for &v in &live {
            ir.store(v, v);
        }

        RegisterAllocation.run(&mut ir);

        let spilled = live
            .iter()
            .filter(|&&v| matches!(ir.value(v).reg, Some(RegSlot::Spill(_))))
            .count();
        assert!(spilled > 0);
    }
}
