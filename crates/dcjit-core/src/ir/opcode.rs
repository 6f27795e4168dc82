//! IR operations.
//!
//! The op set mirrors the builder surface named in the IR module's
//! component design: arithmetic, bitwise, shifts, comparisons, memory,
//! casts, branches, calls, and debug intrinsics. Vector math is left out —
//! nothing in this crate's scope lowers to it.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // memory: raw host
    Load,
    Store,
    // memory: guest, speculative unchecked (fastmem)
    LoadFast,
    StoreFast,
    // memory: guest, checked slow path
    LoadSlow,
    StoreSlow,
    // memory: interpreter context struct
    LoadContext,
    StoreContext,
    // memory: spill locals
    LoadLocal,
    StoreLocal,

    // casts
    FtoI,
    ItoF,
    Sext,
    Zext,
    Trunc,
    Fext,
    Ftrunc,

    // conditional
    Select,

    // integer comparisons
    CmpEq,
    CmpNe,
    CmpSge,
    CmpSgt,
    CmpUge,
    CmpUgt,
    CmpSle,
    CmpSlt,
    CmpUle,
    CmpUlt,

    // float comparisons
    FcmpEq,
    FcmpNe,
    FcmpGe,
    FcmpGt,
    FcmpLe,
    FcmpLt,

    // integer math
    Add,
    Sub,
    Smul,
    Umul,
    Div,
    Neg,
    Abs,

    // float math
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    Fneg,
    Fabs,
    Sqrt,

    // bitwise
    And,
    Or,
    Xor,
    Not,
    Shl,
    Ashr,
    Lshr,
    /// Shift whose direction (left vs. right) is determined at runtime by
    /// the sign of the (variable) shift amount — SH-4's SHAD.
    Ashd,
    /// Logical counterpart of [`Opcode::Ashd`] — SH-4's SHLD.
    Lshd,

    // control flow
    Label,
    Branch,
    BranchTrue,
    BranchFalse,

    // calls
    Call,
    CallCond,
    CallNoreturn,
    CallFallback,

    // debug
    DebugInfo,
    DebugBreak,
    AssertLt,
}

impl Opcode {
    /// True for ops with no result value (pure side effect or control flow).
    pub fn is_void(self) -> bool {
        matches!(
            self,
            Opcode::Store
                | Opcode::StoreFast
                | Opcode::StoreSlow
                | Opcode::StoreContext
                | Opcode::StoreLocal
                | Opcode::Label
                | Opcode::Branch
                | Opcode::BranchTrue
                | Opcode::BranchFalse
                | Opcode::Call
                | Opcode::CallCond
                | Opcode::CallNoreturn
                | Opcode::CallFallback
                | Opcode::DebugInfo
                | Opcode::DebugBreak
                | Opcode::AssertLt
        )
    }

    /// True for ops whose absence of uses does not license dead-code removal:
    /// memory stores, calls, branches, and debug intrinsics are all
    /// observable side effects per the pass pipeline's DCE precondition.
    pub fn has_side_effects(self) -> bool {
        matches!(
            self,
            Opcode::Store
                | Opcode::StoreFast
                | Opcode::StoreSlow
                | Opcode::StoreContext
                | Opcode::StoreLocal
                | Opcode::Branch
                | Opcode::BranchTrue
                | Opcode::BranchFalse
                | Opcode::Call
                | Opcode::CallCond
                | Opcode::CallNoreturn
                | Opcode::CallFallback
                | Opcode::DebugInfo
                | Opcode::DebugBreak
                | Opcode::AssertLt
                | Opcode::Label
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::LoadFast => "load.fast",
            Opcode::StoreFast => "store.fast",
            Opcode::LoadSlow => "load.slow",
            Opcode::StoreSlow => "store.slow",
            Opcode::LoadContext => "load.ctx",
            Opcode::StoreContext => "store.ctx",
            Opcode::LoadLocal => "load.local",
            Opcode::StoreLocal => "store.local",
            Opcode::FtoI => "ftoi",
            Opcode::ItoF => "itof",
            Opcode::Sext => "sext",
            Opcode::Zext => "zext",
            Opcode::Trunc => "trunc",
            Opcode::Fext => "fext",
            Opcode::Ftrunc => "ftrunc",
            Opcode::Select => "select",
            Opcode::CmpEq => "cmp.eq",
            Opcode::CmpNe => "cmp.ne",
            Opcode::CmpSge => "cmp.sge",
            Opcode::CmpSgt => "cmp.sgt",
            Opcode::CmpUge => "cmp.uge",
            Opcode::CmpUgt => "cmp.ugt",
            Opcode::CmpSle => "cmp.sle",
            Opcode::CmpSlt => "cmp.slt",
            Opcode::CmpUle => "cmp.ule",
            Opcode::CmpUlt => "cmp.ult",
            Opcode::FcmpEq => "fcmp.eq",
            Opcode::FcmpNe => "fcmp.ne",
            Opcode::FcmpGe => "fcmp.ge",
            Opcode::FcmpGt => "fcmp.gt",
            Opcode::FcmpLe => "fcmp.le",
            Opcode::FcmpLt => "fcmp.lt",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Smul => "smul",
            Opcode::Umul => "umul",
            Opcode::Div => "div",
            Opcode::Neg => "neg",
            Opcode::Abs => "abs",
            Opcode::Fadd => "fadd",
            Opcode::Fsub => "fsub",
            Opcode::Fmul => "fmul",
            Opcode::Fdiv => "fdiv",
            Opcode::Fneg => "fneg",
            Opcode::Fabs => "fabs",
            Opcode::Sqrt => "sqrt",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Not => "not",
            Opcode::Shl => "shl",
            Opcode::Ashr => "ashr",
            Opcode::Lshr => "lshr",
            Opcode::Ashd => "ashd",
            Opcode::Lshd => "lshd",
            Opcode::Label => "label",
            Opcode::Branch => "branch",
            Opcode::BranchTrue => "branch.true",
            Opcode::BranchFalse => "branch.false",
            Opcode::Call => "call",
            Opcode::CallCond => "call.cond",
            Opcode::CallNoreturn => "call.noreturn",
            Opcode::CallFallback => "call.fallback",
            Opcode::DebugInfo => "debug.info",
            Opcode::DebugBreak => "debug.break",
            Opcode::AssertLt => "assert.lt",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Opcode> {
        use Opcode::*;
        Some(match s {
            "load" => Load,
            "store" => Store,
            "load.fast" => LoadFast,
            "store.fast" => StoreFast,
            "load.slow" => LoadSlow,
            "store.slow" => StoreSlow,
            "load.ctx" => LoadContext,
            "store.ctx" => StoreContext,
            "load.local" => LoadLocal,
            "store.local" => StoreLocal,
            "ftoi" => FtoI,
            "itof" => ItoF,
            "sext" => Sext,
            "zext" => Zext,
            "trunc" => Trunc,
            "fext" => Fext,
            "ftrunc" => Ftrunc,
            "select" => Select,
            "cmp.eq" => CmpEq,
            "cmp.ne" => CmpNe,
            "cmp.sge" => CmpSge,
            "cmp.sgt" => CmpSgt,
            "cmp.uge" => CmpUge,
            "cmp.ugt" => CmpUgt,
            "cmp.sle" => CmpSle,
            "cmp.slt" => CmpSlt,
            "cmp.ule" => CmpUle,
            "cmp.ult" => CmpUlt,
            "fcmp.eq" => FcmpEq,
            "fcmp.ne" => FcmpNe,
            "fcmp.ge" => FcmpGe,
            "fcmp.gt" => FcmpGt,
            "fcmp.le" => FcmpLe,
            "fcmp.lt" => FcmpLt,
            "add" => Add,
            "sub" => Sub,
            "smul" => Smul,
            "umul" => Umul,
            "div" => Div,
            "neg" => Neg,
            "abs" => Abs,
            "fadd" => Fadd,
            "fsub" => Fsub,
            "fmul" => Fmul,
            "fdiv" => Fdiv,
            "fneg" => Fneg,
            "fabs" => Fabs,
            "sqrt" => Sqrt,
            "and" => And,
            "or" => Or,
            "xor" => Xor,
            "not" => Not,
            "shl" => Shl,
            "ashr" => Ashr,
            "lshr" => Lshr,
            "ashd" => Ashd,
            "lshd" => Lshd,
            "label" => Label,
            "branch" => Branch,
            "branch.true" => BranchTrue,
            "branch.false" => BranchFalse,
            "call" => Call,
            "call.cond" => CallCond,
            "call.noreturn" => CallNoreturn,
            "call.fallback" => CallFallback,
            "debug.info" => DebugInfo,
            "debug.break" => DebugBreak,
            "assert.lt" => AssertLt,
            _ => return None,
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
