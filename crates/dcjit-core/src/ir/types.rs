//! IR value types.

use std::fmt;

/// The type carried by an IR [`Value`](super::Value).
///
/// `Void` is used for instructions with no result (stores, branches, calls).
/// `Block` is the type of a block-label constant used as a branch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Void,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    V128,
    String,
    Block,
}

impl ValueType {
    /// Size in bytes of a concrete scalar type. Panics on `Void`/`String`/`Block`,
    /// which have no fixed host representation.
    pub fn size_bytes(self) -> u32 {
        match self {
            ValueType::I8 => 1,
            ValueType::I16 => 2,
            ValueType::I32 => 4,
            ValueType::I64 => 8,
            ValueType::F32 => 4,
            ValueType::F64 => 8,
            ValueType::V128 => 16,
            ValueType::Void | ValueType::String | ValueType::Block => {
                panic!("{self:?} has no fixed size")
            }
        }
    }

    pub fn is_int(self) -> bool {
        matches!(
            self,
            ValueType::I8 | ValueType::I16 | ValueType::I32 | ValueType::I64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ValueType::F32 | ValueType::F64)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Void => "void",
            ValueType::I8 => "i8",
            ValueType::I16 => "i16",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::V128 => "v128",
            ValueType::String => "string",
            ValueType::Block => "block",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ValueType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "void" => ValueType::Void,
            "i8" => ValueType::I8,
            "i16" => ValueType::I16,
            "i32" => ValueType::I32,
            "i64" => ValueType::I64,
            "f32" => ValueType::F32,
            "f64" => ValueType::F64,
            "v128" => ValueType::V128,
            "string" => ValueType::String,
            "block" => ValueType::Block,
            _ => return Err(()),
        })
    }
}
