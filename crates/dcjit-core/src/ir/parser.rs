//! Reader for the textual form written by `display.rs`.

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::block::BlockId;
use super::instr::{DebugMeta, FallbackMeta, Instruction};
use super::module::Ir;
use super::opcode::Opcode;
use super::types::ValueType;
use super::value::{Constant, ValueId};

#[derive(Debug, Error)]
pub enum IrParseError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: unknown value %{id}")]
    UnknownValue { line: usize, id: u32 },
    #[error("line {line}: unknown block {label}")]
    UnknownBlock { line: usize, label: u32 },
    #[error("line {line}: unknown opcode {mnemonic:?}")]
    UnknownOpcode { line: usize, mnemonic: String },
}

type Result<T> = std::result::Result<T, IrParseError>;

fn syntax(line: usize, message: impl Into<String>) -> IrParseError {
    IrParseError::Syntax {
        line,
        message: message.into(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Consts,
    Locals,
    Edges,
}

fn local_footprint(ty: ValueType) -> u32 {
    match ty {
        ValueType::V128 => 16,
        ValueType::Void | ValueType::String | ValueType::Block => 8,
        _ => ty.size_bytes(),
    }
}

pub fn parse(text: &str) -> Result<Ir> {
    let mut ir = Ir::empty();
    let mut block_map: FxHashMap<u32, BlockId> = FxHashMap::default();

    // Pass 1: block declarations only, so forward references (block
    // constants in `consts:`, instructions referencing later blocks) resolve.
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if let Some(rest) = line.strip_suffix(':').and_then(|l| l.strip_prefix("block ")) {
            let label: u32 = rest
                .trim()
                .parse()
                .map_err(|_| syntax(lineno + 1, "bad block label"))?;
            let id = ir.append_block();
            ir.set_block_label(id, label);
            block_map.insert(label, id);
        }
    }

    let mut value_map: FxHashMap<u32, ValueId> = FxHashMap::default();
    let mut section = Section::None;
    let mut current_block: Option<BlockId> = None;

    for (lineno, raw) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "consts:" {
            section = Section::Consts;
            continue;
        }
        if trimmed == "locals:" {
            section = Section::Locals;
            continue;
        }
        if trimmed == "edges:" {
            section = Section::Edges;
            continue;
        }
        if let Some(rest) = trimmed.strip_suffix(':').and_then(|l| l.strip_prefix("block ")) {
            let label: u32 = rest
                .trim()
                .parse()
                .map_err(|_| syntax(lineno, "bad block label"))?;
            current_block = Some(
                *block_map
                    .get(&label)
                    .ok_or(IrParseError::UnknownBlock { line: lineno, label })?,
            );
            continue;
        }

        match section {
            Section::Consts => parse_const_line(&mut ir, &mut value_map, &block_map, lineno, trimmed)?,
            Section::Locals => parse_local_line(&mut ir, lineno, trimmed)?,
            Section::Edges => parse_edge_line(&mut ir, &block_map, lineno, trimmed)?,
            Section::None => {
                let block = current_block
                    .ok_or_else(|| syntax(lineno, "instruction outside any block"))?;
                parse_instr_line(&mut ir, &mut value_map, block, lineno, trimmed)?;
            }
        }
    }

    ir.recompute_locals_size(local_footprint);
    ir.renumber_labels();
    if let Some((first_id, _)) = ir.blocks().next() {
        ir.set_insert_point_end(first_id);
    }
    Ok(ir)
}

fn parse_const_line(
    ir: &mut Ir,
    value_map: &mut FxHashMap<u32, ValueId>,
    block_map: &FxHashMap<u32, BlockId>,
    lineno: usize,
    line: &str,
) -> Result<()> {
    // "%3: i32 = 42"
    let (lhs, rhs) = line
        .split_once('=')
        .ok_or_else(|| syntax(lineno, "expected '=' in const line"))?;
    let lhs = lhs.trim();
    let rhs = rhs.trim();
    let id_str = lhs
        .strip_prefix('%')
        .ok_or_else(|| syntax(lineno, "expected '%' in const line"))?;
    let (id_str, ty_str) = id_str
        .split_once(':')
        .ok_or_else(|| syntax(lineno, "expected ':' in const line"))?;
    let text_id: u32 = id_str
        .trim()
        .parse()
        .map_err(|_| syntax(lineno, "bad value id"))?;
    let ty: ValueType = ty_str
        .trim()
        .parse()
        .map_err(|_| syntax(lineno, "bad const type"))?;

    let constant = match ty {
        ValueType::I8 => Constant::I8(rhs.parse().map_err(|_| syntax(lineno, "bad i8 literal"))?),
        ValueType::I16 => Constant::I16(rhs.parse().map_err(|_| syntax(lineno, "bad i16 literal"))?),
        ValueType::I32 => Constant::I32(rhs.parse().map_err(|_| syntax(lineno, "bad i32 literal"))?),
        ValueType::I64 => Constant::I64(rhs.parse().map_err(|_| syntax(lineno, "bad i64 literal"))?),
        ValueType::F32 => Constant::F32(rhs.parse().map_err(|_| syntax(lineno, "bad f32 literal"))?),
        ValueType::F64 => Constant::F64(rhs.parse().map_err(|_| syntax(lineno, "bad f64 literal"))?),
        ValueType::Block => {
            let label: u32 = rhs.parse().map_err(|_| syntax(lineno, "bad block literal"))?;
            let block = *block_map
                .get(&label)
                .ok_or(IrParseError::UnknownBlock { line: lineno, label })?;
            Constant::Block(block)
        }
        ValueType::Void | ValueType::String => {
            return Err(syntax(lineno, "constants of this type are not supported"))
        }
    };

    let id = ir.alloc_const(constant);
    value_map.insert(text_id, id);
    Ok(())
}

fn parse_local_line(ir: &mut Ir, lineno: usize, line: &str) -> Result<()> {
    // "0: i32"
    let (off_str, ty_str) = line
        .split_once(':')
        .ok_or_else(|| syntax(lineno, "expected ':' in local line"))?;
    let offset: u32 = off_str
        .trim()
        .parse()
        .map_err(|_| syntax(lineno, "bad local offset"))?;
    let ty: ValueType = ty_str
        .trim()
        .parse()
        .map_err(|_| syntax(lineno, "bad local type"))?;
    ir.push_parsed_local(ty, offset);
    Ok(())
}

fn parse_edge_line(
    ir: &mut Ir,
    block_map: &FxHashMap<u32, BlockId>,
    lineno: usize,
    line: &str,
) -> Result<()> {
    let (src, dst) = line
        .split_once("->")
        .ok_or_else(|| syntax(lineno, "expected '->' in edge line"))?;
    let src: u32 = src.trim().parse().map_err(|_| syntax(lineno, "bad edge src"))?;
    let dst: u32 = dst.trim().parse().map_err(|_| syntax(lineno, "bad edge dst"))?;
    let src = *block_map
        .get(&src)
        .ok_or(IrParseError::UnknownBlock { line: lineno, label: src })?;
    let dst = *block_map
        .get(&dst)
        .ok_or(IrParseError::UnknownBlock { line: lineno, label: dst })?;
    ir.add_edge(src, dst);
    Ok(())
}

fn parse_instr_line(
    ir: &mut Ir,
    value_map: &mut FxHashMap<u32, ValueId>,
    block: BlockId,
    lineno: usize,
    line: &str,
) -> Result<()> {
    let (main, meta) = match line.split_once(" ; ") {
        Some((m, t)) => (m.trim(), Some(t.trim())),
        None => (line, None),
    };

    let (result_part, body) = match main.split_once(" = ") {
        Some((lhs, rhs)) => (Some(lhs.trim()), rhs.trim()),
        None => (None, main),
    };

    let (result_id_text, result_ty) = match result_part {
        Some(lhs) => {
            let rest = lhs
                .strip_prefix('%')
                .ok_or_else(|| syntax(lineno, "expected '%' before result id"))?;
            let (id_str, ty_str) = rest
                .split_once(':')
                .ok_or_else(|| syntax(lineno, "expected ':' after result id"))?;
            let id: u32 = id_str.trim().parse().map_err(|_| syntax(lineno, "bad result id"))?;
            let ty: ValueType = ty_str
                .trim()
                .parse()
                .map_err(|_| syntax(lineno, "bad result type"))?;
            (Some(id), Some(ty))
        }
        None => (None, None),
    };

    let mut parts = body.splitn(2, ' ');
    let mnemonic = parts.next().unwrap_or("").trim();
    let op = Opcode::from_mnemonic(mnemonic).ok_or_else(|| IrParseError::UnknownOpcode {
        line: lineno,
        mnemonic: mnemonic.to_string(),
    })?;
    let args_str = parts.next().unwrap_or("").trim();

    let mut args: Vec<ValueId> = Vec::new();
    if !args_str.is_empty() {
        for tok in args_str.split(", ") {
            let tok = tok.trim();
            let id: u32 = tok
                .strip_prefix('%')
                .ok_or_else(|| syntax(lineno, "expected '%' before operand id"))?
                .parse()
                .map_err(|_| syntax(lineno, "bad operand id"))?;
            let vid = *value_map
                .get(&id)
                .ok_or(IrParseError::UnknownValue { line: lineno, id })?;
            args.push(vid);
        }
    }

    let fallback = meta
        .filter(|m| m.starts_with("fallback"))
        .map(|m| parse_fallback_meta(lineno, m))
        .transpose()?;
    let debug = meta
        .filter(|m| m.starts_with("debug"))
        .map(|m| parse_debug_meta(lineno, m))
        .transpose()?;

    let mut instr = Instruction::new(op, block);
    instr.fallback = fallback;
    instr.debug = debug;
    let (_instr_id, result) = ir.push_parsed_instr(instr, &args, result_ty);

    if let (Some(text_id), Some(result)) = (result_id_text, result) {
        value_map.insert(text_id, result);
    }
    Ok(())
}

fn parse_hex_u32(lineno: usize, field: &str, s: &str) -> Result<u32> {
    let s = s
        .strip_prefix("0x")
        .ok_or_else(|| syntax(lineno, format!("expected 0x-prefixed {field}")))?;
    u32::from_str_radix(s, 16).map_err(|_| syntax(lineno, format!("bad hex in {field}")))
}

fn parse_fallback_meta(lineno: usize, m: &str) -> Result<FallbackMeta> {
    // "fallback raw=0x1234 addr=0x8001000"
    let mut raw_instr = None;
    let mut guest_addr = None;
    for field in m.split_whitespace().skip(1) {
        let (key, val) = field
            .split_once('=')
            .ok_or_else(|| syntax(lineno, "bad fallback field"))?;
        match key {
            "raw" => raw_instr = Some(parse_hex_u32(lineno, "raw", val)?),
            "addr" => guest_addr = Some(parse_hex_u32(lineno, "addr", val)?),
            _ => return Err(syntax(lineno, "unknown fallback field")),
        }
    }
    Ok(FallbackMeta {
        raw_instr: raw_instr.ok_or_else(|| syntax(lineno, "missing fallback raw"))?,
        guest_addr: guest_addr.ok_or_else(|| syntax(lineno, "missing fallback addr"))?,
    })
}

fn parse_debug_meta(lineno: usize, m: &str) -> Result<DebugMeta> {
    // `debug desc="..." addr=0x... raw=0x...`
    let desc_start = m
        .find("desc=\"")
        .ok_or_else(|| syntax(lineno, "missing debug desc"))?
        + "desc=\"".len();
    let desc_end = m[desc_start..]
        .find('"')
        .ok_or_else(|| syntax(lineno, "unterminated debug desc"))?
        + desc_start;
    let desc = m[desc_start..desc_end].to_string();
    let rest = &m[desc_end + 1..];

    let mut guest_addr = None;
    let mut raw_instr = None;
    for field in rest.split_whitespace() {
        let (key, val) = field
            .split_once('=')
            .ok_or_else(|| syntax(lineno, "bad debug field"))?;
        match key {
            "addr" => guest_addr = Some(parse_hex_u32(lineno, "addr", val)?),
            "raw" => raw_instr = Some(parse_hex_u32(lineno, "raw", val)?),
            _ => return Err(syntax(lineno, "unknown debug field")),
        }
    }
    Ok(DebugMeta {
        desc,
        guest_addr: guest_addr.ok_or_else(|| syntax(lineno, "missing debug addr"))?,
        raw_instr: raw_instr.ok_or_else(|| syntax(lineno, "missing debug raw"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::builder::InsertPointGuard;
    use super::super::module::InsertPoint;
    use super::*;

    #[test]
    fn round_trips_simple_arithmetic() {
        let mut ir = Ir::new();
        let a = ir.alloc_i32(1);
        let b = ir.alloc_i32(2);
        let sum = ir.add(ValueType::I32, a, b);
        ir.store(sum, sum);

        let text = ir.to_string();
        let parsed = parse(&text).expect("round trip parse");
        assert_eq!(parsed.block_count(), ir.block_count());
        assert_eq!(parsed.instr_count(), ir.instr_count());
        let _ = InsertPointGuard::new(&mut ir, InsertPoint { block: BlockId(0), before: None });
    }
}
