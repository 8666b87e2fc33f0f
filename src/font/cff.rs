//! `CFF`/`CFF2`: charstring bytecode is not executed by the shaping core
//! (outline interpretation is an external collaborator's job, per
//! [`crate::font::glyf`]'s scope note) — this module only extracts the
//! advance-width fallback a `hmtx`-less CFF font needs (§4.B): the
//! `defaultWidthX`/`nominalWidthX` pair from the Private DICT, adjusted by
//! the optional width operand at the front of a glyph's charstring.
//!
//! CFF2 drops per-glyph widths entirely (advances come from `hmtx`/`HVAR`
//! only), so [`Cff2Table::parse`] just validates the header — there is no
//! width to extract.

use crate::error::{ParseError, Result};
use crate::reader::Reader;

struct Index<'a> {
    offsets: Vec<u32>,
    data: &'a [u8],
}

impl<'a> Index<'a> {
    fn parse(r: &mut Reader<'a>) -> Result<Self> {
        let count = r.read_u16()?;
        if count == 0 {
            return Ok(Self { offsets: Vec::new(), data: &[] });
        }
        let off_size = r.read_u8()?;
        let mut offsets = Vec::with_capacity(count as usize + 1);
        for _ in 0..=count {
            let v = match off_size {
                1 => r.read_u8()? as u32,
                2 => r.read_u16()? as u32,
                3 => r.read_u24()?,
                4 => r.read_u32()?,
                _ => return Err(ParseError::UnsupportedFormat),
            };
            offsets.push(v);
        }
        let data_len = *offsets.last().unwrap_or(&1) as usize - 1;
        let data = r.read_bytes(data_len)?;
        Ok(Self { offsets, data })
    }

    fn get(&self, index: usize) -> Option<&'a [u8]> {
        let start = *self.offsets.get(index)? as usize - 1;
        let end = *self.offsets.get(index + 1)? as usize - 1;
        self.data.get(start..end)
    }

    fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}

/// A minimal Top/Private DICT reader: enough operators to locate
/// CharStrings/Private and to read the two width defaults.
fn parse_dict(data: &[u8]) -> Vec<(u16, Vec<f64>)> {
    let mut entries = Vec::new();
    let mut operands: Vec<f64> = Vec::new();
    let mut i = 0usize;
    while i < data.len() {
        let b0 = data[i];
        match b0 {
            0..=21 => {
                let op = if b0 == 12 {
                    i += 1;
                    0x0c00 | data.get(i).copied().unwrap_or(0) as u16
                } else {
                    b0 as u16
                };
                entries.push((op, std::mem::take(&mut operands)));
                i += 1;
            }
            32..=246 => {
                operands.push(b0 as f64 - 139.0);
                i += 1;
            }
            247..=250 => {
                let b1 = *data.get(i + 1).unwrap_or(&0);
                operands.push((b0 as f64 - 247.0) * 256.0 + b1 as f64 + 108.0);
                i += 2;
            }
            251..=254 => {
                let b1 = *data.get(i + 1).unwrap_or(&0);
                operands.push(-(b0 as f64 - 251.0) * 256.0 - b1 as f64 - 108.0);
                i += 2;
            }
            28 => {
                let b1 = *data.get(i + 1).unwrap_or(&0);
                let b2 = *data.get(i + 2).unwrap_or(&0);
                operands.push(i16::from_be_bytes([b1, b2]) as f64);
                i += 3;
            }
            29 => {
                let bytes = [
                    *data.get(i + 1).unwrap_or(&0),
                    *data.get(i + 2).unwrap_or(&0),
                    *data.get(i + 3).unwrap_or(&0),
                    *data.get(i + 4).unwrap_or(&0),
                ];
                operands.push(i32::from_be_bytes(bytes) as f64);
                i += 5;
            }
            30 => {
                // real number; skip nibbles until terminator 0xf
                i += 1;
                'nibbles: while i < data.len() {
                    let byte = data[i];
                    i += 1;
                    for nibble in [byte >> 4, byte & 0xf] {
                        if nibble == 0xf {
                            break 'nibbles;
                        }
                    }
                }
                operands.push(0.0);
            }
            _ => {
                i += 1;
            }
        }
    }
    entries
}

fn dict_get<'a>(dict: &'a [(u16, Vec<f64>)], op: u16) -> Option<&'a [f64]> {
    dict.iter().find(|(o, _)| *o == op).map(|(_, v)| v.as_slice())
}

const OP_CHARSTRINGS: u16 = 17;
const OP_PRIVATE: u16 = 18;
const OP_DEFAULT_WIDTH_X: u16 = 20;
const OP_NOMINAL_WIDTH_X: u16 = 21;
const OP_SUBRS: u16 = 19;
const OP_CHARSTRING_TYPE: u16 = 0x0c06;

pub struct CffTable<'a> {
    charstrings: Index<'a>,
    global_subrs: Index<'a>,
    local_subrs: Index<'a>,
    default_width_x: f64,
    nominal_width_x: f64,
    charstring_type: u16,
}

impl<'a> CffTable<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let _major = r.read_u8()?;
        let _minor = r.read_u8()?;
        let hdr_size = r.read_u8()?;
        let _off_size = r.read_u8()?;
        r.set_pos(hdr_size as usize)?;

        let _name_index = Index::parse(&mut r)?;
        let top_dict_index = Index::parse(&mut r)?;
        let _string_index = Index::parse(&mut r)?;
        let global_subrs = Index::parse(&mut r)?;

        let top_dict_data = top_dict_index.get(0).ok_or(ParseError::MissingTable("CFF Top DICT"))?;
        let top_dict = parse_dict(top_dict_data);

        let charstrings_offset = dict_get(&top_dict, OP_CHARSTRINGS)
            .and_then(|v| v.first())
            .copied()
            .ok_or(ParseError::MissingTable("CFF CharStrings"))? as usize;
        let mut cs_reader = Reader::new(data).sub_from(charstrings_offset)?;
        let charstrings = Index::parse(&mut cs_reader)?;

        let charstring_type =
            dict_get(&top_dict, OP_CHARSTRING_TYPE).and_then(|v| v.first()).map(|&v| v as u16).unwrap_or(2);

        let (mut default_width_x, mut nominal_width_x) = (0.0, 0.0);
        let mut local_subrs = Index { offsets: Vec::new(), data: &[] };

        if let Some(priv_entry) = dict_get(&top_dict, OP_PRIVATE) {
            if priv_entry.len() >= 2 {
                let size = priv_entry[0] as usize;
                let offset = priv_entry[1] as usize;
                if let Some(priv_data) = data.get(offset..offset + size) {
                    let priv_dict = parse_dict(priv_data);
                    default_width_x =
                        dict_get(&priv_dict, OP_DEFAULT_WIDTH_X).and_then(|v| v.first()).copied().unwrap_or(0.0);
                    nominal_width_x =
                        dict_get(&priv_dict, OP_NOMINAL_WIDTH_X).and_then(|v| v.first()).copied().unwrap_or(0.0);
                    if let Some(subrs_rel) = dict_get(&priv_dict, OP_SUBRS).and_then(|v| v.first()).copied() {
                        let subrs_offset = offset + subrs_rel as usize;
                        if let Ok(mut sr) = Reader::new(data).sub_from(subrs_offset) {
                            if let Ok(subrs) = Index::parse(&mut sr) {
                                local_subrs = subrs;
                            }
                        }
                    }
                }
            }
        }

        Ok(Self { charstrings, global_subrs, local_subrs, default_width_x, nominal_width_x, charstring_type })
    }

    pub fn num_glyphs(&self) -> usize {
        self.charstrings.len()
    }

    /// Resolves `gid`'s advance width via the Type 2 charstring's optional
    /// leading width operand, falling back to `defaultWidthX` when absent.
    pub fn glyph_width(&self, gid: u16) -> Option<f64> {
        let charstring = self.charstrings.get(gid as usize)?;
        if self.charstring_type != 2 {
            return Some(self.default_width_x);
        }
        Some(extract_width(
            charstring,
            self.nominal_width_x,
            self.default_width_x,
            &self.global_subrs,
            &self.local_subrs,
        ))
    }
}

fn bias(count: usize) -> i32 {
    if count < 1240 {
        107
    } else if count < 33900 {
        1131
    } else {
        32768
    }
}

/// Walks a Type 2 charstring only far enough to read the optional leading
/// width operand, per the stack-clearing-operator parity rule. Recurses
/// one level into subroutine calls when the very first operator of the
/// top-level charstring is a call, matching how real fonts front-load
/// `callgsubr`/`callsubr` before the first stem hint.
fn extract_width(
    charstring: &[u8],
    nominal_width_x: f64,
    default_width_x: f64,
    gsubrs: &Index,
    lsubrs: &Index,
) -> f64 {
    let mut stack: Vec<f64> = Vec::new();
    let gbias = bias(gsubrs.len());
    let lbias = bias(lsubrs.len());
    let mut depth = 0;

    /// Returns `Some(extra_operand)` once a stack-clearing operator (or
    /// `endchar`) is reached, where `extra_operand` is `Some(width - nominalWidthX)`
    /// if one was present, else `None` (meaning `defaultWidthX` applies).
    fn run(
        data: &[u8],
        stack: &mut Vec<f64>,
        gsubrs: &Index,
        lsubrs: &Index,
        gbias: i32,
        lbias: i32,
        depth: &mut u32,
    ) -> Option<Option<f64>> {
        *depth += 1;
        if *depth > 10 {
            return None;
        }
        let mut i = 0usize;
        while i < data.len() {
            let b0 = data[i];
            match b0 {
                1 | 3 | 18 | 23 => return Some((stack.len() % 2 == 1).then(|| stack[0])),
                19 | 20 => return Some((stack.len() % 2 == 1).then(|| stack[0])),
                21 => return Some((stack.len() > 2).then(|| stack[0])),
                22 | 4 => return Some((stack.len() > 1).then(|| stack[0])),
                14 => return Some((stack.len() == 1 || stack.len() == 5).then(|| stack[0])),
                10 => {
                    let idx = stack.pop()? as i32 + lbias;
                    let sub = lsubrs.get(idx as usize)?;
                    if let Some(w) = run(sub, stack, gsubrs, lsubrs, gbias, lbias, depth) {
                        return Some(w);
                    }
                    i += 1;
                }
                29 => {
                    let idx = stack.pop()? as i32 + gbias;
                    let sub = gsubrs.get(idx as usize)?;
                    if let Some(w) = run(sub, stack, gsubrs, lsubrs, gbias, lbias, depth) {
                        return Some(w);
                    }
                    i += 1;
                }
                28 => {
                    let v = i16::from_be_bytes([*data.get(i + 1)?, *data.get(i + 2)?]);
                    stack.push(v as f64);
                    i += 3;
                }
                32..=246 => {
                    stack.push(b0 as f64 - 139.0);
                    i += 1;
                }
                247..=250 => {
                    let b1 = *data.get(i + 1)?;
                    stack.push((b0 as f64 - 247.0) * 256.0 + b1 as f64 + 108.0);
                    i += 2;
                }
                251..=254 => {
                    let b1 = *data.get(i + 1)?;
                    stack.push(-(b0 as f64 - 251.0) * 256.0 - b1 as f64 - 108.0);
                    i += 2;
                }
                255 => {
                    let bytes = [*data.get(i + 1)?, *data.get(i + 2)?, *data.get(i + 3)?, *data.get(i + 4)?];
                    stack.push(i32::from_be_bytes(bytes) as f64 / 65536.0);
                    i += 5;
                }
                _ => return Some(None), // operator clears the stack, no width
            }
        }
        None
    }

    match run(charstring, &mut stack, gsubrs, lsubrs, gbias, lbias, &mut depth) {
        Some(Some(extra)) => nominal_width_x + extra,
        _ => default_width_x,
    }
}

/// CFF2 carries no per-glyph widths; advances always come from `hmtx`/`HVAR`.
pub struct Cff2Table;

impl Cff2Table {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let major = r.read_u8()?;
        if major != 2 {
            return Err(ParseError::BadFont);
        }
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dict_parses_small_integers() {
        // 139 encodes as 0 (32-139=-107..107 range offset by 139)
        let data = [139u8, 17]; // operand 0, operator 17 (CharStrings)
        let dict = parse_dict(&data);
        assert_eq!(dict[0].0, 17);
        assert_eq!(dict[0].1[0], 0.0);
    }

    #[test]
    fn dict_parses_two_byte_operator() {
        let data = [139u8, 12, 6]; // operand, operator 12 6 (CharstringType)
        let dict = parse_dict(&data);
        assert_eq!(dict[0].0, OP_CHARSTRING_TYPE);
    }
}
