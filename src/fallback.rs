//! GPOS fallback paths (§4.J "Fallback"): used when a font lacks `GPOS`
//! entirely, or lacks it for one specific feature.
//!
//! Two independent fallbacks exist: a legacy `kern` table consulted when
//! the plan wanted `kern` but the font carries no GPOS pair-adjustment
//! lookup for it, and a Unicode-aware mark-stacking fallback consulted
//! when the font carries no `mark`/`mkmk` GPOS lookups at all.

use crate::buffer::GlyphBuffer;
use crate::reader::Reader;
use crate::unicode::normalize::combining_class;

/// Subtable format 0 of the legacy `kern` table: an ordered list of
/// `(left, right) -> value` pairs, searched by binary search per the
/// table's own `nPairs`/`searchRange` header (we ignore the search hints
/// and always binary-search, since the pairs are guaranteed pre-sorted).
struct KernPairs {
    pairs: Vec<(u16, u16, i16)>,
}

impl KernPairs {
    fn lookup(&self, left: u16, right: u16) -> Option<i16> {
        self.pairs
            .binary_search_by(|&(l, r, _)| (l, r).cmp(&(left, right)))
            .ok()
            .map(|idx| self.pairs[idx].2)
    }
}

/// Parses every format-0 horizontal subtable of a legacy `kern` table
/// (the only format this fallback needs: format 2's class-pair matrix is
/// the GPOS-equivalent style modern fonts ship GPOS for instead).
fn parse_kern_table(data: &[u8]) -> Option<KernPairs> {
    let mut r = Reader::new(data);
    let version = r.read_u16().ok()?;
    let mut pairs = Vec::new();

    if version == 0 {
        let num_tables = r.read_u16().ok()?;
        let mut offset = 4usize;
        for _ in 0..num_tables {
            let mut sr = Reader::new(data.get(offset..)?);
            let _sub_version = sr.read_u16().ok()?;
            let length = sr.read_u16().ok()? as usize;
            let coverage = sr.read_u16().ok()?;
            let format = coverage >> 8;
            let horizontal = coverage & 0x1 != 0;
            if format == 0 && horizontal {
                let n_pairs = sr.read_u16().ok()?;
                sr.skip(6).ok()?; // searchRange, entrySelector, rangeShift
                for _ in 0..n_pairs {
                    let left = sr.read_u16().ok()?;
                    let right = sr.read_u16().ok()?;
                    let value = sr.read_i16().ok()?;
                    pairs.push((left, right, value));
                }
            }
            offset += length.max(6);
        }
    } else {
        // Apple's OpenType variant uses a 32-bit version/table count header;
        // not consulted here since fonts using it ship `kerx` instead.
        return None;
    }

    pairs.sort_by_key(|&(l, r, _)| (l, r));
    Some(KernPairs { pairs })
}

/// Adds legacy `kern` adjustments between every adjacent glyph pair that
/// has an entry, for fonts where the shape plan selected `kern` but GPOS
/// carried no matching pair-adjustment lookup.
pub fn apply_legacy_kern(data: &[u8], buffer: &mut GlyphBuffer) {
    let Some(table) = parse_kern_table(data) else { return };
    if buffer.len() < 2 {
        return;
    }
    for i in 0..buffer.len() - 1 {
        let left = buffer.info()[i].glyph_id.0;
        let right = buffer.info()[i + 1].glyph_id.0;
        if let Some(value) = table.lookup(left, right) {
            buffer.pos_mut()[i].x_advance += value as i32;
        }
    }
}

/// Combining-class-driven stacking position for a mark relative to its
/// base, per §4.J's fallback description ("above/below/overlay").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackPosition {
    Above,
    Below,
    Overlay,
}

fn stack_position(ccc: u8) -> StackPosition {
    match ccc {
        1 => StackPosition::Overlay,
        7 | 9 | 202 | 220 => StackPosition::Below,
        0 => StackPosition::Overlay,
        _ => StackPosition::Above,
    }
}

/// Unicode-aware mark-positioning fallback: every glyph whose codepoint
/// has a nonzero combining class is centered over (or under) the nearest
/// preceding non-mark glyph, offset vertically by the base's advance
/// height fraction and stacked outward from any marks already placed on
/// that base in the same direction.
///
/// Used only when the font carries no `GPOS` mark-attachment lookups at
/// all; it approximates what `MarkToBase`/`MarkToMark` would have done
/// using advance widths alone, since there is no anchor data to consult.
pub fn apply_mark_fallback(buffer: &mut GlyphBuffer) {
    let n = buffer.len();
    if n == 0 {
        return;
    }
    let mut base: Option<usize> = None;
    let mut stacked_above = 0i32;
    let mut stacked_below = 0i32;

    for i in 0..n {
        let ccc = combining_class(buffer.info()[i].codepoint);
        if ccc == 0 {
            base = Some(i);
            stacked_above = 0;
            stacked_below = 0;
            continue;
        }
        let Some(base_idx) = base else { continue };
        let base_advance = buffer.pos()[base_idx].x_advance;
        let mark_advance = buffer.pos()[i].x_advance;
        let x_offset = (base_advance - mark_advance) / 2;

        let step = mark_advance.max(base_advance / 4).max(1);
        let (y_offset, dy) = match stack_position(ccc) {
            StackPosition::Above => {
                stacked_above += step;
                (stacked_above, 0)
            }
            StackPosition::Below => {
                stacked_below += step;
                (-stacked_below, 0)
            }
            StackPosition::Overlay => (0, 0),
        };
        let _ = dy;

        let advance_between: i32 =
            buffer.pos()[base_idx..i].iter().map(|p| p.x_advance).sum();
        let p = &mut buffer.pos_mut()[i];
        p.x_offset = x_offset - advance_between;
        p.y_offset = y_offset;
        p.x_advance = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{GlyphId, Position, UnicodeBuffer};

    fn buffer_with_advances(gids_and_advances: &[(u16, i32)]) -> GlyphBuffer {
        let mut ub = UnicodeBuffer::new();
        for (i, &(gid, _)) in gids_and_advances.iter().enumerate() {
            ub.add_codepoint(gid as u32, i as u32);
        }
        let mut gb = GlyphBuffer::from_unicode(&ub, |cp| GlyphId(cp as u16));
        for (i, &(_, adv)) in gids_and_advances.iter().enumerate() {
            gb.pos_mut()[i] = Position { x_advance: adv, ..Position::default() };
        }
        gb
    }

    fn build_kern_format0(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
        let mut sub = Vec::new();
        sub.extend_from_slice(&0u16.to_be_bytes()); // subtable version
        let sub_len_placeholder = sub.len();
        sub.extend_from_slice(&0u16.to_be_bytes()); // length, patched below
        sub.extend_from_slice(&0x0001u16.to_be_bytes()); // coverage: format0, horizontal
        sub.extend_from_slice(&(pairs.len() as u16).to_be_bytes());
        sub.extend_from_slice(&0u16.to_be_bytes());
        sub.extend_from_slice(&0u16.to_be_bytes());
        sub.extend_from_slice(&0u16.to_be_bytes());
        for &(l, r, v) in pairs {
            sub.extend_from_slice(&l.to_be_bytes());
            sub.extend_from_slice(&r.to_be_bytes());
            sub.extend_from_slice(&v.to_be_bytes());
        }
        let len = sub.len() as u16;
        sub[sub_len_placeholder..sub_len_placeholder + 2].copy_from_slice(&len.to_be_bytes());

        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_be_bytes()); // version 0
        data.extend_from_slice(&1u16.to_be_bytes()); // 1 subtable
        data.extend_from_slice(&sub);
        data
    }

    #[test]
    fn legacy_kern_applies_matching_pair() {
        let data = build_kern_format0(&[(5, 6, -80)]);
        let mut gb = buffer_with_advances(&[(5, 500), (6, 500)]);
        apply_legacy_kern(&data, &mut gb);
        assert_eq!(gb.pos()[0].x_advance, 420);
        assert_eq!(gb.pos()[1].x_advance, 500);
    }

    #[test]
    fn mark_fallback_stacks_combining_mark_above_base() {
        let mut ub = UnicodeBuffer::new();
        ub.add_codepoint('e' as u32, 0);
        ub.add_codepoint(0x0301, 1); // combining acute, ccc 230 -> above
        let mut gb = GlyphBuffer::from_unicode(&ub, |cp| GlyphId(cp as u16));
        gb.pos_mut()[0].x_advance = 500;
        gb.pos_mut()[1].x_advance = 0;
        apply_mark_fallback(&mut gb);
        assert!(gb.pos()[1].y_offset > 0);
        assert_eq!(gb.pos()[1].x_advance, 0);
    }
}
