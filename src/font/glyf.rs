//! `glyf`/`loca` raw outline access.
//!
//! Outline *interpretation* (contour/point extraction, composite-glyph
//! transform resolution) is an external collaborator's job, not the shaping
//! core's — this module only resolves a glyph ID to its raw byte range.

use crate::error::Result;
use crate::reader::Reader;

fn glyph_offset(loca: &[u8], glyph_id: u16, long_format: bool) -> Result<u32> {
    let mut r = Reader::new(loca);
    if long_format {
        r.skip((glyph_id as usize) * 4)?;
        r.read_u32()
    } else {
        r.skip((glyph_id as usize) * 2)?;
        Ok(r.read_u16()? as u32 * 2)
    }
}

/// The raw `glyf` byte range for `glyph_id`. Empty for space-like glyphs
/// (where `loca[gid] == loca[gid + 1]`), per the `loca` convention.
pub fn glyph_range<'a>(
    glyf: &'a [u8],
    loca: &'a [u8],
    glyph_id: u16,
    long_format: bool,
) -> Result<&'a [u8]> {
    let start = glyph_offset(loca, glyph_id, long_format)?;
    let end = glyph_offset(loca, glyph_id + 1, long_format)?;
    if end <= start {
        return Ok(&[]);
    }
    let mut r = Reader::new(glyf);
    r.skip(start as usize)?;
    r.read_bytes((end - start) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_range_for_space_glyph() {
        let loca: Vec<u8> = [0u16, 10, 10, 20]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let glyf = vec![0u8; 20];
        let range = glyph_range(&glyf, &loca, 1, false).unwrap();
        assert!(range.is_empty());
    }

    #[test]
    fn nonempty_range_resolves_correct_slice() {
        let loca: Vec<u8> = [0u16, 10, 10, 20]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let glyf = vec![0u8; 20];
        let range = glyph_range(&glyf, &loca, 0, false).unwrap();
        assert_eq!(range.len(), 10);
    }
}
