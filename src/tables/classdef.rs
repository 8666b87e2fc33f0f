//! ClassDef table: `GlyphId -> ClassId`, default class `0`.

use crate::buffer::GlyphId;
use crate::reader::Reader;

struct RangeRecord {
    start: u16,
    end: u16,
    class: u16,
}

enum Repr {
    Contiguous { start_glyph: u16, classes: Vec<u16> },
    Ranges(Vec<RangeRecord>),
}

pub struct ClassDef {
    repr: Repr,
}

impl ClassDef {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let format = r.read_u16().ok()?;
        match format {
            1 => {
                let start_glyph = r.read_u16().ok()?;
                let count = r.read_u16().ok()?;
                let classes = r.read_u16_array(count as usize).ok()?;
                Some(Self { repr: Repr::Contiguous { start_glyph, classes } })
            }
            2 => {
                let count = r.read_u16().ok()?;
                let mut ranges = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let start = r.read_u16().ok()?;
                    let end = r.read_u16().ok()?;
                    let class = r.read_u16().ok()?;
                    ranges.push(RangeRecord { start, end, class });
                }
                Some(Self { repr: Repr::Ranges(ranges) })
            }
            _ => None,
        }
    }

    /// No per-query allocation regardless of glyph-space density.
    pub fn class(&self, gid: GlyphId) -> u16 {
        match &self.repr {
            Repr::Contiguous { start_glyph, classes } => {
                if gid.0 < *start_glyph {
                    return 0;
                }
                let idx = (gid.0 - start_glyph) as usize;
                classes.get(idx).copied().unwrap_or(0)
            }
            Repr::Ranges(ranges) => {
                let mut lo = 0usize;
                let mut hi = ranges.len();
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    let rec = &ranges[mid];
                    if gid.0 < rec.start {
                        hi = mid;
                    } else if gid.0 > rec.end {
                        lo = mid + 1;
                    } else {
                        return rec.class;
                    }
                }
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_format_defaults_outside_range() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&10u16.to_be_bytes()); // startGlyph
        data.extend_from_slice(&3u16.to_be_bytes()); // count
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&2u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        let cd = ClassDef::parse(&data).unwrap();
        assert_eq!(cd.class(GlyphId(9)), 0);
        assert_eq!(cd.class(GlyphId(11)), 2);
        assert_eq!(cd.class(GlyphId(20)), 0);
    }

    #[test]
    fn range_format_sparse_space() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&1000u16.to_be_bytes());
        data.extend_from_slice(&1005u16.to_be_bytes());
        data.extend_from_slice(&4u16.to_be_bytes());
        let cd = ClassDef::parse(&data).unwrap();
        assert_eq!(cd.class(GlyphId(1002)), 4);
        assert_eq!(cd.class(GlyphId(2)), 0);
    }
}
