//! Coverage table: ordered glyph-ID set with `O(log n)` membership lookup.

use crate::buffer::GlyphId;
use crate::reader::Reader;

#[derive(Debug, Clone, Copy)]
struct RangeRecord {
    start: u16,
    end: u16,
    start_coverage_index: u16,
}

#[derive(Clone)]
enum Repr<'a> {
    List(&'a [u8]), // raw array of big-endian u16 glyph IDs, sorted
    Ranges(Vec<RangeRecord>),
}

#[derive(Clone)]
pub struct Coverage<'a> {
    repr: Repr<'a>,
}

impl<'a> Coverage<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let format = r.read_u16().ok()?;
        match format {
            1 => {
                let count = r.read_u16().ok()? as usize;
                let bytes = r.read_bytes(count * 2).ok()?;
                Some(Self { repr: Repr::List(bytes) })
            }
            2 => {
                let count = r.read_u16().ok()?;
                let mut ranges = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let start = r.read_u16().ok()?;
                    let end = r.read_u16().ok()?;
                    let start_coverage_index = r.read_u16().ok()?;
                    ranges.push(RangeRecord { start, end, start_coverage_index });
                }
                Some(Self { repr: Repr::Ranges(ranges) })
            }
            _ => None,
        }
    }

    pub fn lookup(&self, gid: GlyphId) -> Option<u16> {
        match &self.repr {
            Repr::List(bytes) => {
                let count = bytes.len() / 2;
                let mut lo = 0usize;
                let mut hi = count;
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    let val = u16::from_be_bytes([bytes[mid * 2], bytes[mid * 2 + 1]]);
                    match val.cmp(&gid.0) {
                        std::cmp::Ordering::Less => lo = mid + 1,
                        std::cmp::Ordering::Greater => hi = mid,
                        std::cmp::Ordering::Equal => return Some(mid as u16),
                    }
                }
                None
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
                        return Some(rec.start_coverage_index + (gid.0 - rec.start));
                    }
                }
                None
            }
        }
    }

    pub fn contains(&self, gid: GlyphId) -> bool {
        self.lookup(gid).is_some()
    }

    /// Ordered glyph iteration, consistent with the indices `lookup` returns.
    pub fn glyphs(&self) -> Vec<GlyphId> {
        match &self.repr {
            Repr::List(bytes) => bytes
                .chunks_exact(2)
                .map(|c| GlyphId(u16::from_be_bytes([c[0], c[1]])))
                .collect(),
            Repr::Ranges(ranges) => ranges
                .iter()
                .flat_map(|r| (r.start..=r.end).map(GlyphId))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_format1(glyphs: &[u16]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&(glyphs.len() as u16).to_be_bytes());
        for &g in glyphs {
            out.extend_from_slice(&g.to_be_bytes());
        }
        out
    }

    fn build_format2(ranges: &[(u16, u16, u16)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&2u16.to_be_bytes());
        out.extend_from_slice(&(ranges.len() as u16).to_be_bytes());
        for &(s, e, i) in ranges {
            out.extend_from_slice(&s.to_be_bytes());
            out.extend_from_slice(&e.to_be_bytes());
            out.extend_from_slice(&i.to_be_bytes());
        }
        out
    }

    #[test]
    fn format1_binary_search() {
        let data = build_format1(&[5, 10, 20, 40]);
        let cov = Coverage::parse(&data).unwrap();
        assert_eq!(cov.lookup(GlyphId(20)), Some(2));
        assert_eq!(cov.lookup(GlyphId(21)), None);
    }

    #[test]
    fn format2_ranges() {
        let data = build_format2(&[(10, 12, 0), (50, 50, 3)]);
        let cov = Coverage::parse(&data).unwrap();
        assert_eq!(cov.lookup(GlyphId(11)), Some(1));
        assert_eq!(cov.lookup(GlyphId(50)), Some(3));
        assert_eq!(cov.lookup(GlyphId(13)), None);
    }

    #[test]
    fn round_trip_glyphs_and_lookup() {
        let data = build_format1(&[3, 7, 9]);
        let cov = Coverage::parse(&data).unwrap();
        for (k, gid) in cov.glyphs().into_iter().enumerate() {
            assert_eq!(cov.lookup(gid), Some(k as u16));
        }
    }
}
