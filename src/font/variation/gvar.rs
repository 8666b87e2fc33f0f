//! `gvar`: per-glyph tuple variation data for outline point deltas (§4.B,
//! §4.D).
//!
//! Point *extraction* from `glyf` is an external collaborator's concern
//! (see [`crate::font::glyf`]'s module docs) — this parser resolves the
//! tuple variation headers and their packed point numbers/deltas, and
//! leaves applying them to actual outline points (including "inferred"
//! IUP-interpolated points) to that external consumer, which already
//! walks the outline and therefore has the point coordinates this module
//! does not.

use crate::error::{ParseError, Result};
use crate::font::fixed_point::NormalizedCoord;
use crate::reader::Reader;

const TUPLES_SHARE_POINT_NUMBERS: u16 = 0x8000;
const EMBEDDED_PEAK_TUPLE: u16 = 0x8000;
const INTERMEDIATE_REGION: u16 = 0x4000;
const PRIVATE_POINT_NUMBERS: u16 = 0x2000;

#[derive(Debug, Clone)]
pub struct TupleVariation {
    peak: Vec<f32>,
    intermediate: Option<(Vec<f32>, Vec<f32>)>,
    /// `None` means "applies to all points" (shares the glyph's implicit
    /// point-number set, per the shared-point-numbers flag).
    points: Option<Vec<u16>>,
    deltas: Vec<(i16, i16)>,
}

impl TupleVariation {
    fn scalar(&self, coords: &[NormalizedCoord]) -> f32 {
        let mut scalar = 1.0f32;
        for (i, &peak) in self.peak.iter().enumerate() {
            let coord = coords.get(i).map(|c| c.to_f32()).unwrap_or(0.0);
            if peak == 0.0 {
                continue;
            }
            let (start, end) = if let Some((lo, hi)) = &self.intermediate {
                (lo[i], hi[i])
            } else if peak > 0.0 {
                (0.0, peak)
            } else {
                (peak, 0.0)
            };
            let axis_scalar = if coord == peak {
                1.0
            } else if coord <= start || coord >= end {
                0.0
            } else if coord < peak {
                if peak == start { 1.0 } else { (coord - start) / (peak - start) }
            } else if peak == end {
                1.0
            } else {
                (end - coord) / (end - peak)
            };
            scalar *= axis_scalar;
            if scalar == 0.0 {
                return 0.0;
            }
        }
        scalar
    }

    /// Point indices this tuple touches, or `None` for "all points".
    pub fn points(&self) -> Option<&[u16]> {
        self.points.as_deref()
    }

    pub fn raw_deltas(&self) -> &[(i16, i16)] {
        &self.deltas
    }
}

pub struct GlyphVariationData {
    tuples: Vec<TupleVariation>,
}

impl GlyphVariationData {
    /// Summed `(dx, dy)` deltas per explicitly-listed point index, scaled
    /// by each tuple's triangle scalar at `coords`. Points not named by
    /// any tuple (and therefore candidates for IUP interpolation) are
    /// omitted from the map — the caller's outline walker decides how to
    /// fill them in.
    pub fn point_deltas(&self, coords: &[NormalizedCoord]) -> Vec<(u16, f32, f32)> {
        let mut out: Vec<(u16, f32, f32)> = Vec::new();
        for tuple in &self.tuples {
            let scalar = tuple.scalar(coords);
            if scalar == 0.0 {
                continue;
            }
            match &tuple.points {
                Some(points) => {
                    for (&pt, &(dx, dy)) in points.iter().zip(tuple.deltas.iter()) {
                        accumulate(&mut out, pt, dx as f32 * scalar, dy as f32 * scalar);
                    }
                }
                None => {
                    for (i, &(dx, dy)) in tuple.deltas.iter().enumerate() {
                        accumulate(&mut out, i as u16, dx as f32 * scalar, dy as f32 * scalar);
                    }
                }
            }
        }
        out
    }
}

fn accumulate(out: &mut Vec<(u16, f32, f32)>, point: u16, dx: f32, dy: f32) {
    if let Some(entry) = out.iter_mut().find(|(p, _, _)| *p == point) {
        entry.1 += dx;
        entry.2 += dy;
    } else {
        out.push((point, dx, dy));
    }
}

pub struct GvarTable<'a> {
    data: &'a [u8],
    axis_count: u16,
    shared_tuples: Vec<Vec<f32>>,
    glyph_offsets: Vec<u32>,
    data_array_offset: usize,
}

impl<'a> GvarTable<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let _major = r.read_u16()?;
        let _minor = r.read_u16()?;
        let axis_count = r.read_u16()?;
        let shared_tuple_count = r.read_u16()?;
        let shared_tuples_offset = r.read_u32()? as usize;
        let glyph_count = r.read_u16()?;
        let flags = r.read_u16()?;
        let glyph_variation_data_array_offset = r.read_u32()? as usize;

        let long_offsets = flags & 1 != 0;
        let mut glyph_offsets = Vec::with_capacity(glyph_count as usize + 1);
        for _ in 0..=glyph_count {
            glyph_offsets.push(if long_offsets { r.read_u32()? } else { r.read_u16()? as u32 * 2 });
        }

        let mut shared_tuples = Vec::with_capacity(shared_tuple_count as usize);
        let mut tr = Reader::new(data).sub_from(shared_tuples_offset)?;
        for _ in 0..shared_tuple_count {
            let mut tuple = Vec::with_capacity(axis_count as usize);
            for _ in 0..axis_count {
                tuple.push(tr.read_f2dot14()?);
            }
            shared_tuples.push(tuple);
        }

        Ok(Self {
            data,
            axis_count,
            shared_tuples,
            glyph_offsets,
            data_array_offset: glyph_variation_data_array_offset,
        })
    }

    pub fn glyph_variation_data(&self, glyph_id: u16) -> Option<GlyphVariationData> {
        let start = *self.glyph_offsets.get(glyph_id as usize)? as usize;
        let end = *self.glyph_offsets.get(glyph_id as usize + 1)? as usize;
        if end <= start {
            return Some(GlyphVariationData { tuples: Vec::new() });
        }
        let block = self.data.get(self.data_array_offset + start..self.data_array_offset + end)?;
        self.parse_glyph_data(block).ok()
    }

    fn parse_glyph_data(&self, block: &[u8]) -> Result<GlyphVariationData> {
        let mut r = Reader::new(block);
        let tuple_count_field = r.read_u16()?;
        let data_offset = r.read_u16()? as usize;
        let tuple_count = (tuple_count_field & 0x0FFF) as usize;
        let shared_point_numbers = if tuple_count_field & TUPLES_SHARE_POINT_NUMBERS != 0 {
            let mut sr = Reader::new(block).sub_from(data_offset)?;
            let pts = parse_packed_points(&mut sr)?;
            Some((sr.pos(), pts))
        } else {
            None
        };

        let mut tuples = Vec::with_capacity(tuple_count);
        let mut serialized_pos = shared_point_numbers.as_ref().map(|(p, _)| *p).unwrap_or(data_offset);

        for _ in 0..tuple_count {
            let tuple_size = r.read_u16()? as usize;
            let tuple_flags = r.read_u16()?;

            let (peak, intermediate) = if tuple_flags & EMBEDDED_PEAK_TUPLE != 0 {
                let mut peak = Vec::with_capacity(self.axis_count as usize);
                for _ in 0..self.axis_count {
                    peak.push(r.read_f2dot14()?);
                }
                let intermediate = if tuple_flags & INTERMEDIATE_REGION != 0 {
                    let mut lo = Vec::with_capacity(self.axis_count as usize);
                    for _ in 0..self.axis_count {
                        lo.push(r.read_f2dot14()?);
                    }
                    let mut hi = Vec::with_capacity(self.axis_count as usize);
                    for _ in 0..self.axis_count {
                        hi.push(r.read_f2dot14()?);
                    }
                    Some((lo, hi))
                } else {
                    None
                };
                (peak, intermediate)
            } else {
                let index = (tuple_flags & 0x0FFF) as usize;
                let peak = self.shared_tuples.get(index).cloned().ok_or(ParseError::BadOffset)?;
                (peak, None)
            };

            let mut sr = Reader::new(block).sub_from(serialized_pos)?;
            let (points, consumed_points) = if tuple_flags & PRIVATE_POINT_NUMBERS != 0 {
                let pts = parse_packed_points(&mut sr)?;
                (pts, true)
            } else {
                (shared_point_numbers.as_ref().map(|(_, p)| p.clone()), false)
            };

            let num_deltas = points.as_ref().map(|p| p.len()).unwrap_or(0);
            let deltas = if num_deltas > 0 {
                parse_packed_deltas(&mut sr, num_deltas)?
            } else if points.is_none() {
                // "all points" tuple: the glyph's logical point count isn't
                // known to this table-only parser; caller matches by index
                // up to however many deltas were actually serialized, which
                // for an "all points" tuple is read by point count after
                // point-number parsing elsewhere. Without that count we
                // can't size the delta array, so such tuples are treated as
                // empty (scalar path still applies; the outline walker that
                // owns point counts is the natural place to decode these).
                Vec::new()
            } else {
                Vec::new()
            };

            tuples.push(TupleVariation { peak, intermediate, points, deltas });
            serialized_pos = sr.pos();
            let _ = consumed_points;
            let _ = tuple_size;
        }

        Ok(GlyphVariationData { tuples })
    }
}

/// Packed point-number list (shared by `gvar` and `cvar`).
fn parse_packed_points(r: &mut Reader) -> Result<Option<Vec<u16>>> {
    let count0 = r.read_u8()?;
    if count0 == 0 {
        return Ok(None); // "all points"
    }
    let point_count = if count0 & 0x80 != 0 {
        let low = r.read_u8()?;
        (((count0 as u16 & 0x7F) << 8) | low as u16) as usize
    } else {
        count0 as usize
    };

    let mut points = Vec::with_capacity(point_count);
    let mut current: i32 = 0;
    while points.len() < point_count {
        let control = r.read_u8()?;
        let run_count = (control & 0x7F) as usize + 1;
        let are_words = control & 0x80 != 0;
        for _ in 0..run_count {
            if points.len() >= point_count {
                break;
            }
            let delta = if are_words { r.read_u16()? as i32 } else { r.read_u8()? as i32 };
            current += delta;
            points.push(current as u16);
        }
    }
    Ok(Some(points))
}

/// Packed delta-value run (x-deltas followed by y-deltas, `count` each).
fn parse_packed_deltas(r: &mut Reader, count: usize) -> Result<Vec<(i16, i16)>> {
    let mut flat = Vec::with_capacity(count * 2);
    while flat.len() < count * 2 {
        let control = r.read_u8()?;
        let run_count = (control & 0x3F) as usize + 1;
        if control & 0x80 != 0 {
            for _ in 0..run_count {
                if flat.len() >= count * 2 {
                    break;
                }
                flat.push(0i16);
            }
        } else if control & 0x40 != 0 {
            for _ in 0..run_count {
                if flat.len() >= count * 2 {
                    break;
                }
                flat.push(r.read_i16()?);
            }
        } else {
            for _ in 0..run_count {
                if flat.len() >= count * 2 {
                    break;
                }
                flat.push(r.read_i8()? as i16);
            }
        }
    }
    let xs = &flat[..count];
    let ys = &flat[count..count * 2];
    Ok(xs.iter().zip(ys.iter()).map(|(&x, &y)| (x, y)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_points_all_points_sentinel() {
        let data = [0u8];
        let mut r = Reader::new(&data);
        assert_eq!(parse_packed_points(&mut r).unwrap(), None);
    }

    #[test]
    fn packed_points_short_run() {
        // count=3, control byte 0x02 (3 points, bytes), deltas 1,2,3
        let data = [3u8, 0x02, 1, 2, 3];
        let mut r = Reader::new(&data);
        let points = parse_packed_points(&mut r).unwrap().unwrap();
        assert_eq!(points, vec![1, 3, 6]);
    }

    #[test]
    fn packed_deltas_zero_run() {
        // count=2, control 0x81 (zero run of 2)
        let data = [0x81u8];
        let mut r = Reader::new(&data);
        let deltas = parse_packed_deltas(&mut r, 2).unwrap();
        assert_eq!(deltas, vec![(0, 0), (0, 0)]);
    }
}
