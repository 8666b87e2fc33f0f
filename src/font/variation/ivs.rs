//! `ItemVariationStore`: the shared delta-set machinery behind `HVAR`,
//! `MVAR`, and `VariationIndex` device-table entries.

use crate::error::Result;
use crate::reader::Reader;

use crate::font::fixed_point::NormalizedCoord;

#[derive(Debug, Clone)]
struct VariationRegion {
    /// `(start, peak, end)` per axis, each already normalized to `[-1, 1]`.
    axes: Vec<(f32, f32, f32)>,
}

impl VariationRegion {
    fn scalar(&self, coords: &[NormalizedCoord]) -> f32 {
        let mut scalar = 1.0f32;
        for (i, &(start, peak, end)) in self.axes.iter().enumerate() {
            let coord = coords.get(i).map(|c| c.to_f32()).unwrap_or(0.0);
            let axis_scalar = if peak == 0.0 {
                1.0
            } else if coord < start || coord > end {
                0.0
            } else if coord < peak {
                if peak == start { 1.0 } else { (coord - start) / (peak - start) }
            } else if coord > peak {
                if peak == end { 1.0 } else { (end - coord) / (end - peak) }
            } else {
                1.0
            };
            scalar *= axis_scalar;
            if scalar == 0.0 {
                return 0.0;
            }
        }
        scalar
    }
}

struct VariationData {
    item_deltas: Vec<Vec<i32>>, // [item][region] long-form deltas
    region_indexes: Vec<u16>,
}

pub struct ItemVariationStore {
    regions: Vec<VariationRegion>,
    datas: Vec<VariationData>,
}

impl ItemVariationStore {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let _format = r.read_u16()?;
        let region_list_offset = r.read_u32()? as usize;
        let data_count = r.read_u16()?;
        let mut data_offsets = Vec::with_capacity(data_count as usize);
        for _ in 0..data_count {
            data_offsets.push(r.read_u32()? as usize);
        }

        let mut region_reader = Reader::new(data).sub_from(region_list_offset)?;
        let axis_count = region_reader.read_u16()? as usize;
        let region_count = region_reader.read_u16()? as usize;
        let mut regions = Vec::with_capacity(region_count);
        for _ in 0..region_count {
            let mut axes = Vec::with_capacity(axis_count);
            for _ in 0..axis_count {
                let start = region_reader.read_f2dot14()?;
                let peak = region_reader.read_f2dot14()?;
                let end = region_reader.read_f2dot14()?;
                axes.push((start, peak, end));
            }
            regions.push(VariationRegion { axes });
        }

        let mut datas = Vec::with_capacity(data_offsets.len());
        for offset in data_offsets {
            let mut dr = Reader::new(data).sub_from(offset)?;
            let item_count = dr.read_u16()? as usize;
            let short_delta_count = dr.read_u16()? as usize;
            let region_index_count = dr.read_u16()? as usize;
            let mut region_indexes = Vec::with_capacity(region_index_count);
            for _ in 0..region_index_count {
                region_indexes.push(dr.read_u16()?);
            }

            let mut item_deltas = Vec::with_capacity(item_count);
            for _ in 0..item_count {
                let mut row = Vec::with_capacity(region_index_count);
                for j in 0..region_index_count {
                    let delta = if j < short_delta_count {
                        dr.read_i16()? as i32
                    } else {
                        dr.read_i8()? as i32
                    };
                    row.push(delta);
                }
                item_deltas.push(row);
            }
            datas.push(VariationData { item_deltas, region_indexes });
        }

        Ok(Self { regions, datas })
    }

    /// Sum of region-weighted deltas for `(outer_index, inner_index)` at
    /// `coords`, rounded to the nearest design unit.
    pub fn delta(&self, outer_index: u16, inner_index: u16, coords: &[NormalizedCoord]) -> i32 {
        let Some(vdata) = self.datas.get(outer_index as usize) else { return 0 };
        let Some(row) = vdata.item_deltas.get(inner_index as usize) else { return 0 };

        let mut total = 0.0f32;
        for (&region_idx, &delta) in vdata.region_indexes.iter().zip(row.iter()) {
            if let Some(region) = self.regions.get(region_idx as usize) {
                total += region.scalar(coords) * delta as f32;
            }
        }
        total.round() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_axis_triangle_scalar() {
        let region = VariationRegion { axes: vec![(0.0, 1.0, 1.0)] };
        let wght_700 = NormalizedCoord::from_f32(0.5);
        let wght_1000 = NormalizedCoord::from_f32(1.0);
        let wght_0 = NormalizedCoord::from_f32(0.0);
        assert!((region.scalar(&[wght_700]) - 0.5).abs() < 0.01);
        assert!((region.scalar(&[wght_1000]) - 1.0).abs() < 0.01);
        assert_eq!(region.scalar(&[wght_0]), 0.0);
    }
}
