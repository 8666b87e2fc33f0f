//! `avar`: piecewise-linear remapping of normalized axis coordinates (§4.D).

use crate::error::Result;
use crate::reader::Reader;

#[derive(Debug, Clone, Copy)]
struct AxisValueMap {
    from_coord: f32,
    to_coord: f32,
}

pub struct AvarTable {
    segment_maps: Vec<Vec<AxisValueMap>>,
}

impl AvarTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let _major = r.read_u16()?;
        let _minor = r.read_u16()?;
        let _reserved = r.read_u16()?;
        let axis_count = r.read_u16()? as usize;

        let mut segment_maps = Vec::with_capacity(axis_count);
        for _ in 0..axis_count {
            let count = r.read_u16()? as usize;
            let mut maps = Vec::with_capacity(count);
            for _ in 0..count {
                let from_coord = r.read_f2dot14()?;
                let to_coord = r.read_f2dot14()?;
                maps.push(AxisValueMap { from_coord, to_coord });
            }
            segment_maps.push(maps);
        }
        Ok(Self { segment_maps })
    }

    /// Applies the axis-`index`th piecewise-linear map to a normalized
    /// coordinate already produced by `VariationAxis::normalize`.
    pub fn map(&self, axis_index: usize, value: f32) -> f32 {
        let Some(maps) = self.segment_maps.get(axis_index) else { return value };
        if maps.is_empty() {
            return value;
        }
        if value <= maps[0].from_coord {
            return maps[0].to_coord;
        }
        if let Some(last) = maps.last() {
            if value >= last.from_coord {
                return last.to_coord;
            }
        }
        for pair in maps.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if value >= a.from_coord && value <= b.from_coord {
                if (b.from_coord - a.from_coord).abs() < f32::EPSILON {
                    return a.to_coord;
                }
                let t = (value - a.from_coord) / (b.from_coord - a.from_coord);
                return a.to_coord + t * (b.to_coord - a.to_coord);
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_map_passes_through() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes()); // axisCount
        data.extend_from_slice(&3u16.to_be_bytes()); // positionMapCount
        for &(from, to) in &[(-1.0f32, -1.0f32), (0.0, 0.0), (1.0, 1.0)] {
            data.extend_from_slice(&((from * 16384.0) as i16).to_be_bytes());
            data.extend_from_slice(&((to * 16384.0) as i16).to_be_bytes());
        }
        let avar = AvarTable::parse(&data).unwrap();
        assert!((avar.map(0, 0.5) - 0.5).abs() < 0.01);
    }

    #[test]
    fn remaps_midpoint() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes());
        for &(from, to) in &[(-1.0f32, -1.0f32), (0.0, 0.3), (1.0, 1.0)] {
            data.extend_from_slice(&((from * 16384.0) as i16).to_be_bytes());
            data.extend_from_slice(&((to * 16384.0) as i16).to_be_bytes());
        }
        let avar = AvarTable::parse(&data).unwrap();
        assert!((avar.map(0, 0.0) - 0.3).abs() < 0.01);
    }
}
