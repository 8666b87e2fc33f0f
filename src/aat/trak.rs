//! `trak`: AAT tracking table. Adds a single interpolated tracking value
//! (in font design units) to every glyph's horizontal advance, found by
//! linearly interpolating the "regular" track's per-size entries at the
//! caller's requested point size (§4.K). Applied after GPOS/its
//! fallback per §9's resolved Open Question on ordering.

use crate::buffer::GlyphBuffer;
use crate::font::fixed_point::Fixed16;
use crate::reader::Reader;

struct TrackTableEntry {
    track: Fixed16,
    per_size_values_offset: usize,
}

struct TrackData {
    n_sizes: u16,
    size_table_offset: usize,
    entries: Vec<TrackTableEntry>,
}

impl TrackData {
    fn parse(data: &[u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let n_tracks = r.read_u16().ok()?;
        let n_sizes = r.read_u16().ok()?;
        let size_table_offset = r.read_u32().ok()? as usize;

        let mut entries = Vec::with_capacity(n_tracks as usize);
        for _ in 0..n_tracks {
            let track = Fixed16::from_i32(r.read_fixed().ok()?);
            let _name_index = r.read_u16().ok()?;
            let offset = r.read_u16().ok()? as usize;
            entries.push(TrackTableEntry { track, per_size_values_offset: offset });
        }
        Some(Self { n_sizes, size_table_offset, entries })
    }

    fn sizes(&self, table: &[u8]) -> Option<Vec<Fixed16>> {
        let mut r = Reader::new(table.get(self.size_table_offset..)?);
        let mut sizes = Vec::with_capacity(self.n_sizes as usize);
        for _ in 0..self.n_sizes {
            sizes.push(Fixed16::from_i32(r.read_fixed().ok()?));
        }
        Some(sizes)
    }

    /// Interpolated tracking value (font units) for the "regular" (track
    /// value closest to 0.0) track, at `point_size`.
    fn value_at(&self, table: &[u8], point_size: f32) -> Option<i32> {
        let sizes = self.sizes(table)?;
        let entry = self
            .entries
            .iter()
            .min_by(|a, b| a.track.to_f32().abs().total_cmp(&b.track.to_f32().abs()))?;
        let mut r = Reader::new(table.get(entry.per_size_values_offset..)?);
        let mut values = Vec::with_capacity(sizes.len());
        for _ in 0..sizes.len() {
            values.push(r.read_i16().ok()? as f32);
        }
        if sizes.is_empty() {
            return None;
        }

        let target = point_size;
        if target <= sizes[0].to_f32() {
            return Some(values[0] as i32);
        }
        if target >= sizes[sizes.len() - 1].to_f32() {
            return Some(values[values.len() - 1] as i32);
        }
        for w in sizes.windows(2).enumerate() {
            let (i, pair) = w;
            let (lo, hi) = (pair[0].to_f32(), pair[1].to_f32());
            if target >= lo && target <= hi {
                let t = if hi > lo { (target - lo) / (hi - lo) } else { 0.0 };
                let value = values[i] + t * (values[i + 1] - values[i]);
                return Some(value.round() as i32);
            }
        }
        None
    }
}

pub struct TrakTable<'a> {
    data: &'a [u8],
    horiz: Option<TrackData>,
}

impl<'a> TrakTable<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let _version = r.read_fixed().ok()?;
        let _format = r.read_u16().ok()?;
        let horiz_offset = r.read_u16().ok()? as usize;
        let _vert_offset = r.read_u16().ok()?;
        let _reserved = r.read_u16().ok()?;

        let horiz = if horiz_offset != 0 { TrackData::parse(data.get(horiz_offset..)?) } else { None };
        Some(Self { data, horiz })
    }

    pub fn apply(&self, buffer: &mut GlyphBuffer, point_size: f32) {
        let Some(horiz) = &self.horiz else { return };
        let Some(delta) = horiz.value_at(self.data, point_size) else { return };
        if delta == 0 {
            return;
        }
        for pos in buffer.pos_mut() {
            pos.x_advance += delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{GlyphId, UnicodeBuffer};

    fn build_trak(track_values: &[(i32, &[i16])]) -> Vec<u8> {
        let sizes: Vec<i32> = vec![8 << 16, 24 << 16];
        let n_sizes = sizes.len() as u16;
        let n_tracks = track_values.len() as u16;

        let header_len = 12;
        let horiz_header_len = 8 + n_tracks as usize * 8;
        let size_table_offset = horiz_header_len;
        let per_size_block_len = n_sizes as usize * 2;

        let mut horiz = Vec::new();
        horiz.extend_from_slice(&n_tracks.to_be_bytes());
        horiz.extend_from_slice(&n_sizes.to_be_bytes());
        horiz.extend_from_slice(&(size_table_offset as u32).to_be_bytes());
        for (i, &(track, _)) in track_values.iter().enumerate() {
            horiz.extend_from_slice(&track.to_be_bytes());
            horiz.extend_from_slice(&0u16.to_be_bytes()); // nameIndex
            let offset = size_table_offset + sizes.len() * 4 + i * per_size_block_len;
            horiz.extend_from_slice(&(offset as u16).to_be_bytes());
        }
        for &size in &sizes {
            horiz.extend_from_slice(&size.to_be_bytes());
        }
        for &(_, values) in track_values {
            for &v in values {
                horiz.extend_from_slice(&v.to_be_bytes());
            }
        }

        let mut data = Vec::new();
        data.extend_from_slice(&0x00010000u32.to_be_bytes()); // version
        data.extend_from_slice(&0u16.to_be_bytes()); // format
        data.extend_from_slice(&(header_len as u16).to_be_bytes()); // horizOffset
        data.extend_from_slice(&0u16.to_be_bytes()); // vertOffset
        data.extend_from_slice(&0u16.to_be_bytes()); // reserved
        data.extend_from_slice(&horiz);
        data
    }

    #[test]
    fn interpolates_between_two_sizes() {
        let data = build_trak(&[(0, &[0, 100])]); // 8pt -> 0, 24pt -> 100
        let table = TrakTable::parse(&data).unwrap();
        let mut ub = UnicodeBuffer::new();
        ub.add_codepoint('A' as u32, 0);
        let mut gb = GlyphBuffer::from_unicode(&ub, |cp| GlyphId(cp as u16));
        gb.pos_mut()[0].x_advance = 500;
        table.apply(&mut gb, 16.0); // halfway -> +50
        assert_eq!(gb.pos()[0].x_advance, 550);
    }
}
