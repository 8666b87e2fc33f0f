//! `HVAR`: per-glyph advance-width deltas (§4.B, §4.D).
//!
//! Deltas are stored in an `ItemVariationStore`; glyphs map to
//! `(outer, inner)` indices either directly (glyph ID == inner index,
//! outer index 0) or through an optional `DeltaSetIndexMap`.

use crate::buffer::GlyphId;
use crate::error::Result;
use crate::font::fixed_point::NormalizedCoord;
use crate::font::variation::ivs::ItemVariationStore;
use crate::reader::Reader;

struct DeltaSetIndexMap {
    entries: Vec<(u16, u16)>, // (outer, inner)
}

impl DeltaSetIndexMap {
    fn parse(data: &[u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let format = r.read_u8().ok()?;
        let entry_format = r.read_u8().ok()?;
        let map_count = if format == 0 { r.read_u16().ok()? as u32 } else { r.read_u32().ok()? };

        let entry_size = ((entry_format >> 4) & 0x3) + 1;
        let inner_bits = (entry_format & 0xF) + 1;

        let mut entries = Vec::with_capacity(map_count as usize);
        for _ in 0..map_count {
            let raw = match entry_size {
                1 => r.read_u8().ok()? as u32,
                2 => r.read_u16().ok()? as u32,
                3 => r.read_u24().ok()?,
                4 => r.read_u32().ok()?,
                _ => return None,
            };
            let inner = (raw & ((1u32 << inner_bits) - 1)) as u16;
            let outer = (raw >> inner_bits) as u16;
            entries.push((outer, inner));
        }
        Some(Self { entries })
    }

    fn resolve(&self, gid: GlyphId) -> Option<(u16, u16)> {
        self.entries.get(gid.0 as usize).copied().or_else(|| self.entries.last().copied())
    }
}

pub struct HvarTable {
    store: ItemVariationStore,
    advance_map: Option<DeltaSetIndexMap>,
}

impl HvarTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let _major = r.read_u16()?;
        let _minor = r.read_u16()?;
        let item_var_store_offset = r.read_u32()? as usize;
        let advance_width_map_offset = r.read_u32()?;
        let _lsb_map_offset = r.read_u32()?;
        let _rsb_map_offset = r.read_u32()?;

        let store = ItemVariationStore::parse(Reader::new(data).sub_from(item_var_store_offset)?.slice_from_here())?;
        let advance_map = if advance_width_map_offset != 0 {
            data.get(advance_width_map_offset as usize..).and_then(DeltaSetIndexMap::parse)
        } else {
            None
        };

        Ok(Self { store, advance_map })
    }

    /// Advance-width delta in design units for `gid` at `coords`.
    pub fn advance_delta(&self, gid: GlyphId, coords: &[NormalizedCoord]) -> i32 {
        let (outer, inner) = self
            .advance_map
            .as_ref()
            .and_then(|m| m.resolve(gid))
            .unwrap_or((0, gid.0));
        self.store.delta(outer, inner, coords)
    }
}
