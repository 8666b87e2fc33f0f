//! sfnt/TrueType-Collection container and table directory (§4.B in spirit —
//! see the module's own doc comments for the concrete table set).
//!
//! [`Font`] owns the raw byte buffer and the parsed table directory; every
//! other table view borrows from it. [`Face`] pairs a `Font` with a resolved
//! variation-coordinate vector — two faces may share the same underlying
//! `Font`, and constructing one is cheap (no table re-parse beyond the
//! handful of eagerly-read required tables).

pub mod cff;
pub mod cmap;
pub mod fixed_point;
pub mod gdef;
pub mod glyf;
pub mod name;
pub mod os2;
pub mod variation;

use crate::buffer::GlyphId;
use crate::error::{ParseError, Result};
use crate::reader::Reader;
use crate::tag::Tag;
use fixed_point::NormalizedCoord;
use variation::AxisValue;

const SFNT_TRUETYPE: u32 = 0x0001_0000;
const SFNT_OPENTYPE_CFF: u32 = 0x4F54_544F; // 'OTTO'
const SFNT_APPLE_TRUE: u32 = 0x7472_7565; // 'true'
const SFNT_TTC: u32 = 0x7474_6366; // 'ttcf'

#[derive(Debug, Clone, Copy)]
struct TableRecord {
    tag: Tag,
    offset: u32,
    length: u32,
}

/// An owned sfnt byte buffer plus its parsed table directory.
///
/// Once constructed the byte buffer is immutable; every table view (cmap,
/// GSUB, GDEF, ...) is a borrow into it, never a copy.
pub struct Font {
    data: Box<[u8]>,
    tables: Vec<TableRecord>,
}

impl Font {
    /// Parses the sfnt/ttc directory for the given face index. `0` is the
    /// only valid index for a bare sfnt (non-collection) file.
    pub fn from_data(data: impl Into<Box<[u8]>>, face_index: u32) -> Result<Self> {
        let data = data.into();
        let tables = Self::parse_directory(&data, face_index)?;
        Ok(Self { data, tables })
    }

    fn parse_directory(data: &[u8], face_index: u32) -> Result<Vec<TableRecord>> {
        let mut r = Reader::new(data);
        let magic = r.read_u32()?;

        let offset_table_start = if magic == SFNT_TTC {
            let _version = r.read_u32()?;
            let num_fonts = r.read_u32()?;
            if face_index >= num_fonts {
                return Err(ParseError::BadOffset);
            }
            r.skip((face_index as usize) * 4)?;
            r.read_u32()? as usize
        } else {
            0
        };

        let mut r = r.sub_from(offset_table_start)?;
        let sfnt_version = r.read_u32()?;
        match sfnt_version {
            SFNT_TRUETYPE | SFNT_OPENTYPE_CFF | SFNT_APPLE_TRUE => {}
            _ => return Err(ParseError::BadFont),
        }

        let num_tables = r.read_u16()?;
        r.skip(6)?; // searchRange, entrySelector, rangeShift

        let mut tables = Vec::with_capacity(num_tables as usize);
        for _ in 0..num_tables {
            let tag = r.read_tag()?;
            let _checksum = r.read_u32()?;
            let offset = r.read_u32()?;
            let length = r.read_u32()?;
            tables.push(TableRecord { tag, offset, length });
        }
        tracing::trace!(num_tables, bytes = data.len(), "parsed sfnt table directory");
        Ok(tables)
    }

    fn find(&self, tag: Tag) -> Option<TableRecord> {
        self.tables.iter().find(|t| t.tag == tag).copied()
    }

    /// Raw bytes of a table, or `None` if the font doesn't carry it.
    pub fn table_data(&self, tag: Tag) -> Option<&[u8]> {
        let rec = self.find(tag)?;
        let start = rec.offset as usize;
        let end = start.checked_add(rec.length as usize)?;
        self.data.get(start..end)
    }

    pub fn has_table(&self, tag: Tag) -> bool {
        self.find(tag).is_some()
    }
}

/// Parsed `head` fields needed by the shaping pipeline.
#[derive(Debug, Clone, Copy)]
struct HeadTable {
    units_per_em: u16,
    index_to_loc_format: i16,
}

impl HeadTable {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        r.skip(18)?;
        let units_per_em = r.read_u16()?;
        r.skip(16)?;
        r.skip(8)?; // x/y min/max
        r.skip(6)?; // macStyle, lowestRecPPEM, fontDirectionHint
        let index_to_loc_format = r.read_i16()?;
        Ok(Self { units_per_em, index_to_loc_format })
    }
}

#[derive(Debug, Clone, Copy)]
struct HheaTable {
    ascender: i16,
    descender: i16,
    line_gap: i16,
    number_of_h_metrics: u16,
}

impl HheaTable {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        r.skip(4)?;
        let ascender = r.read_i16()?;
        let descender = r.read_i16()?;
        let line_gap = r.read_i16()?;
        r.skip(22)?;
        let number_of_h_metrics = r.read_u16()?;
        Ok(Self { ascender, descender, line_gap, number_of_h_metrics })
    }
}

/// A font plus a resolved, normalized variation-coordinate vector.
///
/// Cheap to construct: the only eager parsing is `head`/`maxp`/`hhea`
/// (three small fixed-layout tables); everything else (cmap subtable
/// selection, GSUB/GPOS lookup lists, gvar tuples) is resolved lazily on
/// first query, re-derived from the borrowed `font` rather than cached as
/// owned state.
pub struct Face<'a> {
    font: &'a Font,
    head: HeadTable,
    hhea: HheaTable,
    num_glyphs: u16,
    coords: Vec<NormalizedCoord>,
    variation_warnings: Vec<variation::VariationWarning>,
    unsupported_subtables: std::sync::atomic::AtomicU64,
}

impl<'a> Face<'a> {
    /// Builds a face at the font's default instance (all axes at default).
    pub fn new(font: &'a Font) -> Result<Self> {
        Self::with_coords(font, &[])
    }

    /// Builds a face with user axis values (e.g. `wght=700`), resolved
    /// through `fvar`/`avar` into normalized coordinates (§4.D). Axes the
    /// font doesn't carry (or that aren't in `fvar`, e.g. a static font)
    /// are silently ignored rather than erroring, matching HarfBuzz.
    pub fn with_variations(font: &'a Font, user_values: &[AxisValue]) -> Result<Self> {
        let mut face = Self::with_coords(font, &[])?;
        if let Some(fvar) = font.fvar() {
            let avar = font
                .table_data(Tag::new(b"avar"))
                .and_then(|d| variation::avar::AvarTable::parse(d).ok());
            let (coords, warnings) = variation::resolve_coords(&fvar, avar.as_ref(), user_values);
            face.coords = coords;
            face.variation_warnings = warnings;
        }
        Ok(face)
    }

    /// Builds a face with explicit normalized axis coordinates, in `fvar`
    /// axis order. Missing trailing axes default to `0.0` (the default
    /// instance for that axis).
    pub fn with_coords(font: &'a Font, coords: &[NormalizedCoord]) -> Result<Self> {
        let head_data = font
            .table_data(Tag::new(b"head"))
            .ok_or(ParseError::MissingTable("head"))?;
        let head = HeadTable::parse(head_data)?;

        let maxp_data = font
            .table_data(Tag::new(b"maxp"))
            .ok_or(ParseError::MissingTable("maxp"))?;
        let mut maxp_reader = Reader::new(maxp_data);
        maxp_reader.skip(4)?;
        let num_glyphs = maxp_reader.read_u16()?;

        let hhea_data = font
            .table_data(Tag::new(b"hhea"))
            .ok_or(ParseError::MissingTable("hhea"))?;
        let hhea = HheaTable::parse(hhea_data)?;

        Ok(Self {
            font,
            head,
            hhea,
            num_glyphs,
            coords: coords.to_vec(),
            variation_warnings: Vec::new(),
            unsupported_subtables: std::sync::atomic::AtomicU64::new(0),
        })
    }

    /// Non-fatal clamp diagnostics recorded while resolving
    /// [`Face::with_variations`]'s axis values, per §7's `BadVariation`.
    pub fn variation_warnings(&self) -> &[variation::VariationWarning] {
        &self.variation_warnings
    }

    pub fn font(&self) -> &'a Font {
        self.font
    }

    pub fn units_per_em(&self) -> u16 {
        self.head.units_per_em
    }

    pub fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    pub fn ascender(&self) -> i16 {
        self.hhea.ascender
    }

    pub fn descender(&self) -> i16 {
        self.hhea.descender
    }

    pub fn line_gap(&self) -> i16 {
        self.hhea.line_gap
    }

    pub fn variation_coords(&self) -> &[NormalizedCoord] {
        &self.coords
    }

    fn index_to_loc_long(&self) -> bool {
        self.head.index_to_loc_format != 0
    }

    /// Horizontal advance width in font design units, per `hmtx`. Glyph
    /// indices beyond `numberOfHMetrics` repeat the last advance, per the
    /// `hmtx` long-tail encoding. At a non-default instance, the `HVAR`
    /// delta for `glyph_id` at this face's coordinates is added (§4.D).
    pub fn advance_width(&self, glyph_id: GlyphId) -> i32 {
        let base = self.base_advance_width(glyph_id) as i32;
        if self.coords.iter().all(|c| *c == NormalizedCoord::ZERO) {
            return base;
        }
        let delta = self.hvar().map(|h| h.advance_delta(glyph_id, &self.coords)).unwrap_or(0);
        base + delta
    }

    fn base_advance_width(&self, glyph_id: GlyphId) -> u16 {
        let Some(hmtx) = self.font.table_data(Tag::new(b"hmtx")) else { return 0 };
        let n = self.hhea.number_of_h_metrics.max(1);
        let mut r = Reader::new(hmtx);
        let idx = glyph_id.0.min(n - 1);
        if r.skip((idx as usize) * 4).is_err() {
            return 0;
        }
        r.read_u16().unwrap_or(0)
    }

    pub fn hvar(&self) -> Option<variation::hvar::HvarTable> {
        variation::hvar::HvarTable::parse(self.font.table_data(Tag::new(b"HVAR"))?).ok()
    }

    pub fn gvar(&self) -> Option<variation::gvar::GvarTable<'a>> {
        variation::gvar::GvarTable::parse(self.font.table_data(Tag::new(b"gvar"))?).ok()
    }

    pub fn avar(&self) -> Option<variation::avar::AvarTable> {
        variation::avar::AvarTable::parse(self.font.table_data(Tag::new(b"avar"))?).ok()
    }

    pub fn cff(&self) -> Option<cff::CffTable<'a>> {
        cff::CffTable::parse(self.font.table_data(Tag::new(b"CFF "))?).ok()
    }

    pub fn cff2(&self) -> Option<cff::Cff2Table> {
        cff::Cff2Table::parse(self.font.table_data(Tag::new(b"CFF2"))?).ok()
    }

    /// Left side bearing in font design units, per `hmtx`.
    pub fn lsb(&self, glyph_id: GlyphId) -> i16 {
        let Some(hmtx) = self.font.table_data(Tag::new(b"hmtx")) else { return 0 };
        let n = self.hhea.number_of_h_metrics;
        let mut r = Reader::new(hmtx);
        if glyph_id.0 < n {
            if r.skip((glyph_id.0 as usize) * 4 + 2).is_err() {
                return 0;
            }
            r.read_i16().unwrap_or(0)
        } else {
            let lsb_start = (n as usize) * 4 + ((glyph_id.0 - n) as usize) * 2;
            if r.skip(lsb_start).is_err() {
                return 0;
            }
            r.read_i16().unwrap_or(0)
        }
    }

    pub fn glyf_loca(&self) -> Option<(&'a [u8], &'a [u8])> {
        let glyf = self.font.table_data(Tag::new(b"glyf"))?;
        let loca = self.font.table_data(Tag::new(b"loca"))?;
        Some((glyf, loca))
    }

    pub fn outline_bytes(&self, glyph_id: GlyphId) -> &'a [u8] {
        let Some((glyf, loca)) = self.glyf_loca() else { return &[] };
        glyf::glyph_range(glyf, loca, glyph_id.0, self.index_to_loc_long()).unwrap_or(&[])
    }

    /// Looks up the glyph for a Unicode codepoint via the best available
    /// `cmap` subtable (preferring (3,10)/(0,6)/(0,4) full-repertoire
    /// subtables, then (3,1)/(0,3) BMP subtables).
    pub fn glyph_for_codepoint(&self, codepoint: u32) -> GlyphId {
        let Some(data) = self.font.table_data(Tag::new(b"cmap")) else {
            return GlyphId(0);
        };
        GlyphId(cmap::lookup(data, codepoint).unwrap_or(0))
    }

    /// Looks up the glyph for a base codepoint plus a variation selector
    /// via `cmap` format 14, falling back to the base lookup if the pair
    /// is not registered.
    pub fn glyph_for_variation(&self, codepoint: u32, selector: u32) -> GlyphId {
        if let Some(data) = self.font.table_data(Tag::new(b"cmap")) {
            if let Some(gid) = cmap::lookup_variation(data, codepoint, selector) {
                return GlyphId(gid);
            }
        }
        self.glyph_for_codepoint(codepoint)
    }

    pub fn gdef(&self) -> Option<gdef::GdefTable<'a>> {
        gdef::GdefTable::parse(self.font.table_data(Tag::new(b"GDEF"))?)
    }

    pub fn gsub_data(&self) -> Option<&'a [u8]> {
        self.font.table_data(Tag::new(b"GSUB"))
    }

    pub fn gpos_data(&self) -> Option<&'a [u8]> {
        self.font.table_data(Tag::new(b"GPOS"))
    }

    pub fn kern_data(&self) -> Option<&'a [u8]> {
        self.font.table_data(Tag::new(b"kern"))
    }

    pub fn morx_data(&self) -> Option<&'a [u8]> {
        self.font.table_data(Tag::new(b"morx"))
    }

    pub fn kerx_data(&self) -> Option<&'a [u8]> {
        self.font.table_data(Tag::new(b"kerx"))
    }

    pub fn trak_data(&self) -> Option<&'a [u8]> {
        self.font.table_data(Tag::new(b"trak"))
    }

    pub fn os2(&self) -> Option<os2::Os2Table> {
        os2::Os2Table::parse(self.font.table_data(Tag::new(b"OS/2"))?).ok()
    }

    pub fn name_table(&self) -> Option<name::NameTable<'a>> {
        name::NameTable::parse(self.font.table_data(Tag::new(b"name"))?)
    }

    pub fn fvar(&self) -> Option<variation::fvar::FvarTable<'a>> {
        variation::fvar::FvarTable::parse(self.font.table_data(Tag::new(b"fvar"))?).ok()
    }

    /// Increments the "unrecognized subtable, treated as no-op" counter and
    /// emits a debug trace. Called by the GSUB/GPOS engines whenever a
    /// subtable format they don't decode is skipped.
    pub(crate) fn note_unsupported_subtable(&self, table: &'static str, format: u16) {
        self.unsupported_subtables
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        tracing::debug!(table, format, "skipped unsupported subtable format");
    }

    pub fn unsupported_subtable_count(&self) -> u64 {
        self.unsupported_subtables.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
pub(crate) mod test_font {
    //! Hand-assembled minimal sfnt buffers so tests don't depend on a real
    //! font file being present on disk.
    use super::*;

    pub fn build_minimal(upem: u16, num_glyphs: u16, advances: &[u16]) -> Vec<u8> {
        let mut head = vec![0u8; 54];
        head[18..20].copy_from_slice(&upem.to_be_bytes());
        head[50..52].copy_from_slice(&0i16.to_be_bytes()); // index_to_loc_format = short

        let mut maxp = vec![0u8; 6];
        maxp[4..6].copy_from_slice(&num_glyphs.to_be_bytes());

        let mut hhea = vec![0u8; 36];
        hhea[4..6].copy_from_slice(&(upem as i16).to_be_bytes()); // ascender
        hhea[34..36].copy_from_slice(&(advances.len() as u16).to_be_bytes());

        let mut hmtx = Vec::new();
        for &adv in advances {
            hmtx.extend_from_slice(&adv.to_be_bytes());
            hmtx.extend_from_slice(&0i16.to_be_bytes());
        }

        let cmap = build_format4_cmap(&[(0x41, 1)]);

        let mut loca = Vec::new();
        for _ in 0..=num_glyphs {
            loca.extend_from_slice(&0u16.to_be_bytes());
        }
        let glyf: Vec<u8> = Vec::new();

        let tables: Vec<(&[u8; 4], Vec<u8>)> = vec![
            (b"head", head),
            (b"maxp", maxp),
            (b"hhea", hhea),
            (b"hmtx", hmtx),
            (b"cmap", cmap),
            (b"loca", loca),
            (b"glyf", glyf),
        ];

        assemble_sfnt(&tables)
    }

    fn build_format4_cmap(pairs: &[(u16, u16)]) -> Vec<u8> {
        let seg_count = pairs.len() as u16 + 1; // +1 terminator segment
        let mut body = Vec::new();
        body.extend_from_slice(&4u16.to_be_bytes()); // format
        body.extend_from_slice(&0u16.to_be_bytes()); // length (unused by our parser)
        body.extend_from_slice(&0u16.to_be_bytes()); // language
        body.extend_from_slice(&(seg_count * 2).to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());

        for &(code, _) in pairs {
            body.extend_from_slice(&code.to_be_bytes());
        }
        body.extend_from_slice(&0xFFFFu16.to_be_bytes());

        body.extend_from_slice(&0u16.to_be_bytes()); // reservedPad
        for &(code, _) in pairs {
            body.extend_from_slice(&code.to_be_bytes());
        }
        body.extend_from_slice(&0xFFFFu16.to_be_bytes());

        for &(code, gid) in pairs {
            let delta = gid.wrapping_sub(code);
            body.extend_from_slice(&(delta as i16).to_be_bytes());
        }
        body.extend_from_slice(&1i16.to_be_bytes());

        for _ in 0..seg_count {
            body.extend_from_slice(&0u16.to_be_bytes());
        }

        let mut table = Vec::new();
        table.extend_from_slice(&0u16.to_be_bytes());
        table.extend_from_slice(&1u16.to_be_bytes());
        table.extend_from_slice(&3u16.to_be_bytes());
        table.extend_from_slice(&1u16.to_be_bytes());
        table.extend_from_slice(&12u32.to_be_bytes());
        table.extend_from_slice(&body);
        table
    }

    fn assemble_sfnt(tables: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let num_tables = tables.len() as u16;
        let header_len = 12 + 16 * tables.len();
        let mut offsets = Vec::with_capacity(tables.len());
        let mut cursor = header_len;
        for (_, data) in tables {
            offsets.push(cursor);
            cursor += data.len();
            while cursor % 4 != 0 {
                cursor += 1;
            }
        }

        let mut out = Vec::with_capacity(cursor);
        out.extend_from_slice(&SFNT_TRUETYPE.to_be_bytes());
        out.extend_from_slice(&num_tables.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        for ((tag, data), &offset) in tables.iter().zip(&offsets) {
            out.extend_from_slice(*tag);
            out.extend_from_slice(&0u32.to_be_bytes());
            out.extend_from_slice(&(offset as u32).to_be_bytes());
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        }

        for (_, data) in tables {
            out.extend_from_slice(data);
            while out.len() % 4 != 0 {
                out.push(0);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_sfnt() {
        let data = test_font::build_minimal(1000, 3, &[500, 600, 0]);
        let font = Font::from_data(data, 0).unwrap();
        let face = Face::new(&font).unwrap();
        assert_eq!(face.units_per_em(), 1000);
        assert_eq!(face.num_glyphs(), 3);
    }

    #[test]
    fn rejects_bad_magic() {
        let data = vec![0u8; 16];
        assert_eq!(Font::from_data(data, 0).unwrap_err(), ParseError::BadFont);
    }

    #[test]
    fn cmap_resolves_mapped_codepoint() {
        let data = test_font::build_minimal(1000, 3, &[500, 600, 0]);
        let font = Font::from_data(data, 0).unwrap();
        let face = Face::new(&font).unwrap();
        assert_eq!(face.glyph_for_codepoint(0x41).0, 1);
        assert_eq!(face.glyph_for_codepoint(0x42).0, 0);
    }
}
