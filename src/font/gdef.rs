//! `GDEF`: glyph class definitions, mark attachment classes, mark glyph
//! sets, and an optional `ItemVariationStore` shared with GSUB/GPOS Device
//! entries.

use crate::buffer::GlyphId;
use crate::reader::Reader;
use crate::tables::classdef::ClassDef;
use crate::tables::coverage::Coverage;

use super::variation::ivs::ItemVariationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlyphClass {
    #[default]
    Unknown,
    Base,
    Ligature,
    Mark,
    Component,
}

impl From<u16> for GlyphClass {
    fn from(value: u16) -> Self {
        match value {
            1 => GlyphClass::Base,
            2 => GlyphClass::Ligature,
            3 => GlyphClass::Mark,
            4 => GlyphClass::Component,
            _ => GlyphClass::Unknown,
        }
    }
}

pub struct GdefTable<'a> {
    glyph_class_def: Option<ClassDef>,
    mark_attach_class_def: Option<ClassDef>,
    mark_glyph_sets: Vec<Coverage<'a>>,
    variation_store: Option<ItemVariationStore>,
}

impl<'a> GdefTable<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let major = r.read_u16().ok()?;
        let _minor = r.read_u16().ok()?;
        if major != 1 {
            return None;
        }
        let glyph_class_def_offset = r.read_u16().ok()?;
        let _attach_list_offset = r.read_u16().ok()?;
        let _lig_caret_list_offset = r.read_u16().ok()?;
        let mark_attach_class_def_offset = r.read_u16().ok()?;

        // minor version 2 adds MarkGlyphSetsDef; minor 3 adds ItemVarStore.
        // Re-read minor separately since we need its value, not just major.
        let minor = {
            let mut mr = Reader::new(data);
            mr.skip(2).ok()?;
            mr.read_u16().ok()?
        };

        let mark_glyph_sets_def_offset = if minor >= 2 { r.read_u16().ok()? } else { 0 };
        let item_var_store_offset = if minor >= 3 { r.read_u32().ok()? } else { 0 };

        let glyph_class_def = non_zero(glyph_class_def_offset)
            .and_then(|off| data.get(off as usize..))
            .and_then(ClassDef::parse);
        let mark_attach_class_def = non_zero(mark_attach_class_def_offset)
            .and_then(|off| data.get(off as usize..))
            .and_then(ClassDef::parse);

        let mark_glyph_sets = non_zero(mark_glyph_sets_def_offset)
            .and_then(|off| parse_mark_glyph_sets(data, off as usize))
            .unwrap_or_default();

        let variation_store = if item_var_store_offset != 0 {
            data.get(item_var_store_offset as usize..)
                .and_then(|d| ItemVariationStore::parse(d).ok())
        } else {
            None
        };

        Some(Self {
            glyph_class_def,
            mark_attach_class_def,
            mark_glyph_sets,
            variation_store,
        })
    }

    pub fn glyph_class(&self, gid: GlyphId) -> GlyphClass {
        self.glyph_class_def
            .as_ref()
            .map(|cd| GlyphClass::from(cd.class(gid)))
            .unwrap_or_default()
    }

    pub fn mark_attachment_class(&self, gid: GlyphId) -> u8 {
        self.mark_attach_class_def.as_ref().map(|cd| cd.class(gid) as u8).unwrap_or(0)
    }

    pub fn mark_glyph_set(&self, index: u16) -> Option<&Coverage<'a>> {
        self.mark_glyph_sets.get(index as usize)
    }

    pub fn variation_store(&self) -> Option<&ItemVariationStore> {
        self.variation_store.as_ref()
    }
}

fn non_zero(v: u16) -> Option<u16> {
    (v != 0).then_some(v)
}

fn parse_mark_glyph_sets(data: &[u8], offset: usize) -> Option<Vec<Coverage<'_>>> {
    let mut r = Reader::new(data).sub_from(offset).ok()?;
    let _format = r.read_u16().ok()?;
    let count = r.read_u16().ok()?;
    let mut sets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let set_offset = r.read_u32().ok()? as usize;
        let cov = Coverage::parse(data.get(offset + set_offset..)?)?;
        sets.push(cov);
    }
    Some(sets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_unknown_without_class_def() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes()); // glyphClassDef
        data.extend_from_slice(&0u16.to_be_bytes()); // attachList
        data.extend_from_slice(&0u16.to_be_bytes()); // ligCaretList
        data.extend_from_slice(&0u16.to_be_bytes()); // markAttachClassDef
        let gdef = GdefTable::parse(&data).unwrap();
        assert_eq!(gdef.glyph_class(GlyphId(5)), GlyphClass::Unknown);
    }
}
