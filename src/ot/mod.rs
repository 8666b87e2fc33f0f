//! Shared GSUB/GPOS structure: `ScriptList`, `FeatureList`, `LookupList`,
//! `FeatureVariations`, and the `ValueRecord`/context-matching helpers both
//! engines build on (§4.B, §4.G).

pub mod contextual;
pub mod gpos;
pub mod gsub;
pub mod value_record;

use crate::error::Result;
use crate::reader::Reader;
use crate::tables::{Device, LookupFlag, SetDigest};
use crate::tag::Tag;

#[derive(Debug, Clone, Copy)]
pub struct LangSysRecord {
    pub tag: Tag,
    pub required_feature_index: Option<u16>,
    pub feature_indices_offset: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ScriptRecord {
    pub tag: Tag,
    /// Offset (from the table's start) to the ScriptTable body.
    script_offset: usize,
}

/// `ScriptList`: resolves a script tag (with OpenType's dual-tag and
/// `DFLT` fallbacks, §4.G point 1) to its `LangSys` records.
pub struct ScriptList<'a> {
    data: &'a [u8],
    scripts: Vec<ScriptRecord>,
}

impl<'a> ScriptList<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let count = r.read_u16()?;
        let mut scripts = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = r.read_tag()?;
            let script_offset = r.read_u16()? as usize;
            scripts.push(ScriptRecord { tag, script_offset });
        }
        Ok(Self { data, scripts })
    }

    fn find_script(&self, tag: Tag) -> Option<&ScriptRecord> {
        self.scripts.iter().find(|s| s.tag == tag)
    }

    /// Resolves a script, trying OpenType's dual-tag convention (e.g.
    /// `dev2` before `deva`) and finally `DFLT`.
    pub fn resolve_script(&self, candidates: &[Tag]) -> Option<&ScriptRecord> {
        for &tag in candidates {
            if let Some(s) = self.find_script(tag) {
                return Some(s);
            }
        }
        self.find_script(Tag::DFLT)
    }

    /// Resolves a language within a script; falls back to the script's
    /// default `LangSys` when `language` is absent or unmatched.
    pub fn resolve_lang_sys(&self, script: &ScriptRecord, language: Option<Tag>) -> Option<LangSysRecord> {
        let mut r = Reader::new(self.data).sub_from(script.script_offset).ok()?;
        let default_lang_sys_offset = r.read_u16().ok()? as usize;
        let lang_sys_count = r.read_u16().ok()?;

        if let Some(lang) = language {
            for _ in 0..lang_sys_count {
                let tag = r.read_tag().ok()?;
                let offset = r.read_u16().ok()? as usize;
                if tag == lang {
                    return self.parse_lang_sys_at(script.script_offset + offset, tag);
                }
            }
        }
        if default_lang_sys_offset == 0 {
            return None;
        }
        self.parse_lang_sys_at(script.script_offset + default_lang_sys_offset, Tag::DFLT)
    }

    fn parse_lang_sys_at(&self, offset: usize, tag: Tag) -> Option<LangSysRecord> {
        let mut r = Reader::new(self.data).sub_from(offset).ok()?;
        let _lookup_order_offset = r.read_u16().ok()?;
        let required = r.read_u16().ok()?;
        let feature_index_count = r.read_u16().ok()?;
        let mut feature_indices = Vec::with_capacity(feature_index_count as usize);
        for _ in 0..feature_index_count {
            feature_indices.push(r.read_u16().ok()?);
        }
        Some(LangSysRecord {
            tag,
            required_feature_index: (required != 0xFFFF).then_some(required),
            feature_indices,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureRecord {
    pub tag: Tag,
    offset: usize,
}

pub struct FeatureList<'a> {
    data: &'a [u8],
    features: Vec<FeatureRecord>,
}

impl<'a> FeatureList<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let count = r.read_u16()?;
        let mut features = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = r.read_tag()?;
            let offset = r.read_u16()? as usize;
            features.push(FeatureRecord { tag, offset });
        }
        Ok(Self { data, features })
    }

    pub fn get(&self, index: u16) -> Option<FeatureRecord> {
        self.features.get(index as usize).copied()
    }

    pub fn tag(&self, index: u16) -> Option<Tag> {
        self.get(index).map(|f| f.tag)
    }

    /// Lookup indices this feature applies, in order.
    pub fn lookup_indices(&self, feature: FeatureRecord) -> Vec<u16> {
        let Ok(mut r) = Reader::new(self.data).sub_from(feature.offset) else { return Vec::new() };
        let Ok(_params_offset) = r.read_u16() else { return Vec::new() };
        let Ok(count) = r.read_u16() else { return Vec::new() };
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match r.read_u16() {
                Ok(v) => out.push(v),
                Err(_) => break,
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, Tag)> + '_ {
        self.features.iter().enumerate().map(|(i, f)| (i as u16, f.tag))
    }
}

/// A single GSUB/GPOS lookup: flags, subtables (opaque byte ranges
/// resolved per-engine), and a precomputed `SetDigest` for quick rejection.
pub struct LookupRecord<'a> {
    pub flag: LookupFlag,
    pub mark_filtering_set: Option<u16>,
    pub subtable_data: Vec<&'a [u8]>,
    pub lookup_type: u16,
    pub digest: SetDigest,
}

pub struct LookupList<'a> {
    data: &'a [u8],
    offsets: Vec<usize>,
}

impl<'a> LookupList<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let count = r.read_u16()?;
        let mut offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            offsets.push(r.read_u16()? as usize);
        }
        Ok(Self { data, offsets })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Parses lookup `index`'s header and subtable offsets; `type7_inner`
    /// resolves an Extension subtable (GSUB/GPOS type 7/9) to its real
    /// `(type, data)` pair, since extension flattening is type-specific.
    pub fn lookup(
        &self,
        index: u16,
        extension_type: u16,
        resolve_extension: impl Fn(&'a [u8]) -> Option<(u16, &'a [u8])>,
        digest_glyphs: impl Fn(u16, &'a [u8]) -> SetDigest,
    ) -> Option<LookupRecord<'a>> {
        let offset = *self.offsets.get(index as usize)?;
        let mut r = Reader::new(self.data).sub_from(offset).ok()?;
        let mut lookup_type = r.read_u16().ok()?;
        let flag = LookupFlag(r.read_u16().ok()?);
        let subtable_count = r.read_u16().ok()?;
        let mut subtable_offsets = Vec::with_capacity(subtable_count as usize);
        for _ in 0..subtable_count {
            subtable_offsets.push(r.read_u16().ok()? as usize);
        }
        let mark_filtering_set = if flag.uses_mark_filtering_set() { Some(r.read_u16().ok()?) } else { None };

        let lookup_base = self.data.get(offset..)?;
        let mut subtable_data = Vec::with_capacity(subtable_offsets.len());
        let mut digest = SetDigest::new();

        for sub_offset in subtable_offsets {
            let raw = lookup_base.get(sub_offset..)?;
            if lookup_type == extension_type {
                if let Some((real_type, real_data)) = resolve_extension(raw) {
                    lookup_type = real_type;
                    digest = SetDigest::new();
                    digest.extend_glyphs(digest_glyphs(real_type, real_data));
                    subtable_data.push(real_data);
                    continue;
                }
            }
            digest.extend_glyphs(digest_glyphs(lookup_type, raw));
            subtable_data.push(raw);
        }

        Some(LookupRecord { flag, mark_filtering_set, subtable_data, lookup_type, digest })
    }
}

impl SetDigest {
    /// Folds another digest's bits into this one (used when flattening
    /// Extension subtables into their resolved type).
    fn extend_glyphs(&mut self, other: SetDigest) {
        *self = other;
    }
}

/// `FeatureVariations`: substitutes a feature's lookup list when the
/// current normalized variation coordinates fall inside a condition set
/// (§4.G point 5).
pub struct FeatureVariations<'a> {
    data: &'a [u8],
    records: Vec<(usize, usize)>, // (condition_set_offset, feature_table_substitution_offset)
}

impl<'a> FeatureVariations<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let _major = r.read_u16()?;
        let _minor = r.read_u16()?;
        let count = r.read_u32()?;
        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let condition_set_offset = r.read_u32()? as usize;
            let feature_subst_offset = r.read_u32()? as usize;
            records.push((condition_set_offset, feature_subst_offset));
        }
        Ok(Self { data, records })
    }

    /// `true` if every condition in the condition set at `offset` is
    /// satisfied by `coords` (an empty set is vacuously true).
    fn condition_set_matches(&self, offset: usize, coords: &[crate::font::fixed_point::NormalizedCoord]) -> bool {
        let Ok(mut r) = Reader::new(self.data).sub_from(offset) else { return false };
        let Ok(count) = r.read_u16() else { return false };
        let mut condition_offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match r.read_u32() {
                Ok(v) => condition_offsets.push(offset + v as usize),
                Err(_) => return false,
            }
        }
        condition_offsets.into_iter().all(|cond_offset| self.condition_matches(cond_offset, coords))
    }

    fn condition_matches(&self, offset: usize, coords: &[crate::font::fixed_point::NormalizedCoord]) -> bool {
        let Ok(mut r) = Reader::new(self.data).sub_from(offset) else { return false };
        let Ok(format) = r.read_u16() else { return false };
        if format != 1 {
            return true; // unrecognized condition format: treat as always-true, skipped elsewhere
        }
        let Ok(axis_index) = r.read_u16() else { return false };
        let Ok(min) = r.read_f2dot14() else { return false };
        let Ok(max) = r.read_f2dot14() else { return false };
        let coord = coords.get(axis_index as usize).map(|c| c.to_f32()).unwrap_or(0.0);
        coord >= min && coord <= max
    }

    /// The first matching record's substituted feature-table offset (an
    /// offset from the start of the `FeatureVariations` table), if any.
    pub fn resolve(&self, coords: &[crate::font::fixed_point::NormalizedCoord]) -> Option<usize> {
        for &(cond_offset, subst_offset) in &self.records {
            if cond_offset != 0 && !self.condition_set_matches(cond_offset, coords) {
                continue;
            }
            if subst_offset != 0 {
                return Some(subst_offset);
            }
        }
        None
    }
}

pub use value_record::ValueRecord;
