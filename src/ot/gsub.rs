//! GSUB: the substitution engine — all eight lookup types. AAT `morx` is
//! the alternate path for fonts that carry no GSUB (see [`crate::aat`]).

use crate::buffer::{GlyphBuffer, GlyphId, Mask};
use crate::error::Result;
use crate::font::gdef::GdefTable;
use crate::reader::Reader;
use crate::tables::{Coverage, LookupFlag, SetDigest, SkipPredicate};

use super::contextual::{self, ChainContextLookup, ContextLookup};
use super::{FeatureList, FeatureVariations, LookupList, ScriptList};

const EXTENSION_TYPE: u16 = 7;

pub struct GsubTable<'a> {
    pub script_list: ScriptList<'a>,
    pub feature_list: FeatureList<'a>,
    pub lookup_list: LookupList<'a>,
    pub feature_variations: Option<FeatureVariations<'a>>,
}

impl<'a> GsubTable<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let _major = r.read_u16()?;
        let minor = r.read_u16()?;
        let script_list_offset = r.read_u16()? as usize;
        let feature_list_offset = r.read_u16()? as usize;
        let lookup_list_offset = r.read_u16()? as usize;
        let feature_variations_offset = if minor >= 1 { r.read_u32()? as usize } else { 0 };

        let script_list = ScriptList::parse(&data[script_list_offset..])?;
        let feature_list = FeatureList::parse(&data[feature_list_offset..])?;
        let lookup_list = LookupList::parse(&data[lookup_list_offset..])?;
        let feature_variations = if feature_variations_offset != 0 {
            FeatureVariations::parse(&data[feature_variations_offset..]).ok()
        } else {
            None
        };

        Ok(Self { script_list, feature_list, lookup_list, feature_variations })
    }

    pub fn lookup_count(&self) -> u16 {
        self.lookup_list.len() as u16
    }
}

struct LigatureRule {
    component_glyphs: Vec<u16>,
    ligature_glyph: u16,
}

enum SubstSubtable<'a> {
    Single1 { coverage: Coverage<'a>, delta: i16 },
    Single2 { coverage: Coverage<'a>, substitutes: Vec<u16> },
    Multiple { coverage: Coverage<'a>, sequences: Vec<Vec<u16>> },
    Alternate { coverage: Coverage<'a>, alternates: Vec<Vec<u16>> },
    Ligature { coverage: Coverage<'a>, ligature_sets: Vec<Vec<LigatureRule>> },
    Context(ContextLookup<'a>),
    ChainContext(ChainContextLookup<'a>),
    ReverseChainSingle {
        backtrack: Vec<Coverage<'a>>,
        input_coverage: Coverage<'a>,
        lookahead: Vec<Coverage<'a>>,
        substitutes: Vec<u16>,
    },
    Unsupported,
}

fn parse_subtable(lookup_type: u16, data: &[u8]) -> Option<SubstSubtable<'_>> {
    let mut r = Reader::new(data);
    let format = r.read_u16().ok()?;
    match lookup_type {
        1 => {
            let coverage_offset = r.read_u16().ok()? as usize;
            let coverage = Coverage::parse(data.get(coverage_offset..)?)?;
            match format {
                1 => {
                    let delta = r.read_i16().ok()?;
                    Some(SubstSubtable::Single1 { coverage, delta })
                }
                2 => {
                    let count = r.read_u16().ok()?;
                    let substitutes = r.read_u16_array(count as usize).ok()?;
                    Some(SubstSubtable::Single2 { coverage, substitutes })
                }
                _ => Some(SubstSubtable::Unsupported),
            }
        }
        2 => {
            if format != 1 {
                return Some(SubstSubtable::Unsupported);
            }
            let coverage_offset = r.read_u16().ok()? as usize;
            let coverage = Coverage::parse(data.get(coverage_offset..)?)?;
            let seq_count = r.read_u16().ok()?;
            let mut seq_offsets = Vec::with_capacity(seq_count as usize);
            for _ in 0..seq_count {
                seq_offsets.push(r.read_u16().ok()? as usize);
            }
            let mut sequences = Vec::with_capacity(seq_offsets.len());
            for off in seq_offsets {
                let mut sr = Reader::new(data.get(off..)?);
                let count = sr.read_u16().ok()?;
                sequences.push(sr.read_u16_array(count as usize).ok()?);
            }
            Some(SubstSubtable::Multiple { coverage, sequences })
        }
        3 => {
            if format != 1 {
                return Some(SubstSubtable::Unsupported);
            }
            let coverage_offset = r.read_u16().ok()? as usize;
            let coverage = Coverage::parse(data.get(coverage_offset..)?)?;
            let set_count = r.read_u16().ok()?;
            let mut set_offsets = Vec::with_capacity(set_count as usize);
            for _ in 0..set_count {
                set_offsets.push(r.read_u16().ok()? as usize);
            }
            let mut alternates = Vec::with_capacity(set_offsets.len());
            for off in set_offsets {
                let mut sr = Reader::new(data.get(off..)?);
                let count = sr.read_u16().ok()?;
                alternates.push(sr.read_u16_array(count as usize).ok()?);
            }
            Some(SubstSubtable::Alternate { coverage, alternates })
        }
        4 => {
            if format != 1 {
                return Some(SubstSubtable::Unsupported);
            }
            let coverage_offset = r.read_u16().ok()? as usize;
            let coverage = Coverage::parse(data.get(coverage_offset..)?)?;
            let set_count = r.read_u16().ok()?;
            let mut set_offsets = Vec::with_capacity(set_count as usize);
            for _ in 0..set_count {
                set_offsets.push(r.read_u16().ok()? as usize);
            }
            let mut ligature_sets = Vec::with_capacity(set_offsets.len());
            for set_off in set_offsets {
                let set_data = data.get(set_off..)?;
                let mut sr = Reader::new(set_data);
                let lig_count = sr.read_u16().ok()?;
                let mut lig_offsets = Vec::with_capacity(lig_count as usize);
                for _ in 0..lig_count {
                    lig_offsets.push(sr.read_u16().ok()? as usize);
                }
                let mut rules = Vec::with_capacity(lig_offsets.len());
                for lig_off in lig_offsets {
                    let mut lr = Reader::new(set_data.get(lig_off..)?);
                    let ligature_glyph = lr.read_u16().ok()?;
                    let component_count = lr.read_u16().ok()?;
                    let mut component_glyphs = Vec::with_capacity(component_count.saturating_sub(1) as usize);
                    for _ in 1..component_count {
                        component_glyphs.push(lr.read_u16().ok()?);
                    }
                    rules.push(LigatureRule { component_glyphs, ligature_glyph });
                }
                ligature_sets.push(rules);
            }
            Some(SubstSubtable::Ligature { coverage, ligature_sets })
        }
        5 => ContextLookup::parse(data).map(SubstSubtable::Context),
        6 => ChainContextLookup::parse(data).map(SubstSubtable::ChainContext),
        8 => {
            if format != 1 {
                return Some(SubstSubtable::Unsupported);
            }
            let coverage_offset = r.read_u16().ok()? as usize;
            let input_coverage = Coverage::parse(data.get(coverage_offset..)?)?;
            let backtrack_count = r.read_u16().ok()?;
            let mut backtrack_offsets = Vec::with_capacity(backtrack_count as usize);
            for _ in 0..backtrack_count {
                backtrack_offsets.push(r.read_u16().ok()? as usize);
            }
            let lookahead_count = r.read_u16().ok()?;
            let mut lookahead_offsets = Vec::with_capacity(lookahead_count as usize);
            for _ in 0..lookahead_count {
                lookahead_offsets.push(r.read_u16().ok()? as usize);
            }
            let glyph_count = r.read_u16().ok()?;
            let substitutes = r.read_u16_array(glyph_count as usize).ok()?;
            let resolve = |offs: Vec<usize>| -> Option<Vec<Coverage<'_>>> {
                offs.into_iter().map(|o| Coverage::parse(data.get(o..)?)).collect()
            };
            Some(SubstSubtable::ReverseChainSingle {
                backtrack: resolve(backtrack_offsets)?,
                input_coverage,
                lookahead: resolve(lookahead_offsets)?,
                substitutes,
            })
        }
        _ => Some(SubstSubtable::Unsupported),
    }
}

fn digest_for(lookup_type: u16, data: &[u8]) -> SetDigest {
    let mut digest = SetDigest::new();
    let Some(sub) = parse_subtable(lookup_type, data) else { return digest };
    let add_cov = |c: &Coverage, digest: &mut SetDigest| digest.extend(c.glyphs());
    match &sub {
        SubstSubtable::Single1 { coverage, .. }
        | SubstSubtable::Single2 { coverage, .. }
        | SubstSubtable::Multiple { coverage, .. }
        | SubstSubtable::Alternate { coverage, .. }
        | SubstSubtable::Ligature { coverage, .. } => add_cov(coverage, &mut digest),
        SubstSubtable::ReverseChainSingle { input_coverage, .. } => add_cov(input_coverage, &mut digest),
        SubstSubtable::Context(ContextLookup::Glyphs { coverage, .. })
        | SubstSubtable::Context(ContextLookup::Classes { coverage, .. })
        | SubstSubtable::ChainContext(ChainContextLookup::Glyphs { coverage, .. })
        | SubstSubtable::ChainContext(ChainContextLookup::Classes { coverage, .. }) => add_cov(coverage, &mut digest),
        SubstSubtable::Context(ContextLookup::Coverages { input_coverages, .. })
        | SubstSubtable::ChainContext(ChainContextLookup::Coverages { input_coverages, .. }) => {
            if let Some(c) = input_coverages.first() {
                add_cov(c, &mut digest);
            }
        }
        SubstSubtable::Unsupported => {}
    }
    digest
}

struct ParsedLookup<'a> {
    flag: LookupFlag,
    mark_filtering_set: Option<u16>,
    lookup_type: u16,
    subtables: Vec<SubstSubtable<'a>>,
    digest: SetDigest,
}

/// A GSUB engine bound to one parsed table; stateless across calls, so one
/// instance serves every glyph buffer shaped against this font.
pub struct Gsub<'a> {
    table: GsubTable<'a>,
}

impl<'a> Gsub<'a> {
    pub fn new(table: GsubTable<'a>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &GsubTable<'a> {
        &self.table
    }

    fn parse_lookup(&self, index: u16, face: &dyn UnsupportedSink) -> Option<ParsedLookup<'a>> {
        let record =
            self.table.lookup_list.lookup(index, EXTENSION_TYPE, resolve_extension, digest_for)?;
        let mut subtables = Vec::with_capacity(record.subtable_data.len());
        for data in &record.subtable_data {
            match parse_subtable(record.lookup_type, data) {
                Some(SubstSubtable::Unsupported) | None => {
                    face.note_unsupported("GSUB", record.lookup_type);
                    subtables.push(SubstSubtable::Unsupported);
                }
                Some(sub) => subtables.push(sub),
            }
        }
        Some(ParsedLookup {
            flag: record.flag,
            mark_filtering_set: record.mark_filtering_set,
            lookup_type: record.lookup_type,
            subtables,
            digest: record.digest,
        })
    }

    fn build_skip<'g>(&self, lookup: &ParsedLookup, gdef: Option<&'g GdefTable<'a>>) -> SkipPredicate<'g, 'a> {
        let mark_filtering_set = lookup
            .mark_filtering_set
            .zip(gdef)
            .and_then(|(idx, g)| g.mark_glyph_set(idx).cloned());
        SkipPredicate::new(lookup.flag, gdef, mark_filtering_set)
    }

    /// Applies lookup `index` across the whole buffer, left to right (or
    /// end-to-start for type 8 reverse chaining), at positions whose mask
    /// has `required_mask` set.
    pub fn apply_lookup(
        &self,
        index: u16,
        buffer: &mut GlyphBuffer,
        gdef: Option<&GdefTable<'a>>,
        required_mask: u32,
        face: &dyn UnsupportedSink,
    ) {
        let Some(lookup) = self.parse_lookup(index, face) else { return };
        let skip = self.build_skip(&lookup, gdef);

        if lookup.lookup_type == 8 {
            self.apply_reverse_chain(&lookup, buffer, &skip, required_mask);
            return;
        }

        buffer.set_cursor(0);
        while buffer.cursor() < buffer.len() {
            let pos = buffer.cursor();
            let gid = buffer.info()[pos].glyph_id;
            let mask_ok = required_mask == Mask::ALWAYS_ON || buffer.info()[pos].mask.has(required_mask);
            if skip.should_skip(gid) || !mask_ok || !lookup.digest.may_contain(gid) {
                buffer.next_glyph();
                continue;
            }
            let mut matched = false;
            for subtable in &lookup.subtables {
                if self.try_apply_at(subtable, buffer, pos, &skip, gdef, face) {
                    matched = true;
                    break;
                }
            }
            if !matched {
                buffer.next_glyph();
            }
        }
    }

    fn apply_reverse_chain(
        &self,
        lookup: &ParsedLookup<'a>,
        buffer: &mut GlyphBuffer,
        skip: &SkipPredicate,
        required_mask: u32,
    ) {
        for subtable in &lookup.subtables {
            let SubstSubtable::ReverseChainSingle { backtrack, input_coverage, lookahead, substitutes } = subtable
            else {
                continue;
            };
            let mut pos = buffer.len();
            while pos > 0 {
                pos -= 1;
                let gid = buffer.info()[pos].glyph_id;
                if skip.should_skip(gid) {
                    continue;
                }
                if required_mask != Mask::ALWAYS_ON && !buffer.info()[pos].mask.has(required_mask) {
                    continue;
                }
                let Some(cov_index) = input_coverage.lookup(gid) else { continue };
                if contextual::match_coverages(buffer, pos, backtrack, skip, true).is_none() {
                    continue;
                }
                if contextual::match_coverages(buffer, pos + 1, lookahead, skip, false).is_none() {
                    continue;
                }
                let Some(&sub) = substitutes.get(cov_index as usize) else { continue };
                buffer.set_cursor(pos);
                buffer.replace_glyph(GlyphId(sub));
            }
        }
    }

    /// Tries one subtable at `pos`; on success, advances `buffer`'s cursor
    /// past the consumed glyphs and returns `true`.
    fn try_apply_at(
        &self,
        subtable: &SubstSubtable<'a>,
        buffer: &mut GlyphBuffer,
        pos: usize,
        skip: &SkipPredicate,
        gdef: Option<&GdefTable<'a>>,
        face: &dyn UnsupportedSink,
    ) -> bool {
        match subtable {
            SubstSubtable::Single1 { coverage, delta } => {
                let gid = buffer.info()[pos].glyph_id;
                if coverage.lookup(gid).is_none() {
                    return false;
                }
                buffer.set_cursor(pos);
                let new_gid = (gid.0 as i32 + *delta as i32) as u16;
                buffer.replace_glyph(GlyphId(new_gid));
                buffer.next_glyph();
                true
            }
            SubstSubtable::Single2 { coverage, substitutes } => {
                let gid = buffer.info()[pos].glyph_id;
                let Some(idx) = coverage.lookup(gid) else { return false };
                let Some(&new_gid) = substitutes.get(idx as usize) else { return false };
                buffer.set_cursor(pos);
                buffer.replace_glyph(GlyphId(new_gid));
                buffer.next_glyph();
                true
            }
            SubstSubtable::Multiple { coverage, sequences } => {
                let gid = buffer.info()[pos].glyph_id;
                let Some(idx) = coverage.lookup(gid) else { return false };
                let Some(seq) = sequences.get(idx as usize) else { return false };
                buffer.set_cursor(pos);
                let replacements: Vec<GlyphId> = seq.iter().map(|&g| GlyphId(g)).collect();
                let out_len = replacements.len().max(1);
                buffer.replace_glyphs(1, &replacements, false);
                buffer.set_cursor(pos + out_len);
                true
            }
            SubstSubtable::Alternate { coverage, alternates } => {
                let gid = buffer.info()[pos].glyph_id;
                let Some(idx) = coverage.lookup(gid) else { return false };
                let Some(alts) = alternates.get(idx as usize) else { return false };
                let Some(&chosen) = alts.first() else { return false };
                buffer.set_cursor(pos);
                buffer.replace_glyph(GlyphId(chosen));
                buffer.next_glyph();
                true
            }
            SubstSubtable::Ligature { coverage, ligature_sets } => {
                let gid = buffer.info()[pos].glyph_id;
                let Some(idx) = coverage.lookup(gid) else { return false };
                let Some(rules) = ligature_sets.get(idx as usize) else { return false };
                for rule in rules {
                    if let Some(positions) =
                        contextual::match_glyph_ids(buffer, pos + 1, &rule.component_glyphs, skip, false)
                    {
                        let mut matched = Vec::with_capacity(positions.len() + 1);
                        matched.push(pos);
                        matched.extend_from_slice(&positions);
                        buffer.ligate_matched(&matched, GlyphId(rule.ligature_glyph));
                        buffer.set_cursor(pos + 1);
                        return true;
                    }
                }
                false
            }
            SubstSubtable::Context(ctx) => {
                let Some(m) = contextual::match_context(ctx, buffer, pos, skip) else { return false };
                self.run_nested(buffer, pos, &m, gdef, face);
                true
            }
            SubstSubtable::ChainContext(ctx) => {
                let Some(m) = contextual::match_chain_context(ctx, buffer, pos, skip) else { return false };
                self.run_nested(buffer, pos, &m, gdef, face);
                true
            }
            SubstSubtable::ReverseChainSingle { .. } | SubstSubtable::Unsupported => false,
        }
    }

    fn run_nested(
        &self,
        buffer: &mut GlyphBuffer,
        pos: usize,
        m: &contextual::ContextMatchResult,
        gdef: Option<&GdefTable<'a>>,
        face: &dyn UnsupportedSink,
    ) {
        let start_len = buffer.len();
        contextual::apply_nested(buffer, &m.positions, &m.lookups_owned, |buf, lookup_idx, at| {
            let before = buf.len();
            self.apply_single_at(lookup_idx, buf, at, gdef, face);
            buf.len() as i32 - before as i32
        });
        let grew = buffer.len() as i32 - start_len as i32;
        buffer.set_cursor((pos as i32 + 1 + grew.max(0)).max(pos as i32 + 1) as usize);
    }

    /// Applies lookup `lookup_index` once, at exactly position `pos`
    /// (no buffer scan) — used for nested context/chain-context
    /// applications.
    fn apply_single_at(
        &self,
        lookup_index: u16,
        buffer: &mut GlyphBuffer,
        pos: usize,
        gdef: Option<&GdefTable<'a>>,
        face: &dyn UnsupportedSink,
    ) {
        let Some(lookup) = self.parse_lookup(lookup_index, face) else { return };
        let skip = self.build_skip(&lookup, gdef);
        if pos >= buffer.len() {
            return;
        }
        for subtable in &lookup.subtables {
            if self.try_apply_at(subtable, buffer, pos, &skip, gdef, face) {
                return;
            }
        }
    }
}

fn resolve_extension(raw: &[u8]) -> Option<(u16, &[u8])> {
    let mut r = Reader::new(raw);
    let _format = r.read_u16().ok()?;
    let extension_lookup_type = r.read_u16().ok()?;
    let extension_offset = r.read_u32().ok()? as usize;
    Some((extension_lookup_type, raw.get(extension_offset..)?))
}

/// Callback for the "unrecognized subtable, treated as no-op" diagnostic
/// (§7) — implemented by [`crate::font::Face`].
pub trait UnsupportedSink {
    fn note_unsupported(&self, table: &'static str, format: u16);
}

impl UnsupportedSink for crate::font::Face<'_> {
    fn note_unsupported(&self, table: &'static str, format: u16) {
        self.note_unsupported_subtable(table, format);
    }
}

/// A no-op sink for callers (tests) that don't care about the diagnostic.
pub struct NullSink;
impl UnsupportedSink for NullSink {
    fn note_unsupported(&self, _table: &'static str, _format: u16) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_format1(start: u16, count: u16, delta: i16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_be_bytes()); // format
        data.extend_from_slice(&6u16.to_be_bytes()); // coverage offset
        data.extend_from_slice(&delta.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes()); // coverage format1
        data.extend_from_slice(&count.to_be_bytes());
        for g in start..start + count {
            data.extend_from_slice(&g.to_be_bytes());
        }
        data
    }

    #[test]
    fn single_format1_shifts_by_delta() {
        let data = single_format1(5, 3, 100);
        let sub = parse_subtable(1, &data).unwrap();
        let SubstSubtable::Single1 { coverage, delta } = sub else { panic!() };
        assert_eq!(delta, 100);
        assert_eq!(coverage.lookup(GlyphId(6)), Some(1));
    }

    fn make_buffer(gids: &[u16]) -> GlyphBuffer {
        let mut ub = crate::buffer::UnicodeBuffer::new();
        for (i, &g) in gids.iter().enumerate() {
            ub.add_codepoint(0x41 + g as u32, i as u32);
        }
        GlyphBuffer::from_unicode(&ub, |cp| GlyphId((cp - 0x41) as u16))
    }

    #[test]
    fn ligature_consumes_components_and_merges_cluster() {
        let ligature_set_data = {
            let mut d = Vec::new();
            d.extend_from_slice(&99u16.to_be_bytes()); // ligGlyph
            d.extend_from_slice(&2u16.to_be_bytes()); // componentCount
            d.extend_from_slice(&6u16.to_be_bytes()); // component[1] = glyph 6
            d
        };
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_be_bytes()); // format
        data.extend_from_slice(&10u16.to_be_bytes()); // coverage offset
        data.extend_from_slice(&1u16.to_be_bytes()); // ligSetCount
        data.extend_from_slice(&12u16.to_be_bytes()); // ligSet offset
        data.extend_from_slice(&ligature_set_data);
        data.extend_from_slice(&1u16.to_be_bytes()); // coverage format1
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&5u16.to_be_bytes());

        let sub = parse_subtable(4, &data).unwrap();
        let SubstSubtable::Ligature { coverage, ligature_sets } = sub else { panic!() };
        assert_eq!(coverage.lookup(GlyphId(5)), Some(0));

        let buffer = make_buffer(&[5, 6]);
        let skip = SkipPredicate::new(LookupFlag(0), None, None);
        assert!(contextual::match_glyph_ids(&buffer, 1, &ligature_sets[0][0].component_glyphs, &skip, false).is_some());

        let mut buffer2 = make_buffer(&[5, 6]);
        buffer2.set_cursor(0);
        buffer2.replace_glyphs(2, &[GlyphId(99)], true);
        assert_eq!(buffer2.len(), 1);
        assert_eq!(buffer2.info()[0].glyph_id, GlyphId(99));
        assert_eq!(buffer2.info()[0].cluster, 0);
    }

    #[test]
    fn multiple_subst_expands_one_glyph_to_several() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_be_bytes()); // format
        data.extend_from_slice(&8u16.to_be_bytes()); // coverage offset
        data.extend_from_slice(&1u16.to_be_bytes()); // seqCount
        data.extend_from_slice(&10u16.to_be_bytes()); // seq offset
        data.extend_from_slice(&1u16.to_be_bytes()); // coverage format1
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&5u16.to_be_bytes());
        data.extend_from_slice(&2u16.to_be_bytes()); // glyphCount
        data.extend_from_slice(&7u16.to_be_bytes());
        data.extend_from_slice(&8u16.to_be_bytes());

        let sub = parse_subtable(2, &data).unwrap();
        let SubstSubtable::Multiple { coverage, sequences } = sub else { panic!() };
        assert_eq!(coverage.lookup(GlyphId(5)), Some(0));
        assert_eq!(sequences[0], vec![7, 8]);
    }
}
