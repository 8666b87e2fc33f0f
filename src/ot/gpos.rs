//! GPOS: the positioning engine — lookup types 1-9, plus the anchor-based
//! attachment math (cursive, mark-to-base, mark-to-ligature, mark-to-mark)
//! shared across types 3-6 (§4.J).

use crate::buffer::{GlyphBuffer, GlyphId, Mask};
use crate::error::Result;
use crate::font::fixed_point::NormalizedCoord;
use crate::font::gdef::GdefTable;
use crate::font::variation::ivs::ItemVariationStore;
use crate::reader::Reader;
use crate::tables::device::Device;
use crate::tables::{ClassDef, Coverage, LookupFlag, SetDigest, SkipPredicate};

use super::contextual::{self, ChainContextLookup, ContextLookup};
use super::value_record::{ValueFormat, ValueRecord};
use super::{FeatureList, FeatureVariations, LookupList, ScriptList};

const EXTENSION_TYPE: u16 = 9;

pub struct GposTable<'a> {
    pub script_list: ScriptList<'a>,
    pub feature_list: FeatureList<'a>,
    pub lookup_list: LookupList<'a>,
    pub feature_variations: Option<FeatureVariations<'a>>,
}

impl<'a> GposTable<'a> {
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

/// An unresolved Anchor table: format 1 (plain x/y), format 2 (x/y plus a
/// hinting contour point, which we do not re-derive from `glyf` and treat
/// as equivalent to format 1), or format 3 (x/y plus Device/VariationIndex
/// deltas).
#[derive(Debug, Clone, Copy)]
struct RawAnchor<'a> {
    data: &'a [u8],
}

impl<'a> RawAnchor<'a> {
    fn parse(data: &'a [u8]) -> Option<Self> {
        Some(Self { data })
    }

    fn resolve(&self, ppem: u16, store: Option<&ItemVariationStore>, coords: &[NormalizedCoord]) -> (i32, i32) {
        let mut r = Reader::new(self.data);
        let Ok(format) = r.read_u16() else { return (0, 0) };
        let Ok(x) = r.read_i16() else { return (0, 0) };
        let Ok(y) = r.read_i16() else { return (0, 0) };
        let (mut dx, mut dy) = (0i32, 0i32);
        if format == 3 {
            if let Ok(x_dev_off) = r.read_u16() {
                if x_dev_off != 0 {
                    dx = self.data.get(x_dev_off as usize..).and_then(Device::parse).map(|d| d.resolve(ppem, store, coords)).unwrap_or(0);
                }
            }
            if let Ok(y_dev_off) = r.read_u16() {
                if y_dev_off != 0 {
                    dy = self.data.get(y_dev_off as usize..).and_then(Device::parse).map(|d| d.resolve(ppem, store, coords)).unwrap_or(0);
                }
            }
        }
        (x as i32 + dx, y as i32 + dy)
    }
}

fn parse_anchor_at(base: &[u8], offset: usize) -> Option<RawAnchor<'_>> {
    if offset == 0 {
        return None;
    }
    RawAnchor::parse(base.get(offset..)?)
}

struct PairValue<'a> {
    second_glyph: u16,
    value1: ValueRecord<'a>,
    value2: ValueRecord<'a>,
}

struct MarkRecord<'a> {
    class: u16,
    anchor: Option<RawAnchor<'a>>,
}

enum PosSubtable<'a> {
    Single1 { coverage: Coverage<'a>, value: ValueRecord<'a> },
    Single2 { coverage: Coverage<'a>, values: Vec<ValueRecord<'a>> },
    Pair1 { coverage: Coverage<'a>, pair_sets: Vec<Vec<PairValue<'a>>>, has_value2: bool },
    Pair2 {
        coverage: Coverage<'a>,
        class_def1: ClassDef,
        class_def2: ClassDef,
        class1_count: u16,
        class2_count: u16,
        values: Vec<(ValueRecord<'a>, ValueRecord<'a>)>,
        has_value2: bool,
    },
    Cursive { coverage: Coverage<'a>, entry_exit: Vec<(Option<RawAnchor<'a>>, Option<RawAnchor<'a>>)> },
    MarkToBase {
        mark_coverage: Coverage<'a>,
        base_coverage: Coverage<'a>,
        mark_array: Vec<MarkRecord<'a>>,
        base_array: Vec<Vec<Option<RawAnchor<'a>>>>,
    },
    MarkToLigature {
        mark_coverage: Coverage<'a>,
        ligature_coverage: Coverage<'a>,
        mark_array: Vec<MarkRecord<'a>>,
        ligature_array: Vec<Vec<Vec<Option<RawAnchor<'a>>>>>,
    },
    MarkToMark {
        mark1_coverage: Coverage<'a>,
        mark2_coverage: Coverage<'a>,
        mark_array: Vec<MarkRecord<'a>>,
        mark2_array: Vec<Vec<Option<RawAnchor<'a>>>>,
    },
    Context(ContextLookup<'a>),
    ChainContext(ChainContextLookup<'a>),
    Unsupported,
}

fn parse_mark_array(data: &[u8]) -> Option<Vec<MarkRecord<'_>>> {
    let mut r = Reader::new(data);
    let count = r.read_u16().ok()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let class = r.read_u16().ok()?;
        let anchor_offset = r.read_u16().ok()? as usize;
        out.push(MarkRecord { class, anchor: parse_anchor_at(data, anchor_offset) });
    }
    Some(out)
}

fn parse_base_array(data: &[u8], mark_class_count: u16) -> Option<Vec<Vec<Option<RawAnchor<'_>>>>> {
    let mut r = Reader::new(data);
    let count = r.read_u16().ok()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut anchors = Vec::with_capacity(mark_class_count as usize);
        for _ in 0..mark_class_count {
            let off = r.read_u16().ok()? as usize;
            anchors.push(parse_anchor_at(data, off));
        }
        out.push(anchors);
    }
    Some(out)
}

fn parse_ligature_array(data: &[u8], mark_class_count: u16) -> Option<Vec<Vec<Vec<Option<RawAnchor<'_>>>>>> {
    let mut r = Reader::new(data);
    let count = r.read_u16().ok()?;
    let mut attach_offsets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        attach_offsets.push(r.read_u16().ok()? as usize);
    }
    let mut ligatures = Vec::with_capacity(attach_offsets.len());
    for off in attach_offsets {
        let attach_data = data.get(off..)?;
        let mut ar = Reader::new(attach_data);
        let component_count = ar.read_u16().ok()?;
        let mut components = Vec::with_capacity(component_count as usize);
        for _ in 0..component_count {
            let mut anchors = Vec::with_capacity(mark_class_count as usize);
            for _ in 0..mark_class_count {
                let anchor_off = ar.read_u16().ok()? as usize;
                anchors.push(parse_anchor_at(attach_data, anchor_off));
            }
            components.push(anchors);
        }
        ligatures.push(components);
    }
    Some(ligatures)
}

fn parse_subtable(lookup_type: u16, data: &[u8]) -> Option<PosSubtable<'_>> {
    let mut r = Reader::new(data);
    let format = r.read_u16().ok()?;
    match lookup_type {
        1 => {
            let coverage_offset = r.read_u16().ok()? as usize;
            let value_format = ValueFormat(r.read_u16().ok()?);
            let coverage = Coverage::parse(data.get(coverage_offset..)?)?;
            match format {
                1 => {
                    let value = ValueRecord::parse(&mut r, value_format, data).ok()?;
                    Some(PosSubtable::Single1 { coverage, value })
                }
                2 => {
                    let count = r.read_u16().ok()?;
                    let mut values = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        values.push(ValueRecord::parse(&mut r, value_format, data).ok()?);
                    }
                    Some(PosSubtable::Single2 { coverage, values })
                }
                _ => Some(PosSubtable::Unsupported),
            }
        }
        2 => {
            let coverage_offset = r.read_u16().ok()? as usize;
            let value_format1 = ValueFormat(r.read_u16().ok()?);
            let value_format2 = ValueFormat(r.read_u16().ok()?);
            let coverage = Coverage::parse(data.get(coverage_offset..)?)?;
            match format {
                1 => {
                    let pair_set_count = r.read_u16().ok()?;
                    let mut pair_set_offsets = Vec::with_capacity(pair_set_count as usize);
                    for _ in 0..pair_set_count {
                        pair_set_offsets.push(r.read_u16().ok()? as usize);
                    }
                    let mut pair_sets = Vec::with_capacity(pair_set_offsets.len());
                    for off in pair_set_offsets {
                        let set_data = data.get(off..)?;
                        let mut sr = Reader::new(set_data);
                        let pair_count = sr.read_u16().ok()?;
                        let mut pairs = Vec::with_capacity(pair_count as usize);
                        for _ in 0..pair_count {
                            let second_glyph = sr.read_u16().ok()?;
                            let value1 = ValueRecord::parse(&mut sr, value_format1, set_data).ok()?;
                            let value2 = ValueRecord::parse(&mut sr, value_format2, set_data).ok()?;
                            pairs.push(PairValue { second_glyph, value1, value2 });
                        }
                        pair_sets.push(pairs);
                    }
                    Some(PosSubtable::Pair1 { coverage, pair_sets, has_value2: !value_format2.is_empty() })
                }
                2 => {
                    let class_def1_offset = r.read_u16().ok()? as usize;
                    let class_def2_offset = r.read_u16().ok()? as usize;
                    let class1_count = r.read_u16().ok()?;
                    let class2_count = r.read_u16().ok()?;
                    let class_def1 = ClassDef::parse(data.get(class_def1_offset..)?)?;
                    let class_def2 = ClassDef::parse(data.get(class_def2_offset..)?)?;
                    let mut values = Vec::with_capacity(class1_count as usize * class2_count as usize);
                    for _ in 0..(class1_count as usize * class2_count as usize) {
                        let v1 = ValueRecord::parse(&mut r, value_format1, data).ok()?;
                        let v2 = ValueRecord::parse(&mut r, value_format2, data).ok()?;
                        values.push((v1, v2));
                    }
                    Some(PosSubtable::Pair2 {
                        coverage,
                        class_def1,
                        class_def2,
                        class1_count,
                        class2_count,
                        values,
                        has_value2: !value_format2.is_empty(),
                    })
                }
                _ => Some(PosSubtable::Unsupported),
            }
        }
        3 => {
            if format != 1 {
                return Some(PosSubtable::Unsupported);
            }
            let coverage_offset = r.read_u16().ok()? as usize;
            let coverage = Coverage::parse(data.get(coverage_offset..)?)?;
            let count = r.read_u16().ok()?;
            let mut entry_exit = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let entry_offset = r.read_u16().ok()? as usize;
                let exit_offset = r.read_u16().ok()? as usize;
                entry_exit.push((parse_anchor_at(data, entry_offset), parse_anchor_at(data, exit_offset)));
            }
            Some(PosSubtable::Cursive { coverage, entry_exit })
        }
        4 => {
            if format != 1 {
                return Some(PosSubtable::Unsupported);
            }
            let mark_coverage_offset = r.read_u16().ok()? as usize;
            let base_coverage_offset = r.read_u16().ok()? as usize;
            let mark_class_count = r.read_u16().ok()?;
            let mark_array_offset = r.read_u16().ok()? as usize;
            let base_array_offset = r.read_u16().ok()? as usize;
            let mark_coverage = Coverage::parse(data.get(mark_coverage_offset..)?)?;
            let base_coverage = Coverage::parse(data.get(base_coverage_offset..)?)?;
            let mark_array = parse_mark_array(data.get(mark_array_offset..)?)?;
            let base_array = parse_base_array(data.get(base_array_offset..)?, mark_class_count)?;
            Some(PosSubtable::MarkToBase { mark_coverage, base_coverage, mark_array, base_array })
        }
        5 => {
            if format != 1 {
                return Some(PosSubtable::Unsupported);
            }
            let mark_coverage_offset = r.read_u16().ok()? as usize;
            let ligature_coverage_offset = r.read_u16().ok()? as usize;
            let mark_class_count = r.read_u16().ok()?;
            let mark_array_offset = r.read_u16().ok()? as usize;
            let ligature_array_offset = r.read_u16().ok()? as usize;
            let mark_coverage = Coverage::parse(data.get(mark_coverage_offset..)?)?;
            let ligature_coverage = Coverage::parse(data.get(ligature_coverage_offset..)?)?;
            let mark_array = parse_mark_array(data.get(mark_array_offset..)?)?;
            let ligature_array = parse_ligature_array(data.get(ligature_array_offset..)?, mark_class_count)?;
            Some(PosSubtable::MarkToLigature { mark_coverage, ligature_coverage, mark_array, ligature_array })
        }
        6 => {
            if format != 1 {
                return Some(PosSubtable::Unsupported);
            }
            let mark1_coverage_offset = r.read_u16().ok()? as usize;
            let mark2_coverage_offset = r.read_u16().ok()? as usize;
            let mark_class_count = r.read_u16().ok()?;
            let mark_array_offset = r.read_u16().ok()? as usize;
            let mark2_array_offset = r.read_u16().ok()? as usize;
            let mark1_coverage = Coverage::parse(data.get(mark1_coverage_offset..)?)?;
            let mark2_coverage = Coverage::parse(data.get(mark2_coverage_offset..)?)?;
            let mark_array = parse_mark_array(data.get(mark_array_offset..)?)?;
            let mark2_array = parse_base_array(data.get(mark2_array_offset..)?, mark_class_count)?;
            Some(PosSubtable::MarkToMark { mark1_coverage, mark2_coverage, mark_array, mark2_array })
        }
        7 => ContextLookup::parse(data).map(PosSubtable::Context),
        8 => ChainContextLookup::parse(data).map(PosSubtable::ChainContext),
        _ => Some(PosSubtable::Unsupported),
    }
}

fn digest_for(lookup_type: u16, data: &[u8]) -> SetDigest {
    let mut digest = SetDigest::new();
    let Some(sub) = parse_subtable(lookup_type, data) else { return digest };
    let add_cov = |c: &Coverage, digest: &mut SetDigest| digest.extend(c.glyphs());
    match &sub {
        PosSubtable::Single1 { coverage, .. }
        | PosSubtable::Single2 { coverage, .. }
        | PosSubtable::Pair1 { coverage, .. }
        | PosSubtable::Pair2 { coverage, .. }
        | PosSubtable::Cursive { coverage, .. } => add_cov(coverage, &mut digest),
        PosSubtable::MarkToBase { mark_coverage, .. }
        | PosSubtable::MarkToLigature { mark_coverage, .. } => add_cov(mark_coverage, &mut digest),
        PosSubtable::MarkToMark { mark1_coverage, .. } => add_cov(mark1_coverage, &mut digest),
        PosSubtable::Context(ContextLookup::Glyphs { coverage, .. })
        | PosSubtable::Context(ContextLookup::Classes { coverage, .. })
        | PosSubtable::ChainContext(ChainContextLookup::Glyphs { coverage, .. })
        | PosSubtable::ChainContext(ChainContextLookup::Classes { coverage, .. }) => add_cov(coverage, &mut digest),
        PosSubtable::Context(ContextLookup::Coverages { input_coverages, .. })
        | PosSubtable::ChainContext(ChainContextLookup::Coverages { input_coverages, .. }) => {
            if let Some(c) = input_coverages.first() {
                add_cov(c, &mut digest);
            }
        }
        PosSubtable::Unsupported => {}
    }
    digest
}

struct ParsedLookup<'a> {
    flag: LookupFlag,
    mark_filtering_set: Option<u16>,
    lookup_type: u16,
    subtables: Vec<PosSubtable<'a>>,
    digest: SetDigest,
}

/// Resolved variation context threaded through GPOS value/anchor resolution.
#[derive(Clone, Copy)]
pub struct VariationContext<'a> {
    pub ppem: u16,
    pub store: Option<&'a ItemVariationStore>,
    pub coords: &'a [NormalizedCoord],
}

impl VariationContext<'_> {
    pub fn none() -> VariationContext<'static> {
        VariationContext { ppem: 0, store: None, coords: &[] }
    }
}

pub struct Gpos<'a> {
    table: GposTable<'a>,
}

impl<'a> Gpos<'a> {
    pub fn new(table: GposTable<'a>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &GposTable<'a> {
        &self.table
    }

    fn parse_lookup(&self, index: u16, face: &dyn super::gsub::UnsupportedSink) -> Option<ParsedLookup<'a>> {
        let record =
            self.table.lookup_list.lookup(index, EXTENSION_TYPE, resolve_extension, digest_for)?;
        let mut subtables = Vec::with_capacity(record.subtable_data.len());
        for data in &record.subtable_data {
            match parse_subtable(record.lookup_type, data) {
                Some(PosSubtable::Unsupported) | None => {
                    face.note_unsupported("GPOS", record.lookup_type);
                    subtables.push(PosSubtable::Unsupported);
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

    pub fn apply_lookup(
        &self,
        index: u16,
        buffer: &mut GlyphBuffer,
        gdef: Option<&GdefTable<'a>>,
        required_mask: u32,
        var: VariationContext,
        face: &dyn super::gsub::UnsupportedSink,
    ) {
        let Some(lookup) = self.parse_lookup(index, face) else { return };
        let skip = self.build_skip(&lookup, gdef);

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
                if self.try_apply_at(subtable, buffer, pos, &skip, gdef, var, face) {
                    matched = true;
                    break;
                }
            }
            if !matched {
                buffer.next_glyph();
            }
        }
    }

    /// Aligns `this_anchor` on the glyph at `this_pos` to `ref_anchor` on
    /// the glyph at `ref_pos`, subtracting any horizontal advance that
    /// accrued between them (the shared attachment math behind cursive
    /// connection and every mark-to-* lookup).
    fn align_anchor(buffer: &mut GlyphBuffer, ref_pos: usize, ref_anchor: (i32, i32), this_pos: usize, this_anchor: (i32, i32)) {
        let advance_between: i32 = if this_pos > ref_pos {
            buffer.pos()[ref_pos..this_pos].iter().map(|p| p.x_advance).sum()
        } else {
            0
        };
        let ref_offset = buffer.pos()[ref_pos];
        let dx = ref_offset.x_offset + ref_anchor.0 - advance_between - this_anchor.0;
        let dy = ref_offset.y_offset + ref_anchor.1 - this_anchor.1;
        let p = &mut buffer.pos_mut()[this_pos];
        p.x_offset = dx;
        p.y_offset = dy;
    }

    fn try_apply_at(
        &self,
        subtable: &PosSubtable<'a>,
        buffer: &mut GlyphBuffer,
        pos: usize,
        skip: &SkipPredicate,
        gdef: Option<&GdefTable<'a>>,
        var: VariationContext,
        face: &dyn super::gsub::UnsupportedSink,
    ) -> bool {
        match subtable {
            PosSubtable::Single1 { coverage, value } => {
                let gid = buffer.info()[pos].glyph_id;
                if coverage.lookup(gid).is_none() {
                    return false;
                }
                let (dx, dy, dxa, dya) = value.resolve(var.ppem, var.store, var.coords);
                apply_delta(buffer, pos, dx, dy, dxa, dya);
                buffer.set_cursor(pos + 1);
                true
            }
            PosSubtable::Single2 { coverage, values } => {
                let gid = buffer.info()[pos].glyph_id;
                let Some(idx) = coverage.lookup(gid) else { return false };
                let Some(value) = values.get(idx as usize) else { return false };
                let (dx, dy, dxa, dya) = value.resolve(var.ppem, var.store, var.coords);
                apply_delta(buffer, pos, dx, dy, dxa, dya);
                buffer.set_cursor(pos + 1);
                true
            }
            PosSubtable::Pair1 { coverage, pair_sets, has_value2 } => {
                let gid = buffer.info()[pos].glyph_id;
                let Some(idx) = coverage.lookup(gid) else { return false };
                let Some(pairs) = pair_sets.get(idx as usize) else { return false };
                let Some(pos2) = buffer.next_matching(pos + 1, false, skip) else { return false };
                let second = buffer.info()[pos2].glyph_id;
                let Some(pair) = pairs.iter().find(|p| p.second_glyph == second.0) else { return false };
                let (dx, dy, dxa, dya) = pair.value1.resolve(var.ppem, var.store, var.coords);
                apply_delta(buffer, pos, dx, dy, dxa, dya);
                if *has_value2 {
                    let (dx2, dy2, dxa2, dya2) = pair.value2.resolve(var.ppem, var.store, var.coords);
                    apply_delta(buffer, pos2, dx2, dy2, dxa2, dya2);
                    buffer.set_cursor(pos2 + 1);
                } else {
                    buffer.set_cursor(pos + 1);
                }
                true
            }
            PosSubtable::Pair2 {
                coverage,
                class_def1,
                class_def2,
                class1_count,
                class2_count,
                values,
                has_value2,
            } => {
                let gid = buffer.info()[pos].glyph_id;
                if coverage.lookup(gid).is_none() {
                    return false;
                }
                let Some(pos2) = buffer.next_matching(pos + 1, false, skip) else { return false };
                let second = buffer.info()[pos2].glyph_id;
                let c1 = class_def1.class(gid);
                let c2 = class_def2.class(second);
                if c1 >= *class1_count || c2 >= *class2_count {
                    return false;
                }
                let idx = c1 as usize * *class2_count as usize + c2 as usize;
                let Some((value1, value2)) = values.get(idx) else { return false };
                let (dx, dy, dxa, dya) = value1.resolve(var.ppem, var.store, var.coords);
                apply_delta(buffer, pos, dx, dy, dxa, dya);
                if *has_value2 {
                    let (dx2, dy2, dxa2, dya2) = value2.resolve(var.ppem, var.store, var.coords);
                    apply_delta(buffer, pos2, dx2, dy2, dxa2, dya2);
                    buffer.set_cursor(pos2 + 1);
                } else {
                    buffer.set_cursor(pos + 1);
                }
                true
            }
            PosSubtable::Cursive { coverage, entry_exit } => {
                let gid = buffer.info()[pos].glyph_id;
                let Some(idx) = coverage.lookup(gid) else { return false };
                let Some((entry, _exit)) = entry_exit.get(idx as usize) else { return false };
                let Some(entry_anchor) = entry else {
                    buffer.set_cursor(pos + 1);
                    return true;
                };
                let Some(prev_pos) = buffer.next_matching(pos, true, skip) else {
                    buffer.set_cursor(pos + 1);
                    return true;
                };
                let prev_gid = buffer.info()[prev_pos].glyph_id;
                let Some(prev_idx) = coverage.lookup(prev_gid) else {
                    buffer.set_cursor(pos + 1);
                    return true;
                };
                let Some((_, prev_exit)) = entry_exit.get(prev_idx as usize) else {
                    buffer.set_cursor(pos + 1);
                    return true;
                };
                if let Some(exit_anchor) = prev_exit {
                    let e = exit_anchor.resolve(var.ppem, var.store, var.coords);
                    let n = entry_anchor.resolve(var.ppem, var.store, var.coords);
                    Self::align_anchor(buffer, prev_pos, e, pos, n);
                }
                buffer.set_cursor(pos + 1);
                true
            }
            PosSubtable::MarkToBase { mark_coverage, base_coverage, mark_array, base_array } => {
                let gid = buffer.info()[pos].glyph_id;
                let Some(mark_idx) = mark_coverage.lookup(gid) else { return false };
                let Some(mark_rec) = mark_array.get(mark_idx as usize) else { return false };
                let Some(base_pos) = find_base_backward(buffer, pos, gdef, crate::font::gdef::GlyphClass::Base) else {
                    return false;
                };
                let base_gid = buffer.info()[base_pos].glyph_id;
                let Some(base_idx) = base_coverage.lookup(base_gid) else { return false };
                let Some(anchors) = base_array.get(base_idx as usize) else { return false };
                let Some(Some(base_anchor)) = anchors.get(mark_rec.class as usize) else { return false };
                let Some(mark_anchor) = &mark_rec.anchor else { return false };
                let b = base_anchor.resolve(var.ppem, var.store, var.coords);
                let m = mark_anchor.resolve(var.ppem, var.store, var.coords);
                Self::align_anchor(buffer, base_pos, b, pos, m);
                buffer.set_cursor(pos + 1);
                true
            }
            PosSubtable::MarkToLigature { mark_coverage, ligature_coverage, mark_array, ligature_array } => {
                let gid = buffer.info()[pos].glyph_id;
                let Some(mark_idx) = mark_coverage.lookup(gid) else { return false };
                let Some(mark_rec) = mark_array.get(mark_idx as usize) else { return false };
                let Some(lig_pos) = find_base_backward(buffer, pos, gdef, crate::font::gdef::GlyphClass::Ligature) else {
                    return false;
                };
                let lig_gid = buffer.info()[lig_pos].glyph_id;
                let Some(lig_idx) = ligature_coverage.lookup(lig_gid) else { return false };
                let Some(components) = ligature_array.get(lig_idx as usize) else { return false };
                // Component index tracking isn't carried on `GlyphInfo`; the
                // first component covers the common single-attachment case.
                let Some(anchors) = components.first() else { return false };
                let Some(Some(lig_anchor)) = anchors.get(mark_rec.class as usize) else { return false };
                let Some(mark_anchor) = &mark_rec.anchor else { return false };
                let b = lig_anchor.resolve(var.ppem, var.store, var.coords);
                let m = mark_anchor.resolve(var.ppem, var.store, var.coords);
                Self::align_anchor(buffer, lig_pos, b, pos, m);
                buffer.set_cursor(pos + 1);
                true
            }
            PosSubtable::MarkToMark { mark1_coverage, mark2_coverage, mark_array, mark2_array } => {
                let gid = buffer.info()[pos].glyph_id;
                let Some(mark_idx) = mark1_coverage.lookup(gid) else { return false };
                let Some(mark_rec) = mark_array.get(mark_idx as usize) else { return false };
                let Some(base_pos) = find_base_backward(buffer, pos, gdef, crate::font::gdef::GlyphClass::Mark) else {
                    return false;
                };
                let base_gid = buffer.info()[base_pos].glyph_id;
                let Some(base_idx) = mark2_coverage.lookup(base_gid) else { return false };
                let Some(anchors) = mark2_array.get(base_idx as usize) else { return false };
                let Some(Some(base_anchor)) = anchors.get(mark_rec.class as usize) else { return false };
                let Some(mark_anchor) = &mark_rec.anchor else { return false };
                let b = base_anchor.resolve(var.ppem, var.store, var.coords);
                let m = mark_anchor.resolve(var.ppem, var.store, var.coords);
                Self::align_anchor(buffer, base_pos, b, pos, m);
                buffer.set_cursor(pos + 1);
                true
            }
            PosSubtable::Context(ctx) => {
                let Some(m) = contextual::match_context(ctx, buffer, pos, skip) else { return false };
                self.run_nested(buffer, pos, &m, gdef, var, face);
                true
            }
            PosSubtable::ChainContext(ctx) => {
                let Some(m) = contextual::match_chain_context(ctx, buffer, pos, skip) else { return false };
                self.run_nested(buffer, pos, &m, gdef, var, face);
                true
            }
            PosSubtable::Unsupported => false,
        }
    }

    fn run_nested(
        &self,
        buffer: &mut GlyphBuffer,
        pos: usize,
        m: &contextual::ContextMatchResult,
        gdef: Option<&GdefTable<'a>>,
        var: VariationContext,
        face: &dyn super::gsub::UnsupportedSink,
    ) {
        contextual::apply_nested(buffer, &m.positions, &m.lookups_owned, |buf, lookup_idx, at| {
            self.apply_single_at(lookup_idx, buf, at, gdef, var, face);
            0 // GPOS nested lookups adjust offsets/advances in place; buffer length never changes.
        });
        buffer.set_cursor(pos + 1);
    }

    fn apply_single_at(
        &self,
        lookup_index: u16,
        buffer: &mut GlyphBuffer,
        pos: usize,
        gdef: Option<&GdefTable<'a>>,
        var: VariationContext,
        face: &dyn super::gsub::UnsupportedSink,
    ) {
        let Some(lookup) = self.parse_lookup(lookup_index, face) else { return };
        let skip = self.build_skip(&lookup, gdef);
        if pos >= buffer.len() {
            return;
        }
        for subtable in &lookup.subtables {
            if self.try_apply_at(subtable, buffer, pos, &skip, gdef, var, face) {
                return;
            }
        }
    }
}

fn apply_delta(buffer: &mut GlyphBuffer, pos: usize, dx: i32, dy: i32, dxa: i32, dya: i32) {
    if let Some(p) = buffer.pos_mut().get_mut(pos) {
        p.x_offset += dx;
        p.y_offset += dy;
        p.x_advance += dxa;
        p.y_advance += dya;
    }
}

/// Scans backward (ignoring marks beyond this lookup's own skip rules) for
/// the nearest glyph whose GDEF class is `want`, falling back to the
/// nearest non-mark glyph when GDEF carries no class data at all.
fn find_base_backward(
    buffer: &GlyphBuffer,
    from: usize,
    gdef: Option<&GdefTable>,
    want: crate::font::gdef::GlyphClass,
) -> Option<usize> {
    let mut i = from;
    while i > 0 {
        i -= 1;
        let gid = buffer.info()[i].glyph_id;
        let class = gdef.map(|g| g.glyph_class(gid)).unwrap_or_default();
        if class == want {
            return Some(i);
        }
        if gdef.is_none() && class != crate::font::gdef::GlyphClass::Mark {
            return Some(i);
        }
    }
    None
}

fn resolve_extension(raw: &[u8]) -> Option<(u16, &[u8])> {
    let mut r = Reader::new(raw);
    let _format = r.read_u16().ok()?;
    let extension_lookup_type = r.read_u16().ok()?;
    let extension_offset = r.read_u32().ok()? as usize;
    Some((extension_lookup_type, raw.get(extension_offset..)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ot::gsub::NullSink;

    fn make_buffer(gids: &[u16]) -> GlyphBuffer {
        let mut ub = crate::buffer::UnicodeBuffer::new();
        for (i, &g) in gids.iter().enumerate() {
            ub.add_codepoint(0x41 + g as u32, i as u32);
        }
        let mut gb = GlyphBuffer::from_unicode(&ub, |cp| GlyphId((cp - 0x41) as u16));
        for p in gb.pos_mut() {
            p.x_advance = 500;
        }
        gb
    }

    fn single_value_format1(glyph: u16, x_advance: i16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_be_bytes()); // format
        data.extend_from_slice(&8u16.to_be_bytes()); // coverage offset
        data.extend_from_slice(&(ValueFormat::X_ADVANCE).to_be_bytes());
        data.extend_from_slice(&x_advance.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes()); // coverage format1
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&glyph.to_be_bytes());
        data
    }

    #[test]
    fn single_adjustment_adds_to_advance() {
        let data = single_value_format1(5, 120);
        let sub = parse_subtable(1, &data).unwrap();
        let PosSubtable::Single1 { coverage, value } = sub else { panic!() };
        assert_eq!(coverage.lookup(GlyphId(5)), Some(0));
        let (_, _, dxa, _) = value.resolve(12, None, &[]);
        assert_eq!(dxa, 120);

        let gpos = Gpos::new(GposTable {
            script_list: ScriptList::parse(&[0, 0]).unwrap(),
            feature_list: FeatureList::parse(&[0, 0]).unwrap(),
            lookup_list: LookupList::parse(&[0, 0]).unwrap(),
            feature_variations: None,
        });
        let mut buffer = make_buffer(&[5]);
        let skip = SkipPredicate::new(LookupFlag(0), None, None);
        assert!(gpos.try_apply_at(
            &PosSubtable::Single1 { coverage, value },
            &mut buffer,
            0,
            &skip,
            None,
            VariationContext::none(),
            &NullSink,
        ));
        assert_eq!(buffer.pos()[0].x_advance, 620);
    }

    #[test]
    fn align_anchor_accounts_for_intervening_advance() {
        let mut buffer = make_buffer(&[1, 2, 3]);
        GposTable::parse; // keep import alive for doc purposes
        Gpos::align_anchor(&mut buffer, 0, (100, 200), 2, (10, 20));
        // base origin (0) has x_offset 0; two glyphs of advance 500 occur
        // before position 2, so dx = 0 + 100 - 1000 - 10 = -910.
        assert_eq!(buffer.pos()[2].x_offset, -910);
        assert_eq!(buffer.pos()[2].y_offset, 180);
    }

    fn pair_coverage_data(glyph: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_be_bytes()); // coverage format1
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&glyph.to_be_bytes());
        data
    }

    fn gpos_apply_test(sub: &PosSubtable, buffer: &mut GlyphBuffer, pos: usize, skip: &SkipPredicate) -> bool {
        let gpos = Gpos::new(GposTable {
            script_list: ScriptList::parse(&[0, 0]).unwrap(),
            feature_list: FeatureList::parse(&[0, 0]).unwrap(),
            lookup_list: LookupList::parse(&[0, 0]).unwrap(),
            feature_variations: None,
        });
        gpos.try_apply_at(sub, buffer, pos, skip, None, VariationContext::none(), &NullSink)
    }

    #[test]
    fn pair_adjustment_with_value2_skips_second_glyph() {
        let cov_data = pair_coverage_data(5);
        let coverage = Coverage::parse(&cov_data).unwrap();
        let pair = PairValue {
            second_glyph: 6,
            value1: ValueRecord { x_advance: 10, ..ValueRecord::default() },
            value2: ValueRecord { x_advance: 30, ..ValueRecord::default() },
        };
        let sub = PosSubtable::Pair1 { coverage, pair_sets: vec![vec![pair]], has_value2: true };
        let mut buffer = make_buffer(&[5, 6, 5]);
        let skip = SkipPredicate::new(LookupFlag(0), None, None);
        assert!(gpos_apply_test(&sub, &mut buffer, 0, &skip));
        // both glyphs of the pair were adjusted...
        assert_eq!(buffer.pos()[0].x_advance, 510);
        assert_eq!(buffer.pos()[1].x_advance, 530);
        // ...and the cursor must land past the second glyph, not re-enter it.
        assert_eq!(buffer.cursor(), 2);
    }

    #[test]
    fn pair_adjustment_without_value2_advances_one_glyph_only() {
        let cov_data = pair_coverage_data(5);
        let coverage = Coverage::parse(&cov_data).unwrap();
        let pair = PairValue {
            second_glyph: 6,
            value1: ValueRecord { x_advance: 10, ..ValueRecord::default() },
            value2: ValueRecord::default(),
        };
        let sub = PosSubtable::Pair1 { coverage, pair_sets: vec![vec![pair]], has_value2: false };
        let mut buffer = make_buffer(&[5, 6, 5]);
        let skip = SkipPredicate::new(LookupFlag(0), None, None);
        assert!(gpos_apply_test(&sub, &mut buffer, 0, &skip));
        assert_eq!(buffer.pos()[0].x_advance, 510);
        assert_eq!(buffer.pos()[1].x_advance, 500);
        assert_eq!(buffer.cursor(), 1);
    }
}
