//! Shared Context / Chaining Context matching (GSUB types 5/6, GPOS types
//! 7/8): three physical formats (by glyph ID, by ClassDef, by Coverage),
//! backtrack/lookahead sequences, and nested lookup application (§4.I,
//! §4.J).

use crate::buffer::GlyphBuffer;
use crate::error::Result;
use crate::reader::Reader;
use crate::tables::{ClassDef, Coverage, SkipPredicate};

#[derive(Debug, Clone, Copy)]
pub struct SequenceLookupRecord {
    pub sequence_index: u16,
    pub lookup_index: u16,
}

fn parse_sequence_lookups(r: &mut Reader) -> Result<Vec<SequenceLookupRecord>> {
    let count = r.read_u16()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(SequenceLookupRecord {
            sequence_index: r.read_u16()?,
            lookup_index: r.read_u16()?,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone)]
struct SequenceRule {
    /// Glyph IDs (format 1) or class IDs (format 2) for input positions
    /// *after* the first, which is already fixed by the outer coverage.
    input: Vec<u16>,
    lookups: Vec<SequenceLookupRecord>,
}

fn parse_sequence_rule(r: &mut Reader) -> Result<SequenceRule> {
    let glyph_count = r.read_u16()?;
    let mut input = Vec::with_capacity(glyph_count.saturating_sub(1) as usize);
    for _ in 1..glyph_count {
        input.push(r.read_u16()?);
    }
    let lookups = parse_sequence_lookups(r)?;
    Ok(SequenceRule { input, lookups })
}

fn parse_rule_sets(data: &[u8]) -> Result<Vec<Vec<SequenceRule>>> {
    let mut r = Reader::new(data);
    let count = r.read_u16()?;
    let mut set_offsets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        set_offsets.push(r.read_u16()? as usize);
    }
    let mut rule_sets = Vec::with_capacity(set_offsets.len());
    for offset in set_offsets {
        if offset == 0 {
            rule_sets.push(Vec::new());
            continue;
        }
        let Some(set_data) = data.get(offset..) else { rule_sets.push(Vec::new()); continue };
        let mut sr = Reader::new(set_data);
        let rule_count = sr.read_u16()?;
        let mut rule_offsets = Vec::with_capacity(rule_count as usize);
        for _ in 0..rule_count {
            rule_offsets.push(sr.read_u16()? as usize);
        }
        let mut rules = Vec::with_capacity(rule_offsets.len());
        for roffset in rule_offsets {
            if let Some(rule_data) = set_data.get(roffset..) {
                let mut rr = Reader::new(rule_data);
                rules.push(parse_sequence_rule(&mut rr)?);
            }
        }
        rule_sets.push(rules);
    }
    Ok(rule_sets)
}

#[derive(Debug, Clone)]
struct ChainSequenceRule {
    backtrack: Vec<u16>,
    input: Vec<u16>,
    lookahead: Vec<u16>,
    lookups: Vec<SequenceLookupRecord>,
}

fn parse_u16_seq(r: &mut Reader) -> Result<Vec<u16>> {
    let count = r.read_u16()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(r.read_u16()?);
    }
    Ok(out)
}

fn parse_chain_sequence_rule(r: &mut Reader) -> Result<ChainSequenceRule> {
    let backtrack = parse_u16_seq(r)?;
    let glyph_count = r.read_u16()?;
    let mut input = Vec::with_capacity(glyph_count.saturating_sub(1) as usize);
    for _ in 1..glyph_count {
        input.push(r.read_u16()?);
    }
    let lookahead = parse_u16_seq(r)?;
    let lookups = parse_sequence_lookups(r)?;
    Ok(ChainSequenceRule { backtrack, input, lookahead, lookups })
}

fn parse_chain_rule_sets(data: &[u8]) -> Result<Vec<Vec<ChainSequenceRule>>> {
    let mut r = Reader::new(data);
    let count = r.read_u16()?;
    let mut set_offsets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        set_offsets.push(r.read_u16()? as usize);
    }
    let mut rule_sets = Vec::with_capacity(set_offsets.len());
    for offset in set_offsets {
        if offset == 0 {
            rule_sets.push(Vec::new());
            continue;
        }
        let Some(set_data) = data.get(offset..) else { rule_sets.push(Vec::new()); continue };
        let mut sr = Reader::new(set_data);
        let rule_count = sr.read_u16()?;
        let mut rule_offsets = Vec::with_capacity(rule_count as usize);
        for _ in 0..rule_count {
            rule_offsets.push(sr.read_u16()? as usize);
        }
        let mut rules = Vec::with_capacity(rule_offsets.len());
        for roffset in rule_offsets {
            if let Some(rule_data) = set_data.get(roffset..) {
                let mut rr = Reader::new(rule_data);
                rules.push(parse_chain_sequence_rule(&mut rr)?);
            }
        }
        rule_sets.push(rules);
    }
    Ok(rule_sets)
}

/// Context (GSUB 5 / GPOS 7): formats 1 (glyph sequence), 2 (class
/// sequence), 3 (coverage-per-position).
pub enum ContextLookup<'a> {
    Glyphs { coverage: Coverage<'a>, rule_sets: Vec<Vec<SequenceRule>> },
    Classes { coverage: Coverage<'a>, class_def: ClassDef, rule_sets: Vec<Vec<SequenceRule>> },
    Coverages { input_coverages: Vec<Coverage<'a>>, lookups: Vec<SequenceLookupRecord> },
}

impl<'a> ContextLookup<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let format = r.read_u16().ok()?;
        match format {
            1 => {
                let coverage_offset = r.read_u16().ok()? as usize;
                let coverage = Coverage::parse(data.get(coverage_offset..)?)?;
                let rule_sets = parse_rule_sets(data.get(4..)?).ok()?;
                Some(Self::Glyphs { coverage, rule_sets })
            }
            2 => {
                let coverage_offset = r.read_u16().ok()? as usize;
                let coverage = Coverage::parse(data.get(coverage_offset..)?)?;
                let class_def_offset = r.read_u16().ok()? as usize;
                let class_def = ClassDef::parse(data.get(class_def_offset..)?)?;
                let rule_sets = parse_rule_sets(data.get(6..)?).ok()?;
                Some(Self::Classes { coverage, class_def, rule_sets })
            }
            3 => {
                let glyph_count = r.read_u16().ok()?;
                let lookup_count = r.read_u16().ok()?;
                let mut cov_offsets = Vec::with_capacity(glyph_count as usize);
                for _ in 0..glyph_count {
                    cov_offsets.push(r.read_u16().ok()? as usize);
                }
                let mut lookups = Vec::with_capacity(lookup_count as usize);
                for _ in 0..lookup_count {
                    lookups.push(SequenceLookupRecord {
                        sequence_index: r.read_u16().ok()?,
                        lookup_index: r.read_u16().ok()?,
                    });
                }
                let mut input_coverages = Vec::with_capacity(cov_offsets.len());
                for off in cov_offsets {
                    input_coverages.push(Coverage::parse(data.get(off..)?)?);
                }
                Some(Self::Coverages { input_coverages, lookups })
            }
            _ => None,
        }
    }
}

/// Chaining Context (GSUB 6 / GPOS 8): same three formats, plus backtrack
/// and lookahead sequences.
pub enum ChainContextLookup<'a> {
    Glyphs { coverage: Coverage<'a>, rule_sets: Vec<Vec<ChainSequenceRule>> },
    Classes {
        coverage: Coverage<'a>,
        backtrack_class_def: ClassDef,
        input_class_def: ClassDef,
        lookahead_class_def: ClassDef,
        rule_sets: Vec<Vec<ChainSequenceRule>>,
    },
    Coverages {
        backtrack_coverages: Vec<Coverage<'a>>,
        input_coverages: Vec<Coverage<'a>>,
        lookahead_coverages: Vec<Coverage<'a>>,
        lookups: Vec<SequenceLookupRecord>,
    },
}

impl<'a> ChainContextLookup<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let format = r.read_u16().ok()?;
        match format {
            1 => {
                let coverage_offset = r.read_u16().ok()? as usize;
                let coverage = Coverage::parse(data.get(coverage_offset..)?)?;
                let rule_sets = parse_chain_rule_sets(data.get(4..)?).ok()?;
                Some(Self::Glyphs { coverage, rule_sets })
            }
            2 => {
                let coverage_offset = r.read_u16().ok()? as usize;
                let coverage = Coverage::parse(data.get(coverage_offset..)?)?;
                let backtrack_cd_offset = r.read_u16().ok()? as usize;
                let input_cd_offset = r.read_u16().ok()? as usize;
                let lookahead_cd_offset = r.read_u16().ok()? as usize;
                let backtrack_class_def = ClassDef::parse(data.get(backtrack_cd_offset..)?)?;
                let input_class_def = ClassDef::parse(data.get(input_cd_offset..)?)?;
                let lookahead_class_def = ClassDef::parse(data.get(lookahead_cd_offset..)?)?;
                let rule_sets = parse_chain_rule_sets(data.get(10..)?).ok()?;
                Some(Self::Classes {
                    coverage,
                    backtrack_class_def,
                    input_class_def,
                    lookahead_class_def,
                    rule_sets,
                })
            }
            3 => {
                let backtrack_count = r.read_u16().ok()?;
                let mut backtrack_offsets = Vec::with_capacity(backtrack_count as usize);
                for _ in 0..backtrack_count {
                    backtrack_offsets.push(r.read_u16().ok()? as usize);
                }
                let input_count = r.read_u16().ok()?;
                let mut input_offsets = Vec::with_capacity(input_count as usize);
                for _ in 0..input_count {
                    input_offsets.push(r.read_u16().ok()? as usize);
                }
                let lookahead_count = r.read_u16().ok()?;
                let mut lookahead_offsets = Vec::with_capacity(lookahead_count as usize);
                for _ in 0..lookahead_count {
                    lookahead_offsets.push(r.read_u16().ok()? as usize);
                }
                let lookup_count = r.read_u16().ok()?;
                let mut lookups = Vec::with_capacity(lookup_count as usize);
                for _ in 0..lookup_count {
                    lookups.push(SequenceLookupRecord {
                        sequence_index: r.read_u16().ok()?,
                        lookup_index: r.read_u16().ok()?,
                    });
                }
                let resolve = |offs: Vec<usize>| -> Option<Vec<Coverage<'a>>> {
                    offs.into_iter().map(|o| Coverage::parse(data.get(o..)?)).collect()
                };
                Some(Self::Coverages {
                    backtrack_coverages: resolve(backtrack_offsets)?,
                    input_coverages: resolve(input_offsets)?,
                    lookahead_coverages: resolve(lookahead_offsets)?,
                    lookups,
                })
            }
            _ => None,
        }
    }
}

/// Matches glyph `gid` against a class-or-glyph input-position predicate.
fn matches_glyph_class(glyph: crate::buffer::GlyphId, expected_class: u16, class_def: &ClassDef) -> bool {
    class_def.class(glyph) == expected_class
}

/// Walks forward (or backward, for backtrack) from `from`, skipping
/// ignorable glyphs, matching each element of `wanted` against the
/// buffer. Returns the matched absolute positions in encounter order.
pub(crate) fn match_glyph_ids(
    buffer: &GlyphBuffer,
    from: usize,
    wanted: &[u16],
    skip: &SkipPredicate,
    backward: bool,
) -> Option<Vec<usize>> {
    let mut positions = Vec::with_capacity(wanted.len());
    let mut cursor = from;
    for &want in wanted {
        let next = buffer.next_matching(cursor, backward, skip)?;
        if buffer.info()[next].glyph_id.0 != want {
            return None;
        }
        positions.push(next);
        cursor = if backward { next } else { next + 1 };
    }
    Some(positions)
}

pub(crate) fn match_classes(
    buffer: &GlyphBuffer,
    from: usize,
    wanted: &[u16],
    class_def: &ClassDef,
    skip: &SkipPredicate,
    backward: bool,
) -> Option<Vec<usize>> {
    let mut positions = Vec::with_capacity(wanted.len());
    let mut cursor = from;
    for &want in wanted {
        let next = buffer.next_matching(cursor, backward, skip)?;
        if !matches_glyph_class(buffer.info()[next].glyph_id, want, class_def) {
            return None;
        }
        positions.push(next);
        cursor = if backward { next } else { next + 1 };
    }
    Some(positions)
}

pub(crate) fn match_coverages(
    buffer: &GlyphBuffer,
    from: usize,
    coverages: &[Coverage],
    skip: &SkipPredicate,
    backward: bool,
) -> Option<Vec<usize>> {
    let mut positions = Vec::with_capacity(coverages.len());
    let mut cursor = from;
    for cov in coverages {
        let next = buffer.next_matching(cursor, backward, skip)?;
        if !cov.contains(buffer.info()[next].glyph_id) {
            return None;
        }
        positions.push(next);
        cursor = if backward { next } else { next + 1 };
    }
    Some(positions)
}

/// Applies nested lookups at the sequence positions matched by a context
/// rule, in `sequence_index` order, adjusting later positions for any
/// buffer-length change a nested GSUB substitution causes. `apply_one`
/// runs a single lookup application at one cursor position and returns
/// the signed change in buffer length it caused.
pub fn apply_nested(
    buffer: &mut GlyphBuffer,
    input_positions: &[usize],
    lookups: &[SequenceLookupRecord],
    mut apply_one: impl FnMut(&mut GlyphBuffer, u16, usize) -> i32,
) {
    let mut positions = input_positions.to_vec();
    let mut ordered: Vec<&SequenceLookupRecord> = lookups.iter().collect();
    ordered.sort_by_key(|l| l.sequence_index);
    for record in ordered {
        let Some(&pos) = positions.get(record.sequence_index as usize) else { continue };
        let delta = apply_one(buffer, record.lookup_index, pos);
        if delta != 0 {
            for p in positions.iter_mut() {
                if *p > pos {
                    *p = (*p as i64 + delta as i64).max(0) as usize;
                }
            }
        }
    }
}

pub struct ContextMatchResult {
    pub positions: Vec<usize>,
    pub lookups_owned: Vec<SequenceLookupRecord>,
}

/// Tries to match a Context (non-chaining) lookup at `start`. On success,
/// returns the matched input positions (including `start`) and the
/// sequence-lookup records to apply.
pub fn match_context(lookup: &ContextLookup, buffer: &GlyphBuffer, start: usize, skip: &SkipPredicate) -> Option<ContextMatchResult> {
    match lookup {
        ContextLookup::Glyphs { coverage, rule_sets } => {
            let idx = coverage.lookup(buffer.info()[start].glyph_id)? as usize;
            let rules = rule_sets.get(idx)?;
            for rule in rules {
                if let Some(mut positions) = match_glyph_ids(buffer, start + 1, &rule.input, skip, false) {
                    positions.insert(0, start);
                    return Some(ContextMatchResult { positions, lookups_owned: rule.lookups.clone() });
                }
            }
            None
        }
        ContextLookup::Classes { coverage, class_def, rule_sets } => {
            coverage.lookup(buffer.info()[start].glyph_id)?;
            let class = class_def.class(buffer.info()[start].glyph_id) as usize;
            let rules = rule_sets.get(class)?;
            for rule in rules {
                if let Some(mut positions) = match_classes(buffer, start + 1, &rule.input, class_def, skip, false) {
                    positions.insert(0, start);
                    return Some(ContextMatchResult { positions, lookups_owned: rule.lookups.clone() });
                }
            }
            None
        }
        ContextLookup::Coverages { input_coverages, lookups } => {
            let (first, rest) = input_coverages.split_first()?;
            if !first.contains(buffer.info()[start].glyph_id) {
                return None;
            }
            let mut positions = vec![start];
            let mut cursor = start + 1;
            for cov in rest {
                let next = buffer.next_matching(cursor, false, skip)?;
                if !cov.contains(buffer.info()[next].glyph_id) {
                    return None;
                }
                positions.push(next);
                cursor = next + 1;
            }
            Some(ContextMatchResult { positions, lookups_owned: lookups.clone() })
        }
    }
}

/// Tries to match a Chaining Context lookup at `start`.
pub fn match_chain_context(
    lookup: &ChainContextLookup,
    buffer: &GlyphBuffer,
    start: usize,
    skip: &SkipPredicate,
) -> Option<ContextMatchResult> {
    match lookup {
        ChainContextLookup::Glyphs { coverage, rule_sets } => {
            let idx = coverage.lookup(buffer.info()[start].glyph_id)? as usize;
            let rules = rule_sets.get(idx)?;
            for rule in rules {
                if match_glyph_ids(buffer, start, &rule.backtrack, skip, true).is_none() {
                    continue;
                }
                let Some(mut input_positions) = match_glyph_ids(buffer, start + 1, &rule.input, skip, false) else { continue };
                let la_start = input_positions.last().map(|&p| p + 1).unwrap_or(start + 1);
                if match_glyph_ids(buffer, la_start, &rule.lookahead, skip, false).is_none() {
                    continue;
                }
                input_positions.insert(0, start);
                return Some(ContextMatchResult { positions: input_positions, lookups_owned: rule.lookups.clone() });
            }
            None
        }
        ChainContextLookup::Classes { coverage, backtrack_class_def, input_class_def, lookahead_class_def, rule_sets } => {
            coverage.lookup(buffer.info()[start].glyph_id)?;
            let class = input_class_def.class(buffer.info()[start].glyph_id) as usize;
            let rules = rule_sets.get(class)?;
            for rule in rules {
                if match_classes(buffer, start, &rule.backtrack, backtrack_class_def, skip, true).is_none() {
                    continue;
                }
                let Some(mut input_positions) =
                    match_classes(buffer, start + 1, &rule.input, input_class_def, skip, false)
                else {
                    continue;
                };
                let la_start = input_positions.last().map(|&p| p + 1).unwrap_or(start + 1);
                if match_classes(buffer, la_start, &rule.lookahead, lookahead_class_def, skip, false).is_none() {
                    continue;
                }
                input_positions.insert(0, start);
                return Some(ContextMatchResult { positions: input_positions, lookups_owned: rule.lookups.clone() });
            }
            None
        }
        ChainContextLookup::Coverages { backtrack_coverages, input_coverages, lookahead_coverages, lookups } => {
            let (first, rest) = input_coverages.split_first()?;
            if !first.contains(buffer.info()[start].glyph_id) {
                return None;
            }
            if match_coverages(buffer, start, backtrack_coverages, skip, true).is_none() {
                return None;
            }
            let mut positions = vec![start];
            let mut cursor = start + 1;
            for cov in rest {
                let next = buffer.next_matching(cursor, false, skip)?;
                if !cov.contains(buffer.info()[next].glyph_id) {
                    return None;
                }
                positions.push(next);
                cursor = next + 1;
            }
            if match_coverages(buffer, cursor, lookahead_coverages, skip, false).is_none() {
                return None;
            }
            Some(ContextMatchResult { positions, lookups_owned: lookups.clone() })
        }
    }
}
