//! The public shaping entry point (§2, §4.G, §5): splits a
//! [`UnicodeBuffer`] into script/bidi runs, resolves (and caches) a
//! [`ShapePlan`] per run, and drives GSUB → GPOS (or their AAT/legacy
//! fallbacks) to produce a [`GlyphBuffer`] in final visual order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::{Direction, GlyphBuffer, UnicodeBuffer};
use crate::fallback;
use crate::font::fixed_point::NormalizedCoord;
use crate::font::Face;
use crate::ot::gpos::{Gpos, GposTable, VariationContext};
use crate::ot::gsub::{Gsub, GsubTable};
use crate::plan::{self, FeatureRequest, ShapePlan};
use crate::tag::Tag;
use crate::unicode::bidi::{BidiParagraph, Level};
use crate::unicode::normalize::NormalizeMode;
use crate::unicode::{mirror, script};
use crate::{aat, unicode};

/// Caller-facing shaping configuration (§4.G point 3 / SPEC_FULL's
/// "Configuration" section): everything that isn't already on the
/// [`UnicodeBuffer`] itself.
#[derive(Debug, Clone)]
pub struct ShapeOptions {
    pub features: Vec<FeatureRequest>,
    pub normalize_mode: NormalizeMode,
    /// Point size used to interpolate AAT `trak` tracking values (§4.K).
    /// Irrelevant to fonts without a `trak` table.
    pub point_size: f32,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self { features: Vec::new(), normalize_mode: NormalizeMode::Auto, point_size: 12.0 }
    }
}

/// Ergonomic builder over [`ShapeOptions`].
#[derive(Debug, Clone, Default)]
pub struct ShapePlanBuilder {
    options: ShapeOptions,
}

impl ShapePlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feature(mut self, tag: Tag, value: u32) -> Self {
        self.options.features.push(FeatureRequest::new(tag, value));
        self
    }

    pub fn feature_range(mut self, tag: Tag, value: u32, start: u32, end: u32) -> Self {
        self.options.features.push(FeatureRequest { tag, value, start, end });
        self
    }

    pub fn normalize_mode(mut self, mode: NormalizeMode) -> Self {
        self.options.normalize_mode = mode;
        self
    }

    pub fn point_size(mut self, pt: f32) -> Self {
        self.options.point_size = pt;
        self
    }

    pub fn build(self) -> ShapeOptions {
        self.options
    }
}

/// Identifies one `(font, script, language, direction, features, coords)`
/// combination for the plan cache (§4.G / §5). The font identity is the
/// `Face`'s underlying [`crate::font::Font`] address: two `Face`s built
/// over the same `Font` value share cache entries; a `Font` dropped and a
/// new one allocated at the same address would not be distinguished, the
/// same caveat any address-keyed cache carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    font_ptr: usize,
    script: Tag,
    language: Option<Tag>,
    direction: u8,
    coords: Vec<NormalizedCoord>,
    features: Vec<(Tag, u32, u32, u32)>,
}

impl CacheKey {
    fn new(
        face: &Face,
        script: Tag,
        language: Option<Tag>,
        direction: Direction,
        features: &[FeatureRequest],
    ) -> Self {
        let mut features: Vec<(Tag, u32, u32, u32)> =
            features.iter().map(|r| (r.tag, r.value, r.start, r.end)).collect();
        features.sort_by_key(|(tag, ..)| tag.0);
        Self {
            font_ptr: face.font() as *const _ as usize,
            script,
            language,
            direction: direction_bits(direction),
            coords: face.variation_coords().to_vec(),
            features,
        }
    }
}

fn direction_bits(direction: Direction) -> u8 {
    match direction {
        Direction::LeftToRight => 0,
        Direction::RightToLeft => 1,
        Direction::TopToBottom => 2,
        Direction::BottomToTop => 3,
    }
}

struct CacheEntry {
    plan: Arc<ShapePlan>,
    last_used: u64,
}

const DEFAULT_CACHE_CAPACITY: usize = 64;

/// A process-wide shape-plan cache plus the top-level `shape()` pipeline
/// (§2, §5). Cheap to construct; intended to be shared (e.g. behind an
/// `Arc`) across every call site that shapes text against a given set of
/// fonts, so repeated `(font, script, language, direction, features)`
/// combinations skip the GSUB/GPOS lookup-resolution work in
/// [`plan::build_plan`].
pub struct Engine {
    cache: RwLock<HashMap<CacheKey, CacheEntry>>,
    clock: AtomicU64,
    capacity: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { cache: RwLock::new(HashMap::new()), clock: AtomicU64::new(0), capacity: capacity.max(1) }
    }

    pub fn cached_plan_count(&self) -> usize {
        self.cache.read().len()
    }

    fn plan_for(
        &self,
        face: &Face,
        script: Tag,
        language: Option<Tag>,
        direction: Direction,
        features: &[FeatureRequest],
        normalize_mode: NormalizeMode,
    ) -> Arc<ShapePlan> {
        let key = CacheKey::new(face, script, language, direction, features);
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);

        let guard = self.cache.upgradable_read();
        if let Some(entry) = guard.get(&key) {
            let plan = entry.plan.clone();
            let mut guard = parking_lot::RwLockUpgradableReadGuard::upgrade(guard);
            if let Some(entry) = guard.get_mut(&key) {
                entry.last_used = tick;
            }
            return plan;
        }

        let plan = Arc::new(plan::build_plan(face, script, language, direction, features, normalize_mode));
        let mut guard = parking_lot::RwLockUpgradableReadGuard::upgrade(guard);
        if guard.len() >= self.capacity {
            if let Some(oldest_key) =
                guard.iter().min_by_key(|(_, e)| e.last_used).map(|(k, _)| k.clone())
            {
                guard.remove(&oldest_key);
            }
        }
        guard.insert(key, CacheEntry { plan: plan.clone(), last_used: tick });
        plan
    }

    /// Shapes `buffer` against `face` per `options`, returning glyphs in
    /// final visual (left-to-right-reading) order (§2's full control
    /// flow, §4.E.6's L2 reorder).
    pub fn shape(&self, face: &Face, mut buffer: UnicodeBuffer, options: &ShapeOptions) -> GlyphBuffer {
        buffer.guess_segment_properties();
        let paragraph_direction = buffer.direction.unwrap_or(Direction::LeftToRight);
        let codepoints = buffer.codepoints.clone();
        if codepoints.is_empty() {
            return GlyphBuffer::new();
        }
        let cps: Vec<u32> = codepoints.iter().map(|c| c.codepoint).collect();

        if !paragraph_direction.is_horizontal() {
            // Vertical text carries no bidi reordering in this engine
            // (§1 non-goal: only horizontal bidi is modeled); shape the
            // whole buffer as one run per script segment, in order.
            let mut out = GlyphBuffer::new();
            for (start, end, script_tag) in script::segment(&cps) {
                let run = self.shape_run(
                    face,
                    &codepoints[start..end],
                    script_tag,
                    buffer.language,
                    paragraph_direction,
                    options,
                );
                append_glyphs(&mut out, run);
            }
            return out;
        }

        let bidi = BidiParagraph::new(&cps, Some(paragraph_direction));
        let script_runs = script::segment(&cps);
        let combined = combined_runs(&script_runs, &bidi, cps.len());

        // Shape every logical sub-run independently, then walk the bidi
        // paragraph's visual run order, reversing both run order and each
        // RTL run's own glyph order (L2) as we go.
        let mut shaped: Vec<(usize, usize, GlyphBuffer)> = Vec::with_capacity(combined.len());
        for (start, end, script_tag, level) in &combined {
            let run_direction = if level.is_rtl() { Direction::RightToLeft } else { Direction::LeftToRight };
            let run = self.shape_run(
                face,
                &codepoints[*start..*end],
                *script_tag,
                buffer.language,
                run_direction,
                options,
            );
            shaped.push((*start, *end, run));
        }

        let mut out = GlyphBuffer::new();
        for visual_run in bidi.visual_runs() {
            let mut members: Vec<usize> = (0..shaped.len())
                .filter(|&i| shaped[i].0 >= visual_run.start && shaped[i].1 <= visual_run.end)
                .collect();
            if visual_run.level.is_rtl() {
                members.reverse();
            }
            for i in members {
                let (_, _, mut run) = std::mem::replace(&mut shaped[i], (0, 0, GlyphBuffer::new()));
                if visual_run.level.is_rtl() {
                    run.info_mut().reverse();
                    run.pos_mut().reverse();
                }
                append_glyphs(&mut out, run);
            }
        }
        out
    }

    /// Shapes one script-and-direction-uniform run (§2's per-run body).
    fn shape_run(
        &self,
        face: &Face,
        codepoints: &[crate::buffer::CodepointInfo],
        script_tag: Tag,
        language: Option<Tag>,
        direction: Direction,
        options: &ShapeOptions,
    ) -> GlyphBuffer {
        let mut run_buffer = UnicodeBuffer::new();
        run_buffer.script = Some(script_tag);
        run_buffer.language = language;
        run_buffer.direction = Some(direction);
        for cp in codepoints {
            run_buffer.add_codepoint(cp.codepoint, cp.cluster);
        }

        let plan = self.plan_for(face, script_tag, language, direction, &options.features, options.normalize_mode);

        unicode::normalize::normalize(plan.normalize_mode, script_tag, &mut run_buffer);
        if direction == Direction::RightToLeft {
            for cp in run_buffer.codepoints.iter_mut() {
                cp.codepoint = mirror::mirror(cp.codepoint);
            }
        }

        let mut gb = GlyphBuffer::from_unicode(&run_buffer, |cp| face.glyph_for_codepoint(cp));
        for (i, info) in gb.info().to_vec().iter().enumerate() {
            gb.pos_mut()[i].x_advance = face.advance_width(info.glyph_id);
        }

        plan.apply_global_masks(&mut gb, &options.features);
        let shaper = plan.shaper();
        shaper.preprocess(&mut gb, &plan.masks);

        let gdef = face.gdef();

        let used_gsub = if let Some(data) = face.gsub_data() {
            if let Ok(table) = GsubTable::parse(data) {
                let gsub = Gsub::new(table);
                for lookup in &plan.gsub_lookups {
                    gsub.apply_lookup(lookup.index, &mut gb, gdef.as_ref(), lookup.required_mask, face);
                }
                true
            } else {
                false
            }
        } else {
            false
        };
        if !used_gsub {
            aat::apply_morx(face, &mut gb);
        }

        let mut used_gpos = false;
        if let Some(data) = face.gpos_data() {
            if let Ok(table) = GposTable::parse(data) {
                let gpos = Gpos::new(table);
                let var = VariationContext {
                    ppem: 0,
                    store: gdef.as_ref().and_then(|g| g.variation_store()),
                    coords: &plan.coords,
                };
                for lookup in &plan.gpos_lookups {
                    gpos.apply_lookup(lookup.index, &mut gb, gdef.as_ref(), lookup.required_mask, var, face);
                }
                used_gpos = !plan.gpos_lookups.is_empty();
            }
        }

        if !used_gpos {
            let used_kerx = aat::apply_kerx(face, &mut gb);
            if !used_kerx {
                if let Some(data) = face.kern_data() {
                    fallback::apply_legacy_kern(data, &mut gb);
                }
            }
            fallback::apply_mark_fallback(&mut gb);
        }

        shaper.postprocess(&mut gb, &plan.masks);
        aat::apply_trak(face, &mut gb, options.point_size);

        gb
    }
}

fn append_glyphs(out: &mut GlyphBuffer, run: GlyphBuffer) {
    out.extend_from(run.info(), run.pos());
}

/// Splits `[0, len)` at every boundary either the script segmentation or
/// the bidi level-run partition introduces, so each resulting span is
/// uniform in both script and embedding level.
fn combined_runs(
    script_runs: &[(usize, usize, Tag)],
    bidi: &BidiParagraph,
    len: usize,
) -> Vec<(usize, usize, Tag, Level)> {
    let bidi_runs = bidi.runs();
    let mut breaks: Vec<usize> = vec![0, len];
    for &(s, e, _) in script_runs {
        breaks.push(s);
        breaks.push(e);
    }
    for r in &bidi_runs {
        breaks.push(r.start);
        breaks.push(r.end);
    }
    breaks.sort_unstable();
    breaks.dedup();

    let mut out = Vec::new();
    for w in breaks.windows(2) {
        let (start, end) = (w[0], w[1]);
        if start >= end {
            continue;
        }
        let script_tag = script_runs
            .iter()
            .find(|&&(s, e, _)| s <= start && end <= e)
            .map(|&(_, _, t)| t)
            .unwrap_or(Tag::DFLT);
        let level = bidi_runs
            .iter()
            .find(|r| r.start <= start && end <= r.end)
            .map(|r| r.level)
            .unwrap_or(bidi.base_level);
        out.push((start, end, script_tag, level));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{test_font, Font};

    fn latin_face_data() -> Vec<u8> {
        test_font::build_minimal(1000, 4, &[500, 500, 500, 500])
    }

    #[test]
    fn shapes_simple_latin_run_left_to_right() {
        let data = latin_face_data();
        let font = Font::from_data(data, 0).unwrap();
        let face = Face::new(&font).unwrap();
        let engine = Engine::new();
        let mut ub = UnicodeBuffer::new();
        ub.add_string("AB");
        let options = ShapeOptions::default();
        let result = engine.shape(&face, ub, &options);
        assert_eq!(result.len(), 2);
        assert!(result.pos()[0].x_advance > 0);
    }

    #[test]
    fn plan_cache_reuses_entries_for_repeated_requests() {
        let data = latin_face_data();
        let font = Font::from_data(data, 0).unwrap();
        let face = Face::new(&font).unwrap();
        let engine = Engine::new();
        let options = ShapeOptions::default();
        for _ in 0..3 {
            let mut ub = UnicodeBuffer::new();
            ub.add_string("AB");
            engine.shape(&face, ub, &options);
        }
        assert_eq!(engine.cached_plan_count(), 1);
    }

    #[test]
    fn mixed_bidi_paragraph_reverses_rtl_segment_only() {
        let data = latin_face_data();
        let font = Font::from_data(data, 0).unwrap();
        let face = Face::new(&font).unwrap();
        let engine = Engine::new();
        let mut ub = UnicodeBuffer::new();
        ub.add_string("A\u{0628}B");
        let options = ShapeOptions::default();
        let result = engine.shape(&face, ub, &options);
        assert_eq!(result.len(), 3);
    }
}
