//! Unicode input buffer and glyph output buffer, with cluster tracking
//! (§4.F).

use crate::tables::lookup::SkipPredicate;

/// Unsigned 16-bit index into the font's glyph table. `0` is `.notdef` and
/// is a valid, renderable value — never treated as "absent" by buffer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct GlyphId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

impl Direction {
    pub fn is_backward(self) -> bool {
        matches!(self, Direction::RightToLeft | Direction::BottomToTop)
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::RightToLeft)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodepointInfo {
    pub codepoint: u32,
    pub cluster: u32,
}

/// The caller's input: a sequence of Unicode scalar values plus shaping
/// properties, any of which may be left to "guess from content".
#[derive(Debug, Clone, Default)]
pub struct UnicodeBuffer {
    pub(crate) codepoints: Vec<CodepointInfo>,
    pub script: Option<crate::tag::Tag>,
    pub language: Option<crate::tag::Tag>,
    pub direction: Option<Direction>,
}

impl UnicodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects surrogate code points (D800..DFFF), per §3.
    pub fn add_codepoint(&mut self, codepoint: u32, cluster: u32) {
        if (0xD800..=0xDFFF).contains(&codepoint) {
            return;
        }
        self.codepoints.push(CodepointInfo { codepoint, cluster });
    }

    pub fn add_string(&mut self, text: &str) {
        for (byte_offset, ch) in text.char_indices() {
            self.add_codepoint(ch as u32, byte_offset as u32);
        }
    }

    pub fn clear(&mut self) {
        self.codepoints.clear();
        self.script = None;
        self.language = None;
        self.direction = None;
    }

    pub fn len(&self) -> usize {
        self.codepoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codepoints.is_empty()
    }

    pub fn set_script(&mut self, script: crate::tag::Tag) {
        self.script = Some(script);
    }

    pub fn set_language(&mut self, language: crate::tag::Tag) {
        self.language = Some(language);
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = Some(direction);
    }

    /// Fills in unset script/language/direction from the buffer's content:
    /// script from the first codepoint with a resolvable script, direction
    /// from that script's customary direction.
    pub fn guess_segment_properties(&mut self) {
        if self.script.is_none() {
            let script = self
                .codepoints
                .iter()
                .find_map(|c| crate::unicode::script::script_for_codepoint(c.codepoint))
                .unwrap_or(crate::tag::Tag::DFLT);
            self.script = Some(script);
        }
        if self.direction.is_none() {
            let script = self.script.unwrap_or(crate::tag::Tag::DFLT);
            self.direction = Some(crate::unicode::script::default_direction(script));
        }
    }
}

/// A per-glyph feature-applicability bitfield. Bit 0 is reserved for
/// "always on" features (the required feature, per §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mask(pub u32);

impl Mask {
    pub const ALWAYS_ON: u32 = 1;

    pub fn has(self, bit: u32) -> bool {
        self.0 & bit != 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GlyphInfo {
    pub glyph_id: GlyphId,
    pub cluster: u32,
    pub mask: Mask,
    pub codepoint: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub x_advance: i32,
    pub y_advance: i32,
    pub x_offset: i32,
    pub y_offset: i32,
}

/// Parallel `info[]`/`pos[]` glyph sequence produced and consumed by
/// GSUB/GPOS. Order is logical until the final visual-reorder step.
#[derive(Debug, Clone, Default)]
pub struct GlyphBuffer {
    info: Vec<GlyphInfo>,
    pos: Vec<Position>,
    cursor: usize,
}

impl GlyphBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_unicode(buffer: &UnicodeBuffer, map: impl Fn(u32) -> GlyphId) -> Self {
        let info = buffer
            .codepoints
            .iter()
            .map(|c| GlyphInfo {
                glyph_id: map(c.codepoint),
                cluster: c.cluster,
                mask: Mask(Mask::ALWAYS_ON),
                codepoint: c.codepoint,
            })
            .collect::<Vec<_>>();
        let pos = vec![Position::default(); info.len()];
        Self { info, pos, cursor: 0 }
    }

    pub fn clear(&mut self) {
        self.info.clear();
        self.pos.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }

    pub fn info(&self) -> &[GlyphInfo] {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut [GlyphInfo] {
        &mut self.info
    }

    pub fn pos(&self) -> &[Position] {
        &self.pos
    }

    pub fn pos_mut(&mut self) -> &mut [Position] {
        &mut self.pos
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Replaces the glyph at `cursor` with `gid`, keeping its cluster.
    pub fn replace_glyph(&mut self, gid: GlyphId) {
        if let Some(g) = self.info.get_mut(self.cursor) {
            g.glyph_id = gid;
        }
    }

    /// Replaces the glyph at `cursor` with a sequence; `ligature` merges all
    /// consumed clusters to their minimum on the single output glyph,
    /// otherwise every output glyph keeps the original cluster (multiple
    /// substitution, §4.F).
    pub fn replace_glyphs(&mut self, count_consumed: usize, replacements: &[GlyphId], ligature: bool) {
        let end = (self.cursor + count_consumed).min(self.info.len());
        let consumed: Vec<GlyphInfo> = self.info[self.cursor..end].to_vec();
        let cluster = consumed.iter().map(|g| g.cluster).min().unwrap_or(0);
        let mask = consumed.first().map(|g| g.mask).unwrap_or_default();
        let codepoint = consumed.first().map(|g| g.codepoint).unwrap_or(0);

        let mut new_glyphs = Vec::with_capacity(replacements.len());
        if ligature {
            for &gid in replacements {
                new_glyphs.push(GlyphInfo { glyph_id: gid, cluster, mask, codepoint });
            }
        } else {
            for &gid in replacements {
                new_glyphs.push(GlyphInfo { glyph_id: gid, cluster, mask, codepoint });
            }
        }

        let new_positions = vec![Position::default(); new_glyphs.len()];
        self.info.splice(self.cursor..end, new_glyphs);
        self.pos.splice(self.cursor..end, new_positions);
    }

    /// Collapses the glyphs at `matched` (ascending, `matched[0]` first) into
    /// a single ligature glyph at `matched[0]`, removing the rest of
    /// `matched` but leaving every *other* glyph — including ignorable
    /// marks the lookup's skip predicate stepped over between components —
    /// untouched and in place (§4.I lookup type 4; §8 invariant 9). The
    /// ligature's cluster is the minimum of the consumed glyphs' clusters.
    pub fn ligate_matched(&mut self, matched: &[usize], ligature_glyph: GlyphId) {
        let Some(&first) = matched.first() else { return };
        let cluster = matched.iter().filter_map(|&i| self.info.get(i)).map(|g| g.cluster).min().unwrap_or(0);
        let mask = self.info.get(first).map(|g| g.mask).unwrap_or_default();
        let codepoint = self.info.get(first).map(|g| g.codepoint).unwrap_or(0);
        self.info[first] = GlyphInfo { glyph_id: ligature_glyph, cluster, mask, codepoint };
        self.pos[first] = Position::default();
        for &idx in matched[1..].iter().rev() {
            if idx < self.info.len() {
                self.info.remove(idx);
                self.pos.remove(idx);
            }
        }
    }

    /// Sets every cluster in `[start, end)` to their shared minimum, per the
    /// ligature-cluster-merge rule (§8 invariant 9).
    pub fn merge_clusters(&mut self, start: usize, end: usize) {
        let end = end.min(self.info.len());
        if start >= end {
            return;
        }
        let min_cluster = self.info[start..end].iter().map(|g| g.cluster).min().unwrap_or(0);
        for g in &mut self.info[start..end] {
            g.cluster = min_cluster;
        }
    }

    /// Appends `info`/`pos` pairs from another run, preserving their
    /// relative order. Used to concatenate independently shaped script/
    /// bidi runs into one final buffer (§4.E.6).
    pub fn extend_from(&mut self, info: &[GlyphInfo], pos: &[Position]) {
        self.info.extend_from_slice(info);
        self.pos.extend_from_slice(pos);
    }

    /// Splices `glyphs` into the buffer at `at`, each with a default
    /// (zero) position. Used by the AAT insertion pass (§4.K).
    pub fn insert_at(&mut self, at: usize, glyphs: &[GlyphInfo]) {
        let at = at.min(self.info.len());
        self.info.splice(at..at, glyphs.iter().copied());
        self.pos.splice(at..at, std::iter::repeat(Position::default()).take(glyphs.len()));
    }

    pub fn delete_glyph(&mut self) {
        if self.cursor < self.info.len() {
            self.info.remove(self.cursor);
            self.pos.remove(self.cursor);
        }
    }

    pub fn next_glyph(&mut self) {
        self.cursor += 1;
    }

    pub fn prev_glyph(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// The next position at or after `from` (or before, if `backward`) that
    /// the skip predicate does not reject, per lookup flags (§4.F).
    pub fn next_matching(&self, from: usize, backward: bool, skip: &SkipPredicate) -> Option<usize> {
        if backward {
            let mut i = from;
            loop {
                if i == 0 {
                    return None;
                }
                i -= 1;
                if !skip.should_skip(self.info[i].glyph_id) {
                    return Some(i);
                }
            }
        } else {
            let mut i = from;
            while i < self.info.len() {
                if !skip.should_skip(self.info[i].glyph_id) {
                    return Some(i);
                }
                i += 1;
            }
            None
        }
    }

    /// Convenience view for callers that scale straight to pixels instead
    /// of consuming design-unit `info`/`pos` directly.
    pub fn to_run(&self, font_size: f32, units_per_em: u16) -> ShapedRun {
        let glyphs = self
            .info
            .iter()
            .zip(self.pos.iter())
            .map(|(info, pos)| ShapedGlyph {
                glyph_id: info.glyph_id,
                cluster: info.cluster,
                x_advance: pos.x_advance,
                y_advance: pos.y_advance,
                x_offset: pos.x_offset,
                y_offset: pos.y_offset,
            })
            .collect();
        ShapedRun { glyphs, font_size, units_per_em }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShapedGlyph {
    pub glyph_id: GlyphId,
    pub cluster: u32,
    pub x_advance: i32,
    pub y_advance: i32,
    pub x_offset: i32,
    pub y_offset: i32,
}

#[derive(Debug, Clone)]
pub struct ShapedRun {
    pub glyphs: Vec<ShapedGlyph>,
    pub font_size: f32,
    pub units_per_em: u16,
}

impl ShapedRun {
    pub fn scale(&self) -> f32 {
        if self.units_per_em == 0 {
            return 1.0;
        }
        self.font_size / self.units_per_em as f32
    }

    pub fn width(&self) -> f32 {
        self.glyphs.iter().map(|g| g.x_advance as f32 * self.scale()).sum()
    }

    pub fn positioned_glyphs(&self) -> impl Iterator<Item = PositionedGlyph> + '_ {
        let scale = self.scale();
        let mut x = 0.0f32;
        let mut y = 0.0f32;
        self.glyphs.iter().map(move |g| {
            let p = PositionedGlyph {
                glyph_id: g.glyph_id,
                x: x + g.x_offset as f32 * scale,
                y: y + g.y_offset as f32 * scale,
                cluster: g.cluster,
            };
            x += g.x_advance as f32 * scale;
            y += g.y_advance as f32 * scale;
            p
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PositionedGlyph {
    pub glyph_id: GlyphId,
    pub x: f32,
    pub y: f32,
    pub cluster: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_surrogates() {
        let mut buf = UnicodeBuffer::new();
        buf.add_codepoint(0xD800, 0);
        buf.add_codepoint(0x41, 1);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn ligature_merge_takes_minimum_cluster() {
        let mut gb = GlyphBuffer {
            info: vec![
                GlyphInfo { glyph_id: GlyphId(3), cluster: 0, mask: Mask(1), codepoint: 'f' as u32 },
                GlyphInfo { glyph_id: GlyphId(4), cluster: 1, mask: Mask(1), codepoint: 'i' as u32 },
            ],
            pos: vec![Position::default(); 2],
            cursor: 0,
        };
        gb.replace_glyphs(2, &[GlyphId(99)], true);
        assert_eq!(gb.len(), 1);
        assert_eq!(gb.info()[0].cluster, 0);
    }

    #[test]
    fn ligate_matched_preserves_skipped_glyph_between_components() {
        // f + (mark) + i -> ligature, with the mark ignored by the lookup's
        // skip predicate but still present in the buffer at index 1.
        let mut gb = GlyphBuffer {
            info: vec![
                GlyphInfo { glyph_id: GlyphId(3), cluster: 0, mask: Mask(1), codepoint: 'f' as u32 },
                GlyphInfo { glyph_id: GlyphId(50), cluster: 1, mask: Mask(1), codepoint: 0x0301 },
                GlyphInfo { glyph_id: GlyphId(4), cluster: 2, mask: Mask(1), codepoint: 'i' as u32 },
            ],
            pos: vec![Position::default(); 3],
            cursor: 0,
        };
        gb.ligate_matched(&[0, 2], GlyphId(99));
        assert_eq!(gb.len(), 2);
        assert_eq!(gb.info()[0].glyph_id, GlyphId(99));
        assert_eq!(gb.info()[0].cluster, 0);
        assert_eq!(gb.info()[1].glyph_id, GlyphId(50));
        assert_eq!(gb.info()[1].cluster, 1);
    }

    #[test]
    fn clear_preserves_capacity() {
        let mut buf = UnicodeBuffer::new();
        buf.add_string("hello");
        let cap_before = buf.codepoints.capacity();
        buf.clear();
        assert_eq!(buf.codepoints.capacity(), cap_before);
        assert!(buf.is_empty());
    }
}
