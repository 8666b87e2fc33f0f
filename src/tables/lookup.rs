//! Lookup flags and the glyph skip-predicate shared by GSUB and GPOS
//! iteration.

use crate::buffer::GlyphId;
use crate::font::gdef::{GdefTable, GlyphClass};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupFlag(pub u16);

impl LookupFlag {
    pub const RIGHT_TO_LEFT: u16 = 0x0001;
    pub const IGNORE_BASE_GLYPHS: u16 = 0x0002;
    pub const IGNORE_LIGATURES: u16 = 0x0004;
    pub const IGNORE_MARKS: u16 = 0x0008;
    pub const USE_MARK_FILTERING_SET: u16 = 0x0010;
    pub const MARK_ATTACHMENT_TYPE_MASK: u16 = 0xFF00;

    pub fn right_to_left(self) -> bool {
        self.0 & Self::RIGHT_TO_LEFT != 0
    }

    pub fn ignore_base_glyphs(self) -> bool {
        self.0 & Self::IGNORE_BASE_GLYPHS != 0
    }

    pub fn ignore_ligatures(self) -> bool {
        self.0 & Self::IGNORE_LIGATURES != 0
    }

    pub fn ignore_marks(self) -> bool {
        self.0 & Self::IGNORE_MARKS != 0
    }

    pub fn uses_mark_filtering_set(self) -> bool {
        self.0 & Self::USE_MARK_FILTERING_SET != 0
    }

    pub fn mark_attachment_class(self) -> u8 {
        ((self.0 & Self::MARK_ATTACHMENT_TYPE_MASK) >> 8) as u8
    }
}

/// Decides whether a glyph at a given position participates in lookup
/// matching/iteration, per the lookup's flags and the font's GDEF classes.
///
/// Borrows the GDEF table rather than owning it, so one `Face`-level parse
/// can be shared across every lookup application in a shape call.
pub struct SkipPredicate<'g, 'a> {
    flag: LookupFlag,
    gdef: Option<&'g GdefTable<'a>>,
    mark_filtering_set: Option<crate::tables::coverage::Coverage<'a>>,
}

impl<'g, 'a> SkipPredicate<'g, 'a> {
    pub fn new(
        flag: LookupFlag,
        gdef: Option<&'g GdefTable<'a>>,
        mark_filtering_set: Option<crate::tables::coverage::Coverage<'a>>,
    ) -> Self {
        Self { flag, gdef, mark_filtering_set }
    }

    pub fn should_skip(&self, gid: GlyphId) -> bool {
        let class = self.gdef.map(|g| g.glyph_class(gid)).unwrap_or(GlyphClass::Unknown);

        if self.flag.ignore_base_glyphs() && class == GlyphClass::Base {
            return true;
        }
        if self.flag.ignore_ligatures() && class == GlyphClass::Ligature {
            return true;
        }
        if self.flag.ignore_marks() && class == GlyphClass::Mark {
            return true;
        }
        if self.flag.uses_mark_filtering_set() && class == GlyphClass::Mark {
            if let Some(set) = &self.mark_filtering_set {
                if !set.contains(gid) {
                    return true;
                }
            }
        }
        if class == GlyphClass::Mark && self.flag.mark_attachment_class() != 0 {
            let glyph_mark_class = self.gdef.map(|g| g.mark_attachment_class(gid)).unwrap_or(0);
            if glyph_mark_class != self.flag.mark_attachment_class() {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_gdef_never_skips() {
        let pred = SkipPredicate::new(LookupFlag(LookupFlag::IGNORE_MARKS), None, None);
        assert!(!pred.should_skip(GlyphId(5)));
    }
}
