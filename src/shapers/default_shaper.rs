//! The default shaper (§4.H): used for Latin, Greek, Cyrillic, Hebrew,
//! Thai, Hangul and any script with no dedicated complex shaper. All of
//! its features apply buffer-wide, so `preprocess` has nothing to do —
//! the plan builder already ORs every active feature's bit into every
//! glyph's mask.

use crate::buffer::GlyphBuffer;
use crate::plan::FeatureMasks;
use crate::tag::Tag;

use super::ComplexShaper;

const GSUB_FEATURES: &[Tag] = &[
    Tag::new(b"ccmp"),
    Tag::new(b"locl"),
    Tag::new(b"rlig"),
    Tag::new(b"rclt"),
    Tag::new(b"calt"),
    Tag::new(b"liga"),
    Tag::new(b"clig"),
];

const GPOS_FEATURES: &[Tag] = &[
    Tag::new(b"kern"),
    Tag::new(b"mark"),
    Tag::new(b"mkmk"),
    Tag::new(b"cpct"),
];

pub struct DefaultShaper;

impl ComplexShaper for DefaultShaper {
    fn gsub_features(&self) -> &'static [Tag] {
        GSUB_FEATURES
    }

    fn gpos_features(&self) -> &'static [Tag] {
        GPOS_FEATURES
    }

    fn preprocess(&self, _buffer: &mut GlyphBuffer, _masks: &FeatureMasks) {}
}
