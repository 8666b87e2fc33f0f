//! fos-shaper - a pure-Rust OpenType/TrueType text shaping engine.
//!
//! Turns a run of Unicode text plus a font into positioned glyphs:
//! script/BiDi segmentation, Unicode normalization, complex-script
//! preprocessing (Arabic joining, the Universal Shaping Engine), GSUB/GPOS
//! lookup application with variable-font support, AAT (`morx`/`kerx`/
//! `trak`) as an alternate path, legacy `kern`/mark-fallback positioning,
//! and line justification.
//!
//! The entry point is [`Engine::shape`]: build an [`Engine`] once per
//! process (it caches compiled [`plan::ShapePlan`]s across calls), then
//! call `shape` for each run of text against a parsed [`font::Face`].

pub mod aat;
pub mod buffer;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod font;
pub mod justify;
pub mod ot;
pub mod plan;
pub mod reader;
pub mod shapers;
pub mod tables;
pub mod tag;
pub mod unicode;

pub use buffer::{
    CodepointInfo, Direction, GlyphBuffer, GlyphId, GlyphInfo, Mask, Position, PositionedGlyph,
    ShapedGlyph, ShapedRun, UnicodeBuffer,
};
pub use engine::{Engine, ShapeOptions, ShapePlanBuilder};
pub use error::{ParseError, ShapingError, VariationWarning};
pub use font::{Face, Font};
pub use justify::{greedy_line_breaks, justify_line, JustifyResult};
pub use plan::{FeatureMasks, FeatureRequest, ShapePlan};
pub use tag::Tag;
pub use unicode::NormalizeMode;

/// Crate-wide [`Result`](std::result::Result) alias for font-parsing
/// operations; shaping operations that can also fail use
/// [`error::ShapingError`] directly.
pub type Result<T> = std::result::Result<T, ParseError>;
