//! Unicode preprocessing: normalization, combining-class reordering, BiDi,
//! mirroring, and script segmentation (§4.E).

pub mod bidi;
pub mod mirror;
pub mod normalize;
pub mod script;

pub use bidi::{BidiParagraph, BidiRun, Level};
pub use normalize::{combining_class, reorder_marks, NormalizeMode};
