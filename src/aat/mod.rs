//! AAT shaping path (§4.K): Apple Advanced Typography state-machine
//! tables consulted as an alternate to GSUB/GPOS when a font carries them
//! instead of (or in addition to) OpenType layout tables.
//!
//! `morx` substitutes, `kerx` positions, `trak` adjusts final advances for
//! the requested point size — the latter always runs last, after GPOS or
//! its fallback, per §9's resolved Open Question.

pub mod kerx;
pub mod morx;
pub mod trak;

use crate::buffer::GlyphBuffer;
use crate::font::Face;

/// Runs the AAT substitution pass if the face carries a `morx` table.
/// Returns `false` (no-op) if the table is absent or fails to parse.
pub fn apply_morx(face: &Face, buffer: &mut GlyphBuffer) -> bool {
    let Some(data) = face.morx_data() else { return false };
    match morx::MorxTable::parse(data) {
        Some(table) => {
            table.apply(buffer);
            true
        }
        None => false,
    }
}

/// Runs the AAT positioning pass if the face carries a `kerx` table.
pub fn apply_kerx(face: &Face, buffer: &mut GlyphBuffer) -> bool {
    let Some(data) = face.kerx_data() else { return false };
    match kerx::KerxTable::parse(data) {
        Some(table) => {
            table.apply(buffer);
            true
        }
        None => false,
    }
}

/// Applies `trak` tracking to every glyph's advance for `point_size`.
pub fn apply_trak(face: &Face, buffer: &mut GlyphBuffer, point_size: f32) -> bool {
    let Some(data) = face.trak_data() else { return false };
    match trak::TrakTable::parse(data) {
        Some(table) => {
            table.apply(buffer, point_size);
            true
        }
        None => false,
    }
}
