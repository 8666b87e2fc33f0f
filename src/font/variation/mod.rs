//! Variable-font tables and the axis-coordinate resolver (§4.D).

pub mod avar;
pub mod fvar;
pub mod gvar;
pub mod hvar;
pub mod ivs;

use crate::font::fixed_point::NormalizedCoord;
use crate::tag::Tag;

/// One axis value the caller supplied, e.g. `(wght, 700.0)`.
#[derive(Debug, Clone, Copy)]
pub struct AxisValue {
    pub tag: Tag,
    pub value: f32,
}

/// A non-fatal out-of-range clamp recorded while normalizing one axis.
#[derive(Debug, Clone, Copy)]
pub struct VariationWarning {
    pub axis: Tag,
    pub requested: f32,
    pub clamped: f32,
}

/// Maps user axis values to a normalized coordinate vector in `fvar` axis
/// order, applying `avar`'s piecewise-linear remap when present (§4.D).
/// Axes the caller didn't mention default to their `fvar` default, which
/// normalizes to `0.0`.
pub fn resolve_coords(
    fvar: &fvar::FvarTable,
    avar: Option<&avar::AvarTable>,
    user_values: &[AxisValue],
) -> (Vec<NormalizedCoord>, Vec<VariationWarning>) {
    let mut coords = Vec::with_capacity(fvar.axes.len());
    let mut warnings = Vec::new();

    for (i, axis) in fvar.axes.iter().enumerate() {
        let requested = user_values.iter().find(|v| v.tag == axis.tag).map(|v| v.value);
        let normalized = match requested {
            Some(value) => {
                let (norm, out_of_range) = axis.normalize(value);
                if out_of_range {
                    let clamped = value.clamp(axis.min_value, axis.max_value);
                    tracing::warn!(axis = %axis.tag, requested = ?value, clamped = ?clamped, "variation axis value clamped");
                    warnings.push(VariationWarning { axis: axis.tag, requested: value, clamped });
                }
                norm
            }
            None => 0.0,
        };
        let remapped = avar.map(|a| a.map(i, normalized)).unwrap_or(normalized);
        coords.push(NormalizedCoord::from_f32(remapped));
    }

    (coords, warnings)
}
