//! Error types for font loading and table parsing.
//!
//! Shaping itself never fails once a `Face` is constructed: unrecognized
//! GSUB/GPOS subtable formats are skipped rather than propagated (see
//! [`crate::Face::unsupported_subtable_count`]). Only font loading and
//! variation-axis resolution surface fallible results to the caller.

/// Errors that can occur while parsing an sfnt container or one of its tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The sfnt/ttc magic did not match any recognized signature.
    #[error("bad font: unrecognized magic number")]
    BadFont,
    /// A required table (`cmap`, `hmtx`, `maxp`, ...) was absent.
    #[error("missing required table: {0}")]
    MissingTable(&'static str),
    /// A table-local offset or length read past the end of its table.
    #[error("offset or length read past table bounds")]
    BadOffset,
    /// The table used a format/version this implementation does not decode.
    #[error("unsupported table format")]
    UnsupportedFormat,
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Top-level error type returned by the public loading API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShapingError {
    /// Failure while loading or parsing the font container.
    #[error(transparent)]
    Font(#[from] ParseError),
}

/// A non-fatal diagnostic produced while resolving variable-font axis
/// coordinates. An axis value outside the `fvar` `[min, max]` range is
/// clamped rather than rejected; this flag tells the caller it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariationWarning {
    pub axis: crate::tag::Tag,
    pub requested: f32,
    pub clamped: f32,
}
