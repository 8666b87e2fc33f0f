//! GPOS `ValueRecord`: a flag-conditional set of `{xPlacement, yPlacement,
//! xAdvance, yAdvance}` adjustments, each optionally followed by a Device
//! (or `VariationIndex`) table offset (§4.J, §9 "variable-length records").

use crate::error::Result;
use crate::font::fixed_point::NormalizedCoord;
use crate::font::variation::ivs::ItemVariationStore;
use crate::reader::Reader;
use crate::tables::device::Device;

#[derive(Debug, Clone, Copy, Default)]
pub struct ValueFormat(pub u16);

impl ValueFormat {
    pub const X_PLACEMENT: u16 = 0x0001;
    pub const Y_PLACEMENT: u16 = 0x0002;
    pub const X_ADVANCE: u16 = 0x0004;
    pub const Y_ADVANCE: u16 = 0x0008;
    pub const X_PLACEMENT_DEVICE: u16 = 0x0010;
    pub const Y_PLACEMENT_DEVICE: u16 = 0x0020;
    pub const X_ADVANCE_DEVICE: u16 = 0x0040;
    pub const Y_ADVANCE_DEVICE: u16 = 0x0080;

    /// Total byte size of a ValueRecord in this format: two bytes per set
    /// bit, reading the flags as a bitfield of 8 optional fields.
    pub fn size(self) -> usize {
        (self.0.count_ones() as usize) * 2
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// A resolved ValueRecord: raw fields plus unresolved device-table offsets
/// (resolved lazily against a PPEM/variation-coords pair by [`ValueRecord::apply`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueRecord<'a> {
    pub x_placement: i16,
    pub y_placement: i16,
    pub x_advance: i16,
    pub y_advance: i16,
    x_placement_device: Option<&'a [u8]>,
    y_placement_device: Option<&'a [u8]>,
    x_advance_device: Option<&'a [u8]>,
    y_advance_device: Option<&'a [u8]>,
}

impl<'a> ValueRecord<'a> {
    /// Parses a ValueRecord at the reader's current position, consuming
    /// exactly `format.size()` bytes. Device-table fields are resolved
    /// against `parent_data` (the subtable or lookup base the offsets are
    /// relative to) but left unparsed until [`ValueRecord::apply`].
    pub fn parse(r: &mut Reader<'a>, format: ValueFormat, parent_data: &'a [u8]) -> Result<Self> {
        let mut v = ValueRecord::default();
        if format.0 & ValueFormat::X_PLACEMENT != 0 {
            v.x_placement = r.read_i16()?;
        }
        if format.0 & ValueFormat::Y_PLACEMENT != 0 {
            v.y_placement = r.read_i16()?;
        }
        if format.0 & ValueFormat::X_ADVANCE != 0 {
            v.x_advance = r.read_i16()?;
        }
        if format.0 & ValueFormat::Y_ADVANCE != 0 {
            v.y_advance = r.read_i16()?;
        }
        if format.0 & ValueFormat::X_PLACEMENT_DEVICE != 0 {
            v.x_placement_device = device_at(r, parent_data)?;
        }
        if format.0 & ValueFormat::Y_PLACEMENT_DEVICE != 0 {
            v.y_placement_device = device_at(r, parent_data)?;
        }
        if format.0 & ValueFormat::X_ADVANCE_DEVICE != 0 {
            v.x_advance_device = device_at(r, parent_data)?;
        }
        if format.0 & ValueFormat::Y_ADVANCE_DEVICE != 0 {
            v.y_advance_device = device_at(r, parent_data)?;
        }
        Ok(v)
    }

    /// Resolves device/variation deltas and folds them into a `(dx, dy,
    /// d_x_advance, d_y_advance)` tuple, in font design units.
    pub fn resolve(
        &self,
        ppem: u16,
        var_store: Option<&ItemVariationStore>,
        coords: &[NormalizedCoord],
    ) -> (i32, i32, i32, i32) {
        let dev = |data: Option<&'a [u8]>| -> i32 {
            data.and_then(Device::parse).map(|d| d.resolve(ppem, var_store, coords)).unwrap_or(0)
        };
        (
            self.x_placement as i32 + dev(self.x_placement_device),
            self.y_placement as i32 + dev(self.y_placement_device),
            self.x_advance as i32 + dev(self.x_advance_device),
            self.y_advance as i32 + dev(self.y_advance_device),
        )
    }
}

fn device_at<'a>(r: &mut Reader<'a>, parent_data: &'a [u8]) -> Result<Option<&'a [u8]>> {
    let offset = r.read_u16()? as usize;
    if offset == 0 {
        return Ok(None);
    }
    Ok(parent_data.get(offset..))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_format_size_counts_set_bits() {
        let fmt = ValueFormat(ValueFormat::X_ADVANCE | ValueFormat::Y_PLACEMENT);
        assert_eq!(fmt.size(), 4);
        assert!(ValueFormat(0).is_empty());
    }

    #[test]
    fn parses_plain_x_advance() {
        let data = 120i16.to_be_bytes();
        let mut r = Reader::new(&data);
        let v = ValueRecord::parse(&mut r, ValueFormat(ValueFormat::X_ADVANCE), &data).unwrap();
        assert_eq!(v.x_advance, 120);
        assert_eq!(v.resolve(12, None, &[]).2, 120);
    }
}
