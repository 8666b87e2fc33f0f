//! `fvar`: variation axes and named instances (§4.B, §4.D).

use crate::error::{ParseError, Result};
use crate::reader::Reader;
use crate::tag::Tag;

#[derive(Debug, Clone, Copy)]
pub struct VariationAxis {
    pub tag: Tag,
    pub min_value: f32,
    pub default_value: f32,
    pub max_value: f32,
    pub flags: u16,
    pub name_id: u16,
}

impl VariationAxis {
    /// Normalizes `user_value` to `[-1, 0, 1]` relative to this axis's
    /// `(min, default, max)` triple (§4.D). Values outside `[min, max]` are
    /// clamped; the caller surfaces that as a `VariationWarning`.
    pub fn normalize(&self, user_value: f32) -> (f32, bool) {
        let clamped = user_value.clamp(self.min_value, self.max_value);
        let out_of_range = clamped != user_value;
        let normalized = if clamped < self.default_value {
            if self.default_value == self.min_value {
                0.0
            } else {
                -((self.default_value - clamped) / (self.default_value - self.min_value))
            }
        } else if clamped > self.default_value {
            if self.default_value == self.max_value {
                0.0
            } else {
                (clamped - self.default_value) / (self.max_value - self.default_value)
            }
        } else {
            0.0
        };
        (normalized, out_of_range)
    }
}

#[derive(Debug, Clone)]
pub struct NamedInstance {
    pub subfamily_name_id: u16,
    pub coordinates: Vec<f32>,
    pub postscript_name_id: Option<u16>,
}

pub struct FvarTable<'a> {
    pub axes: Vec<VariationAxis>,
    instances: Vec<NamedInstance>,
    _data: &'a [u8],
}

impl<'a> FvarTable<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let _major = r.read_u16()?;
        let _minor = r.read_u16()?;
        let axes_array_offset = r.read_u16()? as usize;
        let _reserved = r.read_u16()?;
        let axis_count = r.read_u16()? as usize;
        let axis_size = r.read_u16()? as usize;
        let instance_count = r.read_u16()? as usize;
        let instance_size = r.read_u16()? as usize;

        if axis_size < 20 {
            return Err(ParseError::UnsupportedFormat);
        }

        let mut axes = Vec::with_capacity(axis_count);
        let mut ar = Reader::new(data).sub_from(axes_array_offset)?;
        for _ in 0..axis_count {
            let start = ar.pos();
            let tag = ar.read_tag()?;
            let min_value = ar.read_fixed()?;
            let default_value = ar.read_fixed()?;
            let max_value = ar.read_fixed()?;
            let flags = ar.read_u16()?;
            let name_id = ar.read_u16()?;
            ar.set_pos(start + axis_size)?;
            axes.push(VariationAxis { tag, min_value, default_value, max_value, flags, name_id });
        }

        let instances_start = axes_array_offset + axis_count * axis_size;
        let mut instances = Vec::with_capacity(instance_count);
        let mut ir = Reader::new(data).sub_from(instances_start)?;
        let has_postscript_name = instance_size >= 6 + axis_count * 4 + 2;
        for _ in 0..instance_count {
            let start = ir.pos();
            let subfamily_name_id = ir.read_u16()?;
            let _flags = ir.read_u16()?;
            let mut coordinates = Vec::with_capacity(axis_count);
            for _ in 0..axis_count {
                coordinates.push(ir.read_fixed()?);
            }
            let postscript_name_id = if has_postscript_name { Some(ir.read_u16()?) } else { None };
            ir.set_pos(start + instance_size)?;
            instances.push(NamedInstance { subfamily_name_id, coordinates, postscript_name_id });
        }

        Ok(Self { axes, instances, _data: data })
    }

    pub fn instances(&self) -> &[NamedInstance] {
        &self.instances
    }

    pub fn axis(&self, tag: Tag) -> Option<&VariationAxis> {
        self.axes.iter().find(|a| a.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(axes: &[(&[u8; 4], f32, f32, f32)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&16u16.to_be_bytes()); // axesArrayOffset
        out.extend_from_slice(&2u16.to_be_bytes()); // reserved
        out.extend_from_slice(&(axes.len() as u16).to_be_bytes());
        out.extend_from_slice(&20u16.to_be_bytes()); // axisSize
        out.extend_from_slice(&0u16.to_be_bytes()); // instanceCount
        out.extend_from_slice(&4u16.to_be_bytes()); // instanceSize
        for &(tag, min, def, max) in axes {
            out.extend_from_slice(*tag);
            out.extend_from_slice(&((min * 65536.0) as i32).to_be_bytes());
            out.extend_from_slice(&((def * 65536.0) as i32).to_be_bytes());
            out.extend_from_slice(&((max * 65536.0) as i32).to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes()); // flags
            out.extend_from_slice(&256u16.to_be_bytes()); // nameID
        }
        out
    }

    #[test]
    fn normalizes_weight_axis() {
        let data = build(&[(b"wght", 100.0, 400.0, 900.0)]);
        let fvar = FvarTable::parse(&data).unwrap();
        let axis = fvar.axis(Tag::new(b"wght")).unwrap();
        assert_eq!(axis.normalize(400.0).0, 0.0);
        assert!((axis.normalize(900.0).0 - 1.0).abs() < 1e-6);
        assert!((axis.normalize(100.0).0 - (-1.0)).abs() < 1e-6);
        let (norm, clamped) = axis.normalize(1200.0);
        assert!((norm - 1.0).abs() < 1e-6);
        assert!(clamped);
    }
}
