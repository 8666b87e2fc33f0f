//! Big-endian bounds-checked cursor over a borrowed byte slice (§4.A).
//!
//! Every read either succeeds or returns [`ParseError::BadOffset`] — there
//! are no partial reads and no panics on malformed input. Subslicing never
//! copies bytes; `sub_from` produces an independent cursor that still
//! borrows the original buffer.

use crate::error::{ParseError, Result};

#[derive(Clone, Copy)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(ParseError::BadOffset);
        }
        self.pos = pos;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        let new_pos = self.pos.checked_add(n).ok_or(ParseError::BadOffset)?;
        if new_pos > self.data.len() {
            return Err(ParseError::BadOffset);
        }
        self.pos = new_pos;
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(ParseError::BadOffset)?;
        if end > self.data.len() {
            return Err(ParseError::BadOffset);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// 24-bit unsigned big-endian integer (used by `loca`/`CFF` offsets).
    pub fn read_u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(((b[0] as u32) << 16) | ((b[1] as u32) << 8) | (b[2] as u32))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// 16.16 signed fixed-point, as used by `head.fontRevision` and others.
    pub fn read_fixed(&mut self) -> Result<f32> {
        Ok(self.read_i32()? as f32 / 65536.0)
    }

    /// 2.14 signed fixed-point, as used by variation deltas and transforms.
    pub fn read_f2dot14(&mut self) -> Result<f32> {
        Ok(self.read_i16()? as f32 / 16384.0)
    }

    pub fn read_tag(&mut self) -> Result<crate::tag::Tag> {
        let b = self.take(4)?;
        Ok(crate::tag::Tag::from_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Reads `N` big-endian `u16`s at once (contiguous arrays).
    pub fn read_u16_array(&mut self, count: usize) -> Result<Vec<u16>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_u16()?);
        }
        Ok(out)
    }

    /// An independent cursor starting at `base + offset` within the same
    /// borrowed buffer — no copy, just a new starting position.
    pub fn sub_from(&self, offset: usize) -> Result<Reader<'a>> {
        if offset > self.data.len() {
            return Err(ParseError::BadOffset);
        }
        Ok(Reader { data: self.data, pos: offset })
    }

    /// The full slice this reader was constructed over (ignores `pos`).
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn slice_from_here(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_primitives() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u16().unwrap(), 0x5678);
        assert_eq!(r.read_u8().unwrap(), 0x9A);
    }

    #[test]
    fn fails_closed_on_exhaustion() {
        let data = [0x00u8];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u16(), Err(ParseError::BadOffset));
    }

    #[test]
    fn sub_from_does_not_copy_and_is_independent() {
        let data = [0, 0, 0xAB, 0xCD];
        let r = Reader::new(&data);
        let mut sub = r.sub_from(2).unwrap();
        assert_eq!(sub.read_u16().unwrap(), 0xABCD);
    }

    #[test]
    fn tag_round_trip() {
        let data = *b"GSUB";
        let mut r = Reader::new(&data);
        assert_eq!(r.read_tag().unwrap().to_string(), "GSUB");
    }

    #[test]
    fn f2dot14_midpoint() {
        // 0x4000 == 1.0 in 2.14 fixed point
        let data = [0x40, 0x00];
        let mut r = Reader::new(&data);
        assert!((r.read_f2dot14().unwrap() - 1.0).abs() < 1e-6);
    }
}
