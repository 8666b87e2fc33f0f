//! `OS/2`: Windows-oriented font metadata, consulted for line-height math
//! by callers that embed this engine in a text layout pipeline.

use crate::error::Result;
use crate::reader::Reader;

#[derive(Debug, Clone, Copy)]
pub struct Os2Table {
    pub weight_class: u16,
    pub width_class: u16,
    pub fs_type: u16,
    pub s_typo_ascender: i16,
    pub s_typo_descender: i16,
    pub s_typo_line_gap: i16,
    pub us_win_ascent: u16,
    pub us_win_descent: u16,
}

impl Os2Table {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let _version = r.read_u16()?;
        r.skip(2)?; // xAvgCharWidth
        let weight_class = r.read_u16()?;
        let width_class = r.read_u16()?;
        let fs_type = r.read_u16()?;
        r.skip(58)?; // subscript/superscript/strikeout/panose/unicode-range/vendor/selection fields
        let s_typo_ascender = r.read_i16()?;
        let s_typo_descender = r.read_i16()?;
        let s_typo_line_gap = r.read_i16()?;
        let us_win_ascent = r.read_u16()?;
        let us_win_descent = r.read_u16()?;

        Ok(Self {
            weight_class,
            width_class,
            fs_type,
            s_typo_ascender,
            s_typo_descender,
            s_typo_line_gap,
            us_win_ascent,
            us_win_descent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_offsets() {
        let mut data = vec![0u8; 100];
        data[4..6].copy_from_slice(&700u16.to_be_bytes()); // weight
        data[6..8].copy_from_slice(&5u16.to_be_bytes()); // width
        data[68..70].copy_from_slice(&1950i16.to_be_bytes()); // typo ascender
        let os2 = Os2Table::parse(&data).unwrap();
        assert_eq!(os2.weight_class, 700);
        assert_eq!(os2.width_class, 5);
        assert_eq!(os2.s_typo_ascender, 1950);
    }
}
