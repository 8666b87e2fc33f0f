//! Device table: PPEM-indexed hint deltas, or (format `0x8000`) an index
//! into an `ItemVariationStore`.

use crate::font::fixed_point::NormalizedCoord;
use crate::font::variation::ivs::ItemVariationStore;
use crate::reader::Reader;

const VARIATION_INDEX_FORMAT: u16 = 0x8000;

pub enum Device<'a> {
    Hinting { start_size: u16, end_size: u16, delta_format: u16, delta_values: &'a [u8] },
    Variation { outer_index: u16, inner_index: u16 },
}

impl<'a> Device<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let a = r.read_u16().ok()?;
        let b = r.read_u16().ok()?;
        let format = r.read_u16().ok()?;

        if format == VARIATION_INDEX_FORMAT {
            return Some(Self::Variation { outer_index: a, inner_index: b });
        }

        let start_size = a;
        let end_size = b;
        let count = (end_size.saturating_sub(start_size) + 1) as usize;
        let bits_per_value = match format {
            1 => 2,
            2 => 4,
            3 => 8,
            _ => return None,
        };
        let total_bits = count * bits_per_value;
        let byte_len = (total_bits + 15) / 16 * 2;
        let delta_values = r.read_bytes(byte_len).ok()?;

        Some(Self::Hinting { start_size, end_size, delta_format: format, delta_values })
    }

    /// Resolves the delta at `ppem` (hinting path) or via `store`+`coords`
    /// (variation path).
    pub fn resolve(&self, ppem: u16, store: Option<&ItemVariationStore>, coords: &[NormalizedCoord]) -> i32 {
        match self {
            Device::Variation { outer_index, inner_index } => store
                .map(|s| s.delta(*outer_index, *inner_index, coords))
                .unwrap_or(0),
            Device::Hinting { start_size, end_size, delta_format, delta_values } => {
                if ppem < *start_size || ppem > *end_size {
                    return 0;
                }
                let index = (ppem - start_size) as usize;
                let bits_per_value = match delta_format {
                    1 => 2,
                    2 => 4,
                    3 => 8,
                    _ => return 0,
                };
                let values_per_word = 16 / bits_per_value;
                let word_index = index / values_per_word;
                let Some(word_bytes) = delta_values.get(word_index * 2..word_index * 2 + 2) else {
                    return 0;
                };
                let word = u16::from_be_bytes([word_bytes[0], word_bytes[1]]);
                let shift = 16 - bits_per_value * (index % values_per_word + 1);
                let mask = (1u16 << bits_per_value) - 1;
                let raw = (word >> shift) & mask;
                sign_extend(raw, bits_per_value)
            }
        }
    }
}

fn sign_extend(value: u16, bits: usize) -> i32 {
    let shift = 16 - bits;
    ((value << shift) as i16 >> shift) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hinting_format1_two_bit_deltas() {
        // Values per ppem in [start,end]: -1, 0, 1, -2 packed 2 bits each.
        let mut data = Vec::new();
        data.extend_from_slice(&10u16.to_be_bytes()); // start_size
        data.extend_from_slice(&13u16.to_be_bytes()); // end_size
        data.extend_from_slice(&1u16.to_be_bytes()); // format = 2 bits/value
        // encode 0b11 (=-1), 0b00, 0b01, 0b10 -> packed MSB-first into one u16
        let word: u16 = 0b11_00_01_10;
        data.extend_from_slice(&word.to_be_bytes());
        let device = Device::parse(&data).unwrap();
        assert_eq!(device.resolve(10, None, &[]), -1);
        assert_eq!(device.resolve(11, None, &[]), 0);
        assert_eq!(device.resolve(12, None, &[]), 1);
        assert_eq!(device.resolve(13, None, &[]), -2);
        assert_eq!(device.resolve(14, None, &[]), 0);
    }
}
