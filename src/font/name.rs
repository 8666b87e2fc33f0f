//! `name`: font family/subfamily/typographic-family strings.
//!
//! Read-only convenience exposed on `Face`; the shaping pipeline itself
//! never consults `name`.

use crate::reader::Reader;

pub mod name_id {
    pub const FAMILY: u16 = 1;
    pub const SUBFAMILY: u16 = 2;
    pub const UNIQUE_ID: u16 = 3;
    pub const FULL_NAME: u16 = 4;
    pub const VERSION: u16 = 5;
    pub const POSTSCRIPT_NAME: u16 = 6;
    pub const TYPOGRAPHIC_FAMILY: u16 = 16;
    pub const TYPOGRAPHIC_SUBFAMILY: u16 = 17;
}

#[derive(Debug, Clone, Copy)]
struct NameRecordHeader {
    platform_id: u16,
    encoding_id: u16,
    name_id: u16,
    offset: u16,
    length: u16,
}

pub struct NameTable<'a> {
    data: &'a [u8],
    storage_start: usize,
    records: Vec<NameRecordHeader>,
}

impl<'a> NameTable<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let _format = r.read_u16().ok()?;
        let count = r.read_u16().ok()?;
        let storage_start = r.read_u16().ok()? as usize;

        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let platform_id = r.read_u16().ok()?;
            let encoding_id = r.read_u16().ok()?;
            let _language_id = r.read_u16().ok()?;
            let name_id = r.read_u16().ok()?;
            let length = r.read_u16().ok()?;
            let offset = r.read_u16().ok()?;
            records.push(NameRecordHeader { platform_id, encoding_id, name_id, offset, length });
        }

        Some(Self { data, storage_start, records })
    }

    /// The first Windows-platform (UTF-16BE) record for `id`, decoded to a
    /// `String`. Falls back to any platform if no Windows record matches.
    pub fn get(&self, id: u16) -> Option<String> {
        let best = self
            .records
            .iter()
            .find(|r| r.name_id == id && r.platform_id == 3)
            .or_else(|| self.records.iter().find(|r| r.name_id == id))?;

        let start = self.storage_start.checked_add(best.offset as usize)?;
        let end = start.checked_add(best.length as usize)?;
        let bytes = self.data.get(start..end)?;

        if best.platform_id == 1 && best.encoding_id == 0 {
            Some(bytes.iter().map(|&b| b as char).collect())
        } else {
            decode_utf16_be(bytes)
        }
    }

    pub fn family(&self) -> Option<String> {
        self.get(name_id::TYPOGRAPHIC_FAMILY).or_else(|| self.get(name_id::FAMILY))
    }

    pub fn subfamily(&self) -> Option<String> {
        self.get(name_id::TYPOGRAPHIC_SUBFAMILY).or_else(|| self.get(name_id::SUBFAMILY))
    }
}

fn decode_utf16_be(bytes: &[u8]) -> Option<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(records: &[(u16, u16, u16, &str)]) -> Vec<u8> {
        let mut storage = Vec::new();
        let mut entries = Vec::new();
        for &(platform, language, id, text) in records {
            let offset = storage.len() as u16;
            let utf16: Vec<u8> = text
                .encode_utf16()
                .flat_map(|u| u.to_be_bytes())
                .collect();
            let length = utf16.len() as u16;
            storage.extend_from_slice(&utf16);
            entries.push((platform, language, id, offset, length));
        }

        let mut out = Vec::new();
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
        let storage_start = 6 + entries.len() * 12;
        out.extend_from_slice(&(storage_start as u16).to_be_bytes());
        for (platform, language, id, offset, length) in entries {
            out.extend_from_slice(&platform.to_be_bytes());
            out.extend_from_slice(&1u16.to_be_bytes()); // encoding
            out.extend_from_slice(&language.to_be_bytes());
            out.extend_from_slice(&id.to_be_bytes());
            out.extend_from_slice(&length.to_be_bytes());
            out.extend_from_slice(&offset.to_be_bytes());
        }
        out.extend_from_slice(&storage);
        out
    }

    #[test]
    fn reads_family_name() {
        let data = build(&[(3, 0x409, name_id::FAMILY, "Example Sans")]);
        let table = NameTable::parse(&data).unwrap();
        assert_eq!(table.family().as_deref(), Some("Example Sans"));
    }
}
