//! Four-byte OpenType tags (`GSUB`, `cmap`, `wght`, ...).

use std::fmt;

/// A big-endian packing of four ASCII bytes, e.g. `Tag::new(b"GSUB")`.
///
/// Two tags compare equal iff their packed `u32` values are equal, so
/// comparisons are a single integer comparison rather than a byte-wise scan.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tag(pub u32);

impl Tag {
    pub const fn new(bytes: &[u8; 4]) -> Self {
        Tag(((bytes[0] as u32) << 24)
            | ((bytes[1] as u32) << 16)
            | ((bytes[2] as u32) << 8)
            | (bytes[3] as u32))
    }

    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(&bytes)
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        [
            (self.0 >> 24) as u8,
            (self.0 >> 16) as u8,
            (self.0 >> 8) as u8,
            self.0 as u8,
        ]
    }

    /// Parses a tag from a string, space-padding on the right if shorter
    /// than four bytes (as OpenType itself does for e.g. language tags).
    pub fn from_str_padded(s: &str) -> Self {
        let mut bytes = [b' '; 4];
        for (i, b) in s.as_bytes().iter().take(4).enumerate() {
            bytes[i] = *b;
        }
        Self::from_bytes(bytes)
    }

    pub const DFLT: Tag = Tag::new(b"DFLT");
    pub const GSUB: Tag = Tag::new(b"GSUB");
    pub const GPOS: Tag = Tag::new(b"GPOS");
    pub const GDEF: Tag = Tag::new(b"GDEF");
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        for b in bytes {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

impl From<[u8; 4]> for Tag {
    fn from(bytes: [u8; 4]) -> Self {
        Self::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_byte() {
        let tag = Tag::new(b"GSUB");
        assert_eq!(tag.to_string(), "GSUB");
        assert_eq!(tag.to_bytes(), *b"GSUB");
    }

    #[test]
    fn integer_comparison() {
        assert_eq!(Tag::new(b"wght"), Tag::new(b"wght"));
        assert_ne!(Tag::new(b"wght"), Tag::new(b"wdth"));
        assert!(Tag::new(b"DFLT") < Tag::new(b"GSUB"));
    }

    #[test]
    fn pads_short_strings() {
        assert_eq!(Tag::from_str_padded("en").to_bytes(), *b"en  ");
    }
}
