//! Script segmentation: maps a codepoint to its OpenType script tag and a
//! script to its customary direction (§4.E.5).

use crate::buffer::Direction;
use crate::tag::Tag;

/// `None` means Common/Inherited — absorbed into the neighboring resolved
/// script by the caller rather than treated as its own segment.
pub fn script_for_codepoint(cp: u32) -> Option<Tag> {
    Some(match cp {
        0x0041..=0x005A | 0x0061..=0x007A | 0x00C0..=0x024F | 0x1E00..=0x1EFF => Tag::new(b"latn"),
        0x0370..=0x03FF | 0x1F00..=0x1FFF => Tag::new(b"grek"),
        0x0400..=0x04FF | 0x0500..=0x052F => Tag::new(b"cyrl"),
        0x0530..=0x058F => Tag::new(b"armn"),
        0x0590..=0x05FF => Tag::new(b"hebr"),
        0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF => Tag::new(b"arab"),
        0x0700..=0x074F => Tag::new(b"syrc"),
        0x0780..=0x07BF => Tag::new(b"thaa"),
        0x07C0..=0x07FF => Tag::new(b"nko "),
        0x0900..=0x097F => Tag::new(b"deva"),
        0x0980..=0x09FF => Tag::new(b"beng"),
        0x0A00..=0x0A7F => Tag::new(b"guru"),
        0x0A80..=0x0AFF => Tag::new(b"gujr"),
        0x0B00..=0x0B7F => Tag::new(b"orya"),
        0x0B80..=0x0BFF => Tag::new(b"taml"),
        0x0C00..=0x0C7F => Tag::new(b"telu"),
        0x0C80..=0x0CFF => Tag::new(b"knda"),
        0x0D00..=0x0D7F => Tag::new(b"mlym"),
        0x0D80..=0x0DFF => Tag::new(b"sinh"),
        0x0E00..=0x0E7F => Tag::new(b"thai"),
        0x0E80..=0x0EFF => Tag::new(b"laoo"),
        0x0F00..=0x0FFF => Tag::new(b"tibt"),
        0x1000..=0x109F | 0xAA60..=0xAA7F => Tag::new(b"mymr"),
        0x10A0..=0x10FF => Tag::new(b"geor"),
        0x1780..=0x17FF => Tag::new(b"khmr"),
        0x3040..=0x309F => Tag::new(b"kana"), // hiragana
        0x30A0..=0x30FF => Tag::new(b"kana"),
        0x3130..=0x318F | 0xAC00..=0xD7A3 => Tag::new(b"hang"),
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF => Tag::new(b"hani"),
        0x0000..=0x0040
        | 0x005B..=0x0060
        | 0x007B..=0x00BF
        | 0x2000..=0x206F
        | 0x2E00..=0x2E7F
        | 0x3000..=0x303F => return None, // Common
        0x0300..=0x036F => return None, // Inherited combining marks
        _ => Tag::new(b"latn"),
    })
}

pub fn default_direction(script: Tag) -> Direction {
    const RTL_SCRIPTS: [Tag; 6] = [
        Tag::new(b"arab"),
        Tag::new(b"hebr"),
        Tag::new(b"syrc"),
        Tag::new(b"thaa"),
        Tag::new(b"nko "),
        Tag::new(b"mong"),
    ];
    if RTL_SCRIPTS.contains(&script) {
        Direction::RightToLeft
    } else {
        Direction::LeftToRight
    }
}

/// Splits a run of `(codepoint, script)` pairs into maximal same-script
/// segments, with Common/Inherited absorbed into the neighboring resolved
/// script (§4.E.5).
pub fn segment(codepoints: &[u32]) -> Vec<(usize, usize, Tag)> {
    let mut resolved: Vec<Option<Tag>> = codepoints.iter().map(|&cp| script_for_codepoint(cp)).collect();

    // Forward-fill Common/Inherited gaps from the preceding resolved script.
    let mut last = None;
    for slot in resolved.iter_mut() {
        if slot.is_none() {
            *slot = last;
        } else {
            last = *slot;
        }
    }
    // Back-fill any leading gap from the first resolved script found.
    let first_known = resolved.iter().flatten().next().copied().unwrap_or(Tag::DFLT);
    for slot in resolved.iter_mut() {
        if slot.is_none() {
            *slot = Some(first_known);
        }
    }

    let mut segments = Vec::new();
    let mut start = 0;
    for i in 1..resolved.len() {
        if resolved[i] != resolved[start] {
            segments.push((start, i, resolved[start].unwrap()));
            start = i;
        }
    }
    if !resolved.is_empty() {
        segments.push((start, resolved.len(), resolved[start].unwrap()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_and_common_punctuation_merge_into_one_segment() {
        let text: Vec<u32> = "Hello, World!".chars().map(|c| c as u32).collect();
        let segs = segment(&text);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].2, Tag::new(b"latn"));
    }

    #[test]
    fn mixed_script_splits_into_two_segments() {
        let text: Vec<u32> = "abc\u{0627}\u{0628}".chars().map(|c| c as u32).collect();
        let segs = segment(&text);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].2, Tag::new(b"latn"));
        assert_eq!(segs[1].2, Tag::new(b"arab"));
    }

    #[test]
    fn arabic_script_is_rtl_by_default() {
        assert_eq!(default_direction(Tag::new(b"arab")), Direction::RightToLeft);
        assert_eq!(default_direction(Tag::new(b"latn")), Direction::LeftToRight);
    }
}
