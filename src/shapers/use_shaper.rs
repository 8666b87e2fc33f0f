//! Universal Shaping Engine (§4.H): groups Indic/Khmer/Myanmar-style text
//! into syllables, reorders pre-base matras ahead of their base consonant,
//! and gates the basic/presentation feature groups per syllable.
//!
//! Per spec §9's Open Question, this targets the common case precisely
//! (Devanagari, whose block layout most other Brahmic scripts mirror at a
//! consistent relative offset) rather than every USE character class —
//! the spec explicitly scopes full USE coverage as an implementer's
//! judgment call, not a hard requirement.

use crate::buffer::GlyphBuffer;
use crate::plan::FeatureMasks;
use crate::tag::Tag;

use super::ComplexShaper;

const GSUB_FEATURES: &[Tag] = &[
    Tag::new(b"locl"),
    Tag::new(b"ccmp"),
    Tag::new(b"nukt"),
    Tag::new(b"akhn"),
    Tag::new(b"rphf"),
    Tag::new(b"pref"),
    Tag::new(b"blwf"),
    Tag::new(b"abvf"),
    Tag::new(b"half"),
    Tag::new(b"pstf"),
    Tag::new(b"vatu"),
    Tag::new(b"cjct"),
    Tag::new(b"init"),
    Tag::new(b"pres"),
    Tag::new(b"abvs"),
    Tag::new(b"blws"),
    Tag::new(b"psts"),
    Tag::new(b"haln"),
    Tag::new(b"calt"),
    Tag::new(b"liga"),
];

const GATED_FEATURES: &[Tag] = &[
    Tag::new(b"nukt"),
    Tag::new(b"akhn"),
    Tag::new(b"rphf"),
    Tag::new(b"pref"),
    Tag::new(b"blwf"),
    Tag::new(b"abvf"),
    Tag::new(b"half"),
    Tag::new(b"pstf"),
    Tag::new(b"vatu"),
    Tag::new(b"cjct"),
    Tag::new(b"init"),
    Tag::new(b"pres"),
    Tag::new(b"abvs"),
    Tag::new(b"blws"),
    Tag::new(b"psts"),
    Tag::new(b"haln"),
];

const GPOS_FEATURES: &[Tag] = &[Tag::new(b"kern"), Tag::new(b"mark"), Tag::new(b"mkmk")];

/// A character's role within a USE syllable (a reduced version of the
/// USE character-classification categories — §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UseCategory {
    Consonant,
    VowelIndependent,
    /// Pre-base dependent vowel sign (e.g. Devanagari matra-i, U+093F).
    MatraPre,
    /// Above/below/post-base dependent vowel sign.
    MatraOther,
    Virama,
    Nukta,
    Other,
}

/// Classifies `cp` against the Devanagari block, then generalizes to the
/// other Brahmic blocks in [`super::USE_SCRIPTS`] by the offset each
/// block shares with Devanagari (U+0900), since most of them mirror its
/// internal layout (independent vowels, consonants, matras, virama, in
/// the same relative order).
fn classify(cp: u32) -> UseCategory {
    const BLOCK_STARTS: &[u32] = &[
        0x0900, // Devanagari
        0x0980, // Bengali
        0x0A00, // Gurmukhi
        0x0A80, // Gujarati
        0x0B00, // Oriya
        0x0B80, // Tamil
        0x0C00, // Telugu
        0x0C80, // Kannada
        0x0D00, // Malayalam
        0x0D80, // Sinhala
    ];
    let Some(&block_start) = BLOCK_STARTS.iter().find(|&&s| cp >= s && cp < s + 0x80) else {
        return match cp {
            0x1780..=0x17FF => UseCategory::Other, // Khmer: not modeled on Devanagari offsets
            0x1000..=0x109F => UseCategory::Other, // Myanmar: ditto
            0x0F00..=0x0FFF => UseCategory::Other, // Tibetan: ditto
            _ => UseCategory::Other,
        };
    };
    let offset = cp - block_start;
    match offset {
        0x05..=0x14 => UseCategory::VowelIndependent, // independent vowels
        0x15..=0x39 => UseCategory::Consonant,        // consonants
        0x3C => UseCategory::Nukta,
        0x3E => UseCategory::MatraOther, // matra AA (post-base)
        0x3F => UseCategory::MatraPre,   // matra I (pre-base) — spec S3
        0x40..=0x4C => UseCategory::MatraOther,
        0x4D => UseCategory::Virama,
        _ => UseCategory::Other,
    }
}

/// Splits `cps` into maximal syllables: each starts at a consonant or
/// independent vowel and absorbs any trailing nukta/virama-consonant
/// conjuncts and matras, per the USE syllable grammar (§4.H).
fn syllable_boundaries(cps: &[u32]) -> Vec<(usize, usize)> {
    let cats: Vec<UseCategory> = cps.iter().map(|&c| classify(c)).collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < cats.len() {
        if !matches!(cats[i], UseCategory::Consonant | UseCategory::VowelIndependent) {
            i += 1;
            continue;
        }
        let start = i;
        i += 1;
        loop {
            match cats.get(i) {
                Some(UseCategory::Nukta) => i += 1,
                Some(UseCategory::Virama) if matches!(cats.get(i + 1), Some(UseCategory::Consonant)) => {
                    i += 2;
                }
                Some(UseCategory::MatraPre | UseCategory::MatraOther) => i += 1,
                Some(UseCategory::Virama) => {
                    i += 1;
                    break;
                }
                _ => break,
            }
        }
        out.push((start, i));
    }
    out
}

pub struct UseShaper;

impl ComplexShaper for UseShaper {
    fn gsub_features(&self) -> &'static [Tag] {
        GSUB_FEATURES
    }

    fn gpos_features(&self) -> &'static [Tag] {
        GPOS_FEATURES
    }

    fn gated_features(&self) -> &'static [Tag] {
        GATED_FEATURES
    }

    fn wants_decomposed_marks(&self) -> bool {
        true
    }

    /// Groups the buffer into syllables, moves each pre-base matra ahead
    /// of its base consonant (§4.H, §8 scenario S3), and merges every
    /// syllable's glyphs onto one cluster — conjunct/matra formation
    /// inside a syllable is one logical unit for cursor/caret purposes.
    fn preprocess(&self, buffer: &mut GlyphBuffer, masks: &FeatureMasks) {
        let cps: Vec<u32> = buffer.info().iter().map(|g| g.codepoint).collect();
        let syllables = syllable_boundaries(&cps);

        let basic_bit = [
            Tag::new(b"nukt"),
            Tag::new(b"akhn"),
            Tag::new(b"rphf"),
            Tag::new(b"pref"),
            Tag::new(b"blwf"),
            Tag::new(b"abvf"),
            Tag::new(b"half"),
            Tag::new(b"pstf"),
            Tag::new(b"vatu"),
            Tag::new(b"cjct"),
        ]
        .iter()
        .fold(0u32, |acc, t| acc | masks.bit(*t));
        let presentation_bit = [
            Tag::new(b"init"),
            Tag::new(b"pres"),
            Tag::new(b"abvs"),
            Tag::new(b"blws"),
            Tag::new(b"psts"),
            Tag::new(b"haln"),
        ]
        .iter()
        .fold(0u32, |acc, t| acc | masks.bit(*t));

        // Reorder pre-base matras within each syllable before gating
        // masks, so the mask assignment below lines up with final
        // logical positions.
        for &(start, end) in syllables.iter().rev() {
            reorder_prebase_matra(buffer, start, end);
        }

        for &(start, end) in &syllables {
            for g in &mut buffer.info_mut()[start..end] {
                g.mask.0 |= basic_bit | presentation_bit;
            }
            buffer.merge_clusters(start, end);
        }
    }
}

/// Moves a pre-base matra (classified from the *original* codepoint
/// stream) to just before the syllable's base consonant. Since GSUB
/// hasn't run yet, glyph IDs still correspond 1:1 with `cps`' codepoints
/// at `[start, end)`.
fn reorder_prebase_matra(buffer: &mut GlyphBuffer, start: usize, end: usize) {
    let info = buffer.info();
    let Some(matra_pos) = (start..end).find(|&i| classify(info[i].codepoint) == UseCategory::MatraPre) else {
        return;
    };
    // Base consonant: the first consonant in the syllable (pre-base
    // matra reordering always targets the syllable's opening consonant
    // cluster, per the USE spec's regex).
    let Some(base_pos) = (start..end).find(|&i| classify(info[i].codepoint) == UseCategory::Consonant) else {
        return;
    };
    if matra_pos <= base_pos {
        return;
    }
    let matra = buffer.info()[matra_pos];
    let matra_pos_value = buffer.pos()[matra_pos];
    buffer.info_mut().copy_within(base_pos..matra_pos, base_pos + 1);
    buffer.pos_mut().copy_within(base_pos..matra_pos, base_pos + 1);
    buffer.info_mut()[base_pos] = matra;
    buffer.pos_mut()[base_pos] = matra_pos_value;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{GlyphId, UnicodeBuffer};
    use crate::plan::FeatureMasks;

    #[test]
    fn devanagari_ksi_forms_one_syllable() {
        // क्षि : क (0915) + विराम (094D) + ष (0937) + matra-i (093F)
        let cps = [0x0915u32, 0x094D, 0x0937, 0x093F];
        let syllables = syllable_boundaries(&cps);
        assert_eq!(syllables, vec![(0, 4)]);
    }

    #[test]
    fn prebase_matra_moves_before_base_consonant() {
        let mut ub = UnicodeBuffer::new();
        for (i, &cp) in [0x0915u32, 0x094D, 0x0937, 0x093F].iter().enumerate() {
            ub.add_codepoint(cp, i as u32);
        }
        let mut gb = GlyphBuffer::from_unicode(&ub, |cp| GlyphId(cp as u16));
        let masks = FeatureMasks::for_test(&[(Tag::new(b"nukt"), 2)]);
        UseShaper.preprocess(&mut gb, &masks);
        // matra-i (0x093F) must now precede the base consonant (0x0915).
        assert_eq!(gb.info()[0].glyph_id, GlyphId(0x093F));
        assert_eq!(gb.info()[1].glyph_id, GlyphId(0x0915));
        // All four glyphs share one cluster after the syllable merge.
        let cluster = gb.info()[0].cluster;
        assert!(gb.info().iter().all(|g| g.cluster == cluster));
    }
}
