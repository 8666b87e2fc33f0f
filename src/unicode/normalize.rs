//! Canonical decomposition/composition and combining-class reordering
//! (§4.E points 1-2).
//!
//! The decomposition/composition table is intentionally small — Latin-1,
//! Latin Extended-A, common Vietnamese, Greek, and a handful of Cyrillic
//! precomposed letters — per the Open Question in spec §9: composition
//! coverage outside Latin is incomplete by design, since shaping only
//! needs decomposition to expose combining marks to GSUB/GPOS, not full
//! Unicode NFC conformance.

use crate::buffer::{CodepointInfo, UnicodeBuffer};

/// Normalization mode requested on a [`UnicodeBuffer`] before shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizeMode {
    /// No decomposition or composition; only combining-class reordering.
    None,
    /// Canonical decomposition (NFD-like) followed by reordering.
    Decompose,
    /// Decomposition, reordering, then recomposition where the table has
    /// an entry (NFC-like).
    Compose,
    /// Defers to the run's script: scripts whose shaper wants isolated
    /// marks (the default/USE shapers) get `Decompose`; everything else
    /// gets `Compose`. HarfBuzz makes the same call per-shaper.
    #[default]
    Auto,
}

/// One precomposed codepoint and its canonical decomposition.
struct Decomp {
    precomposed: u32,
    base: u32,
    marks: &'static [u32],
}

/// A deliberately small, hand-picked decomposition table (§4.E.1, §9).
static DECOMPOSITIONS: &[Decomp] = &[
    // Latin-1 Supplement, single combining mark over a Latin base.
    Decomp { precomposed: 0x00C0, base: b'A' as u32, marks: &[0x0300] }, // À
    Decomp { precomposed: 0x00C1, base: b'A' as u32, marks: &[0x0301] }, // Á
    Decomp { precomposed: 0x00C2, base: b'A' as u32, marks: &[0x0302] }, // Â
    Decomp { precomposed: 0x00C3, base: b'A' as u32, marks: &[0x0303] }, // Ã
    Decomp { precomposed: 0x00C4, base: b'A' as u32, marks: &[0x0308] }, // Ä
    Decomp { precomposed: 0x00C5, base: b'A' as u32, marks: &[0x030A] }, // Å
    Decomp { precomposed: 0x00C7, base: b'C' as u32, marks: &[0x0327] }, // Ç
    Decomp { precomposed: 0x00C8, base: b'E' as u32, marks: &[0x0300] }, // È
    Decomp { precomposed: 0x00C9, base: b'E' as u32, marks: &[0x0301] }, // É
    Decomp { precomposed: 0x00CA, base: b'E' as u32, marks: &[0x0302] }, // Ê
    Decomp { precomposed: 0x00CB, base: b'E' as u32, marks: &[0x0308] }, // Ë
    Decomp { precomposed: 0x00CC, base: b'I' as u32, marks: &[0x0300] }, // Ì
    Decomp { precomposed: 0x00CD, base: b'I' as u32, marks: &[0x0301] }, // Í
    Decomp { precomposed: 0x00CE, base: b'I' as u32, marks: &[0x0302] }, // Î
    Decomp { precomposed: 0x00CF, base: b'I' as u32, marks: &[0x0308] }, // Ï
    Decomp { precomposed: 0x00D1, base: b'N' as u32, marks: &[0x0303] }, // Ñ
    Decomp { precomposed: 0x00D2, base: b'O' as u32, marks: &[0x0300] }, // Ò
    Decomp { precomposed: 0x00D3, base: b'O' as u32, marks: &[0x0301] }, // Ó
    Decomp { precomposed: 0x00D4, base: b'O' as u32, marks: &[0x0302] }, // Ô
    Decomp { precomposed: 0x00D5, base: b'O' as u32, marks: &[0x0303] }, // Õ
    Decomp { precomposed: 0x00D6, base: b'O' as u32, marks: &[0x0308] }, // Ö
    Decomp { precomposed: 0x00D9, base: b'U' as u32, marks: &[0x0300] }, // Ù
    Decomp { precomposed: 0x00DA, base: b'U' as u32, marks: &[0x0301] }, // Ú
    Decomp { precomposed: 0x00DB, base: b'U' as u32, marks: &[0x0302] }, // Û
    Decomp { precomposed: 0x00DC, base: b'U' as u32, marks: &[0x0308] }, // Ü
    Decomp { precomposed: 0x00DD, base: b'Y' as u32, marks: &[0x0301] }, // Ý
    Decomp { precomposed: 0x00E0, base: b'a' as u32, marks: &[0x0300] }, // à
    Decomp { precomposed: 0x00E1, base: b'a' as u32, marks: &[0x0301] }, // á
    Decomp { precomposed: 0x00E2, base: b'a' as u32, marks: &[0x0302] }, // â
    Decomp { precomposed: 0x00E3, base: b'a' as u32, marks: &[0x0303] }, // ã
    Decomp { precomposed: 0x00E4, base: b'a' as u32, marks: &[0x0308] }, // ä
    Decomp { precomposed: 0x00E5, base: b'a' as u32, marks: &[0x030A] }, // å
    Decomp { precomposed: 0x00E7, base: b'c' as u32, marks: &[0x0327] }, // ç
    Decomp { precomposed: 0x00E8, base: b'e' as u32, marks: &[0x0300] }, // è
    Decomp { precomposed: 0x00E9, base: b'e' as u32, marks: &[0x0301] }, // é
    Decomp { precomposed: 0x00EA, base: b'e' as u32, marks: &[0x0302] }, // ê
    Decomp { precomposed: 0x00EB, base: b'e' as u32, marks: &[0x0308] }, // ë
    Decomp { precomposed: 0x00EC, base: b'i' as u32, marks: &[0x0300] }, // ì
    Decomp { precomposed: 0x00ED, base: b'i' as u32, marks: &[0x0301] }, // í
    Decomp { precomposed: 0x00EE, base: b'i' as u32, marks: &[0x0302] }, // î
    Decomp { precomposed: 0x00EF, base: b'i' as u32, marks: &[0x0308] }, // ï
    Decomp { precomposed: 0x00F1, base: b'n' as u32, marks: &[0x0303] }, // ñ
    Decomp { precomposed: 0x00F2, base: b'o' as u32, marks: &[0x0300] }, // ò
    Decomp { precomposed: 0x00F3, base: b'o' as u32, marks: &[0x0301] }, // ó
    Decomp { precomposed: 0x00F4, base: b'o' as u32, marks: &[0x0302] }, // ô
    Decomp { precomposed: 0x00F5, base: b'o' as u32, marks: &[0x0303] }, // õ
    Decomp { precomposed: 0x00F6, base: b'o' as u32, marks: &[0x0308] }, // ö
    Decomp { precomposed: 0x00F9, base: b'u' as u32, marks: &[0x0300] }, // ù
    Decomp { precomposed: 0x00FA, base: b'u' as u32, marks: &[0x0301] }, // ú
    Decomp { precomposed: 0x00FB, base: b'u' as u32, marks: &[0x0302] }, // û
    Decomp { precomposed: 0x00FC, base: b'u' as u32, marks: &[0x0308] }, // ü
    Decomp { precomposed: 0x00FD, base: b'y' as u32, marks: &[0x0301] }, // ý
    Decomp { precomposed: 0x00FF, base: b'y' as u32, marks: &[0x0308] }, // ÿ
    // Latin Extended-A (subset).
    Decomp { precomposed: 0x0100, base: b'A' as u32, marks: &[0x0304] }, // Ā
    Decomp { precomposed: 0x0101, base: b'a' as u32, marks: &[0x0304] }, // ā
    Decomp { precomposed: 0x0102, base: b'A' as u32, marks: &[0x0306] }, // Ă
    Decomp { precomposed: 0x0103, base: b'a' as u32, marks: &[0x0306] }, // ă
    Decomp { precomposed: 0x0106, base: b'C' as u32, marks: &[0x0301] }, // Ć
    Decomp { precomposed: 0x0107, base: b'c' as u32, marks: &[0x0301] }, // ć
    Decomp { precomposed: 0x011A, base: b'E' as u32, marks: &[0x030C] }, // Ě
    Decomp { precomposed: 0x011B, base: b'e' as u32, marks: &[0x030C] }, // ě
    // Vietnamese: base Latin-1 vowel plus circumflex/breve plus a tone mark.
    Decomp { precomposed: 0x1EA5, base: 0x00E2, marks: &[0x0301] }, // ấ = â + acute
    Decomp { precomposed: 0x1EA7, base: 0x00E2, marks: &[0x0300] }, // ầ = â + grave
    Decomp { precomposed: 0x1EA9, base: 0x00E2, marks: &[0x0309] }, // ẩ = â + hook above
    Decomp { precomposed: 0x1EAB, base: 0x00E2, marks: &[0x0303] }, // ẫ = â + tilde
    Decomp { precomposed: 0x1EAD, base: 0x00E2, marks: &[0x0323] }, // ậ = â + dot below
    Decomp { precomposed: 0x1EAF, base: 0x0103, marks: &[0x0301] }, // ắ = ă + acute
    Decomp { precomposed: 0x1EB1, base: 0x0103, marks: &[0x0300] }, // ằ = ă + grave
    Decomp { precomposed: 0x1EC1, base: 0x00EA, marks: &[0x0300] }, // ề = ê + grave
    Decomp { precomposed: 0x1EBF, base: 0x00EA, marks: &[0x0301] }, // ế = ê + acute
    Decomp { precomposed: 0x1ECB, base: b'i' as u32, marks: &[0x0323] }, // ị = i + dot below
    Decomp { precomposed: 0x1ECD, base: b'o' as u32, marks: &[0x0323] }, // ọ = o + dot below
    Decomp { precomposed: 0x1EE5, base: b'u' as u32, marks: &[0x0323] }, // ụ = u + dot below
    // Greek (tonos/dialytika).
    Decomp { precomposed: 0x0386, base: 0x0391, marks: &[0x0301] }, // Ά
    Decomp { precomposed: 0x0388, base: 0x0395, marks: &[0x0301] }, // Έ
    Decomp { precomposed: 0x0390, base: 0x03CA, marks: &[0x0301] }, // ΐ
    Decomp { precomposed: 0x03AC, base: 0x03B1, marks: &[0x0301] }, // ά
    Decomp { precomposed: 0x03AD, base: 0x03B5, marks: &[0x0301] }, // έ
    Decomp { precomposed: 0x03CA, base: 0x03B9, marks: &[0x0308] }, // ϊ
    // Cyrillic (common diaereses).
    Decomp { precomposed: 0x0401, base: 0x0415, marks: &[0x0308] }, // Ё
    Decomp { precomposed: 0x0451, base: 0x0435, marks: &[0x0308] }, // ё
    Decomp { precomposed: 0x0407, base: 0x0406, marks: &[0x0308] }, // Ї
    Decomp { precomposed: 0x0457, base: 0x0456, marks: &[0x0308] }, // ї
];

fn find_decomp(cp: u32) -> Option<&'static Decomp> {
    DECOMPOSITIONS.iter().find(|d| d.precomposed == cp)
}

/// Recursively expands `cp` into its fully-decomposed sequence, pushing
/// onto `out`. Bases that are themselves precomposed (e.g. Vietnamese
/// `ê` + grave) are decomposed first so every mark ends up isolated.
fn decompose_into(cp: u32, out: &mut Vec<u32>) {
    match find_decomp(cp) {
        Some(d) => {
            decompose_into(d.base, out);
            out.extend_from_slice(d.marks);
        }
        None => out.push(cp),
    }
}

/// Canonical combining class (ccc) for a codepoint, per UAX #15. Covers
/// the ranges spec §4.E.2 names explicitly; anything else is ccc 0
/// (a starter, which always terminates a mark cluster).
pub fn combining_class(cp: u32) -> u8 {
    match cp {
        // Combining Diacritical Marks (Latin overlay/above/below marks).
        0x0300..=0x0314 => 230,
        0x0315 => 232,
        0x0316 | 0x0317 => 220,
        0x0318 | 0x0319 => 220,
        0x031A => 232,
        0x031B => 216,
        0x031C..=0x0320 => 220,
        0x0321 | 0x0322 => 202,
        0x0323 => 220,
        0x0324..=0x0326 => 220,
        0x0327 | 0x0328 => 202,
        0x0329..=0x0333 => 220,
        0x0334..=0x0338 => 1,
        0x0339..=0x033C => 220,
        0x033D..=0x0344 => 230,
        0x0345 => 240, // iota subscript
        0x0346 => 230,
        0x0347..=0x0349 => 220,
        0x034A..=0x034C => 230,
        0x034D | 0x034E => 220,
        0x0350..=0x0352 => 230,
        0x0353..=0x0356 => 220,
        0x0357 => 230,
        0x0358 => 232,
        0x0359 | 0x035A => 220,
        0x035B => 230,
        // Hebrew points.
        0x0591..=0x05A1 => 220,
        0x05A2..=0x05AF => 220,
        0x05B0 => 10,
        0x05B1 => 11,
        0x05B2 => 12,
        0x05B3 => 13,
        0x05B4 => 14,
        0x05B5 => 15,
        0x05B6 => 16,
        0x05B7 => 17,
        0x05B8 => 18,
        0x05B9 | 0x05BA => 19,
        0x05BB => 20,
        0x05BC => 21,
        0x05BD => 22,
        0x05BF => 23,
        0x05C1 => 24,
        0x05C2 => 25,
        0x05C4 => 230,
        // Arabic marks.
        0x0610..=0x061A => 230,
        0x064B => 27,
        0x064C => 28,
        0x064D => 29,
        0x064E => 30,
        0x064F => 31,
        0x0650 => 32,
        0x0651 => 33, // shadda
        0x0652 => 34, // sukun
        0x0653..=0x0655 => 230,
        0x0656..=0x065C => 220,
        0x0670 => 35,
        0x06D6..=0x06DC => 230,
        0x06DF..=0x06E4 => 230,
        0x06E7 | 0x06E8 => 230,
        0x06EA => 220,
        0x06EB | 0x06EC => 230,
        0x06ED => 220,
        // Devanagari and other Indic viramas/nuktas (virama = ccc 9,
        // nukta = ccc 7, vowel signs above/below follow their own classes
        // but default to 0 here since matra reordering is syllable-driven,
        // not ccc-driven, per the USE shaper).
        0x093C => 7,   // nukta
        0x094D => 9,   // virama
        0x09BC => 7,
        0x09CD => 9,
        0x0A3C => 7,
        0x0A4D => 9,
        0x0ABC => 7,
        0x0ACD => 9,
        0x0B3C => 7,
        0x0B4D => 9,
        0x0BCD => 9,
        0x0C4D => 9,
        0x0CBC => 7,
        0x0CCD => 9,
        0x0D3B | 0x0D3C => 9,
        0x0D4D => 9,
        // Thai/Lao tone marks and vowel signs above.
        0x0E38..=0x0E3A => 103,
        0x0E48..=0x0E4B => 107,
        0x0E4C..=0x0E4E => 0,
        0x0EB8 | 0x0EB9 => 118,
        0x0EC8..=0x0ECB => 122,
        // Tibetan.
        0x0F18 | 0x0F19 => 220,
        0x0F35 => 220,
        0x0F37 => 220,
        0x0F39 => 216,
        0x0F71 => 129,
        0x0F72 => 130,
        0x0F74 => 132,
        0x0F7A..=0x0F7D => 130,
        0x0F80 => 130,
        0x0F82 | 0x0F83 => 230,
        0x0F84 => 9,
        0x0F86 | 0x0F87 => 230,
        // Hangul jamo (tone marks, very rare in practice).
        0x302E | 0x302F => 216,
        // Kana voicing marks (combining, not precomposed).
        0x3099 => 8,
        0x309A => 8,
        // Combining Diacritical Marks for Symbols (CDMS) and combining
        // half marks, both "above" class by default.
        0x20D0..=0x20DC => 230,
        0x20E1 => 230,
        0xFE20..=0xFE2F => 230,
        _ => 0,
    }
}

/// Stable adjacent-swap sort of each maximal run of nonzero-ccc
/// codepoints so combining classes are non-decreasing within the run
/// (§4.E.2). A ccc-0 codepoint always starts a new cluster/run boundary.
pub fn reorder_marks(codepoints: &mut [CodepointInfo]) {
    if codepoints.len() < 2 {
        return;
    }
    let mut i = 0;
    while i < codepoints.len() {
        if combining_class(codepoints[i].codepoint) == 0 {
            i += 1;
            continue;
        }
        let start = i;
        while i < codepoints.len() && combining_class(codepoints[i].codepoint) != 0 {
            i += 1;
        }
        bubble_sort_stable(&mut codepoints[start..i]);
    }
}

fn bubble_sort_stable(run: &mut [CodepointInfo]) {
    let n = run.len();
    for a in 0..n {
        for b in 0..n - 1 - a {
            let cb = combining_class(run[b].codepoint);
            let cb1 = combining_class(run[b + 1].codepoint);
            if cb > cb1 {
                run.swap(b, b + 1);
            }
        }
    }
}

/// Canonical decomposition: every precomposed codepoint in `buffer` is
/// replaced by its fully-decomposed sequence, preserving the original
/// cluster on every produced codepoint (decomposition never loses the
/// mapping back to the input offset).
fn decompose(buffer: &mut UnicodeBuffer) {
    let mut out = Vec::with_capacity(buffer.codepoints.len());
    let mut scratch = Vec::new();
    for info in &buffer.codepoints {
        scratch.clear();
        decompose_into(info.codepoint, &mut scratch);
        for &cp in &scratch {
            out.push(CodepointInfo { codepoint: cp, cluster: info.cluster });
        }
    }
    buffer.codepoints = out;
}

/// Attempts canonical composition of `base` + `mark` into one codepoint.
/// Per §9's Open Question, this table is intentionally Latin-heavy.
fn compose_pair(base: u32, mark: u32) -> Option<u32> {
    DECOMPOSITIONS
        .iter()
        .find(|d| d.base == base && d.marks == [mark])
        .map(|d| d.precomposed)
}

/// Composition: after decomposing and reordering, re-merges a base with an
/// immediately-following mark if the table has an entry and no
/// intervening mark has combining class ≥ the candidate's (the canonical
/// ordering precondition in §4.E.1).
fn compose(buffer: &mut UnicodeBuffer) {
    decompose(buffer);
    reorder_marks(&mut buffer.codepoints);

    let mut out: Vec<CodepointInfo> = Vec::with_capacity(buffer.codepoints.len());
    let mut last_ccc_blocking = 0u8;
    for info in buffer.codepoints.drain(..) {
        let ccc = combining_class(info.codepoint);
        if ccc != 0 {
            if let Some(prev) = out.last_mut() {
                let prev_ccc = combining_class(prev.codepoint);
                if prev_ccc == 0 && last_ccc_blocking == 0 {
                    if let Some(composed) = compose_pair(prev.codepoint, info.codepoint) {
                        prev.codepoint = composed;
                        continue;
                    }
                }
            }
            last_ccc_blocking = ccc;
        } else {
            last_ccc_blocking = 0;
        }
        out.push(info);
    }
    buffer.codepoints = out;
}

/// Applies `mode` to `buffer`, resolving `Auto` against `script` (complex
/// shapers that need isolated marks — Arabic, USE scripts — get
/// `Decompose`; everything else gets `Compose`, matching HarfBuzz's
/// per-shaper default).
pub fn normalize(mode: NormalizeMode, script: crate::tag::Tag, buffer: &mut UnicodeBuffer) {
    let resolved = match mode {
        NormalizeMode::Auto => {
            if crate::shapers::wants_decomposed_marks(script) {
                NormalizeMode::Decompose
            } else {
                NormalizeMode::Compose
            }
        }
        other => other,
    };

    match resolved {
        NormalizeMode::None => reorder_marks(&mut buffer.codepoints),
        NormalizeMode::Decompose => {
            decompose(buffer);
            reorder_marks(&mut buffer.codepoints);
        }
        NormalizeMode::Compose => compose(buffer),
        NormalizeMode::Auto => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;

    fn buf(text: &str) -> UnicodeBuffer {
        let mut b = UnicodeBuffer::new();
        b.add_string(text);
        b
    }

    #[test]
    fn decomposes_precomposed_latin() {
        let mut b = buf("\u{00E9}"); // é
        decompose(&mut b);
        assert_eq!(b.codepoints.len(), 2);
        assert_eq!(b.codepoints[0].codepoint, 'e' as u32);
        assert_eq!(b.codepoints[1].codepoint, 0x0301);
    }

    #[test]
    fn decompose_is_idempotent() {
        let mut b = buf("\u{00E9}a\u{0301}");
        decompose(&mut b);
        let once = b.codepoints.clone();
        decompose(&mut b);
        assert_eq!(b.codepoints, once);
    }

    #[test]
    fn reorders_out_of_order_combining_classes() {
        // U+0327 (cedilla, ccc 202) after U+0301 (acute, ccc 230) must
        // swap to put the lower ccc first.
        let mut b = buf("c\u{0301}\u{0327}");
        reorder_marks(&mut b.codepoints);
        assert_eq!(b.codepoints[1].codepoint, 0x0327);
        assert_eq!(b.codepoints[2].codepoint, 0x0301);
    }

    #[test]
    fn compose_recombines_decomposed_pair() {
        let mut b = buf("e\u{0301}");
        compose(&mut b);
        assert_eq!(b.codepoints.len(), 1);
        assert_eq!(b.codepoints[0].codepoint, 0x00E9);
    }

    #[test]
    fn composition_blocked_by_intervening_mark() {
        // e + cedilla(202) + acute(230): cedilla doesn't compose with e,
        // so acute must not compose across it either once ccc blocks.
        let mut b = buf("e\u{0327}\u{0301}");
        compose(&mut b);
        assert!(b.codepoints.iter().any(|c| c.codepoint == 0x0301));
    }

    #[test]
    fn auto_mode_decomposes_for_arabic() {
        let mut b = buf("e\u{0301}");
        normalize(NormalizeMode::Auto, Tag::new(b"arab"), &mut b);
        assert_eq!(b.codepoints.len(), 2);
    }

    #[test]
    fn auto_mode_composes_for_latin() {
        let mut b = buf("e\u{0301}");
        normalize(NormalizeMode::Auto, Tag::new(b"latn"), &mut b);
        assert_eq!(b.codepoints.len(), 1);
        assert_eq!(b.codepoints[0].codepoint, 0x00E9);
    }
}
