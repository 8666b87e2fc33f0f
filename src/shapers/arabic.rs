//! Arabic shaper (§4.H): assigns a joining form (isol/init/medi/fina) to
//! every glyph via the standard joining-type state machine over
//! `U+0600..U+06FF` plus the common Persian/Urdu extensions, then gates
//! the matching GSUB feature bit per glyph.

use crate::buffer::GlyphBuffer;
use crate::plan::FeatureMasks;
use crate::tag::Tag;

use super::ComplexShaper;

const GSUB_FEATURES: &[Tag] = &[
    Tag::new(b"ccmp"),
    Tag::new(b"locl"),
    Tag::new(b"isol"),
    Tag::new(b"fina"),
    Tag::new(b"medi"),
    Tag::new(b"init"),
    Tag::new(b"rlig"),
    Tag::new(b"calt"),
    Tag::new(b"liga"),
    Tag::new(b"clig"),
];

const GATED_FEATURES: &[Tag] =
    &[Tag::new(b"isol"), Tag::new(b"fina"), Tag::new(b"medi"), Tag::new(b"init")];

const GPOS_FEATURES: &[Tag] = &[Tag::new(b"kern"), Tag::new(b"mark"), Tag::new(b"mkmk")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoiningType {
    NonJoining,
    RightJoining,
    LeftJoining,
    DualJoining,
    JoinCausing,
    Transparent,
}

impl JoiningType {
    fn joins_prev(self) -> bool {
        matches!(self, JoiningType::RightJoining | JoiningType::DualJoining | JoiningType::JoinCausing)
    }

    fn joins_next(self) -> bool {
        matches!(self, JoiningType::LeftJoining | JoiningType::DualJoining | JoiningType::JoinCausing)
    }
}

/// Joining type of one codepoint, per the Unicode `ArabicShaping.txt`
/// classification (a representative subset covering core Arabic plus
/// common Persian/Urdu/Sindhi letters, per §4.H's scope).
fn joining_type(cp: u32) -> JoiningType {
    use JoiningType::*;
    match cp {
        // Tatweel and ZWJ: join-causing, invisible connectors.
        0x0640 => JoinCausing,
        0x200D => JoinCausing,
        // Right-joining only: alef family, dal/thal, reh/zain, waw family,
        // alef maksura.
        0x0622 | 0x0623 | 0x0625 | 0x0627 | 0x0629 | 0x0649 => RightJoining,
        0x062F | 0x0630 | 0x0631 | 0x0632 | 0x0624 | 0x0698 | 0x0688 | 0x0691 => RightJoining,
        0x06C0 | 0x06C3 | 0x06D5 | 0x06CD | 0x06D2 | 0x06D3 => RightJoining,
        0x0621 => NonJoining, // hamza
        // Dual-joining: the bulk of the Arabic alphabet.
        0x0626 | 0x0628 | 0x062A | 0x062B | 0x062C | 0x062D | 0x062E => DualJoining,
        0x0633 | 0x0634 | 0x0635 | 0x0636 | 0x0637 | 0x0638 => DualJoining,
        0x0639 | 0x063A => DualJoining,
        0x0641 | 0x0642 | 0x0643 | 0x0644 | 0x0645 | 0x0646 | 0x0647 | 0x0648 | 0x064A => DualJoining,
        // Persian/Urdu additions (all dual-joining).
        0x067E | 0x0686 | 0x06A9 | 0x06AF | 0x06CC | 0x06D0 | 0x0679 | 0x067C | 0x0683
        | 0x0684 | 0x0687 | 0x0685 | 0x06A6 | 0x06A4 | 0x06BA | 0x06BB | 0x06BE | 0x06C1
        | 0x06C2 => DualJoining,
        // Combining marks and most Arabic diacritics are transparent: they
        // never break a joining chain.
        0x0610..=0x061A | 0x064B..=0x065F | 0x0670 | 0x06D6..=0x06ED => Transparent,
        _ => NonJoining,
    }
}

pub struct ArabicShaper;

impl ComplexShaper for ArabicShaper {
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

    /// Assigns isol/init/medi/fina per the standard joining algorithm
    /// (§4.H, §8 scenario S2): for each non-transparent glyph, look at
    /// the nearest non-transparent neighbor on each side; the glyph joins
    /// that neighbor only if both sides agree to connect.
    fn preprocess(&self, buffer: &mut GlyphBuffer, masks: &FeatureMasks) {
        let n = buffer.info().len();
        let types: Vec<JoiningType> = buffer.info().iter().map(|g| joining_type(g.codepoint)).collect();

        let prev_non_transparent = |from: usize| -> Option<usize> {
            (0..from).rev().find(|&i| types[i] != JoiningType::Transparent)
        };
        let next_non_transparent = |from: usize| -> Option<usize> {
            (from + 1..n).find(|&i| types[i] != JoiningType::Transparent)
        };

        let isol = masks.bit(Tag::new(b"isol"));
        let init = masks.bit(Tag::new(b"init"));
        let medi = masks.bit(Tag::new(b"medi"));
        let fina = masks.bit(Tag::new(b"fina"));

        for i in 0..n {
            let ty = types[i];
            if ty == JoiningType::Transparent || ty == JoiningType::JoinCausing {
                continue;
            }

            let connects_prev = ty.joins_prev()
                && prev_non_transparent(i).map(|p| types[p].joins_next()).unwrap_or(false);
            let connects_next = ty.joins_next()
                && next_non_transparent(i).map(|nx| types[nx].joins_prev()).unwrap_or(false);

            let bit = match (connects_prev, connects_next) {
                (true, true) => medi,
                (true, false) => fina,
                (false, true) => init,
                (false, false) => isol,
            };
            buffer.info_mut()[i].mask.0 |= bit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::UnicodeBuffer;
    use crate::plan::FeatureMasks;

    fn make_masks() -> FeatureMasks {
        FeatureMasks::for_test(&[
            (Tag::new(b"isol"), 2),
            (Tag::new(b"init"), 4),
            (Tag::new(b"medi"), 8),
            (Tag::new(b"fina"), 16),
        ])
    }

    #[test]
    fn marhaba_gets_expected_joining_forms() {
        // م ر ح ب ا  (U+0645 U+0631 U+062D U+0628 U+0627)
        let mut ub = UnicodeBuffer::new();
        for (i, cp) in [0x0645u32, 0x0631, 0x062D, 0x0628, 0x0627].iter().enumerate() {
            ub.add_codepoint(*cp, i as u32);
        }
        let mut gb = GlyphBuffer::from_unicode(&ub, |cp| crate::buffer::GlyphId(cp as u16));
        let masks = make_masks();
        let shaper = ArabicShaper;
        shaper.preprocess(&mut gb, &masks);

        // م: dual-joining, no predecessor -> init
        assert_eq!(gb.info()[0].mask.0 & masks.bit(Tag::new(b"init")), masks.bit(Tag::new(b"init")));
        // ر: right-joining only, has predecessor that joins -> fina
        assert_eq!(gb.info()[1].mask.0 & masks.bit(Tag::new(b"fina")), masks.bit(Tag::new(b"fina")));
        // ح: dual-joining but prev (ر) can't join_next -> init
        assert_eq!(gb.info()[2].mask.0 & masks.bit(Tag::new(b"init")), masks.bit(Tag::new(b"init")));
        // ب: dual-joining, both neighbors connect -> medi
        assert_eq!(gb.info()[3].mask.0 & masks.bit(Tag::new(b"medi")), masks.bit(Tag::new(b"medi")));
        // ا: right-joining, prev connects, no next -> fina
        assert_eq!(gb.info()[4].mask.0 & masks.bit(Tag::new(b"fina")), masks.bit(Tag::new(b"fina")));
    }
}
