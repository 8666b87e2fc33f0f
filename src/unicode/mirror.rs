//! Bidi-mirroring table (§4.E.4): the glyph substitution applied to
//! codepoints at an odd embedding level so paired punctuation (brackets,
//! guillemets, angle brackets) visually points the right way in RTL runs.

pub fn mirror(codepoint: u32) -> u32 {
    let Some(c) = char::from_u32(codepoint) else { return codepoint };
    let mirrored = match c {
        '(' => ')',
        ')' => '(',
        '[' => ']',
        ']' => '[',
        '{' => '}',
        '}' => '{',
        '<' => '>',
        '>' => '<',
        '«' => '»',
        '»' => '«',
        '‹' => '›',
        '›' => '‹',
        '⁅' => '⁆',
        '⁆' => '⁅',
        '⟨' => '⟩',
        '⟩' => '⟨',
        '⟪' => '⟫',
        '⟫' => '⟪',
        '⟬' => '⟭',
        '⟭' => '⟬',
        '⟮' => '⟯',
        '⟯' => '⟮',
        '≤' => '≥',
        '≥' => '≤',
        '≦' => '≧',
        '≧' => '≦',
        '⊂' => '⊃',
        '⊃' => '⊂',
        '⊆' => '⊇',
        '⊇' => '⊆',
        '｢' => '｣',
        '｣' => '｢',
        other => other,
    };
    mirrored as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_brackets_both_ways() {
        assert_eq!(mirror('(' as u32), ')' as u32);
        assert_eq!(mirror(')' as u32), '(' as u32);
    }

    #[test]
    fn leaves_unpaired_codepoints_unchanged() {
        assert_eq!(mirror('A' as u32), 'A' as u32);
    }
}
