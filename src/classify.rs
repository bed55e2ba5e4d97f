use crate::{
    anchor::MARK_PREFIX,
    font::Font,
    glyph::{Glyph, GlyphCategory, GlyphSet},
    unicode::is_combining_mark,
};
use indexmap::IndexMap;
use smol_str::SmolStr;

fn has_attaching_anchor(glyph: &Glyph) -> bool {
    glyph
        .anchors
        .iter()
        .any(|a| !a.name.is_empty() && !a.name.starts_with(MARK_PREFIX))
}

/// The category and subcategory hints of a glyph, inferred from its
/// codepoints and name when the glyph doesn't carry them.
fn hints(glyph: &Glyph) -> (Option<String>, Option<String>) {
    if glyph.category.is_some() || glyph.subcategory.is_some() {
        return (glyph.category.clone(), glyph.subcategory.clone());
    }
    if glyph.codepoints.iter().any(|&cp| is_combining_mark(cp)) || glyph.name.ends_with("comb") {
        return (Some("Mark".to_string()), Some("Nonspacing".to_string()));
    }
    if glyph.name.contains('_') && !glyph.name.starts_with('_') {
        return (Some("Letter".to_string()), Some("Ligature".to_string()));
    }
    (None, None)
}

fn derive(glyph: &Glyph) -> GlyphCategory {
    let (category, subcategory) = hints(glyph);
    let attaching = has_attaching_anchor(glyph);
    if subcategory.as_deref() == Some("Ligature") && attaching {
        GlyphCategory::Ligature
    } else if category.as_deref() == Some("Mark")
        && matches!(
            subcategory.as_deref(),
            Some("Nonspacing") | Some("Spacing Combining")
        )
    {
        GlyphCategory::Mark
    } else if attaching {
        GlyphCategory::Base
    } else {
        GlyphCategory::Unassigned
    }
}

/// Work out the GDEF class of every glyph. Explicit overrides win over
/// anything derived; `component` only ever comes from an override.
pub fn classify(
    glyphs: &GlyphSet,
    overrides: &IndexMap<SmolStr, GlyphCategory>,
) -> IndexMap<SmolStr, GlyphCategory> {
    glyphs
        .values()
        .map(|glyph| {
            let category = overrides
                .get(&glyph.name)
                .copied()
                .unwrap_or_else(|| derive(glyph));
            (glyph.name.clone(), category)
        })
        .collect()
}

impl Font {
    /// GDEF classes for the whole font
    pub fn categories(&self) -> IndexMap<SmolStr, GlyphCategory> {
        classify(&self.glyphs, &self.explicit_categories())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Anchor;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn glyph(name: &str, anchors: &[&str]) -> Glyph {
        Glyph {
            anchors: anchors.iter().map(|a| Anchor::new(*a, 0.0, 0.0)).collect(),
            ..Glyph::new(name)
        }
    }

    #[rstest]
    #[case(glyph("A", &["top"]), GlyphCategory::Base)]
    #[case(glyph("space", &[]), GlyphCategory::Unassigned)]
    #[case(glyph("acutecomb", &["_top"]), GlyphCategory::Mark)]
    #[case(glyph("acutecomb", &[]), GlyphCategory::Mark)]
    #[case(glyph("f_i", &["top_1", "top_2"]), GlyphCategory::Ligature)]
    #[case(glyph("f_i", &[]), GlyphCategory::Unassigned)]
    #[case(glyph("_part", &["top"]), GlyphCategory::Base)]
    fn derived_categories(#[case] glyph: Glyph, #[case] expected: GlyphCategory) {
        let glyphs: GlyphSet = [glyph.clone()].into_iter().collect();
        let classes = classify(&glyphs, &IndexMap::new());
        assert_eq!(classes.get(&glyph.name), Some(&expected));
    }

    #[test]
    fn spacing_combining_marks() {
        let mut g = glyph("dvVowelSignAA", &["_top"]);
        g.category = Some("Mark".to_string());
        g.subcategory = Some("Spacing Combining".to_string());
        let glyphs: GlyphSet = [g].into_iter().collect();
        let classes = classify(&glyphs, &IndexMap::new());
        assert_eq!(classes.get("dvVowelSignAA"), Some(&GlyphCategory::Mark));
    }

    #[test]
    fn overrides_win() {
        let glyphs: GlyphSet = [glyph("A", &["top"]), glyph("ringcomb", &["_top"])]
            .into_iter()
            .collect();
        let mut overrides = IndexMap::new();
        overrides.insert(SmolStr::new("A"), GlyphCategory::Component);
        let classes = classify(&glyphs, &overrides);
        assert_eq!(classes.get("A"), Some(&GlyphCategory::Component));
        assert_eq!(classes.get("ringcomb"), Some(&GlyphCategory::Mark));
    }
}
