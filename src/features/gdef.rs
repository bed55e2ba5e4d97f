use super::{ast::glyph_class, FeatureContext, FeatureDocument, FeatureWriter};
use crate::{
    anchor::{caret_kind, CaretKind},
    common::ot_round,
    layout::GdefClasses,
    FontbakeError,
};
use smol_str::SmolStr;
use std::collections::{BTreeSet, HashSet};

/// Writes `GlyphClassDef` and ligature carets into the GDEF table, unless
/// the feature source already provides them
pub struct GdefFeatureWriter;

fn sorted_class(glyphs: &HashSet<SmolStr>) -> String {
    if glyphs.is_empty() {
        return String::new();
    }
    let sorted: BTreeSet<&SmolStr> = glyphs.iter().collect();
    glyph_class(sorted)
}

fn glyph_class_def(classes: &GdefClasses) -> String {
    format!(
        "GlyphClassDef {}, {}, {}, {};",
        sorted_class(&classes.base),
        sorted_class(&classes.ligature),
        sorted_class(&classes.mark),
        sorted_class(&classes.component)
    )
}

fn ligature_carets(ctx: &FeatureContext) -> Vec<String> {
    let mut statements = vec![];
    for name in ctx.glyph_order.iter() {
        let Some(glyph) = ctx.font.glyphs.get(name) else {
            continue;
        };
        let mut carets = BTreeSet::new();
        for a in glyph.anchors.iter() {
            match caret_kind(&a.name) {
                Some(CaretKind::Horizontal) => carets.insert(ot_round(a.x)),
                Some(CaretKind::Vertical) => carets.insert(ot_round(a.y)),
                None => continue,
            };
        }
        if carets.is_empty() {
            continue;
        }
        let positions: Vec<String> = carets.iter().map(|c| c.to_string()).collect();
        statements.push(format!("LigatureCaretByPos {} {};", name, positions.join(" ")));
    }
    statements
}

impl FeatureWriter for GdefFeatureWriter {
    fn name(&self) -> &'static str {
        "gdef"
    }

    fn write(
        &self,
        ctx: &mut FeatureContext,
        doc: &mut FeatureDocument,
    ) -> Result<bool, FontbakeError> {
        let mut statements = vec![];
        if ctx.info.gdef_classes.is_none() {
            if let Some(classes) = GdefClasses::from_categories(&ctx.categories) {
                statements.push(glyph_class_def(&classes));
            }
        }
        if !ctx.info.has_ligature_carets {
            statements.extend(ligature_carets(ctx));
        }
        if statements.is_empty() {
            return Ok(false);
        }
        doc.append_to_table("GDEF", &statements);
        Ok(true)
    }
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use crate::{
        features::{test_helpers::*, write_features, FeatureOptions},
        glyph::GlyphCategory,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn classes_and_carets() {
        let font = font(vec![
            glyph("a", &[0x61], &[("top", 250.0, 500.0)]),
            glyph(
                "f_f_i",
                &[],
                &[("caret_2", 400.4, 0.0), ("caret_1", 200.0, 0.0), ("caret_3", 200.2, 0.0)],
            ),
            glyph("v_v", &[], &[("vcaret_1", 0.0, 350.0)]),
            glyph("B", &[0x42], &[("top", 250.0, 700.0)]),
            glyph("acutecomb", &[0x301], &[]),
        ]);
        let fea = write_features(&font, FeatureOptions::default()).expect("writes");
        let gdef = &fea[fea.find("table GDEF").expect("GDEF written")..];
        assert_eq!(
            gdef,
            "table GDEF {\n    GlyphClassDef [B a], [f_f_i v_v], [acutecomb], ;\n    \
             LigatureCaretByPos f_f_i 200 400;\n    LigatureCaretByPos v_v 350;\n} GDEF;\n"
        );
    }

    #[test]
    fn explicit_categories_are_used() {
        let mut font = font(vec![glyph("A", &[0x41], &[]), glyph("B_C", &[], &[])]);
        font.lib.opentype_categories.insert("B_C".into(), GlyphCategory::Ligature);
        font.lib.opentype_categories.insert("A".into(), GlyphCategory::Component);
        let fea = write_features(&font, FeatureOptions::default()).expect("writes");
        assert!(fea.contains("GlyphClassDef , [B_C], , [A];"), "{}", fea);
    }

    #[test]
    fn existing_definitions_win() {
        let mut font = font(vec![
            glyph("a", &[0x61], &[("top", 250.0, 500.0)]),
            glyph("f_i", &[], &[("caret_1", 200.0, 0.0)]),
        ]);
        font.features =
            "table GDEF {\n    GlyphClassDef [a], , , ;\n    LigatureCaretByPos f_i 250;\n} GDEF;\n"
                .to_string();
        let fea = write_features(&font, FeatureOptions::default()).expect("writes");
        assert_eq!(fea, font.features);
    }

    #[test]
    fn nothing_known_nothing_written() {
        let font = font(vec![glyph("space", &[0x20], &[])]);
        let fea = write_features(&font, FeatureOptions::default()).expect("writes");
        assert_eq!(fea, "");
    }
}
