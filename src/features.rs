//! Generating layout feature code from the glyph data of a font.
//!
//! Each writer looks at the font and at the feature code the font already
//! has, and splices what it generates into a shared [`FeatureDocument`].
//! Writers run in a fixed order: kerning, mark attachment, cursive
//! attachment, then the GDEF table, so that GDEF sees final classes.
mod ast;
mod curs;
mod file;
mod gdef;
mod kern;
mod mark;

pub use curs::CursFeatureWriter;
pub use file::{FeatureDocument, GeneratedCode};
pub use gdef::GdefFeatureWriter;
pub use kern::KernFeatureWriter;
pub use mark::MarkFeatureWriter;

use crate::{
    glyph::GlyphCategory,
    layout::{parse_font_features, FeatureInfo, GdefClasses, GlyphClosure},
    Font, FontbakeError,
};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// How a writer treats features the source already has
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Leave features which already exist alone, unless they carry an
    /// insert marker
    #[default]
    Skip,
    /// Always write, after everything else
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureOptions {
    pub mode: Mode,
    /// Kerning and anchor values are rounded to multiples of this
    pub quantization: f64,
    /// Put `lookupflag IgnoreMarks` on kerning lookups
    pub ignore_marks: bool,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        FeatureOptions {
            mode: Mode::Skip,
            quantization: 1.0,
            ignore_marks: true,
        }
    }
}

/// Everything the writers share about the font being built
pub struct FeatureContext<'a> {
    pub font: &'a Font,
    pub glyph_order: Vec<SmolStr>,
    pub cmap: BTreeMap<u32, SmolStr>,
    pub categories: IndexMap<SmolStr, GlyphCategory>,
    /// GDEF classes from the feature source when it declares them, else
    /// from the glyph categories
    pub gdef: Option<GdefClasses>,
    pub info: FeatureInfo,
    pub closure: GlyphClosure,
    pub options: FeatureOptions,
}

impl<'a> FeatureContext<'a> {
    pub fn new(font: &'a Font, options: FeatureOptions) -> Result<Self, FontbakeError> {
        let mut feature_file = parse_font_features(font)?;
        let info = FeatureInfo::from_feature_file(feature_file.as_mut())?;
        let categories = font.categories();
        let gdef = info
            .gdef_classes
            .clone()
            .or_else(|| GdefClasses::from_categories(&categories));
        Ok(FeatureContext {
            font,
            glyph_order: font.glyph_order(),
            cmap: font.cmap(),
            categories,
            gdef,
            info,
            closure: GlyphClosure::from_feature_file(feature_file),
            options,
        })
    }

    /// The features out of `features` which should be written, given what
    /// the document already contains
    pub fn todo(&self, doc: &FeatureDocument, features: &[&str]) -> Vec<SmolStr> {
        match self.options.mode {
            Mode::Append => features.iter().map(|&f| SmolStr::new(f)).collect(),
            Mode::Skip => {
                let existing = doc.feature_tags();
                let marked = doc.marked_features();
                features
                    .iter()
                    .filter(|&&f| !existing.contains(f) || marked.contains(f))
                    .map(|&f| SmolStr::new(f))
                    .collect()
            }
        }
    }

    pub fn quantize(&self, value: f64) -> f64 {
        crate::common::quantize(value, self.options.quantization)
    }

    pub fn is_mark(&self, glyph: &str) -> bool {
        self.gdef.as_ref().is_some_and(|gdef| gdef.mark.contains(glyph))
    }
}

pub trait FeatureWriter {
    fn name(&self) -> &'static str;

    /// Generate code into the document. Returns whether anything was added.
    fn write(
        &self,
        ctx: &mut FeatureContext,
        doc: &mut FeatureDocument,
    ) -> Result<bool, FontbakeError>;
}

/// Run all the writers over a font, returning its feature code with the
/// generated features spliced in.
pub fn write_features(font: &Font, options: FeatureOptions) -> Result<String, FontbakeError> {
    let mut ctx = FeatureContext::new(font, options)?;
    let mut doc = FeatureDocument::parse(&font.features);
    for name in ctx
        .info
        .glyph_classes
        .iter()
        .chain(ctx.info.mark_classes.keys())
    {
        doc.reserve_class_name(name.clone());
    }
    let writers: [&dyn FeatureWriter; 4] = [
        &KernFeatureWriter,
        &MarkFeatureWriter,
        &CursFeatureWriter,
        &GdefFeatureWriter,
    ];
    for writer in writers {
        if writer.write(&mut ctx, &mut doc)? {
            log::debug!("{} writer generated code", writer.name());
        } else {
            log::debug!("{} writer had nothing to do", writer.name());
        }
    }
    Ok(doc.to_fea())
}

#[allow(clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers {
    use crate::{Anchor, Font, Glyph};

    pub fn glyph(name: &str, codepoints: &[u32], anchors: &[(&str, f64, f64)]) -> Glyph {
        Glyph {
            width: 500.0,
            codepoints: codepoints.to_vec(),
            anchors: anchors
                .iter()
                .map(|(n, x, y)| Anchor::new(*n, *x, *y))
                .collect(),
            ..Glyph::new(name)
        }
    }

    pub fn font(glyphs: Vec<Glyph>) -> Font {
        let mut font = Font::new();
        font.glyphs.insert(Glyph::new(".notdef"));
        for glyph in glyphs {
            font.glyphs.insert(glyph);
        }
        font
    }
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::{test_helpers::*, *};
    use pretty_assertions::assert_eq;

    #[test]
    fn existing_features_are_skipped() {
        let mut font = font(vec![
            glyph("A", &[0x41], &[("top", 300.0, 700.0)]),
            glyph("V", &[0x56], &[]),
            glyph("acutecomb", &[0x301], &[("_top", 150.0, 500.0)]),
        ]);
        font.kerning.insert(("A".into(), "V".into()), -40.0);
        font.features = "feature kern {\n    pos A V -100;\n} kern;\n".to_string();
        let fea = write_features(&font, FeatureOptions::default()).expect("writes");
        assert_eq!(fea.matches("feature kern").count(), 1);
        assert!(fea.contains("pos A V -100;"));
        assert!(fea.contains("feature mark"));

        let appended = write_features(
            &font,
            FeatureOptions {
                mode: Mode::Append,
                ..Default::default()
            },
        )
        .expect("writes");
        assert_eq!(appended.matches("feature kern").count(), 2);
    }

    #[test]
    fn output_is_deterministic() {
        let mut font = font(vec![
            glyph("A", &[0x41], &[("top", 300.0, 700.0), ("bottom", 300.0, 0.0)]),
            glyph("V", &[0x56], &[("top", 250.0, 700.0)]),
            glyph("acutecomb", &[0x301], &[("_top", 150.0, 500.0), ("top", 150.0, 800.0)]),
            glyph("dotbelowcomb", &[0x323], &[("_bottom", 100.0, 0.0)]),
            glyph("f_i", &[], &[("caret_1", 250.0, 0.0)]),
        ]);
        font.kerning.insert(("A".into(), "V".into()), -40.0);
        font.kerning.insert(("V".into(), "A".into()), -35.0);
        let first = write_features(&font, FeatureOptions::default()).expect("writes");
        let second = write_features(&font, FeatureOptions::default()).expect("writes");
        assert_eq!(first, second);
    }
}
