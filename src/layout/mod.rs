//! Reading the feature source that comes with a font: the glyphs reachable
//! through its substitutions, and the names and classes it already defines.
mod closure;
mod inspect;

pub use closure::{classify_glyphs, GlyphClosure};
pub use inspect::{FeatureInfo, GdefClasses};

use crate::{Font, FontbakeError};
use fea_rs_ast::{FeatureFile, GlyphContainer, GlyphName};
use smol_str::SmolStr;
use std::{collections::HashMap, path::PathBuf};

/// Parse feature code against a glyph set. Empty sources parse to nothing.
pub(crate) fn parse(
    features: &str,
    glyph_names: &[&str],
    source: Option<PathBuf>,
) -> Result<Option<FeatureFile>, FontbakeError> {
    if features.trim().is_empty() {
        return Ok(None);
    }
    FeatureFile::new_from_fea(features, Some(glyph_names), source)
        .map(Some)
        .map_err(|e| FontbakeError::InvalidFeatures(e.to_string()))
}

pub(crate) fn parse_font_features(font: &Font) -> Result<Option<FeatureFile>, FontbakeError> {
    let glyph_names: Vec<&str> = font.glyphs.keys().map(|g| g.as_str()).collect();
    parse(&font.features, &glyph_names, font.source.clone())
}

/// Named glyph classes seen so far while walking a feature file
#[derive(Debug, Default, Clone)]
pub(crate) struct ClassTable(HashMap<SmolStr, Vec<SmolStr>>);

impl ClassTable {
    pub(crate) fn define(&mut self, statement: &fea_rs_ast::GlyphClassDefinition) {
        let glyphs = statement
            .glyphs
            .glyphs
            .iter()
            .flat_map(|gc| self.expand(gc))
            .collect();
        self.0.insert(SmolStr::new(&statement.name), glyphs);
    }

    /// The glyph names a container stands for, with class references
    /// resolved against the classes defined so far.
    pub(crate) fn expand(&self, gc: &GlyphContainer) -> Vec<SmolStr> {
        let mut todo = vec![gc.clone()];
        let mut glyphs = vec![];
        while let Some(container) = todo.pop() {
            match container {
                GlyphContainer::GlyphName(glyph_name) => {
                    glyphs.push(glyph_name.name.clone());
                }
                GlyphContainer::GlyphClassName(class_name) => {
                    let class_name = class_name.trim_start_matches('@');
                    if let Some(definition) = self.0.get(class_name) {
                        for glyph in definition.iter().rev() {
                            todo.push(GlyphContainer::GlyphName(GlyphName::new(glyph)));
                        }
                    } else {
                        log::warn!("No definition found for glyph class @{}", class_name);
                    }
                }
                GlyphContainer::GlyphClass(glyph_class) => {
                    for gc in glyph_class.glyphs.iter().rev() {
                        todo.push(gc.clone());
                    }
                }
                GlyphContainer::GlyphNameOrRange(name) => {
                    glyphs.push(name.clone());
                }
                GlyphContainer::GlyphRange(range) => {
                    glyphs.extend(range.glyphset());
                }
            }
        }
        glyphs
    }
}
