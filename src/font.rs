use crate::{
    glyph::{GlyphCategory, GlyphSet},
    info::{FontInfo, FontLib},
    FontbakeError,
};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::{collections::BTreeMap, path::PathBuf};

pub const NOTDEF: &str = ".notdef";

/// A single master of a font source, ready for compilation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Font {
    pub glyphs: GlyphSet,
    pub info: FontInfo,
    pub lib: FontLib,
    /// Glyph groups, including the `public.kern1.`/`public.kern2.` kerning groups
    pub groups: IndexMap<SmolStr, Vec<SmolStr>>,
    /// Kerning values keyed by (first, second), each a glyph or group name
    pub kerning: IndexMap<(SmolStr, SmolStr), f64>,
    /// OpenType feature code
    pub features: String,
    pub source: Option<PathBuf>,
}

impl Font {
    pub fn new() -> Self {
        Font::default()
    }

    /// Check the font is structurally sound before anything is built from it
    pub fn validate(&self) -> Result<(), FontbakeError> {
        self.glyphs.check_cycles()
    }

    /// The order glyphs are given IDs in: `.notdef`, then the glyphs named in
    /// `public.glyphOrder`, then everything else.
    pub fn glyph_order(&self) -> Vec<SmolStr> {
        let mut order = Vec::with_capacity(self.glyphs.len());
        let mut seen = std::collections::HashSet::new();
        let mut take = |name: &SmolStr, order: &mut Vec<SmolStr>| {
            if self.glyphs.contains_key(name) && seen.insert(name.clone()) {
                order.push(name.clone());
            }
        };
        take(&SmolStr::new_static(NOTDEF), &mut order);
        for name in self.lib.glyph_order.iter() {
            take(name, &mut order);
        }
        for name in self.glyphs.keys() {
            take(name, &mut order);
        }
        order
    }

    /// Codepoint to glyph mapping. If two glyphs claim a codepoint, the
    /// first in glyph order keeps it.
    pub fn cmap(&self) -> BTreeMap<u32, SmolStr> {
        let mut cmap = BTreeMap::new();
        for name in self.glyph_order() {
            let Some(glyph) = self.glyphs.get(&name) else {
                continue;
            };
            for &codepoint in glyph.codepoints.iter() {
                if let Some(existing) = cmap.get(&codepoint) {
                    log::warn!(
                        "U+{:04X} is mapped to both {} and {}; keeping {}",
                        codepoint,
                        existing,
                        name,
                        existing
                    );
                    continue;
                }
                cmap.insert(codepoint, name.clone());
            }
        }
        cmap
    }

    /// The explicitly-declared GDEF classes, from the lib and per-glyph
    /// overrides.
    pub fn explicit_categories(&self) -> IndexMap<SmolStr, GlyphCategory> {
        let mut categories = IndexMap::new();
        for glyph in self.glyphs.values() {
            if let Some(category) = glyph.opentype_category {
                categories.insert(glyph.name.clone(), category);
            }
        }
        for (name, category) in self.lib.opentype_categories.iter() {
            if self.glyphs.contains_key(name) {
                categories.insert(name.clone(), *category);
            }
        }
        categories
    }

    /// The production name of a glyph
    pub fn production_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.lib
            .postscript_names
            .get(name)
            .map(|s| s.as_str())
            .unwrap_or(name)
    }
}
