use crate::{
    anchor::Anchor,
    shape::{Component, Path},
    FontbakeError,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;
use std::{
    collections::HashMap,
    ops::{Deref, DerefMut},
};

/// The GDEF class of a glyph
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GlyphCategory {
    #[default]
    Unassigned,
    Base,
    Ligature,
    Mark,
    Component,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub name: SmolStr,
    pub width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codepoints: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contours: Vec<Path>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<Anchor>,
    /// Category hint, in the vocabulary of glyph databases ("Letter", "Mark"...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Subcategory hint ("Nonspacing", "Ligature"...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    /// A GDEF class which overrides anything derived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opentype_category: Option<GlyphCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_origin: Option<f64>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub lib: IndexMap<String, Value>,
}

impl Glyph {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Glyph {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_composite(&self) -> bool {
        !self.components.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty() && self.components.is_empty()
    }

    pub fn anchor(&self, name: &str) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.name == name)
    }
}

/// The glyphs of a font, keyed by name, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlyphSet(pub IndexMap<SmolStr, Glyph>);

impl GlyphSet {
    pub fn new() -> Self {
        GlyphSet::default()
    }

    /// Add a glyph, replacing any existing glyph of the same name
    pub fn insert(&mut self, glyph: Glyph) {
        self.0.insert(glyph.name.clone(), glyph);
    }

    /// Reject component graphs which loop back on themselves
    pub fn check_cycles(&self) -> Result<(), FontbakeError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }
        fn visit<'a>(
            glyphs: &'a GlyphSet,
            name: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<(), FontbakeError> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(FontbakeError::ComponentCycle {
                        glyph: name.to_string(),
                    })
                }
                None => {}
            }
            let Some(glyph) = glyphs.get(name) else {
                return Ok(());
            };
            marks.insert(name, Mark::Visiting);
            for component in glyph.components.iter() {
                visit(glyphs, component.reference.as_str(), marks)?;
            }
            marks.insert(name, Mark::Done);
            Ok(())
        }
        let mut marks = HashMap::new();
        for name in self.keys() {
            visit(self, name.as_str(), &mut marks)?;
        }
        Ok(())
    }

    /// The outlines of a glyph with all components flattened into
    /// contours. Components pointing at missing glyphs are skipped.
    pub fn decomposed_contours(&self, name: &str) -> Result<Vec<Path>, FontbakeError> {
        let glyph = self.get(name).ok_or_else(|| FontbakeError::GlyphNotFound {
            glyph: name.to_string(),
        })?;
        let mut contours = glyph.contours.clone();
        for component in glyph.components.iter() {
            if !self.contains_key(&component.reference) {
                log::warn!(
                    "Glyph {} has a component to missing glyph {}",
                    name,
                    component.reference
                );
                continue;
            }
            let affine = component.affine();
            contours.extend(
                self.decomposed_contours(&component.reference)?
                    .into_iter()
                    .map(|path| path.transformed(affine)),
            );
        }
        Ok(contours)
    }

    /// Replace the components of `name` which satisfy `predicate` by
    /// their outlines.
    pub fn decompose_components_where(
        &mut self,
        name: &str,
        predicate: impl Fn(&Component) -> bool,
    ) -> Result<(), FontbakeError> {
        let Some(glyph) = self.get(name) else {
            return Ok(());
        };
        let mut kept = vec![];
        let mut new_contours = vec![];
        for component in glyph.components.iter() {
            if !predicate(component) {
                kept.push(component.clone());
                continue;
            }
            if !self.contains_key(&component.reference) {
                continue;
            }
            let affine = component.affine();
            new_contours.extend(
                self.decomposed_contours(&component.reference)?
                    .into_iter()
                    .map(|path| path.transformed(affine)),
            );
        }
        if let Some(glyph) = self.get_mut(name) {
            glyph.components = kept;
            glyph.contours.extend(new_contours);
        }
        Ok(())
    }
}

impl Deref for GlyphSet {
    type Target = IndexMap<SmolStr, Glyph>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for GlyphSet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<Glyph> for GlyphSet {
    fn from_iter<T: IntoIterator<Item = Glyph>>(iter: T) -> Self {
        GlyphSet(iter.into_iter().map(|g| (g.name.clone(), g)).collect())
    }
}
