use std::collections::HashSet;

use fea_rs_ast::{AsFea, FeatureFile, LayoutVisitor, Statement, ToplevelItem};
use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;

use super::ClassTable;
use crate::{glyph::GlyphCategory, FontbakeError};

/// Glyph sets of the four GDEF classes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GdefClasses {
    pub base: HashSet<SmolStr>,
    pub ligature: HashSet<SmolStr>,
    pub mark: HashSet<SmolStr>,
    pub component: HashSet<SmolStr>,
}

impl GdefClasses {
    /// Build the classes from a category map. `None` when nothing has a class.
    pub fn from_categories(categories: &IndexMap<SmolStr, GlyphCategory>) -> Option<Self> {
        let mut classes = GdefClasses::default();
        for (name, category) in categories.iter() {
            let set = match category {
                GlyphCategory::Base => &mut classes.base,
                GlyphCategory::Ligature => &mut classes.ligature,
                GlyphCategory::Mark => &mut classes.mark,
                GlyphCategory::Component => &mut classes.component,
                GlyphCategory::Unassigned => continue,
            };
            set.insert(name.clone());
        }
        (!classes.is_empty()).then_some(classes)
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
            && self.ligature.is_empty()
            && self.mark.is_empty()
            && self.component.is_empty()
    }

    /// Glyphs which can carry attachment anchors
    pub fn attaching(&self) -> HashSet<SmolStr> {
        self.base
            .iter()
            .chain(self.ligature.iter())
            .chain(self.mark.iter())
            .cloned()
            .collect()
    }
}

/// What an existing feature file already declares
#[derive(Debug, Clone, Default)]
pub struct FeatureInfo {
    /// Names of glyph classes, without the `@`
    pub glyph_classes: IndexSet<SmolStr>,
    /// Mark classes, each mapping its glyphs to the anchor they were
    /// defined with (as feature syntax)
    pub mark_classes: IndexMap<SmolStr, IndexMap<SmolStr, String>>,
    /// `languagesystem` statements, in source order
    pub language_systems: Vec<(String, String)>,
    /// The `GlyphClassDef` of the GDEF table, if any
    pub gdef_classes: Option<GdefClasses>,
    pub has_ligature_carets: bool,
}

impl FeatureInfo {
    pub fn from_feature_file(feature_file: Option<&mut FeatureFile>) -> Result<Self, FontbakeError> {
        let Some(feature_file) = feature_file else {
            return Ok(FeatureInfo::default());
        };
        let language_systems = feature_file
            .statements
            .iter()
            .filter_map(|s| match s {
                ToplevelItem::LanguageSystem(ls) => Some((ls.script.clone(), ls.language.clone())),
                _ => None,
            })
            .collect();
        let mut visitor = InspectVisitor::default();
        visitor
            .visit(feature_file)
            .map_err(|e| FontbakeError::InvalidFeatures(e.to_string()))?;
        let InspectVisitor {
            mut info,
            classes: _,
        } = visitor;
        info.language_systems = language_systems;
        Ok(info)
    }

    /// Script tags of the `languagesystem` statements, each with its
    /// languages, in source order. `DFLT` is left out.
    pub fn script_languages(&self) -> IndexMap<String, Vec<String>> {
        let mut scripts: IndexMap<String, Vec<String>> = IndexMap::new();
        for (script, language) in self.language_systems.iter() {
            if script == "DFLT" {
                continue;
            }
            scripts
                .entry(script.clone())
                .or_default()
                .push(language.clone());
        }
        scripts
    }
}

#[derive(Default)]
struct InspectVisitor {
    info: FeatureInfo,
    classes: ClassTable,
}

impl InspectVisitor {
    fn expand_all(&self, gc: Option<&fea_rs_ast::GlyphContainer>) -> HashSet<SmolStr> {
        gc.map(|gc| self.classes.expand(gc).into_iter().collect())
            .unwrap_or_default()
    }
}

impl LayoutVisitor for InspectVisitor {
    fn depth_first(&self) -> bool {
        true
    }

    fn visit_statement(&mut self, statement: &mut Statement) -> bool {
        match statement {
            Statement::GlyphClassDefinition(definition) => {
                self.classes.define(definition);
                self.info
                    .glyph_classes
                    .insert(SmolStr::new(&definition.name));
            }
            Statement::MarkClassDefinition(definition) => {
                let anchor = definition.anchor.as_fea("");
                let glyphs = self.classes.expand(&definition.glyphs);
                let class = self
                    .info
                    .mark_classes
                    .entry(SmolStr::new(&definition.mark_class.name))
                    .or_default();
                for glyph in glyphs {
                    class.insert(glyph, anchor.clone());
                }
            }
            Statement::GdefClassDef(definition) => {
                self.info.gdef_classes = Some(GdefClasses {
                    base: self.expand_all(definition.base_glyphs.as_ref()),
                    ligature: self.expand_all(definition.ligature_glyphs.as_ref()),
                    mark: self.expand_all(definition.mark_glyphs.as_ref()),
                    component: self.expand_all(definition.component_glyphs.as_ref()),
                });
            }
            Statement::GdefLigatureCaretByPos(_) | Statement::GdefLigatureCaretByIndex(_) => {
                self.info.has_ligature_carets = true;
            }
            _ => {}
        }
        true
    }
}
