use std::collections::{BTreeMap, BTreeSet, HashSet};

use fea_rs_ast::{FeatureFile, GlyphContainer, LayoutVisitor, Statement};
use smol_str::SmolStr;

use super::ClassTable;
use crate::{Font, FontbakeError};

const MAX_ROUNDS: usize = 10;

/// The substitution rules of a feature file, ready to answer "which glyphs
/// can these glyphs turn into?"
pub struct GlyphClosure {
    feature_file: Option<FeatureFile>,
}

impl GlyphClosure {
    pub fn new(
        features: &str,
        glyph_names: &[&str],
        source: Option<std::path::PathBuf>,
    ) -> Result<Self, FontbakeError> {
        Ok(GlyphClosure {
            feature_file: super::parse(features, glyph_names, source)?,
        })
    }

    pub fn from_font(font: &Font) -> Result<Self, FontbakeError> {
        Ok(GlyphClosure {
            feature_file: super::parse_font_features(font)?,
        })
    }

    pub(crate) fn from_feature_file(feature_file: Option<FeatureFile>) -> Self {
        GlyphClosure { feature_file }
    }

    /// Extend a set of glyphs with everything the substitution rules can
    /// produce from them.
    pub fn close(&mut self, glyphs: HashSet<SmolStr>) -> Result<HashSet<SmolStr>, FontbakeError> {
        let Some(feature_file) = self.feature_file.as_mut() else {
            return Ok(glyphs);
        };
        // A rule may reach a lookup which was already visited before the
        // glyphs it needs were added; revisit until nothing changes.
        let mut visitor = ClosureVisitor::new(glyphs);
        let mut count = visitor.glyphs.len();
        let mut rounds = 0;
        loop {
            visitor.classes = ClassTable::default();
            visitor.visit(feature_file).map_err(|e| {
                FontbakeError::InvalidFeatures(format!("Error computing glyph closure: {}", e))
            })?;
            rounds += 1;
            if visitor.glyphs.len() == count {
                break;
            }
            if rounds >= MAX_ROUNDS {
                return Err(FontbakeError::LayoutClosure);
            }
            count = visitor.glyphs.len();
        }
        Ok(visitor.glyphs)
    }
}

/// Sort the glyphs of a cmap into buckets keyed by `func(codepoint)`, then
/// grow each bucket with the glyphs reachable from it through substitutions.
///
/// Codepoints for which `func` gives `None` are neutral: their glyphs may
/// take part in the substitutions of any bucket, but only the glyphs which
/// become reachable together with the bucket's own glyphs are added to it.
pub fn classify_glyphs<K, F>(
    func: F,
    cmap: &BTreeMap<u32, SmolStr>,
    closure: &mut GlyphClosure,
) -> Result<BTreeMap<K, BTreeSet<SmolStr>>, FontbakeError>
where
    K: Ord,
    F: Fn(u32) -> Option<K>,
{
    let mut buckets: BTreeMap<K, HashSet<SmolStr>> = BTreeMap::new();
    let mut neutral = HashSet::new();
    for (&codepoint, glyph) in cmap.iter() {
        match func(codepoint) {
            Some(key) => {
                buckets.entry(key).or_default().insert(glyph.clone());
            }
            None => {
                neutral.insert(glyph.clone());
            }
        }
    }
    if !neutral.is_empty() {
        neutral = closure.close(neutral)?;
    }
    let mut result = BTreeMap::new();
    for (key, glyphs) in buckets {
        let closed = closure.close(glyphs.union(&neutral).cloned().collect())?;
        let mut bucket: BTreeSet<SmolStr> = glyphs.into_iter().collect();
        bucket.extend(closed.into_iter().filter(|g| !neutral.contains(g)));
        result.insert(key, bucket);
    }
    Ok(result)
}

struct ClosureVisitor {
    glyphs: HashSet<SmolStr>,
    classes: ClassTable,
}

impl ClosureVisitor {
    fn new(glyphs: HashSet<SmolStr>) -> Self {
        Self {
            glyphs,
            classes: ClassTable::default(),
        }
    }

    fn contains(&self, gc: &GlyphContainer) -> bool {
        self.classes
            .expand(gc)
            .iter()
            .any(|g| self.glyphs.contains(g.as_str()))
    }

    fn is_excluded_by_context(&self, prefix: &[GlyphContainer], suffix: &[GlyphContainer]) -> bool {
        prefix.iter().any(|gc| !self.contains(gc)) || suffix.iter().any(|gc| !self.contains(gc))
    }

    fn add_all(&mut self, containers: &[GlyphContainer]) {
        for container in containers {
            for glyph in self.classes.expand(container) {
                self.glyphs.insert(glyph);
            }
        }
    }

    fn close_single_subst(&mut self, statement: &fea_rs_ast::SingleSubstStatement) {
        if self.is_excluded_by_context(&statement.prefix, &statement.suffix) {
            return;
        }
        // Pairwise from->to, with classes expanded on both sides
        let from: Vec<SmolStr> = statement
            .glyphs
            .iter()
            .flat_map(|gc| self.classes.expand(gc))
            .collect();
        let to: Vec<SmolStr> = statement
            .replacement
            .iter()
            .flat_map(|gc| self.classes.expand(gc))
            .collect();
        // A single replacement glyph serves every input glyph
        let to = if to.len() == 1 && from.len() > 1 {
            vec![to[0].clone(); from.len()]
        } else {
            to
        };
        for (from, to) in from.into_iter().zip(to) {
            if self.glyphs.contains(from.as_str()) {
                log::debug!("Closure: {} -> {}", from, to);
                self.glyphs.insert(to);
            }
        }
    }

    fn close_multiple_subst(&mut self, statement: &fea_rs_ast::MultipleSubstStatement) {
        if self.is_excluded_by_context(&statement.prefix, &statement.suffix) {
            return;
        }
        if self.contains(&statement.glyph) {
            self.add_all(&statement.replacement);
        }
    }

    fn close_alternate_subst(&mut self, statement: &fea_rs_ast::AlternateSubstStatement) {
        if self.is_excluded_by_context(&statement.prefix, &statement.suffix) {
            return;
        }
        if self.contains(&statement.glyph) {
            self.add_all(std::slice::from_ref(&statement.replacement));
        }
    }

    fn close_ligature_subst(&mut self, statement: &fea_rs_ast::LigatureSubstStatement) {
        if self.is_excluded_by_context(&statement.prefix, &statement.suffix) {
            return;
        }
        if statement.glyphs.iter().all(|gc| self.contains(gc)) {
            self.add_all(std::slice::from_ref(&statement.replacement));
        }
    }

    fn close_reverse_chain_subst(
        &mut self,
        statement: &fea_rs_ast::ReverseChainSingleSubstStatement,
    ) {
        if self.is_excluded_by_context(&statement.prefix, &statement.suffix) {
            return;
        }
        if statement.glyphs.iter().all(|gc| self.contains(gc)) {
            self.add_all(&statement.replacements);
        }
    }
}

impl LayoutVisitor for ClosureVisitor {
    fn depth_first(&self) -> bool {
        true
    }

    fn visit_statement(&mut self, statement: &mut Statement) -> bool {
        match statement {
            Statement::SingleSubst(s) => self.close_single_subst(s),
            Statement::MultipleSubst(s) => self.close_multiple_subst(s),
            Statement::AlternateSubst(s) => self.close_alternate_subst(s),
            Statement::LigatureSubst(s) => self.close_ligature_subst(s),
            Statement::ReverseChainSubst(s) => self.close_reverse_chain_subst(s),
            Statement::GlyphClassDefinition(s) => self.classes.define(s),
            _ => {}
        }
        true
    }
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Direction;
    use pretty_assertions::assert_eq;

    const GLYPHS: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

    fn closure(fea: &str) -> GlyphClosure {
        GlyphClosure::new(fea, &GLYPHS, None).expect("features parse")
    }

    fn check(fea: &str, initial: &[&str], expected: &[&str]) {
        let initial: HashSet<SmolStr> = initial.iter().map(|s| SmolStr::new(s)).collect();
        let result = closure(fea).close(initial).expect("closure converges");
        let mut result: Vec<SmolStr> = result.into_iter().collect();
        result.sort();
        let expected: Vec<SmolStr> = expected.iter().map(|s| SmolStr::new(s)).collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn single_substitutions() {
        check(
            "feature foo { sub a by d; sub b by e; } foo;\nfeature bar { sub c by f; } bar;\n",
            &["a", "c"],
            &["a", "c", "d", "f"],
        );
    }

    #[test]
    fn context_must_be_reachable() {
        check(
            "feature foo { sub b a' by d; sub a by e; } foo;",
            &["a", "c"],
            &["a", "c", "e"],
        );
    }

    #[test]
    fn repeats_until_stable() {
        check(
            "lookup A { sub b by c; } A; feature foo { sub a by b; } foo; feature bar { sub b' lookup A; } bar;",
            &["a"],
            &["a", "b", "c"],
        );
    }

    #[test]
    fn classes_and_ligatures() {
        check(
            "@ab = [a b];\nfeature liga { sub @ab c by f; } liga;",
            &["a", "c"],
            &["a", "c", "f"],
        );
    }

    #[test]
    fn no_features_means_no_growth() {
        check("", &["a"], &["a"]);
    }

    #[test]
    fn neutral_glyphs_follow_their_bucket() {
        // "a" is right to left, "b" is neutral; "a b" ligates to "c"
        let mut closure = closure("feature liga { sub a b by c; sub b by d; } liga;");
        let cmap: BTreeMap<u32, SmolStr> =
            [(0x627, SmolStr::new("a")), (0x20, SmolStr::new("b"))].into();
        let buckets = classify_glyphs(crate::unicode::script_direction, &cmap, &mut closure)
            .expect("classifies");
        let rtl = buckets
            .get(&Direction::RightToLeft)
            .expect("has an RTL bucket");
        let rtl: Vec<&str> = rtl.iter().map(|g| g.as_str()).collect();
        assert_eq!(rtl, vec!["a", "c"]);
        assert!(!buckets.contains_key(&Direction::LeftToRight));
    }
}
