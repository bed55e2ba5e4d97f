use crate::{
    anchor::MARK_PREFIX, filters::FontFilter, glyph::GlyphSet, shape::Component, Anchor, Font,
    FontbakeError,
};
use kurbo::Shape as _;
use smol_str::SmolStr;
use std::collections::{BTreeMap, HashSet};

/// Copy anchors from the glyphs used as components onto the composites
/// which use them, so that composites can take part in mark positioning.
pub struct PropagateAnchors;

impl FontFilter for PropagateAnchors {
    fn apply(&self, font: &mut Font) -> Result<(), FontbakeError> {
        let modified = propagate_anchors(&mut font.glyphs);
        if !modified.is_empty() {
            log::info!("Glyphs with propagated anchors: {}", modified.len());
        }
        Ok(())
    }
}

/// Propagate anchors through all composites of a glyph set, returning the
/// names of the glyphs which gained anchors. Running this twice adds
/// nothing the second time.
pub fn propagate_anchors(glyphs: &mut GlyphSet) -> Vec<SmolStr> {
    let mut processed = HashSet::new();
    let mut modified = vec![];
    let names: Vec<SmolStr> = glyphs.keys().cloned().collect();
    for name in names {
        propagate_glyph(glyphs, &name, &mut processed, &mut modified);
    }
    modified
}

fn is_ligature_mark(name: &str) -> bool {
    !name.starts_with('_') && name.contains('_')
}

fn propagate_glyph(
    glyphs: &mut GlyphSet,
    name: &SmolStr,
    processed: &mut HashSet<SmolStr>,
    modified: &mut Vec<SmolStr>,
) {
    if !processed.insert(name.clone()) {
        return;
    }
    let Some(components) = glyphs
        .get(name)
        .filter(|g| g.is_composite())
        .map(|g| g.components.clone())
    else {
        return;
    };

    let mut base_components = vec![];
    let mut mark_components = vec![];
    for component in components {
        if !glyphs.contains_key(&component.reference) {
            log::warn!(
                "Anchors not propagated for inexistent component {} in glyph {}",
                component.reference,
                name
            );
            continue;
        }
        propagate_glyph(glyphs, &component.reference, processed, modified);
        let is_mark = glyphs
            .get(&component.reference)
            .is_some_and(|g| g.anchors.iter().any(|a| a.name.starts_with(MARK_PREFIX)));
        if is_mark {
            mark_components.push(component);
        } else {
            base_components.push(component);
        }
    }

    if !mark_components.is_empty() && base_components.is_empty() && is_ligature_mark(name) {
        // A mark built from other marks: the one sitting lowest becomes the base
        let closest = mark_components
            .iter()
            .enumerate()
            .map(|(ix, c)| (ix, distance_from_origin(glyphs, c)))
            .fold(None, |best: Option<(usize, f64)>, (ix, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((ix, d)),
            });
        if let Some((ix, _)) = closest {
            base_components.push(mark_components.remove(ix));
        }
    }

    let Some(composite) = glyphs.get(name) else {
        return;
    };
    let mut anchor_names: Vec<&str> = vec![];
    for component in base_components.iter() {
        if let Some(target) = glyphs.get(&component.reference) {
            for anchor in target.anchors.iter() {
                if !anchor_names.contains(&anchor.name.as_str()) {
                    anchor_names.push(anchor.name.as_str());
                }
            }
        }
    }

    let mut to_add: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for anchor_name in anchor_names {
        if composite
            .anchors
            .iter()
            .any(|a| a.name.starts_with(anchor_name))
        {
            continue;
        }
        let found: Vec<(&Anchor, &Component)> = base_components
            .iter()
            .filter_map(|c| {
                glyphs
                    .get(&c.reference)
                    .and_then(|g| g.anchor(anchor_name))
                    .map(|a| (a, c))
            })
            .collect();
        if found.len() > 1 {
            for (ix, (anchor, component)) in found.iter().enumerate() {
                let moved = anchor.transformed(component.affine());
                to_add.insert(format!("{}_{}", anchor.name, ix + 1), (moved.x, moved.y));
            }
        } else if let Some((anchor, component)) = found.first() {
            let moved = anchor.transformed(component.affine());
            to_add.insert(anchor.name.clone(), (moved.x, moved.y));
        }
    }

    for component in mark_components.iter() {
        let Some(target) = glyphs.get(&component.reference) else {
            continue;
        };
        for anchor in target.anchors.iter() {
            let attaches = target
                .anchors
                .iter()
                .any(|a| a.name == format!("{}{}", MARK_PREFIX, anchor.name));
            if to_add.contains_key(&anchor.name) && attaches {
                let moved = anchor.transformed(component.affine());
                to_add.insert(anchor.name.clone(), (moved.x, moved.y));
            }
        }
    }

    if to_add.is_empty() {
        return;
    }
    if let Some(composite) = glyphs.get_mut(name) {
        composite.anchors.extend(
            to_add
                .into_iter()
                .map(|(anchor_name, (x, y))| Anchor::new(anchor_name, x, y)),
        );
        modified.push(name.clone());
    }
}

fn distance_from_origin(glyphs: &GlyphSet, component: &Component) -> f64 {
    let origin = glyphs
        .decomposed_contours(&component.reference)
        .ok()
        .and_then(|paths| {
            paths
                .iter()
                .filter_map(|p| {
                    p.transformed(component.affine())
                        .to_kurbo(&component.reference)
                        .ok()
                })
                .map(|bez| bez.bounding_box())
                .reduce(|a, b| a.union(b))
        })
        .map(|bbox| (bbox.min_x(), bbox.min_y()))
        .unwrap_or((component.transform[4], component.transform[5]));
    origin.0 * origin.0 + origin.1 * origin.1
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::{Node, NodeType},
        shape::Path,
        Glyph,
    };
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn anchor_map(glyphs: &GlyphSet, name: &str) -> IndexMap<String, (f64, f64)> {
        glyphs
            .get(name)
            .map(|g| {
                g.anchors
                    .iter()
                    .map(|a| (a.name.clone(), (a.x, a.y)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn glyph(name: &str, anchors: &[(&str, f64, f64)], components: Vec<Component>) -> Glyph {
        Glyph {
            anchors: anchors
                .iter()
                .map(|(n, x, y)| Anchor::new(*n, *x, *y))
                .collect(),
            components,
            ..Glyph::new(name)
        }
    }

    fn boxed(mut glyph: Glyph, ymin: f64) -> Glyph {
        glyph.contours.push(Path::closed(vec![
            Node::new(0.0, ymin, NodeType::Line),
            Node::new(0.0, ymin + 50.0, NodeType::Line),
            Node::new(50.0, ymin + 50.0, NodeType::Line),
            Node::new(50.0, ymin, NodeType::Line),
        ]));
        glyph
    }

    fn latin() -> GlyphSet {
        [
            glyph("a", &[("top", 250.0, 500.0), ("bottom", 250.0, 0.0)], vec![]),
            glyph(
                "acutecomb",
                &[("_top", 100.0, 500.0), ("top", 100.0, 700.0)],
                vec![],
            ),
            glyph(
                "aacute",
                &[],
                vec![
                    Component::new("a"),
                    Component::with_offset("acutecomb", 150.0, 0.0),
                ],
            ),
            glyph(
                "a_a",
                &[],
                vec![Component::new("a"), Component::with_offset("a", 500.0, 0.0)],
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn mark_components_move_anchors() {
        let mut glyphs = latin();
        propagate_anchors(&mut glyphs);
        let anchors = anchor_map(&glyphs, "aacute");
        assert_eq!(anchors.get("top"), Some(&(250.0, 700.0)));
        assert_eq!(anchors.get("bottom"), Some(&(250.0, 0.0)));
        // Sorted by name when appended
        let names: Vec<&String> = anchors.keys().collect();
        assert_eq!(names, vec!["bottom", "top"]);
    }

    #[test]
    fn repeated_bases_are_numbered() {
        let mut glyphs = latin();
        propagate_anchors(&mut glyphs);
        let anchors = anchor_map(&glyphs, "a_a");
        assert_eq!(anchors.get("top_1"), Some(&(250.0, 500.0)));
        assert_eq!(anchors.get("top_2"), Some(&(750.0, 500.0)));
        assert_eq!(anchors.get("bottom_2"), Some(&(750.0, 0.0)));
        assert!(!anchors.contains_key("top"));
    }

    #[test]
    fn existing_anchors_block_propagation() {
        let mut glyphs = latin();
        if let Some(g) = glyphs.get_mut("aacute") {
            g.anchors.push(Anchor::new("top", 1.0, 2.0));
        }
        propagate_anchors(&mut glyphs);
        let anchors = anchor_map(&glyphs, "aacute");
        assert_eq!(anchors.get("top"), Some(&(1.0, 2.0)));
        assert_eq!(anchors.len(), 2);
    }

    #[test]
    fn propagation_is_idempotent() {
        let mut glyphs = latin();
        propagate_anchors(&mut glyphs);
        let once = glyphs.clone();
        let modified = propagate_anchors(&mut glyphs);
        assert!(modified.is_empty());
        assert_eq!(glyphs, once);
    }

    #[test]
    fn nested_composites() {
        let mut glyphs = latin();
        glyphs.insert(glyph(
            "aacute.ss01",
            &[],
            vec![Component::with_offset("aacute", 10.0, 0.0)],
        ));
        propagate_anchors(&mut glyphs);
        let anchors = anchor_map(&glyphs, "aacute.ss01");
        assert_eq!(anchors.get("top"), Some(&(260.0, 700.0)));
    }

    #[test]
    fn ligature_marks_promote_the_lowest() {
        let mut glyphs: GlyphSet = [
            boxed(
                glyph("tildecomb", &[("_top", 25.0, 0.0), ("top", 25.0, 100.0)], vec![]),
                0.0,
            ),
            boxed(
                glyph(
                    "circumflexcomb",
                    &[("_top", 25.0, 0.0), ("top", 25.0, 100.0)],
                    vec![],
                ),
                0.0,
            ),
            glyph(
                "circumflexcomb_tildecomb",
                &[],
                vec![
                    Component::with_offset("tildecomb", 0.0, 200.0),
                    Component::new("circumflexcomb"),
                ],
            ),
        ]
        .into_iter()
        .collect();
        propagate_anchors(&mut glyphs);
        let anchors = anchor_map(&glyphs, "circumflexcomb_tildecomb");
        // circumflexcomb sits at the origin and becomes the base; the tilde
        // on top of it then moves the top anchor up.
        assert_eq!(anchors.get("_top"), Some(&(25.0, 0.0)));
        assert_eq!(anchors.get("top"), Some(&(25.0, 300.0)));
    }

    #[test]
    fn missing_components_are_skipped() {
        let mut glyphs = latin();
        glyphs.insert(glyph(
            "broken",
            &[],
            vec![Component::new("a"), Component::new("nonexistent")],
        ));
        propagate_anchors(&mut glyphs);
        assert_eq!(
            anchor_map(&glyphs, "broken").get("top"),
            Some(&(250.0, 500.0))
        );
    }
}
