use super::{
    bounds::Bounds,
    outline::{needs_truetype_decomposition, to_bezpath, to_quadratic},
    table_error,
};
use crate::{
    common::ot_round, glyph::GlyphSet, shape::Component as SourceComponent, FontbakeError,
};
use smol_str::SmolStr;
use std::collections::HashMap;
use write_fonts::{
    tables::{
        glyf::{
            Anchor, Bbox, Component, ComponentFlags, CompositeGlyph, GlyfLocaBuilder, SimpleGlyph,
            Transform,
        },
        maxp::Maxp,
    },
    types::{F2Dot14, GlyphId16},
};

/// The TrueType outline tables, with what the other tables need to know
/// about them
pub struct TrueTypeOutlines {
    pub glyf: Vec<u8>,
    pub loca: Vec<u8>,
    /// `head.indexToLocFormat`
    pub index_to_loc_format: i16,
    pub bounds: Vec<Option<Bounds>>,
    pub maxp: Maxp,
}

enum TrueTypeGlyph {
    Simple(SimpleGlyph),
    Composite(Vec<Component>),
}

fn transform(component: &SourceComponent) -> Transform {
    let [xx, yx, xy, yy, _, _] = component.transform;
    Transform {
        xx: F2Dot14::from_f32(xx as f32),
        yx: F2Dot14::from_f32(yx as f32),
        xy: F2Dot14::from_f32(xy as f32),
        yy: F2Dot14::from_f32(yy as f32),
    }
}

fn anchor(component: &SourceComponent) -> Anchor {
    Anchor::Offset {
        x: ot_round(component.transform[4]) as i16,
        y: ot_round(component.transform[5]) as i16,
    }
}

/// The component whose base carries the same advance and sits unscaled at
/// x=0 lends its metrics to the composite
fn use_my_metrics(glyphs: &GlyphSet, name: &str) -> Option<usize> {
    let glyph = glyphs.get(name)?;
    glyph.components.iter().position(|c| {
        c.is_translation_only()
            && c.transform[4] == 0.0
            && glyphs
                .get(&c.reference)
                .is_some_and(|base| ot_round(base.width) == ot_round(glyph.width))
    })
}

fn simple_glyph(
    name: &str,
    contours: &[crate::shape::Path],
    reverse: bool,
    accuracy: f64,
) -> Result<SimpleGlyph, FontbakeError> {
    let path = to_quadratic(&to_bezpath(name, contours, reverse)?, accuracy);
    if path.elements().is_empty() {
        return Ok(SimpleGlyph::default());
    }
    let mut glyph = SimpleGlyph::from_bezpath(&path).map_err(|e| {
        log::error!("Could not convert {} to TrueType: {:?}", name, e);
        FontbakeError::BadPath {
            glyph: name.to_string(),
        }
    })?;
    glyph.recompute_bounding_box();
    Ok(glyph)
}

/// Point-level facts about each glyph, resolved through components
struct Resolver<'a> {
    glyphs: &'a [TrueTypeGlyph],
    points: HashMap<u16, Vec<(f64, f64)>>,
    /// (points, contours, depth) of decomposed composites
    stats: HashMap<u16, (usize, usize, u16)>,
}

impl Resolver<'_> {
    fn points(&mut self, gid: u16) -> Vec<(f64, f64)> {
        if let Some(points) = self.points.get(&gid) {
            return points.clone();
        }
        let glyphs = self.glyphs;
        let points = match &glyphs[gid as usize] {
            TrueTypeGlyph::Simple(simple) => simple
                .contours
                .iter()
                .flat_map(|c| c.iter())
                .map(|p| (p.x as f64, p.y as f64))
                .collect(),
            TrueTypeGlyph::Composite(components) => {
                let mut points = vec![];
                for component in components.iter() {
                    let Anchor::Offset { x: dx, y: dy } = component.anchor else {
                        continue;
                    };
                    let t = &component.transform;
                    let (xx, yx, xy, yy) = (
                        t.xx.to_f32() as f64,
                        t.yx.to_f32() as f64,
                        t.xy.to_f32() as f64,
                        t.yy.to_f32() as f64,
                    );
                    for (x, y) in self.points(component.glyph.to_u16()) {
                        points.push((
                            xx * x + xy * y + dx as f64,
                            yx * x + yy * y + dy as f64,
                        ));
                    }
                }
                points
            }
        };
        self.points.insert(gid, points.clone());
        points
    }

    fn stats(&mut self, gid: u16) -> (usize, usize, u16) {
        if let Some(stats) = self.stats.get(&gid) {
            return *stats;
        }
        let glyphs = self.glyphs;
        let stats = match &glyphs[gid as usize] {
            TrueTypeGlyph::Simple(simple) => (
                simple.contours.iter().map(|c| c.len()).sum(),
                simple.contours.len(),
                0,
            ),
            TrueTypeGlyph::Composite(components) => {
                components
                    .iter()
                    .map(|c| self.stats(c.glyph.to_u16()))
                    .fold((0, 0, 0), |acc, (points, contours, depth)| {
                        (acc.0 + points, acc.1 + contours, acc.2.max(depth + 1))
                    })
            }
        };
        self.stats.insert(gid, stats);
        stats
    }
}

/// Build `glyf` and `loca` for the glyphs in `order`.
///
/// Cubic curves are approximated with quadratics to within `accuracy`, and
/// contours are reversed when `reverse` is set, to go from the PostScript
/// winding to the TrueType one.
pub fn build_glyf(
    glyphs: &GlyphSet,
    order: &[SmolStr],
    reverse: bool,
    accuracy: f64,
) -> Result<TrueTypeOutlines, FontbakeError> {
    let gids: HashMap<&str, u16> = order
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i as u16))
        .collect();

    let mut compiled = Vec::with_capacity(order.len());
    for name in order.iter() {
        let glyph = glyphs
            .get(name)
            .ok_or_else(|| FontbakeError::GlyphNotFound {
                glyph: name.to_string(),
            })?;
        if glyph.components.is_empty() {
            compiled.push(TrueTypeGlyph::Simple(simple_glyph(
                name,
                &glyph.contours,
                reverse,
                accuracy,
            )?));
        } else if needs_truetype_decomposition(glyph, glyphs) {
            log::debug!("Decomposing {}", name);
            let contours = glyphs.decomposed_contours(name)?;
            compiled.push(TrueTypeGlyph::Simple(simple_glyph(
                name, &contours, reverse, accuracy,
            )?));
        } else {
            let metrics_from = use_my_metrics(glyphs, name);
            let mut components = vec![];
            for (index, component) in glyph.components.iter().enumerate() {
                // A base dropped from the glyph order
                let Some(&gid) = gids.get(component.reference.as_str()) else {
                    log::warn!(
                        "Glyph {} uses {}, which is not exported; skipping the component",
                        name,
                        component.reference
                    );
                    continue;
                };
                let flags = ComponentFlags {
                    round_xy_to_grid: true,
                    use_my_metrics: metrics_from == Some(index),
                    ..Default::default()
                };
                components.push(Component::new(
                    GlyphId16::new(gid),
                    anchor(component),
                    transform(component),
                    flags,
                ));
            }
            if components.is_empty() {
                compiled.push(TrueTypeGlyph::Simple(SimpleGlyph::default()));
            } else {
                compiled.push(TrueTypeGlyph::Composite(components));
            }
        }
    }

    let mut resolver = Resolver {
        glyphs: &compiled,
        points: HashMap::new(),
        stats: HashMap::new(),
    };
    let mut maxp = Maxp {
        num_glyphs: order.len() as u16,
        max_points: Some(0),
        max_contours: Some(0),
        max_composite_points: Some(0),
        max_composite_contours: Some(0),
        max_zones: Some(1),
        max_twilight_points: Some(0),
        max_storage: Some(0),
        max_function_defs: Some(0),
        max_instruction_defs: Some(0),
        max_stack_elements: Some(0),
        max_size_of_instructions: Some(0),
        max_component_elements: Some(0),
        max_component_depth: Some(0),
    };
    let bump = |field: &mut Option<u16>, value: usize| {
        *field = Some(field.unwrap_or(0).max(value.min(u16::MAX as usize) as u16));
    };

    let mut builder = GlyfLocaBuilder::new();
    let mut bounds = Vec::with_capacity(order.len());
    for (gid, glyph) in compiled.iter().enumerate() {
        let gid = gid as u16;
        let (points, contours, depth) = resolver.stats(gid);
        match glyph {
            TrueTypeGlyph::Simple(simple) => {
                bump(&mut maxp.max_points, points);
                bump(&mut maxp.max_contours, contours);
                if simple.contours.is_empty() {
                    bounds.push(None);
                } else {
                    let b = simple.bbox;
                    bounds.push(Some(Bounds {
                        x_min: b.x_min as i32,
                        y_min: b.y_min as i32,
                        x_max: b.x_max as i32,
                        y_max: b.y_max as i32,
                    }));
                }
                builder
                    .add_glyph(simple)
                    .map_err(|e| table_error("glyf", e))?;
            }
            TrueTypeGlyph::Composite(components) => {
                bump(&mut maxp.max_composite_points, points);
                bump(&mut maxp.max_composite_contours, contours);
                bump(&mut maxp.max_component_elements, components.len());
                bump(&mut maxp.max_component_depth, depth as usize);
                let glyph_bounds = Bounds::from_points(resolver.points(gid));
                bounds.push(glyph_bounds);
                let bbox = glyph_bounds
                    .map(|b| Bbox {
                        x_min: b.x_min as i16,
                        y_min: b.y_min as i16,
                        x_max: b.x_max as i16,
                        y_max: b.y_max as i16,
                    })
                    .unwrap_or_default();
                let mut iter = components.iter().cloned();
                let Some(first) = iter.next() else {
                    continue;
                };
                let mut composite = CompositeGlyph::new(first, bbox);
                for component in iter {
                    composite.add_component(component, bbox);
                }
                builder
                    .add_glyph(&composite)
                    .map_err(|e| table_error("glyf", e))?;
            }
        }
    }
    let (glyf, loca, format) = builder.build();
    Ok(TrueTypeOutlines {
        glyf: write_fonts::dump_table(&glyf).map_err(|e| table_error("glyf", e))?,
        loca: write_fonts::dump_table(&loca).map_err(|e| table_error("loca", e))?,
        index_to_loc_format: format as i16,
        bounds,
        maxp,
    })
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::{Node, NodeType},
        glyph::Glyph,
        shape::Path,
    };
    use pretty_assertions::assert_eq;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Path {
        Path::closed(vec![
            Node::new(x0, y0, NodeType::Line),
            Node::new(x1, y0, NodeType::Line),
            Node::new(x1, y1, NodeType::Line),
            Node::new(x0, y1, NodeType::Line),
        ])
    }

    fn glyph_set() -> (GlyphSet, Vec<SmolStr>) {
        let mut glyphs = GlyphSet::new();
        glyphs.insert(Glyph {
            width: 500.0,
            contours: vec![rect(0.0, 0.0, 100.0, 200.0)],
            ..Glyph::new(".notdef")
        });
        glyphs.insert(Glyph {
            width: 600.0,
            contours: vec![rect(50.0, 0.0, 550.0, 700.0), rect(100.0, 100.0, 200.0, 200.0)],
            ..Glyph::new("o")
        });
        glyphs.insert(Glyph {
            width: 600.0,
            components: vec![SourceComponent::with_offset("o", 0.0, 0.0), {
                let mut c = SourceComponent::with_offset("o", 300.0, 800.0);
                c.transform[0] = 0.5;
                c.transform[3] = 0.5;
                c
            }],
            ..Glyph::new("o_small")
        });
        glyphs.insert(Glyph {
            width: 600.0,
            components: vec![SourceComponent::with_offset("o_small", 10.0, 0.0)],
            ..Glyph::new("nested")
        });
        glyphs.insert(Glyph {
            width: 250.0,
            ..Glyph::new("space")
        });
        let order = glyphs.keys().cloned().collect();
        (glyphs, order)
    }

    #[test]
    fn composite_bounds_follow_transforms() {
        let (glyphs, order) = glyph_set();
        let outlines = build_glyf(&glyphs, &order, true, 1.0).expect("compiles");
        assert_eq!(
            outlines.bounds[2],
            Some(Bounds {
                x_min: 50,
                y_min: 0,
                x_max: 575,
                y_max: 1150
            })
        );
        assert_eq!(
            outlines.bounds[3],
            Some(Bounds {
                x_min: 60,
                y_min: 0,
                x_max: 585,
                y_max: 1150
            })
        );
        assert_eq!(outlines.bounds[4], None);
    }

    #[test]
    fn maxp_statistics() {
        let (glyphs, order) = glyph_set();
        let outlines = build_glyf(&glyphs, &order, true, 1.0).expect("compiles");
        let maxp = outlines.maxp;
        assert_eq!(maxp.num_glyphs, 5);
        assert_eq!(maxp.max_points, Some(8));
        assert_eq!(maxp.max_contours, Some(2));
        assert_eq!(maxp.max_composite_points, Some(16));
        assert_eq!(maxp.max_composite_contours, Some(4));
        assert_eq!(maxp.max_component_elements, Some(2));
        assert_eq!(maxp.max_component_depth, Some(2));
        assert_eq!(maxp.max_zones, Some(1));
    }

    #[test]
    fn use_my_metrics_picks_first_matching_component() {
        let (glyphs, _) = glyph_set();
        assert_eq!(use_my_metrics(&glyphs, "o_small"), Some(0));
        // Offset horizontally, so it cannot lend its metrics
        assert_eq!(use_my_metrics(&glyphs, "nested"), None);
    }

    #[test]
    fn mixed_glyphs_become_simple() {
        let (mut glyphs, order) = glyph_set();
        if let Some(glyph) = glyphs.get_mut("nested") {
            glyph.contours.push(rect(0.0, -100.0, 10.0, -90.0));
        }
        let outlines = build_glyf(&glyphs, &order, true, 1.0).expect("compiles");
        assert_eq!(
            outlines.bounds[3],
            Some(Bounds {
                x_min: 0,
                y_min: -100,
                x_max: 585,
                y_max: 1150
            })
        );
        assert_eq!(outlines.maxp.max_contours, Some(5));
    }
}
