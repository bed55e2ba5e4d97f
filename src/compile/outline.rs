//! Glyph outline preparation shared by the TrueType and CFF writers
use crate::{
    common::{ot_round, Node, NodeType},
    font::NOTDEF,
    glyph::{Glyph, GlyphSet},
    info::FontInfo,
    shape::{Component, Path},
    FontbakeError,
};
use kurbo::{BezPath, CubicBez, PathEl, Point};

/// A box with a counter, used when the source has no `.notdef`.
///
/// Contours run counter-clockwise outside and clockwise inside, the
/// PostScript convention; TrueType output reverses them along with every
/// other glyph.
pub fn notdef_stub(info: &FontInfo) -> Glyph {
    let width = ot_round(info.upm() * 0.5) as f64;
    let stroke = ot_round(info.upm() * 0.05) as f64;
    let ascender = ot_round(info.ascender()) as f64;
    let descender = ot_round(info.descender()) as f64;
    let rect = |points: [(f64, f64); 4]| {
        Path::closed(
            points
                .iter()
                .map(|&(x, y)| Node::new(x, y, NodeType::Line))
                .collect(),
        )
    };
    let (x_min, x_max) = (stroke, width - stroke);
    let (y_min, y_max) = (descender, ascender);
    let outer = rect([(x_min, y_min), (x_max, y_min), (x_max, y_max), (x_min, y_max)]);
    let (x_min, x_max) = (x_min + stroke, x_max - stroke);
    let (y_min, y_max) = (y_min + stroke, y_max - stroke);
    let inner = rect([(x_min, y_min), (x_min, y_max), (x_max, y_max), (x_max, y_min)]);
    Glyph {
        width,
        contours: vec![outer, inner],
        ..Glyph::new(NOTDEF)
    }
}

/// The glyph set to compile: the source glyphs plus a `.notdef` if the
/// source did not draw one.
pub fn glyphs_with_notdef(glyphs: &GlyphSet, info: &FontInfo) -> GlyphSet {
    let mut glyphs = glyphs.clone();
    if !glyphs.contains_key(NOTDEF) {
        log::info!("No {} glyph in the source; adding a placeholder", NOTDEF);
        glyphs.insert(notdef_stub(info));
    }
    glyphs
}

/// Convert a path to kurbo, dropping contours too short to draw anything
pub fn to_bezpath(
    glyph: &str,
    contours: &[Path],
    reverse: bool,
) -> Result<BezPath, FontbakeError> {
    let mut path = BezPath::new();
    for contour in contours {
        if contour.nodes.len() < 2 {
            log::warn!("Dropping a single-point contour in {}", glyph);
            continue;
        }
        let contour = if reverse {
            contour.reversed()
        } else {
            contour.clone()
        };
        path.extend(contour.to_kurbo(glyph)?.elements().iter().copied());
    }
    Ok(path)
}

/// Replace cubic segments with quadratic splines within `accuracy` font
/// units
pub fn to_quadratic(path: &BezPath, accuracy: f64) -> BezPath {
    let mut out = BezPath::new();
    let mut current = Point::ZERO;
    for el in path.elements() {
        match *el {
            PathEl::CurveTo(p1, p2, p3) => {
                let cubic = CubicBez::new(current, p1, p2, p3);
                let quads: Vec<_> = cubic.to_quads(accuracy).map(|(_, _, q)| q).collect();
                let last = quads.len().saturating_sub(1);
                for (i, quad) in quads.into_iter().enumerate() {
                    // Pin the final point so that rounding error cannot open
                    // the contour
                    let end = if i == last { p3 } else { quad.p2 };
                    out.quad_to(quad.p1, end);
                }
                current = p3;
            }
            PathEl::MoveTo(p) | PathEl::LineTo(p) | PathEl::QuadTo(_, p) => {
                out.push(*el);
                current = p;
            }
            PathEl::ClosePath => out.push(*el),
        }
    }
    out
}

/// A component transform which the `glyf` component record can hold:
/// scales within the F2Dot14 range and offsets within 16 bits
pub fn fits_truetype_component(component: &Component) -> bool {
    let [xx, xy, yx, yy, dx, dy] = component.transform;
    [xx, xy, yx, yy].iter().all(|v| (-2.0..2.0).contains(v))
        && [dx, dy]
            .iter()
            .all(|v| (i16::MIN as i32..=i16::MAX as i32).contains(&ot_round(*v)))
}

/// Whether a glyph has to be flattened into contours before it can be
/// written to `glyf`.
///
/// TrueType glyphs are either all contours or all components, so a glyph
/// mixing the two is decomposed, as is one whose components cannot be
/// represented.
pub fn needs_truetype_decomposition(glyph: &Glyph, glyphs: &GlyphSet) -> bool {
    if glyph.components.is_empty() {
        return false;
    }
    if !glyph.contours.is_empty() {
        return true;
    }
    glyph
        .components
        .iter()
        .any(|c| !fits_truetype_component(c) || !glyphs.contains_key(&c.reference))
}
