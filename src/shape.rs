use crate::{
    common::{Node, NodeType},
    FontbakeError,
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A component in a glyph
pub struct Component {
    /// The referenced glyph name
    pub reference: SmolStr,
    /// The affine transformation, as `[xx, xy, yx, yy, dx, dy]`
    #[serde(default = "identity")]
    pub transform: [f64; 6],
}

fn identity() -> [f64; 6] {
    [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
}

impl Component {
    pub fn new(reference: impl Into<SmolStr>) -> Self {
        Component {
            reference: reference.into(),
            transform: identity(),
        }
    }

    pub fn with_offset(reference: impl Into<SmolStr>, dx: f64, dy: f64) -> Self {
        Component {
            reference: reference.into(),
            transform: [1.0, 0.0, 0.0, 1.0, dx, dy],
        }
    }

    pub fn affine(&self) -> kurbo::Affine {
        kurbo::Affine::new(self.transform)
    }

    pub fn is_translation_only(&self) -> bool {
        self.transform[..4] == identity()[..4]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// A path in a glyph
pub struct Path {
    /// A list of nodes in the path
    pub nodes: Vec<Node>,
    /// Whether the path is closed
    pub closed: bool,
}

impl Path {
    pub fn closed(nodes: Vec<Node>) -> Self {
        Path {
            nodes,
            closed: true,
        }
    }

    /// Converts the `Path` to a [`kurbo::BezPath`].
    pub fn to_kurbo(&self, glyph: &str) -> Result<kurbo::BezPath, FontbakeError> {
        let bad_path = || FontbakeError::BadPath {
            glyph: glyph.to_string(),
        };
        let mut path = kurbo::BezPath::new();
        if self.nodes.is_empty() {
            return Ok(path);
        }
        let mut offs = std::collections::VecDeque::new();
        let rotate = if self.closed {
            self.nodes
                .iter()
                .rev()
                .position(|pt| pt.nodetype != NodeType::OffCurve)
                .map(|idx| self.nodes.len() - 1 - idx)
                .unwrap_or(0)
        } else {
            0
        };
        // A closed contour whose start point is reached by a curve needs that
        // curve drawn explicitly; lines are taken care of by close_path.
        let revisit_start = self.closed
            && matches!(
                self.nodes[rotate].nodetype,
                NodeType::Curve | NodeType::QCurve
            );
        let mut nodes = self
            .nodes
            .iter()
            .cycle()
            .skip(rotate)
            .take(self.nodes.len() + usize::from(revisit_start));
        // All kurbo paths (even closed ones) must start with a move_to
        if let Some(start) = nodes.next() {
            path.move_to(start.to_kurbo());
        }
        for pt in nodes {
            let kurbo_point = pt.to_kurbo();
            match pt.nodetype {
                NodeType::Move => path.move_to(kurbo_point),
                NodeType::Line => path.line_to(kurbo_point),
                NodeType::OffCurve => offs.push_back(kurbo_point),
                NodeType::Curve => {
                    match offs.make_contiguous() {
                        [] => path.line_to(kurbo_point),
                        [p1] => path.quad_to(*p1, kurbo_point),
                        [p1, p2] => path.curve_to(*p1, *p2, kurbo_point),
                        _ => return Err(bad_path()),
                    };
                    offs.clear();
                }
                NodeType::QCurve => {
                    if offs.is_empty() {
                        path.line_to(kurbo_point);
                    }
                    while let Some(pt) = offs.pop_front() {
                        if let Some(next) = offs.front() {
                            let implied_point = pt.midpoint(*next);
                            path.quad_to(pt, implied_point);
                        } else {
                            path.quad_to(pt, kurbo_point);
                        }
                    }
                }
            }
        }
        if !offs.is_empty() {
            return Err(bad_path());
        }
        if self.closed {
            path.close_path()
        }
        Ok(path)
    }

    pub fn transformed(&self, affine: kurbo::Affine) -> Self {
        Path {
            nodes: self
                .nodes
                .iter()
                .map(|node| {
                    let pt = affine * node.to_kurbo();
                    Node {
                        x: pt.x,
                        y: pt.y,
                        nodetype: node.nodetype,
                        smooth: node.smooth,
                    }
                })
                .collect(),
            closed: self.closed,
        }
    }

    /// The same contour drawn in the opposite direction
    pub fn reversed(&self) -> Self {
        if !self.closed {
            let mut nodes = self.nodes.clone();
            nodes.reverse();
            return Path {
                nodes,
                closed: false,
            };
        }
        // Segment types travel with the point that ends the segment, so each
        // on-curve point takes the type of the next on-curve point.
        let len = self.nodes.len();
        let mut nodes = Vec::with_capacity(len);
        for i in (0..len).rev() {
            let node = &self.nodes[i];
            let nodetype = if node.nodetype == NodeType::OffCurve {
                NodeType::OffCurve
            } else {
                (1..=len)
                    .map(|step| &self.nodes[(i + step) % len])
                    .find(|n| n.nodetype.is_on_curve())
                    .map(|n| n.nodetype)
                    .unwrap_or(node.nodetype)
            };
            nodes.push(Node {
                x: node.x,
                y: node.y,
                nodetype,
                smooth: node.smooth,
            });
        }
        Path {
            nodes,
            closed: true,
        }
    }

    pub fn is_quadratic(&self) -> bool {
        !self.nodes.iter().any(|n| n.nodetype == NodeType::Curve)
    }
}

#[cfg(feature = "ufo")]
mod ufo {
    use super::*;

    impl From<&norad::Contour> for Path {
        fn from(c: &norad::Contour) -> Self {
            Path {
                nodes: c.points.iter().map(Node::from).collect(),
                closed: c
                    .points
                    .first()
                    .map(|p| p.typ != norad::PointType::Move)
                    .unwrap_or(true),
            }
        }
    }

    impl From<&norad::Component> for Component {
        fn from(c: &norad::Component) -> Self {
            let t = c.transform;
            Component {
                reference: SmolStr::from(c.base.as_str()),
                transform: [
                    t.x_scale, t.xy_scale, t.yx_scale, t.y_scale, t.x_offset, t.y_offset,
                ],
            }
        }
    }
}
