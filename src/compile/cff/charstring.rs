//! Type 2 charstring encoding
use crate::common::ot_round;
use kurbo::{BezPath, PathEl, Point};

const RLINETO: u8 = 5;
const HLINETO: u8 = 6;
const VLINETO: u8 = 7;
const RRCURVETO: u8 = 8;
const ENDCHAR: u8 = 14;
const RMOVETO: u8 = 21;
const HMOVETO: u8 = 22;
const VMOVETO: u8 = 4;

/// Operand stack depth a Type 2 interpreter must support
const MAX_STACK: usize = 48;

/// Round a coordinate to an integer if it is within `tolerance` of one
pub fn round_coordinate(value: f64, tolerance: f64) -> f64 {
    let rounded = ot_round(value) as f64;
    if tolerance >= 0.5 || (rounded - value).abs() <= tolerance {
        rounded
    } else {
        value
    }
}

/// Append a number in charstring encoding; non-integers become 16.16
/// fixed
pub fn encode_number(out: &mut Vec<u8>, value: f64) {
    if value.fract() != 0.0 || !(-32768.0..=32767.0).contains(&value) {
        out.push(255);
        out.extend(((value * 65536.0).round() as i32).to_be_bytes());
        return;
    }
    let v = value as i32;
    match v {
        -107..=107 => out.push((v + 139) as u8),
        108..=1131 => {
            let v = v - 108;
            out.extend([((v >> 8) + 247) as u8, (v & 0xff) as u8]);
        }
        -1131..=-108 => {
            let v = -v - 108;
            out.extend([((v >> 8) + 251) as u8, (v & 0xff) as u8]);
        }
        _ => {
            out.push(28);
            out.extend((v as i16).to_be_bytes());
        }
    }
}

/// A compiled glyph program, with the outline as it was actually encoded
pub struct CharString {
    pub bytes: Vec<u8>,
    /// The outline after coordinate rounding; bounds come from this
    pub path: BezPath,
}

#[derive(Clone, Copy, PartialEq)]
enum Op {
    Line,
    Curve,
}

struct Encoder {
    bytes: Vec<u8>,
    pending: Vec<f64>,
    pending_op: Option<Op>,
    width: Option<f64>,
}

impl Encoder {
    /// The advance width goes in front of the first stack-clearing operator
    fn take_width(&mut self) -> Option<f64> {
        self.width.take()
    }

    fn flush(&mut self) {
        let Some(op) = self.pending_op.take() else {
            return;
        };
        for value in self.pending.drain(..) {
            encode_number(&mut self.bytes, value);
        }
        self.bytes.push(match op {
            Op::Line => RLINETO,
            Op::Curve => RRCURVETO,
        });
    }

    fn push(&mut self, op: Op, args: &[f64]) {
        if self.pending_op != Some(op) || self.pending.len() + args.len() > MAX_STACK {
            self.flush();
        }
        self.pending_op = Some(op);
        self.pending.extend_from_slice(args);
    }

    fn move_to(&mut self, dx: f64, dy: f64) {
        self.flush();
        let mut args = vec![];
        if let Some(width) = self.take_width() {
            args.push(width);
        }
        let op = if dy == 0.0 {
            args.push(dx);
            HMOVETO
        } else if dx == 0.0 {
            args.push(dy);
            VMOVETO
        } else {
            args.extend([dx, dy]);
            RMOVETO
        };
        for value in args {
            encode_number(&mut self.bytes, value);
        }
        self.bytes.push(op);
    }

    fn line_to(&mut self, dx: f64, dy: f64) {
        // A lone axis-aligned line is a byte shorter as h/vlineto
        if self.pending_op.is_none() && (dx == 0.0) != (dy == 0.0) {
            self.flush();
            let (value, op) = if dy == 0.0 { (dx, HLINETO) } else { (dy, VLINETO) };
            encode_number(&mut self.bytes, value);
            self.bytes.push(op);
            return;
        }
        self.push(Op::Line, &[dx, dy]);
    }

    fn finish(mut self) -> Vec<u8> {
        self.flush();
        if let Some(width) = self.take_width() {
            encode_number(&mut self.bytes, width);
        }
        self.bytes.push(ENDCHAR);
        self.bytes
    }
}

fn to_cubic(p0: Point, q1: Point, p2: Point) -> (Point, Point) {
    (p0 + (q1 - p0) * (2.0 / 3.0), p2 + (q1 - p2) * (2.0 / 3.0))
}

/// Encode an outline as a Type 2 charstring.
///
/// `width` is the operand for the advance, already made relative to
/// `nominalWidthX`; `None` means the glyph uses `defaultWidthX`. Points are
/// rounded with `tolerance` and the deltas are taken between rounded
/// points, so errors never accumulate.
pub fn encode(path: &BezPath, width: Option<f64>, tolerance: f64) -> CharString {
    let mut encoder = Encoder {
        bytes: vec![],
        pending: vec![],
        pending_op: None,
        width,
    };
    let mut emitted = BezPath::new();
    let round = |p: Point| {
        Point::new(
            round_coordinate(p.x, tolerance),
            round_coordinate(p.y, tolerance),
        )
    };
    let mut current = Point::ZERO;
    let mut start = Point::ZERO;
    let mut unrounded_current = Point::ZERO;
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                start = p;
                unrounded_current = p;
                let p = round(p);
                encoder.move_to(p.x - current.x, p.y - current.y);
                emitted.move_to(p);
                current = p;
            }
            PathEl::LineTo(p) => {
                unrounded_current = p;
                let p = round(p);
                if p == current {
                    continue;
                }
                encoder.line_to(p.x - current.x, p.y - current.y);
                emitted.line_to(p);
                current = p;
            }
            PathEl::QuadTo(q1, p2) => {
                let (c1, c2) = to_cubic(unrounded_current, q1, p2);
                unrounded_current = p2;
                let (c1, c2, p) = (round(c1), round(c2), round(p2));
                encoder.push(
                    Op::Curve,
                    &[
                        c1.x - current.x,
                        c1.y - current.y,
                        c2.x - c1.x,
                        c2.y - c1.y,
                        p.x - c2.x,
                        p.y - c2.y,
                    ],
                );
                emitted.curve_to(c1, c2, p);
                current = p;
            }
            PathEl::CurveTo(c1, c2, p) => {
                unrounded_current = p;
                let (c1, c2, p) = (round(c1), round(c2), round(p));
                encoder.push(
                    Op::Curve,
                    &[
                        c1.x - current.x,
                        c1.y - current.y,
                        c2.x - c1.x,
                        c2.y - c1.y,
                        p.x - c2.x,
                        p.y - c2.y,
                    ],
                );
                emitted.curve_to(c1, c2, p);
                current = p;
            }
            // Contours close implicitly
            PathEl::ClosePath => {
                emitted.close_path();
                unrounded_current = start;
            }
        }
    }
    CharString {
        bytes: encoder.finish(),
        path: emitted,
    }
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, vec![139])]
    #[case(-107.0, vec![32])]
    #[case(108.0, vec![247, 0])]
    #[case(1131.0, vec![250, 255])]
    #[case(-1131.0, vec![254, 255])]
    #[case(2000.0, vec![28, 0x07, 0xd0])]
    #[case(0.5, vec![255, 0, 0, 0x80, 0])]
    fn numbers(#[case] value: f64, #[case] expected: Vec<u8>) {
        let mut out = vec![];
        encode_number(&mut out, value);
        assert_eq!(out, expected);
    }

    #[rstest]
    #[case(10.3, 0.5, 10.0)]
    #[case(10.3, 0.0, 10.3)]
    #[case(10.05, 0.1, 10.0)]
    #[case(10.25, 0.1, 10.25)]
    fn coordinate_rounding(#[case] value: f64, #[case] tolerance: f64, #[case] expected: f64) {
        assert_eq!(round_coordinate(value, tolerance), expected);
    }

    #[test]
    fn empty_glyph_with_width() {
        let charstring = encode(&BezPath::new(), Some(-250.0), 0.5);
        assert_eq!(charstring.bytes, vec![251, 142, ENDCHAR]);
        let charstring = encode(&BezPath::new(), None, 0.5);
        assert_eq!(charstring.bytes, vec![ENDCHAR]);
    }

    #[test]
    fn box_outline() {
        let mut path = BezPath::new();
        path.move_to((10.0, 0.0));
        path.line_to((110.0, 0.0));
        path.line_to((110.0, 100.0));
        path.line_to((10.0, 100.0));
        path.close_path();
        let charstring = encode(&path, Some(100.0), 0.5);
        assert_eq!(
            charstring.bytes,
            vec![
                239, 149, HMOVETO, // width 100, dx 10
                239, HLINETO, // right
                239, VLINETO, // up
                39, HLINETO, // left
                ENDCHAR
            ]
        );
        assert_eq!(charstring.path.elements().len(), 5);
    }

    #[test]
    fn deltas_use_rounded_points() {
        let mut path = BezPath::new();
        path.move_to((0.4, 0.4));
        path.line_to((10.4, 0.4));
        path.line_to((20.4, 0.4));
        path.close_path();
        let charstring = encode(&path, None, 0.5);
        // The move rounds to the origin, then two 10-unit lines
        assert_eq!(
            charstring.bytes,
            vec![139, HMOVETO, 149, HLINETO, 149, HLINETO, ENDCHAR]
        );
    }

    #[test]
    fn quadratics_are_elevated() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.quad_to((150.0, 300.0), (300.0, 0.0));
        path.close_path();
        let charstring = encode(&path, None, 0.5);
        assert!(charstring.bytes.contains(&RRCURVETO));
        assert!(matches!(
            charstring.path.elements()[1],
            PathEl::CurveTo(c1, c2, _) if c1 == Point::new(100.0, 200.0) && c2 == Point::new(200.0, 200.0)
        ));
    }
}
