use crate::common::ot_round;
use kurbo::{BezPath, PathEl, Rect, Shape};

/// An integer glyph or font bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl Bounds {
    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    pub fn width(&self) -> i32 {
        self.x_max - self.x_min
    }

    /// Whether `rect` lies inside these bounds, allowing `slack` units on each
    /// side
    pub fn contains_rect(&self, rect: Rect, slack: f64) -> bool {
        rect.min_x() >= self.x_min as f64 - slack
            && rect.min_y() >= self.y_min as f64 - slack
            && rect.max_x() <= self.x_max as f64 + slack
            && rect.max_y() <= self.y_max as f64 + slack
    }

    /// Smallest box holding all the points, each edge rounded to an integer
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Bounds> {
        let mut points = points.into_iter();
        let (x, y) = points.next()?;
        let (mut x_min, mut y_min, mut x_max, mut y_max) = (x, y, x, y);
        for (x, y) in points {
            x_min = x_min.min(x);
            y_min = y_min.min(y);
            x_max = x_max.max(x);
            y_max = y_max.max(y);
        }
        Some(Bounds {
            x_min: ot_round(x_min),
            y_min: ot_round(y_min),
            x_max: ot_round(x_max),
            y_max: ot_round(y_max),
        })
    }
}

/// Convert a coordinate to an integer. Within `tolerance` of the nearest
/// integer the value is rounded, otherwise `fallback` (floor or ceil) is
/// applied so that the result never shrinks the box.
pub fn to_int(value: f64, tolerance: f64, fallback: fn(f64) -> f64) -> i32 {
    let rounded = ot_round(value);
    if tolerance >= 0.5 || (rounded as f64 - value).abs() <= tolerance {
        rounded
    } else {
        fallback(value) as i32
    }
}

/// Bounds of a cubic outline, with the extrema computed exactly
pub fn cff_bounds(path: &BezPath, tolerance: f64) -> Option<Bounds> {
    if !path
        .elements()
        .iter()
        .any(|el| !matches!(el, PathEl::MoveTo(_) | PathEl::ClosePath))
    {
        return None;
    }
    let rect = path.bounding_box();
    Some(Bounds {
        x_min: to_int(rect.min_x(), tolerance, f64::floor),
        y_min: to_int(rect.min_y(), tolerance, f64::floor),
        x_max: to_int(rect.max_x(), tolerance, f64::ceil),
        y_max: to_int(rect.max_y(), tolerance, f64::ceil),
    })
}

/// Union of all glyph bounds; an empty font gets an all-zero box
pub fn font_bounds<'a>(bounds: impl IntoIterator<Item = &'a Option<Bounds>>) -> Bounds {
    bounds
        .into_iter()
        .flatten()
        .copied()
        .reduce(Bounds::union)
        .unwrap_or(Bounds {
            x_min: 0,
            y_min: 0,
            x_max: 0,
            y_max: 0,
        })
}
