use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

mod node;
pub use node::{Node, NodeType};

/// Horizontal direction of a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "LTR")]
    LeftToRight,
    #[serde(rename = "RTL")]
    RightToLeft,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::LeftToRight => "LTR",
            Direction::RightToLeft => "RTL",
        }
    }
}

/// Character-level bidirectional type, collapsed to strong left or right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BidiType {
    L,
    R,
}

/// Round the way the OpenType tooling does: `floor(v + 0.5)`.
pub fn ot_round<T: ToPrimitive>(value: T) -> i32 {
    (value.to_f64().unwrap_or_default() + 0.5).floor() as i32
}

/// Round `value` to the nearest multiple of `factor`, halves going away
/// from zero.
pub fn quantize(value: f64, factor: f64) -> f64 {
    if factor <= 0.0 || factor == 1.0 {
        return value.round();
    }
    factor * (value / factor).round()
}
