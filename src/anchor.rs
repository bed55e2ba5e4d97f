use crate::FontbakeError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Prefix which turns an anchor into the attaching side of a mark
pub const MARK_PREFIX: &str = "_";
/// Separator between an anchor key and its ligature component number
pub const LIGA_SEPARATOR: &str = "_";
pub const CARET_PREFIX: &str = "caret_";
pub const VCARET_PREFIX: &str = "vcaret_";
pub const ENTRY_NAME: &str = "entry";
pub const EXIT_NAME: &str = "exit";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
    pub name: String,
}

impl Anchor {
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Anchor {
            x,
            y,
            name: name.into(),
        }
    }

    pub fn is_mark(&self) -> bool {
        self.name.starts_with(MARK_PREFIX)
    }

    pub fn transformed(&self, affine: kurbo::Affine) -> Self {
        let pt = affine * kurbo::Point::new(self.x, self.y);
        Anchor {
            x: pt.x,
            y: pt.y,
            name: self.name.clone(),
        }
    }
}

/// The structured reading of an anchor name.
///
/// `top` is a base anchor with key `top`; `_top` is the mark anchor which
/// attaches to it; `top_2` is the `top` anchor of the second component of
/// a ligature; `_2` on its own marks the second ligature component as
/// having no attachment point at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnchorName {
    pub key: SmolStr,
    pub is_mark: bool,
    pub number: Option<u32>,
}

impl AnchorName {
    /// Parse an anchor name.
    pub fn parse(name: &str) -> Result<Self, FontbakeError> {
        let (mut key, number) = split_ligature_number(name);
        if let Some(number) = number {
            if number < 1 {
                return Err(FontbakeError::InvalidAnchorName {
                    name: name.to_string(),
                    reason: "ligature component indexes must start from 1".to_string(),
                });
            }
        }
        let is_mark = name.starts_with(MARK_PREFIX) && !key.is_empty();
        if is_mark {
            if number.is_some() {
                return Err(FontbakeError::InvalidAnchorName {
                    name: name.to_string(),
                    reason: "mark anchor cannot be numbered".to_string(),
                });
            }
            key = &key[MARK_PREFIX.len()..];
            if key.is_empty() {
                return Err(FontbakeError::InvalidAnchorName {
                    name: name.to_string(),
                    reason: "mark anchor key is empty".to_string(),
                });
            }
        }
        Ok(AnchorName {
            key: key.into(),
            is_mark,
            number,
        })
    }

    /// Turn the structured name back into its string form.
    pub fn format(&self) -> String {
        let mut name = String::new();
        if self.is_mark {
            name.push_str(MARK_PREFIX);
        }
        name.push_str(&self.key);
        if let Some(number) = self.number {
            name.push_str(LIGA_SEPARATOR);
            name.push_str(&number.to_string());
        }
        name
    }

    /// The name of the anchor on the other side of the attachment
    pub fn mark_counterpart(&self) -> String {
        format!("{}{}", MARK_PREFIX, self.key)
    }
}

// "top_12" -> ("top", Some(12)); "top12" -> ("top12", None); "_3" -> ("", Some(3))
fn split_ligature_number(name: &str) -> (&str, Option<u32>) {
    let digits = name
        .bytes()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return (name, None);
    }
    let (head, tail) = name.split_at(name.len() - digits);
    match (head.strip_suffix(LIGA_SEPARATOR), tail.parse::<u32>()) {
        (Some(key), Ok(number)) => (key, Some(number)),
        _ => (name, None),
    }
}

/// Which caret list, if any, an anchor contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretKind {
    Horizontal,
    Vertical,
}

pub fn caret_kind(name: &str) -> Option<CaretKind> {
    if name.starts_with(CARET_PREFIX) {
        Some(CaretKind::Horizontal)
    } else if name.starts_with(VCARET_PREFIX) {
        Some(CaretKind::Vertical)
    } else {
        None
    }
}

#[cfg(feature = "ufo")]
mod ufo {
    use super::*;

    impl From<&norad::Anchor> for Anchor {
        fn from(a: &norad::Anchor) -> Self {
            Anchor {
                x: a.x,
                y: a.y,
                name: a.name.as_ref().map(|x| x.to_string()).unwrap_or_default(),
            }
        }
    }
}
