mod propagateanchors;
mod skipexport;

pub use propagateanchors::{propagate_anchors, PropagateAnchors};
pub use skipexport::SkipExportGlyphs;

pub trait FontFilter {
    fn apply(&self, font: &mut crate::Font) -> Result<(), crate::FontbakeError>;
}
