use crate::{filters::FontFilter, Font, FontbakeError};
use smol_str::SmolStr;
use std::collections::HashSet;

/// Remove the glyphs listed in `public.skipExportGlyphs`, decomposing any
/// components which refer to them first.
pub struct SkipExportGlyphs;

impl FontFilter for SkipExportGlyphs {
    fn apply(&self, font: &mut Font) -> Result<(), FontbakeError> {
        let skipped: HashSet<SmolStr> = font
            .lib
            .skip_export_glyphs
            .iter()
            .filter(|name| font.glyphs.contains_key(*name))
            .cloned()
            .collect();
        if skipped.is_empty() {
            return Ok(());
        }
        log::info!("Skipping export of {} glyphs", skipped.len());
        let names: Vec<SmolStr> = font.glyphs.keys().cloned().collect();
        for name in names.iter().filter(|n| !skipped.contains(*n)) {
            font.glyphs
                .decompose_components_where(name, |c| skipped.contains(&c.reference))?;
        }
        font.glyphs.retain(|name, _| !skipped.contains(name));
        for members in font.groups.values_mut() {
            members.retain(|g| !skipped.contains(g));
        }
        font.kerning
            .retain(|(left, right), _| !skipped.contains(left) && !skipped.contains(right));
        font.lib.glyph_order.retain(|g| !skipped.contains(g));
        Ok(())
    }
}
