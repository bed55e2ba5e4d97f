use crate::{
    info::{FontInfo, FontLib},
    Anchor, Component, Font, FontbakeError, Glyph, GlyphCategory, Path,
};
use indexmap::IndexMap;
use serde_json::Value;
use smol_str::SmolStr;

/// Glyph lib key holding a category hint ("Letter", "Mark"...)
pub const KEY_GLYPH_CATEGORY: &str = "com.schriftgestaltung.Glyphs.category";
/// Glyph lib key holding a subcategory hint ("Nonspacing", "Ligature"...)
pub const KEY_GLYPH_SUBCATEGORY: &str = "com.schriftgestaltung.Glyphs.subCategory";
/// Glyph lib key holding a GDEF class which overrides anything derived
pub const KEY_GLYPH_OPENTYPE_CATEGORY: &str = "com.fontbake.openTypeCategory";
pub const KEY_VERTICAL_ORIGIN: &str = "public.verticalOrigin";

fn plist_to_map(lib: &norad::Plist) -> Result<IndexMap<String, Value>, FontbakeError> {
    Ok(serde_json::from_value(serde_json::to_value(lib)?)?)
}

/// Load the default layer of a UFO, with its font info, lib, groups,
/// kerning and feature code.
pub fn load<T: AsRef<std::path::Path>>(path: T) -> Result<Font, FontbakeError> {
    let path = path.as_ref();
    let ufo = norad::Font::load(path)?;
    let mut font = Font::new();
    font.info = load_font_info(&ufo.font_info)?;
    font.lib = FontLib::from_map(plist_to_map(&ufo.lib)?)?;
    for glyph in ufo.default_layer().iter() {
        font.glyphs.insert(load_glyph(glyph)?);
    }
    font.groups = ufo
        .groups
        .iter()
        .map(|(name, members)| {
            (
                SmolStr::from(name.as_str()),
                members.iter().map(|m| SmolStr::from(m.as_str())).collect(),
            )
        })
        .collect();
    for (left, seconds) in ufo.kerning.iter() {
        for (right, value) in seconds.iter() {
            font.kerning.insert(
                (SmolStr::from(left.as_str()), SmolStr::from(right.as_str())),
                *value,
            );
        }
    }
    font.features = ufo.features.clone();
    font.source = Some(path.to_path_buf());
    log::info!(
        "Loaded {} glyphs and {} kerning pairs from {}",
        font.glyphs.len(),
        font.kerning.len(),
        path.display()
    );
    Ok(font)
}

/// norad's font info serializes with the fontinfo.plist key names, which
/// is what [`FontInfo`] reads
pub(crate) fn load_font_info(info: &norad::FontInfo) -> Result<FontInfo, FontbakeError> {
    Ok(serde_json::from_value(serde_json::to_value(info)?)?)
}

pub(crate) fn load_glyph(glyph: &norad::Glyph) -> Result<Glyph, FontbakeError> {
    let lib = plist_to_map(&glyph.lib)?;
    let string = |key: &str| lib.get(key).and_then(Value::as_str).map(str::to_string);
    let opentype_category: Option<GlyphCategory> = lib
        .get(KEY_GLYPH_OPENTYPE_CATEGORY)
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| FontbakeError::InvalidLib {
            key: KEY_GLYPH_OPENTYPE_CATEGORY.to_string(),
            reason: format!("glyph {}: {}", glyph.name(), e),
        })?;
    Ok(Glyph {
        name: SmolStr::from(glyph.name().as_str()),
        width: glyph.width,
        height: (glyph.height != 0.0).then_some(glyph.height),
        codepoints: glyph.codepoints.iter().map(|c| c as u32).collect(),
        contours: glyph.contours.iter().map(Path::from).collect(),
        components: glyph.components.iter().map(Component::from).collect(),
        anchors: glyph.anchors.iter().map(Anchor::from).collect(),
        category: string(KEY_GLYPH_CATEGORY),
        subcategory: string(KEY_GLYPH_SUBCATEGORY),
        opentype_category,
        vertical_origin: lib.get(KEY_VERTICAL_ORIGIN).and_then(Value::as_f64),
        lib,
    })
}
