use crate::{common::ot_round, glyph::GlyphCategory, FontbakeError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Default value of the Private DICT BlueScale
pub const DEFAULT_BLUE_SCALE: f64 = 0.039625;

/// An explicit `name` table record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRecord {
    #[serde(rename = "nameID")]
    pub name_id: u16,
    #[serde(rename = "platformID")]
    pub platform_id: u16,
    #[serde(rename = "encodingID")]
    pub encoding_id: u16,
    #[serde(rename = "languageID")]
    pub language_id: u16,
    pub string: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaspRangeRecord {
    #[serde(rename = "rangeMaxPPEM")]
    pub range_max_ppem: u16,
    #[serde(default)]
    pub range_gasp_behavior: Vec<u8>,
}

/// Font-wide information, keyed the way UFO `fontinfo.plist` keys it.
///
/// Anything not listed here ends up in `extra` and is carried through
/// untouched. Most fields have a fallback, computed from other fields the
/// way the OpenType compilers conventionally do; ask for those through the
/// accessor methods rather than reading the field directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontInfo {
    pub family_name: Option<String>,
    pub style_name: Option<String>,
    pub style_map_family_name: Option<String>,
    pub style_map_style_name: Option<String>,
    pub version_major: Option<i32>,
    pub version_minor: Option<u32>,
    pub copyright: Option<String>,
    pub trademark: Option<String>,
    pub note: Option<String>,

    pub units_per_em: Option<f64>,
    pub ascender: Option<f64>,
    pub descender: Option<f64>,
    pub x_height: Option<f64>,
    pub cap_height: Option<f64>,
    pub italic_angle: Option<f64>,

    pub open_type_head_created: Option<String>,
    pub open_type_head_flags: Option<Vec<u8>>,
    #[serde(rename = "openTypeHeadLowestRecPPEM")]
    pub open_type_head_lowest_rec_ppem: Option<u16>,

    pub open_type_hhea_ascender: Option<i32>,
    pub open_type_hhea_descender: Option<i32>,
    pub open_type_hhea_line_gap: Option<i32>,
    pub open_type_hhea_caret_slope_rise: Option<i32>,
    pub open_type_hhea_caret_slope_run: Option<i32>,
    pub open_type_hhea_caret_offset: Option<i32>,

    pub open_type_vhea_vert_typo_ascender: Option<i32>,
    pub open_type_vhea_vert_typo_descender: Option<i32>,
    pub open_type_vhea_vert_typo_line_gap: Option<i32>,
    pub open_type_vhea_caret_slope_rise: Option<i32>,
    pub open_type_vhea_caret_slope_run: Option<i32>,
    pub open_type_vhea_caret_offset: Option<i32>,

    pub open_type_name_designer: Option<String>,
    #[serde(rename = "openTypeNameDesignerURL")]
    pub open_type_name_designer_url: Option<String>,
    pub open_type_name_manufacturer: Option<String>,
    #[serde(rename = "openTypeNameManufacturerURL")]
    pub open_type_name_manufacturer_url: Option<String>,
    pub open_type_name_license: Option<String>,
    #[serde(rename = "openTypeNameLicenseURL")]
    pub open_type_name_license_url: Option<String>,
    pub open_type_name_version: Option<String>,
    #[serde(rename = "openTypeNameUniqueID")]
    pub open_type_name_unique_id: Option<String>,
    pub open_type_name_description: Option<String>,
    pub open_type_name_preferred_family_name: Option<String>,
    pub open_type_name_preferred_subfamily_name: Option<String>,
    pub open_type_name_compatible_full_name: Option<String>,
    pub open_type_name_sample_text: Option<String>,
    #[serde(rename = "openTypeNameWWSFamilyName")]
    pub open_type_name_wws_family_name: Option<String>,
    #[serde(rename = "openTypeNameWWSSubfamilyName")]
    pub open_type_name_wws_subfamily_name: Option<String>,
    pub open_type_name_records: Option<Vec<NameRecord>>,

    #[serde(rename = "openTypeOS2WidthClass")]
    pub open_type_os2_width_class: Option<u16>,
    #[serde(rename = "openTypeOS2WeightClass")]
    pub open_type_os2_weight_class: Option<u16>,
    #[serde(rename = "openTypeOS2Selection")]
    pub open_type_os2_selection: Option<Vec<u8>>,
    #[serde(rename = "openTypeOS2VendorID")]
    pub open_type_os2_vendor_id: Option<String>,
    #[serde(rename = "openTypeOS2Panose")]
    pub open_type_os2_panose: Option<Vec<u8>>,
    #[serde(rename = "openTypeOS2FamilyClass")]
    pub open_type_os2_family_class: Option<Vec<u8>>,
    #[serde(rename = "openTypeOS2UnicodeRanges")]
    pub open_type_os2_unicode_ranges: Option<Vec<u8>>,
    #[serde(rename = "openTypeOS2CodePageRanges")]
    pub open_type_os2_code_page_ranges: Option<Vec<u32>>,
    #[serde(rename = "openTypeOS2TypoAscender")]
    pub open_type_os2_typo_ascender: Option<i32>,
    #[serde(rename = "openTypeOS2TypoDescender")]
    pub open_type_os2_typo_descender: Option<i32>,
    #[serde(rename = "openTypeOS2TypoLineGap")]
    pub open_type_os2_typo_line_gap: Option<i32>,
    #[serde(rename = "openTypeOS2WinAscent")]
    pub open_type_os2_win_ascent: Option<i32>,
    #[serde(rename = "openTypeOS2WinDescent")]
    pub open_type_os2_win_descent: Option<i32>,
    #[serde(rename = "openTypeOS2Type")]
    pub open_type_os2_type: Option<Vec<u8>>,
    #[serde(rename = "openTypeOS2SubscriptXSize")]
    pub open_type_os2_subscript_x_size: Option<i32>,
    #[serde(rename = "openTypeOS2SubscriptYSize")]
    pub open_type_os2_subscript_y_size: Option<i32>,
    #[serde(rename = "openTypeOS2SubscriptXOffset")]
    pub open_type_os2_subscript_x_offset: Option<i32>,
    #[serde(rename = "openTypeOS2SubscriptYOffset")]
    pub open_type_os2_subscript_y_offset: Option<i32>,
    #[serde(rename = "openTypeOS2SuperscriptXSize")]
    pub open_type_os2_superscript_x_size: Option<i32>,
    #[serde(rename = "openTypeOS2SuperscriptYSize")]
    pub open_type_os2_superscript_y_size: Option<i32>,
    #[serde(rename = "openTypeOS2SuperscriptXOffset")]
    pub open_type_os2_superscript_x_offset: Option<i32>,
    #[serde(rename = "openTypeOS2SuperscriptYOffset")]
    pub open_type_os2_superscript_y_offset: Option<i32>,
    #[serde(rename = "openTypeOS2StrikeoutSize")]
    pub open_type_os2_strikeout_size: Option<i32>,
    #[serde(rename = "openTypeOS2StrikeoutPosition")]
    pub open_type_os2_strikeout_position: Option<i32>,

    pub open_type_gasp_range_records: Option<Vec<GaspRangeRecord>>,

    pub postscript_font_name: Option<String>,
    pub postscript_full_name: Option<String>,
    pub postscript_weight_name: Option<String>,
    pub postscript_underline_thickness: Option<f64>,
    pub postscript_underline_position: Option<f64>,
    pub postscript_is_fixed_pitch: Option<bool>,
    pub postscript_blue_values: Option<Vec<f64>>,
    pub postscript_other_blues: Option<Vec<f64>>,
    pub postscript_family_blues: Option<Vec<f64>>,
    pub postscript_family_other_blues: Option<Vec<f64>>,
    pub postscript_stem_snap_h: Option<Vec<f64>>,
    pub postscript_stem_snap_v: Option<Vec<f64>>,
    pub postscript_blue_fuzz: Option<f64>,
    pub postscript_blue_shift: Option<f64>,
    pub postscript_blue_scale: Option<f64>,
    pub postscript_force_bold: Option<bool>,
    #[serde(rename = "postscriptDefaultWidthX")]
    pub postscript_default_width_x: Option<f64>,
    #[serde(rename = "postscriptNominalWidthX")]
    pub postscript_nominal_width_x: Option<f64>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

const STYLE_MAP_STYLES: [&str; 4] = ["regular", "bold", "italic", "bold italic"];

impl FontInfo {
    pub fn upm(&self) -> f64 {
        self.units_per_em.unwrap_or(1000.0)
    }

    pub fn version(&self) -> (i32, u32) {
        (
            self.version_major.unwrap_or(0),
            self.version_minor.unwrap_or(0),
        )
    }

    pub fn ascender(&self) -> f64 {
        self.ascender
            .unwrap_or_else(|| ot_round(self.upm() * 0.8) as f64)
    }

    pub fn descender(&self) -> f64 {
        self.descender
            .unwrap_or_else(|| -(ot_round(self.upm() * 0.2) as f64))
    }

    pub fn x_height(&self) -> f64 {
        self.x_height
            .unwrap_or_else(|| ot_round(self.upm() * 0.5) as f64)
    }

    pub fn cap_height(&self) -> f64 {
        self.cap_height
            .unwrap_or_else(|| ot_round(self.upm() * 0.7) as f64)
    }

    pub fn italic_angle(&self) -> f64 {
        self.italic_angle.unwrap_or(0.0)
    }

    pub fn family_name(&self) -> &str {
        self.family_name.as_deref().unwrap_or("New Font")
    }

    pub fn style_name(&self) -> &str {
        self.style_name.as_deref().unwrap_or("Regular")
    }

    pub fn preferred_family_name(&self) -> &str {
        self.open_type_name_preferred_family_name
            .as_deref()
            .unwrap_or_else(|| self.family_name())
    }

    pub fn preferred_subfamily_name(&self) -> &str {
        self.open_type_name_preferred_subfamily_name
            .as_deref()
            .unwrap_or_else(|| self.style_name())
    }

    pub fn style_map_family_name(&self) -> String {
        if let Some(name) = &self.style_map_family_name {
            return name.clone();
        }
        let family = self.preferred_family_name();
        let style = self.preferred_subfamily_name();
        if STYLE_MAP_STYLES.contains(&style.to_lowercase().as_str()) {
            family.to_string()
        } else {
            format!("{} {}", family, style)
        }
    }

    /// One of `regular`, `bold`, `italic` or `bold italic`
    pub fn style_map_style_name(&self) -> String {
        if let Some(name) = &self.style_map_style_name {
            return name.to_lowercase();
        }
        let style = self.preferred_subfamily_name().to_lowercase();
        if STYLE_MAP_STYLES.contains(&style.as_str()) {
            style
        } else {
            "regular".to_string()
        }
    }

    pub fn version_string(&self) -> String {
        if let Some(version) = &self.open_type_name_version {
            return version.clone();
        }
        let (major, minor) = self.version();
        format!("Version {}.{:03}", major, minor)
    }

    pub fn vendor_id(&self) -> &str {
        self.open_type_os2_vendor_id.as_deref().unwrap_or("NONE")
    }

    pub fn postscript_font_name(&self) -> String {
        if let Some(name) = &self.postscript_font_name {
            return name.clone();
        }
        normalize_for_postscript(
            &format!(
                "{}-{}",
                self.preferred_family_name(),
                self.preferred_subfamily_name()
            ),
            false,
        )
    }

    pub fn postscript_full_name(&self) -> String {
        self.postscript_full_name.clone().unwrap_or_else(|| {
            format!(
                "{} {}",
                self.preferred_family_name(),
                self.preferred_subfamily_name()
            )
        })
    }

    pub fn unique_id(&self) -> String {
        if let Some(id) = &self.open_type_name_unique_id {
            return id.clone();
        }
        let version = self.version_string();
        let version = version.strip_prefix("Version ").unwrap_or(&version);
        format!(
            "{};{};{}",
            version,
            self.vendor_id(),
            self.postscript_font_name()
        )
    }

    pub fn typo_ascender(&self) -> i32 {
        self.open_type_os2_typo_ascender
            .unwrap_or_else(|| ot_round(self.ascender()))
    }

    pub fn typo_descender(&self) -> i32 {
        self.open_type_os2_typo_descender
            .unwrap_or_else(|| ot_round(self.descender()))
    }

    pub fn typo_line_gap(&self) -> i32 {
        self.open_type_os2_typo_line_gap.unwrap_or_else(|| {
            let total = (self.upm() * 1.2) as i32;
            (total - self.typo_ascender() + self.typo_descender()).max(0)
        })
    }

    pub fn win_ascent(&self) -> u16 {
        self.open_type_os2_win_ascent
            .unwrap_or_else(|| self.typo_ascender() + self.typo_line_gap())
            .unsigned_abs() as u16
    }

    pub fn win_descent(&self) -> u16 {
        self.open_type_os2_win_descent
            .unwrap_or_else(|| self.typo_descender())
            .unsigned_abs() as u16
    }

    pub fn hhea_ascender(&self) -> i32 {
        self.open_type_hhea_ascender
            .unwrap_or_else(|| self.typo_ascender() + self.typo_line_gap())
    }

    pub fn hhea_descender(&self) -> i32 {
        self.open_type_hhea_descender
            .unwrap_or_else(|| self.typo_descender())
    }

    pub fn hhea_line_gap(&self) -> i32 {
        self.open_type_hhea_line_gap.unwrap_or(0)
    }

    pub fn hhea_caret_slope_rise(&self) -> i32 {
        if let Some(rise) = self.open_type_hhea_caret_slope_rise {
            return rise;
        }
        let angle = self.italic_angle();
        if angle == 0.0 {
            return 1;
        }
        match self.open_type_hhea_caret_slope_run {
            Some(run) => ot_round(run as f64 / (-angle).to_radians().tan()),
            None => 1000,
        }
    }

    pub fn hhea_caret_slope_run(&self) -> i32 {
        if let Some(run) = self.open_type_hhea_caret_slope_run {
            return run;
        }
        let angle = self.italic_angle();
        if angle == 0.0 {
            return 0;
        }
        ot_round((-angle).to_radians().tan() * self.hhea_caret_slope_rise() as f64)
    }

    pub fn has_vertical_metrics(&self) -> bool {
        self.open_type_vhea_vert_typo_ascender.is_some()
            && self.open_type_vhea_vert_typo_descender.is_some()
            && self.open_type_vhea_vert_typo_line_gap.is_some()
    }

    pub fn underline_thickness(&self) -> f64 {
        self.postscript_underline_thickness
            .unwrap_or_else(|| self.upm() * 0.05)
    }

    pub fn underline_position(&self) -> f64 {
        self.postscript_underline_position
            .unwrap_or_else(|| self.upm() * -0.075)
    }

    pub fn is_fixed_pitch(&self) -> bool {
        self.postscript_is_fixed_pitch.unwrap_or(false)
    }

    pub fn blue_scale(&self) -> f64 {
        if let Some(scale) = self.postscript_blue_scale {
            return scale;
        }
        let max_zone_height = [&self.postscript_blue_values, &self.postscript_other_blues]
            .into_iter()
            .flatten()
            .flat_map(|zones| zones.chunks_exact(2))
            .map(|pair| (pair[1] - pair[0]).abs())
            .fold(0.0, f64::max);
        if max_zone_height == 0.0 {
            DEFAULT_BLUE_SCALE
        } else {
            3.0 / (4.0 * max_zone_height)
        }
    }

    pub fn blue_shift(&self) -> f64 {
        self.postscript_blue_shift.unwrap_or(7.0)
    }

    pub fn blue_fuzz(&self) -> f64 {
        self.postscript_blue_fuzz.unwrap_or(0.0)
    }
}

/// Strip a string down to the printable ASCII subset allowed in
/// PostScript names.
pub fn normalize_for_postscript(s: &str, allow_spaces: bool) -> String {
    s.chars()
        .filter(|c| !"[](){}<>/%".contains(*c))
        .filter(|&c| (33..=126).contains(&(c as u32)) || (allow_spaces && c == ' '))
        .collect()
}

/// A value of the `public.openTypeMeta` dictionary
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Text(String),
    Languages(Vec<String>),
    Data(Vec<u8>),
}

/// A layer of a color glyph: the glyph to draw and its palette index
#[derive(Debug, Clone, PartialEq)]
pub struct ColorLayer {
    pub glyph: SmolStr,
    pub palette_index: u16,
}

pub const KEY_GLYPH_ORDER: &str = "public.glyphOrder";
pub const KEY_SKIP_EXPORT: &str = "public.skipExportGlyphs";
pub const KEY_POSTSCRIPT_NAMES: &str = "public.postscriptNames";
pub const KEY_OPENTYPE_CATEGORIES: &str = "public.openTypeCategories";
pub const KEY_VARIATION_SEQUENCES: &str = "public.unicodeVariationSequences";
pub const KEY_OPENTYPE_META: &str = "public.openTypeMeta";
pub const KEY_COLOR_PALETTES: &str = "com.github.googlei18n.ufo2ft.colorPalettes";
pub const KEY_COLOR_LAYERS: &str = "com.github.googlei18n.ufo2ft.colorLayers";
pub const KEY_UNSUPPORTED_CODEPAGE_BITS: &str = "codePageRangesUnsupportedBits";
pub const KEY_KEEP_GLYPH_NAMES: &str = "com.fontbake.keepGlyphNames";

/// The font-level lib, with the keys the compiler understands pulled out
/// into typed fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontLib {
    pub glyph_order: Vec<SmolStr>,
    pub skip_export_glyphs: Vec<SmolStr>,
    pub postscript_names: IndexMap<SmolStr, String>,
    pub opentype_categories: IndexMap<SmolStr, GlyphCategory>,
    /// `(selector, codepoint) -> glyph`
    pub variation_sequences: BTreeMap<(u32, u32), SmolStr>,
    pub opentype_meta: IndexMap<String, MetaValue>,
    /// Palettes of RGBA colours, each component between 0 and 1
    pub color_palettes: Vec<Vec<[f64; 4]>>,
    pub color_layers: IndexMap<SmolStr, Vec<ColorLayer>>,
    pub unsupported_codepage_bits: Vec<u8>,
    pub keep_glyph_names: Option<bool>,
    pub extra: IndexMap<String, Value>,
}

fn invalid(key: &str, reason: impl Into<String>) -> FontbakeError {
    FontbakeError::InvalidLib {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn string_list(key: &str, value: &Value) -> Result<Vec<SmolStr>, FontbakeError> {
    value
        .as_array()
        .ok_or_else(|| invalid(key, "expected a list"))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(SmolStr::from)
                .ok_or_else(|| invalid(key, "expected a list of strings"))
        })
        .collect()
}

fn dictionary<'a>(
    key: &str,
    value: &'a Value,
) -> Result<&'a serde_json::Map<String, Value>, FontbakeError> {
    value
        .as_object()
        .ok_or_else(|| invalid(key, "expected a dictionary"))
}

impl FontLib {
    pub fn from_map(map: IndexMap<String, Value>) -> Result<Self, FontbakeError> {
        let mut lib = FontLib::default();
        for (key, value) in map {
            match key.as_str() {
                KEY_GLYPH_ORDER => lib.glyph_order = string_list(&key, &value)?,
                KEY_SKIP_EXPORT => lib.skip_export_glyphs = string_list(&key, &value)?,
                KEY_POSTSCRIPT_NAMES => {
                    for (glyph, name) in dictionary(&key, &value)? {
                        let name = name
                            .as_str()
                            .ok_or_else(|| invalid(&key, "production names must be strings"))?;
                        lib.postscript_names
                            .insert(glyph.into(), name.to_string());
                    }
                }
                KEY_OPENTYPE_CATEGORIES => {
                    for (glyph, category) in dictionary(&key, &value)? {
                        let category: GlyphCategory = serde_json::from_value(category.clone())
                            .map_err(|e| invalid(&key, e.to_string()))?;
                        lib.opentype_categories.insert(glyph.into(), category);
                    }
                }
                KEY_VARIATION_SEQUENCES => {
                    lib.variation_sequences = parse_variation_sequences(&key, &value)?
                }
                KEY_OPENTYPE_META => {
                    for (tag, meta) in dictionary(&key, &value)? {
                        lib.opentype_meta
                            .insert(tag.clone(), parse_meta_value(&key, meta)?);
                    }
                }
                KEY_COLOR_PALETTES => lib.color_palettes = parse_palettes(&key, &value)?,
                KEY_COLOR_LAYERS => lib.color_layers = parse_color_layers(&key, &value)?,
                KEY_UNSUPPORTED_CODEPAGE_BITS => {
                    lib.unsupported_codepage_bits = serde_json::from_value(value)
                        .map_err(|e| invalid(&key, e.to_string()))?
                }
                KEY_KEEP_GLYPH_NAMES => {
                    lib.keep_glyph_names = Some(
                        value
                            .as_bool()
                            .ok_or_else(|| invalid(&key, "expected a boolean"))?,
                    )
                }
                _ => {
                    lib.extra.insert(key, value);
                }
            }
        }
        Ok(lib)
    }
}

fn parse_variation_sequences(
    key: &str,
    value: &Value,
) -> Result<BTreeMap<(u32, u32), SmolStr>, FontbakeError> {
    let mut sequences = BTreeMap::new();
    for (selector, records) in dictionary(key, value)? {
        let selector = u32::from_str_radix(selector, 16)
            .map_err(|_| invalid(key, format!("bad variation selector {}", selector)))?;
        for (codepoint, glyph) in dictionary(key, records)? {
            let codepoint = u32::from_str_radix(codepoint, 16)
                .map_err(|_| invalid(key, format!("bad codepoint {}", codepoint)))?;
            let glyph = glyph
                .as_str()
                .ok_or_else(|| invalid(key, "glyph names must be strings"))?;
            sequences.insert((selector, codepoint), glyph.into());
        }
    }
    Ok(sequences)
}

fn parse_meta_value(key: &str, value: &Value) -> Result<MetaValue, FontbakeError> {
    match value {
        Value::String(s) => Ok(MetaValue::Text(s.clone())),
        Value::Array(items) if items.iter().all(|v| v.is_string()) => Ok(MetaValue::Languages(
            items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
        )),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| invalid(key, "meta data must be bytes or strings"))
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(MetaValue::Data),
        _ => Err(invalid(key, "meta values must be bytes or strings")),
    }
}

fn parse_palettes(key: &str, value: &Value) -> Result<Vec<Vec<[f64; 4]>>, FontbakeError> {
    let palettes: Vec<Vec<Vec<f64>>> =
        serde_json::from_value(value.clone()).map_err(|e| invalid(key, e.to_string()))?;
    palettes
        .into_iter()
        .map(|palette| {
            palette
                .into_iter()
                .map(|color| match color.as_slice() {
                    [r, g, b, a] => Ok([*r, *g, *b, *a]),
                    [r, g, b] => Ok([*r, *g, *b, 1.0]),
                    _ => Err(invalid(key, "colours need three or four components")),
                })
                .collect()
        })
        .collect()
}

fn parse_color_layers(
    key: &str,
    value: &Value,
) -> Result<IndexMap<SmolStr, Vec<ColorLayer>>, FontbakeError> {
    let mut layers = IndexMap::new();
    for (glyph, mapping) in dictionary(key, value)? {
        let Some(items) = mapping.as_array() else {
            return Err(FontbakeError::NotSupported(format!(
                "color paint graph for glyph {}; only layer lists can be compiled",
                glyph
            )));
        };
        let mut glyph_layers = vec![];
        for item in items {
            match item.as_array().map(|v| v.as_slice()) {
                Some([Value::String(layer_glyph), index]) => {
                    let palette_index = index
                        .as_u64()
                        .and_then(|i| u16::try_from(i).ok())
                        .ok_or_else(|| invalid(key, "palette indexes must fit in 16 bits"))?;
                    glyph_layers.push(ColorLayer {
                        glyph: layer_glyph.into(),
                        palette_index,
                    });
                }
                _ => return Err(invalid(key, "layers must be [glyph, paletteIndex] pairs")),
            }
        }
        layers.insert(glyph.into(), glyph_layers);
    }
    Ok(layers)
}
