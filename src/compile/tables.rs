//! The metrics and bookkeeping tables: everything that is not an outline,
//! a character map or a name.
use super::{bounds::Bounds, table_error};
use crate::{
    common::ot_round,
    glyph::GlyphSet,
    info::{FontInfo, FontLib, MetaValue},
    FontbakeError,
};
use chrono::NaiveDateTime;
use smol_str::SmolStr;
use write_fonts::{
    dump_table,
    tables::{
        gasp::{Gasp, GaspRange, GaspRangeBehavior},
        head::{Flags, Head, MacStyle},
        hhea::Hhea,
        hmtx::{Hmtx, LongMetric},
        maxp::Maxp,
        meta::{DataMapRecord, Meta, Metadata, ScriptLangTag, DLNG, SLNG},
        post::Post,
        vhea::Vhea,
        vmtx::Vmtx,
    },
    types::{FWord, Fixed, LongDateTime, Tag, UfWord, Version16Dot16},
};

/// Seconds between 1904-01-01 and the Unix epoch
const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

const HEAD_CREATED_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// The creation time in seconds since 1904, from `openTypeHeadCreated`,
/// then `SOURCE_DATE_EPOCH`, then the clock
fn head_timestamp(info: &FontInfo) -> i64 {
    if let Some(created) = &info.open_type_head_created {
        match NaiveDateTime::parse_from_str(created, HEAD_CREATED_FORMAT) {
            Ok(date) => return date.and_utc().timestamp() + MAC_EPOCH_OFFSET,
            Err(e) => log::warn!("Ignoring openTypeHeadCreated {:?}: {}", created, e),
        }
    }
    if let Ok(epoch) = std::env::var("SOURCE_DATE_EPOCH") {
        match epoch.trim().parse::<i64>() {
            Ok(seconds) => return seconds + MAC_EPOCH_OFFSET,
            Err(_) => log::warn!("Ignoring unparseable SOURCE_DATE_EPOCH {:?}", epoch),
        }
    }
    chrono::Utc::now().timestamp() + MAC_EPOCH_OFFSET
}

fn font_revision(info: &FontInfo) -> f64 {
    let (major, minor) = info.version();
    let digits = minor.checked_ilog10().map_or(1, |d| d + 1);
    if digits > 3 {
        log::warn!(
            "versionMinor {} has more than three digits; fontRevision will not round-trip",
            minor
        );
    }
    major as f64 + minor as f64 / 10f64.powi(digits.max(3) as i32)
}

fn bits_to_u16(bits: &[u8]) -> u16 {
    bits.iter()
        .filter(|&&bit| bit < 16)
        .fold(0, |acc, &bit| acc | (1 << bit))
}

pub fn build_head(
    info: &FontInfo,
    font_bbox: Bounds,
    index_to_loc_format: i16,
) -> Result<Vec<u8>, FontbakeError> {
    let timestamp = LongDateTime::new(head_timestamp(info));
    let mut mac_style = MacStyle::empty();
    match info.style_map_style_name().as_str() {
        "bold" => mac_style |= MacStyle::BOLD,
        "italic" => mac_style |= MacStyle::ITALIC,
        "bold italic" => mac_style |= MacStyle::BOLD | MacStyle::ITALIC,
        _ => {}
    }
    let head = Head {
        font_revision: Fixed::from_f64(font_revision(info)),
        checksum_adjustment: 0,
        flags: Flags::from_bits_truncate(bits_to_u16(
            info.open_type_head_flags.as_deref().unwrap_or(&[0, 1]),
        )),
        units_per_em: ot_round(info.upm()) as u16,
        created: timestamp,
        modified: timestamp,
        x_min: font_bbox.x_min as i16,
        y_min: font_bbox.y_min as i16,
        x_max: font_bbox.x_max as i16,
        y_max: font_bbox.y_max as i16,
        mac_style,
        lowest_rec_ppem: info.open_type_head_lowest_rec_ppem.unwrap_or(6),
        font_direction_hint: 2,
        index_to_loc_format,
        ..Default::default()
    };
    dump_table(&head).map_err(|e| table_error("head", e))
}

pub fn build_hhea(
    info: &FontInfo,
    widths: &[i32],
    bounds: &[Option<Bounds>],
) -> Result<Vec<u8>, FontbakeError> {
    let bounded = || {
        widths
            .iter()
            .zip(bounds)
            .filter_map(|(width, bounds)| bounds.map(|b| (*width, b)))
    };
    let hhea = Hhea {
        ascender: FWord::new(info.hhea_ascender() as i16),
        descender: FWord::new(info.hhea_descender() as i16),
        line_gap: FWord::new(info.hhea_line_gap() as i16),
        advance_width_max: UfWord::new(widths.iter().copied().max().unwrap_or(0) as u16),
        min_left_side_bearing: FWord::new(
            bounded().map(|(_, b)| b.x_min).min().unwrap_or(0) as i16,
        ),
        min_right_side_bearing: FWord::new(
            bounded()
                .map(|(width, b)| width - b.x_max)
                .min()
                .unwrap_or(0) as i16,
        ),
        x_max_extent: FWord::new(bounded().map(|(_, b)| b.x_max).max().unwrap_or(0) as i16),
        caret_slope_rise: info.hhea_caret_slope_rise() as i16,
        caret_slope_run: info.hhea_caret_slope_run() as i16,
        caret_offset: info.open_type_hhea_caret_offset.unwrap_or(0) as i16,
        number_of_h_metrics: widths.len() as u16,
    };
    dump_table(&hhea).map_err(|e| table_error("hhea", e))
}

pub fn build_hmtx(widths: &[i32], bounds: &[Option<Bounds>]) -> Result<Vec<u8>, FontbakeError> {
    let hmtx = Hmtx {
        h_metrics: widths
            .iter()
            .zip(bounds)
            .map(|(width, bounds)| LongMetric {
                advance: *width as u16,
                side_bearing: bounds.map_or(0, |b| b.x_min) as i16,
            })
            .collect(),
        left_side_bearings: vec![],
    };
    dump_table(&hmtx).map_err(|e| table_error("hmtx", e))
}

/// Build `vhea` and `vmtx`, if the font has vertical metrics
pub fn build_vertical(
    info: &FontInfo,
    glyphs: &GlyphSet,
    order: &[SmolStr],
    bounds: &[Option<Bounds>],
) -> Result<Option<(Vec<u8>, Vec<u8>)>, FontbakeError> {
    if !info.has_vertical_metrics() {
        return Ok(None);
    }
    let default_height = info.ascender() - info.descender();
    let default_origin = info.typo_ascender() as f64;
    let mut metrics = Vec::with_capacity(order.len());
    for (name, bounds) in order.iter().zip(bounds) {
        let glyph = glyphs.get(name);
        let height = ot_round(glyph.and_then(|g| g.height).unwrap_or(default_height));
        let origin = ot_round(
            glyph
                .and_then(|g| g.vertical_origin)
                .unwrap_or(default_origin),
        );
        let top_side_bearing = bounds.map_or(0, |b| origin - b.y_max);
        metrics.push((height, top_side_bearing, *bounds));
    }

    let bounded = || {
        metrics
            .iter()
            .filter_map(|(height, tsb, bounds)| bounds.map(|b| (*height, *tsb, b)))
    };
    let vhea = Vhea {
        ascender: FWord::new(info.open_type_vhea_vert_typo_ascender.unwrap_or(0) as i16),
        descender: FWord::new(info.open_type_vhea_vert_typo_descender.unwrap_or(0) as i16),
        line_gap: FWord::new(info.open_type_vhea_vert_typo_line_gap.unwrap_or(0) as i16),
        advance_height_max: UfWord::new(
            metrics.iter().map(|m| m.0).max().unwrap_or(0) as u16,
        ),
        min_top_side_bearing: FWord::new(
            bounded().map(|(_, tsb, _)| tsb).min().unwrap_or(0) as i16,
        ),
        min_bottom_side_bearing: FWord::new(
            bounded()
                .map(|(height, tsb, b)| height - tsb - (b.y_max - b.y_min))
                .min()
                .unwrap_or(0) as i16,
        ),
        y_max_extent: FWord::new(
            bounded()
                .map(|(_, tsb, b)| tsb + (b.y_max - b.y_min))
                .max()
                .unwrap_or(0) as i16,
        ),
        caret_slope_rise: info.open_type_vhea_caret_slope_rise.unwrap_or(0) as i16,
        caret_slope_run: info.open_type_vhea_caret_slope_run.unwrap_or(1) as i16,
        caret_offset: info.open_type_vhea_caret_offset.unwrap_or(0) as i16,
        number_of_long_ver_metrics: metrics.len() as u16,
    };
    let vmtx = Vmtx {
        v_metrics: metrics
            .iter()
            .map(|(height, tsb, _)| LongMetric {
                advance: *height as u16,
                side_bearing: *tsb as i16,
            })
            .collect(),
        top_side_bearings: vec![],
    };
    Ok(Some((
        dump_table(&vhea).map_err(|e| table_error("vhea", e))?,
        dump_table(&vmtx).map_err(|e| table_error("vmtx", e))?,
    )))
}

/// `maxp` version 0.5, for fonts without TrueType outlines
pub fn build_maxp_cff(num_glyphs: u16) -> Result<Vec<u8>, FontbakeError> {
    let maxp = Maxp {
        num_glyphs,
        ..Default::default()
    };
    dump_table(&maxp).map_err(|e| table_error("maxp", e))
}

/// Build `post`; with `glyph_names` it is a version 2 table, otherwise
/// version 3
pub fn build_post(info: &FontInfo, glyph_names: Option<&[&str]>) -> Result<Vec<u8>, FontbakeError> {
    let mut post = Post::default();
    post.version = Version16Dot16::VERSION_3_0;
    post.italic_angle = Fixed::from_f64(info.italic_angle());
    post.underline_position = FWord::new(ot_round(info.underline_position()) as i16);
    post.underline_thickness = FWord::new(ot_round(info.underline_thickness()) as i16);
    post.is_fixed_pitch = info.is_fixed_pitch() as u32;
    if let Some(names) = glyph_names {
        post.set_glyph_names(names.iter().copied());
    }
    dump_table(&post).map_err(|e| table_error("post", e))
}

pub fn build_gasp(info: &FontInfo) -> Result<Option<Vec<u8>>, FontbakeError> {
    let Some(records) = &info.open_type_gasp_range_records else {
        return Ok(None);
    };
    let mut ranges: Vec<GaspRange> = records
        .iter()
        .map(|record| GaspRange {
            range_max_ppem: record.range_max_ppem,
            range_gasp_behavior: GaspRangeBehavior::from_bits_truncate(bits_to_u16(
                &record.range_gasp_behavior,
            )),
        })
        .collect();
    ranges.sort_by_key(|range| range.range_max_ppem);
    let version = if ranges
        .iter()
        .any(|range| range.range_gasp_behavior.bits() > 0b11)
    {
        1
    } else {
        0
    };
    let gasp = Gasp {
        version,
        num_ranges: ranges.len() as u16,
        gasp_ranges: ranges,
    };
    dump_table(&gasp).map(Some).map_err(|e| table_error("gasp", e))
}

fn meta_error(reason: String) -> FontbakeError {
    FontbakeError::InvalidLib {
        key: crate::info::KEY_OPENTYPE_META.to_string(),
        reason,
    }
}

pub fn build_meta(lib: &FontLib) -> Result<Option<Vec<u8>>, FontbakeError> {
    if lib.opentype_meta.is_empty() {
        return Ok(None);
    }
    let mut records = vec![];
    for (tag, value) in lib.opentype_meta.iter() {
        let tag = Tag::new_checked(tag.as_bytes())
            .map_err(|_| meta_error(format!("{:?} is not a valid tag", tag)))?;
        let data = match (tag, value) {
            (DLNG | SLNG, MetaValue::Languages(languages)) => Metadata::ScriptLangTags(
                languages
                    .iter()
                    .map(|language| {
                        ScriptLangTag::new(language.clone())
                            .map_err(|e| meta_error(format!("{}: {}", language, e)))
                    })
                    .collect::<Result<_, _>>()?,
            ),
            (DLNG | SLNG, _) => {
                return Err(meta_error(format!(
                    "{} must be a list of language tags",
                    tag
                )))
            }
            (_, MetaValue::Text(text)) => Metadata::Other(text.as_bytes().to_vec()),
            (_, MetaValue::Data(data)) => Metadata::Other(data.clone()),
            (_, MetaValue::Languages(_)) => {
                return Err(meta_error(format!("{} must hold a string or data", tag)))
            }
        };
        records.push(DataMapRecord::new(tag, data));
    }
    dump_table(&Meta::new(records))
        .map(Some)
        .map_err(|e| table_error("meta", e))
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::GaspRangeRecord;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use write_fonts::{
        read::{
            tables::{
                gasp::Gasp as ReadGasp, head::Head as ReadHead, hhea::Hhea as ReadHhea,
                post::Post as ReadPost,
            },
            FontData, FontRead,
        },
        types::GlyphId16,
    };

    fn bbox(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Bounds {
        Bounds {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    #[rstest]
    #[case(1, 5, 1.005)]
    #[case(2, 100, 2.1)]
    #[case(1, 1234, 1.1234)]
    fn revisions(#[case] major: i32, #[case] minor: u32, #[case] expected: f64) {
        let info = FontInfo {
            version_major: Some(major),
            version_minor: Some(minor),
            ..Default::default()
        };
        assert!((font_revision(&info) - expected).abs() < 1e-9);
    }

    #[test]
    fn head_fields() {
        let info = FontInfo {
            style_map_style_name: Some("bold italic".to_string()),
            open_type_head_created: Some("2020/01/02 03:04:05".to_string()),
            ..Default::default()
        };
        let bytes = build_head(&info, bbox(-10, -200, 900, 800), 1).expect("head");
        let head = ReadHead::read(FontData::new(&bytes)).expect("valid head");
        assert_eq!(head.units_per_em(), 1000);
        assert_eq!(head.mac_style(), MacStyle::BOLD | MacStyle::ITALIC);
        assert_eq!(head.flags(), Flags::from_bits_truncate(0b11));
        assert_eq!((head.x_min(), head.y_max()), (-10, 800));
        assert_eq!(head.index_to_loc_format(), 1);
        assert_eq!(head.lowest_rec_ppem(), 6);
        // 2020-01-02T03:04:05Z
        assert_eq!(head.created().as_secs(), 1_577_934_245 + MAC_EPOCH_OFFSET);
        assert_eq!(head.modified(), head.created());
    }

    #[test]
    fn horizontal_metrics() {
        let widths = [500, 600, 0];
        let bounds = [Some(bbox(50, 0, 450, 700)), Some(bbox(-20, 0, 640, 700)), None];
        let bytes = build_hhea(&FontInfo::default(), &widths, &bounds).expect("hhea");
        let hhea = ReadHhea::read(FontData::new(&bytes)).expect("valid hhea");
        assert_eq!(hhea.advance_width_max().to_u16(), 600);
        assert_eq!(hhea.min_left_side_bearing().to_i16(), -20);
        assert_eq!(hhea.min_right_side_bearing().to_i16(), -40);
        assert_eq!(hhea.x_max_extent().to_i16(), 640);
        assert_eq!(hhea.ascender().to_i16(), 1000);
        assert_eq!(hhea.descender().to_i16(), -200);
        assert_eq!((hhea.caret_slope_rise(), hhea.caret_slope_run()), (1, 0));
        assert_eq!(hhea.number_of_h_metrics(), 3);

        let hmtx = build_hmtx(&widths, &bounds).expect("hmtx");
        assert_eq!(
            hmtx,
            vec![0x01, 0xF4, 0x00, 0x32, 0x02, 0x58, 0xFF, 0xEC, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn vertical_metrics_need_all_three_values() {
        let glyphs = GlyphSet::new();
        let order: Vec<SmolStr> = vec![];
        let info = FontInfo {
            open_type_vhea_vert_typo_ascender: Some(500),
            ..Default::default()
        };
        assert!(build_vertical(&info, &glyphs, &order, &[])
            .expect("vertical")
            .is_none());
    }

    #[test]
    fn vertical_metrics() {
        let mut glyphs = GlyphSet::new();
        let mut tall = crate::glyph::Glyph::new("tall");
        tall.height = Some(1200.0);
        tall.vertical_origin = Some(900.0);
        glyphs.insert(tall);
        glyphs.insert(crate::glyph::Glyph::new("plain"));
        let order: Vec<SmolStr> = vec!["tall".into(), "plain".into()];
        let info = FontInfo {
            open_type_vhea_vert_typo_ascender: Some(500),
            open_type_vhea_vert_typo_descender: Some(-500),
            open_type_vhea_vert_typo_line_gap: Some(0),
            ..Default::default()
        };
        let bounds = [Some(bbox(0, 100, 500, 800)), Some(bbox(0, 0, 500, 700))];
        let (_, vmtx) = build_vertical(&info, &glyphs, &order, &bounds)
            .expect("vertical")
            .expect("has vertical metrics");
        // (1200, 900 - 800) and (800 + 200, 800 - 700)
        assert_eq!(vmtx, vec![0x04, 0xB0, 0x00, 0x64, 0x03, 0xE8, 0x00, 0x64]);
    }

    #[test]
    fn post_versions() {
        let info = FontInfo::default();
        let bytes = build_post(&info, Some(&[".notdef", "A", "custom"])).expect("post");
        let post = ReadPost::read(FontData::new(&bytes)).expect("valid post");
        assert_eq!(post.version(), Version16Dot16::VERSION_2_0);
        assert_eq!(post.glyph_name(GlyphId16::new(2)), Some("custom"));
        assert_eq!(post.underline_position().to_i16(), -75);

        let bytes = build_post(&info, None).expect("post");
        let post = ReadPost::read(FontData::new(&bytes)).expect("valid post");
        assert_eq!(post.version(), Version16Dot16::VERSION_3_0);
        assert_eq!(bytes.len(), 32);
    }

    #[rstest]
    #[case(vec![0, 1], 0)]
    #[case(vec![0, 1, 2, 3], 1)]
    fn gasp_version(#[case] bits: Vec<u8>, #[case] version: u16) {
        let info = FontInfo {
            open_type_gasp_range_records: Some(vec![
                GaspRangeRecord {
                    range_max_ppem: 0xFFFF,
                    range_gasp_behavior: bits,
                },
                GaspRangeRecord {
                    range_max_ppem: 8,
                    range_gasp_behavior: vec![1],
                },
            ]),
            ..Default::default()
        };
        let bytes = build_gasp(&info).expect("gasp").expect("has gasp");
        let gasp = ReadGasp::read(FontData::new(&bytes)).expect("valid gasp");
        assert_eq!(gasp.version(), version);
        assert_eq!(gasp.gasp_ranges()[0].range_max_ppem(), 8);
        assert!(build_gasp(&FontInfo::default()).expect("gasp").is_none());
    }

    #[test]
    fn meta_values() {
        let lib = FontLib {
            opentype_meta: IndexMap::from([
                (
                    "dlng".to_string(),
                    MetaValue::Languages(vec!["Latn".to_string(), "Cyrl".to_string()]),
                ),
                ("appl".to_string(), MetaValue::Text("hello".to_string())),
            ]),
            ..Default::default()
        };
        let bytes = build_meta(&lib).expect("meta").expect("has meta");
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Latn,Cyrl"));
        assert!(text.contains("hello"));
    }

    #[test]
    fn meta_type_errors() {
        let lib = FontLib {
            opentype_meta: IndexMap::from([(
                "slng".to_string(),
                MetaValue::Text("Latn".to_string()),
            )]),
            ..Default::default()
        };
        assert!(matches!(
            build_meta(&lib),
            Err(FontbakeError::InvalidLib { .. })
        ));
        let lib = FontLib {
            opentype_meta: IndexMap::from([("toolong".to_string(), MetaValue::Data(vec![1]))]),
            ..Default::default()
        };
        assert!(build_meta(&lib).is_err());
    }
}
