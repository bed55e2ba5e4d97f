use super::table_error;
use crate::{
    common::ot_round,
    info::{FontInfo, FontLib},
    FontbakeError,
};
use std::collections::BTreeSet;
use write_fonts::{
    dump_table,
    tables::os2::{Os2, SelectionFlags},
    types::Tag,
};

mod ranges;

pub use ranges::{code_page_bits, code_page_ranges, unicode_ranges};

/// Pack a list of bit numbers into an integer, ignoring bits that don't fit
fn bits_to_int(bits: &[u8], width: u8) -> u32 {
    bits.iter()
        .filter(|&&bit| bit < width)
        .fold(0, |acc, &bit| acc | (1 << bit))
}

fn vendor_tag(vendor: &str) -> Tag {
    let mut bytes = [b' '; 4];
    for (slot, byte) in bytes.iter_mut().zip(vendor.bytes()) {
        *slot = byte;
    }
    Tag::new(&bytes)
}

/// The x offset of a sub- or superscript, following the italic angle
fn slanted_offset(y_offset: i32, italic_angle: f64) -> i32 {
    if italic_angle == 0.0 {
        0
    } else {
        ot_round(y_offset as f64 * (-italic_angle).to_radians().tan())
    }
}

/// Build a version 4 `OS/2` table.
///
/// `codepoints` are the characters in the cmap and `widths` the rounded
/// advance widths of every glyph.
pub fn build_os2(
    info: &FontInfo,
    lib: &FontLib,
    codepoints: &BTreeSet<u32>,
    widths: &[i32],
) -> Result<Vec<u8>, FontbakeError> {
    let upm = info.upm();
    let positive: Vec<i32> = widths.iter().copied().filter(|w| *w > 0).collect();
    let x_avg_char_width = if positive.is_empty() {
        0
    } else {
        ot_round(positive.iter().map(|w| *w as f64).sum::<f64>() / positive.len() as f64)
    };

    let subscript_x_size = info
        .open_type_os2_subscript_x_size
        .unwrap_or_else(|| ot_round(upm * 0.65));
    let subscript_y_size = info
        .open_type_os2_subscript_y_size
        .unwrap_or_else(|| ot_round(upm * 0.6));
    let subscript_y_offset = info
        .open_type_os2_subscript_y_offset
        .unwrap_or_else(|| ot_round(upm * 0.075));
    let subscript_x_offset = info
        .open_type_os2_subscript_x_offset
        .unwrap_or_else(|| slanted_offset(-subscript_y_offset, info.italic_angle()));
    let superscript_y_offset = info
        .open_type_os2_superscript_y_offset
        .unwrap_or_else(|| ot_round(upm * 0.35));
    let superscript_x_offset = info
        .open_type_os2_superscript_x_offset
        .unwrap_or_else(|| slanted_offset(superscript_y_offset, info.italic_angle()));

    let [family_class, family_subclass] = match info.open_type_os2_family_class.as_deref() {
        Some([class, subclass, ..]) => [*class as i16, *subclass as i16],
        _ => [0, 0],
    };
    let mut panose = [0u8; 10];
    for (slot, value) in panose
        .iter_mut()
        .zip(info.open_type_os2_panose.iter().flatten())
    {
        *slot = *value;
    }

    let unicode_bits: BTreeSet<u8> = match &info.open_type_os2_unicode_ranges {
        Some(bits) => bits.iter().copied().collect(),
        None => unicode_ranges(codepoints.iter().copied()),
    };
    let unicode_words: [u32; 4] = ranges::to_words(&unicode_bits);

    let mut code_pages = match &info.open_type_os2_code_page_ranges {
        Some(values) => code_page_bits(values),
        None => code_page_ranges(codepoints),
    };
    code_pages.extend(lib.unsupported_codepage_bits.iter().copied());
    let code_page_words: [u32; 2] = ranges::to_words(&code_pages);

    let mut selection: Vec<u8> = info.open_type_os2_selection.clone().unwrap_or_default();
    match info.style_map_style_name().as_str() {
        "bold" => selection.push(5),
        "italic" => selection.push(0),
        "bold italic" => selection.extend([0, 5]),
        _ => selection.push(6),
    }

    let (first_char, last_char) = match (codepoints.first(), codepoints.last()) {
        (Some(&first), Some(&last)) => (first.min(0xFFFF) as u16, last.min(0xFFFF) as u16),
        _ => (0xFFFF, 0xFFFF),
    };

    let os2 = Os2 {
        x_avg_char_width: x_avg_char_width as i16,
        us_weight_class: info.open_type_os2_weight_class.unwrap_or(400),
        us_width_class: info.open_type_os2_width_class.unwrap_or(5),
        fs_type: bits_to_int(info.open_type_os2_type.as_deref().unwrap_or(&[2]), 16) as u16,
        y_subscript_x_size: subscript_x_size as i16,
        y_subscript_y_size: subscript_y_size as i16,
        y_subscript_x_offset: subscript_x_offset as i16,
        y_subscript_y_offset: subscript_y_offset as i16,
        y_superscript_x_size: info
            .open_type_os2_superscript_x_size
            .unwrap_or(subscript_x_size) as i16,
        y_superscript_y_size: info
            .open_type_os2_superscript_y_size
            .unwrap_or(subscript_y_size) as i16,
        y_superscript_x_offset: superscript_x_offset as i16,
        y_superscript_y_offset: superscript_y_offset as i16,
        y_strikeout_size: info
            .open_type_os2_strikeout_size
            .unwrap_or_else(|| ot_round(info.underline_thickness())) as i16,
        y_strikeout_position: info
            .open_type_os2_strikeout_position
            .unwrap_or_else(|| ot_round(info.x_height() * 0.6)) as i16,
        s_family_class: (family_class << 8) | family_subclass,
        panose_10: panose,
        ul_unicode_range_1: unicode_words[0],
        ul_unicode_range_2: unicode_words[1],
        ul_unicode_range_3: unicode_words[2],
        ul_unicode_range_4: unicode_words[3],
        ach_vend_id: vendor_tag(info.vendor_id()),
        fs_selection: SelectionFlags::from_bits_truncate(bits_to_int(&selection, 16) as u16),
        us_first_char_index: first_char,
        us_last_char_index: last_char,
        s_typo_ascender: info.typo_ascender() as i16,
        s_typo_descender: info.typo_descender() as i16,
        s_typo_line_gap: info.typo_line_gap() as i16,
        us_win_ascent: info.win_ascent(),
        us_win_descent: info.win_descent(),
        ul_code_page_range_1: Some(code_page_words[0]),
        ul_code_page_range_2: Some(code_page_words[1]),
        sx_height: Some(ot_round(info.x_height()) as i16),
        s_cap_height: Some(ot_round(info.cap_height()) as i16),
        us_default_char: Some(0),
        us_break_char: Some(32),
        us_max_context: Some(0),
        ..Default::default()
    };
    let mut bytes = dump_table(&os2).map_err(|e| table_error("OS/2", e))?;
    // Versions 2 to 4 share a layout; write-fonts picks the lowest
    if let Some(version) = bytes.get_mut(0..2) {
        version.copy_from_slice(&4u16.to_be_bytes());
    }
    Ok(bytes)
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use write_fonts::read::{tables::os2::Os2 as ReadOs2, FontData, FontRead};

    fn compile(info: &FontInfo, lib: &FontLib, codepoints: &[u32]) -> Vec<u8> {
        let codepoints = codepoints.iter().copied().collect();
        build_os2(info, lib, &codepoints, &[0, 500, 600, 0]).expect("compiles")
    }

    #[test]
    fn defaults() {
        let bytes = compile(&FontInfo::default(), &FontLib::default(), &[0x41, 0x42]);
        let os2 = ReadOs2::read(FontData::new(&bytes)).expect("valid OS/2");
        assert_eq!(os2.version(), 4);
        assert_eq!(os2.x_avg_char_width(), 550);
        assert_eq!(os2.us_weight_class(), 400);
        assert_eq!(os2.us_width_class(), 5);
        assert_eq!(os2.fs_type(), 4);
        assert_eq!(os2.y_subscript_x_size(), 650);
        assert_eq!(os2.y_subscript_y_offset(), 75);
        assert_eq!(os2.y_superscript_y_offset(), 350);
        assert_eq!(os2.y_strikeout_size(), 50);
        assert_eq!(os2.y_strikeout_position(), 300);
        assert_eq!(os2.ach_vend_id(), Tag::new(b"NONE"));
        assert!(os2.fs_selection().contains(SelectionFlags::REGULAR));
        assert_eq!(os2.us_first_char_index(), 0x41);
        assert_eq!(os2.us_last_char_index(), 0x42);
        assert_eq!(os2.ul_unicode_range_1(), 1);
        assert_eq!(os2.ul_code_page_range_1(), Some(1));
        assert_eq!(os2.us_win_descent(), 200);
        assert_eq!(os2.us_break_char(), Some(32));
    }

    #[test]
    fn italic_offsets_follow_the_slant() {
        let info = FontInfo {
            italic_angle: Some(-12.0),
            style_map_style_name: Some("bold italic".to_string()),
            ..Default::default()
        };
        let bytes = compile(&info, &FontLib::default(), &[]);
        let os2 = ReadOs2::read(FontData::new(&bytes)).expect("valid OS/2");
        assert_eq!(os2.y_subscript_x_offset(), -16);
        assert_eq!(os2.y_superscript_x_offset(), 74);
        assert!(os2.fs_selection().contains(SelectionFlags::ITALIC | SelectionFlags::BOLD));
        assert!(!os2.fs_selection().contains(SelectionFlags::REGULAR));
        assert_eq!(
            (os2.us_first_char_index(), os2.us_last_char_index()),
            (0xFFFF, 0xFFFF)
        );
    }

    #[test]
    fn explicit_code_pages_and_unsupported_bits() {
        let info = FontInfo {
            open_type_os2_code_page_ranges: Some(vec![1252, 1251, 9999]),
            open_type_os2_win_descent: Some(-250),
            ..Default::default()
        };
        let lib = FontLib {
            unsupported_codepage_bits: vec![40],
            ..Default::default()
        };
        let bytes = compile(&info, &lib, &[0x41]);
        let os2 = ReadOs2::read(FontData::new(&bytes)).expect("valid OS/2");
        assert_eq!(os2.ul_code_page_range_1(), Some(0b101));
        assert_eq!(os2.ul_code_page_range_2(), Some(1 << 8));
        assert_eq!(os2.us_win_descent(), 250);
    }

    #[test]
    fn vendor_ids_are_padded() {
        assert_eq!(vendor_tag("AB"), Tag::new(b"AB  "));
        assert_eq!(vendor_tag("GOOGLE"), Tag::new(b"GOOG"));
    }
}
