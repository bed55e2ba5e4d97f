//! A CFF (version 1) table writer.
//!
//! Each glyph program is a single Type 2 charstring without subroutines;
//! components are flattened into contours first.
use super::{
    bounds::{cff_bounds, Bounds},
    outline::to_bezpath,
    table_error,
};
use crate::{
    common::ot_round,
    glyph::GlyphSet,
    info::{normalize_for_postscript, FontInfo, DEFAULT_BLUE_SCALE},
    FontbakeError,
};
use indexmap::IndexSet;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use write_fonts::{
    dump_table, read::ps::string::STANDARD_STRINGS, tables::postscript::Index1,
};

mod charstring;

pub use charstring::round_coordinate;

/// The compiled `CFF ` table and the bounds of each glyph as encoded
pub struct CffOutlines {
    pub cff: Vec<u8>,
    pub bounds: Vec<Option<Bounds>>,
}

mod op {
    pub const VERSION: u16 = 0;
    pub const NOTICE: u16 = 1;
    pub const FULL_NAME: u16 = 2;
    pub const FAMILY_NAME: u16 = 3;
    pub const WEIGHT: u16 = 4;
    pub const FONT_BBOX: u16 = 5;
    pub const BLUE_VALUES: u16 = 6;
    pub const OTHER_BLUES: u16 = 7;
    pub const FAMILY_BLUES: u16 = 8;
    pub const FAMILY_OTHER_BLUES: u16 = 9;
    pub const STD_HW: u16 = 10;
    pub const STD_VW: u16 = 11;
    pub const CHARSET: u16 = 15;
    pub const CHAR_STRINGS: u16 = 17;
    pub const PRIVATE: u16 = 18;
    pub const DEFAULT_WIDTH_X: u16 = 20;
    pub const NOMINAL_WIDTH_X: u16 = 21;
    pub const COPYRIGHT: u16 = 0x0c00;
    pub const IS_FIXED_PITCH: u16 = 0x0c01;
    pub const ITALIC_ANGLE: u16 = 0x0c02;
    pub const UNDERLINE_POSITION: u16 = 0x0c03;
    pub const UNDERLINE_THICKNESS: u16 = 0x0c04;
    pub const FONT_MATRIX: u16 = 0x0c07;
    pub const BLUE_SCALE: u16 = 0x0c09;
    pub const BLUE_SHIFT: u16 = 0x0c0a;
    pub const BLUE_FUZZ: u16 = 0x0c0b;
    pub const STEM_SNAP_H: u16 = 0x0c0c;
    pub const STEM_SNAP_V: u16 = 0x0c0d;
    pub const FORCE_BOLD: u16 = 0x0c0e;
}

/// DICT data: operands followed by their operator
#[derive(Default)]
struct Dict(Vec<u8>);

impl Dict {
    fn int(&mut self, v: i32) -> &mut Self {
        match v {
            -107..=107 => self.0.push((v + 139) as u8),
            108..=1131 => {
                let v = v - 108;
                self.0.extend([((v >> 8) + 247) as u8, (v & 0xff) as u8]);
            }
            -1131..=-108 => {
                let v = -v - 108;
                self.0.extend([((v >> 8) + 251) as u8, (v & 0xff) as u8]);
            }
            -32768..=32767 => {
                self.0.push(28);
                self.0.extend((v as i16).to_be_bytes());
            }
            _ => self.offset(v),
        }
        self
    }

    /// Always five bytes, so offsets can be patched in without the DICT
    /// changing size
    fn offset(&mut self, v: i32) {
        self.0.push(29);
        self.0.extend(v.to_be_bytes());
    }

    fn real(&mut self, v: f64) -> &mut Self {
        let mut nibbles: Vec<u8> = format!("{}", v)
            .chars()
            .filter_map(|c| match c {
                '0'..='9' => Some(c as u8 - b'0'),
                '.' => Some(0xa),
                '-' => Some(0xe),
                _ => None,
            })
            .collect();
        nibbles.push(0xf);
        if nibbles.len() % 2 == 1 {
            nibbles.push(0xf);
        }
        self.0.push(30);
        self.0
            .extend(nibbles.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]));
        self
    }

    fn number(&mut self, v: f64) -> &mut Self {
        if v.fract() == 0.0 && v.abs() < i32::MAX as f64 {
            self.int(v as i32)
        } else {
            self.real(v)
        }
    }

    /// A delta-encoded array, as used for the blue zones and stem snaps
    fn delta(&mut self, values: &[i32]) -> &mut Self {
        let mut last = 0;
        for &v in values {
            self.int(v - last);
            last = v;
        }
        self
    }

    fn op(&mut self, op: u16) {
        if op >= 0x0c00 {
            self.0.extend([12, (op & 0xff) as u8]);
        } else {
            self.0.push(op as u8);
        }
    }
}

/// Serialize an INDEX. An empty CFF INDEX is only its zero count.
fn index(items: &[Vec<u8>]) -> Result<Vec<u8>, FontbakeError> {
    if items.is_empty() {
        return Ok(vec![0, 0]);
    }
    dump_table(&Index1::new(items.to_vec())).map_err(|e| table_error("CFF ", e))
}

/// The SID of a standard string
fn standard_sid(name: &str) -> Option<u16> {
    STANDARD_STRINGS
        .iter()
        .position(|s| *s == name)
        .map(|sid| sid as u16)
}

/// The String INDEX under construction
#[derive(Default)]
struct Strings(IndexSet<String>);

impl Strings {
    fn sid(&mut self, s: &str) -> i32 {
        if let Some(sid) = standard_sid(s) {
            return sid as i32;
        }
        let (index, _) = self.0.insert_full(s.to_string());
        (STANDARD_STRINGS.len() + index) as i32
    }

    fn to_index(&self) -> Result<Vec<u8>, FontbakeError> {
        let items: Vec<Vec<u8>> = self.0.iter().map(|s| s.as_bytes().to_vec()).collect();
        index(&items)
    }
}

fn encoded_length(v: i32) -> usize {
    match v {
        -107..=107 => 1,
        -1131..=1131 => 2,
        _ => 3,
    }
}

/// Pick `(defaultWidthX, nominalWidthX)`.
///
/// Explicit values win, the missing one falling back to 200 for the
/// default and 0 for the nominal width. Otherwise the most common advance
/// becomes the default (it then costs nothing to store) and the nominal
/// width is chosen to make the remaining advances as short as possible.
pub fn default_and_nominal_widths(info: &FontInfo, widths: &[i32]) -> (i32, i32) {
    if info.postscript_default_width_x.is_some() || info.postscript_nominal_width_x.is_some() {
        return (
            ot_round(info.postscript_default_width_x.unwrap_or(200.0)),
            ot_round(info.postscript_nominal_width_x.unwrap_or(0.0)),
        );
    }
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for &w in widths {
        *counts.entry(w).or_default() += 1;
    }
    // Ties go to the narrower advance
    let Some(default) = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(w, _)| *w)
    else {
        return (0, 0);
    };
    counts.remove(&default);
    let (Some(&min), Some(&max)) = (counts.keys().next(), counts.keys().next_back()) else {
        return (default, default);
    };
    let cost = |nominal: i32| -> usize {
        counts
            .iter()
            .map(|(w, n)| encoded_length(w - nominal) * n)
            .sum()
    };
    let nominal = (min - 1131..=max + 1131)
        .min_by_key(|&n| (cost(n), (n - default).abs(), n))
        .unwrap_or(default);
    (default, nominal)
}

fn postscript_string(s: Option<&str>) -> Option<String> {
    let normalized = normalize_for_postscript(&s?.replace('\u{a9}', "Copyright"), true);
    if Some(normalized.as_str()) != s {
        log::info!(
            "'{}' was normalized to '{}' for storage in the CFF table",
            s.unwrap_or_default(),
            normalized
        );
    }
    (!normalized.is_empty()).then_some(normalized)
}

struct TopDictOffsets {
    charset: i32,
    char_strings: i32,
    private_size: i32,
    private: i32,
}

fn private_dict(info: &FontInfo, default_width: i32, nominal_width: i32) -> Vec<u8> {
    let mut dict = Dict::default();
    let rounded = |values: &Option<Vec<f64>>| -> Vec<i32> {
        values
            .iter()
            .flatten()
            .map(|v| ot_round(*v))
            .collect()
    };
    let blues = [
        (op::BLUE_VALUES, rounded(&info.postscript_blue_values)),
        (op::OTHER_BLUES, rounded(&info.postscript_other_blues)),
        (op::FAMILY_BLUES, rounded(&info.postscript_family_blues)),
        (op::FAMILY_OTHER_BLUES, rounded(&info.postscript_family_other_blues)),
    ];
    let stem_snap_h = rounded(&info.postscript_stem_snap_h);
    let stem_snap_v = rounded(&info.postscript_stem_snap_v);
    let has_blues = blues.iter().any(|(_, v)| !v.is_empty());
    if has_blues {
        for (operator, values) in blues.iter() {
            if !values.is_empty() {
                dict.delta(values).op(*operator);
            }
        }
        let blue_scale = info.blue_scale();
        if blue_scale != DEFAULT_BLUE_SCALE {
            dict.number(blue_scale).op(op::BLUE_SCALE);
        }
        let blue_shift = ot_round(info.blue_shift());
        if blue_shift != 7 {
            dict.int(blue_shift).op(op::BLUE_SHIFT);
        }
        let blue_fuzz = ot_round(info.blue_fuzz());
        if blue_fuzz != 1 {
            dict.int(blue_fuzz).op(op::BLUE_FUZZ);
        }
    }
    if let (Some(&h), Some(&v)) = (stem_snap_h.first(), stem_snap_v.first()) {
        dict.int(h).op(op::STD_HW);
        dict.int(v).op(op::STD_VW);
        dict.delta(&stem_snap_h).op(op::STEM_SNAP_H);
        dict.delta(&stem_snap_v).op(op::STEM_SNAP_V);
    }
    if has_blues && info.postscript_force_bold.unwrap_or(false) {
        dict.int(1).op(op::FORCE_BOLD);
    }
    if default_width != 0 {
        dict.int(default_width).op(op::DEFAULT_WIDTH_X);
    }
    if nominal_width != 0 {
        dict.int(nominal_width).op(op::NOMINAL_WIDTH_X);
    }
    dict.0
}

/// Build the `CFF ` table.
///
/// `names` are the charset names in glyph order and `widths` the rounded
/// advance widths; `bbox` is filled in from the glyph bounds.
pub fn build_cff(
    info: &FontInfo,
    glyphs: &GlyphSet,
    order: &[SmolStr],
    names: &[&str],
    widths: &[i32],
    tolerance: f64,
) -> Result<CffOutlines, FontbakeError> {
    let (default_width, nominal_width) = default_and_nominal_widths(info, widths);

    let mut char_strings = Vec::with_capacity(order.len());
    let mut bounds = Vec::with_capacity(order.len());
    for (name, &width) in order.iter().zip(widths) {
        let contours = glyphs.decomposed_contours(name)?;
        let path = to_bezpath(name, &contours, false)?;
        let width = (width != default_width).then(|| (width - nominal_width) as f64);
        let charstring = charstring::encode(&path, width, tolerance);
        bounds.push(cff_bounds(&charstring.path, tolerance));
        char_strings.push(charstring.bytes);
    }
    let font_bbox = bounds
        .iter()
        .flatten()
        .copied()
        .reduce(Bounds::union);

    let mut strings = Strings::default();
    let (major, minor) = info.version();
    let version = strings.sid(&format!("{}.{}", major, minor));
    let notice = postscript_string(info.trademark.as_deref()).map(|s| strings.sid(&s));
    let copyright = postscript_string(info.copyright.as_deref()).map(|s| strings.sid(&s));
    let full_name = strings.sid(&info.postscript_full_name());
    let family_name = strings.sid(info.preferred_family_name());
    let weight = info.postscript_weight_name.as_deref().map(|s| strings.sid(s));

    let mut charset = vec![0u8];
    for name in names.iter().skip(1) {
        charset.extend((strings.sid(name) as u16).to_be_bytes());
    }

    let upm = ot_round(info.upm());
    let top_dict = |offsets: &TopDictOffsets| {
        let mut dict = Dict::default();
        dict.int(version).op(op::VERSION);
        if let Some(sid) = notice {
            dict.int(sid).op(op::NOTICE);
        }
        if let Some(sid) = copyright {
            dict.int(sid).op(op::COPYRIGHT);
        }
        dict.int(full_name).op(op::FULL_NAME);
        dict.int(family_name).op(op::FAMILY_NAME);
        if let Some(sid) = weight {
            dict.int(sid).op(op::WEIGHT);
        }
        if info.is_fixed_pitch() {
            dict.int(1).op(op::IS_FIXED_PITCH);
        }
        if info.italic_angle() != 0.0 {
            dict.number(info.italic_angle()).op(op::ITALIC_ANGLE);
        }
        let underline_position = ot_round(info.underline_position());
        if underline_position != -100 {
            dict.int(underline_position).op(op::UNDERLINE_POSITION);
        }
        let underline_thickness = ot_round(info.underline_thickness());
        if underline_thickness != 50 {
            dict.int(underline_thickness).op(op::UNDERLINE_THICKNESS);
        }
        if upm != 1000 {
            let scale = 1.0 / upm as f64;
            dict.real(scale).int(0).int(0).real(scale).int(0).int(0);
            dict.op(op::FONT_MATRIX);
        }
        if let Some(b) = font_bbox {
            dict.int(b.x_min).int(b.y_min).int(b.x_max).int(b.y_max);
            dict.op(op::FONT_BBOX);
        }
        dict.offset(offsets.charset);
        dict.op(op::CHARSET);
        dict.offset(offsets.char_strings);
        dict.op(op::CHAR_STRINGS);
        dict.int(offsets.private_size);
        dict.offset(offsets.private);
        dict.op(op::PRIVATE);
        dict.0
    };

    let header = [1u8, 0, 4, 4];
    let name_index = index(&[info.postscript_font_name().into_bytes()])?;
    let string_index = strings.to_index()?;
    let global_subrs = index(&[])?;
    let char_strings_index = index(&char_strings)?;
    let private = private_dict(info, default_width, nominal_width);

    let placeholder = TopDictOffsets {
        charset: 0,
        char_strings: 0,
        private_size: private.len() as i32,
        private: 0,
    };
    let top_index_len = index(&[top_dict(&placeholder)])?.len();
    let charset_offset = header.len()
        + name_index.len()
        + top_index_len
        + string_index.len()
        + global_subrs.len();
    let char_strings_offset = charset_offset + charset.len();
    let private_offset = char_strings_offset + char_strings_index.len();
    let top_index = index(&[top_dict(&TopDictOffsets {
        charset: charset_offset as i32,
        char_strings: char_strings_offset as i32,
        private_size: private.len() as i32,
        private: private_offset as i32,
    })])?;

    let mut cff = header.to_vec();
    for part in [
        &name_index,
        &top_index,
        &string_index,
        &global_subrs,
        &charset,
        &char_strings_index,
        &private,
    ] {
        cff.extend(part);
    }
    Ok(CffOutlines { cff, bounds })
}
