//! Compiling a font's outlines and metadata into binary OpenType tables.
//!
//! Outlines go first, because every metrics table needs the glyph bounds
//! they produce; the bounds are computed once per run and shared.
use crate::{
    common::ot_round,
    font::{Font, NOTDEF},
    FontbakeError,
};
use smol_str::SmolStr;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::Display,
};
use write_fonts::{types::Tag, FontBuilder};

mod bounds;
mod cff;
mod cmap;
mod color;
mod glyf;
mod name;
mod os2;
mod outline;
mod tables;

pub use bounds::Bounds;
pub use color::FOREGROUND;
pub use os2::{code_page_bits, code_page_ranges, unicode_ranges};
pub use outline::notdef_stub;

/// `head.checkSumAdjustment` makes the whole font sum to this
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;
const SFNT_HEADER_LEN: usize = 12;
const TABLE_RECORD_LEN: usize = 16;

pub(crate) fn table_error(table: &str, e: impl Display) -> FontbakeError {
    FontbakeError::TableWrite {
        table: table.to_string(),
        reason: e.to_string(),
    }
}

/// Which outline format to write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flavor {
    /// Quadratic outlines in `glyf`/`loca`
    #[default]
    TrueType,
    /// Cubic outlines in a version 1 `CFF ` table
    Cff,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub flavor: Flavor,
    /// CFF coordinates within this distance of an integer are rounded; 0.5
    /// or more rounds everything
    pub round_tolerance: f64,
    /// Reverse contour direction for TrueType outlines
    pub reverse_direction: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            flavor: Flavor::TrueType,
            round_tolerance: 0.5,
            reverse_direction: true,
        }
    }
}

/// The binary tables of a compiled font
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFont {
    pub tables: BTreeMap<Tag, Vec<u8>>,
    pub glyph_order: Vec<SmolStr>,
}

impl CompiledFont {
    pub fn table(&self, tag: &[u8; 4]) -> Option<&[u8]> {
        self.tables.get(&Tag::new(tag)).map(|t| t.as_slice())
    }

    /// Assemble the tables into an sfnt
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut builder = FontBuilder::new();
        for (tag, data) in self.tables.iter() {
            builder.add_raw(*tag, data.as_slice());
        }
        let mut font = builder.build();
        if self.tables.contains_key(&Tag::new(b"CFF ")) {
            if let Some(version) = font.get_mut(0..4) {
                version.copy_from_slice(b"OTTO");
            }
        }
        set_checksum_adjustment(&mut font);
        font
    }
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Fill in `head.checkSumAdjustment`, which must be zero while the sum is
/// taken
fn set_checksum_adjustment(font: &mut [u8]) {
    let num_tables = font
        .get(4..6)
        .map_or(0, |b| u16::from_be_bytes([b[0], b[1]]) as usize);
    let head_offset = (0..num_tables)
        .map(|i| SFNT_HEADER_LEN + i * TABLE_RECORD_LEN)
        .find(|&record| font.get(record..record + 4) == Some(b"head".as_slice()))
        .and_then(|record| read_u32(font, record + 8));
    let Some(head_offset) = head_offset else {
        log::warn!("No head table; not setting checkSumAdjustment");
        return;
    };
    let at = head_offset as usize + 8;
    let adjustment = CHECKSUM_MAGIC.wrapping_sub(checksum(font));
    if let Some(slot) = font.get_mut(at..at + 4) {
        slot.copy_from_slice(&adjustment.to_be_bytes());
    }
}

/// Assign glyph IDs in order, failing if the count doesn't fit in 16 bits.
fn glyph_ids(order: &[SmolStr]) -> Result<(HashMap<SmolStr, u16>, u16), FontbakeError> {
    let num_glyphs = u16::try_from(order.len())
        .map_err(|_| FontbakeError::TooManyGlyphs { count: order.len() })?;
    let gids = order
        .iter()
        .zip(0..num_glyphs)
        .map(|(name, gid)| (name.clone(), gid))
        .collect();
    Ok((gids, num_glyphs))
}

/// Compile the outlines and metadata of `font` into binary tables.
///
/// Layout tables are not built here; `GDEF`, `GSUB` and `GPOS` come from
/// compiling the feature code.
pub fn compile(font: &Font, options: &CompileOptions) -> Result<CompiledFont, FontbakeError> {
    font.validate()?;
    let info = &font.info;
    let glyphs = outline::glyphs_with_notdef(&font.glyphs, info);
    let mut order = font.glyph_order();
    if order.first().map(|n| n.as_str()) != Some(NOTDEF) {
        order.insert(0, SmolStr::new_static(NOTDEF));
    }
    let (gids, num_glyphs) = glyph_ids(&order)?;

    let mut widths = Vec::with_capacity(order.len());
    for name in order.iter() {
        let width = glyphs.get(name).map_or(0.0, |g| g.width);
        let rounded = ot_round(width);
        if rounded < 0 {
            return Err(FontbakeError::NegativeWidth {
                glyph: name.to_string(),
                width,
            });
        }
        widths.push(rounded);
    }
    let production_names: Vec<&str> = order
        .iter()
        .map(|name| font.production_name(name.as_str()))
        .collect();
    let mapping = font.cmap();
    let codepoints: BTreeSet<u32> = mapping.keys().copied().collect();

    let mut tables = BTreeMap::new();
    let mut add = |tag: &[u8; 4], data: Vec<u8>| {
        log::debug!("Compiled {} ({} bytes)", String::from_utf8_lossy(tag), data.len());
        tables.insert(Tag::new(tag), data);
    };

    let (bounds, index_to_loc_format) = match options.flavor {
        Flavor::TrueType => {
            let accuracy = info.upm() / 1000.0;
            let outlines =
                glyf::build_glyf(&glyphs, &order, options.reverse_direction, accuracy)?;
            add(
                b"maxp",
                write_fonts::dump_table(&outlines.maxp).map_err(|e| table_error("maxp", e))?,
            );
            add(b"glyf", outlines.glyf);
            add(b"loca", outlines.loca);
            (outlines.bounds, outlines.index_to_loc_format)
        }
        Flavor::Cff => {
            let outlines = cff::build_cff(
                info,
                &glyphs,
                &order,
                &production_names,
                &widths,
                options.round_tolerance,
            )?;
            add(b"maxp", tables::build_maxp_cff(num_glyphs)?);
            add(b"CFF ", outlines.cff);
            (outlines.bounds, 0)
        }
    };
    let font_bbox = bounds::font_bounds(&bounds);

    add(
        b"head",
        tables::build_head(info, font_bbox, index_to_loc_format)?,
    );
    add(b"hhea", tables::build_hhea(info, &widths, &bounds)?);
    add(b"hmtx", tables::build_hmtx(&widths, &bounds)?);
    if let Some((vhea, vmtx)) = tables::build_vertical(info, &glyphs, &order, &bounds)? {
        add(b"vhea", vhea);
        add(b"vmtx", vmtx);
    }
    add(b"name", name::build_name(info)?);
    add(
        b"cmap",
        cmap::build_cmap(&mapping, &font.lib.variation_sequences, &gids)?,
    );
    add(
        b"OS/2",
        os2::build_os2(info, &font.lib, &codepoints, &widths)?,
    );
    let post_names = match options.flavor {
        Flavor::TrueType if font.lib.keep_glyph_names != Some(false) => {
            Some(production_names.as_slice())
        }
        _ => None,
    };
    add(b"post", tables::build_post(info, post_names)?);
    if let Some(gasp) = tables::build_gasp(info)? {
        add(b"gasp", gasp);
    }
    if let Some(meta) = tables::build_meta(&font.lib)? {
        add(b"meta", meta);
    }
    let palettes = &font.lib.color_palettes;
    if !palettes.is_empty() {
        add(b"CPAL", color::build_cpal(palettes)?);
        if !font.lib.color_layers.is_empty() {
            let entries = palettes.first().map_or(0, Vec::len);
            add(b"COLR", color::build_colr(&font.lib, &gids, entries)?);
        }
    } else if !font.lib.color_layers.is_empty() {
        log::warn!("Colour layers without colour palettes; not building COLR");
    }

    log::info!(
        "Compiled {} glyphs into {} tables",
        order.len(),
        tables.len()
    );
    Ok(CompiledFont {
        tables,
        glyph_order: order,
    })
}
