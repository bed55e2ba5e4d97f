//! Layered colour glyphs: `COLR` version 0 and `CPAL` version 0
use super::table_error;
use crate::{
    info::{FontLib, KEY_COLOR_LAYERS, KEY_COLOR_PALETTES},
    FontbakeError,
};
use smol_str::SmolStr;
use std::collections::HashMap;
use write_fonts::{
    dump_table,
    tables::{
        colr::{BaseGlyph, Colr, Layer},
        cpal::{ColorRecord, Cpal},
    },
    types::GlyphId16,
};

/// Palette index standing for the text foreground colour
pub const FOREGROUND: u16 = 0xFFFF;

fn channel(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub fn build_cpal(palettes: &[Vec<[f64; 4]>]) -> Result<Vec<u8>, FontbakeError> {
    let entries = palettes.first().map_or(0, Vec::len);
    if palettes.iter().any(|palette| palette.len() != entries) {
        return Err(FontbakeError::InvalidLib {
            key: KEY_COLOR_PALETTES.to_string(),
            reason: "all palettes must have the same number of colours".to_string(),
        });
    }
    let mut cpal = Cpal {
        num_palettes: palettes.len() as u16,
        num_palette_entries: entries as u16,
        num_color_records: (palettes.len() * entries) as u16,
        color_record_indices: (0..palettes.len())
            .map(|i| (i * entries) as u16)
            .collect(),
        ..Default::default()
    };
    cpal.color_records_array.set(
        palettes
            .iter()
            .flatten()
            .map(|&[red, green, blue, alpha]| ColorRecord {
                red: channel(red),
                green: channel(green),
                blue: channel(blue),
                alpha: channel(alpha),
            })
            .collect::<Vec<_>>(),
    );
    dump_table(&cpal).map_err(|e| table_error("CPAL", e))
}

fn lookup(gids: &HashMap<SmolStr, u16>, glyph: &SmolStr) -> Result<u16, FontbakeError> {
    gids.get(glyph)
        .copied()
        .ok_or_else(|| FontbakeError::GlyphNotFound {
            glyph: glyph.to_string(),
        })
}

/// Build a version 0 `COLR` table from the layer lists in the lib.
///
/// Base glyph records are sorted by glyph ID; each glyph's layers are kept
/// in the order given, bottom first.
pub fn build_colr(
    lib: &FontLib,
    gids: &HashMap<SmolStr, u16>,
    palette_entries: usize,
) -> Result<Vec<u8>, FontbakeError> {
    let mut base_glyphs = vec![];
    for (glyph, layers) in lib.color_layers.iter() {
        let gid = lookup(gids, glyph)?;
        let mut compiled = Vec::with_capacity(layers.len());
        for layer in layers {
            if layer.palette_index != FOREGROUND && layer.palette_index as usize >= palette_entries
            {
                return Err(FontbakeError::InvalidLib {
                    key: KEY_COLOR_LAYERS.to_string(),
                    reason: format!(
                        "glyph {} uses palette index {} but palettes have {} colours",
                        glyph, layer.palette_index, palette_entries
                    ),
                });
            }
            compiled.push((lookup(gids, &layer.glyph)?, layer.palette_index));
        }
        base_glyphs.push((gid, compiled));
    }
    base_glyphs.sort_by_key(|(gid, _)| *gid);

    let mut records = Vec::with_capacity(base_glyphs.len());
    let mut layer_records = vec![];
    for (gid, layers) in base_glyphs {
        records.push(BaseGlyph::new(
            GlyphId16::new(gid),
            layer_records.len() as u16,
            layers.len() as u16,
        ));
        layer_records.extend(
            layers
                .into_iter()
                .map(|(layer_gid, palette)| Layer::new(GlyphId16::new(layer_gid), palette)),
        );
    }
    let (num_records, num_layers) = (records.len() as u16, layer_records.len() as u16);
    let colr = Colr::new(num_records, Some(records), Some(layer_records), num_layers);
    dump_table(&colr).map_err(|e| table_error("COLR", e))
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::ColorLayer;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use write_fonts::read::{
        tables::{colr::Colr as ReadColr, cpal::Cpal as ReadCpal},
        FontData, FontRead,
    };

    fn gids(names: &[&str]) -> HashMap<SmolStr, u16> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| (SmolStr::new(n), i as u16))
            .collect()
    }

    fn layer(glyph: &str, palette_index: u16) -> ColorLayer {
        ColorLayer {
            glyph: glyph.into(),
            palette_index,
        }
    }

    #[test]
    fn palettes_are_stored_as_bgra() {
        let bytes = build_cpal(&[
            vec![[1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 0.5]],
            vec![[0.0, 1.0, 0.0, 1.0], [1.0, 1.0, 1.0, 1.0]],
        ])
        .expect("cpal");
        let cpal = ReadCpal::read(FontData::new(&bytes)).expect("valid CPAL");
        assert_eq!(
            (cpal.num_palettes(), cpal.num_palette_entries()),
            (2, 2)
        );
        let indices: Vec<u16> = cpal.color_record_indices().iter().map(|i| i.get()).collect();
        assert_eq!(indices, vec![0, 2]);
        // The record array starts right after the 12-byte header and two indices
        assert_eq!(&bytes[16..24], &[0, 0, 255, 255, 255, 0, 0, 128]);
    }

    #[test]
    fn palettes_must_match() {
        assert!(matches!(
            build_cpal(&[vec![[0.0; 4]], vec![]]),
            Err(FontbakeError::InvalidLib { .. })
        ));
    }

    #[test]
    fn layers_sorted_by_base_glyph() {
        let lib = FontLib {
            color_layers: IndexMap::from([
                (
                    SmolStr::new("B"),
                    vec![layer("B.layer0", 0), layer("B.layer1", FOREGROUND)],
                ),
                (SmolStr::new("A"), vec![layer("A.layer0", 1)]),
            ]),
            ..Default::default()
        };
        let gids = gids(&[".notdef", "A", "B", "A.layer0", "B.layer0", "B.layer1"]);
        let bytes = build_colr(&lib, &gids, 2).expect("colr");
        let colr = ReadColr::read(FontData::new(&bytes)).expect("valid COLR");
        assert_eq!(colr.version(), 0);
        let base_glyphs: Vec<(u16, u16, u16)> = colr
            .base_glyph_records()
            .expect("base glyphs")
            .expect("readable base glyphs")
            .iter()
            .map(|r| (r.glyph_id().to_u16(), r.first_layer_index(), r.num_layers()))
            .collect();
        assert_eq!(base_glyphs, vec![(1, 0, 1), (2, 1, 2)]);
        let layers: Vec<(u16, u16)> = colr
            .layer_records()
            .expect("layers")
            .expect("readable layers")
            .iter()
            .map(|l| (l.glyph_id().to_u16(), l.palette_index()))
            .collect();
        assert_eq!(layers, vec![(3, 1), (4, 0), (5, FOREGROUND)]);
    }

    #[test]
    fn palette_index_out_of_range() {
        let lib = FontLib {
            color_layers: IndexMap::from([(SmolStr::new("A"), vec![layer("A", 3)])]),
            ..Default::default()
        };
        assert!(build_colr(&lib, &gids(&["A"]), 2).is_err());
    }
}
