use super::table_error;
use crate::FontbakeError;
use smol_str::SmolStr;
use std::collections::{BTreeMap, HashMap};
use write_fonts::{
    dump_table,
    tables::cmap::{
        Cmap, Cmap14, CmapSubtable, DefaultUvs, EncodingRecord, NonDefaultUvs, PlatformId,
        UnicodeRange, UvsMapping, VariationSelector,
    },
    types::{GlyphId, Uint24},
};

/// Unicode platform, Unicode Variation Sequences encoding
const UVS_ENCODING: u16 = 5;

/// Build the `cmap` table.
///
/// Formats 4 and 12 come from [`Cmap::from_mappings`]; when the font has
/// variation sequences a format 14 subtable is added under (0, 5).
pub fn build_cmap(
    mapping: &BTreeMap<u32, SmolStr>,
    variation_sequences: &BTreeMap<(u32, u32), SmolStr>,
    gids: &HashMap<SmolStr, u16>,
) -> Result<Vec<u8>, FontbakeError> {
    let mut mappings = vec![];
    for (&codepoint, glyph) in mapping {
        let Some(ch) = char::from_u32(codepoint) else {
            log::warn!("U+{:04X} is not a valid character; not mapping {}", codepoint, glyph);
            continue;
        };
        if let Some(&gid) = gids.get(glyph) {
            mappings.push((ch, GlyphId::new(gid as u32)));
        }
    }
    let mut cmap =
        Cmap::from_mappings(mappings).map_err(|e| FontbakeError::Cmap(e.to_string()))?;
    if !variation_sequences.is_empty() {
        let format14 = build_format14(mapping, variation_sequences, gids)?;
        // Records stay sorted by platform, then encoding
        let position = cmap
            .encoding_records
            .iter()
            .position(|r| r.platform_id != PlatformId::Unicode)
            .unwrap_or(cmap.encoding_records.len());
        cmap.encoding_records.insert(
            position,
            EncodingRecord::new(
                PlatformId::Unicode,
                UVS_ENCODING,
                CmapSubtable::Format14(format14),
            ),
        );
    }
    dump_table(&cmap).map_err(|e| table_error("cmap", e))
}

#[derive(Default)]
struct SelectorRecord {
    /// `(first codepoint, additional count)`
    default_ranges: Vec<(u32, u8)>,
    non_default: Vec<(u32, u16)>,
}

/// A Unicode Variation Sequences subtable. A sequence that maps to the
/// glyph the base character already maps to is a default sequence.
fn build_format14(
    mapping: &BTreeMap<u32, SmolStr>,
    variation_sequences: &BTreeMap<(u32, u32), SmolStr>,
    gids: &HashMap<SmolStr, u16>,
) -> Result<Cmap14, FontbakeError> {
    let mut records: BTreeMap<u32, SelectorRecord> = BTreeMap::new();
    for (&(selector, codepoint), glyph) in variation_sequences {
        let Some(&gid) = gids.get(glyph) else {
            log::warn!(
                "Variation sequence U+{:04X} U+{:04X} maps to missing glyph {}",
                codepoint,
                selector,
                glyph
            );
            continue;
        };
        let record = records.entry(selector).or_default();
        if mapping.get(&codepoint) == Some(glyph) {
            match record.default_ranges.last_mut() {
                Some((start, count))
                    if *start + *count as u32 + 1 == codepoint && *count < u8::MAX =>
                {
                    *count += 1
                }
                _ => record.default_ranges.push((codepoint, 0)),
            }
        } else {
            record.non_default.push((codepoint, gid));
        }
    }

    let selectors: Vec<VariationSelector> = records
        .into_iter()
        .map(|(selector, record)| {
            let default_uvs = (!record.default_ranges.is_empty()).then(|| {
                DefaultUvs::new(
                    record.default_ranges.len() as u32,
                    record
                        .default_ranges
                        .iter()
                        .map(|&(start, count)| UnicodeRange::new(Uint24::new(start), count))
                        .collect(),
                )
            });
            let non_default_uvs = (!record.non_default.is_empty()).then(|| {
                NonDefaultUvs::new(
                    record.non_default.len() as u32,
                    record
                        .non_default
                        .iter()
                        .map(|&(codepoint, gid)| UvsMapping::new(Uint24::new(codepoint), gid))
                        .collect(),
                )
            });
            VariationSelector::new(Uint24::new(selector), default_uvs, non_default_uvs)
        })
        .collect();
    let mut format14 = Cmap14::new(0, selectors.len() as u32, selectors);
    // The length field is fixed-size, so measuring with a placeholder is exact
    format14.length = dump_table(&format14)
        .map_err(|e| table_error("cmap", e))?
        .len() as u32;
    Ok(format14)
}
