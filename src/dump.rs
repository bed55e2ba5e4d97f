//! Reading kerning back out of a compiled font, for checking what the
//! feature code turned into.
use crate::FontbakeError;
use indexmap::IndexSet;
use std::collections::BTreeMap;
use write_fonts::read::{
    tables::{
        gpos::{PairPos, PairPosFormat1, PairPosFormat2, PositionSubtables},
        post::Post,
    },
    FontData, FontRef, TableProvider,
};
use write_fonts::types::{GlyphId16, Tag};

/// A kerning pair: left glyph, right glyph and x advance adjustment
pub type KernPair = (String, String, i16);

const KERN: Tag = Tag::new(b"kern");
const LEGACY_PAIR_LEN: usize = 6;
const LEGACY_SUBTABLE_HEADER_LEN: usize = 14;

struct GlyphNames<'a> {
    post: Option<Post<'a>>,
}

impl GlyphNames<'_> {
    fn name(&self, gid: u16) -> String {
        self.post
            .as_ref()
            .and_then(|post| post.glyph_name(GlyphId16::new(gid)))
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("glyph{:05}", gid))
    }
}

/// List the kerning pairs of a compiled font.
///
/// Pairs come from the lookups of the GPOS `kern` feature; fonts without
/// one are read from a format 0 `kern` table instead. Each pair appears
/// once, in the order first seen.
pub fn dump_kerning(bytes: &[u8]) -> Result<Vec<KernPair>, FontbakeError> {
    let font = FontRef::new(bytes)?;
    let mut pairs = IndexSet::new();
    if !gpos_pairs(&font, &mut pairs)? {
        log::debug!("No GPOS kern feature, trying the kern table");
        legacy_pairs(&font, &mut pairs)?;
    }
    let names = GlyphNames {
        post: font.post().ok(),
    };
    Ok(pairs
        .into_iter()
        .map(|(left, right, value)| (names.name(left), names.name(right), value))
        .collect())
}

/// Collect pairs from the GPOS `kern` feature, returning false if there is
/// no such feature
fn gpos_pairs(
    font: &FontRef,
    pairs: &mut IndexSet<(u16, u16, i16)>,
) -> Result<bool, FontbakeError> {
    let Ok(gpos) = font.gpos() else {
        return Ok(false);
    };
    let feature_list = gpos.feature_list()?;
    let mut lookup_indices = IndexSet::new();
    let mut found = false;
    for record in feature_list
        .feature_records()
        .iter()
        .filter(|record| record.feature_tag() == KERN)
    {
        found = true;
        let feature = record.feature(feature_list.offset_data())?;
        lookup_indices.extend(feature.lookup_list_indices().iter().map(|i| i.get()));
    }
    if !found {
        return Ok(false);
    }

    let num_glyphs = font.maxp()?.num_glyphs();
    let lookup_list = gpos.lookup_list()?;
    for index in lookup_indices {
        let lookup = lookup_list.lookups().get(index as usize)?;
        // Extension subtables are unwrapped here
        let PositionSubtables::Pair(subtables) = lookup.subtables()? else {
            log::debug!("Skipping non-pair lookup {} in kern feature", index);
            continue;
        };
        for subtable in subtables.iter() {
            match subtable? {
                PairPos::Format1(table) => glyph_pairs(&table, pairs)?,
                PairPos::Format2(table) => class_pairs(&table, num_glyphs, pairs)?,
            }
        }
    }
    Ok(true)
}

fn glyph_pairs(
    table: &PairPosFormat1,
    pairs: &mut IndexSet<(u16, u16, i16)>,
) -> Result<(), FontbakeError> {
    let coverage = table.coverage()?;
    for (left, pair_set) in coverage.iter().zip(table.pair_sets().iter()) {
        let pair_set = pair_set?;
        for record in pair_set.pair_value_records().iter() {
            let record = record?;
            let value = record.value_record1().x_advance().unwrap_or(0);
            pairs.insert((left.to_u16(), record.second_glyph().to_u16(), value));
        }
    }
    Ok(())
}

fn class_pairs(
    table: &PairPosFormat2,
    num_glyphs: u16,
    pairs: &mut IndexSet<(u16, u16, i16)>,
) -> Result<(), FontbakeError> {
    let coverage = table.coverage()?;
    let class_def1 = table.class_def1()?;
    let class_def2 = table.class_def2()?;

    // Class 0 on the left is whatever is covered but not classed
    let mut left_classes: BTreeMap<u16, Vec<u16>> = BTreeMap::new();
    for gid in coverage.iter() {
        left_classes
            .entry(class_def1.get(gid))
            .or_default()
            .push(gid.to_u16());
    }
    // and on the right it is every other glyph in the font
    let mut right_classes: BTreeMap<u16, Vec<u16>> = BTreeMap::new();
    for gid in 0..num_glyphs {
        right_classes
            .entry(class_def2.get(GlyphId16::new(gid)))
            .or_default()
            .push(gid);
    }

    for (class1, record) in table.class1_records().iter().enumerate() {
        let record = record?;
        let Some(lefts) = left_classes.get(&(class1 as u16)) else {
            continue;
        };
        for (class2, values) in record.class2_records().iter().enumerate() {
            let value = values?.value_record1().x_advance().unwrap_or(0);
            if value == 0 {
                continue;
            }
            let Some(rights) = right_classes.get(&(class2 as u16)) else {
                continue;
            };
            for &left in lefts {
                for &right in rights {
                    pairs.insert((left, right, value));
                }
            }
        }
    }
    Ok(())
}

/// Collect pairs from the horizontal format 0 subtables of a `kern` table
fn legacy_pairs(
    font: &FontRef,
    pairs: &mut IndexSet<(u16, u16, i16)>,
) -> Result<(), FontbakeError> {
    let Some(data) = font.table_data(KERN) else {
        return Ok(());
    };
    let version: u16 = data.read_at(0)?;
    if version != 0 {
        log::warn!("Unsupported kern table version {}", version);
        return Ok(());
    }
    let num_tables: u16 = data.read_at(2)?;
    let mut offset = 4;
    for _ in 0..num_tables {
        let length: u16 = data.read_at(offset + 2)?;
        let coverage: u16 = data.read_at(offset + 4)?;
        let format = coverage >> 8;
        let horizontal = coverage & 1 != 0;
        if format == 0 && horizontal {
            read_format0(&data, offset, pairs)?;
        } else {
            log::warn!(
                "Skipping kern subtable with format {} and coverage {:#06x}",
                format,
                coverage
            );
        }
        offset += length as usize;
    }
    Ok(())
}

fn read_format0(
    data: &FontData,
    offset: usize,
    pairs: &mut IndexSet<(u16, u16, i16)>,
) -> Result<(), FontbakeError> {
    let num_pairs: u16 = data.read_at(offset + 6)?;
    for i in 0..num_pairs as usize {
        let at = offset + LEGACY_SUBTABLE_HEADER_LEN + i * LEGACY_PAIR_LEN;
        let left: u16 = data.read_at(at)?;
        let right: u16 = data.read_at(at + 2)?;
        let value: i16 = data.read_at(at + 4)?;
        pairs.insert((left, right, value));
    }
    Ok(())
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compile::{compile, CompileOptions},
        Font, Glyph,
    };
    use pretty_assertions::assert_eq;

    fn be(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    /// A PairPos format 1 subtable holding a single pair
    fn pair_pos_format1(left: u16, right: u16, value: i16) -> Vec<u8> {
        be(&[
            1, 12, 0x0004, 0, 1, 18, // header, x advance only on the first glyph
            1, 1, left, // coverage
            1, right, value as u16, // pair set
        ])
    }

    /// A class-based subtable covering A (1) and W (3); only A has a left
    /// class and only V (2) has a right class
    fn pair_pos_format2() -> Vec<u8> {
        be(&[
            2, 24, 0x0004, 0, 32, 40, 2, 2, // header
            0, (-20i16) as u16, // W against everything else, then V
            0, (-40i16) as u16, // A against everything else, then V
            1, 2, 1, 3, // coverage
            1, 1, 1, 1, // class def 1: A is class 1
            1, 2, 1, 1, // class def 2: V is class 1
        ])
    }

    fn extension(lookup_type: u16, subtable: &[u8]) -> Vec<u8> {
        let mut out = be(&[1, lookup_type, 0, 8]);
        out.extend_from_slice(subtable);
        out
    }

    fn lookup(lookup_type: u16, subtables: &[Vec<u8>]) -> Vec<u8> {
        let header_len = 6 + 2 * subtables.len();
        let mut header = vec![lookup_type, 0, subtables.len() as u16];
        let mut offset = header_len;
        for subtable in subtables {
            header.push(offset as u16);
            offset += subtable.len();
        }
        let mut out = be(&header);
        for subtable in subtables {
            out.extend_from_slice(subtable);
        }
        out
    }

    /// A GPOS table with no scripts and a single feature using every lookup
    fn gpos(feature: &[u8; 4], lookups: &[Vec<u8>]) -> Vec<u8> {
        let script_list = be(&[0]);
        let mut feature_list = be(&[1]);
        feature_list.extend_from_slice(feature);
        feature_list.extend(be(&[8, 0, lookups.len() as u16]));
        feature_list.extend(be(&(0..lookups.len() as u16).collect::<Vec<_>>()));

        let mut lookup_list = be(&[lookups.len() as u16]);
        let mut offset = 2 + 2 * lookups.len();
        for lookup in lookups {
            lookup_list.extend(be(&[offset as u16]));
            offset += lookup.len();
        }
        for lookup in lookups {
            lookup_list.extend_from_slice(lookup);
        }

        let feature_list_offset = 10 + script_list.len();
        let lookup_list_offset = feature_list_offset + feature_list.len();
        let mut out = be(&[
            1,
            0,
            10,
            feature_list_offset as u16,
            lookup_list_offset as u16,
        ]);
        out.extend(script_list);
        out.extend(feature_list);
        out.extend(lookup_list);
        out
    }

    fn font_with(tag: &[u8; 4], table: Vec<u8>, keep_names: bool) -> Vec<u8> {
        let mut font = Font::new();
        for name in ["A", "V", "W"] {
            let mut glyph = Glyph::new(name);
            glyph.width = 500.0;
            font.glyphs.insert(glyph);
        }
        if !keep_names {
            font.lib.keep_glyph_names = Some(false);
        }
        let mut compiled = compile(&font, &CompileOptions::default()).expect("compiles");
        compiled.tables.insert(Tag::new(tag), table);
        compiled.to_bytes()
    }

    fn pair(left: &str, right: &str, value: i16) -> KernPair {
        (left.to_string(), right.to_string(), value)
    }

    #[test]
    fn glyph_and_class_pairs() {
        let table = gpos(
            b"kern",
            &[lookup(2, &[pair_pos_format1(1, 2, -50), pair_pos_format2()])],
        );
        let pairs = dump_kerning(&font_with(b"GPOS", table, true)).expect("dumps");
        assert_eq!(
            pairs,
            vec![
                pair("A", "V", -50),
                pair("W", "V", -20),
                pair("A", "V", -40),
            ]
        );
    }

    #[test]
    fn extension_lookups_and_duplicates() {
        let table = gpos(
            b"kern",
            &[
                lookup(9, &[extension(2, &pair_pos_format1(1, 2, -50))]),
                lookup(2, &[pair_pos_format1(1, 2, -50)]),
            ],
        );
        let pairs = dump_kerning(&font_with(b"GPOS", table, true)).expect("dumps");
        assert_eq!(pairs, vec![pair("A", "V", -50)]);
    }

    #[test]
    fn names_fall_back_to_glyph_ids() {
        let table = gpos(b"kern", &[lookup(2, &[pair_pos_format1(1, 3, 20)])]);
        let pairs = dump_kerning(&font_with(b"GPOS", table, false)).expect("dumps");
        assert_eq!(pairs, vec![pair("glyph00001", "glyph00003", 20)]);
    }

    #[test]
    fn other_features_are_ignored() {
        let table = gpos(b"dist", &[lookup(2, &[pair_pos_format1(1, 2, -50)])]);
        let pairs = dump_kerning(&font_with(b"GPOS", table, true)).expect("dumps");
        assert!(pairs.is_empty());
    }

    #[test]
    fn legacy_kern_table() {
        let table = be(&[
            0, 1, // version, one subtable
            0, 26, 0x0001, 2, 12, 1, 0, // format 0, horizontal, two pairs
            1, 2, (-30i16) as u16, //
            3, 2, 15,
        ]);
        let pairs = dump_kerning(&font_with(b"kern", table, true)).expect("dumps");
        assert_eq!(pairs, vec![pair("A", "V", -30), pair("W", "V", 15)]);
    }
}
