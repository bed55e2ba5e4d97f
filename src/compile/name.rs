use super::table_error;
use crate::{
    info::{normalize_for_postscript, FontInfo},
    FontbakeError,
};
use std::collections::BTreeMap;
use write_fonts::{
    dump_table,
    tables::name::{Name, NameRecord},
    types::NameId,
};

const WINDOWS: u16 = 3;
const WINDOWS_BMP: u16 = 1;
const WINDOWS_FULL: u16 = 10;
const ENGLISH_US: u16 = 0x409;

fn title_case(style: &str) -> String {
    style
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// The Windows English strings for each name ID, with fallbacks filled in
fn default_names(info: &FontInfo) -> BTreeMap<u16, String> {
    let family = info.style_map_family_name();
    let style = title_case(&info.style_map_style_name());
    let mut names = BTreeMap::new();
    let mut add = |id: u16, value: Option<String>| {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            names.insert(id, value);
        }
    };
    add(0, info.copyright.clone());
    add(1, Some(family.clone()));
    add(2, Some(style.clone()));
    add(3, Some(info.unique_id()));
    add(4, Some(info.postscript_full_name()));
    add(5, Some(info.version_string()));
    add(
        6,
        Some(normalize_for_postscript(&info.postscript_font_name(), false)),
    );
    add(7, info.trademark.clone());
    add(8, info.open_type_name_manufacturer.clone());
    add(9, info.open_type_name_designer.clone());
    add(10, info.open_type_name_description.clone());
    add(11, info.open_type_name_manufacturer_url.clone());
    add(12, info.open_type_name_designer_url.clone());
    add(13, info.open_type_name_license.clone());
    add(14, info.open_type_name_license_url.clone());
    let preferred_family = info.preferred_family_name().to_string();
    if preferred_family != family {
        add(16, Some(preferred_family));
    }
    let preferred_subfamily = info.preferred_subfamily_name().to_string();
    if preferred_subfamily != style {
        add(17, Some(preferred_subfamily));
    }
    add(18, info.open_type_name_compatible_full_name.clone());
    add(19, info.open_type_name_sample_text.clone());
    add(21, info.open_type_name_wws_family_name.clone());
    add(22, info.open_type_name_wws_subfamily_name.clone());
    names
}

fn windows_record(name_id: u16, string: &str) -> NameRecord {
    let encoding = if string.chars().any(|c| c as u32 > 0xFFFF) {
        WINDOWS_FULL
    } else {
        WINDOWS_BMP
    };
    NameRecord {
        platform_id: WINDOWS,
        encoding_id: encoding,
        language_id: ENGLISH_US,
        name_id: NameId::new(name_id),
        string: string.to_string().into(),
    }
}

/// Build the `name` table.
///
/// Explicit `openTypeNameRecords` replace the generated Windows English
/// record with the same name ID; records for other platforms and languages
/// are added alongside.
pub fn build_name(info: &FontInfo) -> Result<Vec<u8>, FontbakeError> {
    let explicit = info.open_type_name_records.as_deref().unwrap_or_default();
    let overridden = |id: u16| {
        explicit.iter().any(|r| {
            r.name_id == id && r.platform_id == WINDOWS && r.language_id == ENGLISH_US
        })
    };

    let mut records: BTreeMap<(u16, u16, u16, u16), NameRecord> = BTreeMap::new();
    for (id, string) in default_names(info) {
        if overridden(id) {
            continue;
        }
        let record = windows_record(id, &string);
        records.insert(
            (
                record.platform_id,
                record.encoding_id,
                record.language_id,
                id,
            ),
            record,
        );
    }
    for record in explicit {
        records.insert(
            (
                record.platform_id,
                record.encoding_id,
                record.language_id,
                record.name_id,
            ),
            NameRecord {
                platform_id: record.platform_id,
                encoding_id: record.encoding_id,
                language_id: record.language_id,
                name_id: NameId::new(record.name_id),
                string: record.string.clone().into(),
            },
        );
    }

    let mut name = Name::default();
    name.name_record = records.into_values().collect();
    name.name_record.sort();
    dump_table(&name).map_err(|e| table_error("name", e))
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::NameRecord as ExplicitRecord;
    use pretty_assertions::assert_eq;
    use write_fonts::read::{tables::name::Name as ReadName, FontData, FontRead};

    fn decoded(info: &FontInfo) -> Vec<(u16, u16, u16, String)> {
        let bytes = build_name(info).expect("name");
        let name = ReadName::read(FontData::new(&bytes)).expect("valid name");
        name.name_record()
            .iter()
            .map(|r| {
                (
                    r.platform_id(),
                    r.encoding_id(),
                    r.name_id().to_u16(),
                    r.string(name.string_data())
                        .expect("string")
                        .chars()
                        .collect(),
                )
            })
            .collect()
    }

    fn strings(info: &FontInfo) -> Vec<(u16, String)> {
        decoded(info)
            .into_iter()
            .map(|(_, _, id, s)| (id, s))
            .collect()
    }

    #[test]
    fn fallbacks() {
        let info = FontInfo {
            family_name: Some("Test".to_string()),
            style_name: Some("Regular".to_string()),
            version_major: Some(1),
            version_minor: Some(5),
            ..Default::default()
        };
        assert_eq!(
            strings(&info),
            vec![
                (1, "Test".to_string()),
                (2, "Regular".to_string()),
                (3, "1.005;NONE;Test-Regular".to_string()),
                (4, "Test Regular".to_string()),
                (5, "Version 1.005".to_string()),
                (6, "Test-Regular".to_string()),
            ]
        );
    }

    #[test]
    fn typographic_names_for_non_ribbi_styles() {
        let info = FontInfo {
            family_name: Some("Test".to_string()),
            style_name: Some("Semibold Italic".to_string()),
            ..Default::default()
        };
        let strings = strings(&info);
        assert!(strings.contains(&(1, "Test Semibold Italic".to_string())));
        assert!(strings.contains(&(2, "Regular".to_string())));
        assert!(strings.contains(&(16, "Test".to_string())));
        assert!(strings.contains(&(17, "Semibold Italic".to_string())));
        assert!(strings.contains(&(6, "Test-SemiboldItalic".to_string())));
    }

    #[test]
    fn explicit_records_override_and_sort() {
        let info = FontInfo {
            family_name: Some("Test".to_string()),
            open_type_name_records: Some(vec![
                ExplicitRecord {
                    name_id: 1,
                    platform_id: 3,
                    encoding_id: 1,
                    language_id: 0x409,
                    string: "Override".to_string(),
                },
                ExplicitRecord {
                    name_id: 1,
                    platform_id: 1,
                    encoding_id: 0,
                    language_id: 0,
                    string: "Mac".to_string(),
                },
            ]),
            ..Default::default()
        };
        let records = decoded(&info);
        assert_eq!(records[0], (1, 0, 1, "Mac".to_string()));
        assert!(records.contains(&(3, 1, 1, "Override".to_string())));
        assert!(!records.contains(&(3, 1, 1, "Test".to_string())));
    }

    #[test]
    fn supplementary_strings_use_full_unicode_encoding() {
        let info = FontInfo {
            open_type_name_sample_text: Some("\u{1F600}".to_string()),
            ..Default::default()
        };
        let records = decoded(&info);
        assert_eq!(
            records.last(),
            Some(&(3, 10, 19, "\u{1F600}".to_string()))
        );
    }
}
