//! Unicode properties used to decide the direction and shaping engine of
//! a glyph: scripts, script extensions, bidi classes and combining marks.
use crate::common::{BidiType, Direction};
use unicode_bidi::{bidi_class, BidiClass};
use unicode_general_category::{get_general_category, GeneralCategory};
use unicode_script::{Script, UnicodeScript};

/// Script codes whose horizontal direction is right to left
pub const RTL_SCRIPTS: &[&str] = &[
    "Adlm", "Arab", "Armi", "Avst", "Chrs", "Cprt", "Elym", "Hatr", "Hebr", "Hung", "Khar",
    "Lydi", "Mand", "Mani", "Mend", "Merc", "Mero", "Narb", "Nbat", "Nkoo", "Orkh", "Ougr",
    "Palm", "Phli", "Phlp", "Phnx", "Prti", "Rohg", "Samr", "Sarb", "Sogd", "Sogo", "Syrc",
    "Thaa", "Yezi",
];

/// Scripts shaped by the Indic engine
pub const INDIC_SCRIPTS: &[&str] = &[
    "Beng", "Deva", "Gujr", "Guru", "Knda", "Mlym", "Orya", "Sinh", "Taml", "Telu",
];

/// Scripts shaped by the Universal Shaping Engine
pub const USE_SCRIPTS: &[&str] = &[
    "Adlm", "Ahom", "Bali", "Batk", "Bhks", "Brah", "Bugi", "Buhd", "Cakm", "Cham", "Chrs",
    "Cpmn", "Diak", "Dogr", "Dupl", "Egyp", "Elym", "Gong", "Gonm", "Gran", "Hano", "Hmng",
    "Hmnp", "Java", "Kali", "Kawi", "Khar", "Khoj", "Kits", "Kthi", "Lana", "Lepc", "Limb",
    "Mahj", "Maka", "Mand", "Mani", "Marc", "Medf", "Modi", "Mong", "Mtei", "Mult", "Nagm",
    "Nand", "Newa", "Nkoo", "Ougr", "Phag", "Phlp", "Plrd", "Rjng", "Rohg", "Saur", "Shrd",
    "Sidd", "Sind", "Sogd", "Sogo", "Soyo", "Sund", "Sylo", "Tagb", "Takr", "Tale", "Tavt",
    "Tfng", "Tglg", "Tirh", "Tnsa", "Toto", "Vith", "Wcho", "Yezi", "Zanb",
];

/// Scripts which position with the `dist` feature rather than `kern`
pub fn is_dist_enabled(script: &str) -> bool {
    INDIC_SCRIPTS.contains(&script)
        || USE_SCRIPTS.contains(&script)
        || script == "Khmr"
        || script == "Mymr"
}

pub const INHERITED: &str = "Zinh";

fn char_script(cp: u32) -> Script {
    char::from_u32(cp).map_or(Script::Unknown, |c| c.script())
}

pub fn script_horizontal_direction(script: &str) -> Direction {
    if RTL_SCRIPTS.contains(&script) {
        Direction::RightToLeft
    } else {
        Direction::LeftToRight
    }
}

/// The direction of the script a codepoint belongs to, or `None` for
/// characters shared between scripts.
pub fn script_direction(cp: u32) -> Option<Direction> {
    match char_script(cp) {
        Script::Common | Script::Inherited => None,
        other => Some(script_horizontal_direction(other.short_name())),
    }
}

pub fn is_combining_mark(cp: u32) -> bool {
    char::from_u32(cp).is_some_and(|c| {
        matches!(
            get_general_category(c),
            GeneralCategory::NonspacingMark
                | GeneralCategory::SpacingMark
                | GeneralCategory::EnclosingMark
        )
    })
}

/// Strong bidi type of a codepoint: `R` for R and AL, `L` for L, AN and
/// EN. Every other class gives `None`.
pub fn bidi_type(cp: u32) -> Option<BidiType> {
    match bidi_class(char::from_u32(cp)?) {
        BidiClass::R | BidiClass::AL => Some(BidiType::R),
        BidiClass::L | BidiClass::AN | BidiClass::EN => Some(BidiType::L),
        _ => None,
    }
}

/// Whether a codepoint is used by any of `scripts`. `None` for codepoints
/// common to all scripts.
pub fn in_scripts(cp: u32, scripts: &[&str]) -> Option<bool> {
    let Some(c) = char::from_u32(cp) else {
        return Some(false);
    };
    let extension = c.script_extension();
    if extension.is_common() {
        return None;
    }
    if extension.is_inherited() {
        return Some(scripts.contains(&INHERITED));
    }
    Some(
        scripts
            .iter()
            .filter_map(|s| Script::from_short_name(s))
            .any(|script| extension.contains_script(script)),
    )
}

const NEW_SCRIPT_TAGS: &[(&str, &str)] = &[
    ("bng2", "Beng"),
    ("dev2", "Deva"),
    ("gjr2", "Gujr"),
    ("gur2", "Guru"),
    ("knd2", "Knda"),
    ("mlm2", "Mlym"),
    ("mym2", "Mymr"),
    ("ory2", "Orya"),
    ("tel2", "Telu"),
    ("tml2", "Taml"),
];

/// Convert an OpenType script tag to a Unicode script code. `DFLT` and
/// tags which don't name a known script give `None`.
pub fn ot_tag_to_script(tag: &str) -> Option<String> {
    let tag = tag.trim_end();
    if tag.is_empty() || tag.len() > 4 || tag == "DFLT" || !tag.is_ascii() {
        return None;
    }
    if let Some((_, script)) = NEW_SCRIPT_TAGS.iter().find(|(t, _)| *t == tag) {
        return Some(script.to_string());
    }
    // Short tags repeat their last letter: "lao " is Laoo, "yi  " is Yiii
    let mut chars: Vec<char> = tag.chars().collect();
    while chars.len() < 4 {
        let last = *chars.last()?;
        chars.push(last);
    }
    let mut code = String::with_capacity(4);
    code.push(chars[0].to_ascii_uppercase());
    code.extend(chars[1..].iter());
    Script::from_short_name(&code).map(|_| code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0x41, "Latn")]
    #[case(0x20, "Zyyy")]
    #[case(0x0301, "Zinh")]
    #[case(0x0628, "Arab")]
    #[case(0x05D0, "Hebr")]
    #[case(0x0915, "Deva")]
    #[case(0xE000, "Zzzz")]
    #[case(0x0378, "Zzzz")]
    fn scripts(#[case] cp: u32, #[case] expected: &str) {
        assert_eq!(char_script(cp).short_name(), expected);
    }

    #[rstest]
    #[case(0x41, Some(Direction::LeftToRight))]
    #[case(0x0628, Some(Direction::RightToLeft))]
    #[case(0x0030, None)]
    #[case(0x0651, None)]
    fn directions(#[case] cp: u32, #[case] expected: Option<Direction>) {
        assert_eq!(script_direction(cp), expected);
    }

    #[rstest]
    #[case(0x41, Some(BidiType::L))]
    #[case(0x0628, Some(BidiType::R))]
    #[case(0x0661, Some(BidiType::L))]
    #[case(0x0031, Some(BidiType::L))]
    #[case(0x20, None)]
    #[case(0x064E, None)]
    // Arabic punctuation and tatweel are AL but belong to no single script
    #[case(0x061F, Some(BidiType::R))]
    #[case(0x0640, Some(BidiType::R))]
    #[case(0x060C, None)]
    #[case(0x05D0, Some(BidiType::R))]
    fn bidi_types(#[case] cp: u32, #[case] expected: Option<BidiType>) {
        assert_eq!(bidi_type(cp), expected);
    }

    #[test]
    fn script_membership() {
        assert_eq!(in_scripts(0x0915, INDIC_SCRIPTS), Some(true));
        assert_eq!(in_scripts(0x41, INDIC_SCRIPTS), Some(false));
        assert_eq!(in_scripts(0x20, INDIC_SCRIPTS), None);
        assert_eq!(in_scripts(0x0964, INDIC_SCRIPTS), Some(true));
        assert_eq!(in_scripts(0x0301, INDIC_SCRIPTS), Some(false));
    }

    #[rstest]
    #[case(0x0301, true)]
    #[case(0x093E, true)]
    #[case(0x20DD, true)]
    #[case(0x0041, false)]
    #[case(0x02C6, false)]
    fn combining_marks(#[case] cp: u32, #[case] expected: bool) {
        assert_eq!(is_combining_mark(cp), expected);
    }

    #[rstest]
    #[case("arab", Some("Arab"))]
    #[case("dev2", Some("Deva"))]
    #[case("deva", Some("Deva"))]
    #[case("lao ", Some("Laoo"))]
    #[case("nko", Some("Nkoo"))]
    #[case("DFLT", None)]
    #[case("xxxx", None)]
    fn ot_tags(#[case] tag: &str, #[case] expected: Option<&str>) {
        assert_eq!(ot_tag_to_script(tag).as_deref(), expected);
    }

    #[test]
    fn dist_scripts() {
        assert!(is_dist_enabled("Deva"));
        assert!(is_dist_enabled("Khmr"));
        assert!(!is_dist_enabled("Latn"));
        assert!(!is_dist_enabled("Arab"));
    }
}
