//! Unicode and code page coverage bits for the OS/2 table
use std::collections::BTreeSet;

/// `(bit, first, last)` for every block in the ulUnicodeRange table,
/// sorted by first codepoint
#[rustfmt::skip]
const UNICODE_RANGES: &[(u8, u32, u32)] = &[
    (0, 0x0000, 0x007F), (1, 0x0080, 0x00FF), (2, 0x0100, 0x017F),
    (3, 0x0180, 0x024F), (4, 0x0250, 0x02AF), (5, 0x02B0, 0x02FF),
    (6, 0x0300, 0x036F), (7, 0x0370, 0x03FF), (9, 0x0400, 0x04FF),
    (9, 0x0500, 0x052F), (10, 0x0530, 0x058F), (11, 0x0590, 0x05FF),
    (13, 0x0600, 0x06FF), (71, 0x0700, 0x074F), (13, 0x0750, 0x077F),
    (72, 0x0780, 0x07BF), (14, 0x07C0, 0x07FF), (15, 0x0900, 0x097F),
    (16, 0x0980, 0x09FF), (17, 0x0A00, 0x0A7F), (18, 0x0A80, 0x0AFF),
    (19, 0x0B00, 0x0B7F), (20, 0x0B80, 0x0BFF), (21, 0x0C00, 0x0C7F),
    (22, 0x0C80, 0x0CFF), (23, 0x0D00, 0x0D7F), (73, 0x0D80, 0x0DFF),
    (24, 0x0E00, 0x0E7F), (25, 0x0E80, 0x0EFF), (70, 0x0F00, 0x0FFF),
    (74, 0x1000, 0x109F), (26, 0x10A0, 0x10FF), (28, 0x1100, 0x11FF),
    (75, 0x1200, 0x137F), (75, 0x1380, 0x139F), (76, 0x13A0, 0x13FF),
    (77, 0x1400, 0x167F), (78, 0x1680, 0x169F), (79, 0x16A0, 0x16FF),
    (84, 0x1700, 0x171F), (84, 0x1720, 0x173F), (84, 0x1740, 0x175F),
    (84, 0x1760, 0x177F), (80, 0x1780, 0x17FF), (81, 0x1800, 0x18AF),
    (93, 0x1900, 0x194F), (94, 0x1950, 0x197F), (95, 0x1980, 0x19DF),
    (80, 0x19E0, 0x19FF), (96, 0x1A00, 0x1A1F), (27, 0x1B00, 0x1B7F),
    (112, 0x1B80, 0x1BBF), (113, 0x1C00, 0x1C4F), (114, 0x1C50, 0x1C7F),
    (4, 0x1D00, 0x1D7F), (4, 0x1D80, 0x1DBF), (6, 0x1DC0, 0x1DFF),
    (29, 0x1E00, 0x1EFF), (30, 0x1F00, 0x1FFF), (31, 0x2000, 0x206F),
    (32, 0x2070, 0x209F), (33, 0x20A0, 0x20CF), (34, 0x20D0, 0x20FF),
    (35, 0x2100, 0x214F), (36, 0x2150, 0x218F), (37, 0x2190, 0x21FF),
    (38, 0x2200, 0x22FF), (39, 0x2300, 0x23FF), (40, 0x2400, 0x243F),
    (41, 0x2440, 0x245F), (42, 0x2460, 0x24FF), (43, 0x2500, 0x257F),
    (44, 0x2580, 0x259F), (45, 0x25A0, 0x25FF), (46, 0x2600, 0x26FF),
    (47, 0x2700, 0x27BF), (38, 0x27C0, 0x27EF), (37, 0x27F0, 0x27FF),
    (82, 0x2800, 0x28FF), (37, 0x2900, 0x297F), (38, 0x2980, 0x29FF),
    (38, 0x2A00, 0x2AFF), (37, 0x2B00, 0x2BFF), (97, 0x2C00, 0x2C5F),
    (29, 0x2C60, 0x2C7F), (8, 0x2C80, 0x2CFF), (26, 0x2D00, 0x2D2F),
    (98, 0x2D30, 0x2D7F), (75, 0x2D80, 0x2DDF), (9, 0x2DE0, 0x2DFF),
    (31, 0x2E00, 0x2E7F), (59, 0x2E80, 0x2EFF), (59, 0x2F00, 0x2FDF),
    (59, 0x2FF0, 0x2FFF), (48, 0x3000, 0x303F), (49, 0x3040, 0x309F),
    (50, 0x30A0, 0x30FF), (51, 0x3100, 0x312F), (52, 0x3130, 0x318F),
    (59, 0x3190, 0x319F), (51, 0x31A0, 0x31BF), (61, 0x31C0, 0x31EF),
    (50, 0x31F0, 0x31FF), (54, 0x3200, 0x32FF), (55, 0x3300, 0x33FF),
    (59, 0x3400, 0x4DBF), (99, 0x4DC0, 0x4DFF), (59, 0x4E00, 0x9FFF),
    (83, 0xA000, 0xA48F), (83, 0xA490, 0xA4CF), (12, 0xA500, 0xA63F),
    (9, 0xA640, 0xA69F), (5, 0xA700, 0xA71F), (29, 0xA720, 0xA7FF),
    (100, 0xA800, 0xA82F), (53, 0xA840, 0xA87F), (115, 0xA880, 0xA8DF),
    (116, 0xA900, 0xA92F), (117, 0xA930, 0xA95F), (118, 0xAA00, 0xAA5F),
    (56, 0xAC00, 0xD7AF), (57, 0xD800, 0xDFFF), (60, 0xE000, 0xF8FF),
    (61, 0xF900, 0xFAFF), (62, 0xFB00, 0xFB4F), (63, 0xFB50, 0xFDFF),
    (91, 0xFE00, 0xFE0F), (65, 0xFE10, 0xFE1F), (64, 0xFE20, 0xFE2F),
    (65, 0xFE30, 0xFE4F), (66, 0xFE50, 0xFE6F), (67, 0xFE70, 0xFEFF),
    (68, 0xFF00, 0xFFEF), (69, 0xFFF0, 0xFFFF), (101, 0x10000, 0x1007F),
    (101, 0x10080, 0x100FF), (101, 0x10100, 0x1013F), (102, 0x10140, 0x1018F),
    (119, 0x10190, 0x101CF), (120, 0x101D0, 0x101FF), (121, 0x10280, 0x1029F),
    (121, 0x102A0, 0x102DF), (85, 0x10300, 0x1032F), (86, 0x10330, 0x1034F),
    (103, 0x10380, 0x1039F), (104, 0x103A0, 0x103DF), (87, 0x10400, 0x1044F),
    (105, 0x10450, 0x1047F), (106, 0x10480, 0x104AF), (107, 0x10800, 0x1083F),
    (58, 0x10900, 0x1091F), (121, 0x10920, 0x1093F), (108, 0x10A00, 0x10A5F),
    (110, 0x12000, 0x123FF), (110, 0x12400, 0x1247F), (88, 0x1D000, 0x1D0FF),
    (88, 0x1D100, 0x1D1FF), (88, 0x1D200, 0x1D24F), (109, 0x1D300, 0x1D35F),
    (111, 0x1D360, 0x1D37F), (89, 0x1D400, 0x1D7FF), (122, 0x1F000, 0x1F02F),
    (122, 0x1F030, 0x1F09F), (59, 0x20000, 0x2A6DF), (61, 0x2F800, 0x2FA1F),
    (92, 0xE0000, 0xE007F), (91, 0xE0100, 0xE01EF), (90, 0xF0000, 0xFFFFD),
    (90, 0x100000, 0x10FFFD),
];

/// Windows code page numbers and their ulCodePageRange bits
#[rustfmt::skip]
const CODE_PAGES: &[(u32, u8)] = &[
    (1252, 0), (1250, 1), (1251, 2), (1253, 3), (1254, 4), (1255, 5),
    (1256, 6), (1257, 7), (1258, 8), (874, 16), (932, 17), (936, 18),
    (949, 19), (950, 20), (1361, 21), (869, 48), (866, 49), (865, 50),
    (864, 51), (863, 52), (862, 53), (861, 54), (860, 55), (857, 56),
    (855, 57), (852, 58), (775, 59), (737, 60), (708, 61), (850, 62),
    (437, 63),
];

/// The ulUnicodeRange bit covering a codepoint
pub fn unicode_range_bit(codepoint: u32) -> Option<u8> {
    let index = UNICODE_RANGES.partition_point(|&(_, first, _)| first <= codepoint);
    let (bit, _, last) = *UNICODE_RANGES.get(index.checked_sub(1)?)?;
    (codepoint <= last).then_some(bit)
}

/// The ulUnicodeRange bits for a set of codepoints. Any codepoint outside
/// the BMP also sets bit 57.
pub fn unicode_ranges(codepoints: impl IntoIterator<Item = u32>) -> BTreeSet<u8> {
    let mut bits = BTreeSet::new();
    for codepoint in codepoints {
        if let Some(bit) = unicode_range_bit(codepoint) {
            bits.insert(bit);
        }
        if codepoint > 0xFFFF {
            bits.insert(57);
        }
    }
    bits
}

/// Convert a list of code page references to bits.
///
/// Values below 64 are already bit numbers; larger values are Windows code
/// page numbers. Unknown code pages are skipped with a warning.
pub fn code_page_bits(values: &[u32]) -> BTreeSet<u8> {
    let mut bits = BTreeSet::new();
    for &value in values {
        if value < 64 {
            bits.insert(value as u8);
        } else if let Some(&(_, bit)) = CODE_PAGES.iter().find(|(page, _)| *page == value) {
            bits.insert(bit);
        } else {
            log::warn!("Unknown code page {}; not setting a ulCodePageRange bit", value);
        }
    }
    bits
}

/// Guess the code pages a font supports from the characters it maps,
/// using one or two telltale characters per code page. Falls back to
/// Latin 1 so that the font is usable in applications which insist on
/// some code page.
pub fn code_page_ranges(codepoints: &BTreeSet<u32>) -> BTreeSet<u8> {
    let has = |c: char| codepoints.contains(&(c as u32));
    let has_ascii = (0x20..0x7E).all(|cp| codepoints.contains(&cp));
    let has_lineart = has('┤');
    let mut bits = BTreeSet::new();
    let mut add_if = |condition: bool, bit: u8| {
        if condition {
            bits.insert(bit);
        }
    };

    add_if(has('Þ') && has_ascii, 0);
    add_if(has('Ľ') && has_ascii, 1);
    add_if(has('Ľ') && has_ascii && has_lineart, 58);
    add_if(has('Б'), 2);
    add_if(has('Б') && has('Ѕ') && has_lineart, 57);
    add_if(has('Б') && has('╜') && has_lineart, 49);
    add_if(has('Ά'), 3);
    add_if(has('Ά') && has_lineart && has('½'), 48);
    add_if(has('Ά') && has_lineart && has('√'), 60);
    add_if(has('İ') && has_ascii, 4);
    add_if(has('İ') && has_ascii && has_lineart, 56);
    add_if(has('א'), 5);
    add_if(has('א') && has_lineart && has('√'), 53);
    add_if(has('ر'), 6);
    add_if(has('ر') && has('√'), 51);
    add_if(has('ر') && has_lineart, 61);
    add_if(has('ŗ') && has_ascii, 7);
    add_if(has('ŗ') && has_ascii && has_lineart, 59);
    add_if(has('₫') && has_ascii, 8);
    add_if(has('ๅ'), 16);
    add_if(has('エ'), 17);
    add_if(has('ㄅ'), 18);
    add_if(has('ㄱ'), 19);
    add_if(has('央'), 20);
    add_if(has('곴'), 21);
    add_if(has('♥') && has_ascii, 30);
    add_if(has('þ') && has_ascii && has_lineart, 54);
    add_if(has('╚') && has_ascii, 62);
    add_if(has('╚') && has_ascii, 63);
    let dos = has_ascii && has_lineart && has('√');
    add_if(dos && has('Å'), 50);
    add_if(dos && has('é'), 52);
    add_if(dos && has('õ'), 55);
    add_if(has_ascii && has('‰') && has('∑'), 29);

    if bits.is_empty() {
        bits.insert(0);
    }
    bits
}

/// Pack bit numbers into `N` 32-bit words, least significant bit first
pub fn to_words<const N: usize>(bits: &BTreeSet<u8>) -> [u32; N] {
    let mut words = [0u32; N];
    for &bit in bits {
        if let Some(word) = words.get_mut(bit as usize / 32) {
            *word |= 1 << (bit % 32);
        }
    }
    words
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn ranges_are_sorted() {
        assert!(UNICODE_RANGES
            .windows(2)
            .all(|pair| pair[0].2 < pair[1].1));
    }

    #[rstest]
    #[case(0x41, Some(0))]
    #[case(0xE9, Some(1))]
    #[case(0x0628, Some(13))]
    #[case(0x0710, Some(71))]
    #[case(0x1D90, Some(4))]
    #[case(0x4E00, Some(59))]
    #[case(0x20000, Some(59))]
    #[case(0x0860, None)]
    fn range_lookup(#[case] codepoint: u32, #[case] expected: Option<u8>) {
        assert_eq!(unicode_range_bit(codepoint), expected);
    }

    #[test]
    fn supplementary_sets_bit_57() {
        let bits = unicode_ranges([0x41, 0x1F600]);
        assert_eq!(bits, BTreeSet::from([0, 57]));
    }

    #[test]
    fn code_page_numbers_and_bits() {
        assert_eq!(code_page_bits(&[1252, 1251, 437, 29]), BTreeSet::from([0, 2, 29, 63]));
        assert_eq!(code_page_bits(&[1200]), BTreeSet::new());
    }

    #[test]
    fn latin_fonts_get_latin_1() {
        let mut codepoints: BTreeSet<u32> = (0x20..0x7F).collect();
        assert_eq!(code_page_ranges(&codepoints), BTreeSet::from([0]));
        codepoints.insert('Þ' as u32);
        codepoints.insert('Б' as u32);
        codepoints.insert('‰' as u32);
        codepoints.insert('∑' as u32);
        assert_eq!(code_page_ranges(&codepoints), BTreeSet::from([0, 2, 29]));
    }

    #[test]
    fn words() {
        let words: [u32; 2] = to_words(&BTreeSet::from([0, 31, 32, 63]));
        assert_eq!(words, [0x8000_0001, 0x8000_0001]);
    }
}
