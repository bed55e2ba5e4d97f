#![cfg(feature = "ufo")]
use fontbake::{build, load, BuildOptions, FontbakeError};
use pretty_assertions::assert_eq;
use write_fonts::read::{FontRef, TableProvider};

fn name(s: &str) -> norad::Name {
    norad::Name::new(s).expect("valid name")
}

fn write_ufo(dir: &std::path::Path) -> std::path::PathBuf {
    let mut ufo = norad::Font::new();
    ufo.font_info.family_name = Some("Loaded".to_string());
    ufo.font_info.style_name = Some("Regular".to_string());
    ufo.font_info.open_type_head_created = Some("2023/03/04 05:06:07".to_string());

    let mut a = norad::Glyph::new("A");
    a.width = 640.0;
    a.codepoints.insert('A');
    a.anchors.push(norad::Anchor::new(
        320.0,
        700.0,
        Some(name("top")),
        None,
        None,
        None,
    ));
    a.contours.push(norad::Contour::new(
        vec![
            norad::ContourPoint::new(20.0, 0.0, norad::PointType::Line, false, None, None, None),
            norad::ContourPoint::new(320.0, 700.0, norad::PointType::Line, false, None, None, None),
            norad::ContourPoint::new(620.0, 0.0, norad::PointType::Line, false, None, None, None),
        ],
        None,
        None,
    ));
    ufo.default_layer_mut().insert_glyph(a);

    let mut v = norad::Glyph::new("V");
    v.width = 600.0;
    v.codepoints.insert('V');
    ufo.default_layer_mut().insert_glyph(v);

    let mut acute = norad::Glyph::new("acutecomb");
    acute.codepoints.insert('\u{301}');
    acute.anchors.push(norad::Anchor::new(
        100.0,
        500.0,
        Some(name("_top")),
        None,
        None,
        None,
    ));
    ufo.default_layer_mut().insert_glyph(acute);

    ufo.kerning
        .entry(name("A"))
        .or_default()
        .insert(name("V"), -60.0);

    let path = dir.join("Loaded.ufo");
    ufo.save(&path).expect("saves");
    path
}

#[test]
fn ufo_to_font() -> Result<(), FontbakeError> {
    let dir = tempfile::tempdir()?;
    let font = load(write_ufo(dir.path()))?;
    let output = build(font, &BuildOptions::default())?;

    assert!(output.features.contains("pos A V -60;"));
    assert!(output.features.contains("<anchor 320 700> mark @MC_top;"));

    let bytes = output.font.to_bytes();
    let compiled = FontRef::new(&bytes)?;
    assert_eq!(compiled.maxp()?.num_glyphs(), 4);
    let gid = compiled.cmap()?.map_codepoint('A').expect("A is mapped");
    assert_eq!(output.font.glyph_order[0], ".notdef");
    assert_eq!(output.font.glyph_order[gid.to_u32() as usize], "A");
    assert_eq!(compiled.hmtx()?.advance(gid), Some(640));
    Ok(())
}
