use super::{
    ast::{anchor_or_null, lookup_flag, Block, LookupFlags},
    FeatureContext, FeatureDocument, FeatureWriter, GeneratedCode,
};
use crate::{
    anchor::{ENTRY_NAME, EXIT_NAME},
    common::Direction,
    layout::classify_glyphs,
    unicode::script_direction,
    FontbakeError,
};
use smol_str::SmolStr;
use std::collections::{BTreeSet, HashSet};

/// Writes the `curs` feature from `entry` and `exit` anchors
pub struct CursFeatureWriter;

/// Entry and exit anchor names which go into one lookup. Besides the plain
/// `entry`/`exit` pair, `entry.foo` pairs up with `exit.foo`.
fn anchor_pairs(ctx: &FeatureContext) -> Vec<(String, String)> {
    let names: HashSet<&str> = ctx
        .font
        .glyphs
        .values()
        .flat_map(|g| g.anchors.iter().map(|a| a.name.as_str()))
        .collect();
    let mut pairs = BTreeSet::new();
    if names.contains(ENTRY_NAME) && names.contains(EXIT_NAME) {
        pairs.insert((ENTRY_NAME.to_string(), EXIT_NAME.to_string()));
    }
    for name in names.iter() {
        if let Some(suffix) = name.strip_prefix("entry.") {
            let exit = format!("{}.{}", EXIT_NAME, suffix);
            if names.contains(exit.as_str()) {
                pairs.insert((name.to_string(), exit));
            }
        }
    }
    pairs.into_iter().collect()
}

fn cursive_rules(
    ctx: &FeatureContext,
    include: impl Fn(&str) -> bool,
    entry_name: &str,
    exit_name: &str,
) -> Vec<String> {
    let mut rules = vec![];
    for name in ctx.glyph_order.iter().filter(|n| include(n.as_str())) {
        let Some(glyph) = ctx.font.glyphs.get(name) else {
            continue;
        };
        let mut entry = None;
        let mut exit = None;
        for a in glyph.anchors.iter() {
            if a.name == entry_name && entry.is_none() {
                entry = Some((a.x, a.y));
            } else if a.name == exit_name && exit.is_none() {
                exit = Some((a.x, a.y));
            }
        }
        // A glyph may attach on one side only
        if entry.is_some() || exit.is_some() {
            rules.push(format!(
                "pos cursive {} {} {};",
                name,
                anchor_or_null(entry),
                anchor_or_null(exit)
            ));
        }
    }
    rules
}

fn cursive_lookup(
    ctx: &FeatureContext,
    include: impl Fn(&str) -> bool,
    (entry_name, exit_name): (&str, &str),
    direction: Option<Direction>,
) -> Option<Block> {
    let rules = cursive_rules(ctx, include, entry_name, exit_name);
    if rules.is_empty() {
        return None;
    }
    let mut name = String::from("curs");
    if let Some(suffix) = entry_name.strip_prefix("entry.") {
        name.push('_');
        name.push_str(suffix);
    }
    let flags = match direction {
        Some(Direction::LeftToRight) => {
            name.push_str("_ltr");
            LookupFlags::IGNORE_MARKS
        }
        Some(Direction::RightToLeft) => {
            name.push_str("_rtl");
            LookupFlags::RTL_IGNORE_MARKS
        }
        None => LookupFlags::RTL_IGNORE_MARKS,
    };
    let mut lookup = Block::lookup(&name);
    lookup.push(lookup_flag(flags, None));
    for rule in rules {
        lookup.push(rule);
    }
    Some(lookup)
}

impl FeatureWriter for CursFeatureWriter {
    fn name(&self) -> &'static str {
        "curs"
    }

    fn write(
        &self,
        ctx: &mut FeatureContext,
        doc: &mut FeatureDocument,
    ) -> Result<bool, FontbakeError> {
        if ctx.todo(doc, &["curs"]).is_empty() {
            return Ok(false);
        }
        let pairs = anchor_pairs(ctx);
        if pairs.is_empty() {
            return Ok(false);
        }

        let ltr_glyphs: Option<BTreeSet<SmolStr>> = if ctx
            .cmap
            .keys()
            .any(|&cp| script_direction(cp) == Some(Direction::LeftToRight))
        {
            let mut by_direction = classify_glyphs(script_direction, &ctx.cmap, &mut ctx.closure)?;
            by_direction.remove(&Direction::LeftToRight)
        } else {
            None
        };

        let mut feature = Block::feature("curs");
        for (entry_name, exit_name) in pairs.iter() {
            let names = (entry_name.as_str(), exit_name.as_str());
            let lookups = match &ltr_glyphs {
                Some(ltr) => vec![
                    cursive_lookup(
                        ctx,
                        |g| ltr.contains(g),
                        names,
                        Some(Direction::LeftToRight),
                    ),
                    cursive_lookup(
                        ctx,
                        |g| !ltr.contains(g),
                        names,
                        Some(Direction::RightToLeft),
                    ),
                ],
                None => vec![cursive_lookup(ctx, |_| true, names, None)],
            };
            for lookup in lookups.into_iter().flatten() {
                feature.push_block(&lookup);
            }
        }
        if feature.is_empty() {
            return Ok(false);
        }
        doc.insert(
            GeneratedCode {
                features: vec![feature],
                ..Default::default()
            },
            ctx.options.mode == super::Mode::Skip,
        )?;
        Ok(true)
    }
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use crate::features::{test_helpers::*, write_features, FeatureOptions};
    use pretty_assertions::assert_eq;

    #[test]
    fn rtl_only_font_gets_one_lookup() {
        let font = font(vec![
            glyph("beh-ar.init", &[], &[("exit", 10.0, 200.0)]),
            glyph(
                "beh-ar.medi",
                &[0x628],
                &[("entry", 490.4, 200.0), ("exit", 10.0, 200.6)],
            ),
            glyph("beh-ar.fina", &[], &[("entry", 490.0, 200.0)]),
        ]);
        let fea = write_features(&font, FeatureOptions::default()).expect("writes");
        assert_eq!(
            fea.split("\ntable GDEF").next().expect("has text"),
            "feature curs {\n    lookup curs {\n        lookupflag RightToLeft IgnoreMarks;\n        \
             pos cursive beh-ar.init <anchor NULL> <anchor 10 200>;\n        \
             pos cursive beh-ar.medi <anchor 490 200> <anchor 10 201>;\n        \
             pos cursive beh-ar.fina <anchor 490 200> <anchor NULL>;\n    } curs;\n} curs;\n"
        );
    }

    #[test]
    fn mixed_directions_split() {
        let font = font(vec![
            glyph("a", &[0x61], &[("entry", 0.0, 100.0), ("exit", 500.0, 100.0)]),
            glyph("beh-ar", &[0x628], &[("entry", 500.0, 0.0), ("exit", 0.0, 0.0)]),
        ]);
        let fea = write_features(&font, FeatureOptions::default()).expect("writes");
        let ltr = fea.find("lookup curs_ltr {").expect("ltr lookup");
        let rtl = fea.find("lookup curs_rtl {").expect("rtl lookup");
        assert!(ltr < rtl);
        let (ltr_part, rtl_part) = fea.split_at(rtl);
        assert!(ltr_part[ltr..].contains("lookupflag IgnoreMarks;\n        pos cursive a "));
        assert!(!ltr_part.contains("beh-ar"));
        assert!(rtl_part.contains("lookupflag RightToLeft IgnoreMarks;\n        pos cursive beh-ar "));
    }

    #[test]
    fn suffixed_anchor_pairs() {
        let font = font(vec![glyph(
            "beh-ar",
            &[0x628],
            &[("entry.alt", 500.0, 0.0), ("exit.alt", 0.0, 0.0), ("entry.lone", 1.0, 1.0)],
        )]);
        let fea = write_features(&font, FeatureOptions::default()).expect("writes");
        assert!(fea.contains("lookup curs_alt {"));
        assert!(!fea.contains("lone"));
    }
}
