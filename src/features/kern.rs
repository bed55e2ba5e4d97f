use super::{
    ast::{add_lookup_references, class_definition, lookup_flag, make_class_name, Block, LookupFlags},
    FeatureContext, FeatureDocument, FeatureWriter, GeneratedCode,
};
use crate::{
    common::{ot_round, BidiType, Direction},
    layout::classify_glyphs,
    unicode::{bidi_type, is_dist_enabled, ot_tag_to_script, script_direction, script_horizontal_direction},
    FontbakeError,
};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet, HashSet};

const FEATURES: [&str; 2] = ["kern", "dist"];
const SIDE1_PREFIX: &str = "public.kern1.";
const SIDE2_PREFIX: &str = "public.kern2.";
const STRIP_PREFIX: &str = "public.";

/// Writes `kern` and `dist` from the kerning and kerning groups of a font
pub struct KernFeatureWriter;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    Glyph(SmolStr),
    /// A kerning group, by its class name in feature code
    Class(SmolStr),
}

impl Side {
    fn is_class(&self) -> bool {
        matches!(self, Side::Class(_))
    }

    fn to_fea(&self) -> String {
        match self {
            Side::Glyph(name) => name.to_string(),
            Side::Class(name) => format!("@{}", name),
        }
    }
}

#[derive(Debug, Clone)]
struct KerningPair {
    side1: Side,
    side2: Side,
    value: f64,
    /// Every glyph either side stands for
    glyphs: HashSet<SmolStr>,
    directions: BTreeSet<Direction>,
    bidi_types: BTreeSet<BidiType>,
}

impl KerningPair {
    fn sort_key(&self) -> (bool, bool, &Side, &Side) {
        (
            self.side1.is_class(),
            self.side2.is_class(),
            &self.side1,
            &self.side2,
        )
    }

    fn is_ambiguous(&self) -> bool {
        if self.directions.contains(&Direction::LeftToRight)
            && self.directions.contains(&Direction::RightToLeft)
        {
            log::warn!(
                "Skipped kern pair {} {} with ambiguous direction",
                self.side1.to_fea(),
                self.side2.to_fea()
            );
            return true;
        }
        if self.bidi_types.contains(&BidiType::L) && self.bidi_types.contains(&BidiType::R) {
            log::warn!(
                "Skipped kern pair {} {} with ambiguous bidi type",
                self.side1.to_fea(),
                self.side2.to_fea()
            );
            return true;
        }
        false
    }

    fn rule(&self, rtl: bool, quantization: f64) -> String {
        let value = ot_round(crate::common::quantize(self.value, quantization));
        // Numbers are shaped left to right even inside RTL runs
        let rtl = rtl && !self.bidi_types.contains(&BidiType::L);
        let value_record = if rtl {
            format!("<{} 0 {} 0>", value, value)
        } else {
            value.to_string()
        };
        let enumerated = self.side1.is_class() ^ self.side2.is_class();
        format!(
            "{}pos {} {} {};",
            if enumerated { "enum " } else { "" },
            self.side1.to_fea(),
            self.side2.to_fea(),
            value_record
        )
    }
}

/// Lookup sets, listed in this order in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LookupGroup {
    Default,
    LeftToRight,
    RightToLeft,
}

/// Kerning groups turned into feature classes
#[derive(Debug, Default)]
struct KerningClasses {
    /// Group name to (class name, members)
    side1: BTreeMap<SmolStr, (SmolStr, Vec<SmolStr>)>,
    side2: BTreeMap<SmolStr, (SmolStr, Vec<SmolStr>)>,
}

impl KerningClasses {
    fn new(ctx: &FeatureContext, existing: &HashSet<SmolStr>) -> Self {
        let mut classes = KerningClasses::default();
        let mut taken = existing.clone();
        for (prefix, target) in [
            (SIDE1_PREFIX, &mut classes.side1),
            (SIDE2_PREFIX, &mut classes.side2),
        ] {
            let mut groups: Vec<(&SmolStr, Vec<SmolStr>)> = ctx
                .font
                .groups
                .iter()
                .filter(|(name, _)| name.starts_with(prefix))
                .map(|(name, members)| {
                    let members = members
                        .iter()
                        .filter(|g| ctx.font.glyphs.contains_key(*g))
                        .cloned()
                        .collect::<Vec<_>>();
                    (name, members)
                })
                .filter(|(_, members)| !members.is_empty())
                .collect();
            groups.sort_by(|a, b| a.0.cmp(b.0));
            for (name, members) in groups {
                let stripped = name.strip_prefix(STRIP_PREFIX).unwrap_or(name);
                let class_name = make_class_name(stripped, &taken);
                taken.insert(class_name.clone());
                target.insert(name.clone(), (class_name, members));
            }
        }
        classes
    }

    fn definitions(&self) -> Vec<String> {
        self.side1
            .values()
            .chain(self.side2.values())
            .map(|(name, members)| class_definition(name, members))
            .collect()
    }
}

fn kerning_pairs(ctx: &FeatureContext, classes: &KerningClasses) -> Vec<KerningPair> {
    let mut pairs = vec![];
    for ((first, second), &value) in ctx.font.kerning.iter() {
        let side = |name: &SmolStr, groups: &BTreeMap<SmolStr, (SmolStr, Vec<SmolStr>)>| {
            if let Some((class_name, members)) = groups.get(name) {
                Some((Side::Class(class_name.clone()), members.clone()))
            } else if ctx.font.glyphs.contains_key(name) {
                Some((Side::Glyph(name.clone()), vec![name.clone()]))
            } else {
                None
            }
        };
        let (Some((side1, glyphs1)), Some((side2, glyphs2))) =
            (side(first, &classes.side1), side(second, &classes.side2))
        else {
            log::debug!("Skipping kern pair {} {} with unknown sides", first, second);
            continue;
        };
        if side1.is_class() && side2.is_class() && value == 0.0 {
            continue;
        }
        pairs.push(KerningPair {
            side1,
            side2,
            value,
            glyphs: glyphs1.into_iter().chain(glyphs2).collect(),
            directions: BTreeSet::new(),
            bidi_types: BTreeSet::new(),
        });
    }
    pairs.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    pairs
}

/// Tag each pair with the keys of the glyph sets it touches, returning
/// every key seen
fn intersect_pairs<K: Ord + Clone>(
    pairs: &mut [KerningPair],
    glyph_sets: &BTreeMap<K, BTreeSet<SmolStr>>,
    attribute: impl Fn(&mut KerningPair) -> &mut BTreeSet<K>,
) -> BTreeSet<K> {
    let mut all = BTreeSet::new();
    for pair in pairs.iter_mut() {
        for (key, glyphs) in glyph_sets.iter() {
            if glyphs.iter().any(|g| pair.glyphs.contains(g)) {
                attribute(pair).insert(key.clone());
                all.insert(key.clone());
            }
        }
    }
    all
}

struct LookupBuilder<'a> {
    quantization: f64,
    ignore_marks: bool,
    lookups: &'a mut BTreeMap<LookupGroup, Vec<Block>>,
}

impl LookupBuilder<'_> {
    fn make(
        &mut self,
        group: LookupGroup,
        name: &str,
        pairs: &[&KerningPair],
        exclude: impl Fn(&KerningPair) -> bool,
        rtl: bool,
        ignore_marks: bool,
    ) {
        let rules: Vec<String> = pairs
            .iter()
            .filter(|&&p| !exclude(p))
            .map(|p| p.rule(rtl, self.quantization))
            .collect();
        if rules.is_empty() {
            return;
        }
        let mut lookup = Block::lookup(name);
        if ignore_marks && self.ignore_marks {
            lookup.push(lookup_flag(LookupFlags::IGNORE_MARKS, None));
        }
        for rule in rules {
            lookup.push(rule);
        }
        self.lookups.entry(group).or_default().push(lookup);
    }

    fn split_direction(&mut self, pairs: &[&KerningPair], ignore_marks: bool, suffix: &str) {
        let ltr = Direction::LeftToRight;
        let rtl = Direction::RightToLeft;
        self.make(
            LookupGroup::Default,
            &format!("kern_dflt{}", suffix),
            pairs,
            |p| p.directions.contains(&ltr) || p.directions.contains(&rtl),
            false,
            ignore_marks,
        );
        self.make(
            LookupGroup::LeftToRight,
            &format!("kern_ltr{}", suffix),
            pairs,
            |p| p.directions.is_empty() || p.directions.contains(&rtl),
            false,
            ignore_marks,
        );
        self.make(
            LookupGroup::RightToLeft,
            &format!("kern_rtl{}", suffix),
            pairs,
            |p| p.directions.is_empty() || p.directions.contains(&ltr),
            true,
            ignore_marks,
        );
    }
}

/// `languagesystem` scripts, by the feature they kern with and their
/// direction
type ScriptGroups = BTreeMap<(&'static str, Direction), Vec<(String, Vec<String>)>>;

fn script_groups(ctx: &FeatureContext) -> ScriptGroups {
    let mut groups: ScriptGroups = BTreeMap::new();
    for (tag, languages) in ctx.info.script_languages() {
        let (feature, direction) = match ot_tag_to_script(&tag) {
            Some(script) => (
                if is_dist_enabled(&script) { "dist" } else { "kern" },
                script_horizontal_direction(&script),
            ),
            None => ("kern", Direction::LeftToRight),
        };
        groups
            .entry((feature, direction))
            .or_default()
            .push((tag, languages));
    }
    groups
}

fn names(lookups: Option<&Vec<Block>>) -> Vec<SmolStr> {
    lookups
        .map(|l| l.iter().map(|b| b.name.clone()).collect())
        .unwrap_or_default()
}

fn add_by_script(feature: &mut Block, lookups: &[SmolStr], scripts: &[(String, Vec<String>)]) {
    for (script, languages) in scripts {
        add_lookup_references(feature, lookups, Some(script.as_str()), languages);
    }
}

fn register_kern_lookups(
    feature: &mut Block,
    lookups: &BTreeMap<LookupGroup, Vec<Block>>,
    scripts: &ScriptGroups,
    write_dist: bool,
) -> Result<(), FontbakeError> {
    let dflt = names(lookups.get(&LookupGroup::Default));
    if !dflt.is_empty() {
        add_lookup_references(feature, &dflt, None, &[]);
    }
    let none = vec![];
    let get = |feature: &'static str, direction: Direction| {
        scripts.get(&(feature, direction)).unwrap_or(&none)
    };
    let ltr_scripts = get("kern", Direction::LeftToRight);
    let rtl_scripts = get("kern", Direction::RightToLeft);
    let (dist_ltr, dist_rtl) = if write_dist {
        (
            get("dist", Direction::LeftToRight),
            get("dist", Direction::RightToLeft),
        )
    } else {
        (&none, &none)
    };
    let has_dist = !dist_ltr.is_empty() || !dist_rtl.is_empty();
    let ltr = names(lookups.get(&LookupGroup::LeftToRight));
    let rtl = names(lookups.get(&LookupGroup::RightToLeft));

    match (ltr.is_empty(), rtl.is_empty()) {
        (false, false) => {
            if !ltr_scripts.is_empty() && !rtl_scripts.is_empty() {
                add_by_script(feature, &ltr, ltr_scripts);
                add_by_script(feature, &rtl, rtl_scripts);
            } else if !ltr_scripts.is_empty() {
                add_lookup_references(feature, &rtl, Some("DFLT"), &[]);
                add_by_script(feature, &ltr, ltr_scripts);
            } else if !rtl_scripts.is_empty() {
                add_lookup_references(feature, &ltr, Some("DFLT"), &[]);
                add_by_script(feature, &rtl, rtl_scripts);
            } else if dist_ltr.is_empty() || dist_rtl.is_empty() {
                return Err(FontbakeError::KernDirection(
                    "cannot use DFLT script for both LTR and RTL kern lookups; add 'languagesystems' to features for at least one LTR or RTL script using the kern feature".to_string(),
                ));
            }
        }
        (false, true) => {
            if rtl_scripts.is_empty() && !has_dist {
                add_lookup_references(feature, &ltr, None, &[]);
            } else {
                add_lookup_references(feature, &ltr, Some("DFLT"), &[]);
                add_by_script(feature, &ltr, ltr_scripts);
            }
        }
        (true, false) => {
            if ltr_scripts.is_empty() && !has_dist {
                add_lookup_references(feature, &rtl, None, &[]);
            } else {
                add_lookup_references(feature, &rtl, Some("DFLT"), &[]);
                add_by_script(feature, &rtl, rtl_scripts);
            }
        }
        (true, true) => {}
    }
    Ok(())
}

fn register_dist_lookups(
    feature: &mut Block,
    lookups: &BTreeMap<LookupGroup, Vec<Block>>,
    scripts: &ScriptGroups,
) {
    for (group, direction) in [
        (LookupGroup::LeftToRight, Direction::LeftToRight),
        (LookupGroup::RightToLeft, Direction::RightToLeft),
    ] {
        let lookups = names(lookups.get(&group));
        if lookups.is_empty() {
            continue;
        }
        for (script, languages) in scripts.get(&("dist", direction)).into_iter().flatten() {
            add_lookup_references(feature, &lookups, Some(script.as_str()), languages);
        }
    }
}

impl KernFeatureWriter {
    fn make_lookups(
        &self,
        ctx: &mut FeatureContext,
        pairs: &mut Vec<KerningPair>,
    ) -> Result<BTreeMap<LookupGroup, Vec<Block>>, FontbakeError> {
        let mut split = false;
        if ctx
            .cmap
            .keys()
            .any(|&cp| script_direction(cp) == Some(Direction::RightToLeft))
        {
            let by_direction = classify_glyphs(script_direction, &ctx.cmap, &mut ctx.closure)?;
            let directions = intersect_pairs(pairs, &by_direction, |p| &mut p.directions);
            split = directions.contains(&Direction::RightToLeft);
            if split {
                let by_bidi = classify_glyphs(bidi_type, &ctx.cmap, &mut ctx.closure)?;
                intersect_pairs(pairs, &by_bidi, |p| &mut p.bidi_types);
            }
        }
        if split {
            pairs.retain(|p| !p.is_ambiguous());
        }

        let marks: HashSet<SmolStr> = if ctx.options.ignore_marks {
            ctx.gdef.as_ref().map(|g| g.mark.clone()).unwrap_or_default()
        } else {
            HashSet::new()
        };
        let (mark_pairs, base_pairs): (Vec<&KerningPair>, Vec<&KerningPair>) = pairs
            .iter()
            .partition(|p| p.glyphs.iter().any(|g| marks.contains(g)));

        let mut lookups = BTreeMap::new();
        let mut builder = LookupBuilder {
            quantization: ctx.options.quantization,
            ignore_marks: ctx.options.ignore_marks,
            lookups: &mut lookups,
        };
        if split {
            if !base_pairs.is_empty() {
                builder.split_direction(&base_pairs, true, "");
            }
            if !mark_pairs.is_empty() {
                builder.split_direction(&mark_pairs, false, "_marks");
            }
        } else {
            builder.make(LookupGroup::LeftToRight, "kern_ltr", &base_pairs, |_| false, false, true);
            builder.make(
                LookupGroup::LeftToRight,
                "kern_ltr_marks",
                &mark_pairs,
                |_| false,
                false,
                false,
            );
        }
        Ok(lookups)
    }
}

impl FeatureWriter for KernFeatureWriter {
    fn name(&self) -> &'static str {
        "kern"
    }

    fn write(
        &self,
        ctx: &mut FeatureContext,
        doc: &mut FeatureDocument,
    ) -> Result<bool, FontbakeError> {
        let mut todo = ctx.todo(doc, &FEATURES);
        if todo.is_empty() {
            return Ok(false);
        }
        let scripts = script_groups(ctx);
        if !scripts.keys().any(|(feature, _)| *feature == "dist") {
            todo.retain(|f| f != "dist");
        }
        if todo.is_empty() {
            return Ok(false);
        }
        let write_kern = todo.iter().any(|f| f == "kern");
        let write_dist = todo.iter().any(|f| f == "dist");

        // Class names are only taken once we know there is something to write
        let classes = KerningClasses::new(ctx, doc.class_names());
        let mut pairs = kerning_pairs(ctx, &classes);
        if pairs.is_empty() {
            log::debug!("No kerning pairs; skipping kern");
            return Ok(false);
        }
        let lookups = self.make_lookups(ctx, &mut pairs)?;
        if lookups.is_empty() {
            return Ok(false);
        }

        let mut features: IndexMap<&str, Block> = IndexMap::new();
        if write_kern {
            let mut kern = Block::feature("kern");
            register_kern_lookups(&mut kern, &lookups, &scripts, write_dist)?;
            if !kern.is_empty() {
                features.insert("kern", kern);
            }
        }
        if write_dist {
            let mut dist = Block::feature("dist");
            register_dist_lookups(&mut dist, &lookups, &scripts);
            if !dist.is_empty() {
                features.insert("dist", dist);
            }
        }
        if features.is_empty() {
            return Ok(false);
        }

        for (name, _) in classes.side1.values().chain(classes.side2.values()) {
            doc.reserve_class_name(name.clone());
        }
        doc.insert(
            GeneratedCode {
                class_defs: classes.definitions(),
                mark_class_defs: vec![],
                lookups: lookups.into_values().flatten().collect(),
                features: features.into_values().collect(),
            },
            ctx.options.mode == super::Mode::Skip,
        )?;
        Ok(true)
    }
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        features::{test_helpers::*, write_features, FeatureOptions},
        Font,
    };
    use pretty_assertions::assert_eq;

    fn latin() -> Font {
        font(vec![
            glyph("A", &[0x41], &[]),
            glyph("Aacute", &[0xC1], &[]),
            glyph("V", &[0x56], &[]),
            glyph("W", &[0x57], &[]),
        ])
    }

    fn write(font: &Font) -> String {
        write_features(font, FeatureOptions::default()).expect("writes")
    }

    #[test]
    fn class_to_class_pair() {
        let mut font = latin();
        font.groups
            .insert("public.kern1.A".into(), vec!["A".into(), "Aacute".into()]);
        font.groups.insert("public.kern2.V".into(), vec!["V".into()]);
        font.kerning
            .insert(("public.kern1.A".into(), "public.kern2.V".into()), -80.0);
        assert_eq!(
            write(&font),
            "@kern1.A = [A Aacute];\n@kern2.V = [V];\n\n\
             lookup kern_ltr {\n    lookupflag IgnoreMarks;\n    pos @kern1.A @kern2.V -80;\n} kern_ltr;\n\n\
             feature kern {\n    lookup kern_ltr;\n} kern;\n"
        );
    }

    #[test]
    fn pair_ordering_and_pruning() {
        let mut font = latin();
        font.groups.insert(
            "public.kern1.A".into(),
            vec!["A".into(), "Aacute".into(), "missing".into()],
        );
        font.groups.insert("public.kern2.V".into(), vec!["V".into(), "W".into()]);
        font.groups.insert("public.kern2.empty".into(), vec!["missing".into()]);
        font.kerning
            .insert(("public.kern1.A".into(), "public.kern2.V".into()), 0.0);
        font.kerning.insert(("public.kern1.A".into(), "W".into()), -10.0);
        font.kerning.insert(("V".into(), "A".into()), 0.0);
        font.kerning
            .insert(("A".into(), "public.kern2.empty".into()), -30.0);
        font.kerning.insert(("A".into(), "public.kern2.V".into()), -20.0);
        let fea = write(&font);
        assert!(fea.contains("@kern1.A = [A Aacute];"));
        assert!(!fea.contains("empty"));
        assert!(!fea.contains("@kern1.A @kern2.V"));
        let glyph_pair = fea.find("pos V A 0;").expect("zero glyph pairs are kept");
        let glyph_class = fea.find("enum pos A @kern2.V -20;").expect("glyph/class");
        let class_glyph = fea.find("enum pos @kern1.A W -10;").expect("class/glyph");
        assert!(glyph_pair < glyph_class && glyph_class < class_glyph);
    }

    #[rstest::rstest]
    #[case(1.0, "-83")]
    #[case(10.0, "-80")]
    #[case(5.0, "-85")]
    fn quantized_values(#[case] quantization: f64, #[case] expected: &str) {
        let mut font = latin();
        font.kerning.insert(("A".into(), "V".into()), -83.0);
        let fea = write_features(
            &font,
            FeatureOptions {
                quantization,
                ..Default::default()
            },
        )
        .expect("writes");
        assert!(fea.contains(&format!("pos A V {};", expected)), "{}", fea);
    }

    #[test]
    fn class_names_avoid_existing_classes() {
        let mut font = latin();
        font.groups.insert("public.kern1.A".into(), vec!["A".into()]);
        font.kerning.insert(("public.kern1.A".into(), "V".into()), -5.0);
        font.features = "@kern1.A = [V];\n".to_string();
        let fea = write(&font);
        assert!(fea.contains("@kern1.A_1 = [A];"));
        assert!(fea.contains("enum pos @kern1.A_1 V -5;"));
    }

    fn bidi_font() -> Font {
        let mut font = font(vec![
            glyph("A", &[0x41], &[]),
            glyph("V", &[0x56], &[]),
            glyph("alef", &[0x627], &[]),
            glyph("beh", &[0x628], &[]),
            glyph("one", &[0x31], &[]),
            glyph("one-ar", &[0x661], &[]),
            glyph("two-ar", &[0x662], &[]),
            glyph("period", &[0x2E], &[]),
        ]);
        font.kerning.insert(("A".into(), "V".into()), -40.0);
        font.kerning.insert(("alef".into(), "beh".into()), -20.0);
        font.kerning.insert(("beh".into(), "one".into()), 15.0);
        font.kerning.insert(("one-ar".into(), "two-ar".into()), 12.0);
        font.kerning.insert(("period".into(), "period".into()), 5.0);
        font.features =
            "languagesystem DFLT dflt;\nlanguagesystem latn dflt;\nlanguagesystem arab dflt;\n"
                .to_string();
        font
    }

    #[test]
    fn rtl_value_records() {
        let fea = write(&bidi_font());
        assert!(fea.contains("lookup kern_dflt {\n    lookupflag IgnoreMarks;\n    pos period period 5;\n} kern_dflt;"));
        assert!(fea.contains("lookup kern_ltr {\n    lookupflag IgnoreMarks;\n    pos A V -40;\n} kern_ltr;"));
        // RTL pairs place and advance by the same amount, except between
        // digits, which are laid out left to right
        assert!(fea.contains("pos alef beh <-20 0 -20 0>;"));
        assert!(fea.contains("pos one-ar two-ar 12;"));
        // A letter against a European digit has no single direction
        assert!(!fea.contains("pos beh one"));
        assert!(fea.contains(
            "feature kern {\n    lookup kern_dflt;\n    script latn;\n    language dflt;\n    lookup kern_ltr;\n    script arab;\n    language dflt;\n    lookup kern_rtl;\n} kern;"
        ));
    }

    #[test]
    fn rtl_value_record_invariant() {
        let fea = write(&bidi_font());
        let rtl = fea
            .split("lookup kern_rtl {")
            .nth(1)
            .and_then(|s| s.split("} kern_rtl;").next())
            .expect("has an RTL lookup");
        for line in rtl.lines().map(str::trim).filter(|l| l.starts_with("pos ")) {
            let value = line
                .trim_end_matches(';')
                .split_once('<')
                .map(|(_, record)| record.trim_end_matches('>'));
            if let Some(record) = value {
                let numbers: Vec<&str> = record.split(' ').collect();
                assert_eq!(numbers.len(), 4);
                assert_eq!(numbers[0], numbers[2], "x placement equals x advance");
                assert_eq!(numbers[1], "0");
                assert_eq!(numbers[3], "0");
            }
        }
    }

    #[test]
    fn both_directions_need_scripts() {
        let mut font = bidi_font();
        font.features = String::new();
        assert!(matches!(
            write_features(&font, FeatureOptions::default()),
            Err(FontbakeError::KernDirection(_))
        ));
    }

    #[test]
    fn dist_for_indic_scripts() {
        let mut font = font(vec![
            glyph("ka", &[0x915], &[]),
            glyph("kha", &[0x916], &[]),
        ]);
        font.kerning.insert(("ka".into(), "kha".into()), -10.0);
        font.features = "languagesystem DFLT dflt;\nlanguagesystem dev2 dflt;\n".to_string();
        let fea = write(&font);
        assert!(fea.contains(
            "feature kern {\n    script DFLT;\n    language dflt;\n    lookup kern_ltr;\n} kern;"
        ));
        assert!(fea.contains(
            "feature dist {\n    script dev2;\n    language dflt;\n    lookup kern_ltr;\n} dist;"
        ));
    }

    #[test]
    fn mark_pairs_get_their_own_lookup() {
        let mut font = font(vec![
            glyph("A", &[0x41], &[("top", 300.0, 700.0)]),
            glyph("V", &[0x56], &[]),
            glyph("acutecomb", &[0x301], &[("_top", 150.0, 500.0)]),
        ]);
        font.kerning.insert(("A".into(), "V".into()), -40.0);
        font.kerning.insert(("acutecomb".into(), "V".into()), 10.0);
        let fea = write(&font);
        assert!(fea.contains("lookup kern_ltr_marks {\n    pos acutecomb V 10;\n} kern_ltr_marks;"));
        assert!(fea.contains("feature kern {\n    lookup kern_ltr;\n    lookup kern_ltr_marks;\n} kern;"));
    }

    #[test]
    fn nothing_to_kern() {
        let fea = write(&latin());
        assert_eq!(fea, "");
    }
}
