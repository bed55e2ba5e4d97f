use super::{
    ast::{anchor, class_definition, lookup_flag, make_class_name, Block, LookupFlags},
    FeatureContext, FeatureDocument, FeatureWriter, GeneratedCode,
};
use crate::{
    anchor::AnchorName,
    layout::classify_glyphs,
    unicode::{in_scripts, INDIC_SCRIPTS, USE_SCRIPTS},
    FontbakeError,
};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet, HashSet};

const FEATURES: [&str; 4] = ["mark", "mkmk", "abvm", "blwm"];
const MARK_CLASS_PREFIX: &str = "MC";
const ABOVE_ANCHORS: [&str; 7] = [
    "top",
    "topleft",
    "topright",
    "candra",
    "bindu",
    "candrabindu",
    "imatra",
];
const BELOW_ANCHORS: [&str; 4] = ["bottom", "bottomleft", "bottomright", "nukta"];

/// Writes the mark attachment features from glyph anchors
pub struct MarkFeatureWriter;

#[derive(Debug, Clone, PartialEq)]
struct NamedAnchor {
    name: String,
    parsed: AnchorName,
    x: f64,
    y: f64,
    /// For base anchors, the class of the marks which attach to it
    mark_class: Option<SmolStr>,
}

impl NamedAnchor {
    fn is_above(&self) -> bool {
        if ABOVE_ANCHORS.contains(&self.name.as_str()) {
            return true;
        }
        if BELOW_ANCHORS.contains(&self.name.as_str()) || self.name.starts_with("bottom") {
            return false;
        }
        // Anything we don't know about counts as above
        true
    }

    fn to_fea(&self) -> String {
        format!(
            "{} mark @{}",
            anchor(self.x, self.y),
            self.mark_class.as_deref().unwrap_or_default()
        )
    }
}

type AnchorLists = IndexMap<SmolStr, Vec<NamedAnchor>>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum AttachmentKind {
    Base,
    Ligature,
    Mark,
}

/// One positioning rule: a glyph and the anchors marks attach to, per
/// ligature component
#[derive(Debug, Clone, PartialEq)]
struct Attachment {
    kind: AttachmentKind,
    glyph: SmolStr,
    components: Vec<Vec<NamedAnchor>>,
}

impl Attachment {
    /// Keep only the anchors which pass `keep`; `None` if none are left
    fn filter(&self, keep: impl Fn(&NamedAnchor) -> bool) -> Option<Attachment> {
        let components: Vec<Vec<NamedAnchor>> = self
            .components
            .iter()
            .map(|anchors| anchors.iter().filter(|a| keep(*a)).cloned().collect())
            .collect();
        if components.iter().all(|c: &Vec<NamedAnchor>| c.is_empty()) {
            return None;
        }
        Some(Attachment {
            components,
            ..self.clone()
        })
    }

    fn sorted(anchors: &[NamedAnchor]) -> Vec<&NamedAnchor> {
        let mut anchors: Vec<&NamedAnchor> = anchors.iter().collect();
        anchors.sort_by(|a, b| a.name.cmp(&b.name));
        anchors
    }

    fn to_fea(&self) -> String {
        let keyword = match self.kind {
            AttachmentKind::Base => "base",
            AttachmentKind::Ligature => "ligature",
            AttachmentKind::Mark => "mark",
        };
        let mut out = format!("pos {} {}", keyword, self.glyph);
        if self.kind == AttachmentKind::Ligature {
            let components: Vec<String> = self
                .components
                .iter()
                .map(|anchors| {
                    if anchors.is_empty() {
                        return "\n        <anchor NULL>".to_string();
                    }
                    Self::sorted(anchors)
                        .iter()
                        .map(|a| format!("\n        {}", a.to_fea()))
                        .collect()
                })
                .collect();
            out.push_str(&components.join("\n    ligComponent"));
        } else {
            for anchors in self.components.iter() {
                for a in Self::sorted(anchors) {
                    out.push_str("\n    ");
                    out.push_str(&a.to_fea());
                }
            }
        }
        out.push(';');
        out
    }
}

fn anchor_lists(ctx: &FeatureContext) -> Result<AnchorLists, FontbakeError> {
    let include = ctx.gdef.as_ref().map(|gdef| gdef.attaching());
    let mut result = IndexMap::new();
    for name in ctx.glyph_order.iter() {
        if include.as_ref().is_some_and(|i| !i.contains(name)) {
            continue;
        }
        let Some(glyph) = ctx.font.glyphs.get(name) else {
            continue;
        };
        let mut anchors: IndexMap<&str, NamedAnchor> = IndexMap::new();
        for a in glyph.anchors.iter() {
            if a.name.is_empty() {
                log::warn!("Unnamed anchor discarded in glyph {}", name);
                continue;
            }
            if anchors.contains_key(a.name.as_str()) {
                log::warn!("Duplicate anchor {} in glyph {}", a.name, name);
            }
            anchors.insert(
                a.name.as_str(),
                NamedAnchor {
                    name: a.name.clone(),
                    parsed: AnchorName::parse(&a.name)?,
                    x: ctx.quantize(a.x),
                    y: ctx.quantize(a.y),
                    mark_class: None,
                },
            );
        }
        if !anchors.is_empty() {
            result.insert(name.clone(), anchors.into_values().collect());
        }
    }
    Ok(result)
}

/// Base anchor keys, each with the name of the mark anchor it attaches to
fn anchor_pairs(lists: &AnchorLists) -> BTreeMap<SmolStr, String> {
    let mark_names: HashSet<&str> = lists
        .values()
        .flatten()
        .filter(|a| a.parsed.is_mark)
        .map(|a| a.name.as_str())
        .collect();
    let mut pairs = BTreeMap::new();
    for a in lists.values().flatten().filter(|a| !a.parsed.is_mark) {
        let mark_name = a.parsed.mark_counterpart();
        if mark_names.contains(mark_name.as_str()) {
            pairs.insert(a.parsed.key.clone(), mark_name);
        }
    }
    pairs
}

fn prune_unused_anchors(lists: &mut AnchorLists, pairs: &BTreeMap<SmolStr, String>) {
    let mark_names: HashSet<&str> = pairs.values().map(|s| s.as_str()).collect();
    for anchors in lists.values_mut() {
        anchors.retain(|a| {
            a.parsed.key.is_empty()
                || if a.parsed.is_mark {
                    mark_names.contains(a.name.as_str())
                } else {
                    pairs.contains_key(&a.parsed.key)
                }
        });
    }
    lists.retain(|_, anchors| !anchors.is_empty());
}

/// Mark classes by name, each mapping its glyphs to their anchor
type MarkClasses = IndexMap<SmolStr, IndexMap<SmolStr, String>>;

struct MarkClassBuilder {
    classes: MarkClasses,
    /// Mark anchor name to the class attaching to it
    by_anchor: BTreeMap<String, SmolStr>,
    mark_glyphs: HashSet<SmolStr>,
    definitions: Vec<String>,
}

impl MarkClassBuilder {
    fn new(ctx: &FeatureContext, lists: &AnchorLists, pairs: &BTreeMap<SmolStr, String>) -> Self {
        let mark_anchor_names: HashSet<&str> = pairs.values().map(|s| s.as_str()).collect();
        let mut by_mark_anchor: BTreeMap<&str, Vec<(&SmolStr, &NamedAnchor)>> = BTreeMap::new();
        let mut mark_glyphs = HashSet::new();
        for (glyph, anchors) in lists.iter() {
            if ctx.gdef.as_ref().is_some_and(|g| !g.mark.contains(glyph)) {
                continue;
            }
            for a in anchors {
                if mark_anchor_names.contains(a.name.as_str()) {
                    by_mark_anchor.entry(a.name.as_str()).or_default().push((glyph, a));
                    mark_glyphs.insert(glyph.clone());
                }
            }
        }
        let mut builder = MarkClassBuilder {
            classes: ctx.info.mark_classes.clone(),
            by_anchor: BTreeMap::new(),
            mark_glyphs,
            definitions: vec![],
        };
        for (mark_anchor, glyphs) in by_mark_anchor {
            let mut class_name = make_class_name(
                &format!("{}{}", MARK_CLASS_PREFIX, mark_anchor),
                &HashSet::new(),
            );
            for (glyph, a) in glyphs {
                class_name = builder.define(glyph, a, class_name);
            }
            builder.by_anchor.insert(mark_anchor.to_string(), class_name);
        }
        builder
    }

    /// Put a glyph in a mark class, returning the class it ended up in
    fn define(&mut self, glyph: &SmolStr, a: &NamedAnchor, class_name: SmolStr) -> SmolStr {
        let position = anchor(a.x, a.y);
        let mut class_name = class_name;
        if let Some(existing) = self.classes.get(&class_name).and_then(|c| c.get(glyph)) {
            if *existing == position {
                log::debug!("Glyph {} already defined in markClass @{}", glyph, class_name);
                return class_name;
            }
            let taken: HashSet<SmolStr> = self.classes.keys().cloned().collect();
            class_name = make_class_name(&class_name, &taken);
        }
        self.definitions.push(format!(
            "markClass {} {} @{};",
            glyph, position, class_name
        ));
        self.classes
            .entry(class_name.clone())
            .or_default()
            .insert(glyph.clone(), position);
        class_name
    }

    fn glyphs(&self, class_name: &str) -> Vec<SmolStr> {
        self.classes
            .get(class_name)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn set_base_anchor_mark_classes(lists: &mut AnchorLists, by_anchor: &BTreeMap<String, SmolStr>) {
    for a in lists.values_mut().flatten() {
        if a.parsed.is_mark {
            continue;
        }
        a.mark_class = by_anchor.get(&a.parsed.mark_counterpart()).cloned();
    }
}

fn mark_to_base(
    lists: &AnchorLists,
    marks: &HashSet<SmolStr>,
    ctx: &FeatureContext,
) -> Vec<Attachment> {
    let base = ctx.gdef.as_ref().map(|g| &g.base);
    lists
        .iter()
        .filter(|(glyph, _)| !marks.contains(*glyph) && base.map_or(true, |b| b.contains(*glyph)))
        .filter_map(|(glyph, anchors)| {
            let anchors: Vec<NamedAnchor> = anchors
                .iter()
                .filter(|a| a.mark_class.is_some() && a.parsed.number.is_none())
                .cloned()
                .collect();
            (!anchors.is_empty()).then(|| Attachment {
                kind: AttachmentKind::Base,
                glyph: glyph.clone(),
                components: vec![anchors],
            })
        })
        .collect()
}

fn mark_to_ligature(
    lists: &AnchorLists,
    marks: &HashSet<SmolStr>,
    ctx: &FeatureContext,
) -> Vec<Attachment> {
    let ligature = ctx.gdef.as_ref().map(|g| &g.ligature);
    let mut result = vec![];
    for (glyph, anchors) in lists.iter() {
        if marks.contains(glyph) || ligature.is_some_and(|l| !l.contains(glyph)) {
            continue;
        }
        let mut components: BTreeMap<u32, Vec<NamedAnchor>> = BTreeMap::new();
        for a in anchors {
            if a.mark_class.is_none() && !a.parsed.key.is_empty() {
                continue;
            }
            let Some(number) = a.parsed.number else {
                continue;
            };
            // A bare "_N" anchor means component N takes no marks
            if a.parsed.key.is_empty() {
                components.insert(number, vec![]);
            } else {
                components.entry(number).or_default().push(a.clone());
            }
        }
        let Some(&max) = components.keys().last() else {
            continue;
        };
        result.push(Attachment {
            kind: AttachmentKind::Ligature,
            glyph: glyph.clone(),
            components: (1..=max)
                .map(|n| components.remove(&n).unwrap_or_default())
                .collect(),
        });
    }
    result
}

fn mark_to_mark(lists: &AnchorLists, marks: &HashSet<SmolStr>) -> BTreeMap<SmolStr, Vec<Attachment>> {
    let mut result: BTreeMap<SmolStr, Vec<Attachment>> = BTreeMap::new();
    for (glyph, anchors) in lists.iter().filter(|(g, _)| marks.contains(*g)) {
        for a in anchors.iter().filter(|a| a.mark_class.is_some()) {
            if a.parsed.number.is_some() {
                log::warn!(
                    "Invalid ligature anchor {} in mark glyph {}; skipped",
                    a.name,
                    glyph
                );
                continue;
            }
            result
                .entry(a.parsed.key.clone())
                .or_default()
                .push(Attachment {
                    kind: AttachmentKind::Mark,
                    glyph: glyph.clone(),
                    components: vec![vec![a.clone()]],
                });
        }
    }
    result
}

/// Greedy coloring: each node, in sorted order, takes the lowest color
/// none of its already-colored neighbours has.
fn color_graph(adjacency: &BTreeMap<SmolStr, BTreeSet<SmolStr>>) -> BTreeMap<SmolStr, usize> {
    let mut colors: BTreeMap<SmolStr, usize> = BTreeMap::new();
    for (node, neighbours) in adjacency.iter() {
        let used: HashSet<usize> = neighbours
            .iter()
            .filter_map(|n| colors.get(n).copied())
            .collect();
        let color = (0..).find(|c| !used.contains(c)).unwrap_or_default();
        colors.insert(node.clone(), color);
    }
    colors
}

fn class_sort_key(name: &str) -> i32 {
    match name.strip_prefix(MARK_CLASS_PREFIX).unwrap_or(name) {
        "_bottom" => -2,
        "_top" => -1,
        _ => 0,
    }
}

/// Split the mark classes used by one attachment list into groups which
/// share no mark glyph, so that each group can go in its own lookup.
fn group_mark_classes(
    builder: &MarkClassBuilder,
    used: &BTreeSet<SmolStr>,
    lookup: &str,
) -> Vec<Vec<SmolStr>> {
    let mut glyph_classes: BTreeMap<SmolStr, BTreeSet<SmolStr>> = BTreeMap::new();
    let mut adjacency: BTreeMap<SmolStr, BTreeSet<SmolStr>> = BTreeMap::new();
    for class_name in used {
        adjacency.entry(class_name.clone()).or_default();
        for glyph in builder.glyphs(class_name) {
            glyph_classes
                .entry(glyph)
                .or_default()
                .insert(class_name.clone());
        }
    }
    for (glyph, classes) in glyph_classes.iter() {
        if classes.len() > 1 {
            log::warn!(
                "Mark glyph {} is in several mark classes ({}) used by {}; splitting its lookups",
                glyph,
                classes.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", "),
                lookup
            );
        }
        for a in classes {
            for b in classes.iter().filter(|b| *b != a) {
                adjacency.entry(a.clone()).or_default().insert(b.clone());
            }
        }
    }
    let mut groups: BTreeMap<usize, Vec<SmolStr>> = BTreeMap::new();
    for (class_name, color) in color_graph(&adjacency) {
        groups.entry(color).or_default().push(class_name);
    }
    let mut groups: Vec<Vec<SmolStr>> = groups
        .into_values()
        .map(|mut g| {
            g.sort();
            g
        })
        .collect();
    groups.sort_by_key(|g| {
        (
            -g.iter().map(|n| class_sort_key(n)).min().unwrap_or_default(),
            g.clone(),
        )
    });
    groups
}

/// Partition one attachment list into lookups, grouping only the mark
/// classes its anchors refer to.
fn group_attachments(
    builder: &MarkClassBuilder,
    attachments: &[Attachment],
    lookup: &str,
) -> Vec<Vec<Attachment>> {
    let used: BTreeSet<SmolStr> = attachments
        .iter()
        .flat_map(|att| att.components.iter().flatten())
        .filter_map(|a| a.mark_class.clone())
        .collect();
    group_mark_classes(builder, &used, lookup)
        .iter()
        .map(|group| {
            attachments
                .iter()
                .filter_map(|att| {
                    att.filter(|a| a.mark_class.as_ref().is_some_and(|c| group.contains(c)))
                })
                .collect()
        })
        .collect()
}

type Include<'a> = &'a dyn Fn(&str) -> bool;
type MarksFilter<'a> = Option<&'a dyn Fn(&NamedAnchor) -> bool>;

fn iter_attachments<'a>(
    attachments: &'a [Attachment],
    include: Include<'a>,
    marks_filter: MarksFilter<'a>,
) -> impl Iterator<Item = Attachment> + 'a {
    attachments
        .iter()
        .filter(move |att| include(att.glyph.as_str()))
        .filter_map(move |att| match marks_filter {
            Some(keep) => att.filter(keep),
            None => Some(att.clone()),
        })
}

fn lookup_name(tag: Option<&str>, base: &str, index: usize) -> String {
    let prefix = tag.map(|t| format!("{}_", t)).unwrap_or_default();
    if index > 0 {
        format!("{}{}_{}", prefix, base, index)
    } else {
        format!("{}{}", prefix, base)
    }
}

struct LookupMaker<'a> {
    builder: &'a MarkClassBuilder,
    base: Vec<Vec<Attachment>>,
    ligature: Vec<Vec<Attachment>>,
    mark: BTreeMap<SmolStr, Vec<Attachment>>,
}

impl LookupMaker<'_> {
    fn attachment_lookups(
        &self,
        tag: Option<&str>,
        include: Include,
        marks_filter: MarksFilter,
    ) -> Vec<Block> {
        let mut lookups = vec![];
        for (base, grouped) in [("mark2base", &self.base), ("mark2liga", &self.ligature)] {
            for (i, attachments) in grouped.iter().enumerate() {
                let rules: Vec<String> = iter_attachments(attachments, include, marks_filter)
                    .map(|att| att.to_fea())
                    .collect();
                if rules.is_empty() {
                    continue;
                }
                let mut lookup = Block::lookup(&lookup_name(tag, base, i));
                for rule in rules {
                    lookup.push(rule);
                }
                lookups.push(lookup);
            }
        }
        lookups
    }

    fn mark_to_mark_lookups(
        &self,
        tag: Option<&str>,
        include: Include,
        marks_filter: MarksFilter,
        class_names: &mut HashSet<SmolStr>,
    ) -> Vec<Block> {
        let mut lookups = vec![];
        for (key, attachments) in self.mark.iter() {
            let attachments: Vec<Attachment> =
                iter_attachments(attachments, include, marks_filter).collect();
            if attachments.is_empty() {
                continue;
            }
            let name = lookup_name(tag, &format!("mark2mark_{}", key), 0);
            let class_glyphs = self
                .builder
                .by_anchor
                .get(&format!("_{}", key))
                .map(|c| self.builder.glyphs(c))
                .unwrap_or_default();
            let mut members: Vec<SmolStr> = class_glyphs
                .iter()
                .filter(|g| include(g.as_str()))
                .cloned()
                .collect();
            members.extend(
                attachments
                    .iter()
                    .filter(|att| !class_glyphs.contains(&att.glyph))
                    .map(|att| att.glyph.clone()),
            );
            let class_name = make_class_name(&format!("MFS_{}", name), class_names);
            class_names.insert(class_name.clone());

            let mut lookup = Block::lookup(&name);
            lookup.push(class_definition(&class_name, &members));
            lookup.push(lookup_flag(LookupFlags::default(), Some(class_name.as_str())));
            for att in attachments {
                lookup.push(att.to_fea());
            }
            lookups.push(lookup);
        }
        lookups
    }
}

fn feature_with(tag: &str, lookups: Vec<Block>) -> Option<Block> {
    if lookups.is_empty() {
        return None;
    }
    let mut feature = Block::feature(tag);
    for lookup in lookups.iter() {
        feature.push_block(lookup);
    }
    Some(feature)
}

/// Glyphs of scripts which use `abvm`/`blwm`, including everything they
/// can become through substitution
fn abvm_glyphs(ctx: &mut FeatureContext) -> Result<HashSet<SmolStr>, FontbakeError> {
    let scripts: Vec<&str> = INDIC_SCRIPTS
        .iter()
        .chain(USE_SCRIPTS.iter())
        .copied()
        .chain(std::iter::once("Khmr"))
        .collect();
    let is_abvm = |cp: u32| in_scripts(cp, &scripts);
    if !ctx.cmap.keys().any(|&cp| is_abvm(cp) == Some(true)) {
        return Ok(HashSet::new());
    }
    let classified = classify_glyphs(is_abvm, &ctx.cmap, &mut ctx.closure)?;
    Ok(classified
        .get(&true)
        .map(|glyphs| glyphs.iter().cloned().collect())
        .unwrap_or_default())
}

impl FeatureWriter for MarkFeatureWriter {
    fn name(&self) -> &'static str {
        "mark"
    }

    fn write(
        &self,
        ctx: &mut FeatureContext,
        doc: &mut FeatureDocument,
    ) -> Result<bool, FontbakeError> {
        let todo = ctx.todo(doc, &FEATURES);
        if todo.is_empty() {
            return Ok(false);
        }
        let mut lists = anchor_lists(ctx)?;
        let pairs = anchor_pairs(&lists);
        prune_unused_anchors(&mut lists, &pairs);
        let builder = MarkClassBuilder::new(ctx, &lists, &pairs);
        set_base_anchor_mark_classes(&mut lists, &builder.by_anchor);

        let maker = LookupMaker {
            builder: &builder,
            base: group_attachments(
                &builder,
                &mark_to_base(&lists, &builder.mark_glyphs, ctx),
                "mark2base",
            ),
            ligature: group_attachments(
                &builder,
                &mark_to_ligature(&lists, &builder.mark_glyphs, ctx),
                "mark2liga",
            ),
            mark: mark_to_mark(&lists, &builder.mark_glyphs),
        };

        let abvm = abvm_glyphs(ctx)?;
        let is_abvm = |g: &str| abvm.contains(g);
        let is_not_abvm = |g: &str| !abvm.contains(g);
        let is_above: &dyn Fn(&NamedAnchor) -> bool = &|a: &NamedAnchor| a.is_above();
        let is_below: &dyn Fn(&NamedAnchor) -> bool = &|a: &NamedAnchor| !a.is_above();
        let wants = |tag: &str| todo.iter().any(|t| t == tag);

        let mut class_names = doc.class_names().clone();
        let mut features: BTreeMap<&str, Block> = BTreeMap::new();
        if wants("mark") {
            if let Some(feature) =
                feature_with("mark", maker.attachment_lookups(None, &is_not_abvm, None))
            {
                features.insert("mark", feature);
            }
        }
        if wants("mkmk") {
            let lookups = maker.mark_to_mark_lookups(None, &is_not_abvm, None, &mut class_names);
            if let Some(feature) = feature_with("mkmk", lookups) {
                features.insert("mkmk", feature);
            }
        }
        if !abvm.is_empty() {
            for (tag, filter) in [("abvm", is_above), ("blwm", is_below)] {
                if !wants(tag) {
                    continue;
                }
                let mut lookups = maker.attachment_lookups(Some(tag), &is_abvm, Some(filter));
                lookups.extend(maker.mark_to_mark_lookups(
                    Some(tag),
                    &is_abvm,
                    Some(filter),
                    &mut class_names,
                ));
                if let Some(feature) = feature_with(tag, lookups) {
                    features.insert(tag, feature);
                }
            }
        }
        if features.is_empty() {
            return Ok(false);
        }

        for name in class_names.into_iter().chain(builder.classes.keys().cloned()) {
            doc.reserve_class_name(name);
        }
        doc.insert(
            GeneratedCode {
                mark_class_defs: builder.definitions.clone(),
                features: features.into_values().collect(),
                ..Default::default()
            },
            ctx.options.mode == super::Mode::Skip,
        )?;
        Ok(true)
    }
}
