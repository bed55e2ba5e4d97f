//! Small builders for the pieces of feature syntax the writers emit.
use crate::common::ot_round;
use regex::Regex;
use smol_str::SmolStr;
use std::{collections::HashSet, fmt::Write as _, sync::LazyLock};

const INDENT: &str = "    ";

#[allow(clippy::unwrap_used)]
static CLASS_NAME_ILLEGAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Feature,
    Lookup,
    Table,
}

/// A `feature`, `lookup` or `table` block holding rendered statements
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    kind: BlockKind,
    pub name: SmolStr,
    statements: Vec<String>,
}

impl Block {
    pub fn feature(tag: &str) -> Self {
        Block {
            kind: BlockKind::Feature,
            name: tag.into(),
            statements: vec![],
        }
    }

    pub fn lookup(name: &str) -> Self {
        Block {
            kind: BlockKind::Lookup,
            name: name.into(),
            statements: vec![],
        }
    }

    pub fn table(tag: &str) -> Self {
        Block {
            kind: BlockKind::Table,
            name: tag.into(),
            statements: vec![],
        }
    }

    pub fn push(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    pub fn push_block(&mut self, block: &Block) {
        self.statements.push(block.to_fea());
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn to_fea(&self) -> String {
        let keyword = match self.kind {
            BlockKind::Feature => "feature",
            BlockKind::Lookup => "lookup",
            BlockKind::Table => "table",
        };
        let mut out = format!("{} {} {{\n", keyword, self.name);
        for statement in self.statements.iter() {
            out.push_str(&indented(statement));
        }
        let _ = write!(out, "}} {};", self.name);
        out
    }
}

/// Indent every line of `text` by one level
pub fn indented(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            out.push_str(INDENT);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

pub fn glyph_class<S: AsRef<str>>(glyphs: impl IntoIterator<Item = S>) -> String {
    let names: Vec<String> = glyphs
        .into_iter()
        .map(|g| g.as_ref().to_string())
        .collect();
    format!("[{}]", names.join(" "))
}

pub fn class_definition<S: AsRef<str>>(name: &str, glyphs: impl IntoIterator<Item = S>) -> String {
    format!("@{} = {};", name, glyph_class(glyphs))
}

pub fn anchor(x: f64, y: f64) -> String {
    format!("<anchor {} {}>", ot_round(x), ot_round(y))
}

pub fn anchor_or_null(position: Option<(f64, f64)>) -> String {
    match position {
        Some((x, y)) => anchor(x, y),
        None => "<anchor NULL>".to_string(),
    }
}

/// Lookup flags in the order feature syntax lists them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupFlags {
    pub right_to_left: bool,
    pub ignore_marks: bool,
}

impl LookupFlags {
    pub const IGNORE_MARKS: LookupFlags = LookupFlags {
        right_to_left: false,
        ignore_marks: true,
    };
    pub const RTL_IGNORE_MARKS: LookupFlags = LookupFlags {
        right_to_left: true,
        ignore_marks: true,
    };
}

pub fn lookup_flag(flags: LookupFlags, mark_filtering_set: Option<&str>) -> String {
    let mut parts = vec![];
    if flags.right_to_left {
        parts.push("RightToLeft".to_string());
    }
    if flags.ignore_marks {
        parts.push("IgnoreMarks".to_string());
    }
    if let Some(class) = mark_filtering_set {
        parts.push(format!("UseMarkFilteringSet @{}", class));
    }
    if parts.is_empty() {
        "lookupflag 0;".to_string()
    } else {
        format!("lookupflag {};", parts.join(" "))
    }
}

/// Make a class name legal in feature syntax and distinct from `existing`.
pub fn make_class_name(name: &str, existing: &HashSet<SmolStr>) -> SmolStr {
    let base = CLASS_NAME_ILLEGAL.replace_all(name, "").to_string();
    let mut candidate = base.clone();
    let mut i = 1;
    while existing.contains(candidate.as_str()) {
        candidate = format!("{}_{}", base, i);
        i += 1;
    }
    candidate.into()
}

/// Register lookups in a feature, either globally or for one script and
/// its languages.
pub fn add_lookup_references(
    feature: &mut Block,
    lookups: &[SmolStr],
    script: Option<&str>,
    languages: &[String],
) {
    let Some(script) = script else {
        for lookup in lookups {
            feature.push(format!("lookup {};", lookup));
        }
        return;
    };
    feature.push(format!("script {};", script));
    feature.push("language dflt;");
    for lookup in lookups {
        feature.push(format!("lookup {};", lookup));
    }
    for language in languages.iter().filter(|l| *l != "dflt") {
        feature.push(format!("language {};", language));
    }
}
