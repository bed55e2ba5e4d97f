//! The top-level layout of a feature file, for splicing generated code
//! into it without disturbing anything the user wrote.
use super::ast::{indented, Block};
use crate::FontbakeError;
use regex::Regex;
use smol_str::SmolStr;
use std::{collections::HashSet, ops::Range, sync::LazyLock};

#[allow(clippy::unwrap_used)]
static INSERT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*# Automatic Code").unwrap());

/// An insert marker comment inside a feature block
#[derive(Debug, Clone, PartialEq)]
struct Marker {
    /// Byte range of the comment within the block text
    range: Range<usize>,
    rules_before: bool,
    rules_after: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum ItemKind {
    /// Whitespace and comments between statements
    Trivia,
    Feature {
        tag: SmolStr,
        marker: Option<Marker>,
    },
    Table {
        tag: SmolStr,
        /// Offset of the closing brace within the item text
        close: usize,
    },
    Other,
    Generated {
        batch: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Item {
    text: String,
    kind: ItemKind,
}

/// Code produced by one feature writer
#[derive(Debug, Clone, Default)]
pub struct GeneratedCode {
    pub class_defs: Vec<String>,
    pub mark_class_defs: Vec<String>,
    pub lookups: Vec<Block>,
    pub features: Vec<Block>,
}

/// A feature file split into top-level items
#[derive(Debug, Clone, Default)]
pub struct FeatureDocument {
    items: Vec<Item>,
    /// Glyph class names which are taken, without the `@`
    class_names: HashSet<SmolStr>,
    batches: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenKind {
    Comment,
    Word,
    Open,
    Close,
    Semicolon,
    Other,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || "{};#\"[]()<>,='".contains(c)
}

fn tokenize(src: &str) -> Vec<Token> {
    let mut tokens = vec![];
    let mut chars = src.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        let kind = match c {
            c if c.is_whitespace() => continue,
            '#' => {
                while chars.next_if(|&(_, c)| c != '\n').is_some() {}
                TokenKind::Comment
            }
            '"' => {
                while chars.next_if(|&(_, c)| c != '"').is_some() {}
                chars.next();
                TokenKind::Other
            }
            '{' => TokenKind::Open,
            '}' => TokenKind::Close,
            ';' => TokenKind::Semicolon,
            c if is_delimiter(c) => TokenKind::Other,
            _ => {
                while chars.next_if(|&(_, c)| !is_delimiter(c)).is_some() {}
                TokenKind::Word
            }
        };
        let end = chars.peek().map(|&(i, _)| i).unwrap_or(src.len());
        tokens.push(Token { kind, start, end });
    }
    tokens
}

/// Look for an insert marker directly inside the outermost block of a
/// statement's tokens.
fn find_marker(tokens: &[Token], src: &str, offset: usize) -> Option<Marker> {
    let mut depth = 0;
    let mut rules_before = false;
    let mut found: Option<Marker> = None;
    for token in tokens {
        match token.kind {
            TokenKind::Open => {
                depth += 1;
                if depth == 1 {
                    continue;
                }
            }
            TokenKind::Close => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
        if depth == 0 {
            continue;
        }
        let is_comment = token.kind == TokenKind::Comment;
        match found.as_mut() {
            Some(marker) => {
                if !is_comment {
                    marker.rules_after = true;
                }
            }
            None => {
                if depth == 1 && is_comment && INSERT_MARKER.is_match(&src[token.start..token.end])
                {
                    found = Some(Marker {
                        range: token.start - offset..token.end - offset,
                        rules_before,
                        rules_after: false,
                    });
                } else if !is_comment {
                    rules_before = true;
                }
            }
        }
    }
    found
}

fn closing_brace(tokens: &[Token], offset: usize) -> Option<usize> {
    let mut depth = 0;
    for token in tokens {
        match token.kind {
            TokenKind::Open => depth += 1,
            TokenKind::Close => {
                depth -= 1;
                if depth == 0 {
                    return Some(token.start - offset);
                }
            }
            _ => {}
        }
    }
    None
}

impl FeatureDocument {
    pub fn parse(src: &str) -> Self {
        let tokens = tokenize(src);
        let mut items = vec![];
        let mut cursor = 0;
        let mut i = 0;
        while i < tokens.len() {
            if tokens[i].kind == TokenKind::Comment {
                i += 1;
                continue;
            }
            // A statement runs to the first semicolon outside any braces
            let mut depth = 0i32;
            let end = tokens[i..].iter().position(|t| {
                match t.kind {
                    TokenKind::Open => depth += 1,
                    TokenKind::Close => depth -= 1,
                    TokenKind::Semicolon if depth <= 0 => return true,
                    _ => {}
                }
                false
            });
            let Some(end) = end.map(|e| i + e) else {
                break;
            };
            let start = tokens[i].start;
            if cursor < start {
                items.push(Item {
                    text: src[cursor..start].to_string(),
                    kind: ItemKind::Trivia,
                });
            }
            let statement = &tokens[i..=end];
            let word = |n: usize| {
                statement
                    .get(n)
                    .filter(|t| t.kind == TokenKind::Word)
                    .map(|t| &src[t.start..t.end])
            };
            let kind = match (word(0), word(1)) {
                (Some("feature"), Some(tag)) => ItemKind::Feature {
                    tag: tag.into(),
                    marker: find_marker(statement, src, start),
                },
                (Some("table"), Some(tag)) => match closing_brace(statement, start) {
                    Some(close) => ItemKind::Table {
                        tag: tag.into(),
                        close,
                    },
                    None => ItemKind::Other,
                },
                _ => ItemKind::Other,
            };
            cursor = tokens[end].end;
            items.push(Item {
                text: src[start..cursor].to_string(),
                kind,
            });
            i = end + 1;
        }
        if cursor < src.len() {
            items.push(Item {
                text: src[cursor..].to_string(),
                kind: ItemKind::Trivia,
            });
        }
        FeatureDocument {
            items,
            class_names: HashSet::new(),
            batches: 0,
        }
    }

    /// Tags of the feature blocks in the document
    pub fn feature_tags(&self) -> HashSet<SmolStr> {
        self.items
            .iter()
            .filter_map(|item| match &item.kind {
                ItemKind::Feature { tag, .. } => Some(tag.clone()),
                _ => None,
            })
            .collect()
    }

    /// Tags of the feature blocks carrying an insert marker
    pub fn marked_features(&self) -> HashSet<SmolStr> {
        self.items
            .iter()
            .filter_map(|item| match &item.kind {
                ItemKind::Feature {
                    tag,
                    marker: Some(_),
                } => Some(tag.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_table(&self, tag: &str) -> bool {
        self.items
            .iter()
            .any(|item| matches!(&item.kind, ItemKind::Table { tag: t, .. } if t == tag))
    }

    pub fn class_names(&self) -> &HashSet<SmolStr> {
        &self.class_names
    }

    pub fn reserve_class_name(&mut self, name: impl Into<SmolStr>) {
        self.class_names.insert(name.into());
    }

    /// Splice generated code in. Features go where an insert marker asks
    /// for them (when `use_markers` is set), or else at the end; the
    /// definitions and lookups they need go just before the first of them.
    pub fn insert(&mut self, code: GeneratedCode, use_markers: bool) -> Result<(), FontbakeError> {
        if code.features.is_empty() {
            return Ok(());
        }
        self.batches += 1;
        let batch = self.batches;
        let generated = |block: &Block| Item {
            text: block.to_fea(),
            kind: ItemKind::Generated { batch },
        };
        let mut inserted = vec![false; code.features.len()];
        for (ix, feature) in code.features.iter().enumerate() {
            if !use_markers {
                break;
            }
            let Some((index, marker)) = self.items.iter().enumerate().find_map(|(i, item)| {
                match &item.kind {
                    ItemKind::Feature {
                        tag,
                        marker: Some(marker),
                    } if *tag == feature.name => Some((i, marker.clone())),
                    _ => None,
                }
            }) else {
                continue;
            };
            let position = match (marker.rules_before, marker.rules_after) {
                (false, false) => {
                    self.items[index] = generated(feature);
                    inserted[ix] = true;
                    index
                }
                (false, true) | (true, false) => {
                    let block = &mut self.items[index];
                    block.text.replace_range(marker.range.clone(), "");
                    block.kind = ItemKind::Feature {
                        tag: feature.name.clone(),
                        marker: None,
                    };
                    let position = if marker.rules_before { index + 1 } else { index };
                    self.items.insert(position, generated(feature));
                    inserted[ix] = true;
                    position
                }
                (true, true) => {
                    return Err(FontbakeError::InvalidFeatures(format!(
                        "Insert marker has rules before and after, feature {} cannot be inserted. This is not supported.",
                        feature.name
                    )))
                }
            };
            // Features which come before this one and had no marker of
            // their own go right in front of it
            for i in (0..ix).rev() {
                if inserted[i] {
                    break;
                }
                self.items.insert(position, generated(&code.features[i]));
                inserted[i] = true;
            }
        }
        for (ix, feature) in code.features.iter().enumerate() {
            if !inserted[ix] {
                self.items.push(generated(feature));
            }
        }

        let mut definitions: Vec<String> = vec![];
        for defs in [&code.class_defs, &code.mark_class_defs] {
            if !defs.is_empty() {
                definitions.push(defs.join("\n"));
            }
        }
        definitions.extend(code.lookups.iter().map(|l| l.to_fea()));
        if !definitions.is_empty() {
            let first = self
                .items
                .iter()
                .position(|item| item.kind == ItemKind::Generated { batch })
                .unwrap_or(self.items.len());
            self.items.insert(
                first,
                Item {
                    text: definitions.join("\n\n"),
                    kind: ItemKind::Generated { batch },
                },
            );
        }
        Ok(())
    }

    /// Add statements at the end of a `table` block, creating the block
    /// at the end of the document if there isn't one.
    pub fn append_to_table(&mut self, tag: &str, statements: &[String]) {
        if statements.is_empty() {
            return;
        }
        let existing = self
            .items
            .iter()
            .position(|item| matches!(&item.kind, ItemKind::Table { tag: t, .. } if t == tag));
        if let Some(index) = existing {
            let item = &mut self.items[index];
            let ItemKind::Table { close, .. } = item.kind else {
                return;
            };
            let mut addition = String::new();
            if !item.text[..close].ends_with('\n') {
                addition.push('\n');
            }
            for statement in statements {
                addition.push_str(&indented(statement));
            }
            item.text.insert_str(close, &addition);
            let close = close + addition.len();
            item.kind = ItemKind::Table {
                tag: tag.into(),
                close,
            };
            return;
        }
        if !self.items.is_empty() {
            self.items.push(Item {
                text: "\n".to_string(),
                kind: ItemKind::Trivia,
            });
        }
        let mut table = Block::table(tag);
        for statement in statements {
            table.push(statement.clone());
        }
        let text = table.to_fea();
        let close = text.rfind('}').unwrap_or(text.len());
        self.items.push(Item {
            text,
            kind: ItemKind::Table {
                tag: tag.into(),
                close,
            },
        });
    }

    pub fn to_fea(&self) -> String {
        let mut out = String::new();
        for item in self.items.iter() {
            if let ItemKind::Generated { .. } = item.kind {
                if !out.is_empty() {
                    while !out.ends_with("\n\n") {
                        out.push('\n');
                    }
                }
                out.push_str(&item.text);
                out.push('\n');
            } else if let ItemKind::Table { .. } = item.kind {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&item.text);
            } else {
                out.push_str(&item.text);
            }
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}
