#![deny(clippy::unwrap_used, clippy::expect_used)]
//! Turn a UFO-like font source into a font: layout feature code generated
//! from kerning and anchors, and binary tables compiled from outlines and
//! font info.

mod anchor;
mod classify;
mod common;
pub mod compile;
pub mod convertors;
mod dump;
mod error;
pub mod features;
pub mod filters;
mod font;
mod glyph;
pub mod info;
mod layout;
mod shape;
mod unicode;

pub use crate::{
    anchor::{Anchor, AnchorName},
    classify::classify,
    common::{quantize, Direction, Node, NodeType},
    compile::{compile, CompileOptions, CompiledFont, Flavor},
    dump::{dump_kerning, KernPair},
    error::FontbakeError,
    features::{write_features, FeatureOptions, Mode},
    font::Font,
    glyph::{Glyph, GlyphCategory, GlyphSet},
    info::{FontInfo, FontLib},
    shape::{Component, Path},
};
use crate::filters::{FontFilter, PropagateAnchors, SkipExportGlyphs};
use std::path::PathBuf;

pub fn load(filename: impl Into<PathBuf>) -> Result<Font, FontbakeError> {
    let pb = filename.into();
    match pb.extension() {
        #[cfg(feature = "ufo")]
        Some(ext) if ext == "ufo" => crate::convertors::ufo::load(pb),
        _ => Err(FontbakeError::UnknownFileType { path: pb }),
    }
}

/// Options for the whole build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub compile: CompileOptions,
    pub features: FeatureOptions,
    /// Copy anchors from components onto composite glyphs first
    pub propagate_anchors: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            compile: CompileOptions::default(),
            features: FeatureOptions::default(),
            propagate_anchors: true,
        }
    }
}

/// What a build produces
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    pub font: CompiledFont,
    /// The font's feature code with the generated features spliced in
    pub features: String,
}

/// Build a font: drop the glyphs which aren't exported, propagate anchors,
/// generate feature code and compile the tables.
///
/// Either everything succeeds or nothing is returned.
pub fn build(mut font: Font, options: &BuildOptions) -> Result<BuildOutput, FontbakeError> {
    font.validate()?;
    SkipExportGlyphs.apply(&mut font)?;
    if options.propagate_anchors {
        PropagateAnchors.apply(&mut font)?;
    }
    let features = write_features(&font, options.features.clone())?;
    let compiled = compile(&font, &options.compile)?;
    Ok(BuildOutput {
        font: compiled,
        features,
    })
}
