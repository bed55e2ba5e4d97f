use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FontbakeError {
    #[error("Unknown file type for file {path:?}")]
    UnknownFileType { path: PathBuf },

    #[error("IO Error: {0}")]
    IO(#[from] io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "ufo")]
    #[error("Error loading UFO: {0}")]
    UfoLoad(#[from] norad::error::FontLoadError),

    #[cfg(feature = "ufo")]
    #[error("Error in UFO naming: {0}")]
    UfoName(#[from] norad::error::NamingError),

    /// A glyph has a negative advance width
    #[error("Glyph {glyph} has negative advance width {width}")]
    NegativeWidth { glyph: String, width: f64 },

    /// The component graph of a glyph loops back on itself
    #[error("Glyph {glyph} is part of a component cycle")]
    ComponentCycle { glyph: String },

    #[error("Glyph {glyph} not found")]
    GlyphNotFound { glyph: String },

    /// Glyph IDs and `maxp.numGlyphs` are 16 bits wide
    #[error("Font has {count} glyphs but at most 65535 fit in a glyph ID")]
    TooManyGlyphs { count: usize },

    #[error("Invalid anchor name {name:?}: {reason}")]
    InvalidAnchorName { name: String, reason: String },

    #[error("Ill-constructed path in glyph {glyph}")]
    BadPath { glyph: String },

    /// The existing feature source could not be used
    #[error("Invalid features: {0}")]
    InvalidFeatures(String),

    /// Kerning lookups can't be registered unambiguously
    #[error("Kerning direction error: {0}")]
    KernDirection(String),

    #[error("Layout closure did not converge after ten rounds")]
    LayoutClosure,

    /// A recognised lib key held data of the wrong shape
    #[error("Invalid value for lib key {key}: {reason}")]
    InvalidLib { key: String, reason: String },

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Could not build cmap: {0}")]
    Cmap(String),

    /// A table failed to serialize
    #[error("Could not write {table} table: {reason}")]
    TableWrite { table: String, reason: String },

    #[error("Error reading binary font: {0}")]
    BinaryFontRead(#[from] write_fonts::read::ReadError),
}
