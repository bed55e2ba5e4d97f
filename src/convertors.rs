#[cfg(feature = "ufo")]
/// UFO convertor
pub mod ufo;
