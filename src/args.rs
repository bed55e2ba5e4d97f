use clap::Parser;
use std::path::PathBuf;

/// Build a font from a UFO: generate kerning, mark, cursive and GDEF
/// feature code, and compile outlines and metadata into OpenType tables
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input UFO
    #[arg(required_unless_present = "dump_kerning")]
    pub input: Option<PathBuf>,

    /// Output font file; a .otf extension implies --cff
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write CFF outlines instead of TrueType
    #[arg(long)]
    pub cff: bool,

    /// Write the generated feature code to this file
    #[arg(long)]
    pub features_out: Option<PathBuf>,

    /// Round kerning and anchor values to multiples of this
    #[arg(long, default_value_t = 1.0)]
    pub quantization: f64,

    /// Don't copy anchors from components onto composite glyphs
    #[arg(long)]
    pub no_propagate_anchors: bool,

    /// Write generated features after existing ones instead of skipping
    /// features the source already has
    #[arg(long)]
    pub append_features: bool,

    /// Print the kerning pairs of a compiled font and exit
    #[arg(long, value_name = "FONT")]
    pub dump_kerning: Option<PathBuf>,

    #[command(flatten)]
    pub verbosity: clap_verbosity_flag::Verbosity,
}

impl Args {
    pub fn wants_cff(&self) -> bool {
        self.cff
            || self
                .output
                .as_ref()
                .and_then(|p| p.extension())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("otf"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otf_output_implies_cff() {
        let args = Args::parse_from(["fontbake", "Test.ufo", "-o", "Test.otf"]);
        assert!(args.wants_cff());
        let args = Args::parse_from(["fontbake", "Test.ufo", "-o", "Test.ttf"]);
        assert!(!args.wants_cff());
        let args = Args::parse_from(["fontbake", "Test.ufo", "-o", "Test.ttf", "--cff"]);
        assert!(args.wants_cff());
    }

    #[test]
    fn defaults() {
        let args = Args::parse_from(["fontbake", "Test.ufo"]);
        assert_eq!(args.quantization, 1.0);
        assert!(!args.no_propagate_anchors);
        assert!(args.dump_kerning.is_none());
    }

    #[test]
    fn dumping_needs_no_input() {
        let args = Args::parse_from(["fontbake", "--dump-kerning", "Test.ttf"]);
        assert!(args.input.is_none());
        assert_eq!(args.dump_kerning, Some(PathBuf::from("Test.ttf")));
        assert!(Args::try_parse_from(["fontbake"]).is_err());
    }
}
