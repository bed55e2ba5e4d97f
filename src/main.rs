use clap::Parser;
use fontbake::{build, dump_kerning, load, BuildOptions, Flavor, FontbakeError, Mode};
use std::path::{Path, PathBuf};

mod args;

use args::Args;

fn dump(path: &Path) -> Result<(), FontbakeError> {
    let bytes = std::fs::read(path)?;
    for (left, right, value) in dump_kerning(&bytes)? {
        println!("{} {} {}", left, right, value);
    }
    Ok(())
}

fn run(args: &Args, input: &Path) -> Result<(), FontbakeError> {
    let mut options = BuildOptions::default();
    if args.wants_cff() {
        options.compile.flavor = Flavor::Cff;
    }
    options.features.quantization = args.quantization;
    if args.append_features {
        options.features.mode = Mode::Append;
    }
    options.propagate_anchors = !args.no_propagate_anchors;

    log::info!("Loading {}", input.display());
    let font = load(input)?;
    let before = std::time::Instant::now();
    let output = build(font, &options)?;
    log::info!("Built in {:.2?}", before.elapsed());

    if let Some(path) = &args.features_out {
        log::info!("Writing features to {}", path.display());
        std::fs::write(path, &output.features)?;
    }
    let output_path = args.output.clone().unwrap_or_else(|| {
        let extension = match options.compile.flavor {
            Flavor::TrueType => "ttf",
            Flavor::Cff => "otf",
        };
        PathBuf::from(input.file_stem().unwrap_or(input.as_os_str())).with_extension(extension)
    });
    log::info!("Saving {}", output_path.display());
    std::fs::write(&output_path, output.font.to_bytes())?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.into())
        .init();

    let result = match (&args.dump_kerning, &args.input) {
        (Some(font), _) => dump(font),
        (None, Some(input)) => run(&args, input),
        // clap insists on one or the other
        (None, None) => Ok(()),
    };
    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
