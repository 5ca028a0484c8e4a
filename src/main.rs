use anyhow::{Context, Result};
use clap::Parser;
use image::ImageReader;
use log::{debug, LevelFilter};

use snap_measure::{annotate, caption, measure, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let config = cli.to_config()?;

    // Load input image
    let img = ImageReader::open(&cli.input)
        .with_context(|| format!("Failed to open input file: {:?}", cli.input))?
        .decode()
        .with_context(|| format!("Failed to decode image: {:?}", cli.input))?;
    let frame = img.to_rgb8();
    debug!("Loaded image: {:?} ({}x{})", cli.input, frame.width(), frame.height());

    let output = measure(&frame, &config).map_err(|e| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("Measurement failed during {}", stage))
    })?;

    for line in caption(&output.measurement, config.display_decimals) {
        println!("{}", line);
    }

    let output_path = cli.output_path();
    annotate(&output)
        .save(&output_path)
        .with_context(|| format!("Failed to save output: {:?}", output_path))?;
    eprintln!("Saved annotated image: {:?}", output_path);

    Ok(())
}
