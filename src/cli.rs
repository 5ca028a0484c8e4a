use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use crate::config::{
    MeasureConfig, PhysicalSize, A4_HEIGHT_CM, A4_WIDTH_CM, DEFAULT_AXIS_TOLERANCE,
    DEFAULT_CANONICAL_WIDTH, DEFAULT_DISPLAY_DECIMALS, DEFAULT_MIN_OBJECT_AREA,
    DEFAULT_MIN_REFERENCE_AREA,
};
use crate::preprocess::ThresholdMode;

#[derive(Parser, Debug)]
#[command(name = "snap-measure")]
#[command(version, about = "Measure an object photographed next to a reference of known size")]
pub struct Cli {
    /// Input image path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Annotated output path [default: input_measured.png]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Reference width in cm
    #[arg(long, default_value_t = A4_WIDTH_CM)]
    pub reference_width: f64,

    /// Reference height in cm
    #[arg(long, default_value_t = A4_HEIGHT_CM)]
    pub reference_height: f64,

    /// The reference is an item lying next to the object, not a sheet under it
    #[arg(long)]
    pub reference_object: bool,

    /// Known object width in cm, for error reporting
    #[arg(long, requires = "actual_height")]
    pub actual_width: Option<f64>,

    /// Known object height in cm, for error reporting
    #[arg(long, requires = "actual_width")]
    pub actual_height: Option<f64>,

    /// Minimum reference contour area in px²
    #[arg(long, default_value_t = DEFAULT_MIN_REFERENCE_AREA)]
    pub min_area: f64,

    /// Minimum object contour area in px²
    #[arg(long, default_value_t = DEFAULT_MIN_OBJECT_AREA)]
    pub min_object_area: f64,

    /// Width of the rectified sheet in pixels
    #[arg(long, default_value_t = DEFAULT_CANONICAL_WIDTH)]
    pub canonical_width: u32,

    /// Binarization level: "otsu" or 0-255
    #[arg(short, long, default_value = "otsu", value_parser = parse_threshold)]
    pub threshold: ThresholdMode,

    /// Decimal places in the printed size
    #[arg(short, long, default_value_t = DEFAULT_DISPLAY_DECIMALS)]
    pub decimals: u32,

    /// Object name used in the printout [default: input file stem]
    #[arg(short, long)]
    pub label: Option<String>,

    /// Fail on tied reference candidates instead of taking the first
    #[arg(long)]
    pub strict: bool,

    /// Show detection details
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self.input.file_stem().unwrap_or_default().to_string_lossy();
            let parent = self.input.parent().unwrap_or(Path::new("."));
            parent.join(format!("{}_measured.png", stem))
        })
    }

    /// `<stem>.txt` next to the input
    pub fn sidecar_path(&self) -> PathBuf {
        self.input.with_extension("txt")
    }

    /// Known object size from the flags, else from the sidecar file if
    /// one exists
    pub fn ground_truth(&self) -> Result<Option<PhysicalSize>> {
        if let (Some(width), Some(height)) = (self.actual_width, self.actual_height) {
            return Ok(Some(PhysicalSize::new(width, height)));
        }

        let path = self.sidecar_path();
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read ground truth file: {:?}", path))?;
        let size = parse_ground_truth(&text)
            .with_context(|| format!("Malformed ground truth file: {:?}", path))?;
        Ok(Some(size))
    }

    pub fn to_config(&self) -> Result<MeasureConfig> {
        let reference = PhysicalSize::new(self.reference_width, self.reference_height);
        let mut config = if self.reference_object {
            MeasureConfig::with_reference_object(reference)
        } else {
            MeasureConfig::with_sheet(reference)
        };

        config.ground_truth = self.ground_truth()?;
        config.min_reference_area = self.min_area;
        config.min_object_area = self.min_object_area;
        config.canonical_width = self.canonical_width;
        config.axis_tolerance = DEFAULT_AXIS_TOLERANCE;
        config.strict_reference = self.strict;
        config.display_decimals = self.decimals;
        config.reference_preprocess.threshold = self.threshold;
        config.object_preprocess.threshold = self.threshold;
        config.label = match &self.label {
            Some(label) => label.clone(),
            None => self
                .input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or(config.label),
        };
        Ok(config)
    }
}

fn parse_threshold(s: &str) -> Result<ThresholdMode, String> {
    if s.eq_ignore_ascii_case("otsu") {
        return Ok(ThresholdMode::Otsu);
    }
    s.parse::<u8>()
        .map(ThresholdMode::Fixed)
        .map_err(|_| format!("Invalid threshold '{}', expected \"otsu\" or 0-255", s))
}

/// First non-empty line, "width height" in cm
fn parse_ground_truth(text: &str) -> Result<PhysicalSize> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .context("file is empty")?;

    let values: Vec<&str> = line.split_whitespace().collect();
    if values.len() != 2 {
        bail!("expected \"width height\", got {:?}", line);
    }
    let width: f64 = values[0]
        .parse()
        .with_context(|| format!("Invalid width value: {}", values[0]))?;
    let height: f64 = values[1]
        .parse()
        .with_context(|| format!("Invalid height value: {}", values[1]))?;
    Ok(PhysicalSize::new(width, height))
}
