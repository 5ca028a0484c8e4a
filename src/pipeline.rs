use image::RgbImage;
use log::{debug, info};

use crate::calibration::{calibrate, CalibrationFactor};
use crate::config::MeasureConfig;
use crate::detection::locate_object;
use crate::error::Result;
use crate::error_report::report_error;
use crate::geometry::{Quadrilateral, RotatedRect};
use crate::measure::{extract_dimensions, MeasurementResult};
use crate::preprocess::{preprocess, Contour};
use crate::reference::locate_reference;
use crate::transform::Rectification;

/// Everything one run produced, for the caller to print or draw
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Reference corners in the original frame
    pub reference: Quadrilateral,
    /// Set when the frame was rectified before measuring
    pub rectification: Option<Rectification>,
    /// Reference rectangle in the measured frame, when not rectified
    pub reference_rect: Option<RotatedRect>,
    pub calibration: CalibrationFactor,
    /// Object outline in the measured frame
    pub object: Contour,
    pub measurement: MeasurementResult,
    /// The frame the object was measured in: the rectified sheet, or a
    /// copy of the input
    pub measured_frame: RgbImage,
}

/// Measure the single object in `frame`.
///
/// Runs the stages in order and stops at the first failure; the error
/// names the stage that failed.
pub fn measure(frame: &RgbImage, config: &MeasureConfig) -> Result<PipelineOutput> {
    config.validate()?;
    debug!(
        "Measuring {}x{} frame with {:?}",
        frame.width(),
        frame.height(),
        config.reference
    );

    let reference_mask = preprocess(frame, &config.reference_preprocess);
    let located = locate_reference(
        &reference_mask,
        config.min_reference_area,
        config.strict_reference,
    )?;

    let established =
        config
            .reference
            .establish(frame, &located, config.canonical_width, config.border_margin)?;

    let calibration = calibrate(
        established.pixel_size,
        established.physical,
        config.axis_tolerance,
    )?;

    let object_mask = preprocess(&established.frame, &config.object_preprocess);
    let object = locate_object(&object_mask, &established.exclusion, config.min_object_area)?;

    let dimensions = extract_dimensions(&object, &calibration)?;

    let error = config
        .ground_truth
        .map(|actual| report_error(dimensions.width_cm, dimensions.height_cm, actual))
        .transpose()?;

    let measurement = MeasurementResult::new(config.label.clone(), dimensions, error);
    let (width, height) = measurement.display_size(config.display_decimals);
    info!("{}: {} x {} cm", measurement.label, width, height);

    Ok(PipelineOutput {
        reference: located.quad,
        rectification: established.rectification,
        reference_rect: established.reference_rect,
        calibration,
        object,
        measurement,
        measured_frame: established.frame.into_owned(),
    })
}
