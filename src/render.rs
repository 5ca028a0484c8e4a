use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::measure::MeasurementResult;
use crate::pipeline::PipelineOutput;

const OBJECT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const REFERENCE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

fn draw_closed(canvas: &mut RgbImage, corners: &[(f64, f64)], color: Rgb<u8>) {
    for i in 0..corners.len() {
        let p1 = corners[i];
        let p2 = corners[(i + 1) % corners.len()];
        draw_line_segment_mut(
            canvas,
            (p1.0 as f32, p1.1 as f32),
            (p2.0 as f32, p2.1 as f32),
            color,
        );
    }
}

/// Draw the measurement onto a copy of the measured frame.
///
/// Object outline in blue, its fitted rectangle in green with a dot at the
/// center. The reference is outlined in red when it lies inside the frame;
/// a rectified sheet is the frame itself and is left undrawn.
pub fn annotate(output: &PipelineOutput) -> RgbImage {
    let mut canvas = output.measured_frame.clone();

    if let Some(rect) = &output.reference_rect {
        draw_closed(&mut canvas, output.reference.corners(), REFERENCE_COLOR);
        draw_filled_circle_mut(
            &mut canvas,
            (rect.center.0.round() as i32, rect.center.1.round() as i32),
            3,
            REFERENCE_COLOR,
        );
    }

    let outline: Vec<(f64, f64)> = output.object.points_f64();
    draw_closed(&mut canvas, &outline, OUTLINE_COLOR);

    let rect = &output.measurement.rect;
    draw_closed(&mut canvas, &rect.corners(), OBJECT_COLOR);
    draw_filled_circle_mut(
        &mut canvas,
        (rect.center.0.round() as i32, rect.center.1.round() as i32),
        3,
        OBJECT_COLOR,
    );

    canvas
}

/// Text lines describing a measurement, for printing next to the image
pub fn caption(result: &MeasurementResult, decimals: u32) -> Vec<String> {
    let (width, height) = result.display_size(decimals);
    let precision = decimals as usize;
    let mut lines = vec![
        result.label.clone(),
        format!("  width:  {:.*} cm", precision, width),
        format!("  height: {:.*} cm", precision, height),
    ];

    if let Some(report) = &result.error {
        lines.push(format!(
            "  actual: {:.*} x {:.*} cm",
            precision, report.actual.width, precision, report.actual.height
        ));
        lines.push(format!(
            "  width error:  {:.2} cm ({:.1}%)",
            report.width.absolute, report.width.percent
        ));
        lines.push(format!(
            "  height error: {:.2} cm ({:.1}%)",
            report.height.absolute, report.height.percent
        ));
    }
    lines
}
