use log::debug;

use crate::calibration::CalibrationFactor;
use crate::config::PhysicalSize;
use crate::error::{MeasureError, Result, Stage};
use crate::error_report::ErrorReport;
use crate::geometry::{enclosing_rect, RotatedRect};
use crate::preprocess::Contour;

/// Fitted sides at or below this many pixels are not a measurement
const MIN_SIDE_PX: f64 = 1e-6;

/// Within this many degrees of the diagonal neither side is clearly the
/// horizontal one, and the longer side is taken as width.
pub const DIAGONAL_TOLERANCE_DEG: f64 = 1.5;

/// Physical size of a measured object at full precision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub width_cm: f64,
    pub height_cm: f64,
    /// Fitted rectangle; its `width` side is the one reported as width
    pub rect: RotatedRect,
}

/// Angle between a direction and the horizontal axis, in [0, 90]
fn tilt_from_horizontal(angle_degrees: f64) -> f64 {
    let folded = angle_degrees.rem_euclid(180.0);
    if folded > 90.0 {
        180.0 - folded
    } else {
        folded
    }
}

/// Fit the minimum-area rectangle around `contour` and convert its sides to
/// centimeters.
///
/// Width is the side closer to the frame's horizontal axis. When the
/// rectangle sits on the diagonal the longer side is width, so that a
/// 45° turn does not flip the result. Each side is converted along its own
/// direction, which reduces to dividing by the per-axis factor for sides
/// parallel to the axes.
///
/// Contour points sit on pixel centers, so an object N pixels across
/// measures N - 1 pixels. On small objects (a few dozen pixels) this
/// under-reads by a visible fraction. A contour that collapses to a point
/// or a line is rejected with `DegenerateObject` rather than reported as
/// zero.
pub fn extract_dimensions(contour: &Contour, calibration: &CalibrationFactor) -> Result<Dimensions> {
    let fitted = enclosing_rect(contour.points()).ok_or(MeasureError::NoContoursFound {
        stage: Stage::DimensionExtraction,
    })?;
    if fitted.width <= MIN_SIDE_PX || fitted.height <= MIN_SIDE_PX {
        return Err(MeasureError::DegenerateObject {
            width: fitted.width,
            height: fitted.height,
        });
    }

    let side_length = |length: f64, direction: (f64, f64)| {
        calibration.to_physical(length * direction.0, length * direction.1)
    };
    let along_width = side_length(fitted.width, fitted.width_direction());
    let along_height = side_length(fitted.height, fitted.height_direction());

    let tilt = tilt_from_horizontal(fitted.angle);
    let width_first = if (tilt - 45.0).abs() <= DIAGONAL_TOLERANCE_DEG {
        along_width >= along_height
    } else {
        tilt < 45.0
    };

    let dimensions = if width_first {
        Dimensions {
            width_cm: along_width,
            height_cm: along_height,
            rect: fitted,
        }
    } else {
        Dimensions {
            width_cm: along_height,
            height_cm: along_width,
            rect: fitted.swapped(),
        }
    };

    debug!(
        "Fitted {:.1} x {:.1} px at {:.1}°, {:.4} x {:.4} cm",
        dimensions.rect.width,
        dimensions.rect.height,
        dimensions.rect.angle,
        dimensions.width_cm,
        dimensions.height_cm
    );
    Ok(dimensions)
}

/// Round for display only; comparisons use the full-precision value
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Final output of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementResult {
    pub label: String,
    pub width_cm: f64,
    pub height_cm: f64,
    pub rect: RotatedRect,
    pub ground_truth: Option<PhysicalSize>,
    pub error: Option<ErrorReport>,
}

impl MeasurementResult {
    pub fn new(label: impl Into<String>, dimensions: Dimensions, error: Option<ErrorReport>) -> Self {
        Self {
            label: label.into(),
            width_cm: dimensions.width_cm,
            height_cm: dimensions.height_cm,
            rect: dimensions.rect,
            ground_truth: error.as_ref().map(|e| e.actual),
            error,
        }
    }

    /// (width, height) rounded to `decimals` places
    pub fn display_size(&self, decimals: u32) -> (f64, f64) {
        (round_to(self.width_cm, decimals), round_to(self.height_cm, decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use imageproc::point::Point;

    /// Outline of a `width` x `height` rectangle rotated by `degrees`,
    /// sampled every half pixel and rounded to the pixel grid
    fn rotated_outline(width: f64, height: f64, degrees: f64) -> Contour {
        let (s, c) = degrees.to_radians().sin_cos();
        let (cx, cy) = (500.0, 500.0);
        let corners = [
            (-width / 2.0, -height / 2.0),
            (width / 2.0, -height / 2.0),
            (width / 2.0, height / 2.0),
            (-width / 2.0, height / 2.0),
        ];
        let mut points = Vec::new();
        for i in 0..4 {
            let (x0, y0) = corners[i];
            let (x1, y1) = corners[(i + 1) % 4];
            let steps = ((x1 - x0).hypot(y1 - y0) * 2.0) as usize;
            for k in 0..steps {
                let t = k as f64 / steps as f64;
                let (x, y) = (x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
                let p = Point::new(
                    (cx + x * c - y * s).round() as i32,
                    (cy + x * s + y * c).round() as i32,
                );
                if points.last() != Some(&p) {
                    points.push(p);
                }
            }
        }
        Contour::new(points)
    }

    #[test]
    fn test_axis_aligned_object() {
        let contour = rotated_outline(300.0, 200.0, 0.0);
        let dims = extract_dimensions(&contour, &CalibrationFactor::isotropic(100.0)).unwrap();
        assert_abs_diff_eq!(dims.width_cm, 3.0, epsilon = 0.02);
        assert_abs_diff_eq!(dims.height_cm, 2.0, epsilon = 0.02);
    }

    #[test]
    fn test_rotation_invariance() {
        let calibration = CalibrationFactor::isotropic(100.0);
        // The 300 px side stays closer to horizontal (or on the diagonal)
        for angle in [0.0, 15.0, 30.0, 44.5, 45.0, 45.5, 180.0, -20.0] {
            let contour = rotated_outline(300.0, 200.0, angle);
            let dims = extract_dimensions(&contour, &calibration).unwrap();
            assert_abs_diff_eq!(dims.width_cm, 3.0, epsilon = 0.03);
            assert_abs_diff_eq!(dims.height_cm, 2.0, epsilon = 0.03);
        }

        // Past the diagonal the roles swap but the side lengths do not change
        for angle in [50.0, 60.0, 120.0, -75.0] {
            let contour = rotated_outline(300.0, 200.0, angle);
            let dims = extract_dimensions(&contour, &calibration).unwrap();
            assert_abs_diff_eq!(dims.width_cm, 2.0, epsilon = 0.03);
            assert_abs_diff_eq!(dims.height_cm, 3.0, epsilon = 0.03);
        }
    }

    #[test]
    fn test_upright_object_reports_horizontal_side_as_width() {
        let contour = rotated_outline(300.0, 200.0, 90.0);
        let dims = extract_dimensions(&contour, &CalibrationFactor::isotropic(100.0)).unwrap();
        assert_abs_diff_eq!(dims.width_cm, 2.0, epsilon = 0.02);
        assert_abs_diff_eq!(dims.height_cm, 3.0, epsilon = 0.02);
        assert!(dims.rect.angle.abs() < 1.0);
    }

    #[test]
    fn test_per_axis_factors() {
        let contour = rotated_outline(300.0, 200.0, 0.0);
        let calibration = CalibrationFactor { x: 100.0, y: 50.0 };
        let dims = extract_dimensions(&contour, &calibration).unwrap();
        assert_abs_diff_eq!(dims.width_cm, 3.0, epsilon = 0.02);
        assert_abs_diff_eq!(dims.height_cm, 4.0, epsilon = 0.04);
    }

    #[test]
    fn test_display_rounding_keeps_full_precision() {
        let dims = Dimensions {
            width_cm: 2.96,
            height_cm: 1.94,
            rect: RotatedRect::new((0.0, 0.0), 296.0, 194.0, 0.0),
        };
        let result = MeasurementResult::new("mouse", dims, None);
        assert_eq!(result.display_size(1), (3.0, 1.9));
        assert_eq!(result.width_cm, 2.96);
        assert!(result.ground_truth.is_none());
    }

    #[test]
    fn test_empty_contour() {
        let err = extract_dimensions(&Contour::new(Vec::new()), &CalibrationFactor::isotropic(1.0))
            .unwrap_err();
        assert_eq!(err.stage(), Stage::DimensionExtraction);
    }

    #[test]
    fn test_point_and_line_contours_are_rejected() {
        let calibration = CalibrationFactor::isotropic(100.0);

        let speck = Contour::new(vec![Point::new(40, 40)]);
        let err = extract_dimensions(&speck, &calibration).unwrap_err();
        assert_eq!(
            err,
            MeasureError::DegenerateObject {
                width: 0.0,
                height: 0.0
            }
        );

        let line = Contour::new((0..20).map(|x| Point::new(10 + x, 5)).collect());
        let err = extract_dimensions(&line, &calibration).unwrap_err();
        assert!(matches!(err, MeasureError::DegenerateObject { .. }));
        assert_eq!(err.stage(), Stage::DimensionExtraction);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(2.05, 0), 2.0);
    }
}
