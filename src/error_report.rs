use crate::config::PhysicalSize;
use crate::error::{MeasureError, Result};

/// Deviation of one measured axis from its ground truth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisError {
    /// |measured - actual|, in cm
    pub absolute: f64,
    /// absolute / actual * 100
    pub percent: f64,
}

impl AxisError {
    fn between(measured: f64, actual: f64, axis: &'static str) -> Result<Self> {
        if !(actual > 0.0) {
            return Err(MeasureError::InvalidGroundTruth {
                axis,
                value: actual,
            });
        }
        let absolute = (measured - actual).abs();
        Ok(Self {
            absolute,
            percent: absolute / actual * 100.0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorReport {
    pub actual: PhysicalSize,
    pub width: AxisError,
    pub height: AxisError,
}

/// Compare full-precision measurements against known dimensions
pub fn report_error(measured_width: f64, measured_height: f64, actual: PhysicalSize) -> Result<ErrorReport> {
    Ok(ErrorReport {
        actual,
        width: AxisError::between(measured_width, actual.width, "width")?,
        height: AxisError::between(measured_height, actual.height, "height")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_measurement_has_zero_error() {
        let report = report_error(3.0, 2.0, PhysicalSize::new(3.0, 2.0)).unwrap();
        assert_eq!(report.width.absolute, 0.0);
        assert_eq!(report.width.percent, 0.0);
        assert_eq!(report.height.percent, 0.0);
    }

    #[test]
    fn test_percent_error() {
        let report = report_error(10.5, 3.6, PhysicalSize::new(10.0, 4.0)).unwrap();
        assert_relative_eq!(report.width.absolute, 0.5);
        assert_relative_eq!(report.width.percent, 5.0);
        assert_relative_eq!(report.height.absolute, 0.4, max_relative = 1e-12);
        assert_relative_eq!(report.height.percent, 10.0, max_relative = 1e-12);
    }

    #[test]
    fn test_non_positive_ground_truth() {
        let err = report_error(3.0, 2.0, PhysicalSize::new(0.0, 2.0)).unwrap_err();
        assert_eq!(
            err,
            MeasureError::InvalidGroundTruth {
                axis: "width",
                value: 0.0
            }
        );

        let err = report_error(3.0, 2.0, PhysicalSize::new(3.0, -1.0)).unwrap_err();
        assert!(matches!(
            err,
            MeasureError::InvalidGroundTruth { axis: "height", .. }
        ));
    }
}
