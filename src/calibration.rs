use log::{debug, warn};

use crate::config::PhysicalSize;
use crate::error::{MeasureError, Result, Stage};

/// Pixels per centimeter along each frame axis.
///
/// Derived once from the reference and never changed afterwards. The two
/// axes are kept apart so that residual distortion stays visible instead of
/// being averaged away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationFactor {
    pub x: f64,
    pub y: f64,
}

impl CalibrationFactor {
    pub fn isotropic(pixels_per_unit: f64) -> Self {
        Self {
            x: pixels_per_unit,
            y: pixels_per_unit,
        }
    }

    /// Relative disagreement between the two axes
    pub fn anisotropy(&self) -> f64 {
        (self.x - self.y).abs() / self.x.max(self.y)
    }

    /// Physical length of a pixel-space vector
    pub fn to_physical(&self, dx: f64, dy: f64) -> f64 {
        (dx / self.x).hypot(dy / self.y)
    }
}

/// Derive the scale from a reference of `pixel_size` (horizontal, vertical)
/// pixels and known `physical` size.
///
/// If the axes disagree by more than `tolerance` (relative), a warning is
/// logged and the per-axis factors are still returned.
pub fn calibrate(
    pixel_size: (f64, f64),
    physical: PhysicalSize,
    tolerance: f64,
) -> Result<CalibrationFactor> {
    if !(physical.width > 0.0 && physical.height > 0.0) {
        return Err(MeasureError::InvalidConfig(format!(
            "reference size must be positive, got {} x {}",
            physical.width, physical.height
        )));
    }
    let (pixel_width, pixel_height) = pixel_size;
    if !(pixel_width > 0.0 && pixel_height > 0.0) {
        return Err(MeasureError::DegenerateReference {
            stage: Stage::Calibration,
            reason: format!(
                "reference spans {:.2} x {:.2} px",
                pixel_width, pixel_height
            ),
        });
    }

    let factor = CalibrationFactor {
        x: pixel_width / physical.width,
        y: pixel_height / physical.height,
    };

    debug!(
        "Calibration: {:.4} px/cm (x), {:.4} px/cm (y)",
        factor.x, factor.y
    );

    if factor.anisotropy() > tolerance {
        warn!(
            "Calibration axes disagree by {:.1}% (x {:.3}, y {:.3} px/cm); \
             the reference may not be fully perspective-corrected",
            factor.anisotropy() * 100.0,
            factor.x,
            factor.y
        );
    }

    Ok(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_factor_for_undistorted_reference() {
        let factor = calibrate((2100.0, 2970.0), PhysicalSize::a4(), 0.02).unwrap();
        assert_relative_eq!(factor.x, 100.0, max_relative = 1e-12);
        assert_relative_eq!(factor.y, 100.0, max_relative = 1e-12);
        assert!(factor.anisotropy() < 1e-12);
    }

    #[test]
    fn test_anisotropic_axes_are_kept() {
        let factor = calibrate((210.0, 330.0), PhysicalSize::a4(), 0.02).unwrap();
        assert_relative_eq!(factor.x, 10.0);
        assert_relative_eq!(factor.y, 330.0 / 29.7);
        assert!(factor.anisotropy() > 0.02);
    }

    #[test]
    fn test_to_physical() {
        let factor = CalibrationFactor { x: 10.0, y: 20.0 };
        assert_relative_eq!(factor.to_physical(30.0, 0.0), 3.0);
        assert_relative_eq!(factor.to_physical(0.0, 30.0), 1.5);
        assert_relative_eq!(CalibrationFactor::isotropic(5.0).to_physical(30.0, 40.0), 10.0);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(matches!(
            calibrate((0.0, 10.0), PhysicalSize::a4(), 0.02),
            Err(MeasureError::DegenerateReference { .. })
        ));
        assert!(matches!(
            calibrate((10.0, 10.0), PhysicalSize::new(-1.0, 2.0), 0.02),
            Err(MeasureError::InvalidConfig(_))
        ));
    }
}
