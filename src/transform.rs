use image::{Rgb, RgbImage};
use log::debug;
use nalgebra::Matrix3;

use crate::config::PhysicalSize;
use crate::error::{MeasureError, Result, Stage};
use crate::geometry::{compute_homography, transform_point, Quadrilateral};

/// Unpack pixels into f64 channels for interpolation
fn to_channels(img: &RgbImage) -> Vec<[f64; 3]> {
    img.pixels()
        .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
        .collect()
}

/// Bilinear interpolation at a given position
fn bilinear_interpolate(channels: &[[f64; 3]], width: u32, height: u32, x: f64, y: f64) -> [f64; 3] {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let x1 = x0 + 1;
    let y1 = y0 + 1;

    let x_frac = x - x.floor();
    let y_frac = y - y.floor();

    let get_pixel = |px: i32, py: i32| -> [f64; 3] {
        let px = px.clamp(0, width as i32 - 1) as u32;
        let py = py.clamp(0, height as i32 - 1) as u32;
        channels[(py * width + px) as usize]
    };

    let p00 = get_pixel(x0, y0);
    let p10 = get_pixel(x1, y0);
    let p01 = get_pixel(x0, y1);
    let p11 = get_pixel(x1, y1);

    let mut result = [0.0; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - x_frac) + p10[c] * x_frac;
        let bottom = p01[c] * (1.0 - x_frac) + p11[c] * x_frac;
        result[c] = top * (1.0 - y_frac) + bottom * y_frac;
    }

    result
}

/// Resample `img` through a forward projective transform into a
/// `width` x `height` output using inverse mapping.
///
/// Output pixels whose source falls outside the image are black. Returns
/// `None` if the transform cannot be inverted.
pub fn warp_perspective(
    img: &RgbImage,
    forward_matrix: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> Option<RgbImage> {
    let (src_width, src_height) = img.dimensions();
    let inverse_matrix = forward_matrix.try_inverse()?;
    let channels = to_channels(img);

    let mut output = RgbImage::new(width, height);
    if src_width == 0 || src_height == 0 {
        return Some(output);
    }

    for out_y in 0..height {
        for out_x in 0..width {
            let (src_x, src_y) = transform_point(&inverse_matrix, out_x as f64, out_y as f64);

            let inside = src_x.is_finite()
                && src_y.is_finite()
                && src_x >= -0.5
                && src_x <= src_width as f64 - 0.5
                && src_y >= -0.5
                && src_y <= src_height as f64 - 0.5;
            if inside {
                let v = bilinear_interpolate(&channels, src_width, src_height, src_x, src_y);
                let pixel = Rgb([
                    v[0].round().clamp(0.0, 255.0) as u8,
                    v[1].round().clamp(0.0, 255.0) as u8,
                    v[2].round().clamp(0.0, 255.0) as u8,
                ]);
                output.put_pixel(out_x, out_y, pixel);
            }
        }
    }

    Some(output)
}

/// How the original frame was mapped onto the canonical rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectification {
    /// Maps original frame coordinates to rectified coordinates
    pub homography: Matrix3<f64>,
    /// (source corner, canonical corner), in top-left, top-right,
    /// bottom-right, bottom-left order
    pub correspondences: [((f64, f64), (f64, f64)); 4],
}

impl Rectification {
    /// Pixel extent of the reference in the rectified frame
    pub fn reference_extent(&self) -> (f64, f64) {
        let [(_, tl), (_, tr), (_, br), _] = self.correspondences;
        (tr.0 - tl.0, br.1 - tr.1)
    }
}

/// A reference region warped to an upright rectangle
#[derive(Debug, Clone)]
pub struct RectifiedFrame {
    pub frame: RgbImage,
    pub rectification: Rectification,
}

/// Canonical pixel size for a reference of `physical` size, `width` px wide
pub fn canonical_size(physical: PhysicalSize, width: u32) -> (u32, u32) {
    let height = (width as f64 * physical.height / physical.width).round();
    (width, (height as u32).max(1))
}

/// Warp the quadrilateral region of `frame` onto an upright rectangle of
/// `canonical_width` pixels whose aspect ratio matches `physical`.
///
/// `physical` must already be oriented like the quadrilateral. The
/// quadrilateral's top-left corner lands on (0, 0) and its bottom-right on
/// (width, height), so the reference spans exactly the canonical size.
pub fn normalize_perspective(
    frame: &RgbImage,
    quad: &Quadrilateral,
    physical: PhysicalSize,
    canonical_width: u32,
) -> Result<RectifiedFrame> {
    if let Some(reason) = quad.degeneracy() {
        return Err(MeasureError::DegenerateReference {
            stage: Stage::PerspectiveNormalization,
            reason,
        });
    }

    let (width, height) = canonical_size(physical, canonical_width);
    let (w, h) = (width as f64, height as f64);
    let target = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let source = *quad.corners();

    let homography = compute_homography(&source, &target).ok_or_else(|| {
        MeasureError::DegenerateReference {
            stage: Stage::PerspectiveNormalization,
            reason: "corner correspondences are singular".to_string(),
        }
    })?;

    let warped = warp_perspective(frame, &homography, width, height).ok_or_else(|| {
        MeasureError::DegenerateReference {
            stage: Stage::PerspectiveNormalization,
            reason: "homography is not invertible".to_string(),
        }
    })?;

    debug!(
        "Rectified reference to {}x{} px ({:.3} x {:.3} physical)",
        width, height, physical.width, physical.height
    );

    let correspondences = [
        (source[0], target[0]),
        (source[1], target[1]),
        (source[2], target[2]),
        (source[3], target[3]),
    ];

    Ok(RectifiedFrame {
        frame: warped,
        rectification: Rectification {
            homography,
            correspondences,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_identity_warp() {
        let img = RgbImage::from_pixel(10, 10, Rgb([255, 0, 0]));
        let identity = Matrix3::identity();
        let result = warp_perspective(&img, &identity, 10, 10).unwrap();

        assert_eq!(result.dimensions(), (10, 10));
        assert_eq!(*result.get_pixel(5, 5), Rgb([255, 0, 0]));
        assert_eq!(*result.get_pixel(9, 9), Rgb([255, 0, 0]));
    }

    #[test]
    fn test_warp_outside_source_is_black() {
        let img = RgbImage::from_pixel(10, 10, Rgb([200, 200, 200]));
        #[rustfmt::skip]
        let shift = Matrix3::new(
            1.0, 0.0, 5.0,
            0.0, 1.0, 0.0,
            0.0, 0.0, 1.0,
        );
        let result = warp_perspective(&img, &shift, 20, 10).unwrap();
        assert_eq!(*result.get_pixel(2, 5), Rgb([0, 0, 0]));
        assert_eq!(*result.get_pixel(8, 5), Rgb([200, 200, 200]));
        assert_eq!(*result.get_pixel(18, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        let img = RgbImage::new(4, 4);
        assert!(warp_perspective(&img, &Matrix3::zeros(), 4, 4).is_none());
    }

    #[test]
    fn test_canonical_size_keeps_aspect() {
        assert_eq!(canonical_size(PhysicalSize::a4(), 2100), (2100, 2970));
        assert_eq!(canonical_size(PhysicalSize::a4(), 840), (840, 1188));
        assert_eq!(canonical_size(PhysicalSize::new(29.7, 21.0), 297), (297, 210));
    }

    #[test]
    fn test_rotated_reference_maps_to_canonical_corners() {
        let frame = RgbImage::new(400, 400);
        let center = (200.0, 200.0);
        let base = [(-60.0, -90.0), (60.0, -90.0), (60.0, 90.0), (-60.0, 90.0)];

        for angle in [0.0_f64, 12.0, 33.0, 45.0, 71.0, 150.0, 260.0] {
            let (s, c) = angle.to_radians().sin_cos();
            let corners = base.map(|(x, y)| (center.0 + x * c - y * s, center.1 + x * s + y * c));
            let quad = Quadrilateral::from_corners(corners);
            let physical = PhysicalSize::new(12.0, 18.0).oriented(quad.is_landscape());

            let rectified = normalize_perspective(&frame, &quad, physical, 120).unwrap();
            let (w, h) = rectified.frame.dimensions();
            let expected = [(0.0, 0.0), (w as f64, 0.0), (w as f64, h as f64), (0.0, h as f64)];

            let rectification = rectified.rectification;
            for ((src, dst), want) in rectification.correspondences.iter().zip(expected.iter()) {
                assert_eq!(dst, want);
                let (x, y) = transform_point(&rectification.homography, src.0, src.1);
                assert_abs_diff_eq!(x, want.0, epsilon = 1e-6);
                assert_abs_diff_eq!(y, want.1, epsilon = 1e-6);
            }

            // Upright: the rectified reference is a rectangle with its
            // sides parallel to the frame axes, so the center maps to the
            // canonical center.
            let (cx, cy) = transform_point(&rectification.homography, center.0, center.1);
            assert_abs_diff_eq!(cx, w as f64 / 2.0, epsilon = 1e-6);
            assert_abs_diff_eq!(cy, h as f64 / 2.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_degenerate_reference_is_rejected() {
        let frame = RgbImage::new(50, 50);
        let quad = Quadrilateral::from_corners([(0.0, 0.0), (10.0, 10.0), (20.0, 20.0), (30.0, 30.0)]);
        let err = normalize_perspective(&frame, &quad, PhysicalSize::a4(), 100).unwrap_err();
        assert!(matches!(err, MeasureError::DegenerateReference { .. }));
    }
}
