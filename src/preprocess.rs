use image::{imageops, GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{arc_length, contour_area};
use imageproc::morphology::close;
use imageproc::point::Point;
use log::debug;

use crate::error::{MeasureError, Result, Stage};

pub const DEFAULT_BLUR_SIGMA: f32 = 1.0;
pub const DEFAULT_CLOSING_RADIUS: u8 = 2;

/// How to pick the binarization level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    Fixed(u8),
    Otsu,
}

/// Which side of the threshold is foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    BrightForeground,
    DarkForeground,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    /// Gaussian sigma; 0 disables smoothing
    pub blur_sigma: f32,
    pub threshold: ThresholdMode,
    /// Closing radius in pixels (L∞ norm); 0 disables closing
    pub closing_radius: u8,
    pub polarity: Polarity,
}

impl PreprocessOptions {
    pub fn new(polarity: Polarity) -> Self {
        Self {
            blur_sigma: DEFAULT_BLUR_SIGMA,
            threshold: ThresholdMode::Otsu,
            closing_radius: DEFAULT_CLOSING_RADIUS,
            polarity,
        }
    }
}

/// Turn a color frame into a binary mask (255 = foreground).
///
/// Grayscale, Gaussian smoothing, threshold, then morphological closing so
/// that a thin gap in an outline does not split one object in two.
pub fn preprocess(frame: &RgbImage, options: &PreprocessOptions) -> GrayImage {
    let gray = imageops::grayscale(frame);

    let smoothed = if options.blur_sigma > 0.0 {
        gaussian_blur_f32(&gray, options.blur_sigma)
    } else {
        gray
    };

    let level = match options.threshold {
        ThresholdMode::Fixed(level) => level,
        ThresholdMode::Otsu => otsu_level(&smoothed),
    };
    let threshold_type = match options.polarity {
        Polarity::BrightForeground => ThresholdType::Binary,
        Polarity::DarkForeground => ThresholdType::BinaryInverted,
    };
    let binary = threshold(&smoothed, level, threshold_type);

    debug!(
        "Preprocessed {}x{} frame: level {} ({:?}), {:?}",
        frame.width(),
        frame.height(),
        level,
        options.threshold,
        options.polarity
    );

    if options.closing_radius > 0 {
        close(&binary, Norm::LInf, options.closing_radius)
    } else {
        binary
    }
}

/// Axis-aligned pixel bounds, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl BoundingBox {
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounds of a whole `width` x `height` frame
    pub fn frame(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32 - 1, height as i32 - 1)
    }

    fn of_points(points: &[Point<i32>]) -> Self {
        let mut bounds = Self::new(i32::MAX, i32::MAX, i32::MIN, i32::MIN);
        for p in points {
            bounds.min_x = bounds.min_x.min(p.x);
            bounds.min_y = bounds.min_y.min(p.y);
            bounds.max_x = bounds.max_x.max(p.x);
            bounds.max_y = bounds.max_y.max(p.y);
        }
        bounds
    }

    pub fn width(&self) -> i64 {
        (self.max_x as i64 - self.min_x as i64 + 1).max(0)
    }

    pub fn height(&self) -> i64 {
        (self.max_y as i64 - self.min_y as i64 + 1).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    pub fn intersection_over_union(&self, other: &BoundingBox) -> f64 {
        let overlap = BoundingBox::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        let intersection = overlap.area();
        let union = self.area() + other.area() - intersection;
        if union <= 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }

    /// True if the box comes within `margin` pixels of the frame edge
    pub fn near_border(&self, width: u32, height: u32, margin: u32) -> bool {
        let margin = margin as i32;
        self.min_x <= margin
            || self.min_y <= margin
            || self.max_x >= width as i32 - 1 - margin
            || self.max_y >= height as i32 - 1 - margin
    }
}

/// Closed outer boundary of a foreground region
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    points: Vec<Point<i32>>,
    area: f64,
    perimeter: f64,
    bounds: BoundingBox,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        let area = contour_area(&points);
        let perimeter = arc_length(&points, true);
        let bounds = BoundingBox::of_points(&points);
        Self {
            points,
            area,
            perimeter,
            bounds,
        }
    }

    pub fn points(&self) -> &[Point<i32>] {
        &self.points
    }

    /// Enclosed area in px²
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Closed boundary length in px
    pub fn perimeter(&self) -> f64 {
        self.perimeter
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn points_f64(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.x as f64, p.y as f64)).collect()
    }
}

/// Extract the outermost contours of a binary mask.
///
/// A mask with no foreground, or with nothing but foreground, has no
/// boundary to offer and is reported as `NoContoursFound` for `stage`.
pub fn find_external_contours(binary: &GrayImage, stage: Stage) -> Result<Vec<Contour>> {
    let total = binary.width() as usize * binary.height() as usize;
    let foreground = binary.pixels().filter(|p| p[0] > 0).count();
    if foreground == 0 || foreground == total {
        debug!("{}: mask is uniform ({} of {} px set)", stage, foreground, total);
        return Err(MeasureError::NoContoursFound { stage });
    }

    let contours: Vec<Contour> = find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| Contour::new(c.points))
        .collect();

    debug!("{}: {} external contours", stage, contours.len());

    if contours.is_empty() {
        return Err(MeasureError::NoContoursFound { stage });
    }
    Ok(contours)
}
