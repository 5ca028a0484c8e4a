use std::borrow::Cow;

use image::{GrayImage, RgbImage};
use imageproc::geometry::approximate_polygon_dp;
use log::{debug, warn};

use crate::config::{PhysicalSize, ReferenceSource};
use crate::error::{MeasureError, Result, Stage};
use crate::geometry::{min_area_rect, Quadrilateral, RotatedRect};
use crate::preprocess::{find_external_contours, BoundingBox, Contour};
use crate::transform::{normalize_perspective, Rectification, RectifiedFrame};

/// Polygon tolerance sweep, as fractions of the contour perimeter
const APPROX_EPSILON_STEP: f64 = 0.01;
const APPROX_EPSILON_MAX_STEPS: usize = 10;

/// Largest relative difference between contour area and quadrilateral
/// area. Rejects round blobs that collapse to four vertices at loose
/// tolerances.
const QUAD_FIT_TOLERANCE: f64 = 0.1;

/// The dominant four-sided region of a frame
#[derive(Debug, Clone)]
pub struct LocatedReference {
    pub quad: Quadrilateral,
    pub contour: Contour,
}

/// Approximate a contour with a quadrilateral, loosening the tolerance
/// until exactly four vertices remain.
pub fn approximate_quad(contour: &Contour) -> Option<Quadrilateral> {
    let perimeter = contour.perimeter();
    if contour.points().len() < 4 || !(perimeter > 0.0) {
        return None;
    }

    for step in 1..=APPROX_EPSILON_MAX_STEPS {
        let epsilon = APPROX_EPSILON_STEP * step as f64 * perimeter;
        let polygon = approximate_polygon_dp(contour.points(), epsilon, true);
        match polygon.len() {
            4 => {
                let corners = [0, 1, 2, 3].map(|i| (polygon[i].x as f64, polygon[i].y as f64));
                let quad = Quadrilateral::from_corners(corners);
                let area = contour.area();
                let fits = area > 0.0 && (quad.area() - area).abs() / area <= QUAD_FIT_TOLERANCE;
                return fits.then_some(quad);
            }
            n if n < 4 => return None,
            _ => {}
        }
    }
    None
}

/// Find the largest four-sided contour in a binary mask.
///
/// Contours under `min_area` are ignored. Candidates tied on area are
/// resolved by taking the first one found unless `strict` is set, in which
/// case the tie is reported as `AmbiguousReference`.
pub fn locate_reference(binary: &GrayImage, min_area: f64, strict: bool) -> Result<LocatedReference> {
    let contours = find_external_contours(binary, Stage::ReferenceLocation)?;

    let candidates: Vec<LocatedReference> = contours
        .into_iter()
        .filter(|c| c.area() >= min_area)
        .filter_map(|contour| {
            approximate_quad(&contour).map(|quad| LocatedReference { quad, contour })
        })
        .collect();

    debug!("{} four-sided reference candidates", candidates.len());

    let best_area = candidates
        .iter()
        .map(|c| c.contour.area())
        .fold(f64::NEG_INFINITY, f64::max);
    let mut tied = candidates
        .into_iter()
        .filter(|c| c.contour.area() == best_area);

    let chosen = tied
        .next()
        .ok_or(MeasureError::ReferenceNotFound { min_area })?;
    let others = tied.count();
    if others > 0 {
        if strict {
            return Err(MeasureError::AmbiguousReference {
                candidates: others + 1,
                area: best_area,
            });
        }
        warn!(
            "{} reference candidates tied at {:.1} px², using the first found",
            others + 1,
            best_area
        );
    }

    debug!(
        "Reference corners: {:?} (area {:.1} px²)",
        chosen.quad.corners(),
        chosen.contour.area()
    );
    Ok(chosen)
}

/// Where to look for the object once the reference is known
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExclusionZone {
    /// Bounds of the reference in the measured frame
    pub bounds: BoundingBox,
    /// Also drop candidates lying inside `bounds` (markings on a
    /// reference card, say). Off when the object sits on the reference.
    pub exclude_interior: bool,
    /// Drop candidates within this many pixels of the frame edge
    pub border_margin: Option<u32>,
}

/// The reference resolved into what calibration and object search need,
/// independent of which [`ReferenceSource`] produced it
#[derive(Debug, Clone)]
pub struct EstablishedReference<'a> {
    /// Frame the object is measured in
    pub frame: Cow<'a, RgbImage>,
    /// Reference size in pixels of `frame`, (horizontal, vertical)
    pub pixel_size: (f64, f64),
    /// Reference size in cm, oriented like `pixel_size`
    pub physical: PhysicalSize,
    pub exclusion: ExclusionZone,
    pub rectification: Option<Rectification>,
    /// Rotated rectangle of the reference in the original frame, when
    /// the frame is not rectified
    pub reference_rect: Option<RotatedRect>,
}

/// Split a rotated rectangle into (side closer to horizontal, other side)
fn horizontal_first(rect: &RotatedRect) -> (f64, f64) {
    if rect.angle.abs() <= 45.0 {
        (rect.width, rect.height)
    } else {
        (rect.height, rect.width)
    }
}

impl ReferenceSource {
    /// Turn a located reference into a measurement frame with known scale
    pub fn establish<'a>(
        &self,
        frame: &'a RgbImage,
        located: &LocatedReference,
        canonical_width: u32,
        border_margin: u32,
    ) -> Result<EstablishedReference<'a>> {
        match self {
            ReferenceSource::FixedAspectSheet(size) => {
                let physical = size.oriented(located.quad.is_landscape());
                let RectifiedFrame {
                    frame: warped,
                    rectification,
                } = normalize_perspective(frame, &located.quad, physical, canonical_width)?;
                let (width, height) = warped.dimensions();
                Ok(EstablishedReference {
                    frame: Cow::Owned(warped),
                    pixel_size: rectification.reference_extent(),
                    physical,
                    exclusion: ExclusionZone {
                        bounds: BoundingBox::frame(width, height),
                        exclude_interior: false,
                        border_margin: Some(border_margin),
                    },
                    rectification: Some(rectification),
                    reference_rect: None,
                })
            }
            ReferenceSource::UserSuppliedDimensions(size) => {
                if let Some(reason) = located.quad.degeneracy() {
                    return Err(MeasureError::DegenerateReference {
                        stage: Stage::Calibration,
                        reason,
                    });
                }
                let rect = min_area_rect(located.quad.corners()).ok_or_else(|| {
                    MeasureError::DegenerateReference {
                        stage: Stage::Calibration,
                        reason: "no rectangle fits the reference corners".to_string(),
                    }
                })?;
                let (horizontal, vertical) = horizontal_first(&rect);
                let physical = size.oriented(horizontal > vertical);
                Ok(EstablishedReference {
                    frame: Cow::Borrowed(frame),
                    pixel_size: (horizontal, vertical),
                    physical,
                    exclusion: ExclusionZone {
                        bounds: located.contour.bounds(),
                        exclude_interior: true,
                        border_margin: None,
                    },
                    rectification: None,
                    reference_rect: Some(rect),
                })
            }
        }
    }
}
