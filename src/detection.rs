use image::GrayImage;
use log::debug;

use crate::error::{MeasureError, Result, Stage};
use crate::preprocess::{find_external_contours, BoundingBox, Contour};
use crate::reference::ExclusionZone;

/// Bounding boxes overlapping the reference at least this much are the
/// reference itself
const REFERENCE_OVERLAP: f64 = 0.8;

/// Why a contour was passed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Reference,
    InsideReference,
    TouchesBorder,
    TooSmall,
}

fn screen(
    contour: &Contour,
    zone: &ExclusionZone,
    frame: (u32, u32),
    min_area: f64,
) -> Option<Rejection> {
    let bounds: BoundingBox = contour.bounds();
    if bounds.intersection_over_union(&zone.bounds) >= REFERENCE_OVERLAP {
        return Some(Rejection::Reference);
    }
    if zone.exclude_interior && zone.bounds.contains(&bounds) {
        return Some(Rejection::InsideReference);
    }
    if let Some(margin) = zone.border_margin {
        if bounds.near_border(frame.0, frame.1, margin) {
            return Some(Rejection::TouchesBorder);
        }
    }
    if contour.area() < min_area {
        return Some(Rejection::TooSmall);
    }
    None
}

/// Find the object to measure in a binary mask of the measured frame.
///
/// Contours matching or inside the reference, touching the frame border
/// (when a margin is set) or smaller than `min_area` are dropped. Of the
/// rest, the one with the longest perimeter wins; elongated objects beat
/// compact specks of similar area this way. Only one object is measured
/// per frame: any further candidates are ignored.
pub fn locate_object(binary: &GrayImage, zone: &ExclusionZone, min_area: f64) -> Result<Contour> {
    let contours = find_external_contours(binary, Stage::ObjectLocation)?;
    let total = contours.len();
    let frame = binary.dimensions();

    let mut best: Option<Contour> = None;
    for contour in contours {
        if let Some(reason) = screen(&contour, zone, frame, min_area) {
            debug!(
                "Skipping contour at {:?} ({:.0} px²): {:?}",
                contour.bounds(),
                contour.area(),
                reason
            );
            continue;
        }
        if best
            .as_ref()
            .map_or(true, |b| contour.perimeter() > b.perimeter())
        {
            best = Some(contour);
        }
    }

    let object = best.ok_or(MeasureError::NoObjectFound {
        candidates: total,
        min_area,
    })?;

    debug!(
        "Object contour: {} points, perimeter {:.1} px, area {:.1} px²",
        object.points().len(),
        object.perimeter(),
        object.area()
    );
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn on_sheet(width: u32, height: u32) -> ExclusionZone {
        ExclusionZone {
            bounds: BoundingBox::frame(width, height),
            exclude_interior: false,
            border_margin: Some(3),
        }
    }

    #[test]
    fn test_picks_longest_perimeter() {
        let mut mask = GrayImage::new(200, 200);
        // Compact square, larger area
        draw_filled_rect_mut(&mut mask, Rect::at(20, 20).of_size(40, 40), Luma([255]));
        // Long thin bar, smaller area but longer outline
        draw_filled_rect_mut(&mut mask, Rect::at(20, 100).of_size(150, 8), Luma([255]));

        let object = locate_object(&mask, &on_sheet(200, 200), 50.0).unwrap();
        assert_eq!(object.bounds(), BoundingBox::new(20, 100, 169, 107));
    }

    #[test]
    fn test_never_selects_reference() {
        // Reference card next to a smaller object, card is the largest contour
        let mut mask = GrayImage::new(300, 200);
        draw_filled_rect_mut(&mut mask, Rect::at(10, 10).of_size(150, 100), Luma([255]));
        draw_filled_rect_mut(&mut mask, Rect::at(200, 50).of_size(40, 30), Luma([255]));
        // Marking printed on the card
        draw_filled_rect_mut(&mut mask, Rect::at(40, 40).of_size(5, 5), Luma([0]));

        let zone = ExclusionZone {
            bounds: BoundingBox::new(10, 10, 159, 109),
            exclude_interior: true,
            border_margin: None,
        };
        let object = locate_object(&mask, &zone, 50.0).unwrap();
        assert_eq!(object.bounds(), BoundingBox::new(200, 50, 239, 79));
    }

    #[test]
    fn test_only_reference_means_no_object() {
        let mut mask = GrayImage::new(300, 200);
        draw_filled_rect_mut(&mut mask, Rect::at(10, 10).of_size(150, 100), Luma([255]));
        let zone = ExclusionZone {
            bounds: BoundingBox::new(10, 10, 159, 109),
            exclude_interior: true,
            border_margin: None,
        };
        let err = locate_object(&mask, &zone, 50.0).unwrap_err();
        assert_eq!(
            err,
            MeasureError::NoObjectFound {
                candidates: 1,
                min_area: 50.0
            }
        );
    }

    #[test]
    fn test_border_slivers_and_specks_are_ignored() {
        let mut mask = GrayImage::new(200, 300);
        // Dark wedge left over at the sheet edge after warping
        draw_filled_rect_mut(&mut mask, Rect::at(0, 0).of_size(3, 250), Luma([255]));
        // Speck
        draw_filled_rect_mut(&mut mask, Rect::at(100, 20).of_size(3, 3), Luma([255]));
        // Object
        draw_filled_rect_mut(&mut mask, Rect::at(60, 100).of_size(30, 20), Luma([255]));

        let object = locate_object(&mask, &on_sheet(200, 300), 50.0).unwrap();
        assert_eq!(object.bounds(), BoundingBox::new(60, 100, 89, 119));

        let mut empty_sheet = GrayImage::new(200, 300);
        draw_filled_rect_mut(&mut empty_sheet, Rect::at(0, 0).of_size(3, 250), Luma([255]));
        assert!(matches!(
            locate_object(&empty_sheet, &on_sheet(200, 300), 50.0),
            Err(MeasureError::NoObjectFound { .. })
        ));
    }
}
