use std::cmp::Ordering;

use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

const EPS: f64 = 1e-9;

/// Minimum area for a quadrilateral to be usable as a warp source, in px²
const MIN_QUAD_AREA: f64 = 1.0;

/// |sin| of the corner angle below which three corners count as collinear
const COLLINEAR_SIN: f64 = 1e-3;

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (b.0 - a.0).hypot(b.1 - a.1)
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Shoelace area of a closed polygon (absolute value)
pub fn polygon_area(points: &[(f64, f64)]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum();
    twice.abs() / 2.0
}

/// Normalize an angle in degrees to (-90, 90]
pub fn normalize_angle(degrees: f64) -> f64 {
    let folded = degrees.rem_euclid(180.0);
    if folded > 90.0 {
        folded - 180.0
    } else {
        folded
    }
}

/// Total order used to pick the top-left corner: smaller `x + y` first,
/// ties broken by smaller `y - x` (the point further up and right).
pub fn corner_cmp(a: &(f64, f64), b: &(f64, f64)) -> Ordering {
    (a.0 + a.1)
        .total_cmp(&(b.0 + b.1))
        .then_with(|| (a.1 - a.0).total_cmp(&(b.1 - b.0)))
}

/// Order four corners as top-left, top-right, bottom-right, bottom-left.
///
/// Corners are first sorted clockwise (in image coordinates, y down) by
/// their angle around the centroid, then rotated so that the minimum under
/// [`corner_cmp`] comes first. The result is cyclic and never twisted,
/// even for a quadrilateral rotated by 45° where the plain sum/difference
/// heuristic ties.
pub fn order_corners(points: [(f64, f64); 4]) -> [(f64, f64); 4] {
    let cx = points.iter().map(|p| p.0).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.1).sum::<f64>() / 4.0;

    let mut sorted = points;
    sorted.sort_by(|a, b| {
        let angle_a = (a.1 - cy).atan2(a.0 - cx);
        let angle_b = (b.1 - cy).atan2(b.0 - cx);
        angle_a.total_cmp(&angle_b)
    });

    let start = (0..4)
        .min_by(|&i, &j| corner_cmp(&sorted[i], &sorted[j]))
        .unwrap_or(0);
    sorted.rotate_left(start);
    sorted
}

/// Four corners in canonical order (top-left, top-right, bottom-right, bottom-left)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrilateral {
    corners: [(f64, f64); 4],
}

impl Quadrilateral {
    pub fn from_corners(points: [(f64, f64); 4]) -> Self {
        Self {
            corners: order_corners(points),
        }
    }

    pub fn corners(&self) -> &[(f64, f64); 4] {
        &self.corners
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.corners)
    }

    /// Mean length of the top and bottom edges
    pub fn mean_width(&self) -> f64 {
        let [tl, tr, br, bl] = self.corners;
        (distance(tl, tr) + distance(bl, br)) / 2.0
    }

    /// Mean length of the left and right edges
    pub fn mean_height(&self) -> f64 {
        let [tl, tr, br, bl] = self.corners;
        (distance(tl, bl) + distance(tr, br)) / 2.0
    }

    pub fn is_landscape(&self) -> bool {
        self.mean_width() > self.mean_height()
    }

    /// Why this quadrilateral cannot be warped, if it cannot
    pub fn degeneracy(&self) -> Option<String> {
        let area = self.area();
        if !area.is_finite() || area < MIN_QUAD_AREA {
            return Some(format!("near-zero area ({:.3} px²)", area));
        }

        let mut sign = 0.0;
        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            let c = self.corners[(i + 2) % 4];
            let lengths = distance(a, b) * distance(b, c);
            if lengths < EPS {
                return Some("coincident corners".to_string());
            }
            let turn = cross(a, b, c) / lengths;
            if turn.abs() < COLLINEAR_SIN {
                return Some(format!("collinear corners around ({:.1}, {:.1})", b.0, b.1));
            }
            if sign != 0.0 && turn.signum() != sign {
                return Some("corners do not form a convex quadrilateral".to_string());
            }
            sign = turn.signum();
        }
        None
    }
}

/// Solve for the homography mapping each `src[i]` to `dst[i]`.
///
/// Returns `None` when the correspondences are singular.
pub fn compute_homography(src: &[(f64, f64); 4], dst: &[(f64, f64); 4]) -> Option<Matrix3<f64>> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for (i, (&(x, y), &(u, v))) in src.iter().zip(dst.iter()).enumerate() {
        let r = 2 * i;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -u * x;
        a[(r, 7)] = -u * y;
        b[r] = u;

        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -v * x;
        a[(r + 1, 7)] = -v * y;
        b[r + 1] = v;
    }

    let h = a.lu().solve(&b)?;
    if !h.iter().all(|value| value.is_finite()) {
        return None;
    }

    #[rustfmt::skip]
    let matrix = Matrix3::new(
        h[0], h[1], h[2],
        h[3], h[4], h[5],
        h[6], h[7], 1.0,
    );
    Some(matrix)
}

/// Transform a point using a projective matrix
pub fn transform_point(matrix: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    let p = Vector3::new(x, y, 1.0);
    let result = matrix * p;
    (result.x / result.z, result.y / result.z)
}

/// Rotated rectangle. `width` runs along `angle` (degrees, in (-90, 90],
/// image coordinates), `height` is perpendicular to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: (f64, f64),
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

impl RotatedRect {
    pub fn new(center: (f64, f64), width: f64, height: f64, angle: f64) -> Self {
        Self {
            center,
            width,
            height,
            angle: normalize_angle(angle),
        }
    }

    /// Same rectangle with the roles of the two sides exchanged
    pub fn swapped(&self) -> Self {
        Self::new(self.center, self.height, self.width, self.angle + 90.0)
    }

    /// Unit vector along the width side
    pub fn width_direction(&self) -> (f64, f64) {
        let rad = self.angle.to_radians();
        (rad.cos(), rad.sin())
    }

    /// Unit vector along the height side
    pub fn height_direction(&self) -> (f64, f64) {
        let (c, s) = self.width_direction();
        (-s, c)
    }

    pub fn corners(&self) -> [(f64, f64); 4] {
        let (ux, uy) = self.width_direction();
        let (vx, vy) = self.height_direction();
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        let (cx, cy) = self.center;
        [
            (cx - ux * hw - vx * hh, cy - uy * hw - vy * hh),
            (cx + ux * hw - vx * hh, cy + uy * hw - vy * hh),
            (cx + ux * hw + vx * hh, cy + uy * hw + vy * hh),
            (cx - ux * hw + vx * hh, cy - uy * hw + vy * hh),
        ]
    }
}

/// Minimum-area rectangle around a convex polygon.
///
/// One side of the optimal rectangle is collinear with a hull edge, so every
/// edge direction is tried. Returns `None` only for an empty input.
///
/// Stays in `f64` and yields side lengths and angle directly.
/// `imageproc::geometry::min_area_rect` returns its corners rounded to the
/// input's integer grid, which shifts each side of a tilted rectangle by up
/// to a pixel, and it panics on an empty slice.
pub fn min_area_rect(hull: &[(f64, f64)]) -> Option<RotatedRect> {
    let first = *hull.first()?;
    let n = hull.len();
    let mut best: Option<(f64, RotatedRect)> = None;

    for i in 0..n {
        let a = hull[i];
        let b = hull[(i + 1) % n];
        let length = distance(a, b);
        if length < EPS {
            continue;
        }
        let u = ((b.0 - a.0) / length, (b.1 - a.1) / length);
        let v = (-u.1, u.0);

        let mut min_u = f64::INFINITY;
        let mut max_u = f64::NEG_INFINITY;
        let mut min_v = f64::INFINITY;
        let mut max_v = f64::NEG_INFINITY;
        for p in hull {
            let pu = p.0 * u.0 + p.1 * u.1;
            let pv = p.0 * v.0 + p.1 * v.1;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let (width, height) = (max_u - min_u, max_v - min_v);
        let area = width * height;
        if best.map_or(true, |(best_area, _)| area < best_area - EPS) {
            let cu = (min_u + max_u) / 2.0;
            let cv = (min_v + max_v) / 2.0;
            let center = (cu * u.0 + cv * v.0, cu * u.1 + cv * v.1);
            let angle = u.1.atan2(u.0).to_degrees();
            best = Some((area, RotatedRect::new(center, width, height, angle)));
        }
    }

    Some(
        best.map(|(_, rect)| rect)
            .unwrap_or_else(|| RotatedRect::new(first, 0.0, 0.0, 0.0)),
    )
}

/// Minimum-area rectangle enclosing a set of pixel positions
pub fn enclosing_rect(points: &[Point<i32>]) -> Option<RotatedRect> {
    if points.is_empty() {
        return None;
    }
    let hull = convex_hull(points);
    let hull: Vec<(f64, f64)> = hull.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    min_area_rect(&hull)
}
