#![allow(dead_code)]

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

pub const TABLE: Rgb<u8> = Rgb([30, 30, 30]);
pub const PAPER: Rgb<u8> = Rgb([240, 240, 240]);
pub const INK: Rgb<u8> = Rgb([40, 40, 40]);

/// A table-colored frame with an upright sheet covering `size` pixels
/// from `origin`
pub fn sheet_on_table(frame: (u32, u32), origin: (i32, i32), size: (u32, u32)) -> RgbImage {
    let mut img = RgbImage::from_pixel(frame.0, frame.1, TABLE);
    draw_filled_rect_mut(&mut img, Rect::at(origin.0, origin.1).of_size(size.0, size.1), PAPER);
    img
}

/// Corners of a `width` x `height` rectangle centered on `center` and
/// rotated by `degrees`, rounded to the pixel grid
pub fn rotated_corners(center: (f64, f64), width: f64, height: f64, degrees: f64) -> [Point<i32>; 4] {
    let (s, c) = degrees.to_radians().sin_cos();
    let half = [
        (-width / 2.0, -height / 2.0),
        (width / 2.0, -height / 2.0),
        (width / 2.0, height / 2.0),
        (-width / 2.0, height / 2.0),
    ];
    half.map(|(x, y)| {
        Point::new(
            (center.0 + x * c - y * s).round() as i32,
            (center.1 + x * s + y * c).round() as i32,
        )
    })
}

/// Fill a rotated rectangle
pub fn draw_rotated_rect(
    img: &mut RgbImage,
    center: (f64, f64),
    width: f64,
    height: f64,
    degrees: f64,
    color: Rgb<u8>,
) {
    draw_polygon_mut(img, &rotated_corners(center, width, height, degrees), color);
}
