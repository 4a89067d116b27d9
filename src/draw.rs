//! Rasterization onto `ImageF32` canvases through `imageproc::drawing`.
//!
//! The canvas is lent to `imageproc` as a `Luma<f32>` buffer without copying.
//! Shapes overwrite the pixels they cover and anything outside the canvas is
//! clipped. Thick lines are a filled quad between two round caps.
use crate::image::ImageF32;
use image::{ImageBuffer, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

type Canvas = ImageBuffer<Luma<f32>, Vec<f32>>;

fn with_canvas(img: &mut ImageF32, paint: impl FnOnce(&mut Canvas)) {
    if img.is_empty() || img.data.len() != img.w * img.h {
        return;
    }
    let data = std::mem::take(&mut img.data);
    let Some(mut canvas) = Canvas::from_raw(img.w as u32, img.h as u32, data) else {
        return;
    };
    paint(&mut canvas);
    img.data = canvas.into_raw();
}

#[inline]
fn pixel(p: [f32; 2]) -> Point<i32> {
    Point::new(p[0].round() as i32, p[1].round() as i32)
}

/// Corners in order with consecutive repeats (and a closing repeat) removed;
/// `draw_polygon_mut` rejects a ring whose first and last points coincide.
fn ring(points: &[[f32; 2]]) -> Vec<Point<i32>> {
    let mut out: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &p in points {
        let q = pixel(p);
        if out.last() != Some(&q) {
            out.push(q);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

pub fn draw_disk(img: &mut ImageF32, centre: [f32; 2], radius: f32, value: f32) {
    let c = pixel(centre);
    let r = radius.round().max(0.0) as i32;
    with_canvas(img, |canvas| draw_filled_circle_mut(canvas, (c.x, c.y), r, Luma([value])));
}

/// One-pixel line.
pub fn draw_line(img: &mut ImageF32, p0: [f32; 2], p1: [f32; 2], value: f32) {
    with_canvas(img, |canvas| {
        draw_line_segment_mut(canvas, (p0[0], p0[1]), (p1[0], p1[1]), Luma([value]))
    });
}

/// Line of the given width with round caps.
pub fn draw_thick_line(img: &mut ImageF32, p0: [f32; 2], p1: [f32; 2], width: f32, value: f32) {
    if width <= 1.5 {
        draw_line(img, p0, p1, value);
        return;
    }
    let half = width * 0.5;
    let (dx, dy) = (p1[0] - p0[0], p1[1] - p0[1]);
    let len = (dx * dx + dy * dy).sqrt();
    if len >= 0.5 {
        let (nx, ny) = (-dy / len * half, dx / len * half);
        let quad = ring(&[
            [p0[0] + nx, p0[1] + ny],
            [p1[0] + nx, p1[1] + ny],
            [p1[0] - nx, p1[1] - ny],
            [p0[0] - nx, p0[1] - ny],
        ]);
        if quad.len() >= 3 {
            with_canvas(img, |canvas| draw_polygon_mut(canvas, &quad, Luma([value])));
        }
    }
    draw_disk(img, p0, half, value);
    draw_disk(img, p1, half, value);
}

pub fn draw_polyline(img: &mut ImageF32, points: &[[f32; 2]], closed: bool, width: f32, value: f32) {
    match points.len() {
        0 => {}
        1 => draw_disk(img, points[0], width * 0.5, value),
        n => {
            for pair in points.windows(2) {
                draw_thick_line(img, pair[0], pair[1], width, value);
            }
            if closed && n > 2 {
                draw_thick_line(img, points[n - 1], points[0], width, value);
            }
        }
    }
}

/// Fill the polygon, boundary included.
pub fn fill_polygon(img: &mut ImageF32, points: &[[f32; 2]], value: f32) {
    let corners = ring(points);
    if corners.len() < 3 {
        draw_polyline(img, points, false, 1.0, value);
        return;
    }
    with_canvas(img, |canvas| draw_polygon_mut(canvas, &corners, Luma([value])));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_reaches_both_endpoints() {
        let mut img = ImageF32::new(10, 10);
        draw_line(&mut img, [1.0, 1.0], [8.0, 5.0], 1.0);
        assert_eq!(img.data[11], 1.0);
        assert_eq!(img.data[5 * 10 + 8], 1.0);
        assert_eq!(img.count_above(0.5), 8);
    }

    #[test]
    fn thick_line_is_wider() {
        let mut thin = ImageF32::new(20, 20);
        let mut thick = ImageF32::new(20, 20);
        draw_thick_line(&mut thin, [2.0, 10.0], [17.0, 10.0], 1.0, 1.0);
        draw_thick_line(&mut thick, [2.0, 10.0], [17.0, 10.0], 5.0, 1.0);
        assert!(thick.count_above(0.5) > 3 * thin.count_above(0.5));
        assert_eq!(thick.data[8 * 20 + 10], 1.0);
        assert_eq!(thick.data[14 * 20 + 10], 0.0);
    }

    #[test]
    fn polygon_fill_covers_interior() {
        let mut img = ImageF32::new(12, 12);
        fill_polygon(&mut img, &[[2.0, 2.0], [9.0, 2.0], [9.0, 9.0], [2.0, 9.0], [2.0, 2.0]], 0.5);
        assert_eq!(img.count_above(0.25), 64);
        assert_eq!(img.data[0], 0.0);
    }

    #[test]
    fn shapes_clip_at_the_border() {
        let mut img = ImageF32::new(8, 8);
        draw_disk(&mut img, [0.0, 0.0], 3.0, 1.0);
        draw_thick_line(&mut img, [-5.0, 7.0], [20.0, 7.0], 3.0, 1.0);
        assert_eq!(img.len(), 64);
        assert_eq!(img.data[0], 1.0);
        assert_eq!(img.data[7 * 8 + 4], 1.0);
    }
}
