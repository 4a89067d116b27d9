//! Boundary tracing and polygon utilities.
//!
//! - Border following (outer boundaries and hole boundaries) and
//!   Douglas–Peucker simplification come from `imageproc`.
//! - Chaikin corner cutting smooths simplified polygons.
//! - Shoelace area, perimeter and circularity.
//!
//! Points are `[x, y]` pixel coordinates.
use crate::image::Mask;
use imageproc::contours::{find_contours as trace_borders, BorderType};
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    pub points: Vec<[f32; 2]>,
    /// Boundary of an enclosed background region rather than of a shape.
    pub is_hole: bool,
}

impl Contour {
    pub fn area(&self) -> f32 {
        polygon_area(&self.points)
    }

    pub fn perimeter(&self) -> f32 {
        path_length(&self.points, true)
    }

    /// `4πA / P²`: 1 for a disc, smaller for elongated or jagged shapes.
    pub fn circularity(&self) -> f32 {
        let perimeter = self.perimeter();
        if perimeter <= f32::EPSILON {
            return 0.0;
        }
        (4.0 * std::f32::consts::PI * self.area() / (perimeter * perimeter)).min(1.0)
    }
}

/// Outer boundaries of every 8-connected component of `mask`, plus the
/// boundaries of the holes they enclose.
pub fn find_contours(mask: &Mask) -> Vec<Contour> {
    if mask.w == 0 || mask.h == 0 {
        return Vec::new();
    }
    trace_borders::<i32>(&mask.to_luma8())
        .into_iter()
        .map(|c| Contour {
            points: c.points.iter().map(|p| [p.x as f32, p.y as f32]).collect(),
            is_hole: matches!(c.border_type, BorderType::Hole),
        })
        .collect()
}

/// Absolute polygon area by the shoelace formula.
pub fn polygon_area(points: &[[f32; 2]]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a[0] as f64 * b[1] as f64 - b[0] as f64 * a[1] as f64)
        .sum();
    (twice.abs() * 0.5) as f32
}

pub fn path_length(points: &[[f32; 2]], closed: bool) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    let open: f32 = points.windows(2).map(|p| dist(p[0], p[1])).sum();
    if closed {
        open + dist(points[points.len() - 1], points[0])
    } else {
        open
    }
}

#[inline]
fn dist(a: [f32; 2], b: [f32; 2]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// Douglas–Peucker simplification of a closed ring of traced (integral)
/// boundary points.
pub fn simplify_closed(points: &[[f32; 2]], epsilon: f32) -> Vec<[f32; 2]> {
    if points.len() < 4 || epsilon <= 0.0 {
        return points.to_vec();
    }
    let ring: Vec<Point<i32>> = points
        .iter()
        .map(|p| Point::new(p[0].round() as i32, p[1].round() as i32))
        .collect();
    approximate_polygon_dp(&ring, epsilon as f64, true)
        .into_iter()
        .map(|p| [p.x as f32, p.y as f32])
        .collect()
}

/// Chaikin corner cutting; each pass replaces every edge by its 1/4 and 3/4
/// points.
pub fn chaikin(points: &[[f32; 2]], iterations: usize, closed: bool) -> Vec<[f32; 2]> {
    let mut current = points.to_vec();
    for _ in 0..iterations {
        if current.len() < 3 {
            break;
        }
        let n = current.len();
        let edges = if closed { n } else { n - 1 };
        let mut next = Vec::with_capacity(edges * 2 + 2);
        if !closed {
            next.push(current[0]);
        }
        for i in 0..edges {
            let a = current[i];
            let b = current[(i + 1) % n];
            next.push([0.75 * a[0] + 0.25 * b[0], 0.75 * a[1] + 0.25 * b[1]]);
            next.push([0.25 * a[0] + 0.75 * b[0], 0.25 * a[1] + 0.75 * b[1]]);
        }
        if !closed {
            next.push(current[n - 1]);
        }
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(size: usize, lo: usize, hi: usize) -> Mask {
        let mut m = Mask::new(size, size);
        for y in lo..hi {
            for x in lo..hi {
                m.data[y * size + x] = 1;
            }
        }
        m
    }

    #[test]
    fn traces_square_outline() {
        let contours = find_contours(&square_mask(10, 2, 7));
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert!(!c.is_hole);
        assert_eq!(c.points.len(), 16);
        assert!(c.points.contains(&[2.0, 2.0]) && c.points.contains(&[6.0, 6.0]));
        assert!((c.area() - 16.0).abs() < 1e-4);
        assert!((c.perimeter() - 16.0).abs() < 1e-4);
    }

    #[test]
    fn ring_has_a_hole() {
        let mut m = square_mask(9, 1, 8);
        m.data[4 * 9 + 4] = 0;
        let contours = find_contours(&m);
        assert_eq!(contours.len(), 2);
        assert_eq!(contours.iter().filter(|c| c.is_hole).count(), 1);
    }

    #[test]
    fn simplification_keeps_square_corners() {
        let mut ring = Vec::new();
        for i in 0..8 {
            ring.push([i as f32, 0.0]);
        }
        for i in 0..8 {
            ring.push([8.0, i as f32]);
        }
        for i in 0..8 {
            ring.push([8.0 - i as f32, 8.0]);
        }
        for i in 0..8 {
            ring.push([0.0, 8.0 - i as f32]);
        }
        let simple = simplify_closed(&ring, 0.5);
        assert!(simple.len() <= 5, "{simple:?}");
        for corner in [[0.0, 0.0], [8.0, 0.0], [8.0, 8.0], [0.0, 8.0]] {
            assert!(simple.contains(&corner), "{simple:?}");
        }
        assert_eq!(simplify_closed(&ring, 0.0), ring);
    }

    #[test]
    fn chaikin_doubles_closed_vertices() {
        let sq = vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]];
        let smooth = chaikin(&sq, 1, true);
        assert_eq!(smooth.len(), 8);
        assert_eq!(smooth[0], [1.0, 0.0]);
        assert!(polygon_area(&smooth) < 16.0);
    }

    #[test]
    fn circle_is_rounder_than_bar() {
        let disc: Vec<[f32; 2]> = (0..64)
            .map(|i| {
                let t = i as f32 / 64.0 * std::f32::consts::TAU;
                [20.0 + 10.0 * t.cos(), 20.0 + 10.0 * t.sin()]
            })
            .collect();
        let bar = vec![[0.0, 0.0], [40.0, 0.0], [40.0, 2.0], [0.0, 2.0]];
        let disc = Contour {
            points: disc,
            is_hole: false,
        };
        let bar = Contour {
            points: bar,
            is_hole: false,
        };
        assert!(disc.circularity() > 0.95);
        assert!(bar.circularity() < 0.3);
    }
}
