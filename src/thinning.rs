//! Skeletons of binary shapes and the paths running along them.
//!
//! - `zhang_suen`: the classical two-subiteration thinning; result is an
//!   8-connected, one-pixel-wide centreline.
//! - `medial_axis`: ridge pixels of the Euclidean distance transform, thinned
//!   to one pixel, paired with the distance map.
//! - `trace_paths`: decompose a skeleton into polylines, walking from
//!   endpoints first and then around remaining loops.
use crate::image::{ImageF32, Mask};
use crate::regions::{distance_transform, DistanceMetric};

/// Neighbours P2..P9, clockwise from north.
const RING: [(isize, isize); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

fn ring_values(mask: &Mask, x: usize, y: usize) -> [bool; 8] {
    let mut out = [false; 8];
    for (slot, &(dx, dy)) in out.iter_mut().zip(RING.iter()) {
        *slot = mask.is_set_signed(x as isize + dx, y as isize + dy);
    }
    out
}

pub fn zhang_suen(mask: &Mask) -> Mask {
    let mut img = mask.clone();
    let (w, h) = (mask.w, mask.h);
    let mut remove = Vec::new();
    loop {
        let mut changed = false;
        for pass in 0..2 {
            remove.clear();
            for y in 0..h {
                for x in 0..w {
                    if !img.is_set(x, y) {
                        continue;
                    }
                    let p = ring_values(&img, x, y);
                    let b = p.iter().filter(|&&v| v).count();
                    if !(2..=6).contains(&b) {
                        continue;
                    }
                    let a = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
                    if a != 1 {
                        continue;
                    }
                    // p[0]=P2 (N), p[2]=P4 (E), p[4]=P6 (S), p[6]=P8 (W)
                    let keep = if pass == 0 {
                        (p[0] && p[2] && p[4]) || (p[2] && p[4] && p[6])
                    } else {
                        (p[0] && p[2] && p[6]) || (p[0] && p[4] && p[6])
                    };
                    if !keep {
                        remove.push(y * w + x);
                    }
                }
            }
            if !remove.is_empty() {
                changed = true;
                for &idx in &remove {
                    img.data[idx] = 0;
                }
            }
        }
        if !changed {
            break;
        }
    }
    img
}

/// Medial axis and the Euclidean distance map it was extracted from.
pub fn medial_axis(mask: &Mask) -> (Mask, ImageF32) {
    let dist = distance_transform(mask, DistanceMetric::Euclidean);
    let (w, h) = (mask.w, mask.h);
    let mut ridge = Mask::new(w, h);
    let at = |x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0.0
        } else {
            dist.data[y as usize * w + x as usize]
        }
    };
    for y in 0..h {
        for x in 0..w {
            let d = dist.data[y * w + x];
            if d <= 0.0 {
                continue;
            }
            let (xi, yi) = (x as isize, y as isize);
            let horizontal = d >= at(xi - 1, yi) && d >= at(xi + 1, yi);
            let vertical = d >= at(xi, yi - 1) && d >= at(xi, yi + 1);
            let diag_a = d >= at(xi - 1, yi - 1) && d >= at(xi + 1, yi + 1);
            let diag_b = d >= at(xi + 1, yi - 1) && d >= at(xi - 1, yi + 1);
            if horizontal || vertical || diag_a || diag_b {
                ridge.data[y * w + x] = 1;
            }
        }
    }
    (zhang_suen(&ridge), dist)
}

fn neighbours(mask: &Mask, idx: usize) -> impl Iterator<Item = usize> + '_ {
    let (x, y) = ((idx % mask.w) as isize, (idx / mask.w) as isize);
    RING.iter().filter_map(move |&(dx, dy)| {
        let (nx, ny) = (x + dx, y + dy);
        mask.is_set_signed(nx, ny).then(|| ny as usize * mask.w + nx as usize)
    })
}

/// Split a skeleton into polylines. Paths start at endpoints (one
/// neighbour); leftover closed loops start at their first pixel in raster
/// order. Isolated pixels become single-point paths.
pub fn trace_paths(skeleton: &Mask) -> Vec<Vec<[f32; 2]>> {
    let w = skeleton.w;
    let mut visited = vec![false; skeleton.data.len()];
    let mut paths = Vec::new();
    let to_point = |idx: usize| [(idx % w) as f32, (idx / w) as f32];

    let degree = |idx: usize| neighbours(skeleton, idx).count();
    let endpoints: Vec<usize> = (0..skeleton.data.len())
        .filter(|&i| skeleton.data[i] != 0 && degree(i) <= 1)
        .collect();
    let loops: Vec<usize> = (0..skeleton.data.len())
        .filter(|&i| skeleton.data[i] != 0)
        .collect();

    for start in endpoints.into_iter().chain(loops) {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut path = vec![to_point(start)];
        let mut cur = start;
        loop {
            let next = neighbours(skeleton, cur).find(|&n| !visited[n]);
            let Some(n) = next else { break };
            visited[n] = true;
            path.push(to_point(n));
            cur = n;
        }
        paths.push(path);
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(w: usize, h: usize, y0: usize, y1: usize, x0: usize, x1: usize) -> Mask {
        let mut m = Mask::new(w, h);
        for y in y0..y1 {
            for x in x0..x1 {
                m.data[y * w + x] = 1;
            }
        }
        m
    }

    #[test]
    fn thick_bar_thins_to_single_line() {
        let skel = zhang_suen(&bar(30, 11, 3, 8, 2, 28));
        assert!(skel.count() > 10);
        for x in 8..22 {
            let column = (0..11).filter(|&y| skel.is_set(x, y)).count();
            assert!(column <= 1, "column {x} has {column} pixels");
        }
    }

    #[test]
    fn thinning_keeps_connectivity() {
        let skel = zhang_suen(&bar(30, 11, 3, 8, 2, 28));
        let labels = crate::regions::label_components(&skel, crate::regions::Connectivity::Eight);
        assert_eq!(labels.count, 1);
    }

    #[test]
    fn medial_axis_runs_along_bar_centre() {
        let (axis, dist) = medial_axis(&bar(30, 11, 3, 8, 2, 28));
        assert!(axis.is_set(15, 5));
        assert!((dist.data[5 * 30 + 15] - 3.0).abs() < 1e-5);
    }

    #[test]
    fn straight_skeleton_is_one_path() {
        let skel = bar(10, 3, 1, 2, 1, 9);
        let paths = trace_paths(&skel);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), 8);
        assert_eq!(paths[0][0], [1.0, 1.0]);
    }
}
