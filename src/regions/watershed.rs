//! Marker-based watershed by priority flooding.
//!
//! Pixels are flooded from the markers in order of increasing elevation;
//! each pixel takes the label of the neighbour that reached it first. Ties in
//! elevation resolve by insertion order, so the flood is deterministic.
use super::labeling::{label_components, Connectivity, Labels};
use crate::image::{ImageF32, ImageView, ImageViewMut, Mask};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Elevation quantization steps per unit; keeps heap keys integral.
const LEVELS: f32 = 4096.0;

/// Flood `markers` over `elevation` within `mask`. Pixels outside the mask
/// stay 0; mask pixels unreachable from any marker also stay 0.
pub fn watershed(elevation: &ImageF32, markers: &Labels, mask: &Mask) -> Labels {
    let (w, h) = (elevation.w, elevation.h);
    let mut out = markers.clone();
    for (label, &m) in out.data.iter_mut().zip(mask.data.iter()) {
        if m == 0 {
            *label = 0;
        }
    }

    let key = |idx: usize| -> i64 { (elevation.data[idx] * LEVELS).round() as i64 };
    let mut heap = BinaryHeap::new();
    let mut counter = 0u64;
    let mut queued = vec![false; w * h];

    for idx in 0..w * h {
        if out.data[idx] != 0 {
            queued[idx] = true;
            heap.push(Reverse((key(idx), counter, idx)));
            counter += 1;
        }
    }

    while let Some(Reverse((_, _, idx))) = heap.pop() {
        let label = out.data[idx];
        let (x, y) = ((idx % w) as isize, (idx / w) as isize);
        for &(dx, dy) in Connectivity::Four.offsets() {
            let (nx, ny) = (x + dx, y + dy);
            if !mask.is_set_signed(nx, ny) {
                continue;
            }
            let nidx = ny as usize * w + nx as usize;
            if queued[nidx] {
                continue;
            }
            queued[nidx] = true;
            out.data[nidx] = label;
            heap.push(Reverse((key(nidx), counter, nidx)));
            counter += 1;
        }
    }
    out
}

/// Maximum over the `(2 * radius + 1)`-square around each pixel, clipped to
/// the image; rows then columns.
fn window_max(img: &ImageF32, radius: usize) -> ImageF32 {
    let (w, h) = img.dims();
    let mut rows = ImageF32::new(w, h);
    for y in 0..h {
        let src = img.row(y);
        for (x, out) in rows.row_mut(y).iter_mut().enumerate() {
            let hi = (x + radius).min(w - 1);
            let lo = x.saturating_sub(radius);
            *out = src[lo..=hi].iter().copied().fold(f32::NEG_INFINITY, f32::max);
        }
    }
    let mut out = ImageF32::new(w, h);
    for y in 0..h {
        let hi = (y + radius).min(h - 1);
        for x in 0..w {
            let best = (y.saturating_sub(radius)..=hi)
                .map(|yy| rows.get(x, yy))
                .fold(f32::NEG_INFINITY, f32::max);
            out.set(x, y, best);
        }
    }
    out
}

/// Plateaus of regional maxima of `img` inside `mask`, one marker each.
///
/// A pixel is a peak when it equals the maximum over the
/// `(2 * min_distance + 1)`-square around it and exceeds `floor`.
pub fn peak_markers(img: &ImageF32, mask: &Mask, min_distance: usize, floor: f32) -> Labels {
    if img.is_empty() {
        return Labels::empty(img.w, img.h);
    }
    let local_max = window_max(img, min_distance);
    let peaks = Mask {
        w: img.w,
        h: img.h,
        data: img
            .data
            .iter()
            .zip(local_max.data.iter())
            .zip(mask.data.iter())
            .map(|((&v, &d), &m)| u8::from(m != 0 && v > floor && v >= d))
            .collect(),
    };
    label_components(&peaks, Connectivity::Eight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::distance::{distance_transform, DistanceMetric};

    /// Two squares joined by a thin bridge.
    fn dumbbell() -> Mask {
        let mut m = Mask::new(23, 9);
        for y in 0..9 {
            for x in 0..9 {
                m.data[y * 23 + x] = 1;
                m.data[y * 23 + x + 14] = 1;
            }
        }
        for x in 9..14 {
            m.data[4 * 23 + x] = 1;
        }
        m
    }

    #[test]
    fn splits_dumbbell_into_two_basins() {
        let mask = dumbbell();
        let dist = distance_transform(&mask, DistanceMetric::Euclidean);
        let markers = peak_markers(&dist, &mask, 3, 1.0);
        assert_eq!(markers.count, 2);
        let elevation = dist.map(|d| -d);
        let labels = watershed(&elevation, &markers, &mask);
        assert_ne!(labels.at(4, 4), labels.at(18, 4));
        assert_ne!(labels.at(4, 4), 0);
        for (l, &m) in labels.data.iter().zip(mask.data.iter()) {
            assert_eq!(*l != 0, m != 0);
        }
    }

    #[test]
    fn window_max_spreads_a_single_peak() {
        let mut img = ImageF32::new(7, 5);
        img.set(3, 2, 2.5);
        let spread = window_max(&img, 1);
        assert_eq!(spread.count_above(1.0), 9);
        assert_eq!(spread.get(2, 1), 2.5);
        assert_eq!(spread.get(5, 2), 0.0);
    }

    #[test]
    fn no_markers_leaves_everything_unlabeled() {
        let mask = dumbbell();
        let markers = Labels::empty(mask.w, mask.h);
        let labels = watershed(&ImageF32::new(mask.w, mask.h), &markers, &mask);
        assert!(labels.data.iter().all(|&l| l == 0));
    }
}
