//! Lightweight LSD-like line-segment extractor.
//!
//! Used by the stroke-type and geometric segmentation methods to find straight
//! stroke edges. The algorithm performs:
//!
//! - Sobel gradients, with per-pixel orientation folded modulo π.
//! - Region growing from the strongest seeds: 8-connected pixels whose
//!   orientation is within a tolerance of the seed's and whose magnitude
//!   clears the threshold join the region.
//! - PCA line fitting: the region's second moments are eigendecomposed and
//!   pixels are projected on the principal axis to obtain endpoints.
//! - Significance tests: minimum region size, minimum length, and a minimum
//!   fraction of pixels aligned within half the tolerance.
//!
//! Each pixel belongs to at most one accepted region, giving O(W·H)
//! behaviour plus a sort of the seed candidates.

mod extractor;
mod options;
mod segment;

pub use options::LsdOptions;
pub use segment::LineSegment;

use crate::image::ImageF32;

/// Extract line segments from a `[0, 1]` grayscale image.
pub fn lsd_extract_segments(l: &ImageF32, options: LsdOptions) -> Vec<LineSegment> {
    extractor::LsdExtractor::new(l, options).extract()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_image(width: usize, height: usize, split_x: usize) -> ImageF32 {
        ImageF32::from_fn(width, height, |x, _| if x < split_x { 0.0 } else { 1.0 })
    }

    #[test]
    fn finds_vertical_segment() {
        let img = step_image(32, 32, 16);
        let segs = lsd_extract_segments(&img, LsdOptions::default());
        assert!(!segs.is_empty(), "expected a segment on a vertical edge");
        let longest = segs
            .iter()
            .max_by(|a, b| a.length().total_cmp(&b.length()))
            .unwrap();
        let theta = longest.orientation_deg();
        assert!((theta - 90.0).abs() < 5.0, "orientation {theta}");
        assert!(longest.length() >= 20.0, "length {}", longest.length());
        assert!(longest.thickness_ratio < 0.2);
    }

    #[test]
    fn rejects_flat_image() {
        let img = ImageF32::new(16, 16);
        assert!(lsd_extract_segments(&img, LsdOptions::default()).is_empty());
    }

    #[test]
    fn horizontal_bar_gives_horizontal_edges() {
        let img = ImageF32::from_fn(40, 20, |_, y| if (8..12).contains(&y) { 0.0 } else { 1.0 });
        let segs = lsd_extract_segments(&img, LsdOptions::default());
        assert!(segs.len() >= 2);
        for s in &segs {
            let theta = s.orientation_deg();
            assert!(theta < 5.0 || theta > 175.0, "orientation {theta}");
        }
    }
}
