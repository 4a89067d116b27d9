use super::options::LsdOptions;
use super::segment::LineSegment;
use crate::angle::{angular_difference, normalize_half_pi};
use crate::edges::{sobel_gradients, Grad};
use crate::image::{ImageF32, ImageView};
use crate::regions::Connectivity;
use nalgebra::{Matrix2, SymmetricEigen, Vector2};

/// Pixels grown from one seed plus the tallies the significance tests need.
#[derive(Default)]
struct GrownRegion {
    pixels: Vec<usize>,
    aligned: usize,
    magnitude: f32,
}

impl GrownRegion {
    fn clear(&mut self) {
        self.pixels.clear();
        self.aligned = 0;
        self.magnitude = 0.0;
    }

    fn add(&mut self, idx: usize, magnitude: f32, aligned: bool) {
        self.pixels.push(idx);
        self.aligned += usize::from(aligned);
        self.magnitude += magnitude;
    }

    fn aligned_fraction(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        self.aligned as f32 / self.pixels.len() as f32
    }

    fn mean_magnitude(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        self.magnitude / self.pixels.len() as f32
    }
}

pub(super) struct LsdExtractor {
    grad: Grad,
    width: usize,
    height: usize,
    options: LsdOptions,
    angle_tol: f32,
    used: Vec<bool>,
    angles: Vec<f32>,
    stack: Vec<usize>,
    region: GrownRegion,
    segments: Vec<LineSegment>,
}

impl LsdExtractor {
    pub(super) fn new(l: &ImageF32, options: LsdOptions) -> Self {
        let grad = sobel_gradients(l);
        let n = l.w * l.h;
        let angles = (0..n).map(|idx| normalize_half_pi(grad.angle_at(idx))).collect();
        Self {
            grad,
            width: l.w,
            height: l.h,
            angle_tol: options.angle_tolerance_deg.to_radians(),
            options,
            used: vec![false; n],
            angles,
            stack: Vec::with_capacity(64),
            region: GrownRegion::default(),
            segments: Vec::new(),
        }
    }

    pub(super) fn extract(mut self) -> Vec<LineSegment> {
        // Strongest seeds first so regions start on the crest of an edge.
        let mut seeds: Vec<usize> = (0..self.width * self.height)
            .filter(|&idx| self.grad.mag.data[idx] >= self.options.magnitude_threshold)
            .collect();
        seeds.sort_by(|&a, &b| {
            self.grad.mag.data[b]
                .total_cmp(&self.grad.mag.data[a])
                .then(a.cmp(&b))
        });
        for idx in seeds {
            self.process_seed(idx);
        }
        self.segments
    }

    fn process_seed(&mut self, idx: usize) {
        if self.used[idx] {
            return;
        }
        self.region.clear();
        self.stack.clear();

        let seed_angle = self.angles[idx];
        self.used[idx] = true;
        self.stack.push(idx);
        self.grow_region(seed_angle);

        if let Some(segment) = self.build_segment() {
            self.segments.push(segment);
        } else {
            for &pixel in &self.region.pixels {
                self.used[pixel] = false;
            }
            // The seed itself stays consumed so it is not retried.
            self.used[idx] = true;
        }
    }

    fn grow_region(&mut self, seed_angle: f32) {
        while let Some(idx) = self.stack.pop() {
            let (x, y) = (idx % self.width, idx / self.width);
            let aligned = angular_difference(self.angles[idx], seed_angle) <= self.angle_tol * 0.5;
            self.region.add(idx, self.grad.mag.get(x, y), aligned);

            for &(dx, dy) in Connectivity::Eight.offsets() {
                let (xn, yn) = (x as isize + dx, y as isize + dy);
                if !self.grad.mag.in_bounds(xn, yn) {
                    continue;
                }
                let nidx = yn as usize * self.width + xn as usize;
                if self.used[nidx] || self.grad.mag.data[nidx] < self.options.magnitude_threshold {
                    continue;
                }
                if angular_difference(self.angles[nidx], seed_angle) <= self.angle_tol {
                    self.used[nidx] = true;
                    self.stack.push(nidx);
                }
            }
        }
    }

    fn point(&self, idx: usize) -> Vector2<f32> {
        Vector2::new((idx % self.width) as f32, (idx / self.width) as f32)
    }

    /// Fit a segment to the grown region: principal axis of the pixel
    /// covariance, endpoints from the extreme projections on that axis.
    fn build_segment(&self) -> Option<LineSegment> {
        let pixels = &self.region.pixels;
        if pixels.len() < self.options.min_region_px.max(2) {
            return None;
        }
        if self.region.aligned_fraction() < self.options.min_aligned_fraction {
            return None;
        }

        let count = pixels.len() as f32;
        let centroid = pixels
            .iter()
            .fold(Vector2::zeros(), |acc: Vector2<f32>, &idx| acc + self.point(idx))
            / count;
        let covariance = pixels.iter().fold(Matrix2::zeros(), |acc: Matrix2<f32>, &idx| {
            let d = self.point(idx) - centroid;
            acc + d * d.transpose()
        }) / count;
        let eig = SymmetricEigen::new(covariance);
        let major = if eig.eigenvalues[0] >= eig.eigenvalues[1] { 0 } else { 1 };
        let lambda_max = eig.eigenvalues[major];
        if !lambda_max.is_finite() || lambda_max <= 0.0 {
            return None;
        }
        let axis: Vector2<f32> = eig.eigenvectors.column(major).into_owned();
        let norm = axis.norm();
        if !norm.is_finite() || norm < 1e-6 {
            return None;
        }
        let tangent = axis / norm;
        let normal = Vector2::new(-tangent.y, tangent.x);

        let (mut along_min, mut along_max) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut across_min, mut across_max) = (f32::INFINITY, f32::NEG_INFINITY);
        for &idx in pixels {
            let d = self.point(idx) - centroid;
            let (along, across) = (d.dot(&tangent), d.dot(&normal));
            along_min = along_min.min(along);
            along_max = along_max.max(along);
            across_min = across_min.min(across);
            across_max = across_max.max(across);
        }

        let len = along_max - along_min;
        if !len.is_finite() || len < self.options.min_length_px {
            return None;
        }
        let p0 = centroid + tangent * along_min;
        let p1 = centroid + tangent * along_max;
        Some(LineSegment {
            p0: [p0.x, p0.y],
            p1: [p1.x, p1.y],
            avg_mag: self.region.mean_magnitude(),
            thickness_ratio: (across_max - across_min) / len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_region_fits_its_principal_axis() {
        let img = ImageF32::new(12, 12);
        let mut extractor = LsdExtractor::new(&img, LsdOptions::default());
        for i in 1..11 {
            extractor.region.add(i * 12 + i, 1.0, true);
        }
        let seg = extractor.build_segment().unwrap();
        assert!((seg.orientation_deg() - 45.0).abs() < 1.0, "{}", seg.orientation_deg());
        assert!((seg.length() - 9.0 * 2f32.sqrt()).abs() < 1e-3);
        assert!(seg.thickness_ratio < 1e-3);
        assert_eq!(seg.avg_mag, 1.0);
    }

    #[test]
    fn poorly_aligned_region_is_rejected() {
        let img = ImageF32::new(16, 4);
        let mut extractor = LsdExtractor::new(&img, LsdOptions::default());
        for x in 0..16 {
            extractor.region.add(16 + x, 1.0, x % 2 == 0);
        }
        assert!(extractor.build_segment().is_none());
    }
}
