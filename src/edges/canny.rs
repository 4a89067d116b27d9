//! Canny edge detector: gradient, direction-aligned NMS, hysteresis.
//!
//! Thresholds are expressed in 8-bit intensity units (the input image is in
//! `[0, 1]` and magnitudes are rescaled by 255 before comparison), so the
//! familiar `100 / 200` pair behaves as expected.
//!
//! - NMS compares each pixel against its two neighbours along the quantized
//!   gradient direction (0°, 45°, 90°, 135°) and keeps strict maxima.
//! - Hysteresis seeds from pixels above `high` and grows through
//!   8-connected pixels above `low`.
//! - The outermost 1-pixel frame is never marked.
use super::grad::{image_gradients, GradientKernel};
use crate::filters::gaussian_blur;
use crate::image::{ImageF32, ImageView, Mask};

const TAN_22_5_DEG: f32 = 0.414_213_57;

#[derive(Clone, Copy, Debug)]
pub struct CannyParams {
    pub low: f32,
    pub high: f32,
    /// Gaussian pre-blur kernel size; values below 3 disable blurring.
    pub blur_ksize: usize,
    /// Sobel aperture (3, 5 or 7).
    pub aperture: usize,
    /// Use `sqrt(gx²+gy²)` instead of `|gx|+|gy|`.
    pub l2_gradient: bool,
}

impl Default for CannyParams {
    fn default() -> Self {
        Self {
            low: 100.0,
            high: 200.0,
            blur_ksize: 0,
            aperture: 3,
            l2_gradient: false,
        }
    }
}

/// Non-maximum suppression; returns the kept magnitude per pixel (0 elsewhere).
pub fn run_nms(gx: &ImageF32, gy: &ImageF32, mag: &ImageF32) -> ImageF32 {
    let (w, h) = mag.dims();
    let mut out = ImageF32::new(w, h);
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        let mag_prev = mag.row(y - 1);
        let mag_row = mag.row(y);
        let mag_next = mag.row(y + 1);
        let gx_row = gx.row(y);
        let gy_row = gy.row(y);

        for x in 1..w - 1 {
            let m = mag_row[x];
            if m <= 0.0 {
                continue;
            }
            let gxv = gx_row[x];
            let gyv = gy_row[x];
            let abs_gx = gxv.abs();
            let abs_gy = gyv.abs();
            let same_sign = (gxv >= 0.0 && gyv >= 0.0) || (gxv <= 0.0 && gyv <= 0.0);

            let (n1, n2) = if abs_gx >= abs_gy {
                if abs_gy <= abs_gx * TAN_22_5_DEG {
                    (mag_row[x - 1], mag_row[x + 1])
                } else if same_sign {
                    (mag_prev[x - 1], mag_next[x + 1])
                } else {
                    (mag_prev[x + 1], mag_next[x - 1])
                }
            } else if abs_gx <= abs_gy * TAN_22_5_DEG {
                (mag_prev[x], mag_next[x])
            } else if same_sign {
                (mag_prev[x - 1], mag_next[x + 1])
            } else {
                (mag_prev[x + 1], mag_next[x - 1])
            };

            // Ties on one side keep the pixel so flat-topped ridges stay connected.
            if m > n1 && m >= n2 {
                out.data[y * w + x] = m;
            }
        }
    }
    out
}

/// Double-threshold hysteresis over a suppressed magnitude map.
///
/// Seeds need a non-zero magnitude of at least `high`; growth continues
/// through neighbours strictly above `low`, so pixels removed by suppression
/// never join an edge even with `low = 0`.
pub fn hysteresis(suppressed: &ImageF32, low: f32, high: f32) -> Mask {
    let (w, h) = suppressed.dims();
    let mut edges = Mask::new(w, h);
    let mut stack = Vec::new();
    for (idx, &m) in suppressed.data.iter().enumerate() {
        if m > 0.0 && m >= high && edges.data[idx] == 0 {
            edges.data[idx] = 1;
            stack.push(idx);
            while let Some(i) = stack.pop() {
                let x = (i % w) as isize;
                let y = (i / w) as isize;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let (nx, ny) = (x + dx, y + dy);
                        if !suppressed.in_bounds(nx, ny) {
                            continue;
                        }
                        let ni = ny as usize * w + nx as usize;
                        if edges.data[ni] == 0 && suppressed.data[ni] > low {
                            edges.data[ni] = 1;
                            stack.push(ni);
                        }
                    }
                }
            }
        }
    }
    edges
}

/// Binary edge map (`1.0` on edges) of a `[0, 1]` grayscale image.
pub fn canny(l: &ImageF32, params: &CannyParams) -> ImageF32 {
    let blurred;
    let src = if params.blur_ksize >= 3 {
        blurred = gaussian_blur(l, params.blur_ksize);
        &blurred
    } else {
        l
    };
    let grad = image_gradients(src, GradientKernel::Sobel(params.aperture));
    let mag = if params.l2_gradient {
        grad.mag.map(|m| m * 255.0)
    } else {
        grad.gx.zip_map(&grad.gy, |a, b| (a.abs() + b.abs()) * 255.0)
    };
    let suppressed = run_nms(&grad.gx, &grad.gy, &mag);
    let (low, high) = if params.low <= params.high {
        (params.low, params.high)
    } else {
        (params.high, params.low)
    };
    ImageF32::from_mask(&hysteresis(&suppressed, low, high))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_image(size: usize, lo: usize, hi: usize) -> ImageF32 {
        ImageF32::from_fn(size, size, |x, y| {
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
                0.0
            } else {
                1.0
            }
        })
    }

    #[test]
    fn square_outline_is_detected() {
        let img = square_image(32, 8, 24);
        let edges = canny(&img, &CannyParams::default());
        let count = edges.count_above(0.5);
        assert!(count > 40, "expected an outline, got {count} edge pixels");
        assert_eq!(edges.get(16, 16), 0.0, "interior must stay empty");
    }

    #[test]
    fn flat_image_has_no_edges() {
        let img = ImageF32::filled(16, 16, 0.5);
        assert_eq!(canny(&img, &CannyParams::default()).count_above(0.0), 0);
    }

    #[test]
    fn hysteresis_extends_through_weak_pixels() {
        let mut m = ImageF32::new(5, 1);
        m.data = vec![0.0, 150.0, 250.0, 150.0, 50.0];
        let edges = hysteresis(&m, 100.0, 200.0);
        assert_eq!(edges.data, vec![0, 1, 1, 1, 0]);
    }

    #[test]
    fn zero_low_threshold_does_not_flood_suppressed_pixels() {
        let mut m = ImageF32::new(5, 1);
        m.data = vec![0.0, 0.0, 250.0, 0.0, 0.0];
        assert_eq!(hysteresis(&m, 0.0, 200.0).data, vec![0, 0, 1, 0, 0]);
    }

    #[test]
    fn zero_thresholds_keep_outline_thin() {
        let params = CannyParams {
            low: 0.0,
            ..CannyParams::default()
        };
        let edges = canny(&square_image(64, 16, 48), &params);
        let density = edges.count_above(0.5) as f32 / edges.len() as f32;
        assert!(density > 0.0 && density < 0.2, "edge density {density}");
        assert_eq!(edges.get(32, 32), 0.0);
        assert_eq!(edges.get(2, 2), 0.0);

        let flat = ImageF32::filled(64, 64, 0.5);
        let params = CannyParams {
            low: 0.0,
            high: 0.0,
            ..CannyParams::default()
        };
        assert_eq!(canny(&flat, &params).count_above(0.5), 0);
    }
}
