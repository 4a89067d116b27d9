//! Separable linear filters and resampling.
//!
//! - Convolution with a pair of 1D kernels (horizontal then vertical) and
//!   replicate-border handling via index clamping.
//! - Gaussian kernels sized like the usual `ksize`/`sigma` convention
//!   (`sigma = 0.3 * ((ksize - 1) * 0.5 - 1) + 0.8` when not given).
//! - Bilinear resize with pixel-centre alignment, used by the multi-scale
//!   edge detector to move between scales.
use crate::image::{ImageF32, ImageView, ImageViewMut};

/// Trait implemented by separable 1D filters.
pub trait SeparableFilter {
    /// The 1D taps in left-to-right order, centred on the middle tap.
    fn taps(&self) -> &[f32];
}

/// Simple wrapper around a static filter kernel.
#[derive(Clone, Copy, Debug)]
pub struct StaticSeparableFilter {
    taps: &'static [f32],
}

impl StaticSeparableFilter {
    pub const fn new(taps: &'static [f32]) -> Self {
        Self { taps }
    }
}

impl SeparableFilter for StaticSeparableFilter {
    #[inline]
    fn taps(&self) -> &[f32] {
        self.taps
    }
}

impl SeparableFilter for Vec<f32> {
    #[inline]
    fn taps(&self) -> &[f32] {
        self
    }
}

/// Normalised 5-tap Gaussian filter `[1, 4, 6, 4, 1] / 16`.
pub const GAUSSIAN_5TAP: StaticSeparableFilter =
    StaticSeparableFilter::new(&[0.0625, 0.25, 0.375, 0.25, 0.0625]);

/// Normalised Gaussian taps for an odd `ksize`. `sigma <= 0` derives sigma from
/// the kernel size.
pub fn gaussian_taps(ksize: usize, sigma: f32) -> Vec<f32> {
    let ksize = if ksize % 2 == 0 { ksize + 1 } else { ksize.max(1) };
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let radius = (ksize / 2) as isize;
    let denom = 2.0 * sigma * sigma;
    let mut taps: Vec<f32> = (-radius..=radius)
        .map(|i| (-(i * i) as f32 / denom).exp())
        .collect();
    let sum: f32 = taps.iter().sum();
    for t in &mut taps {
        *t /= sum;
    }
    taps
}

#[inline]
pub(crate) fn clamp_index(idx: isize, upper: usize) -> usize {
    if upper == 0 || idx < 0 {
        0
    } else if (idx as usize) >= upper {
        upper - 1
    } else {
        idx as usize
    }
}

/// Convolve with `kx` along rows and `ky` along columns.
pub fn convolve_separable(img: &ImageF32, kx: &[f32], ky: &[f32]) -> ImageF32 {
    let (w, h) = img.dims();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let rx = (kx.len() / 2) as isize;
    let ry = (ky.len() / 2) as isize;

    let mut tmp = ImageF32::new(w, h);
    for y in 0..h {
        let src = img.row(y);
        let dst = tmp.row_mut(y);
        for (x, out) in dst.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for (k, &tap) in kx.iter().enumerate() {
                let sx = clamp_index(x as isize + k as isize - rx, w);
                acc += tap * src[sx];
            }
            *out = acc;
        }
    }

    let mut out = ImageF32::new(w, h);
    for y in 0..h {
        let rows: Vec<&[f32]> = (0..ky.len())
            .map(|k| tmp.row(clamp_index(y as isize + k as isize - ry, h)))
            .collect();
        let dst = out.row_mut(y);
        for (x, px) in dst.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for (row, &tap) in rows.iter().zip(ky.iter()) {
                acc += tap * row[x];
            }
            *px = acc;
        }
    }
    out
}

/// Apply a symmetric separable filter in both directions.
pub fn apply<F: SeparableFilter + ?Sized>(filter: &F, img: &ImageF32) -> ImageF32 {
    let taps = filter.taps();
    convolve_separable(img, taps, taps)
}

/// Gaussian blur; `ksize < 3` is a no-op.
pub fn gaussian_blur(img: &ImageF32, ksize: usize) -> ImageF32 {
    if ksize < 3 {
        return img.clone();
    }
    let taps = gaussian_taps(ksize, 0.0);
    apply(&taps, img)
}

/// Bilinear resample to `nw × nh`.
pub fn resize_bilinear(img: &ImageF32, nw: usize, nh: usize) -> ImageF32 {
    if nw == img.w && nh == img.h {
        return img.clone();
    }
    let mut out = ImageF32::new(nw, nh);
    if img.w == 0 || img.h == 0 || nw == 0 || nh == 0 {
        return out;
    }
    let sx = img.w as f32 / nw as f32;
    let sy = img.h as f32 / nh as f32;
    for y in 0..nh {
        let fy = ((y as f32 + 0.5) * sy - 0.5).max(0.0);
        let y0 = (fy.floor() as usize).min(img.h - 1);
        let y1 = (y0 + 1).min(img.h - 1);
        let ty = fy - y0 as f32;
        let row0 = img.row(y0);
        let row1 = img.row(y1);
        let dst = out.row_mut(y);
        for (x, px) in dst.iter_mut().enumerate() {
            let fx = ((x as f32 + 0.5) * sx - 0.5).max(0.0);
            let x0 = (fx.floor() as usize).min(img.w - 1);
            let x1 = (x0 + 1).min(img.w - 1);
            let tx = fx - x0 as f32;
            let top = row0[x0] * (1.0 - tx) + row0[x1] * tx;
            let bottom = row1[x0] * (1.0 - tx) + row1[x1] * tx;
            *px = top * (1.0 - ty) + bottom * ty;
        }
    }
    out
}

/// Resize by a uniform factor, rounding dimensions and keeping at least one pixel.
pub fn rescale(img: &ImageF32, factor: f32) -> ImageF32 {
    if (factor - 1.0).abs() < f32::EPSILON {
        return img.clone();
    }
    let nw = ((img.w as f32 * factor).round() as usize).max(1);
    let nh = ((img.h as f32 * factor).round() as usize).max(1);
    resize_bilinear(img, nw, nh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_taps_are_normalised_and_symmetric() {
        let taps = gaussian_taps(5, 0.0);
        assert_eq!(taps.len(), 5);
        assert!((taps.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((taps[0] - taps[4]).abs() < 1e-7);
        assert!(taps[2] > taps[1]);
    }

    #[test]
    fn blur_preserves_constant_image() {
        let img = ImageF32::filled(9, 7, 0.4);
        let out = gaussian_blur(&img, 5);
        assert!(out.data.iter().all(|&v| (v - 0.4).abs() < 1e-5));
    }

    #[test]
    fn resize_identity_is_exact() {
        let img = ImageF32::from_fn(5, 4, |x, y| (x * y) as f32);
        assert_eq!(resize_bilinear(&img, 5, 4), img);
        assert_eq!(rescale(&img, 1.0), img);
    }

    #[test]
    fn rescale_changes_dimensions() {
        let img = ImageF32::new(10, 6);
        let half = rescale(&img, 0.5);
        assert_eq!(half.dims(), (5, 3));
        let up = rescale(&img, 1.5);
        assert_eq!(up.dims(), (15, 9));
    }
}
