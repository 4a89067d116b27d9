//! Owned single-channel f32 image in row-major layout.
//!
//! This is the working buffer of every numeric transform in the crate. Values
//! are conventionally kept in `[0, 1]`; `to_gray_raster` maps them to 8-bit
//! samples on the way out.
use super::mask::Mask;
use super::raster::Raster;
use super::traits::{ImageView, ImageViewMut};
use image::{GrayImage, Luma};

#[derive(Clone, Debug, PartialEq)]
pub struct ImageF32 {
    /// Image width in pixels
    pub w: usize,
    /// Image height in pixels
    pub h: usize,
    /// Backing storage in row-major order, `w * h` samples
    pub data: Vec<f32>,
}

impl ImageF32 {
    /// Construct a zero-initialized buffer of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self::filled(w, h, 0.0)
    }

    pub fn filled(w: usize, h: usize, value: f32) -> Self {
        Self {
            w,
            h,
            data: vec![value; w * h],
        }
    }

    pub fn from_fn(w: usize, h: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                data.push(f(x, y));
            }
        }
        Self { w, h, data }
    }

    /// 1.0 where the mask is set, 0.0 elsewhere.
    pub fn from_mask(mask: &Mask) -> Self {
        Self {
            w: mask.w,
            h: mask.h,
            data: mask.data.iter().map(|&m| if m != 0 { 1.0 } else { 0.0 }).collect(),
        }
    }

    #[inline]
    /// Convert (x, y) to a linear index into `data`.
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            w: self.w,
            h: self.h,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// `1 - v` per pixel.
    pub fn inverted(&self) -> Self {
        self.map(|v| 1.0 - v)
    }

    pub fn min_max(&self) -> (f32, f32) {
        self.data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    pub fn mean_std(&self) -> (f32, f32) {
        if self.data.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.data.len() as f64;
        let mean = self.data.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = self
            .data
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        (mean as f32, var.sqrt() as f32)
    }

    /// Stretch values linearly onto `[0, 1]`. A flat image maps to zeros.
    pub fn normalized(&self) -> Self {
        let (lo, hi) = self.min_max();
        let span = hi - lo;
        if !span.is_finite() || span <= f32::EPSILON {
            return Self::new(self.w, self.h);
        }
        self.map(|v| (v - lo) / span)
    }

    pub fn clamped_unit(&self) -> Self {
        self.map(|v| v.clamp(0.0, 1.0))
    }

    /// Element-wise combination of two equally sized images.
    pub fn zip_map(&self, other: &ImageF32, f: impl Fn(f32, f32) -> f32) -> Self {
        debug_assert_eq!(self.dims(), other.dims());
        Self {
            w: self.w,
            h: self.h,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    /// Count of samples strictly above `threshold`.
    pub fn count_above(&self, threshold: f32) -> usize {
        self.data.iter().filter(|&&v| v > threshold).count()
    }

    /// 8-bit samples mapped back onto `[0, 1]`.
    pub fn from_luma8(img: &GrayImage) -> Self {
        Self {
            w: img.width() as usize,
            h: img.height() as usize,
            data: img.as_raw().iter().map(|&v| v as f32 / 255.0).collect(),
        }
    }

    /// Quantize `[0, 1]` values to an `image` buffer; out-of-range values clamp.
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.w as u32, self.h as u32, |x, y| {
            Luma([quantize(self.data[y as usize * self.w + x as usize])])
        })
    }

    /// Quantize `[0, 1]` values to a single-channel 8-bit raster.
    pub fn to_gray_raster(&self) -> Raster {
        let data = self.data.iter().map(|&v| quantize(v)).collect();
        Raster::from_parts(self.w as u32, self.h as u32, 1, data)
    }
}

#[inline]
fn quantize(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

impl ImageView for ImageF32 {
    type Pixel = f32;

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn row(&self, y: usize) -> &[f32] {
        let start = y * self.w;
        &self.data[start..start + self.w]
    }
}

impl ImageViewMut for ImageF32 {
    #[inline]
    fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.w;
        &mut self.data[start..start + self.w]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_stretches_to_unit_range() {
        let img = ImageF32::from_fn(4, 1, |x, _| 2.0 + x as f32);
        let n = img.normalized();
        assert_eq!(n.data, vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]);
    }

    #[test]
    fn flat_image_normalizes_to_zero() {
        let img = ImageF32::filled(3, 3, 0.7);
        assert!(img.normalized().data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn luma8_round_trip_keeps_levels() {
        let img = ImageF32::from_fn(3, 2, |x, y| (x + 3 * y) as f32 / 5.0);
        let back = ImageF32::from_luma8(&img.to_luma8());
        assert_eq!(back.dims(), (3, 2));
        for (a, b) in img.data.iter().zip(&back.data) {
            assert!((a - b).abs() <= 0.5 / 255.0 + 1e-6);
        }
        assert_eq!(ImageF32::filled(1, 1, 2.0).to_luma8().get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn mean_std_of_two_levels() {
        let img = ImageF32::from_fn(2, 1, |x, _| x as f32);
        let (mean, std) = img.mean_std();
        assert!((mean - 0.5).abs() < 1e-6);
        assert!((std - 0.5).abs() < 1e-6);
    }
}
