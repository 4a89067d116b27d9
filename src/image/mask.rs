//! Owned binary mask (`0` / `1` per pixel).
use super::f32::ImageF32;
use super::traits::{ImageView, ImageViewMut};
use image::{GrayImage, Luma};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    pub w: usize,
    pub h: usize,
    pub data: Vec<u8>,
}

impl Mask {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0; w * h],
        }
    }

    /// Foreground where `img > threshold`.
    pub fn from_threshold(img: &ImageF32, threshold: f32) -> Self {
        Self {
            w: img.w,
            h: img.h,
            data: img.data.iter().map(|&v| u8::from(v > threshold)).collect(),
        }
    }

    /// Any non-zero sample is foreground.
    pub fn from_luma8(img: &GrayImage) -> Self {
        Self {
            w: img.width() as usize,
            h: img.height() as usize,
            data: img.as_raw().iter().map(|&v| u8::from(v != 0)).collect(),
        }
    }

    /// 255 on foreground, 0 elsewhere.
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.w as u32, self.h as u32, |x, y| {
            Luma([if self.is_set(x as usize, y as usize) { 255 } else { 0 }])
        })
    }

    #[inline]
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.data[y * self.w + x] != 0
    }

    /// Out-of-bounds coordinates read as background.
    #[inline]
    pub fn is_set_signed(&self, x: isize, y: isize) -> bool {
        self.in_bounds(x, y) && self.is_set(x as usize, y as usize)
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn inverted(&self) -> Self {
        Self {
            w: self.w,
            h: self.h,
            data: self.data.iter().map(|&v| u8::from(v == 0)).collect(),
        }
    }

    /// Bounding box `(x0, y0, x1, y1)` of set pixels, inclusive.
    pub fn bounding_box(&self) -> Option<(usize, usize, usize, usize)> {
        let mut bbox: Option<(usize, usize, usize, usize)> = None;
        for y in 0..self.h {
            for x in 0..self.w {
                if !self.is_set(x, y) {
                    continue;
                }
                bbox = Some(match bbox {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bbox
    }
}

impl ImageView for Mask {
    type Pixel = u8;

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn row(&self, y: usize) -> &[u8] {
        let start = y * self.w;
        &self.data[start..start + self.w]
    }
}

impl ImageViewMut for Mask {
    #[inline]
    fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.w;
        &mut self.data[start..start + self.w]
    }
}
