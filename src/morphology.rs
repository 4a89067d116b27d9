//! Grayscale and binary morphology on `imageproc`'s flat structuring
//! elements.
//!
//! Erosion is a min-filter and dilation a max-filter over the element's
//! footprint; samples outside the image are ignored. `ImageF32` inputs are
//! quantized to 8 bits for the filter, which is exact for masks and for ink
//! maps in `[0, 1]`.
use crate::image::{ImageF32, Mask};
use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask as Footprint};

/// Largest element `imageproc` accepts (radius 255).
const MAX_KSIZE: usize = 511;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelShape {
    Rect,
    Ellipse,
}

/// Structuring element of odd size `ksize × ksize`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructuringElement {
    pub shape: KernelShape,
    pub ksize: usize,
}

impl StructuringElement {
    pub fn new(shape: KernelShape, ksize: usize) -> Self {
        let ksize = if ksize % 2 == 0 { ksize + 1 } else { ksize.max(1) };
        Self {
            shape,
            ksize: ksize.min(MAX_KSIZE),
        }
    }

    pub fn rect(ksize: usize) -> Self {
        Self::new(KernelShape::Rect, ksize)
    }

    pub fn ellipse(ksize: usize) -> Self {
        Self::new(KernelShape::Ellipse, ksize)
    }

    fn radius(&self) -> usize {
        self.ksize / 2
    }

    /// Whether offset `(dx, dy)` from the centre belongs to the element.
    pub fn covers(&self, dx: isize, dy: isize) -> bool {
        let r = self.radius() as isize;
        if dx.abs() > r || dy.abs() > r {
            return false;
        }
        match self.shape {
            KernelShape::Rect => true,
            KernelShape::Ellipse => {
                let rf = r as f32 + 0.5;
                (dx * dx + dy * dy) as f32 <= rf * rf
            }
        }
    }

    fn footprint(&self) -> Footprint {
        let r = self.radius();
        let stencil = GrayImage::from_fn(self.ksize as u32, self.ksize as u32, |x, y| {
            let inside = self.covers(x as isize - r as isize, y as isize - r as isize);
            Luma([if inside { 255 } else { 0 }])
        });
        Footprint::from_image(&stencil, r as u8, r as u8)
    }
}

fn filter_gray(
    img: &ImageF32,
    se: &StructuringElement,
    op: fn(&GrayImage, &Footprint) -> GrayImage,
) -> ImageF32 {
    if img.is_empty() || se.ksize <= 1 {
        return img.clone();
    }
    ImageF32::from_luma8(&op(&img.to_luma8(), &se.footprint()))
}

fn filter_mask(mask: &Mask, se: &StructuringElement, ops: &[fn(&GrayImage, &Footprint) -> GrayImage]) -> Mask {
    if mask.data.is_empty() || se.ksize <= 1 {
        return mask.clone();
    }
    let footprint = se.footprint();
    let mut img = mask.to_luma8();
    for op in ops {
        img = op(&img, &footprint);
    }
    Mask::from_luma8(&img)
}

pub fn erode(img: &ImageF32, se: &StructuringElement) -> ImageF32 {
    filter_gray(img, se, grayscale_erode)
}

pub fn dilate(img: &ImageF32, se: &StructuringElement) -> ImageF32 {
    filter_gray(img, se, grayscale_dilate)
}

pub fn erode_mask(mask: &Mask, se: &StructuringElement) -> Mask {
    filter_mask(mask, se, &[grayscale_erode])
}

/// Erosion followed by dilation; removes specks smaller than the element.
pub fn open_mask(mask: &Mask, se: &StructuringElement) -> Mask {
    filter_mask(mask, se, &[grayscale_erode, grayscale_dilate])
}

/// Dilation followed by erosion; fills gaps narrower than the element.
pub fn close_mask(mask: &Mask, se: &StructuringElement) -> Mask {
    filter_mask(mask, se, &[grayscale_dilate, grayscale_erode])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(size: usize, lo: usize, hi: usize) -> Mask {
        let mut m = Mask::new(size, size);
        for y in lo..hi {
            for x in lo..hi {
                m.data[y * size + x] = 1;
            }
        }
        m
    }

    #[test]
    fn erosion_shrinks_and_dilation_grows() {
        let img = ImageF32::from_mask(&block(12, 3, 9));
        let se = StructuringElement::rect(3);
        assert_eq!(erode(&img, &se).count_above(0.5), 16);
        assert_eq!(dilate(&img, &se).count_above(0.5), 64);
    }

    #[test]
    fn opening_removes_isolated_speck() {
        let mut m = block(12, 3, 9);
        m.data[11 * 12] = 1;
        let opened = open_mask(&m, &StructuringElement::rect(3));
        assert!(!opened.is_set(0, 11));
        assert_eq!(opened.count(), 36);
    }

    #[test]
    fn closing_fills_a_pinhole() {
        let mut m = block(12, 2, 10);
        m.data[5 * 12 + 5] = 0;
        let closed = close_mask(&m, &StructuringElement::ellipse(3));
        assert!(closed.is_set(5, 5));
        assert_eq!(closed.count(), 64);
    }

    #[test]
    fn grey_levels_survive_quantization() {
        let img = ImageF32::filled(6, 6, 0.4);
        let eroded = erode(&img, &StructuringElement::ellipse(3));
        assert!(eroded.data.iter().all(|&v| (v - 0.4).abs() < 1.0 / 255.0));
    }

    #[test]
    fn ellipse_excludes_corners() {
        let se = StructuringElement::ellipse(5);
        assert!(!se.covers(2, 2));
        assert!(se.covers(2, 0));
        assert!(se.covers(1, 1));
        assert!(StructuringElement::rect(5).covers(2, 2));
        assert_eq!(StructuringElement::rect(4).ksize, 5);
    }
}
