//! Histogram statistics and binarization.
//!
//! Shapes are assumed to be dark ink on a light background (the way glyphs
//! are rendered), so "foreground" means below-threshold pixels.
use crate::image::{ImageF32, Mask};
use imageproc::contrast::otsu_level;
use imageproc::filter::box_filter;

/// 256-bin histogram of a `[0, 1]` image.
pub fn histogram(img: &ImageF32) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for &v in &img.data {
        let bin = (v.clamp(0.0, 1.0) * 255.0).round() as usize;
        hist[bin] += 1;
    }
    hist
}

/// Median intensity in 8-bit units.
pub fn median_u8(img: &ImageF32) -> f32 {
    let hist = histogram(img);
    let total: u32 = hist.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let half = total.div_ceil(2);
    let mut acc = 0u32;
    for (bin, &count) in hist.iter().enumerate() {
        acc += count;
        if acc >= half {
            return bin as f32;
        }
    }
    255.0
}

/// Otsu threshold in `[0, 1]`: samples at or below the 8-bit Otsu level are
/// the dark class.
pub fn otsu_threshold(img: &ImageF32) -> f32 {
    if img.is_empty() {
        return 0.5;
    }
    (otsu_level(&img.to_luma8()) as f32 + 0.5) / 255.0
}

/// Dark-on-light foreground via Otsu. Near-uniform images fall back to a
/// mid-grey cut so a solid dark image is entirely foreground.
pub fn foreground_mask(gray: &ImageF32) -> Mask {
    let (lo, hi) = gray.min_max();
    let threshold = if hi - lo < 2.0 / 255.0 {
        0.5
    } else {
        otsu_threshold(gray)
    };
    Mask {
        w: gray.w,
        h: gray.h,
        data: gray.data.iter().map(|&v| u8::from(v < threshold)).collect(),
    }
}

/// Local-mean adaptive threshold: foreground where a pixel is darker than its
/// `block`×`block` neighbourhood mean by more than `c` (8-bit units).
pub fn adaptive_mean_mask(gray: &ImageF32, block: usize, c: f32) -> Mask {
    let radius = ((block.max(3) | 1) / 2) as u32;
    let levels = gray.to_luma8();
    let local = box_filter(&levels, radius, radius);
    Mask {
        w: gray.w,
        h: gray.h,
        data: levels
            .as_raw()
            .iter()
            .zip(local.as_raw())
            .map(|(&v, &m)| u8::from((v as f32) < m as f32 - c))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otsu_splits_bimodal_image() {
        let img = ImageF32::from_fn(10, 10, |x, _| if x < 5 { 0.1 } else { 0.9 });
        let t = otsu_threshold(&img);
        assert!(t > 0.1 && t < 0.9, "threshold {t}");
        assert_eq!(foreground_mask(&img).count(), 50);
    }

    #[test]
    fn uniform_dark_image_is_all_foreground() {
        let img = ImageF32::filled(4, 4, 0.0);
        assert_eq!(foreground_mask(&img).count(), 16);
        let light = ImageF32::filled(4, 4, 1.0);
        assert_eq!(foreground_mask(&light).count(), 0);
    }

    #[test]
    fn adaptive_mask_follows_local_contrast() {
        // dark stroke on a left-to-right illumination ramp
        let img = ImageF32::from_fn(40, 20, |x, y| {
            let base = 0.3 + 0.6 * x as f32 / 39.0;
            if (9..11).contains(&y) {
                base - 0.25
            } else {
                base
            }
        });
        let mask = adaptive_mean_mask(&img, 7, 5.0);
        assert!(mask.is_set(5, 10) && mask.is_set(35, 10));
        assert!(!mask.is_set(5, 2) && !mask.is_set(35, 17));
    }

    #[test]
    fn median_of_histogram() {
        let img = ImageF32::from_fn(3, 1, |x, _| x as f32 * 0.5);
        assert_eq!(median_u8(&img), 128.0);
    }
}
