//! Distance transforms of binary masks.
//!
//! Every foreground pixel receives its distance to the nearest background
//! pixel; background pixels are 0. The area outside the image counts as
//! background, so a shape touching the border still peaks in its interior.
//!
//! The mask is inverted and framed with one pixel of background before the
//! `imageproc` transforms run, since those measure the distance to the nearest
//! non-zero pixel.
//!
//! - Euclidean: exact squared transform, square-rooted.
//! - Manhattan / Chebyshev: 8-bit chamfer transform, so values saturate at 255.
use crate::image::{ImageF32, Mask};
use image::{GrayImage, Luma};
use imageproc::distance_transform::{
    distance_transform as chamfer_transform, euclidean_squared_distance_transform, Norm,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
    Chebyshev,
}

impl DistanceMetric {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "euclidean" | "l2" => Some(Self::Euclidean),
            "manhattan" | "l1" => Some(Self::Manhattan),
            "chebyshev" | "linf" => Some(Self::Chebyshev),
            _ => None,
        }
    }
}

/// Background (and the frame around the image) as 255, foreground as 0.
fn framed_background(mask: &Mask) -> GrayImage {
    let (w, h) = (mask.w as u32, mask.h as u32);
    GrayImage::from_fn(w + 2, h + 2, |x, y| {
        let inside = x >= 1 && y >= 1 && x <= w && y <= h;
        let fg = inside && mask.is_set(x as usize - 1, y as usize - 1);
        Luma([if fg { 0 } else { 255 }])
    })
}

pub fn distance_transform(mask: &Mask, metric: DistanceMetric) -> ImageF32 {
    let (w, h) = (mask.w, mask.h);
    if w == 0 || h == 0 {
        return ImageF32::new(w, h);
    }
    let framed = framed_background(mask);
    let at = |x: usize, y: usize| (x as u32 + 1, y as u32 + 1);
    match metric {
        DistanceMetric::Euclidean => {
            let squared = euclidean_squared_distance_transform(&framed);
            ImageF32::from_fn(w, h, |x, y| {
                let (fx, fy) = at(x, y);
                squared.get_pixel(fx, fy)[0].sqrt() as f32
            })
        }
        DistanceMetric::Manhattan | DistanceMetric::Chebyshev => {
            let norm = if metric == DistanceMetric::Manhattan {
                Norm::L1
            } else {
                Norm::LInf
            };
            let chamfer = chamfer_transform(&framed, norm);
            ImageF32::from_fn(w, h, |x, y| {
                let (fx, fy) = at(x, y);
                chamfer.get_pixel(fx, fy)[0] as f32
            })
        }
    }
}
