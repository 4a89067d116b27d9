//! Caller-facing 8-bit raster with an explicit channel count.
//!
//! Samples are interleaved row-major (`(y * width + x) * channels + c`).
//! Supported layouts are gray (1), RGB (3) and RGBA (4); anything else is
//! representable so that validation can reject it with a message instead of
//! failing at construction.
use super::f32::ImageF32;
use crate::error::ConditioningError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    Gray,
    Rgb,
    Rgba,
}

impl ChannelLayout {
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(Self::Gray),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    pub fn channels(self) -> u8 {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Raster {
    /// Wrap an interleaved sample buffer. Fails only when the buffer length does
    /// not match `width * height * channels`.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, ConditioningError> {
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(ConditioningError::Validation(format!(
                "raster buffer holds {} samples, expected {expected} for {width}x{height}x{channels}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn from_gray(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ConditioningError> {
        Self::new(width, height, 1, data)
    }

    pub(crate) fn from_parts(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    /// Solid-colour RGB canvas.
    pub fn filled_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let n = width as usize * height as usize;
        let mut data = Vec::with_capacity(n * 3);
        for _ in 0..n {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            channels: 3,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn layout(&self) -> Option<ChannelLayout> {
        ChannelLayout::from_channels(self.channels)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Sample tuple at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        &self.data[start..start + c]
    }

    /// Reject empty rasters, unsupported channel layouts and sample buffers
    /// that do not cover the declared size.
    pub fn validate(&self) -> Result<ChannelLayout, ConditioningError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConditioningError::Validation(format!(
                "image has invalid dimensions {}x{}",
                self.width, self.height
            )));
        }
        let layout = self.layout().ok_or_else(|| {
            ConditioningError::Validation(format!(
                "unsupported channel layout: {} channels (expected 1, 3 or 4)",
                self.channels
            ))
        })?;
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        if self.data.len() != expected {
            return Err(ConditioningError::Validation(format!(
                "raster buffer holds {} samples, expected {expected} for {}x{}x{}",
                self.data.len(),
                self.width,
                self.height,
                self.channels
            )));
        }
        Ok(layout)
    }

    /// RGB triple in `[0, 1]` per pixel; alpha is composited over white.
    pub fn to_rgb_f32(&self) -> Vec<[f32; 3]> {
        let c = self.channels as usize;
        self.data
            .chunks_exact(c.max(1))
            .map(|px| match c {
                3 => [px[0] as f32 / 255.0, px[1] as f32 / 255.0, px[2] as f32 / 255.0],
                4 => {
                    let a = px[3] as f32 / 255.0;
                    let blend = |v: u8| (v as f32 / 255.0) * a + (1.0 - a);
                    [blend(px[0]), blend(px[1]), blend(px[2])]
                }
                _ => {
                    let v = px[0] as f32 / 255.0;
                    [v, v, v]
                }
            })
            .collect()
    }

    /// Three-channel copy; gray is replicated and alpha composited over white.
    pub fn to_rgb(&self) -> Raster {
        if self.channels == 3 {
            return self.clone();
        }
        let data = self
            .to_rgb_f32()
            .into_iter()
            .flat_map(|px| px.map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8))
            .collect();
        Self::from_parts(self.width, self.height, 3, data)
    }

    /// Luma (BT.601) in `[0, 1]`.
    pub fn to_gray_f32(&self) -> ImageF32 {
        let w = self.width as usize;
        let h = self.height as usize;
        if self.channels == 1 {
            return ImageF32 {
                w,
                h,
                data: self.data.iter().map(|&v| v as f32 / 255.0).collect(),
            };
        }
        let data = self
            .to_rgb_f32()
            .into_iter()
            .map(|[r, g, b]| 0.299 * r + 0.587 * g + 0.114 * b)
            .collect();
        ImageF32 { w, h, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(Raster::new(4, 4, 3, vec![0; 10]).is_err());
    }

    #[test]
    fn validate_flags_unsupported_layout() {
        let r = Raster::new(2, 2, 2, vec![0; 8]).unwrap();
        assert!(r.validate().is_err());
        let empty = Raster::new(0, 5, 1, vec![]).unwrap();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn short_buffer_fails_validation() {
        assert!(Raster::from_gray(32, 32, vec![0; 100]).is_err());
        let short = Raster::from_parts(32, 32, 1, vec![0; 100]);
        assert!(matches!(short.validate(), Err(ConditioningError::Validation(_))));
    }

    #[test]
    fn transparent_pixels_read_as_white() {
        let r = Raster::new(1, 1, 4, vec![0, 0, 0, 0]).unwrap();
        let g = r.to_gray_f32();
        assert!((g.data[0] - 1.0).abs() < 1e-6);
    }
}
