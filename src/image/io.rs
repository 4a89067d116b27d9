//! I/O helpers for rasters and JSON.
//!
//! - `load_raster`: read a PNG/JPEG into an owned gray/RGB/RGBA raster.
//! - `save_raster`: write a raster as PNG.
//! - `encode_png_base64`: PNG-encode in memory and embed as base64, the
//!   transport form the downstream inference pipeline accepts.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::raster::Raster;
use crate::error::ConditioningError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use serde::Serialize;
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Load an image from disk keeping gray, RGB or RGBA layout.
pub fn load_raster(path: &Path) -> Result<Raster, ConditioningError> {
    let img = image::open(path)
        .map_err(|e| ConditioningError::Io(format!("Failed to open {}: {e}", path.display())))?;
    Ok(raster_from_dynamic(img))
}

pub fn raster_from_dynamic(img: DynamicImage) -> Raster {
    let (w, h) = (img.width(), img.height());
    let (channels, data) = match img {
        DynamicImage::ImageLuma8(g) => (1, g.into_raw()),
        DynamicImage::ImageRgb8(rgb) => (3, rgb.into_raw()),
        other if other.color().has_alpha() => (4, other.into_rgba8().into_raw()),
        other => (3, other.into_rgb8().into_raw()),
    };
    Raster::from_parts(w, h, channels, data)
}

fn to_dynamic(raster: &Raster) -> Result<DynamicImage, ConditioningError> {
    let (w, h) = raster.size();
    let data = raster.data().to_vec();
    let bad = || ConditioningError::Encode("raster buffer does not match its dimensions".into());
    let img = match raster.channels() {
        1 => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, data).ok_or_else(bad)?),
        3 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, data).ok_or_else(bad)?),
        4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, data).ok_or_else(bad)?),
        c => {
            return Err(ConditioningError::Encode(format!(
                "cannot encode a {c}-channel raster"
            )))
        }
    };
    Ok(img)
}

/// Save a raster to disk; the format follows the file extension.
pub fn save_raster(raster: &Raster, path: &Path) -> Result<(), ConditioningError> {
    ensure_parent_dir(path)?;
    to_dynamic(raster)?
        .save(path)
        .map_err(|e| ConditioningError::Io(format!("Failed to save {}: {e}", path.display())))
}

/// PNG bytes of `raster`.
pub fn encode_png(raster: &Raster) -> Result<Vec<u8>, ConditioningError> {
    let mut bytes = Cursor::new(Vec::new());
    to_dynamic(raster)?.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

pub fn encode_png_base64(raster: &Raster) -> Result<String, ConditioningError> {
    Ok(STANDARD.encode(encode_png(raster)?))
}

/// Inverse of [`encode_png_base64`].
pub fn decode_png_base64(encoded: &str) -> Result<Raster, ConditioningError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ConditioningError::Encode(format!("invalid base64 payload: {e}")))?;
    let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?;
    Ok(raster_from_dynamic(img))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), ConditioningError> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        ConditioningError::Io(format!("Failed to serialize JSON for {}: {e}", path.display()))
    })?;
    fs::write(path, json).map_err(|e| {
        ConditioningError::Io(format!("Failed to write JSON {}: {e}", path.display()))
    })
}

fn ensure_parent_dir(path: &Path) -> Result<(), ConditioningError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                ConditioningError::Io(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_png_preserves_samples() {
        let raster = Raster::from_gray(3, 2, vec![0, 50, 100, 150, 200, 250]).unwrap();
        let encoded = encode_png_base64(&raster).unwrap();
        let decoded = decode_png_base64(&encoded).unwrap();
        assert_eq!(decoded, raster);
    }
}
