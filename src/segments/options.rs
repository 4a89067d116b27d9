use serde::{Deserialize, Serialize};

/// Options controlling region growth in the LSD-like extractor.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LsdOptions {
    /// Minimum Sobel gradient magnitude for seed and member pixels.
    pub magnitude_threshold: f32,
    /// Orientation tolerance around the seed normal in degrees.
    pub angle_tolerance_deg: f32,
    /// Minimum accepted segment length in pixels.
    pub min_length_px: f32,
    /// Minimum region size in pixels.
    pub min_region_px: usize,
    /// Fraction of region pixels that must lie within half the tolerance.
    pub min_aligned_fraction: f32,
}

impl Default for LsdOptions {
    fn default() -> Self {
        Self {
            magnitude_threshold: 0.5,
            angle_tolerance_deg: 22.5,
            min_length_px: 6.0,
            min_region_px: 12,
            min_aligned_fraction: 0.6,
        }
    }
}
