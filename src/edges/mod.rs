//! Edge processing utilities: image gradients and Canny edge extraction.
//!
//! - Gradient computation (Sobel with apertures 3/5/7) returning
//!   `gx`, `gy` and magnitude.
//! - Canny: direction-aligned non-maximum suppression followed by
//!   double-threshold hysteresis, producing a binary edge map.
//!
//! Borders are handled by clamping indices (replicate).

pub mod canny;
pub mod grad;

pub use canny::{canny, hysteresis, run_nms, CannyParams};
pub use grad::{image_gradients, mean_magnitude, sobel_gradients, Grad, GradientKernel};
