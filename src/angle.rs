//! Angle utilities for undirected line orientations.

use std::f32::consts::{FRAC_PI_2, PI};

/// Normalizes an angle into the range [0, π).
#[inline]
pub fn normalize_half_pi(angle: f32) -> f32 {
    let norm = angle.rem_euclid(PI);
    if norm >= PI - 1e-6 {
        0.0
    } else {
        norm
    }
}

/// Smallest unsigned difference between two orientations, treating
/// antipodal directions as equivalent (π apart → 0). Result is in [0, π/2].
#[inline]
pub fn angular_difference(a: f32, b: f32) -> f32 {
    let diff = (a - b).abs().rem_euclid(PI);
    if diff > FRAC_PI_2 {
        PI - diff
    } else {
        diff
    }
}

/// Orientation of the direction `(dx, dy)` in degrees, folded into [0, 180).
#[inline]
pub fn orientation_deg(dx: f32, dy: f32) -> f32 {
    normalize_half_pi(dy.atan2(dx)).to_degrees()
}

/// Undirected distance in degrees between an orientation and a reference
/// orientation, both in [0, 180).
#[inline]
pub fn orientation_distance_deg(theta: f32, reference: f32) -> f32 {
    angular_difference(theta.to_radians(), reference.to_radians()).to_degrees()
}
