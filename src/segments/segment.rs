use crate::angle::orientation_deg;
use serde::Serialize;

/// Line segment produced by the LSD-like extractor.
#[derive(Clone, Debug, Serialize)]
pub struct LineSegment {
    pub p0: [f32; 2],
    pub p1: [f32; 2],
    pub avg_mag: f32,
    /// Perpendicular extent of the supporting region relative to its length;
    /// near 0 for straight edges, larger for arcs.
    pub thickness_ratio: f32,
}

impl LineSegment {
    pub fn length(&self) -> f32 {
        let dx = self.p1[0] - self.p0[0];
        let dy = self.p1[1] - self.p0[1];
        (dx * dx + dy * dy).sqrt()
    }

    /// Undirected orientation of the segment in degrees, in [0, 180).
    pub fn orientation_deg(&self) -> f32 {
        orientation_deg(self.p1[0] - self.p0[0], self.p1[1] - self.p0[1])
    }
}
