//! Colour-space conversion and feature clustering.
//!
//! - RGB ↔ HSV / CIE Lab (D65) for `[0, 1]` RGB samples.
//! - k-means with k-means++ seeding from a caller-provided RNG, so a fixed
//!   seed yields a fixed partition.
//! - Flat-kernel mean shift over a subsample; every sample is then assigned
//!   to its nearest mode.
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    Rgb,
    Hsv,
    Lab,
}

impl ColorSpace {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "rgb" => Some(Self::Rgb),
            "hsv" => Some(Self::Hsv),
            "lab" => Some(Self::Lab),
            _ => None,
        }
    }

    /// Convert an RGB sample into this space, scaled so that each component
    /// spans roughly `[0, 100]`.
    pub fn convert(self, rgb: [f32; 3]) -> [f32; 3] {
        match self {
            Self::Rgb => [rgb[0] * 100.0, rgb[1] * 100.0, rgb[2] * 100.0],
            Self::Hsv => {
                let [h, s, v] = rgb_to_hsv(rgb);
                [h / 3.6, s * 100.0, v * 100.0]
            }
            Self::Lab => {
                let [l, a, b] = rgb_to_lab(rgb);
                [l, a, b]
            }
        }
    }
}

/// Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
pub fn rgb_to_hsv(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let h = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max <= f32::EPSILON { 0.0 } else { delta / max };
    [h, s, max]
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// CIE L*a*b* under D65; L in `[0, 100]`.
pub fn rgb_to_lab(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb.map(srgb_to_linear);
    let x = (0.412_456_4 * r + 0.357_576_1 * g + 0.180_437_5 * b) / 0.950_47;
    let y = 0.212_672_9 * r + 0.715_152_2 * g + 0.072_175 * b;
    let z = (0.019_333_9 * r + 0.119_192 * g + 0.950_304_1 * b) / 1.088_83;
    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

#[inline]
fn dist2(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn nearest(centres: &[[f32; 3]], p: &[f32; 3]) -> (usize, f32) {
    centres
        .iter()
        .enumerate()
        .map(|(i, c)| (i, dist2(c, p)))
        .fold((0, f32::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

#[derive(Clone, Debug)]
pub struct Clustering {
    /// Cluster index per sample.
    pub assignments: Vec<usize>,
    pub centres: Vec<[f32; 3]>,
}

/// Lloyd's k-means with k-means++ initialisation.
pub fn kmeans<R: Rng>(samples: &[[f32; 3]], k: usize, max_iter: usize, rng: &mut R) -> Clustering {
    if samples.is_empty() || k == 0 {
        return Clustering {
            assignments: vec![0; samples.len()],
            centres: Vec::new(),
        };
    }
    let k = k.min(samples.len());
    let mut centres = vec![samples[rng.gen_range(0..samples.len())]];
    let mut d2: Vec<f32> = samples.iter().map(|s| dist2(s, &centres[0])).collect();
    while centres.len() < k {
        let total: f64 = d2.iter().map(|&d| d as f64).sum();
        let next = if total <= 0.0 {
            rng.gen_range(0..samples.len())
        } else {
            let mut target = rng.gen_range(0.0..total);
            let mut chosen = samples.len() - 1;
            for (i, &d) in d2.iter().enumerate() {
                target -= d as f64;
                if target <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        centres.push(samples[next]);
        let c = samples[next];
        for (d, s) in d2.iter_mut().zip(samples) {
            *d = d.min(dist2(s, &c));
        }
    }

    let mut assignments = vec![0usize; samples.len()];
    for _ in 0..max_iter.max(1) {
        let mut changed = false;
        for (a, s) in assignments.iter_mut().zip(samples) {
            let (best, _) = nearest(&centres, s);
            if *a != best {
                *a = best;
                changed = true;
            }
        }
        let mut sums = vec![([0.0f64; 3], 0usize); centres.len()];
        for (&a, s) in assignments.iter().zip(samples) {
            for i in 0..3 {
                sums[a].0[i] += s[i] as f64;
            }
            sums[a].1 += 1;
        }
        for (c, (sum, n)) in centres.iter_mut().zip(sums) {
            if n > 0 {
                *c = [
                    (sum[0] / n as f64) as f32,
                    (sum[1] / n as f64) as f32,
                    (sum[2] / n as f64) as f32,
                ];
            }
        }
        if !changed {
            break;
        }
    }
    Clustering {
        assignments,
        centres,
    }
}

/// Flat-kernel mean shift. Modes are found from every `stride`-th sample and
/// merged when closer than half the bandwidth.
pub fn mean_shift(samples: &[[f32; 3]], bandwidth: f32, stride: usize, max_iter: usize) -> Clustering {
    let stride = stride.max(1);
    let bw2 = bandwidth * bandwidth;
    let subset: Vec<[f32; 3]> = samples.iter().step_by(stride).copied().collect();
    let mut modes: Vec<[f32; 3]> = Vec::new();
    for &start in &subset {
        let mut m = start;
        for _ in 0..max_iter {
            let mut acc = [0.0f64; 3];
            let mut n = 0usize;
            for s in &subset {
                if dist2(s, &m) <= bw2 {
                    for i in 0..3 {
                        acc[i] += s[i] as f64;
                    }
                    n += 1;
                }
            }
            if n == 0 {
                break;
            }
            let next = [
                (acc[0] / n as f64) as f32,
                (acc[1] / n as f64) as f32,
                (acc[2] / n as f64) as f32,
            ];
            let shift = dist2(&next, &m);
            m = next;
            if shift < 1e-6 {
                break;
            }
        }
        if !modes.iter().any(|c| dist2(c, &m) < bw2 * 0.25) {
            modes.push(m);
        }
    }
    let assignments = samples.iter().map(|s| nearest(&modes, s).0).collect();
    Clustering {
        assignments,
        centres: modes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_groups() -> Vec<[f32; 3]> {
        let mut v = vec![[5.0, 5.0, 5.0]; 50];
        v.extend(vec![[80.0, 80.0, 80.0]; 50]);
        v
    }

    #[test]
    fn kmeans_separates_two_groups() {
        let samples = two_groups();
        let mut rng = StdRng::seed_from_u64(7);
        let c = kmeans(&samples, 2, 20, &mut rng);
        assert_eq!(c.centres.len(), 2);
        assert_ne!(c.assignments[0], c.assignments[99]);
        assert!(c.assignments[..50].iter().all(|&a| a == c.assignments[0]));
    }

    #[test]
    fn kmeans_is_reproducible_with_seed() {
        let samples: Vec<[f32; 3]> = (0..60).map(|i| [(i * 7 % 31) as f32, i as f32, 0.0]).collect();
        let a = kmeans(&samples, 4, 10, &mut StdRng::seed_from_u64(3));
        let b = kmeans(&samples, 4, 10, &mut StdRng::seed_from_u64(3));
        assert_eq!(a.assignments, b.assignments);
    }

    #[test]
    fn mean_shift_finds_two_modes() {
        let c = mean_shift(&two_groups(), 20.0, 3, 20);
        assert_eq!(c.centres.len(), 2);
    }

    #[test]
    fn colour_conversions_hit_reference_points() {
        let white = rgb_to_lab([1.0, 1.0, 1.0]);
        assert!((white[0] - 100.0).abs() < 0.1 && white[1].abs() < 0.1);
        let red = rgb_to_hsv([1.0, 0.0, 0.0]);
        assert_eq!(red, [0.0, 1.0, 1.0]);
        let blue = rgb_to_hsv([0.0, 0.0, 1.0]);
        assert!((blue[0] - 240.0).abs() < 1e-4);
    }
}
