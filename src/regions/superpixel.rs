//! SLIC-style superpixels and small-region merging.
//!
//! Pixels carry a 3-component feature (colour in any space, or grey
//! replicated). Cluster centres start on a regular grid and are refined by
//! local k-means in the joint feature/position space; the final assignment is
//! split into spatially connected pieces.
use super::labeling::{relabel_connected, Connectivity, Labels};

#[derive(Clone, Copy, Debug)]
pub struct SlicParams {
    pub n_segments: usize,
    /// Weight of spatial distance relative to feature distance.
    pub compactness: f32,
    pub iterations: usize,
}

impl Default for SlicParams {
    fn default() -> Self {
        Self {
            n_segments: 100,
            compactness: 10.0,
            iterations: 10,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Centre {
    feat: [f32; 3],
    x: f32,
    y: f32,
}

fn feature_dist2(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

pub fn slic(features: &[[f32; 3]], w: usize, h: usize, params: &SlicParams) -> Labels {
    if w == 0 || h == 0 {
        return Labels::empty(w, h);
    }
    let n = params.n_segments.max(1);
    let step = (((w * h) as f32 / n as f32).sqrt().round() as usize).max(1);
    let mut centres = Vec::new();
    let mut y = step / 2;
    while y < h {
        let mut x = step / 2;
        while x < w {
            centres.push(Centre {
                feat: features[y * w + x],
                x: x as f32,
                y: y as f32,
            });
            x += step;
        }
        y += step;
    }

    let spatial_w = (params.compactness / step as f32).powi(2);
    let mut assign = vec![0u32; w * h];
    let mut best = vec![f32::INFINITY; w * h];
    let reach = 2 * step as isize;

    for _ in 0..params.iterations.max(1) {
        best.iter_mut().for_each(|b| *b = f32::INFINITY);
        for (ci, c) in centres.iter().enumerate() {
            let (cx, cy) = (c.x.round() as isize, c.y.round() as isize);
            let y0 = (cy - reach).max(0) as usize;
            let y1 = ((cy + reach) as usize).min(h - 1);
            let x0 = (cx - reach).max(0) as usize;
            let x1 = ((cx + reach) as usize).min(w - 1);
            for py in y0..=y1 {
                for px in x0..=x1 {
                    let idx = py * w + px;
                    let d = feature_dist2(&features[idx], &c.feat)
                        + spatial_w * ((px as f32 - c.x).powi(2) + (py as f32 - c.y).powi(2));
                    if d < best[idx] {
                        best[idx] = d;
                        assign[idx] = ci as u32 + 1;
                    }
                }
            }
        }

        let mut sums = vec![([0.0f64; 3], 0.0f64, 0.0f64, 0usize); centres.len()];
        for (idx, &a) in assign.iter().enumerate() {
            if a == 0 {
                continue;
            }
            let s = &mut sums[a as usize - 1];
            for k in 0..3 {
                s.0[k] += features[idx][k] as f64;
            }
            s.1 += (idx % w) as f64;
            s.2 += (idx / w) as f64;
            s.3 += 1;
        }
        for (c, s) in centres.iter_mut().zip(sums.iter()) {
            if s.3 == 0 {
                continue;
            }
            let n = s.3 as f64;
            c.feat = [
                (s.0[0] / n) as f32,
                (s.0[1] / n) as f32,
                (s.0[2] / n) as f32,
            ];
            c.x = (s.1 / n) as f32;
            c.y = (s.2 / n) as f32;
        }
    }
    relabel_connected(&assign, w, h, Connectivity::Four)
}

/// Mean feature per label (index `label - 1`).
pub fn region_means(labels: &Labels, features: &[[f32; 3]]) -> Vec<([f32; 3], usize)> {
    let mut acc = vec![([0.0f64; 3], 0usize); labels.count];
    for (idx, &l) in labels.data.iter().enumerate() {
        if l == 0 {
            continue;
        }
        let a = &mut acc[l as usize - 1];
        for k in 0..3 {
            a.0[k] += features[idx][k] as f64;
        }
        a.1 += 1;
    }
    acc.into_iter()
        .map(|(s, n)| {
            let d = n.max(1) as f64;
            (
                [(s[0] / d) as f32, (s[1] / d) as f32, (s[2] / d) as f32],
                n,
            )
        })
        .collect()
}

/// Repeatedly merge the smallest region below `min_size` into its most
/// similar 4-adjacent neighbour, until every region reaches `min_size` or
/// has no neighbours left. Labels are renumbered densely afterwards.
pub fn merge_small_regions(labels: &Labels, features: &[[f32; 3]], min_size: usize) -> Labels {
    let (w, h) = (labels.w, labels.h);
    let mut data = labels.data.clone();
    let mut parent: Vec<u32> = (0..=labels.count as u32).collect();
    let mut stats: Vec<([f64; 3], usize)> = vec![([0.0; 3], 0); labels.count + 1];
    for (idx, &l) in data.iter().enumerate() {
        let s = &mut stats[l as usize];
        for k in 0..3 {
            s.0[k] += features[idx][k] as f64;
        }
        s.1 += 1;
    }

    fn root(parent: &mut [u32], mut l: u32) -> u32 {
        while parent[l as usize] != l {
            let next = parent[parent[l as usize] as usize];
            parent[l as usize] = next;
            l = next;
        }
        l
    }

    loop {
        let candidate = (1..=labels.count as u32)
            .filter(|&l| parent[l as usize] == l)
            .filter(|&l| stats[l as usize].1 > 0 && stats[l as usize].1 < min_size)
            .min_by_key(|&l| (stats[l as usize].1, l));
        let Some(small) = candidate else { break };

        let mut neighbours = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let a = root(&mut parent, data[y * w + x]);
                if a != small {
                    continue;
                }
                for &(dx, dy) in Connectivity::Four.offsets() {
                    let (nx, ny) = (x as isize + dx, y as isize + dy);
                    if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                        continue;
                    }
                    let b = root(&mut parent, data[ny as usize * w + nx as usize]);
                    if b != 0 && b != small && !neighbours.contains(&b) {
                        neighbours.push(b);
                    }
                }
            }
        }

        let mean = |s: &([f64; 3], usize)| {
            let n = s.1.max(1) as f64;
            [s.0[0] / n, s.0[1] / n, s.0[2] / n]
        };
        let ms = mean(&stats[small as usize]);
        let target = neighbours.into_iter().min_by(|&a, &b| {
            let da = dist3(&ms, &mean(&stats[a as usize]));
            let db = dist3(&ms, &mean(&stats[b as usize]));
            da.total_cmp(&db).then(a.cmp(&b))
        });
        let Some(target) = target else {
            // Isolated region: keep it.
            stats[small as usize].1 = usize::MAX;
            continue;
        };
        parent[small as usize] = target;
        let moved = stats[small as usize];
        let t = &mut stats[target as usize];
        for k in 0..3 {
            t.0[k] += moved.0[k];
        }
        t.1 += moved.1;
    }

    for l in data.iter_mut() {
        *l = root(&mut parent, *l);
    }
    relabel_connected(&data, w, h, Connectivity::Four)
}

fn dist3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone(w: usize, h: usize) -> Vec<[f32; 3]> {
        (0..w * h)
            .map(|i| {
                let v = if i % w < w / 2 { 0.0 } else { 100.0 };
                [v, v, v]
            })
            .collect()
    }

    #[test]
    fn slic_respects_strong_boundary() {
        let feats = two_tone(40, 20);
        let labels = slic(&feats, 40, 20, &SlicParams { n_segments: 8, ..Default::default() });
        assert!(labels.count >= 2);
        for y in 0..20 {
            assert_ne!(labels.at(19, y), labels.at(20, y));
        }
    }

    #[test]
    fn merging_absorbs_small_regions() {
        let feats = two_tone(40, 20);
        let labels = slic(&feats, 40, 20, &SlicParams { n_segments: 32, ..Default::default() });
        let merged = merge_small_regions(&labels, &feats, 400);
        assert_eq!(merged.count, 2);
        assert_ne!(merged.at(0, 0), merged.at(39, 19));
    }
}
