//! Connected-component labeling on top of `imageproc::region_labelling`.
//!
//! Label `0` is background; components are renumbered from 1 in raster scan
//! order of their first pixel, so labelings are deterministic whatever ids the
//! union-find pass hands out.
use crate::image::Mask;
use image::{ImageBuffer, Luma};
use imageproc::region_labelling::{connected_components, Connectivity as PixelConnectivity};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    Four,
    Eight,
}

impl From<Connectivity> for PixelConnectivity {
    fn from(conn: Connectivity) -> Self {
        match conn {
            Connectivity::Four => Self::Four,
            Connectivity::Eight => Self::Eight,
        }
    }
}

impl Connectivity {
    pub fn offsets(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];
        match self {
            Self::Four => &FOUR,
            Self::Eight => &EIGHT,
        }
    }
}

/// Per-pixel component labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Labels {
    pub w: usize,
    pub h: usize,
    pub data: Vec<u32>,
    /// Number of components (labels run `1..=count`).
    pub count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ComponentStats {
    pub label: u32,
    pub area: usize,
    /// Inclusive `[x0, y0, x1, y1]`.
    pub bbox: [usize; 4],
    pub centroid: [f32; 2],
}

impl Labels {
    pub fn empty(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0; w * h],
            count: 0,
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> u32 {
        self.data[y * self.w + x]
    }

    pub fn stats(&self) -> Vec<ComponentStats> {
        let mut acc: Vec<(usize, [usize; 4], f64, f64)> =
            vec![(0, [usize::MAX, usize::MAX, 0, 0], 0.0, 0.0); self.count];
        for (idx, &label) in self.data.iter().enumerate() {
            if label == 0 {
                continue;
            }
            let (x, y) = (idx % self.w, idx / self.w);
            let entry = &mut acc[label as usize - 1];
            entry.0 += 1;
            entry.1[0] = entry.1[0].min(x);
            entry.1[1] = entry.1[1].min(y);
            entry.1[2] = entry.1[2].max(x);
            entry.1[3] = entry.1[3].max(y);
            entry.2 += x as f64;
            entry.3 += y as f64;
        }
        acc.into_iter()
            .enumerate()
            .filter(|(_, (area, ..))| *area > 0)
            .map(|(i, (area, bbox, sx, sy))| ComponentStats {
                label: i as u32 + 1,
                area,
                bbox,
                centroid: [(sx / area as f64) as f32, (sy / area as f64) as f32],
            })
            .collect()
    }

    /// Drop components smaller than `min_area` and renumber the rest densely.
    pub fn filter_min_area(&self, min_area: usize) -> Labels {
        let mut areas = vec![0usize; self.count + 1];
        for &l in &self.data {
            areas[l as usize] += 1;
        }
        let mut remap = vec![0u32; self.count + 1];
        let mut next = 0u32;
        for label in 1..=self.count {
            if areas[label] >= min_area {
                next += 1;
                remap[label] = next;
            }
        }
        Labels {
            w: self.w,
            h: self.h,
            data: self.data.iter().map(|&l| remap[l as usize]).collect(),
            count: next as usize,
        }
    }

    pub fn foreground(&self) -> Mask {
        Mask {
            w: self.w,
            h: self.h,
            data: self.data.iter().map(|&l| u8::from(l != 0)).collect(),
        }
    }
}

/// Label connected foreground regions of `mask`.
pub fn label_components(mask: &Mask, conn: Connectivity) -> Labels {
    if mask.w == 0 || mask.h == 0 {
        return Labels::empty(mask.w, mask.h);
    }
    let ids = connected_components(&mask.to_luma8(), conn.into(), Luma([0u8]));
    raster_ordered(mask.w, mask.h, ids.as_raw())
}

/// Split an arbitrary label map into spatially connected pieces: pixels
/// join when they are adjacent and share the same non-zero input label.
pub fn relabel_connected(raw: &[u32], w: usize, h: usize, conn: Connectivity) -> Labels {
    if w == 0 || h == 0 {
        return Labels::empty(w, h);
    }
    let map = ImageBuffer::<Luma<u32>, Vec<u32>>::from_raw(w as u32, h as u32, raw.to_vec());
    let Some(map) = map else {
        return Labels::empty(w, h);
    };
    let ids = connected_components(&map, conn.into(), Luma([0u32]));
    raster_ordered(w, h, ids.as_raw())
}

/// Renumber component ids densely in order of first appearance.
fn raster_ordered(w: usize, h: usize, ids: &[u32]) -> Labels {
    let mut remap: Vec<u32> = Vec::new();
    let mut next = 0u32;
    let data = ids
        .iter()
        .map(|&id| {
            if id == 0 {
                return 0;
            }
            let slot = id as usize;
            if slot >= remap.len() {
                remap.resize(slot + 1, 0);
            }
            if remap[slot] == 0 {
                next += 1;
                remap[slot] = next;
            }
            remap[slot]
        })
        .collect();
    Labels {
        w,
        h,
        data,
        count: next as usize,
    }
}

pub fn count_components(mask: &Mask, conn: Connectivity) -> usize {
    label_components(mask, conn).count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Mask {
        let mut m = Mask::new(10, 5);
        for y in 1..4 {
            for x in 1..3 {
                m.data[y * 10 + x] = 1;
            }
            for x in 6..9 {
                m.data[y * 10 + x] = 1;
            }
        }
        m
    }

    #[test]
    fn labels_two_separate_blobs() {
        let labels = label_components(&two_blobs(), Connectivity::Eight);
        assert_eq!(labels.count, 2);
        let stats = labels.stats();
        assert_eq!(stats[0].area, 6);
        assert_eq!(stats[1].area, 9);
        assert_eq!(stats[1].bbox, [6, 1, 8, 3]);
    }

    #[test]
    fn diagonal_touch_depends_on_connectivity() {
        let mut m = Mask::new(2, 2);
        m.data = vec![1, 0, 0, 1];
        assert_eq!(count_components(&m, Connectivity::Four), 2);
        assert_eq!(count_components(&m, Connectivity::Eight), 1);
    }

    #[test]
    fn filter_min_area_renumbers() {
        let labels = label_components(&two_blobs(), Connectivity::Eight).filter_min_area(8);
        assert_eq!(labels.count, 1);
        assert_eq!(labels.at(7, 2), 1);
        assert_eq!(labels.at(1, 1), 0);
    }

    #[test]
    fn relabel_splits_equal_labels_that_do_not_touch() {
        let raw = vec![
            5, 5, 0, 5, //
            7, 0, 0, 5, //
            7, 7, 0, 0,
        ];
        let labels = relabel_connected(&raw, 4, 3, Connectivity::Four);
        assert_eq!(labels.count, 3);
        assert_eq!(labels.data, vec![1, 1, 0, 2, 3, 0, 0, 2, 3, 3, 0, 0]);
    }
}
