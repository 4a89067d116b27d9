//! Segmentation guidance: label maps rendered as evenly spaced grey levels.
//!
//! Every method produces a [`Labels`] partition (0 = background) or a
//! per-pixel class level. Label `l` of `n` is painted at `l / n`, so distinct
//! regions always get distinct levels and the brightest region sits at 1.0.
use super::params::{ParamSpec, ResolvedParams};
use super::{ConditioningType, MethodCatalog, MethodContext, MethodOutput};
use crate::angle::orientation_distance_deg;
use crate::cluster::{kmeans, mean_shift, ColorSpace};
use crate::contours::{find_contours, simplify_closed};
use crate::draw::{draw_polyline, draw_thick_line};
use crate::edges::sobel_gradients;
use crate::error::ConditioningError;
use crate::image::{ImageF32, Mask};
use crate::regions::{
    distance_transform, label_components, merge_small_regions, peak_markers, slic, watershed,
    Connectivity, DistanceMetric, Labels, SlicParams,
};
use crate::segments::{lsd_extract_segments, LineSegment, LsdOptions};
use crate::threshold::foreground_mask;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::collections::VecDeque;

/// Fixed grey levels of the stroke classes.
const HORIZONTAL_LEVEL: f32 = 64.0 / 255.0;
const VERTICAL_LEVEL: f32 = 128.0 / 255.0;
const DIAGONAL_LEVEL: f32 = 192.0 / 255.0;
const CURVED_LEVEL: f32 = 1.0;

/// Fixed grey levels of the geometric primitive classes.
const LINE_LEVEL: f32 = 85.0 / 255.0;
const POLYGON_LEVEL: f32 = 170.0 / 255.0;
const CIRCLE_LEVEL: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentationMethod {
    Radical,
    StrokeType,
    Hierarchical,
    SemanticZone,
    ColorBased,
    Geometric,
}

impl MethodCatalog for SegmentationMethod {
    const KIND: ConditioningType = ConditioningType::Segmentation;
    const ALL: &'static [Self] = &[
        Self::Radical,
        Self::StrokeType,
        Self::Hierarchical,
        Self::SemanticZone,
        Self::ColorBased,
        Self::Geometric,
    ];
    const DEFAULT: Self = Self::Radical;

    fn name(self) -> &'static str {
        match self {
            Self::Radical => "radical_segmentation",
            Self::StrokeType => "stroke_type_segmentation",
            Self::Hierarchical => "hierarchical_segmentation",
            Self::SemanticZone => "semantic_zone_segmentation",
            Self::ColorBased => "color_based_segmentation",
            Self::Geometric => "geometric_segmentation",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Radical => "Connected components, split by watershed when the glyph is one piece",
            Self::StrokeType => "Line segments classed horizontal/vertical/diagonal/curved, gaps filled",
            Self::Hierarchical => "Superpixels with small regions merged into their closest neighbour",
            Self::SemanticZone => "Left/right and top/bottom zones from stroke density gaps",
            Self::ColorBased => "Colour clustering by k-means, mean shift or watershed",
            Self::Geometric => "Lines, circles and polygons painted per primitive type",
        }
    }

    fn schema(self) -> Vec<ParamSpec> {
        match self {
            Self::Radical => vec![
                ParamSpec::int("min_area", 50, 1, 1_000_000),
                ParamSpec::choice("connectivity", "eight", &["four", "eight"]),
                ParamSpec::int("min_distance", 5, 1, 256),
            ],
            Self::StrokeType => vec![
                ParamSpec::float("angle_tolerance", 15.0, 1.0, 45.0),
                ParamSpec::int("min_length", 8, 2, 1000),
                ParamSpec::float("curve_ratio", 0.25, 0.0, 1.0),
                ParamSpec::int("stroke_width", 3, 1, 31),
            ],
            Self::Hierarchical => vec![
                ParamSpec::int("n_segments", 100, 2, 5000),
                ParamSpec::float("compactness", 10.0, 0.1, 100.0),
                ParamSpec::int("iterations", 10, 1, 50),
                ParamSpec::int("min_region_size", 50, 1, 1_000_000),
            ],
            Self::SemanticZone => vec![
                ParamSpec::float("gap_ratio", 0.15, 0.0, 0.5),
                ParamSpec::float("top_modifier_ratio", 0.4, 0.1, 0.9),
            ],
            Self::ColorBased => vec![
                ParamSpec::choice("algorithm", "kmeans", &["kmeans", "meanshift", "watershed"]),
                ParamSpec::choice("color_space", "lab", &["rgb", "hsv", "lab"]),
                ParamSpec::int("n_clusters", 4, 2, 32),
                ParamSpec::float("bandwidth", 12.0, 1.0, 100.0),
                ParamSpec::int("max_iterations", 20, 1, 200),
                ParamSpec::int("seed", 42, 0, i64::MAX),
            ],
            Self::Geometric => vec![
                ParamSpec::int("min_line_length", 10, 2, 1000),
                ParamSpec::float("circularity", 0.8, 0.1, 1.0),
                ParamSpec::float("epsilon_ratio", 0.02, 0.001, 0.2),
                ParamSpec::int("min_area", 30, 1, 1_000_000),
            ],
        }
    }

    fn fallback(self) -> Option<Self> {
        None
    }

    fn run(self, ctx: &MethodContext<'_>) -> Result<MethodOutput, ConditioningError> {
        let p = ctx.params;
        match self {
            Self::Radical => radical_segmentation(ctx),
            Self::StrokeType => stroke_type_segmentation(ctx.gray, p),
            Self::Hierarchical => {
                let features = lab_features(ctx);
                let params = SlicParams {
                    n_segments: p.usize("n_segments"),
                    compactness: p.float("compactness"),
                    iterations: p.usize("iterations"),
                };
                let raw = slic(&features, ctx.gray.w, ctx.gray.h, &params);
                ctx.cancel.check()?;
                let merged = merge_small_regions(&raw, &features, p.usize("min_region_size"));
                Ok(describe_labels(&merged).with("initial_segments", raw.count))
            }
            Self::SemanticZone => Ok(semantic_zones(ctx.gray, p)),
            Self::ColorBased => color_segmentation(ctx),
            Self::Geometric => geometric_segmentation(ctx.gray, p),
        }
    }
}

/// Best-effort component breakdown of a character.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RadicalEntry {
    pub character: char,
    pub structure: &'static str,
    pub components: &'static [&'static str],
}

const RADICALS: &[RadicalEntry] = &[
    RadicalEntry { character: '好', structure: "left_right", components: &["女", "子"] },
    RadicalEntry { character: '明', structure: "left_right", components: &["日", "月"] },
    RadicalEntry { character: '林', structure: "left_right", components: &["木", "木"] },
    RadicalEntry { character: '休', structure: "left_right", components: &["亻", "木"] },
    RadicalEntry { character: '森', structure: "top_bottom", components: &["木", "林"] },
    RadicalEntry { character: '火', structure: "single", components: &["火"] },
    RadicalEntry { character: '炎', structure: "top_bottom", components: &["火", "火"] },
    RadicalEntry { character: '江', structure: "left_right", components: &["氵", "工"] },
    RadicalEntry { character: '河', structure: "left_right", components: &["氵", "可"] },
    RadicalEntry { character: '妈', structure: "left_right", components: &["女", "马"] },
    RadicalEntry { character: '字', structure: "top_bottom", components: &["宀", "子"] },
    RadicalEntry { character: '想', structure: "top_bottom", components: &["相", "心"] },
    RadicalEntry { character: '词', structure: "left_right", components: &["讠", "司"] },
    RadicalEntry { character: '语', structure: "left_right", components: &["讠", "吾"] },
    RadicalEntry { character: '他', structure: "left_right", components: &["亻", "也"] },
    RadicalEntry { character: '你', structure: "left_right", components: &["亻", "尔"] },
    RadicalEntry { character: '们', structure: "left_right", components: &["亻", "门"] },
    RadicalEntry { character: '说', structure: "left_right", components: &["讠", "兑"] },
    RadicalEntry { character: '和', structure: "left_right", components: &["禾", "口"] },
    RadicalEntry { character: '国', structure: "enclosure", components: &["囗", "玉"] },
    RadicalEntry { character: '人', structure: "single", components: &["人"] },
    RadicalEntry { character: '水', structure: "single", components: &["水"] },
];

pub fn radical_decomposition(character: char) -> Option<&'static RadicalEntry> {
    RADICALS.iter().find(|e| e.character == character)
}

fn radical_segmentation(ctx: &MethodContext<'_>) -> Result<MethodOutput, ConditioningError> {
    let p = ctx.params;
    let conn = match p.text("connectivity") {
        "four" => Connectivity::Four,
        _ => Connectivity::Eight,
    };
    let mask = foreground_mask(ctx.gray);
    let mut labels = label_components(&mask, conn).filter_min_area(p.usize("min_area"));
    let components = labels.count;

    // A single blob says nothing about structure; split it along the necks
    // between distance-transform peaks.
    let mut refined = false;
    if labels.count < 2 {
        ctx.cancel.check()?;
        let kept = if labels.count == 1 { labels.foreground() } else { mask.clone() };
        let dt = distance_transform(&kept, DistanceMetric::Euclidean);
        let markers = peak_markers(&dt, &kept, p.usize("min_distance"), 1.0);
        if markers.count >= 2 {
            let split = watershed(&dt.map(|d| -d), &markers, &kept);
            labels = split.filter_min_area(1);
            refined = true;
        }
    }

    let radicals: Vec<Value> = ctx
        .glyph
        .unwrap_or_default()
        .chars()
        .filter_map(radical_decomposition)
        .map(|e| {
            json!({
                "character": e.character.to_string(),
                "structure": e.structure,
                "components": e.components,
            })
        })
        .collect();

    Ok(describe_labels(&labels)
        .with("connected_components", components)
        .with("watershed_refined", refined)
        .with("radicals", radicals))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StrokeClass {
    Horizontal,
    Vertical,
    Diagonal,
    Curved,
}

impl StrokeClass {
    fn level(self) -> f32 {
        match self {
            Self::Horizontal => HORIZONTAL_LEVEL,
            Self::Vertical => VERTICAL_LEVEL,
            Self::Diagonal => DIAGONAL_LEVEL,
            Self::Curved => CURVED_LEVEL,
        }
    }
}

fn classify_stroke(seg: &LineSegment, tolerance_deg: f32, curve_ratio: f32) -> StrokeClass {
    if seg.thickness_ratio > curve_ratio {
        return StrokeClass::Curved;
    }
    let theta = seg.orientation_deg();
    if orientation_distance_deg(theta, 0.0) <= tolerance_deg {
        StrokeClass::Horizontal
    } else if orientation_distance_deg(theta, 90.0) <= tolerance_deg {
        StrokeClass::Vertical
    } else {
        StrokeClass::Diagonal
    }
}

fn stroke_type_segmentation(gray: &ImageF32, p: &ResolvedParams) -> Result<MethodOutput, ConditioningError> {
    let options = LsdOptions {
        min_length_px: p.float("min_length"),
        ..LsdOptions::default()
    };
    let segments = lsd_extract_segments(gray, options);
    let tolerance = p.float("angle_tolerance");
    let curve_ratio = p.float("curve_ratio");
    let width = p.float("stroke_width");

    let mut painted = ImageF32::new(gray.w, gray.h);
    let mut counts = [0usize; 4];
    for seg in &segments {
        let class = classify_stroke(seg, tolerance, curve_ratio);
        counts[class as usize] += 1;
        draw_thick_line(&mut painted, seg.p0, seg.p1, width, class.level());
    }
    let mask = foreground_mask(gray);
    let filled = fill_from_nearest(&painted, &mask);
    Ok(describe_levels(filled, &mask)
        .with("segment_count", segments.len())
        .with(
            "stroke_classes",
            json!({
                "horizontal": counts[0],
                "vertical": counts[1],
                "diagonal": counts[2],
                "curved": counts[3],
            }),
        ))
}

/// Ink pixels take the level of the nearest painted ink pixel (8-connected
/// geodesic BFS); painting outside the ink is discarded. Ink unreachable
/// from any painted pixel takes a neutral mid level.
fn fill_from_nearest(painted: &ImageF32, mask: &Mask) -> ImageF32 {
    let (w, h) = (mask.w, mask.h);
    let mut out = ImageF32::new(w, h);
    let mut seen = vec![false; w * h];
    let mut queue = VecDeque::new();
    for i in 0..w * h {
        if mask.data[i] != 0 && painted.data[i] > 0.0 {
            out.data[i] = painted.data[i];
            seen[i] = true;
            queue.push_back(i);
        }
    }
    while let Some(i) = queue.pop_front() {
        let (x, y) = ((i % w) as isize, (i / w) as isize);
        for &(dx, dy) in Connectivity::Eight.offsets() {
            let (nx, ny) = (x + dx, y + dy);
            if !mask.is_set_signed(nx, ny) {
                continue;
            }
            let n = ny as usize * w + nx as usize;
            if !seen[n] {
                seen[n] = true;
                out.data[n] = out.data[i];
                queue.push_back(n);
            }
        }
    }
    for i in 0..w * h {
        if mask.data[i] != 0 && !seen[i] {
            out.data[i] = 0.5;
        }
    }
    out
}

fn lab_features(ctx: &MethodContext<'_>) -> Vec<[f32; 3]> {
    ctx.rgb().into_iter().map(|px| ColorSpace::Lab.convert(px)).collect()
}

/// Longest run of low-density bins strictly inside `profile`, as
/// `(start, end_exclusive)`.
fn widest_gap(profile: &[usize], ratio: f32) -> Option<(usize, usize)> {
    let peak = profile.iter().copied().max().unwrap_or(0);
    if peak == 0 || profile.len() < 3 {
        return None;
    }
    let cut = ratio * peak as f32;
    let mut best: Option<(usize, usize)> = None;
    let mut run_start = None;
    for (i, &v) in profile.iter().enumerate() {
        let low = v as f32 <= cut;
        match (low, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(s)) => {
                if s > 0 && best.map_or(true, |(bs, be)| i - s > be - bs) {
                    best = Some((s, i));
                }
                run_start = None;
            }
            _ => {}
        }
    }
    best
}

#[derive(Clone, Copy, Debug)]
enum ZoneSplit {
    /// Left of the column goes to zone 0.
    Columns(usize),
    /// Above the row goes to zone 0.
    Rows(usize),
    Whole,
}

impl ZoneSplit {
    fn names(self) -> &'static [&'static str] {
        match self {
            Self::Columns(_) => &["left", "right"],
            Self::Rows(_) => &["top", "bottom"],
            Self::Whole => &["whole"],
        }
    }

    fn zone(self, x: usize, y: usize) -> usize {
        match self {
            Self::Columns(cx) => usize::from(x >= cx),
            Self::Rows(cy) => usize::from(y >= cy),
            Self::Whole => 0,
        }
    }
}

fn semantic_zones(gray: &ImageF32, p: &ResolvedParams) -> MethodOutput {
    let mask = foreground_mask(gray);
    let Some((x0, y0, x1, y1)) = mask.bounding_box() else {
        return describe_levels(ImageF32::new(gray.w, gray.h), &mask).with("layout", "empty");
    };
    let cols: Vec<usize> = (x0..=x1)
        .map(|x| (y0..=y1).filter(|&y| mask.is_set(x, y)).count())
        .collect();
    let rows: Vec<usize> = (y0..=y1)
        .map(|y| (x0..=x1).filter(|&x| mask.is_set(x, y)).count())
        .collect();
    let ratio = p.float("gap_ratio");
    let col_gap = widest_gap(&cols, ratio);
    let row_gap = widest_gap(&rows, ratio);
    let width = |g: Option<(usize, usize)>| g.map_or(0, |(s, e)| e - s);

    let (layout, split) = match (col_gap, row_gap) {
        (Some((s, e)), _) if width(col_gap) >= width(row_gap) => ("left_right", ZoneSplit::Columns(x0 + (s + e) / 2)),
        (_, Some((s, e))) => {
            let cy = y0 + (s + e) / 2;
            let top_share = (cy - y0) as f32 / (y1 - y0 + 1) as f32;
            if top_share < p.float("top_modifier_ratio") {
                ("top_modifier", ZoneSplit::Rows(cy))
            } else {
                ("top_bottom", ZoneSplit::Rows(cy))
            }
        }
        _ => ("single", ZoneSplit::Whole),
    };
    let names = split.names();

    let mut out = ImageF32::new(gray.w, gray.h);
    let mut zones: Vec<(usize, [usize; 4])> = vec![(0, [usize::MAX, usize::MAX, 0, 0]); names.len()];
    for y in y0..=y1 {
        for x in x0..=x1 {
            if !mask.is_set(x, y) {
                continue;
            }
            let z = split.zone(x, y);
            out.data[y * gray.w + x] = (z + 1) as f32 / names.len() as f32;
            let (n, bb) = &mut zones[z];
            *n += 1;
            *bb = [bb[0].min(x), bb[1].min(y), bb[2].max(x), bb[3].max(y)];
        }
    }
    let zone_meta: Vec<Value> = names
        .iter()
        .zip(&zones)
        .map(|(name, (n, bb))| json!({ "zone": name, "pixels": n, "bbox": bb }))
        .collect();
    describe_levels(out, &mask)
        .with("layout", layout)
        .with("zones", zone_meta)
}

fn color_segmentation(ctx: &MethodContext<'_>) -> Result<MethodOutput, ConditioningError> {
    let p = ctx.params;
    let (w, h) = (ctx.gray.w, ctx.gray.h);
    let space = ColorSpace::parse(p.text("color_space")).unwrap_or(ColorSpace::Lab);
    let samples: Vec<[f32; 3]> = ctx.rgb().into_iter().map(|px| space.convert(px)).collect();
    let algorithm = p.text("algorithm");

    let labels = match algorithm {
        "watershed" => {
            let grad = sobel_gradients(ctx.gray).mag.normalized();
            let flat = Mask::from_threshold(&grad.map(|g| 1.0 - g), 0.95);
            let markers = label_components(&flat, Connectivity::Eight).filter_min_area(16);
            if markers.count == 0 {
                return Err(ConditioningError::Computation("no flat regions to seed the watershed".into()));
            }
            let everything = Mask {
                w,
                h,
                data: vec![1; w * h],
            };
            watershed(&grad, &markers, &everything)
        }
        _ => {
            let clustering = if algorithm == "meanshift" {
                let stride = (samples.len() / 1024).max(1);
                mean_shift(&samples, p.float("bandwidth"), stride, p.usize("max_iterations"))
            } else {
                let seed = p.optional_seed("seed").unwrap_or(0);
                let mut rng = StdRng::seed_from_u64(seed);
                kmeans(&samples, p.usize("n_clusters"), p.usize("max_iterations"), &mut rng)
            };
            ctx.cancel.check()?;
            occupied_clusters(w, h, &clustering.assignments)
        }
    };
    let sizes: Vec<usize> = (1..=labels.count as u32)
        .map(|l| labels.data.iter().filter(|&&v| v == l).count())
        .collect();
    Ok(MethodOutput::new(paint_labels(&labels))
        .with("segment_count", labels.count)
        .with("cluster_sizes", sizes)
        .with("algorithm", algorithm)
        .with("color_space", p.text("color_space")))
}

/// Label map with one label per cluster that owns at least one pixel, in
/// cluster order.
fn occupied_clusters(w: usize, h: usize, assignments: &[usize]) -> Labels {
    let clusters = assignments.iter().max().map_or(0, |&m| m + 1);
    let mut remap = vec![0u32; clusters];
    for &a in assignments {
        remap[a] = 1;
    }
    let mut next = 0u32;
    for slot in remap.iter_mut().filter(|s| **s != 0) {
        next += 1;
        *slot = next;
    }
    Labels {
        w,
        h,
        data: assignments.iter().map(|&a| remap[a]).collect(),
        count: next as usize,
    }
}

fn geometric_segmentation(gray: &ImageF32, p: &ResolvedParams) -> Result<MethodOutput, ConditioningError> {
    let mask = foreground_mask(gray);
    let mut painted = ImageF32::new(gray.w, gray.h);

    let options = LsdOptions {
        min_length_px: p.float("min_line_length"),
        ..LsdOptions::default()
    };
    let lines: Vec<LineSegment> = lsd_extract_segments(gray, options)
        .into_iter()
        .filter(|s| s.thickness_ratio <= 0.25)
        .collect();
    for seg in &lines {
        draw_thick_line(&mut painted, seg.p0, seg.p1, 2.0, LINE_LEVEL);
    }

    let min_area = p.float("min_area");
    let (mut circles, mut polygons) = (0usize, 0usize);
    for contour in find_contours(&mask) {
        if contour.area().abs() < min_area {
            continue;
        }
        if contour.circularity() > p.float("circularity") {
            draw_polyline(&mut painted, &contour.points, true, 2.0, CIRCLE_LEVEL);
            circles += 1;
        } else {
            let eps = p.float("epsilon_ratio") * contour.perimeter();
            let poly = simplify_closed(&contour.points, eps);
            draw_polyline(&mut painted, &poly, true, 2.0, POLYGON_LEVEL);
            polygons += 1;
        }
    }

    let filled = fill_from_nearest(&painted, &mask);
    Ok(describe_levels(filled, &mask)
        .with("line_count", lines.len())
        .with("circle_count", circles)
        .with("polygon_count", polygons))
}

fn paint_labels(labels: &Labels) -> ImageF32 {
    let n = labels.count.max(1) as f32;
    ImageF32 {
        w: labels.w,
        h: labels.h,
        data: labels.data.iter().map(|&l| l as f32 / n).collect(),
    }
}

fn describe_labels(labels: &Labels) -> MethodOutput {
    let segments: Vec<Value> = labels
        .stats()
        .iter()
        .map(|s| {
            json!({
                "label": s.label,
                "area": s.area,
                "bbox": s.bbox,
                "centroid": s.centroid,
            })
        })
        .collect();
    MethodOutput::new(paint_labels(labels))
        .with("segment_count", labels.count)
        .with("segments", segments)
}

/// Statistics for class-level maps: one entry per distinct non-zero level.
fn describe_levels(image: ImageF32, mask: &Mask) -> MethodOutput {
    let mut levels: Vec<(u8, usize)> = Vec::new();
    for (&v, &m) in image.data.iter().zip(&mask.data) {
        if m == 0 || v <= 0.0 {
            continue;
        }
        let q = (v * 255.0).round() as u8;
        match levels.iter_mut().find(|(l, _)| *l == q) {
            Some((_, n)) => *n += 1,
            None => levels.push((q, 1)),
        }
    }
    levels.sort_unstable();
    let stats: Vec<Value> = levels
        .iter()
        .map(|(level, n)| json!({ "level": level, "pixels": n }))
        .collect();
    MethodOutput::new(image)
        .with("segment_count", levels.len())
        .with("segments", stats)
}
