//! Edge guidance: Canny at fixed, adaptive and multiple scales.
//!
//! Output maps are 1.0 on edges and 0.0 elsewhere (multi-scale fusion may
//! produce intermediate values). Metadata reports the edge density, the
//! 8-bit intensity mean/std and the number of 8-connected edge components.
use super::params::{ParamSpec, ResolvedParams};
use super::{ConditioningType, MethodCatalog, MethodContext, MethodOutput};
use crate::edges::{canny, CannyParams};
use crate::error::ConditioningError;
use crate::filters::{resize_bilinear, rescale};
use crate::image::{ImageF32, Mask};
use crate::regions::{count_components, Connectivity};
use crate::threshold::median_u8;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Block standard deviation (8-bit units) at which the adaptive thresholds
/// are left unshifted.
const REFERENCE_BLOCK_STD: f32 = 32.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeMethod {
    OpencvCanny,
    AdaptiveCanny,
    MultiScaleCanny,
    HedEdges,
    PidinetEdges,
}

impl MethodCatalog for EdgeMethod {
    const KIND: ConditioningType = ConditioningType::Edge;
    const ALL: &'static [Self] = &[
        Self::OpencvCanny,
        Self::AdaptiveCanny,
        Self::MultiScaleCanny,
        Self::HedEdges,
        Self::PidinetEdges,
    ];
    const DEFAULT: Self = Self::OpencvCanny;

    fn name(self) -> &'static str {
        match self {
            Self::OpencvCanny => "opencv_canny",
            Self::AdaptiveCanny => "adaptive_canny",
            Self::MultiScaleCanny => "multi_scale_canny",
            Self::HedEdges => "hed_edges",
            Self::PidinetEdges => "pidinet_edges",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::OpencvCanny => "Canny edges with fixed hysteresis thresholds",
            Self::AdaptiveCanny => "Canny with thresholds derived from the median and local contrast",
            Self::MultiScaleCanny => "Canny at several resize factors, fused back at full size",
            Self::HedEdges => "Holistically-nested edge model (not bundled)",
            Self::PidinetEdges => "Pixel-difference network edge model (not bundled)",
        }
    }

    fn schema(self) -> Vec<ParamSpec> {
        match self {
            Self::OpencvCanny => {
                let mut schema = threshold_schema();
                schema.extend(detector_schema(0));
                schema
            }
            Self::AdaptiveCanny => {
                let mut schema = vec![
                    ParamSpec::float("sigma", 0.33, 0.0, 1.0),
                    ParamSpec::int("grid_size", 8, 1, 64),
                    ParamSpec::float("contrast_weight", 0.5, 0.0, 2.0),
                ];
                schema.extend(detector_schema(5));
                schema
            }
            Self::MultiScaleCanny => {
                let mut schema = vec![
                    ParamSpec::float_list("scales", &[0.5, 1.0, 1.5], 0.1, 4.0),
                    ParamSpec::choice("combination", "max", &["max", "mean", "weighted"]),
                ];
                schema.extend(threshold_schema());
                schema.extend(detector_schema(0));
                schema
            }
            Self::HedEdges | Self::PidinetEdges => Vec::new(),
        }
    }

    fn is_available(self) -> bool {
        !matches!(self, Self::HedEdges | Self::PidinetEdges)
    }

    fn fallback(self) -> Option<Self> {
        (self != Self::OpencvCanny).then_some(Self::OpencvCanny)
    }

    fn run(self, ctx: &MethodContext<'_>) -> Result<MethodOutput, ConditioningError> {
        let p = ctx.params;
        match self {
            Self::OpencvCanny => {
                let params = canny_params(p, p.float("low_threshold"), p.float("high_threshold"));
                Ok(describe(canny(ctx.gray, &params))
                    .with("low_threshold", params.low)
                    .with("high_threshold", params.high))
            }
            Self::AdaptiveCanny => {
                let (low, high) = adaptive_thresholds(
                    ctx.gray,
                    p.float("sigma"),
                    p.usize("grid_size"),
                    p.float("contrast_weight"),
                );
                let params = canny_params(p, low, high);
                Ok(describe(canny(ctx.gray, &params))
                    .with("low_threshold", low)
                    .with("high_threshold", high))
            }
            Self::MultiScaleCanny => {
                let scales = p.list("scales");
                let params = canny_params(p, p.float("low_threshold"), p.float("high_threshold"));
                let fused = multi_scale_canny(ctx, &scales, &params, p.text("combination"))?;
                Ok(describe(fused).with("scales", scales).with("combination", p.text("combination")))
            }
            Self::HedEdges | Self::PidinetEdges => Err(ConditioningError::Unavailable {
                method: self.name().to_string(),
                suggestion: Self::DEFAULT.name().to_string(),
            }),
        }
    }
}

fn threshold_schema() -> Vec<ParamSpec> {
    vec![
        ParamSpec::int("low_threshold", 100, 0, 255),
        ParamSpec::int("high_threshold", 200, 0, 255),
    ]
}

fn detector_schema(default_blur: i64) -> Vec<ParamSpec> {
    vec![
        ParamSpec::int("blur_kernel", default_blur, 0, 31),
        ParamSpec::int("aperture", 3, 3, 7),
        ParamSpec::flag("l2_gradient", false),
    ]
}

fn canny_params(p: &ResolvedParams, low: f32, high: f32) -> CannyParams {
    let aperture = match p.usize("aperture") {
        0..=3 => 3,
        4 | 5 => 5,
        _ => 7,
    };
    CannyParams {
        low: low.min(high),
        high: low.max(high),
        blur_ksize: p.usize("blur_kernel"),
        aperture,
        l2_gradient: p.flag("l2_gradient"),
    }
}

/// Median-based thresholds shifted by the mean block contrast, clamped so the
/// pair stays usable on flat and on very busy images.
pub fn adaptive_thresholds(gray: &ImageF32, sigma: f32, grid_size: usize, contrast_weight: f32) -> (f32, f32) {
    let median = median_u8(gray);
    let shift = contrast_weight * (mean_block_std(gray, grid_size) - REFERENCE_BLOCK_STD);
    let low = ((1.0 - sigma) * median + shift).clamp(10.0, 100.0);
    let high = ((1.0 + sigma) * median + shift).clamp(low + 10.0, 250.0);
    (low, high)
}

/// Mean over a `grid × grid` partition of each block's 8-bit std.
fn mean_block_std(gray: &ImageF32, grid: usize) -> f32 {
    let grid = grid.max(1);
    let bw = gray.w.div_ceil(grid).max(1);
    let bh = gray.h.div_ceil(grid).max(1);
    let mut total = 0.0f32;
    let mut blocks = 0usize;
    for by in (0..gray.h).step_by(bh) {
        for bx in (0..gray.w).step_by(bw) {
            let (mut sum, mut sum2, mut n) = (0.0f32, 0.0f32, 0usize);
            for y in by..(by + bh).min(gray.h) {
                for x in bx..(bx + bw).min(gray.w) {
                    let v = gray.data[y * gray.w + x] * 255.0;
                    sum += v;
                    sum2 += v * v;
                    n += 1;
                }
            }
            if n > 0 {
                let mean = sum / n as f32;
                total += (sum2 / n as f32 - mean * mean).max(0.0).sqrt();
                blocks += 1;
            }
        }
    }
    if blocks == 0 {
        0.0
    } else {
        total / blocks as f32
    }
}

fn canny_at_scale(gray: &ImageF32, scale: f32, params: &CannyParams) -> ImageF32 {
    let scaled = rescale(gray, scale);
    let edges = canny(&scaled, params);
    resize_bilinear(&edges, gray.w, gray.h)
}

/// Run Canny at each scale and fuse the full-size maps.
///
/// `max` keeps the strongest response per pixel, `mean` averages, and
/// `weighted` uses 0.25/0.5/0.25 over three scales sorted low to high (equal
/// weights otherwise).
fn multi_scale_canny(
    ctx: &MethodContext<'_>,
    scales: &[f32],
    params: &CannyParams,
    combination: &str,
) -> Result<ImageF32, ConditioningError> {
    let mut scales = scales.to_vec();
    scales.sort_by(f32::total_cmp);

    #[cfg(feature = "parallel")]
    let maps = scales
        .par_iter()
        .map(|&s| -> Result<ImageF32, ConditioningError> {
            ctx.cancel.check()?;
            Ok(canny_at_scale(ctx.gray, s, params))
        })
        .collect::<Result<Vec<_>, _>>()?;
    #[cfg(not(feature = "parallel"))]
    let maps = scales
        .iter()
        .map(|&s| -> Result<ImageF32, ConditioningError> {
            ctx.cancel.check()?;
            Ok(canny_at_scale(ctx.gray, s, params))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let Some(first) = maps.first() else {
        return Err(ConditioningError::Computation("no scales to combine".into()));
    };
    let weights: Vec<f32> = match combination {
        "weighted" if maps.len() == 3 => vec![0.25, 0.5, 0.25],
        "max" => Vec::new(),
        _ => vec![1.0 / maps.len() as f32; maps.len()],
    };
    if weights.is_empty() {
        return Ok(maps[1..].iter().fold(first.clone(), |acc, m| acc.zip_map(m, f32::max)));
    }
    let mut fused = ImageF32::new(first.w, first.h);
    for (map, wgt) in maps.iter().zip(&weights) {
        for (dst, &v) in fused.data.iter_mut().zip(&map.data) {
            *dst += wgt * v;
        }
    }
    Ok(fused.clamped_unit())
}

fn describe(edges: ImageF32) -> MethodOutput {
    let density = if edges.is_empty() {
        0.0
    } else {
        edges.count_above(0.5) as f32 / edges.len() as f32
    };
    let (mean, std) = edges.mean_std();
    let components = count_components(&Mask::from_threshold(&edges, 0.5), Connectivity::Eight);
    MethodOutput::new(edges)
        .with("edge_density", density)
        .with("mean_intensity", mean * 255.0)
        .with("std_intensity", std * 255.0)
        .with("connected_components", components)
}
