//! Depth guidance synthesized from 2-D shape.
//!
//! There is no sensor depth here: every method turns "how deep inside the
//! ink" into "how close to the viewer". Brighter output means closer.
use super::params::{ParamSpec, ResolvedParams};
use super::{ConditioningType, MethodCatalog, MethodContext, MethodOutput};
use crate::edges::sobel_gradients;
use crate::error::ConditioningError;
use crate::filters::gaussian_blur;
use crate::image::{ImageF32, Mask};
use crate::morphology::{dilate, erode, StructuringElement};
use crate::regions::{distance_transform, label_components, Connectivity, DistanceMetric};
use crate::threshold::foreground_mask;
use nalgebra::Vector3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepthMethod {
    StrokeThickness,
    DistanceTransform,
    Morphological,
    Synthetic3d,
    MultiLayer,
    AiDepthEstimation,
}

impl MethodCatalog for DepthMethod {
    const KIND: ConditioningType = ConditioningType::Depth;
    const ALL: &'static [Self] = &[
        Self::StrokeThickness,
        Self::DistanceTransform,
        Self::Morphological,
        Self::Synthetic3d,
        Self::MultiLayer,
        Self::AiDepthEstimation,
    ];
    const DEFAULT: Self = Self::StrokeThickness;

    fn name(self) -> &'static str {
        match self {
            Self::StrokeThickness => "stroke_thickness_depth",
            Self::DistanceTransform => "distance_transform_depth",
            Self::Morphological => "morphological_depth",
            Self::Synthetic3d => "synthetic_3d_depth",
            Self::MultiLayer => "multi_layer_depth",
            Self::AiDepthEstimation => "ai_depth_estimation",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::StrokeThickness => "Erosion sweep weighted by kernel size; thick strokes come forward",
            Self::DistanceTransform => "Normalized distance of each ink pixel to the background",
            Self::Morphological => "Layered bands from repeated erode/dilate cycles",
            Self::Synthetic3d => "Per-shape extrusion with perspective skew and directional shading",
            Self::MultiLayer => "Curve-weighted blend of stroke-thickness and distance depth",
            Self::AiDepthEstimation => "Monocular depth model (not bundled)",
        }
    }

    fn schema(self) -> Vec<ParamSpec> {
        match self {
            Self::StrokeThickness => vec![
                ParamSpec::int("min_kernel", 3, 1, 31),
                ParamSpec::int("max_kernel", 15, 1, 63),
                ParamSpec::int("kernel_step", 2, 1, 16),
                ParamSpec::flag("invert", false),
                ParamSpec::float("contrast", 1.2, 0.1, 5.0),
                ParamSpec::int("blur_kernel", 5, 0, 31),
            ],
            Self::DistanceTransform => vec![
                ParamSpec::choice("metric", "euclidean", &["euclidean", "manhattan", "chebyshev"]),
                ParamSpec::flag("invert", false),
                ParamSpec::int("blur_kernel", 0, 0, 31),
            ],
            Self::Morphological => vec![
                ParamSpec::int("iterations", 5, 1, 32),
                ParamSpec::int("kernel_size", 5, 3, 31),
                ParamSpec::float("decay", 0.8, 0.05, 1.0),
                ParamSpec::int("blur_kernel", 3, 0, 31),
            ],
            Self::Synthetic3d => vec![
                ParamSpec::float("extrusion", 1.0, 0.1, 5.0),
                ParamSpec::float("perspective", 0.2, 0.0, 1.0),
                ParamSpec::float_list("light_direction", &[-1.0, -1.0, 1.0], -1.0, 1.0),
                ParamSpec::float("shadow_strength", 0.3, 0.0, 1.0),
            ],
            Self::MultiLayer => vec![
                ParamSpec::choice("blend_mode", "linear", &["linear", "exponential", "sigmoid"]),
                ParamSpec::float("stroke_weight", 0.5, 0.0, 1.0),
            ],
            Self::AiDepthEstimation => Vec::new(),
        }
    }

    fn is_available(self) -> bool {
        self != Self::AiDepthEstimation
    }

    fn fallback(self) -> Option<Self> {
        (self != Self::DistanceTransform).then_some(Self::DistanceTransform)
    }

    fn run(self, ctx: &MethodContext<'_>) -> Result<MethodOutput, ConditioningError> {
        let p = ctx.params;
        let mask = foreground_mask(ctx.gray);
        let depth = match self {
            Self::StrokeThickness => stroke_thickness(ctx, &StrokeSweep::from_params(p))?,
            Self::DistanceTransform => {
                let metric = DistanceMetric::parse(p.text("metric")).unwrap_or(DistanceMetric::Euclidean);
                let mut depth = distance_transform(&mask, metric).normalized();
                if p.flag("invert") {
                    depth = invert_inside(&depth, &mask);
                }
                gaussian_blur(&depth, p.usize("blur_kernel") | 1)
            }
            Self::Morphological => morphological_bands(
                ctx,
                &mask,
                p.usize("iterations"),
                p.usize("kernel_size"),
                p.float("decay"),
            )
            .map(|d| gaussian_blur(&d, p.usize("blur_kernel") | 1))?,
            Self::Synthetic3d => synthetic_3d(&mask, p)?,
            Self::MultiLayer => {
                let stroke = stroke_thickness(ctx, &StrokeSweep::default())?;
                let dt = distance_transform(&mask, DistanceMetric::Euclidean).normalized();
                blend_layers(&stroke, &dt, p.float("stroke_weight"), p.text("blend_mode"))
            }
            Self::AiDepthEstimation => {
                return Err(ConditioningError::Unavailable {
                    method: self.name().to_string(),
                    suggestion: Self::DistanceTransform.name().to_string(),
                })
            }
        };
        Ok(describe(depth, &mask))
    }
}

/// Erosion sweep settings for stroke-thickness depth.
#[derive(Clone, Copy, Debug)]
struct StrokeSweep {
    min_kernel: usize,
    max_kernel: usize,
    step: usize,
    invert: bool,
    contrast: f32,
    blur_ksize: usize,
}

impl Default for StrokeSweep {
    fn default() -> Self {
        Self {
            min_kernel: 3,
            max_kernel: 15,
            step: 2,
            invert: false,
            contrast: 1.2,
            blur_ksize: 5,
        }
    }
}

impl StrokeSweep {
    fn from_params(p: &ResolvedParams) -> Self {
        let (a, b) = (p.usize("min_kernel"), p.usize("max_kernel"));
        Self {
            min_kernel: a.min(b),
            max_kernel: a.max(b),
            step: p.usize("kernel_step").max(1),
            invert: p.flag("invert"),
            contrast: p.float("contrast"),
            blur_ksize: p.usize("blur_kernel"),
        }
    }
}

fn stroke_thickness(ctx: &MethodContext<'_>, sweep: &StrokeSweep) -> Result<ImageF32, ConditioningError> {
    let ink = ctx.gray.inverted();
    let mut acc = ImageF32::new(ink.w, ink.h);
    for k in (sweep.min_kernel..=sweep.max_kernel).step_by(sweep.step) {
        ctx.cancel.check()?;
        let eroded = erode(&ink, &StructuringElement::ellipse(k));
        for (a, &v) in acc.data.iter_mut().zip(&eroded.data) {
            *a += v * k as f32;
        }
    }
    let mut depth = acc.normalized();
    if sweep.invert {
        depth = depth.inverted();
    }
    let contrast = sweep.contrast;
    let depth = depth.map(|v| ((v - 0.5) * contrast + 0.5).clamp(0.0, 1.0));
    Ok(gaussian_blur(&depth, sweep.blur_ksize | 1))
}

/// Far-near flip restricted to the ink; background stays at 0.
fn invert_inside(depth: &ImageF32, mask: &Mask) -> ImageF32 {
    let mut out = depth.clone();
    for (v, &m) in out.data.iter_mut().zip(&mask.data) {
        *v = if m != 0 { 1.0 - *v } else { 0.0 };
    }
    out
}

fn morphological_bands(
    ctx: &MethodContext<'_>,
    mask: &Mask,
    iterations: usize,
    ksize: usize,
    decay: f32,
) -> Result<ImageF32, ConditioningError> {
    let se = StructuringElement::ellipse(ksize);
    let mut current = ImageF32::from_mask(mask);
    let mut depth = current.clone();
    let mut weight = 1.0f32;
    for _ in 0..iterations {
        ctx.cancel.check()?;
        current = erode(&current, &se);
        if current.count_above(0.5) == 0 {
            break;
        }
        weight *= decay;
        let band = dilate(&current, &se);
        for ((d, &b), &c) in depth.data.iter_mut().zip(&band.data).zip(&current.data) {
            // the eroded core steps up; its dilated rim steps up half as much
            *d += weight * (c + b) * 0.5;
        }
    }
    Ok(depth.normalized())
}

fn synthetic_3d(mask: &Mask, p: &ResolvedParams) -> Result<ImageF32, ConditioningError> {
    let light = p.list("light_direction");
    let [lx, ly, lz] = light[..] else {
        return Err(ConditioningError::Validation(format!(
            "light_direction needs 3 components, got {}",
            light.len()
        )));
    };
    let light = Vector3::new(lx, ly, lz);
    let Some(light) = light.try_normalize(f32::EPSILON) else {
        return Err(ConditioningError::Validation("light_direction must be non-zero".into()));
    };

    let (w, h) = (mask.w, mask.h);
    let labels = label_components(mask, Connectivity::Eight);
    let dt = distance_transform(mask, DistanceMetric::Euclidean);
    let mut peak = vec![0.0f32; labels.count + 1];
    for (&l, &d) in labels.data.iter().zip(&dt.data) {
        peak[l as usize] = peak[l as usize].max(d);
    }

    // Each shape is extruded to its own relative height, then skewed so the
    // top of the canvas recedes.
    let extrusion = p.float("extrusion");
    let perspective = p.float("perspective");
    let mut height = ImageF32::new(w, h);
    for y in 0..h {
        let skew = 1.0 - perspective * (1.0 - y as f32 / (h.max(2) - 1) as f32);
        for x in 0..w {
            let i = y * w + x;
            let l = labels.data[i] as usize;
            if l == 0 || peak[l] <= 0.0 {
                continue;
            }
            height.data[i] = (dt.data[i] / peak[l]).sqrt() * extrusion * skew;
        }
    }

    let grad = sobel_gradients(&height);
    let strength = p.float("shadow_strength");
    let mut shaded = height.clone();
    for (i, v) in shaded.data.iter_mut().enumerate() {
        if mask.data[i] == 0 {
            continue;
        }
        let normal = Vector3::new(-grad.gx.data[i], -grad.gy.data[i], 1.0).normalize();
        let lit = normal.dot(&light).clamp(0.0, 1.0);
        *v *= 1.0 - strength + strength * lit;
    }
    Ok(shaded.normalized())
}

/// Blend stroke-thickness depth `a` with distance depth `b`, then reshape
/// the result through the chosen response curve.
fn blend_layers(a: &ImageF32, b: &ImageF32, weight: f32, mode: &str) -> ImageF32 {
    let curve: fn(f32) -> f32 = match mode {
        "exponential" => |v| (2.0 * v).exp_m1() / 2f32.exp_m1(),
        "sigmoid" => |v| {
            let s = |t: f32| 1.0 / (1.0 + (-10.0 * (t - 0.5)).exp());
            (s(v) - s(0.0)) / (s(1.0) - s(0.0))
        },
        _ => |v| v,
    };
    a.zip_map(b, |x, y| curve(weight * x + (1.0 - weight) * y).clamp(0.0, 1.0))
}

fn describe(depth: ImageF32, mask: &Mask) -> MethodOutput {
    let (lo, hi) = depth.min_max();
    let (mean, std) = depth.mean_std();
    let ratio = if mask.data.is_empty() {
        0.0
    } else {
        mask.count() as f32 / mask.data.len() as f32
    };
    MethodOutput::new(depth)
        .with("depth_min", lo)
        .with("depth_max", hi)
        .with("depth_mean", mean)
        .with("depth_std", std)
        .with("foreground_ratio", ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditioning::{CancelToken, Params, ParamValue};

    fn bar_and_block() -> ImageF32 {
        // thin bar on the left, thick block on the right
        ImageF32::from_fn(64, 48, |x, y| {
            let bar = (8..12).contains(&x) && (8..40).contains(&y);
            let block = (28..56).contains(&x) && (8..40).contains(&y);
            if bar || block {
                0.0
            } else {
                1.0
            }
        })
    }

    fn run(method: DepthMethod, gray: &ImageF32, params: &Params) -> Result<MethodOutput, ConditioningError> {
        let source = gray.to_gray_raster();
        let resolved = ResolvedParams::resolve(&method.schema(), params)?;
        let cancel = CancelToken::new();
        let ctx = MethodContext {
            gray,
            source: &source,
            params: &resolved,
            glyph: None,
            cancel: &cancel,
        };
        method.run(&ctx)
    }

    #[test]
    fn thick_strokes_come_forward() {
        let gray = bar_and_block();
        let out = run(DepthMethod::StrokeThickness, &gray, &Params::new()).unwrap();
        let at = |x: usize, y: usize| out.image.data[y * 64 + x];
        assert!(at(42, 24) > at(10, 24));
        assert!(at(10, 24) > at(2, 2) - 1e-6);
    }

    #[test]
    fn distance_depth_peaks_at_centre() {
        let gray = bar_and_block();
        let out = run(DepthMethod::DistanceTransform, &gray, &Params::new()).unwrap();
        let at = |x: usize, y: usize| out.image.data[y * 64 + x];
        assert_eq!(at(2, 2), 0.0);
        assert!(at(42, 24) > at(30, 24));
        assert!((out.metadata["depth_max"].as_f64().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn morphological_bands_step_inward() {
        let gray = bar_and_block();
        let out = run(DepthMethod::Morphological, &gray, &Params::new()).unwrap();
        let at = |x: usize, y: usize| out.image.data[y * 64 + x];
        assert!(at(42, 24) > at(29, 24));
    }

    #[test]
    fn synthetic_3d_rejects_short_light_vector() {
        let mut params = Params::new();
        params.insert("light_direction".into(), ParamValue::List(vec![0.5, 0.5]));
        let err = run(DepthMethod::Synthetic3d, &bar_and_block(), &params).unwrap_err();
        assert!(err.to_string().contains("3 components"));

        let out = run(DepthMethod::Synthetic3d, &bar_and_block(), &Params::new()).unwrap();
        assert_eq!(out.image.data[0], 0.0);
        assert!(out.image.data.iter().any(|&v| v > 0.5));
    }

    #[test]
    fn multi_layer_modes_stay_in_unit_range() {
        for mode in ["linear", "exponential", "sigmoid"] {
            let mut params = Params::new();
            params.insert("blend_mode".into(), mode.into());
            let out = run(DepthMethod::MultiLayer, &bar_and_block(), &params).unwrap();
            assert!(out.image.data.iter().all(|v| (0.0..=1.0).contains(v)), "{mode}");
        }
    }
}
