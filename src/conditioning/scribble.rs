//! Scribble guidance: centerlines, outlines and simulated hand drawing.
//!
//! Outputs are white strokes (1.0) on black.
use super::params::{ParamSpec, ParamValue, Params, ResolvedParams};
use super::{ConditioningType, MethodCatalog, MethodContext, MethodOutput};
use crate::contours::{chaikin, find_contours, simplify_closed};
use crate::draw::{draw_polyline, draw_thick_line};
use crate::error::ConditioningError;
use crate::image::{ImageF32, Mask};
use crate::morphology::{close_mask, dilate, erode_mask, open_mask, StructuringElement};
use crate::thinning::{medial_axis, trace_paths, zhang_suen};
use crate::threshold::{adaptive_mean_mask, foreground_mask};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

/// Local-mean offset (8-bit units) for adaptive binarization.
const ADAPTIVE_OFFSET: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScribbleMethod {
    Skeletonization,
    Morphological,
    Vectorization,
    HandDrawn,
    MultiLevel,
    StyleAware,
    AiSketchGeneration,
}

impl MethodCatalog for ScribbleMethod {
    const KIND: ConditioningType = ConditioningType::Scribble;
    const ALL: &'static [Self] = &[
        Self::Skeletonization,
        Self::Morphological,
        Self::Vectorization,
        Self::HandDrawn,
        Self::MultiLevel,
        Self::StyleAware,
        Self::AiSketchGeneration,
    ];
    const DEFAULT: Self = Self::Skeletonization;

    fn name(self) -> &'static str {
        match self {
            Self::Skeletonization => "skeletonization_scribble",
            Self::Morphological => "morphological_scribble",
            Self::Vectorization => "vectorization_scribble",
            Self::HandDrawn => "hand_drawn_scribble",
            Self::MultiLevel => "multi_level_scribble",
            Self::StyleAware => "style_aware_scribble",
            Self::AiSketchGeneration => "ai_sketch_generation",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Skeletonization => "One-pixel centerline by Zhang-Suen thinning or medial axis",
            Self::Morphological => "Outlines of the shape after opening, closing or erosion",
            Self::Vectorization => "Simplified, optionally smoothed contour polygons",
            Self::HandDrawn => "Skeleton redrawn with tremor, pressure and sensor noise",
            Self::MultiLevel => "Precise, medium and loose abstractions, one or blended",
            Self::StyleAware => "Style preset dispatched to another scribble method",
            Self::AiSketchGeneration => "Learned sketch model (not bundled)",
        }
    }

    fn schema(self) -> Vec<ParamSpec> {
        match self {
            Self::Skeletonization => vec![
                ParamSpec::choice("algorithm", "zhang_suen", &["zhang_suen", "medial_axis"]),
                ParamSpec::flag("adaptive_threshold", false),
                ParamSpec::int("block_size", 15, 3, 101),
                ParamSpec::int("noise_kernel", 3, 1, 15),
                ParamSpec::int("line_width", 1, 1, 15),
            ],
            Self::Morphological => vec![
                ParamSpec::choice("operation", "close", &["open", "close", "erode"]),
                ParamSpec::int("kernel_size", 5, 1, 31),
                ParamSpec::int("line_width", 2, 1, 15),
            ],
            Self::Vectorization => vec![
                ParamSpec::int("min_area", 20, 0, 1_000_000),
                ParamSpec::float("epsilon_factor", 0.01, 0.0005, 0.2),
                ParamSpec::flag("smooth", true),
                ParamSpec::int("smooth_iterations", 2, 0, 6),
                ParamSpec::int("line_width", 2, 1, 15),
            ],
            Self::HandDrawn => vec![
                ParamSpec::float("jitter", 1.5, 0.0, 10.0),
                ParamSpec::flag("pressure", true),
                ParamSpec::float("base_width", 2.0, 0.5, 10.0),
                ParamSpec::float("noise", 0.05, 0.0, 0.5),
                ParamSpec::int("seed", -1, -1, i64::MAX),
            ],
            Self::MultiLevel => vec![
                ParamSpec::choice("level", "blend", &["precise", "medium", "loose", "blend"]),
                ParamSpec::int("loose_kernel", 9, 3, 31),
            ],
            Self::StyleAware => vec![
                ParamSpec::choice("style", "technical", Style::NAMES),
                ParamSpec::int("seed", 0, -1, i64::MAX),
            ],
            Self::AiSketchGeneration => Vec::new(),
        }
    }

    fn is_available(self) -> bool {
        self != Self::AiSketchGeneration
    }

    fn fallback(self) -> Option<Self> {
        (self != Self::Skeletonization).then_some(Self::Skeletonization)
    }

    fn run(self, ctx: &MethodContext<'_>) -> Result<MethodOutput, ConditioningError> {
        let p = ctx.params;
        match self {
            Self::Skeletonization => {
                let mask = if p.flag("adaptive_threshold") {
                    adaptive_mean_mask(ctx.gray, p.usize("block_size"), ADAPTIVE_OFFSET)
                } else {
                    foreground_mask(ctx.gray)
                };
                let mask = open_if(mask, p.usize("noise_kernel"));
                let skeleton = match p.text("algorithm") {
                    "medial_axis" => medial_axis(&mask).0,
                    _ => zhang_suen(&mask),
                };
                Ok(describe_skeleton(&skeleton, p.usize("line_width")))
            }
            Self::Morphological => {
                let mask = foreground_mask(ctx.gray);
                let se = StructuringElement::ellipse(p.usize("kernel_size"));
                let shaped = match p.text("operation") {
                    "open" => open_mask(&mask, &se),
                    "erode" => erode_mask(&mask, &se),
                    _ => close_mask(&mask, &se),
                };
                let mut out = ImageF32::new(mask.w, mask.h);
                let contours = find_contours(&shaped);
                for c in &contours {
                    draw_polyline(&mut out, &c.points, true, p.float("line_width"), 1.0);
                }
                Ok(MethodOutput::new(out).with("contour_count", contours.len()))
            }
            Self::Vectorization => Ok(vectorize(ctx.gray, p)),
            Self::HandDrawn => hand_drawn(ctx.gray, p),
            Self::MultiLevel => Ok(multi_level(ctx.gray, p.text("level"), p.usize("loose_kernel"))),
            Self::StyleAware => {
                let style = Style::parse(p.text("style")).unwrap_or(Style::Technical);
                let (target, preset) = style.preset(p.int("seed"));
                let resolved = ResolvedParams::resolve(&target.schema(), &preset)?;
                let delegated = MethodContext {
                    gray: ctx.gray,
                    source: ctx.source,
                    params: &resolved,
                    glyph: ctx.glyph,
                    cancel: ctx.cancel,
                };
                Ok(target
                    .run(&delegated)?
                    .with("style", style.name())
                    .with("delegated_to", target.name()))
            }
            Self::AiSketchGeneration => Err(ConditioningError::Unavailable {
                method: self.name().to_string(),
                suggestion: Self::DEFAULT.name().to_string(),
            }),
        }
    }
}

fn open_if(mask: Mask, ksize: usize) -> Mask {
    if ksize > 1 {
        open_mask(&mask, &StructuringElement::ellipse(ksize))
    } else {
        mask
    }
}

fn render_skeleton(skeleton: &Mask, line_width: usize) -> ImageF32 {
    let img = ImageF32::from_mask(skeleton);
    if line_width > 1 {
        dilate(&img, &StructuringElement::ellipse(line_width))
    } else {
        img
    }
}

fn describe_skeleton(skeleton: &Mask, line_width: usize) -> MethodOutput {
    let paths = trace_paths(skeleton).len();
    MethodOutput::new(render_skeleton(skeleton, line_width))
        .with("skeleton_pixels", skeleton.count())
        .with("path_count", paths)
}

fn vectorize(gray: &ImageF32, p: &ResolvedParams) -> MethodOutput {
    let mask = foreground_mask(gray);
    let mut out = ImageF32::new(mask.w, mask.h);
    let min_area = p.float("min_area");
    let (mut kept, mut vertices) = (0usize, 0usize);
    for contour in find_contours(&mask) {
        if contour.area().abs() < min_area {
            continue;
        }
        let eps = p.float("epsilon_factor") * contour.perimeter();
        let mut poly = simplify_closed(&contour.points, eps);
        if p.flag("smooth") {
            poly = chaikin(&poly, p.usize("smooth_iterations"), true);
        }
        vertices += poly.len();
        kept += 1;
        draw_polyline(&mut out, &poly, true, p.float("line_width"), 1.0);
    }
    MethodOutput::new(out)
        .with("contour_count", kept)
        .with("vertex_count", vertices)
}

fn hand_drawn(gray: &ImageF32, p: &ResolvedParams) -> Result<MethodOutput, ConditioningError> {
    let skeleton = zhang_suen(&foreground_mask(gray));
    let paths = trace_paths(&skeleton);
    if paths.is_empty() {
        return Err(ConditioningError::Computation("skeleton is empty; nothing to trace".into()));
    }
    let seed = p.optional_seed("seed");
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let jitter = p.float("jitter");
    let base = p.float("base_width");
    let mut out = ImageF32::new(gray.w, gray.h);
    for path in &paths {
        // Tremor is a random walk pulled back toward the true path, so the
        // stroke wobbles instead of scattering.
        let mut offset = [0.0f32; 2];
        let shaky: Vec<[f32; 2]> = path
            .iter()
            .map(|pt| {
                if jitter > 0.0 {
                    for o in &mut offset {
                        *o = (*o * 0.7 + rng.gen_range(-jitter..=jitter) * 0.5).clamp(-jitter, jitter);
                    }
                }
                [pt[0] + offset[0], pt[1] + offset[1]]
            })
            .collect();
        let n = shaky.len();
        if n == 1 {
            draw_thick_line(&mut out, shaky[0], shaky[0], base, 1.0);
            continue;
        }
        for (i, pair) in shaky.windows(2).enumerate() {
            let width = if p.flag("pressure") {
                let t = (i as f32 + 0.5) / (n - 1) as f32;
                base * (0.5 + 0.5 * (PI * t).sin())
            } else {
                base
            };
            draw_thick_line(&mut out, pair[0], pair[1], width.max(1.0), 1.0);
        }
    }

    let noise = p.float("noise");
    if noise > 0.0 {
        for v in &mut out.data {
            *v = (*v + rng.gen_range(-noise..=noise)).clamp(0.0, 1.0);
        }
    }
    Ok(MethodOutput::new(out)
        .with("path_count", paths.len())
        .with("skeleton_pixels", skeleton.count())
        .with("seeded", seed.is_some()))
}

/// Precise: medial axis. Medium: Zhang-Suen after a small opening.
/// Loose: Zhang-Suen after closing and opening with a large kernel.
fn multi_level(gray: &ImageF32, level: &str, loose_kernel: usize) -> MethodOutput {
    let mask = foreground_mask(gray);
    let precise = || medial_axis(&mask).0;
    let medium = || zhang_suen(&open_mask(&mask, &StructuringElement::ellipse(3)));
    let loose = || {
        let se = StructuringElement::ellipse(loose_kernel);
        zhang_suen(&open_mask(&close_mask(&mask, &se), &se))
    };
    let image = match level {
        "precise" => ImageF32::from_mask(&precise()),
        "medium" => ImageF32::from_mask(&medium()),
        "loose" => ImageF32::from_mask(&loose()),
        _ => {
            let layers = [(precise(), 1.0), (medium(), 0.7), (loose(), 0.4)];
            let mut out = ImageF32::new(mask.w, mask.h);
            for (layer, weight) in &layers {
                for (o, &m) in out.data.iter_mut().zip(&layer.data) {
                    if m != 0 {
                        *o = o.max(*weight);
                    }
                }
            }
            out
        }
    };
    MethodOutput::new(image).with("level", level)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Style {
    Technical,
    Sketchy,
    Artistic,
    Calligraphy,
    Minimal,
    Cartoon,
}

impl Style {
    const NAMES: &'static [&'static str] = &["technical", "sketchy", "artistic", "calligraphy", "minimal", "cartoon"];

    fn name(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Sketchy => "sketchy",
            Self::Artistic => "artistic",
            Self::Calligraphy => "calligraphy",
            Self::Minimal => "minimal",
            Self::Cartoon => "cartoon",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        [
            Self::Technical,
            Self::Sketchy,
            Self::Artistic,
            Self::Calligraphy,
            Self::Minimal,
            Self::Cartoon,
        ]
        .into_iter()
        .find(|s| s.name() == name)
    }

    /// Target method and its parameter overrides.
    fn preset(self, seed: i64) -> (ScribbleMethod, Params) {
        let entries: Vec<(&str, ParamValue)> = match self {
            Self::Technical => vec![
                ("epsilon_factor", 0.005.into()),
                ("smooth", false.into()),
                ("line_width", 1i64.into()),
            ],
            Self::Sketchy => vec![
                ("jitter", 2.0.into()),
                ("noise", 0.03.into()),
                ("base_width", 1.5.into()),
                ("seed", seed.into()),
            ],
            Self::Artistic => vec![
                ("jitter", 1.0.into()),
                ("base_width", 3.0.into()),
                ("noise", 0.0.into()),
                ("seed", seed.into()),
            ],
            Self::Calligraphy => vec![("algorithm", "medial_axis".into()), ("line_width", 4i64.into())],
            Self::Minimal => vec![
                ("epsilon_factor", 0.03.into()),
                ("min_area", 100i64.into()),
                ("smooth_iterations", 3i64.into()),
            ],
            Self::Cartoon => vec![
                ("operation", "close".into()),
                ("kernel_size", 7i64.into()),
                ("line_width", 3i64.into()),
            ],
        };
        let target = match self {
            Self::Technical | Self::Minimal => ScribbleMethod::Vectorization,
            Self::Sketchy | Self::Artistic => ScribbleMethod::HandDrawn,
            Self::Calligraphy => ScribbleMethod::Skeletonization,
            Self::Cartoon => ScribbleMethod::Morphological,
        };
        let params = entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        (target, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditioning::CancelToken;

    fn cross() -> ImageF32 {
        ImageF32::from_fn(48, 48, |x, y| {
            let h = (20..28).contains(&y) && (6..42).contains(&x);
            let v = (20..28).contains(&x) && (6..42).contains(&y);
            if h || v {
                0.0
            } else {
                1.0
            }
        })
    }

    fn run(method: ScribbleMethod, gray: &ImageF32, params: &Params) -> Result<MethodOutput, ConditioningError> {
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
    fn skeleton_is_thin_and_inside_the_shape() {
        let gray = cross();
        let out = run(ScribbleMethod::Skeletonization, &gray, &Params::new()).unwrap();
        let ink = foreground_mask(&gray);
        let on = out.image.count_above(0.5);
        assert!(on > 0 && on < ink.count() / 4);
        for (&v, &m) in out.image.data.iter().zip(&ink.data) {
            if v > 0.5 {
                assert_eq!(m, 1);
            }
        }
    }

    #[test]
    fn hand_drawn_is_reproducible_with_seed() {
        let gray = cross();
        let mut params = Params::new();
        params.insert("seed".into(), 7i64.into());
        let a = run(ScribbleMethod::HandDrawn, &gray, &params).unwrap();
        let b = run(ScribbleMethod::HandDrawn, &gray, &params).unwrap();
        assert_eq!(a.image, b.image);
        assert!(a.image.data.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(a.metadata["path_count"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn hand_drawn_fails_on_blank_input() {
        let blank = ImageF32::filled(32, 32, 1.0);
        let err = run(ScribbleMethod::HandDrawn, &blank, &Params::new()).unwrap_err();
        assert!(err.allows_fallback());
    }

    #[test]
    fn vectorization_outlines_shape() {
        let out = run(ScribbleMethod::Vectorization, &cross(), &Params::new()).unwrap();
        assert_eq!(out.metadata["contour_count"], 1);
        assert!(out.image.count_above(0.5) > 0);
    }

    #[test]
    fn every_style_delegates() {
        for &style in Style::NAMES {
            let mut params = Params::new();
            params.insert("style".into(), style.into());
            let out = run(ScribbleMethod::StyleAware, &cross(), &params).unwrap();
            assert_eq!(out.metadata["style"], style);
            assert!(out.metadata.contains_key("delegated_to"));
        }
    }

    #[test]
    fn blended_levels_keep_strongest_weight() {
        let out = run(ScribbleMethod::MultiLevel, &cross(), &Params::new()).unwrap();
        let (_, hi) = out.image.min_max();
        assert_eq!(hi, 1.0);
    }
}
