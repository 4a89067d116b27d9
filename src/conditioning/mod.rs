//! Guidance-image generation: the shared algorithm contract and the four
//! method families.
//!
//! Each family is a closed enum of methods implementing [`MethodCatalog`]
//! (name, parameter schema, availability, fallback, numeric transform). The
//! generic [`Algorithm`] wraps a catalog with everything the families share:
//!
//! - image validation and colour normalization,
//! - method resolution (`"Unknown method: <name>"` for names outside the
//!   catalog, an explicit hint for declared-but-unavailable methods),
//! - parameter validation against the method schema,
//! - panic and error capture at the method boundary, with one retry on the
//!   method's designated fallback after a computation failure,
//! - quality scoring and performance recording.
//!
//! Generation never panics or returns `Err`: every outcome is a
//! [`ConditioningResult`].

pub mod depth;
pub mod edge;
pub mod params;
pub mod quality;
pub mod render;
pub mod result;
pub mod scribble;
pub mod segmentation;

pub use depth::DepthMethod;
pub use edge::EdgeMethod;
pub use params::{ParamKind, ParamSpec, ParamValue, Params, ResolvedParams};
pub use quality::QualityScorer;
pub use render::{GlyphRenderer, StrokeGlyphRenderer};
pub use result::{ConditioningResult, GuidanceChannel, Metadata};
pub use scribble::ScribbleMethod;
pub use segmentation::SegmentationMethod;

use crate::error::ConditioningError;
use crate::image::{ImageF32, Raster};
use crate::metrics::PerformanceMetrics;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Longest glyph string accepted for rendering, in characters.
pub const MAX_GLYPH_CHARS: usize = 10;
/// Inclusive bounds on each side of a rendered glyph canvas.
pub const MIN_RENDER_SIZE: u32 = 100;
pub const MAX_RENDER_SIZE: u32 = 2048;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditioningType {
    Edge,
    Depth,
    Segmentation,
    Scribble,
}

impl ConditioningType {
    pub const ALL: [ConditioningType; 4] = [Self::Edge, Self::Depth, Self::Segmentation, Self::Scribble];

    pub fn name(self) -> &'static str {
        match self {
            Self::Edge => "edge",
            Self::Depth => "depth",
            Self::Segmentation => "segmentation",
            Self::Scribble => "scribble",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for ConditioningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Cooperative cancellation flag shared between a caller and a running
/// method. Iterative methods poll it between passes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), ConditioningError> {
        if self.is_cancelled() {
            Err(ConditioningError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Inputs handed to a method implementation.
pub struct MethodContext<'a> {
    /// Luma of the source in `[0, 1]`.
    pub gray: &'a ImageF32,
    /// Validated source raster (1, 3 or 4 channels).
    pub source: &'a Raster,
    pub params: &'a ResolvedParams,
    /// Text the source was rendered from, when generation started from a glyph.
    pub glyph: Option<&'a str>,
    pub cancel: &'a CancelToken,
}

impl MethodContext<'_> {
    /// RGB samples in `[0, 1]`, alpha composited over white.
    pub fn rgb(&self) -> Vec<[f32; 3]> {
        self.source.to_rgb_f32()
    }
}

/// A method's guidance image (`[0, 1]`, same size as the source) and its
/// diagnostics.
#[derive(Clone, Debug)]
pub struct MethodOutput {
    pub image: ImageF32,
    pub metadata: Metadata,
}

impl MethodOutput {
    pub fn new(image: ImageF32) -> Self {
        Self {
            image,
            metadata: Metadata::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Catalog entry describing a method to callers and tooling.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MethodInfo {
    pub name: &'static str,
    pub kind: ConditioningType,
    pub available: bool,
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<&'static str>,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

/// Closed set of methods for one guidance type.
pub trait MethodCatalog: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    const KIND: ConditioningType;
    const ALL: &'static [Self];
    const DEFAULT: Self;

    fn name(self) -> &'static str;
    fn description(self) -> &'static str;
    fn schema(self) -> Vec<ParamSpec>;

    /// Declared methods without a working implementation return false.
    fn is_available(self) -> bool {
        true
    }

    /// Simpler method of the same family retried once after a computation
    /// failure.
    fn fallback(self) -> Option<Self>;

    fn run(self, ctx: &MethodContext<'_>) -> Result<MethodOutput, ConditioningError>;

    fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }

    fn info(self) -> MethodInfo {
        MethodInfo {
            name: self.name(),
            kind: Self::KIND,
            available: self.is_available(),
            is_default: self == Self::DEFAULT,
            fallback: self.fallback().map(Self::name),
            description: self.description(),
            params: self.schema(),
        }
    }
}

/// Per-guidance-type generator contract.
pub trait ConditioningAlgorithm: Send + Sync {
    fn kind(&self) -> ConditioningType;

    fn default_method(&self) -> &'static str;

    fn generate_from_image(&self, image: &Raster, method: Option<&str>, params: &Params) -> ConditioningResult {
        self.generate_cancellable(image, method, params, &CancelToken::new())
    }

    /// As [`generate_from_image`](Self::generate_from_image), observing
    /// `cancel` between method passes.
    fn generate_cancellable(
        &self,
        image: &Raster,
        method: Option<&str>,
        params: &Params,
        cancel: &CancelToken,
    ) -> ConditioningResult;

    fn generate_from_text(
        &self,
        glyph: &str,
        method: Option<&str>,
        width: u32,
        height: u32,
        params: &Params,
    ) -> ConditioningResult {
        self.generate_text_cancellable(glyph, method, width, height, params, &CancelToken::new())
    }

    fn generate_text_cancellable(
        &self,
        glyph: &str,
        method: Option<&str>,
        width: u32,
        height: u32,
        params: &Params,
        cancel: &CancelToken,
    ) -> ConditioningResult;

    /// Names of implemented methods, default first.
    fn available_methods(&self) -> Vec<&'static str>;

    /// Every declared method, including unavailable ones.
    fn declared_methods(&self) -> Vec<MethodInfo>;

    fn method_info(&self, method: &str) -> Option<MethodInfo>;
}

/// Check glyph length and canvas bounds shared by every text entry point.
pub fn validate_glyph_request(glyph: &str, width: u32, height: u32) -> Result<(), ConditioningError> {
    let chars = glyph.chars().count();
    if chars == 0 || chars > MAX_GLYPH_CHARS {
        return Err(ConditioningError::Validation(format!(
            "glyph must be 1-{MAX_GLYPH_CHARS} characters, got {chars}"
        )));
    }
    let range = MIN_RENDER_SIZE..=MAX_RENDER_SIZE;
    if !range.contains(&width) || !range.contains(&height) {
        return Err(ConditioningError::Validation(format!(
            "target size {width}x{height} outside [{MIN_RENDER_SIZE}, {MAX_RENDER_SIZE}]"
        )));
    }
    Ok(())
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Family-generic implementation of [`ConditioningAlgorithm`].
pub struct Algorithm<M: MethodCatalog> {
    scorer: QualityScorer,
    renderer: Arc<dyn GlyphRenderer>,
    metrics: Arc<PerformanceMetrics>,
    _catalog: PhantomData<fn() -> M>,
}

pub type EdgeAlgorithm = Algorithm<EdgeMethod>;
pub type DepthAlgorithm = Algorithm<DepthMethod>;
pub type SegmentationAlgorithm = Algorithm<SegmentationMethod>;
pub type ScribbleAlgorithm = Algorithm<ScribbleMethod>;

impl<M: MethodCatalog> Default for Algorithm<M> {
    fn default() -> Self {
        Self::new(
            QualityScorer::default(),
            Arc::new(StrokeGlyphRenderer::default()),
            Arc::new(PerformanceMetrics::default()),
        )
    }
}

impl<M: MethodCatalog> Algorithm<M> {
    pub fn new(
        scorer: QualityScorer,
        renderer: Arc<dyn GlyphRenderer>,
        metrics: Arc<PerformanceMetrics>,
    ) -> Self {
        Self {
            scorer,
            renderer,
            metrics,
            _catalog: PhantomData,
        }
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    fn resolve_method(method: Option<&str>) -> Result<M, ConditioningError> {
        let Some(name) = method else {
            return Ok(M::DEFAULT);
        };
        let m = M::parse(name).ok_or_else(|| ConditioningError::UnknownMethod(name.to_string()))?;
        if !m.is_available() {
            let suggestion = m.fallback().unwrap_or(M::DEFAULT).name().to_string();
            warn!(
                "{} method '{}' is declared but not implemented; suggesting '{}'",
                M::KIND,
                name,
                suggestion
            );
            return Err(ConditioningError::Unavailable {
                method: name.to_string(),
                suggestion,
            });
        }
        Ok(m)
    }

    /// Run one method with panics converted into computation errors.
    fn execute(
        method: M,
        gray: &ImageF32,
        source: &Raster,
        params: &ResolvedParams,
        glyph: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<MethodOutput, ConditioningError> {
        cancel.check()?;
        let ctx = MethodContext {
            gray,
            source,
            params,
            glyph,
            cancel,
        };
        let output = catch_unwind(AssertUnwindSafe(|| method.run(&ctx))).map_err(|payload| {
            ConditioningError::Computation(format!(
                "{} panicked: {}",
                method.name(),
                panic_message(payload.as_ref())
            ))
        })??;
        if output.image.w != gray.w || output.image.h != gray.h {
            return Err(ConditioningError::Computation(format!(
                "{} produced {}x{} output for {}x{} input",
                method.name(),
                output.image.w,
                output.image.h,
                gray.w,
                gray.h
            )));
        }
        Ok(output)
    }

    fn generate_inner(
        &self,
        image: &Raster,
        glyph: Option<&str>,
        method: Option<&str>,
        params: &Params,
        cancel: &CancelToken,
    ) -> Result<(M, MethodOutput, ImageF32), ConditioningError> {
        let chosen = Self::resolve_method(method)?;
        image.validate()?;
        let resolved = ResolvedParams::resolve(&chosen.schema(), params)?;
        let gray = image.to_gray_f32();

        match Self::execute(chosen, &gray, image, &resolved, glyph, cancel) {
            Ok(output) => Ok((chosen, output, gray)),
            Err(err) => {
                let fallback = chosen.fallback().filter(|fb| *fb != chosen && err.allows_fallback());
                let Some(fallback) = fallback else {
                    return Err(err);
                };
                warn!(
                    "{} method '{}' failed ({}); retrying with '{}'",
                    M::KIND,
                    chosen.name(),
                    err,
                    fallback.name()
                );
                let defaults = ResolvedParams::resolve(&fallback.schema(), &Params::new())?;
                let output = Self::execute(fallback, &gray, image, &defaults, glyph, cancel)?
                    .with("fallback_from", chosen.name())
                    .with("fallback_reason", err.to_string());
                Ok((fallback, output, gray))
            }
        }
    }

    fn generate_with(
        &self,
        image: &Raster,
        glyph: Option<&str>,
        method: Option<&str>,
        params: &Params,
        cancel: &CancelToken,
    ) -> ConditioningResult {
        let start = Instant::now();
        let requested = method.unwrap_or(M::DEFAULT.name());
        match self.generate_inner(image, glyph, method, params, cancel) {
            Ok((used, output, gray)) => {
                let quality = self.scorer.score(&gray, &output.image, used.name());
                let ms = elapsed_ms(start);
                self.metrics.record(used.name(), ms);
                debug!(
                    "{} '{}' finished in {} ms (quality {:.3})",
                    M::KIND,
                    used.name(),
                    ms,
                    quality
                );
                let mut metadata = output.metadata;
                metadata.insert("input_size".into(), json!([image.width(), image.height()]));
                metadata.insert("output_size".into(), json!([output.image.w, output.image.h]));
                ConditioningResult::succeeded(
                    output.image.to_gray_raster(),
                    used.name(),
                    ms,
                    quality,
                    metadata,
                )
            }
            Err(err) => {
                let ms = elapsed_ms(start);
                debug!("{} '{}' failed after {} ms: {}", M::KIND, requested, ms, err);
                ConditioningResult::failed(requested, &err, ms)
            }
        }
    }
}

impl<M: MethodCatalog> ConditioningAlgorithm for Algorithm<M> {
    fn kind(&self) -> ConditioningType {
        M::KIND
    }

    fn default_method(&self) -> &'static str {
        M::DEFAULT.name()
    }

    fn generate_cancellable(
        &self,
        image: &Raster,
        method: Option<&str>,
        params: &Params,
        cancel: &CancelToken,
    ) -> ConditioningResult {
        self.generate_with(image, None, method, params, cancel)
    }

    fn generate_text_cancellable(
        &self,
        glyph: &str,
        method: Option<&str>,
        width: u32,
        height: u32,
        params: &Params,
        cancel: &CancelToken,
    ) -> ConditioningResult {
        let start = Instant::now();
        let requested = method.unwrap_or(M::DEFAULT.name());
        let rendered = validate_glyph_request(glyph, width, height)
            .and_then(|()| self.renderer.render(glyph, width, height));
        let raster = match rendered {
            Ok(raster) => raster,
            Err(err) => return ConditioningResult::failed(requested, &err, elapsed_ms(start)),
        };
        let mut result = self.generate_with(&raster, Some(glyph), method, params, cancel);
        result.processing_time_ms = elapsed_ms(start);
        result
            .with_metadata("source_character", glyph)
            .with_metadata("rendered_size", json!([width, height]))
    }

    fn available_methods(&self) -> Vec<&'static str> {
        let mut names = vec![M::DEFAULT.name()];
        names.extend(
            M::ALL
                .iter()
                .filter(|m| m.is_available() && **m != M::DEFAULT)
                .map(|m| m.name()),
        );
        names
    }

    fn declared_methods(&self) -> Vec<MethodInfo> {
        M::ALL.iter().map(|m| m.info()).collect()
    }

    fn method_info(&self, method: &str) -> Option<MethodInfo> {
        M::parse(method).map(MethodCatalog::info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_raster(size: u32) -> Raster {
        let data = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                let inside = (size / 4..3 * size / 4).contains(&x) && (size / 4..3 * size / 4).contains(&y);
                if inside {
                    0
                } else {
                    255
                }
            })
            .collect();
        Raster::from_gray(size, size, data).unwrap()
    }

    #[test]
    fn unknown_method_is_reported_verbatim() {
        let algo = EdgeAlgorithm::default();
        let r = algo.generate_from_image(&square_raster(32), Some("not_a_method"), &Params::new());
        assert!(!r.success);
        assert!(r.image.is_none());
        assert_eq!(r.error_message.as_deref(), Some("Unknown method: not_a_method"));
        assert_eq!(r.method_used, "not_a_method");
    }

    #[test]
    fn unavailable_method_suggests_fallback() {
        let algo = EdgeAlgorithm::default();
        let r = algo.generate_from_image(&square_raster(32), Some("hed_edges"), &Params::new());
        assert!(!r.success);
        assert_eq!(
            r.error_message.as_deref(),
            Some("Method 'hed_edges' is not available; consider 'opencv_canny'")
        );
    }

    #[test]
    fn empty_image_is_rejected() {
        let algo = DepthAlgorithm::default();
        let empty = Raster::new(0, 0, 1, Vec::new()).unwrap();
        let r = algo.generate_from_image(&empty, None, &Params::new());
        assert!(!r.success);
        assert!(r.error_message.unwrap().contains("invalid dimensions"));
    }

    #[test]
    fn short_sample_buffer_fails_without_fallback() {
        let algo = EdgeAlgorithm::default();
        let short = Raster::from_parts(32, 32, 1, vec![128; 100]);
        let r = algo.generate_from_image(&short, Some("adaptive_canny"), &Params::new());
        assert!(!r.success);
        assert_eq!(r.method_used, "adaptive_canny");
        assert!(r.error_message.unwrap().contains("raster buffer holds 100 samples"));
        assert!(!r.metadata.contains_key("fallback_from"));
    }

    #[test]
    fn bad_parameter_is_a_validation_failure() {
        let algo = EdgeAlgorithm::default();
        let mut params = Params::new();
        params.insert("low_threshold".into(), ParamValue::Int(-5));
        let r = algo.generate_from_image(&square_raster(32), Some("opencv_canny"), &params);
        assert!(!r.success);
        assert!(r.error_message.unwrap().contains("low_threshold"));
    }

    #[test]
    fn text_generation_checks_bounds_and_tags_metadata() {
        let algo = EdgeAlgorithm::default();
        let too_small = algo.generate_from_text("火", None, 99, 512, &Params::new());
        assert!(!too_small.success);
        let too_long = algo.generate_from_text("一二三四五六七八九十百", None, 512, 512, &Params::new());
        assert!(!too_long.success);

        let ok = algo.generate_from_text("火", None, 128, 128, &Params::new());
        assert!(ok.success, "{:?}", ok.error_message);
        assert_eq!(ok.metadata["source_character"], "火");
        assert_eq!(ok.metadata["rendered_size"], json!([128, 128]));
    }

    #[test]
    fn cancelled_token_stops_before_running() {
        let algo = ScribbleAlgorithm::default();
        let token = CancelToken::new();
        token.cancel();
        let r = algo.generate_cancellable(&square_raster(32), None, &Params::new(), &token);
        assert!(!r.success);
        assert_eq!(r.error_message.as_deref(), Some("cancelled before completion"));
    }

    #[test]
    fn catalogs_list_defaults_first() {
        for algo in [
            Box::new(EdgeAlgorithm::default()) as Box<dyn ConditioningAlgorithm>,
            Box::new(DepthAlgorithm::default()),
            Box::new(SegmentationAlgorithm::default()),
            Box::new(ScribbleAlgorithm::default()),
        ] {
            let names = algo.available_methods();
            assert_eq!(names[0], algo.default_method());
            for name in &names {
                let info = algo.method_info(name).unwrap();
                assert!(info.available);
                assert_eq!(info.kind, algo.kind());
            }
            assert!(algo.method_info("not_a_method").is_none());
        }
    }
}
