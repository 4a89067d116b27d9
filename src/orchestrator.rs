//! Request routing: validation, cache, single-flight, worker pool, deadline.
//!
//! ```text
//! process(request)
//!   validate ──✗──> failed result
//!   in-flight cell for key (concurrent callers share one computation)
//!     cache.get ──hit──> result
//!     rayon pool ── algorithm.generate_* ──> channel ── recv_timeout
//!                                          └─ deadline: cancel token, TimedOut
//!   cache.put (successes only)
//! ```
//!
//! `generate` builds on `process` for one or more guidance types and is the
//! only entry point that returns `Err`.
use crate::cache::{CacheKey, CacheSource, CacheStats, ConditioningCache};
use crate::conditioning::{
    validate_glyph_request, CancelToken, ConditioningAlgorithm, ConditioningResult, ConditioningType,
    DepthAlgorithm, EdgeAlgorithm, GlyphRenderer, MethodInfo, ParamValue, Params, QualityScorer, ResolvedParams,
    ScribbleAlgorithm, SegmentationAlgorithm, StrokeGlyphRenderer,
};
use crate::config::EngineConfig;
use crate::error::{ConditioningError, OrchestratorError};
use crate::image::Raster;
use crate::metrics::PerformanceMetrics;
use crossbeam_channel::RecvTimeoutError;
use dashmap::DashMap;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// One guidance image to produce, from either a raster or a glyph.
#[derive(Clone, Debug)]
pub struct ConditioningRequest {
    pub image: Option<Raster>,
    pub glyph: Option<String>,
    /// Render size for glyph requests; image requests use the raster size.
    pub width: u32,
    pub height: u32,
    pub kind: ConditioningType,
    pub method: Option<String>,
    pub params: Params,
}

impl ConditioningRequest {
    pub fn from_image(image: Raster, kind: ConditioningType) -> Self {
        let (width, height) = image.size();
        Self {
            image: Some(image),
            glyph: None,
            width,
            height,
            kind,
            method: None,
            params: Params::new(),
        }
    }

    pub fn from_glyph(glyph: impl Into<String>, width: u32, height: u32, kind: ConditioningType) -> Self {
        Self {
            image: None,
            glyph: Some(glyph.into()),
            width,
            height,
            kind,
            method: None,
            params: Params::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    fn validate(&self) -> Result<(), ConditioningError> {
        match (&self.image, &self.glyph) {
            (Some(_), Some(_)) => Err(ConditioningError::Validation(
                "supply either an image or a glyph, not both".into(),
            )),
            (None, None) => Err(ConditioningError::Validation(
                "request needs an image or a glyph".into(),
            )),
            (Some(image), None) => image.validate().map(|_| ()),
            (None, Some(glyph)) => validate_glyph_request(glyph, self.width, self.height),
        }
    }

    fn source(&self) -> Option<CacheSource<'_>> {
        match (&self.image, &self.glyph) {
            (Some(image), None) => Some(CacheSource::Image(image)),
            (None, Some(glyph)) => Some(CacheSource::Glyph(glyph)),
            _ => None,
        }
    }

    fn size(&self) -> (u32, u32) {
        match &self.image {
            Some(image) => image.size(),
            None => (self.width, self.height),
        }
    }
}

/// How `generate` picks a method for each requested type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MethodSelection {
    /// Configured override, else the family default.
    #[default]
    Default,
    /// The same method name for every requested type.
    Named(String),
    /// Uniform choice among each type's available methods, reproducible
    /// from `seed`.
    Random { seed: u64 },
}

/// Multi-type generation plan.
#[derive(Clone, Debug, Default)]
pub struct GenerationRequest {
    pub image: Option<Raster>,
    pub glyph: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Empty means the configured default type.
    pub kinds: Vec<ConditioningType>,
    pub method: MethodSelection,
    pub params: Params,
}

/// `type -> method -> result`.
pub type ConditioningMap = BTreeMap<ConditioningType, BTreeMap<String, ConditioningResult>>;

pub struct ConditioningOrchestrator {
    config: EngineConfig,
    algorithms: BTreeMap<ConditioningType, Arc<dyn ConditioningAlgorithm>>,
    cache: ConditioningCache,
    in_flight: DashMap<CacheKey, Arc<OnceLock<ConditioningResult>>>,
    pool: rayon::ThreadPool,
    metrics: Arc<PerformanceMetrics>,
}

impl ConditioningOrchestrator {
    pub fn new(config: EngineConfig) -> Result<Self, OrchestratorError> {
        Self::with_renderer(config, Arc::new(StrokeGlyphRenderer::default()))
    }

    pub fn with_renderer(
        config: EngineConfig,
        renderer: Arc<dyn GlyphRenderer>,
    ) -> Result<Self, OrchestratorError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("conditioning-{i}"))
            .build()
            .map_err(|e| OrchestratorError::WorkerPool(e.to_string()))?;
        let metrics = Arc::new(PerformanceMetrics::new(config.metrics_window));
        let scorer = QualityScorer::new(config.quality.clone());

        let mut algorithms: BTreeMap<ConditioningType, Arc<dyn ConditioningAlgorithm>> = BTreeMap::new();
        algorithms.insert(
            ConditioningType::Edge,
            Arc::new(EdgeAlgorithm::new(scorer.clone(), Arc::clone(&renderer), Arc::clone(&metrics))),
        );
        algorithms.insert(
            ConditioningType::Depth,
            Arc::new(DepthAlgorithm::new(scorer.clone(), Arc::clone(&renderer), Arc::clone(&metrics))),
        );
        algorithms.insert(
            ConditioningType::Segmentation,
            Arc::new(SegmentationAlgorithm::new(scorer.clone(), Arc::clone(&renderer), Arc::clone(&metrics))),
        );
        algorithms.insert(
            ConditioningType::Scribble,
            Arc::new(ScribbleAlgorithm::new(scorer, renderer, Arc::clone(&metrics))),
        );

        debug!(
            "orchestrator ready: {} workers, timeout {} ms, cache {}",
            pool.current_num_threads(),
            config.timeout_ms,
            if config.cache.enabled { "on" } else { "off" }
        );
        Ok(Self {
            cache: ConditioningCache::from_config(&config.cache),
            config,
            algorithms,
            in_flight: DashMap::new(),
            pool,
            metrics,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn cache(&self) -> &ConditioningCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn algorithm(&self, kind: ConditioningType) -> Option<Arc<dyn ConditioningAlgorithm>> {
        self.algorithms.get(&kind).cloned()
    }

    pub fn available_methods(&self, kind: ConditioningType) -> Vec<&'static str> {
        self.algorithms
            .get(&kind)
            .map(|a| a.available_methods())
            .unwrap_or_default()
    }

    pub fn method_info(&self, kind: ConditioningType, method: &str) -> Option<MethodInfo> {
        self.algorithms.get(&kind).and_then(|a| a.method_info(method))
    }

    /// Method name a request resolves to before dispatch.
    fn resolve_method(&self, kind: ConditioningType, requested: Option<&str>) -> String {
        if let Some(name) = requested {
            return name.to_string();
        }
        if let Some(name) = self.config.default_methods.get(&kind) {
            return name.clone();
        }
        self.algorithms
            .get(&kind)
            .map(|a| a.default_method().to_string())
            .unwrap_or_default()
    }

    /// Parameters as the method will see them, so `50` and `50.0` (or an
    /// omitted default) share a cache entry. Requests that fail validation
    /// keep their raw parameters; they are never cached.
    fn key_params(&self, kind: ConditioningType, method: &str, params: &Params) -> Params {
        self.method_info(kind, method)
            .and_then(|info| ResolvedParams::resolve(&info.params, params).ok())
            .map(|resolved| resolved.to_params())
            .unwrap_or_else(|| params.clone())
    }

    /// Produce one guidance image. Never panics; every failure is a result
    /// with `success == false`.
    pub fn process(&self, request: &ConditioningRequest) -> ConditioningResult {
        let start = Instant::now();
        let method = self.resolve_method(request.kind, request.method.as_deref());
        if let Err(err) = request.validate() {
            debug!("rejected {} request: {}", request.kind, err);
            return ConditioningResult::failed(method, &err, start.elapsed().as_millis() as u64);
        }
        let Some(source) = request.source() else {
            return ConditioningResult::failed(
                method,
                &ConditioningError::Validation("request needs an image or a glyph".into()),
                0,
            );
        };
        let (width, height) = request.size();
        let key_params = self.key_params(request.kind, &method, &request.params);
        let key = CacheKey::derive(request.kind, &method, width, height, source, &key_params);

        // at most one computation per key, even for callers racing the cache put
        let cell = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .clone();
        let result = cell
            .get_or_init(|| {
                if self.config.cache.enabled {
                    if let Some(hit) = self.cache.get(&key) {
                        return (*hit).clone().with_metadata("cache_hit", Value::Bool(true));
                    }
                }
                let result = self.execute(request, &method);
                if self.config.cache.enabled && result.success {
                    self.cache.put(key.clone(), Arc::new(result.clone()));
                }
                result
            })
            .clone();
        self.in_flight.remove_if(&key, |_, v| Arc::ptr_eq(v, &cell));
        result
    }

    /// Run the algorithm on the worker pool under the configured deadline.
    fn execute(&self, request: &ConditioningRequest, method: &str) -> ConditioningResult {
        let Some(algorithm) = self.algorithm(request.kind) else {
            return ConditioningResult::failed(
                method,
                &ConditioningError::Validation(format!("no algorithm for {}", request.kind)),
                0,
            );
        };
        let start = Instant::now();
        let cancel = CancelToken::new();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let job = request.clone();
        let job_method = method.to_string();
        let token = cancel.clone();
        self.pool.spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| run_request(&*algorithm, &job, &job_method, &token)));
            let result = outcome.unwrap_or_else(|_| {
                ConditioningResult::failed(
                    job_method.as_str(),
                    &ConditioningError::Computation("worker panicked".into()),
                    0,
                )
            });
            // the receiver is gone once the deadline has passed
            let _ = tx.send(result);
        });

        let received = if self.config.timeout_ms == 0 {
            rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        } else {
            rx.recv_timeout(Duration::from_millis(self.config.timeout_ms))
        };
        match received {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                cancel.cancel();
                let ms = start.elapsed().as_millis() as u64;
                warn!(
                    "{} '{}' exceeded its {} ms deadline; cancelling",
                    request.kind, method, self.config.timeout_ms
                );
                ConditioningResult::failed(method, &ConditioningError::TimedOut(self.config.timeout_ms), ms)
            }
            Err(RecvTimeoutError::Disconnected) => ConditioningResult::failed(
                method,
                &ConditioningError::Computation("worker exited without a result".into()),
                start.elapsed().as_millis() as u64,
            ),
        }
    }

    /// Process requests one after another, in order.
    pub fn process_batch(&self, requests: &[ConditioningRequest]) -> Vec<ConditioningResult> {
        requests.iter().map(|r| self.process(r)).collect()
    }

    /// Generate guidance for each requested type. Fails only when no type
    /// produced an image.
    pub fn generate(&self, plan: &GenerationRequest) -> Result<ConditioningMap, OrchestratorError> {
        if plan.image.is_some() == plan.glyph.is_some() {
            return Err(OrchestratorError::InvalidRequest(
                "exactly one of image or glyph is required".into(),
            ));
        }
        let mut kinds = if plan.kinds.is_empty() {
            vec![self.config.default_kind]
        } else {
            plan.kinds.clone()
        };
        kinds.sort();
        kinds.dedup();

        let mut map = ConditioningMap::new();
        let mut failures = Vec::new();
        for kind in kinds {
            let method = match &plan.method {
                MethodSelection::Default => None,
                MethodSelection::Named(name) => Some(name.clone()),
                MethodSelection::Random { seed } => {
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(kind as u64));
                    self.available_methods(kind).choose(&mut rng).map(|m| m.to_string())
                }
            };
            let request = ConditioningRequest {
                image: plan.image.clone(),
                glyph: plan.glyph.clone(),
                width: plan.width,
                height: plan.height,
                kind,
                method,
                params: plan.params.clone(),
            };
            let result = self.process(&request);
            if !result.success {
                failures.push(format!(
                    "{}/{}: {}",
                    kind,
                    result.method_used,
                    result.error_message.as_deref().unwrap_or("unknown error")
                ));
            }
            map.entry(kind)
                .or_default()
                .insert(result.method_used.clone(), result);
        }

        let any_success = map.values().flat_map(|m| m.values()).any(|r| r.success);
        if !any_success {
            warn!("no conditioning images generated: {}", failures.join("; "));
            return Err(OrchestratorError::NoConditioningImages(failures.join("; ")));
        }
        Ok(map)
    }
}

fn run_request(
    algorithm: &dyn ConditioningAlgorithm,
    request: &ConditioningRequest,
    method: &str,
    cancel: &CancelToken,
) -> ConditioningResult {
    match (&request.image, &request.glyph) {
        (Some(image), _) => algorithm.generate_cancellable(image, Some(method), &request.params, cancel),
        (None, Some(glyph)) => algorithm.generate_text_cancellable(
            glyph,
            Some(method),
            request.width,
            request.height,
            &request.params,
            cancel,
        ),
        (None, None) => ConditioningResult::failed(
            method,
            &ConditioningError::Validation("request needs an image or a glyph".into()),
            0,
        ),
    }
}
