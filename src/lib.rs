#![doc = include_str!("../README.md")]

// Public surface
pub mod cache;
pub mod conditioning;
pub mod config;
pub mod error;
pub mod image;
pub mod metrics;
pub mod orchestrator;

// Image-processing building blocks used by the method families. Public so
// tools and tests can reach them, but not considered a stable API.
pub mod angle;
pub mod cluster;
pub mod contours;
pub mod draw;
pub mod edges;
pub mod filters;
pub mod morphology;
pub mod regions;
pub mod segments;
pub mod thinning;
pub mod threshold;

// --- High-level re-exports -------------------------------------------------

pub use crate::cache::{CacheKey, CacheStats, ConditioningCache};
pub use crate::conditioning::{
    ConditioningAlgorithm, ConditioningResult, ConditioningType, GlyphRenderer, MethodInfo,
    ParamValue, Params, StrokeGlyphRenderer,
};
pub use crate::config::{load_config, EngineConfig};
pub use crate::error::{ConditioningError, ConfigError, OrchestratorError};
pub use crate::image::Raster;
pub use crate::orchestrator::{
    ConditioningMap, ConditioningOrchestrator, ConditioningRequest, GenerationRequest,
    MethodSelection,
};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use glyph_conditioning::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let orch = ConditioningOrchestrator::new(EngineConfig::default())?;
/// let req = ConditioningRequest::from_glyph("火", 512, 512, ConditioningType::Edge);
/// let res = orch.process(&req);
/// println!("success={} method={} q={:.2}", res.success, res.method_used, res.quality_score);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::Raster;
    pub use crate::{
        ConditioningOrchestrator, ConditioningRequest, ConditioningResult, ConditioningType,
        EngineConfig, GenerationRequest, MethodSelection,
    };
}
