//! Engine configuration, loaded from JSON.
//!
//! Every section carries serde defaults, so `{}` is a complete config.
use crate::conditioning::ConditioningType;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 100,
            ttl_secs: 3600,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Outputs whose 8-bit standard deviation falls below this are treated as
    /// blank.
    pub uniform_std_threshold: f32,
    pub adaptive_bonus: f32,
    pub multi_scale_bonus: f32,
    pub model_bonus: f32,
    /// Cap on the summed bonuses.
    pub max_bonus: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            uniform_std_threshold: 2.0,
            adaptive_bonus: 0.05,
            multi_scale_bonus: 0.05,
            model_bonus: 0.1,
            max_bonus: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    /// Worker pool size; 0 lets rayon pick one thread per core.
    pub worker_threads: usize,
    /// Hard deadline per algorithm invocation.
    pub timeout_ms: u64,
    /// Durations kept per method in the performance record.
    pub metrics_window: usize,
    /// Guidance type used when a generation request names none.
    pub default_kind: ConditioningType,
    /// Per-type method overriding the family default.
    pub default_methods: BTreeMap<ConditioningType, String>,
    pub quality: QualityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            worker_threads: 0,
            timeout_ms: 30_000,
            metrics_window: 1000,
            default_kind: ConditioningType::Edge,
            default_methods: BTreeMap::new(),
            quality: QualityConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.cache.max_size, 100);
        assert_eq!(cfg.cache.ttl_secs, 3600);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{"cache": {"max_size": 5}, "default_kind": "depth",
                "default_methods": {"edge": "adaptive_canny"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.cache.max_size, 5);
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.default_kind, ConditioningType::Depth);
        assert_eq!(cfg.default_methods[&ConditioningType::Edge], "adaptive_canny");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/engine.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/engine.json"));
    }
}
