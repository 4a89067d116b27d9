use glyph_conditioning::conditioning::Params;
use glyph_conditioning::image::io::{load_raster, save_raster, write_json_file};
use glyph_conditioning::metrics::MethodTiming;
use glyph_conditioning::{
    CacheStats, ConditioningOrchestrator, ConditioningType, EngineConfig, GenerationRequest,
    MethodSelection,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct ToolConfig {
    /// Image to condition. Mutually exclusive with `glyph`.
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub glyph: Option<String>,
    #[serde(default = "default_size")]
    pub width: u32,
    #[serde(default = "default_size")]
    pub height: u32,
    #[serde(default)]
    pub types: Vec<ConditioningType>,
    /// Method name applied to every type; omit for defaults.
    #[serde(default)]
    pub method: Option<String>,
    /// Pick a random available method per type with this seed.
    #[serde(default)]
    pub random_seed: Option<u64>,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub engine: EngineConfig,
    pub output: ToolOutputConfig,
}

fn default_size() -> u32 {
    512
}

#[derive(Debug, Deserialize)]
pub struct ToolOutputConfig {
    /// Directory receiving one `<type>_<method>.png` per successful result.
    pub dir: PathBuf,
    #[serde(rename = "summary_json")]
    pub summary_json: PathBuf,
}

pub fn load_config(path: &Path) -> Result<ToolConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = load_config(Path::new(&config_path))?;

    let image = match &config.input {
        Some(path) => Some(load_raster(path).map_err(|e| e.to_string())?),
        None => None,
    };
    let method = match (&config.method, config.random_seed) {
        (Some(_), Some(_)) => return Err("set at most one of method and random_seed".to_string()),
        (Some(name), None) => MethodSelection::Named(name.clone()),
        (None, Some(seed)) => MethodSelection::Random { seed },
        (None, None) => MethodSelection::Default,
    };
    let plan = GenerationRequest {
        image,
        glyph: config.glyph.clone(),
        width: config.width,
        height: config.height,
        kinds: config.types.clone(),
        method,
        params: config.params.clone(),
    };

    let orch = ConditioningOrchestrator::new(config.engine.clone()).map_err(|e| e.to_string())?;
    let map = orch.generate(&plan).map_err(|e| e.to_string())?;

    let mut entries = Vec::new();
    for (kind, results) in &map {
        for (method, result) in results {
            let image_path = match &result.image {
                Some(raster) => {
                    let path = config.output.dir.join(format!("{kind}_{method}.png"));
                    save_raster(raster, &path).map_err(|e| e.to_string())?;
                    Some(path)
                }
                None => None,
            };
            entries.push(ResultSummary {
                kind: *kind,
                method: method.clone(),
                success: result.success,
                quality_score: result.quality_score,
                processing_time_ms: result.processing_time_ms,
                error: result.error_message.clone(),
                image: image_path,
                metadata: result.metadata.clone(),
            });
        }
    }

    let summary = ToolSummary {
        source: match (&config.input, &config.glyph) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(glyph)) => glyph.clone(),
            (None, None) => String::new(),
        },
        succeeded: entries.iter().filter(|e| e.success).count(),
        results: entries,
        cache: orch.cache_stats(),
        timings: orch.metrics().summary(),
    };
    write_json_file(&config.output.summary_json, &summary).map_err(|e| e.to_string())?;

    println!(
        "Generated {}/{} guidance images into {}",
        summary.succeeded,
        summary.results.len(),
        config.output.dir.display()
    );
    println!("Saved summary to {}", config.output.summary_json.display());

    Ok(())
}

fn usage() -> String {
    "Usage: conditioning_tool <config.json>".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultSummary {
    kind: ConditioningType,
    method: String,
    success: bool,
    quality_score: f32,
    processing_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<PathBuf>,
    metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSummary {
    source: String,
    succeeded: usize,
    results: Vec<ResultSummary>,
    cache: CacheStats,
    timings: BTreeMap<String, MethodTiming>,
}
