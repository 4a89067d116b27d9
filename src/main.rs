use glyph_conditioning::prelude::*;
use std::env;

fn main() {
    // Demo: render a glyph and produce every guidance type with its default method
    let glyph = env::args().nth(1).unwrap_or_else(|| "火".to_string());
    let size = env::args()
        .nth(2)
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(512);

    let orch = match ConditioningOrchestrator::new(EngineConfig::default()) {
        Ok(orch) => orch,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };
    let plan = GenerationRequest {
        glyph: Some(glyph.clone()),
        width: size,
        height: size,
        kinds: ConditioningType::ALL.to_vec(),
        ..GenerationRequest::default()
    };
    match orch.generate(&plan) {
        Ok(map) => {
            for (kind, results) in &map {
                for (method, res) in results {
                    match &res.error_message {
                        None => println!(
                            "{kind:<12} {method:<28} ok   q={:.2} t={}ms",
                            res.quality_score, res.processing_time_ms
                        ),
                        Some(err) => println!("{kind:<12} {method:<28} fail {err}"),
                    }
                }
            }
        }
        Err(err) => {
            eprintln!("Error generating guidance for '{glyph}': {err}");
            std::process::exit(1);
        }
    }
}
