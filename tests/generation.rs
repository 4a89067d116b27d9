mod common;

use common::synthetic_image::{blank, checkerboard, solid_square};
use glyph_conditioning::conditioning::{
    ConditioningAlgorithm, DepthAlgorithm, EdgeAlgorithm, ScribbleAlgorithm, SegmentationAlgorithm,
};
use glyph_conditioning::{ConditioningOrchestrator, ConditioningRequest, ConditioningType, EngineConfig, Params};
use std::sync::Arc;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn algorithms() -> Vec<Arc<dyn ConditioningAlgorithm>> {
    vec![
        Arc::new(EdgeAlgorithm::default()),
        Arc::new(DepthAlgorithm::default()),
        Arc::new(SegmentationAlgorithm::default()),
        Arc::new(ScribbleAlgorithm::default()),
    ]
}

#[test]
fn fire_glyph_produces_edges_at_512() {
    init_logger();
    let orch = ConditioningOrchestrator::new(EngineConfig::default()).expect("pool");
    let res = orch.process(&ConditioningRequest::from_glyph("火", 512, 512, ConditioningType::Edge));
    assert!(res.success, "{:?}", res.error_message);
    assert_eq!(res.method_used, "opencv_canny");
    let image = res.image.as_ref().expect("image on success");
    assert_eq!(image.size(), (512, 512));
    assert!(res.metadata["edge_density"].as_f64().unwrap() > 0.0);
    assert_eq!(res.metadata["source_character"], "火");
}

#[test]
fn every_default_method_is_deterministic() {
    init_logger();
    let image = checkerboard(96, 96, 12);
    for algo in algorithms() {
        let a = algo.generate_from_image(&image, None, &Params::new());
        let b = algo.generate_from_image(&image, None, &Params::new());
        assert!(a.success, "{} failed: {:?}", algo.kind(), a.error_message);
        assert_eq!(a.image, b.image, "{} differs between runs", algo.kind());
        assert_eq!(a.quality_score, b.quality_score);
    }
}

#[test]
fn distance_depth_grows_towards_the_centre() {
    init_logger();
    let image = solid_square(64, 8, 56);
    let res = DepthAlgorithm::default().generate_from_image(&image, Some("distance_transform_depth"), &Params::new());
    assert!(res.success, "{:?}", res.error_message);
    let out = res.image.expect("depth image");
    let at = |x: u32| out.pixel(x, 32)[0];
    assert_eq!(out.pixel(2, 2)[0], 0);
    // non-decreasing from the square's left edge to its centre
    for x in 8..32 {
        assert!(at(x + 1) >= at(x), "depth dips between x={} and x={}", x, x + 1);
    }
    assert!(at(32) > at(9));
}

#[test]
fn unknown_method_is_reported_for_every_type() {
    init_logger();
    let image = checkerboard(64, 64, 8);
    for algo in algorithms() {
        let res = algo.generate_from_image(&image, Some("not_a_method"), &Params::new());
        assert!(!res.success);
        assert!(res.image.is_none());
        assert_eq!(res.error_message.as_deref(), Some("Unknown method: not_a_method"));
    }
}

#[test]
fn quality_scores_stay_in_unit_range() {
    init_logger();
    let image = checkerboard(96, 96, 16);
    for algo in algorithms() {
        for method in algo.available_methods() {
            let res = algo.generate_from_image(&image, Some(method), &Params::new());
            if res.success {
                assert!((0.0..=1.0).contains(&res.quality_score), "{method}: {}", res.quality_score);
            }
        }
    }
}

#[test]
fn blank_output_scores_as_degenerate() {
    init_logger();
    let res = EdgeAlgorithm::default().generate_from_image(&blank(128, 128, 255), None, &Params::new());
    assert!(res.success, "{:?}", res.error_message);
    assert!(res.quality_score <= 0.1);
}

#[test]
fn multi_scale_max_covers_single_scale() {
    init_logger();
    let image = checkerboard(128, 128, 10);
    let algo = EdgeAlgorithm::default();
    let single = algo.generate_from_image(&image, Some("opencv_canny"), &Params::new());
    let multi = algo.generate_from_image(&image, Some("multi_scale_canny"), &Params::new());
    let density = |r: &glyph_conditioning::ConditioningResult| r.metadata["edge_density"].as_f64().unwrap();
    assert!(density(&multi) >= density(&single));
}

#[test]
fn boundary_requests_are_rejected() {
    init_logger();
    let orch = ConditioningOrchestrator::new(EngineConfig::default()).expect("pool");

    let small = orch.process(&ConditioningRequest::from_glyph("木", 99, 512, ConditioningType::Depth));
    assert!(!small.success);
    assert!(small.error_message.unwrap().contains("outside [100, 2048]"));

    let large = orch.process(&ConditioningRequest::from_glyph("木", 512, 2049, ConditioningType::Depth));
    assert!(!large.success);

    let edge_sizes = orch.process(&ConditioningRequest::from_glyph("木", 100, 100, ConditioningType::Edge));
    assert!(edge_sizes.success, "{:?}", edge_sizes.error_message);

    let long = orch.process(&ConditioningRequest::from_glyph("一二三四五六七八九十百", 256, 256, ConditioningType::Edge));
    assert!(!long.success);
    assert!(long.error_message.unwrap().contains("got 11"));

    let mut both = ConditioningRequest::from_glyph("木", 256, 256, ConditioningType::Edge);
    both.image = Some(checkerboard(256, 256, 32));
    assert!(!orch.process(&both).success);
}

#[test]
fn unavailable_model_methods_suggest_alternatives() {
    init_logger();
    let image = checkerboard(64, 64, 8);
    let res = DepthAlgorithm::default().generate_from_image(&image, Some("ai_depth_estimation"), &Params::new());
    assert!(!res.success);
    assert_eq!(
        res.error_message.as_deref(),
        Some("Method 'ai_depth_estimation' is not available; consider 'distance_transform_depth'")
    );
    let listed = DepthAlgorithm::default().available_methods();
    assert!(!listed.contains(&"ai_depth_estimation"));
    assert_eq!(listed[0], "stroke_thickness_depth");
}
