mod common;

use common::synthetic_image::checkerboard;
use glyph_conditioning::cache::{CacheKey, CacheSource};
use glyph_conditioning::config::CacheConfig;
use glyph_conditioning::{
    ConditioningCache, ConditioningOrchestrator, ConditioningRequest, ConditioningType, EngineConfig,
    GenerationRequest, MethodSelection, OrchestratorError, Params, Raster,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn engine(max_size: usize) -> ConditioningOrchestrator {
    let config = EngineConfig {
        cache: CacheConfig {
            max_size,
            ..CacheConfig::default()
        },
        worker_threads: 4,
        ..EngineConfig::default()
    };
    ConditioningOrchestrator::new(config).expect("pool")
}

#[test]
fn repeated_request_is_served_from_cache() {
    init_logger();
    let orch = engine(8);
    let req = ConditioningRequest::from_image(checkerboard(128, 128, 16), ConditioningType::Scribble);
    let first = orch.process(&req);
    let second = orch.process(&req);
    assert!(first.success, "{:?}", first.error_message);
    assert_eq!(first.image, second.image);
    assert_eq!(first.method_used, second.method_used);
    assert!(!first.metadata.contains_key("cache_hit"));
    assert_eq!(second.metadata["cache_hit"], true);
    assert_eq!(orch.metrics().durations("skeletonization_scribble").len(), 1);
}

#[test]
fn different_parameters_are_cached_separately() {
    init_logger();
    let orch = engine(8);
    let base = ConditioningRequest::from_glyph("水", 128, 128, ConditioningType::Edge);
    let tuned = base.clone().with_param("low_threshold", 40i64);
    orch.process(&base);
    let res = orch.process(&tuned);
    assert!(!res.metadata.contains_key("cache_hit"));
    assert_eq!(orch.cache().len(), 2);
}

#[test]
fn capacity_plus_one_evicts_the_oldest() {
    init_logger();
    let orch = engine(3);
    let glyphs = ["一", "二", "三", "四"];
    for g in glyphs {
        assert!(orch.process(&ConditioningRequest::from_glyph(g, 128, 128, ConditioningType::Edge)).success);
    }
    assert_eq!(orch.cache().len(), 3);

    let last = orch.process(&ConditioningRequest::from_glyph("四", 128, 128, ConditioningType::Edge));
    assert_eq!(last.metadata["cache_hit"], true);
    let first = orch.process(&ConditioningRequest::from_glyph("一", 128, 128, ConditioningType::Edge));
    assert!(!first.metadata.contains_key("cache_hit"));
}

#[test]
fn cached_entries_expire_after_ttl() {
    init_logger();
    let orch = engine(8);
    let res = orch.process(&ConditioningRequest::from_glyph("山", 128, 128, ConditioningType::Depth));
    assert!(res.success);

    let cache = ConditioningCache::new(8, Duration::from_millis(30));
    let key = CacheKey::derive(
        ConditioningType::Depth,
        &res.method_used,
        128,
        128,
        CacheSource::Glyph("山"),
        &Params::new(),
    );
    cache.put(key.clone(), Arc::new(res));
    assert!(cache.get(&key).is_some());
    thread::sleep(Duration::from_millis(60));
    assert!(cache.get(&key).is_none());
    assert!(cache.is_empty());
}

#[test]
fn concurrent_identical_requests_compute_once() {
    init_logger();
    let orch = engine(8);
    let req = ConditioningRequest::from_glyph("龍", 512, 512, ConditioningType::Edge).with_method("multi_scale_canny");
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..6).map(|_| s.spawn(|| orch.process(&req))).collect();
        handles.into_iter().map(|h| h.join().expect("caller thread")).collect()
    });
    assert!(results.iter().all(|r| r.success));
    assert!(results.windows(2).all(|w| w[0].image == w[1].image));
    assert_eq!(orch.metrics().durations("multi_scale_canny").len(), 1);
}

#[test]
fn slow_invocation_times_out() {
    init_logger();
    let config = EngineConfig {
        timeout_ms: 1,
        worker_threads: 1,
        ..EngineConfig::default()
    };
    let orch = ConditioningOrchestrator::new(config).expect("pool");
    let req = ConditioningRequest::from_glyph("龍", 2048, 2048, ConditioningType::Edge).with_method("multi_scale_canny");
    let res = orch.process(&req);
    assert!(!res.success);
    assert_eq!(res.error_message.as_deref(), Some("timed out after 1 ms"));
    assert!(orch.cache().is_empty());
}

#[test]
fn generate_collects_each_requested_type() {
    init_logger();
    let orch = engine(16);
    let plan = GenerationRequest {
        glyph: Some("火".into()),
        width: 256,
        height: 256,
        kinds: ConditioningType::ALL.to_vec(),
        ..GenerationRequest::default()
    };
    let map = orch.generate(&plan).expect("at least one success");
    assert_eq!(map.len(), 4);
    assert!(map[&ConditioningType::Segmentation].contains_key("radical_segmentation"));
    assert!(map.values().flat_map(|m| m.values()).all(|r| r.success));
}

#[test]
fn generate_keeps_partial_failures() {
    init_logger();
    let orch = engine(16);
    let plan = GenerationRequest {
        glyph: Some("火".into()),
        width: 256,
        height: 256,
        kinds: vec![ConditioningType::Edge, ConditioningType::Depth],
        method: MethodSelection::Named("opencv_canny".into()),
        ..GenerationRequest::default()
    };
    let map = orch.generate(&plan).expect("edge succeeds");
    assert!(map[&ConditioningType::Edge]["opencv_canny"].success);
    let depth = &map[&ConditioningType::Depth]["opencv_canny"];
    assert_eq!(depth.error_message.as_deref(), Some("Unknown method: opencv_canny"));
}

#[test]
fn generate_with_no_success_is_an_error() {
    init_logger();
    let orch = engine(16);
    let plan = GenerationRequest {
        glyph: Some("一二三四五六七八九十百".into()),
        width: 256,
        height: 256,
        ..GenerationRequest::default()
    };
    match orch.generate(&plan) {
        Err(OrchestratorError::NoConditioningImages(msg)) => assert!(msg.contains("got 11")),
        other => panic!("expected NoConditioningImages, got {other:?}"),
    }
}

#[test]
fn batch_keeps_order_and_isolates_failures() {
    init_logger();
    let orch = engine(16);
    let requests = vec![
        ConditioningRequest::from_glyph("人", 128, 128, ConditioningType::Scribble),
        ConditioningRequest::from_glyph("人", 128, 128, ConditioningType::Edge).with_method("not_a_method"),
        ConditioningRequest::from_image(Raster::filled_rgb(96, 96, [200, 40, 40]), ConditioningType::Segmentation)
            .with_method("color_based_segmentation"),
        ConditioningRequest::from_image(checkerboard(96, 96, 12), ConditioningType::Depth),
    ];
    let results = orch.process_batch(&requests);
    assert_eq!(results.len(), 4);
    assert!(results[0].success);
    assert_eq!(results[1].error_message.as_deref(), Some("Unknown method: not_a_method"));
    assert_eq!(results[2].method_used, "color_based_segmentation");
    assert_eq!(results[3].method_used, "stroke_thickness_depth");
    assert!(results[3].success);
}
