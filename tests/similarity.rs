use tldist::fingerprint::{Cutout, FingerprintRecord, PixelBounds};
use tldist::pipeline::{PipelineConfig, PipelineContext, ProgressReporter};
use tldist::similarity::overlap::{active_features, jaccard_distance};
use tldist::similarity::projection::principal_plane;
use tldist::similarity::tsne::TsneParams;
use tldist::similarity::worker::similarity_distributed;
use tldist::similarity::{
    Canvas, Distance, DistanceParams, Jaccard, JaccardParams, Similarity, SimilarityConfig, SimilarityEngine,
    SimilarityStrategy,
};
use tldist::utils::errors::{PipelineError, SimilarityError};
use tldist::utils::types::{DisplayCoordinate, DistanceMetric};

fn record(i: usize, vector: Vec<f32>) -> FingerprintRecord {
    let cutout = Cutout::new(format!("r{i}"), "field.fits", PixelBounds::centered(112, 112 + i, 224));
    FingerprintRecord::new(cutout, vector, "test")
}

fn records(vectors: Vec<Vec<f32>>) -> Vec<FingerprintRecord> {
    vectors.into_iter().enumerate().map(|(i, v)| record(i, v)).collect()
}

/// Two well separated groups of ten 4-d fingerprints each.
fn two_clusters() -> Vec<FingerprintRecord> {
    let vectors = (0..20)
        .map(|i| {
            let base = if i < 10 { 0.0 } else { 20.0 };
            let j = (i % 10) as f32;
            vec![base + j * 0.1, base + (j * 0.7).sin() * 0.3, base - j * 0.05, base + (j % 3.0) * 0.2]
        })
        .collect();
    records(vectors)
}

fn calculated(key: &str, records: &[FingerprintRecord]) -> SimilarityEngine {
    let mut engine = SimilarityEngine::new(key).unwrap();
    engine.calculate(records, &ProgressReporter::detached()).unwrap();
    engine
}

fn seeded_tsne(seed: u64) -> SimilarityEngine {
    let mut config = SimilarityConfig::new("tsne");
    config.tsne.seed = Some(seed);
    config.tsne.iterations = 300;
    SimilarityEngine::from_config(&config).unwrap()
}

#[derive(Default)]
struct RecordingCanvas {
    cleared: usize,
    layers: Vec<(String, Vec<DisplayCoordinate>)>,
}

impl Canvas for RecordingCanvas {
    fn clear(&mut self) {
        self.cleared += 1;
        self.layers.clear();
    }

    fn scatter(&mut self, points: &[DisplayCoordinate], label: &str) {
        self.layers.push((label.to_string(), points.to_vec()));
    }
}

#[test]
fn test_direct_distance_returns_closest_first() {
    let records = records(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 3.0], vec![5.0, 5.0]]);
    let engine = calculated("distance", &records);

    let hits = engine.find_similar(&[0.0, 0.0], 2).unwrap();
    let ids: Vec<&str> = hits.iter().map(|m| m.record.id.as_str()).collect();
    assert_eq!(ids, vec!["r0", "r1"]);
    assert_eq!(hits[0].distance, 0.0);
    assert_eq!(hits[1].distance, 1.0);
}

#[test]
fn test_direct_distance_tie_goes_to_earlier_record() {
    let records = records(vec![
        vec![0.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![5.0, 5.0],
        vec![5.0, 6.0],
    ]);
    let engine = calculated("distance", &records);

    let hits = engine.find_similar(&[0.0, 0.0], 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.feature_vector, vec![0.0, 0.0]);
    assert_eq!(hits[1].record.feature_vector, vec![1.0, 0.0]);
    assert_eq!(hits[1].distance, 1.0);
}

#[test]
fn test_neighbor_count_is_clamped() {
    let records = records((0..9).map(|i| vec![i as f32, 1.0]).collect());
    let engine = calculated("distance", &records);

    let hits = engine.find_similar(&[4.0, 1.0], 20).unwrap();
    assert_eq!(hits.len(), 9);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!(hits[0].record.id, "r4");
}

#[test]
fn test_zero_neighbors_is_rejected() {
    let engine = calculated("distance", &records(vec![vec![1.0], vec![2.0]]));
    assert!(matches!(engine.find_similar(&[1.0], 0), Err(SimilarityError::InvalidNeighborCount(0))));
}

#[test]
fn test_equal_distances_keep_input_order() {
    let records = records(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0], vec![0.0, -1.0]]);
    let engine = calculated("distance", &records);

    let ids: Vec<String> = engine
        .find_similar(&[0.0, 0.0], 4)
        .unwrap()
        .into_iter()
        .map(|m| m.record.id.clone())
        .collect();
    assert_eq!(ids, vec!["r0", "r1", "r2", "r3"]);
}

#[test]
fn test_query_before_calculate_fails() {
    for key in ["tsne", "jaccard", "distance"] {
        let engine = SimilarityEngine::new(key).unwrap();
        assert!(engine.index().is_none());
        assert!(matches!(engine.find_similar(&[0.0, 0.0], 1), Err(SimilarityError::NotCalculated)));
        let mut canvas = RecordingCanvas::default();
        assert!(matches!(engine.display(&mut canvas), Err(SimilarityError::NotCalculated)));
        assert_eq!(canvas.cleared, 0);
    }
}

#[test]
fn test_unknown_strategy_is_rejected() {
    match SimilarityEngine::new("umap") {
        Err(SimilarityError::UnknownStrategy(key)) => assert_eq!(key, "umap"),
        other => panic!("expected unknown strategy, got {other:?}"),
    }
    assert!("Distance".parse::<SimilarityStrategy>().is_err());
}

#[test]
fn test_query_length_must_match_fingerprints() {
    let engine = calculated("distance", &records(vec![vec![1.0, 2.0, 3.0]]));
    assert!(matches!(
        engine.find_similar(&[1.0, 2.0], 1),
        Err(SimilarityError::DimensionMismatch { expected: 3, actual: 2 })
    ));
}

#[test]
fn test_mixed_fingerprint_lengths_are_rejected() {
    let records = records(vec![vec![1.0, 2.0], vec![1.0]]);
    for key in ["tsne", "jaccard", "distance"] {
        let mut engine = SimilarityEngine::new(key).unwrap();
        let err = engine.calculate(&records, &ProgressReporter::detached()).unwrap_err();
        assert!(matches!(err, SimilarityError::InconsistentDimensions { ref id, .. } if id == "r1"));
    }
}

#[test]
fn test_cosine_metric_ranks_by_angle() {
    let records = records(vec![vec![10.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.5]]);
    let mut engine = Distance::new(DistanceParams { metric: DistanceMetric::Cosine });
    engine.calculate(&records, &ProgressReporter::detached()).unwrap();
    assert_eq!(engine.metric(), DistanceMetric::Cosine);

    let hits = engine.find_similar(&[0.0, 3.0], 3).unwrap();
    let ids: Vec<&str> = hits.iter().map(|m| m.record.id.as_str()).collect();
    assert_eq!(ids, vec!["r2", "r1", "r0"]);
}

#[test]
fn test_every_record_gets_a_coordinate() {
    let records = two_clusters();
    for engine in [calculated("distance", &records), calculated("jaccard", &records)] {
        let index = engine.index().unwrap();
        assert_eq!(index.len(), records.len());
        assert_eq!(index.coordinates().len(), records.len());
        for r in &records {
            let xy = index.coordinate(&r.id).unwrap();
            assert!(xy.iter().all(|v| v.is_finite()));
        }
        assert!(index.coordinate("missing").is_none());
    }
}

#[test]
fn test_deterministic_strategies_rebuild_identically() {
    let records = two_clusters();
    for key in ["distance", "jaccard"] {
        let mut engine = SimilarityEngine::new(key).unwrap();
        engine.calculate(&records, &ProgressReporter::detached()).unwrap();
        let first = engine.index().unwrap().coordinates().to_vec();
        engine.calculate(&records, &ProgressReporter::detached()).unwrap();
        assert_eq!(engine.index().unwrap().coordinates(), first.as_slice());
    }
}

#[test]
fn test_empty_input_builds_empty_index() {
    for key in ["tsne", "jaccard", "distance"] {
        let engine = calculated(key, &[]);
        let index = engine.index().unwrap();
        assert!(index.is_empty());
    }
}

#[test]
fn test_active_features_takes_strongest_positive_components() {
    assert_eq!(active_features(&[0.5, -1.0, 0.9, 0.0, 0.5], 2), vec![0, 2]);
    assert_eq!(active_features(&[0.5, -1.0, 0.9, 0.0, 0.5], 10), vec![0, 2, 4]);
    assert!(active_features(&[-1.0, 0.0], 4).is_empty());
}

#[test]
fn test_jaccard_distance_of_sets() {
    assert_eq!(jaccard_distance(&[1, 2, 3], &[1, 2, 3]), 0.0);
    assert_eq!(jaccard_distance(&[1, 2], &[3, 4]), 1.0);
    assert!((jaccard_distance(&[0, 2], &[2, 5]) - 2.0 / 3.0).abs() < 1e-6);
    assert_eq!(jaccard_distance(&[], &[]), 0.0);
}

#[test]
fn test_jaccard_ranks_by_shared_features() {
    let records = records(vec![
        vec![1.0, 1.0, 0.0, 0.0, 0.0],
        vec![1.0, 0.0, 1.0, 0.0, 0.0],
        vec![0.0, 0.0, 0.0, 1.0, 1.0],
    ]);
    let mut engine = Jaccard::new(JaccardParams { top_k: 2 });
    engine.calculate(&records, &ProgressReporter::detached()).unwrap();
    assert_eq!(engine.feature_set("r1"), Some(&[0u32, 2][..]));

    let hits = engine.find_similar(&[0.9, 0.8, 0.1, 0.0, 0.0], 3).unwrap();
    let ids: Vec<&str> = hits.iter().map(|m| m.record.id.as_str()).collect();
    assert_eq!(ids, vec!["r0", "r1", "r2"]);
    assert_eq!(hits[0].distance, 0.0);
    assert_eq!(hits[2].distance, 1.0);
}

#[test]
fn test_seeded_tsne_is_reproducible() {
    let records = two_clusters();
    let mut a = seeded_tsne(42);
    let mut b = seeded_tsne(42);
    a.calculate(&records, &ProgressReporter::detached()).unwrap();
    b.calculate(&records, &ProgressReporter::detached()).unwrap();
    assert_eq!(a.index().unwrap().coordinates(), b.index().unwrap().coordinates());
}

#[test]
fn test_tsne_keeps_clusters_together() {
    let records = two_clusters();
    let mut engine = seeded_tsne(7);
    let reporter = ProgressReporter::detached();
    engine.calculate(&records, &reporter).unwrap();
    assert_eq!(reporter.progress(), 1.0);

    let index = engine.index().unwrap();
    for anchor in [0usize, 13] {
        let point = index.coordinates()[anchor];
        let hits = engine.find_similar(&point, 5).unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].record.id, format!("r{anchor}"));
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        let same_group = |id: &str| id[1..].parse::<usize>().unwrap() / 10 == anchor / 10;
        assert!(hits.iter().all(|m| same_group(&m.record.id)), "{hits:?}");
    }
}

#[test]
fn test_tsne_query_larger_than_index_returns_everything() {
    let records = two_clusters();
    let mut engine = seeded_tsne(11);
    engine.calculate(&records, &ProgressReporter::detached()).unwrap();

    let point = engine.index().unwrap().coordinates()[4];
    let hits = engine.find_similar(&point, 50).unwrap();
    assert_eq!(hits.len(), records.len());
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert!(hits.iter().all(|m| m.distance.is_finite()));
}

#[test]
fn test_tsne_perplexity_fits_small_inputs() {
    let params = TsneParams::default();
    assert_eq!(params.effective_perplexity(1000), 30.0);
    let small = params.effective_perplexity(20);
    assert!(small > 0.0 && 3.0 * small <= 19.0, "{small}");
}

#[test]
fn test_tsne_on_tiny_input_uses_principal_plane() {
    let records = records(vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]]);
    let mut engine = seeded_tsne(5);
    engine.calculate(&records, &ProgressReporter::detached()).unwrap();
    let plane = principal_plane(&[vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]]).unwrap();
    assert_eq!(engine.index().unwrap().coordinates(), plane.as_slice());
}

#[test]
fn test_tsne_queries_are_two_dimensional() {
    let records = two_clusters();
    let mut engine = seeded_tsne(1);
    engine.calculate(&records, &ProgressReporter::detached()).unwrap();
    assert!(matches!(
        engine.find_similar(&[0.0, 0.0, 0.0], 3),
        Err(SimilarityError::DimensionMismatch { expected: 2, actual: 3 })
    ));
}

#[test]
fn test_tsne_stops_when_cancelled() {
    let reporter = ProgressReporter::detached();
    reporter.cancel();
    let mut engine = seeded_tsne(1);
    let err = engine.calculate(&two_clusters(), &reporter).unwrap_err();
    assert!(matches!(err, SimilarityError::Cancelled));
}

#[test]
fn test_display_draws_coordinates() {
    let records = two_clusters();
    let engine = calculated("distance", &records);
    let mut canvas = RecordingCanvas::default();
    engine.display(&mut canvas).unwrap();

    assert_eq!(canvas.cleared, 1);
    assert_eq!(canvas.layers.len(), 1);
    let (label, points) = &canvas.layers[0];
    assert_eq!(label, "distance");
    assert_eq!(points.as_slice(), engine.index().unwrap().coordinates());
}

#[test]
fn test_principal_plane_of_collinear_points() {
    let coords = principal_plane(&[vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]]).unwrap();
    assert_eq!(coords.len(), 3);
    assert!(coords.iter().all(|c| c[1].abs() < 1e-4), "{coords:?}");
    let spread = (coords[2][0] - coords[0][0]).abs();
    assert!((spread - 2.0 * 2f32.sqrt()).abs() < 1e-4, "{spread}");
    assert!(principal_plane(&[]).unwrap().is_empty());
    assert_eq!(principal_plane(&[vec![3.0, 1.0]]).unwrap(), vec![[0.0, 0.0]]);
}

#[test]
fn test_config_round_trip_and_engine_save() {
    let mut config = SimilarityConfig::new("jaccard");
    config.jaccard.top_k = 4;
    let saved = config.save().unwrap();
    let loaded = SimilarityConfig::load_parameters(&saved).unwrap();
    assert_eq!(loaded, config);

    let engine = SimilarityEngine::from_config(&loaded).unwrap();
    assert_eq!(engine.strategy(), SimilarityStrategy::Jaccard);
    assert_eq!(engine.save(), config);

    let partial = SimilarityConfig::load_parameters(r#"{"strategy": "tsne", "tsne": {"seed": 3}}"#).unwrap();
    assert_eq!(partial.version, 1);
    assert_eq!(partial.tsne.seed, Some(3));
    assert_eq!(partial.tsne.iterations, 1000);
}

#[test]
fn test_similarity_through_pipeline() {
    let ctx = PipelineContext::new(PipelineConfig {
        parallelism: 4,
        workers: 2,
        poll_interval_ms: 5,
        timeout_secs: None,
    })
    .unwrap();
    let records = two_clusters();

    let mut last = 0.0;
    let engine = similarity_distributed(&ctx, records.clone(), &SimilarityConfig::new("distance"), |overall, units| {
        assert_eq!(units.len(), 1);
        last = overall;
    })
    .unwrap();
    assert_eq!(last, 1.0);
    assert_eq!(engine.strategy(), SimilarityStrategy::Distance);
    assert_eq!(engine.index().unwrap().records(), records.as_slice());

    let err = similarity_distributed(&ctx, records, &SimilarityConfig::new("umap"), |_, _| {}).unwrap_err();
    assert!(matches!(err, PipelineError::Similarity(SimilarityError::UnknownStrategy(_))));
}
