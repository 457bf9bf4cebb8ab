use std::thread;
use std::time::Duration;

use tldist::fingerprint::{Cutout, FingerprintRecord, PixelBounds};
use tldist::pipeline::{
    PipelineConfig, PipelineContext, ProgressAggregator, ProgressReporter, UnitState,
};
use tldist::utils::errors::{ConfigError, FingerprintError, PipelineError};

fn context(parallelism: usize) -> PipelineContext {
    PipelineContext::new(PipelineConfig {
        parallelism,
        workers: 4,
        poll_interval_ms: 5,
        timeout_secs: None,
    })
    .unwrap()
}

fn cutouts(n: usize) -> Vec<(usize, Cutout)> {
    (0..n)
        .map(|i| (i, Cutout::new(format!("c{i}"), "img.fits", PixelBounds::centered(112, 112 + i, 224))))
        .collect()
}

fn index_fingerprint(
    chunk: Vec<(usize, Cutout)>,
    _: &(),
    reporter: &ProgressReporter,
) -> Result<Vec<FingerprintRecord>, FingerprintError> {
    let total = chunk.len();
    let mut out = Vec::with_capacity(total);
    for (done, (i, cutout)) in chunk.into_iter().enumerate() {
        out.push(FingerprintRecord::new(cutout, vec![i as f32; 8], "index"));
        reporter.step(done + 1, total);
    }
    Ok(out)
}

#[test]
fn test_forty_cutouts_come_back_in_order() {
    let ctx = context(4);
    let handle = ctx.dispatch(cutouts(40), index_fingerprint, ()).unwrap();
    assert_eq!(handle.unit_count(), 4);
    assert_eq!(handle.chunk_sizes(), vec![10, 10, 10, 10]);

    let records = handle.join().unwrap();
    assert_eq!(records.len(), 40);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.feature_vector, vec![i as f32; 8]);
        assert_eq!(record.id, format!("c{i}"));
    }
}

#[test]
fn test_order_is_preserved_for_uneven_chunks() {
    let ctx = context(4);
    for (n, p) in [(1, 4), (7, 3), (13, 5), (31, 8)] {
        let items: Vec<usize> = (0..n).collect();
        let handle = ctx
            .dispatch_with(
                items.clone(),
                p,
                |chunk: Vec<usize>, _: &(), _: &ProgressReporter| Ok::<_, FingerprintError>(chunk),
                (),
            )
            .unwrap();
        assert_eq!(handle.unit_count(), p.min(n));
        assert_eq!(handle.join().unwrap(), items);
    }
}

#[test]
fn test_empty_input_joins_to_empty() {
    let ctx = context(4);
    let handle = ctx.dispatch(Vec::<(usize, Cutout)>::new(), index_fingerprint, ()).unwrap();
    assert_eq!(handle.unit_count(), 0);
    assert!(handle.is_complete());
    assert!(handle.join().unwrap().is_empty());
}

#[test]
fn test_zero_parallelism_is_rejected() {
    let ctx = context(4);
    let result = ctx.dispatch_with(cutouts(3), 0, index_fingerprint, ());
    assert!(matches!(result, Err(PipelineError::InvalidParallelism(0))));
}

#[test]
fn test_context_rejects_invalid_config() {
    let config = PipelineConfig { parallelism: 2, workers: 2, poll_interval_ms: 0, timeout_secs: None };
    let result = PipelineContext::new(config);
    assert!(matches!(result, Err(PipelineError::Config(ConfigError::Invalid(_)))));

    let config = PipelineConfig { parallelism: 2, workers: 0, poll_interval_ms: 5, timeout_secs: None };
    let result = PipelineContext::new(config);
    assert!(matches!(result, Err(PipelineError::Config(ConfigError::Invalid(_)))));

    let config = PipelineConfig { parallelism: 0, ..PipelineConfig::default() };
    assert!(matches!(PipelineContext::new(config), Err(PipelineError::InvalidParallelism(0))));
}

#[test]
fn test_one_failed_unit_fails_the_join() {
    let ctx = context(3);
    let handle = ctx
        .dispatch(
            cutouts(9),
            |chunk: Vec<(usize, Cutout)>, _: &(), reporter: &ProgressReporter| {
                if chunk.iter().any(|(i, _)| *i == 4) {
                    return Err(FingerprintError::Cancelled);
                }
                index_fingerprint(chunk, &(), reporter)
            },
            (),
        )
        .unwrap();

    match handle.join() {
        Err(err @ PipelineError::Execution { unit: 1, .. }) => {
            assert!(matches!(err.unit_error::<FingerprintError>(), Some(FingerprintError::Cancelled)));
        }
        other => panic!("expected execution error from unit 1, got {:?}", other.map(|r| r.len())),
    }
}

#[test]
fn test_worker_panic_becomes_unit_failure() {
    let ctx = context(2);
    let handle = ctx
        .dispatch(
            vec![1, 2, 3, 4],
            |chunk: Vec<i32>, _: &(), _: &ProgressReporter| {
                if chunk.contains(&3) {
                    panic!("bad cutout");
                }
                Ok::<_, FingerprintError>(chunk)
            },
            (),
        )
        .unwrap();

    let err = handle.join().unwrap_err();
    assert!(matches!(err, PipelineError::Execution { unit: 1, .. }));
    assert!(err.to_string().contains("bad cutout"), "{err}");
}

#[test]
fn test_progress_never_decreases_and_ends_at_one() {
    let ctx = context(3);
    let handle = ctx
        .dispatch(
            (0..30).collect::<Vec<usize>>(),
            |chunk: Vec<usize>, _: &(), reporter: &ProgressReporter| {
                let total = chunk.len();
                for done in 1..=total {
                    thread::sleep(Duration::from_millis(2));
                    reporter.step(done, total);
                }
                Ok::<_, FingerprintError>(chunk)
            },
            (),
        )
        .unwrap();

    let mut seen = Vec::new();
    let results = handle
        .join_with_progress(|overall, units| {
            assert_eq!(units.len(), 3);
            seen.push(overall);
        })
        .unwrap();

    assert_eq!(results.len(), 30);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert_eq!(*seen.last().unwrap(), 1.0);
}

#[test]
fn test_snapshots_report_done_after_completion() {
    let ctx = context(2);
    let handle = ctx.dispatch(cutouts(6), index_fingerprint, ()).unwrap();
    let overall = handle.await_completion(None, |_, _| {}).unwrap();
    assert_eq!(overall, 1.0);
    assert!(handle.is_complete());
    for snap in handle.snapshots() {
        assert_eq!(snap.state, UnitState::Done);
        assert_eq!(snap.progress, 1.0);
        assert_eq!(snap.size, 3);
    }
    assert_eq!(handle.join().unwrap().len(), 6);
}

fn wait_for_cancel(
    chunk: Vec<usize>,
    _: &(),
    reporter: &ProgressReporter,
) -> Result<Vec<usize>, FingerprintError> {
    while !reporter.is_cancelled() {
        thread::sleep(Duration::from_millis(1));
    }
    let _ = chunk;
    Err(FingerprintError::Cancelled)
}

#[test]
fn test_timeout_cancels_outstanding_units() {
    let ctx = context(2);
    let handle = ctx.dispatch((0..4).collect(), wait_for_cancel, ()).unwrap();

    let result = handle.await_completion(Some(Duration::from_millis(30)), |_, _| {});
    assert!(matches!(result, Err(PipelineError::TimedOut(_))));
    assert!(handle.is_cancelled());
}

#[test]
fn test_cancel_from_another_thread() {
    let ctx = context(2);
    let handle = ctx.dispatch((0..4).collect(), wait_for_cancel, ()).unwrap();
    let canceller = handle.canceller();

    let t = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        canceller.cancel();
    });

    let result = handle.join();
    t.join().unwrap();
    assert!(matches!(result, Err(PipelineError::Cancelled)));
}

#[test]
fn test_context_counts_runs() {
    let ctx = context(2);
    ctx.dispatch(cutouts(2), index_fingerprint, ()).unwrap().join().unwrap();
    ctx.dispatch(cutouts(2), index_fingerprint, ()).unwrap().join().unwrap();
    assert_eq!(ctx.runs_dispatched(), 2);
}

#[test]
fn test_aggregator_weights_by_chunk_size() {
    let mut agg = ProgressAggregator::new(&[3, 1]);
    assert_eq!(agg.update(&[0.0, 1.0]), 0.25);
    assert_eq!(agg.update(&[1.0, 1.0]), 1.0);
}

#[test]
fn test_aggregator_is_monotone() {
    let mut agg = ProgressAggregator::new(&[2, 2]);
    assert_eq!(agg.update(&[0.5, 0.5]), 0.5);
    // a stale reading must not move the overall value backwards
    assert_eq!(agg.update(&[0.25, 0.25]), 0.5);
    assert_eq!(agg.overall(), 0.5);
}

#[test]
fn test_aggregator_with_no_units_is_complete() {
    let mut agg = ProgressAggregator::new(&[]);
    assert_eq!(agg.update(&[]), 1.0);
}

#[test]
fn test_pipeline_config_loads_partial_json() {
    let config = PipelineConfig::from_json(r#"{"parallelism": 8}"#).unwrap();
    assert_eq!(config.parallelism, 8);
    assert_eq!(config.poll_interval_ms, 100);
    assert!(config.timeout_secs.is_none());
    assert!(PipelineConfig::from_json(r#"{"parallelism": 0}"#).is_err());
}
