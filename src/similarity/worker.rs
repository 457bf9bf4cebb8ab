use log::info;

use crate::fingerprint::FingerprintRecord;
use crate::pipeline::{PipelineContext, PipelineHandle, ProgressReporter};
use crate::similarity::{Similarity, SimilarityConfig, SimilarityEngine};
use crate::utils::errors::{PipelineError, SimilarityError};

/// Submits engine construction as a single unit of work.
///
/// The strategy key is validated here, before anything is dispatched.
pub fn submit(
    ctx: &PipelineContext,
    records: Vec<FingerprintRecord>,
    config: &SimilarityConfig,
) -> Result<PipelineHandle<SimilarityEngine>, PipelineError> {
    SimilarityEngine::from_config(config)?;

    ctx.dispatch_with(
        vec![records],
        1,
        |mut chunk: Vec<Vec<FingerprintRecord>>,
         config: &SimilarityConfig,
         reporter: &ProgressReporter|
         -> Result<Vec<SimilarityEngine>, SimilarityError> {
            let records = chunk.pop().unwrap_or_default();
            let mut engine = SimilarityEngine::from_config(config)?;
            engine.calculate(&records, reporter)?;
            Ok(vec![engine])
        },
        config.clone(),
    )
}

/// Builds the configured engine through the pipeline and waits for it.
pub fn similarity_distributed<P>(
    ctx: &PipelineContext,
    records: Vec<FingerprintRecord>,
    config: &SimilarityConfig,
    on_progress: P,
) -> Result<SimilarityEngine, PipelineError>
where
    P: FnMut(f32, &[f32]),
{
    let count = records.len();
    let mut engines = submit(ctx, records, config)?.join_with_progress(on_progress)?;
    // one unit, one engine
    let engine = engines.pop().ok_or(PipelineError::Cancelled)?;
    info!("Built {} similarity over {} fingerprints", engine.strategy(), count);
    Ok(engine)
}
