use std::sync::Arc;

use log::{debug, info};

use crate::fingerprint::cutout::Cutout;
use crate::fingerprint::extractor::{ExtractorConfig, FeatureExtractor};
use crate::fingerprint::record::FingerprintRecord;
use crate::fingerprint::source::PatchSource;
use crate::pipeline::{PipelineContext, PipelineHandle, ProgressReporter};
use crate::utils::errors::{FingerprintError, PipelineError};

/// Computes one record per cutout, in input order.
///
/// Progress is reported after every cutout. The first failing cutout fails
/// the whole batch; nothing computed before it is returned.
pub fn compute(
    cutouts: Vec<Cutout>,
    extractor: &dyn FeatureExtractor,
    source: &dyn PatchSource,
    reporter: &ProgressReporter,
) -> Result<Vec<FingerprintRecord>, FingerprintError> {
    let total = cutouts.len();
    let name = extractor.name();
    let mut records: Vec<FingerprintRecord> = Vec::with_capacity(total);
    debug!("Computing {} fingerprints with {}", total, name);

    for (i, cutout) in cutouts.into_iter().enumerate() {
        if reporter.is_cancelled() {
            return Err(FingerprintError::Cancelled);
        }

        let patch = source.load(&cutout).map_err(|source| FingerprintError::PatchLoad {
            cutout: cutout.id.clone(),
            source,
        })?;
        let vector = extractor.calculate(&patch).map_err(|source| FingerprintError::Extraction {
            cutout: cutout.id.clone(),
            source,
        })?;

        if let Some(first) = records.first() {
            if first.dim() != vector.len() {
                return Err(FingerprintError::InconsistentLength {
                    cutout: cutout.id.clone(),
                    expected: first.dim(),
                    actual: vector.len(),
                });
            }
        }

        records.push(FingerprintRecord::new(cutout, vector, name.clone()));
        reporter.step(i + 1, total);
    }

    Ok(records)
}

/// Shared payload of every fingerprint unit.
struct FingerprintJob {
    saved_extractor: String,
    source: Arc<dyn PatchSource>,
}

/// Submits fingerprinting of `cutouts` as `parallelism` units.
///
/// Each unit rebuilds its extractor from the saved form of `config`.
pub fn submit(
    ctx: &PipelineContext,
    cutouts: Vec<Cutout>,
    config: &ExtractorConfig,
    source: Arc<dyn PatchSource>,
) -> Result<PipelineHandle<FingerprintRecord>, PipelineError> {
    config.validate().map_err(FingerprintError::from)?;
    let job = FingerprintJob {
        saved_extractor: config.save().map_err(FingerprintError::from)?,
        source,
    };

    ctx.dispatch(
        cutouts,
        |chunk: Vec<Cutout>,
         job: &FingerprintJob,
         reporter: &ProgressReporter|
         -> Result<Vec<FingerprintRecord>, FingerprintError> {
            let extractor = ExtractorConfig::load_parameters(&job.saved_extractor)?.build()?;
            compute(chunk, extractor.as_ref(), job.source.as_ref(), reporter)
        },
        job,
    )
}

/// Runs the whole fingerprint stage and returns the flat, ordered record list.
pub fn calculate_distributed<P>(
    ctx: &PipelineContext,
    cutouts: Vec<Cutout>,
    config: &ExtractorConfig,
    source: Arc<dyn PatchSource>,
    on_progress: P,
) -> Result<Vec<FingerprintRecord>, PipelineError>
where
    P: FnMut(f32, &[f32]),
{
    let total = cutouts.len();
    let records = submit(ctx, cutouts, config, source)?.join_with_progress(on_progress)?;

    // units validate themselves; this catches disagreement between units
    if let Some(first) = records.first() {
        if let Some(bad) = records.iter().find(|r| r.dim() != first.dim()) {
            return Err(FingerprintError::InconsistentLength {
                cutout: bad.id.clone(),
                expected: first.dim(),
                actual: bad.dim(),
            }
            .into());
        }
    }

    info!("Computed {} fingerprints for {} cutouts", records.len(), total);
    Ok(records)
}
