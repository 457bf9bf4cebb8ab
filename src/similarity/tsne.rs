//! Embedding projection: t-SNE of the fingerprints into the plane.
//!
//! Barnes-Hut t-SNE from `linfa-tsne`, so memory grows with the neighbourhood
//! size rather than with n^2. Runs are reproducible when `seed` is set.
use linfa::ParamGuard;
use linfa::traits::Transformer;
use linfa_tsne::TSneParams;
use log::{debug, info};
use rand::Rng;
use rand_08::SeedableRng;
use rand_08::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::fingerprint::FingerprintRecord;
use crate::pipeline::ProgressReporter;
use crate::similarity::index::{SimilarMatch, SimilarityIndex, uniform_dim};
use crate::similarity::projection::{feature_matrix, principal_plane};
use crate::similarity::{Similarity, SimilarityStrategy};
use crate::utils::errors::SimilarityError;
use crate::utils::types::{DisplayCoordinate, Vector};
use crate::vector::metric::euclidean_distance;

/// Below this many records there is no neighbourhood to preserve; the
/// principal plane is used instead.
const MIN_EMBEDDED: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsneParams {
    /// Upper bound; lowered to fit small inputs.
    pub perplexity: f64,
    pub iterations: usize,
    /// Barnes-Hut accuracy. 0 runs the exact O(n^2) gradient.
    pub approx_threshold: f64,
    /// Fixes the random initial layout. `None` draws a fresh seed per run.
    pub seed: Option<u64>,
}

impl Default for TsneParams {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            iterations: 1000,
            approx_threshold: 0.5,
            seed: None,
        }
    }
}

impl TsneParams {
    /// Perplexity usable for `n` records: the neighbourhood (3 x perplexity)
    /// must fit in the other n - 1 records.
    pub fn effective_perplexity(&self, n: usize) -> f64 {
        let bound = n.saturating_sub(1) as f64 / 3.0 - 1e-3;
        self.perplexity.min(bound).max(f64::EPSILON)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tsne {
    params: TsneParams,
    index: Option<SimilarityIndex>,
}

impl Tsne {
    pub fn new(params: TsneParams) -> Self {
        Self { params, index: None }
    }

    pub fn params(&self) -> &TsneParams {
        &self.params
    }
}

impl Similarity for Tsne {
    fn strategy(&self) -> SimilarityStrategy {
        SimilarityStrategy::Tsne
    }

    fn calculate(
        &mut self,
        records: &[FingerprintRecord],
        reporter: &ProgressReporter,
    ) -> Result<(), SimilarityError> {
        uniform_dim(records)?;
        let seed = self.params.seed.unwrap_or_else(|| rand::rng().random());
        info!("Running t-SNE on {} fingerprints (seed {})", records.len(), seed);

        let vectors: Vec<Vector> = records.iter().map(|r| r.feature_vector.clone()).collect();
        let coordinates = embed(&vectors, &self.params, seed, reporter)?;
        self.index = Some(SimilarityIndex::new(records.to_vec(), coordinates));
        Ok(())
    }

    fn index(&self) -> Option<&SimilarityIndex> {
        self.index.as_ref()
    }

    /// Nearest records to `point` in the embedding plane, by Euclidean distance.
    fn find_similar(&self, point: &[f32], n: usize) -> Result<Vec<SimilarMatch<'_>>, SimilarityError> {
        let index = self.index.as_ref().ok_or(SimilarityError::NotCalculated)?;
        if point.len() != 2 {
            return Err(SimilarityError::DimensionMismatch { expected: 2, actual: point.len() });
        }
        let distances = index.coordinates().iter().map(|c| euclidean_distance(c, point));
        index.nearest(distances, n)
    }
}

fn embed(
    vectors: &[Vector],
    params: &TsneParams,
    seed: u64,
    reporter: &ProgressReporter,
) -> Result<Vec<DisplayCoordinate>, SimilarityError> {
    if reporter.is_cancelled() {
        return Err(SimilarityError::Cancelled);
    }
    let n = vectors.len();
    if n < MIN_EMBEDDED {
        reporter.report(1.0);
        return principal_plane(vectors);
    }

    let matrix = feature_matrix(vectors)?;
    let perplexity = params.effective_perplexity(n);
    debug!("t-SNE perplexity {perplexity:.2}, {} iterations", params.iterations);
    reporter.report(0.0);

    let embedding = TSneParams::embedding_size_with_rng(2, StdRng::seed_from_u64(seed))
        .perplexity(perplexity)
        .approx_threshold(params.approx_threshold)
        .max_iter(params.iterations)
        .check()?
        .transform(matrix)?;

    // the optimiser cannot be interrupted; drop its result if cancelled meanwhile
    if reporter.is_cancelled() {
        return Err(SimilarityError::Cancelled);
    }
    reporter.report(1.0);
    Ok(embedding.rows().into_iter().map(|row| [row[0] as f32, row[1] as f32]).collect())
}
