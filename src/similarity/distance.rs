//! Direct distance: exact k-NN in the native fingerprint space.
use log::info;
use serde::{Deserialize, Serialize};

use crate::fingerprint::FingerprintRecord;
use crate::pipeline::ProgressReporter;
use crate::similarity::index::{SimilarMatch, SimilarityIndex, uniform_dim};
use crate::similarity::projection::principal_plane;
use crate::similarity::{Similarity, SimilarityStrategy};
use crate::utils::errors::SimilarityError;
use crate::utils::types::DistanceMetric;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceParams {
    pub metric: DistanceMetric,
}

#[derive(Debug, Clone, Default)]
pub struct Distance {
    params: DistanceParams,
    index: Option<SimilarityIndex>,
    dim: usize,
}

impl Distance {
    pub fn new(params: DistanceParams) -> Self {
        Self { params, index: None, dim: 0 }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.params.metric
    }

    pub fn params(&self) -> &DistanceParams {
        &self.params
    }
}

impl Similarity for Distance {
    fn strategy(&self) -> SimilarityStrategy {
        SimilarityStrategy::Distance
    }

    fn calculate(
        &mut self,
        records: &[FingerprintRecord],
        reporter: &ProgressReporter,
    ) -> Result<(), SimilarityError> {
        self.dim = uniform_dim(records)?;
        info!("Indexing {} fingerprints by {:?} distance", records.len(), self.params.metric);
        if reporter.is_cancelled() {
            return Err(SimilarityError::Cancelled);
        }

        let vectors: Vec<_> = records.iter().map(|r| r.feature_vector.clone()).collect();
        let coordinates = principal_plane(&vectors)?;
        self.index = Some(SimilarityIndex::new(records.to_vec(), coordinates));
        reporter.report(1.0);
        Ok(())
    }

    fn index(&self) -> Option<&SimilarityIndex> {
        self.index.as_ref()
    }

    fn find_similar(&self, point: &[f32], n: usize) -> Result<Vec<SimilarMatch<'_>>, SimilarityError> {
        let index = self.index.as_ref().ok_or(SimilarityError::NotCalculated)?;
        if !index.is_empty() && point.len() != self.dim {
            return Err(SimilarityError::DimensionMismatch { expected: self.dim, actual: point.len() });
        }
        let metric = self.params.metric;
        let distances = index
            .records()
            .iter()
            .map(|r| metric.between(&r.feature_vector, point));
        index.nearest(distances, n)
    }
}
