//! Set overlap: each fingerprint becomes the set of its strongest features,
//! compared with the Jaccard index.
use std::cmp::Ordering;

use itertools::{EitherOrBoth, Itertools};
use log::info;
use serde::{Deserialize, Serialize};

use crate::fingerprint::FingerprintRecord;
use crate::pipeline::ProgressReporter;
use crate::similarity::index::{SimilarMatch, SimilarityIndex, uniform_dim};
use crate::similarity::projection::principal_plane;
use crate::similarity::{Similarity, SimilarityStrategy};
use crate::utils::errors::SimilarityError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JaccardParams {
    /// How many of the largest positive components form a fingerprint's set.
    pub top_k: usize,
}

impl Default for JaccardParams {
    fn default() -> Self {
        Self { top_k: 16 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Jaccard {
    params: JaccardParams,
    index: Option<SimilarityIndex>,
    sets: Vec<Vec<u32>>,
    dim: usize,
}

impl Jaccard {
    pub fn new(params: JaccardParams) -> Self {
        Self { params, ..Default::default() }
    }

    pub fn params(&self) -> &JaccardParams {
        &self.params
    }

    /// Set of the fingerprint with id `id`, as sorted feature indices.
    pub fn feature_set(&self, id: &str) -> Option<&[u32]> {
        let slot = self.index.as_ref()?.slot(id)?;
        self.sets.get(slot).map(Vec::as_slice)
    }
}

/// Indices of the `top_k` largest strictly positive components, sorted
/// ascending. Equal values prefer the lower index.
pub fn active_features(vector: &[f32], top_k: usize) -> Vec<u32> {
    let mut set: Vec<u32> = vector
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0.0)
        .sorted_by(|(ia, a), (ib, b)| b.partial_cmp(a).unwrap_or(Ordering::Equal).then(ia.cmp(ib)))
        .take(top_k)
        .map(|(i, _)| i as u32)
        .collect();
    set.sort_unstable();
    set
}

/// `1 - |a ∩ b| / |a ∪ b|` over sorted sets; two empty sets are identical.
pub fn jaccard_distance(a: &[u32], b: &[u32]) -> f32 {
    let (mut shared, mut union) = (0usize, 0usize);
    for pair in a.iter().merge_join_by(b.iter(), |x, y| x.cmp(y)) {
        union += 1;
        if let EitherOrBoth::Both(..) = pair {
            shared += 1;
        }
    }
    if union == 0 {
        return 0.0;
    }
    1.0 - shared as f32 / union as f32
}

impl Similarity for Jaccard {
    fn strategy(&self) -> SimilarityStrategy {
        SimilarityStrategy::Jaccard
    }

    fn calculate(
        &mut self,
        records: &[FingerprintRecord],
        reporter: &ProgressReporter,
    ) -> Result<(), SimilarityError> {
        let dim = uniform_dim(records)?;
        info!("Building feature sets (top {}) for {} fingerprints", self.params.top_k, records.len());

        let mut sets = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if reporter.is_cancelled() {
                return Err(SimilarityError::Cancelled);
            }
            sets.push(active_features(&record.feature_vector, self.params.top_k));
            reporter.step(i + 1, records.len() * 2);
        }

        let vectors: Vec<_> = records.iter().map(|r| r.feature_vector.clone()).collect();
        let coordinates = principal_plane(&vectors)?;
        reporter.report(1.0);

        self.sets = sets;
        self.dim = dim;
        self.index = Some(SimilarityIndex::new(records.to_vec(), coordinates));
        Ok(())
    }

    fn index(&self) -> Option<&SimilarityIndex> {
        self.index.as_ref()
    }

    /// `point` is a fingerprint-space vector; it is reduced to its own
    /// feature set and ranked by Jaccard distance.
    fn find_similar(&self, point: &[f32], n: usize) -> Result<Vec<SimilarMatch<'_>>, SimilarityError> {
        let index = self.index.as_ref().ok_or(SimilarityError::NotCalculated)?;
        if !index.is_empty() && point.len() != self.dim {
            return Err(SimilarityError::DimensionMismatch { expected: self.dim, actual: point.len() });
        }
        let query = active_features(point, self.params.top_k);
        let distances = self.sets.iter().map(|set| jaccard_distance(&query, set));
        index.nearest(distances, n)
    }
}
