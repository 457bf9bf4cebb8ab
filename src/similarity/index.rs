use std::collections::HashMap;

use crate::fingerprint::FingerprintRecord;
use crate::utils::errors::SimilarityError;
use crate::utils::types::DisplayCoordinate;
use crate::vector::knn::{Neighbor, k_nearest, resolve_count};

/// Records and their display coordinates, one slot per record, in the order
/// they were passed to `calculate`.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    records: Vec<FingerprintRecord>,
    coordinates: Vec<DisplayCoordinate>,
    slots: HashMap<String, usize>,
}

/// A record returned by `find_similar`, closest first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarMatch<'a> {
    pub distance: f32,
    pub record: &'a FingerprintRecord,
}

impl SimilarityIndex {
    pub fn new(records: Vec<FingerprintRecord>, coordinates: Vec<DisplayCoordinate>) -> Self {
        debug_assert_eq!(records.len(), coordinates.len());
        let slots = records.iter().enumerate().map(|(i, r)| (r.id.clone(), i)).collect();
        Self { records, coordinates, slots }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FingerprintRecord] {
        &self.records
    }

    pub fn coordinates(&self) -> &[DisplayCoordinate] {
        &self.coordinates
    }

    pub fn slot(&self, id: &str) -> Option<usize> {
        self.slots.get(id).copied()
    }

    pub fn coordinate(&self, id: &str) -> Option<DisplayCoordinate> {
        self.slot(id).map(|i| self.coordinates[i])
    }

    /// Exact k-NN over per-slot distances, clamped to the index size.
    pub fn nearest<I>(&self, distances: I, n: usize) -> Result<Vec<SimilarMatch<'_>>, SimilarityError>
    where
        I: IntoIterator<Item = f32>,
    {
        let n = resolve_count(n, self.len())?;
        Ok(k_nearest(distances, n)
            .into_iter()
            .map(|Neighbor { index, distance }| SimilarMatch { distance, record: &self.records[index] })
            .collect())
    }
}

/// Checks every record has the same fingerprint length and returns it.
pub(crate) fn uniform_dim(records: &[FingerprintRecord]) -> Result<usize, SimilarityError> {
    let Some(first) = records.first() else {
        return Ok(0);
    };
    let expected = first.dim();
    match records.iter().find(|r| r.dim() != expected) {
        Some(bad) => Err(SimilarityError::InconsistentDimensions {
            id: bad.id.clone(),
            expected,
            actual: bad.dim(),
        }),
        None => Ok(expected),
    }
}
