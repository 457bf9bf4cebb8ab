use serde::{Deserialize, Serialize};

use crate::fingerprint::cutout::Cutout;
use crate::utils::types::Vector;

/// One computed fingerprint plus where it came from. Never mutated after
/// the worker creates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// Same as the id of the cutout it was computed from.
    pub id: String,
    pub cutout: Cutout,
    pub feature_vector: Vector,
    /// Name of the extractor configuration that produced the vector.
    pub extractor: String,
}

impl FingerprintRecord {
    pub fn new(cutout: Cutout, feature_vector: Vector, extractor: impl Into<String>) -> Self {
        Self {
            id: cutout.id.clone(),
            cutout,
            feature_vector,
            extractor: extractor.into(),
        }
    }

    pub fn dim(&self) -> usize {
        self.feature_vector.len()
    }
}
