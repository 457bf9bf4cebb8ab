use serde::{Deserialize, Serialize};

/// A fingerprint or any other dense feature vector.
pub type Vector = Vec<f32>;

/// Distance between a query and a stored record. Lower is closer.
pub type Score = f32;

/// Position of a work unit within its pipeline run (submission order).
pub type UnitId = usize;

/// Low-dimensional point shown for one record in the exploration view.
pub type DisplayCoordinate = [f32; 2];

/// Describes the type of distance metric used for similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    Dot,
    #[default]
    Euclidean,
}
