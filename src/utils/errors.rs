use std::time::Duration;

use thiserror::Error;

use crate::utils::types::UnitId;

/// Failure of a dispatched pipeline run as seen by the caller of `join()`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Parallelism degree must be at least 1, got {0}")]
    InvalidParallelism(usize),

    /// One work unit failed; every other unit's results are discarded.
    #[error("Work unit {unit} failed: {source:#}")]
    Execution {
        unit: UnitId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Pipeline did not complete within {0:?}")]
    TimedOut(Duration),

    #[error("Pipeline was cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    #[error(transparent)]
    Similarity(#[from] SimilarityError),
}

impl PipelineError {
    /// The error raised inside the failed unit, if it has the requested type.
    pub fn unit_error<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            PipelineError::Execution { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Fingerprint computation failed for a unit (fail-fast, no partial unit results).
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("Feature extraction failed for cutout {cutout}: {source}")]
    Extraction {
        cutout: String,
        #[source]
        source: ExtractError,
    },

    #[error("Could not load patch for cutout {cutout}: {source}")]
    PatchLoad {
        cutout: String,
        #[source]
        source: ExtractError,
    },

    #[error("Fingerprint length mismatch for cutout {cutout}: expected {expected}, got {actual}")]
    InconsistentLength {
        cutout: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Fingerprint computation was cancelled")]
    Cancelled,
}

/// Raised by a feature extractor or a patch source for a single patch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("Image patch is empty")]
    EmptyPatch,

    #[error("Patch shape {rows}x{cols}x{channels} does not match {len} pixels")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        channels: usize,
        len: usize,
    },

    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum SimilarityError {
    #[error("Unknown similarity strategy: {0:?} (expected one of tsne, jaccard, distance)")]
    UnknownStrategy(String),

    #[error("Similarity has not been calculated yet")]
    NotCalculated,

    #[error("Query length mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
    },

    #[error("Fingerprint {id} has length {actual}, expected {expected}")]
    InconsistentDimensions {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Number of neighbors must be at least 1, got {0}")]
    InvalidNeighborCount(usize),

    #[error("Could not build feature matrix: {0}")]
    Matrix(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] linfa_tsne::TSneError),

    #[error("Principal plane projection failed: {0}")]
    Projection(#[from] linfa_reduction::ReductionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Similarity calculation was cancelled")]
    Cancelled,
}

/// Loading a saved configuration failed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported configuration version {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),
}
