//! Distributed fingerprinting of image cutouts and similarity exploration.
//!
//! Cutouts are split into balanced chunks and fingerprinted on a worker pool
//! ([`pipeline`], [`fingerprint`]); the resulting records feed a
//! [`similarity`] engine that answers nearest-neighbour queries.
pub mod fingerprint;
pub mod pipeline;
pub mod similarity;
pub mod utils;
pub mod vector;

pub use fingerprint::{Cutout, FingerprintRecord};
pub use pipeline::{PipelineConfig, PipelineContext, PipelineHandle};
pub use similarity::{Similarity, SimilarityConfig, SimilarityEngine};
pub use utils::errors::{FingerprintError, PipelineError, SimilarityError};
