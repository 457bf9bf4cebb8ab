//! Similarity engines: turn fingerprints into a queryable proximity index
//! plus a 2-D display coordinate per record.
pub mod distance;
pub mod index;
pub mod overlap;
pub mod projection;
pub mod tsne;
pub mod worker;

use std::fmt;
use std::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::fingerprint::FingerprintRecord;
use crate::pipeline::ProgressReporter;
use crate::utils::errors::{ConfigError, SimilarityError};
use crate::utils::types::DisplayCoordinate;

pub use distance::{Distance, DistanceParams};
pub use index::{SimilarMatch, SimilarityIndex};
pub use overlap::{Jaccard, JaccardParams};
pub use tsne::{Tsne, TsneParams};

pub const SIMILARITY_SCHEMA_VERSION: u32 = 1;

/// Drawing surface supplied by the exploration UI.
pub trait Canvas {
    fn clear(&mut self);
    fn scatter(&mut self, points: &[DisplayCoordinate], label: &str);
}

/// Capabilities shared by every strategy, so callers do not care which one
/// is active.
pub trait Similarity {
    fn strategy(&self) -> SimilarityStrategy;

    /// Builds the index from scratch. Calling it again with the same
    /// records rebuilds the same index (t-SNE only when seeded).
    fn calculate(
        &mut self,
        records: &[FingerprintRecord],
        reporter: &ProgressReporter,
    ) -> Result<(), SimilarityError>;

    fn index(&self) -> Option<&SimilarityIndex>;

    /// The `n` records closest to `point`, ascending by distance, ties in
    /// input order. `n` is clamped to the number of records.
    fn find_similar(&self, point: &[f32], n: usize) -> Result<Vec<SimilarMatch<'_>>, SimilarityError>;

    fn display(&self, canvas: &mut dyn Canvas) -> Result<(), SimilarityError> {
        let index = self.index().ok_or(SimilarityError::NotCalculated)?;
        canvas.clear();
        canvas.scatter(index.coordinates(), self.strategy().as_str());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimilarityStrategy {
    Tsne,
    Jaccard,
    Distance,
}

impl SimilarityStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            SimilarityStrategy::Tsne => "tsne",
            SimilarityStrategy::Jaccard => "jaccard",
            SimilarityStrategy::Distance => "distance",
        }
    }
}

impl FromStr for SimilarityStrategy {
    type Err = SimilarityError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "tsne" => Ok(SimilarityStrategy::Tsne),
            "jaccard" => Ok(SimilarityStrategy::Jaccard),
            "distance" => Ok(SimilarityStrategy::Distance),
            other => Err(SimilarityError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for SimilarityStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn current_version() -> u32 {
    SIMILARITY_SCHEMA_VERSION
}

/// Versioned, portable engine configuration. `strategy` is kept as the raw
/// key and only validated when an engine is built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default = "current_version")]
    pub version: u32,
    pub strategy: String,
    #[serde(default)]
    pub tsne: TsneParams,
    #[serde(default)]
    pub jaccard: JaccardParams,
    #[serde(default)]
    pub distance: DistanceParams,
}

impl SimilarityConfig {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            version: SIMILARITY_SCHEMA_VERSION,
            strategy: strategy.into(),
            tsne: TsneParams::default(),
            jaccard: JaccardParams::default(),
            distance: DistanceParams::default(),
        }
    }

    pub fn save(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn load_parameters(saved: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(saved)?;
        if config.version == 0 {
            return Err(ConfigError::UnsupportedVersion(config.version));
        }
        if config.version > SIMILARITY_SCHEMA_VERSION {
            warn!(
                "Similarity config version {} is newer than {}, loading known fields only",
                config.version, SIMILARITY_SCHEMA_VERSION
            );
        }
        Ok(config)
    }
}

/// The active strategy. Built once from a validated key.
#[derive(Debug, Clone)]
pub enum SimilarityEngine {
    EmbeddingProjection(Tsne),
    SetOverlap(Jaccard),
    DirectDistance(Distance),
}

impl SimilarityEngine {
    /// Engine with default parameters for `key` (`tsne`, `jaccard` or `distance`).
    pub fn new(key: &str) -> Result<Self, SimilarityError> {
        Self::from_config(&SimilarityConfig::new(key))
    }

    pub fn from_config(config: &SimilarityConfig) -> Result<Self, SimilarityError> {
        let strategy: SimilarityStrategy = config.strategy.parse()?;
        info!("Creating {} similarity engine", strategy);
        Ok(match strategy {
            SimilarityStrategy::Tsne => SimilarityEngine::EmbeddingProjection(Tsne::new(config.tsne.clone())),
            SimilarityStrategy::Jaccard => SimilarityEngine::SetOverlap(Jaccard::new(config.jaccard.clone())),
            SimilarityStrategy::Distance => {
                SimilarityEngine::DirectDistance(Distance::new(config.distance.clone()))
            }
        })
    }

    /// Configuration that rebuilds an equivalent (uncalculated) engine.
    pub fn save(&self) -> SimilarityConfig {
        let mut config = SimilarityConfig::new(self.strategy().as_str());
        match self {
            SimilarityEngine::EmbeddingProjection(e) => config.tsne = e.params().clone(),
            SimilarityEngine::SetOverlap(e) => config.jaccard = e.params().clone(),
            SimilarityEngine::DirectDistance(e) => config.distance = e.params().clone(),
        }
        config
    }

    fn inner(&self) -> &dyn Similarity {
        match self {
            SimilarityEngine::EmbeddingProjection(e) => e,
            SimilarityEngine::SetOverlap(e) => e,
            SimilarityEngine::DirectDistance(e) => e,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Similarity {
        match self {
            SimilarityEngine::EmbeddingProjection(e) => e,
            SimilarityEngine::SetOverlap(e) => e,
            SimilarityEngine::DirectDistance(e) => e,
        }
    }
}

impl Similarity for SimilarityEngine {
    fn strategy(&self) -> SimilarityStrategy {
        self.inner().strategy()
    }

    fn calculate(
        &mut self,
        records: &[FingerprintRecord],
        reporter: &ProgressReporter,
    ) -> Result<(), SimilarityError> {
        self.inner_mut().calculate(records, reporter)
    }

    fn index(&self) -> Option<&SimilarityIndex> {
        self.inner().index()
    }

    fn find_similar(&self, point: &[f32], n: usize) -> Result<Vec<SimilarMatch<'_>>, SimilarityError> {
        self.inner().find_similar(point, n)
    }

    fn display(&self, canvas: &mut dyn Canvas) -> Result<(), SimilarityError> {
        self.inner().display(canvas)
    }
}
