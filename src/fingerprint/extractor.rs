//! Feature extraction: image patch in, fixed-length vector out.
//!
//! The extractor is configured through [`ExtractorConfig`], whose saved JSON
//! form is what gets shipped to every fingerprint unit.
use log::warn;
use serde::{Deserialize, Serialize};

use crate::utils::errors::{ConfigError, ExtractError};
use crate::utils::types::Vector;

pub const EXTRACTOR_SCHEMA_VERSION: u32 = 1;

/// Pixel data of one cutout, row-major with interleaved channels.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePatch {
    rows: usize,
    cols: usize,
    channels: usize,
    pixels: Vec<f32>,
}

impl ImagePatch {
    pub fn new(rows: usize, cols: usize, channels: usize, pixels: Vec<f32>) -> Result<Self, ExtractError> {
        if rows == 0 || cols == 0 || channels == 0 {
            return Err(ExtractError::EmptyPatch);
        }
        if pixels.len() != rows * cols * channels {
            return Err(ExtractError::ShapeMismatch { rows, cols, channels, len: pixels.len() });
        }
        Ok(Self { rows, cols, channels, pixels })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Mean over channels at `(row, col)`.
    pub fn intensity(&self, row: usize, col: usize) -> f32 {
        let start = (row * self.cols + col) * self.channels;
        let px = &self.pixels[start..start + self.channels];
        px.iter().sum::<f32>() / self.channels as f32
    }
}

/// Opaque feature extractor. Implementations must be pure: the same patch
/// always yields the same vector, of the same length for every patch.
pub trait FeatureExtractor: Send + Sync {
    fn calculate(&self, patch: &ImagePatch) -> Result<Vector, ExtractError>;

    /// Identifies the configuration in produced records.
    fn name(&self) -> String;
}

/// Normalised histogram of channel-mean intensities over `[0, 1]`.
#[derive(Debug, Clone)]
pub struct IntensityHistogram {
    bins: usize,
}

impl FeatureExtractor for IntensityHistogram {
    fn calculate(&self, patch: &ImagePatch) -> Result<Vector, ExtractError> {
        let mut hist = vec![0.0f32; self.bins];
        for row in 0..patch.rows() {
            for col in 0..patch.cols() {
                let value = patch.intensity(row, col);
                if !value.is_finite() {
                    continue;
                }
                let bin = ((value.clamp(0.0, 1.0) * self.bins as f32) as usize).min(self.bins - 1);
                hist[bin] += 1.0;
            }
        }
        let total = (patch.rows() * patch.cols()) as f32;
        hist.iter_mut().for_each(|h| *h /= total);
        Ok(hist)
    }

    fn name(&self) -> String {
        format!("histogram(bins={})", self.bins)
    }
}

/// Mean intensity of each cell of a `grid` x `grid` partition of the patch.
#[derive(Debug, Clone)]
pub struct GridMean {
    grid: usize,
}

impl FeatureExtractor for GridMean {
    fn calculate(&self, patch: &ImagePatch) -> Result<Vector, ExtractError> {
        let g = self.grid;
        let mut out = Vec::with_capacity(g * g);
        for cell_row in 0..g {
            let (r0, r1) = (cell_row * patch.rows() / g, (cell_row + 1) * patch.rows() / g);
            for cell_col in 0..g {
                let (c0, c1) = (cell_col * patch.cols() / g, (cell_col + 1) * patch.cols() / g);
                let count = (r1 - r0) * (c1 - c0);
                if count == 0 {
                    out.push(0.0);
                    continue;
                }
                let sum: f32 = (r0..r1)
                    .flat_map(|r| (c0..c1).map(move |c| (r, c)))
                    .map(|(r, c)| patch.intensity(r, c))
                    .filter(|v| v.is_finite())
                    .sum();
                out.push(sum / count as f32);
            }
        }
        Ok(out)
    }

    fn name(&self) -> String {
        format!("grid_mean(grid={})", self.grid)
    }
}

fn current_version() -> u32 {
    EXTRACTOR_SCHEMA_VERSION
}

fn default_bins() -> usize {
    16
}

fn default_grid() -> usize {
    4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorKind {
    Histogram {
        #[serde(default = "default_bins")]
        bins: usize,
    },
    GridMean {
        #[serde(default = "default_grid")]
        grid: usize,
    },
}

/// Versioned, portable description of a feature extractor.
///
/// Unknown fields are ignored and a missing `version` means the current
/// schema, so documents written by older or newer builds still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(flatten)]
    pub kind: ExtractorKind,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self::new(ExtractorKind::Histogram { bins: default_bins() })
    }
}

impl ExtractorConfig {
    pub fn new(kind: ExtractorKind) -> Self {
        Self { version: EXTRACTOR_SCHEMA_VERSION, kind }
    }

    pub fn save(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn load_parameters(saved: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(saved)?;
        if config.version == 0 {
            return Err(ConfigError::UnsupportedVersion(config.version));
        }
        if config.version > EXTRACTOR_SCHEMA_VERSION {
            warn!(
                "Extractor config version {} is newer than {}, loading known fields only",
                config.version, EXTRACTOR_SCHEMA_VERSION
            );
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            ExtractorKind::Histogram { bins: 0 } => {
                Err(ConfigError::Invalid("histogram needs at least one bin".into()))
            }
            ExtractorKind::GridMean { grid: 0 } => {
                Err(ConfigError::Invalid("grid_mean needs a grid of at least 1".into()))
            }
            _ => Ok(()),
        }
    }

    /// Length of the vectors the configured extractor produces.
    pub fn output_len(&self) -> usize {
        match self.kind {
            ExtractorKind::Histogram { bins } => bins,
            ExtractorKind::GridMean { grid } => grid * grid,
        }
    }

    pub fn build(&self) -> Result<Box<dyn FeatureExtractor>, ConfigError> {
        self.validate()?;
        Ok(match self.kind {
            ExtractorKind::Histogram { bins } => Box::new(IntensityHistogram { bins }),
            ExtractorKind::GridMean { grid } => Box::new(GridMean { grid }),
        })
    }
}
