use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::fingerprint::cutout::Cutout;
use crate::fingerprint::extractor::ImagePatch;
use crate::utils::errors::ExtractError;

/// Loads the pixels behind a cutout. Decoding FITS/TIFF/JPEG sources lives
/// outside this crate; implementations adapt whatever image store is in use.
///
/// Pixel preprocessing (the source's data-processing chain, promoting a
/// single gray channel to RGB) belongs to the implementation: extractors
/// receive the patch exactly as loaded.
pub trait PatchSource: Send + Sync {
    fn load(&self, cutout: &Cutout) -> Result<ImagePatch, ExtractError>;
}

/// Generates a reproducible single-channel texture for every cutout, seeded
/// from its source and bounds. Used by the driver binary and in tests.
#[derive(Debug, Clone, Default)]
pub struct SyntheticPatchSource {
    /// Texture seed shared by every patch, so different runs can differ.
    pub seed: u64,
}

impl SyntheticPatchSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn patch_seed(&self, cutout: &Cutout) -> u64 {
        let b = &cutout.bounds;
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(cutout.source.as_bytes());
        for edge in [b.row_min, b.row_max, b.col_min, b.col_max] {
            hasher.update(&(edge as u64).to_le_bytes());
        }
        let mut head = [0u8; 8];
        head.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        u64::from_le_bytes(head)
    }
}

impl PatchSource for SyntheticPatchSource {
    fn load(&self, cutout: &Cutout) -> Result<ImagePatch, ExtractError> {
        let (rows, cols) = (cutout.bounds.rows(), cutout.bounds.cols());
        let mut rng = StdRng::seed_from_u64(self.patch_seed(cutout));
        let fx: f32 = rng.random_range(0.01..0.2);
        let fy: f32 = rng.random_range(0.01..0.2);
        let phase: f32 = rng.random_range(0.0..std::f32::consts::TAU);
        let level: f32 = rng.random_range(0.2..0.8);

        let pixels = (0..rows * cols)
            .map(|i| {
                let (r, c) = ((i / cols.max(1)) as f32, (i % cols.max(1)) as f32);
                let wave = 0.5 * (r * fx + c * fy + phase).sin();
                let noise: f32 = rng.random_range(-0.05..0.05);
                (level + wave * (1.0 - level) + noise).clamp(0.0, 1.0)
            })
            .collect();
        ImagePatch::new(rows, cols, 1, pixels)
    }
}
