use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Side length of the square window fed to the feature extractor.
pub const CUTOUT_SIZE: usize = 224;

/// Pixel bounds of a cutout inside its source image, half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBounds {
    pub row_min: usize,
    pub row_max: usize,
    pub col_min: usize,
    pub col_max: usize,
}

impl PixelBounds {
    /// Square window of `size` pixels centred on `(row, col)`.
    pub fn centered(row: usize, col: usize, size: usize) -> Self {
        let half = size / 2;
        Self {
            row_min: row.saturating_sub(half),
            row_max: row + (size - half),
            col_min: col.saturating_sub(half),
            col_max: col + (size - half),
        }
    }

    pub fn center(&self) -> (usize, usize) {
        ((self.row_min + self.row_max) / 2, (self.col_min + self.col_max) / 2)
    }

    pub fn rows(&self) -> usize {
        self.row_max.saturating_sub(self.row_min)
    }

    pub fn cols(&self) -> usize {
        self.col_max.saturating_sub(self.col_min)
    }
}

/// A rectangular sub-region of a source image. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cutout {
    pub id: String,
    /// Path or URL of the source image.
    pub source: String,
    pub bounds: PixelBounds,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Cutout {
    pub fn new(id: impl Into<String>, source: impl Into<String>, bounds: PixelBounds) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            bounds,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Tiles a `nrows` x `ncols` image with [`CUTOUT_SIZE`] windows whose
    /// centres are `stepsize` apart, keeping a half-window margin to every
    /// edge. Cutouts come out in row-major order.
    pub fn tile(source: &str, nrows: usize, ncols: usize, stepsize: usize) -> Vec<Cutout> {
        let half = CUTOUT_SIZE / 2;
        let step = stepsize.max(1);
        let rows = (half..nrows.saturating_sub(half)).step_by(step);
        let cols: Vec<usize> = (half..ncols.saturating_sub(half)).step_by(step).collect();

        rows.flat_map(|row| {
            cols.iter().map(move |&col| {
                Cutout::new(
                    format!("{source}:{row}:{col}"),
                    source,
                    PixelBounds::centered(row, col, CUTOUT_SIZE),
                )
            })
        })
        .collect()
    }
}
