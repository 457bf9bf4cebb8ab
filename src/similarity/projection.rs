use linfa::DatasetBase;
use linfa::traits::{Fit, Predict};
use linfa_reduction::Pca;
use ndarray::Array2;

use crate::utils::errors::SimilarityError;
use crate::utils::types::{DisplayCoordinate, Vector};

/// Row-major `n x dim` matrix of the vectors, widened to f64.
pub(crate) fn feature_matrix(vectors: &[Vector]) -> Result<Array2<f64>, SimilarityError> {
    let dim = vectors.first().map_or(0, Vec::len);
    let data: Vec<f64> = vectors.iter().flatten().map(|&x| f64::from(x)).collect();
    Array2::from_shape_vec((vectors.len(), dim), data).map_err(|e| SimilarityError::Matrix(e.to_string()))
}

/// Projects vectors onto their first two principal axes.
///
/// Deterministic for a given input. Axes the data cannot provide (a single
/// feature, fewer than two records) project to 0.
pub fn principal_plane(vectors: &[Vector]) -> Result<Vec<DisplayCoordinate>, SimilarityError> {
    let n = vectors.len();
    let dim = vectors.first().map_or(0, Vec::len);
    if n < 2 || dim == 0 {
        return Ok(vec![[0.0, 0.0]; n]);
    }

    let matrix = feature_matrix(vectors)?;
    let axes = 2.min(dim).min(n);
    let pca = Pca::params(axes).fit(&DatasetBase::from(matrix.clone()))?;
    let projected: Array2<f64> = pca.predict(&matrix);

    Ok(projected
        .rows()
        .into_iter()
        .map(|row| {
            let y = if axes > 1 { row[1] } else { 0.0 };
            [row[0] as f32, y as f32]
        })
        .collect())
}
