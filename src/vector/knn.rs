//! Exact nearest-neighbour selection shared by every similarity strategy.
use itertools::Itertools;
use log::debug;
use ordered_float::OrderedFloat;

use crate::utils::errors::SimilarityError;
use crate::utils::types::Score;

/// Matches the 3x3 grid of cutouts shown by the exploration view.
pub const DEFAULT_NEIGHBORS: usize = 9;

/// One hit of a nearest-neighbour query, referring to a slot of the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: Score,
}

/// Validates a requested neighbour count against the number of stored records.
///
/// Asking for more neighbours than exist is not an error: the count is clamped.
pub fn resolve_count(n: usize, available: usize) -> Result<usize, SimilarityError> {
    if n == 0 {
        return Err(SimilarityError::InvalidNeighborCount(n));
    }
    if n > available {
        debug!("Clamping neighbor count {} to {} available records", n, available);
    }
    Ok(n.min(available))
}

/// Selects the `n` smallest distances, ascending, ties broken by slot order.
pub fn k_nearest<I>(distances: I, n: usize) -> Vec<Neighbor>
where
    I: IntoIterator<Item = Score>,
{
    distances
        .into_iter()
        .enumerate()
        .k_smallest_by_key(n, |&(index, distance)| (OrderedFloat(distance), index))
        .map(|(index, distance)| Neighbor { index, distance })
        .collect()
}
