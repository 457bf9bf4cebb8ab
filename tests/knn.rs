use tldist::utils::errors::SimilarityError;
use tldist::vector::knn::{DEFAULT_NEIGHBORS, Neighbor, k_nearest, resolve_count};

#[test]
fn test_k_nearest_sorts_ascending() {
    let hits = k_nearest(vec![3.0, 0.5, 2.0, 1.0], 3);
    let order: Vec<usize> = hits.iter().map(|n| n.index).collect();
    assert_eq!(order, vec![1, 3, 2]);
    assert_eq!(hits[0], Neighbor { index: 1, distance: 0.5 });
}

#[test]
fn test_k_nearest_breaks_ties_by_slot() {
    let hits = k_nearest(vec![1.0, 0.0, 1.0, 0.0, 1.0], 4);
    let order: Vec<usize> = hits.iter().map(|n| n.index).collect();
    assert_eq!(order, vec![1, 3, 0, 2]);
}

#[test]
fn test_k_nearest_with_more_than_available() {
    assert_eq!(k_nearest(vec![2.0, 1.0], 10).len(), 2);
    assert!(k_nearest(Vec::new(), 3).is_empty());
}

#[test]
fn test_resolve_count() {
    assert_eq!(resolve_count(DEFAULT_NEIGHBORS, 100).unwrap(), 9);
    assert_eq!(resolve_count(20, 9).unwrap(), 9);
    assert_eq!(resolve_count(1, 0).unwrap(), 0);
    assert!(matches!(resolve_count(0, 5), Err(SimilarityError::InvalidNeighborCount(0))));
}
