/// Sizes of `parts` contiguous chunks covering `len` items.
///
/// The first `len % parts` chunks carry one extra item, so sizes differ by at
/// most one. `parts` is clamped to `1..=len`; an empty input has no chunks.
pub fn balanced_chunk_sizes(len: usize, parts: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let parts = parts.clamp(1, len);
    let base = len / parts;
    let extra = len % parts;
    (0..parts)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

/// Splits `items` into balanced contiguous chunks, keeping the original order.
pub fn partition<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let sizes = balanced_chunk_sizes(items.len(), parts);
    let mut rest = items.into_iter();
    sizes
        .into_iter()
        .map(|size| rest.by_ref().take(size).collect())
        .collect()
}
