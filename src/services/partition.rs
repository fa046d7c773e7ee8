use std::num::NonZeroUsize;

/// Split `items` into contiguous, ordered batches of `batch_size`; only the
/// last batch may be shorter. An empty input yields no batches.
///
/// A zero batch size is unrepresentable here; it is rejected when the
/// configuration is loaded.
pub fn partition<T>(items: &[T], batch_size: NonZeroUsize) -> Vec<&[T]> {
    items.chunks(batch_size.get()).collect()
}

/// Owned variant for handing batches to spawned tasks.
pub fn partition_owned<T: Clone>(items: &[T], batch_size: NonZeroUsize) -> Vec<Vec<T>> {
    partition(items, batch_size)
        .into_iter()
        .map(<[T]>::to_vec)
        .collect()
}
