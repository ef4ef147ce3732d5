use std::num::NonZeroUsize;

/// Largest number of device tokens a single multicast send accepts.
pub const MAX_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(500).unwrap();

/// Splits `input` into consecutive batches of at most `size` elements.
///
/// Order is preserved and only the last batch may be shorter. An empty input
/// yields no batches at all.
pub fn split_into_batches<T>(input: &[T], size: NonZeroUsize) -> Vec<&[T]> {
    input.chunks(size.get()).collect()
}
