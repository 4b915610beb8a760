//! Splitting a chapter range into bounded chunks.

use std::ops::RangeInclusive;

/// Contiguous ranges of at most `chunk_size` chapters covering `start..=end`, produced lazily.
///
/// A zero `chunk_size` is treated as one. An empty range (`start > end`)
/// yields no chunks.
pub(crate) fn chunk_ranges(
    start: u32,
    end: u32,
    chunk_size: usize,
) -> impl Iterator<Item = RangeInclusive<u32>> {
    let span = u32::try_from(chunk_size.max(1) - 1).unwrap_or(u32::MAX);
    let chunk_from = move |first: u32| first..=first.saturating_add(span).min(end);

    let first = (start <= end).then(|| chunk_from(start));
    std::iter::successors(first, move |previous| {
        let last = *previous.end();
        (last < end).then(|| chunk_from(last + 1))
    })
}
