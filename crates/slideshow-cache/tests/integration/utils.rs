use slideshow_cache::{CacheConfig, Decoder, Direction, ImageCache, Margins};
use slideshow_test::MB;

pub use slideshow_test as test;

/// A cache configuration with a budget of `max_mb` and an estimate of 100MB per item.
pub fn config(max_mb: u64, before: usize, after: usize) -> CacheConfig {
    CacheConfig {
        max_bytes: max_mb * MB,
        margins: Margins { before, after },
        default_estimate: 100 * MB,
    }
}

/// Waits until every decode in flight has completed.
pub async fn settle<D: Decoder>(cache: &ImageCache<D>) {
    let handles: Vec<_> = (0..cache.len())
        .filter(|position| cache.is_present(*position))
        .map(|position| cache.get(position, Direction::Forward))
        .collect();
    futures::future::join_all(handles).await;
}
