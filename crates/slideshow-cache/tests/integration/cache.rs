use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use slideshow_cache::{DecodeError, Decoded, Decoder, Direction, ImageCache};
use slideshow_test::{FakeDecoder, MB};

use crate::utils::{config, settle, test};

#[tokio::test]
async fn test_concurrent_requests_share_one_decode() {
    test::setup();

    let decoder = FakeDecoder::gated(10 * MB);
    let cache = ImageCache::new(config(1000, 3, 4), decoder.clone(), test::paths(20));

    let first = cache.get(5, Direction::Forward);
    let second = cache.get(5, Direction::Forward);
    assert!(first.ptr_eq(&second));
    assert!(cache.is_present(5));
    assert!(!cache.is_loaded(5));
    assert_eq!(cache.reserved_usage(), 100 * MB);

    decoder.open();
    let (a, b) = futures::join!(first, second);
    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));

    assert_eq!(decoder.calls(), 1);
    assert!(cache.is_loaded(5));
    assert_eq!(cache.current_usage(), 10 * MB);
    assert_eq!(cache.reserved_usage(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_requests_from_parallel_tasks() {
    test::setup();

    let decoder = FakeDecoder::new(10 * MB).with_delay(Duration::from_millis(50));
    let cache = ImageCache::new(config(1000, 3, 4), decoder.clone(), test::paths(20));
    let barrier = Arc::new(tokio::sync::Barrier::new(2));

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let cache = cache.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                cache.get(5, Direction::Forward).await
            })
        })
        .collect();

    let mut items = Vec::new();
    for task in tasks {
        items.push(task.await.unwrap().unwrap());
    }

    assert!(Arc::ptr_eq(&items[0], &items[1]));
    assert_eq!(items[0].bytes, 10 * MB);
    assert_eq!(decoder.calls_for(5), 1);
    assert_eq!(cache.current_usage(), 10 * MB);
}

#[tokio::test]
async fn test_failed_decode_is_an_empty_item() {
    test::setup();

    let decoder = FakeDecoder::new(10 * MB).with_failure(15);
    let cache = ImageCache::new(config(1000, 3, 4), decoder.clone(), test::paths(20));

    let item = cache.get(15, Direction::Forward).await;
    assert!(item.is_none());
    assert!(cache.is_loaded(15));
    assert_eq!(cache.current_usage(), 0);
    assert_eq!(cache.reserved_usage(), 0);

    // failed items are not retried
    let again = cache.get(15, Direction::Forward).await;
    assert!(again.is_none());
    assert_eq!(decoder.calls_for(15), 1);
}

#[tokio::test]
async fn test_failed_items_are_evicted_by_distance() {
    test::setup();

    let decoder = FakeDecoder::new(100 * MB)
        .with_failure(15)
        .with_size(11, 150 * MB);
    let cache = ImageCache::new(config(300, 1, 1), decoder.clone(), test::paths(20));
    cache.set_current_position(10);

    for position in [15, 13, 10] {
        cache.get(position, Direction::Backward).await;
    }
    assert_eq!(cache.current_usage(), 200 * MB);

    // Moving backward, 13 is reached after the failed 15, so it goes first.
    cache.get(11, Direction::Backward).await;
    assert!(cache.is_present(15));
    assert!(!cache.is_present(13));
    assert!(cache.is_loaded(10));
    assert!(cache.is_loaded(11));
    assert_eq!(cache.current_usage(), 250 * MB);
}

#[tokio::test]
async fn test_eviction_keeps_the_window() {
    test::setup();

    let decoder = FakeDecoder::new(100 * MB);
    let cache = ImageCache::new(config(500, 2, 2), decoder.clone(), test::paths(20));

    for step in 0..40 {
        let current = step % 20;
        cache.set_current_position(current);
        let handle = cache.get(current, Direction::Forward);
        cache.fill(Direction::Forward);

        let window: Vec<_> = (1..=2)
            .flat_map(|offset| [(current + offset) % 20, (current + 20 - offset) % 20])
            .chain([current])
            .collect();
        let loaded: Vec<_> = window
            .iter()
            .copied()
            .filter(|position| cache.is_loaded(*position))
            .collect();

        assert!(handle.await.is_some());
        settle(&cache).await;

        for position in loaded {
            assert!(cache.is_loaded(position), "{position} was evicted at {current}");
        }
        assert!(cache.is_loaded(current));
        assert!(cache.current_usage() <= 500 * MB);
    }
}

#[tokio::test]
async fn test_suppressed_request() {
    test::setup();

    let decoder = FakeDecoder::new(100 * MB);
    let cache = ImageCache::new(config(300, 1, 1), decoder.clone(), test::paths(20));
    cache.set_current_position(10);
    for position in [9, 10, 11] {
        cache.get(position, Direction::Forward).await;
    }
    assert_eq!(cache.current_usage(), 300 * MB);

    let estimate = cache.estimated_item_size();
    assert_eq!(estimate, 100 * MB);
    assert!(cache.would_evict(15, estimate, Direction::Forward));

    let handle = cache.get(15, Direction::Forward);
    assert!(!cache.is_present(15));
    assert!(!cache.is_loaded(15));
    assert_eq!(decoder.calls_for(15), 0);
    assert_eq!(cache.reserved_usage(), 0);

    let timeout = tokio::time::timeout(Duration::from_millis(50), handle.clone()).await;
    assert!(timeout.is_err());
    assert!(cache.get(15, Direction::Forward).ptr_eq(&handle));

    // once the slideshow moves on, the item is loaded normally
    cache.set_current_position(14);
    let item = cache.get(15, Direction::Forward).await.unwrap();
    assert_eq!(item.position, 15);
    assert_eq!(decoder.calls_for(15), 1);
    assert!(cache.current_usage() <= 300 * MB);
}

#[tokio::test]
async fn test_would_evict_is_pure() {
    test::setup();

    let decoder = FakeDecoder::gated(100 * MB);
    let cache = ImageCache::new(config(300, 1, 1), decoder.clone(), test::paths(20));
    cache.set_current_position(10);
    for position in [9, 10, 11] {
        let _ = cache.get(position, Direction::Forward);
    }

    let usage = (cache.current_usage(), cache.reserved_usage());
    assert!(cache.would_evict(15, 100 * MB, Direction::Forward));
    assert!(!cache.would_evict(11, 100 * MB, Direction::Forward));
    assert_eq!((cache.current_usage(), cache.reserved_usage()), usage);
    assert!(!cache.is_present(15));
    assert_eq!(decoder.calls(), 3);

    decoder.open();
    cache.shutdown().await;
}

#[tokio::test]
async fn test_out_of_range_position() {
    test::setup();

    let decoder = FakeDecoder::new(100 * MB);
    let cache = ImageCache::new(config(300, 1, 1), decoder.clone(), test::paths(20));

    assert!(cache.get(20, Direction::Forward).await.is_none());
    assert!(!cache.is_present(20));
    assert_eq!(decoder.calls(), 0);
}

#[tokio::test]
async fn test_shutdown_waits_for_pending_loads() {
    test::setup();

    let decoder = FakeDecoder::gated(100 * MB);
    let cache = ImageCache::new(config(300, 1, 1), decoder.clone(), test::paths(20));
    cache.set_current_position(10);
    for position in [9, 10, 11] {
        let _ = cache.get(position, Direction::Forward);
    }
    // suppressed requests never resolve and must not block the shutdown
    let _suppressed = cache.get(15, Direction::Forward);
    assert_eq!(cache.reserved_usage(), 300 * MB);

    let early = tokio::time::timeout(Duration::from_millis(20), cache.clone().shutdown()).await;
    assert!(early.is_err());

    decoder.open();
    cache.clone().shutdown().await;
    assert!([9, 10, 11].iter().all(|position| cache.is_loaded(*position)));
    assert_eq!(cache.reserved_usage(), 0);
    assert_eq!(cache.current_usage(), 300 * MB);
}

struct PanickingDecoder;

impl Decoder for PanickingDecoder {
    type Item = ();

    fn decode(
        &self,
        _position: usize,
        _path: PathBuf,
    ) -> BoxFuture<'static, Result<Decoded<()>, DecodeError>> {
        Box::pin(async { panic!("decoder exploded") })
    }
}

#[tokio::test]
async fn test_panicking_decode_releases_reservation() {
    test::setup();

    let cache = ImageCache::new(config(300, 1, 1), PanickingDecoder, test::paths(5));

    let item = cache.get(1, Direction::Forward).await;
    assert!(item.is_none());
    assert!(cache.is_loaded(1));
    assert_eq!(cache.reserved_usage(), 0);
    assert_eq!(cache.current_usage(), 0);
}

#[test]
fn test_get_outside_runtime_panics() {
    test::setup();

    let decoder = FakeDecoder::new(100 * MB);
    let cache = ImageCache::new(config(1000, 3, 4), decoder, test::paths(20));

    let result = panic::catch_unwind(AssertUnwindSafe(|| cache.get(5, Direction::Forward)));
    assert!(result.is_err());
    assert!(!cache.is_present(5));
    assert_eq!(cache.reserved_usage(), 0);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let item = runtime.block_on(cache.get(5, Direction::Forward)).unwrap();
    assert_eq!(item.position, 5);
    assert!(cache.is_loaded(5));
    assert_eq!(cache.current_usage(), 100 * MB);
}

#[test]
fn test_load_rejected_by_stopped_runtime_is_rolled_back() {
    test::setup();

    let decoder = FakeDecoder::new(100 * MB);
    let cache = ImageCache::new(config(1000, 3, 4), decoder, test::paths(20));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let handle = runtime.handle().clone();
    drop(runtime);

    let _enter = handle.enter();
    let item = cache.get(5, Direction::Forward);
    assert!(!cache.is_present(5));
    assert_eq!(cache.reserved_usage(), 0);
    assert_eq!(item.try_get(), Some(None));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_loaded_implies_resolved_handle() {
    test::setup();

    let decoder = FakeDecoder::new(10 * MB);
    let cache = ImageCache::new(config(1000, 3, 4), decoder, test::paths(20));

    let handle = cache.get(5, Direction::Forward);
    while !cache.is_loaded(5) {
        tokio::task::yield_now().await;
    }
    assert!(handle.try_get().is_some());
}
