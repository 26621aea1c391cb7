use slideshow_cache::{Direction, ImageCache};
use slideshow_test::{FakeDecoder, MB};

use crate::utils::{config, settle, test};

#[tokio::test]
async fn test_fill_stops_at_budget() {
    test::setup();

    let decoder = FakeDecoder::gated(100 * MB);
    let cache = ImageCache::new(config(300, 3, 4), decoder.clone(), test::paths(20));
    cache.set_current_position(10);

    assert_eq!(cache.fill(Direction::Forward), 3);
    assert_eq!(decoder.decoded_positions(), [11, 12, 13]);
    assert_eq!(cache.reserved_usage(), 300 * MB);

    decoder.open();
    settle(&cache).await;
    assert_eq!(cache.current_usage(), 300 * MB);
    assert_eq!(cache.reserved_usage(), 0);
}

#[tokio::test]
async fn test_fill_backward() {
    test::setup();

    let decoder = FakeDecoder::gated(100 * MB);
    let cache = ImageCache::new(config(300, 3, 4), decoder.clone(), test::paths(20));
    cache.set_current_position(10);

    assert_eq!(cache.fill(Direction::Backward), 3);
    assert_eq!(decoder.decoded_positions(), [7, 8, 9]);

    decoder.open();
    cache.shutdown().await;
}

#[tokio::test]
async fn test_fill_skips_present_items() {
    test::setup();

    let decoder = FakeDecoder::new(100 * MB);
    let cache = ImageCache::new(config(300, 1, 1), decoder.clone(), test::paths(20));
    cache.set_current_position(10);
    cache.get(10, Direction::Forward).await;

    assert_eq!(cache.fill(Direction::Forward), 2);
    settle(&cache).await;
    assert_eq!(decoder.decoded_positions(), [9, 10, 11]);
    assert_eq!(decoder.calls(), 3);

    // everything is loaded already
    assert_eq!(cache.fill(Direction::Forward), 0);
}

#[tokio::test]
async fn test_fill_uses_confirmed_estimate() {
    test::setup();

    let decoder = FakeDecoder::new(50 * MB);
    let cache = ImageCache::new(config(300, 3, 4), decoder.clone(), test::paths(20));
    cache.set_current_position(10);
    cache.get(10, Direction::Forward).await;
    assert_eq!(cache.estimated_item_size(), 50 * MB);

    assert_eq!(cache.fill(Direction::Forward), 5);
    settle(&cache).await;
    assert_eq!(decoder.decoded_positions(), [9, 10, 11, 12, 13, 14]);
    assert_eq!(cache.current_usage(), 300 * MB);
}

#[tokio::test]
async fn test_preload_next() {
    test::setup();

    let decoder = FakeDecoder::gated(100 * MB);
    let cache = ImageCache::new(config(1000, 3, 4), decoder.clone(), test::paths(20));
    cache.set_current_position(10);

    assert_eq!(cache.preload_next(Direction::Forward), Some(11));
    assert_eq!(cache.preload_next(Direction::Forward), Some(12));
    assert_eq!(cache.preload_next(Direction::Backward), Some(9));
    assert!(cache.is_present(11));
    assert!(cache.is_present(12));
    assert!(cache.is_present(9));

    decoder.open();
    cache.shutdown().await;
}

#[tokio::test]
async fn test_preload_next_forced() {
    test::setup();

    let decoder = FakeDecoder::new(100 * MB);
    let cache = ImageCache::new(config(200, 1, 1), decoder.clone(), test::paths(20));
    cache.set_current_position(10);
    cache.get(10, Direction::Forward).await;
    cache.get(11, Direction::Forward).await;
    assert!(cache.would_evict(12, 100 * MB, Direction::Forward));

    // the lookahead is loaded, so the next missing item is loaded regardless
    assert_eq!(cache.preload_next(Direction::Forward), Some(12));
    let item = cache.get(12, Direction::Forward).await;
    assert_eq!(item.unwrap().position, 12);

    // it is outside the window and over budget, so it did not survive its completion
    assert!(!cache.is_present(12));
    assert!(cache.is_loaded(10));
    assert!(cache.is_loaded(11));
    assert_eq!(cache.current_usage(), 200 * MB);
}

#[tokio::test]
async fn test_preload_next_everything_present() {
    test::setup();

    let decoder = FakeDecoder::new(100 * MB);
    let cache = ImageCache::new(config(1000, 1, 1), decoder.clone(), test::paths(3));
    for position in 0..3 {
        cache.get(position, Direction::Forward).await;
    }

    assert_eq!(cache.preload_next(Direction::Forward), None);
    assert_eq!(cache.preload_next(Direction::Backward), None);
    assert_eq!(decoder.calls(), 3);
}

#[tokio::test]
async fn test_empty_collection() {
    test::setup();

    let decoder = FakeDecoder::new(100 * MB);
    let cache = ImageCache::new(config(1000, 3, 4), decoder.clone(), test::paths(0));

    assert_eq!(cache.fill(Direction::Forward), 0);
    assert_eq!(cache.preload_next(Direction::Forward), None);
    assert!(cache.get(0, Direction::Forward).await.is_none());
    assert_eq!(decoder.calls(), 0);
}
