//! A bounded-memory cache of decoded slideshow images.
//!
//! The [`ImageCache`] keeps a window of decoded items around the current position of a
//! slideshow, so that stepping forward or backward is instantaneous while decoding happens on
//! background tasks.
//!
//! ## Window
//!
//! The cache is anchored at a current position. The positions `[current - before, current +
//! after]` (modulo the collection length) form the protected [`Window`]: entries inside it are
//! never evicted.
//!
//! ## Requests
//!
//! [`ImageCache::get`] returns an [`ItemHandle`], a cloneable future for the decoded item.
//! Concurrent requests for the same position share a single decode. Before launching a decode,
//! the cache simulates the eviction that the new item would cause. If the item would be evicted
//! again before it could ever be shown, the request is *suppressed*: the returned handle never
//! resolves and callers are expected to ask again once the slideshow has moved.
//!
//! ## Budget
//!
//! Every launched decode reserves an estimated byte size against the configured budget. When a
//! decode completes, its real size is recorded, the reservation is released and the cache evicts
//! entries outside the window, starting with the entry the slideshow would reach last in its
//! current direction of travel.
//!
//! ### Metrics
//!
//! - `cache.access`: All calls to [`ImageCache::get`].
//! - `cache.channel.hit`: Requests served by an existing entry.
//! - `cache.channel.miss`: Requests that launched a new decode.
//! - `cache.suppressed`: Requests suppressed by the eviction simulation.
//! - `cache.evicted`: Entries removed to satisfy the budget.
//! - `cache.decode.failed`: Decodes that failed or were aborted.
//! - `cache.decode`: A timer around each decode.
//! - `cache.bytes`: A gauge of confirmed bytes.
//! - `prefetch.launched`: Decodes launched by [`ImageCache::fill`].

#![warn(missing_docs)]

#[macro_use]
pub mod metrics;

mod config;
mod decoder;
mod evict;
mod handle;
mod loader;
mod prefetch;
mod simulate;
mod store;
mod window;

pub use config::*;
pub use decoder::*;
pub use handle::*;
pub use loader::*;
pub use store::*;
pub use window::*;
