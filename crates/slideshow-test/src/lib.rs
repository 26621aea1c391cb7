//! Helpers for testing the cache and the slideshow driver.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`tempdir`], make sure that the handle to the temp directory is held for the
//!    entire lifetime of the test. To avoid dropping it too early, assign it to a variable in the
//!    test function (e.g. `let dir = test::tempdir()`).
//!
//!  - A [`FakeDecoder`] created with [`FakeDecoder::gated`] holds every decode in flight until
//!    [`FakeDecoder::open`] is called. Use it to observe the cache while loads are pending.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

use slideshow_cache::{DecodeError, Decoded, Decoder};

pub use tempfile::TempDir;

/// One mebibyte.
pub const MB: u64 = 1024 * 1024;

const OPEN_GATE: usize = 1 << 20;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the slideshow crates and mutes all
///    other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("slideshow=trace,slideshow_cache=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Creates a temporary directory.
///
/// The directory is deleted when the [`TempDir`] instance is dropped. Use it as a guard to
/// automatically clean up after tests.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}

/// Creates `len` made-up image paths.
pub fn paths(len: usize) -> Arc<[PathBuf]> {
    (0..len)
        .map(|position| PathBuf::from(format!("image-{position:03}.jpg")))
        .collect()
}

/// The item produced by a [`FakeDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeImage {
    /// The position that was decoded.
    pub position: usize,
    /// The reported size.
    pub bytes: u64,
}

#[derive(Debug)]
struct FakeDecoderInner {
    default_size: u64,
    sizes: BTreeMap<usize, u64>,
    failures: BTreeSet<usize>,
    delay: Duration,
    gate: Semaphore,
    calls: AtomicUsize,
    calls_per_position: Mutex<BTreeMap<usize, usize>>,
}

/// A [`Decoder`] producing [`FakeImage`]s of configurable sizes.
///
/// Clones share their configuration and call counters.
#[derive(Debug, Clone)]
pub struct FakeDecoder {
    inner: Arc<FakeDecoderInner>,
}

impl FakeDecoder {
    /// Creates a decoder that reports `default_size` bytes for every item.
    pub fn new(default_size: u64) -> Self {
        Self::build(default_size, BTreeMap::new(), BTreeSet::new(), Duration::ZERO, OPEN_GATE)
    }

    /// Creates a decoder that holds all decodes until [`open`](Self::open) is called.
    pub fn gated(default_size: u64) -> Self {
        Self::build(default_size, BTreeMap::new(), BTreeSet::new(), Duration::ZERO, 0)
    }

    fn build(
        default_size: u64,
        sizes: BTreeMap<usize, u64>,
        failures: BTreeSet<usize>,
        delay: Duration,
        permits: usize,
    ) -> Self {
        Self {
            inner: Arc::new(FakeDecoderInner {
                default_size,
                sizes,
                failures,
                delay,
                gate: Semaphore::new(permits),
                calls: AtomicUsize::new(0),
                calls_per_position: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    fn rebuild(self, f: impl FnOnce(&mut BTreeMap<usize, u64>, &mut BTreeSet<usize>)) -> Self {
        let inner = &self.inner;
        let mut sizes = inner.sizes.clone();
        let mut failures = inner.failures.clone();
        f(&mut sizes, &mut failures);
        Self::build(
            inner.default_size,
            sizes,
            failures,
            inner.delay,
            inner.gate.available_permits(),
        )
    }

    /// Reports `bytes` for the item at `position`.
    pub fn with_size(self, position: usize, bytes: u64) -> Self {
        self.rebuild(|sizes, _| {
            sizes.insert(position, bytes);
        })
    }

    /// Makes decoding the item at `position` fail.
    pub fn with_failure(self, position: usize) -> Self {
        self.rebuild(|_, failures| {
            failures.insert(position);
        })
    }

    /// Makes every decode take `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        let inner = &self.inner;
        Self::build(
            inner.default_size,
            inner.sizes.clone(),
            inner.failures.clone(),
            delay,
            inner.gate.available_permits(),
        )
    }

    /// Releases all held and future decodes of a [`gated`](Self::gated) decoder.
    pub fn open(&self) {
        self.inner.gate.add_permits(OPEN_GATE);
    }

    /// The total number of decodes that were started.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// The number of decodes that were started for `position`.
    pub fn calls_for(&self, position: usize) -> usize {
        self.inner
            .calls_per_position
            .lock()
            .get(&position)
            .copied()
            .unwrap_or_default()
    }

    /// All positions for which a decode was started, in ascending order.
    pub fn decoded_positions(&self) -> Vec<usize> {
        self.inner.calls_per_position.lock().keys().copied().collect()
    }
}

impl Decoder for FakeDecoder {
    type Item = FakeImage;

    fn decode(
        &self,
        position: usize,
        _path: PathBuf,
    ) -> BoxFuture<'static, Result<Decoded<FakeImage>, DecodeError>> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .inner
            .calls_per_position
            .lock()
            .entry(position)
            .or_default() += 1;

        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let _permit = inner
                .gate
                .acquire()
                .await
                .map_err(|_| DecodeError::Malformed("decoder gate closed".into()))?;
            if !inner.delay.is_zero() {
                tokio::time::sleep(inner.delay).await;
            }

            if inner.failures.contains(&position) {
                return Err(DecodeError::Malformed(format!("broken image {position}")));
            }
            let bytes = inner
                .sizes
                .get(&position)
                .copied()
                .unwrap_or(inner.default_size);
            Ok(Decoded {
                item: FakeImage { position, bytes },
                bytes,
            })
        })
    }
}
