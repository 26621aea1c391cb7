use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tracing::{Instrument, Span};

use crate::evict::Eviction;
use crate::simulate::would_evict;
use crate::{CacheConfig, Decoded, Decoder, Direction, ItemHandle, LoadedItem, Window};

/// The lifecycle state of a [`CacheEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryState {
    /// A decode is in flight, holding `reserved` bytes against the budget.
    Pending { reserved: u64 },
    /// The decode finished. `bytes` is `0` for failed decodes.
    Ready { bytes: u64 },
    /// The request was suppressed and nothing was launched.
    Suppressed,
}

pub(crate) struct CacheEntry<T> {
    pub handle: ItemHandle<T>,
    pub state: EntryState,
}

impl<T> CacheEntry<T> {
    /// Whether a decode was launched for this entry.
    pub fn is_launched(&self) -> bool {
        !matches!(self.state, EntryState::Suppressed)
    }
}

/// The mutable state of the cache, guarded by a single lock.
pub(crate) struct CacheState<T> {
    pub entries: BTreeMap<usize, CacheEntry<T>>,
    /// Sum of the sizes of all `Ready` entries.
    pub confirmed_bytes: u64,
    /// Sum of the reservations of all `Pending` entries.
    pub reserved_bytes: u64,
    pub current: usize,
}

impl<T> CacheState<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            confirmed_bytes: 0,
            reserved_bytes: 0,
            current: 0,
        }
    }

    pub fn is_present(&self, position: usize) -> bool {
        self.entries
            .get(&position)
            .is_some_and(CacheEntry::is_launched)
    }

    /// The size of the first confirmed entry, or `default` if nothing has been decoded yet.
    pub fn estimate(&self, default: u64) -> u64 {
        self.entries
            .values()
            .find_map(|entry| match entry.state {
                EntryState::Ready { bytes } if bytes > 0 => Some(bytes),
                _ => None,
            })
            .unwrap_or(default)
    }

    /// Bytes committed to confirmed and in-flight entries.
    pub fn committed_bytes(&self) -> u64 {
        self.confirmed_bytes.saturating_add(self.reserved_bytes)
    }
}

impl<T: Send + Sync + 'static> CacheState<T> {
    /// Returns the never-resolving handle of a suppressed request, recording it if needed.
    fn suppress(&mut self, position: usize) -> ItemHandle<T> {
        let entry = self.entries.entry(position).or_insert_with(|| CacheEntry {
            handle: ItemHandle::never(),
            state: EntryState::Suppressed,
        });
        entry.handle.clone()
    }
}

struct Inner<D: Decoder> {
    decoder: D,
    paths: Arc<[PathBuf]>,
    config: CacheConfig,
    state: Mutex<CacheState<D::Item>>,
    span: Span,
}

impl<D: Decoder> Inner<D> {
    fn window(&self, current: usize) -> Window {
        Window::new(self.paths.len(), current, self.config.margins)
    }

    /// Records the outcome of the load at `position` and makes room for it.
    fn complete(&self, position: usize, bytes: u64, direction: Direction) {
        let mut state = self.state.lock();

        let Some(entry) = state.entries.get_mut(&position) else {
            return;
        };
        let EntryState::Pending { reserved } = entry.state else {
            return;
        };
        entry.state = EntryState::Ready { bytes };
        state.reserved_bytes = state.reserved_bytes.saturating_sub(reserved);
        state.confirmed_bytes += bytes;

        let window = self.window(state.current);
        let max_bytes = self.config.max_bytes;
        for Eviction { position, bytes } in state.evict_if_needed(&window, max_bytes, direction) {
            metric!(counter("cache.evicted") += 1);
            tracing::debug!(
                parent: &self.span,
                position,
                bytes,
                usage = state.confirmed_bytes,
                max_bytes,
                "Evicted item from cache",
            );
        }

        if state.confirmed_bytes > max_bytes {
            tracing::warn!(
                parent: &self.span,
                usage = state.confirmed_bytes,
                max_bytes,
                "Protected window exceeds the cache budget",
            );
        }
        metric!(gauge("cache.bytes") = state.confirmed_bytes);
    }

    /// Forgets the load at `position` whose task never ran.
    fn abandon(&self, position: usize) {
        let mut state = self.state.lock();
        let Some(EntryState::Pending { reserved }) = state.entries.get(&position).map(|e| e.state)
        else {
            return;
        };
        state.entries.remove(&position);
        state.reserved_bytes = state.reserved_bytes.saturating_sub(reserved);
        tracing::warn!(parent: &self.span, position, "Decode task was never started");
    }
}

/// A registered load whose task still has to be spawned.
///
/// Tokio drops a future it refuses to run on the spawning thread, so this must only be spawned
/// after the state lock has been released.
#[must_use = "the load must be spawned"]
pub(crate) struct LoadTask(BoxFuture<'static, ()>);

impl LoadTask {
    pub fn spawn(self) {
        tokio::spawn(self.0);
    }
}

/// Completes a load when dropped, so that a panicking or aborted decode still releases its
/// reservation.
///
/// A guard that was never polled rolls the load back instead.
struct LoadGuard<D: Decoder> {
    inner: Arc<Inner<D>>,
    position: usize,
    direction: Direction,
    started: bool,
    done: bool,
}

impl<D: Decoder> LoadGuard<D> {
    fn finish(&mut self, bytes: u64) {
        if !self.done {
            self.done = true;
            self.inner.complete(self.position, bytes, self.direction);
        }
    }
}

impl<D: Decoder> Drop for LoadGuard<D> {
    fn drop(&mut self) {
        if !self.started {
            self.inner.abandon(self.position);
        } else if !self.done {
            metric!(counter("cache.decode.failed") += 1);
            tracing::error!(
                parent: &self.inner.span,
                position = self.position,
                "Decode task was aborted",
            );
            self.finish(0);
        }
    }
}

/// An in-memory cache of decoded items around the current slideshow position.
///
/// See the [crate documentation](crate) for how requests, eviction and the budget interact.
///
/// The cache is cheap to clone; all clones share the same state.
pub struct ImageCache<D: Decoder> {
    inner: Arc<Inner<D>>,
}

impl<D: Decoder> Clone for ImageCache<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Decoder> fmt::Debug for ImageCache<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.try_lock();
        f.debug_struct("ImageCache")
            .field("config", &self.inner.config)
            .field("items", &self.inner.paths.len())
            .field("entries", &state.as_ref().map(|s| s.entries.len()))
            .field("confirmed_bytes", &state.as_ref().map(|s| s.confirmed_bytes))
            .field("reserved_bytes", &state.as_ref().map(|s| s.reserved_bytes))
            .finish()
    }
}

impl<D: Decoder> ImageCache<D> {
    /// Creates a cache over the items stored at `paths`.
    pub fn new(config: CacheConfig, decoder: D, paths: impl Into<Arc<[PathBuf]>>) -> Self {
        Self::with_span(config, decoder, paths, tracing::info_span!("image_cache"))
    }

    /// Creates a cache that emits all of its diagnostics within `span`.
    pub fn with_span(
        config: CacheConfig,
        decoder: D,
        paths: impl Into<Arc<[PathBuf]>>,
        span: Span,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                decoder,
                paths: paths.into(),
                config,
                state: Mutex::new(CacheState::new()),
                span,
            }),
        }
    }

    /// The configuration of this cache.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// The paths of all items, indexed by position.
    pub fn paths(&self) -> &Arc<[PathBuf]> {
        &self.inner.paths
    }

    /// The number of items in the collection.
    pub fn len(&self) -> usize {
        self.inner.paths.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.paths.is_empty()
    }

    /// Returns a handle to the item at `position`, launching its decode if needed.
    ///
    /// Concurrent and repeated calls for the same position share a single decode. If the
    /// eviction simulation predicts that the item would be evicted right after decoding, nothing
    /// is launched and the returned handle never resolves. Positions outside the collection
    /// resolve to an empty item.
    ///
    /// # Panics
    ///
    /// Panics outside of a Tokio runtime if a decode has to be launched. The cache is left as if
    /// the call never happened.
    pub fn get(&self, position: usize, direction: Direction) -> ItemHandle<D::Item> {
        metric!(counter("cache.access") += 1);
        if position >= self.len() {
            return ItemHandle::resolved(None);
        }

        let (handle, task) = {
            let mut state = self.inner.state.lock();
            self.request(&mut state, position, direction)
        };
        if let Some(task) = task {
            task.spawn();
        }
        handle
    }

    /// Whether the handle of the item at `position` has resolved.
    ///
    /// This is also true for failed decodes, which resolve to an empty item.
    pub fn is_loaded(&self, position: usize) -> bool {
        let state = self.inner.state.lock();
        state
            .entries
            .get(&position)
            .is_some_and(|entry| entry.handle.try_get().is_some())
    }

    /// Whether the item at `position` is decoded or being decoded.
    pub fn is_present(&self, position: usize) -> bool {
        self.inner.state.lock().is_present(position)
    }

    /// Moves the window to `position`.
    ///
    /// Suppressed requests are forgotten, as their prediction was made for the old position.
    pub fn set_current_position(&self, position: usize) {
        let mut state = self.inner.state.lock();
        state.current = position;
        state.entries.retain(|_, entry| entry.is_launched());
    }

    /// The position the window is anchored at.
    pub fn current_position(&self) -> usize {
        self.inner.state.lock().current
    }

    /// The size assumed for items that have not been decoded yet.
    pub fn estimated_item_size(&self) -> u64 {
        let state = self.inner.state.lock();
        state.estimate(self.inner.config.default_estimate)
    }

    /// The confirmed size of all decoded items.
    pub fn current_usage(&self) -> u64 {
        self.inner.state.lock().confirmed_bytes
    }

    /// The bytes reserved for decodes in flight.
    pub fn reserved_usage(&self) -> u64 {
        self.inner.state.lock().reserved_bytes
    }

    /// Predicts whether an item of `estimate` bytes at `position` would be evicted right after
    /// being decoded.
    ///
    /// This does not modify the cache.
    pub fn would_evict(&self, position: usize, estimate: u64, direction: Direction) -> bool {
        let state = self.inner.state.lock();
        let window = self.inner.window(state.current);
        would_evict(
            &state,
            &window,
            self.inner.config.max_bytes,
            position,
            estimate,
            direction,
        )
    }

    /// Waits for all decodes in flight to complete.
    ///
    /// Suppressed requests are not waited for, as they never resolve.
    pub async fn shutdown(self) {
        let pending: Vec<_> = {
            let state = self.inner.state.lock();
            state
                .entries
                .values()
                .filter(|entry| matches!(entry.state, EntryState::Pending { .. }))
                .map(|entry| entry.handle.clone())
                .collect()
        };

        tracing::debug!(parent: &self.inner.span, pending = pending.len(), "Shutting down cache");
        futures::future::join_all(pending).await;
    }

    pub(crate) fn lock(&self) -> parking_lot::MutexGuard<'_, CacheState<D::Item>> {
        self.inner.state.lock()
    }

    pub(crate) fn window(&self, current: usize) -> Window {
        self.inner.window(current)
    }

    pub(crate) fn span(&self) -> &Span {
        &self.inner.span
    }

    /// Deduplicates, simulates and registers a request while holding the lock.
    ///
    /// Returns the task of a newly registered load, which the caller spawns once the lock is
    /// released.
    pub(crate) fn request(
        &self,
        state: &mut CacheState<D::Item>,
        position: usize,
        direction: Direction,
    ) -> (ItemHandle<D::Item>, Option<LoadTask>) {
        if let Some(entry) = state.entries.get(&position) {
            if entry.is_launched() {
                metric!(counter("cache.channel.hit") += 1);
                tracing::trace!(parent: &self.inner.span, position, "Request deduplicated");
                return (entry.handle.clone(), None);
            }
        }

        let estimate = state.estimate(self.inner.config.default_estimate);
        let window = self.inner.window(state.current);
        if would_evict(
            state,
            &window,
            self.inner.config.max_bytes,
            position,
            estimate,
            direction,
        ) {
            metric!(counter("cache.suppressed") += 1);
            tracing::debug!(
                parent: &self.inner.span,
                position,
                estimate,
                "Skipping load, item would be evicted immediately",
            );
            return (state.suppress(position), None);
        }

        let (handle, task) = self.launch(state, position, estimate, direction);
        (handle, Some(task))
    }

    /// Reserves `estimate` bytes and registers the decode of `position`.
    pub(crate) fn launch(
        &self,
        state: &mut CacheState<D::Item>,
        position: usize,
        estimate: u64,
        direction: Direction,
    ) -> (ItemHandle<D::Item>, LoadTask) {
        metric!(counter("cache.channel.miss") += 1);
        let path = self.inner.paths[position].clone();
        tracing::debug!(
            parent: &self.inner.span,
            position,
            path = %path.display(),
            estimate,
            "Loading item",
        );

        let (sender, receiver) = oneshot::channel();
        let decode = self.inner.decoder.decode(position, path);
        let mut guard = LoadGuard {
            inner: Arc::clone(&self.inner),
            position,
            direction,
            started: false,
            done: false,
        };

        let task = async move {
            guard.started = true;
            let start = Instant::now();
            let (item, bytes): (LoadedItem<D::Item>, u64) = match decode.await {
                Ok(Decoded { item, bytes }) => (Some(Arc::new(item)), bytes),
                Err(error) => {
                    metric!(counter("cache.decode.failed") += 1);
                    tracing::error!(
                        error = &error as &dyn std::error::Error,
                        position,
                        "Failed to decode item",
                    );
                    (None, 0)
                }
            };
            metric!(timer("cache.decode") = start.elapsed());

            // Record the size before publishing, so that a resolved handle implies an
            // up-to-date budget.
            guard.finish(bytes);
            sender.send(item).ok();
        }
        .instrument(self.inner.span.clone());

        let handle = ItemHandle::from_receiver(receiver);
        state.reserved_bytes += estimate;
        state.entries.insert(
            position,
            CacheEntry {
                handle: handle.clone(),
                state: EntryState::Pending { reserved: estimate },
            },
        );
        (handle, LoadTask(task.boxed()))
    }
}
