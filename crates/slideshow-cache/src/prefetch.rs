use crate::simulate::would_evict;
use crate::{Decoder, Direction, ImageCache};

impl<D: Decoder> ImageCache<D> {
    /// Speculatively loads the window around the current position.
    ///
    /// The direction of travel is filled first, then the opposite direction. A direction stops as
    /// soon as the next load would exceed the budget, and positions the eviction simulation
    /// rejects are skipped. Returns the number of launched loads.
    ///
    /// # Panics
    ///
    /// Panics outside of a Tokio runtime if a load has to be launched.
    pub fn fill(&self, direction: Direction) -> usize {
        if self.is_empty() {
            return 0;
        }

        let max_bytes = self.config().max_bytes;
        let mut state = self.lock();
        let estimate = state.estimate(self.config().default_estimate);
        let window = self.window(state.current);

        let mut tasks = Vec::new();
        for direction in [direction, direction.reverse()] {
            for offset in 1..=window.margin(direction) {
                let position = window.neighbor(offset, direction);
                if state.is_present(position) {
                    continue;
                }
                if state.committed_bytes().saturating_add(estimate) > max_bytes {
                    break;
                }
                if would_evict(&state, &window, max_bytes, position, estimate, direction) {
                    continue;
                }

                let (_, task) = self.launch(&mut state, position, estimate, direction);
                tasks.push(task);
            }
        }
        drop(state);

        let launched = tasks.len();
        for task in tasks {
            task.spawn();
        }

        metric!(counter("prefetch.launched") += launched as i64);
        tracing::debug!(
            parent: self.span(),
            current = window.current(),
            launched,
            "Filled cache window",
        );
        launched
    }

    /// Loads the next missing item in the direction of travel.
    ///
    /// This first looks at the lookahead of the window and launches the first position that is
    /// neither loaded nor being loaded and that the eviction simulation accepts. If there is none,
    /// the first missing position in `direction` is loaded regardless of the simulation.
    /// Returns the launched position, or `None` if every item is already present.
    ///
    /// # Panics
    ///
    /// Panics outside of a Tokio runtime if a load has to be launched.
    pub fn preload_next(&self, direction: Direction) -> Option<usize> {
        if self.is_empty() {
            return None;
        }

        let max_bytes = self.config().max_bytes;
        let mut state = self.lock();
        let estimate = state.estimate(self.config().default_estimate);
        let window = self.window(state.current);

        for offset in 1..=window.margin(direction) {
            let position = window.neighbor(offset, direction);
            if state.is_present(position)
                || would_evict(&state, &window, max_bytes, position, estimate, direction)
            {
                continue;
            }

            tracing::debug!(parent: self.span(), position, "Preloading item");
            let (_, task) = self.launch(&mut state, position, estimate, direction);
            drop(state);
            task.spawn();
            return Some(position);
        }

        for offset in 1..self.len() {
            let position = window.neighbor(offset, direction);
            if state.is_present(position) {
                continue;
            }

            tracing::debug!(
                parent: self.span(),
                position,
                "Forced preloading item without eviction check",
            );
            let (_, task) = self.launch(&mut state, position, estimate, direction);
            drop(state);
            task.spawn();
            return Some(position);
        }

        tracing::debug!(
            parent: self.span(),
            current = window.current(),
            "No suitable item to preload",
        );
        None
    }
}
