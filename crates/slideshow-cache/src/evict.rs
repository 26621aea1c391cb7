use crate::store::{CacheState, EntryState};
use crate::{Direction, Window};

/// An entry removed by [`CacheState::evict_if_needed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Eviction {
    pub position: usize,
    pub bytes: u64,
}

impl<T> CacheState<T> {
    /// Removes decoded entries until the confirmed bytes fit into `max_bytes`.
    ///
    /// The entry with the largest distance in `direction` goes first, regardless of whether it
    /// holds an item or a failed decode. Entries in the window and entries still being decoded
    /// are never removed, so the budget may remain exceeded if the window alone is too large.
    pub(crate) fn evict_if_needed(
        &mut self,
        window: &Window,
        max_bytes: u64,
        direction: Direction,
    ) -> Vec<Eviction> {
        let mut evicted = Vec::new();

        while self.confirmed_bytes > max_bytes {
            let victim = self
                .entries
                .iter()
                .filter(|(_, entry)| matches!(entry.state, EntryState::Ready { .. }))
                .filter(|(position, _)| !window.contains(**position))
                .max_by_key(|(position, _)| window.distance(**position, direction))
                .map(|(position, _)| *position);
            let Some(position) = victim else {
                break;
            };

            if let Some(entry) = self.entries.remove(&position) {
                let bytes = match entry.state {
                    EntryState::Ready { bytes } => bytes,
                    _ => 0,
                };
                self.confirmed_bytes = self.confirmed_bytes.saturating_sub(bytes);
                evicted.push(Eviction { position, bytes });
            }
        }

        evicted
    }
}
