use crate::store::{CacheState, EntryState};
use crate::{Direction, Window};

/// Predicts whether adding an item of `estimate` bytes at `position` would cause its own eviction.
///
/// The simulation starts from all launched entries plus the candidate, and repeatedly drops the
/// entry furthest away in the direction of travel until the total fits into `max_bytes`. Entries
/// in the window and in the lookahead of the direction of travel are never dropped. Pending
/// entries count with their reservation.
///
/// Returns `true` if the candidate itself gets dropped. `state` is never modified.
pub(crate) fn would_evict<T>(
    state: &CacheState<T>,
    window: &Window,
    max_bytes: u64,
    position: usize,
    estimate: u64,
    direction: Direction,
) -> bool {
    if window.contains(position) {
        return false;
    }

    let mut total = state.committed_bytes().saturating_add(estimate);
    if total <= max_bytes {
        return false;
    }

    let evictable = |p: usize| !window.contains(p) && !window.is_protected(p, direction);

    let mut candidates: Vec<(usize, u64)> = state
        .entries
        .iter()
        .filter(|(p, _)| **p != position)
        .filter_map(|(p, entry)| match entry.state {
            EntryState::Pending { reserved } => Some((*p, reserved)),
            EntryState::Ready { bytes } => Some((*p, bytes)),
            EntryState::Suppressed => None,
        })
        .chain(std::iter::once((position, estimate)))
        .filter(|(p, _)| evictable(*p))
        .collect();

    while total > max_bytes {
        let furthest = candidates
            .iter()
            .enumerate()
            .max_by_key(|(_, (p, _))| window.distance(*p, direction))
            .map(|(index, _)| index);
        let Some(index) = furthest else {
            break;
        };

        let (evicted, bytes) = candidates.swap_remove(index);
        if evicted == position {
            return true;
        }
        total = total.saturating_sub(bytes);
    }

    false
}
