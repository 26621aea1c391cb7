use crate::Margins;

/// The direction in which the slideshow is travelling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards higher positions.
    #[default]
    Forward,
    /// Towards lower positions.
    Backward,
}

impl Direction {
    /// Returns the opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    /// Derives the direction of a step from `previous` to `current`.
    ///
    /// Staying on the same position counts as moving forward.
    pub fn of_step(previous: usize, current: usize) -> Self {
        if current >= previous {
            Self::Forward
        } else {
            Self::Backward
        }
    }
}

/// The circular region around the current position that must be kept in the cache.
///
/// All positions are taken modulo the collection length, so the window wraps around the end of
/// the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    len: usize,
    current: usize,
    margins: Margins,
}

impl Window {
    /// Creates the window of a collection with `len` items anchored at `current`.
    pub fn new(len: usize, current: usize, margins: Margins) -> Self {
        let current = if len == 0 { 0 } else { current % len };
        Self {
            len,
            current,
            margins,
        }
    }

    /// The position the window is anchored at.
    pub fn current(&self) -> usize {
        self.current
    }

    /// The margin in the given direction.
    pub fn margin(&self, direction: Direction) -> usize {
        match direction {
            Direction::Forward => self.margins.after,
            Direction::Backward => self.margins.before,
        }
    }

    /// Whether `position` lies within `[current - before, current + after]`.
    pub fn contains(&self, position: usize) -> bool {
        if position >= self.len {
            return false;
        }
        let Margins { before, after } = self.margins;
        if before.saturating_add(after).saturating_add(1) >= self.len {
            return true;
        }

        let start = (self.current + self.len - before) % self.len;
        let end = (self.current + after) % self.len;
        if start <= end {
            start <= position && position <= end
        } else {
            // the window wraps around zero
            position >= start || position <= end
        }
    }

    /// The number of steps in `direction` needed to get from the current position to `position`.
    pub fn distance(&self, position: usize, direction: Direction) -> usize {
        if self.len == 0 {
            return 0;
        }
        let position = position % self.len;
        match direction {
            Direction::Forward => (position + self.len - self.current) % self.len,
            Direction::Backward => (self.current + self.len - position) % self.len,
        }
    }

    /// Whether `position` is part of the lookahead in the direction of travel.
    ///
    /// These are the next `after` positions when moving forward, or the previous `before`
    /// positions when moving backward.
    pub fn is_protected(&self, position: usize, direction: Direction) -> bool {
        if position >= self.len {
            return false;
        }
        let steps = self.distance(position, direction);
        steps >= 1 && steps <= self.margin(direction)
    }

    /// The position `offset` steps away from the current position in `direction`.
    pub fn neighbor(&self, offset: usize, direction: Direction) -> usize {
        if self.len == 0 {
            return 0;
        }
        let offset = offset % self.len;
        match direction {
            Direction::Forward => (self.current + offset) % self.len,
            Direction::Backward => (self.current + self.len - offset) % self.len,
        }
    }
}
