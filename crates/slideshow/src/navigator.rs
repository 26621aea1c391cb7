use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slideshow_cache::Direction;

/// The order in which images are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// By position, wrapping around at the end.
    Sequential,
    /// Uniformly random. Stepping back walks the history of shown images.
    Random,
}

/// Picks the image to show next.
#[derive(Debug)]
pub struct Navigator {
    len: usize,
    current: usize,
    order: Order,
    /// Positions shown before `current`, oldest first.
    history: VecDeque<usize>,
    /// Where in `history` a backward walk currently is.
    cursor: usize,
    max_history: usize,
    rng: StdRng,
}

impl Navigator {
    /// Creates a navigator over `len` images, starting at the first one.
    pub fn new(len: usize, order: Order, max_history: usize) -> Self {
        Self {
            len,
            current: 0,
            order,
            history: VecDeque::new(),
            cursor: 0,
            max_history,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Replaces the random number generator.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// The position of the image shown right now.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Advances to the next image and returns its position with the direction of travel.
    pub fn next(&mut self) -> (usize, Direction) {
        if self.len == 0 {
            return (0, Direction::Forward);
        }

        let previous = self.current;
        match self.order {
            Order::Sequential => {
                self.current = (self.current + 1) % self.len;
                (self.current, Direction::Forward)
            }
            Order::Random => {
                // A step forward after walking back discards the rest of the history.
                self.history.truncate(self.cursor);
                self.history.push_back(previous);
                if self.history.len() > self.max_history {
                    self.history.pop_front();
                }
                self.cursor = self.history.len();

                self.current = self.rng.random_range(0..self.len);
                (self.current, Direction::of_step(previous, self.current))
            }
        }
    }

    /// Steps back to the previous image and returns its position with the direction of travel.
    ///
    /// In random order this stays on the current image once the history is exhausted.
    pub fn previous(&mut self) -> (usize, Direction) {
        if self.len == 0 {
            return (0, Direction::Backward);
        }

        let previous = self.current;
        match self.order {
            Order::Sequential => {
                self.current = (self.current + self.len - 1) % self.len;
                (self.current, Direction::Backward)
            }
            Order::Random => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.current = self.history[self.cursor];
                }
                (self.current, Direction::of_step(previous, self.current))
            }
        }
    }
}
