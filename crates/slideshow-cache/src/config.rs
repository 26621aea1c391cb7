/// One mebibyte, the unit in which budgets are usually configured.
pub const MIB: u64 = 1024 * 1024;

/// The number of positions kept around the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    /// Positions kept behind the current position.
    pub before: usize,
    /// Positions kept ahead of the current position.
    pub after: usize,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            before: 3,
            after: 4,
        }
    }
}

/// Configuration of an [`ImageCache`](crate::ImageCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// The budget of confirmed bytes the cache tries to stay under.
    pub max_bytes: u64,
    /// The protected window around the current position.
    pub margins: Margins,
    /// The size assumed for an item before any item has been decoded.
    ///
    /// Once an item has been decoded, its size is used as the estimate instead.
    pub default_estimate: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 2048 * MIB,
            margins: Margins::default(),
            default_estimate: 200 * MIB,
        }
    }
}
