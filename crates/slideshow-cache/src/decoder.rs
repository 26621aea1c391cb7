use std::io;
use std::path::PathBuf;

use futures::future::BoxFuture;
use thiserror::Error;

/// An error that happens when decoding an item.
///
/// Decode errors are not cache faults: the cache records the failed position as an empty item
/// that occupies no bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The item could not be read.
    #[error("failed to read item: {0}")]
    Io(#[from] io::Error),
    /// The item was read, but is invalid in some way.
    #[error("malformed: {0}")]
    Malformed(String),
    /// The item is of a format the decoder cannot handle.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// A decoded item together with its memory footprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    /// The decoded item.
    pub item: T,
    /// The number of bytes the item occupies in memory.
    pub bytes: u64,
}

/// Produces decoded items for the [`ImageCache`](crate::ImageCache).
///
/// Decoding itself happens inside the returned future, which the cache spawns on the current
/// Tokio runtime. Calling [`decode`](Decoder::decode) must be cheap and must not call back into
/// the cache, as it is invoked while the cache state is locked.
pub trait Decoder: Send + Sync + 'static {
    /// The decoded item.
    type Item: Send + Sync + 'static;

    /// Creates the computation decoding the item at `position`, stored at `path`.
    fn decode(
        &self,
        position: usize,
        path: PathBuf,
    ) -> BoxFuture<'static, Result<Decoded<Self::Item>, DecodeError>>;
}
