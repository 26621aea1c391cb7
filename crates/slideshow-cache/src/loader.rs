use std::path::PathBuf;
use std::sync::Arc;

use crate::{Decoded, Decoder, LoadedItem};

/// Loads items directly from a [`Decoder`], without any caching.
///
/// This is used instead of an [`ImageCache`](crate::ImageCache) when caching is disabled: every
/// request decodes its item on the spot.
#[derive(Debug)]
pub struct SimpleLoader<D> {
    decoder: D,
    paths: Arc<[PathBuf]>,
}

impl<D: Decoder> SimpleLoader<D> {
    /// Creates a loader over the items stored at `paths`.
    pub fn new(decoder: D, paths: impl Into<Arc<[PathBuf]>>) -> Self {
        Self {
            decoder,
            paths: paths.into(),
        }
    }

    /// The number of items in the collection.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Decodes the item at `position`, returning `None` on failure.
    pub async fn load(&self, position: usize) -> LoadedItem<D::Item> {
        let Some(path) = self.paths.get(position) else {
            tracing::warn!(position, "Invalid item position");
            return None;
        };
        tracing::debug!(position, path = %path.display(), "Loading item synchronously");

        match self.decoder.decode(position, path.clone()).await {
            Ok(Decoded { item, .. }) => Some(Arc::new(item)),
            Err(error) => {
                tracing::error!(
                    error = &error as &dyn std::error::Error,
                    position,
                    "Failed to decode item",
                );
                None
            }
        }
    }
}
