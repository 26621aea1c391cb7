use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use slideshow_cache::{Decoder, Direction, ImageCache, LoadedItem, SimpleLoader, metric};

use crate::config::Config;
use crate::navigator::{Navigator, Order};

/// Where images are loaded from.
#[derive(Debug)]
enum Source<D: Decoder> {
    /// Through the windowed cache, with preloading.
    Cached(ImageCache<D>),
    /// Decoded right before they are shown.
    Direct(SimpleLoader<D>),
}

/// An image that is due to be shown.
#[derive(Debug)]
pub struct Slide<T> {
    /// The position of the image.
    pub position: usize,
    /// The number of images in the slideshow.
    pub len: usize,
    /// The file of the image.
    pub path: PathBuf,
    /// The decoded image, or `None` if it failed to decode.
    pub item: LoadedItem<T>,
}

/// Drives the image source the way an interactive viewer would.
///
/// Every step moves the cache to the new position, requests the image, preloads the next one in
/// the direction of travel and waits for the image before showing it.
#[derive(Debug)]
pub struct Slideshow<D: Decoder> {
    source: Source<D>,
    paths: Arc<[PathBuf]>,
    navigator: Navigator,
    interval: Duration,
    backward: bool,
}

impl<D: Decoder> Slideshow<D> {
    /// Creates a slideshow over the images at `paths`.
    pub fn new(config: &Config, decoder: D, paths: Arc<[PathBuf]>) -> Self {
        let source = if config.cache.enabled {
            tracing::info!(
                max_bytes_mb = config.cache.max_bytes_mb,
                "Image caching enabled, loading asynchronously",
            );
            let span = tracing::info_span!("image_cache", images = paths.len());
            Source::Cached(ImageCache::with_span(
                config.cache.cache_config(),
                decoder,
                Arc::clone(&paths),
                span,
            ))
        } else {
            tracing::info!("Image caching disabled, loading synchronously");
            Source::Direct(SimpleLoader::new(decoder, Arc::clone(&paths)))
        };

        let order = match config.slideshow.random {
            true => Order::Random,
            false => Order::Sequential,
        };

        Self {
            source,
            navigator: Navigator::new(paths.len(), order, config.slideshow.history_size),
            paths,
            interval: config.slideshow.interval,
            backward: false,
        }
    }

    /// Walks the slideshow backward instead of forward.
    pub fn backward(mut self, backward: bool) -> Self {
        self.backward = backward;
        self
    }

    /// Replaces the navigator that picks the images.
    pub fn with_navigator(mut self, navigator: Navigator) -> Self {
        self.navigator = navigator;
        self
    }

    /// The cache, unless caching is disabled.
    pub fn cache(&self) -> Option<&ImageCache<D>> {
        match self.source {
            Source::Cached(ref cache) => Some(cache),
            Source::Direct(_) => None,
        }
    }

    /// Shows `slides` images, or keeps going forever if `None`.
    ///
    /// Every image is passed to `show` once it is available. Fails if the very first image cannot
    /// be loaded. Returns the number of images shown.
    pub async fn run(
        &mut self,
        slides: Option<usize>,
        mut show: impl FnMut(&Slide<D::Item>),
    ) -> Result<usize> {
        if self.paths.is_empty() {
            bail!("no images to show");
        }

        let mut position = self.navigator.current();
        let mut direction = match self.backward {
            true => Direction::Backward,
            false => Direction::Forward,
        };

        let mut shown = 0;
        while slides.is_none_or(|slides| shown < slides) {
            if shown > 0 {
                tokio::time::sleep(self.interval).await;
                (position, direction) = match self.backward {
                    true => self.navigator.previous(),
                    false => self.navigator.next(),
                };
            }

            let item = self.load(position, direction).await;
            let path = self.paths[position].clone();
            metric!(
                counter("slideshow.shown") += 1,
                "loaded" => if item.is_some() { "true" } else { "false" },
            );
            if item.is_none() && shown == 0 {
                bail!("failed to load initial image {}", path.display());
            }

            match item {
                Some(_) => tracing::info!(
                    position = position + 1,
                    images = self.paths.len(),
                    path = %path.display(),
                    "Displaying image",
                ),
                None => tracing::warn!(
                    position = position + 1,
                    images = self.paths.len(),
                    path = %path.display(),
                    "Failed to load image",
                ),
            }

            show(&Slide {
                position,
                len: self.paths.len(),
                path,
                item,
            });
            shown += 1;
        }

        if let Source::Cached(ref cache) = self.source {
            cache.clone().shutdown().await;
        }
        tracing::info!(shown, "Exiting slideshow");
        Ok(shown)
    }

    async fn load(&self, position: usize, direction: Direction) -> LoadedItem<D::Item> {
        let cache = match self.source {
            Source::Cached(ref cache) => cache,
            Source::Direct(ref loader) => return loader.load(position).await,
        };

        cache.set_current_position(position);
        let handle = cache.get(position, direction);
        match cache.preload_next(direction) {
            Some(preloaded) => tracing::debug!(
                position = preloaded + 1,
                images = self.paths.len(),
                "Preloading image",
            ),
            None => tracing::debug!(position = position + 1, "No suitable image to preload"),
        }

        match handle.try_get() {
            Some(item) => item,
            None => {
                tracing::info!(
                    position = position + 1,
                    images = self.paths.len(),
                    "Still waiting for image",
                );
                // The current position is always inside the window, so this resolves.
                handle.await
            }
        }
    }
}
