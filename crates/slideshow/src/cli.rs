//! Exposes the command line application.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use console::style;
use rand::SeedableRng;
use rand::rngs::StdRng;
use slideshow_cache::metrics;
use tracing::level_filters::LevelFilter;

use crate::config::Config;
use crate::decoder::{FileDecoder, ImageFile};
use crate::discovery;
use crate::logging;
use crate::navigator::{Navigator, Order};
use crate::slideshow::{Slide, Slideshow};

/// Shows the images in a folder as a slideshow.
///
/// Images are decoded in the background and kept in a bounded in-memory cache around the image
/// that is shown, so that stepping forward and backward is instantaneous.
#[derive(Clone, Parser, Debug)]
#[command(author, version, about, long_about)]
struct Cli {
    /// The folder containing the images.
    folder: PathBuf,

    /// Path to your configuration file.
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Include images in subfolders.
    #[arg(long, short)]
    recursive: bool,

    /// Show the images in random order.
    #[arg(long)]
    random: bool,

    /// Seed for the random order, to repeat a slideshow.
    #[arg(long, requires = "random")]
    seed: Option<u64>,

    /// How long each image is shown, e.g. `5s` or `1m 30s`.
    #[arg(long, value_parser = humantime::parse_duration, value_name = "DURATION")]
    interval: Option<Duration>,

    /// The memory budget of the image cache in MiB.
    #[arg(long, value_name = "MB")]
    cache_mb: Option<u64>,

    /// Decode every image right before it is shown instead of caching.
    #[arg(long)]
    no_cache: bool,

    /// Stop after showing this many images.
    #[arg(long, value_name = "N")]
    slides: Option<usize>,

    /// Walk the slideshow backward.
    #[arg(long)]
    backward: bool,

    /// The severity level of logging output.
    ///
    /// Possible values:
    /// off, error, warn, info, debug, trace
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LevelFilter>,
}

impl Cli {
    /// Overrides values of the configuration file with the ones given on the command line.
    fn apply(&self, config: &mut Config) {
        if self.recursive {
            config.slideshow.recursive = true;
        }
        if self.random {
            config.slideshow.random = true;
        }
        if let Some(interval) = self.interval {
            config.slideshow.interval = interval;
        }
        if let Some(cache_mb) = self.cache_mb {
            config.cache.max_bytes_mb = cache_mb;
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::get(cli.config.as_deref()).context("failed loading config")?;
    cli.apply(&mut config);

    logging::init_logging(&config);
    if let Some(ref statsd) = config.metrics.statsd {
        metrics::configure_statsd(
            &config.metrics.prefix,
            statsd.as_str(),
            config.metrics.custom_tags.clone(),
        )
        .context("failed to set up metrics")?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("slideshow-worker")
        .enable_all()
        .build()
        .context("failed to start the runtime")?;

    runtime.block_on(run(cli, config))
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let paths = discovery::find_images(&cli.folder, config.slideshow.recursive)?;
    if paths.is_empty() {
        bail!("no images found in {}", cli.folder.display());
    }
    tracing::info!(
        folder = %cli.folder.display(),
        images = paths.len(),
        interval = %humantime::format_duration(config.slideshow.interval),
        "Starting slideshow",
    );

    let paths: Arc<[PathBuf]> = paths.into();
    let mut slideshow =
        Slideshow::new(&config, FileDecoder, Arc::clone(&paths)).backward(cli.backward);
    if let Some(seed) = cli.seed {
        let navigator = Navigator::new(paths.len(), Order::Random, config.slideshow.history_size)
            .with_rng(StdRng::seed_from_u64(seed));
        slideshow = slideshow.with_navigator(navigator);
    }

    tokio::select! {
        result = slideshow.run(cli.slides, print_slide) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, exiting slideshow");
        }
    }

    if let Some(cache) = slideshow.cache() {
        tracing::debug!(
            usage = cache.current_usage(),
            reserved = cache.reserved_usage(),
            "Final cache usage",
        );
    }
    Ok(())
}

fn print_slide(slide: &Slide<ImageFile>) {
    let counter = style(format!("[{}/{}]", slide.position + 1, slide.len)).dim();
    let path = style(slide.path.display()).cyan();
    match slide.item {
        Some(ref image) => {
            let size = style(format!("{} bytes", image.data.len())).yellow();
            println!("{counter} {path} {size}");
        }
        None => println!("{counter} {path} {}", style("failed to load").red().bold()),
    }
}
