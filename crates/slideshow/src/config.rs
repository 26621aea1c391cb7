use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, de};
use slideshow_cache::{CacheConfig, MIB, Margins};
use tracing::level_filters::LevelFilter;

/// Controls the log format
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect (pretty for tty, simplified for other)
    Auto,
    /// With colors
    Pretty,
    /// Simplified log output
    Simplified,
    /// Dump out JSON lines
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The log level for the slideshow.
    #[serde(deserialize_with = "deserialize_level_filter")]
    pub level: LevelFilter,
    /// Controls the log format.
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Control the metrics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// host/port of statsd instance
    pub statsd: Option<String>,
    /// The prefix that should be added to all metrics.
    pub prefix: String,
    /// A map containing custom tags and their values.
    ///
    /// These tags will be appended to every metric.
    pub custom_tags: BTreeMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: env::var("STATSD_SERVER").ok(),
            prefix: "slideshow".into(),
            custom_tags: BTreeMap::new(),
        }
    }
}

/// Sizing of the image cache.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    /// When disabled, every image is decoded right before it is shown.
    pub enabled: bool,
    /// The memory budget of the cache in MiB.
    pub max_bytes_mb: u64,
    /// Images kept behind the current image.
    pub margin_before: usize,
    /// Images kept ahead of the current image.
    pub margin_after: usize,
    /// The size assumed for images before the first one is decoded, in MiB.
    pub default_item_estimate_mb: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            enabled: true,
            max_bytes_mb: defaults.max_bytes / MIB,
            margin_before: defaults.margins.before,
            margin_after: defaults.margins.after,
            default_item_estimate_mb: defaults.default_estimate / MIB,
        }
    }
}

impl CacheSettings {
    /// The configuration for an [`ImageCache`](slideshow_cache::ImageCache).
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_bytes: self.max_bytes_mb.saturating_mul(MIB),
            margins: Margins {
                before: self.margin_before,
                after: self.margin_after,
            },
            default_estimate: self.default_item_estimate_mb.saturating_mul(MIB),
        }
    }
}

/// Playback of the slideshow.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SlideshowSettings {
    /// How long each image is shown.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Whether images in subfolders are included.
    pub recursive: bool,
    /// Shows images in random order instead of sorted by path.
    pub random: bool,
    /// The number of random steps that can be walked back.
    pub history_size: usize,
}

impl Default for SlideshowSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            recursive: false,
            random: false,
            history_size: 1000,
        }
    }
}

/// The slideshow configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration for internal logging.
    pub logging: Logging,

    /// Configuration for reporting metrics to a statsd instance.
    pub metrics: Metrics,

    /// Sizing of the image cache.
    pub cache: CacheSettings,

    /// Playback of the slideshow.
    pub slideshow: SlideshowSettings,
}

impl Config {
    /// Loads the configuration from `path`, or the defaults if no path is given.
    pub fn get(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_reader(
                fs::File::open(path).context("failed to open configuration file")?,
            ),
            None => Ok(Config::default()),
        }
    }

    fn from_reader(mut reader: impl std::io::Read) -> Result<Self> {
        let mut config = String::new();
        reader
            .read_to_string(&mut config)
            .context("failed reading config file")?;
        // check for empty files explicitly
        if config.trim().is_empty() {
            anyhow::bail!("config file empty");
        }
        serde_yaml::from_str(&config).context("failed to parse config YAML")
    }
}

#[derive(Debug)]
struct LevelFilterVisitor;

impl de::Visitor<'_> for LevelFilterVisitor {
    type Value = LevelFilter;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            r#"one of the strings "off", "error", "warn", "info", "debug", or "trace""#
        )
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            "off" => Ok(LevelFilter::OFF),
            "error" => Ok(LevelFilter::ERROR),
            "warn" => Ok(LevelFilter::WARN),
            "info" => Ok(LevelFilter::INFO),
            "debug" => Ok(LevelFilter::DEBUG),
            "trace" => Ok(LevelFilter::TRACE),
            _ => Err(de::Error::unknown_variant(
                v,
                &["off", "error", "warn", "info", "debug", "trace"],
            )),
        }
    }
}

fn deserialize_level_filter<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<LevelFilter, D::Error> {
    deserializer.deserialize_str(LevelFilterVisitor)
}
