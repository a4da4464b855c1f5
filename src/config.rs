//! Configuration file parser for metwarn.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use url::Url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// The composed feed URL (base + region) is not a valid URL.
    #[error("Invalid feed URL '{url}': {source}")]
    InvalidFeedUrl {
        url: String,
        source: url::ParseError,
    },
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`, which mirrors the Met
/// Office public warnings feed setup.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the warnings feed. The region code is appended to this.
    pub feed_url: String,

    /// Region code appended to `feed_url` to form the full feed URL.
    pub region: String,

    /// Milliseconds between refresh cycles. Default is one hour.
    pub update_interval_ms: u64,

    /// Fallback display header, used until the feed supplies a channel title.
    pub header: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: "https://www.metoffice.gov.uk/public/data/PWSCache/WarningsRSS/Region/"
                .to_string(),
            region: "default-region".to_string(),
            update_interval_ms: 60 * 60 * 1000,
            header: "Met Office Warnings".to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid slurping a corrupted or
        // accidentally huge file into memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["feed_url", "region", "update_interval_ms", "header"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), region = %config.region, "Loaded configuration");
        Ok(config)
    }

    /// Compose and validate the full feed URL (base + region).
    ///
    /// The region code is appended verbatim, matching the upstream feed's
    /// `.../WarningsRSS/Region/<code>` layout.
    pub fn full_feed_url(&self) -> Result<Url, ConfigError> {
        let full = format!("{}{}", self.feed_url, self.region);
        Url::parse(&full).map_err(|source| ConfigError::InvalidFeedUrl { url: full, source })
    }
}

// ============================================================================
// Tests
// ============================================================================
