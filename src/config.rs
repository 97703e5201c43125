//! Run configuration.
//!
//! Loaded from `photo-tidy.toml` in the working directory (or the file given
//! with `--config`). Every key is optional; command-line flags override what
//! the file says.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [library]
//! input = "iCloud Photos"       # Library to read
//! output = "processed-photos"   # Where the bucketed copy is written
//! # sample_size = 50            # Process a random subset (dry runs)
//! clean_output = true           # Remove the output directory first
//!
//! [compression]
//! target_size_mb = 3.0          # Size budget per image
//! min_quality = 50              # Quality floor (0-100)
//! quality_step = 5              # Quality decrement per attempt
//! timeout_seconds = 30.0        # Per-image budget for the quality search
//!
//! [processing]
//! max_processes = 4             # Inspection workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [compression]
//! target_size_mb = 1.5
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "photo-tidy.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `photo-tidy.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Input and output locations.
    pub library: LibraryConfig,
    /// Size budget and quality search.
    pub compression: CompressionConfig,
    /// Parallel inspection settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.compression;
        if !(c.target_size_mb.is_finite() && c.target_size_mb > 0.0) {
            return Err(ConfigError::Validation(
                "compression.target_size_mb must be greater than 0".into(),
            ));
        }
        if c.min_quality > 100 {
            return Err(ConfigError::Validation(
                "compression.min_quality must be 0-100".into(),
            ));
        }
        if c.quality_step == 0 || c.quality_step > 100 {
            return Err(ConfigError::Validation(
                "compression.quality_step must be 1-100".into(),
            ));
        }
        if !(c.timeout_seconds.is_finite() && c.timeout_seconds >= 0.0) {
            return Err(ConfigError::Validation(
                "compression.timeout_seconds must be 0 or more".into(),
            ));
        }
        if self.library.sample_size == Some(0) {
            return Err(ConfigError::Validation(
                "library.sample_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Random subset size; absent means the whole library.
    pub sample_size: Option<usize>,
    pub clean_output: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("iCloud Photos"),
            output: PathBuf::from("processed-photos"),
            sample_size: None,
            clean_output: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    pub target_size_mb: f64,
    pub min_quality: u32,
    pub quality_step: u32,
    pub timeout_seconds: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            target_size_mb: 3.0,
            min_quality: 50,
            quality_step: 5,
            timeout_seconds: 30.0,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel inspection workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from an explicit file, or from [`DEFAULT_CONFIG_FILE`] in
/// `dir` when `path` is `None`.
///
/// A missing default file yields stock defaults; a missing explicit file is
/// an error.
pub fn load_config(path: Option<&Path>, dir: &Path) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) if !p.exists() => return Err(ConfigError::NotFound(p.to_path_buf())),
        Some(p) => p.to_path_buf(),
        None => {
            let default = dir.join(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                return Ok(Config::default());
            }
            default
        }
    };
    tracing::debug!(path = %config_path.display(), "loading config");
    parse_config(&fs::read_to_string(&config_path)?)
}

/// Returns a fully-commented stock `photo-tidy.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# photo-tidy configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Library locations
# ---------------------------------------------------------------------------
[library]
# Photo library to read. Searched recursively for
# png, jpg, jpeg, gif, bmp, tiff and heic files.
input = "iCloud Photos"

# Output root. Geotagged images land here, the rest in
# missing-locations/, and timed-out partial encodes in problem-photos/.
output = "processed-photos"

# Process only a random subset of this many images (useful for dry runs).
# sample_size = 50

# Remove the output directory before writing.
clean_output = true

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[compression]
# Images larger than this are re-encoded as JPEG until they fit.
# Smaller images are copied unchanged.
target_size_mb = 3.0

# Lowest quality the search may reach (0 = worst, 100 = best).
# The search starts at 95 and stops here even if the image is still too big.
min_quality = 50

# How much quality drops between attempts.
quality_step = 5

# Wall-clock budget per image. When exceeded, the original is kept and the
# last attempt is saved under problem-photos/.
timeout_seconds = 30.0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel inspection workers. Omit to use all CPU cores.
# Values larger than the core count are clamped down.
# max_processes = 4
"##
}
