//! Tool configuration module.
//!
//! Handles loading and validating `liveheic.toml`. Configuration is flat:
//! stock defaults are overridden by a single config file, either passed
//! explicitly with `--config` or picked up from the working directory.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [convert]
//! quality = 92           # JPEG quality (1-100)
//! duplicates = "suffix"  # replace | reject | suffix
//!
//! [engine]
//! kind = "auto"          # auto | magick | libheif | none
//!
//! [processing]
//! max_processes = 4      # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown
//! keys are rejected to catch typos early. Command-line flags override
//! config values.

use crate::engine::EngineKind;
use crate::pairing::DuplicatePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name probed in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "liveheic.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `liveheic.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Conversion settings (JPEG quality, duplicate handling).
    pub convert: ConvertConfig,
    /// Engine selection.
    pub engine: EngineConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.convert.quality == 0 || self.convert.quality > 100 {
            return Err(ConfigError::Validation(
                "convert.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }
}

/// Conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u8,
    /// What to do when two inputs of the same class share a base name.
    pub duplicates: DuplicatePolicy,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            quality: 92,
            duplicates: DuplicatePolicy::default(),
        }
    }
}

/// Engine selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Which conversion engine to use.
    pub kind: EngineKind,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel conversion workers.
    /// When absent or null, defaults to the number of CPU cores.
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
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading and validation
// =============================================================================

/// Load config from `liveheic.toml` in the given directory.
///
/// Returns the stock defaults if no file exists there. Rejects unknown keys
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<Config, ConfigError> {
    let path = dir.join(DEFAULT_CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config_file(&path)
}

/// Load config from an explicit file path. The file must exist.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `liveheic.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# liveheic Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Looked up as ./liveheic.toml, or pass an explicit path with --config.
# Command-line flags override config values.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Conversion
# ---------------------------------------------------------------------------
[convert]
# JPEG encoding quality (1 = worst, 100 = best).
quality = 92

# What to do when two inputs of the same class share a base name:
#   "replace" - last one wins
#   "reject"  - fail the whole add
#   "suffix"  - keep both, later ones grouped under "name~1", "name~2", ...
duplicates = "suffix"

# ---------------------------------------------------------------------------
# Engine
# ---------------------------------------------------------------------------
[engine]
# Which conversion engine decodes HEIC/HEIF:
#   "auto"    - libheif when compiled in, else ImageMagick, else none
#   "magick"  - require the ImageMagick CLI (magick or convert on PATH)
#   "libheif" - require the built-in libheif engine (cargo feature "libheif")
#   "none"    - no engine; HEIC and passthrough image units will error
kind = "auto"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel conversion workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
