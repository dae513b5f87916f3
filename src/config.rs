//! Compressor configuration.
//!
//! Handles loading, validating, and merging `lostfound-compress.toml`. Stock
//! defaults match what the upload form ships with; a config file overrides
//! only the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [budget]
//! max_bytes = 943718          # 0.9 MiB, leaves headroom under a 1 MB upload cap
//!
//! [search]
//! initial_max_dimension = 1024
//! min_max_dimension = 640
//! dimension_step = 128
//! initial_quality = 80        # 1-100
//! min_quality = 40
//! quality_step = 10
//!
//! [output]
//! format = "webp"             # "webp" or "jpeg"
//!
//! [heic]
//! quality = 90                # JPEG quality of the intermediate conversion
//! converter = "convert"       # ImageMagick program used for HEIC/HEIF
//!
//! [processing]
//! max_processes = 4           # Max parallel files (omit for auto = CPU cores)
//! timeout_secs = 30           # Per-file deadline (omit for none)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{OutputFormat, Quality, SearchPlan};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "lostfound-compress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Compressor configuration loaded from TOML.
///
/// All fields have defaults. Config files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressorConfig {
    /// Output size ceiling.
    pub budget: BudgetConfig,
    /// Dimension/quality search bounds.
    pub search: SearchConfig,
    /// Encoded output format.
    pub output: OutputConfig,
    /// HEIC/HEIF pre-conversion.
    pub heic: HeicConfig,
    /// Parallelism and deadlines.
    pub processing: ProcessingConfig,
}

impl CompressorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.budget.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "budget.max_bytes must be greater than 0".into(),
            ));
        }
        let s = &self.search;
        for (key, value) in [
            ("search.initial_quality", s.initial_quality),
            ("search.min_quality", s.min_quality),
            ("heic.quality", self.heic.quality),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Validation(format!("{key} must be 1-100")));
            }
        }
        if s.dimension_step == 0 || s.quality_step == 0 {
            return Err(ConfigError::Validation(
                "search.dimension_step and search.quality_step must be non-zero".into(),
            ));
        }
        if s.min_max_dimension == 0 {
            return Err(ConfigError::Validation(
                "search.min_max_dimension must be non-zero".into(),
            ));
        }
        if s.min_max_dimension > s.initial_max_dimension {
            return Err(ConfigError::Validation(
                "search.min_max_dimension must not exceed search.initial_max_dimension".into(),
            ));
        }
        if s.min_quality > s.initial_quality {
            return Err(ConfigError::Validation(
                "search.min_quality must not exceed search.initial_quality".into(),
            ));
        }
        if self.heic.converter.trim().is_empty() {
            return Err(ConfigError::Validation(
                "heic.converter must not be empty".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The search bounds as a [`SearchPlan`].
    pub fn search_plan(&self) -> SearchPlan {
        let s = &self.search;
        SearchPlan {
            initial_max_dimension: s.initial_max_dimension,
            min_max_dimension: s.min_max_dimension,
            dimension_step: s.dimension_step,
            initial_quality: Quality::new(s.initial_quality),
            min_quality: Quality::new(s.min_quality),
            quality_step: s.quality_step,
        }
    }
}

/// Output size ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetConfig {
    /// Maximum encoded size in bytes (inclusive).
    pub max_bytes: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        // 0.9 MiB, floored
        Self { max_bytes: 943_718 }
    }
}

/// Dimension/quality search bounds. Both ranges are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub initial_max_dimension: u32,
    pub min_max_dimension: u32,
    pub dimension_step: u32,
    pub initial_quality: u32,
    pub min_quality: u32,
    pub quality_step: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let plan = SearchPlan::default();
        Self {
            initial_max_dimension: plan.initial_max_dimension,
            min_max_dimension: plan.min_max_dimension,
            dimension_step: plan.dimension_step,
            initial_quality: plan.initial_quality.value(),
            min_quality: plan.min_quality.value(),
            quality_step: plan.quality_step,
        }
    }
}

/// Encoded output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::WebP,
        }
    }
}

/// HEIC/HEIF pre-conversion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeicConfig {
    /// JPEG quality of the intermediate file (1-100).
    pub quality: u32,
    /// ImageMagick program name or path.
    pub converter: String,
}

impl Default for HeicConfig {
    fn default() -> Self {
        Self {
            quality: 90,
            converter: "convert".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of files compressed in parallel.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Per-file deadline in seconds. A file still searching when it passes
    /// is abandoned.
    pub timeout_secs: Option<u64>,
}

impl ProcessingConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
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
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// The base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(CompressorConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist, `Err` if it exists but is
/// not valid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CompressorConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CompressorConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<CompressorConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# lostfound-compress configuration
# ================================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Size budget
# ---------------------------------------------------------------------------
[budget]
# Largest allowed output in bytes. 0.9 MiB keeps uploads under a 1 MB cap
# with room for multipart overhead.
max_bytes = 943718

# ---------------------------------------------------------------------------
# Search
# ---------------------------------------------------------------------------
# Trials run from the largest dimension down, and within each dimension from
# the highest quality down. The first encoding under budget is kept.
[search]
# Longest side allowed on the first pass; images are never upscaled.
initial_max_dimension = 1024
# Smallest longest-side to try before giving up.
min_max_dimension = 640
dimension_step = 128

# Encoder quality, 1 (smallest) to 100 (best).
initial_quality = 80
min_quality = 40
quality_step = 10

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# "webp" or "jpeg"
format = "webp"

# ---------------------------------------------------------------------------
# HEIC / HEIF
# ---------------------------------------------------------------------------
[heic]
# JPEG quality of the intermediate file produced before the search.
quality = 90
# ImageMagick program (needs libheif support). Use "magick" on IM7.
converter = "convert"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum files compressed in parallel.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Abandon a file whose search runs longer than this many seconds.
# timeout_secs = 30
"##
}
