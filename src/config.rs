//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines the
//! pacing constants used by the pipeline.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Remote image used to overwrite media before deletion.
pub const DEFAULT_PLACEHOLDER_URL: &str =
    "https://www.hhlqilongzhu.cn/api/tu_tuwen.php?msg=不可以防撤回哦";
/// Local cache location of the placeholder image.
pub const DEFAULT_PLACEHOLDER_PATH: &str = "./assets/dme/dme_troll_image.jpg";
/// Messages requested per history page.
pub const HISTORY_PAGE_SIZE: usize = 100;
/// Message ids per delete call.
pub const DELETE_BATCH_SIZE: usize = 50;
/// Extra candidates collected on top of the requested count.
pub const TARGET_OVERSHOOT: usize = 2;

/// Attempts for the placeholder download.
pub const PLACEHOLDER_MAX_RETRIES: usize = 3;
/// Initial backoff for the placeholder download (milliseconds).
pub const PLACEHOLDER_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling for the placeholder download (milliseconds).
pub const PLACEHOLDER_MAX_BACKOFF_MS: u64 = 4000;

/// Application settings loaded from config files and environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// URL the placeholder image is downloaded from
    #[serde(default = "default_placeholder_url")]
    pub placeholder_url: String,
    /// Where the downloaded placeholder is cached
    #[serde(default = "default_placeholder_path")]
    pub placeholder_path: PathBuf,

    /// History page size
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Ids per delete batch
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,

    /// Pause between history pages
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Pause between delete batches
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Pause after the edit fan-out before deleting
    #[serde(default = "default_edit_settle_ms")]
    pub edit_settle_ms: u64,
    /// Backoff after a non rate-limit failure
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Wait used when a flood signal carries no duration
    #[serde(default = "default_flood_wait_secs")]
    pub default_flood_wait_secs: u64,
    /// How often remaining flood wait is reported
    #[serde(default = "default_flood_progress_secs")]
    pub flood_progress_secs: u64,

    /// Extra candidates collected on top of the requested count
    #[serde(default = "default_target_overshoot")]
    pub target_overshoot: usize,
}

fn default_placeholder_url() -> String {
    DEFAULT_PLACEHOLDER_URL.to_string()
}

fn default_placeholder_path() -> PathBuf {
    PathBuf::from(DEFAULT_PLACEHOLDER_PATH)
}

const fn default_page_size() -> usize {
    HISTORY_PAGE_SIZE
}

const fn default_delete_batch_size() -> usize {
    DELETE_BATCH_SIZE
}

const fn default_page_delay_ms() -> u64 {
    2000
}

const fn default_batch_delay_ms() -> u64 {
    200
}

const fn default_edit_settle_ms() -> u64 {
    1000
}

const fn default_error_backoff_ms() -> u64 {
    5000
}

const fn default_flood_wait_secs() -> u64 {
    60
}

const fn default_flood_progress_secs() -> u64 {
    10
}

const fn default_target_overshoot() -> usize {
    TARGET_OVERSHOOT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            placeholder_url: default_placeholder_url(),
            placeholder_path: default_placeholder_path(),
            page_size: default_page_size(),
            delete_batch_size: default_delete_batch_size(),
            page_delay_ms: default_page_delay_ms(),
            batch_delay_ms: default_batch_delay_ms(),
            edit_settle_ms: default_edit_settle_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            default_flood_wait_secs: default_flood_wait_secs(),
            flood_progress_secs: default_flood_progress_secs(),
            target_overshoot: default_target_overshoot(),
        }
    }
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg. `DME__PAGE_SIZE=50`
        .add_source(Environment::with_prefix("DME").separator("__"))
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Load `.env` (if any) and then the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::new()
    }

    /// Typed pacing and sizing parameters for the pipeline.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            page_size: self.page_size.max(1),
            delete_batch_size: self.delete_batch_size.max(1),
            page_delay: Duration::from_millis(self.page_delay_ms),
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            edit_settle: Duration::from_millis(self.edit_settle_ms),
            error_backoff: Duration::from_millis(self.error_backoff_ms),
            default_flood_wait: Duration::from_secs(self.default_flood_wait_secs),
            flood_progress: Duration::from_secs(self.flood_progress_secs.max(1)),
            target_overshoot: self.target_overshoot,
        }
    }
}

/// Pipeline parameters with resolved durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// History page size
    pub page_size: usize,
    /// Ids per delete batch
    pub delete_batch_size: usize,
    /// Pause between history pages
    pub page_delay: Duration,
    /// Pause between delete batches
    pub batch_delay: Duration,
    /// Pause after the edit fan-out
    pub edit_settle: Duration,
    /// Backoff after a non rate-limit failure
    pub error_backoff: Duration,
    /// Wait used when a flood signal carries no duration
    pub default_flood_wait: Duration,
    /// Granularity of flood wait progress logging
    pub flood_progress: Duration,
    /// Extra candidates collected on top of the requested count
    pub target_overshoot: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Settings::default().pipeline_config()
    }
}
