//! Placeholder image used to overwrite media before deletion.
//!
//! The image is downloaded once and cached on disk. Any failure yields `None`,
//! which disables neutralization for the invocation without aborting it.

use crate::config::{
    Settings, PLACEHOLDER_INITIAL_BACKOFF_MS, PLACEHOLDER_MAX_BACKOFF_MS, PLACEHOLDER_MAX_RETRIES,
};
use crate::error::AssetError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, info, warn};

/// Provides a local file to use as the replacement media
#[async_trait]
pub trait PlaceholderSource: Send + Sync {
    /// Path of a readable placeholder file, or `None` when unavailable
    async fn get_or_fetch(&self) -> Option<PathBuf>;
}

/// Placeholder that is downloaded on first use and cached on disk
pub struct CachedPlaceholder {
    http: reqwest::Client,
    url: String,
    cache_path: PathBuf,
    resolved: OnceCell<PathBuf>,
}

impl CachedPlaceholder {
    /// Create a provider for `url` cached at `cache_path`
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        url: impl Into<String>,
        cache_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            cache_path: cache_path.into(),
            resolved: OnceCell::new(),
        }
    }

    /// Create a provider from settings with a default HTTP client
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            reqwest::Client::new(),
            settings.placeholder_url.clone(),
            settings.placeholder_path.clone(),
        )
    }

    /// Where the placeholder is cached
    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    async fn resolve(&self) -> Result<PathBuf, AssetError> {
        if tokio::fs::try_exists(&self.cache_path).await? {
            debug!(path = %self.cache_path.display(), "Using cached placeholder");
            return Ok(self.cache_path.clone());
        }

        if let Some(dir) = self.cache_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let bytes = self.download().await?;
        tokio::fs::write(&self.cache_path, &bytes).await?;
        info!(
            path = %self.cache_path.display(),
            bytes = bytes.len(),
            "Placeholder downloaded"
        );
        Ok(self.cache_path.clone())
    }

    async fn download(&self) -> Result<Vec<u8>, AssetError> {
        let retry_strategy = ExponentialBackoff::from_millis(PLACEHOLDER_INITIAL_BACKOFF_MS)
            .max_delay(Duration::from_millis(PLACEHOLDER_MAX_BACKOFF_MS))
            .map(jitter)
            .take(PLACEHOLDER_MAX_RETRIES);

        Retry::spawn(retry_strategy, || async {
            let response = self.http.get(&self.url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(AssetError::Status(status.as_u16()));
            }
            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                return Err(AssetError::Empty);
            }
            Ok(bytes.to_vec())
        })
        .await
    }
}

#[async_trait]
impl PlaceholderSource for CachedPlaceholder {
    async fn get_or_fetch(&self) -> Option<PathBuf> {
        // Only successes are memoized so a later invocation can retry the download
        match self.resolved.get_or_try_init(|| self.resolve()).await {
            Ok(path) => Some(path.clone()),
            Err(e) => {
                warn!(
                    url = %self.url,
                    error = %e,
                    "Placeholder unavailable, media will not be neutralized"
                );
                None
            }
        }
    }
}

/// Placeholder backed by an existing local file
pub struct LocalPlaceholder(
    /// Path of the placeholder file
    pub PathBuf,
);

#[async_trait]
impl PlaceholderSource for LocalPlaceholder {
    async fn get_or_fetch(&self) -> Option<PathBuf> {
        match tokio::fs::try_exists(&self.0).await {
            Ok(true) => Some(self.0.clone()),
            _ => None,
        }
    }
}
