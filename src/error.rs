//! Error types for collaborator calls, placeholder acquisition and user input.

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use std::time::Duration;
use thiserror::Error;

/// `FLOOD_WAIT_30`, `FLOOD_PREMIUM_WAIT_5`, `SLOWMODE_WAIT_10`
static RE_FLOOD_CODE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?:FLOOD_WAIT|FLOOD_PREMIUM_WAIT|SLOWMODE_WAIT)_(\d+)");

/// "A wait of 30 seconds is required"
static RE_WAIT_SENTENCE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)a wait of (\d+) seconds? is required");

/// Errors returned by chat client operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Provider demands a cool-down before the same call may be repeated
    #[error("Rate limited: retry after {wait_secs}s")]
    RateLimited {
        /// Seconds to wait as signaled by the provider
        wait_secs: u64,
    },
    /// Any other remote failure (timeouts, server errors, rejected requests)
    #[error("Provider error: {0}")]
    Transient(String),
}

impl ChatError {
    /// Classify a raw provider error message.
    ///
    /// Flood markers with a number become [`ChatError::RateLimited`] with that
    /// number; a bare `FLOOD_WAIT` marker falls back to `default_wait`.
    #[must_use]
    pub fn from_provider_message(message: &str, default_wait: Duration) -> Self {
        let signaled = RE_FLOOD_CODE
            .captures(message)
            .or_else(|| RE_WAIT_SENTENCE.captures(message))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok());

        if let Some(wait_secs) = signaled {
            return Self::RateLimited { wait_secs };
        }
        if message.contains("FLOOD_WAIT") {
            return Self::RateLimited {
                wait_secs: default_wait.as_secs(),
            };
        }
        Self::Transient(message.to_string())
    }

    /// Re-read a [`ChatError::Transient`] message for flood markers.
    ///
    /// Clients that only surface raw provider text still get their rate limits
    /// honored; a bare marker waits `default_wait`.
    #[must_use]
    pub fn classified(self, default_wait: Duration) -> Self {
        match self {
            Self::Transient(message) => Self::from_provider_message(&message, default_wait),
            rate_limited @ Self::RateLimited { .. } => rate_limited,
        }
    }

    /// Signaled wait, if this is a rate-limit error
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { wait_secs } => Some(Duration::from_secs(*wait_secs)),
            Self::Transient(_) => None,
        }
    }

    /// Whether the provider asked to slow down
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl From<teloxide::RequestError> for ChatError {
    fn from(err: teloxide::RequestError) -> Self {
        match err {
            teloxide::RequestError::RetryAfter(seconds) => Self::RateLimited {
                wait_secs: u64::from(seconds.seconds()),
            },
            other => Self::Transient(other.to_string()),
        }
    }
}

/// Errors that can occur while obtaining the placeholder image
#[derive(Debug, Error)]
pub enum AssetError {
    /// Local file system failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Download failed at the transport level
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Server answered with a non-success status
    #[error("Unexpected status: {0}")]
    Status(u16),
    /// Server answered with an empty body
    #[error("Downloaded placeholder is empty")]
    Empty,
}

/// Rejected command arguments
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    /// No count was supplied
    #[error("missing message count")]
    Missing,
    /// The count is not an integer
    #[error("count must be a positive integer, got {0:?}")]
    NotANumber(String),
    /// The count is zero or negative
    #[error("count must be a positive integer, got {0}")]
    NotPositive(i64),
}
