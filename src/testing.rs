//! Testing helpers shared by the unit tests.
//!
//! Provides fixtures for history messages and candidates, a pipeline config
//! without real pacing, and scratch files for the placeholder image.

use crate::classify::CandidateMessage;
use crate::client::{HistoryMessage, MediaKind};
use crate::config::PipelineConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Pipeline config with short pacing; tests still run on a paused clock.
#[must_use]
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        page_delay: Duration::from_millis(10),
        batch_delay: Duration::from_millis(10),
        edit_settle: Duration::from_millis(10),
        ..PipelineConfig::default()
    }
}

/// History message authored by `author_id`.
#[must_use]
pub const fn message(id: i32, author_id: i64, media: Option<MediaKind>) -> HistoryMessage {
    HistoryMessage {
        id,
        author_id: Some(author_id),
        media,
    }
}

/// Candidate with or without removable media.
#[must_use]
pub const fn candidate(id: i32, has_removable_media: bool) -> CandidateMessage {
    CandidateMessage {
        id,
        author_id: 1,
        has_removable_media,
    }
}

/// Unique path under the system temp directory; the file is not created.
#[must_use]
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("dme-test-{}", uuid::Uuid::new_v4()))
        .join(name)
}

/// Write a small placeholder image to a fresh temp path.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub async fn placeholder_file(name: &str) -> PathBuf {
    let path = temp_path(name);
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .expect("create placeholder dir");
    }
    tokio::fs::write(&path, b"\xFF\xD8\xFF\xE0placeholder")
        .await
        .expect("write placeholder");
    path
}

/// Install a test subscriber honoring `RUST_LOG`; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
