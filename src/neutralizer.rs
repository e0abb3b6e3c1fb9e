//! Media neutralization.
//!
//! Deleting a message does not scrub media that recipients' clients already
//! cached, so media messages are first edited to carry a placeholder image.
//! All edits run concurrently and are joined as a group; a failed edit only
//! lowers the returned count.

use crate::classify::CandidateMessage;
use crate::client::{ChatClient, ChatContext};
use crate::config::PipelineConfig;
use crate::error::ChatError;
use crate::retry::{retry_rate_limited, RetryPolicy};
use futures_util::future::join_all;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Overwrites media messages with a placeholder image
pub struct MediaNeutralizer<'a> {
    client: &'a dyn ChatClient,
    policy: RetryPolicy,
    settle: Duration,
}

impl<'a> MediaNeutralizer<'a> {
    /// Create a neutralizer using the pipeline's retry parameters
    #[must_use]
    pub fn new(client: &'a dyn ChatClient, config: &PipelineConfig) -> Self {
        Self {
            client,
            policy: RetryPolicy::from(config),
            settle: config.edit_settle,
        }
    }

    /// Replace every candidate's media with `placeholder`.
    ///
    /// Returns the number of successful edits. Without a readable placeholder
    /// nothing is edited.
    #[instrument(skip_all, fields(chat_id = chat.id, candidates = candidates.len()))]
    pub async fn neutralize(
        &self,
        chat: &ChatContext,
        candidates: &[CandidateMessage],
        placeholder: Option<&Path>,
    ) -> usize {
        let Some(path) = placeholder else {
            warn!("No placeholder available, skipping media neutralization");
            return 0;
        };
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            warn!(
                path = %path.display(),
                "Placeholder file is missing, skipping media neutralization"
            );
            return 0;
        }
        if candidates.is_empty() {
            return 0;
        }

        let edits = candidates
            .iter()
            .map(|candidate| self.neutralize_one(chat, candidate.id, path));
        let edited = join_all(edits).await.into_iter().filter(|ok| *ok).count();
        info!(edited, total = candidates.len(), "Media neutralization finished");

        // Let edits propagate before the messages disappear
        tokio::time::sleep(self.settle).await;
        edited
    }

    async fn neutralize_one(&self, chat: &ChatContext, message_id: i32, path: &Path) -> bool {
        match self.replace_media(chat, message_id, path).await {
            Ok(()) => {
                debug!(message_id, "Media replaced");
                true
            }
            Err(e) => {
                warn!(message_id, error = %e, "Failed to replace media");
                false
            }
        }
    }

    async fn replace_media(
        &self,
        chat: &ChatContext,
        message_id: i32,
        path: &Path,
    ) -> Result<(), ChatError> {
        let client = self.client;
        let media =
            retry_rate_limited(self.policy, "upload", move || client.upload_file(path)).await?;
        retry_rate_limited(self.policy, "edit", move || {
            client.edit_message_media(chat, message_id, "", media.clone())
        })
        .await
    }
}
