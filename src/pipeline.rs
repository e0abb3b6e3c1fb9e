//! End-to-end DME run: scan, classify, neutralize, delete.

use crate::classify::partition;
use crate::client::{ChatClient, ChatContext, ChatKind};
use crate::config::PipelineConfig;
use crate::deleter::BatchDeleter;
use crate::error::InputError;
use crate::neutralizer::MediaNeutralizer;
use crate::placeholder::PlaceholderSource;
use crate::scanner::{HistoryScanner, TargetCount};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Counters reported after a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingResult {
    /// Messages the provider confirmed as deleted
    pub deleted_count: usize,
    /// Messages submitted for deletion
    pub candidate_count: usize,
    /// Media messages successfully overwritten
    pub edited_count: usize,
}

/// Runs the DME pipeline against one chat client
pub struct DmeRunner {
    client: Arc<dyn ChatClient>,
    placeholder: Arc<dyn PlaceholderSource>,
    config: PipelineConfig,
}

impl DmeRunner {
    /// Create a runner
    #[must_use]
    pub fn new(
        client: Arc<dyn ChatClient>,
        placeholder: Arc<dyn PlaceholderSource>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            placeholder,
            config,
        }
    }

    /// Pipeline parameters in use
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle a `dme <count>` command.
    ///
    /// The argument is validated before anything is sent to the provider. The
    /// command message itself is removed on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] when `arg` is not a positive count or `all`.
    pub async fn run_command(
        &self,
        chat: &ChatContext,
        self_id: i64,
        command_message_id: Option<i32>,
        arg: &str,
    ) -> Result<ProcessingResult, InputError> {
        let target = TargetCount::parse(arg, self.config.target_overshoot)?;

        if let Some(message_id) = command_message_id {
            self.remove_command_message(chat, message_id).await;
        }

        Ok(self.run(chat, self_id, target).await)
    }

    /// Run the pipeline for an already validated target.
    #[instrument(skip_all, fields(chat_id = chat.id, target_count = %target))]
    pub async fn run(
        &self,
        chat: &ChatContext,
        self_id: i64,
        target: TargetCount,
    ) -> ProcessingResult {
        let started = Instant::now();
        info!("DME task started");

        if chat.kind == ChatKind::Channel {
            self.log_channel_rights(chat, self_id).await;
        }

        let client = self.client.as_ref();
        let candidates = HistoryScanner::new(client, &self.config)
            .scan(chat, self_id, target)
            .await;
        if candidates.is_empty() {
            info!("No messages to process");
            return ProcessingResult::default();
        }

        let split = partition(&candidates);
        info!(
            total = candidates.len(),
            media = split.media.len(),
            plain = split.plain.len(),
            "Processing messages"
        );

        let edited_count = if split.media.is_empty() {
            0
        } else {
            let asset = self.placeholder.get_or_fetch().await;
            MediaNeutralizer::new(client, &self.config)
                .neutralize(chat, &split.media, asset.as_deref())
                .await
        };

        let ids: Vec<i32> = candidates.iter().map(|c| c.id).collect();
        let deleted_count = BatchDeleter::new(client, &self.config)
            .delete_all(chat, &ids)
            .await;

        let result = ProcessingResult {
            deleted_count,
            candidate_count: ids.len(),
            edited_count,
        };
        info!(
            elapsed_secs = started.elapsed().as_secs(),
            deleted = result.deleted_count,
            candidates = result.candidate_count,
            edited = result.edited_count,
            "DME task finished"
        );
        result
    }

    async fn remove_command_message(&self, chat: &ChatContext, message_id: i32) {
        if let Err(e) = self
            .client
            .delete_messages(chat, &[message_id], true)
            .await
        {
            debug!(message_id, error = %e, "Could not delete command message");
        }
    }

    // Admin rights never widen the scope: only own messages are deleted
    async fn log_channel_rights(&self, chat: &ChatContext, self_id: i64) {
        match self.client.participant_role(chat, self_id).await {
            Ok(role) if role.is_admin() => {
                info!(?role, "Channel admin rights present, still deleting own messages only");
            }
            Ok(role) => info!(?role, "No channel admin rights"),
            Err(e) => warn!(error = %e, "Channel rights lookup failed"),
        }
    }
}
