//! Batched revoke deletion.
//!
//! Batches are sent strictly one after another. A rate-limited batch is
//! re-issued after the signaled wait until it goes through; any other failure
//! is logged, backed off and the batch is skipped so a single bad batch cannot
//! stall the run forever.

use crate::client::{ChatClient, ChatContext};
use crate::config::PipelineConfig;
use crate::retry::{retry_rate_limited, RetryPolicy};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Deletes message ids in fixed-size sequential batches
pub struct BatchDeleter<'a> {
    client: &'a dyn ChatClient,
    batch_size: usize,
    batch_delay: Duration,
    policy: RetryPolicy,
}

impl<'a> BatchDeleter<'a> {
    /// Create a deleter using the pipeline's batch parameters
    #[must_use]
    pub fn new(client: &'a dyn ChatClient, config: &PipelineConfig) -> Self {
        Self {
            client,
            batch_size: config.delete_batch_size.max(1),
            batch_delay: config.batch_delay,
            policy: RetryPolicy::from(config),
        }
    }

    /// Delete `ids` for everyone, returning the number the provider confirmed.
    #[instrument(skip_all, fields(chat_id = chat.id, total = ids.len()))]
    pub async fn delete_all(&self, chat: &ChatContext, ids: &[i32]) -> usize {
        let client = self.client;
        let mut deleted = 0usize;

        for (index, batch) in ids.chunks(self.batch_size).enumerate() {
            let batch_no = index + 1;
            let outcome = retry_rate_limited(self.policy, "delete", move || {
                client.delete_messages(chat, batch, true)
            })
            .await;

            match outcome {
                Ok(removed) => {
                    deleted += removed;
                    info!(
                        batch = batch_no,
                        removed,
                        progress = %format!("{deleted}/{}", ids.len()),
                        "Batch deleted"
                    );
                    tokio::time::sleep(self.batch_delay).await;
                }
                Err(e) => {
                    warn!(
                        batch = batch_no,
                        size = batch.len(),
                        error = %e,
                        "Batch delete failed, skipping"
                    );
                    tokio::time::sleep(self.policy.error_backoff).await;
                }
            }
        }

        info!(deleted, "Deletion finished");
        deleted
    }
}
