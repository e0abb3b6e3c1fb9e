#![deny(missing_docs)]
//! DME ("delete my messages") agent library.
//!
//! Finds the caller's own messages in a chat, overwrites media messages with a
//! placeholder so cached copies cannot be recovered, then revoke-deletes
//! everything in paced batches.

/// Message classification into media and plain candidates.
pub mod classify;
/// Chat client contracts and the teloxide adapter.
pub mod client;
/// Configuration management.
pub mod config;
/// Batched message deletion.
pub mod deleter;
/// Error types.
pub mod error;
/// Media neutralization before deletion.
pub mod neutralizer;
/// Orchestration of the full pipeline.
pub mod pipeline;
/// Placeholder asset acquisition and caching.
pub mod placeholder;
/// Rate-limit aware retry helpers.
pub mod retry;
/// Backward history pagination.
pub mod scanner;

pub use classify::{partition, CandidateMessage, Partition};
pub use client::{ChatClient, ChatContext, ChatKind, HistoryMessage, MediaHandle, MediaKind};
pub use config::{PipelineConfig, Settings};
pub use error::{AssetError, ChatError, InputError};
pub use pipeline::{DmeRunner, ProcessingResult};
pub use scanner::TargetCount;

#[cfg(test)]
pub mod testing;
