//! Candidate messages and the media / plain split.

use crate::client::HistoryMessage;

/// A message selected for deletion in one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateMessage {
    /// Message id, the deduplication key
    pub id: i32,
    /// Author of the message (always the caller)
    pub author_id: i64,
    /// Carries media that must be overwritten before deletion
    pub has_removable_media: bool,
}

impl CandidateMessage {
    /// Build a candidate from a history entry.
    ///
    /// Returns `None` for messages without an author.
    #[must_use]
    pub fn from_history(message: &HistoryMessage) -> Option<Self> {
        Some(Self {
            id: message.id,
            author_id: message.author_id?,
            has_removable_media: message.media.is_some_and(|kind| kind.is_removable()),
        })
    }
}

/// Candidates split by whether they need neutralization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Messages carrying non-preview media
    pub media: Vec<CandidateMessage>,
    /// Everything else
    pub plain: Vec<CandidateMessage>,
}

/// Split candidates into media and plain, keeping discovery order.
#[must_use]
pub fn partition(candidates: &[CandidateMessage]) -> Partition {
    let (media, plain) = candidates
        .iter()
        .copied()
        .partition(|candidate| candidate.has_removable_media);
    Partition { media, plain }
}
