//! Backward history pagination.
//!
//! [`HistoryScanner`] walks a chat from the newest message towards the oldest,
//! one page at a time, keeping only the caller's own messages. It stops when the
//! target is reached or when the provider returns an empty page. Errors never
//! escape: rate limits wait the signaled time and every other failure waits a
//! fixed backoff before the same page is requested again.

use crate::classify::CandidateMessage;
use crate::client::{ChatClient, ChatContext, HistoryMessage};
use crate::config::PipelineConfig;
use crate::error::InputError;
use crate::retry::{retry_forever, RetryPolicy};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Legacy count meaning "every message"
pub const ALL_SENTINEL: i64 = 999_999;

/// How many candidates the scan should collect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetCount {
    /// Stop once this many candidates were collected
    Finite(usize),
    /// Scan until the start of the chat
    All,
}

impl TargetCount {
    /// Target for a user request of `requested` messages.
    #[must_use]
    pub const fn from_requested(requested: usize, overshoot: usize) -> Self {
        Self::Finite(requested.saturating_add(overshoot))
    }

    /// Parse the command argument.
    ///
    /// Accepts a positive integer, `all`, or the legacy [`ALL_SENTINEL`].
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] for missing, non-numeric or non-positive counts.
    pub fn parse(arg: &str, overshoot: usize) -> Result<Self, InputError> {
        let arg = arg.trim();
        if arg.is_empty() {
            return Err(InputError::Missing);
        }
        if arg.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let count: i64 = arg
            .parse()
            .map_err(|_| InputError::NotANumber(arg.to_string()))?;
        if count <= 0 {
            return Err(InputError::NotPositive(count));
        }
        if count == ALL_SENTINEL {
            return Ok(Self::All);
        }
        let requested =
            usize::try_from(count).map_err(|_| InputError::NotANumber(arg.to_string()))?;
        Ok(Self::from_requested(requested, overshoot))
    }

    /// Whether `collected` candidates satisfy the target
    #[must_use]
    pub const fn is_reached(self, collected: usize) -> bool {
        match self {
            Self::Finite(n) => collected >= n,
            Self::All => false,
        }
    }
}

impl std::fmt::Display for TargetCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finite(n) => write!(f, "{n}"),
            Self::All => f.write_str("all"),
        }
    }
}

/// One history fetch, with the end of the chat made explicit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryPage {
    /// Non-empty page of messages, newest first
    Page(Vec<HistoryMessage>),
    /// The start of the chat was reached
    End,
}

impl From<Vec<HistoryMessage>> for HistoryPage {
    fn from(messages: Vec<HistoryMessage>) -> Self {
        if messages.is_empty() {
            Self::End
        } else {
            Self::Page(messages)
        }
    }
}

/// Scan state for one invocation.
///
/// `offset_id` only moves towards older messages, `seen_ids` and `collected`
/// only grow.
#[derive(Debug, Default)]
pub struct ScanCursor {
    offset_id: i32,
    seen_ids: HashSet<i32>,
    collected: Vec<CandidateMessage>,
}

impl ScanCursor {
    /// Id the next page must be older than (0 = newest)
    #[must_use]
    pub const fn offset_id(&self) -> i32 {
        self.offset_id
    }

    /// Candidates collected so far
    #[must_use]
    pub fn collected(&self) -> &[CandidateMessage] {
        &self.collected
    }

    /// Record the caller's unseen messages from `page` and move the cursor.
    ///
    /// Returns how many candidates were added.
    pub fn absorb(&mut self, page: &[HistoryMessage], self_id: i64) -> usize {
        let before = self.collected.len();

        for message in page {
            if message.author_id != Some(self_id) {
                continue;
            }
            let Some(candidate) = CandidateMessage::from_history(message) else {
                continue;
            };
            if self.seen_ids.insert(candidate.id) {
                self.collected.push(candidate);
            }
        }

        if let Some(oldest) = page.iter().map(|m| m.id).min() {
            self.offset_id = if self.offset_id == 0 {
                oldest
            } else {
                self.offset_id.min(oldest)
            };
        }

        self.collected.len() - before
    }

    /// Consume the cursor, trimming to a finite target.
    #[must_use]
    pub fn into_collected(self, target: TargetCount) -> Vec<CandidateMessage> {
        let mut collected = self.collected;
        if let TargetCount::Finite(n) = target {
            collected.truncate(n);
        }
        collected
    }
}

/// Paginates backward through a chat collecting the caller's messages
pub struct HistoryScanner<'a> {
    client: &'a dyn ChatClient,
    page_size: usize,
    page_delay: Duration,
    policy: RetryPolicy,
}

impl<'a> HistoryScanner<'a> {
    /// Create a scanner using the pipeline's paging parameters
    #[must_use]
    pub fn new(client: &'a dyn ChatClient, config: &PipelineConfig) -> Self {
        Self {
            client,
            page_size: config.page_size,
            page_delay: config.page_delay,
            policy: RetryPolicy::from(config),
        }
    }

    /// Collect up to `target` of `self_id`'s messages, newest first.
    #[instrument(skip_all, fields(chat_id = chat.id, target_count = %target))]
    pub async fn scan(
        &self,
        chat: &ChatContext,
        self_id: i64,
        target: TargetCount,
    ) -> Vec<CandidateMessage> {
        let client = self.client;
        let page_size = self.page_size;
        let mut cursor = ScanCursor::default();
        let mut page_no = 0usize;
        let mut examined = 0usize;

        info!("Scanning history");

        while !target.is_reached(cursor.collected().len()) {
            page_no += 1;
            let offset_id = cursor.offset_id();
            let messages = retry_forever(self.policy, "scan", move || {
                client.fetch_history(chat, page_size, offset_id)
            })
            .await;

            let page = match HistoryPage::from(messages) {
                HistoryPage::End => {
                    info!(examined, "Reached the start of the chat");
                    break;
                }
                HistoryPage::Page(page) => page,
            };

            examined += page.len();
            let added = cursor.absorb(&page, self_id);
            if added > 0 {
                info!(
                    page = page_no,
                    added,
                    total = cursor.collected().len(),
                    "Found own messages"
                );
            } else {
                debug!(page = page_no, "No own messages in page");
            }

            if target.is_reached(cursor.collected().len()) {
                info!(total = cursor.collected().len(), "Target reached");
                break;
            }

            tokio::time::sleep(self.page_delay).await;
        }

        cursor.into_collected(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MediaKind;
    use crate::error::ChatError;
    use crate::testing::{fast_config, message};
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    const ME: i64 = 42;
    const OTHER: i64 = 7;

    fn ids(candidates: &[CandidateMessage]) -> Vec<i32> {
        candidates.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_target_count_parse() {
        assert_eq!(TargetCount::parse("5", 2), Ok(TargetCount::Finite(7)));
        assert_eq!(TargetCount::parse(" 1 ", 2), Ok(TargetCount::Finite(3)));
        assert_eq!(TargetCount::parse("999999", 2), Ok(TargetCount::All));
        assert_eq!(TargetCount::parse("ALL", 2), Ok(TargetCount::All));
        assert_eq!(TargetCount::parse("", 2), Err(InputError::Missing));
        assert_eq!(TargetCount::parse("0", 2), Err(InputError::NotPositive(0)));
        assert_eq!(TargetCount::parse("-3", 2), Err(InputError::NotPositive(-3)));
        assert_eq!(
            TargetCount::parse("ten", 2),
            Err(InputError::NotANumber("ten".to_string()))
        );
    }

    #[test]
    fn test_author_filter_keeps_only_own_messages() {
        let page: Vec<HistoryMessage> = (1..=10)
            .rev()
            .map(|id| message(id, if id % 3 == 0 || id == 10 { ME } else { OTHER }, None))
            .collect();
        let mut cursor = ScanCursor::default();

        assert_eq!(cursor.absorb(&page, ME), 4);
        assert_eq!(ids(cursor.collected()), vec![10, 9, 6, 3]);
        assert_eq!(cursor.offset_id(), 1);
    }

    #[test]
    fn test_cursor_never_moves_forward() {
        let mut cursor = ScanCursor::default();
        cursor.absorb(&[message(50, ME, None), message(40, ME, None)], ME);
        cursor.absorb(&[message(45, ME, None), message(44, OTHER, None)], ME);
        assert_eq!(cursor.offset_id(), 40);
        assert_eq!(ids(cursor.collected()), vec![50, 40, 45]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_chat_ends_after_first_fetch() {
        let mut client = crate::client::MockChatClient::new();
        client
            .expect_fetch_history()
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));

        let config = fast_config();
        let scanner = HistoryScanner::new(&client, &config);
        let chat = ChatContext::new(1, crate::client::ChatKind::Private);

        assert!(scanner.scan(&chat, ME, TargetCount::All).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_pages_are_deduplicated() {
        let mut client = crate::client::MockChatClient::new();
        let offsets = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&offsets);
        client
            .expect_fetch_history()
            .returning(move |_, limit, before_id| {
                assert_eq!(limit, 100);
                let mut log = seen.lock().expect("offset log poisoned");
                log.push(before_id);
                Ok(match log.len() {
                    1 => vec![
                        message(30, ME, None),
                        message(29, OTHER, None),
                        message(28, ME, None),
                    ],
                    // Provider returned an overlapping page
                    2 => vec![message(28, ME, None), message(27, ME, Some(MediaKind::Photo))],
                    3 => vec![
                        message(27, ME, None),
                        message(26, OTHER, None),
                        message(25, ME, None),
                    ],
                    _ => Vec::new(),
                })
            });

        let config = fast_config();
        let scanner = HistoryScanner::new(&client, &config);
        let chat = ChatContext::new(1, crate::client::ChatKind::Group);
        let found = scanner.scan(&chat, ME, TargetCount::All).await;

        assert_eq!(ids(&found), vec![30, 28, 27, 25]);
        assert!(found[2].has_removable_media);
        assert_eq!(
            *offsets.lock().expect("offset log poisoned"),
            vec![0, 28, 27, 25]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_finite_target_stops_early_and_truncates() {
        let mut client = crate::client::MockChatClient::new();
        client
            .expect_fetch_history()
            .times(1)
            .returning(|_, _, _| Ok((1..=10).rev().map(|id| message(id, ME, None)).collect()));

        let config = fast_config();
        let scanner = HistoryScanner::new(&client, &config);
        let chat = ChatContext::new(1, crate::client::ChatKind::Private);
        let found = scanner
            .scan(&chat, ME, TargetCount::from_requested(3, 2))
            .await;

        assert_eq!(ids(&found), vec![10, 9, 8, 7, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_retry_the_same_page() {
        let mut client = crate::client::MockChatClient::new();
        let mut seq = mockall::Sequence::new();
        client
            .expect_fetch_history()
            .withf(|_, _, before_id| *before_id == 0)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(ChatError::RateLimited { wait_secs: 3 }));
        client
            .expect_fetch_history()
            .withf(|_, _, before_id| *before_id == 0)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(ChatError::Transient("timeout".to_string())));
        client
            .expect_fetch_history()
            .withf(|_, _, before_id| *before_id == 0)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![message(5, ME, None), message(4, ME, None)]));
        client
            .expect_fetch_history()
            .withf(|_, _, before_id| *before_id == 4)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(Vec::new()));

        let config = fast_config();
        let scanner = HistoryScanner::new(&client, &config);
        let chat = ChatContext::new(1, crate::client::ChatKind::Private);
        let found = scanner.scan(&chat, ME, TargetCount::All).await;

        assert_eq!(ids(&found), vec![5, 4]);
    }

    /// Mock serving one own message per page below `first`, then the end of the chat.
    fn paged_client(first: i32, pages: i32) -> crate::client::MockChatClient {
        let mut client = crate::client::MockChatClient::new();
        client
            .expect_fetch_history()
            .returning(move |_, _, before_id| {
                let id = if before_id == 0 { first } else { before_id - 1 };
                Ok(if id > first - pages {
                    vec![message(id, ME, None)]
                } else {
                    Vec::new()
                })
            });
        client
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_between_pages_but_not_after_the_last() {
        let config = PipelineConfig {
            page_delay: Duration::from_secs(2),
            ..fast_config()
        };
        let client = paged_client(10, 3);
        let chat = ChatContext::new(1, crate::client::ChatKind::Private);

        let start = tokio::time::Instant::now();
        let found = HistoryScanner::new(&client, &config)
            .scan(&chat, ME, TargetCount::All)
            .await;

        assert_eq!(ids(&found), vec![10, 9, 8]);
        // Three pages, then the empty page ends the scan without a pause
        assert_eq!(start.elapsed(), Duration::from_secs(2 * 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pause_after_target_is_reached() {
        let config = PipelineConfig {
            page_delay: Duration::from_secs(2),
            ..fast_config()
        };
        let client = paged_client(10, 5);
        let chat = ChatContext::new(1, crate::client::ChatKind::Private);

        let start = tokio::time::Instant::now();
        let found = HistoryScanner::new(&client, &config)
            .scan(&chat, ME, TargetCount::Finite(2))
            .await;

        assert_eq!(ids(&found), vec![10, 9]);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    proptest! {
        #[test]
        fn absorbed_ids_are_unique(pages in proptest::collection::vec(
            proptest::collection::vec((1i32..200, proptest::bool::ANY), 0..30),
            0..10,
        )) {
            let mut cursor = ScanCursor::default();
            for page in &pages {
                let page: Vec<HistoryMessage> = page
                    .iter()
                    .map(|(id, mine)| message(*id, if *mine { ME } else { OTHER }, None))
                    .collect();
                cursor.absorb(&page, ME);
            }
            let collected = ids(cursor.collected());
            let unique: HashSet<i32> = collected.iter().copied().collect();
            prop_assert_eq!(unique.len(), collected.len());
        }
    }
}
