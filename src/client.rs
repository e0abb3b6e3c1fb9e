//! Chat client contracts consumed by the pipeline
//!
//! The pipeline only talks to a [`ChatClient`]. Any Telegram client that can list
//! history, upload a file, edit and delete messages can back it.
//! [`TelegramBotClient`] adapts a teloxide [`Bot`] for everything the Bot API
//! exposes and delegates history listing to a [`HistorySource`].

use crate::error::ChatError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use teloxide::prelude::*;
use teloxide::types::{InputFile, InputMedia, InputMediaPhoto, MessageId, UserId};
use tracing::debug;

/// Kind of conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// One-to-one dialog
    Private,
    /// Group or supergroup
    Group,
    /// Broadcast channel
    Channel,
}

/// Target conversation of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatContext {
    /// Provider chat id
    pub id: i64,
    /// Conversation kind
    pub kind: ChatKind,
}

impl ChatContext {
    /// Create a new chat context
    #[must_use]
    pub const fn new(id: i64, kind: ChatKind) -> Self {
        Self { id, kind }
    }
}

/// Media attached to a history message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Photo
    Photo,
    /// Video
    Video,
    /// Generic file
    Document,
    /// Music track
    Audio,
    /// Voice note
    Voice,
    /// Sticker
    Sticker,
    /// GIF animation
    Animation,
    /// Link preview
    WebPage,
    /// Anything else the provider can attach
    Other,
}

impl MediaKind {
    /// Link previews carry no payload worth overwriting
    #[must_use]
    pub const fn is_removable(self) -> bool {
        !matches!(self, Self::WebPage)
    }
}

/// One message as returned by a history page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    /// Message id, strictly increasing over the chat's lifetime
    pub id: i32,
    /// Sender id; service messages may have none
    pub author_id: Option<i64>,
    /// Attached media, if any
    pub media: Option<MediaKind>,
}

/// Opaque reference to an uploaded media payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaHandle {
    /// File on the local disk, sent with the edit request
    LocalFile(PathBuf),
    /// File already transferred to the provider in parts
    Uploaded {
        /// Provider-side file id
        id: i64,
        /// Number of uploaded parts
        parts: i32,
        /// File name
        name: String,
    },
}

/// Role of a user inside a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantRole {
    /// Chat owner
    Creator,
    /// Administrator
    Admin,
    /// Regular or restricted member
    Member,
}

impl ParticipantRole {
    /// Whether the role carries administrative rights
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Creator | Self::Admin)
    }
}

/// Remote operations the pipeline depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Fetch up to `limit` messages older than `before_id`, newest first.
    ///
    /// `before_id == 0` starts from the newest message. An empty result means
    /// the start of the chat was reached.
    async fn fetch_history(
        &self,
        chat: &ChatContext,
        limit: usize,
        before_id: i32,
    ) -> Result<Vec<HistoryMessage>, ChatError>;

    /// Upload a local file as a new media payload
    async fn upload_file(&self, path: &Path) -> Result<MediaHandle, ChatError>;

    /// Replace a message's text and media
    async fn edit_message_media(
        &self,
        chat: &ChatContext,
        message_id: i32,
        text: &str,
        media: MediaHandle,
    ) -> Result<(), ChatError>;

    /// Delete messages, returning how many the provider removed
    async fn delete_messages(
        &self,
        chat: &ChatContext,
        ids: &[i32],
        revoke: bool,
    ) -> Result<usize, ChatError>;

    /// Look up a user's role in a chat
    async fn participant_role(
        &self,
        chat: &ChatContext,
        user_id: i64,
    ) -> Result<ParticipantRole, ChatError>;
}

/// Source of chat history for clients that cannot list it themselves
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Same contract as [`ChatClient::fetch_history`]
    async fn fetch(
        &self,
        chat: &ChatContext,
        limit: usize,
        before_id: i32,
    ) -> Result<Vec<HistoryMessage>, ChatError>;
}

/// [`ChatClient`] backed by the Telegram Bot API
pub struct TelegramBotClient<H> {
    bot: Bot,
    history: H,
}

impl<H: HistorySource> TelegramBotClient<H> {
    /// Wrap a bot and a history source
    #[must_use]
    pub const fn new(bot: Bot, history: H) -> Self {
        Self { bot, history }
    }
}

#[async_trait]
impl<H: HistorySource> ChatClient for TelegramBotClient<H> {
    async fn fetch_history(
        &self,
        chat: &ChatContext,
        limit: usize,
        before_id: i32,
    ) -> Result<Vec<HistoryMessage>, ChatError> {
        self.history.fetch(chat, limit, before_id).await
    }

    // The Bot API uploads as part of the edit request
    async fn upload_file(&self, path: &Path) -> Result<MediaHandle, ChatError> {
        tokio::fs::metadata(path)
            .await
            .map_err(|e| ChatError::Transient(format!("placeholder unreadable: {e}")))?;
        Ok(MediaHandle::LocalFile(path.to_path_buf()))
    }

    async fn edit_message_media(
        &self,
        chat: &ChatContext,
        message_id: i32,
        text: &str,
        media: MediaHandle,
    ) -> Result<(), ChatError> {
        let MediaHandle::LocalFile(path) = media else {
            return Err(ChatError::Transient(
                "Bot API cannot reference pre-uploaded parts".to_string(),
            ));
        };

        let mut photo = InputMediaPhoto::new(InputFile::file(path));
        if !text.is_empty() {
            photo = photo.caption(text);
        }
        self.bot
            .edit_message_media(ChatId(chat.id), MessageId(message_id), InputMedia::Photo(photo))
            .await?;
        Ok(())
    }

    async fn delete_messages(
        &self,
        chat: &ChatContext,
        ids: &[i32],
        revoke: bool,
    ) -> Result<usize, ChatError> {
        // Bot deletions are always visible to every participant
        if !revoke {
            debug!(chat_id = chat.id, "Bot API ignores revoke=false");
        }
        self.bot
            .delete_messages(ChatId(chat.id), ids.iter().copied().map(MessageId))
            .await?;
        Ok(ids.len())
    }

    async fn participant_role(
        &self,
        chat: &ChatContext,
        user_id: i64,
    ) -> Result<ParticipantRole, ChatError> {
        let user = u64::try_from(user_id)
            .map_err(|_| ChatError::Transient(format!("invalid user id {user_id}")))?;
        let member = self.bot.get_chat_member(ChatId(chat.id), UserId(user)).await?;

        Ok(if member.is_owner() {
            ParticipantRole::Creator
        } else if member.is_administrator() {
            ParticipantRole::Admin
        } else {
            ParticipantRole::Member
        })
    }
}
