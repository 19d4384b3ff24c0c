use serde::{Deserialize, Serialize};

/// Telegram chat/channel id (numeric, negative for groups and channels).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChatId(pub i64);

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Telegram message id (numeric, ascending within a chat).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub i32);

impl MessageId {
    /// Sentinel for "never relayed" cursors.
    pub const ZERO: MessageId = MessageId(0);
}

/// A re-sendable reference to a media payload (by provider file id).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Animation,
    Audio,
}

/// The payload shapes a fetched message can take.
///
/// Anything that is neither text nor re-sendable media (service messages,
/// member joins, pins, caption-less stickers/polls) is a `SystemAction` and
/// never delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Text(String),
    Media {
        media: MediaRef,
        caption: Option<String>,
    },
    SystemAction,
}

/// A message fetched from a source endpoint, with the uniform surface the
/// engine and assembler work against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    /// Album/media-group key; messages sharing a key form one relay unit.
    pub group_key: Option<String>,
    /// Unix timestamp of the original message.
    pub timestamp: i64,
    pub silent: bool,
    pub kind: MessageKind,
}

impl ChatMessage {
    /// The visible text of the message (body text or media caption).
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::Text(t) => Some(t.as_str()),
            MessageKind::Media { caption, .. } => caption.as_deref(),
            MessageKind::SystemAction => None,
        }
    }

    pub fn media(&self) -> Option<&MediaRef> {
        match &self.kind {
            MessageKind::Media { media, .. } => Some(media),
            _ => None,
        }
    }

    pub fn is_system_action(&self) -> bool {
        matches!(self.kind, MessageKind::SystemAction)
    }
}

/// What the provider knows about an endpoint, as far as relaying cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointInfo {
    /// True for broadcast channels (not megagroups).
    pub is_channel: bool,
    /// The linked discussion chat hosting comment threads, if any.
    pub linked_discussion: Option<ChatId>,
}
