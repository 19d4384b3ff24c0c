//! The per-endpoint message log backing the transport port's history reads.
//!
//! The Bot API has no "fetch chat history" call, so the adapter buffers every
//! channel post and group message the dispatcher sees, keyed by endpoint, and
//! serves `fetch_oldest` / `fetch_since` from that buffer. The buffer is
//! bounded per endpoint; ids the engine has already relayed are pruned.

use std::collections::{BTreeMap, HashMap};

use teloxide::types::Message;
use tokio::sync::Mutex;

use teleport_core::domain::{
    ChatId, ChatMessage, MediaKind, MediaRef, MessageId, MessageKind,
};

pub struct MessageLog {
    capacity: usize,
    inner: Mutex<HashMap<i64, BTreeMap<i32, ChatMessage>>>,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Record an update seen by the dispatcher.
    pub async fn observe(&self, msg: &Message) {
        self.record(ChatId(msg.chat.id.0), observed_message(msg))
            .await;
    }

    pub async fn record(&self, endpoint: ChatId, message: ChatMessage) {
        let mut map = self.inner.lock().await;
        let log = map.entry(endpoint.0).or_default();
        log.insert(message.id.0, message);
        // Oldest entries give way once the buffer is full.
        while log.len() > self.capacity {
            log.pop_first();
        }
    }

    pub async fn oldest(&self, endpoint: ChatId, limit: usize) -> Vec<ChatMessage> {
        let map = self.inner.lock().await;
        map.get(&endpoint.0)
            .map(|log| log.values().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub async fn since(&self, endpoint: ChatId, min_id: MessageId, limit: usize) -> Vec<ChatMessage> {
        let map = self.inner.lock().await;
        map.get(&endpoint.0)
            .map(|log| {
                log.range(min_id.0 + 1..)
                    .take(limit)
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Convert a raw Telegram message into the tagged core model.
///
/// Anything that is neither text nor re-sendable media (service messages,
/// stickers, polls, joins) maps to `SystemAction`, which the engine skips.
pub fn observed_message(msg: &Message) -> ChatMessage {
    let caption = msg.caption().map(str::to_string);

    let media = if let Some(photos) = msg.photo() {
        // Largest size last; that is the one worth re-sending.
        photos.last().map(|p| MediaRef {
            kind: MediaKind::Photo,
            file_id: p.file.id.clone(),
        })
    } else if let Some(video) = msg.video() {
        Some(MediaRef {
            kind: MediaKind::Video,
            file_id: video.file.id.clone(),
        })
    } else if let Some(animation) = msg.animation() {
        Some(MediaRef {
            kind: MediaKind::Animation,
            file_id: animation.file.id.clone(),
        })
    } else if let Some(document) = msg.document() {
        Some(MediaRef {
            kind: MediaKind::Document,
            file_id: document.file.id.clone(),
        })
    } else if let Some(audio) = msg.audio() {
        Some(MediaRef {
            kind: MediaKind::Audio,
            file_id: audio.file.id.clone(),
        })
    } else {
        None
    };

    let kind = match (msg.text(), media) {
        (Some(text), _) => MessageKind::Text(text.to_string()),
        (None, Some(media)) => MessageKind::Media { media, caption },
        (None, None) => MessageKind::SystemAction,
    };

    ChatMessage {
        id: MessageId(msg.id.0),
        group_key: msg.media_group_id().map(str::to_string),
        timestamp: msg.date.timestamp(),
        // The Bot API does not expose the sender's silent flag on incoming
        // messages; relayed copies always notify.
        silent: false,
        kind,
    }
}
