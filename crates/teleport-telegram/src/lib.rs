//! Telegram adapter (teloxide).
//!
//! This crate implements the `teleport-core` transport port over the Telegram
//! Bot API and hosts the update router plus the operator command handlers.

use std::sync::Arc;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        Chat, ChatKind, InputFile, InputMedia, InputMediaAudio, InputMediaDocument,
        InputMediaPhoto, InputMediaVideo, PublicChatKind,
    },
    RequestError,
};

pub mod commands;
pub mod ingest;
pub mod router;

use teleport_core::{
    assembler::{AlbumUnit, RelayUnit},
    domain::{ChatId, ChatMessage, EndpointInfo, MediaKind, MessageId},
    errors::Error,
    ports::{SendOutcome, TransportPort},
    Result,
};

use crate::ingest::MessageLog;

/// Transport port over a bot client plus the ingest log.
///
/// History reads come from the log (the Bot API cannot page through chat
/// history); sends go straight to the API, with `RetryAfter` surfaced as a
/// typed rate-limit outcome instead of an error.
#[derive(Clone)]
pub struct BotTransport {
    bot: Bot,
    log: Arc<MessageLog>,
}

impl BotTransport {
    pub fn new(bot: Bot, log: Arc<MessageLog>) -> Self {
        Self { bot, log }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn outcome<T>(res: std::result::Result<T, RequestError>) -> Result<SendOutcome> {
        match res {
            Ok(_) => Ok(SendOutcome::Delivered),
            Err(RequestError::RetryAfter(wait)) => Ok(SendOutcome::RateLimited(wait)),
            Err(e) => Ok(SendOutcome::Failed(e.to_string())),
        }
    }

    async fn send_standalone(&self, target: ChatId, message: &ChatMessage) -> Result<SendOutcome> {
        let chat = Self::tg_chat(target);
        let caption = message.text().map(str::to_string);

        let Some(media) = message.media() else {
            let mut req = self
                .bot
                .send_message(chat, caption.unwrap_or_default());
            if message.silent {
                req = req.disable_notification(true);
            }
            return Self::outcome(req.await);
        };

        let file = InputFile::file_id(media.file_id.clone());
        match media.kind {
            MediaKind::Photo => {
                let mut req = self.bot.send_photo(chat, file);
                if let Some(c) = caption {
                    req = req.caption(c);
                }
                if message.silent {
                    req = req.disable_notification(true);
                }
                Self::outcome(req.await)
            }
            MediaKind::Video => {
                let mut req = self.bot.send_video(chat, file);
                if let Some(c) = caption {
                    req = req.caption(c);
                }
                if message.silent {
                    req = req.disable_notification(true);
                }
                Self::outcome(req.await)
            }
            MediaKind::Animation => {
                let mut req = self.bot.send_animation(chat, file);
                if let Some(c) = caption {
                    req = req.caption(c);
                }
                if message.silent {
                    req = req.disable_notification(true);
                }
                Self::outcome(req.await)
            }
            MediaKind::Document => {
                let mut req = self.bot.send_document(chat, file);
                if let Some(c) = caption {
                    req = req.caption(c);
                }
                if message.silent {
                    req = req.disable_notification(true);
                }
                Self::outcome(req.await)
            }
            MediaKind::Audio => {
                let mut req = self.bot.send_audio(chat, file);
                if let Some(c) = caption {
                    req = req.caption(c);
                }
                if message.silent {
                    req = req.disable_notification(true);
                }
                Self::outcome(req.await)
            }
        }
    }

    async fn send_album(&self, target: ChatId, album: &AlbumUnit) -> Result<SendOutcome> {
        let mut req = self
            .bot
            .send_media_group(Self::tg_chat(target), album_media(album));
        if album.silent() {
            req = req.disable_notification(true);
        }
        Self::outcome(req.await)
    }
}

/// Build the media-group payload, with the album caption on the first item.
fn album_media(album: &AlbumUnit) -> Vec<InputMedia> {
    let caption = album.caption().map(str::to_string);
    let mut first = true;

    album
        .media()
        .into_iter()
        .map(|m| {
            let file = InputFile::file_id(m.file_id.clone());
            let cap = if first { caption.clone() } else { None };
            first = false;

            match m.kind {
                MediaKind::Photo => {
                    let mut media = InputMediaPhoto::new(file);
                    if let Some(c) = cap {
                        media = media.caption(c);
                    }
                    InputMedia::Photo(media)
                }
                MediaKind::Video => {
                    let mut media = InputMediaVideo::new(file);
                    if let Some(c) = cap {
                        media = media.caption(c);
                    }
                    InputMedia::Video(media)
                }
                MediaKind::Audio => {
                    let mut media = InputMediaAudio::new(file);
                    if let Some(c) = cap {
                        media = media.caption(c);
                    }
                    InputMedia::Audio(media)
                }
                // Media groups cannot carry animations; re-send as documents.
                MediaKind::Document | MediaKind::Animation => {
                    let mut media = InputMediaDocument::new(file);
                    if let Some(c) = cap {
                        media = media.caption(c);
                    }
                    InputMedia::Document(media)
                }
            }
        })
        .collect()
}

/// The linked discussion chat of a broadcast channel, if the provider
/// reports one.
fn linked_discussion(chat: &Chat) -> Option<ChatId> {
    if let ChatKind::Public(public) = &chat.kind {
        if let PublicChatKind::Channel(channel) = &public.kind {
            return channel.linked_chat_id.map(ChatId);
        }
    }
    None
}

#[async_trait]
impl TransportPort for BotTransport {
    async fn fetch_oldest(&self, endpoint: ChatId, limit: usize) -> Result<Vec<ChatMessage>> {
        Ok(self.log.oldest(endpoint, limit).await)
    }

    async fn fetch_since(
        &self,
        endpoint: ChatId,
        min_id: MessageId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        Ok(self.log.since(endpoint, min_id, limit).await)
    }

    async fn resolve_endpoint(&self, endpoint: ChatId) -> Result<EndpointInfo> {
        let chat = self
            .bot
            .get_chat(Self::tg_chat(endpoint))
            .await
            .map_err(|e| Error::Transport(format!("get_chat({}): {e}", endpoint.0)))?;

        Ok(EndpointInfo {
            is_channel: chat.is_channel(),
            linked_discussion: linked_discussion(&chat),
        })
    }

    async fn send(&self, target: ChatId, unit: &RelayUnit) -> Result<SendOutcome> {
        match unit {
            RelayUnit::Standalone(message) => self.send_standalone(target, message).await,
            RelayUnit::Album(album) => self.send_album(target, album).await,
        }
    }
}
