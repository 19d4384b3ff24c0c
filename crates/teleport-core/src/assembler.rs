//! Album reassembly: turns a fetched batch into ordered relay units.
//!
//! Messages sharing a media-group key were one "album" post on the source
//! side and must be replayed as a single delivery, with the first non-empty
//! text among them as the caption.

use crate::domain::{ChatMessage, MediaRef, MessageId, MessageKind};

/// An assembled album: two or more fetched messages sharing a group key
/// (or one, when the rest of the album fell outside the fetch window).
#[derive(Clone, Debug)]
pub struct AlbumUnit {
    pub key: String,
    /// Ascending by message id.
    pub messages: Vec<ChatMessage>,
}

impl AlbumUnit {
    /// First non-empty text among the album's messages.
    pub fn caption(&self) -> Option<&str> {
        self.messages
            .iter()
            .filter_map(|m| m.text())
            .find(|t| !t.is_empty())
    }

    /// All media in the album, in message-id order.
    pub fn media(&self) -> Vec<&MediaRef> {
        self.messages.iter().filter_map(|m| m.media()).collect()
    }

    pub fn silent(&self) -> bool {
        self.messages.first().map(|m| m.silent).unwrap_or(false)
    }
}

/// One delivery operation: a standalone message or an assembled album.
#[derive(Clone, Debug)]
pub enum RelayUnit {
    Standalone(ChatMessage),
    Album(AlbumUnit),
}

impl RelayUnit {
    pub fn ids(&self) -> Vec<MessageId> {
        match self {
            RelayUnit::Standalone(m) => vec![m.id],
            RelayUnit::Album(a) => a.messages.iter().map(|m| m.id).collect(),
        }
    }

    /// Highest message id covered by this unit; the cursor advances past it.
    pub fn max_id(&self) -> MessageId {
        match self {
            RelayUnit::Standalone(m) => m.id,
            // messages are sorted ascending
            RelayUnit::Album(a) => a.messages.last().map(|m| m.id).unwrap_or(MessageId::ZERO),
        }
    }

    /// Units the engine advances past without delivering: system/action
    /// messages, messages with neither text nor media, and albums whose
    /// messages carry no media at all.
    ///
    /// Note this also drops caption-less forwarded stickers/polls; kept as-is
    /// for compatibility with existing deployments.
    pub fn is_skippable(&self) -> bool {
        match self {
            RelayUnit::Standalone(m) => {
                m.is_system_action() || (m.text().map_or(true, str::is_empty) && m.media().is_none())
            }
            RelayUnit::Album(a) => a.media().is_empty(),
        }
    }

    /// The same unit with `prefix` prepended to its visible text, used by the
    /// comment relay path.
    pub fn prefixed(&self, prefix: &str) -> RelayUnit {
        fn prepend(prefix: &str, text: Option<&str>) -> String {
            format!("{prefix}{}", text.unwrap_or_default())
        }

        match self {
            RelayUnit::Standalone(m) => {
                let mut m = m.clone();
                m.kind = match m.kind {
                    MessageKind::Text(t) => MessageKind::Text(format!("{prefix}{t}")),
                    MessageKind::Media { media, caption } => MessageKind::Media {
                        media,
                        caption: Some(prepend(prefix, caption.as_deref())),
                    },
                    MessageKind::SystemAction => MessageKind::SystemAction,
                };
                RelayUnit::Standalone(m)
            }
            RelayUnit::Album(a) => {
                let mut a = a.clone();
                if let Some(first) = a.messages.first().map(|m| m.id) {
                    let caption = prepend(prefix, a.caption());
                    for m in &mut a.messages {
                        if m.id == first {
                            if let MessageKind::Media {
                                caption: ref mut c, ..
                            } = m.kind
                            {
                                *c = Some(caption.clone());
                            }
                        } else if let MessageKind::Media {
                            caption: ref mut c, ..
                        } = m.kind
                        {
                            *c = None;
                        }
                    }
                }
                RelayUnit::Album(a)
            }
        }
    }
}

/// Partition a batch into relay units.
///
/// Albums come first (in order of first appearance), then standalone
/// messages in id order; every input id is covered exactly once. The engine
/// only requires that no id is dropped or duplicated.
pub fn group(mut messages: Vec<ChatMessage>) -> Vec<RelayUnit> {
    messages.sort_by_key(|m| m.id);

    let mut albums: Vec<AlbumUnit> = Vec::new();
    let mut standalone: Vec<ChatMessage> = Vec::new();

    for message in messages {
        match &message.group_key {
            Some(key) => match albums.iter_mut().find(|a| a.key == *key) {
                Some(album) => album.messages.push(message),
                None => albums.push(AlbumUnit {
                    key: key.clone(),
                    messages: vec![message],
                }),
            },
            None => standalone.push(message),
        }
    }

    albums
        .into_iter()
        .map(RelayUnit::Album)
        .chain(standalone.into_iter().map(RelayUnit::Standalone))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MediaKind;

    fn text_msg(id: i32, text: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId(id),
            group_key: None,
            timestamp: 0,
            silent: false,
            kind: MessageKind::Text(text.to_string()),
        }
    }

    fn album_msg(id: i32, key: &str, caption: Option<&str>) -> ChatMessage {
        ChatMessage {
            id: MessageId(id),
            group_key: Some(key.to_string()),
            timestamp: 0,
            silent: false,
            kind: MessageKind::Media {
                media: MediaRef {
                    kind: MediaKind::Photo,
                    file_id: format!("file-{id}"),
                },
                caption: caption.map(str::to_string),
            },
        }
    }

    fn action_msg(id: i32) -> ChatMessage {
        ChatMessage {
            id: MessageId(id),
            group_key: None,
            timestamp: 0,
            silent: false,
            kind: MessageKind::SystemAction,
        }
    }

    #[test]
    fn groups_album_and_standalone() {
        let units = group(vec![
            album_msg(1, "A", None),
            album_msg(2, "A", Some("hello")),
            text_msg(3, "solo"),
        ]);

        assert_eq!(units.len(), 2);
        let RelayUnit::Album(album) = &units[0] else {
            panic!("expected album first");
        };
        assert_eq!(
            album.messages.iter().map(|m| m.id.0).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(album.caption(), Some("hello"));
        assert_eq!(units[1].ids(), vec![MessageId(3)]);
    }

    #[test]
    fn covers_every_id_exactly_once() {
        let batch = vec![
            album_msg(5, "B", None),
            text_msg(2, "x"),
            album_msg(4, "A", None),
            album_msg(3, "B", None),
            album_msg(1, "A", None),
        ];
        let units = group(batch);

        let mut ids: Vec<i32> = units.iter().flat_map(|u| u.ids()).map(|i| i.0).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn album_messages_sorted_by_id() {
        let units = group(vec![
            album_msg(9, "A", Some("late")),
            album_msg(7, "A", Some("early")),
        ]);
        let RelayUnit::Album(album) = &units[0] else {
            panic!("expected album");
        };
        assert_eq!(
            album.messages.iter().map(|m| m.id.0).collect::<Vec<_>>(),
            vec![7, 9]
        );
        // Caption comes from the first message in id order.
        assert_eq!(album.caption(), Some("early"));
        assert_eq!(album.media().len(), 2);
    }

    #[test]
    fn classifies_skippable_units() {
        assert!(RelayUnit::Standalone(action_msg(1)).is_skippable());
        assert!(RelayUnit::Standalone(text_msg(2, "")).is_skippable());
        assert!(!RelayUnit::Standalone(text_msg(3, "hi")).is_skippable());
        assert!(!RelayUnit::Standalone(album_msg(4, "A", None)).is_skippable());

        // An album stripped of media (e.g. all members were text-only) is
        // skippable as a whole.
        let empty_album = RelayUnit::Album(AlbumUnit {
            key: "A".to_string(),
            messages: vec![text_msg(5, "caption only")],
        });
        assert!(empty_album.is_skippable());
    }

    #[test]
    fn prefix_applies_to_text_and_captions() {
        let unit = RelayUnit::Standalone(text_msg(1, "nice post")).prefixed("💬 Comment: ");
        let RelayUnit::Standalone(m) = &unit else {
            panic!()
        };
        assert_eq!(m.text(), Some("💬 Comment: nice post"));

        let unit = RelayUnit::Standalone(album_msg(2, "A", None)).prefixed("💬 Comment: ");
        let RelayUnit::Standalone(m) = &unit else {
            panic!()
        };
        assert_eq!(m.text(), Some("💬 Comment: "));
    }

    #[test]
    fn max_id_spans_the_album() {
        let units = group(vec![album_msg(10, "A", None), album_msg(12, "A", None)]);
        assert_eq!(units[0].max_id(), MessageId(12));
    }
}
