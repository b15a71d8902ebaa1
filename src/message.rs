//! Raw chat message model as delivered by the transport.
//!
//! The payload mirrors the transport's wire shape: a bag of optional content
//! kinds of which exactly one is normally populated. The guard engine never
//! inspects this shape directly except through [`crate::guards::ContentType`]
//! and the few metadata accessors below.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Addressing information for a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    /// Transport-assigned message id.
    #[serde(default)]
    pub id: String,
    /// Chat the message was posted in (group or direct chat id).
    pub remote_jid: String,
    /// Author of the message inside a group chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    /// Sent from the account the transport is logged in as.
    #[serde(default)]
    pub from_me: bool,
}

/// A single inbound chat message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub key: MessageKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessagePayload>,
    /// Display name of the sender, if the transport knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
}

impl Message {
    /// Build a group message authored by `sender` in `chat`.
    pub fn new(id: &str, chat: &str, sender: &str, payload: MessagePayload) -> Self {
        Self {
            key: MessageKey {
                id: id.to_string(),
                remote_jid: chat.to_string(),
                participant: Some(sender.to_string()),
                from_me: false,
            },
            message: Some(payload),
            push_name: None,
        }
    }

    /// Chat id the message belongs to.
    pub fn chat_id(&self) -> &str {
        &self.key.remote_jid
    }

    /// Sender id: the group participant, falling back to the chat id for
    /// direct chats.
    pub fn sender_id(&self) -> &str {
        match self.key.participant.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => &self.key.remote_jid,
        }
    }

    /// Plain or extended text body, ignoring captions.
    pub fn body_text(&self) -> &str {
        let Some(m) = &self.message else {
            return "";
        };
        m.conversation
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| {
                m.extended_text_message
                    .as_ref()
                    .and_then(|e| e.text.as_deref())
            })
            .unwrap_or("")
    }
}

/// Forwarding and quoting metadata attached to a content kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfo {
    #[serde(default)]
    pub is_forwarded: bool,
    #[serde(default)]
    pub forwarding_score: u32,
}

/// Text message with link previews, quotes, or mentions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedTextMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Link the transport detected in the text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

/// Image, video or sticker attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

/// Audio attachment. `ptt` marks a recorded voice note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMessage {
    #[serde(default)]
    pub ptt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

/// Document attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

/// Content payload. Unrecognised kinds (reactions, polls, ...) land in
/// `other` keyed by their wire name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_text_message: Option<ExtendedTextMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_message: Option<MediaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_message: Option<MediaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_message: Option<AudioMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_message: Option<DocumentMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_with_caption_message: Option<DocumentMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker_message: Option<MediaMessage>,
    /// Envelope metadata, never content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_context_info: Option<serde_json::Value>,
    /// Group key exchange, never content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_key_distribution_message: Option<serde_json::Value>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl MessagePayload {
    /// Plain text payload.
    pub fn text(text: &str) -> Self {
        Self {
            conversation: Some(text.to_string()),
            ..Default::default()
        }
    }

    /// Image payload with an optional caption.
    pub fn image(caption: Option<&str>) -> Self {
        Self {
            image_message: Some(MediaMessage {
                caption: caption.map(String::from),
                mimetype: Some("image/jpeg".into()),
                context_info: None,
            }),
            ..Default::default()
        }
    }

    /// Video payload with an optional caption.
    pub fn video(caption: Option<&str>) -> Self {
        Self {
            video_message: Some(MediaMessage {
                caption: caption.map(String::from),
                mimetype: Some("video/mp4".into()),
                context_info: None,
            }),
            ..Default::default()
        }
    }

    /// Audio payload; `ptt` marks a voice note.
    pub fn audio(ptt: bool) -> Self {
        Self {
            audio_message: Some(AudioMessage {
                ptt,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Sticker payload.
    pub fn sticker() -> Self {
        Self {
            sticker_message: Some(MediaMessage {
                mimetype: Some("image/webp".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Context info of every content-bearing kind that carries one.
    pub fn context_infos(&self) -> impl Iterator<Item = &ContextInfo> {
        [
            self.extended_text_message
                .as_ref()
                .and_then(|m| m.context_info.as_ref()),
            self.image_message
                .as_ref()
                .and_then(|m| m.context_info.as_ref()),
            self.video_message
                .as_ref()
                .and_then(|m| m.context_info.as_ref()),
            self.audio_message
                .as_ref()
                .and_then(|m| m.context_info.as_ref()),
            self.document_message
                .as_ref()
                .and_then(|m| m.context_info.as_ref()),
            self.sticker_message
                .as_ref()
                .and_then(|m| m.context_info.as_ref()),
        ]
        .into_iter()
        .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_falls_back_to_chat() {
        let mut msg = Message::new("m1", "123@s.whatsapp.net", "", MessagePayload::text("hi"));
        assert_eq!(msg.sender_id(), "123@s.whatsapp.net");

        msg.key.participant = Some("alice@s.whatsapp.net".into());
        assert_eq!(msg.sender_id(), "alice@s.whatsapp.net");
    }

    #[test]
    fn deserializes_wire_shape() {
        let raw = serde_json::json!({
            "key": {
                "id": "ABC",
                "remoteJid": "group@g.us",
                "participant": "bob@s.whatsapp.net",
                "fromMe": false
            },
            "message": {
                "extendedTextMessage": {
                    "text": "look https://example.com",
                    "matchedText": "https://example.com",
                    "contextInfo": { "isForwarded": true }
                },
                "messageContextInfo": { "deviceListMetadata": {} },
                "reactionMessage": { "text": "+1" }
            }
        });

        let msg: Message = serde_json::from_value(raw).unwrap();
        let payload = msg.message.as_ref().unwrap();
        let ext = payload.extended_text_message.as_ref().unwrap();
        assert_eq!(ext.matched_text.as_deref(), Some("https://example.com"));
        assert!(payload.message_context_info.is_some());
        assert!(payload.other.contains_key("reactionMessage"));
        assert!(payload.context_infos().any(|c| c.is_forwarded));
        assert_eq!(msg.body_text(), "look https://example.com");
    }
}
