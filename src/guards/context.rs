//! Evaluation context — the normalized view of a message that guards see.

use std::ops::Deref;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::config::GuardConfig;
use crate::message::{Message, MessagePayload};

/// The single content kind a message carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Plain `conversation` text.
    Text,
    /// Text with previews, quotes or mentions.
    ExtendedText,
    Image,
    Video,
    /// Audio clip or voice note.
    Audio,
    Document,
    DocumentWithCaption,
    Sticker,
    /// Any other kind (reaction, poll, contact card, ...) by wire name.
    Other(String),
}

/// Wire names that wrap a message but are never its content.
const WRAPPER_KINDS: &[&str] = &["messageContextInfo", "senderKeyDistributionMessage"];

impl ContentType {
    /// Derive the content type from a payload.
    ///
    /// Known kinds are checked in a fixed order; unknown kinds follow in
    /// name order. A payload with only wrapper kinds has no content type.
    pub fn of(payload: &MessagePayload) -> Option<Self> {
        let known = [
            (payload.conversation.is_some(), Self::Text),
            (payload.extended_text_message.is_some(), Self::ExtendedText),
            (payload.image_message.is_some(), Self::Image),
            (payload.video_message.is_some(), Self::Video),
            (payload.audio_message.is_some(), Self::Audio),
            (payload.document_message.is_some(), Self::Document),
            (
                payload.document_with_caption_message.is_some(),
                Self::DocumentWithCaption,
            ),
            (payload.sticker_message.is_some(), Self::Sticker),
        ];

        if let Some((_, ct)) = known.into_iter().find(|(present, _)| *present) {
            return Some(ct);
        }

        payload
            .other
            .iter()
            .find(|(kind, value)| !value.is_null() && !WRAPPER_KINDS.contains(&kind.as_str()))
            .map(|(kind, _)| Self::Other(kind.clone()))
    }

    /// Plain or extended text.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text | Self::ExtendedText)
    }

    /// Any attachment kind, stickers included.
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            Self::Image
                | Self::Video
                | Self::Audio
                | Self::Document
                | Self::DocumentWithCaption
                | Self::Sticker
        )
    }
}

/// Text to moderate: body, extended body, image caption, then video
/// caption. The first non-empty one wins; no text is the empty string.
pub fn extract_text(payload: Option<&MessagePayload>) -> String {
    let Some(m) = payload else {
        return String::new();
    };

    [
        m.conversation.as_deref(),
        m.extended_text_message
            .as_ref()
            .and_then(|e| e.text.as_deref()),
        m.image_message.as_ref().and_then(|i| i.caption.as_deref()),
        m.video_message.as_ref().and_then(|v| v.caption.as_deref()),
    ]
    .into_iter()
    .flatten()
    .find(|s| !s.is_empty())
    .unwrap_or_default()
    .to_string()
}

/// Per-pass view of a message, built once and shared by every guard.
#[derive(Debug, Clone)]
pub struct EvaluationContext<'a> {
    pub message: &'a Message,
    pub chat_id: &'a str,
    pub sender_id: &'a str,
    /// `None` for payload-less or wrapper-only messages.
    pub content_type: Option<ContentType>,
    /// Never absent; empty when the message has no text.
    pub text: String,
    pub is_admin: bool,
    /// The instant every guard in this pass treats as "now".
    pub now: DateTime<Local>,
}

impl<'a> EvaluationContext<'a> {
    pub fn build(
        message: &'a Message,
        chat_id: &'a str,
        sender_id: &'a str,
        is_admin: bool,
        now: DateTime<Local>,
    ) -> Self {
        let payload = message.message.as_ref();
        Self {
            message,
            chat_id,
            sender_id,
            content_type: payload.and_then(ContentType::of),
            text: extract_text(payload),
            is_admin,
            now,
        }
    }

    /// Raw payload, if any.
    pub fn payload(&self) -> Option<&'a MessagePayload> {
        self.message.message.as_ref()
    }

    /// Pair this context with the config of the guard about to run.
    pub fn bind<'c>(&'c self, config: &'c GuardConfig) -> GuardContext<'c> {
        GuardContext { base: self, config }
    }
}

/// Evaluation context bound to one guard's config.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    base: &'a EvaluationContext<'a>,
    pub config: &'a GuardConfig,
}

impl<'a> Deref for GuardContext<'a> {
    type Target = EvaluationContext<'a>;

    fn deref(&self) -> &Self::Target {
        self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::testing::{CHAT, SENDER, at, message_with, text_message};
    use crate::message::ExtendedTextMessage;

    #[test]
    fn text_message_context() {
        let msg = text_message("hello");
        let ctx = EvaluationContext::build(&msg, CHAT, SENDER, false, at(12, 0, 0));
        assert_eq!(ctx.content_type, Some(ContentType::Text));
        assert_eq!(ctx.text, "hello");
        assert!(!ctx.is_admin);
    }

    #[test]
    fn wrappers_are_not_content() {
        let mut payload = MessagePayload::default();
        payload.message_context_info = Some(serde_json::json!({}));
        payload
            .other
            .insert("senderKeyDistributionMessage".into(), serde_json::json!({}));
        assert_eq!(ContentType::of(&payload), None);

        payload
            .other
            .insert("reactionMessage".into(), serde_json::json!({"text": "+1"}));
        assert_eq!(
            ContentType::of(&payload),
            Some(ContentType::Other("reactionMessage".into()))
        );
    }

    #[test]
    fn missing_payload_has_no_content_type() {
        let mut msg = text_message("x");
        msg.message = None;
        let ctx = EvaluationContext::build(&msg, CHAT, SENDER, false, at(12, 0, 0));
        assert_eq!(ctx.content_type, None);
        assert_eq!(ctx.text, "");
    }

    #[test]
    fn text_priority_skips_empty_bodies() {
        let payload = MessagePayload {
            conversation: Some(String::new()),
            extended_text_message: Some(ExtendedTextMessage {
                text: Some(String::new()),
                ..Default::default()
            }),
            ..MessagePayload::image(Some("caption wins"))
        };
        assert_eq!(extract_text(Some(&payload)), "caption wins");
    }

    #[test]
    fn video_caption_is_extracted() {
        let msg = message_with(MessagePayload::video(Some("watch this")));
        let ctx = EvaluationContext::build(&msg, CHAT, SENDER, false, at(12, 0, 0));
        assert_eq!(ctx.content_type, Some(ContentType::Video));
        assert_eq!(ctx.text, "watch this");
    }

    #[test]
    fn media_classification() {
        assert!(ContentType::Sticker.is_media());
        assert!(ContentType::DocumentWithCaption.is_media());
        assert!(!ContentType::ExtendedText.is_media());
        assert!(ContentType::ExtendedText.is_text());
    }

    #[test]
    fn bound_context_derefs_to_base() {
        let msg = text_message("hi");
        let ctx = EvaluationContext::build(&msg, CHAT, SENDER, true, at(9, 30, 0));
        let config = GuardConfig::new("text-only");
        let bound = ctx.bind(&config);
        assert_eq!(bound.config.guard_id, "text-only");
        assert_eq!(bound.chat_id, CHAT);
        assert!(bound.is_admin);
    }
}
