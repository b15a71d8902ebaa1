//! Content-type guards — restrict which kinds of message a group accepts.

use super::context::ContentType;
use super::{Guard, GuardContext, GuardResult};

/// How a content guard judges the message's content type.
enum ContentRule {
    /// Only matching messages pass. Messages without a content type always
    /// pass (system events are not moderated).
    AllowOnly(fn(&GuardContext<'_>, &ContentType) -> bool),
    /// Messages of exactly this type are blocked.
    Forbid(ContentType),
}

/// A guard decided purely by the message's content type.
pub struct ContentTypeGuard {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    reason: &'static str,
    rule: ContentRule,
}

impl ContentTypeGuard {
    pub fn text_only() -> Self {
        Self {
            id: "text-only",
            name: "Text Only",
            description: "Only text messages allowed. Blocks media, stickers, documents, etc.",
            reason: "Only text messages are allowed in this group.",
            rule: ContentRule::AllowOnly(|_, ct| ct.is_text()),
        }
    }

    pub fn video_only() -> Self {
        Self {
            id: "video-only",
            name: "Video Only",
            description: "Only video messages allowed.",
            reason: "Only video messages are allowed in this group.",
            rule: ContentRule::AllowOnly(|_, ct| *ct == ContentType::Video),
        }
    }

    pub fn voice_only() -> Self {
        Self {
            id: "voice-only",
            name: "Voice Only",
            description: "Only voice notes allowed.",
            reason: "Only voice notes are allowed in this group.",
            rule: ContentRule::AllowOnly(|ctx, ct| {
                *ct == ContentType::Audio
                    && ctx
                        .payload()
                        .and_then(|p| p.audio_message.as_ref())
                        .is_some_and(|a| a.ptt)
            }),
        }
    }

    pub fn media_only() -> Self {
        Self {
            id: "media-only",
            name: "Media Only",
            description: "Only media messages (images, videos, audio, documents) allowed. Blocks text.",
            reason: "Only media messages are allowed in this group.",
            rule: ContentRule::AllowOnly(|_, ct| ct.is_media()),
        }
    }

    pub fn no_stickers() -> Self {
        Self {
            id: "no-stickers",
            name: "No Stickers",
            description: "Block sticker messages.",
            reason: "Stickers are not allowed in this group.",
            rule: ContentRule::Forbid(ContentType::Sticker),
        }
    }

    pub fn no_images() -> Self {
        Self {
            id: "no-images",
            name: "No Images",
            description: "Block image messages.",
            reason: "Images are not allowed in this group.",
            rule: ContentRule::Forbid(ContentType::Image),
        }
    }

    /// Every content-type guard, in catalog order.
    pub fn all() -> Vec<Self> {
        vec![
            Self::text_only(),
            Self::video_only(),
            Self::voice_only(),
            Self::media_only(),
            Self::no_stickers(),
            Self::no_images(),
        ]
    }
}

impl Guard for ContentTypeGuard {
    fn id(&self) -> &str {
        self.id
    }

    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn evaluate(&self, ctx: &GuardContext<'_>) -> GuardResult {
        let blocked = match (&self.rule, ctx.content_type.as_ref()) {
            (ContentRule::AllowOnly(_), None) => false,
            (ContentRule::AllowOnly(allowed), Some(ct)) => !allowed(ctx, ct),
            (ContentRule::Forbid(forbidden), ct) => ct == Some(forbidden),
        };

        if blocked {
            GuardResult::block(self.id, self.reason)
        } else {
            GuardResult::Pass
        }
    }
}
