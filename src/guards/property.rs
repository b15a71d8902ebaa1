//! Message-property guards — links, forwards and text length.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::{Guard, GuardContext, GuardResult, parse_params, positive_or};

/// Scheme-prefixed, www-prefixed, or bare domains on common TLDs.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://\S+|www\.\S+|\S+\.(com|org|net|io|co|me|info|xyz)\b")
        .expect("URL pattern is valid")
});

const DEFAULT_MAX_TEXT_LENGTH: f64 = 2000.0;

/// Block messages containing URLs.
pub struct NoLinksGuard;

impl Guard for NoLinksGuard {
    fn id(&self) -> &str {
        "no-links"
    }

    fn name(&self) -> &str {
        "No Links"
    }

    fn description(&self) -> &str {
        "Block messages containing URLs."
    }

    fn evaluate(&self, ctx: &GuardContext<'_>) -> GuardResult {
        let reason = "Links are not allowed in this group.";
        if !ctx.text.is_empty() && URL_PATTERN.is_match(&ctx.text) {
            return GuardResult::block(self.id(), reason);
        }

        // The transport may have detected a link we didn't.
        let matched = ctx
            .payload()
            .and_then(|p| p.extended_text_message.as_ref())
            .and_then(|e| e.matched_text.as_deref())
            .is_some_and(|m| !m.is_empty());
        if matched {
            return GuardResult::block(self.id(), reason);
        }
        GuardResult::Pass
    }
}

/// Block forwarded messages.
pub struct NoForwardedGuard;

impl Guard for NoForwardedGuard {
    fn id(&self) -> &str {
        "no-forwarded"
    }

    fn name(&self) -> &str {
        "No Forwarded Messages"
    }

    fn description(&self) -> &str {
        "Block forwarded messages."
    }

    fn evaluate(&self, ctx: &GuardContext<'_>) -> GuardResult {
        let Some(payload) = ctx.payload() else {
            return GuardResult::Pass;
        };
        if payload.context_infos().any(|info| info.is_forwarded) {
            return GuardResult::block(
                self.id(),
                "Forwarded messages are not allowed in this group.",
            );
        }
        GuardResult::Pass
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaxTextLengthParams {
    max_length: Option<f64>,
}

/// Block text longer than a character limit.
pub struct MaxTextLengthGuard;

impl Guard for MaxTextLengthGuard {
    fn id(&self) -> &str {
        "max-text-length"
    }

    fn name(&self) -> &str {
        "Max Text Length"
    }

    fn description(&self) -> &str {
        "Block text messages exceeding a character limit. Set params.maxLength (default: 2000)."
    }

    fn evaluate(&self, ctx: &GuardContext<'_>) -> GuardResult {
        if ctx.text.is_empty() {
            return GuardResult::Pass;
        }
        let params: MaxTextLengthParams = parse_params(ctx);
        let max_length = positive_or(params.max_length, DEFAULT_MAX_TEXT_LENGTH);

        if ctx.text.chars().count() as f64 > max_length {
            return GuardResult::block(
                self.id(),
                format!("Messages over {max_length} characters are not allowed."),
            );
        }
        GuardResult::Pass
    }
}
