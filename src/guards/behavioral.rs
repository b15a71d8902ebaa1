//! Behavioral guards — time windows, rate limits and sender allowlists.

use std::sync::Arc;

use chrono::{Duration, Timelike, Utc};
use serde::Deserialize;

use super::rate::{RateKey, RateStore};
use super::{Guard, GuardContext, GuardResult, parse_params, positive_or};

const DEFAULT_QUIET_START_HOUR: f64 = 22.0;
const DEFAULT_QUIET_END_HOUR: f64 = 7.0;
const DEFAULT_SLOW_MODE_MINUTES: f64 = 5.0;
const DEFAULT_SPAM_MAX_MESSAGES: f64 = 5.0;
const DEFAULT_SPAM_WINDOW_SECS: f64 = 10.0;

/// Windows past what a `Duration` can hold are treated as unbounded.
fn window_millis(millis: f64) -> Duration {
    Duration::try_milliseconds(millis.round() as i64).unwrap_or(Duration::MAX)
}

// ── Quiet hours ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuietHoursParams {
    start_hour: Option<f64>,
    end_hour: Option<f64>,
}

/// Block all messages inside a daily local-time window.
pub struct QuietHoursGuard;

impl Guard for QuietHoursGuard {
    fn id(&self) -> &str {
        "quiet-hours"
    }

    fn name(&self) -> &str {
        "Quiet Hours"
    }

    fn description(&self) -> &str {
        "Block messages during specified hours. Set params.startHour and params.endHour (0-23, default: 22-07)."
    }

    fn evaluate(&self, ctx: &GuardContext<'_>) -> GuardResult {
        let params: QuietHoursParams = parse_params(ctx);
        // Zero is a real hour here, so only a missing value takes the default.
        let start = params.start_hour.unwrap_or(DEFAULT_QUIET_START_HOUR);
        let end = params.end_hour.unwrap_or(DEFAULT_QUIET_END_HOUR);
        let hour = f64::from(ctx.now.hour());

        let is_quiet = if start < end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        };

        if is_quiet {
            return GuardResult::block(
                self.id(),
                format!(
                    "This group is in quiet hours ({start}:00 - {end}:00). Please try again later."
                ),
            );
        }
        GuardResult::Pass
    }
}

// ── Slow mode ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlowModeParams {
    interval_minutes: Option<f64>,
}

/// One message per sender per interval.
pub struct SlowModeGuard {
    store: Arc<RateStore>,
}

impl SlowModeGuard {
    pub fn new(store: Arc<RateStore>) -> Self {
        Self { store }
    }
}

impl Guard for SlowModeGuard {
    fn id(&self) -> &str {
        "slow-mode"
    }

    fn name(&self) -> &str {
        "Slow Mode"
    }

    fn description(&self) -> &str {
        "Limit users to 1 message per N minutes. Set params.intervalMinutes (default: 5)."
    }

    fn evaluate(&self, ctx: &GuardContext<'_>) -> GuardResult {
        let params: SlowModeParams = parse_params(ctx);
        let interval = positive_or(params.interval_minutes, DEFAULT_SLOW_MODE_MINUTES);

        // Every invocation is recorded, blocked or not.
        let recent = self.store.record(
            RateKey::new(self.id(), ctx.chat_id, ctx.sender_id),
            window_millis(interval * 60_000.0),
            ctx.now.with_timezone(&Utc),
        );

        if recent >= 1 {
            return GuardResult::block(
                self.id(),
                format!("Slow mode is active. You can send 1 message every {interval} minutes."),
            );
        }
        GuardResult::Pass
    }
}

// ── No spam ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoSpamParams {
    max_messages: Option<f64>,
    window_seconds: Option<f64>,
}

/// Burst limit: at most N messages per sender within a short window.
pub struct NoSpamGuard {
    store: Arc<RateStore>,
}

impl NoSpamGuard {
    pub fn new(store: Arc<RateStore>) -> Self {
        Self { store }
    }
}

impl Guard for NoSpamGuard {
    fn id(&self) -> &str {
        "no-spam"
    }

    fn name(&self) -> &str {
        "No Spam (Rate Limit)"
    }

    fn description(&self) -> &str {
        "Block rapid-fire messages. Set params.maxMessages (default: 5) and params.windowSeconds (default: 10)."
    }

    fn evaluate(&self, ctx: &GuardContext<'_>) -> GuardResult {
        let params: NoSpamParams = parse_params(ctx);
        let max_messages = positive_or(params.max_messages, DEFAULT_SPAM_MAX_MESSAGES);
        let window_seconds = positive_or(params.window_seconds, DEFAULT_SPAM_WINDOW_SECS);

        let recent = self.store.record(
            RateKey::new(self.id(), ctx.chat_id, ctx.sender_id),
            window_millis(window_seconds * 1000.0),
            ctx.now.with_timezone(&Utc),
        );

        if recent as f64 >= max_messages {
            return GuardResult::block(
                self.id(),
                format!(
                    "You're sending messages too quickly. Max {max_messages} messages per {window_seconds} seconds."
                ),
            );
        }
        GuardResult::Pass
    }
}

// ── Approved senders ────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApprovedSendersParams {
    #[serde(default)]
    allowed_jids: Vec<String>,
}

/// Only allowlisted senders may post. An empty allowlist lets everyone in.
pub struct ApprovedSendersGuard;

impl Guard for ApprovedSendersGuard {
    fn id(&self) -> &str {
        "approved-senders"
    }

    fn name(&self) -> &str {
        "Approved Senders Only"
    }

    fn description(&self) -> &str {
        "Only whitelisted senders can post. Set params.allowedJids as string array."
    }

    fn evaluate(&self, ctx: &GuardContext<'_>) -> GuardResult {
        let params: ApprovedSendersParams = parse_params(ctx);
        if params.allowed_jids.is_empty() {
            return GuardResult::Pass;
        }
        if !params.allowed_jids.iter().any(|jid| jid == ctx.sender_id) {
            return GuardResult::block(
                self.id(),
                "You are not on the approved senders list for this group.",
            );
        }
        GuardResult::Pass
    }
}
