//! Moderator — turns guard verdicts into enforcement.
//!
//! Runs ahead of any other message handling: evaluates the group's guards,
//! records every violation, and (outside observation mode) deletes the
//! message and tells the sender why.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::channels::ChatTransport;
use crate::guards::{GuardEngine, GuardResult};
use crate::message::Message;
use crate::policy::GroupPolicy;
use crate::store::{ViolationAction, ViolationLog, ViolationRecord};

/// Chat ids of group chats end with this suffix.
const GROUP_SUFFIX: &str = "@g.us";

const FALLBACK_REASON: &str = "Message blocked by group rules.";

/// Last violation DM per sender. Entries older than the longest cooldown
/// any group has used can no longer suppress a DM and are pruned.
#[derive(Default)]
struct DmCooldowns {
    last_sent: HashMap<String, DateTime<Utc>>,
    longest_secs: u64,
}

fn cooling(now: DateTime<Utc>, last: DateTime<Utc>, cooldown_secs: u64) -> bool {
    i128::from((now - last).num_milliseconds()) < i128::from(cooldown_secs) * 1000
}

/// Why a message was not evaluated at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No key or no payload.
    Empty,
    /// Our own prefixed reply coming back to us.
    BotEcho,
    /// Direct chat; only groups are moderated.
    NotGroup,
    /// The group has no guards configured.
    NoGuards,
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationOutcome {
    Skipped(SkipReason),
    Passed,
    /// Violation recorded but not enforced.
    Observed { guard_id: String, reason: String },
    /// Violation enforced: delete and DM were attempted.
    Blocked { guard_id: String, reason: String },
}

impl ModerationOutcome {
    /// Whether the message should be withheld from downstream handlers.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

pub struct Moderator {
    engine: GuardEngine,
    transport: Arc<dyn ChatTransport>,
    log: Arc<dyn ViolationLog>,
    assistant_name: String,
    /// chat id -> admin ids
    admins: RwLock<HashMap<String, HashSet<String>>>,
    dm_cooldowns: Mutex<DmCooldowns>,
}

impl Moderator {
    pub fn new(
        engine: GuardEngine,
        transport: Arc<dyn ChatTransport>,
        log: Arc<dyn ViolationLog>,
        assistant_name: &str,
    ) -> Self {
        Self {
            engine,
            transport,
            log,
            assistant_name: assistant_name.to_string(),
            admins: RwLock::new(HashMap::new()),
            dm_cooldowns: Mutex::new(DmCooldowns::default()),
        }
    }

    /// Replace the cached admin list of a group.
    pub async fn update_admin_cache(&self, chat_id: &str, admin_ids: &[String]) {
        self.admins
            .write()
            .await
            .insert(chat_id.to_string(), admin_ids.iter().cloned().collect());
    }

    /// Whether `sender_id` is a cached admin of `chat_id`. Unknown groups
    /// have no admins.
    pub async fn is_admin(&self, chat_id: &str, sender_id: &str) -> bool {
        self.admins
            .read()
            .await
            .get(chat_id)
            .is_some_and(|admins| admins.contains(sender_id))
    }

    /// Re-read a group's admins from the transport. On failure the previous
    /// cache entry is kept.
    pub async fn refresh_admin_cache(&self, chat_id: &str) {
        match self.transport.group_participants(chat_id).await {
            Ok(participants) => {
                let admins: Vec<String> = participants
                    .into_iter()
                    .filter(|p| p.is_admin())
                    .map(|p| p.id)
                    .collect();
                self.update_admin_cache(chat_id, &admins).await;
                debug!(chat_id = %chat_id, admin_count = admins.len(), "Admin cache refreshed");
            }
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Failed to refresh admin cache");
            }
        }
    }

    /// Moderate one inbound message against its group's policy.
    pub async fn moderate(&self, msg: &Message, policy: Option<&GroupPolicy>) -> ModerationOutcome {
        self.moderate_at(msg, policy, Local::now()).await
    }

    /// Moderate as of `now`.
    pub async fn moderate_at(
        &self,
        msg: &Message,
        policy: Option<&GroupPolicy>,
        now: DateTime<Local>,
    ) -> ModerationOutcome {
        if msg.key.remote_jid.is_empty() || msg.message.is_none() {
            return ModerationOutcome::Skipped(SkipReason::Empty);
        }
        if msg.key.from_me && msg.body_text().starts_with(&format!("{}:", self.assistant_name)) {
            return ModerationOutcome::Skipped(SkipReason::BotEcho);
        }

        let chat_id = msg.chat_id();
        if !chat_id.ends_with(GROUP_SUFFIX) {
            return ModerationOutcome::Skipped(SkipReason::NotGroup);
        }
        let Some(policy) = policy.filter(|p| !p.guards.is_empty()) else {
            return ModerationOutcome::Skipped(SkipReason::NoGuards);
        };

        let sender_id = msg.sender_id();
        let sender_is_admin = self.is_admin(chat_id, sender_id).await;

        let result = self.engine.evaluate_at(
            msg,
            chat_id,
            sender_id,
            &policy.guards,
            &policy.moderation,
            sender_is_admin,
            now,
        );
        let GuardResult::Block { guard_id, reason } = result else {
            return ModerationOutcome::Passed;
        };
        let reason = if reason.is_empty() {
            FALLBACK_REASON.to_string()
        } else {
            reason
        };

        let observing = policy.moderation.observation_mode;
        let action = if observing {
            ViolationAction::Logged
        } else {
            ViolationAction::Deleted
        };
        let mut record =
            ViolationRecord::new(chat_id, sender_id, &guard_id, action, &reason, &msg.key.id);
        record.timestamp = now.with_timezone(&Utc);
        if let Err(e) = self.log.log_violation(&record).await {
            error!(
                chat_id = %chat_id,
                guard_id = %guard_id,
                error = %e,
                "Failed to record violation"
            );
        }

        if observing {
            info!(
                chat_id = %chat_id,
                sender_id = %sender_id,
                guard_id = %guard_id,
                reason = %reason,
                "Guard violation detected (observation mode, not enforcing)"
            );
            return ModerationOutcome::Observed { guard_id, reason };
        }

        match self.transport.delete_message(chat_id, &msg.key).await {
            Ok(()) => {
                info!(
                    chat_id = %chat_id,
                    sender_id = %sender_id,
                    guard_id = %guard_id,
                    "Message deleted by guard"
                );
            }
            Err(e) => {
                error!(
                    chat_id = %chat_id,
                    sender_id = %sender_id,
                    guard_id = %guard_id,
                    error = %e,
                    "Failed to delete message"
                );
            }
        }

        self.dm_sender(
            sender_id,
            &reason,
            policy.moderation.dm_cooldown_seconds,
            now.with_timezone(&Utc),
        )
        .await;

        ModerationOutcome::Blocked { guard_id, reason }
    }

    /// Tell the sender why their message was removed, at most once per
    /// cooldown. The cooldown only starts once a DM actually went out.
    async fn dm_sender(
        &self,
        sender_id: &str,
        reason: &str,
        cooldown_secs: u64,
        now: DateTime<Utc>,
    ) {
        let suppressed = {
            let mut cooldowns = self.dm_cooldowns.lock().await;
            cooldowns.longest_secs = cooldowns.longest_secs.max(cooldown_secs);
            cooldowns
                .last_sent
                .get(sender_id)
                .is_some_and(|last| cooling(now, *last, cooldown_secs))
        };
        if suppressed {
            debug!(sender_id = %sender_id, "DM cooldown active, skipping");
            return;
        }

        let text = format!("{}: {reason}", self.assistant_name);
        match self.transport.send_text(sender_id, &text).await {
            Ok(()) => {
                let mut cooldowns = self.dm_cooldowns.lock().await;
                let longest = cooldowns.longest_secs;
                cooldowns
                    .last_sent
                    .retain(|_, last| cooling(now, *last, longest));
                cooldowns.last_sent.insert(sender_id.to_string(), now);
                debug!(sender_id = %sender_id, "Violation DM sent");
            }
            Err(e) => {
                warn!(sender_id = %sender_id, error = %e, "Failed to DM sender");
            }
        }
    }
}
