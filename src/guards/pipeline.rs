//! Evaluation pipeline — runs a group's guard list against one message.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use super::registry::GuardRegistry;
use super::{EvaluationContext, Guard, GuardInfo, GuardResult};
use crate::config::{GuardConfig, ModerationConfig};
use crate::message::Message;

/// Evaluates messages against per-group guard configurations.
#[derive(Clone)]
pub struct GuardEngine {
    registry: Arc<GuardRegistry>,
}

impl GuardEngine {
    pub fn new(registry: Arc<GuardRegistry>) -> Self {
        Self { registry }
    }

    /// Evaluate `message` against `configs`, in order, as of now.
    pub fn evaluate(
        &self,
        message: &Message,
        chat_id: &str,
        sender_id: &str,
        configs: &[GuardConfig],
        moderation: &ModerationConfig,
        is_admin: bool,
    ) -> GuardResult {
        self.evaluate_at(
            message,
            chat_id,
            sender_id,
            configs,
            moderation,
            is_admin,
            Local::now(),
        )
    }

    /// Evaluate as of `now`. Every guard in the pass sees the same instant.
    ///
    /// Disabled configs are never invoked, unknown guard ids are skipped,
    /// and the first blocking guard ends the pass.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate_at(
        &self,
        message: &Message,
        chat_id: &str,
        sender_id: &str,
        configs: &[GuardConfig],
        moderation: &ModerationConfig,
        is_admin: bool,
        now: DateTime<Local>,
    ) -> GuardResult {
        if moderation.admin_exempt && is_admin {
            debug!(chat_id = %chat_id, sender_id = %sender_id, "Admin exempt from guards");
            return GuardResult::Pass;
        }

        let ctx = EvaluationContext::build(message, chat_id, sender_id, is_admin, now);

        for config in configs.iter().filter(|c| c.enabled) {
            let Some(guard) = self.registry.lookup(&config.guard_id) else {
                warn!(
                    chat_id = %chat_id,
                    guard_id = %config.guard_id,
                    "Unknown guard in group config, skipping"
                );
                continue;
            };

            let result = guard.evaluate(&ctx.bind(config));
            if result.is_blocked() {
                debug!(
                    chat_id = %chat_id,
                    sender_id = %sender_id,
                    guard_id = %config.guard_id,
                    "Message blocked"
                );
                return result;
            }
        }

        GuardResult::Pass
    }

    /// Catalog of every registered guard.
    pub fn list_guards(&self) -> Vec<GuardInfo> {
        self.registry.list_all()
    }

    pub fn lookup_guard(&self, id: &str) -> Option<Arc<dyn Guard>> {
        self.registry.lookup(id)
    }
}
