//! Guard engine — pluggable moderation rules for group chats.
//!
//! A message flows through:
//! 1. `EvaluationContext::build()` — content type, extracted text, "now"
//! 2. `GuardEngine::evaluate()` — the group's guard list, in order
//! 3. First blocking `GuardResult` wins; otherwise the message passes
//!
//! Guards never fail. A malformed param or bad pattern makes that single
//! rule contribute no constraint.

pub mod behavioral;
pub mod content;
pub mod context;
pub mod keyword;
pub mod pipeline;
pub mod property;
pub mod rate;
pub mod registry;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use context::{ContentType, EvaluationContext, GuardContext};
pub use keyword::PatternCache;
pub use pipeline::GuardEngine;
pub use rate::{RateStore, spawn_sweep_task};
pub use registry::GuardRegistry;

/// A single moderation rule.
///
/// Implementations must be cheap and non-blocking: no I/O, no awaiting.
/// State, where needed, lives in an injected store (see [`RateStore`],
/// [`PatternCache`]).
pub trait Guard: Send + Sync {
    /// Stable identifier referenced by group configuration.
    fn id(&self) -> &str;

    /// Human-readable name for configuration UIs.
    fn name(&self) -> &str;

    /// What the guard does and which params it reads.
    fn description(&self) -> &str;

    /// Decide whether the message violates this rule.
    fn evaluate(&self, ctx: &GuardContext<'_>) -> GuardResult;

    /// Catalog entry for this guard.
    fn info(&self) -> GuardInfo {
        GuardInfo {
            id: self.id().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

/// Verdict of one guard, or of a whole evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GuardResult {
    Pass,
    Block { guard_id: String, reason: String },
}

impl GuardResult {
    /// Blocking verdict attributed to `guard_id`.
    pub fn block(guard_id: &str, reason: impl Into<String>) -> Self {
        Self::Block {
            guard_id: guard_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Block { .. })
    }

    /// Guard that blocked, if any.
    pub fn guard_id(&self) -> Option<&str> {
        match self {
            Self::Block { guard_id, .. } => Some(guard_id),
            Self::Pass => None,
        }
    }

    /// Reason shown to the sender, if blocked.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Block { reason, .. } => Some(reason),
            Self::Pass => None,
        }
    }
}

/// Catalog entry: what a configuration UI needs to list a guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Deserialize a guard's params, falling back to defaults when they are
/// malformed.
pub(crate) fn parse_params<T>(ctx: &GuardContext<'_>) -> T
where
    T: DeserializeOwned + Default,
{
    if ctx.config.params.is_empty() {
        return T::default();
    }
    match serde_json::from_value(serde_json::Value::Object(ctx.config.params.clone())) {
        Ok(params) => params,
        Err(e) => {
            warn!(
                guard_id = %ctx.config.guard_id,
                chat_id = %ctx.chat_id,
                error = %e,
                "Malformed guard params, using defaults"
            );
            T::default()
        }
    }
}

/// Positive numeric param or `default`. Zero, negative and missing values
/// all select the default.
pub(crate) fn positive_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(default)
}
