//! `ViolationLog` trait — durable record of every guard violation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;

/// What the moderator did about a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationAction {
    /// Observation mode: recorded only.
    Logged,
    /// Enforced: the message was deleted.
    Deleted,
}

impl ViolationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logged => "logged",
            Self::Deleted => "deleted",
        }
    }
}

impl std::str::FromStr for ViolationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logged" => Ok(Self::Logged),
            "deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown violation action: {other}")),
        }
    }
}

/// One blocked message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub id: Uuid,
    pub chat_id: String,
    pub sender_id: String,
    pub guard_id: String,
    pub action: ViolationAction,
    pub reason: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ViolationRecord {
    /// New record stamped with a fresh id and the current time.
    pub fn new(
        chat_id: &str,
        sender_id: &str,
        guard_id: &str,
        action: ViolationAction,
        reason: &str,
        message_id: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            guard_id: guard_id.to_string(),
            action,
            reason: reason.to_string(),
            message_id: message_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Backend-agnostic violation log.
#[async_trait]
pub trait ViolationLog: Send + Sync {
    /// Append a violation.
    async fn log_violation(&self, record: &ViolationRecord) -> Result<(), DatabaseError>;

    /// Most recent violations in a chat, newest first, up to `limit`.
    async fn recent_violations(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ViolationRecord>, DatabaseError>;
}
