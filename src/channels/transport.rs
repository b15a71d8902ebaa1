//! Chat transport abstraction — the moderator's only view of the network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::message::MessageKey;

/// Elevated role of a group participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminRole {
    Admin,
    Superadmin,
}

/// A member of a group, as reported by group metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    /// `None` for regular members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<AdminRole>,
}

impl Participant {
    pub fn member(id: &str) -> Self {
        Self {
            id: id.to_string(),
            admin: None,
        }
    }

    pub fn admin(id: &str) -> Self {
        Self {
            id: id.to_string(),
            admin: Some(AdminRole::Admin),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.admin.is_some()
    }
}

/// Trait for chat transports — pure I/O, no moderation logic.
///
/// Guard evaluation and enforcement policy live in `Moderator`.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport name (e.g. "stdout").
    fn name(&self) -> &str;

    /// Delete a message for everyone in the chat.
    async fn delete_message(&self, chat_id: &str, key: &MessageKey)
    -> Result<(), TransportError>;

    /// Send a plain text message to a chat or user.
    async fn send_text(&self, to: &str, text: &str) -> Result<(), TransportError>;

    /// Current participants of a group chat, with their roles.
    async fn group_participants(&self, chat_id: &str) -> Result<Vec<Participant>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_roles_deserialize() {
        let participants: Vec<Participant> = serde_json::from_str(
            r#"[
                {"id": "a@s.whatsapp.net", "admin": "superadmin"},
                {"id": "b@s.whatsapp.net", "admin": "admin"},
                {"id": "c@s.whatsapp.net", "admin": null},
                {"id": "d@s.whatsapp.net"}
            ]"#,
        )
        .unwrap();

        let admins: Vec<&str> = participants
            .iter()
            .filter(|p| p.is_admin())
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(admins, vec!["a@s.whatsapp.net", "b@s.whatsapp.net"]);
        assert_eq!(participants[0].admin, Some(AdminRole::Superadmin));
    }
}
