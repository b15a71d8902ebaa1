//! Stdout transport — prints enforcement actions as JSON lines.
//!
//! Used by the binary for local runs and piping into other tools. Group
//! rosters are supplied by the caller via [`StdoutTransport::set_participants`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::channels::{ChatTransport, Participant};
use crate::error::TransportError;
use crate::message::MessageKey;

/// One action the transport was asked to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransportAction {
    Delete {
        chat_id: String,
        message_id: String,
    },
    Send {
        to: String,
        text: String,
    },
}

impl TransportAction {
    /// Single-line JSON rendering.
    pub fn to_line(&self) -> String {
        // Serializing a plain enum of strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub struct StdoutTransport {
    out: Mutex<tokio::io::Stdout>,
    rosters: RwLock<HashMap<String, Vec<Participant>>>,
}

impl StdoutTransport {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
            rosters: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the known participants of a group.
    pub async fn set_participants(&self, chat_id: &str, participants: Vec<Participant>) {
        self.rosters
            .write()
            .await
            .insert(chat_id.to_string(), participants);
    }

    async fn emit(&self, action: TransportAction) -> std::io::Result<()> {
        let mut line = action.to_line();
        line.push('\n');
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes()).await?;
        out.flush().await
    }
}

impl Default for StdoutTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for StdoutTransport {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn delete_message(
        &self,
        chat_id: &str,
        key: &MessageKey,
    ) -> Result<(), TransportError> {
        self.emit(TransportAction::Delete {
            chat_id: chat_id.to_string(),
            message_id: key.id.clone(),
        })
        .await
        .map_err(|e| TransportError::DeleteFailed {
            chat_id: chat_id.to_string(),
            message_id: key.id.clone(),
            reason: e.to_string(),
        })
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), TransportError> {
        self.emit(TransportAction::Send {
            to: to.to_string(),
            text: text.to_string(),
        })
        .await
        .map_err(|e| TransportError::SendFailed {
            to: to.to_string(),
            reason: e.to_string(),
        })
    }

    async fn group_participants(&self, chat_id: &str) -> Result<Vec<Participant>, TransportError> {
        self.rosters
            .read()
            .await
            .get(chat_id)
            .cloned()
            .ok_or_else(|| TransportError::MetadataFailed {
                chat_id: chat_id.to_string(),
                reason: "no roster known for this group".into(),
            })
    }
}
