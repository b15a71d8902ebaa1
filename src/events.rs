//! Newline-delimited JSON events fed to the binary on stdin.
//!
//! ```text
//! {"type":"message","key":{"id":"M1","remoteJid":"g@g.us","participant":"u@s.whatsapp.net"},"message":{"conversation":"hi"}}
//! {"type":"admins","chatId":"g@g.us","admins":["u@s.whatsapp.net"]}
//! {"type":"participants","chatId":"g@g.us","participants":[{"id":"u@s.whatsapp.net","admin":"admin"}]}
//! ```

use serde::Deserialize;

use crate::channels::Participant;
use crate::message::Message;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A chat message to moderate.
    Message(Message),
    /// Authoritative admin list for a group.
    #[serde(rename_all = "camelCase")]
    Admins { chat_id: String, admins: Vec<String> },
    /// Group roster; admins are re-derived from it.
    #[serde(rename_all = "camelCase")]
    Participants {
        chat_id: String,
        participants: Vec<Participant>,
    },
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<Result<InboundEvent, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::ContentType;

    #[test]
    fn parses_message_events() {
        let event = parse_line(
            r#"{"type":"message","key":{"id":"M1","remoteJid":"g@g.us","participant":"u@s.whatsapp.net"},"message":{"imageMessage":{"caption":"look"},"messageContextInfo":{}}}"#,
        )
        .unwrap()
        .unwrap();

        let InboundEvent::Message(msg) = event else {
            panic!("expected a message event");
        };
        assert_eq!(msg.chat_id(), "g@g.us");
        assert_eq!(msg.sender_id(), "u@s.whatsapp.net");
        let payload = msg.message.as_ref().unwrap();
        assert_eq!(ContentType::of(payload), Some(ContentType::Image));
    }

    #[test]
    fn parses_admin_and_participant_events() {
        let admins = parse_line(r#"{"type":"admins","chatId":"g@g.us","admins":["a"]}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(
            admins,
            InboundEvent::Admins { ref chat_id, ref admins } if chat_id == "g@g.us" && admins.len() == 1
        ));

        let roster = parse_line(
            r#"{"type":"participants","chatId":"g@g.us","participants":[{"id":"a","admin":"superadmin"},{"id":"b"}]}"#,
        )
        .unwrap()
        .unwrap();
        let InboundEvent::Participants { participants, .. } = roster else {
            panic!("expected a participants event");
        };
        assert!(participants[0].is_admin());
        assert!(!participants[1].is_admin());
    }

    #[test]
    fn blank_and_bad_lines() {
        assert!(parse_line("   ").is_none());
        assert!(parse_line(r#"{"type":"reaction"}"#).unwrap().is_err());
        assert!(parse_line("not json").unwrap().is_err());
    }
}
