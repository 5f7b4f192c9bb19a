use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod deadline;

// ──────────────────── Task Types ────────────────────

/// An assignment record, persisted under `tugas/<id>`.
///
/// The id is the path key, not part of the record body. Field names follow
/// the wire layout of the hosted database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Professor / source name, free text.
    pub dosen: String,
    /// Assignment title, free text.
    #[serde(rename = "namaTugas")]
    pub nama_tugas: String,
    /// Due date as `DD.MM`, no year.
    pub deadline: String,
    /// Chat JID the task was registered from; reminders are routed back here.
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

// ──────────────────── Channel Types ────────────────────

/// Message from a channel to the bot core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel type (e.g. "whatsapp").
    pub channel_type: String,
    /// Unique channel instance ID.
    pub channel_id: String,
    /// Chat JID (direct or group). Reply target and session key in one.
    pub chat_id: String,
    /// Author JID: the group participant, or the chat itself in a direct chat.
    pub sender_id: String,
    /// The bot's own number, for mention detection in groups.
    pub bot_id: String,
    /// Message text content.
    pub text: String,
    /// Whether the bot itself authored this message.
    pub from_self: bool,
    /// Whether the chat is a group.
    pub is_group: bool,
    /// Message timestamp (unix millis).
    pub timestamp: i64,
}

/// Message from the bot core to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Channel type (e.g. "whatsapp").
    pub channel_type: String,
    /// Unique channel instance ID.
    pub channel_id: String,
    /// Destination chat JID.
    pub chat_id: String,
    /// Reply text content.
    pub text: String,
}

/// Status of a channel plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Channel is not running.
    Stopped,
    /// Channel is initializing.
    Starting,
    /// Channel is running and accepting messages.
    Running,
    /// Channel encountered an error.
    Error(String),
}

/// Summary information about a registered channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel type (e.g. "whatsapp").
    pub channel_type: String,
    /// Unique channel instance ID.
    pub channel_id: String,
    /// Current status.
    pub status: ChannelStatus,
}

/// Configuration for a channel instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel type (e.g. "whatsapp").
    pub channel_type: String,
    /// Whether this channel is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Channel-specific settings (e.g. bridge URL, API token).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub settings: HashMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

// ──────────────────── Connection State ────────────────────

/// Link state of the messaging transport, as reported by the bridge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Connection {
    Connecting,
    Open,
    Closed,
}

/// Snapshot of the transport link, owned by the channel behind a lock and
/// exposed through a query method rather than module-level state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionState {
    /// Current link state.
    pub connection: Connection,
    /// Pending pairing QR payload, if the link is waiting to be scanned.
    pub qr_code: Option<String>,
    /// Consecutive failed reconnect attempts since the link was last up.
    pub reconnect_attempts: u32,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            connection: Connection::Connecting,
            qr_code: None,
            reconnect_attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_wire_field_names() {
        let task = Task {
            dosen: "Ahmad".into(),
            nama_tugas: "Laporan".into(),
            deadline: "25.12".into(),
            session_id: "628123@s.whatsapp.net".into(),
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["dosen"], "Ahmad");
        assert_eq!(json["namaTugas"], "Laporan");
        assert_eq!(json["deadline"], "25.12");
        assert_eq!(json["sessionId"], "628123@s.whatsapp.net");
    }

    #[test]
    fn test_task_roundtrip() {
        let json = r#"{"dosen":"Budi","namaTugas":"Makalah","deadline":"01.03","sessionId":"120@g.us"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.nama_tugas, "Makalah");
        assert_eq!(task.session_id, "120@g.us");
        let back = serde_json::to_string(&task).unwrap();
        let again: Task = serde_json::from_str(&back).unwrap();
        assert_eq!(task, again);
    }

    #[test]
    fn test_inbound_message_serde() {
        let msg = InboundMessage {
            channel_type: "whatsapp".into(),
            channel_id: "wa-main".into(),
            chat_id: "628123@s.whatsapp.net".into(),
            sender_id: "628123@s.whatsapp.net".into(),
            bot_id: "628999".into(),
            text: "Halo".into(),
            from_self: false,
            is_group: false,
            timestamp: 1700000000000,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: InboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.chat_id, "628123@s.whatsapp.net");
        assert!(!parsed.is_group);
    }

    #[test]
    fn test_channel_status_serde() {
        let status = ChannelStatus::Running;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"running\"");

        let err = ChannelStatus::Error("bridge unreachable".into());
        let json = serde_json::to_string(&err).unwrap();
        let parsed: ChannelStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ChannelStatus::Error("bridge unreachable".into()));
    }

    #[test]
    fn test_channel_config_defaults() {
        let json = r#"{"channel_type": "whatsapp"}"#;
        let config: ChannelConfig = serde_json::from_str(json).unwrap();
        assert!(config.enabled);
        assert!(config.settings.is_empty());
    }

    #[test]
    fn test_connection_state_default() {
        let state = ConnectionState::default();
        assert_eq!(state.connection, Connection::Connecting);
        assert!(state.qr_code.is_none());
        assert_eq!(state.reconnect_attempts, 0);
    }
}
