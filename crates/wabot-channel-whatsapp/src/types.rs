//! Bridge wire types (minimal subset of the multi-device message shape).

use serde::{Deserialize, Serialize};

/// Link report from `GET /status`.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeStatus {
    /// "connecting" | "open" | "close".
    pub connection: String,
    /// Pairing QR payload, present while the link waits for a scan.
    #[serde(default)]
    pub qr: Option<String>,
    /// Bot identity, present once the link has been paired.
    #[serde(default)]
    pub me: Option<BridgeIdentity>,
}

/// The bridge's own account identity.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeIdentity {
    /// Full JID, e.g. "628999123456:12@s.whatsapp.net".
    pub id: String,
}

impl BridgeIdentity {
    /// Bare number: the JID up to the first `:` or `@`.
    pub fn number(&self) -> &str {
        self.id.split([':', '@']).next().unwrap_or(&self.id)
    }
}

/// One message event from the `GET /messages` long-poll.
#[derive(Debug, Clone, Deserialize)]
pub struct WaEnvelope {
    /// Bridge-assigned sequence number, the polling cursor.
    #[serde(default)]
    pub seq: i64,
    pub key: WaKey,
    #[serde(default)]
    pub message: Option<WaMessage>,
    /// Unix seconds.
    #[serde(rename = "messageTimestamp", default)]
    pub timestamp: i64,
}

/// Addressing of a message.
#[derive(Debug, Clone, Deserialize)]
pub struct WaKey {
    /// Chat JID; groups end in `@g.us`.
    #[serde(rename = "remoteJid")]
    pub remote_jid: String,
    /// Whether the bot's own account authored the message.
    #[serde(rename = "fromMe", default)]
    pub from_me: bool,
    /// Author JID inside a group chat.
    #[serde(default)]
    pub participant: Option<String>,
}

/// Supported content variants. Anything else deserializes to an empty
/// shape whose `body()` is `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WaMessage {
    #[serde(default)]
    pub conversation: Option<String>,
    #[serde(rename = "extendedTextMessage", default)]
    pub extended_text_message: Option<ExtendedText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtendedText {
    #[serde(default)]
    pub text: Option<String>,
}

impl WaEnvelope {
    /// Plain or extended text body. `None` for every other message shape
    /// (media, buttons, lists), which the poller drops.
    pub fn body(&self) -> Option<&str> {
        let message = self.message.as_ref()?;
        if let Some(text) = message.conversation.as_deref() {
            return Some(text);
        }
        message.extended_text_message.as_ref()?.text.as_deref()
    }

    /// Group chats use the `@g.us` JID suffix.
    pub fn is_group(&self) -> bool {
        self.key.remote_jid.ends_with("@g.us")
    }

    /// The actual author: the group participant, or the chat itself.
    pub fn sender(&self) -> &str {
        self.key
            .participant
            .as_deref()
            .unwrap_or(&self.key.remote_jid)
    }
}

/// Parameters for `POST /send`.
#[derive(Debug, Serialize)]
pub struct SendTextParams<'a> {
    pub jid: &'a str,
    pub text: &'a str,
}
