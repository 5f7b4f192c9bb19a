//! WhatsApp channel plugin for wabot.
//!
//! The multi-device protocol itself is owned by an external bridge process;
//! this crate wraps the bridge's HTTP API: long-polling for inbound
//! messages, a send endpoint for replies, and a status endpoint reporting
//! the link state and pairing QR.
//!
//! # Configuration
//!
//! ```json5
//! channels: {
//!     "wa-main": {
//!         channel_type: "whatsapp",
//!         enabled: true,
//!         settings: {
//!             bridge_url: "http://127.0.0.1:8077",
//!             api_token: "...",   // optional
//!         },
//!     },
//! }
//! ```

pub mod api;
pub mod polling;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use wabot_types::{
    ChannelConfig, ChannelStatus, ConnectionState, InboundMessage, OutboundMessage,
};

use api::BridgeApi;

/// WhatsApp channel plugin implementing `ChannelPlugin`.
pub struct WhatsAppChannel {
    id: String,
    bridge_url: String,
    api_token: Option<String>,
    connection: Arc<RwLock<ConnectionState>>,
    state: Mutex<WhatsAppState>,
}

struct WhatsAppState {
    status: ChannelStatus,
    cancel: Option<CancellationToken>,
    poll_handle: Option<JoinHandle<()>>,
}

impl WhatsAppChannel {
    /// Create a new WhatsApp channel for the given bridge.
    pub fn new(id: String, bridge_url: String, api_token: Option<String>) -> Self {
        Self {
            id,
            bridge_url,
            api_token,
            connection: Arc::new(RwLock::new(ConnectionState::default())),
            state: Mutex::new(WhatsAppState {
                status: ChannelStatus::Stopped,
                cancel: None,
                poll_handle: None,
            }),
        }
    }

    /// Snapshot of the transport link: state, pending QR, reconnect counter.
    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.read().await.clone()
    }
}

#[async_trait::async_trait]
impl wabot_gateway::channel::ChannelPlugin for WhatsAppChannel {
    fn channel_type(&self) -> &str {
        "whatsapp"
    }

    fn channel_id(&self) -> &str {
        &self.id
    }

    async fn start(&self, sender: mpsc::Sender<InboundMessage>) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if state.status == ChannelStatus::Running {
            bail!("WhatsApp channel {} is already running", self.id);
        }

        state.status = ChannelStatus::Starting;

        let api = BridgeApi::new(&self.bridge_url, self.api_token.clone());

        // The bridge must be reachable; the link itself may still be pairing.
        let bot_number = match api.status().await {
            Ok(status) => {
                polling::update_connection(&self.connection, &status).await;
                match &status.me {
                    Some(me) => {
                        info!(
                            channel_id = self.id,
                            bot_number = me.number(),
                            "WhatsApp bridge authenticated"
                        );
                        me.number().to_string()
                    }
                    None => {
                        info!(
                            channel_id = self.id,
                            "WhatsApp bridge reachable, waiting for pairing"
                        );
                        String::new()
                    }
                }
            }
            Err(e) => {
                state.status = ChannelStatus::Error(format!("Bridge unreachable: {e}"));
                bail!("Failed to reach WhatsApp bridge: {e}");
            }
        };

        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();
        let channel_id = self.id.clone();
        let connection = self.connection.clone();

        let handle = tokio::spawn(async move {
            polling::run_polling_loop(&api, channel_id, connection, bot_number, sender, cancel_child)
                .await;
        });

        state.cancel = Some(cancel);
        state.poll_handle = Some(handle);
        state.status = ChannelStatus::Running;

        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;

        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }

        if let Some(handle) = state.poll_handle.take() {
            let _ = handle.await;
        }

        state.status = ChannelStatus::Stopped;
        Ok(())
    }

    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        let api = BridgeApi::new(&self.bridge_url, self.api_token.clone());
        api.send_text(&message.chat_id, &message.text)
            .await
            .map_err(|e| {
                error!(channel_id = self.id, chat = %message.chat_id, "Send failed: {e}");
                e
            })
    }

    fn status(&self) -> ChannelStatus {
        match self.state.try_lock() {
            Ok(state) => state.status.clone(),
            Err(_) => ChannelStatus::Starting,
        }
    }
}

/// Factory function: create a `WhatsAppChannel` from a channel config.
///
/// Expects `config.settings["bridge_url"]` to be a string;
/// `settings["api_token"]` is optional.
pub fn create_whatsapp_channel(
    id: String,
    config: &ChannelConfig,
) -> anyhow::Result<Arc<dyn wabot_gateway::channel::ChannelPlugin>> {
    let bridge_url = config
        .settings
        .get("bridge_url")
        .and_then(|v| v.as_str())
        .context("WhatsApp channel requires settings.bridge_url (string)")?;

    let api_token = config
        .settings
        .get("api_token")
        .and_then(|v| v.as_str())
        .map(String::from);

    let channel = WhatsAppChannel::new(id, bridge_url.to_string(), api_token);
    Ok(Arc::new(channel))
}
