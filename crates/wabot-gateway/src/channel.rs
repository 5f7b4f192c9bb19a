//! Channel plugin framework for messaging transports.
//!
//! The WhatsApp protocol itself lives in an external client; a channel
//! plugin wraps that client and converts traffic to/from the bot's
//! `InboundMessage`/`OutboundMessage` types.
//!
//! # Architecture
//!
//! ```text
//! External transport (bridge process)
//!     ↓ (transport-specific protocol)
//! ChannelPlugin::start() spawns listener
//!     ↓ (InboundMessage via mpsc)
//! ChannelManager → Router::handle()
//!     ↓ (reply text)
//! ChannelPlugin::send(OutboundMessage)
//!     ↓ (transport-specific protocol)
//! External transport
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{info, warn};

use wabot_types::{ChannelInfo, ChannelStatus, InboundMessage, OutboundMessage};

use crate::router::Router;

/// Trait for channel plugins that bridge messaging transports to the bot.
///
/// Use `&self` for all methods — implementations should use interior
/// mutability (e.g. `Mutex`, `RwLock`) for any mutable state.
#[async_trait::async_trait]
pub trait ChannelPlugin: Send + Sync {
    /// Returns the channel type identifier (e.g. "whatsapp").
    fn channel_type(&self) -> &str;

    /// Returns the unique instance identifier for this channel.
    fn channel_id(&self) -> &str;

    /// Start the channel, connecting to the external transport.
    ///
    /// The `sender` should be used to push incoming messages to the bot.
    /// Implementations typically spawn a background task for the listener.
    async fn start(&self, sender: mpsc::Sender<InboundMessage>) -> anyhow::Result<()>;

    /// Stop the channel, disconnecting from the external transport.
    async fn stop(&self) -> anyhow::Result<()>;

    /// Send a message to the external transport.
    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()>;

    /// Returns the current status of this channel.
    fn status(&self) -> ChannelStatus;
}

/// Manages channel plugins, routing messages between channels and the router.
pub struct ChannelManager {
    channels: RwLock<HashMap<String, Arc<dyn ChannelPlugin>>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundMessage>>,
}

impl ChannelManager {
    /// Create a new channel manager with the given buffer capacity.
    pub fn new(buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size);
        Self {
            channels: RwLock::new(HashMap::new()),
            inbound_tx: tx,
            inbound_rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Register a channel plugin. Replaces any existing channel with the same ID.
    pub async fn register(&self, channel: Arc<dyn ChannelPlugin>) {
        let id = channel.channel_id().to_string();
        info!(
            channel_type = channel.channel_type(),
            channel_id = %id,
            "Registering channel plugin"
        );
        self.channels.write().await.insert(id, channel);
    }

    /// Unregister a channel plugin by ID. Stops it if running.
    pub async fn unregister(&self, channel_id: &str) -> bool {
        if let Some(channel) = self.channels.write().await.remove(channel_id) {
            if channel.status() == ChannelStatus::Running {
                if let Err(e) = channel.stop().await {
                    warn!(channel_id, "Failed to stop channel during unregister: {e}");
                }
            }
            true
        } else {
            false
        }
    }

    /// Start all registered channels.
    pub async fn start_all(&self) {
        let channels = self.channels.read().await;
        for (id, channel) in channels.iter() {
            if let Err(e) = channel.start(self.inbound_tx.clone()).await {
                warn!(channel_id = %id, "Failed to start channel: {e}");
            }
        }
    }

    /// Stop all registered channels.
    pub async fn stop_all(&self) {
        let channels = self.channels.read().await;
        for (id, channel) in channels.iter() {
            if let Err(e) = channel.stop().await {
                warn!(channel_id = %id, "Failed to stop channel: {e}");
            }
        }
    }

    /// Send a message through the appropriate channel.
    pub async fn send_message(&self, message: OutboundMessage) -> anyhow::Result<()> {
        let channels = self.channels.read().await;
        let channel = channels
            .get(&message.channel_id)
            .ok_or_else(|| anyhow::anyhow!("Channel not found: {}", message.channel_id))?;

        channel.send(message).await
    }

    /// List all registered channels with their status.
    pub async fn list_channels(&self) -> Vec<ChannelInfo> {
        let channels = self.channels.read().await;
        channels
            .values()
            .map(|ch| ChannelInfo {
                channel_type: ch.channel_type().to_string(),
                channel_id: ch.channel_id().to_string(),
                status: ch.status(),
            })
            .collect()
    }

    /// Get the status of a specific channel.
    pub async fn channel_status(&self, channel_id: &str) -> Option<ChannelStatus> {
        let channels = self.channels.read().await;
        channels.get(channel_id).map(|ch| ch.status())
    }

    /// Run the inbound message processing loop.
    ///
    /// Consumes messages from all channels and hands each to the router on
    /// its own task, so one slow or failing message never blocks the rest.
    ///
    /// Should be spawned as a background task.
    pub async fn run_message_loop(self: &Arc<Self>, router: Arc<Router>) {
        let mut rx = self.inbound_rx.lock().await;

        info!("Channel message loop started");

        while let Some(inbound) = rx.recv().await {
            let router = router.clone();
            let channel_mgr = self.clone();

            tokio::spawn(async move {
                if let Err(e) = router.handle(&inbound, &channel_mgr).await {
                    warn!(chat = %inbound.chat_id, "Message handling failed: {e}");
                }
            });
        }

        info!("Channel message loop stopped");
    }
}
