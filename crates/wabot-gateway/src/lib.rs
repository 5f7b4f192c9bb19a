//! wabot-gateway: channel framework + command router wiring.
//!
//! Provides:
//! - Channel plugin framework for messaging transports
//! - The command router (task commands, task listing, free-text relay)
//! - Reminder delivery for the daily deadline sweep
//! - `start_bot`, the composition root for the `wabot run` binary

pub mod channel;
pub mod router;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use wabot_config::WabotConfig;
use wabot_cron::scheduler::DeadlineScheduler;
use wabot_inference::{AnswerProvider, FlowiseClient};
use wabot_store::{Db, RtdbTaskStore, TaskRepository};
use wabot_types::{ChannelConfig, ChannelStatus, OutboundMessage};

use channel::{ChannelManager, ChannelPlugin};
use router::Router;

/// Factory function: build a channel plugin from its config entry.
pub type ChannelFactory =
    Box<dyn Fn(String, &ChannelConfig) -> anyhow::Result<Arc<dyn ChannelPlugin>> + Send + Sync>;

/// Reminders carry only a chat JID; deliver through the first running
/// channel, since the transport the task arrived on is the one still
/// configured.
#[async_trait::async_trait]
impl wabot_cron::ReminderSender for ChannelManager {
    async fn send_reminder(&self, session_id: &str, text: &str) -> anyhow::Result<()> {
        for info in self.list_channels().await {
            if info.status == ChannelStatus::Running {
                return self
                    .send_message(OutboundMessage {
                        channel_type: info.channel_type,
                        channel_id: info.channel_id,
                        chat_id: session_id.to_string(),
                        text: text.to_string(),
                    })
                    .await;
            }
        }
        anyhow::bail!("no running channel to deliver reminder")
    }
}

/// Start the bot: wire storage, inference and channels to the router,
/// spawn the daily deadline scheduler, and run until ctrl-c.
pub async fn start_bot(
    config: WabotConfig,
    factories: HashMap<String, ChannelFactory>,
) -> anyhow::Result<()> {
    let db = Db::new(&config.database.url, config.database.auth.clone());
    let tasks: Arc<dyn TaskRepository> = Arc::new(RtdbTaskStore::new(db));
    let answers: Arc<dyn AnswerProvider> = Arc::new(FlowiseClient::new(&config.inference.url));
    let router = Arc::new(Router::new(
        tasks.clone(),
        answers,
        config.scheduler.utc_offset_minutes,
    ));

    let channel_mgr = Arc::new(ChannelManager::new(256));
    for (id, channel_config) in &config.channels {
        if !channel_config.enabled {
            info!(channel_id = %id, "Channel disabled, skipping");
            continue;
        }
        let Some(factory) = factories.get(&channel_config.channel_type) else {
            warn!(
                channel_id = %id,
                channel_type = %channel_config.channel_type,
                "Unknown channel type, skipping"
            );
            continue;
        };
        match factory(id.clone(), channel_config) {
            Ok(channel) => channel_mgr.register(channel).await,
            Err(e) => warn!(channel_id = %id, "Failed to create channel: {e}"),
        }
    }
    channel_mgr.start_all().await;

    let scheduler = Arc::new(DeadlineScheduler::new(
        tasks,
        channel_mgr.clone(),
        config.scheduler.clone(),
    ));
    tokio::spawn(scheduler.run());

    let channel_mgr_loop = channel_mgr.clone();
    let router_loop = router.clone();
    tokio::spawn(async move {
        channel_mgr_loop.run_message_loop(router_loop).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    channel_mgr.stop_all().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    use wabot_cron::ReminderSender;
    use wabot_types::InboundMessage;

    /// Channel that can be flipped between running and stopped.
    struct StubChannel {
        id: String,
        running: bool,
        sent: tokio::sync::Mutex<Vec<OutboundMessage>>,
    }

    impl StubChannel {
        fn new(id: &str, running: bool) -> Self {
            Self {
                id: id.to_string(),
                running,
                sent: tokio::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChannelPlugin for StubChannel {
        fn channel_type(&self) -> &str {
            "whatsapp"
        }

        fn channel_id(&self) -> &str {
            &self.id
        }

        async fn start(&self, _sender: mpsc::Sender<InboundMessage>) -> anyhow::Result<()> {
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
            self.sent.lock().await.push(message);
            Ok(())
        }

        fn status(&self) -> ChannelStatus {
            if self.running {
                ChannelStatus::Running
            } else {
                ChannelStatus::Stopped
            }
        }
    }

    #[tokio::test]
    async fn test_reminder_goes_through_running_channel() {
        let mgr = ChannelManager::new(16);
        let stopped = Arc::new(StubChannel::new("wa-old", false));
        let running = Arc::new(StubChannel::new("wa-main", true));
        mgr.register(stopped.clone()).await;
        mgr.register(running.clone()).await;

        mgr.send_reminder("628123@s.whatsapp.net", "Reminder: ...")
            .await
            .unwrap();

        assert!(stopped.sent.lock().await.is_empty());
        let sent = running.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, "628123@s.whatsapp.net");
    }

    #[tokio::test]
    async fn test_reminder_fails_without_running_channel() {
        let mgr = ChannelManager::new(16);
        mgr.register(Arc::new(StubChannel::new("wa-main", false)))
            .await;

        assert!(mgr.send_reminder("628123", "Reminder").await.is_err());
    }
}
