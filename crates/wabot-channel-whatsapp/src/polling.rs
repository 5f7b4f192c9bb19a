//! Bridge long-polling loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wabot_types::{Connection, ConnectionState, InboundMessage};

use crate::api::BridgeApi;
use crate::types::BridgeStatus;

const POLL_TIMEOUT_SECS: u64 = 30;

/// Fold a bridge status report into the owned connection state.
pub(crate) async fn update_connection(state: &RwLock<ConnectionState>, status: &BridgeStatus) {
    let connection = match status.connection.as_str() {
        "open" => Connection::Open,
        "connecting" => Connection::Connecting,
        _ => Connection::Closed,
    };

    let mut s = state.write().await;
    if connection == Connection::Open && s.connection != Connection::Open {
        info!("WhatsApp link open");
        s.reconnect_attempts = 0;
    }
    if let Some(qr) = &status.qr {
        if s.qr_code.as_deref() != Some(qr.as_str()) {
            info!("New QR code received, scan it on the bridge to pair");
        }
    }
    s.qr_code = if connection == Connection::Open {
        None
    } else {
        status.qr.clone()
    };
    s.connection = connection;
}

/// Run the long-polling loop, converting bridge events to `InboundMessage`.
///
/// Exits when `cancel` is cancelled or the `sender` is closed. `bot_number`
/// may be empty when the link has not been paired yet; the loop keeps
/// refreshing the bridge status until an identity shows up.
pub async fn run_polling_loop(
    api: &BridgeApi,
    channel_id: String,
    connection: Arc<RwLock<ConnectionState>>,
    mut bot_number: String,
    sender: mpsc::Sender<InboundMessage>,
    cancel: CancellationToken,
) {
    let mut offset: i64 = 0;
    let mut backoff = Duration::from_secs(1);
    let max_backoff = Duration::from_secs(30);

    info!(channel_id, "Bridge polling loop started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if bot_number.is_empty() {
            // the link may have been paired since the last poll
            if let Ok(status) = api.status().await {
                update_connection(&connection, &status).await;
                if let Some(me) = &status.me {
                    bot_number = me.number().to_string();
                    info!(channel_id, bot_number, "Bridge identity resolved");
                }
            }
        }

        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            result = api.poll_messages(offset, POLL_TIMEOUT_SECS) => result,
        };

        match batch {
            Ok(envelopes) => {
                backoff = Duration::from_secs(1);

                for envelope in envelopes {
                    offset = offset.max(envelope.seq + 1);

                    let Some(text) = envelope.body() else {
                        info!(channel_id, chat = %envelope.key.remote_jid, "Unsupported message type, dropping");
                        continue;
                    };

                    let inbound = InboundMessage {
                        channel_type: "whatsapp".into(),
                        channel_id: channel_id.clone(),
                        chat_id: envelope.key.remote_jid.clone(),
                        sender_id: envelope.sender().to_string(),
                        bot_id: bot_number.clone(),
                        text: text.to_string(),
                        from_self: envelope.key.from_me,
                        is_group: envelope.is_group(),
                        timestamp: envelope.timestamp * 1000,
                    };

                    debug!(channel_id, seq = envelope.seq, "Forwarding bridge message");

                    if sender.send(inbound).await.is_err() {
                        info!(channel_id, "Inbound channel closed, stopping polling");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(
                    channel_id,
                    backoff_secs = backoff.as_secs(),
                    "Bridge poll error: {e}"
                );

                {
                    let mut s = connection.write().await;
                    s.connection = Connection::Closed;
                    s.reconnect_attempts += 1;
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {},
                }

                backoff = (backoff * 2).min(max_backoff);

                if let Ok(status) = api.status().await {
                    update_connection(&connection, &status).await;
                }
            }
        }
    }

    info!(channel_id, "Bridge polling loop stopped");
}
