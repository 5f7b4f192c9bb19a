//! Command router: classifies inbound chat messages and dispatches them.
//!
//! Task commands go to the persistence layer, everything else is relayed to
//! the prediction endpoint. Validation problems are normal reply paths, not
//! errors — the user gets a corrective message.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use wabot_inference::AnswerProvider;
use wabot_store::TaskRepository;
use wabot_types::{InboundMessage, OutboundMessage, deadline};

use crate::channel::ChannelManager;

/// Literal prefix for task commands, trailing space included.
const TASK_PREFIX: &str = ".tugas ";

const TASK_ADDED: &str = "Tugas berhasil ditambahkan.";
const LIST_HEADER: &str = "Daftar tugas:";
const USAGE_ERROR: &str =
    "Format tidak valid. Gunakan: .tugas (dosen), (nama tugas), (deadline dalam format DD.MM)";
const DATE_FORMAT_ERROR: &str = "Format tanggal tidak valid. Gunakan format DD.MM";

pub struct Router {
    tasks: Arc<dyn TaskRepository>,
    answers: Arc<dyn AnswerProvider>,
    utc_offset_minutes: i32,
}

impl Router {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        answers: Arc<dyn AnswerProvider>,
        utc_offset_minutes: i32,
    ) -> Self {
        Self {
            tasks,
            answers,
            utc_offset_minutes,
        }
    }

    /// Handle one inbound message end to end: gate, normalize, classify,
    /// reply. Errors terminate only this message's handling task.
    pub async fn handle(
        &self,
        inbound: &InboundMessage,
        channels: &ChannelManager,
    ) -> anyhow::Result<()> {
        let now = deadline::local_now(self.utc_offset_minutes);
        self.handle_at(inbound, channels, now).await
    }

    async fn handle_at(
        &self,
        inbound: &InboundMessage,
        channels: &ChannelManager,
        now: NaiveDateTime,
    ) -> anyhow::Result<()> {
        if inbound.from_self {
            debug!(chat = %inbound.chat_id, "own message, ignoring");
            return Ok(());
        }

        let mention = format!("@{}", inbound.bot_id);
        let mentioned = !inbound.bot_id.is_empty() && inbound.text.contains(&mention);
        if inbound.is_group && !mentioned {
            debug!(chat = %inbound.chat_id, "group message without mention, ignoring");
            return Ok(());
        }

        // Strip the bot's and the sender's own mention tokens
        let mut text = inbound.text.clone();
        if mentioned {
            text = text.replace(&mention, "").trim().to_string();
        }
        let sender_number = bare_number(&inbound.sender_id);
        if !sender_number.is_empty() {
            text = text
                .replace(&format!("@{sender_number}"), "")
                .trim()
                .to_string();
        }

        debug!(chat = %inbound.chat_id, is_group = inbound.is_group, "processing message");

        let reply = self.dispatch(&text, &inbound.chat_id, now).await?;

        channels
            .send_message(OutboundMessage {
                channel_type: inbound.channel_type.clone(),
                channel_id: inbound.channel_id.clone(),
                chat_id: inbound.chat_id.clone(),
                text: reply,
            })
            .await
            .map_err(|e| {
                warn!(chat = %inbound.chat_id, "reply send failed: {e}");
                e
            })
    }

    /// Classify the normalized text and produce the reply body.
    async fn dispatch(
        &self,
        text: &str,
        chat_id: &str,
        now: NaiveDateTime,
    ) -> anyhow::Result<String> {
        if let Some(rest) = text.strip_prefix(TASK_PREFIX) {
            let content = rest.trim();
            if content.eq_ignore_ascii_case("info") {
                return self.list_tasks(now).await;
            }
            return self.register_task(content, chat_id).await;
        }

        info!(chat = %chat_id, "forwarding question to prediction endpoint");
        let answer = self.answers.ask(text, chat_id).await?;
        Ok(answer)
    }

    async fn list_tasks(&self, now: NaiveDateTime) -> anyhow::Result<String> {
        let tasks = self.tasks.all_tasks().await?;
        let mut reply = format!("{LIST_HEADER}\n");
        for task in tasks.values() {
            let sisa = deadline::remaining_days(&task.deadline, now);
            reply.push_str(&format!(
                "- {}: {} sisa: {} hari\n",
                task.dosen, task.nama_tugas, sisa
            ));
        }
        Ok(reply)
    }

    /// `content` is the comma-separated remainder after the command prefix:
    /// `dosen, nama tugas, DD.MM`.
    async fn register_task(&self, content: &str, chat_id: &str) -> anyhow::Result<String> {
        let fields: Vec<&str> = content.split(',').map(str::trim).collect();
        let [dosen, nama_tugas, due] = fields.as_slice() else {
            return Ok(USAGE_ERROR.to_string());
        };
        if dosen.is_empty() || nama_tugas.is_empty() || due.is_empty() {
            return Ok(USAGE_ERROR.to_string());
        }
        if !deadline::is_valid_deadline(due) {
            return Ok(DATE_FORMAT_ERROR.to_string());
        }

        let id = self.tasks.add_task(dosen, nama_tugas, due, chat_id).await?;
        info!(id, chat = %chat_id, "task registered");
        Ok(TASK_ADDED.to_string())
    }
}

/// Bare number of a JID: the part before any `:` or `@`.
fn bare_number(jid: &str) -> &str {
    jid.split([':', '@']).next().unwrap_or(jid)
}
