//! wabot-cron: the daily deadline sweep.
//!
//! A single timer fires once a day at the configured wall-clock time and
//! runs one sweep over the stored tasks: reminders go out for tasks inside
//! the reminder window, and tasks whose deadline has been reached this month
//! are deleted.

pub mod scheduler;

/// Outbound reminder delivery seam.
///
/// The channel layer implements this; the sweep stays ignorant of channel
/// routing and only knows the session (chat JID) a reminder belongs to.
#[async_trait::async_trait]
pub trait ReminderSender: Send + Sync {
    /// Deliver `text` to the chat identified by `session_id`.
    async fn send_reminder(&self, session_id: &str, text: &str) -> anyhow::Result<()>;
}

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Task ids a reminder went out for.
    pub reminded: Vec<String>,
    /// Task ids deleted because their deadline was reached.
    pub deleted: Vec<String>,
    /// Per-item failures (reminder sends and deletes) that were skipped over.
    pub failures: u32,
}
