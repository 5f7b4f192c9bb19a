//! Deadline scheduler — sleeps until the daily fire time, then sweeps.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime};
use tracing::{error, info, warn};

use wabot_config::SchedulerConfig;
use wabot_store::TaskRepository;
use wabot_types::deadline;

use crate::{ReminderSender, SweepReport};

pub struct DeadlineScheduler {
    tasks: Arc<dyn TaskRepository>,
    sender: Arc<dyn ReminderSender>,
    config: SchedulerConfig,
}

impl DeadlineScheduler {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        sender: Arc<dyn ReminderSender>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            tasks,
            sender,
            config,
        }
    }

    /// Timer loop: sleep until the next fire time, sweep, repeat.
    ///
    /// Runs forever; spawn it as a background task. The sweep itself is the
    /// only invocation path for reminders and deletions.
    pub async fn run(self: Arc<Self>) {
        info!(
            hour = self.config.hour,
            minute = self.config.minute,
            utc_offset_minutes = self.config.utc_offset_minutes,
            "Deadline scheduler started"
        );
        loop {
            let now = deadline::local_now(self.config.utc_offset_minutes);
            let wait = self.until_next_fire(now);
            tokio::time::sleep(wait).await;

            match self.sweep().await {
                Ok(report) => info!(
                    reminded = report.reminded.len(),
                    deleted = report.deleted.len(),
                    failures = report.failures,
                    "Sweep finished"
                ),
                Err(e) => error!("Sweep aborted: {e}"),
            }
        }
    }

    /// Duration from `now` to the next configured daily fire time.
    fn until_next_fire(&self, now: NaiveDateTime) -> Duration {
        let fire_time = NaiveTime::from_hms_opt(self.config.hour % 24, self.config.minute % 60, 0)
            .unwrap_or(NaiveTime::MIN);
        let mut target = now.date().and_time(fire_time);
        if target <= now {
            target += ChronoDuration::days(1);
        }
        (target - now).to_std().unwrap_or(Duration::from_secs(60))
    }

    /// Run one sweep against the current wall-clock time.
    pub async fn sweep(&self) -> wabot_store::Result<SweepReport> {
        let now = deadline::local_now(self.config.utc_offset_minutes);
        self.sweep_at(now).await
    }

    /// A fetch failure aborts the whole sweep; per-item failures after that
    /// are logged, counted, and skipped so the remaining tasks still get
    /// their reminders and deletions.
    async fn sweep_at(&self, now: NaiveDateTime) -> wabot_store::Result<SweepReport> {
        let tasks = self.tasks.all_tasks().await?;
        let mut report = SweepReport::default();

        for (id, task) in &tasks {
            let sisa = deadline::remaining_days(&task.deadline, now);
            if sisa > 0 && sisa <= self.config.reminder_window_days {
                let text = format!(
                    "Reminder: Tugas dari {} {} akan berakhir pada {} hari.",
                    task.dosen, task.nama_tugas, sisa
                );
                match self.sender.send_reminder(&task.session_id, &text).await {
                    Ok(()) => report.reminded.push(id.clone()),
                    Err(e) => {
                        warn!(id, "reminder send failed: {e}");
                        report.failures += 1;
                    }
                }
            }
        }

        let today = now.date();
        for (id, task) in &tasks {
            if !deadline::due_for_deletion(&task.deadline, today) {
                continue;
            }
            match self.tasks.delete_task(id).await {
                Ok(()) => {
                    info!(id, dosen = %task.dosen, "task deleted, deadline reached");
                    report.deleted.push(id.clone());
                }
                Err(e) => {
                    warn!(id, "task delete failed: {e}");
                    report.failures += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use wabot_store::{Result as StoreResult, StoreError};
    use wabot_types::Task;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn task(dosen: &str, nama: &str, deadline: &str, session: &str) -> Task {
        Task {
            dosen: dosen.into(),
            nama_tugas: nama.into(),
            deadline: deadline.into(),
            session_id: session.into(),
        }
    }

    fn decode_error() -> StoreError {
        StoreError::Decode(serde_json::from_str::<i32>("not json").unwrap_err())
    }

    /// In-memory repository recording deletions.
    struct MemoryRepo {
        tasks: Mutex<BTreeMap<String, Task>>,
        fail_fetch: bool,
        fail_delete_id: Option<String>,
    }

    impl MemoryRepo {
        fn new(tasks: BTreeMap<String, Task>) -> Self {
            Self {
                tasks: Mutex::new(tasks),
                fail_fetch: false,
                fail_delete_id: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl TaskRepository for MemoryRepo {
        async fn add_task(
            &self,
            dosen: &str,
            nama_tugas: &str,
            deadline: &str,
            session_id: &str,
        ) -> StoreResult<String> {
            let mut tasks = self.tasks.lock().unwrap();
            let id = format!("{}", 1_700_000_000_000u64 + tasks.len() as u64);
            tasks.insert(id.clone(), task(dosen, nama_tugas, deadline, session_id));
            Ok(id)
        }

        async fn all_tasks(&self) -> StoreResult<BTreeMap<String, Task>> {
            if self.fail_fetch {
                return Err(decode_error());
            }
            Ok(self.tasks.lock().unwrap().clone())
        }

        async fn delete_task(&self, id: &str) -> StoreResult<()> {
            if self.fail_delete_id.as_deref() == Some(id) {
                return Err(decode_error());
            }
            self.tasks.lock().unwrap().remove(id);
            Ok(())
        }
    }

    /// Reminder sink recording every delivery, optionally failing one session.
    #[derive(Default)]
    struct MemorySender {
        sent: Mutex<Vec<(String, String)>>,
        fail_session: Option<String>,
    }

    #[async_trait::async_trait]
    impl ReminderSender for MemorySender {
        async fn send_reminder(&self, session_id: &str, text: &str) -> anyhow::Result<()> {
            if self.fail_session.as_deref() == Some(session_id) {
                anyhow::bail!("send failed");
            }
            self.sent
                .lock()
                .unwrap()
                .push((session_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn scheduler(repo: MemoryRepo, sender: MemorySender) -> (Arc<MemoryRepo>, Arc<MemorySender>, DeadlineScheduler) {
        let repo = Arc::new(repo);
        let sender = Arc::new(sender);
        let sched = DeadlineScheduler::new(
            repo.clone(),
            sender.clone(),
            SchedulerConfig::default(),
        );
        (repo, sender, sched)
    }

    #[tokio::test]
    async fn test_sweep_reminds_inside_window() {
        let mut tasks = BTreeMap::new();
        tasks.insert("1".into(), task("Ahmad", "Laporan", "22.12", "chat-a"));
        tasks.insert("2".into(), task("Budi", "Makalah", "25.12", "chat-b"));
        let (_, sender, sched) = scheduler(MemoryRepo::new(tasks), MemorySender::default());

        let report = sched.sweep_at(at(2024, 12, 20, 18, 30)).await.unwrap();

        // 22.12 is 2 days out (inside the window); 25.12 is 5 days out
        assert_eq!(report.reminded, vec!["1".to_string()]);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "chat-a");
        assert_eq!(
            sent[0].1,
            "Reminder: Tugas dari Ahmad Laporan akan berakhir pada 2 hari."
        );
    }

    #[tokio::test]
    async fn test_sweep_deletes_reached_deadlines() {
        let mut tasks = BTreeMap::new();
        tasks.insert("1".into(), task("Ahmad", "Laporan", "20.12", "chat-a"));
        tasks.insert("2".into(), task("Budi", "Makalah", "01.12", "chat-b"));
        tasks.insert("3".into(), task("Citra", "Resume", "21.12", "chat-c"));
        let (repo, _, sched) = scheduler(MemoryRepo::new(tasks), MemorySender::default());

        let report = sched.sweep_at(at(2024, 12, 20, 18, 30)).await.unwrap();

        assert_eq!(report.deleted, vec!["1".to_string(), "2".to_string()]);
        let remaining = repo.all_tasks().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains_key("3"));
    }

    #[tokio::test]
    async fn test_sweep_keeps_tasks_overdue_in_prior_month() {
        let mut tasks = BTreeMap::new();
        tasks.insert("1".into(), task("Ahmad", "Laporan", "15.11", "chat-a"));
        let (repo, sender, sched) = scheduler(MemoryRepo::new(tasks), MemorySender::default());

        let report = sched.sweep_at(at(2024, 12, 20, 18, 30)).await.unwrap();

        // a November deadline in December: past (no reminder) but not deleted
        assert!(report.reminded.is_empty());
        assert!(report.deleted.is_empty());
        assert!(sender.sent.lock().unwrap().is_empty());
        assert_eq!(repo.all_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_isolates_send_failures() {
        let mut tasks = BTreeMap::new();
        tasks.insert("1".into(), task("Ahmad", "Laporan", "22.12", "chat-bad"));
        tasks.insert("2".into(), task("Budi", "Makalah", "21.12", "chat-ok"));
        let sender = MemorySender {
            sent: Mutex::new(Vec::new()),
            fail_session: Some("chat-bad".into()),
        };
        let (_, sender, sched) = scheduler(MemoryRepo::new(tasks), sender);

        let report = sched.sweep_at(at(2024, 12, 20, 18, 30)).await.unwrap();

        // the failed send is counted, the other task still gets its reminder
        assert_eq!(report.failures, 1);
        assert_eq!(report.reminded, vec!["2".to_string()]);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_isolates_delete_failures() {
        let mut tasks = BTreeMap::new();
        tasks.insert("1".into(), task("Ahmad", "Laporan", "19.12", "chat-a"));
        tasks.insert("2".into(), task("Budi", "Makalah", "20.12", "chat-b"));
        let mut repo = MemoryRepo::new(tasks);
        repo.fail_delete_id = Some("1".into());
        let (repo, _, sched) = scheduler(repo, MemorySender::default());

        let report = sched.sweep_at(at(2024, 12, 20, 18, 30)).await.unwrap();

        assert_eq!(report.failures, 1);
        assert_eq!(report.deleted, vec!["2".to_string()]);
        assert_eq!(repo.all_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_aborts_on_fetch_failure() {
        let mut repo = MemoryRepo::new(BTreeMap::new());
        repo.fail_fetch = true;
        let (_, sender, sched) = scheduler(repo, MemorySender::default());

        assert!(sched.sweep_at(at(2024, 12, 20, 18, 30)).await.is_err());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_until_next_fire() {
        let (_, _, sched) = scheduler(MemoryRepo::new(BTreeMap::new()), MemorySender::default());

        // 10:00 → 18:30 the same day
        let wait = sched.until_next_fire(at(2024, 12, 20, 10, 0));
        assert_eq!(wait, Duration::from_secs(8 * 3600 + 30 * 60));

        // 19:00 → 18:30 the next day
        let wait = sched.until_next_fire(at(2024, 12, 20, 19, 0));
        assert_eq!(wait, Duration::from_secs(23 * 3600 + 30 * 60));

        // exactly at the fire time → a full day
        let wait = sched.until_next_fire(at(2024, 12, 20, 18, 30));
        assert_eq!(wait, Duration::from_secs(24 * 3600));
    }
}
