//! Read-only operator commands: sweep preview and health check.

use wabot_config::WabotConfig;
use wabot_store::{Db, RtdbTaskStore, TaskRepository};
use wabot_types::deadline;

/// List every stored task with its remaining days and what the next daily
/// sweep would do with it. Touches nothing.
pub async fn run_preview(config: WabotConfig) -> anyhow::Result<()> {
    let db = Db::new(&config.database.url, config.database.auth.clone());
    let store = RtdbTaskStore::new(db);

    let now = deadline::local_now(config.scheduler.utc_offset_minutes);
    let tasks = store.all_tasks().await?;

    if tasks.is_empty() {
        println!("No tasks stored.");
        return Ok(());
    }

    println!("Tasks as of {now} (sweep at {:02}:{:02}):", config.scheduler.hour, config.scheduler.minute);
    for (id, task) in &tasks {
        let sisa = deadline::remaining_days(&task.deadline, now);
        let action = if deadline::due_for_deletion(&task.deadline, now.date()) {
            "delete"
        } else if sisa > 0 && sisa <= config.scheduler.reminder_window_days {
            "remind"
        } else {
            "keep"
        };
        println!(
            "  {id}  {}: {} deadline {} sisa {sisa} hari -> {action}",
            task.dosen, task.nama_tugas, task.deadline
        );
    }

    Ok(())
}

/// Print a config summary and probe the database and every configured
/// WhatsApp bridge.
pub async fn run_health(config: WabotConfig) -> anyhow::Result<()> {
    println!("wabot configuration:");
    println!("  database url:  {}", mask_empty(&config.database.url));
    println!("  inference url: {}", mask_empty(&config.inference.url));
    println!(
        "  sweep:         {:02}:{:02} (UTC{:+})",
        config.scheduler.hour,
        config.scheduler.minute,
        config.scheduler.utc_offset_minutes / 60
    );
    println!("  channels:      {}", config.channels.len());

    let db = Db::new(&config.database.url, config.database.auth.clone());
    match db.get("tugas").await {
        Ok(_) => println!("database: reachable"),
        Err(e) => println!("database: UNREACHABLE ({e})"),
    }

    for (id, channel) in &config.channels {
        if channel.channel_type != "whatsapp" || !channel.enabled {
            continue;
        }
        let Some(bridge_url) = channel.settings.get("bridge_url").and_then(|v| v.as_str()) else {
            println!("bridge {id}: missing settings.bridge_url");
            continue;
        };
        let api_token = channel
            .settings
            .get("api_token")
            .and_then(|v| v.as_str())
            .map(String::from);
        let api = wabot_channel_whatsapp::api::BridgeApi::new(bridge_url, api_token);
        match api.status().await {
            Ok(status) => println!(
                "bridge {id}: reachable, connection {}{}",
                status.connection,
                status
                    .me
                    .map(|me| format!(", paired as {}", me.number()))
                    .unwrap_or_default()
            ),
            Err(e) => println!("bridge {id}: UNREACHABLE ({e})"),
        }
    }

    Ok(())
}

fn mask_empty(s: &str) -> &str {
    if s.is_empty() { "(not set)" } else { s }
}
