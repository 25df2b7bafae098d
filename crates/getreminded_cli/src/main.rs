//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `getreminded_core` wiring end to end against a real database.
//! - Keep output deterministic JSON lines for quick local sanity checks.
//!
//! Usage: `getreminded_cli [db_path] [title] [note]`
//! - `db_path` falls back to `GETREMINDED_DB`, then to an in-memory database.
//! - `GETREMINDED_LOG_DIR` enables file logging; `GETREMINDED_LOG_LEVEL`
//!   overrides the build-mode default level.

use getreminded_core::db::{open_db, open_db_in_memory};
use getreminded_core::{
    core_version, default_log_level, init_logging, CoordinatorConfig, ReminderCoordinator,
    ReminderEvent, SqliteReminderStore,
};
use std::error::Error;
use std::sync::Arc;
use std::num::TryFromIntError;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let db_path = args.next().or_else(|| std::env::var("GETREMINDED_DB").ok());
    let title = args.next().unwrap_or_else(|| "getreminded smoke".to_string());
    let note = args.next().unwrap_or_default();

    if let Ok(log_dir) = std::env::var("GETREMINDED_LOG_DIR") {
        let level = std::env::var("GETREMINDED_LOG_LEVEL")
            .unwrap_or_else(|_| default_log_level().to_string());
        init_logging(&level, &log_dir)?;
    }

    let conn = match db_path.as_deref() {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let store = Arc::new(SqliteReminderStore::try_new(conn)?);
    let (coordinator, mut events) =
        ReminderCoordinator::new(store, CoordinatorConfig::default())?;

    println!("getreminded_core version={}", core_version());

    let now_ms = epoch_millis(SystemTime::now().duration_since(UNIX_EPOCH)?)?;
    coordinator.save(&title, &note, now_ms, false, 0);
    coordinator.settle().await;
    coordinator.share_at(0);

    for event in events.drain() {
        match event {
            ReminderEvent::ShareRequested(reminder) => {
                println!("share={}", serde_json::to_string(&reminder.share_text())?);
            }
            ReminderEvent::ReminderDiscarded => println!("discarded"),
            ReminderEvent::OperationFailed(failure) => {
                log::warn!(
                    "event=cli_smoke module=cli status=error op={} error={}",
                    failure.operation,
                    failure.error
                );
                println!("failed op={} error={}", failure.operation, failure.error);
            }
            ReminderEvent::UndoDelete { .. } => {}
        }
    }

    let reminders = coordinator.reminders().borrow().clone();
    println!("reminders={}", serde_json::to_string(&reminders)?);
    Ok(())
}

/// Converts time since the epoch to the millisecond dates stored on reminders.
fn epoch_millis(since_epoch: Duration) -> Result<i64, TryFromIntError> {
    i64::try_from(since_epoch.as_millis())
}
