//! Core domain logic for GetReminded.
//! Owns the reminder model, its SQLite store and the list screen coordinator.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{CoordinatorConfig, DEFAULT_DISCARD_DELAY};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::reminder::{
    ColorCode, DeletedReminder, Reminder, ReminderId, DEFAULT_COLOR, UNSAVED_REMINDER_ID,
};
pub use repo::reminder_repo::{ReminderStore, RepoError, RepoResult, SqliteReminderStore};
pub use service::events::{
    CoordinatorError, Operation, OperationFailure, ReminderEvent, ReminderEvents,
};
pub use service::reminder_coordinator::ReminderCoordinator;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
