//! One-shot UI notifications and coordinator error modeling.

use crate::model::reminder::{DeletedReminder, Reminder, ReminderId};
use crate::repo::reminder_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::mpsc;
use tokio::task::JoinError;

/// Notification delivered at most once to the single event consumer.
#[derive(Debug)]
pub enum ReminderEvent {
    /// A blank save was dropped instead of persisted.
    ReminderDiscarded,
    /// A reminder was soft-deleted; pass both values to `undo_delete`.
    UndoDelete {
        reminder: Reminder,
        deleted: DeletedReminder,
    },
    /// The UI should open its share sheet for this reminder.
    ShareRequested(Reminder),
    /// An operation failed and left the store unchanged.
    OperationFailed(OperationFailure),
}

/// Coordinator entry point that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SelectForDisplay,
    Save,
    Duplicate,
    DeleteAll,
    Delete,
    UndoDelete,
    Share,
    PurgeDeleted,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelectForDisplay => "select_for_display",
            Self::Save => "save",
            Self::Duplicate => "duplicate",
            Self::DeleteAll => "delete_all",
            Self::Delete => "delete",
            Self::UndoDelete => "undo_delete",
            Self::Share => "share",
            Self::PurgeDeleted => "purge_deleted",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failed operation paired with its cause.
#[derive(Debug)]
pub struct OperationFailure {
    pub operation: Operation,
    pub error: CoordinatorError,
}

/// Coordinator-level error.
#[derive(Debug)]
pub enum CoordinatorError {
    /// Store I/O failure.
    Repo(RepoError),
    /// No reminder with this id exists.
    NotFound(ReminderId),
    /// Index does not address the last observed list snapshot.
    IndexOutOfRange { index: usize, len: usize },
    /// Background work panicked or was cancelled.
    Task(String),
    /// Constructed outside of a tokio runtime.
    NoRuntime,
}

impl Display for CoordinatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "reminder not found: {id}"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "reminder index {index} out of range for {len} reminders")
            }
            Self::Task(message) => write!(f, "background task failed: {message}"),
            Self::NoRuntime => write!(f, "reminder coordinator requires a tokio runtime"),
        }
    }
}

impl Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CoordinatorError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<JoinError> for CoordinatorError {
    fn from(value: JoinError) -> Self {
        Self::Task(value.to_string())
    }
}

/// Single-consumer receiving end of coordinator notifications.
///
/// Events are not replayed: whatever was received is gone for every later
/// observer.
#[derive(Debug)]
pub struct ReminderEvents {
    rx: mpsc::UnboundedReceiver<ReminderEvent>,
}

impl ReminderEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<ReminderEvent>) -> Self {
        Self { rx }
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> Option<ReminderEvent> {
        self.rx.recv().await
    }

    /// Returns the next event if one is already queued.
    pub fn try_next(&mut self) -> Option<ReminderEvent> {
        self.rx.try_recv().ok()
    }

    /// Drains every queued event.
    pub fn drain(&mut self) -> Vec<ReminderEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
