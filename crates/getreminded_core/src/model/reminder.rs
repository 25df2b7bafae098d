//! Reminder and deleted-reminder records.
//!
//! # Responsibility
//! - Define the canonical reminder record shown in the list screen.
//! - Provide the pure mapping used by soft delete and undo.
//!
//! # Invariants
//! - `id == UNSAVED_REMINDER_ID` means "let the store assign an identity".
//! - `DeletedReminder::from(&r).restore() == r` for every reminder `r`.

use serde::{Deserialize, Serialize};

/// Store-assigned reminder identity.
pub type ReminderId = i64;

/// Color code stored with every reminder card.
pub type ColorCode = i32;

/// Identity placeholder for reminders that were never persisted.
pub const UNSAVED_REMINDER_ID: ReminderId = 0;

/// Color used before the user picks one.
pub const DEFAULT_COLOR: ColorCode = 0;

/// Live reminder record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Row id. `UNSAVED_REMINDER_ID` until the store assigns one.
    pub id: ReminderId,
    pub title: String,
    pub note: String,
    /// Creation/display date in epoch milliseconds.
    pub date: i64,
    pub color: ColorCode,
}

impl Reminder {
    /// Creates a reminder that has not been persisted yet.
    pub fn new(
        title: impl Into<String>,
        note: impl Into<String>,
        date: i64,
        color: ColorCode,
    ) -> Self {
        Self {
            id: UNSAVED_REMINDER_ID,
            title: title.into(),
            note: note.into(),
            date,
            color,
        }
    }

    /// Returns whether both user-entered fields are empty.
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.note.is_empty()
    }

    /// Copies content fields and drops identity so insert assigns a new id.
    pub fn duplicate(&self) -> Self {
        Self {
            id: UNSAVED_REMINDER_ID,
            ..self.clone()
        }
    }

    /// Plain-text payload handed to the platform share sheet.
    ///
    /// Empty fields are skipped so a title-only reminder shares just the
    /// title.
    pub fn share_text(&self) -> String {
        match (self.title.is_empty(), self.note.is_empty()) {
            (false, false) => format!("{}\n\n{}", self.title, self.note),
            (false, true) => self.title.clone(),
            (true, false) => self.note.clone(),
            (true, true) => String::new(),
        }
    }
}

/// Shadow copy written to `deleted_reminders` on soft delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedReminder {
    /// Id of the live row this copy was taken from.
    pub reminder_id: ReminderId,
    pub title: String,
    pub note: String,
    pub date: i64,
    pub color: ColorCode,
}

impl DeletedReminder {
    /// Rebuilds the live record, keeping its original identity.
    pub fn restore(&self) -> Reminder {
        Reminder {
            id: self.reminder_id,
            title: self.title.clone(),
            note: self.note.clone(),
            date: self.date,
            color: self.color,
        }
    }
}

impl From<&Reminder> for DeletedReminder {
    fn from(reminder: &Reminder) -> Self {
        Self {
            reminder_id: reminder.id,
            title: reminder.title.clone(),
            note: reminder.note.clone(),
            date: reminder.date,
            color: reminder.color,
        }
    }
}
