//! Reminder store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `reminders` and the `deleted_reminders` shadow table.
//! - Publish the live, ordered reminder list to subscribers.
//!
//! # Invariants
//! - The live list is ordered by `date DESC, id DESC`.
//! - Inserting a reminder with `UNSAVED_REMINDER_ID` assigns a fresh id;
//!   any other id is kept as-is (undo path).
//! - `SqliteReminderStore` runs composite moves in a single transaction.

use crate::db::migrations::ensure_schema_current;
use crate::db::DbError;
use log::warn;
use crate::model::reminder::{DeletedReminder, Reminder, ReminderId, UNSAVED_REMINDER_ID};
use rusqlite::{params, Connection, Row, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

const REMINDER_SELECT_SQL: &str = "SELECT id, title, note, date, color FROM reminders";
const LIVE_ORDER_SQL: &str = " ORDER BY date DESC, id DESC";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for reminder persistence operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// No live reminder with this id.
    NotFound(ReminderId),
    /// No shadow row for this reminder id.
    DeletedNotFound(ReminderId),
    InvalidData(String),
    /// A previous holder of the connection lock panicked.
    LockPoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "reminder not found: {id}"),
            Self::DeletedNotFound(id) => write!(f, "deleted reminder not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid reminder data: {message}"),
            Self::LockPoisoned => write!(f, "reminder store lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence contract consumed by `ReminderCoordinator`.
///
/// Implementations must be shareable across blocking worker threads. The
/// composite moves (`soft_delete`, `restore_deleted`, `archive_all`) have
/// default implementations built from the primitives; stores that can make
/// them atomic should override them.
pub trait ReminderStore: Send + Sync + 'static {
    /// Subscribes to the live, ordered reminder list.
    fn subscribe(&self) -> watch::Receiver<Vec<Reminder>>;
    fn list_reminders(&self) -> RepoResult<Vec<Reminder>>;
    fn get_reminder(&self, id: ReminderId) -> RepoResult<Option<Reminder>>;
    /// Inserts a reminder and returns its (possibly newly assigned) id.
    fn insert_reminder(&self, reminder: &Reminder) -> RepoResult<ReminderId>;
    fn update_reminder(&self, reminder: &Reminder) -> RepoResult<()>;
    fn delete_reminder(&self, reminder: &Reminder) -> RepoResult<()>;
    fn insert_deleted(&self, deleted: &DeletedReminder) -> RepoResult<()>;
    fn delete_deleted(&self, deleted: &DeletedReminder) -> RepoResult<()>;
    /// Clears the live table and returns the number of removed rows.
    fn delete_all_live(&self) -> RepoResult<usize>;
    /// Lists shadow rows, most recently deleted first.
    fn list_deleted(&self) -> RepoResult<Vec<DeletedReminder>>;
    /// Permanently drops every shadow row.
    fn purge_deleted(&self) -> RepoResult<usize>;

    /// Moves one reminder into the shadow table.
    fn soft_delete(&self, reminder: &Reminder) -> RepoResult<DeletedReminder> {
        let deleted = DeletedReminder::from(reminder);
        self.insert_deleted(&deleted)?;
        self.delete_reminder(reminder)?;
        Ok(deleted)
    }

    /// Reverses `soft_delete`.
    fn restore_deleted(&self, reminder: &Reminder, deleted: &DeletedReminder) -> RepoResult<()> {
        self.delete_deleted(deleted)?;
        self.insert_reminder(reminder)?;
        Ok(())
    }

    /// Moves every live reminder into the shadow table.
    fn archive_all(&self) -> RepoResult<Vec<DeletedReminder>> {
        let deleted = self
            .list_reminders()?
            .iter()
            .map(DeletedReminder::from)
            .collect::<Vec<_>>();
        for row in &deleted {
            self.insert_deleted(row)?;
        }
        self.delete_all_live()?;
        Ok(deleted)
    }
}

/// SQLite-backed reminder store.
pub struct SqliteReminderStore {
    conn: Mutex<Connection>,
    live: watch::Sender<Vec<Reminder>>,
}

impl SqliteReminderStore {
    /// Wraps a migrated connection from `open_db`/`open_db_in_memory`.
    ///
    /// # Errors
    /// - `Db(OutdatedSchemaVersion)` when migrations were not applied.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_schema_current(&conn)?;
        let (live, _) = watch::channel(query_live(&conn)?);
        Ok(Self {
            conn: Mutex::new(conn),
            live,
        })
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepoError::LockPoisoned)
    }

    fn read<T>(&self, op: impl FnOnce(&Connection) -> RepoResult<T>) -> RepoResult<T> {
        let conn = self.lock()?;
        op(&*conn)
    }

    /// Runs `op` in a transaction and republishes the live list on commit.
    ///
    /// A failed republish leaves subscribers on the previous list but does
    /// not turn the committed write into an error.
    fn write<T>(&self, op: impl FnOnce(&Transaction<'_>) -> RepoResult<T>) -> RepoResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let output = op(&tx)?;
        tx.commit()?;

        match query_live(&conn) {
            Ok(reminders) => {
                self.live.send_replace(reminders);
            }
            Err(err) => {
                warn!("event=reminder_publish module=repo status=error error={err}");
            }
        }
        Ok(output)
    }
}

impl ReminderStore for SqliteReminderStore {
    fn subscribe(&self) -> watch::Receiver<Vec<Reminder>> {
        self.live.subscribe()
    }

    fn list_reminders(&self) -> RepoResult<Vec<Reminder>> {
        self.read(query_live)
    }

    fn get_reminder(&self, id: ReminderId) -> RepoResult<Option<Reminder>> {
        self.read(|conn| query_reminder(conn, id))
    }

    fn insert_reminder(&self, reminder: &Reminder) -> RepoResult<ReminderId> {
        self.write(|tx| insert_reminder_row(tx, reminder))
    }

    fn update_reminder(&self, reminder: &Reminder) -> RepoResult<()> {
        self.write(|tx| {
            let changed = tx.execute(
                "UPDATE reminders
                 SET title = ?1, note = ?2, date = ?3, color = ?4
                 WHERE id = ?5;",
                params![
                    reminder.title.as_str(),
                    reminder.note.as_str(),
                    reminder.date,
                    reminder.color,
                    reminder.id,
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(reminder.id));
            }
            Ok(())
        })
    }

    fn delete_reminder(&self, reminder: &Reminder) -> RepoResult<()> {
        self.write(|tx| delete_reminder_row(tx, reminder.id))
    }

    fn insert_deleted(&self, deleted: &DeletedReminder) -> RepoResult<()> {
        self.write(|tx| insert_deleted_row(tx, deleted))
    }

    fn delete_deleted(&self, deleted: &DeletedReminder) -> RepoResult<()> {
        self.write(|tx| delete_deleted_row(tx, deleted.reminder_id))
    }

    fn delete_all_live(&self) -> RepoResult<usize> {
        self.write(|tx| Ok(tx.execute("DELETE FROM reminders;", [])?))
    }

    fn list_deleted(&self) -> RepoResult<Vec<DeletedReminder>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT reminder_id, title, note, date, color
                 FROM deleted_reminders
                 ORDER BY deleted_at DESC, reminder_id DESC;",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(DeletedReminder {
                    reminder_id: row.get("reminder_id")?,
                    title: row.get("title")?,
                    note: row.get("note")?,
                    date: row.get("date")?,
                    color: row.get("color")?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    fn purge_deleted(&self) -> RepoResult<usize> {
        self.write(|tx| Ok(tx.execute("DELETE FROM deleted_reminders;", [])?))
    }

    fn soft_delete(&self, reminder: &Reminder) -> RepoResult<DeletedReminder> {
        let deleted = DeletedReminder::from(reminder);
        self.write(|tx| {
            insert_deleted_row(tx, &deleted)?;
            delete_reminder_row(tx, reminder.id)
        })?;
        Ok(deleted)
    }

    fn restore_deleted(&self, reminder: &Reminder, deleted: &DeletedReminder) -> RepoResult<()> {
        self.write(|tx| {
            delete_deleted_row(tx, deleted.reminder_id)?;
            insert_reminder_row(tx, reminder)?;
            Ok(())
        })
    }

    fn archive_all(&self) -> RepoResult<Vec<DeletedReminder>> {
        self.write(|tx| {
            let deleted = query_live(tx)?
                .iter()
                .map(DeletedReminder::from)
                .collect::<Vec<_>>();
            for row in &deleted {
                insert_deleted_row(tx, row)?;
            }
            tx.execute("DELETE FROM reminders;", [])?;
            Ok(deleted)
        })
    }
}

fn parse_reminder_row(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: row.get("id")?,
        title: row.get("title")?,
        note: row.get("note")?,
        date: row.get("date")?,
        color: row.get("color")?,
    })
}

fn query_live(conn: &Connection) -> RepoResult<Vec<Reminder>> {
    let mut stmt = conn.prepare(&format!("{REMINDER_SELECT_SQL}{LIVE_ORDER_SQL};"))?;
    let rows = stmt.query_map([], parse_reminder_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn query_reminder(conn: &Connection, id: ReminderId) -> RepoResult<Option<Reminder>> {
    let mut stmt = conn.prepare(&format!("{REMINDER_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_reminder_row(row)?));
    }

    Ok(None)
}

fn insert_reminder_row(conn: &Connection, reminder: &Reminder) -> RepoResult<ReminderId> {
    if reminder.id < UNSAVED_REMINDER_ID {
        return Err(RepoError::InvalidData(format!(
            "negative reminder id `{}`",
            reminder.id
        )));
    }

    conn.execute(
        "INSERT INTO reminders (id, title, note, date, color)
         VALUES (NULLIF(?1, 0), ?2, ?3, ?4, ?5);",
        params![
            reminder.id,
            reminder.title.as_str(),
            reminder.note.as_str(),
            reminder.date,
            reminder.color,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn delete_reminder_row(conn: &Connection, id: ReminderId) -> RepoResult<()> {
    let changed = conn.execute("DELETE FROM reminders WHERE id = ?1;", [id])?;
    if changed == 0 {
        return Err(RepoError::NotFound(id));
    }
    Ok(())
}

fn insert_deleted_row(conn: &Connection, deleted: &DeletedReminder) -> RepoResult<()> {
    if deleted.reminder_id <= UNSAVED_REMINDER_ID {
        return Err(RepoError::InvalidData(format!(
            "cannot shadow unsaved reminder id `{}`",
            deleted.reminder_id
        )));
    }

    // A reminder deleted, restored and deleted again replaces its old shadow.
    conn.execute(
        "INSERT OR REPLACE INTO deleted_reminders (reminder_id, title, note, date, color)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            deleted.reminder_id,
            deleted.title.as_str(),
            deleted.note.as_str(),
            deleted.date,
            deleted.color,
        ],
    )?;
    Ok(())
}

fn delete_deleted_row(conn: &Connection, reminder_id: ReminderId) -> RepoResult<()> {
    let changed = conn.execute(
        "DELETE FROM deleted_reminders WHERE reminder_id = ?1;",
        [reminder_id],
    )?;
    if changed == 0 {
        return Err(RepoError::DeletedNotFound(reminder_id));
    }
    Ok(())
}
