//! Reminder list screen state holder.
//!
//! # Responsibility
//! - Translate UI intents into `ReminderStore` calls.
//! - Hold transient screen state: active color and displayed reminder.
//! - Publish one-shot notifications through `ReminderEvents`.
//!
//! # Invariants
//! - Blank saves never reach the store; they emit `ReminderDiscarded` once,
//!   after the configured delay.
//! - Every failure is reported as `ReminderEvent::OperationFailed`.
//! - Pending work is aborted when the coordinator is dropped.
//! - Two operations launched back to back are not ordered against each
//!   other here; the store is the only synchronization point.

use crate::config::CoordinatorConfig;
use crate::model::reminder::{ColorCode, DeletedReminder, Reminder, ReminderId};
use crate::repo::reminder_repo::{ReminderStore, RepoResult};
use crate::service::events::{
    CoordinatorError, Operation, OperationFailure, ReminderEvent, ReminderEvents,
};
use log::{debug, error, info, warn};
use std::future::{poll_fn, Future};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Poll;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};

type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Mediates between the reminder list screen and a `ReminderStore`.
pub struct ReminderCoordinator<S: ReminderStore> {
    store: Arc<S>,
    config: CoordinatorConfig,
    active_color: Arc<AtomicI32>,
    reminders: watch::Receiver<Vec<Reminder>>,
    displayed: Arc<watch::Sender<Option<Reminder>>>,
    events: mpsc::UnboundedSender<ReminderEvent>,
    tasks: Mutex<JoinSet<()>>,
    runtime: Handle,
}

impl<S: ReminderStore> ReminderCoordinator<S> {
    /// Creates a coordinator bound to the current tokio runtime.
    ///
    /// Returns the coordinator together with the only receiver of its
    /// one-shot events.
    ///
    /// # Errors
    /// - `NoRuntime` when called outside of a tokio runtime.
    pub fn new(
        store: Arc<S>,
        config: CoordinatorConfig,
    ) -> CoordinatorResult<(Self, ReminderEvents)> {
        let runtime = Handle::try_current().map_err(|_| CoordinatorError::NoRuntime)?;
        let (events, events_rx) = mpsc::unbounded_channel();
        let (displayed, _) = watch::channel(None);
        let reminders = store.subscribe();

        let coordinator = Self {
            active_color: Arc::new(AtomicI32::new(config.initial_color)),
            store,
            config,
            reminders,
            displayed: Arc::new(displayed),
            events,
            tasks: Mutex::new(JoinSet::new()),
            runtime,
        };
        Ok((coordinator, ReminderEvents::new(events_rx)))
    }

    /// Live, ordered reminder list as published by the store.
    pub fn reminders(&self) -> watch::Receiver<Vec<Reminder>> {
        self.reminders.clone()
    }

    /// Reminder currently opened in the detail view.
    pub fn displayed(&self) -> watch::Receiver<Option<Reminder>> {
        self.displayed.subscribe()
    }

    pub fn active_color(&self) -> ColorCode {
        self.active_color.load(Ordering::SeqCst)
    }

    /// Sets the color applied by subsequent saves.
    pub fn set_active_color(&self, color: ColorCode) {
        debug!("event=reminder_color module=coordinator status=ok color={color}");
        self.active_color.store(color, Ordering::SeqCst);
    }

    /// Loads a reminder into the detail view and adopts its color.
    ///
    /// A missing id reports `NotFound` and leaves both the displayed value
    /// and the active color untouched.
    pub fn select_for_display(&self, id: ReminderId) {
        let store = Arc::clone(&self.store);
        let displayed = Arc::clone(&self.displayed);
        let active_color = Arc::clone(&self.active_color);

        self.launch(Operation::SelectForDisplay, async move {
            let reminder = run_on_store(&store, move |store| store.get_reminder(id))
                .await?
                .ok_or(CoordinatorError::NotFound(id))?;
            active_color.store(reminder.color, Ordering::SeqCst);
            displayed.send_replace(Some(reminder));
            debug!("event=reminder_select module=coordinator status=ok id={id}");
            Ok(())
        });
    }

    /// Persists editor input, or discards it when title and note are empty.
    ///
    /// `is_update` selects between updating `id` and inserting a new row.
    pub fn save(&self, title: &str, note: &str, date: i64, is_update: bool, id: ReminderId) {
        let mut reminder = Reminder::new(title, note, date, self.active_color());

        if reminder.is_blank() {
            let events = self.events.clone();
            let delay = self.config.discard_delay;
            self.launch(Operation::Save, async move {
                tokio::time::sleep(delay).await;
                info!("event=reminder_discard module=coordinator status=ok");
                emit(&events, ReminderEvent::ReminderDiscarded);
                Ok(())
            });
            return;
        }

        let store = Arc::clone(&self.store);
        if is_update {
            reminder.id = id;
            self.launch(Operation::Save, async move {
                run_on_store(&store, move |store| store.update_reminder(&reminder)).await?;
                info!("event=reminder_update module=coordinator status=ok id={id}");
                Ok(())
            });
        } else {
            self.launch(Operation::Save, async move {
                let new_id =
                    run_on_store(&store, move |store| store.insert_reminder(&reminder)).await?;
                info!("event=reminder_insert module=coordinator status=ok id={new_id}");
                Ok(())
            });
        }
    }

    /// Inserts a copy of the reminder at `index` with a fresh identity.
    pub fn duplicate(&self, index: usize) {
        let copy = match self.reminder_at(index) {
            Ok(source) => source.duplicate(),
            Err(err) => return self.report(Operation::Duplicate, err),
        };

        let store = Arc::clone(&self.store);
        self.launch(Operation::Duplicate, async move {
            let new_id = run_on_store(&store, move |store| store.insert_reminder(&copy)).await?;
            info!("event=reminder_duplicate module=coordinator status=ok index={index} id={new_id}");
            Ok(())
        });
    }

    /// Moves every live reminder into the deleted table in one step.
    ///
    /// The store archives its persisted set, not the last observed snapshot;
    /// a size mismatch between the two is logged.
    pub fn delete_all(&self) {
        let observed = self.reminders.borrow().len();
        let store = Arc::clone(&self.store);

        self.launch(Operation::DeleteAll, async move {
            let archived = run_on_store(&store, |store| store.archive_all()).await?;
            if archived.len() != observed {
                warn!(
                    "event=reminder_delete_all module=coordinator status=stale_snapshot observed={observed} archived={}",
                    archived.len()
                );
            }
            info!(
                "event=reminder_delete_all module=coordinator status=ok archived={}",
                archived.len()
            );
            Ok(())
        });
    }

    /// Soft-deletes the reminder at `index` of the last observed list.
    pub fn delete_at(&self, index: usize) {
        match self.reminder_at(index) {
            Ok(reminder) => self.delete_reminder(reminder),
            Err(err) => self.report(Operation::Delete, err),
        }
    }

    /// Soft-deletes `reminder` and emits `UndoDelete` with its shadow copy.
    pub fn delete_reminder(&self, reminder: Reminder) {
        let store = Arc::clone(&self.store);
        let events = self.events.clone();

        self.launch(Operation::Delete, async move {
            let to_delete = reminder.clone();
            let deleted = run_on_store(&store, move |store| store.soft_delete(&to_delete)).await?;
            info!(
                "event=reminder_delete module=coordinator status=ok id={}",
                reminder.id
            );
            emit(&events, ReminderEvent::UndoDelete { reminder, deleted });
            Ok(())
        });
    }

    /// Reverses a soft delete using the pair carried by `UndoDelete`.
    pub fn undo_delete(&self, reminder: Reminder, deleted: DeletedReminder) {
        let store = Arc::clone(&self.store);
        let id = reminder.id;

        self.launch(Operation::UndoDelete, async move {
            run_on_store(&store, move |store| store.restore_deleted(&reminder, &deleted)).await?;
            info!("event=reminder_undo_delete module=coordinator status=ok id={id}");
            Ok(())
        });
    }

    /// Asks the UI to share the reminder at `index`.
    pub fn share_at(&self, index: usize) {
        match self.reminder_at(index) {
            Ok(reminder) => {
                debug!(
                    "event=reminder_share module=coordinator status=ok id={}",
                    reminder.id
                );
                emit(&self.events, ReminderEvent::ShareRequested(reminder));
            }
            Err(err) => self.report(Operation::Share, err),
        }
    }

    /// Lists soft-deleted reminders, most recent first.
    pub async fn deleted_reminders(&self) -> CoordinatorResult<Vec<DeletedReminder>> {
        run_on_store(&self.store, |store| store.list_deleted()).await
    }

    /// Permanently drops every soft-deleted reminder.
    pub fn purge_deleted(&self) {
        let store = Arc::clone(&self.store);
        self.launch(Operation::PurgeDeleted, async move {
            let purged = run_on_store(&store, |store| store.purge_deleted()).await?;
            info!("event=reminder_purge module=coordinator status=ok purged={purged}");
            Ok(())
        });
    }

    /// Waits until every launched operation has finished.
    ///
    /// Operations launched while waiting are awaited too. Tasks stay owned by
    /// the coordinator, so dropping this future cancels only the wait.
    pub async fn settle(&self) {
        poll_fn(|cx| {
            let mut tasks = self.lock_tasks();
            loop {
                match tasks.poll_join_next(cx) {
                    Poll::Ready(Some(result)) => log_join_result(result),
                    Poll::Ready(None) => return Poll::Ready(()),
                    Poll::Pending => return Poll::Pending,
                }
            }
        })
        .await
    }

    /// Aborts all pending operations.
    pub fn shutdown(&self) {
        let mut tasks = self.lock_tasks();
        if !tasks.is_empty() {
            info!(
                "event=coordinator_shutdown module=coordinator status=ok aborted={}",
                tasks.len()
            );
        }
        tasks.abort_all();
    }

    fn reminder_at(&self, index: usize) -> CoordinatorResult<Reminder> {
        let snapshot = self.reminders.borrow();
        snapshot
            .get(index)
            .cloned()
            .ok_or(CoordinatorError::IndexOutOfRange {
                index,
                len: snapshot.len(),
            })
    }

    fn launch<F>(&self, operation: Operation, work: F)
    where
        F: Future<Output = CoordinatorResult<()>> + Send + 'static,
    {
        let events = self.events.clone();
        let task = async move {
            if let Err(error) = work.await {
                report_failure(&events, operation, error);
            }
        };

        let mut tasks = self.lock_tasks();
        while let Some(result) = tasks.try_join_next() {
            log_join_result(result);
        }
        tasks.spawn_on(task, &self.runtime);
    }

    fn report(&self, operation: Operation, error: CoordinatorError) {
        report_failure(&self.events, operation, error);
    }

    fn lock_tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs a synchronous store call on the blocking pool.
async fn run_on_store<S, T, F>(store: &Arc<S>, op: F) -> CoordinatorResult<T>
where
    S: ReminderStore,
    T: Send + 'static,
    F: FnOnce(&S) -> RepoResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    let result = tokio::task::spawn_blocking(move || op(&store)).await?;
    Ok(result?)
}

fn emit(events: &mpsc::UnboundedSender<ReminderEvent>, event: ReminderEvent) {
    if events.send(event).is_err() {
        debug!("event=reminder_event module=coordinator status=dropped reason=no_consumer");
    }
}

fn report_failure(
    events: &mpsc::UnboundedSender<ReminderEvent>,
    operation: Operation,
    error: CoordinatorError,
) {
    warn!("event=reminder_op module=coordinator status=error op={operation} error={error}");
    emit(
        events,
        ReminderEvent::OperationFailed(OperationFailure { operation, error }),
    );
}

fn log_join_result(result: Result<(), JoinError>) {
    match result {
        Ok(()) => {}
        Err(err) if err.is_cancelled() => {
            debug!("event=reminder_task module=coordinator status=cancelled");
        }
        Err(err) => {
            error!("event=reminder_task module=coordinator status=error error={err}");
        }
    }
}
