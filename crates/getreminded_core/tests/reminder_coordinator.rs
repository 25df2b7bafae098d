use getreminded_core::db::open_db_in_memory;
use getreminded_core::{
    CoordinatorConfig, CoordinatorError, DeletedReminder, Operation, OperationFailure,
    Reminder, ReminderCoordinator, ReminderEvent, ReminderEvents, ReminderId, ReminderStore,
    RepoError, RepoResult, SqliteReminderStore, DEFAULT_DISCARD_DELAY,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

type Fixture = (
    ReminderCoordinator<SqliteReminderStore>,
    ReminderEvents,
    Arc<SqliteReminderStore>,
);

fn setup() -> Fixture {
    let store = Arc::new(SqliteReminderStore::try_new(open_db_in_memory().unwrap()).unwrap());
    let (coordinator, events) =
        ReminderCoordinator::new(Arc::clone(&store), CoordinatorConfig::default()).unwrap();
    (coordinator, events, store)
}

fn seed(store: &SqliteReminderStore, titles: &[&str]) -> Vec<Reminder> {
    for (index, title) in titles.iter().enumerate() {
        store
            .insert_reminder(&Reminder::new(*title, "note", index as i64, 1))
            .unwrap();
    }
    store.list_reminders().unwrap()
}

fn expect_failure(event: Option<ReminderEvent>) -> OperationFailure {
    match event {
        Some(ReminderEvent::OperationFailed(failure)) => failure,
        other => panic!("expected OperationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn save_inserts_reminder_with_active_color() {
    let (coordinator, mut events, store) = setup();
    coordinator.set_active_color(5);

    coordinator.save("Buy milk", "", 1_000, false, 0);
    coordinator.settle().await;

    let live = store.list_reminders().unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].title, "Buy milk");
    assert_eq!(live[0].note, "");
    assert_eq!(live[0].date, 1_000);
    assert_eq!(live[0].color, 5);
    assert!(events.try_next().is_none());
}

#[tokio::test]
async fn save_with_note_only_is_persisted() {
    let (coordinator, _events, store) = setup();

    coordinator.save("", "just a note", 1, false, 0);
    coordinator.settle().await;

    assert_eq!(store.list_reminders().unwrap()[0].note, "just a note");
}

#[tokio::test]
async fn save_update_rewrites_existing_row() {
    let (coordinator, _events, store) = setup();
    let id = seed(&store, &["draft"])[0].id;
    coordinator.set_active_color(7);

    coordinator.save("final", "body", 99, true, id);
    coordinator.settle().await;

    let live = store.list_reminders().unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(
        live[0],
        Reminder {
            id,
            title: "final".to_string(),
            note: "body".to_string(),
            date: 99,
            color: 7,
        }
    );
}

#[tokio::test]
async fn save_update_of_missing_row_reports_not_found() {
    let (coordinator, mut events, store) = setup();

    coordinator.save("title", "", 1, true, 404);
    coordinator.settle().await;

    let failure = expect_failure(events.try_next());
    assert_eq!(failure.operation, Operation::Save);
    assert!(matches!(failure.error, CoordinatorError::NotFound(404)));
    assert!(store.list_reminders().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn blank_save_emits_one_discard_after_delay() {
    let (coordinator, mut events, store) = setup();
    let started = tokio::time::Instant::now();

    coordinator.save("", "", 1, false, 0);
    assert!(events.try_next().is_none());
    coordinator.settle().await;

    assert!(started.elapsed() >= DEFAULT_DISCARD_DELAY);
    let emitted = events.drain();
    assert_eq!(emitted.len(), 1);
    assert!(matches!(emitted[0], ReminderEvent::ReminderDiscarded));
    assert!(store.list_reminders().unwrap().is_empty());
}

#[tokio::test]
async fn blank_update_is_discarded_too() {
    let store = Arc::new(SqliteReminderStore::try_new(open_db_in_memory().unwrap()).unwrap());
    let original = seed(&store, &["keep me"]).remove(0);
    let config = CoordinatorConfig::default().with_discard_delay(Duration::ZERO);
    let (coordinator, mut events) = ReminderCoordinator::new(Arc::clone(&store), config).unwrap();

    coordinator.save("", "", 1, true, original.id);
    coordinator.settle().await;

    assert!(matches!(
        events.try_next(),
        Some(ReminderEvent::ReminderDiscarded)
    ));
    assert_eq!(store.list_reminders().unwrap(), vec![original]);
}

#[tokio::test]
async fn select_for_display_publishes_reminder_and_adopts_color() {
    let (coordinator, _events, store) = setup();
    let id = store
        .insert_reminder(&Reminder::new("pick me", "", 1, 9))
        .unwrap();
    let displayed = coordinator.displayed();

    coordinator.select_for_display(id);
    coordinator.settle().await;

    let current = displayed.borrow().clone().expect("displayed reminder");
    assert_eq!(current.id, id);
    assert_eq!(current.title, "pick me");
    assert_eq!(coordinator.active_color(), 9);
}

#[tokio::test]
async fn select_missing_reports_not_found_and_keeps_state() {
    let (coordinator, mut events, _store) = setup();
    coordinator.set_active_color(3);

    coordinator.select_for_display(12);
    coordinator.settle().await;

    let failure = expect_failure(events.try_next());
    assert_eq!(failure.operation, Operation::SelectForDisplay);
    assert!(matches!(failure.error, CoordinatorError::NotFound(12)));
    assert!(coordinator.displayed().borrow().is_none());
    assert_eq!(coordinator.active_color(), 3);
}

#[tokio::test]
async fn duplicate_adds_copy_with_new_identity() {
    let (coordinator, _events, store) = setup();
    let before = seed(&store, &["first", "second"]);
    let source = before[1].clone();

    coordinator.duplicate(1);
    coordinator.settle().await;

    let after = store.list_reminders().unwrap();
    assert_eq!(after.len(), before.len() + 1);
    let copy = after
        .iter()
        .find(|reminder| !before.iter().any(|old| old.id == reminder.id))
        .expect("duplicated reminder");
    assert_ne!(copy.id, source.id);
    assert_eq!(copy.title, source.title);
    assert_eq!(copy.note, source.note);
    assert_eq!(copy.date, source.date);
    assert_eq!(copy.color, source.color);
}

#[tokio::test]
async fn index_operations_out_of_range_report_failures() {
    let (coordinator, mut events, store) = setup();
    seed(&store, &["only"]);

    coordinator.duplicate(1);
    coordinator.delete_at(5);
    coordinator.share_at(2);
    coordinator.settle().await;

    let operations = events
        .drain()
        .into_iter()
        .map(|event| {
            let failure = expect_failure(Some(event));
            assert!(matches!(
                failure.error,
                CoordinatorError::IndexOutOfRange { len: 1, .. }
            ));
            failure.operation
        })
        .collect::<Vec<_>>();
    assert_eq!(
        operations,
        vec![Operation::Duplicate, Operation::Delete, Operation::Share]
    );
    assert_eq!(store.list_reminders().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_at_then_undo_restores_original() {
    let (coordinator, mut events, store) = setup();
    let before = seed(&store, &["a", "b", "c"]);

    coordinator.delete_at(1);
    coordinator.settle().await;

    let (reminder, deleted) = match events.try_next() {
        Some(ReminderEvent::UndoDelete { reminder, deleted }) => (reminder, deleted),
        other => panic!("expected UndoDelete, got {other:?}"),
    };
    assert_eq!(reminder, before[1]);
    assert_eq!(deleted, DeletedReminder::from(&before[1]));
    assert_eq!(store.list_reminders().unwrap().len(), 2);
    assert_eq!(store.list_deleted().unwrap(), vec![deleted.clone()]);

    coordinator.undo_delete(reminder, deleted);
    coordinator.settle().await;

    assert_eq!(store.list_reminders().unwrap(), before);
    assert!(store.list_deleted().unwrap().is_empty());
    assert!(events.try_next().is_none());
}

#[tokio::test]
async fn undo_twice_reports_missing_shadow_row() {
    let (coordinator, mut events, store) = setup();
    let reminder = seed(&store, &["once"]).remove(0);

    coordinator.delete_reminder(reminder);
    coordinator.settle().await;
    let (reminder, deleted) = match events.try_next() {
        Some(ReminderEvent::UndoDelete { reminder, deleted }) => (reminder, deleted),
        other => panic!("expected UndoDelete, got {other:?}"),
    };

    coordinator.undo_delete(reminder.clone(), deleted.clone());
    coordinator.settle().await;
    coordinator.undo_delete(reminder, deleted);
    coordinator.settle().await;

    let failure = expect_failure(events.try_next());
    assert_eq!(failure.operation, Operation::UndoDelete);
    assert!(matches!(
        failure.error,
        CoordinatorError::Repo(RepoError::DeletedNotFound(_))
    ));
    assert_eq!(store.list_reminders().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_all_moves_every_reminder_for_any_size() {
    for count in 0..4 {
        let (coordinator, mut events, store) = setup();
        let titles = (0..count).map(|index| format!("r{index}")).collect::<Vec<_>>();
        let titles = titles.iter().map(String::as_str).collect::<Vec<_>>();
        seed(&store, &titles);

        coordinator.delete_all();
        coordinator.settle().await;

        assert!(store.list_reminders().unwrap().is_empty());
        assert_eq!(store.list_deleted().unwrap().len(), count);
        assert!(coordinator.reminders().borrow().is_empty());
        assert!(events.try_next().is_none());
    }
}

#[tokio::test]
async fn share_at_emits_request_without_persistence_change() {
    let (coordinator, mut events, store) = setup();
    let before = seed(&store, &["share me", "other"]);

    coordinator.share_at(0);

    match events.try_next() {
        Some(ReminderEvent::ShareRequested(reminder)) => assert_eq!(reminder, before[0]),
        other => panic!("expected ShareRequested, got {other:?}"),
    }
    coordinator.settle().await;
    assert_eq!(store.list_reminders().unwrap(), before);
}

#[tokio::test]
async fn reminders_receiver_follows_store_mutations() {
    let (coordinator, _events, _store) = setup();
    let mut reminders = coordinator.reminders();

    coordinator.save("watched", "", 1, false, 0);
    coordinator.settle().await;

    assert!(reminders.has_changed().unwrap());
    assert_eq!(reminders.borrow_and_update()[0].title, "watched");
}

#[tokio::test]
async fn purge_deleted_clears_trash() {
    let (coordinator, _events, store) = setup();
    seed(&store, &["x", "y"]);

    coordinator.delete_all();
    coordinator.settle().await;
    assert_eq!(coordinator.deleted_reminders().await.unwrap().len(), 2);

    coordinator.purge_deleted();
    coordinator.settle().await;
    assert!(coordinator.deleted_reminders().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropping_coordinator_cancels_pending_work() {
    let (coordinator, mut events, _store) = setup();

    coordinator.save("", "", 1, false, 0);
    drop(coordinator);

    assert!(events.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_pending_discard() {
    let (coordinator, mut events, _store) = setup();

    coordinator.save("", "", 1, false, 0);
    coordinator.shutdown();
    coordinator.settle().await;
    tokio::time::sleep(DEFAULT_DISCARD_DELAY * 2).await;

    assert!(events.try_next().is_none());
}

#[tokio::test(start_paused = true)]
async fn abandoned_settle_keeps_pending_operations_alive() {
    let (coordinator, mut events, _store) = setup();

    coordinator.save("", "", 1, false, 0);
    let waited = tokio::time::timeout(Duration::from_millis(10), coordinator.settle()).await;
    assert!(waited.is_err());

    tokio::time::sleep(DEFAULT_DISCARD_DELAY).await;
    coordinator.settle().await;

    let emitted = events.drain();
    assert_eq!(emitted.len(), 1);
    assert!(matches!(emitted[0], ReminderEvent::ReminderDiscarded));
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_settle_reaches_pending_tasks() {
    let (coordinator, mut events, _store) = setup();

    coordinator.save("", "", 1, false, 0);
    tokio::join!(coordinator.settle(), async {
        tokio::task::yield_now().await;
        coordinator.shutdown();
    });
    tokio::time::sleep(DEFAULT_DISCARD_DELAY * 2).await;

    assert!(events.try_next().is_none());
}

#[test]
fn new_outside_runtime_is_rejected() {
    let store = Arc::new(SqliteReminderStore::try_new(open_db_in_memory().unwrap()).unwrap());
    let result = ReminderCoordinator::new(store, CoordinatorConfig::default());
    assert!(matches!(result.err(), Some(CoordinatorError::NoRuntime)));
}

/// Store whose every call fails, standing in for an unavailable database.
struct OfflineStore {
    live: watch::Sender<Vec<Reminder>>,
}

impl OfflineStore {
    fn new(snapshot: Vec<Reminder>) -> Self {
        Self {
            live: watch::channel(snapshot).0,
        }
    }
}

fn offline<T>() -> RepoResult<T> {
    Err(RepoError::InvalidData("store offline".to_string()))
}

impl ReminderStore for OfflineStore {
    fn subscribe(&self) -> watch::Receiver<Vec<Reminder>> {
        self.live.subscribe()
    }
    fn list_reminders(&self) -> RepoResult<Vec<Reminder>> {
        offline()
    }
    fn get_reminder(&self, _id: ReminderId) -> RepoResult<Option<Reminder>> {
        offline()
    }
    fn insert_reminder(&self, _reminder: &Reminder) -> RepoResult<ReminderId> {
        offline()
    }
    fn update_reminder(&self, _reminder: &Reminder) -> RepoResult<()> {
        offline()
    }
    fn delete_reminder(&self, _reminder: &Reminder) -> RepoResult<()> {
        offline()
    }
    fn insert_deleted(&self, _deleted: &DeletedReminder) -> RepoResult<()> {
        offline()
    }
    fn delete_deleted(&self, _deleted: &DeletedReminder) -> RepoResult<()> {
        offline()
    }
    fn delete_all_live(&self) -> RepoResult<usize> {
        offline()
    }
    fn list_deleted(&self) -> RepoResult<Vec<DeletedReminder>> {
        offline()
    }
    fn purge_deleted(&self) -> RepoResult<usize> {
        offline()
    }
}

#[tokio::test]
async fn store_failures_surface_as_operation_failed() {
    let mut cached = Reminder::new("cached", "", 1, 0);
    cached.id = 1;
    let store = Arc::new(OfflineStore::new(vec![cached]));
    let (coordinator, mut events) =
        ReminderCoordinator::new(store, CoordinatorConfig::default()).unwrap();

    coordinator.save("t", "", 1, false, 0);
    coordinator.settle().await;
    coordinator.delete_at(0);
    coordinator.settle().await;
    coordinator.delete_all();
    coordinator.settle().await;

    let operations = events
        .drain()
        .into_iter()
        .map(|event| {
            let failure = expect_failure(Some(event));
            assert!(matches!(
                failure.error,
                CoordinatorError::Repo(RepoError::InvalidData(_))
            ));
            failure.operation
        })
        .collect::<Vec<_>>();
    assert_eq!(
        operations,
        vec![Operation::Save, Operation::Delete, Operation::DeleteAll]
    );
}
