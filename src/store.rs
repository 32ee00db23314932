//! The task list store: owns both lists, the recap history and the small
//! amount of session state (edit mode, the new-task input), and writes every
//! change through to a [`KeyValueStore`].
//!
//! Storage failures never undo a change. The in-memory state stays
//! authoritative; the failure is logged, kept in
//! [`TaskListStore::last_persist_error`] and published as
//! [`StoreEvent::PersistenceFailed`].

use chrono::{DateTime, Utc};

use crate::events::{EventBus, StoreEvent};
use crate::io::kv::{KeyValueStore, StorageError};
use crate::io::state;
use crate::model::config::DefaultsConfig;
use crate::model::item::{IdGenerator, Item, ItemId};
use crate::model::list::{ListId, TaskLists};
use crate::model::recap::{Mood, RecapRecord};
use crate::ops::recap_ops::{self, Progress};
use crate::ops::sample;
use crate::ops::task_ops::{self, TaskError};

pub struct TaskListStore<S: KeyValueStore> {
    backend: S,
    events: EventBus<StoreEvent>,
    lists: TaskLists,
    recaps: Vec<RecapRecord>,
    target_tasks: u32,
    display_name: Option<String>,
    ids: IdGenerator,
    editing: Option<ItemId>,
    input: String,
    last_persist_error: Option<String>,
}

impl<S: KeyValueStore> TaskListStore<S> {
    /// Load whatever `backend` holds. Lists that break the list invariants
    /// are repaired and written back.
    pub fn open(backend: S, events: EventBus<StoreEvent>, defaults: &DefaultsConfig) -> Self {
        let loaded = state::load_state(&backend);
        let mut ids = IdGenerator::new();
        let mut lists = loaded.lists;
        let fixes = task_ops::repair(&mut lists, &mut ids);

        let mut store = TaskListStore {
            backend,
            events,
            lists,
            recaps: loaded.recaps,
            target_tasks: loaded.target_tasks.filter(|t| *t > 0).unwrap_or(defaults.target_tasks),
            display_name: loaded.display_name,
            ids,
            editing: None,
            input: String::new(),
            last_persist_error: None,
        };
        log::debug!(
            "event=store_open active={} completed={} recaps={}",
            store.lists.active.len(),
            store.lists.completed.len(),
            store.recaps.len()
        );
        if fixes > 0 {
            log::warn!("event=store_repair fixes={}", fixes);
            store.persist_lists();
        }
        if let Err(e) = store.lists.check_invariants() {
            log::error!("event=store_open status=inconsistent error={}", e);
        }
        store
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn active(&self) -> &[Item] {
        &self.lists.active
    }

    pub fn completed(&self) -> &[Item] {
        &self.lists.completed
    }

    pub fn lists(&self) -> &TaskLists {
        &self.lists
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.lists.get(id)
    }

    pub fn recaps(&self) -> &[RecapRecord] {
        &self.recaps
    }

    pub fn target_tasks(&self) -> u32 {
        self.target_tasks
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// The item currently in edit mode, if any
    pub fn editing(&self) -> Option<ItemId> {
        self.editing
    }

    /// The new-task input buffer
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn progress(&self) -> Progress {
        recap_ops::progress(self.lists.completed.len(), self.target_tasks)
    }

    /// Pre-filled recap text built from the completed list
    pub fn recap_draft(&self) -> String {
        recap_ops::recap_draft(&self.lists.completed)
    }

    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &S {
        &self.backend
    }

    #[cfg(test)]
    pub(crate) fn into_backend(self) -> S {
        self.backend
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    pub fn add_task(&mut self, text: &str) -> Result<ItemId, TaskError> {
        let id = task_ops::add_task(&mut self.lists, &mut self.ids, text)?;
        self.persist_lists();
        self.events.publish(StoreEvent::TaskAdded(id));
        Ok(id)
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Add the input buffer as a task; the buffer is cleared on success.
    pub fn add_task_from_input(&mut self) -> Result<ItemId, TaskError> {
        let text = std::mem::take(&mut self.input);
        match self.add_task(&text) {
            Ok(id) => Ok(id),
            Err(e) => {
                self.input = text;
                Err(e)
            }
        }
    }

    /// Append a section and put it straight into edit mode.
    pub fn add_section(&mut self, label: &str) -> ItemId {
        let id = task_ops::add_section(&mut self.lists, &mut self.ids, label);
        self.editing = Some(id);
        self.persist_lists();
        self.events.publish(StoreEvent::SectionAdded(id));
        id
    }

    /// Enter edit mode for `id`, leaving any other item's edit. Returns the
    /// text to seed the editor with.
    pub fn start_edit(&mut self, id: ItemId) -> Result<&str, TaskError> {
        if self.lists.get(id).is_none() {
            return Err(TaskError::NotFound(format!("item {}", id)));
        }
        self.editing = Some(id);
        Ok(self.lists.get(id).map(|i| i.text.as_str()).unwrap_or_default())
    }

    /// Save new text for `id` and leave edit mode. Blank text is accepted.
    pub fn commit_edit(&mut self, id: ItemId, new_text: impl Into<String>) -> Result<(), TaskError> {
        task_ops::edit_text(&mut self.lists, id, new_text.into())?;
        self.editing = None;
        self.persist_lists();
        self.events.publish(StoreEvent::ItemEdited(id));
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    pub fn delete_item(&mut self, id: ItemId) -> Result<Item, TaskError> {
        let removed = task_ops::delete_item(&mut self.lists, id)?;
        if self.editing == Some(id) {
            self.editing = None;
        }
        self.persist_lists();
        self.events.publish(StoreEvent::ItemDeleted(id));
        Ok(removed)
    }

    pub fn toggle_complete(&mut self, id: ItemId) -> Result<(), TaskError> {
        task_ops::toggle_complete(&mut self.lists, id)?;
        self.persist_lists();
        self.events.publish(StoreEvent::TaskCompleted(id));
        Ok(())
    }

    pub fn restore(&mut self, id: ItemId) -> Result<(), TaskError> {
        task_ops::restore(&mut self.lists, id)?;
        self.persist_lists();
        self.events.publish(StoreEvent::TaskRestored(id));
        Ok(())
    }

    /// Reorder within one list. `to == None` is a drop outside any list.
    pub fn reorder(&mut self, list: ListId, from: usize, to: Option<usize>) -> Result<(), TaskError> {
        if task_ops::reorder(&mut self.lists, list, from, to)? {
            self.after_move(list, to);
        }
        Ok(())
    }

    pub fn move_between_lists(
        &mut self,
        from_list: ListId,
        from: usize,
        to_list: ListId,
        to: Option<usize>,
    ) -> Result<(), TaskError> {
        if task_ops::move_between_lists(&mut self.lists, from_list, from, to_list, to)? {
            self.after_move(to_list, to);
        }
        Ok(())
    }

    fn after_move(&mut self, list: ListId, to: Option<usize>) {
        self.persist_lists();
        if let Some(index) = to
            && let Some(item) = self.lists.list(list).get(index)
        {
            self.events.publish(StoreEvent::ItemMoved {
                id: item.id,
                to: list,
                index,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Recaps
    // -----------------------------------------------------------------------

    /// Archive the day: the completed list is emptied and a recap is stored.
    pub fn save_recap(&mut self, text: &str, mood: Mood) -> Result<&RecapRecord, TaskError> {
        let recap = recap_ops::new_recap(&self.recaps, text, mood, Utc::now())?;
        let date = recap.date;
        if let Some(editing) = self.editing
            && self.lists.completed.iter().any(|i| i.id == editing)
        {
            self.editing = None;
        }
        let archived = self.lists.completed.len();
        self.lists.completed.clear();
        self.recaps.push(recap);
        log::info!("event=recap_saved archived={} mood={}", archived, mood);

        self.persist_recap_then_lists();
        self.events.publish(StoreEvent::RecapSaved(date));
        Ok(&self.recaps[self.recaps.len() - 1])
    }

    pub fn edit_recap(&mut self, date: DateTime<Utc>, new_text: impl Into<String>, new_mood: Mood) -> Result<(), TaskError> {
        recap_ops::edit_recap(&mut self.recaps, date, new_text.into(), new_mood)?;
        self.persist_recaps();
        self.events.publish(StoreEvent::RecapUpdated(date));
        Ok(())
    }

    pub fn delete_recap(&mut self, date: DateTime<Utc>) -> Result<RecapRecord, TaskError> {
        let removed = recap_ops::delete_recap(&mut self.recaps, date)?;
        self.persist_recaps();
        self.events.publish(StoreEvent::RecapDeleted(date));
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    pub fn set_target_tasks(&mut self, target: u32) -> Result<(), TaskError> {
        if target == 0 {
            return Err(TaskError::Validation("target must be at least 1".into()));
        }
        self.target_tasks = target;
        let result = state::save_target_tasks(&mut self.backend, target);
        self.record_persist(result);
        self.events.publish(StoreEvent::TargetChanged(target));
        Ok(())
    }

    /// Blank clears the name.
    pub fn set_display_name(&mut self, name: &str) {
        let name = name.trim();
        self.display_name = (!name.is_empty()).then(|| name.to_string());
        let result = state::save_display_name(&mut self.backend, self.display_name.as_deref());
        self.record_persist(result);
        self.events.publish(StoreEvent::NameChanged);
    }

    // -----------------------------------------------------------------------
    // Reset / sample
    // -----------------------------------------------------------------------

    /// Empty both lists and drop session state. Recaps are kept.
    pub fn reset_all(&mut self) {
        self.clear_working_state();
        self.persist_lists();
        log::info!("event=reset");
        self.events.publish(StoreEvent::Reset);
    }

    /// Replace both lists with the demo data.
    pub fn load_sample(&mut self) {
        self.clear_working_state();
        self.lists = sample::sample_lists(&mut self.ids);
        self.persist_lists();
        log::info!("event=sample_loaded items={}", self.lists.len());
        self.events.publish(StoreEvent::SampleLoaded);
    }

    fn clear_working_state(&mut self) {
        self.lists.clear();
        self.editing = None;
        self.input.clear();
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn persist_lists(&mut self) {
        let result = state::save_lists(&mut self.backend, &self.lists);
        self.record_persist(result);
    }

    fn persist_recaps(&mut self) {
        let result = state::save_recaps(&mut self.backend, &self.recaps);
        self.record_persist(result);
    }

    /// The recap goes out before the emptied completed list. If the recap
    /// write fails the lists are left untouched in storage, so archived tasks
    /// are never dropped without their recap.
    fn persist_recap_then_lists(&mut self) {
        let result = state::save_recaps(&mut self.backend, &self.recaps)
            .and_then(|()| state::save_lists(&mut self.backend, &self.lists));
        self.record_persist(result);
    }

    /// Called once per operation with the outcome of all its writes, so
    /// `last_persist_error` only clears when every write of the latest
    /// operation went through.
    fn record_persist(&mut self, result: Result<(), StorageError>) {
        match result {
            Ok(()) => self.last_persist_error = None,
            Err(e) => {
                let message = e.to_string();
                log::warn!("event=persist status=error error={}", message);
                self.last_persist_error = Some(message.clone());
                self.events.publish(StoreEvent::PersistenceFailed(message));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::kv::MemoryStore;
    use crate::io::state::{KEY_ACTIVE, KEY_COMPLETED, KEY_RECAPS};
    use pretty_assertions::assert_eq;
    use std::sync::mpsc::Receiver;

    fn open() -> (TaskListStore<MemoryStore>, Receiver<StoreEvent>) {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let store = TaskListStore::open(MemoryStore::new(), bus, &DefaultsConfig::default());
        (store, rx)
    }

    fn drain(rx: &Receiver<StoreEvent>) -> Vec<StoreEvent> {
        rx.try_iter().collect()
    }

    /// Backend whose writes always fail
    #[derive(Default)]
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disabled".into()))
        }
        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
        fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".into()))
        }
    }

    #[test]
    fn add_task_persists_and_notifies() {
        let (mut store, rx) = open();
        let id = store.add_task("Buy milk").unwrap();
        assert_eq!(drain(&rx), vec![StoreEvent::TaskAdded(id)]);
        let raw = store.backend().get(KEY_ACTIVE).unwrap().unwrap();
        assert!(raw.contains("Buy milk"));
        assert_eq!(store.backend().get(KEY_COMPLETED).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn rejected_add_publishes_nothing() {
        let (mut store, rx) = open();
        assert!(store.add_task(" ").is_err());
        assert!(drain(&rx).is_empty());
        assert_eq!(store.backend().get(KEY_ACTIVE).unwrap(), None);
    }

    #[test]
    fn input_buffer_clears_only_on_success() {
        let (mut store, _rx) = open();
        store.set_input("   ");
        assert!(store.add_task_from_input().is_err());
        assert_eq!(store.input(), "   ");

        store.set_input("Call mom");
        store.add_task_from_input().unwrap();
        assert_eq!(store.input(), "");
        assert_eq!(store.active()[0].text, "Call mom");
    }

    #[test]
    fn add_section_enters_edit_mode() {
        let (mut store, _rx) = open();
        let id = store.add_section("");
        assert_eq!(store.editing(), Some(id));
        store.commit_edit(id, "Morning").unwrap();
        assert_eq!(store.editing(), None);
        assert_eq!(store.item(id).unwrap().text, "Morning");
    }

    #[test]
    fn only_one_item_in_edit_mode() {
        let (mut store, _rx) = open();
        let a = store.add_task("a").unwrap();
        let b = store.add_task("b").unwrap();
        assert_eq!(store.start_edit(a).unwrap(), "a");
        store.start_edit(b).unwrap();
        assert_eq!(store.editing(), Some(b));
        store.cancel_edit();
        assert_eq!(store.editing(), None);
        assert!(matches!(store.start_edit(ItemId(3)), Err(TaskError::NotFound(_))));
    }

    #[test]
    fn commit_edit_accepts_blank_text() {
        let (mut store, _rx) = open();
        let id = store.add_task("something").unwrap();
        store.start_edit(id).unwrap();
        store.commit_edit(id, "").unwrap();
        assert_eq!(store.item(id).unwrap().text, "");
    }

    #[test]
    fn deleting_the_edited_item_leaves_edit_mode() {
        let (mut store, rx) = open();
        let id = store.add_task("x").unwrap();
        store.start_edit(id).unwrap();
        store.delete_item(id).unwrap();
        assert_eq!(store.editing(), None);
        assert!(drain(&rx).contains(&StoreEvent::ItemDeleted(id)));
    }

    #[test]
    fn noop_reorder_does_not_notify() {
        let (mut store, rx) = open();
        store.add_task("a").unwrap();
        store.add_task("b").unwrap();
        drain(&rx);
        store.reorder(ListId::Active, 1, Some(1)).unwrap();
        store.reorder(ListId::Active, 1, None).unwrap();
        assert!(drain(&rx).is_empty());

        store.reorder(ListId::Active, 1, Some(0)).unwrap();
        let events = drain(&rx);
        assert!(matches!(
            events.as_slice(),
            [StoreEvent::ItemMoved { to: ListId::Active, index: 0, .. }]
        ));
    }

    #[test]
    fn save_recap_archives_completed() {
        let (mut store, rx) = open();
        let keep = store.add_task("keep").unwrap();
        let done = store.add_task("done").unwrap();
        store.toggle_complete(done).unwrap();
        drain(&rx);

        let draft = store.recap_draft();
        assert_eq!(draft, "- done");
        let date = store.save_recap(&draft, Mood::Good).unwrap().date;

        assert!(store.completed().is_empty());
        assert_eq!(store.active()[0].id, keep);
        assert_eq!(store.recaps().len(), 1);
        assert_eq!(drain(&rx), vec![StoreEvent::RecapSaved(date)]);
    }

    #[test]
    fn save_recap_with_blank_text_changes_nothing() {
        let (mut store, _rx) = open();
        let done = store.add_task("done").unwrap();
        store.toggle_complete(done).unwrap();
        assert!(store.save_recap("  ", Mood::Bad).is_err());
        assert_eq!(store.completed().len(), 1);
        assert!(store.recaps().is_empty());
    }

    #[test]
    fn reset_keeps_recaps_and_clears_session_state() {
        let (mut store, _rx) = open();
        store.add_task("one").unwrap();
        let done = store.add_task("two").unwrap();
        store.toggle_complete(done).unwrap();
        store.save_recap("- two", Mood::Neutral).unwrap();
        let id = store.add_task("three").unwrap();
        store.start_edit(id).unwrap();
        store.set_input("half typed");

        store.reset_all();
        assert!(store.lists().is_empty());
        assert_eq!(store.editing(), None);
        assert_eq!(store.input(), "");
        assert_eq!(store.recaps().len(), 1);
    }

    #[test]
    fn load_sample_replaces_lists() {
        let (mut store, rx) = open();
        store.add_task("mine").unwrap();
        store.load_sample();
        assert!(store.active().iter().all(|i| i.text != "mine"));
        assert_eq!(store.completed().len(), 3);
        assert!(store.lists().check_invariants().is_ok());
        assert_eq!(drain(&rx).last(), Some(&StoreEvent::SampleLoaded));
    }

    #[test]
    fn target_and_name_round_trip_through_backend() {
        let (mut store, _rx) = open();
        assert_eq!(store.target_tasks(), 10);
        assert!(store.set_target_tasks(0).is_err());
        store.set_target_tasks(5).unwrap();
        store.set_display_name("  Sam ");

        let backend = store.into_backend();
        let reopened = TaskListStore::open(backend, EventBus::new(), &DefaultsConfig::default());
        assert_eq!(reopened.target_tasks(), 5);
        assert_eq!(reopened.display_name(), Some("Sam"));
    }

    #[test]
    fn configured_default_target_applies_when_unset() {
        let defaults = DefaultsConfig { target_tasks: 20 };
        let store = TaskListStore::open(MemoryStore::new(), EventBus::new(), &defaults);
        assert_eq!(store.target_tasks(), 20);
        assert_eq!(store.progress().target, 20);
    }

    #[test]
    fn storage_failure_keeps_memory_state() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut store = TaskListStore::open(BrokenStore, bus, &DefaultsConfig::default());

        let id = store.add_task("still here").unwrap();
        assert_eq!(store.item(id).unwrap().text, "still here");
        assert!(store.last_persist_error().unwrap().contains("quota exceeded"));

        let events = drain(&rx);
        assert!(matches!(events[0], StoreEvent::PersistenceFailed(_)));
        assert_eq!(events[1], StoreEvent::TaskAdded(id));
    }

    /// Backend that fails writes to one key only
    struct FailingKey {
        inner: MemoryStore,
        key: &'static str,
    }

    impl KeyValueStore for FailingKey {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.key {
                return Err(StorageError::Unavailable(format!("{} is read-only", key)));
            }
            self.inner.set(key, value)
        }
        fn remove(&mut self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    /// A store with one completed task, whose backend then fails writes to `key`.
    fn with_completed_task(key: &'static str) -> (TaskListStore<FailingKey>, Receiver<StoreEvent>) {
        let mut store = TaskListStore::open(
            FailingKey {
                inner: MemoryStore::new(),
                key: "none",
            },
            EventBus::new(),
            &DefaultsConfig::default(),
        );
        let id = store.add_task("Buy milk").unwrap();
        store.toggle_complete(id).unwrap();
        let backend = FailingKey {
            inner: store.into_backend().inner,
            key,
        };
        let bus = EventBus::new();
        let rx = bus.subscribe();
        (TaskListStore::open(backend, bus, &DefaultsConfig::default()), rx)
    }

    #[test]
    fn failed_list_write_during_recap_is_reported() {
        let (mut store, rx) = with_completed_task(KEY_COMPLETED);
        store.save_recap("- Buy milk", Mood::Good).unwrap();

        assert!(store.last_persist_error().unwrap().contains("completedTodos"));
        assert!(matches!(drain(&rx)[0], StoreEvent::PersistenceFailed(_)));
        // the recap reached storage before the lists were touched
        let raw = store.backend().get(KEY_RECAPS).unwrap().unwrap();
        assert!(raw.contains("Buy milk"));
    }

    #[test]
    fn failed_recap_write_leaves_stored_lists_alone() {
        let (mut store, _rx) = with_completed_task(KEY_RECAPS);
        store.save_recap("- Buy milk", Mood::Good).unwrap();

        assert!(store.completed().is_empty());
        assert!(store.last_persist_error().unwrap().contains("recaps"));
        let raw = store.backend().get(KEY_COMPLETED).unwrap().unwrap();
        assert!(raw.contains("Buy milk"));
    }

    #[test]
    fn next_clean_operation_clears_the_error() {
        let (mut store, _rx) = with_completed_task(KEY_RECAPS);
        store.save_recap("- Buy milk", Mood::Good).unwrap();
        assert!(store.last_persist_error().is_some());
        store.add_task("later").unwrap();
        assert_eq!(store.last_persist_error(), None);
    }

    #[test]
    fn stored_max_id_does_not_jam_id_generation() {
        let mut backend = MemoryStore::new();
        backend
            .set(
                KEY_ACTIVE,
                &format!(r#"[{{"id":{},"text":"edge","completed":false,"type":"todo"}}]"#, u64::MAX),
            )
            .unwrap();
        let mut store = TaskListStore::open(backend, EventBus::new(), &DefaultsConfig::default());
        let a = store.add_task("one").unwrap();
        let b = store.add_task("two").unwrap();
        assert_ne!(a, b);
        assert!(store.lists().check_invariants().is_ok());
    }

    #[test]
    fn corrupt_lists_are_repaired_on_open() {
        let mut backend = MemoryStore::new();
        backend
            .set(
                KEY_COMPLETED,
                r#"[{"id":1,"text":"Morning","completed":true,"type":"section"},{"id":2,"text":"x","completed":false,"type":"todo"}]"#,
            )
            .unwrap();
        let store = TaskListStore::open(backend, EventBus::new(), &DefaultsConfig::default());
        assert!(store.lists().check_invariants().is_ok());
        assert_eq!(store.active()[0].text, "Morning");
        let raw = store.backend().get(KEY_ACTIVE).unwrap().unwrap();
        assert!(raw.contains("Morning"));
    }
}
