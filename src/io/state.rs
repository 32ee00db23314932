//! Typed load/save of everything the task list persists.
//!
//! Each concern lives under its own key as a JSON blob. Reads never fail:
//! a missing key, an unreadable backend or corrupt JSON all fall back to the
//! default for that key.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::io::kv::{KeyValueStore, StorageError};
use crate::model::item::Item;
use crate::model::list::TaskLists;
use crate::model::recap::RecapRecord;

pub const KEY_ACTIVE: &str = "todos";
pub const KEY_COMPLETED: &str = "completedTodos";
pub const KEY_TARGET_TASKS: &str = "targetTasks";
pub const KEY_RECAPS: &str = "recaps";
pub const KEY_USER_NAME: &str = "userName";

/// Everything read back from storage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub lists: TaskLists,
    /// None = never set; caller applies its configured default
    pub target_tasks: Option<u32>,
    pub recaps: Vec<RecapRecord>,
    pub display_name: Option<String>,
}

/// Read every persisted key.
pub fn load_state<S: KeyValueStore + ?Sized>(store: &S) -> PersistedState {
    let active: Vec<Item> = read_key(store, KEY_ACTIVE).unwrap_or_default();
    let completed: Vec<Item> = read_key(store, KEY_COMPLETED).unwrap_or_default();
    let display_name = read_key::<String, _>(store, KEY_USER_NAME).filter(|n| !n.is_empty());
    PersistedState {
        lists: TaskLists { active, completed },
        target_tasks: read_key(store, KEY_TARGET_TASKS),
        recaps: read_key(store, KEY_RECAPS).unwrap_or_default(),
        display_name,
    }
}

/// Write both lists. The active list goes first.
pub fn save_lists<S: KeyValueStore + ?Sized>(store: &mut S, lists: &TaskLists) -> Result<(), StorageError> {
    write_key(store, KEY_ACTIVE, &lists.active)?;
    write_key(store, KEY_COMPLETED, &lists.completed)
}

pub fn save_recaps<S: KeyValueStore + ?Sized>(
    store: &mut S,
    recaps: &[RecapRecord],
) -> Result<(), StorageError> {
    write_key(store, KEY_RECAPS, &recaps)
}

pub fn save_target_tasks<S: KeyValueStore + ?Sized>(store: &mut S, target: u32) -> Result<(), StorageError> {
    write_key(store, KEY_TARGET_TASKS, &target)
}

/// `None` removes the key.
pub fn save_display_name<S: KeyValueStore + ?Sized>(
    store: &mut S,
    name: Option<&str>,
) -> Result<(), StorageError> {
    match name {
        Some(name) => write_key(store, KEY_USER_NAME, &name),
        None => store.remove(KEY_USER_NAME),
    }
}

fn read_key<T: DeserializeOwned, S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("event=state_read key={} status=error error={}", key, e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("event=state_read key={} status=corrupt error={}", key, e);
            None
        }
    }
}

fn write_key<T: Serialize + ?Sized, S: KeyValueStore + ?Sized>(
    store: &mut S,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let content = serde_json::to_string(value).map_err(|e| StorageError::Serialize {
        key: key.to_string(),
        source: e,
    })?;
    store.set(key, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::kv::MemoryStore;
    use crate::model::item::ItemId;
    use crate::model::recap::Mood;
    use chrono::{TimeZone, Utc};

    #[test]
    fn write_and_read_round_trip() {
        let mut store = MemoryStore::new();
        let mut done = Item::task(ItemId(2), "Stretch");
        done.completed = true;
        let lists = TaskLists {
            active: vec![Item::section(ItemId(1), "Morning")],
            completed: vec![done],
        };
        let recap = RecapRecord {
            text: "- Stretch".into(),
            mood: Mood::Good,
            date: Utc.with_ymd_and_hms(2025, 5, 14, 18, 30, 0).unwrap(),
        };

        save_lists(&mut store, &lists).unwrap();
        save_recaps(&mut store, std::slice::from_ref(&recap)).unwrap();
        save_target_tasks(&mut store, 15).unwrap();
        save_display_name(&mut store, Some("Sam")).unwrap();

        let loaded = load_state(&store);
        assert_eq!(loaded.lists, lists);
        assert_eq!(loaded.recaps, vec![recap]);
        assert_eq!(loaded.target_tasks, Some(15));
        assert_eq!(loaded.display_name.as_deref(), Some("Sam"));
    }

    #[test]
    fn read_empty_store_returns_defaults() {
        let loaded = load_state(&MemoryStore::new());
        assert_eq!(loaded, PersistedState::default());
    }

    #[test]
    fn read_malformed_json_falls_back_per_key() {
        let mut store = MemoryStore::new();
        store.set(KEY_ACTIVE, "not json {{{").unwrap();
        store.set(KEY_TARGET_TASKS, "20").unwrap();
        let loaded = load_state(&store);
        assert!(loaded.lists.active.is_empty());
        assert_eq!(loaded.target_tasks, Some(20));
    }

    #[test]
    fn recap_dates_are_iso_strings() {
        let mut store = MemoryStore::new();
        let recap = RecapRecord {
            text: "ok".into(),
            mood: Mood::Neutral,
            date: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
        };
        save_recaps(&mut store, &[recap]).unwrap();
        let raw = store.get(KEY_RECAPS).unwrap().unwrap();
        assert_eq!(
            raw,
            r#"[{"text":"ok","mood":"neutral","date":"2025-01-02T03:04:05Z"}]"#
        );
    }

    #[test]
    fn clearing_display_name_removes_key() {
        let mut store = MemoryStore::new();
        save_display_name(&mut store, Some("Sam")).unwrap();
        save_display_name(&mut store, None).unwrap();
        assert_eq!(store.get(KEY_USER_NAME).unwrap(), None);
    }
}
