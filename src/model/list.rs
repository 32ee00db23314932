use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::item::{Item, ItemId};

/// Which of the two lists an item lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListId {
    Active,
    Completed,
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListId::Active => write!(f, "active"),
            ListId::Completed => write!(f, "completed"),
        }
    }
}

impl ListId {
    /// Accepts the stored list names as well as the short forms used on the
    /// command line.
    pub fn parse_list(s: &str) -> Option<Self> {
        match s {
            "active" | "todos" | "todo" | "a" => Some(ListId::Active),
            "completed" | "done" | "c" => Some(ListId::Completed),
            _ => None,
        }
    }
}

/// The active list (tasks and sections) and the completed list (tasks only)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskLists {
    pub active: Vec<Item>,
    pub completed: Vec<Item>,
}

impl TaskLists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, id: ListId) -> &[Item] {
        match id {
            ListId::Active => &self.active,
            ListId::Completed => &self.completed,
        }
    }

    pub fn list_mut(&mut self, id: ListId) -> &mut Vec<Item> {
        match id {
            ListId::Active => &mut self.active,
            ListId::Completed => &mut self.completed,
        }
    }

    /// Find the list and position holding `id`.
    pub fn locate(&self, id: ItemId) -> Option<(ListId, usize)> {
        for list in [ListId::Active, ListId::Completed] {
            if let Some(idx) = self.list(list).iter().position(|i| i.id == id) {
                return Some((list, idx));
            }
        }
        None
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        let (list, idx) = self.locate(id)?;
        self.list(list).get(idx)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        let (list, idx) = self.locate(id)?;
        self.list_mut(list).get_mut(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.active.iter().chain(self.completed.iter())
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.completed.is_empty()
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.completed.clear();
    }

    /// Verify list membership, completed flags, section placement and id
    /// uniqueness. Returns a description of the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        for item in &self.active {
            if item.completed {
                return Err(format!("item {} is in the active list but marked completed", item.id));
            }
        }
        for item in &self.completed {
            if !item.completed {
                return Err(format!(
                    "item {} is in the completed list but not marked completed",
                    item.id
                ));
            }
            if item.is_section() {
                return Err(format!("section {} is in the completed list", item.id));
            }
        }
        let mut seen = HashSet::new();
        for item in self.iter() {
            if !seen.insert(item.id) {
                return Err(format!("duplicate id {}", item.id));
            }
        }
        Ok(())
    }
}
