use std::collections::HashSet;

use crate::model::item::{IdGenerator, Item, ItemId};
use crate::model::list::{ListId, TaskLists};

/// Label given to a section created without one
pub const DEFAULT_SECTION_LABEL: &str = "New section";

/// Error type for list operations. Every error leaves the lists untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("position {index} is out of range for the {list} list (length {len})")]
    OutOfRange {
        list: ListId,
        index: usize,
        len: usize,
    },
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Append a task to the end of the active list. Rejects blank text.
/// The text is stored as given, surrounding whitespace included.
pub fn add_task(lists: &mut TaskLists, ids: &mut IdGenerator, text: &str) -> Result<ItemId, TaskError> {
    if text.trim().is_empty() {
        return Err(TaskError::Validation("task text is empty".into()));
    }
    let id = ids.next_id();
    lists.active.push(Item::task(id, text));
    Ok(id)
}

/// Append a section header to the end of the active list.
pub fn add_section(lists: &mut TaskLists, ids: &mut IdGenerator, label: &str) -> ItemId {
    let label = if label.trim().is_empty() {
        DEFAULT_SECTION_LABEL
    } else {
        label
    };
    let id = ids.next_id();
    lists.active.push(Item::section(id, label));
    id
}

// ---------------------------------------------------------------------------
// Edit / delete
// ---------------------------------------------------------------------------

/// Replace an item's text. Blank text is accepted here; only creation
/// rejects it.
pub fn edit_text(lists: &mut TaskLists, id: ItemId, new_text: String) -> Result<(), TaskError> {
    let item = lists.get_mut(id).ok_or_else(|| not_found(id))?;
    item.text = new_text;
    Ok(())
}

/// Remove an item from whichever list holds it.
pub fn delete_item(lists: &mut TaskLists, id: ItemId) -> Result<Item, TaskError> {
    let (list, idx) = lists.locate(id).ok_or_else(|| not_found(id))?;
    Ok(lists.list_mut(list).remove(idx))
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Active task → end of the completed list, flagged completed.
pub fn toggle_complete(lists: &mut TaskLists, id: ItemId) -> Result<(), TaskError> {
    let idx = lists
        .active
        .iter()
        .position(|i| i.id == id)
        .ok_or_else(|| TaskError::NotFound(format!("active task {}", id)))?;
    if lists.active[idx].is_section() {
        return Err(TaskError::Validation(format!("section {} cannot be completed", id)));
    }
    let mut item = lists.active.remove(idx);
    item.completed = true;
    lists.completed.push(item);
    Ok(())
}

/// Completed task → end of the active list, flagged not completed.
pub fn restore(lists: &mut TaskLists, id: ItemId) -> Result<(), TaskError> {
    let idx = lists
        .completed
        .iter()
        .position(|i| i.id == id)
        .ok_or_else(|| TaskError::NotFound(format!("completed task {}", id)))?;
    let mut item = lists.completed.remove(idx);
    item.completed = false;
    lists.active.push(item);
    Ok(())
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// Move one item within a list: remove at `from`, insert at `to`.
///
/// `to == None` means the drop landed outside any list and is a no-op, as
/// is `from == to`. Returns whether anything moved.
pub fn reorder(
    lists: &mut TaskLists,
    list: ListId,
    from: usize,
    to: Option<usize>,
) -> Result<bool, TaskError> {
    let Some(to) = to else {
        return Ok(false);
    };
    let items = lists.list_mut(list);
    let len = items.len();
    if from >= len {
        return Err(TaskError::OutOfRange { list, index: from, len });
    }
    if to >= len {
        return Err(TaskError::OutOfRange { list, index: to, len });
    }
    if from == to {
        return Ok(false);
    }
    let item = items.remove(from);
    items.insert(to, item);
    Ok(true)
}

/// Move an item from one list to the other, fixing up its completed flag to
/// match where it lands. Same-list moves are plain reorders.
///
/// `to` may equal the destination's length (append). Sections cannot be
/// dropped into the completed list.
pub fn move_between_lists(
    lists: &mut TaskLists,
    from_list: ListId,
    from: usize,
    to_list: ListId,
    to: Option<usize>,
) -> Result<bool, TaskError> {
    if from_list == to_list {
        return reorder(lists, from_list, from, to);
    }
    let Some(to) = to else {
        return Ok(false);
    };

    let src_len = lists.list(from_list).len();
    if from >= src_len {
        return Err(TaskError::OutOfRange {
            list: from_list,
            index: from,
            len: src_len,
        });
    }
    let dest_len = lists.list(to_list).len();
    if to > dest_len {
        return Err(TaskError::OutOfRange {
            list: to_list,
            index: to,
            len: dest_len,
        });
    }
    let moving = &lists.list(from_list)[from];
    if to_list == ListId::Completed && moving.is_section() {
        return Err(TaskError::Validation(format!(
            "section {} cannot be moved to the completed list",
            moving.id
        )));
    }

    let mut item = lists.list_mut(from_list).remove(from);
    item.completed = to_list == ListId::Completed;
    lists.list_mut(to_list).insert(to, item);
    Ok(true)
}

// ---------------------------------------------------------------------------
// Load-time repair
// ---------------------------------------------------------------------------

/// Bring lists read from storage back in line with the list invariants:
/// completed flags follow membership, sections leave the completed list for
/// the end of the active list, and duplicate ids get fresh ones. Every
/// surviving id is fed to `ids`. Returns the number of fixes made.
pub fn repair(lists: &mut TaskLists, ids: &mut IdGenerator) -> usize {
    let mut fixes = 0;

    let mut kept = Vec::with_capacity(lists.completed.len());
    for item in lists.completed.drain(..) {
        if item.is_section() {
            lists.active.push(item);
            fixes += 1;
        } else {
            kept.push(item);
        }
    }
    lists.completed = kept;

    for item in lists.active.iter_mut() {
        if item.completed {
            item.completed = false;
            fixes += 1;
        }
    }
    for item in lists.completed.iter_mut() {
        if !item.completed {
            item.completed = true;
            fixes += 1;
        }
    }

    for item in lists.iter() {
        ids.observe(item.id);
    }
    let mut seen = HashSet::new();
    for list in [ListId::Active, ListId::Completed] {
        for item in lists.list_mut(list).iter_mut() {
            if !seen.insert(item.id) {
                item.id = ids.next_id();
                seen.insert(item.id);
                fixes += 1;
            }
        }
    }
    fixes
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(id: ItemId) -> TaskError {
    TaskError::NotFound(format!("item {}", id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
