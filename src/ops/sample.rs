//! Demo data for first-time users.

use crate::model::item::{IdGenerator, Item};
use crate::model::list::TaskLists;

/// Section labels, each followed by its tasks, in display order.
const SAMPLE_ACTIVE: &[(&str, &[&str])] = &[
    (
        "Morning",
        &["Drink a glass of water", "Ten minutes of stretching", "Plan the top three tasks"],
    ),
    (
        "Afternoon",
        &["Reply to pending emails", "Deep work block: 90 minutes", "Take a short walk"],
    ),
    (
        "Evening",
        &["Tidy the desk", "Read for 20 minutes", "Write tomorrow's first task"],
    ),
];

const SAMPLE_COMPLETED: &[&str] = &["Make the bed", "Check the calendar", "Water the plants"];

/// Build the demo lists with fresh ids from `ids`.
pub fn sample_lists(ids: &mut IdGenerator) -> TaskLists {
    let mut lists = TaskLists::new();
    for (section, tasks) in SAMPLE_ACTIVE {
        lists.active.push(Item::section(ids.next_id(), *section));
        for task in *tasks {
            lists.active.push(Item::task(ids.next_id(), *task));
        }
    }
    for task in SAMPLE_COMPLETED {
        let mut item = Item::task(ids.next_id(), *task);
        item.completed = true;
        lists.completed.push(item);
    }
    lists
}
