use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::Serialize;

use crate::model::item::{Item, ItemId, ItemKind};
use crate::model::list::ListId;
use crate::model::recap::{Mood, RecapRecord};
use crate::ops::recap_ops::Progress;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ItemJson {
    pub id: ItemId,
    /// Positional reference usable in later commands (`a1`, `c3`)
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub text: String,
    pub completed: bool,
}

#[derive(Serialize)]
pub struct ListsJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<Vec<ItemJson>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<Vec<ItemJson>>,
    pub progress: Progress,
}

#[derive(Serialize)]
pub struct RecapJson {
    pub index: usize,
    pub date: String,
    pub mood: Mood,
    pub text: String,
}

#[derive(Serialize)]
pub struct SettingsJson {
    pub target_tasks: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// `a1`-style reference for position `index` (0-based) in `list`
pub fn item_ref(list: ListId, index: usize) -> String {
    let prefix = match list {
        ListId::Active => 'a',
        ListId::Completed => 'c',
    };
    format!("{}{}", prefix, index + 1)
}

pub fn item_to_json(list: ListId, index: usize, item: &Item) -> ItemJson {
    ItemJson {
        id: item.id,
        reference: item_ref(list, index),
        kind: item.kind,
        text: item.text.clone(),
        completed: item.completed,
    }
}

pub fn list_to_json(list: ListId, items: &[Item]) -> Vec<ItemJson> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| item_to_json(list, i, item))
        .collect()
}

pub fn recap_to_json(index: usize, recap: &RecapRecord) -> RecapJson {
    RecapJson {
        index,
        date: format_recap_date(recap.date),
        mood: recap.mood,
        text: recap.text.clone(),
    }
}

/// Dates are printed exactly as stored so they can be fed back as references.
pub fn format_recap_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

pub fn format_item_line(list: ListId, index: usize, item: &Item) -> String {
    let reference = item_ref(list, index);
    match item.kind {
        ItemKind::Section => format!("{:<4} # {}", reference, item.text),
        ItemKind::Task => {
            let check = if item.completed { 'x' } else { ' ' };
            format!("{:<4} [{}] {}", reference, check, item.text)
        }
    }
}

pub fn format_list(list: ListId, items: &[Item]) -> Vec<String> {
    let title = match list {
        ListId::Active => "Active",
        ListId::Completed => "Completed",
    };
    let mut lines = vec![format!("{} ({})", title, items.len())];
    if items.is_empty() {
        lines.push("  (empty)".to_string());
    }
    lines.extend(
        items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("  {}", format_item_line(list, i, item))),
    );
    lines
}

pub fn format_progress(progress: &Progress) -> String {
    let mut line = format!(
        "{}/{} done ({}%)",
        progress.completed, progress.target, progress.percent
    );
    if progress.target_met {
        line.push_str(" - target met");
    }
    line
}

/// Header line plus the recap text indented underneath
pub fn format_recap(index: usize, recap: &RecapRecord) -> Vec<String> {
    let local = recap.date.with_timezone(&Local);
    let mut lines = vec![format!(
        "{:<3} {}  {:<7}  {}",
        index,
        local.format("%Y-%m-%d %H:%M"),
        recap.mood.to_string(),
        format_recap_date(recap.date)
    )];
    lines.extend(recap.text.lines().map(|l| format!("    {}", l)));
    lines
}
