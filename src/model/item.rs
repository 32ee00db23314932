use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Low bits of an id reserved for the random tiebreaker.
const TIEBREAK_BITS: u32 = 10;

/// Stable identity of an item, unique across the active and completed lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(ItemId)
    }
}

/// What an item is: an actionable task or a grouping header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Stored as `"todo"`
    #[serde(rename = "todo")]
    Task,
    /// Non-actionable header; never completed
    Section,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Task => write!(f, "task"),
            ItemKind::Section => write!(f, "section"),
        }
    }
}

fn default_kind() -> ItemKind {
    ItemKind::Task
}

/// A single entry in either the active or the completed list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub text: String,
    /// True exactly when the item sits in the completed list
    pub completed: bool,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: ItemKind,
}

impl Item {
    /// A new, not yet completed task
    pub fn task(id: ItemId, text: impl Into<String>) -> Self {
        Item {
            id,
            text: text.into(),
            completed: false,
            kind: ItemKind::Task,
        }
    }

    /// A new section header
    pub fn section(id: ItemId, label: impl Into<String>) -> Self {
        Item {
            id,
            text: label.into(),
            completed: false,
            kind: ItemKind::Section,
        }
    }

    pub fn is_section(&self) -> bool {
        self.kind == ItemKind::Section
    }
}

/// Hands out item ids.
///
/// Ids are the wall clock in milliseconds shifted left by [`TIEBREAK_BITS`],
/// with a random tiebreaker in the low bits, and are strictly greater than
/// anything this generator issued or was told about via [`observe`]. No id
/// is ever handed out twice or collides with an observed one.
///
/// [`observe`]: IdGenerator::observe
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: u64,
    taken: HashSet<u64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an id that already exists so it is never issued again.
    pub fn observe(&mut self, id: ItemId) {
        self.last = self.last.max(id.0);
        self.taken.insert(id.0);
    }

    /// Clock-derived and above `last` while there is room; once an id at
    /// `u64::MAX` has been seen, the lowest unused id instead.
    pub fn next_id(&mut self) -> ItemId {
        let id = match self.last.checked_add(1) {
            Some(floor) => clock_candidate().max(floor),
            None => self.lowest_free(),
        };
        self.last = self.last.max(id);
        self.taken.insert(id);
        ItemId(id)
    }

    fn lowest_free(&self) -> u64 {
        (1..=u64::MAX).find(|n| !self.taken.contains(n)).unwrap_or(0)
    }
}

fn clock_candidate() -> u64 {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let tiebreak = rand::rng().random_range(0..(1u64 << TIEBREAK_BITS));
    (millis << TIEBREAK_BITS) | tiebreak
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let mut ids = IdGenerator::new();
        let mut prev = ids.next_id();
        for _ in 0..5_000 {
            let next = ids.next_id();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn observed_ids_are_never_reissued() {
        let mut ids = IdGenerator::new();
        let far_future = ItemId(u64::MAX / 2);
        ids.observe(far_future);
        assert_eq!(ids.next_id(), ItemId(u64::MAX / 2 + 1));
    }

    #[test]
    fn exhausted_id_space_falls_back_to_unused_ids() {
        let mut ids = IdGenerator::new();
        ids.observe(ItemId(u64::MAX));
        ids.observe(ItemId(1));
        let a = ids.next_id();
        let b = ids.next_id();
        assert_eq!(a, ItemId(2));
        assert_eq!(b, ItemId(3));
    }

    #[test]
    fn burst_of_ids_is_unique() {
        let mut ids = IdGenerator::new();
        let seen: HashSet<ItemId> = (0..10_000).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 10_000);
    }

    #[test]
    fn item_json_shape() {
        let item = Item::task(ItemId(42), "Buy milk");
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(
            json,
            r#"{"id":42,"text":"Buy milk","completed":false,"type":"todo"}"#
        );

        let section: Item =
            serde_json::from_str(r#"{"id":7,"text":"Morning","completed":false,"type":"section"}"#)
                .unwrap();
        assert!(section.is_section());
    }

    #[test]
    fn missing_type_defaults_to_task() {
        let item: Item = serde_json::from_str(r#"{"id":1,"text":"x","completed":true}"#).unwrap();
        assert_eq!(item.kind, ItemKind::Task);
    }

    #[test]
    fn item_id_parses_from_string() {
        assert_eq!(" 17 ".parse::<ItemId>().unwrap(), ItemId(17));
        assert!("abc".parse::<ItemId>().is_err());
    }
}
