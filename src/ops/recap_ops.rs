use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;

use crate::model::item::Item;
use crate::model::recap::{Mood, RecapRecord};
use crate::ops::task_ops::TaskError;

/// Goal counts offered by the target picker
pub const TARGET_CHOICES: [u32; 6] = [5, 10, 15, 20, 25, 30];

/// Parse a mood name, rejecting anything outside the three known values.
pub fn parse_mood(s: &str) -> Result<Mood, TaskError> {
    s.parse::<Mood>()
        .map_err(|e| TaskError::Validation(e.to_string()))
}

/// The text a recap starts from: one `- ` line per completed task.
pub fn recap_draft(completed: &[Item]) -> String {
    completed
        .iter()
        .map(|item| format!("- {}", item.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build a new recap stamped `now`, rounded up to the next whole
/// millisecond so the stamp is never earlier than the call. If that would
/// collide with or predate the newest existing record, the stamp is pushed
/// one millisecond past it so dates stay usable as keys.
pub fn new_recap(
    existing: &[RecapRecord],
    text: &str,
    mood: Mood,
    now: DateTime<Utc>,
) -> Result<RecapRecord, TaskError> {
    validate_text(text)?;
    let mut date = ceil_to_millis(now);
    if let Some(newest) = existing.iter().map(|r| r.date).max()
        && date <= newest
    {
        date = newest + Duration::milliseconds(1);
    }
    Ok(RecapRecord {
        text: text.to_string(),
        mood,
        date,
    })
}

/// Replace the text and mood of the recap keyed by `date`.
pub fn edit_recap(
    recaps: &mut [RecapRecord],
    date: DateTime<Utc>,
    text: String,
    mood: Mood,
) -> Result<(), TaskError> {
    let recap = recaps
        .iter_mut()
        .find(|r| r.date == date)
        .ok_or_else(|| recap_not_found(date))?;
    recap.text = text;
    recap.mood = mood;
    Ok(())
}

/// Remove the recap keyed by `date`.
pub fn delete_recap(recaps: &mut Vec<RecapRecord>, date: DateTime<Utc>) -> Result<RecapRecord, TaskError> {
    let idx = recaps
        .iter()
        .position(|r| r.date == date)
        .ok_or_else(|| recap_not_found(date))?;
    Ok(recaps.remove(idx))
}

fn ceil_to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = t.trunc_subsecs(3);
    if truncated < t {
        truncated + Duration::milliseconds(1)
    } else {
        truncated
    }
}

fn validate_text(text: &str) -> Result<(), TaskError> {
    if text.trim().is_empty() {
        return Err(TaskError::Validation("recap text is empty".into()));
    }
    Ok(())
}

fn recap_not_found(date: DateTime<Utc>) -> TaskError {
    TaskError::NotFound(format!(
        "recap {}",
        date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    ))
}

// ---------------------------------------------------------------------------
// Progress toward the daily target
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub target: u32,
    /// 0..=100, capped once the target is reached
    pub percent: u32,
    pub target_met: bool,
}

pub fn progress(completed: usize, target: u32) -> Progress {
    if target == 0 {
        return Progress {
            completed,
            target,
            percent: 100,
            target_met: true,
        };
    }
    let capped = completed.min(target as usize) as u32;
    Progress {
        completed,
        target,
        percent: capped * 100 / target,
        target_met: completed >= target as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::ItemId;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn record(ms: i64) -> RecapRecord {
        RecapRecord {
            text: format!("recap {}", ms),
            mood: Mood::Neutral,
            date: at(ms),
        }
    }

    #[test]
    fn draft_lists_completed_tasks() {
        let completed = vec![Item::task(ItemId(1), "Buy milk"), Item::task(ItemId(2), "Stretch")];
        assert_eq!(recap_draft(&completed), "- Buy milk\n- Stretch");
        assert_eq!(recap_draft(&[]), "");
    }

    #[test]
    fn parse_mood_rejects_unknown() {
        assert_eq!(parse_mood("good").unwrap(), Mood::Good);
        assert!(matches!(parse_mood("great"), Err(TaskError::Validation(_))));
        assert!(parse_mood("").is_err());
    }

    #[test]
    fn new_recap_rejects_blank_text() {
        let err = new_recap(&[], "  \n ", Mood::Good, at(1_000)).unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
    }

    #[test]
    fn new_recap_rounds_up_to_millis() {
        let now = at(1_234) + Duration::nanoseconds(567);
        let r = new_recap(&[], "done", Mood::Bad, now).unwrap();
        assert_eq!(r.date, at(1_235));
        assert!(r.date >= now);

        let exact = new_recap(&[], "done", Mood::Bad, at(2_000)).unwrap();
        assert_eq!(exact.date, at(2_000));
    }

    #[test]
    fn new_recap_never_collides_with_existing() {
        let existing = vec![record(5_000)];
        let r = new_recap(&existing, "again", Mood::Good, at(5_000)).unwrap();
        assert_eq!(r.date, at(5_001));

        let later = new_recap(&existing, "later", Mood::Good, at(9_000)).unwrap();
        assert_eq!(later.date, at(9_000));
    }

    #[test]
    fn edit_and_delete_by_date() {
        let mut recaps = vec![record(1_000), record(2_000)];
        edit_recap(&mut recaps, at(2_000), "better".into(), Mood::Good).unwrap();
        assert_eq!(recaps[1].text, "better");
        assert_eq!(recaps[1].mood, Mood::Good);

        let removed = delete_recap(&mut recaps, at(1_000)).unwrap();
        assert_eq!(removed.text, "recap 1000");
        assert_eq!(recaps.len(), 1);
    }

    #[test]
    fn edit_and_delete_unknown_date_is_not_found() {
        let mut recaps = vec![record(1_000)];
        let before = recaps.clone();
        assert!(matches!(
            edit_recap(&mut recaps, at(3), "x".into(), Mood::Bad),
            Err(TaskError::NotFound(_))
        ));
        assert!(matches!(delete_recap(&mut recaps, at(3)), Err(TaskError::NotFound(_))));
        assert_eq!(recaps, before);
    }

    #[test]
    fn progress_caps_at_target() {
        assert_eq!(progress(0, 10).percent, 0);
        assert_eq!(progress(3, 10).percent, 30);
        assert_eq!(progress(2, 3).percent, 66);
        let over = progress(12, 10);
        assert_eq!(over.percent, 100);
        assert!(over.target_met);
        assert!(!progress(9, 10).target_met);
    }
}
