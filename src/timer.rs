//! Focus stopwatch for a single task.
//!
//! The timer is bound to a task by id, so renaming the task while the clock
//! runs keeps the association. It is driven by [`TimerSignal`]s (usually
//! received from an [`EventBus`](crate::events::EventBus)) and never reads
//! the clock itself: callers pass `now`.

use std::sync::mpsc::Receiver;

use chrono::{DateTime, TimeDelta, Utc};

use crate::io::kv::KeyValueStore;
use crate::model::item::ItemId;
use crate::store::TaskListStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    /// Bind to a task (resetting if it was bound elsewhere) and run
    Start(ItemId),
    /// Pause if running for this task, otherwise behave like `Start`
    Toggle(ItemId),
    Pause,
    /// Stop, zero the clock and unbind
    Reset,
}

#[derive(Debug, Clone)]
pub struct FocusTimer {
    task: Option<ItemId>,
    accumulated: TimeDelta,
    running_since: Option<DateTime<Utc>>,
}

impl Default for FocusTimer {
    fn default() -> Self {
        FocusTimer {
            task: None,
            accumulated: TimeDelta::zero(),
            running_since: None,
        }
    }
}

impl FocusTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, signal: TimerSignal, now: DateTime<Utc>) {
        match signal {
            TimerSignal::Start(id) => self.start(id, now),
            TimerSignal::Toggle(id) => {
                if self.task == Some(id) && self.is_running() {
                    self.pause(now);
                } else {
                    self.start(id, now);
                }
            }
            TimerSignal::Pause => self.pause(now),
            TimerSignal::Reset => *self = FocusTimer::default(),
        }
    }

    /// Apply every signal waiting on `rx`. Returns how many were handled.
    pub fn drain(&mut self, rx: &Receiver<TimerSignal>, now: DateTime<Utc>) -> usize {
        let mut handled = 0;
        while let Ok(signal) = rx.try_recv() {
            self.handle(signal, now);
            handled += 1;
        }
        handled
    }

    pub fn task(&self) -> Option<ItemId> {
        self.task
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        let running = self
            .running_since
            .map(|since| (now - since).max(TimeDelta::zero()))
            .unwrap_or(TimeDelta::zero());
        (self.accumulated + running).num_seconds()
    }

    /// Current text of the bound task. `None` when unbound or the task is gone.
    pub fn label<'a, S: KeyValueStore>(&self, store: &'a TaskListStore<S>) -> Option<&'a str> {
        store.item(self.task?).map(|item| item.text.as_str())
    }

    fn start(&mut self, id: ItemId, now: DateTime<Utc>) {
        if self.task != Some(id) {
            *self = FocusTimer::default();
            self.task = Some(id);
        }
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    fn pause(&mut self, now: DateTime<Utc>) {
        if let Some(since) = self.running_since.take() {
            self.accumulated = self.accumulated + (now - since).max(TimeDelta::zero());
        }
    }
}

/// `MM:SS`; minutes keep growing past 99.
pub fn format_elapsed(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
