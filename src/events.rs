use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::model::item::ItemId;
use crate::model::list::ListId;

/// Notifications published by the store after a successful change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    TaskAdded(ItemId),
    SectionAdded(ItemId),
    ItemEdited(ItemId),
    ItemDeleted(ItemId),
    TaskCompleted(ItemId),
    TaskRestored(ItemId),
    ItemMoved { id: ItemId, to: ListId, index: usize },
    RecapSaved(DateTime<Utc>),
    RecapUpdated(DateTime<Utc>),
    RecapDeleted(DateTime<Utc>),
    TargetChanged(u32),
    NameChanged,
    SampleLoaded,
    Reset,
    /// The change is kept in memory but could not be written out
    PersistenceFailed(String),
}

/// Fan-out channel: every subscriber gets its own copy of each event.
///
/// Cloning the bus shares the subscriber list, so one clone can be handed to
/// the store while another stays with the presentation layer.
pub struct EventBus<E> {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<E>>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        EventBus {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        EventBus {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published from now on are delivered to the returned receiver.
    pub fn subscribe(&self) -> mpsc::Receiver<E> {
        let (tx, rx) = mpsc::channel();
        self.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber; dropped receivers are pruned.
    pub fn publish(&self, event: E) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::Sender<E>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives_events() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(StoreEvent::Reset);
        assert_eq!(a.try_recv().unwrap(), StoreEvent::Reset);
        assert_eq!(b.try_recv().unwrap(), StoreEvent::Reset);
    }

    #[test]
    fn clones_share_subscribers() {
        let bus: EventBus<StoreEvent> = EventBus::new();
        let rx = bus.subscribe();
        let handle = bus.clone();
        handle.publish(StoreEvent::SampleLoaded);
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::SampleLoaded);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let bus: EventBus<StoreEvent> = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        bus.publish(StoreEvent::NameChanged);
        assert_eq!(bus.lock().len(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let bus: EventBus<StoreEvent> = EventBus::new();
        bus.publish(StoreEvent::Reset);
        assert!(bus.lock().is_empty());
    }
}
