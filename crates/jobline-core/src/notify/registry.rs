use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::domain::{JobQueueEvent, QueueJob};
use crate::queue::JobQueue;

use super::token::{NotificationToken, Observer, ObserverId};

/// Weakly-held observers of one queue.
pub(crate) struct ObserverRegistry<J: QueueJob> {
    slots: Mutex<Vec<Weak<Observer<J>>>>,
}

impl<J: QueueJob> ObserverRegistry<J> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn register<F>(&self, callback: F) -> NotificationToken<J>
    where
        F: Fn(&JobQueue<J>, &[J], JobQueueEvent) + Send + Sync + 'static,
    {
        let observer = Arc::new(Observer {
            id: ObserverId::new(),
            callback: Box::new(callback),
        });
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(&observer));
        NotificationToken::new(observer)
    }

    /// Observers still alive, in registration order. Dead slots are dropped.
    pub(crate) fn live(&self) -> Vec<Arc<Observer<J>>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut live = Vec::with_capacity(slots.len());
        slots.retain(|slot| match slot.upgrade() {
            Some(observer) => {
                live.push(observer);
                true
            }
            None => false,
        });
        live
    }

    pub(crate) fn live_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }

    /// Slots including ones whose token is gone but not compacted yet.
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
