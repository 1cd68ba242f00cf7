use std::fmt;
use std::sync::Arc;

use ulid::Ulid;

use crate::domain::{JobQueueEvent, QueueJob};
use crate::queue::JobQueue;

/// Identity of one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Ulid);

impl ObserverId {
    pub(crate) fn new() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

pub(crate) type Callback<J> = dyn Fn(&JobQueue<J>, &[J], JobQueueEvent) + Send + Sync;

pub(crate) struct Observer<J: QueueJob> {
    pub(crate) id: ObserverId,
    pub(crate) callback: Box<Callback<J>>,
}

/// Keeps an observer subscribed.
///
/// The queue only holds a weak reference to the observer; when the token is
/// dropped the callback is released and never invoked again.
#[must_use = "the observer is unsubscribed as soon as the token is dropped"]
pub struct NotificationToken<J: QueueJob> {
    observer: Arc<Observer<J>>,
}

impl<J: QueueJob> NotificationToken<J> {
    pub(crate) fn new(observer: Arc<Observer<J>>) -> Self {
        Self { observer }
    }

    pub fn id(&self) -> ObserverId {
        self.observer.id
    }

    /// Same as dropping the token.
    pub fn unsubscribe(self) {}
}

impl<J: QueueJob> fmt::Debug for NotificationToken<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NotificationToken").field(&self.observer.id).finish()
    }
}
