use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::domain::{JobQueueEvent, QueueJob};
use crate::queue::WeakJobQueue;

/// One event about the jobs a single operation touched.
pub(crate) struct Notification<J> {
    event: JobQueueEvent,
    jobs: Vec<J>,
}

impl<J> Notification<J> {
    pub(crate) fn new(event: JobQueueEvent, jobs: Vec<J>) -> Self {
        Self { event, jobs }
    }
}

/// Deliver notifications to the queue's observers, in the order they were
/// sent, until the queue is dropped.
pub(crate) fn spawn_dispatcher<J: QueueJob>(
    queue: WeakJobQueue<J>,
    mut rx: mpsc::UnboundedReceiver<Notification<J>>,
) {
    tokio::spawn(async move {
        // 送信側は Inner が持つ。キューが消えると recv は None
        while let Some(Notification { event, jobs }) = rx.recv().await {
            let Some(queue) = queue.upgrade() else {
                break;
            };

            let observers = queue.observers().live();
            debug!(
                queue = %queue.name(),
                %event,
                jobs = jobs.len(),
                observers = observers.len(),
                "dispatching notification"
            );

            for observer in observers {
                let delivered =
                    catch_unwind(AssertUnwindSafe(|| (observer.callback)(&queue, &jobs, event)));
                if delivered.is_err() {
                    error!(
                        queue = %queue.name(),
                        observer = %observer.id,
                        %event,
                        "observer panicked; continuing with the rest"
                    );
                }
            }
        }
    });
}
