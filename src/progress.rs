use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_std::channel::{self, Receiver, Sender, TrySendError};
use tracing::{debug, trace};

use galleria_api_structs::UploadProgress;

use crate::lock;

struct Slot {
    id: u64,
    sender: Sender<UploadProgress>,
    // Used by the producer to evict a stale pending event.
    drain: Receiver<UploadProgress>,
}

/// Hands `upload-progress` events to at most one consumer. A pending event is
/// overwritten by the next one, and events with no consumer are dropped.
#[derive(Default)]
pub struct ProgressBus {
    consumer: Mutex<Option<Slot>>,
    next_id: AtomicU64,
}

impl ProgressBus {
    pub fn new() -> Arc<Self> {
        Arc::new(ProgressBus::default())
    }

    /// Hands `event` to the mounted consumer. Returns whether anyone was listening.
    pub fn emit(&self, mut event: UploadProgress) -> bool {
        let mut consumer = lock(&self.consumer);
        let slot = match consumer.as_ref() {
            Some(slot) => slot,
            None => {
                trace!(file_name = %event.file_name, "No progress consumer mounted, dropping event");
                return false;
            },
        };

        loop {
            match slot.sender.try_send(event) {
                Ok(()) => return true,
                Err(TrySendError::Full(pending)) => {
                    let _ = slot.drain.try_recv();
                    event = pending;
                },
                Err(TrySendError::Closed(_)) => {
                    *consumer = None;
                    return false;
                },
            }
        }
    }

    /// Registers a new consumer, replacing any previous one.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = channel::bounded(1);

        let previous = lock(&self.consumer).replace(Slot {
            id,
            sender,
            drain: receiver.clone(),
        });
        if previous.is_some() {
            debug!("Progress consumer replaced by a newer subscription");
        }

        Subscription {
            bus: Arc::downgrade(self),
            id,
            receiver,
        }
    }

    pub fn has_consumer(&self) -> bool {
        lock(&self.consumer).is_some()
    }
}

/// Registration on a [`ProgressBus`]. Dropping it unsubscribes.
pub struct Subscription {
    bus: Weak<ProgressBus>,
    id: u64,
    receiver: Receiver<UploadProgress>,
}

impl Subscription {
    /// Waits for the next event. `None` once the subscription has been released or
    /// superseded.
    pub async fn next(&self) -> Option<UploadProgress> {
        self.receiver.recv().await.ok()
    }

    /// Takes the pending event without waiting.
    pub fn latest(&self) -> Option<UploadProgress> {
        self.receiver.try_recv().ok()
    }

    pub(crate) fn receiver(&self) -> Receiver<UploadProgress> {
        self.receiver.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            let mut consumer = lock(&bus.consumer);
            if consumer.as_ref().map(|slot| slot.id) == Some(self.id) {
                *consumer = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_without_consumer_are_dropped() {
        let bus = ProgressBus::new();
        assert!(!bus.emit(UploadProgress::new("a.jpg", 10, "Processing")));

        let subscription = bus.subscribe();
        assert_eq!(subscription.latest(), None);
    }

    #[test]
    fn pending_event_is_superseded() {
        let bus = ProgressBus::new();
        let subscription = bus.subscribe();

        assert!(bus.emit(UploadProgress::new("fileA", 40, "uploading")));
        assert!(bus.emit(UploadProgress::new("fileB", 10, "uploading")));

        assert_eq!(
            subscription.latest(),
            Some(UploadProgress::new("fileB", 10, "uploading"))
        );
        assert_eq!(subscription.latest(), None);
    }

    #[test]
    fn dropping_subscription_releases_the_bus() {
        let bus = ProgressBus::new();
        let subscription = bus.subscribe();
        assert!(bus.has_consumer());

        drop(subscription);
        assert!(!bus.has_consumer());
        assert!(!bus.emit(UploadProgress::new("a.jpg", 100, "Complete")));
    }

    #[test]
    fn stale_subscription_does_not_release_its_successor() {
        let bus = ProgressBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        drop(first);
        assert!(bus.has_consumer());
        assert!(bus.emit(UploadProgress::new("a.jpg", 5, "Processing")));
        assert_eq!(second.latest().map(|e| e.progress), Some(5));
    }

    #[async_std::test]
    async fn next_ends_after_supersession() {
        let bus = ProgressBus::new();
        let first = bus.subscribe();
        let _second = bus.subscribe();

        assert_eq!(first.next().await, None);
    }
}
