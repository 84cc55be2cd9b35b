//! Sender/receiver pair carrying [`CacheEvent`]s out of the cache.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::CacheEvent;

/// Where the cache reports what it did.
///
/// Cloneable and `Send`. A sender built by [`null_sender`] has no channel
/// behind it and drops every event.
#[derive(Clone, Default)]
pub struct EventSender {
    inner: Option<Sender<CacheEvent>>,
}

impl EventSender {
    /// Report an event. Never blocks; events are dropped once the receiver
    /// is gone.
    pub fn send(&self, event: CacheEvent) {
        if let Some(sender) = &self.inner {
            let _ = sender.send(event);
        }
    }
}

/// Collects events reported by the cache.
pub struct EventReceiver {
    inner: Receiver<CacheEvent>,
}

impl EventReceiver {
    /// Everything reported since the last drain, oldest first. Never blocks.
    pub fn drain(&self) -> Vec<CacheEvent> {
        self.inner.try_iter().collect()
    }
}

/// Constructor for sender/receiver pairs.
pub struct EventChannel;

impl EventChannel {
    /// Unbounded, so the cache never waits on a slow listener.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender {
                inner: Some(sender),
            },
            EventReceiver { inner: receiver },
        )
    }
}

/// Sender for callers that don't observe the cache.
pub fn null_sender() -> EventSender {
    EventSender::default()
}
