//! Change feed for local shadow events.
//!
//! The feed emits an event for every committed local shadow mutation so
//! that local subscribers (IPC fan-out, reactive consumers) can observe
//! sync activity. The consumer side lives outside this crate.

use parking_lot::RwLock;
use shadowsync_document::ShadowKey;
use std::sync::mpsc::{self, Receiver, Sender};

/// Type of local shadow change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowEventKind {
    /// The shadow document was created or replaced.
    Updated,
    /// The shadow document was deleted.
    Deleted,
}

/// A single local shadow change.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowEvent {
    /// Identity of the shadow that changed.
    pub key: ShadowKey,
    /// Type of change.
    pub kind: ShadowEventKind,
    /// Local version after the change.
    pub version: u64,
    /// New document bytes. `None` for deletes.
    pub document: Option<Vec<u8>>,
}

impl ShadowEvent {
    /// Creates an update event.
    pub fn updated(key: ShadowKey, version: u64, document: Vec<u8>) -> Self {
        Self {
            key,
            kind: ShadowEventKind::Updated,
            version,
            document: Some(document),
        }
    }

    /// Creates a delete event.
    pub fn deleted(key: ShadowKey, version: u64) -> Self {
        Self {
            key,
            kind: ShadowEventKind::Deleted,
            version,
            document: None,
        }
    }
}

/// Distributes local shadow changes to subscribers.
///
/// Events are emitted after the store commits a mutation, in commit order.
/// Disconnected subscribers are dropped on the next emit.
#[derive(Default)]
pub struct ShadowEventFeed {
    subscribers: RwLock<Vec<Sender<ShadowEvent>>>,
}

impl ShadowEventFeed {
    /// Creates a feed with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the feed, receiving all future events.
    pub fn subscribe(&self) -> Receiver<ShadowEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: ShadowEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
