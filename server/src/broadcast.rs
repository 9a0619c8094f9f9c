//! Fan-out of registry events to every connected observer.
//!
//! Each observer owns a bounded FIFO queue. Publishing never waits on an
//! observer: a full queue means the observer stalled, a closed queue means
//! it went away, and either way it is dropped from the set while the
//! publishing mutation carries on.

use dashmap::DashMap;
use hangman_lobby_protocol::LobbyEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Identifies a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Sending side of one observer's event queue.
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    /// Who is on the other end (peer address for sessions).
    pub peer: String,
    sender: mpsc::Sender<LobbyEvent>,
}

impl ObserverHandle {
    /// Create a handle and the queue it feeds.
    ///
    /// The session that owns the receiver decides how events reach the
    /// client; the broadcaster only ever holds the sender.
    pub fn new(peer: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<LobbyEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                peer: peer.into(),
                sender,
            },
            receiver,
        )
    }

    fn try_deliver(&self, event: LobbyEvent) -> Result<(), Unreachable> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => Unreachable::Stalled,
            TrySendError::Closed(_) => Unreachable::Gone,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unreachable {
    Stalled,
    Gone,
}

/// Outcome of one [`EventBroadcaster::publish`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Observers that accepted the event.
    pub delivered: usize,
    /// Observers found unreachable and removed.
    pub dropped: Vec<ObserverId>,
}

/// The set of registered observers.
pub struct EventBroadcaster {
    observers: DashMap<ObserverId, ObserverHandle>,
    next_id: AtomicU64,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self {
            observers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer. Safe while other threads are publishing.
    pub fn add_observer(&self, observer: ObserverHandle) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(?id, peer = %observer.peer, "Observer registered");
        self.observers.insert(id, observer);
        id
    }

    /// Register an observer whose queue is seeded with `first` before any
    /// later event can reach it.
    pub(crate) fn add_observer_with(&self, observer: ObserverHandle, first: LobbyEvent) -> ObserverId {
        if observer.try_deliver(first).is_err() {
            tracing::debug!(peer = %observer.peer, "Observer gone before registration");
        }
        self.add_observer(observer)
    }

    /// Forget an observer. Returns whether it was still registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let removed = self.observers.remove(&id).is_some();
        if removed {
            tracing::debug!(?id, "Observer removed");
        }
        removed
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Queue `event` for every observer without waiting on any of them.
    pub fn publish(&self, event: LobbyEvent) -> PublishReport {
        let mut report = PublishReport::default();

        for observer in self.observers.iter() {
            match observer.try_deliver(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(Unreachable::Stalled) => {
                    tracing::warn!(
                        id = ?observer.key(),
                        peer = %observer.peer,
                        "Observer queue full, dropping observer"
                    );
                    report.dropped.push(*observer.key());
                }
                Err(Unreachable::Gone) => {
                    tracing::debug!(id = ?observer.key(), peer = %observer.peer, "Observer gone");
                    report.dropped.push(*observer.key());
                }
            }
        }

        // Iteration guards are released; pruning can take shard write locks now.
        for id in &report.dropped {
            self.observers.remove(id);
        }

        report
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
