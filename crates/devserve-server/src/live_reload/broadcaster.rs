//! Live reload subscriber registry.
//!
//! Each connected browser owns a [`Subscription`]: the receiving half of a
//! small bounded queue of ready-to-write event-stream frames. The broadcaster
//! keeps the sending halves keyed by subscriber id. Dropping a subscription
//! (the HTTP response body going away) removes it from the registry.

use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use axum::body::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Comment frame sent as soon as a client connects.
pub(crate) const CONNECTED_FRAME: &str = ": connected\n\n";

/// Frames buffered per subscriber before events are skipped.
const QUEUE_CAPACITY: usize = 16;

/// Identifier of a live reload subscriber.
pub type SubscriberId = u64;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Bytes>>>,
}

impl Registry {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Bytes>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pushes reload events to every connected browser.
///
/// Cloning is cheap; clones share the same subscriber set.
#[derive(Clone, Default)]
pub struct LiveReloadBroadcaster {
    registry: Arc<Registry>,
}

impl LiveReloadBroadcaster {
    /// Create a broadcaster with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    ///
    /// The connection acknowledgement frame is already queued on the returned
    /// subscription.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        // A fresh queue always has room.
        let _ = sender.try_send(Bytes::from_static(CONNECTED_FRAME.as_bytes()));

        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut subscribers = self.registry.subscribers();
            subscribers.insert(id, sender);
            subscribers.len()
        };
        tracing::debug!(id, subscribers = count, "Live reload client connected");

        Subscription {
            id,
            receiver,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.registry.subscribers().remove(&id).is_some()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers().len()
    }

    /// Send a reload event to every subscriber.
    ///
    /// Subscribers whose connection is gone are removed; the others still
    /// receive the event. Returns the number of subscribers the event was
    /// queued for.
    pub fn broadcast(&self, reason: &str) -> usize {
        let snapshot: Vec<_> = self
            .registry
            .subscribers()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        if snapshot.is_empty() {
            return 0;
        }

        let frame = reload_frame(chrono::Utc::now().timestamp_millis(), reason);
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, sender) in snapshot {
            match sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Closed(_)) => closed.push(id),
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(id, "Live reload client is not reading, event skipped");
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.registry.subscribers();
            for id in &closed {
                subscribers.remove(id);
            }
            tracing::debug!(removed = closed.len(), "Dropped closed live reload clients");
        }

        tracing::info!(reason, delivered, "Live reload event sent");
        delivered
    }

    /// Drop every subscriber, ending their event streams.
    pub fn close_all(&self) {
        self.registry.subscribers().clear();
    }
}

/// Build a reload frame.
///
/// Line breaks in `reason` would end the frame early, so they become spaces.
pub(crate) fn reload_frame(id: i64, reason: &str) -> Bytes {
    let reason = reason.replace(['\r', '\n'], " ");
    Bytes::from(format!("data: reload\nid: {id}\ncomment: {reason}\n\n"))
}

/// One browser's stream of event frames.
///
/// Yields frames until the broadcaster drops the subscriber. Dropping the
/// subscription unregisters it.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Bytes>,
    registry: Arc<Registry>,
}

impl Subscription {
    /// Subscriber id.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next frame. `None` once the subscriber has been dropped.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.registry.subscribers().remove(&self.id).is_some() {
            tracing::debug!(id = self.id, "Live reload client disconnected");
        }
    }
}
