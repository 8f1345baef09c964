//! Broadcast channel for key-expiry notifications.
//!
//! [`ExpiryFeed`] wraps a [`tokio::sync::broadcast`] channel. A store
//! backend publishes one [`ExpiredKey`] each time it removes a key because
//! its TTL elapsed, and the reconciler subscribes to react.

use tokio::sync::broadcast;

/// Notification that a key's TTL elapsed and the key is gone.
///
/// Only the key name is carried; the value is not retrievable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredKey {
    /// Name of the expired key.
    pub key: String,
}

/// Broadcast bus for [`ExpiredKey`] notifications.
///
/// Delivery is at-most-once: when the ring buffer is full the oldest
/// notifications are dropped for lagging receivers, and notifications
/// published with no receiver attached are lost.
#[derive(Debug, Clone)]
pub struct ExpiryFeed {
    sender: broadcast::Sender<ExpiredKey>,
}

impl ExpiryFeed {
    /// Creates a new `ExpiryFeed` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Announces that `key` expired.
    ///
    /// Returns the number of receivers that got the notification.
    pub fn publish(&self, key: impl Into<String>) -> usize {
        self.sender
            .send(ExpiredKey { key: key.into() })
            .unwrap_or(0)
    }

    /// Creates a receiver for all future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ExpiredKey> {
        self.sender.subscribe()
    }
}
