//! In-process store backend.
//!
//! [`InMemoryStore`] keeps keys and sets behind a single
//! [`tokio::sync::Mutex`], so each trait method is atomic. Keys carry a
//! [`tokio::time::Instant`] deadline; they are purged lazily when touched
//! and eagerly by a background sweeper. Every purge publishes the key on
//! the store's [`ExpiryFeed`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};

use super::{ExpiredKey, ExpiryFeed, KeyValueStore, StoreError, StoreResult};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    keys: HashMap<String, Entry>,
    sets: HashMap<String, HashSet<String>>,
}

impl State {
    /// Drops `key` if its deadline has passed, announcing the expiry.
    fn purge_if_expired(&mut self, key: &str, now: Instant, feed: &ExpiryFeed) {
        if self.keys.get(key).is_some_and(|e| e.expires_at <= now) {
            self.keys.remove(key);
            feed.publish(key);
        }
    }

    /// Drops every key whose deadline has passed. Returns how many went.
    fn sweep(&mut self, now: Instant, feed: &ExpiryFeed) -> usize {
        let before = self.keys.len();
        self.keys.retain(|key, entry| {
            if entry.expires_at > now {
                return true;
            }
            feed.publish(key.as_str());
            false
        });
        before.saturating_sub(self.keys.len())
    }

    fn live(&mut self, key: &str, feed: &ExpiryFeed) -> Option<&mut Entry> {
        self.purge_if_expired(key, Instant::now(), feed);
        self.keys.get_mut(key)
    }
}

/// Store backend living entirely in process memory.
///
/// Suitable for a single-instance deployment and for tests. Data does not
/// survive a restart.
#[derive(Debug)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    feed: ExpiryFeed,
    shutdown: watch::Sender<bool>,
}

impl InMemoryStore {
    /// Creates an empty store and spawns its expiry sweeper.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(sweep_interval: Duration, feed_capacity: usize) -> Arc<Self> {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let store = Arc::new(Self {
            state: Arc::new(Mutex::new(State::default())),
            feed: ExpiryFeed::new(feed_capacity),
            shutdown,
        });
        tokio::spawn(run_sweeper(
            Arc::clone(&store.state),
            store.feed.clone(),
            sweep_interval.max(Duration::from_millis(1)),
            shutdown_rx,
        ));
        store
    }

    /// Returns the feed expiry notifications are published on.
    #[must_use]
    pub fn feed(&self) -> &ExpiryFeed {
        &self.feed
    }
}

async fn run_sweeper(
    state: Arc<Mutex<State>>,
    feed: ExpiryFeed,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {
                let removed = state.lock().await.sweep(Instant::now(), &feed);
                if removed > 0 {
                    tracing::debug!(removed, "swept expired keys");
                }
            }
        }
    }

    tracing::debug!("in-memory expiry sweeper stopped");
}

/// Deadline `ttl` after `now`, rejecting TTLs the clock cannot represent.
fn deadline(now: Instant, ttl: Duration) -> StoreResult<Instant> {
    now.checked_add(ttl)
        .ok_or_else(|| StoreError::Backend(format!("ttl out of range: {ttl:?}")))
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let expires_at = deadline(now, ttl)?;
        state.purge_if_expired(key, now, &self.feed);
        state.keys.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut state = self.state.lock().await;
        Ok(state.live(key, &self.feed).map(|e| e.value.clone()))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.live(key, &self.feed).is_some())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        state.purge_if_expired(key, Instant::now(), &self.feed);
        Ok(state.keys.remove(key).is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let expires_at = deadline(Instant::now(), ttl)?;
        let Some(entry) = state.live(key, &self.feed) else {
            return Ok(false);
        };
        entry.expires_at = expires_at;
        Ok(true)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        Ok(state
            .live(key, &self.feed)
            .map(|e| e.expires_at.saturating_duration_since(now)))
    }

    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_remove(&self, set: &str, member: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let Some(members) = state.sets.get_mut(set) else {
            return Ok(false);
        };
        let removed = members.remove(member);
        if members.is_empty() {
            state.sets.remove(set);
        }
        Ok(removed)
    }

    async fn set_pop(&self, set: &str) -> StoreResult<Option<String>> {
        let mut state = self.state.lock().await;
        let Some(members) = state.sets.get_mut(set) else {
            return Ok(None);
        };
        let picked = members.iter().next().cloned();
        if let Some(member) = &picked {
            members.remove(member);
        }
        if members.is_empty() {
            state.sets.remove(set);
        }
        Ok(picked)
    }

    async fn set_is_member(&self, set: &str, member: &str) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state.sets.get(set).is_some_and(|m| m.contains(member)))
    }

    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .sets
            .get(set)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn subscribe_expired(&self) -> broadcast::Receiver<ExpiredKey> {
        self.feed.subscribe()
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
