//! Rate state for the behavioral guards.
//!
//! Best-effort, in-memory record of recent message instants per guard, chat
//! and sender. Losing it (restart) just means everyone starts with a clean
//! history.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// How long recorded instants are kept.
pub const DEFAULT_RETENTION_SECS: i64 = 10 * 60;

/// Identity of one rate history. Histories are never shared between
/// chats, senders, or guards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub guard_id: String,
    pub chat_id: String,
    pub sender_id: String,
}

impl RateKey {
    pub fn new(guard_id: &str, chat_id: &str, sender_id: &str) -> Self {
        Self {
            guard_id: guard_id.to_string(),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
        }
    }
}

/// Sliding-window message history, shared by all rate-limiting guards.
///
/// Each guard keeps its own history per chat and sender, so slow-mode and
/// no-spam on the same group never count each other's records.
pub struct RateStore {
    entries: Mutex<HashMap<RateKey, Vec<DateTime<Utc>>>>,
    retention: Duration,
}

impl RateStore {
    /// Create a store with the default 10-minute retention.
    pub fn new() -> Arc<Self> {
        Self::with_retention(Duration::seconds(DEFAULT_RETENTION_SECS))
    }

    pub fn with_retention(retention: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            retention,
        })
    }

    /// Count instants strictly newer than `now - window`, then record `now`.
    ///
    /// Returns the count taken before recording. Counting and recording
    /// happen under one lock, so concurrent passes for the same key each
    /// see the other's message.
    ///
    /// A window reaching past the representable range counts every instant.
    pub fn record(&self, key: RateKey, window: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let times = entries.entry(key).or_default();
        let recent = times.iter().filter(|t| **t > cutoff).count();
        times.push(now);
        recent
    }

    /// Drop instants older than the retention window and forget keys left
    /// empty. Returns the number of keys removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now
            .checked_sub_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
        let removed = before - entries.len();
        debug!(removed, remaining = entries.len(), "Swept rate state");
        removed
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spawn a background task that periodically sweeps expired rate state.
///
/// Abort the returned handle to stop sweeping.
pub fn spawn_sweep_task(
    store: Arc<RateStore>,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            store.sweep(Utc::now());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn key(chat: &str, sender: &str) -> RateKey {
        RateKey::new("no-spam", chat, sender)
    }

    #[test]
    fn record_counts_before_appending() {
        let store = RateStore::new();
        let window = Duration::seconds(10);

        assert_eq!(store.record(key("c", "s"), window, t0()), 0);
        assert_eq!(store.record(key("c", "s"), window, t0() + Duration::seconds(1)), 1);
        assert_eq!(store.record(key("c", "s"), window, t0() + Duration::seconds(2)), 2);
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let window = Duration::seconds(10);

        // Exactly `window` later the first instant is no longer "newer than cutoff".
        let store = RateStore::new();
        store.record(key("c", "s"), window, t0());
        assert_eq!(store.record(key("c", "s"), window, t0() + window), 0);

        let store = RateStore::new();
        store.record(key("c", "s"), window, t0());
        let just_inside = t0() + window - Duration::milliseconds(1);
        assert_eq!(store.record(key("c", "s"), window, just_inside), 1);
    }

    #[test]
    fn keys_are_isolated() {
        let store = RateStore::new();
        let window = Duration::seconds(60);
        store.record(key("chat-a", "alice"), window, t0());

        assert_eq!(store.record(key("chat-b", "alice"), window, t0()), 0);
        assert_eq!(store.record(key("chat-a", "bob"), window, t0()), 0);
        assert_eq!(
            store.record(RateKey::new("slow-mode", "chat-a", "alice"), window, t0()),
            0
        );
        assert_eq!(store.record(key("chat-a", "alice"), window, t0()), 1);
    }

    #[test]
    fn oversized_window_counts_all_history() {
        let store = RateStore::new();
        store.record(key("c", "s"), Duration::MAX, t0());
        store.record(key("c", "s"), Duration::MAX, t0() + Duration::minutes(5));
        assert_eq!(store.record(key("c", "s"), Duration::MAX, t0() + Duration::minutes(9)), 2);
    }

    #[test]
    fn sweep_drops_expired_and_empty_keys() {
        let store = RateStore::new();
        let window = Duration::seconds(60);
        store.record(key("c", "old"), window, t0());
        store.record(key("c", "mixed"), window, t0());
        store.record(key("c", "mixed"), window, t0() + Duration::minutes(9));
        assert_eq!(store.len(), 2);

        let removed = store.sweep(t0() + Duration::minutes(11));
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        let later = t0() + Duration::minutes(11);
        assert_eq!(store.record(key("c", "mixed"), Duration::minutes(30), later), 1);
    }

    #[test]
    fn sweep_on_empty_store() {
        let store = RateStore::new();
        assert_eq!(store.sweep(t0()), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn sweep_task_runs_and_aborts() {
        let store = RateStore::with_retention(Duration::zero());
        store.record(key("c", "s"), Duration::seconds(1), Utc::now() - Duration::seconds(1));

        let handle = spawn_sweep_task(Arc::clone(&store), std::time::Duration::from_millis(10));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(store.is_empty());

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
