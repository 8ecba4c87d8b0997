//! In-memory expiring key-value stores.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, SystemTimeError, UNIX_EPOCH};

/// Interval between two background sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Lifetime of a rate-limit record.
pub const RATE_RECORD_TTL: Duration = Duration::from_secs(60 * 60);

/// Current Unix epoch time in milliseconds.
pub fn unix_ms() -> Result<u64, SystemTimeError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64)
}

#[derive(Clone, Debug)]
struct Entry<V> {
    value: V,
    stored_at: u64,
}

/// Result of a store lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Entry present and within its TTL.
    Hit(V),
    /// Entry present but past its TTL; the sweep has not reclaimed it yet.
    Expired,
    /// No entry under this key.
    Missing,
}

impl<V> Lookup<V> {
    /// Collapse to the live value, treating expired entries as absent.
    pub fn found(self) -> Option<V> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Expired | Self::Missing => None,
        }
    }
}

/// Shared map whose entries live at most `ttl` past their stored-at time.
///
/// Expiry is enforced on every lookup; the periodic sweep only reclaims
/// memory. Callers pass timestamps explicitly so stores can be driven by a
/// simulated clock under test.
#[derive(Clone, Debug)]
pub struct ExpiringStore<V> {
    entries: Arc<Mutex<HashMap<String, Entry<V>>>>,
    ttl_ms: u64,
}

impl<V: Clone> ExpiringStore<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        // the stores hold no cross-entry invariants, so a poisoned map is
        // still usable.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a value, overwriting any prior entry under the same key.
    pub fn insert(&self, key: &str, value: V, stored_at: u64) {
        self.lock().insert(key.to_owned(), Entry { value, stored_at });
    }

    /// Look up a value, reporting expired-but-unswept entries as such.
    pub fn get(&self, key: &str, now: u64) -> Lookup<V> {
        match self.lock().get(key) {
            Some(entry) if now.saturating_sub(entry.stored_at) > self.ttl_ms => Lookup::Expired,
            Some(entry) => Lookup::Hit(entry.value.clone()),
            None => Lookup::Missing,
        }
    }

    /// Delete an entry. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Evict every entry past its TTL.
    pub fn sweep(&self, now: u64) {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_sub(entry.stored_at) <= self.ttl_ms);

        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, "expired entries swept");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
