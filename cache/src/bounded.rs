use crate::builder::CacheBuilder;
use crate::entry::{CacheEntry, EntryInfo};
use crate::metrics::{CacheStats, Metrics, StoreShape};
use crate::recency::RecencyList;
use crate::time::Clock;
use crate::{EvictionListener, EvictionReason};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::{HashMap, HashMapExt};
use parking_lot::Mutex;

type Removed<V> = Vec<(String, V, EvictionReason)>;

/// The entry map and the recency list, always mutated together under one lock.
struct Store<V> {
  entries: HashMap<String, CacheEntry<V>>,
  recency: RecencyList<String>,
}

impl<V> Store<V> {
  fn new() -> Self {
    Self {
      entries: HashMap::new(),
      recency: RecencyList::new(),
    }
  }

  /// Removes a key from both structures.
  fn take(&mut self, key: &str) -> Option<(String, CacheEntry<V>)> {
    let removed = self.entries.remove_entry(key)?;
    self.recency.remove(key);
    Some(removed)
  }

  fn take_all<I>(&mut self, keys: I, reason: EvictionReason) -> Removed<V>
  where
    I: IntoIterator<Item = String>,
  {
    keys
      .into_iter()
      .filter_map(|key| self.take(&key))
      .map(|(key, entry)| (key, entry.value, reason))
      .collect()
  }
}

/// A thread-safe keyed store with per-entry TTL and a hard capacity enforced
/// by least-recently-used eviction.
///
/// - Size never exceeds `max_size`: a new key evicts the LRU entry *before*
///   it is inserted.
/// - Expiry is checked on every read. An entry is served during
///   `[inserted_at, inserted_at + ttl)` and is a miss from then on, whether
///   or not `cleanup()` has run.
/// - Reads move the key to the most-recently-used position. `peek`,
///   `remaining_ttl` and `entry_info` do not.
///
/// Hit/miss counters live as long as the cache; `clear()` leaves them alone.
pub struct BoundedCache<V> {
  name: String,
  max_size: usize,
  default_ttl: Duration,
  store: Mutex<Store<V>>,
  metrics: Metrics,
  clock: Arc<dyn Clock>,
  listener: Option<Arc<dyn EvictionListener<V>>>,
}

impl<V> fmt::Debug for BoundedCache<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BoundedCache")
      .field("name", &self.name)
      .field("max_size", &self.max_size)
      .field("default_ttl", &self.default_ttl)
      .field("size", &self.len())
      .field("has_listener", &self.listener.is_some())
      .finish_non_exhaustive()
  }
}

impl<V> BoundedCache<V> {
  /// Returns a builder for a new cache.
  pub fn builder() -> CacheBuilder<V> {
    CacheBuilder::new()
  }

  pub(crate) fn from_parts(
    name: String,
    max_size: usize,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    listener: Option<Arc<dyn EvictionListener<V>>>,
  ) -> Self {
    Self {
      name,
      max_size,
      default_ttl,
      store: Mutex::new(Store::new()),
      metrics: Metrics::new(),
      clock,
      listener,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn max_size(&self) -> usize {
    self.max_size
  }

  pub fn default_ttl(&self) -> Duration {
    self.default_ttl
  }

  /// The current time according to this cache's clock.
  pub fn now(&self) -> Instant {
    self.clock.now()
  }

  /// Number of stored entries, including expired ones not yet swept.
  pub fn len(&self) -> usize {
    self.store.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Inserts or overwrites `key`.
  ///
  /// An overwrite restarts the entry's lifetime and makes it most recently
  /// used. A new key evicts the least-recently-used entry first when the
  /// cache is full. `ttl` falls back to the cache's default.
  pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
    let key = key.into();
    let ttl = ttl.unwrap_or(self.default_ttl);
    let now = self.clock.now();
    let mut evicted = Vec::new();

    {
      let mut guard = self.store.lock();
      let store = &mut *guard;

      if let Some(entry) = store.entries.get_mut(&key) {
        // The previous value is dropped here, under the lock.
        entry.overwrite(value, ttl, now);
        store.recency.move_to_back(key.as_str());
        Metrics::record(&self.metrics.updates, 1);
      } else {
        while store.entries.len() >= self.max_size {
          let Some(victim) = store.recency.pop_front() else {
            break;
          };
          if let Some(entry) = store.entries.remove(&victim) {
            tracing::trace!(cache = %self.name, key = %victim, "evicted least-recently-used entry");
            evicted.push((victim, entry.value, EvictionReason::Capacity));
          }
        }
        store.entries.insert(key.clone(), CacheEntry::new(value, ttl, now));
        store.recency.push_back(key);
        Metrics::record(&self.metrics.inserts, 1);
      }
    }

    Metrics::record(&self.metrics.evicted_by_capacity, evicted.len() as u64);
    self.notify(evicted);
  }

  /// Returns a clone of the live value for `key`.
  ///
  /// A hit bumps the entry's access count and makes it most recently used.
  /// An expired entry is removed and counted as a miss.
  pub fn get(&self, key: &str) -> Option<V>
  where
    V: Clone,
  {
    let now = self.clock.now();

    let expired = {
      let mut guard = self.store.lock();
      let store = &mut *guard;

      match store.entries.get(key).map(|entry| entry.is_expired(now)) {
        None => None,
        Some(true) => store.take(key),
        Some(false) => {
          if let Some(entry) = store.entries.get_mut(key) {
            entry.touch(now);
            let value = entry.value.clone();
            store.recency.move_to_back(key);
            Metrics::record(&self.metrics.hits, 1);
            return Some(value);
          }
          None
        }
      }
    };

    Metrics::record(&self.metrics.misses, 1);
    if let Some((key, entry)) = expired {
      tracing::trace!(cache = %self.name, key = %key, "dropped expired entry on read");
      Metrics::record(&self.metrics.evicted_by_ttl, 1);
      self.notify(vec![(key, entry.value, EvictionReason::Expired)]);
    }
    None
  }

  /// Reads a live value without touching recency, access metadata or the
  /// hit/miss counters.
  pub fn peek(&self, key: &str) -> Option<V>
  where
    V: Clone,
  {
    let now = self.clock.now();
    let guard = self.store.lock();
    guard
      .entries
      .get(key)
      .filter(|entry| !entry.is_expired(now))
      .map(|entry| entry.value.clone())
  }

  /// Whether `key` holds a live entry. Does not count as an access.
  pub fn contains_key(&self, key: &str) -> bool {
    let now = self.clock.now();
    let guard = self.store.lock();
    guard
      .entries
      .get(key)
      .is_some_and(|entry| !entry.is_expired(now))
  }

  /// Lifetime left on a live entry. Does not count as an access.
  pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
    let now = self.clock.now();
    let guard = self.store.lock();
    guard
      .entries
      .get(key)
      .filter(|entry| !entry.is_expired(now))
      .map(|entry| entry.remaining_ttl(now))
  }

  /// Bookkeeping of a live entry. Does not count as an access.
  pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
    let now = self.clock.now();
    let guard = self.store.lock();
    guard
      .entries
      .get(key)
      .filter(|entry| !entry.is_expired(now))
      .map(CacheEntry::info)
  }

  /// Removes `key`, returning whether it was present.
  pub fn delete(&self, key: &str) -> bool {
    let removed = self.store.lock().take(key);
    match removed {
      Some((key, entry)) => {
        Metrics::record(&self.metrics.invalidations, 1);
        self.notify(vec![(key, entry.value, EvictionReason::Invalidated)]);
        true
      }
      None => false,
    }
  }

  /// Removes every entry whose key satisfies `predicate`, returning how many
  /// were removed.
  ///
  /// The predicate runs under the cache lock and must not call back into
  /// this cache, or it deadlocks. Listeners still run after the lock is
  /// released.
  pub fn delete_matching<F>(&self, predicate: F) -> usize
  where
    F: Fn(&str) -> bool,
  {
    let removed = {
      let mut guard = self.store.lock();
      let victims: Vec<String> = guard
        .recency
        .iter()
        .filter(|key| predicate(key.as_str()))
        .cloned()
        .collect();
      guard.take_all(victims, EvictionReason::Invalidated)
    };

    let count = removed.len();
    Metrics::record(&self.metrics.invalidations, count as u64);
    self.notify(removed);
    count
  }

  /// Empties the cache. Statistics counters are not reset.
  pub fn clear(&self) {
    let removed: Removed<V> = {
      let mut guard = self.store.lock();
      let store = &mut *guard;
      store.recency.clear();
      store
        .entries
        .drain()
        .map(|(key, entry)| (key, entry.value, EvictionReason::Cleared))
        .collect()
    };
    tracing::debug!(cache = %self.name, removed = removed.len(), "cache cleared");
    self.notify(removed);
  }

  /// Deletes every expired entry and returns how many were removed.
  ///
  /// Reads already refuse expired entries; this only bounds memory between
  /// reads. Safe to call at any time, including on an empty cache.
  pub fn cleanup(&self) -> usize {
    let now = self.clock.now();
    let removed = {
      let mut guard = self.store.lock();
      let expired: Vec<String> = guard
        .entries
        .iter()
        .filter(|(_, entry)| entry.is_expired(now))
        .map(|(key, _)| key.clone())
        .collect();
      guard.take_all(expired, EvictionReason::Expired)
    };

    let count = removed.len();
    if count > 0 {
      Metrics::record(&self.metrics.evicted_by_ttl, count as u64);
      tracing::debug!(cache = %self.name, removed = count, "swept expired entries");
    }
    self.notify(removed);
    count
  }

  /// Takes a point-in-time snapshot of the cache's statistics.
  pub fn stats(&self) -> CacheStats {
    let shape = {
      let guard = self.store.lock();
      let inserted = guard.entries.values().map(|entry| entry.inserted_at);
      let (oldest, newest) = inserted.fold((None, None), |(oldest, newest), ts| {
        (
          Some(oldest.map_or(ts, |o: Instant| o.min(ts))),
          Some(newest.map_or(ts, |n: Instant| n.max(ts))),
        )
      });
      StoreShape {
        size: guard.entries.len(),
        max_size: self.max_size,
        oldest_entry_ts: oldest,
        newest_entry_ts: newest,
      }
    };
    self.metrics.snapshot(shape)
  }

  /// Keys from least to most recently used, expired entries included.
  pub fn keys_by_recency(&self) -> Vec<String> {
    self.store.lock().recency.iter().cloned().collect()
  }

  /// Visits every live entry in LRU-first order with its remaining lifetime.
  ///
  /// This is an inspection, not an access: recency, access counts and the
  /// hit/miss counters are untouched.
  pub(crate) fn for_each_live<F>(&self, mut f: F)
  where
    F: FnMut(&str, &V, Duration),
  {
    let now = self.clock.now();
    let guard = self.store.lock();
    for key in guard.recency.iter() {
      if let Some(entry) = guard.entries.get(key) {
        if !entry.is_expired(now) {
          f(key, &entry.value, entry.remaining_ttl(now));
        }
      }
    }
  }

  fn notify(&self, removed: Removed<V>) {
    if let Some(listener) = &self.listener {
      for (key, value, reason) in removed {
        listener.on_evict(key, value, reason);
      }
    }
  }

  /// Checks that the map and the recency list hold exactly the same keys.
  #[cfg(test)]
  pub(crate) fn assert_consistent(&self) {
    let guard = self.store.lock();
    assert_eq!(guard.entries.len(), guard.recency.len());
    assert!(guard.entries.len() <= self.max_size);
    for key in guard.entries.keys() {
      assert!(guard.recency.contains(key.as_str()), "{key} missing from recency list");
    }
    for key in guard.recency.iter() {
      assert!(guard.entries.contains_key(key), "{key} missing from entry map");
    }
  }
}
