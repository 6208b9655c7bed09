use std::fmt;

/// Describes the reason an entry was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
  /// The entry was removed to make room for a new key.
  Capacity,
  /// The entry's time-to-live elapsed.
  Expired,
  /// The entry was removed by `delete` or `delete_matching`.
  Invalidated,
  /// The whole cache was cleared.
  Cleared,
}

impl fmt::Display for EvictionReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvictionReason::Capacity => write!(f, "evicted due to capacity"),
      EvictionReason::Expired => write!(f, "evicted due to expiration (TTL)"),
      EvictionReason::Invalidated => write!(f, "manually invalidated"),
      EvictionReason::Cleared => write!(f, "cache cleared"),
    }
  }
}

/// A listener that can be registered with a cache to receive notifications
/// when entries are removed.
///
/// `on_evict` is called after the cache lock has been released, on the thread
/// that caused the removal, so it may safely call back into the cache.
pub trait EvictionListener<V>: Send + Sync {
  fn on_evict(&self, key: String, value: V, reason: EvictionReason);
}

impl<V, F> EvictionListener<V> for F
where
  F: Fn(String, V, EvictionReason) + Send + Sync,
{
  fn on_evict(&self, key: String, value: V, reason: EvictionReason) {
    self(key, value, reason)
  }
}
