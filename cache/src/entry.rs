use crate::time;

use std::time::{Duration, Instant};

/// A container for a value in the cache, holding all necessary metadata.
///
/// Entries are owned by the `BoundedCache` that created them and never leave
/// it; callers only ever see clones of `value`.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
  pub(crate) value: V,
  /// When the entry was inserted or last overwritten.
  pub(crate) inserted_at: Instant,
  pub(crate) ttl: Duration,
  pub(crate) access_count: u64,
  pub(crate) last_accessed: Instant,
}

impl<V> CacheEntry<V> {
  pub(crate) fn new(value: V, ttl: Duration, now: Instant) -> Self {
    Self {
      value,
      inserted_at: now,
      ttl,
      access_count: 0,
      last_accessed: now,
    }
  }

  /// Replaces the value in place, restarting its lifetime.
  /// The access count survives an overwrite.
  pub(crate) fn overwrite(&mut self, value: V, ttl: Duration, now: Instant) -> V {
    self.inserted_at = now;
    self.ttl = ttl;
    self.last_accessed = now;
    std::mem::replace(&mut self.value, value)
  }

  /// Records a read hit.
  #[inline]
  pub(crate) fn touch(&mut self, now: Instant) {
    self.access_count = self.access_count.saturating_add(1);
    self.last_accessed = now;
  }

  /// An entry is served for `[inserted_at, inserted_at + ttl)` and treated as
  /// absent from `inserted_at + ttl` onwards.
  #[inline]
  pub(crate) fn is_expired(&self, now: Instant) -> bool {
    time::elapsed_since(now, self.inserted_at) >= self.ttl
  }

  /// Lifetime left before expiry; zero once expired.
  #[inline]
  pub(crate) fn remaining_ttl(&self, now: Instant) -> Duration {
    self.ttl.saturating_sub(time::elapsed_since(now, self.inserted_at))
  }

  pub(crate) fn info(&self) -> EntryInfo {
    EntryInfo {
      inserted_at: self.inserted_at,
      ttl: self.ttl,
      access_count: self.access_count,
      last_accessed: self.last_accessed,
    }
  }
}

/// A copy of an entry's bookkeeping, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
  pub inserted_at: Instant,
  pub ttl: Duration,
  pub access_count: u64,
  pub last_accessed: Instant,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn expiry_boundary_is_exclusive() {
    let t0 = Instant::now();
    let entry = CacheEntry::new("v", Duration::from_secs(10), t0);

    assert!(!entry.is_expired(t0));
    assert!(!entry.is_expired(t0 + Duration::from_millis(9_999)));
    assert!(entry.is_expired(t0 + Duration::from_secs(10)));
    assert_eq!(entry.remaining_ttl(t0 + Duration::from_secs(4)), Duration::from_secs(6));
    assert_eq!(entry.remaining_ttl(t0 + Duration::from_secs(40)), Duration::ZERO);
  }

  #[test]
  fn clock_going_backwards_does_not_expire() {
    let t0 = Instant::now() + Duration::from_secs(60);
    let entry = CacheEntry::new(1, Duration::from_secs(1), t0);
    // A reading taken "before" insertion counts as zero elapsed time.
    assert!(!entry.is_expired(t0 - Duration::from_secs(30)));
  }

  #[test]
  fn overwrite_restarts_lifetime_and_keeps_access_count() {
    let t0 = Instant::now();
    let mut entry = CacheEntry::new(1, Duration::from_secs(5), t0);
    entry.touch(t0 + Duration::from_secs(1));
    entry.touch(t0 + Duration::from_secs(2));

    let t1 = t0 + Duration::from_secs(4);
    let old = entry.overwrite(2, Duration::from_secs(30), t1);

    assert_eq!(old, 1);
    assert_eq!(entry.value, 2);
    assert_eq!(entry.inserted_at, t1);
    assert_eq!(entry.ttl, Duration::from_secs(30));
    assert_eq!(entry.access_count, 2);
  }
}
