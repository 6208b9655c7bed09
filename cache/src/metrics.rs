use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for a cache.
/// All fields are atomic to allow for lock-free updates.
///
/// Counters live for the whole life of the cache; `clear()` does not reset
/// them.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Throughput ---
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) updates: CachePadded<AtomicU64>,
  pub(crate) invalidations: CachePadded<AtomicU64>,

  // --- Eviction Stats ---
  pub(crate) evicted_by_capacity: CachePadded<AtomicU64>,
  pub(crate) evicted_by_ttl: CachePadded<AtomicU64>,
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn record(counter: &AtomicU64, n: u64) {
    if n > 0 {
      counter.fetch_add(n, Ordering::Relaxed);
    }
  }

  /// Combines the counters with the point-in-time shape of the store.
  pub(crate) fn snapshot(&self, shape: StoreShape) -> CacheStats {
    let total_hits = self.hits.load(Ordering::Relaxed);
    let total_misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = total_hits + total_misses;

    CacheStats {
      size: shape.size,
      max_size: shape.max_size,
      hit_rate: if total_lookups == 0 {
        0.0
      } else {
        total_hits as f64 / total_lookups as f64
      },
      total_hits,
      total_misses,
      oldest_entry_ts: shape.oldest_entry_ts,
      newest_entry_ts: shape.newest_entry_ts,
      inserts: self.inserts.load(Ordering::Relaxed),
      updates: self.updates.load(Ordering::Relaxed),
      invalidations: self.invalidations.load(Ordering::Relaxed),
      evicted_by_capacity: self.evicted_by_capacity.load(Ordering::Relaxed),
      evicted_by_ttl: self.evicted_by_ttl.load(Ordering::Relaxed),
    }
  }
}

/// The parts of a stats snapshot that come from the store itself rather
/// than from the counters.
pub(crate) struct StoreShape {
  pub(crate) size: usize,
  pub(crate) max_size: usize,
  pub(crate) oldest_entry_ts: Option<Instant>,
  pub(crate) newest_entry_ts: Option<Instant>,
}

/// A point-in-time, public-facing snapshot of a cache's statistics.
#[derive(Clone, PartialEq)]
pub struct CacheStats {
  /// Number of entries currently stored, expired-but-unswept ones included.
  pub size: usize,
  pub max_size: usize,
  /// `total_hits / (total_hits + total_misses)`, or `0.0` before any lookup.
  pub hit_rate: f64,
  pub total_hits: u64,
  pub total_misses: u64,
  /// Insertion time of the oldest stored entry.
  pub oldest_entry_ts: Option<Instant>,
  /// Insertion time of the newest stored entry.
  pub newest_entry_ts: Option<Instant>,
  /// Number of `set` calls that created a new entry.
  pub inserts: u64,
  /// Number of `set` calls that overwrote an existing entry.
  pub updates: u64,
  /// Entries removed by `delete` or `delete_matching`.
  pub invalidations: u64,
  /// Entries evicted to make room for new ones.
  pub evicted_by_capacity: u64,
  /// Expired entries removed, lazily on read or by `cleanup()`.
  pub evicted_by_ttl: u64,
}

impl CacheStats {
  /// Total lookups observed, the sample size for `hit_rate`.
  pub fn lookups(&self) -> u64 {
    self.total_hits + self.total_misses
  }

  /// `size / max_size`, or `0.0` for a zero-capacity shape.
  pub fn fill_ratio(&self) -> f64 {
    if self.max_size == 0 {
      0.0
    } else {
      self.size as f64 / self.max_size as f64
    }
  }
}

impl fmt::Debug for CacheStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheStats")
      .field("size", &self.size)
      .field("max_size", &self.max_size)
      .field("hit_rate", &format!("{:.2}%", self.hit_rate * 100.0))
      .field("total_hits", &self.total_hits)
      .field("total_misses", &self.total_misses)
      .field("oldest_entry_ts", &self.oldest_entry_ts)
      .field("newest_entry_ts", &self.newest_entry_ts)
      .field("inserts", &self.inserts)
      .field("updates", &self.updates)
      .field("invalidations", &self.invalidations)
      .field("evicted_by_capacity", &self.evicted_by_capacity)
      .field("evicted_by_ttl", &self.evicted_by_ttl)
      .finish()
  }
}
