use crate::config::{HealthThresholds, LifecycleConfig, ResolverConfig};
use crate::error::Result;
use crate::locator::{ExpiringLocator, ResourceLocatorCache};
use crate::metrics::CacheStats;
use crate::results::ComputationResultCache;
use crate::task::sweeper::Sweeper;
use crate::time::Clock;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Statistics of both owned caches.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStats {
  pub locator: CacheStats,
  pub result: CacheStats,
}

/// A heuristic memory estimate: configured average entry size times entry
/// count. It is not exact accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryEstimate {
  pub locator_bytes: u64,
  pub result_bytes: u64,
  pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
  pub healthy: bool,
  /// Every violated condition, in a stable order.
  pub issues: Vec<String>,
}

/// Entries removed by one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
  pub locators_removed: usize,
  pub results_removed: usize,
}

impl SweepReport {
  pub fn total(&self) -> usize {
    self.locators_removed + self.results_removed
  }
}

/// Owns the locator and result caches, sweeps them periodically and reports
/// on their health.
///
/// Construct one at the application's composition root and hand out the
/// `Arc`s returned by [`locators`](Self::locators) and
/// [`results`](Self::results). None of its operations fail; they only report.
pub struct CacheLifecycleManager<R> {
  locators: Arc<ResourceLocatorCache>,
  results: Arc<ComputationResultCache<R>>,
  config: LifecycleConfig,
  sweeper: Mutex<Option<Sweeper>>,
}

impl<R> fmt::Debug for CacheLifecycleManager<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheLifecycleManager")
      .field("locators", &self.locators)
      .field("results", &self.results)
      .field("config", &self.config)
      .field("sweeping", &self.is_sweeping())
      .finish()
  }
}

impl<R> CacheLifecycleManager<R> {
  pub fn new(
    locators: Arc<ResourceLocatorCache>,
    results: Arc<ComputationResultCache<R>>,
    config: LifecycleConfig,
  ) -> Self {
    Self {
      locators,
      results,
      config,
      sweeper: Mutex::new(None),
    }
  }

  /// Builds both caches from a full configuration, sharing one clock.
  pub fn from_config(config: &ResolverConfig, clock: Arc<dyn Clock>) -> Result<Self> {
    let locators = ResourceLocatorCache::with_config(&config.locator_cache, Arc::clone(&clock))?;
    let results = ComputationResultCache::with_config(&config.result_cache, clock)?;
    Ok(Self::new(Arc::new(locators), Arc::new(results), config.lifecycle))
  }

  pub fn locators(&self) -> &Arc<ResourceLocatorCache> {
    &self.locators
  }

  pub fn results(&self) -> &Arc<ComputationResultCache<R>> {
    &self.results
  }

  pub fn config(&self) -> &LifecycleConfig {
    &self.config
  }

  /// Runs `cleanup()` on both caches right away.
  pub fn sweep_now(&self) -> SweepReport {
    sweep(&self.locators, &self.results)
  }

  /// Cancels periodic sweeping. Safe to call when nothing is scheduled.
  pub fn stop_periodic_sweep(&self) {
    let previous = self.sweeper.lock().take();
    if let Some(sweeper) = previous {
      sweeper.stop();
      tracing::info!("stopped periodic cache sweep");
    }
  }

  pub fn is_sweeping(&self) -> bool {
    self.sweeper.lock().is_some()
  }

  /// The interval of the active sweep schedule, if any.
  pub fn sweep_interval(&self) -> Option<Duration> {
    self.sweeper.lock().as_ref().map(Sweeper::interval)
  }

  pub fn aggregate_stats(&self) -> AggregateStats {
    AggregateStats {
      locator: self.locators.stats(),
      result: self.results.stats(),
    }
  }

  pub fn estimate_memory_usage(&self) -> MemoryEstimate {
    let locator_bytes = (self.locators.cache().len() as u64)
      .saturating_mul(self.config.avg_locator_entry_bytes);
    let result_bytes =
      (self.results.cache().len() as u64).saturating_mul(self.config.avg_result_entry_bytes);
    MemoryEstimate {
      locator_bytes,
      result_bytes,
      total_bytes: locator_bytes.saturating_add(result_bytes),
    }
  }

  /// Checks both caches against `thresholds` and reports every violation.
  ///
  /// A low hit rate is only reported once a cache has seen at least
  /// `min_sample_size` lookups, so a cold cache is not flagged.
  pub fn health_check(&self, thresholds: &HealthThresholds) -> HealthReport {
    let stats = self.aggregate_stats();
    let mut issues = Vec::new();

    for (name, stats) in [("locator", &stats.locator), ("result", &stats.result)] {
      let lookups = stats.lookups();
      if lookups >= thresholds.min_sample_size && stats.hit_rate < thresholds.min_hit_rate {
        issues.push(format!(
          "{} cache hit rate {:.1}% is below the {:.1}% floor ({} lookups)",
          name,
          stats.hit_rate * 100.0,
          thresholds.min_hit_rate * 100.0,
          lookups
        ));
      }
      if stats.fill_ratio() >= thresholds.max_fill_ratio {
        issues.push(format!(
          "{} cache is {:.0}% full ({}/{} entries)",
          name,
          stats.fill_ratio() * 100.0,
          stats.size,
          stats.max_size
        ));
      }
    }

    let memory = self.estimate_memory_usage();
    if memory.total_bytes > thresholds.max_memory_bytes {
      issues.push(format!(
        "estimated memory usage of {} bytes exceeds the {} byte ceiling",
        memory.total_bytes, thresholds.max_memory_bytes
      ));
    }

    let healthy = issues.is_empty();
    if !healthy {
      tracing::warn!(issues = ?issues, "cache health check failed");
    }
    HealthReport { healthy, issues }
  }

  /// `health_check` against the configured thresholds.
  pub fn health(&self) -> HealthReport {
    self.health_check(&self.config.thresholds)
  }

  /// Live locators with less than `threshold` left, for proactive refresh.
  pub fn locators_expiring_within(&self, threshold: Duration) -> Vec<ExpiringLocator> {
    self.locators.expiring_within(threshold)
  }
}

impl<R> CacheLifecycleManager<R>
where
  R: Send + Sync + 'static,
{
  /// Schedules `cleanup()` on both caches every `interval`.
  ///
  /// Calling this again replaces the existing schedule. A zero interval
  /// cancels sweeping instead of scheduling a busy loop.
  pub fn start_periodic_sweep(&self, interval: Duration) {
    if interval.is_zero() {
      tracing::warn!("refusing a zero sweep interval, periodic sweep cancelled");
      self.stop_periodic_sweep();
      return;
    }

    let locators = Arc::clone(&self.locators);
    let results = Arc::clone(&self.results);
    let sweeper = Sweeper::spawn(interval, move || {
      let report = sweep(&locators, &results);
      if report.total() > 0 {
        tracing::debug!(
          locators_removed = report.locators_removed,
          results_removed = report.results_removed,
          "periodic sweep"
        );
      }
    });

    let previous = self.sweeper.lock().replace(sweeper);
    if let Some(previous) = previous {
      previous.stop();
    }
    tracing::info!(interval_ms = interval.as_millis() as u64, "started periodic cache sweep");
  }

  /// Starts sweeping at the configured interval.
  pub fn start_configured_sweep(&self) {
    self.start_periodic_sweep(self.config.sweep_interval);
  }
}

fn sweep<R>(locators: &ResourceLocatorCache, results: &ComputationResultCache<R>) -> SweepReport {
  SweepReport {
    locators_removed: locators.cleanup(),
    results_removed: results.cleanup(),
  }
}
