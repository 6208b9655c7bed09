use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic time source.
///
/// Every TTL and recency comparison in the crate goes through a `Clock`, so
/// wall-clock adjustments never affect correctness and tests can drive time
/// explicitly with a [`ManualClock`].
pub trait Clock: Send + Sync + 'static {
  /// Returns the current monotonic instant.
  fn now(&self) -> Instant;
}

/// The default clock, backed by `Instant::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  #[inline]
  fn now(&self) -> Instant {
    Instant::now()
  }
}

/// A clock that only moves when told to.
///
/// Cloning a `ManualClock` yields a handle to the same underlying time, so a
/// test can keep one handle and give another to the cache.
#[derive(Clone)]
pub struct ManualClock {
  base: Instant,
  offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
  /// Creates a clock frozen at the current instant.
  pub fn new() -> Self {
    Self {
      base: Instant::now(),
      offset: Arc::new(Mutex::new(Duration::ZERO)),
    }
  }

  /// Moves the clock forward by `by`.
  pub fn advance(&self, by: Duration) {
    let mut offset = self.offset.lock();
    *offset = offset.saturating_add(by);
  }

  /// Total time this clock has been advanced since creation.
  pub fn elapsed(&self) -> Duration {
    *self.offset.lock()
  }
}

impl Default for ManualClock {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for ManualClock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ManualClock")
      .field("elapsed", &self.elapsed())
      .finish()
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Instant {
    self.base + *self.offset.lock()
  }
}

/// Returns the process-wide default clock.
pub(crate) fn system() -> Arc<dyn Clock> {
  Arc::new(SystemClock)
}

/// Time elapsed between `earlier` and `now`, clamped to zero if `now` is
/// somehow behind `earlier`.
#[inline]
pub(crate) fn elapsed_since(now: Instant, earlier: Instant) -> Duration {
  now.saturating_duration_since(earlier)
}

/// Time left before `deadline`, zero once it has passed.
#[inline]
pub fn remaining(now: Instant, deadline: Instant) -> Duration {
  deadline.saturating_duration_since(now)
}
