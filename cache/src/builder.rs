use crate::bounded::BoundedCache;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::time::{self, Clock};
use crate::EvictionListener;

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Capacity used when none is configured.
pub const DEFAULT_MAX_SIZE: usize = 1000;
/// TTL used when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A builder for creating `BoundedCache` instances.
pub struct CacheBuilder<V> {
  pub(crate) name: String,
  pub(crate) max_size: usize,
  pub(crate) default_ttl: Duration,
  clock: Option<Arc<dyn Clock>>,
  listener: Option<Arc<dyn EvictionListener<V>>>,
}

// Manual Debug implementation for CacheBuilder.
impl<V> fmt::Debug for CacheBuilder<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("name", &self.name)
      .field("max_size", &self.max_size)
      .field("default_ttl", &self.default_ttl)
      .field("has_clock", &self.clock.is_some())
      .field("has_listener", &self.listener.is_some())
      .finish()
  }
}

impl<V> CacheBuilder<V> {
  /// Creates a new `CacheBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      name: "cache".to_string(),
      max_size: DEFAULT_MAX_SIZE,
      default_ttl: DEFAULT_TTL,
      clock: None,
      listener: None,
    }
  }

  /// Starts from a processed configuration section.
  pub fn from_config(config: &CacheConfig) -> Self {
    Self::new()
      .max_size(config.max_size)
      .default_ttl(config.default_ttl)
  }

  /// Names the cache in log output and errors.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  /// Sets the maximum number of entries.
  pub fn max_size(mut self, max_size: usize) -> Self {
    self.max_size = max_size;
    self
  }

  /// Sets the TTL applied when `set` is called without one.
  pub fn default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }

  /// Sets the time source. Defaults to the system monotonic clock.
  pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = Some(clock);
    self
  }

  /// Sets the eviction listener for the cache.
  pub fn eviction_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: EvictionListener<V> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }

  /// Builds the cache.
  pub fn build(self) -> Result<BoundedCache<V>> {
    self.validate()?;
    Ok(BoundedCache::from_parts(
      self.name,
      self.max_size,
      self.default_ttl,
      self.clock.unwrap_or_else(time::system),
      self.listener,
    ))
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<()> {
    if self.max_size == 0 {
      return Err(Error::ZeroCapacity {
        cache: self.name.clone(),
      });
    }
    Ok(())
  }
}

impl<V> Default for CacheBuilder<V> {
  fn default() -> Self {
    Self::new()
  }
}
