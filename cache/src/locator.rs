//! Cache of short-lived access locators (signed URLs and the like).

use crate::bounded::BoundedCache;
use crate::builder::CacheBuilder;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::metrics::CacheStats;
use crate::selector::ResourceDescriptor;
use crate::time::{self, Clock};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default capacity of the locator cache.
pub const DEFAULT_LOCATOR_CAPACITY: usize = 500;
/// Default lifetime of a cached locator.
pub const DEFAULT_LOCATOR_TTL: Duration = Duration::from_secs(30 * 60);

/// A cached access handle for one representation of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
  pub url: String,
  /// Id of the descriptor this locator was issued for.
  pub descriptor_id: String,
}

impl Locator {
  pub fn new(url: impl Into<String>, descriptor_id: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      descriptor_id: descriptor_id.into(),
    }
  }
}

impl fmt::Display for Locator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.url)
  }
}

/// A live locator that is close to expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringLocator {
  pub key: String,
  pub locator: Locator,
  pub remaining: Duration,
}

/// A `BoundedCache<Locator>` keyed by resource id plus profile tags.
#[derive(Debug)]
pub struct ResourceLocatorCache {
  inner: BoundedCache<Locator>,
}

impl ResourceLocatorCache {
  /// A cache with the default capacity and TTL.
  pub fn new() -> Self {
    Self::from_cache(BoundedCache::from_parts(
      "locators".to_string(),
      DEFAULT_LOCATOR_CAPACITY,
      DEFAULT_LOCATOR_TTL,
      time::system(),
      None,
    ))
  }

  pub fn with_config(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
    let inner = CacheBuilder::from_config(config)
      .name("locators")
      .clock(clock)
      .build()?;
    Ok(Self::from_cache(inner))
  }

  /// Wraps a cache built elsewhere, e.g. one with an eviction listener.
  pub fn from_cache(inner: BoundedCache<Locator>) -> Self {
    Self { inner }
  }

  /// Builds the composite key for a resource and its profile tags.
  ///
  /// Tags are trimmed, lowercased, sorted and de-duplicated, so tag order
  /// never changes the key. The resource id is length-prefixed so no id can
  /// be mistaken for another id's prefix.
  pub fn key_for<I, S>(resource_id: &str, profile_tags: I) -> String
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut tags: Vec<String> = profile_tags
      .into_iter()
      .map(|tag| tag.as_ref().trim().to_ascii_lowercase())
      .filter(|tag| !tag.is_empty())
      .collect();
    tags.sort_unstable();
    tags.dedup();
    format!("{}|{}", Self::resource_prefix(resource_id), tags.join(","))
  }

  fn resource_prefix(resource_id: &str) -> String {
    format!("loc:{}:{}", resource_id.len(), resource_id)
  }

  pub fn get(&self, key: &str) -> Option<Locator> {
    self.inner.get(key)
  }

  pub fn set(&self, key: impl Into<String>, locator: Locator, ttl: Option<Duration>) {
    self.inner.set(key, locator, ttl)
  }

  pub fn delete(&self, key: &str) -> bool {
    self.inner.delete(key)
  }

  /// Looks up the locator cached for a resource and tag set.
  pub fn lookup<I, S>(&self, resource_id: &str, profile_tags: I) -> Option<Locator>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self.inner.get(&Self::key_for(resource_id, profile_tags))
  }

  /// Caches a descriptor's locator under `resource_id` and its tags.
  ///
  /// The TTL is the shorter of the default TTL and the time left before the
  /// descriptor expires. Returns `false`, caching nothing, if the descriptor
  /// has no usable locator.
  pub fn insert_descriptor(&self, resource_id: &str, descriptor: &ResourceDescriptor) -> bool {
    let now = self.inner.now();
    if !descriptor.has_usable_locator(now) {
      return false;
    }
    let Some(url) = descriptor.locator.clone() else {
      return false;
    };

    let ttl = descriptor
      .expires_at
      .map(|deadline| time::remaining(now, deadline).min(self.inner.default_ttl()));
    let key = Self::key_for(resource_id, &descriptor.profile_tags);
    self.inner.set(key, Locator::new(url, descriptor.id.clone()), ttl);
    true
  }

  /// Lifetime left on the cached locator, without counting as an access.
  pub fn remaining_lifetime<I, S>(&self, resource_id: &str, profile_tags: I) -> Option<Duration>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self.inner.remaining_ttl(&Self::key_for(resource_id, profile_tags))
  }

  /// Drops every cached variant of `resource_id`.
  pub fn invalidate_resource(&self, resource_id: &str) -> usize {
    let prefix = format!("{}|", Self::resource_prefix(resource_id));
    self.inner.delete_matching(|key| key.starts_with(&prefix))
  }

  /// Live locators with less than `threshold` left, soonest first.
  ///
  /// This is an inspection only: it never changes recency, so it does not
  /// protect the returned entries from LRU eviction.
  pub fn expiring_within(&self, threshold: Duration) -> Vec<ExpiringLocator> {
    let mut expiring = Vec::new();
    self.inner.for_each_live(|key, locator, remaining| {
      if remaining < threshold {
        expiring.push(ExpiringLocator {
          key: key.to_string(),
          locator: locator.clone(),
          remaining,
        });
      }
    });
    // Stable, so equal lifetimes stay in LRU order.
    expiring.sort_by_key(|entry| entry.remaining);
    expiring
  }

  pub fn cleanup(&self) -> usize {
    self.inner.cleanup()
  }

  pub fn clear(&self) {
    self.inner.clear()
  }

  pub fn stats(&self) -> CacheStats {
    self.inner.stats()
  }

  /// The underlying generic cache.
  pub fn cache(&self) -> &BoundedCache<Locator> {
    &self.inner
  }
}

impl Default for ResourceLocatorCache {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn key_ignores_tag_order_case_and_duplicates() {
    let a = ResourceLocatorCache::key_for("R1", ["webp", "mobile"]);
    let b = ResourceLocatorCache::key_for("R1", ["mobile", "webp"]);
    let c = ResourceLocatorCache::key_for("R1", ["Mobile", "webp", " webp "]);
    assert_eq!(a, b);
    assert_eq!(a, c);
    assert_eq!(a, "loc:2:R1|mobile,webp");
  }

  #[test]
  fn key_distinguishes_resources_and_tags() {
    assert_ne!(
      ResourceLocatorCache::key_for("R1", ["webp"]),
      ResourceLocatorCache::key_for("R10", ["webp"])
    );
    assert_ne!(
      ResourceLocatorCache::key_for("R1", ["webp"]),
      ResourceLocatorCache::key_for("R1", ["avif"])
    );
    assert_eq!(
      ResourceLocatorCache::key_for("R1", Vec::<String>::new()),
      "loc:2:R1|"
    );
  }
}
