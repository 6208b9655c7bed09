#![allow(dead_code)]

use fibre_resolver::{
  BoundedCache, CacheBuilder, EnvironmentProfile, LinkQuality, ManualClock, ResourceDescriptor,
  TargetClass,
};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TEST_TTL: Duration = Duration::from_secs(60);

// Helper to build a cache driven by a manual clock.
pub fn build_test_cache(max_size: usize, clock: &ManualClock) -> BoundedCache<String> {
  CacheBuilder::new()
    .name("test")
    .max_size(max_size)
    .default_ttl(DEFAULT_TEST_TTL)
    .clock(Arc::new(clock.clone()))
    .build()
    .unwrap()
}

pub fn descriptor(id: &str, tags: &[&str]) -> ResourceDescriptor {
  ResourceDescriptor::new(id)
    .with_tags(tags.iter().copied())
    .with_locator(format!("https://cdn.example/{id}"))
}

pub fn desktop_env() -> EnvironmentProfile {
  EnvironmentProfile::new(TargetClass::Large, LinkQuality::Normal)
    .supporting(["avif", "webp", "jpeg"])
}

pub fn mobile_slow_env() -> EnvironmentProfile {
  EnvironmentProfile::new(TargetClass::Small, LinkQuality::Slow).supporting(["webp", "jpeg"])
}
