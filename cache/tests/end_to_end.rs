mod common;

use common::{build_test_cache, descriptor, mobile_slow_env};
use fibre_resolver::{
  CacheLifecycleManager, ExpirationAwareSession, ManualClock, ResolverConfig, ResourceSelector,
  SessionPhase,
};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_capacity_then_expiry_scenario() {
  let clock = ManualClock::new();
  let cache = build_test_cache(3, &clock);

  for key in ["k1", "k2", "k3", "k4"] {
    cache.set(key, key.to_uppercase(), None);
  }
  assert!(!cache.contains_key("k1"));
  assert_eq!(cache.keys_by_recency(), vec!["k2", "k3", "k4"]);

  let misses_before = cache.stats().total_misses;
  clock.advance(Duration::from_secs(61));
  assert!(cache.get("k2").is_none());
  assert_eq!(cache.stats().total_misses, misses_before + 1);
}

#[test]
fn test_session_over_managed_caches() {
  let clock = ManualClock::new();
  let config = ResolverConfig::default();
  let manager: CacheLifecycleManager<String> =
    CacheLifecycleManager::from_config(&config, Arc::new(clock.clone())).unwrap();
  let selector = ResourceSelector::new().with_clock(Arc::new(clock.clone()));

  let mut session = ExpirationAwareSession::new(
    "hero-image",
    selector,
    Arc::clone(manager.locators()),
    config.session,
  );
  let candidates = vec![
    descriptor("jpeg-large", &["jpeg", "large"]),
    descriptor("webp-small", &["webp", "small"]),
  ];

  assert_eq!(session.select(candidates, mobile_slow_env()), SessionPhase::Active);
  assert_eq!(session.current().unwrap().id, "webp-small");
  assert_eq!(manager.aggregate_stats().locator.size, 1);

  assert_eq!(session.report_failure("decode error"), SessionPhase::Active);
  assert_eq!(session.current().unwrap().id, "jpeg-large");

  clock.advance(Duration::from_secs(31 * 60));
  assert_eq!(manager.sweep_now().locators_removed, 1);
  assert!(manager.health().healthy);
}
