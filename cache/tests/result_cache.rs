use fibre_resolver::{
  CacheConfig, ComputationResultCache, JobPayload, JobState, JobStatus, ManualClock, ResultKind,
  StatusTtlPolicy,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
struct Render {
  width: u32,
  bytes: Vec<u8>,
}

fn build_result_cache(clock: &ManualClock) -> ComputationResultCache<Render> {
  ComputationResultCache::with_config(&CacheConfig::results(), Arc::new(clock.clone())).unwrap()
}

#[test]
fn test_status_and_result_are_stored_separately() {
  let clock = ManualClock::new();
  let cache = build_result_cache(&clock);

  cache.set_status("job-1", JobStatus::new(JobState::Processing).with_progress(0.4), None);
  assert!(cache.get_result("job-1").is_none());

  let render = Render {
    width: 640,
    bytes: vec![1, 2, 3],
  };
  cache.set_result("job-1", render.clone(), None);

  assert_eq!(cache.get_result("job-1"), Some(render.clone()));
  assert_eq!(cache.get_status("job-1").map(|s| s.state), Some(JobState::Processing));
  assert_eq!(
    cache.get("job-1", ResultKind::Result),
    Some(JobPayload::Result(render))
  );
  assert_eq!(cache.cache().len(), 2);
}

#[test]
fn test_status_ttl_follows_policy() {
  let clock = ManualClock::new();
  let cache = build_result_cache(&clock);
  let policy = StatusTtlPolicy::default();

  let running = JobStatus::new(JobState::Pending);
  cache.set_status("running", running.clone(), Some(policy.ttl_for(&running)));
  let done = JobStatus::new(JobState::Completed).with_message("ok");
  cache.set_status("done", done.clone(), Some(policy.ttl_for(&done)));

  clock.advance(Duration::from_secs(30));
  assert!(cache.get_status("running").is_none(), "in-progress status is short lived");
  assert_eq!(cache.get_status("done"), Some(done));
}

#[test]
fn test_invalidate_job_removes_both_payloads() {
  let clock = ManualClock::new();
  let cache = build_result_cache(&clock);

  cache.set_status("job-1", JobStatus::new(JobState::Completed), None);
  cache.set_result("job-1", Render { width: 1, bytes: vec![] }, None);
  cache.set_status("job-10", JobStatus::new(JobState::Completed), None);

  assert_eq!(cache.invalidate_job("job-1"), 2);
  assert!(cache.get_status("job-10").is_some());
  assert!(!cache.delete("job-1", ResultKind::Status));
}

#[test]
fn test_active_job_ids_lists_non_terminal_statuses() {
  let clock = ManualClock::new();
  let cache = build_result_cache(&clock);

  cache.set_status("a", JobStatus::new(JobState::Pending), None);
  cache.set_status("b", JobStatus::new(JobState::Completed), None);
  cache.set_status("c", JobStatus::new(JobState::Processing), Some(Duration::from_secs(5)));
  cache.set_status("d", JobStatus::new(JobState::Failed), None);
  cache.set_result("e", Render { width: 2, bytes: vec![] }, None);

  assert_eq!(cache.active_job_ids(), vec!["a", "c"]);

  clock.advance(Duration::from_secs(5));
  assert_eq!(cache.active_job_ids(), vec!["a"]);
}

#[test]
fn test_result_cache_evicts_by_capacity() {
  let clock = ManualClock::new();
  let config = CacheConfig {
    max_size: 2,
    default_ttl: Duration::from_secs(3600),
  };
  let cache: ComputationResultCache<u64> =
    ComputationResultCache::with_config(&config, Arc::new(clock.clone())).unwrap();

  cache.set_result("1", 1, None);
  cache.set_result("2", 2, None);
  cache.set_result("3", 3, None);

  assert!(cache.get_result("1").is_none());
  assert_eq!(cache.get_result("3"), Some(3));
  assert_eq!(cache.stats().evicted_by_capacity, 1);
}
