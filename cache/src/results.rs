//! Cache of computed job results and job status snapshots.

use crate::bounded::BoundedCache;
use crate::builder::CacheBuilder;
use crate::config::{CacheConfig, StatusTtlPolicy};
use crate::error::Result;
use crate::metrics::CacheStats;
use crate::time::{self, Clock};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default capacity of the result cache.
pub const DEFAULT_RESULT_CAPACITY: usize = 100;
/// Default lifetime of a cached result.
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(60 * 60);

const KEY_PREFIX: &str = "job:";

/// Which of a job's two payloads a key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
  Status,
  Result,
}

impl ResultKind {
  fn as_str(self) -> &'static str {
    match self {
      ResultKind::Status => "status",
      ResultKind::Result => "result",
    }
  }
}

impl fmt::Display for ResultKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Lifecycle state reported by the job status source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
  Pending,
  Processing,
  Completed,
  Failed,
}

impl JobState {
  /// `Completed` and `Failed` are terminal.
  pub fn is_terminal(self) -> bool {
    matches!(self, JobState::Completed | JobState::Failed)
  }
}

/// A status snapshot for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
  pub state: JobState,
  /// Completion fraction in `[0, 1]`, when the source reports one.
  pub progress: Option<f32>,
  pub message: Option<String>,
}

impl JobStatus {
  pub fn new(state: JobState) -> Self {
    Self {
      state,
      progress: None,
      message: None,
    }
  }

  pub fn with_progress(mut self, progress: f32) -> Self {
    self.progress = Some(progress.clamp(0.0, 1.0));
    self
  }

  pub fn with_message(mut self, message: impl Into<String>) -> Self {
    self.message = Some(message.into());
    self
  }
}

/// The two payload shapes a job can cache.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload<R> {
  Status(JobStatus),
  Result(R),
}

impl<R> JobPayload<R> {
  pub fn kind(&self) -> ResultKind {
    match self {
      JobPayload::Status(_) => ResultKind::Status,
      JobPayload::Result(_) => ResultKind::Result,
    }
  }
}

impl StatusTtlPolicy {
  /// The TTL a caller should use when caching `status`: long for terminal
  /// states, short while the job is still moving.
  pub fn ttl_for(&self, status: &JobStatus) -> Duration {
    if status.state.is_terminal() {
      self.terminal
    } else {
      self.in_progress
    }
  }
}

/// A `BoundedCache<JobPayload<R>>` keyed by job id and payload kind.
///
/// The cache does not choose TTLs from content; callers pass one per `set`,
/// typically via [`StatusTtlPolicy::ttl_for`].
pub struct ComputationResultCache<R> {
  inner: BoundedCache<JobPayload<R>>,
}

impl<R> fmt::Debug for ComputationResultCache<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ComputationResultCache")
      .field("inner", &self.inner)
      .finish()
  }
}

impl<R> ComputationResultCache<R> {
  /// A cache with the default capacity and TTL.
  pub fn new() -> Self {
    Self::from_cache(BoundedCache::from_parts(
      "results".to_string(),
      DEFAULT_RESULT_CAPACITY,
      DEFAULT_RESULT_TTL,
      time::system(),
      None,
    ))
  }

  pub fn with_config(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
    let inner = CacheBuilder::from_config(config)
      .name("results")
      .clock(clock)
      .build()?;
    Ok(Self::from_cache(inner))
  }

  pub fn from_cache(inner: BoundedCache<JobPayload<R>>) -> Self {
    Self { inner }
  }

  pub fn key_for(job_id: &str, kind: ResultKind) -> String {
    format!("{KEY_PREFIX}{job_id}:{kind}")
  }

  fn job_prefix(job_id: &str) -> String {
    format!("{KEY_PREFIX}{job_id}:")
  }

  /// Recovers the job id from a key built by `key_for`.
  fn parse_key(key: &str) -> Option<(&str, ResultKind)> {
    let rest = key.strip_prefix(KEY_PREFIX)?;
    let (job_id, kind) = rest.rsplit_once(':')?;
    let kind = match kind {
      "status" => ResultKind::Status,
      "result" => ResultKind::Result,
      _ => return None,
    };
    Some((job_id, kind))
  }

  /// Stores a payload under the key matching its kind.
  pub fn set(&self, job_id: &str, payload: JobPayload<R>, ttl: Option<Duration>) {
    let key = Self::key_for(job_id, payload.kind());
    self.inner.set(key, payload, ttl);
  }

  pub fn set_status(&self, job_id: &str, status: JobStatus, ttl: Option<Duration>) {
    self.set(job_id, JobPayload::Status(status), ttl);
  }

  pub fn set_result(&self, job_id: &str, result: R, ttl: Option<Duration>) {
    self.set(job_id, JobPayload::Result(result), ttl);
  }

  pub fn get(&self, job_id: &str, kind: ResultKind) -> Option<JobPayload<R>>
  where
    R: Clone,
  {
    self.inner.get(&Self::key_for(job_id, kind))
  }

  pub fn get_status(&self, job_id: &str) -> Option<JobStatus>
  where
    R: Clone,
  {
    match self.get(job_id, ResultKind::Status)? {
      JobPayload::Status(status) => Some(status),
      JobPayload::Result(_) => None,
    }
  }

  pub fn get_result(&self, job_id: &str) -> Option<R>
  where
    R: Clone,
  {
    match self.get(job_id, ResultKind::Result)? {
      JobPayload::Result(result) => Some(result),
      JobPayload::Status(_) => None,
    }
  }

  pub fn delete(&self, job_id: &str, kind: ResultKind) -> bool {
    self.inner.delete(&Self::key_for(job_id, kind))
  }

  /// Drops both the status and the result of a job.
  pub fn invalidate_job(&self, job_id: &str) -> usize {
    let prefix = Self::job_prefix(job_id);
    self.inner.delete_matching(|key| {
      key
        .strip_prefix(&prefix)
        .is_some_and(|kind| kind == "status" || kind == "result")
    })
  }

  /// Ids of jobs whose live cached status is `Pending` or `Processing`, in
  /// least-recently-used order.
  ///
  /// Callers use this to decide which jobs still need polling. Does not
  /// count as an access.
  pub fn active_job_ids(&self) -> Vec<String> {
    let mut active = Vec::new();
    self.inner.for_each_live(|key, payload, _| {
      if let (Some((job_id, ResultKind::Status)), JobPayload::Status(status)) =
        (Self::parse_key(key), payload)
      {
        if !status.state.is_terminal() {
          active.push(job_id.to_string());
        }
      }
    });
    active
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
  pub fn cache(&self) -> &BoundedCache<JobPayload<R>> {
    &self.inner
  }
}

impl<R> Default for ComputationResultCache<R> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  type Cache = ComputationResultCache<String>;

  #[test]
  fn keys_round_trip_through_the_parser() {
    let key = Cache::key_for("job:42", ResultKind::Status);
    assert_eq!(key, "job:job:42:status");
    assert_eq!(Cache::parse_key(&key), Some(("job:42", ResultKind::Status)));
    assert_eq!(Cache::parse_key("job:7:other"), None);
    assert_eq!(Cache::parse_key("loc:7:result"), None);
  }

  #[test]
  fn status_ttl_policy_distinguishes_terminal_states() {
    let policy = StatusTtlPolicy {
      in_progress: Duration::from_secs(30),
      terminal: Duration::from_secs(3600),
    };
    assert_eq!(policy.ttl_for(&JobStatus::new(JobState::Pending)), Duration::from_secs(30));
    assert_eq!(policy.ttl_for(&JobStatus::new(JobState::Processing)), Duration::from_secs(30));
    assert_eq!(policy.ttl_for(&JobStatus::new(JobState::Completed)), Duration::from_secs(3600));
    assert_eq!(policy.ttl_for(&JobStatus::new(JobState::Failed)), Duration::from_secs(3600));
  }

  #[test]
  fn progress_is_clamped() {
    assert_eq!(JobStatus::new(JobState::Processing).with_progress(1.7).progress, Some(1.0));
  }
}
