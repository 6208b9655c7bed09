use crate::config::SessionConfig;
use crate::locator::ResourceLocatorCache;
use crate::selector::{EnvironmentProfile, ResourceDescriptor, ResourceSelector};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Where a session is in its selection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
  /// Nothing selected yet.
  Empty,
  /// A selection is in progress. Only observable from inside a transition.
  Selecting,
  /// A representation is selected and being consumed.
  Active,
  /// No representation is available. Terminal.
  Exhausted,
}

impl fmt::Display for SessionPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SessionPhase::Empty => write!(f, "empty"),
      SessionPhase::Selecting => write!(f, "selecting"),
      SessionPhase::Active => write!(f, "active"),
      SessionPhase::Exhausted => write!(f, "exhausted"),
    }
  }
}

/// The data a session tracks alongside its phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
  pub current: Option<ResourceDescriptor>,
  pub retry_count: u32,
  pub max_retries: u32,
  pub last_error: Option<String>,
}

/// Tracks the representation currently chosen for one logical resource and
/// re-selects when it fails to load, is about to expire, or the caller asks.
///
/// Retries are bounded and exclusion based: a candidate that failed is never
/// picked again by the same session. Proactive refreshes do not count as
/// retries.
///
/// A session belongs to one caller. Share it only behind external
/// synchronization.
pub struct ExpirationAwareSession {
  resource_id: String,
  selector: ResourceSelector,
  locators: Arc<ResourceLocatorCache>,
  refresh_threshold: Duration,
  env: Option<EnvironmentProfile>,
  candidates: Vec<ResourceDescriptor>,
  /// Ids that failed in this session.
  failed: HashSet<String>,
  phase: SessionPhase,
  state: SessionState,
}

impl fmt::Debug for ExpirationAwareSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExpirationAwareSession")
      .field("resource_id", &self.resource_id)
      .field("phase", &self.phase)
      .field("state", &self.state)
      .field("candidates", &self.candidates.len())
      .field("failed", &self.failed)
      .finish_non_exhaustive()
  }
}

impl ExpirationAwareSession {
  pub fn new(
    resource_id: impl Into<String>,
    selector: ResourceSelector,
    locators: Arc<ResourceLocatorCache>,
    config: SessionConfig,
  ) -> Self {
    Self {
      resource_id: resource_id.into(),
      selector,
      locators,
      refresh_threshold: config.refresh_threshold,
      env: None,
      candidates: Vec::new(),
      failed: HashSet::new(),
      phase: SessionPhase::Empty,
      state: SessionState {
        current: None,
        retry_count: 0,
        max_retries: config.max_retries,
        last_error: None,
      },
    }
  }

  pub fn resource_id(&self) -> &str {
    &self.resource_id
  }

  pub fn phase(&self) -> SessionPhase {
    self.phase
  }

  pub fn state(&self) -> &SessionState {
    &self.state
  }

  pub fn current(&self) -> Option<&ResourceDescriptor> {
    self.state.current.as_ref()
  }

  pub fn current_locator(&self) -> Option<&str> {
    self.current().and_then(|current| current.locator.as_deref())
  }

  pub fn is_exhausted(&self) -> bool {
    self.phase == SessionPhase::Exhausted
  }

  /// Lifetime left on the current locator; `None` when nothing is selected
  /// or the locator never expires.
  pub fn remaining_lifetime(&self) -> Option<Duration> {
    let now = self.locators.cache().now();
    self.current()?.remaining_lifetime(now)
  }

  /// Chooses a representation among `candidates` for `env`.
  ///
  /// Has no effect once the session is exhausted.
  pub fn select(
    &mut self,
    candidates: Vec<ResourceDescriptor>,
    env: EnvironmentProfile,
  ) -> SessionPhase {
    if self.phase == SessionPhase::Exhausted {
      return self.phase;
    }
    self.candidates = candidates;
    self.env = Some(env);
    self.resolve(&HashSet::new())
  }

  /// Re-selects with a fresh candidate set, typically new locators from the
  /// issuer. Ids that already failed stay excluded.
  ///
  /// Has no effect before the first `select` or once exhausted.
  pub fn refresh(&mut self, candidates: Vec<ResourceDescriptor>) -> SessionPhase {
    if self.phase != SessionPhase::Active {
      return self.phase;
    }
    self.candidates = candidates;
    self.resolve(&HashSet::new())
  }

  /// Records that the current representation failed to load and moves on to
  /// the next best one.
  ///
  /// Each failure counts as a retry; when the count reaches `max_retries`,
  /// or no candidate is left, the session is exhausted. A no-op unless the
  /// session is active.
  pub fn report_failure(&mut self, error: impl Into<String>) -> SessionPhase {
    if self.phase != SessionPhase::Active {
      return self.phase;
    }

    let error = error.into();
    if let Some(failed) = self.state.current.take() {
      tracing::debug!(
        resource = %self.resource_id,
        representation = %failed.id,
        error = %error,
        "representation failed to load"
      );
      self.forget_cached(&failed);
      self.failed.insert(failed.id);
    }
    self.state.last_error = Some(error);
    self.state.retry_count = self.state.retry_count.saturating_add(1);

    if self.state.retry_count >= self.state.max_retries {
      self.set_phase(SessionPhase::Selecting);
      tracing::warn!(
        resource = %self.resource_id,
        retries = self.state.retry_count,
        "retry budget spent, no representation available"
      );
      self.set_phase(SessionPhase::Exhausted);
      return self.phase;
    }

    self.resolve(&HashSet::new())
  }

  /// Refreshes the selection if the current locator has less than the
  /// refresh threshold left.
  ///
  /// Candidates that would also expire within the threshold are passed over
  /// when possible; if every remaining candidate is short-lived, the best
  /// still-valid one is kept. Does not count as a retry. A no-op unless the
  /// session is active.
  pub fn check_expiry(&mut self) -> SessionPhase {
    if self.phase != SessionPhase::Active {
      return self.phase;
    }
    let now = self.locators.cache().now();
    let remaining = match self.current().and_then(|current| current.remaining_lifetime(now)) {
      Some(remaining) if remaining < self.refresh_threshold => remaining,
      _ => return self.phase,
    };

    tracing::debug!(
      resource = %self.resource_id,
      remaining_ms = remaining.as_millis() as u64,
      "locator close to expiry, refreshing selection"
    );
    if let Some(current) = self.state.current.clone() {
      self.forget_cached(&current);
    }

    let short_lived: HashSet<String> = self
      .candidates
      .iter()
      .filter(|candidate| {
        candidate
          .remaining_lifetime(now)
          .is_some_and(|left| left < self.refresh_threshold)
      })
      .map(|candidate| candidate.id.clone())
      .collect();

    if self.try_resolve(&short_lived) {
      return self.phase;
    }
    self.resolve(&HashSet::new())
  }

  /// Runs a selection, ending `Active` or `Exhausted`.
  fn resolve(&mut self, skip: &HashSet<String>) -> SessionPhase {
    if !self.try_resolve(skip) {
      self.state.current = None;
      tracing::warn!(
        resource = %self.resource_id,
        candidates = self.candidates.len(),
        failed = self.failed.len(),
        "no representation available"
      );
      self.set_phase(SessionPhase::Exhausted);
    }
    self.phase
  }

  /// Attempts a selection; on success the session is `Active`. On failure
  /// the session is left in `Selecting` for the caller to settle.
  fn try_resolve(&mut self, skip: &HashSet<String>) -> bool {
    self.set_phase(SessionPhase::Selecting);
    let Some(env) = self.env.as_ref() else {
      return false;
    };

    let exclude: HashSet<String> = self.failed.union(skip).cloned().collect();
    let Some(outcome) = self.selector.select(&self.candidates, env, &exclude) else {
      return false;
    };

    let chosen = outcome.chosen;
    let cached = self.locators.lookup(&self.resource_id, &chosen.profile_tags);
    let already_cached = cached.is_some_and(|locator| {
      locator.descriptor_id == chosen.id && chosen.locator.as_deref() == Some(locator.url.as_str())
    });
    if !already_cached {
      self.locators.insert_descriptor(&self.resource_id, &chosen);
    }

    tracing::debug!(
      resource = %self.resource_id,
      representation = %chosen.id,
      score = outcome.score,
      "representation selected"
    );
    self.state.current = Some(chosen);
    self.set_phase(SessionPhase::Active);
    true
  }

  /// Drops the cached locator for `descriptor` if it is still the one cached.
  fn forget_cached(&self, descriptor: &ResourceDescriptor) {
    let key = ResourceLocatorCache::key_for(&self.resource_id, &descriptor.profile_tags);
    let cached = self.locators.cache().peek(&key);
    if cached.is_some_and(|locator| locator.descriptor_id == descriptor.id) {
      self.locators.delete(&key);
    }
  }

  fn set_phase(&mut self, to: SessionPhase) {
    if self.phase != to {
      tracing::debug!(resource = %self.resource_id, from = %self.phase, to = %to, "session transition");
      self.phase = to;
    }
  }
}
