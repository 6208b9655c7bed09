//! Scoring-based choice between interchangeable representations of one
//! logical resource.
//!
//! Each candidate earns integer bonuses that are summed; only the relative
//! order matters.
//!
//! | Rule | Bonus |
//! |---|---|
//! | Encoding at preference index `i` of `n` supported encodings | `(n - i) * 10` |
//! | Target class equal to the environment's | `+20` |
//! | Target class adjacent to the environment's (Small/Medium, Medium/Large) | `+10` |
//! | `Slow` link, Small candidate | `+5` |
//! | `Slow` link, bandwidth-efficient encoding | `+5` |
//! | `Fast` link, Large candidate | `+5` |
//!
//! Ties go to the candidate that came first in the input.

use crate::time::{self, Clock};

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Encodings that earn the slow-link bonus unless configured otherwise.
pub const DEFAULT_EFFICIENT_ENCODINGS: &[&str] = &["avif", "webp", "jxl", "heic"];

const ENCODING_WEIGHT: i64 = 10;
const EXACT_TARGET_BONUS: i64 = 20;
const ADJACENT_TARGET_BONUS: i64 = 10;
const LINK_BONUS: i64 = 5;

/// The device/output class a representation is produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetClass {
  Small,
  Medium,
  Large,
}

impl TargetClass {
  /// Reads a class from a profile tag. `mobile`, `tablet` and `desktop` are
  /// accepted as aliases.
  pub fn from_tag(tag: &str) -> Option<Self> {
    let tag = tag.trim();
    let is = |name: &str| tag.eq_ignore_ascii_case(name);
    if is("small") || is("mobile") {
      Some(TargetClass::Small)
    } else if is("medium") || is("tablet") {
      Some(TargetClass::Medium)
    } else if is("large") || is("desktop") {
      Some(TargetClass::Large)
    } else {
      None
    }
  }

  fn ordinal(self) -> i8 {
    match self {
      TargetClass::Small => 0,
      TargetClass::Medium => 1,
      TargetClass::Large => 2,
    }
  }

  /// Small/Medium and Medium/Large are adjacent; Small/Large is not.
  pub fn is_adjacent(self, other: TargetClass) -> bool {
    (self.ordinal() - other.ordinal()).abs() == 1
  }
}

impl fmt::Display for TargetClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TargetClass::Small => write!(f, "small"),
      TargetClass::Medium => write!(f, "medium"),
      TargetClass::Large => write!(f, "large"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkQuality {
  Slow,
  #[default]
  Normal,
  Fast,
}

/// One interchangeable representation of a logical resource.
///
/// Descriptors are produced by the locator issuer; this crate only stores,
/// scores and hands them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
  pub id: String,
  /// Encoding and target-class tags, e.g. `{"webp", "mobile"}`.
  pub profile_tags: BTreeSet<String>,
  pub locator: Option<String>,
  pub expires_at: Option<Instant>,
}

impl ResourceDescriptor {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      profile_tags: BTreeSet::new(),
      locator: None,
      expires_at: None,
    }
  }

  pub fn with_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.profile_tags.extend(tags.into_iter().map(Into::into));
    self
  }

  pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
    self.locator = Some(locator.into());
    self
  }

  pub fn expiring_at(mut self, expires_at: Instant) -> Self {
    self.expires_at = Some(expires_at);
    self
  }

  /// Case-insensitive tag test.
  pub fn has_tag(&self, tag: &str) -> bool {
    self
      .profile_tags
      .iter()
      .any(|candidate| candidate.eq_ignore_ascii_case(tag))
  }

  /// The first tag that names a target class.
  pub fn target_class(&self) -> Option<TargetClass> {
    self.profile_tags.iter().find_map(|tag| TargetClass::from_tag(tag))
  }

  /// Time left before the locator expires. `None` means it never does.
  pub fn remaining_lifetime(&self, now: Instant) -> Option<Duration> {
    self.expires_at.map(|deadline| time::remaining(now, deadline))
  }

  pub fn is_expired(&self, now: Instant) -> bool {
    self.expires_at.is_some_and(|deadline| now >= deadline)
  }

  /// A locator is usable when present, non-blank and not yet expired.
  pub fn has_usable_locator(&self, now: Instant) -> bool {
    let present = self
      .locator
      .as_deref()
      .is_some_and(|locator| !locator.trim().is_empty());
    present && !self.is_expired(now)
  }
}

/// A snapshot of the consumer's capabilities, computed by the caller once per
/// selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentProfile {
  /// Supported encodings, most preferred first.
  pub supported_encodings: Vec<String>,
  pub target_class: TargetClass,
  pub link_quality: LinkQuality,
}

impl EnvironmentProfile {
  pub fn new(target_class: TargetClass, link_quality: LinkQuality) -> Self {
    Self {
      supported_encodings: Vec::new(),
      target_class,
      link_quality,
    }
  }

  /// Appends encodings in decreasing order of preference. Duplicates are
  /// ignored.
  pub fn supporting<I, S>(mut self, encodings: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for encoding in encodings {
      let encoding = encoding.into();
      if !self
        .supported_encodings
        .iter()
        .any(|known| known.eq_ignore_ascii_case(&encoding))
      {
        self.supported_encodings.push(encoding);
      }
    }
    self
  }

  /// The best preference index among the candidate's tags.
  fn encoding_rank(&self, candidate: &ResourceDescriptor) -> Option<usize> {
    self
      .supported_encodings
      .iter()
      .position(|encoding| candidate.has_tag(encoding))
  }
}

/// The winning candidate and its score. The score is diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOutcome {
  pub chosen: ResourceDescriptor,
  pub score: i64,
}

/// Picks the best representation for an environment.
///
/// The selector holds no mutable state and can be shared freely between
/// threads. Its clock is only consulted to discard already-expired locators.
#[derive(Clone)]
pub struct ResourceSelector {
  clock: Arc<dyn Clock>,
  efficient_encodings: Vec<String>,
}

impl fmt::Debug for ResourceSelector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResourceSelector")
      .field("efficient_encodings", &self.efficient_encodings)
      .finish_non_exhaustive()
  }
}

impl Default for ResourceSelector {
  fn default() -> Self {
    Self::new()
  }
}

impl ResourceSelector {
  pub fn new() -> Self {
    Self {
      clock: time::system(),
      efficient_encodings: DEFAULT_EFFICIENT_ENCODINGS
        .iter()
        .map(|encoding| encoding.to_string())
        .collect(),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Replaces the set of encodings that earn the slow-link bonus.
  pub fn with_efficient_encodings<I, S>(mut self, encodings: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.efficient_encodings = encodings.into_iter().map(Into::into).collect();
    self
  }

  fn is_efficient(&self, encoding: &str) -> bool {
    self
      .efficient_encodings
      .iter()
      .any(|efficient| efficient.eq_ignore_ascii_case(encoding))
  }

  /// Scores a single candidate. Eligibility is not checked here.
  pub fn score(&self, candidate: &ResourceDescriptor, env: &EnvironmentProfile) -> i64 {
    let mut score = 0;

    let encoding = env
      .encoding_rank(candidate)
      .map(|rank| (rank, env.supported_encodings[rank].as_str()));
    if let Some((rank, _)) = encoding {
      score += (env.supported_encodings.len() - rank) as i64 * ENCODING_WEIGHT;
    }

    let class = candidate.target_class();
    match class {
      Some(class) if class == env.target_class => score += EXACT_TARGET_BONUS,
      Some(class) if class.is_adjacent(env.target_class) => score += ADJACENT_TARGET_BONUS,
      _ => {}
    }

    match env.link_quality {
      LinkQuality::Slow => {
        if class == Some(TargetClass::Small) {
          score += LINK_BONUS;
        }
        if encoding.is_some_and(|(_, name)| self.is_efficient(name)) {
          score += LINK_BONUS;
        }
      }
      LinkQuality::Fast => {
        if class == Some(TargetClass::Large) {
          score += LINK_BONUS;
        }
      }
      LinkQuality::Normal => {}
    }

    score
  }

  fn eligible<'a>(
    &self,
    candidates: &'a [ResourceDescriptor],
    exclude: &'a HashSet<String>,
  ) -> impl Iterator<Item = &'a ResourceDescriptor> + 'a {
    let now = self.clock.now();
    candidates
      .iter()
      .filter(move |candidate| candidate.has_usable_locator(now) && !exclude.contains(&candidate.id))
  }

  /// Picks the highest-scoring eligible candidate.
  ///
  /// Candidates without a usable locator, or whose id is in `exclude`, are
  /// skipped. Equal scores go to the earlier candidate. Returns `None` only
  /// when nothing is eligible.
  pub fn select(
    &self,
    candidates: &[ResourceDescriptor],
    env: &EnvironmentProfile,
    exclude: &HashSet<String>,
  ) -> Option<SelectionOutcome> {
    let mut best: Option<(&ResourceDescriptor, i64)> = None;
    for candidate in self.eligible(candidates, exclude) {
      let score = self.score(candidate, env);
      if best.map_or(true, |(_, best_score)| score > best_score) {
        best = Some((candidate, score));
      }
    }

    let outcome = best.map(|(chosen, score)| SelectionOutcome {
      chosen: chosen.clone(),
      score,
    });
    match &outcome {
      Some(outcome) => tracing::trace!(
        chosen = %outcome.chosen.id,
        score = outcome.score,
        candidates = candidates.len(),
        "selected representation"
      ),
      None => tracing::trace!(candidates = candidates.len(), "no eligible representation"),
    }
    outcome
  }

  /// `select` with `previous` excluded, for use after `previous` failed to
  /// load. Never returns `previous` again.
  pub fn reselect_excluding(
    &self,
    previous: &ResourceDescriptor,
    candidates: &[ResourceDescriptor],
    env: &EnvironmentProfile,
  ) -> Option<SelectionOutcome> {
    let exclude = HashSet::from([previous.id.clone()]);
    self.select(candidates, env, &exclude)
  }

  /// Every eligible candidate, best first, ties in input order.
  pub fn rank(
    &self,
    candidates: &[ResourceDescriptor],
    env: &EnvironmentProfile,
    exclude: &HashSet<String>,
  ) -> Vec<SelectionOutcome> {
    let mut ranked: Vec<SelectionOutcome> = self
      .eligible(candidates, exclude)
      .map(|candidate| SelectionOutcome {
        score: self.score(candidate, env),
        chosen: candidate.clone(),
      })
      .collect();
    // `sort_by` is stable, which keeps input order among equal scores.
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
  }
}
