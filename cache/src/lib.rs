//! TTL-aware, size-bounded caching for resources whose access locators
//! expire, plus the selection and session logic that keeps a consumer on a
//! usable representation.
//!
//! # Overview
//! - [`BoundedCache`]: a thread-safe keyed store with per-entry TTL and a
//!   hard capacity enforced by least-recently-used eviction.
//! - [`ResourceLocatorCache`]: short-lived locators keyed by resource id and
//!   normalized profile tags.
//! - [`ComputationResultCache`]: job results and job status snapshots.
//! - [`ResourceSelector`]: deterministic scoring of candidate
//!   representations against an [`EnvironmentProfile`].
//! - [`ExpirationAwareSession`]: tracks the chosen representation for one
//!   resource and re-selects on failure or imminent expiry.
//! - [`CacheLifecycleManager`]: periodic sweeping, aggregate statistics and
//!   health reporting for both caches.
//!
//! All time comparisons go through a [`Clock`]; tests drive time with a
//! [`ManualClock`].

// Public modules that form the API
pub mod bounded;
pub mod builder;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod listener;
pub mod locator;
pub mod metrics;
pub mod results;
pub mod selector;
pub mod session;
pub mod time;

// Internal, crate-only modules
mod entry;
mod recency;
mod task;

// Re-export the primary user-facing types for convenience
pub use bounded::BoundedCache;
pub use builder::CacheBuilder;
pub use config::{
  find_config_file, CacheConfig, HealthThresholds, LifecycleConfig, ResolverConfig,
  SessionConfig, StatusTtlPolicy,
};
pub use entry::EntryInfo;
pub use error::{Error, Result};
pub use lifecycle::{AggregateStats, CacheLifecycleManager, HealthReport, MemoryEstimate, SweepReport};
pub use listener::{EvictionListener, EvictionReason};
pub use locator::{ExpiringLocator, Locator, ResourceLocatorCache};
pub use metrics::CacheStats;
pub use results::{ComputationResultCache, JobPayload, JobState, JobStatus, ResultKind};
pub use selector::{
  EnvironmentProfile, LinkQuality, ResourceDescriptor, ResourceSelector, SelectionOutcome,
  TargetClass,
};
pub use session::{ExpirationAwareSession, SessionPhase, SessionState};
pub use time::{Clock, ManualClock, SystemClock};
