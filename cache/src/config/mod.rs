// Configuration parsing and validation.

pub mod raw; // Structs directly mapping to the YAML structure
pub mod processed; // Validated configuration consumed by constructors

pub use processed::{
  find_config_file, CacheConfig, HealthThresholds, LifecycleConfig, ResolverConfig,
  SessionConfig, StatusTtlPolicy,
};
