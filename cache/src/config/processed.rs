use crate::config::raw::{
  CacheConfigRaw, LifecycleConfigRaw, ResolverConfigRaw, SessionConfigRaw, StatusTtlRaw,
};
use crate::error::{Error, Result};
use crate::locator::{DEFAULT_LOCATOR_CAPACITY, DEFAULT_LOCATOR_TTL};
use crate::results::{DEFAULT_RESULT_CAPACITY, DEFAULT_RESULT_TTL};

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_BASE_NAME: &str = "fibre_resolver";
const DEFAULT_CONFIG_EXTENSION: &str = "yaml";

/// Capacity and default TTL of one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
  pub max_size: usize,
  pub default_ttl: Duration,
}

impl CacheConfig {
  /// Defaults for the short-lived locator cache: 500 entries, 30 minutes.
  pub fn locators() -> Self {
    Self {
      max_size: DEFAULT_LOCATOR_CAPACITY,
      default_ttl: DEFAULT_LOCATOR_TTL,
    }
  }

  /// Defaults for the long-lived result cache: 100 entries, 1 hour.
  pub fn results() -> Self {
    Self {
      max_size: DEFAULT_RESULT_CAPACITY,
      default_ttl: DEFAULT_RESULT_TTL,
    }
  }
}

/// TTLs callers apply to job status snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTtlPolicy {
  pub in_progress: Duration,
  pub terminal: Duration,
}

impl Default for StatusTtlPolicy {
  fn default() -> Self {
    Self {
      in_progress: Duration::from_secs(30),
      terminal: DEFAULT_RESULT_TTL,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
  pub max_retries: u32,
  pub refresh_threshold: Duration,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      refresh_threshold: Duration::from_secs(5 * 60),
    }
  }
}

/// Limits checked by `CacheLifecycleManager::health_check`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
  /// Hit-rate floor, in `[0, 1]`.
  pub min_hit_rate: f64,
  /// Lookups a cache must have seen before its hit rate is judged.
  pub min_sample_size: u64,
  /// Fill ratio (`size / max_size`) at which a cache counts as near full.
  pub max_fill_ratio: f64,
  /// Ceiling on the combined memory estimate.
  pub max_memory_bytes: u64,
}

impl Default for HealthThresholds {
  fn default() -> Self {
    Self {
      min_hit_rate: 0.5,
      min_sample_size: 100,
      max_fill_ratio: 0.9,
      max_memory_bytes: 50 * 1024 * 1024,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifecycleConfig {
  pub sweep_interval: Duration,
  pub thresholds: HealthThresholds,
  /// Assumed average footprint of one locator entry.
  pub avg_locator_entry_bytes: u64,
  /// Assumed average footprint of one result entry.
  pub avg_result_entry_bytes: u64,
}

impl Default for LifecycleConfig {
  fn default() -> Self {
    Self {
      sweep_interval: Duration::from_secs(5 * 60),
      thresholds: HealthThresholds::default(),
      avg_locator_entry_bytes: 512,
      avg_result_entry_bytes: 10 * 1024,
    }
  }
}

/// The validated configuration for every component in the crate.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
  pub locator_cache: CacheConfig,
  pub result_cache: CacheConfig,
  pub status_ttl: StatusTtlPolicy,
  pub session: SessionConfig,
  pub lifecycle: LifecycleConfig,
}

impl Default for ResolverConfig {
  fn default() -> Self {
    Self {
      locator_cache: CacheConfig::locators(),
      result_cache: CacheConfig::results(),
      status_ttl: StatusTtlPolicy::default(),
      session: SessionConfig::default(),
      lifecycle: LifecycleConfig::default(),
    }
  }
}

impl ResolverConfig {
  /// Parses and validates a YAML document.
  pub fn from_yaml_str(yaml: &str) -> Result<Self> {
    let raw: ResolverConfigRaw =
      serde_yaml::from_str(yaml).map_err(|e| Error::ConfigParse(e.to_string()))?;
    process_raw_config(raw)
  }

  /// Reads, parses and validates a YAML file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if !path.is_file() {
      return Err(Error::ConfigNotFound(path.display().to_string()));
    }
    let contents = fs::read_to_string(path)?;
    Self::from_yaml_str(&contents)
  }
}

/// Finds `fibre_resolver.<env>.yaml` or `fibre_resolver.yaml` in the working
/// directory. The environment comes from the argument, then `FIBRE_ENV`, then
/// `APP_ENV`.
pub fn find_config_file(environment_suffix: Option<&str>) -> Result<PathBuf> {
  find_config_file_in(Path::new("."), environment_suffix)
}

fn find_config_file_in(dir: &Path, environment_suffix: Option<&str>) -> Result<PathBuf> {
  let env_name = environment_suffix
    .map(|s| s.to_string())
    .or_else(|| env::var("FIBRE_ENV").ok())
    .or_else(|| env::var("APP_ENV").ok());

  let mut files_to_check = Vec::new();
  if let Some(env_str) = env_name.as_deref().filter(|s| !s.is_empty()) {
    files_to_check.push(format!(
      "{}.{}.{}",
      DEFAULT_CONFIG_BASE_NAME, env_str, DEFAULT_CONFIG_EXTENSION
    ));
  }
  files_to_check.push(format!("{}.{}", DEFAULT_CONFIG_BASE_NAME, DEFAULT_CONFIG_EXTENSION));

  files_to_check
    .iter()
    .map(|file_name| dir.join(file_name))
    .find(|path| path.is_file())
    .ok_or_else(|| Error::ConfigNotFound(files_to_check.join(" or ")))
}

/// Turns the raw YAML shape into a validated `ResolverConfig`.
pub fn process_raw_config(raw: ResolverConfigRaw) -> Result<ResolverConfig> {
  let defaults = ResolverConfig::default();
  Ok(ResolverConfig {
    locator_cache: process_cache(raw.locator_cache, defaults.locator_cache, "locator_cache")?,
    result_cache: process_cache(raw.result_cache, defaults.result_cache, "result_cache")?,
    status_ttl: process_status_ttl(raw.status_ttl, defaults.status_ttl)?,
    session: process_session(raw.session, defaults.session)?,
    lifecycle: process_lifecycle(raw.lifecycle, defaults.lifecycle)?,
  })
}

fn process_cache(raw: CacheConfigRaw, default: CacheConfig, section: &str) -> Result<CacheConfig> {
  let max_size = raw.max_size.unwrap_or(default.max_size);
  if max_size == 0 {
    return Err(Error::InvalidConfigValue {
      field: format!("{}.max_size", section),
      message: "max_size must be at least 1.".to_string(),
    });
  }
  Ok(CacheConfig {
    max_size,
    default_ttl: parse_duration_or(raw.default_ttl, default.default_ttl, section, "default_ttl")?,
  })
}

fn process_status_ttl(raw: StatusTtlRaw, default: StatusTtlPolicy) -> Result<StatusTtlPolicy> {
  Ok(StatusTtlPolicy {
    in_progress: parse_duration_or(raw.in_progress, default.in_progress, "status_ttl", "in_progress")?,
    terminal: parse_duration_or(raw.terminal, default.terminal, "status_ttl", "terminal")?,
  })
}

fn process_session(raw: SessionConfigRaw, default: SessionConfig) -> Result<SessionConfig> {
  Ok(SessionConfig {
    max_retries: raw.max_retries.unwrap_or(default.max_retries),
    refresh_threshold: parse_duration_or(
      raw.refresh_threshold,
      default.refresh_threshold,
      "session",
      "refresh_threshold",
    )?,
  })
}

fn process_lifecycle(raw: LifecycleConfigRaw, default: LifecycleConfig) -> Result<LifecycleConfig> {
  let sweep_interval = parse_duration_or(
    raw.sweep_interval,
    default.sweep_interval,
    "lifecycle",
    "sweep_interval",
  )?;
  if sweep_interval.is_zero() {
    return Err(Error::InvalidConfigValue {
      field: "lifecycle.sweep_interval".to_string(),
      message: "sweep_interval must be greater than zero.".to_string(),
    });
  }

  let thresholds = HealthThresholds {
    min_hit_rate: unit_interval(raw.min_hit_rate, default.thresholds.min_hit_rate, "min_hit_rate")?,
    min_sample_size: raw.min_sample_size.unwrap_or(default.thresholds.min_sample_size),
    max_fill_ratio: unit_interval(
      raw.max_fill_ratio,
      default.thresholds.max_fill_ratio,
      "max_fill_ratio",
    )?,
    max_memory_bytes: raw.max_memory_bytes.unwrap_or(default.thresholds.max_memory_bytes),
  };

  Ok(LifecycleConfig {
    sweep_interval,
    thresholds,
    avg_locator_entry_bytes: raw
      .avg_locator_entry_bytes
      .unwrap_or(default.avg_locator_entry_bytes),
    avg_result_entry_bytes: raw
      .avg_result_entry_bytes
      .unwrap_or(default.avg_result_entry_bytes),
  })
}

fn parse_duration_or(
  value: Option<String>,
  default: Duration,
  section: &str,
  field: &str,
) -> Result<Duration> {
  match value {
    None => Ok(default),
    Some(text) => humantime::parse_duration(text.trim()).map_err(|e| Error::InvalidConfigValue {
      field: format!("{}.{}", section, field),
      message: format!("Invalid duration '{}': {}", text, e),
    }),
  }
}

fn unit_interval(value: Option<f64>, default: f64, field: &str) -> Result<f64> {
  let value = value.unwrap_or(default);
  if (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(Error::InvalidConfigValue {
      field: format!("lifecycle.{}", field),
      message: format!("Expected a value between 0 and 1, got {}.", value),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn empty_document_yields_defaults() {
    let config = ResolverConfig::from_yaml_str("{}").unwrap();
    assert_eq!(config, ResolverConfig::default());
    assert_eq!(config.locator_cache.max_size, 500);
    assert_eq!(config.locator_cache.default_ttl, Duration::from_secs(1800));
    assert_eq!(config.result_cache.max_size, 100);
    assert_eq!(config.result_cache.default_ttl, Duration::from_secs(3600));
    assert_eq!(config.status_ttl.in_progress, Duration::from_secs(30));
  }

  #[test]
  fn full_document_is_parsed() {
    let yaml = r#"
locator_cache:
  max_size: 50
  default_ttl: 10m
result_cache:
  max_size: 20
  default_ttl: 2h
status_ttl:
  in_progress: 15s
  terminal: 90m
session:
  max_retries: 2
  refresh_threshold: 45s
lifecycle:
  sweep_interval: 1m
  min_hit_rate: 0.25
  min_sample_size: 10
  max_fill_ratio: 0.8
  max_memory_bytes: 1048576
  avg_locator_entry_bytes: 256
  avg_result_entry_bytes: 4096
"#;
    let config = ResolverConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(
      config,
      ResolverConfig {
        locator_cache: CacheConfig {
          max_size: 50,
          default_ttl: Duration::from_secs(600),
        },
        result_cache: CacheConfig {
          max_size: 20,
          default_ttl: Duration::from_secs(7200),
        },
        status_ttl: StatusTtlPolicy {
          in_progress: Duration::from_secs(15),
          terminal: Duration::from_secs(5400),
        },
        session: SessionConfig {
          max_retries: 2,
          refresh_threshold: Duration::from_secs(45),
        },
        lifecycle: LifecycleConfig {
          sweep_interval: Duration::from_secs(60),
          thresholds: HealthThresholds {
            min_hit_rate: 0.25,
            min_sample_size: 10,
            max_fill_ratio: 0.8,
            max_memory_bytes: 1_048_576,
          },
          avg_locator_entry_bytes: 256,
          avg_result_entry_bytes: 4096,
        },
      }
    );
  }

  #[test]
  fn unknown_fields_are_rejected() {
    let result = ResolverConfig::from_yaml_str("locator_cache:\n  capacity: 5\n");
    assert!(matches!(result, Err(Error::ConfigParse(_))));
  }

  #[test]
  fn invalid_values_name_their_field() {
    let cases = [
      ("locator_cache:\n  max_size: 0\n", "locator_cache.max_size"),
      ("result_cache:\n  default_ttl: soon\n", "result_cache.default_ttl"),
      ("lifecycle:\n  sweep_interval: 0s\n", "lifecycle.sweep_interval"),
      ("lifecycle:\n  min_hit_rate: 1.5\n", "lifecycle.min_hit_rate"),
      ("lifecycle:\n  max_fill_ratio: -0.1\n", "lifecycle.max_fill_ratio"),
    ];
    for (yaml, expected_field) in cases {
      match ResolverConfig::from_yaml_str(yaml) {
        Err(Error::InvalidConfigValue { field, .. }) => assert_eq!(field, expected_field),
        other => panic!("expected InvalidConfigValue for {expected_field}, got {other:?}"),
      }
    }
  }

  #[test]
  fn config_file_lookup_prefers_environment_specific_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fibre_resolver.yaml"), "{}").unwrap();
    fs::write(dir.path().join("fibre_resolver.staging.yaml"), "{}").unwrap();

    let found = find_config_file_in(dir.path(), Some("staging")).unwrap();
    assert_eq!(found, dir.path().join("fibre_resolver.staging.yaml"));

    let fallback = find_config_file_in(dir.path(), Some("prod")).unwrap();
    assert_eq!(fallback, dir.path().join("fibre_resolver.yaml"));
  }

  #[test]
  fn missing_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      find_config_file_in(dir.path(), Some("dev")),
      Err(Error::ConfigNotFound(_))
    ));
    assert!(matches!(
      ResolverConfig::from_file(dir.path().join("absent.yaml")),
      Err(Error::ConfigNotFound(_))
    ));
  }

  #[test]
  fn from_file_reads_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fibre_resolver.yaml");
    fs::write(&path, "session:\n  max_retries: 5\n").unwrap();
    let config = ResolverConfig::from_file(&path).unwrap();
    assert_eq!(config.session.max_retries, 5);
  }
}
