use serde::Deserialize;

// --- Top Level Config ---
// Every field is optional; missing values fall back to the defaults in
// `processed`. Durations are humantime strings such as "30s", "5m" or "1h".
#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfigRaw {
  #[serde(default)]
  pub locator_cache: CacheConfigRaw,
  #[serde(default)]
  pub result_cache: CacheConfigRaw,
  #[serde(default)]
  pub status_ttl: StatusTtlRaw,
  #[serde(default)]
  pub session: SessionConfigRaw,
  #[serde(default)]
  pub lifecycle: LifecycleConfigRaw,
}

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CacheConfigRaw {
  pub max_size: Option<usize>,
  pub default_ttl: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct StatusTtlRaw {
  /// TTL for `Pending`/`Processing` status snapshots.
  pub in_progress: Option<String>,
  /// TTL for `Completed`/`Failed` status snapshots.
  pub terminal: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SessionConfigRaw {
  pub max_retries: Option<u32>,
  /// Remaining locator lifetime below which a session refreshes its choice.
  pub refresh_threshold: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LifecycleConfigRaw {
  pub sweep_interval: Option<String>,
  pub min_hit_rate: Option<f64>,
  pub min_sample_size: Option<u64>,
  pub max_fill_ratio: Option<f64>,
  pub max_memory_bytes: Option<u64>,
  pub avg_locator_entry_bytes: Option<u64>,
  pub avg_result_entry_bytes: Option<u64>,
}
