use thiserror::Error;

/// The error type for building caches and loading configuration.
///
/// Runtime cache, selector and session operations never fail; they report
/// absence through `Option`/`bool` instead.
#[derive(Debug, Error)]
pub enum Error {
  #[error("cache '{cache}' was configured with a max_size of zero")]
  ZeroCapacity { cache: String },

  #[error("Configuration file not found: {0}")]
  ConfigNotFound(String),

  #[error("Failed to read configuration file: {0}")]
  ConfigRead(#[from] std::io::Error),

  #[error("Failed to parse configuration: {0}")]
  ConfigParse(String),

  #[error("Invalid configuration value for '{field}': {message}")]
  InvalidConfigValue { field: String, message: String },
}

/// A specialized `Result` type for `fibre_resolver` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
