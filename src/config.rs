use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::pipeline::preprocess::DEFAULT_JPEG_QUALITY;
use crate::pipeline::vision::RetryPolicy;

/// Application-level constants
pub const APP_NAME: &str = "ShelfSight";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the remote-service credential. Required.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

pub const BASE_URL_ENV: &str = "SHELFSIGHT_BASE_URL";
pub const MODEL_ENV: &str = "SHELFSIGHT_MODEL";
pub const TIMEOUT_ENV: &str = "SHELFSIGHT_TIMEOUT_SECS";
pub const MAX_RETRIES_ENV: &str = "SHELFSIGHT_MAX_RETRIES";
pub const MAX_DIMENSION_ENV: &str = "SHELFSIGHT_MAX_DIMENSION";
pub const MAX_BYTES_ENV: &str = "SHELFSIGHT_MAX_BYTES";
pub const JPEG_QUALITY_ENV: &str = "SHELFSIGHT_JPEG_QUALITY";
pub const DUMP_DIR_ENV: &str = "SHELFSIGHT_DUMP_DIR";

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.2-90b-vision-preview";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Longest edge the resizer targets.
pub const DEFAULT_MAX_DIMENSION: u32 = 800;

/// Encoded payload ceiling (4 MiB).
pub const DEFAULT_MAX_BYTES: usize = 4 * 1024 * 1024;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "shelfsight_lib=info,shelfsight=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set; export your API key before running")]
    MissingCredential(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

/// Runtime settings, resolved once at startup.
///
/// The credential is only ever read from the environment. There is no
/// compiled-in fallback.
pub struct Settings {
    pub api_key: Zeroizing<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
    pub max_dimension: u32,
    pub max_bytes: usize,
    /// JPEG quality for every encode, 1..=100.
    pub jpeg_quality: u8,
    pub dump_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary lookup (tests inject a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential(API_KEY_ENV))?;

        let base_url = lookup(BASE_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = lookup(MODEL_ENV)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = parse_or(&lookup, TIMEOUT_ENV, DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: TIMEOUT_ENV,
                value: "0".into(),
            });
        }

        let retry = RetryPolicy {
            max_retries: parse_or(&lookup, MAX_RETRIES_ENV, RetryPolicy::default().max_retries)?,
            ..RetryPolicy::default()
        };

        let max_dimension = parse_or(&lookup, MAX_DIMENSION_ENV, DEFAULT_MAX_DIMENSION)?;
        let max_bytes = parse_or(&lookup, MAX_BYTES_ENV, DEFAULT_MAX_BYTES)?;
        if max_dimension == 0 {
            return Err(ConfigError::InvalidValue {
                name: MAX_DIMENSION_ENV,
                value: "0".into(),
            });
        }
        if max_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                name: MAX_BYTES_ENV,
                value: "0".into(),
            });
        }

        let jpeg_quality = parse_or(&lookup, JPEG_QUALITY_ENV, DEFAULT_JPEG_QUALITY)?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err(ConfigError::InvalidValue {
                name: JPEG_QUALITY_ENV,
                value: jpeg_quality.to_string(),
            });
        }

        let dump_dir = lookup(DUMP_DIR_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            api_key: Zeroizing::new(api_key),
            base_url,
            model,
            timeout_secs,
            retry,
            max_dimension,
            max_bytes,
            jpeg_quality,
            dump_dir,
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .field("max_dimension", &self.max_dimension)
            .field("max_bytes", &self.max_bytes)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("dump_dir", &self.dump_dir)
            .finish()
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}
