use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Raw, directly `serde::Deserialize`-able mirror of [`Config`], with
/// millisecond durations instead of `Duration` so it reads naturally
/// from TOML.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    base_path: PathBuf,
    base_filename: String,
    max_segment_size: u64,
    queue_capacity: usize,
    max_explicit_producers: usize,
    batch_size: usize,
    num_writer_threads: usize,
    max_open_files: usize,
    max_attempts: u32,
    base_retry_delay_ms: u64,
    append_timeout_ms: u64,
    use_encryption: bool,
    compression_level: u32,
}

impl Default for RawConfig {
    fn default() -> Self {
        let c = Config::default();
        Self {
            base_path: c.base_path,
            base_filename: c.base_filename,
            max_segment_size: c.max_segment_size,
            queue_capacity: c.queue_capacity,
            max_explicit_producers: c.max_explicit_producers,
            batch_size: c.batch_size,
            num_writer_threads: c.num_writer_threads,
            max_open_files: c.max_open_files,
            max_attempts: c.max_attempts,
            base_retry_delay_ms: c.base_retry_delay.as_millis() as u64,
            append_timeout_ms: c.append_timeout.as_millis() as u64,
            use_encryption: c.use_encryption,
            compression_level: c.compression_level,
        }
    }
}

/// All tunables the manager, writer pool, queue, and storage layer read at
/// construction time. See the option table in the crate-level
/// documentation for what each field controls.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_path: PathBuf,
    pub base_filename: String,
    pub max_segment_size: u64,
    pub queue_capacity: usize,
    pub max_explicit_producers: usize,
    pub batch_size: usize,
    pub num_writer_threads: usize,
    pub max_open_files: usize,
    pub max_attempts: u32,
    pub base_retry_delay: Duration,
    pub append_timeout: Duration,
    pub use_encryption: bool,
    pub compression_level: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./audit-log"),
            base_filename: "audit".to_string(),
            max_segment_size: 64 * 1024 * 1024,
            queue_capacity: 65_536,
            max_explicit_producers: 64,
            batch_size: 256,
            num_writer_threads: 4,
            max_open_files: 64,
            max_attempts: 5,
            base_retry_delay: Duration::from_millis(10),
            append_timeout: Duration::from_secs(1),
            use_encryption: false,
            compression_level: 0,
        }
    }
}

impl Config {
    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let config = Config {
            base_path: raw.base_path,
            base_filename: raw.base_filename,
            max_segment_size: raw.max_segment_size,
            queue_capacity: raw.queue_capacity,
            max_explicit_producers: raw.max_explicit_producers,
            batch_size: raw.batch_size,
            num_writer_threads: raw.num_writer_threads,
            max_open_files: raw.max_open_files,
            max_attempts: raw.max_attempts,
            base_retry_delay: Duration::from_millis(raw.base_retry_delay_ms),
            append_timeout: Duration::from_millis(raw.append_timeout_ms),
            use_encryption: raw.use_encryption,
            compression_level: raw.compression_level,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.compression_level > 9 {
            return Err(ConfigError::Invalid {
                field: "compression_level",
                reason: "must be between 0 and 9".to_string(),
            });
        }
        if self.num_writer_threads == 0 {
            return Err(ConfigError::Invalid {
                field: "num_writer_threads",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_segment_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_segment_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn with_num_writer_threads(mut self, n: usize) -> Self {
        self.num_writer_threads = n;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_max_segment_size(mut self, bytes: u64) -> Self {
        self.max_segment_size = bytes;
        self
    }

    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.use_encryption = enabled;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }
}
