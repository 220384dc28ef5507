use crate::errors::CacheError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_TTL_MS: u64 = 900_000;
pub const DEFAULT_THREAD_NAME: &str = "globalcache-sweep";

pub const ENV_SWEEP_INTERVAL_MS: &str = "GLOBALCACHE_SWEEP_INTERVAL_MS";
pub const ENV_DEFAULT_TTL_MS: &str = "GLOBALCACHE_DEFAULT_TTL_MS";

/// Configuration for the cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub sweep_interval_ms: u64,
    /// TTL applied by `put(key, value)`. `0` stores permanent entries.
    pub default_ttl_ms: u64,
    pub thread_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            default_ttl_ms: DEFAULT_TTL_MS,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        (self.default_ttl_ms > 0).then(|| Duration::from_millis(self.default_ttl_ms))
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = duration_to_ms(interval);
        self
    }

    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl_ms = ttl_to_ms(ttl);
        self
    }

    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns `TomlDecode` on malformed input and `Config` when the thread name is blank.
    pub fn from_toml_str(s: &str) -> Result<Self, CacheError> {
        let cfg: CacheConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    /// Returns `Io` when the file cannot be read, otherwise as [`CacheConfig::from_toml_str`].
    pub fn from_file(path: &Path) -> Result<Self, CacheError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| CacheError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&s)
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    /// Returns `TomlEncode` if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, CacheError> {
        Ok(toml::to_string(self)?)
    }

    /// Overrides fields from `GLOBALCACHE_*` environment variables. Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(ms) = env_u64(ENV_SWEEP_INTERVAL_MS) {
            self.sweep_interval_ms = ms.max(1);
        }
        if let Some(ms) = env_u64(ENV_DEFAULT_TTL_MS) {
            self.default_ttl_ms = ms;
        }
    }

    /// Precedence: env > config file > defaults.
    ///
    /// # Errors
    /// Propagates file read and parse errors when `path` is given.
    pub fn load(path: Option<&Path>) -> Result<Self, CacheError> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), CacheError> {
        if self.thread_name.trim().is_empty() {
            return Err(CacheError::Config("thread_name must not be empty".into()));
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<u64>().ok())
}

/// `None` maps to 0 (permanent); a present TTL is at least 1 ms.
pub(crate) fn ttl_to_ms(ttl: Option<Duration>) -> u64 {
    ttl.map_or(0, |d| duration_to_ms(d).max(1))
}

#[inline]
pub(crate) fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(5));
        assert_eq!(cfg.default_ttl(), Some(Duration::from_secs(900)));
        assert_eq!(cfg.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = CacheConfig::from_toml_str("sweep_interval_ms = 250\n").unwrap();
        assert_eq!(cfg.sweep_interval_ms, 250);
        assert_eq!(cfg.default_ttl_ms, DEFAULT_TTL_MS);
    }

    #[test]
    fn zero_ttl_means_permanent() {
        let cfg = CacheConfig::from_toml_str("default_ttl_ms = 0").unwrap();
        assert_eq!(cfg.default_ttl(), None);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let cfg = CacheConfig { sweep_interval_ms: 0, ..Default::default() };
        assert_eq!(cfg.sweep_interval(), Duration::from_millis(1));
    }

    #[test]
    fn blank_thread_name_rejected() {
        let err = CacheConfig::from_toml_str("thread_name = \"  \"").unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn malformed_toml_is_decode_error() {
        let err = CacheConfig::from_toml_str("sweep_interval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, CacheError::TomlDecode(_)));
    }
}
