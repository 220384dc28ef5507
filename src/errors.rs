use thiserror::Error;

/// Error type returned by refresh strategies supplied with refreshable entries.
pub type RefreshError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache miss: {0}")]
    Miss(String),

    #[error("Refresh failed for {key}: {message}")]
    Refresh { key: String, message: String },

    #[error("Cache initialization failed: {0}")]
    Init(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Consistency check failed: {0}")]
    Consistency(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("TOML decode: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("TOML encode: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CacheError {
    /// True for the recoverable "key not present" outcome of `get`.
    #[must_use]
    pub const fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss(_))
    }
}
