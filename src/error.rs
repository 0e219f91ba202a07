//! Linkmesh error types.

use thiserror::Error;

/// Linkmesh errors
#[derive(Error, Debug)]
pub enum LinkmeshError {
    // === Compression Errors ===
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to load {model} back-end: {reason}")]
    LoadFailure { model: &'static str, reason: String },

    #[error("failed to initialize {model} back-end: {reason}")]
    InitFailure { model: &'static str, reason: String },

    /// A decompress-path library load was refused because a recent load
    /// attempt failed; try again after the backoff window.
    #[error("back-end load retry refused, try again later")]
    RateLimited,

    #[error("compression lock poisoned")]
    Lock,

    /// Diagnostic produced by a codec, carried through unchanged.
    #[error("codec failure: {0}")]
    Codec(String),

    // === Configuration Errors ===
    #[error("config error: {0}")]
    Config(String),

    // === Standard Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for linkmesh operations
pub type Result<T> = std::result::Result<T, LinkmeshError>;

impl From<toml::de::Error> for LinkmeshError {
    fn from(err: toml::de::Error) -> Self {
        LinkmeshError::Config(err.to_string())
    }
}
