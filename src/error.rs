//! Error types for adscout.
//!
//! Classification and extraction never fail; they degrade to safe defaults.
//! The variants here cover configuration, the durable lookup cache, the
//! background channel and the scan state machine.

use crate::scan::ScanPhase;

/// Error type for adscout operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configured or page URL could not be parsed.
    #[error("URL parsing failed: {0}")]
    UrlError(String),

    /// The durable lookup cache could not be read or written.
    #[error("Lookup cache failed: {0}")]
    CacheError(String),

    /// Underlying I/O failure (file-backed cache, CLI input/output).
    #[error("I/O failed: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("Serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The background endpoint dropped its side of the channel.
    #[error("Background channel closed")]
    ChannelClosed,

    /// A scan state transition that the state machine does not allow.
    #[error("Invalid scan transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Phase the controller was in.
        from: ScanPhase,
        /// Phase that was requested.
        to: ScanPhase,
    },

    /// Options failed validation.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::UrlError(err.to_string())
    }
}

/// Result type alias for adscout operations.
pub type Result<T> = std::result::Result<T, Error>;
