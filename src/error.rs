//! Sluice error types
//!
//! These cover misuse of the relay and configuration problems. Failures
//! raised by the upstream source never become a [`SluiceError`]: they travel
//! in-band to the subscriber as the stream's terminal error.

/// Sluice error types
#[derive(Debug, thiserror::Error)]
pub enum SluiceError {
    // Consumer protocol violations
    #[error("invalid demand: requested {requested} items, must be positive")]
    InvalidDemand { requested: u64 },

    #[error("relay already has a live subscription")]
    AlreadySubscribed,

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SluiceError {
    /// Whether the error was caused by the caller violating the consumer
    /// protocol, as opposed to a configuration or environment problem.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            SluiceError::InvalidDemand { .. } | SluiceError::AlreadySubscribed
        )
    }
}

/// Result type alias for Sluice operations
pub type Result<T> = std::result::Result<T, SluiceError>;
