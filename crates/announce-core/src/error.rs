//! Error types for the announce system
//!
//! Only configuration and payload errors ever reach the host. Per-target
//! transport problems are folded into the target's failure counter and
//! surface as diagnostics, never as `Err` values out of the engine loop.

use thiserror::Error;

/// Result type alias for announce operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the announce system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (no targets, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A master-server address that yields no host
    #[error("Ill-formed address: {0}")]
    InvalidAddress(String),

    /// Outbound payload could not be built for a target
    #[error("Payload error: {0}")]
    Payload(String),

    /// A connection toward a master-server could not be opened
    #[error("Transport error: {0}")]
    Transport(String),

    /// Engine lifecycle misuse or thread/runtime setup failure
    #[error("Engine error: {0}")]
    Engine(String),

    /// I/O errors (configuration files, thread spawning)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON configuration errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an ill-formed address error
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }

    /// Create a payload generation error
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::Payload(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Whether this error should stop the host from registering the service
    pub fn is_fatal_to_startup(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Io(_) | Self::Json(_))
    }
}
