//! Custom error types for Screenwright
//!
//! Provides a unified error handling system across all modules. Planned
//! task termination is not represented here; see [`crate::primitive::ControlSignal`].

use thiserror::Error;

/// Main error type for Screenwright operations
#[derive(Error, Debug)]
pub enum ScreenwrightError {
    /// Network-level failure that survived every retry, or a request that
    /// could not be built
    #[error("Transport error: {0}")]
    Transport(String),

    /// The model answered, but not with a message we can read
    #[error("No usable response from {role}")]
    NoResponse { role: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response text could not be decoded into actions
    #[error("Decode error: {0}")]
    Decode(String),

    /// Malformed primitive invocation
    #[error("Primitive error: {0}")]
    Primitive(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Screenwright operations
pub type Result<T> = std::result::Result<T, ScreenwrightError>;

impl ScreenwrightError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a no-response error for the given role
    pub fn no_response(role: impl Into<String>) -> Self {
        Self::NoResponse { role: role.into() }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a primitive error
    pub fn primitive(msg: impl Into<String>) -> Self {
        Self::Primitive(msg.into())
    }

    /// Whether the error came from the model transport rather than from
    /// local parsing or configuration
    pub fn is_model_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::NoResponse { .. } | Self::Http(_)
        )
    }
}
