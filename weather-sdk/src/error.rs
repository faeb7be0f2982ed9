use thiserror::Error;

use crate::{Mode, Units};

/// Every failure the SDK reports to its callers.
#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(
        "An SDK instance with this API key already exists with mode '{existing_mode}' and units '{existing_units}'"
    )]
    ConfigConflict {
        existing_mode: Mode,
        existing_units: Units,
    },

    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("Invalid API key")]
    Auth,

    #[error("API rate limit exceeded")]
    RateLimited,

    #[error("API error: HTTP {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl WeatherError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Whether this error came from the provider rather than from the caller's input.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::CityNotFound(_)
                | Self::Auth
                | Self::RateLimited
                | Self::Api { .. }
                | Self::Transport(_)
                | Self::Parse(_)
        )
    }
}

impl From<serde_json::Error> for WeatherError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
