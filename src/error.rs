//! Error types for the fusion engine

use thiserror::Error;

/// Fusion engine error type
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render error: {0}")]
    Render(#[from] std::fmt::Error),

    #[error("{service} request failed: {message}")]
    Collaborator {
        service: &'static str,
        message: String,
    },

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error("Current location is not set yet")]
    NoLocation,
}

impl FusionError {
    pub fn collaborator(service: &'static str, message: impl Into<String>) -> Self {
        FusionError::Collaborator {
            service,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FusionError>;
