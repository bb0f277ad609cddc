// src/error.rs
use thiserror::Error;

/// Failures raised by the bootstrap itself. None of them are retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("configuration error in `{field}`: {message}")]
    Configuration { field: &'static str, message: String },
    #[error("platform client is already initialized")]
    AlreadyInitialized,
    #[error("platform client is not initialized")]
    NotInitialized,
    #[error("failed to build platform client: {0}")]
    Client(String),
}

impl BootstrapError {
    pub fn configuration(field: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            message: message.into(),
        }
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

pub type BootstrapResult<T> = std::result::Result<T, BootstrapError>;
