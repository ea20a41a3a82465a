//! Error handling module for ClipChop

use thiserror::Error;

use crate::domain::errors::DomainError;

/// Main error type for ClipChop operations
#[derive(Error, Debug)]
pub enum ClipChopError {
    /// Probe or resolution failure
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// External stream copy failed
    #[error("Export failed: {message}")]
    Export { message: String },

    /// Report could not be serialized
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Background task panicked or was cancelled
    #[error("Background task failed: {message}")]
    TaskFailed { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ClipChopError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn export(message: impl Into<String>) -> Self {
        Self::Export {
            message: message.into(),
        }
    }
}

/// Result type alias for ClipChop operations
pub type ClipChopResult<T> = std::result::Result<T, ClipChopError>;
