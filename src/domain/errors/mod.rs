// Domain errors - Error types for the domain layer

use thiserror::Error;

use crate::domain::model::TimeSpec;

/// Domain-specific error types
///
/// Every probe and resolution failure is structural, so each one keeps its own
/// variant and is never folded into a generic failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// File missing, unreadable, or not a recognised container
    #[error("Cannot open {path}: {reason}")]
    Open { path: String, reason: String },

    /// Container has no video stream to index
    #[error("No video stream to index in {path}")]
    NoVideoStream { path: String },

    /// Corrupt or truncated metadata met while enumerating keyframes
    #[error("Demux error: {0}")]
    Demux(String),

    /// The keyframe index had no entries at all
    #[error("Keyframe index is empty")]
    EmptyIndex,

    /// The index had entries but none at or before the requested time
    #[error("No keyframe at or before {requested} (first keyframe is at {first})")]
    NoPrecedingKeyframe { requested: TimeSpec, first: TimeSpec },

    /// Trim request outside the container's bounds
    #[error("Invalid trim request: {0}")]
    InvalidRequest(String),

    /// Invalid arguments provided
    #[error("Bad arguments: {0}")]
    BadArgs(String),
}

impl DomainError {
    /// Create an open error for a path
    pub fn open(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Open {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a demux error
    pub fn demux(reason: impl Into<String>) -> Self {
        Self::Demux(reason.into())
    }

    /// Short machine-friendly name of the condition
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Open { .. } => "open",
            DomainError::NoVideoStream { .. } => "no_video_stream",
            DomainError::Demux(_) => "demux",
            DomainError::EmptyIndex => "empty_index",
            DomainError::NoPrecedingKeyframe { .. } => "no_preceding_keyframe",
            DomainError::InvalidRequest(_) => "invalid_request",
            DomainError::BadArgs(_) => "bad_args",
        }
    }
}
