//! Error types for newsroom flows
//!
//! Every flow returns [`NewsroomError`]. Validation errors carry the name
//! of the offending field so it can be shown next to the input.

use newsroom_artifact::{ArtifactError, HashError};
use newsroom_store::StoreError;
use newsroom_timeline::TimelineError;

/// Result alias for newsroom flows
pub type Result<T, E = NewsroomError> = std::result::Result<T, E>;

/// Main newsroom error type
#[derive(Debug, thiserror::Error)]
pub enum NewsroomError {
    /// Missing block, table, snapshot or record
    #[error("not found: {0}")]
    NotFound(String),

    /// Input rejected before any write
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Wallet not on the attester allow-list
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Flow not permitted in the current mode
    #[error("read-only: {0}")]
    ReadOnly(String),

    /// Malformed hash input
    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    /// Content-addressing invariant broken
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Drag or layout state error
    #[error("timeline error: {0}")]
    Timeline(TimelineError),

    /// Rendering the preview failed
    #[error("rasterization failed: {0}")]
    Raster(String),

    /// On-chain submission failed
    #[error("attestation failed: {0}")]
    Attestation(String),

    /// Wallet unavailable or on the wrong chain
    #[error("wallet error: {0}")]
    Wallet(String),

    /// External comparison function failed
    #[error("comparison failed: {0}")]
    Comparison(String),

    /// Bad or missing configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend failure
    #[error("storage error: {0}")]
    Store(StoreError),

    /// JSON encoding failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NewsroomError {
    /// Validation error for `field`
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending field, for validation errors
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// True for [`NewsroomError::NotFound`]
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Flatten an external error chain into a message
    #[must_use]
    pub fn external_message(err: &anyhow::Error) -> String {
        format!("{err:#}")
    }
}

impl From<TimelineError> for NewsroomError {
    fn from(err: TimelineError) -> Self {
        match err.field() {
            Some(field) => Self::validation(field, err.to_string()),
            None => Self::Timeline(err),
        }
    }
}

impl From<StoreError> for NewsroomError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => Self::NotFound(path),
            other => Self::Store(other),
        }
    }
}
