//! Storage errors

use newsroom_artifact::DocPath;

/// Errors from document and blob stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing stored at the path
    #[error("not found: {0}")]
    NotFound(String),

    /// Path has the wrong shape for the operation
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// Stored or supplied value is not the expected shape
    #[error("serialization error at {path}: {source}")]
    Serialization {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Backend refused or failed the operation
    #[error("backend error: {0}")]
    Backend(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Document path expected
    #[must_use]
    pub fn expected_document(path: &DocPath) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: "expected a document path (even number of segments)",
        }
    }

    /// Collection path expected
    #[must_use]
    pub fn expected_collection(path: &DocPath) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: "expected a collection path (odd number of segments)",
        }
    }

    /// True for [`StoreError::NotFound`]
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
