//! Artifact type trait and content-addressed container
//!
//! Defines the [`ArtifactType`] trait for content-addressed typed artifacts.
//! This is a sealed trait - only crate-internal types can implement it.

use crate::hash::ContentHash;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Trait for artifact types
///
/// This trait is **sealed** - only types defined within this crate can implement it.
///
/// # Type Safety
/// - `hash` must be deterministic: the same content always yields the same hash
/// - `TYPE_ID` must be globally unique
pub trait ArtifactType: Send + Sync + 'static + Debug + private::Sealed {
    /// The content type for this artifact
    type Content: Send + Sync + 'static + Debug + Clone + PartialEq;

    /// Compute content hash
    fn hash(content: &Self::Content) -> ContentHash;

    /// Artifact type identifier
    const TYPE_ID: &'static str;

    /// Validate content invariants
    ///
    /// Default implementation always succeeds.
    ///
    /// # Errors
    /// Returns error if content violates invariants
    fn validate_content(_content: &Self::Content) -> Result<(), ArtifactError> {
        Ok(())
    }
}

#[doc(hidden)]
pub mod private {
    /// Sealed trait marker
    pub trait Sealed {}
}

/// Errors related to artifact operations
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Content invariant violation
    #[error("content invariant violated: {0}")]
    InvariantViolation(String),

    /// Hash mismatch (integrity check failed)
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },
}

/// Content-addressed typed artifact
///
/// # Invariants
/// - `hash` is always `T::hash(&content)` at construction time
/// - Content only changes through [`Artifact::update`], which re-verifies
///   that the hash is unaffected
#[derive(Debug)]
pub struct Artifact<T: ArtifactType> {
    hash: ContentHash,
    content: T::Content,
    _phantom: PhantomData<T>,
}

impl<T: ArtifactType> Clone for Artifact<T> {
    fn clone(&self) -> Self {
        Self {
            hash: self.hash,
            content: self.content.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T: ArtifactType> Artifact<T> {
    /// Create new artifact (computes hash and validates)
    ///
    /// # Errors
    /// Returns error if content validation fails
    pub fn new(content: T::Content) -> Result<Self, ArtifactError> {
        T::validate_content(&content)?;
        let hash = T::hash(&content);
        Ok(Self {
            hash,
            content,
            _phantom: PhantomData,
        })
    }

    /// Content hash
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Reference to content
    #[inline]
    #[must_use]
    pub fn content(&self) -> &T::Content {
        &self.content
    }

    /// Move content out of artifact
    #[inline]
    #[must_use]
    pub fn into_content(self) -> T::Content {
        self.content
    }

    /// Verify integrity (useful after deserialization)
    #[inline]
    #[must_use]
    pub fn verify(&self) -> bool {
        self.hash == T::hash(&self.content)
    }

    /// Mutate content in a way that must not change the hash
    ///
    /// Used to splice identifiers that are excluded from hashing back into
    /// the content after the hash has been fixed.
    ///
    /// # Errors
    /// Returns [`ArtifactError::HashMismatch`] and leaves the artifact
    /// unchanged if the edit altered hashed content.
    pub fn update<F>(&mut self, f: F) -> Result<(), ArtifactError>
    where
        F: FnOnce(&mut T::Content),
    {
        let mut next = self.content.clone();
        f(&mut next);
        let actual = T::hash(&next);
        if actual != self.hash {
            return Err(ArtifactError::HashMismatch {
                expected: self.hash,
                actual,
            });
        }
        self.content = next;
        Ok(())
    }

    /// Get type identifier
    #[inline]
    #[must_use]
    pub fn type_id() -> &'static str {
        T::TYPE_ID
    }
}
