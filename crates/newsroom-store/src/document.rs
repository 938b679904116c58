//! Hierarchical document store interface
//!
//! Documents are JSON objects addressed by [`DocPath`]. Collections are the
//! odd-length paths between them; they exist implicitly while they hold
//! documents.

use crate::error::StoreError;
use async_trait::async_trait;
use futures::stream::{self, Stream};
use newsroom_artifact::DocPath;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// A stored document
pub type Document = Map<String, Value>;

/// A write observed by a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub path: DocPath,
    /// Document after the write
    pub document: Document,
}

/// What a subscription listens to
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Document(DocPath),
    Collection(DocPath),
}

impl Target {
    fn matches(&self, path: &DocPath) -> bool {
        match self {
            Self::Document(doc) => doc == path,
            Self::Collection(collection) => path.parent().as_ref() == Some(collection),
        }
    }
}

/// Live feed of writes to a document or to the direct children of a
/// collection
///
/// Only writes after subscribing are delivered. Dropping the subscription
/// unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    target: Target,
    receiver: broadcast::Receiver<DocumentChange>,
}

impl Subscription {
    /// Filter a broadcast channel of changes down to `path`
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidPath`] for the root path.
    pub fn new(path: &DocPath, receiver: broadcast::Receiver<DocumentChange>) -> Result<Self, StoreError> {
        let target = if path.is_document() {
            Target::Document(path.clone())
        } else if path.is_empty() {
            return Err(StoreError::expected_collection(path));
        } else {
            Target::Collection(path.clone())
        };
        Ok(Self { target, receiver })
    }

    /// Next matching change, or `None` once the store is gone
    pub async fn next(&mut self) -> Option<DocumentChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if self.target.matches(&change.path) => return Some(change),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscription lagged, skipped {} changes", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Pending matching change without waiting
    pub fn try_next(&mut self) -> Option<DocumentChange> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) if self.target.matches(&change.path) => return Some(change),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }

    /// Convert into a stream of changes
    pub fn into_stream(self) -> impl Stream<Item = DocumentChange> + Send {
        stream::unfold(self, |mut sub| async move { sub.next().await.map(|change| (change, sub)) })
    }
}

/// Document database boundary
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Replace a document
    async fn set(&self, path: &DocPath, document: Document) -> Result<(), StoreError>;

    /// Merge fields into a document, creating it if absent
    ///
    /// Nested objects merge recursively; any other value replaces.
    async fn set_merge(&self, path: &DocPath, document: Document) -> Result<(), StoreError>;

    /// Documents directly inside a collection, ordered by id
    async fn list(&self, collection: &DocPath) -> Result<Vec<(String, Document)>, StoreError>;

    /// Watch a document or collection
    async fn subscribe(&self, path: &DocPath) -> Result<Subscription, StoreError>;
}

/// Recursively merge `patch` into `target`
pub fn merge_documents(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) = (target.get_mut(&key), &value) {
            merge_documents(existing, incoming.clone());
            continue;
        }
        target.insert(key, value);
    }
}

/// Serialize a value that must be a JSON object
///
/// # Errors
/// Returns [`StoreError::Serialization`] if serialization fails and
/// [`StoreError::Backend`] if the value is not an object.
pub fn to_document<T: Serialize + ?Sized>(path: &DocPath, value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Backend(format!(
            "document at {path} must be an object, got {other}"
        ))),
        Err(source) => Err(StoreError::Serialization {
            path: path.to_string(),
            source,
        }),
    }
}

/// Deserialize a stored document
///
/// # Errors
/// Returns [`StoreError::Serialization`] when the document has the wrong shape.
pub fn from_document<T: DeserializeOwned>(path: &DocPath, document: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(document)).map_err(|source| StoreError::Serialization {
        path: path.to_string(),
        source,
    })
}

/// Typed helpers over any [`DocumentStore`]
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Read and deserialize a document
    async fn get_as<T: DeserializeOwned + Send>(&self, path: &DocPath) -> Result<Option<T>, StoreError> {
        match self.get(path).await? {
            Some(document) => from_document(path, document).map(Some),
            None => Ok(None),
        }
    }

    /// Read a document that must exist
    async fn require_as<T: DeserializeOwned + Send>(&self, path: &DocPath) -> Result<T, StoreError> {
        self.get_as(path)
            .await?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    /// Serialize and replace a document
    async fn set_as<T: Serialize + Sync + ?Sized>(&self, path: &DocPath, value: &T) -> Result<(), StoreError> {
        let document = to_document(path, value)?;
        self.set(path, document).await
    }

    /// Serialize and merge into a document
    async fn merge_as<T: Serialize + Sync + ?Sized>(&self, path: &DocPath, value: &T) -> Result<(), StoreError> {
        let document = to_document(path, value)?;
        self.set_merge(path, document).await
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
