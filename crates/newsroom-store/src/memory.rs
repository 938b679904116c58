//! In-memory document store

use crate::document::{merge_documents, Document, DocumentChange, DocumentStore, Subscription};
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use newsroom_artifact::DocPath;
use tokio::sync::broadcast;

/// Default capacity of the change channel
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Concurrent in-memory [`DocumentStore`]
///
/// Cheap to share behind an `Arc`. Every write is broadcast to live
/// subscriptions.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    documents: DashMap<DocPath, Document>,
    changes: broadcast::Sender<DocumentChange>,
}

impl MemoryDocumentStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            documents: DashMap::new(),
            changes,
        }
    }

    /// Number of stored documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of live subscriptions
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Every document path under `prefix`, sorted
    #[must_use]
    pub fn paths_under(&self, prefix: &DocPath) -> Vec<DocPath> {
        let mut paths: Vec<DocPath> = self
            .documents
            .iter()
            .filter(|entry| prefix.is_prefix_of(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        paths.sort();
        paths
    }

    fn publish(&self, path: &DocPath, document: Document) {
        // No receivers is not an error
        let _ = self.changes.send(DocumentChange {
            path: path.clone(),
            document,
        });
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        if !path.is_document() {
            return Err(StoreError::expected_document(path));
        }
        Ok(self.documents.get(path).map(|entry| entry.value().clone()))
    }

    async fn set(&self, path: &DocPath, document: Document) -> Result<(), StoreError> {
        if !path.is_document() {
            return Err(StoreError::expected_document(path));
        }
        self.documents.insert(path.clone(), document.clone());
        self.publish(path, document);
        Ok(())
    }

    async fn set_merge(&self, path: &DocPath, document: Document) -> Result<(), StoreError> {
        if !path.is_document() {
            return Err(StoreError::expected_document(path));
        }
        let merged = {
            let mut entry = self.documents.entry(path.clone()).or_default();
            merge_documents(entry.value_mut(), document);
            entry.value().clone()
        };
        self.publish(path, merged);
        Ok(())
    }

    async fn list(&self, collection: &DocPath) -> Result<Vec<(String, Document)>, StoreError> {
        if collection.is_document() || collection.is_empty() {
            return Err(StoreError::expected_collection(collection));
        }
        let mut documents: Vec<(String, Document)> = self
            .documents
            .iter()
            .filter(|entry| entry.key().parent().as_ref() == Some(collection))
            .filter_map(|entry| {
                entry
                    .key()
                    .last()
                    .map(|id| (id.to_string(), entry.value().clone()))
            })
            .collect();
        documents.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(documents)
    }

    async fn subscribe(&self, path: &DocPath) -> Result<Subscription, StoreError> {
        Subscription::new(path, self.changes.subscribe())
    }
}
