//! Newsroom Storage
//!
//! Storage boundaries of the snapshot pipeline.
//!
//! - [`DocumentStore`]: hierarchical JSON documents with merge writes and
//!   live subscriptions
//! - [`BlobStore`]: uploaded bytes with public URLs
//! - [`repo`]: typed paths for projects, folders, blocks and snapshots
//!
//! Stores are created once at startup and shared as `Arc<dyn ...>`.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod blob;
mod document;
mod error;
mod memory;
pub mod repo;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore, StoredBlob, HTML_CONTENT_TYPE, JSON_CONTENT_TYPE};
pub use document::{
    from_document, merge_documents, to_document, Document, DocumentChange, DocumentStore, DocumentStoreExt,
    Subscription,
};
pub use error::StoreError;
pub use memory::MemoryDocumentStore;
pub use repo::{BlockRepo, FolderRepo, ProjectRepo, SnapshotRepo, BLOCK_SUB_COLLECTIONS, COMPARISON_DOC};
