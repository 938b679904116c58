//! Snapshot archive
//!
//! Freezes a folder at a snapshot id: a manifest document, a deep copy of
//! every block under `snapshots/{id}/blocks`, and a JSON bundle in blob
//! storage. The document copy and the blob copy are attempted
//! independently and reported per side.

use crate::context::NewsroomContext;
use crate::error::{NewsroomError, Result};
use newsroom_store::{
    BlockRepo, Document, DocumentStoreExt, FolderRepo, SnapshotRepo, StoreError, BLOCK_SUB_COLLECTIONS,
    JSON_CONTENT_TYPE,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Manifest stored at `snapshots/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotManifest {
    pub snapshot_id: String,
    pub content_hash: String,
    pub icf_url: String,
    pub project_id: String,
    pub folder_id: String,
    /// Serpentine block the ICF was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_block_id: Option<String>,
    #[serde(default)]
    pub block_ids: Vec<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Set once the blob bundle is uploaded
    #[serde(default)]
    pub storage_archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
}

/// What to archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRequest {
    pub snapshot_id: String,
    pub content_hash: String,
    pub icf_url: String,
    pub source_block_id: Option<String>,
    pub created_by: Option<String>,
}

/// Per-side result of an archive run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOutcome {
    /// Both sides succeeded
    pub success: bool,
    pub firestore_success: bool,
    pub storage_success: bool,
}

impl ArchiveOutcome {
    fn new(firestore_success: bool, storage_success: bool) -> Self {
        Self {
            success: firestore_success && storage_success,
            firestore_success,
            storage_success,
        }
    }
}

/// A block read from the live folder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCopy {
    pub document: Option<Document>,
    /// Sub-collection name, then document id
    pub collections: BTreeMap<String, BTreeMap<String, Document>>,
}

/// Blob-side bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveBundle {
    pub manifest: SnapshotManifest,
    pub blocks: BTreeMap<String, BlockCopy>,
}

/// Writes snapshot archives
#[derive(Debug, Clone)]
pub struct SnapshotArchive {
    ctx: NewsroomContext,
}

impl SnapshotArchive {
    /// Create new archiver
    #[must_use]
    pub fn new(ctx: NewsroomContext) -> Self {
        Self { ctx }
    }

    async fn read_block(&self, block: &BlockRepo) -> Result<BlockCopy, StoreError> {
        let documents = self.ctx.documents();
        let mut copy = BlockCopy {
            document: documents.get(block.path()).await?,
            collections: BTreeMap::new(),
        };
        for name in BLOCK_SUB_COLLECTIONS {
            let entries = documents.list(&block.sub_collection(name)).await?;
            if !entries.is_empty() {
                copy.collections.insert(name.to_string(), entries.into_iter().collect());
            }
        }
        Ok(copy)
    }

    /// Read every live block of the folder
    ///
    /// # Errors
    /// Returns an error if the live folder cannot be read.
    pub async fn read_folder(&self, folder: &FolderRepo) -> Result<BTreeMap<String, BlockCopy>> {
        let mut blocks = BTreeMap::new();
        for (block_id, _) in self.ctx.documents().list(&folder.blocks()).await? {
            let copy = self.read_block(&folder.block(block_id.clone())).await?;
            blocks.insert(block_id, copy);
        }
        Ok(blocks)
    }

    async fn write_documents(
        &self,
        snapshot: &SnapshotRepo,
        manifest: &SnapshotManifest,
        blocks: &BTreeMap<String, BlockCopy>,
    ) -> Result<(), StoreError> {
        let documents = self.ctx.documents();
        documents.set_as(&snapshot.manifest(), manifest).await?;
        for (block_id, copy) in blocks {
            let target = snapshot.block(block_id.clone());
            if let Some(document) = &copy.document {
                documents.set(target.path(), document.clone()).await?;
            }
            for (name, entries) in &copy.collections {
                let collection = target.sub_collection(name);
                for (id, document) in entries {
                    documents.set(&collection.child(id.clone()), document.clone()).await?;
                }
            }
        }
        Ok(())
    }

    async fn upload_bundle(&self, folder: &FolderRepo, bundle: &ArchiveBundle) -> anyhow::Result<String> {
        let bytes = serde_json::to_vec(bundle)?;
        let path = folder.archive_blob_path(&bundle.manifest.snapshot_id);
        Ok(self.ctx.blobs().upload(&path, bytes, JSON_CONTENT_TYPE).await?)
    }

    /// Archive the folder under `request.snapshot_id`
    ///
    /// Failures while writing either copy are logged and reported in the
    /// outcome; the already uploaded ICF is never touched.
    ///
    /// # Errors
    /// Returns an error only if the live folder cannot be read.
    pub async fn archive(&self, folder: &FolderRepo, request: ArchiveRequest) -> Result<ArchiveOutcome> {
        let blocks = self.read_folder(folder).await?;
        let snapshot = folder.snapshot(request.snapshot_id.clone());
        let mut manifest = SnapshotManifest {
            snapshot_id: request.snapshot_id,
            content_hash: request.content_hash,
            icf_url: request.icf_url,
            project_id: folder.project_id().to_string(),
            folder_id: folder.folder_id().to_string(),
            source_block_id: request.source_block_id,
            block_ids: blocks.keys().cloned().collect(),
            created_at: self.ctx.now().to_rfc3339(),
            created_by: request.created_by,
            storage_archived: false,
            archive_url: None,
        };

        let firestore_success = match self.write_documents(&snapshot, &manifest, &blocks).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Document archive of {} failed: {}", snapshot.id(), e);
                false
            }
        };

        let bundle = ArchiveBundle {
            manifest: manifest.clone(),
            blocks,
        };
        let storage_success = match self.upload_bundle(folder, &bundle).await {
            Ok(url) => {
                manifest.storage_archived = true;
                manifest.archive_url = Some(url);
                true
            }
            Err(e) => {
                tracing::warn!("Storage archive of {} failed: {:#}", snapshot.id(), e);
                false
            }
        };

        if firestore_success && storage_success {
            let mut patch = Map::new();
            patch.insert("storageArchived".to_string(), Value::Bool(true));
            patch.insert(
                "archiveUrl".to_string(),
                manifest.archive_url.clone().map_or(Value::Null, Value::String),
            );
            if let Err(e) = self.ctx.documents().set_merge(&snapshot.manifest(), patch).await {
                tracing::warn!("Could not mark {} as storage archived: {}", snapshot.id(), e);
            }
        }

        let outcome = ArchiveOutcome::new(firestore_success, storage_success);
        tracing::info!(
            "Archived {} ({} blocks): firestore={}, storage={}",
            snapshot.id(),
            manifest.block_ids.len(),
            outcome.firestore_success,
            outcome.storage_success
        );
        Ok(outcome)
    }
}

/// Manifest of an archived snapshot
///
/// # Errors
/// Returns [`NewsroomError::NotFound`] if the snapshot does not exist.
pub async fn load_manifest(ctx: &NewsroomContext, snapshot: &SnapshotRepo) -> Result<SnapshotManifest> {
    ctx.documents()
        .get_as(&snapshot.manifest())
        .await?
        .ok_or_else(|| NewsroomError::NotFound(format!("snapshot {}", snapshot.id())))
}

/// All snapshot manifests of a folder, newest first
///
/// # Errors
/// Returns an error if the store fails.
pub async fn list_snapshots(ctx: &NewsroomContext, folder: &FolderRepo) -> Result<Vec<SnapshotManifest>> {
    let collection = folder.snapshots();
    let mut manifests = Vec::new();
    for (id, document) in ctx.documents().list(&collection).await? {
        match newsroom_store::from_document::<SnapshotManifest>(&collection.child(id.clone()), document) {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => tracing::warn!("Skipping malformed manifest {}: {}", id, e),
        }
    }
    manifests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.snapshot_id.cmp(&a.snapshot_id)));
    Ok(manifests)
}
