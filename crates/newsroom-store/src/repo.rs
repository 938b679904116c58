//! Typed repositories over the newsroom document tree
//!
//! ```text
//! newsroom/{project}
//!   folders/{folder}
//!     blocks/{block}
//!       table-data/karma-general-table
//!       serpentine-data/config
//!       query-results/{result}
//!     snapshots/{snapshot}
//!       blocks/{block}/...           (frozen copy, same shape as live)
//!       attestations/{id}
//!       attestations/programmatic-comparison
//! ```
//!
//! Blob paths mirror the project and folder ids:
//! `{project}/{folder}/icf/{snapshot}.html` and
//! `{project}/{folder}/snapshots/{snapshot}/archive.json`.

use newsroom_artifact::DocPath;

/// Root collection of all projects
pub const ROOT_COLLECTION: &str = "newsroom";

/// Per-block sub-collections copied into archives
pub const BLOCK_SUB_COLLECTIONS: [&str; 3] = ["table-data", "serpentine-data", "query-results"];

/// Document id of the general table inside `table-data`
pub const GENERAL_TABLE_DOC: &str = "karma-general-table";

/// Document id of the serpentine settings inside `serpentine-data`
pub const SERPENTINE_CONFIG_DOC: &str = "config";

/// Document id of the comparison record inside `attestations`
pub const COMPARISON_DOC: &str = "programmatic-comparison";

/// A project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRepo {
    project_id: String,
}

impl ProjectRepo {
    /// Create new repo
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }

    /// Project id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.project_id
    }

    /// `newsroom/{project}`
    #[must_use]
    pub fn path(&self) -> DocPath {
        DocPath::new(vec![ROOT_COLLECTION.to_string(), self.project_id.clone()])
    }

    /// Folder within this project
    #[must_use]
    pub fn folder(&self, folder_id: impl Into<String>) -> FolderRepo {
        FolderRepo {
            project_id: self.project_id.clone(),
            folder_id: folder_id.into(),
        }
    }
}

/// A folder of blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRepo {
    project_id: String,
    folder_id: String,
}

impl FolderRepo {
    /// Create new repo
    #[must_use]
    pub fn new(project_id: impl Into<String>, folder_id: impl Into<String>) -> Self {
        ProjectRepo::new(project_id).folder(folder_id)
    }

    /// Project id
    #[inline]
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Folder id
    #[inline]
    #[must_use]
    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    /// `newsroom/{project}/folders/{folder}`
    #[must_use]
    pub fn path(&self) -> DocPath {
        ProjectRepo::new(self.project_id.clone())
            .path()
            .extend(&["folders", self.folder_id.as_str()])
    }

    /// Live blocks collection
    #[must_use]
    pub fn blocks(&self) -> DocPath {
        self.path().child("blocks")
    }

    /// Live block
    #[must_use]
    pub fn block(&self, block_id: impl Into<String>) -> BlockRepo {
        BlockRepo {
            path: self.blocks().child(block_id),
        }
    }

    /// Snapshot manifests collection
    #[must_use]
    pub fn snapshots(&self) -> DocPath {
        self.path().child("snapshots")
    }

    /// One archived snapshot
    #[must_use]
    pub fn snapshot(&self, snapshot_id: impl Into<String>) -> SnapshotRepo {
        SnapshotRepo {
            folder: self.clone(),
            snapshot_id: snapshot_id.into(),
        }
    }

    /// Blob path of an ICF document
    #[must_use]
    pub fn icf_blob_path(&self, snapshot_id: &str) -> String {
        format!("{}/{}/icf/{}.html", self.project_id, self.folder_id, snapshot_id)
    }

    /// Blob path of an archive bundle
    #[must_use]
    pub fn archive_blob_path(&self, snapshot_id: &str) -> String {
        format!(
            "{}/{}/snapshots/{}/archive.json",
            self.project_id, self.folder_id, snapshot_id
        )
    }
}

/// A block, live or archived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRepo {
    path: DocPath,
}

impl BlockRepo {
    /// Block document
    #[inline]
    #[must_use]
    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// Block id
    #[must_use]
    pub fn id(&self) -> &str {
        self.path.last().unwrap_or_default()
    }

    /// Another block in the same blocks collection
    #[must_use]
    pub fn sibling(&self, block_id: impl Into<String>) -> BlockRepo {
        let collection = self.path.parent().unwrap_or_default();
        BlockRepo {
            path: collection.child(block_id),
        }
    }

    /// One of the block's sub-collections
    #[must_use]
    pub fn sub_collection(&self, name: &str) -> DocPath {
        self.path.child(name)
    }

    /// General table document
    #[must_use]
    pub fn general_table(&self) -> DocPath {
        self.path.extend(&["table-data", GENERAL_TABLE_DOC])
    }

    /// Serpentine settings document
    #[must_use]
    pub fn serpentine_config(&self) -> DocPath {
        self.path.extend(&["serpentine-data", SERPENTINE_CONFIG_DOC])
    }

    /// Query results collection
    #[must_use]
    pub fn query_results(&self) -> DocPath {
        self.path.child("query-results")
    }

    /// One query result
    #[must_use]
    pub fn query_result(&self, result_id: impl Into<String>) -> DocPath {
        self.query_results().child(result_id)
    }
}

/// An archived snapshot of a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRepo {
    folder: FolderRepo,
    snapshot_id: String,
}

impl SnapshotRepo {
    /// Owning folder
    #[inline]
    #[must_use]
    pub fn folder(&self) -> &FolderRepo {
        &self.folder
    }

    /// Snapshot id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.snapshot_id
    }

    /// Manifest document
    #[must_use]
    pub fn manifest(&self) -> DocPath {
        self.folder.snapshots().child(self.snapshot_id.clone())
    }

    /// Archived blocks collection
    #[must_use]
    pub fn blocks(&self) -> DocPath {
        self.manifest().child("blocks")
    }

    /// Archived copy of a block
    #[must_use]
    pub fn block(&self, block_id: impl Into<String>) -> BlockRepo {
        BlockRepo {
            path: self.blocks().child(block_id),
        }
    }

    /// Attestations collection
    #[must_use]
    pub fn attestations(&self) -> DocPath {
        self.manifest().child("attestations")
    }

    /// One attestation record
    #[must_use]
    pub fn attestation(&self, id: impl Into<String>) -> DocPath {
        self.attestations().child(id)
    }

    /// The single comparison record
    #[must_use]
    pub fn comparison(&self) -> DocPath {
        self.attestation(COMPARISON_DOC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder() -> FolderRepo {
        FolderRepo::new("p1", "f1")
    }

    #[test]
    fn live_block_paths() {
        let block = folder().block("b1");
        assert_eq!(block.path().to_string(), "newsroom/p1/folders/f1/blocks/b1");
        assert_eq!(block.id(), "b1");
        assert_eq!(
            block.general_table().to_string(),
            "newsroom/p1/folders/f1/blocks/b1/table-data/karma-general-table"
        );
        assert_eq!(
            block.serpentine_config().to_string(),
            "newsroom/p1/folders/f1/blocks/b1/serpentine-data/config"
        );
        assert!(block.general_table().is_document());
        assert!(!block.query_results().is_document());
    }

    #[test]
    fn snapshot_paths() {
        let snap = folder().snapshot("icf-1-abc");
        assert_eq!(snap.manifest().to_string(), "newsroom/p1/folders/f1/snapshots/icf-1-abc");
        assert_eq!(
            snap.block("b1").general_table().to_string(),
            "newsroom/p1/folders/f1/snapshots/icf-1-abc/blocks/b1/table-data/karma-general-table"
        );
        assert_eq!(
            snap.comparison().to_string(),
            "newsroom/p1/folders/f1/snapshots/icf-1-abc/attestations/programmatic-comparison"
        );
    }

    #[test]
    fn live_block_rebases_into_snapshot() {
        let folder = folder();
        let live = folder.block("b1").general_table();
        let archived = live.rebase(&folder.blocks(), &folder.snapshot("s").blocks()).unwrap();
        assert_eq!(archived, folder.snapshot("s").block("b1").general_table());
    }

    #[test]
    fn sibling_stays_in_same_tree() {
        let archived = folder().snapshot("s").block("serp");
        assert_eq!(archived.sibling("table"), folder().snapshot("s").block("table"));
    }

    #[test]
    fn blob_paths() {
        assert_eq!(folder().icf_blob_path("s1"), "p1/f1/icf/s1.html");
        assert_eq!(folder().archive_blob_path("s1"), "p1/f1/snapshots/s1/archive.json");
    }
}
