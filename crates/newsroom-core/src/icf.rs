//! Immutable Canonical File builder
//!
//! Builds a content-addressed snapshot of a serpentine block: a JSON-LD
//! graph of the milestones, general table and karma query, hashed over its
//! canonical form, wrapped in a self-contained HTML page and uploaded to
//! blob storage. Every step awaits the previous one.

use crate::archive::{ArchiveOutcome, ArchiveRequest, SnapshotArchive};
use crate::context::NewsroomContext;
use crate::error::Result;
use crate::html::{render_icf_html, IcfPage, MilestoneEntry};
use crate::images::{ImageFetcher, ImageInliner};
use crate::karma::{latest_folder_query_result, KarmaQueryResult};
use crate::raster::{rasterize, Rasterizer, RenderSurface};
use crate::rows::RowService;
use crate::serpentine::SerpentineBlock;
use chrono::{DateTime, SecondsFormat, Utc};
use newsroom_artifact::{Artifact, ContentHash, JsonLdArtifact, JsonLdGraph, JsonLdNode};
use newsroom_store::{FolderRepo, HTML_CONTENT_TYPE};
use newsroom_timeline::{
    find_row_by_title, sort_attestation_rows, LayoutParams, MilestoneRow, MonthsToShow, SourceFilter,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Alphabet of the random snapshot id suffix
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random snapshot id suffix
const SUFFIX_LEN: usize = 9;

pub use newsroom_artifact::{KARMA_QUERY_NODE_ID, SNAPSHOT_NODE_ID};

/// `icf-{unixMillis}-{9 base36 chars}`
#[must_use]
pub fn generate_snapshot_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    format!("icf-{}-{}", now.timestamp_millis(), suffix)
}

/// Inputs of the JSON-LD graph
#[derive(Debug, Clone, Copy)]
pub struct GraphInput<'a> {
    pub project_id: &'a str,
    pub folder_id: &'a str,
    pub block_id: &'a str,
    pub source_block_id: &'a str,
    pub layout: &'a LayoutParams,
    pub months_to_show: MonthsToShow,
    /// Volatile, excluded from the hash
    pub generated_at: &'a str,
    /// General table rows in canonical order
    pub rows: &'a [MilestoneRow],
    pub milestones: &'a [MilestoneEntry],
    pub karma: Option<&'a KarmaQueryResult>,
}

fn graph_context() -> Value {
    json!({
        "@vocab": "https://schema.org/",
        "karma": "https://karmahq.xyz/ns#",
    })
}

/// `#snapshot` and `#sourceQuery`, without id or hash
fn skeleton(input: &GraphInput<'_>) -> Result<JsonLdGraph> {
    let mut graph = JsonLdGraph::new(graph_context());
    graph.push(
        JsonLdNode::new(SNAPSHOT_NODE_ID, "Dataset")
            .with("name", "Karma Serpentine snapshot")
            .with("projectId", input.project_id)
            .with("folderId", input.folder_id)
            .with("blockId", input.block_id)
            .with("sourceBlockId", input.source_block_id)
            .with("layout", serde_json::to_value(input.layout)?)
            .with("monthsToShow", input.months_to_show.get())
            .with("generatedAt", input.generated_at),
    );
    graph.push(
        JsonLdNode::new("#sourceQuery", "karma:SourceQuery")
            .with("sourceBlockId", input.source_block_id)
            .with("filter", serde_json::to_value(SourceFilter::default())?),
    );
    Ok(graph)
}

fn milestone_node(entry: &MilestoneEntry) -> JsonLdNode {
    let row = &entry.row;
    let mut node = JsonLdNode::new(format!("#milestone-{}", entry.node_index), "karma:Milestone")
        .with("nodeIndex", entry.node_index)
        .with("month", entry.month.as_str())
        .with("isExtraNode", entry.is_extra_node)
        .with("date", row.official_date.as_str())
        .with("title", row.title.as_str())
        .with("summary", row.summary.as_str())
        .with("slug", row.slug.as_str())
        .with("status", row.status.as_str())
        .with("proofs", row.proof_urls());
    if let Some(notes) = row.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        node.set("notes", notes);
    }
    if !entry.images.is_empty() {
        let digests: Vec<Value> = entry
            .images
            .iter()
            .map(|i| json!({ "slot": i.slot, "sha256": i.image.digest.to_string() }))
            .collect();
        node.set("imageDigests", digests);
    }
    node
}

/// Assemble the full graph (steps 1 to 5)
///
/// # Errors
/// Returns an error if a value cannot be serialized.
pub fn assemble_graph(input: &GraphInput<'_>) -> Result<JsonLdGraph> {
    let mut graph = skeleton(input)?;
    for entry in input.milestones {
        graph.push(milestone_node(entry));
    }
    graph.push(
        JsonLdNode::new("#generalTable", "karma:GeneralTable")
            .with("rowCount", input.rows.len())
            .with("rows", serde_json::to_value(input.rows)?),
    );
    if let Some(karma) = input.karma {
        graph.push(
            JsonLdNode::new(KARMA_QUERY_NODE_ID, "karma:KarmaQuery")
                .with("slugs", karma.slugs.clone())
                .with("queryTimestamp", karma.timestamp.as_str())
                .with("success", karma.success)
                .with("results", serde_json::to_value(&karma.results)?),
        );
    }
    Ok(graph)
}

/// Hash a graph and splice its id and hash into `#snapshot`
///
/// # Errors
/// Returns an error if the graph is invalid or the splice changed hashed
/// content.
pub fn seal_graph(graph: JsonLdGraph, snapshot_id: &str) -> Result<(ContentHash, JsonLdGraph)> {
    let mut artifact = Artifact::<JsonLdArtifact>::new(graph)?;
    let hash = *artifact.hash();
    artifact.update(|g| {
        if let Some(node) = g.node_mut(SNAPSHOT_NODE_ID) {
            node.set("snapshotId", snapshot_id);
            node.set("contentHash", hash.to_string());
        }
    })?;
    Ok((hash, artifact.into_content()))
}

/// A built and uploaded ICF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcfSnapshot {
    pub snapshot_id: String,
    pub content_hash: ContentHash,
    /// Public URL of the HTML document
    pub url: String,
    #[serde(rename = "jsonLdGraph")]
    pub graph: JsonLdGraph,
    pub generated_at: String,
    pub block_id: String,
    pub source_block_id: String,
    pub project_id: String,
    pub folder_id: String,
}

impl IcfSnapshot {
    /// Recompute the hash from the stored graph
    #[must_use]
    pub fn verify(&self) -> bool {
        Artifact::<JsonLdArtifact>::new(self.graph.clone()).is_ok_and(|a| *a.hash() == self.content_hash)
    }
}

/// An ICF together with its archive outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedSnapshot {
    pub snapshot: IcfSnapshot,
    pub archive: ArchiveOutcome,
}

/// Builds ICF documents
#[derive(Clone)]
pub struct SnapshotBuilder {
    ctx: NewsroomContext,
    inliner: ImageInliner,
    rasterizer: Arc<dyn Rasterizer>,
}

impl std::fmt::Debug for SnapshotBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotBuilder")
            .field("inliner", &self.inliner)
            .finish_non_exhaustive()
    }
}

impl SnapshotBuilder {
    /// Create new builder
    #[must_use]
    pub fn new(ctx: NewsroomContext, fetcher: Arc<dyn ImageFetcher>, rasterizer: Arc<dyn Rasterizer>) -> Self {
        let inliner = ImageInliner::new(fetcher, ctx.config().image_cache_capacity);
        Self {
            ctx,
            inliner,
            rasterizer,
        }
    }

    /// Bind every data node to its general table row and inline its images
    pub async fn collect_milestones(&self, serpentine: &SerpentineBlock, rows: &[MilestoneRow]) -> Vec<MilestoneEntry> {
        let mut entries = Vec::new();
        for (node_index, node) in serpentine.layout().data_nodes() {
            let Some(node_row) = node.row.as_ref() else {
                continue;
            };
            let row = match find_row_by_title(&node_row.title, rows) {
                Some(matched) => matched.clone(),
                None => {
                    tracing::debug!("No general table row for node {} ({:?})", node_index, node_row.title);
                    node_row.clone()
                }
            };
            let images = match row.images.as_ref() {
                Some(images) => self.inliner.inline_all(images).await,
                None => Vec::new(),
            };
            entries.push(MilestoneEntry {
                node_index,
                month: node.month.clone(),
                is_extra_node: node.is_extra_node,
                row,
                images,
            });
        }
        entries
    }

    /// Build the ICF and upload its HTML
    ///
    /// # Errors
    /// Returns an error if the source table is missing, rendering fails or
    /// the upload fails.
    pub async fn build(
        &self,
        folder: &FolderRepo,
        serpentine: &SerpentineBlock,
        surface: &dyn RenderSurface,
    ) -> Result<IcfSnapshot> {
        let generated = self.ctx.now();
        let generated_at = generated.to_rfc3339_opts(SecondsFormat::Millis, true);
        let source_block_id = serpentine.config().source_block_id.clone();

        let rows = RowService::new(self.ctx.clone())
            .require_rows(&serpentine.block().sibling(source_block_id.clone()))
            .await?;
        let rows = sort_attestation_rows(&rows);
        let karma = latest_folder_query_result(&self.ctx, folder).await?;
        let milestones = self.collect_milestones(serpentine, &rows).await;

        let graph = assemble_graph(&GraphInput {
            project_id: folder.project_id(),
            folder_id: folder.folder_id(),
            block_id: serpentine.block().id(),
            source_block_id: &source_block_id,
            layout: &serpentine.layout().params,
            months_to_show: serpentine.months_to_show(),
            generated_at: &generated_at,
            rows: &rows,
            milestones: &milestones,
            karma: karma.as_ref(),
        })?;

        let preview = rasterize(self.rasterizer.as_ref(), surface, &self.ctx.config().raster).await?;

        let snapshot_id = generate_snapshot_id(generated);
        let (content_hash, graph) = seal_graph(graph, &snapshot_id)?;

        let title = format!("Milestone report {}/{}", folder.project_id(), folder.folder_id());
        let html = render_icf_html(&IcfPage {
            title: &title,
            snapshot_id: &snapshot_id,
            content_hash: &content_hash.to_string(),
            generated_at: &generated_at,
            graph: &graph,
            milestones: &milestones,
            preview: Some(&preview.data_uri),
            rows: &rows,
            karma: karma.as_ref(),
        });

        let url = self
            .ctx
            .blobs()
            .upload(&folder.icf_blob_path(&snapshot_id), html.into_bytes(), HTML_CONTENT_TYPE)
            .await?;
        tracing::info!(
            "Built ICF {} for block {} ({} milestones, hash {})",
            snapshot_id,
            serpentine.block().id(),
            milestones.len(),
            content_hash.short()
        );

        Ok(IcfSnapshot {
            snapshot_id,
            content_hash,
            url,
            graph,
            generated_at,
            block_id: serpentine.block().id().to_string(),
            source_block_id,
            project_id: folder.project_id().to_string(),
            folder_id: folder.folder_id().to_string(),
        })
    }

    /// Build the ICF, then archive the folder under its snapshot id
    ///
    /// A failed archive side is reported in the outcome; the ICF stays
    /// uploaded.
    ///
    /// # Errors
    /// Returns an error if building fails or the live folder cannot be read.
    pub async fn publish(
        &self,
        folder: &FolderRepo,
        serpentine: &SerpentineBlock,
        surface: &dyn RenderSurface,
        created_by: Option<String>,
    ) -> Result<PublishedSnapshot> {
        let snapshot = self.build(folder, serpentine, surface).await?;
        let archive = SnapshotArchive::new(self.ctx.clone())
            .archive(
                folder,
                ArchiveRequest {
                    snapshot_id: snapshot.snapshot_id.clone(),
                    content_hash: snapshot.content_hash.to_string(),
                    icf_url: snapshot.url.clone(),
                    source_block_id: Some(snapshot.block_id.clone()),
                    created_by,
                },
            )
            .await?;
        if !archive.success {
            tracing::warn!(
                "ICF {} uploaded but archive incomplete (firestore={}, storage={})",
                snapshot.snapshot_id,
                archive.firestore_success,
                archive.storage_success
            );
        }
        Ok(PublishedSnapshot { snapshot, archive })
    }
}
