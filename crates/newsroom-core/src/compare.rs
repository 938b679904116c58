//! Comparison bookkeeping
//!
//! The diff itself is computed by an external function. This module
//! gathers the archived and live states, calls it, and keeps exactly one
//! comparison record per snapshot.

use crate::context::NewsroomContext;
use crate::error::{NewsroomError, Result};
use crate::karma::{latest_folder_query_result, latest_query_result, KarmaQueryResult, KARMA_QUERY_BLOCK_TYPE};
use crate::rows::RowService;
use crate::serpentine::SerpentineConfig;
use async_trait::async_trait;
use newsroom_store::{BlockRepo, DocumentStoreExt, SnapshotRepo};
use newsroom_timeline::{sort_attestation_rows, MilestoneRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How serious a difference is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

/// Area a difference belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DifferenceCategory {
    Milestone,
    GeneralTable,
    KarmaQuery,
    Metadata,
}

impl DifferenceCategory {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Milestone => "milestone",
            Self::GeneralTable => "generalTable",
            Self::KarmaQuery => "karmaQuery",
            Self::Metadata => "metadata",
        }
    }
}

/// One field-level difference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Difference {
    pub category: DifferenceCategory,
    pub field: String,
    pub icf_value: Value,
    pub firestore_value: Value,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

/// Outcome of a comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    /// `0..=100`
    pub similarity: f64,
    #[serde(rename = "match")]
    pub is_match: bool,
    pub differences: Vec<Difference>,
    pub summary: String,
}

/// One side of a comparison
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSide {
    /// General table rows in canonical order
    pub general_table: Vec<MilestoneRow>,
    pub serpentine: Option<SerpentineConfig>,
    pub karma_query: Option<KarmaQueryResult>,
}

/// Input handed to the comparison function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRequest {
    pub project_id: String,
    pub folder_id: String,
    pub snapshot_id: String,
    pub content_hash: Option<String>,
    pub archived: ComparisonSide,
    pub live: ComparisonSide,
}

/// The external diff
#[async_trait]
pub trait ComparisonFunction: Send + Sync {
    async fn compare(&self, request: &ComparisonRequest) -> anyhow::Result<ComparisonResult>;
}

/// Stored comparison record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRecord {
    #[serde(flatten)]
    pub result: ComparisonResult,
    pub compared_at: String,
}

/// Runs comparisons and keeps their records
#[derive(Clone)]
pub struct ComparisonService {
    ctx: NewsroomContext,
    function: std::sync::Arc<dyn ComparisonFunction>,
}

impl std::fmt::Debug for ComparisonService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonService").finish_non_exhaustive()
    }
}

impl ComparisonService {
    /// Create new service
    #[must_use]
    pub fn new(ctx: NewsroomContext, function: std::sync::Arc<dyn ComparisonFunction>) -> Self {
        Self { ctx, function }
    }

    /// Archived and live states of a snapshot's folder
    ///
    /// # Errors
    /// Returns [`NewsroomError::NotFound`] if the snapshot has no manifest.
    pub async fn gather(&self, snapshot: &SnapshotRepo) -> Result<ComparisonRequest> {
        let manifest: crate::archive::SnapshotManifest =
            self.ctx.documents().require_as(&snapshot.manifest()).await?;
        let folder = snapshot.folder();
        let source = manifest.source_block_id.as_deref().unwrap_or_default();

        let archived = self
            .side(
                source,
                |id| snapshot.block(id),
                self.archived_karma(snapshot, &manifest.block_ids).await?,
            )
            .await?;
        let live = self
            .side(source, |id| folder.block(id), latest_folder_query_result(&self.ctx, folder).await?)
            .await?;

        Ok(ComparisonRequest {
            project_id: folder.project_id().to_string(),
            folder_id: folder.folder_id().to_string(),
            snapshot_id: snapshot.id().to_string(),
            content_hash: Some(manifest.content_hash),
            archived,
            live,
        })
    }

    async fn archived_karma(&self, snapshot: &SnapshotRepo, block_ids: &[String]) -> Result<Option<KarmaQueryResult>> {
        let mut newest: Option<KarmaQueryResult> = None;
        for id in block_ids {
            let block = snapshot.block(id.clone());
            let document = self.ctx.documents().get(block.path()).await?;
            let is_query = document
                .as_ref()
                .and_then(|d| d.get("type"))
                .and_then(Value::as_str)
                == Some(KARMA_QUERY_BLOCK_TYPE);
            if !is_query {
                continue;
            }
            if let Some(result) = latest_query_result(&self.ctx, &block).await? {
                if newest.as_ref().map_or(true, |n| result.sort_key() > n.sort_key()) {
                    newest = Some(result);
                }
            }
        }
        Ok(newest)
    }

    /// Rows and settings reached from the serpentine block
    async fn side<F>(&self, serpentine_id: &str, block: F, karma: Option<KarmaQueryResult>) -> Result<ComparisonSide>
    where
        F: Fn(String) -> BlockRepo,
    {
        if serpentine_id.is_empty() {
            return Ok(ComparisonSide {
                karma_query: karma,
                ..ComparisonSide::default()
            });
        }
        let serpentine_block = block(serpentine_id.to_string());
        let serpentine: Option<SerpentineConfig> = self
            .ctx
            .documents()
            .get_as(&serpentine_block.serpentine_config())
            .await?;
        let table_block = match &serpentine {
            Some(config) if !config.source_block_id.is_empty() => block(config.source_block_id.clone()),
            _ => serpentine_block,
        };
        let rows = RowService::new(self.ctx.clone()).load_rows(&table_block).await?;
        Ok(ComparisonSide {
            general_table: sort_attestation_rows(&rows),
            serpentine,
            karma_query: karma,
        })
    }

    /// Compare a snapshot against live data and overwrite its record
    ///
    /// # Errors
    /// Returns [`NewsroomError::Comparison`] if the function fails; the
    /// previous record is left untouched in that case.
    pub async fn compare(&self, snapshot: &SnapshotRepo) -> Result<ComparisonResult> {
        let request = self.gather(snapshot).await?;
        let result = self
            .function
            .compare(&request)
            .await
            .map_err(|e| NewsroomError::Comparison(NewsroomError::external_message(&e)))?;
        let record = ComparisonRecord {
            result: result.clone(),
            compared_at: self.ctx.now().to_rfc3339(),
        };
        self.ctx.documents().set_as(&snapshot.comparison(), &record).await?;
        tracing::info!(
            "Comparison for {}: similarity {:.1}%, {} differences",
            snapshot.id(),
            result.similarity,
            result.differences.len()
        );
        Ok(result)
    }

    /// The stored record, if any
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn load(&self, snapshot: &SnapshotRepo) -> Result<Option<ComparisonRecord>> {
        Ok(self.ctx.documents().get_as(&snapshot.comparison()).await?)
    }

    /// The stored record rendered as HTML
    ///
    /// # Errors
    /// Returns [`NewsroomError::NotFound`] if no comparison has run.
    pub async fn render(&self, snapshot: &SnapshotRepo) -> Result<String> {
        let record = self
            .load(snapshot)
            .await?
            .ok_or_else(|| NewsroomError::NotFound(format!("comparison for snapshot {}", snapshot.id())))?;
        Ok(crate::html::render_comparison_html(snapshot.id(), &record.result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_wire_format() {
        let result = ComparisonResult {
            similarity: 87.5,
            is_match: false,
            differences: vec![Difference {
                category: DifferenceCategory::GeneralTable,
                field: "summary".to_string(),
                icf_value: json!("old"),
                firestore_value: json!("new"),
                severity: Severity::Error,
                identifier: Some("row-1".to_string()),
            }],
            summary: "1 difference".to_string(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["match"], json!(false));
        assert_eq!(value["differences"][0]["category"], json!("generalTable"));
        assert_eq!(value["differences"][0]["icfValue"], json!("old"));
        assert_eq!(value["differences"][0]["firestoreValue"], json!("new"));
        assert_eq!(value["differences"][0]["severity"], json!("error"));
    }

    #[test]
    fn record_flattens_result() {
        let record = ComparisonRecord {
            result: ComparisonResult {
                similarity: 100.0,
                is_match: true,
                differences: Vec::new(),
                summary: "identical".to_string(),
            },
            compared_at: "2025-02-01T00:00:00+00:00".to_string(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["similarity"], json!(100.0));
        assert_eq!(value["comparedAt"], json!("2025-02-01T00:00:00+00:00"));
        let back: ComparisonRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
