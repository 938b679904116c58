//! Milestone row service
//!
//! Reads and writes the general table of a block
//! (`table-data/karma-general-table`). Alongside the rows the table keeps
//! sparse edit records (identity plus only the fields edited by hand) and
//! whole manual rows; feed refreshes replay them through [`reconcile`] so
//! manual edits survive regeneration.

use crate::context::NewsroomContext;
use crate::error::{NewsroomError, Result};
use newsroom_store::{BlockRepo, DocumentStoreExt};
use newsroom_timeline::{
    reconcile, remove_not_in_karma, MilestoneImages, MilestoneRow, ProofLink, RowIdentity, MAX_PROOFS,
};
use serde::{Deserialize, Serialize};

/// Stored general table document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralTable {
    pub rows: Vec<MilestoneRow>,
    /// Hand edits: sparse rows for feed rows, whole rows for manual ones
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub manual_edits: Vec<MilestoneRow>,
    /// Rows removed through the "not in karma" path; refreshes skip them
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_in_karma: Vec<RowIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// A single field-level edit
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    OfficialDate(String),
    Summary(String),
    Status(String),
    Proofs(Vec<ProofLink>),
    Notes(Option<String>),
    Images(MilestoneImages),
}

impl FieldEdit {
    fn apply(&self, row: &mut MilestoneRow) {
        match self {
            Self::OfficialDate(date) => row.official_date.clone_from(date),
            Self::Summary(summary) => row.summary.clone_from(summary),
            Self::Status(status) => row.status.clone_from(status),
            Self::Proofs(proofs) => row.proofs.clone_from(proofs),
            Self::Notes(notes) => row.notes.clone_from(notes),
            Self::Images(images) => row.images = Some(images.clone()),
        }
    }
}

/// Empty row carrying only an identity
fn sparse_row(identity: &RowIdentity) -> MilestoneRow {
    MilestoneRow {
        slug: identity.slug.clone(),
        title: identity.title.clone(),
        created_at: identity.created_at.clone(),
        ..MilestoneRow::default()
    }
}

/// Reads and edits milestone rows of a block
#[derive(Debug, Clone)]
pub struct RowService {
    ctx: NewsroomContext,
}

impl RowService {
    /// Create new service
    #[must_use]
    pub fn new(ctx: NewsroomContext) -> Self {
        Self { ctx }
    }

    /// General table document, empty if the block has none yet
    ///
    /// # Errors
    /// Returns an error if the store fails or the document is malformed.
    pub async fn load_table(&self, block: &BlockRepo) -> Result<GeneralTable> {
        Ok(self
            .ctx
            .documents()
            .get_as::<GeneralTable>(&block.general_table())
            .await?
            .unwrap_or_default())
    }

    /// Rows of the block, empty if the block has no table
    ///
    /// # Errors
    /// Returns an error if the store fails or the document is malformed.
    pub async fn load_rows(&self, block: &BlockRepo) -> Result<Vec<MilestoneRow>> {
        Ok(self.load_table(block).await?.rows)
    }

    /// Rows of the block; the table must exist
    ///
    /// # Errors
    /// Returns [`NewsroomError::NotFound`] if the block has no general table.
    pub async fn require_rows(&self, block: &BlockRepo) -> Result<Vec<MilestoneRow>> {
        let table: GeneralTable = self.ctx.documents().require_as(&block.general_table()).await?;
        Ok(table.rows)
    }

    async fn save_table(&self, block: &BlockRepo, mut table: GeneralTable) -> Result<GeneralTable> {
        table.updated_at = Some(self.ctx.now().to_rfc3339());
        self.ctx.documents().set_as(&block.general_table(), &table).await?;
        Ok(table)
    }

    /// Replace feed rows with a fresh pull, keeping manual edits
    ///
    /// Proof lists longer than the maximum are truncated.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn refresh_from_feed(&self, block: &BlockRepo, fresh: Vec<MilestoneRow>) -> Result<Vec<MilestoneRow>> {
        let table = self.load_table(block).await?;
        let fresh: Vec<MilestoneRow> = fresh
            .into_iter()
            .map(|mut row| {
                if row.proofs.len() > MAX_PROOFS {
                    tracing::warn!("Truncating {} proofs on '{}' to {}", row.proofs.len(), row.title, MAX_PROOFS);
                    row.proofs.truncate(MAX_PROOFS);
                }
                row
            })
            .collect();

        let mut edited = table.manual_edits.clone();
        edited.extend(table.not_in_karma.iter().map(|identity| MilestoneRow {
            not_in_karma: true,
            ..sparse_row(identity)
        }));

        let rows = reconcile(&fresh, &edited);
        tracing::info!("Refreshed {} with {} rows", block.path(), rows.len());
        let saved = self
            .save_table(
                block,
                GeneralTable {
                    rows,
                    ..table
                },
            )
            .await?;
        Ok(saved.rows)
    }

    /// Append a manually entered row
    ///
    /// # Errors
    /// Returns [`NewsroomError::Validation`] if required fields are missing.
    pub async fn add_row(&self, block: &BlockRepo, mut row: MilestoneRow) -> Result<MilestoneRow> {
        row.validate_for_save()?;
        row.manual = true;
        if row.created_at.is_none() {
            row.created_at = Some(self.ctx.now().to_rfc3339());
        }
        let mut table = self.load_table(block).await?;
        if table.rows.iter().any(|r| r.identity() == row.identity()) {
            return Err(NewsroomError::validation("title", "a row with this identity already exists"));
        }
        table.rows.push(row.clone());
        table.manual_edits.push(row.clone());
        self.save_table(block, table).await?;
        Ok(row)
    }

    /// Edit one field of the row with `identity`
    ///
    /// The edited row is validated before anything is written.
    ///
    /// # Errors
    /// Returns [`NewsroomError::NotFound`] for an unknown row and
    /// [`NewsroomError::Validation`] if the edit leaves the row invalid.
    pub async fn apply_edit(&self, block: &BlockRepo, identity: &RowIdentity, edit: FieldEdit) -> Result<MilestoneRow> {
        let mut table = self.load_table(block).await?;
        let row = table
            .rows
            .iter_mut()
            .find(|r| &r.identity() == identity)
            .ok_or_else(|| NewsroomError::NotFound(format!("row '{}' in {}", identity.title, block.path())))?;

        let mut updated = row.clone();
        edit.apply(&mut updated);
        updated.validate_for_save()?;
        *row = updated.clone();

        match table.manual_edits.iter_mut().find(|r| &r.identity() == identity) {
            Some(record) => edit.apply(record),
            None => {
                let mut record = sparse_row(identity);
                edit.apply(&mut record);
                table.manual_edits.push(record);
            }
        }

        self.save_table(block, table).await?;
        Ok(updated)
    }

    /// Remove a row and keep it out of later refreshes
    ///
    /// # Errors
    /// Returns [`NewsroomError::NotFound`] for an unknown row.
    pub async fn remove_not_in_karma(&self, block: &BlockRepo, identity: &RowIdentity) -> Result<()> {
        let mut table = self.load_table(block).await?;
        if !remove_not_in_karma(&mut table.rows, identity) {
            return Err(NewsroomError::NotFound(format!("row '{}' in {}", identity.title, block.path())));
        }
        table.manual_edits.retain(|r| &r.identity() != identity);
        if !table.not_in_karma.contains(identity) {
            table.not_in_karma.push(identity.clone());
        }
        tracing::info!("Removed '{}' from {} (not in karma)", identity.title, block.path());
        self.save_table(block, table).await?;
        Ok(())
    }
}
