//! Serpentine timeline block
//!
//! One implementation serves both the editable block and the read-only view
//! of an archived snapshot; [`SerpentineMode`] decides whether drags and
//! settings changes are accepted.

use crate::context::NewsroomContext;
use crate::error::{NewsroomError, Result};
use crate::rows::RowService;
use newsroom_store::{BlockRepo, DocumentStoreExt, Subscription};
use newsroom_timeline::{
    apply_measurements, bucketize, card_position, default_connectors, CardPosition, Connector, DragController,
    DragUpdate, GeometryProbe, MonthBucket, MonthsToShow, Point, PositionOverrides, SerpentineLayout,
    SerpentineNode, TimelineError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Stored settings of a serpentine block (`serpentine-data/config`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerpentineConfig {
    /// Block holding the general table
    pub source_block_id: String,
    /// Falls back to the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months_to_show: Option<MonthsToShow>,
    #[serde(default)]
    pub card_positions: PositionOverrides,
}

/// Whether the block accepts edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerpentineMode {
    Editable,
    ReadOnly,
}

/// A loaded serpentine block with its computed layout
#[derive(Debug)]
pub struct SerpentineBlock {
    ctx: NewsroomContext,
    block: BlockRepo,
    mode: SerpentineMode,
    config: SerpentineConfig,
    months_to_show: MonthsToShow,
    buckets: Vec<MonthBucket>,
    layout: SerpentineLayout,
    drag: DragController,
    warnings: Vec<String>,
}

impl SerpentineBlock {
    /// Load settings and rows and compute the layout
    ///
    /// # Errors
    /// Returns [`NewsroomError::NotFound`] if the block has no settings or
    /// its source block has no general table.
    pub async fn open(ctx: NewsroomContext, block: BlockRepo, mode: SerpentineMode) -> Result<Self> {
        let params = ctx.config().layout;
        let mut loaded = Self {
            ctx,
            block,
            mode,
            config: SerpentineConfig::default(),
            months_to_show: MonthsToShow::default(),
            buckets: Vec::new(),
            layout: SerpentineLayout::compute(&[], params),
            drag: DragController::default(),
            warnings: Vec::new(),
        };
        loaded.refresh().await?;
        Ok(loaded)
    }

    /// Re-read settings and rows and regenerate the layout
    ///
    /// # Errors
    /// Same as [`SerpentineBlock::open`].
    pub async fn refresh(&mut self) -> Result<()> {
        let config: SerpentineConfig = self
            .ctx
            .documents()
            .get_as(&self.block.serpentine_config())
            .await?
            .ok_or_else(|| NewsroomError::NotFound(format!("serpentine settings for block {}", self.block.id())))?;
        if config.source_block_id.trim().is_empty() {
            return Err(NewsroomError::NotFound(format!(
                "source block for serpentine {}",
                self.block.id()
            )));
        }

        let source = self.block.sibling(config.source_block_id.clone());
        let rows = RowService::new(self.ctx.clone()).require_rows(&source).await?;
        let months = config.months_to_show.unwrap_or(self.ctx.config().months_to_show);

        self.months_to_show = months;
        self.buckets = bucketize(&rows, months, self.ctx.today());
        self.layout = SerpentineLayout::compute(&self.buckets, self.ctx.config().layout);
        self.drag = DragController::new(config.card_positions.clone());
        self.config = config;

        self.warnings = match self.mode {
            SerpentineMode::Editable => self
                .layout
                .overflow
                .iter()
                .map(|o| {
                    format!(
                        "{} has {} completed milestones; only the first 2 are shown",
                        o.month, o.total_rows
                    )
                })
                .collect(),
            SerpentineMode::ReadOnly => Vec::new(),
        };

        let misattached = self.config.card_positions.misattached(&self.layout.nodes);
        if !misattached.is_empty() {
            tracing::warn!(
                "Block {}: {} card positions may belong to a different milestone after regeneration: {:?}",
                self.block.id(),
                misattached.len(),
                misattached
            );
        }
        tracing::debug!(
            "Serpentine {} laid out {} months, {} nodes",
            self.block.id(),
            self.buckets.len(),
            self.layout.nodes.len()
        );
        Ok(())
    }

    /// Block address
    #[inline]
    #[must_use]
    pub fn block(&self) -> &BlockRepo {
        &self.block
    }

    /// Mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> SerpentineMode {
        self.mode
    }

    /// Stored settings as last loaded
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SerpentineConfig {
        &self.config
    }

    /// Effective month window
    #[inline]
    #[must_use]
    pub fn months_to_show(&self) -> MonthsToShow {
        self.months_to_show
    }

    /// Month buckets, oldest first
    #[inline]
    #[must_use]
    pub fn buckets(&self) -> &[MonthBucket] {
        &self.buckets
    }

    /// Computed layout
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &SerpentineLayout {
        &self.layout
    }

    /// Generated nodes
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[SerpentineNode] {
        &self.layout.nodes
    }

    /// User-facing data-quality warnings (editable mode only)
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Live position map, including drags not yet persisted
    #[inline]
    #[must_use]
    pub fn positions(&self) -> &PositionOverrides {
        self.drag.positions()
    }

    fn check_index(&self, node_index: usize) -> Result<()> {
        let len = self.layout.nodes.len();
        if node_index >= len {
            return Err(TimelineError::NodeOutOfRange { index: node_index, len }.into());
        }
        Ok(())
    }

    fn ensure_editable(&self, action: &str) -> Result<()> {
        match self.mode {
            SerpentineMode::Editable => Ok(()),
            SerpentineMode::ReadOnly => Err(NewsroomError::ReadOnly(format!(
                "cannot {action} on archived block {}",
                self.block.id()
            ))),
        }
    }

    /// Card position: stored override, else the computed default
    ///
    /// # Errors
    /// Returns an error for an unknown node index.
    pub fn card_position(&self, node_index: usize) -> Result<CardPosition> {
        self.check_index(node_index)?;
        Ok(card_position(&self.layout, self.drag.positions(), node_index))
    }

    /// Connectors computed from data alone
    #[must_use]
    pub fn connectors(&self) -> Vec<Connector> {
        default_connectors(&self.layout, self.drag.positions())
    }

    /// Connectors corrected by measured card geometry
    #[must_use]
    pub fn measured_connectors(&self, probe: &dyn GeometryProbe) -> Vec<Connector> {
        let mut connectors = self.connectors();
        let corrected = apply_measurements(&mut connectors, probe);
        tracing::debug!("Corrected {} connectors from measurements", corrected);
        connectors
    }

    /// Start dragging a card
    ///
    /// # Errors
    /// Returns [`NewsroomError::ReadOnly`] on archived blocks, or an error
    /// for an unknown node or a pointer that is already dragging.
    pub fn begin_drag(
        &mut self,
        pointer_id: u32,
        node_index: usize,
        pointer: Point,
        card_top_left: Point,
        card_width: f64,
    ) -> Result<()> {
        self.ensure_editable("drag cards")?;
        self.check_index(node_index)?;
        self.drag
            .begin(pointer_id, node_index, pointer, card_top_left, card_width)?;
        Ok(())
    }

    /// Move the dragged card
    ///
    /// # Errors
    /// Returns an error if the pointer has no active drag.
    pub fn drag_move(&mut self, pointer_id: u32, pointer: Point) -> Result<DragUpdate> {
        self.ensure_editable("drag cards")?;
        Ok(self.drag.update(pointer_id, pointer, &self.layout)?)
    }

    /// Finish a drag and persist the whole position map (merge write)
    ///
    /// # Errors
    /// Returns an error if the pointer has no active drag or the write fails.
    pub async fn end_drag(&mut self, pointer_id: u32) -> Result<PositionOverrides> {
        self.ensure_editable("drag cards")?;
        let positions = self.drag.end(pointer_id)?;
        self.ctx
            .documents()
            .merge_as(&self.block.serpentine_config(), &json!({ "cardPositions": positions }))
            .await?;
        self.config.card_positions = positions.clone();
        tracing::info!("Saved {} card positions for {}", positions.len(), self.block.id());
        Ok(positions)
    }

    /// Change the month window and regenerate
    ///
    /// # Errors
    /// Returns [`NewsroomError::Validation`] outside `1..=120`.
    pub async fn set_months_to_show(&mut self, value: i64) -> Result<()> {
        self.ensure_editable("change settings")?;
        let months = MonthsToShow::new(value)?;
        self.ctx
            .documents()
            .merge_as(&self.block.serpentine_config(), &json!({ "monthsToShow": months }))
            .await?;
        self.refresh().await
    }

    /// Live updates of the block settings
    ///
    /// # Errors
    /// Returns an error if the store cannot subscribe.
    pub async fn watch(&self) -> Result<Subscription> {
        Ok(self.ctx.documents().subscribe(&self.block.serpentine_config()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NewsroomConfig;
    use crate::context::FixedClock;
    use chrono::{TimeZone, Utc};
    use newsroom_store::FolderRepo;
    use newsroom_timeline::MilestoneRow;
    use std::sync::Arc;

    async fn setup(rows: Vec<MilestoneRow>) -> (NewsroomContext, FolderRepo) {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 2, 14, 9, 0, 0).unwrap());
        let ctx = NewsroomContext::in_memory(NewsroomConfig::new()).with_clock(Arc::new(clock));
        let folder = FolderRepo::new("p", "f");
        ctx.documents()
            .set_as(&folder.block("table").general_table(), &json!({ "rows": rows }))
            .await
            .unwrap();
        ctx.documents()
            .set_as(
                &folder.block("serp").serpentine_config(),
                &json!({ "sourceBlockId": "table", "monthsToShow": 2 }),
            )
            .await
            .unwrap();
        (ctx, folder)
    }

    fn rows() -> Vec<MilestoneRow> {
        vec![
            MilestoneRow::new("jan-2025", "A", "completed").with_title("p", "A"),
            MilestoneRow::new("jan-2025", "B", "completed").with_title("p", "B"),
            MilestoneRow::new("feb-2025", "C", "completed").with_title("p", "C"),
        ]
    }

    #[tokio::test]
    async fn layout_follows_stored_settings() {
        let (ctx, folder) = setup(rows()).await;
        let block = SerpentineBlock::open(ctx, folder.block("serp"), SerpentineMode::Editable)
            .await
            .unwrap();
        assert_eq!(block.buckets().len(), 2);
        let extras: Vec<bool> = block.nodes().iter().map(|n| n.is_extra_node).collect();
        assert_eq!(extras, vec![false, true, false]);
        assert!(block.warnings().is_empty());
    }

    #[tokio::test]
    async fn missing_settings_is_not_found() {
        let (ctx, folder) = setup(rows()).await;
        let err = SerpentineBlock::open(ctx, folder.block("other"), SerpentineMode::Editable)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn overflow_warns_only_when_editable() {
        let mut many = rows();
        many.push(MilestoneRow::new("jan-2025", "D", "completed"));
        let (ctx, folder) = setup(many).await;
        let editable = SerpentineBlock::open(ctx.clone(), folder.block("serp"), SerpentineMode::Editable)
            .await
            .unwrap();
        assert_eq!(editable.warnings().len(), 1);
        assert!(editable.warnings()[0].contains("Jan-2025"));
        let read_only = SerpentineBlock::open(ctx, folder.block("serp"), SerpentineMode::ReadOnly)
            .await
            .unwrap();
        assert!(read_only.warnings().is_empty());
    }

    #[tokio::test]
    async fn drag_persists_positions_and_survives_reload() {
        let (ctx, folder) = setup(rows()).await;
        let mut block = SerpentineBlock::open(ctx.clone(), folder.block("serp"), SerpentineMode::Editable)
            .await
            .unwrap();
        block
            .begin_drag(1, 0, Point::new(110.0, 60.0), Point::new(100.0, 50.0), 200.0)
            .unwrap();
        let update = block.drag_move(1, Point::new(310.0, 160.0)).unwrap();
        assert!((update.position.x - 400.0).abs() < 1e-9);
        assert!((update.position.y - 150.0).abs() < 1e-9);
        block.end_drag(1).await.unwrap();

        let reloaded = SerpentineBlock::open(ctx, folder.block("serp"), SerpentineMode::Editable)
            .await
            .unwrap();
        let position = reloaded.card_position(0).unwrap();
        assert!((position.x - 400.0).abs() < 1e-9);
        assert_eq!(reloaded.config().source_block_id, "table");
    }

    #[tokio::test]
    async fn read_only_rejects_drags_and_settings() {
        let (ctx, folder) = setup(rows()).await;
        let mut block = SerpentineBlock::open(ctx, folder.block("serp"), SerpentineMode::ReadOnly)
            .await
            .unwrap();
        let err = block
            .begin_drag(1, 0, Point::default(), Point::default(), 100.0)
            .unwrap_err();
        assert!(matches!(err, NewsroomError::ReadOnly(_)));
        assert!(block.set_months_to_show(6).await.is_err());
    }

    #[tokio::test]
    async fn months_validation_names_field() {
        let (ctx, folder) = setup(rows()).await;
        let mut block = SerpentineBlock::open(ctx, folder.block("serp"), SerpentineMode::Editable)
            .await
            .unwrap();
        let err = block.set_months_to_show(121).await.unwrap_err();
        assert_eq!(err.field(), Some("monthsToShow"));
        block.set_months_to_show(3).await.unwrap();
        assert_eq!(block.buckets().len(), 3);
    }

    #[tokio::test]
    async fn unknown_node_rejected() {
        let (ctx, folder) = setup(rows()).await;
        let block = SerpentineBlock::open(ctx, folder.block("serp"), SerpentineMode::Editable)
            .await
            .unwrap();
        assert!(block.card_position(99).is_err());
    }
}
