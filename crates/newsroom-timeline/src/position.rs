//! Card position overrides and drag sessions
//!
//! Summary cards float above or below their node. A user may drag a card;
//! the dragged position is stored in a sparse map keyed by node index and
//! wins over the computed default.

use crate::error::TimelineError;
use crate::layout::{Point, SerpentineLayout, SerpentineNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Distance of a card above (even rows) or below (odd rows) its anchor
pub const CARD_VERTICAL_OFFSET: f64 = 110.0;

/// Horizontal shift applied to both cards of a two-node month
pub const SIBLING_HORIZONTAL_OFFSET: f64 = 90.0;

/// Absolute position of a card's anchor (horizontal centre, top edge)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardPosition {
    pub x: f64,
    pub y: f64,
    /// Content key of the milestone when the card was dragged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl CardPosition {
    /// Position with no recorded milestone key
    #[inline]
    #[must_use]
    pub fn at(x: f64, y: f64) -> Self {
        Self { x, y, key: None }
    }

    /// As a plain point
    #[inline]
    #[must_use]
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Sparse node-index → position map, persisted whole
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionOverrides(BTreeMap<usize, CardPosition>);

impl PositionOverrides {
    /// Empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored override for a node
    #[inline]
    #[must_use]
    pub fn get(&self, node_index: usize) -> Option<&CardPosition> {
        self.0.get(&node_index)
    }

    /// Set an override
    pub fn insert(&mut self, node_index: usize, position: CardPosition) {
        self.0.insert(node_index, position);
    }

    /// Drop an override
    pub fn remove(&mut self, node_index: usize) -> Option<CardPosition> {
        self.0.remove(&node_index)
    }

    /// Number of overrides
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no card has been dragged
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in node order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &CardPosition)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// Overrides whose recorded milestone differs from the node now at
    /// that index
    ///
    /// Lookup stays index-keyed; this only reports entries that may have
    /// attached to a different milestone after the rows were regenerated.
    #[must_use]
    pub fn misattached(&self, nodes: &[SerpentineNode]) -> Vec<usize> {
        self.0
            .iter()
            .filter_map(|(index, pos)| {
                let recorded = pos.key.as_ref()?;
                let current = nodes
                    .get(*index)
                    .and_then(|n| n.row.as_ref())
                    .map(crate::milestone::MilestoneRow::content_key);
                (current.as_ref() != Some(recorded)).then_some(*index)
            })
            .collect()
    }
}

/// Default card position from the node's anchor
///
/// Even visual rows place the card above the path, odd rows below. Both
/// cards of a two-node month shift sideways so they do not overlap.
#[must_use]
pub fn default_card_position(anchor: Point, visual_row: usize, is_extra: bool, has_sibling: bool) -> CardPosition {
    let y = if visual_row % 2 == 0 {
        anchor.y - CARD_VERTICAL_OFFSET
    } else {
        anchor.y + CARD_VERTICAL_OFFSET
    };
    let x = match (has_sibling, is_extra) {
        (false, _) => anchor.x,
        (true, false) => anchor.x - SIBLING_HORIZONTAL_OFFSET,
        (true, true) => anchor.x + SIBLING_HORIZONTAL_OFFSET,
    };
    CardPosition::at(x, y)
}

/// Position of a node's card: the override if stored, else the default
#[must_use]
pub fn card_position(layout: &SerpentineLayout, overrides: &PositionOverrides, node_index: usize) -> CardPosition {
    if let Some(stored) = overrides.get(node_index) {
        return stored.clone();
    }
    let anchor = layout.node_anchors.get(node_index).copied().unwrap_or_default();
    let is_extra = layout.nodes.get(node_index).is_some_and(|n| n.is_extra_node);
    default_card_position(anchor, layout.visual_row(node_index), is_extra, layout.has_sibling(node_index))
}

/// Line from a node's anchor to its card
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connector {
    pub node_index: usize,
    pub from: Point,
    pub to: Point,
}

/// One in-flight drag
#[derive(Debug, Clone, PartialEq)]
struct DragSession {
    node_index: usize,
    offset: Point,
    card_width: f64,
}

/// Result of a drag move: the new card anchor and connector endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct DragUpdate {
    pub node_index: usize,
    pub position: CardPosition,
    pub connector: Connector,
}

/// Tracks drags per pointer and the live position map
///
/// Each pointer id holds at most one session. Sessions on different nodes
/// are independent.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    positions: PositionOverrides,
    sessions: HashMap<u32, DragSession>,
}

impl DragController {
    /// Start from persisted overrides
    #[must_use]
    pub fn new(positions: PositionOverrides) -> Self {
        Self {
            positions,
            sessions: HashMap::new(),
        }
    }

    /// Current position map
    #[inline]
    #[must_use]
    pub fn positions(&self) -> &PositionOverrides {
        &self.positions
    }

    /// True while the pointer is dragging
    #[inline]
    #[must_use]
    pub fn is_dragging(&self, pointer_id: u32) -> bool {
        self.sessions.contains_key(&pointer_id)
    }

    /// Capture the pointer and record its offset from the card's top-left
    ///
    /// # Errors
    /// Returns [`TimelineError::PointerBusy`] if the pointer already drags.
    pub fn begin(
        &mut self,
        pointer_id: u32,
        node_index: usize,
        pointer: Point,
        card_top_left: Point,
        card_width: f64,
    ) -> Result<(), TimelineError> {
        if self.sessions.contains_key(&pointer_id) {
            return Err(TimelineError::PointerBusy(pointer_id));
        }
        self.sessions.insert(
            pointer_id,
            DragSession {
                node_index,
                offset: Point::new(pointer.x - card_top_left.x, pointer.y - card_top_left.y),
                card_width,
            },
        );
        Ok(())
    }

    /// Move the card under the pointer
    ///
    /// The stored `x` is the card's horizontal centre, matching how cards
    /// are translated when rendered.
    ///
    /// # Errors
    /// Returns [`TimelineError::NoActiveDrag`] without a session.
    pub fn update(
        &mut self,
        pointer_id: u32,
        pointer: Point,
        layout: &SerpentineLayout,
    ) -> Result<DragUpdate, TimelineError> {
        let session = self
            .sessions
            .get(&pointer_id)
            .ok_or(TimelineError::NoActiveDrag(pointer_id))?;
        let node_index = session.node_index;
        let left = pointer.x - session.offset.x;
        let top = pointer.y - session.offset.y;
        let key = layout
            .nodes
            .get(node_index)
            .and_then(|n| n.row.as_ref())
            .map(crate::milestone::MilestoneRow::content_key);
        let position = CardPosition {
            x: left + session.card_width / 2.0,
            y: top,
            key,
        };
        self.positions.insert(node_index, position.clone());
        let from = layout.node_anchors.get(node_index).copied().unwrap_or_default();
        Ok(DragUpdate {
            node_index,
            connector: Connector {
                node_index,
                from,
                to: position.point(),
            },
            position,
        })
    }

    /// Release the pointer, returning the full map to persist
    ///
    /// # Errors
    /// Returns [`TimelineError::NoActiveDrag`] without a session.
    pub fn end(&mut self, pointer_id: u32) -> Result<PositionOverrides, TimelineError> {
        self.sessions
            .remove(&pointer_id)
            .ok_or(TimelineError::NoActiveDrag(pointer_id))?;
        Ok(self.positions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::MonthBucket;
    use crate::layout::LayoutParams;
    use crate::milestone::MilestoneRow;

    fn layout_with(counts: &[usize]) -> SerpentineLayout {
        let buckets: Vec<MonthBucket> = counts
            .iter()
            .enumerate()
            .map(|(i, c)| MonthBucket {
                month: format!("M{i}"),
                year: 2025,
                month_index: 0,
                rows: (0..*c)
                    .map(|j| MilestoneRow::new("jan-2025", format!("m{i}-{j}"), "completed"))
                    .collect(),
                has_data: *c > 0,
            })
            .collect();
        SerpentineLayout::compute(&buckets, LayoutParams::default())
    }

    #[test]
    fn default_alternates_by_visual_row() {
        let anchor = Point::new(100.0, 300.0);
        assert_eq!(default_card_position(anchor, 0, false, false).y, 190.0);
        assert_eq!(default_card_position(anchor, 1, false, false).y, 410.0);
    }

    #[test]
    fn default_separates_siblings() {
        let anchor = Point::new(100.0, 300.0);
        assert_eq!(default_card_position(anchor, 0, false, true).x, 10.0);
        assert_eq!(default_card_position(anchor, 0, true, true).x, 190.0);
        assert_eq!(default_card_position(anchor, 0, false, false).x, 100.0);
    }

    #[test]
    fn override_wins_over_default() {
        let layout = layout_with(&[1, 2]);
        let mut overrides = PositionOverrides::new();
        overrides.insert(1, CardPosition::at(5.0, 6.0));
        assert_eq!(card_position(&layout, &overrides, 1), CardPosition::at(5.0, 6.0));
        let default = card_position(&layout, &overrides, 2);
        assert_eq!(default.x, layout.node_anchors[2].x + SIBLING_HORIZONTAL_OFFSET);
    }

    #[test]
    fn drag_lifecycle_persists_centre() {
        let layout = layout_with(&[1]);
        let mut drag = DragController::default();
        drag.begin(7, 0, Point::new(110.0, 60.0), Point::new(100.0, 50.0), 200.0)
            .unwrap();
        let update = drag.update(7, Point::new(310.0, 160.0), &layout).unwrap();
        assert_eq!(update.position.x, 400.0);
        assert_eq!(update.position.y, 150.0);
        assert_eq!(update.connector.from, layout.node_anchors[0]);
        assert_eq!(update.connector.to, Point::new(400.0, 150.0));

        let saved = drag.end(7).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!drag.is_dragging(7));
        assert!(matches!(drag.end(7), Err(TimelineError::NoActiveDrag(7))));
    }

    #[test]
    fn one_session_per_pointer() {
        let mut drag = DragController::default();
        drag.begin(1, 0, Point::default(), Point::default(), 10.0).unwrap();
        assert_eq!(
            drag.begin(1, 1, Point::default(), Point::default(), 10.0),
            Err(TimelineError::PointerBusy(1))
        );
        drag.begin(2, 1, Point::default(), Point::default(), 10.0).unwrap();
    }

    #[test]
    fn overrides_serialize_as_index_map() {
        let mut overrides = PositionOverrides::new();
        overrides.insert(3, CardPosition::at(1.5, 2.0));
        let json = serde_json::to_value(&overrides).unwrap();
        assert_eq!(json["3"]["x"], 1.5);
        let back: PositionOverrides = serde_json::from_value(json).unwrap();
        assert_eq!(back, overrides);
    }

    #[test]
    fn misattached_reports_moved_milestones() {
        let layout = layout_with(&[1, 1]);
        let mut drag = DragController::default();
        drag.begin(1, 0, Point::default(), Point::default(), 0.0).unwrap();
        drag.update(1, Point::new(1.0, 1.0), &layout).unwrap();
        let saved = drag.end(1).unwrap();
        assert!(saved.misattached(&layout.nodes).is_empty());

        let shifted = layout_with(&[0, 1, 1]);
        assert_eq!(saved.misattached(&shifted.nodes), vec![0]);
    }
}
