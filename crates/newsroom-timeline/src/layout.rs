//! Serpentine layout engine
//!
//! Lays month anchors along a boustrophedon path: six months per visual
//! row, left-to-right on even rows and right-to-left on odd rows. Node
//! generation flattens buckets into the sequential node list whose index is
//! the key for card positions.

use crate::bucket::MonthBucket;
use crate::milestone::MilestoneRow;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Months per visual row of the serpentine
pub const MONTHS_PER_ROW: usize = 6;

/// Vertical compression applied to the naive even row split
pub const ROW_HEIGHT_FACTOR: f64 = 0.6;

/// Offset of an extra node in the last month, which has no next anchor
pub const LAST_MONTH_EXTRA_OFFSET: Point = Point { x: 20.0, y: 10.0 };

/// Maximum nodes rendered per month
pub const MAX_NODES_PER_MONTH: usize = 2;

/// A 2D point in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create point
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Midpoint between two points
    #[inline]
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Canvas dimensions and padding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutParams {
    pub width: f64,
    pub height: f64,
    pub top_padding: f64,
    pub bottom_padding: f64,
    pub side_padding: f64,
    pub months_per_row: usize,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            top_padding: 80.0,
            bottom_padding: 80.0,
            side_padding: 80.0,
            months_per_row: MONTHS_PER_ROW,
        }
    }
}

impl LayoutParams {
    /// Drawable width between side paddings
    #[inline]
    #[must_use]
    pub fn effective_width(&self) -> f64 {
        (self.width - 2.0 * self.side_padding).max(0.0)
    }

    /// Drawable height between top and bottom padding
    #[inline]
    #[must_use]
    pub fn effective_height(&self) -> f64 {
        (self.height - self.top_padding - self.bottom_padding).max(0.0)
    }

    fn per_row(&self) -> usize {
        self.months_per_row.max(1)
    }

    /// Visual row of a month index
    #[inline]
    #[must_use]
    pub fn visual_row(&self, month_index: usize) -> usize {
        month_index / self.per_row()
    }
}

/// Anchor point of every month in order
#[must_use]
pub fn compute_anchors(month_count: usize, params: &LayoutParams) -> Vec<Point> {
    if month_count == 0 {
        return Vec::new();
    }
    let per_row = params.per_row();
    let num_rows = month_count.div_ceil(per_row);
    let row_height =
        ROW_HEIGHT_FACTOR * (params.effective_height() / (num_rows.saturating_sub(1).max(1)) as f64);
    let span = (per_row.saturating_sub(1)).max(1) as f64;

    (0..month_count)
        .map(|i| {
            let row = i / per_row;
            let position = (i % per_row) as f64;
            let progress = if per_row == 1 { 0.0 } else { position / span };
            let progress = if row % 2 == 0 { progress } else { 1.0 - progress };
            let x = params.side_padding + progress * params.effective_width();
            let y = params.top_padding + row as f64 * row_height;
            Point::new(x, y)
        })
        .collect()
}

/// SVG path through the anchors
///
/// Same-row neighbours join with a cubic curve whose control points sit a
/// third of the horizontal distance in from each end; row changes join
/// with control points at the vertical midpoint, giving a U-turn.
#[must_use]
pub fn build_path(anchors: &[Point], params: &LayoutParams) -> String {
    let Some(first) = anchors.first() else {
        return String::new();
    };
    let mut path = format!("M {:.2} {:.2}", first.x, first.y);
    for (i, pair) in anchors.windows(2).enumerate() {
        let (prev, next) = (pair[0], pair[1]);
        let same_row = params.visual_row(i) == params.visual_row(i + 1);
        let (c1, c2) = if same_row {
            let dx = next.x - prev.x;
            (
                Point::new(prev.x + dx / 3.0, prev.y),
                Point::new(next.x - dx / 3.0, next.y),
            )
        } else {
            let mid_y = (prev.y + next.y) / 2.0;
            (Point::new(prev.x, mid_y), Point::new(next.x, mid_y))
        };
        let _ = write!(
            path,
            " C {:.2} {:.2}, {:.2} {:.2}, {:.2} {:.2}",
            c1.x, c1.y, c2.x, c2.y, next.x, next.y
        );
    }
    path
}

/// A rendered timeline node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerpentineNode {
    pub month_bucket_index: usize,
    pub row_index_within_month: usize,
    pub is_extra_node: bool,
    pub row: Option<MilestoneRow>,
    /// Month label on primary nodes, empty on extra nodes
    pub month: String,
    pub has_data: bool,
}

/// Signal that a month had more qualifying rows than can be rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthOverflow {
    pub bucket_index: usize,
    pub month: String,
    pub total_rows: usize,
    pub dropped: usize,
}

/// Generated nodes plus data-quality signals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSet {
    pub nodes: Vec<SerpentineNode>,
    pub overflow: Vec<MonthOverflow>,
}

/// Flatten buckets into the sequential node list
///
/// Empty months yield one inactive node, one-row months one active node,
/// and months with two or more rows yield the primary node plus an extra
/// node; rows past the second are dropped and reported in
/// [`NodeSet::overflow`].
#[must_use]
pub fn generate_nodes(buckets: &[MonthBucket]) -> NodeSet {
    let mut set = NodeSet::default();
    for (bucket_index, bucket) in buckets.iter().enumerate() {
        if bucket.rows.is_empty() {
            set.nodes.push(SerpentineNode {
                month_bucket_index: bucket_index,
                row_index_within_month: 0,
                is_extra_node: false,
                row: None,
                month: bucket.month.clone(),
                has_data: false,
            });
            continue;
        }

        for (row_index, row) in bucket.rows.iter().take(MAX_NODES_PER_MONTH).enumerate() {
            let is_extra = row_index > 0;
            set.nodes.push(SerpentineNode {
                month_bucket_index: bucket_index,
                row_index_within_month: row_index,
                is_extra_node: is_extra,
                row: Some(row.clone()),
                month: if is_extra { String::new() } else { bucket.month.clone() },
                has_data: true,
            });
        }

        if bucket.rows.len() > MAX_NODES_PER_MONTH {
            let dropped = bucket.rows.len() - MAX_NODES_PER_MONTH;
            tracing::warn!(
                "{} has {} qualifying milestones; only {} are shown",
                bucket.month,
                bucket.rows.len(),
                MAX_NODES_PER_MONTH
            );
            set.overflow.push(MonthOverflow {
                bucket_index,
                month: bucket.month.clone(),
                total_rows: bucket.rows.len(),
                dropped,
            });
        }
    }
    set
}

/// Anchor of a node: its month anchor, or for extra nodes the midpoint
/// towards the next month
#[must_use]
pub fn node_anchor(node: &SerpentineNode, anchors: &[Point]) -> Point {
    let Some(&anchor) = anchors.get(node.month_bucket_index) else {
        return Point::default();
    };
    if !node.is_extra_node {
        return anchor;
    }
    match anchors.get(node.month_bucket_index + 1) {
        Some(&next) => anchor.midpoint(next),
        None => Point::new(anchor.x + LAST_MONTH_EXTRA_OFFSET.x, anchor.y + LAST_MONTH_EXTRA_OFFSET.y),
    }
}

/// Complete algorithmic layout of a timeline
#[derive(Debug, Clone, PartialEq)]
pub struct SerpentineLayout {
    pub params: LayoutParams,
    pub path: String,
    pub month_anchors: Vec<Point>,
    pub nodes: Vec<SerpentineNode>,
    pub node_anchors: Vec<Point>,
    pub overflow: Vec<MonthOverflow>,
}

impl SerpentineLayout {
    /// Compute anchors, path and nodes for the buckets
    #[must_use]
    pub fn compute(buckets: &[MonthBucket], params: LayoutParams) -> Self {
        let month_anchors = compute_anchors(buckets.len(), &params);
        let path = build_path(&month_anchors, &params);
        let NodeSet { nodes, overflow } = generate_nodes(buckets);
        let node_anchors = nodes.iter().map(|n| node_anchor(n, &month_anchors)).collect();
        Self {
            params,
            path,
            month_anchors,
            nodes,
            node_anchors,
            overflow,
        }
    }

    /// Visual row of a node (row of its month)
    #[inline]
    #[must_use]
    pub fn visual_row(&self, node_index: usize) -> usize {
        self.nodes
            .get(node_index)
            .map_or(0, |n| self.params.visual_row(n.month_bucket_index))
    }

    /// True when the node shares its month with another rendered node
    #[must_use]
    pub fn has_sibling(&self, node_index: usize) -> bool {
        let Some(node) = self.nodes.get(node_index) else {
            return false;
        };
        self.nodes
            .iter()
            .enumerate()
            .any(|(i, n)| i != node_index && n.month_bucket_index == node.month_bucket_index)
    }

    /// Nodes that carry a milestone, with their index
    pub fn data_nodes(&self) -> impl Iterator<Item = (usize, &SerpentineNode)> {
        self.nodes.iter().enumerate().filter(|(_, n)| n.has_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{bucketize, MonthsToShow};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn bucket_with(rows: usize, label: &str) -> MonthBucket {
        MonthBucket {
            month: label.to_string(),
            year: 2025,
            month_index: 0,
            rows: (0..rows)
                .map(|i| MilestoneRow::new("jan-2025", format!("m{i}"), "completed"))
                .collect(),
            has_data: rows > 0,
        }
    }

    #[test]
    fn node_counts_per_month() {
        let buckets = vec![
            bucket_with(0, "A"),
            bucket_with(1, "B"),
            bucket_with(2, "C"),
            bucket_with(5, "D"),
        ];
        let set = generate_nodes(&buckets);
        let counts: Vec<usize> = (0..4)
            .map(|b| set.nodes.iter().filter(|n| n.month_bucket_index == b).count())
            .collect();
        assert_eq!(counts, vec![1, 1, 2, 2]);
        assert_eq!(set.overflow.len(), 1);
        assert_eq!(set.overflow[0].bucket_index, 3);
        assert_eq!(set.overflow[0].dropped, 3);
    }

    #[test]
    fn extra_nodes_have_no_month_label() {
        let set = generate_nodes(&[bucket_with(2, "Jan-2025")]);
        assert_eq!(set.nodes[0].month, "Jan-2025");
        assert!(!set.nodes[0].is_extra_node);
        assert_eq!(set.nodes[1].month, "");
        assert!(set.nodes[1].is_extra_node);
        assert_eq!(set.nodes[1].row_index_within_month, 1);
    }

    #[test]
    fn serpentine_direction_alternates() {
        let params = LayoutParams::default();
        let anchors = compute_anchors(18, &params);
        for row in 0..3 {
            let xs: Vec<f64> = anchors[row * 6..row * 6 + 6].iter().map(|p| p.x).collect();
            for pair in xs.windows(2) {
                if row % 2 == 0 {
                    assert!(pair[0] < pair[1], "row {row} should ascend");
                } else {
                    assert!(pair[0] > pair[1], "row {row} should descend");
                }
            }
        }
    }

    #[test]
    fn rows_are_compressed_vertically() {
        let params = LayoutParams::default();
        let anchors = compute_anchors(12, &params);
        let expected_row_height = 0.6 * params.effective_height();
        assert!((anchors[6].y - anchors[0].y - expected_row_height).abs() < 1e-9);
        assert!((anchors[0].y - params.top_padding).abs() < 1e-9);
    }

    #[test]
    fn extra_node_anchor_interpolates() {
        let params = LayoutParams::default();
        let buckets = vec![bucket_with(2, "A"), bucket_with(0, "B"), bucket_with(2, "C")];
        let layout = SerpentineLayout::compute(&buckets, params);
        let a = layout.month_anchors[0];
        let b = layout.month_anchors[1];
        assert_eq!(layout.node_anchors[1], a.midpoint(b));
        let last = layout.month_anchors[2];
        assert_eq!(layout.node_anchors[4], Point::new(last.x + 20.0, last.y + 10.0));
    }

    #[test]
    fn path_uses_one_curve_per_segment() {
        let params = LayoutParams::default();
        let anchors = compute_anchors(8, &params);
        let path = build_path(&anchors, &params);
        assert!(path.starts_with("M 80.00 80.00"));
        assert_eq!(path.matches(" C ").count(), 7);
        assert_eq!(build_path(&[], &params), "");
    }

    #[test]
    fn sibling_detection() {
        let layout = SerpentineLayout::compute(
            &[bucket_with(1, "A"), bucket_with(2, "B")],
            LayoutParams::default(),
        );
        assert!(!layout.has_sibling(0));
        assert!(layout.has_sibling(1));
        assert!(layout.has_sibling(2));
    }

    #[test]
    fn scenario_three_rows_two_months() {
        let rows = vec![
            MilestoneRow::new("jan-2025", "A", "completed"),
            MilestoneRow::new("jan-2025", "B", "completed"),
            MilestoneRow::new("feb-2025", "C", "completed"),
        ];
        let today = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();
        let buckets = bucketize(&rows, MonthsToShow::new(2).unwrap(), today);
        let layout = SerpentineLayout::compute(&buckets, LayoutParams::default());
        let summaries: Vec<&str> = layout
            .nodes
            .iter()
            .map(|n| n.row.as_ref().map_or("", |r| r.summary.as_str()))
            .collect();
        assert_eq!(summaries, vec!["A", "B", "C"]);
        assert!(layout.nodes[1].is_extra_node);
        assert!(!layout.nodes[2].is_extra_node);
    }

    proptest! {
        #[test]
        fn prop_node_ordering_is_stable(counts in proptest::collection::vec(0usize..5, 1..30)) {
            let buckets: Vec<MonthBucket> = counts.iter().map(|c| bucket_with(*c, "M")).collect();
            let first = generate_nodes(&buckets);
            let second = generate_nodes(&buckets);
            prop_assert_eq!(&first, &second);
            let expected: usize = counts.iter().map(|c| (*c).clamp(1, 2)).sum();
            prop_assert_eq!(first.nodes.len(), expected);
            for pair in first.nodes.windows(2) {
                prop_assert!(
                    (pair[0].month_bucket_index, pair[0].row_index_within_month)
                        < (pair[1].month_bucket_index, pair[1].row_index_within_month)
                );
            }
        }
    }
}
