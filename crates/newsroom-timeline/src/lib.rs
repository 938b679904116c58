//! Newsroom Timeline
//!
//! Pure algorithms behind the Karma Serpentine timeline.
//!
//! # Pipeline
//!
//! ```text
//! MilestoneRow[] ─► bucketize ─► MonthBucket[] ─► SerpentineLayout::compute
//!                                                   │
//!                     PositionOverrides ─► card_position / DragController
//! ```
//!
//! Nothing in this crate performs I/O. Persistence lives in
//! `newsroom-store`, orchestration in `newsroom-core`.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod bucket;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod matching;
pub mod milestone;
pub mod month;
pub mod position;
pub mod reconcile;
pub mod sort;

pub use bucket::{bucketize, passes_source_filter, window_bounds, MonthBucket, MonthsToShow, SourceFilter};
pub use error::TimelineError;
pub use geometry::{apply_measurements, default_connectors, GeometryProbe, MeasuredCard};
pub use layout::{
    build_path, compute_anchors, generate_nodes, node_anchor, LayoutParams, MonthOverflow, NodeSet, Point,
    SerpentineLayout, SerpentineNode, MONTHS_PER_ROW,
};
pub use matching::{find_row_by_title, match_title, normalize_title, CONTAINMENT_THRESHOLD};
pub use milestone::{MilestoneImages, MilestoneRow, ProofLink, RowIdentity, MAX_PROOFS, QUALIFYING_STATUSES};
pub use month::{parse_loose_date, MonthToken};
pub use position::{
    card_position, default_card_position, CardPosition, Connector, DragController, DragUpdate, PositionOverrides,
};
pub use reconcile::{reconcile, remove_not_in_karma};
pub use sort::{fallback_date, sort_attestation_rows};
