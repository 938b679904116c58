//! Newsroom Core
//!
//! Orchestrates the Karma Serpentine snapshot pipeline:
//! - Loads milestone rows and keeps hand edits across feed refreshes
//! - Lays out serpentine blocks and persists dragged card positions
//! - Builds Immutable Canonical Files (JSON-LD + HTML, SHA-256 addressed)
//! - Archives folders at a snapshot id
//! - Records comparisons and on-chain attestations against archives
//!
//! # Example
//!
//! ```rust,ignore
//! use newsroom_core::prelude::*;
//!
//! # async fn example(surface: &dyn RenderSurface) -> Result<()> {
//! let ctx = NewsroomContext::in_memory(NewsroomConfig::new());
//! let folder = FolderRepo::new("project", "folder");
//!
//! let serpentine = SerpentineBlock::open(ctx.clone(), folder.block("timeline"), SerpentineMode::Editable).await?;
//! let builder = SnapshotBuilder::new(ctx, Arc::new(HttpImageFetcher::new()), rasterizer);
//! let published = builder.publish(&folder, &serpentine, surface, None).await?;
//!
//! println!("{} -> {}", published.snapshot.snapshot_id, published.snapshot.content_hash);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod archive;
pub mod attestation;
pub mod compare;
pub mod config;
pub mod context;
pub mod error;
pub mod html;
pub mod icf;
pub mod images;
pub mod karma;
pub mod raster;
pub mod rows;
pub mod serpentine;
pub mod telemetry;

pub use archive::{
    list_snapshots, load_manifest, ArchiveBundle, ArchiveOutcome, ArchiveRequest, BlockCopy, SnapshotArchive,
    SnapshotManifest,
};
pub use attestation::{
    encode_attestation, AttestationFields, AttestationPortal, AttestationRecord, AttestationRequest,
    AttestationService, WalletProvider, SCORE_RANGE,
};
pub use compare::{
    ComparisonFunction, ComparisonRecord, ComparisonRequest, ComparisonResult, ComparisonService, ComparisonSide,
    Difference, DifferenceCategory, Severity,
};
pub use config::{AttestationConfig, AttestationType, LoggingConfig, NewsroomConfig, BASE_CHAIN_ID};
pub use context::{Clock, FixedClock, NewsroomContext, SystemClock};
pub use error::{NewsroomError, Result};
pub use html::{escape_html, render_comparison_html, render_icf_html, IcfPage, MilestoneEntry};
pub use icf::{
    assemble_graph, generate_snapshot_id, seal_graph, GraphInput, IcfSnapshot, PublishedSnapshot, SnapshotBuilder,
    KARMA_QUERY_NODE_ID, SNAPSHOT_NODE_ID,
};
pub use images::{to_data_uri, FetchedImage, HttpImageFetcher, ImageFetcher, ImageInliner, InlinedImage, SlotImage};
pub use karma::{
    latest_folder_query_result, latest_query_result, rows_from_updates, run_karma_query, KarmaFeed,
    KarmaQueryResult, KARMA_QUERY_BLOCK_TYPE,
};
pub use raster::{
    rasterize, BackgroundGuard, RasterFormat, RasterImage, RasterOptions, Rasterizer, RenderSurface,
    OPAQUE_BACKGROUND,
};
pub use rows::{FieldEdit, GeneralTable, RowService};
pub use serpentine::{SerpentineBlock, SerpentineConfig, SerpentineMode};
pub use telemetry::init_tracing;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Newsroom Core
    pub use crate::{
        AttestationPortal, ComparisonService, NewsroomConfig, NewsroomContext, NewsroomError, Rasterizer,
        RenderSurface, Result, RowService, SerpentineBlock, SerpentineMode, SnapshotArchive, SnapshotBuilder,
    };
    pub use crate::images::HttpImageFetcher;
    pub use newsroom_store::{FolderRepo, SnapshotRepo};
    pub use std::sync::Arc;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
